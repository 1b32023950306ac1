//! 同步原语适配层。
//!
//! 默认使用 `spin::Mutex` 与 `core` 原子类型；启用 `--cfg loom`（或 `spark_loom`）时切换到
//! `loom` 提供的等价类型，使模型检查能够穷举描述符认领、释放与队列拼接的交错。
//! `Arc` 始终使用 `alloc` 实现，与 spark-core 的 loom 约定一致。

#[cfg(not(any(loom, spark_loom)))]
mod imp {
    pub(crate) use core::sync::atomic::{AtomicBool, AtomicU8, AtomicU16, AtomicUsize, Ordering};

    pub(crate) type Mutex<T> = spin::Mutex<T>;
    pub(crate) type MutexGuard<'a, T> = spin::MutexGuard<'a, T>;

    #[inline]
    pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        mutex.lock()
    }
}

#[cfg(any(loom, spark_loom))]
mod imp {
    pub(crate) use loom::sync::atomic::{AtomicBool, AtomicU8, AtomicU16, AtomicUsize, Ordering};

    pub(crate) type Mutex<T> = loom::sync::Mutex<T>;
    pub(crate) type MutexGuard<'a, T> = loom::sync::MutexGuard<'a, T>;

    #[inline]
    pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        // 模型内 panic 会直接终止该次探索，中毒状态不携带额外信息。
        mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub(crate) use imp::*;
