//! 临界区：平台中断屏蔽原语 + 自旋锁。
//!
//! # 设计背景（Why）
//! - 缓冲池既会在普通执行上下文中被调用，也会在中断上下文中被调用；
//!   计数器递减、槽位认领、队列拼接必须在极短的互斥窗口内完成。
//! - 平台初始化只向本 crate 提供一个“屏蔽中断并返回旧掩码 / 恢复旧掩码”的原语，
//!   其余时钟、看门狗等初始化与缓冲池无关。
//!
//! # 逻辑解析（How）
//! - [`IrqMask`] 抽象平台原语，通过 [`install_irq_mask`] 在启动阶段注入一次；
//!   未注入时使用 [`NoIrqMask`]，适用于宿主机与测试环境。
//! - `Exclusive<T>` 先屏蔽中断，再获取 `spin::Mutex`：单核目标上屏蔽中断即可排他，
//!   多核或宿主机线程环境下由自旋锁兜底。
//! - `CriticalSection` 的字段声明顺序保证“先解锁、后恢复中断”。
//!
//! # 契约说明（What）
//! - 临界区内只允许指针与计数器更新，禁止调用存储分配、释放回调或销毁钩子；
//! - 临界区不可重入同一个 `Exclusive`，否则自旋锁会自锁。

use core::ops::{Deref, DerefMut};

use spin::Once;

use crate::{
    error::{NetBufError, Result},
    sync::{self, Mutex, MutexGuard},
};

/// 平台提供的中断屏蔽原语。
///
/// # 契约说明（What）
/// - `acquire`：屏蔽中断并返回调用前的掩码，可嵌套调用；
/// - `restore`：恢复 `acquire` 返回的掩码，调用顺序与 `acquire` 严格对称（LIFO）；
/// - 两个方法都必须可在中断上下文调用，且不得阻塞。
pub trait IrqMask: Sync {
    /// 屏蔽中断，返回旧掩码。
    fn acquire(&self) -> u32;

    /// 恢复旧掩码。
    fn restore(&self, prior: u32);
}

/// 宿主机默认实现：不做任何屏蔽，互斥完全依赖自旋锁。
#[derive(Clone, Copy, Debug, Default)]
pub struct NoIrqMask;

impl IrqMask for NoIrqMask {
    fn acquire(&self) -> u32 {
        0
    }

    fn restore(&self, _prior: u32) {}
}

static NO_IRQ_MASK: NoIrqMask = NoIrqMask;
static IRQ_MASK: Once<&'static dyn IrqMask> = Once::new();

/// 注入平台中断屏蔽原语，整个进程生命周期内只能成功一次。
///
/// 应在任何缓冲池被使用之前调用；重复调用返回 [`NetBufError::IrqMaskInstalled`]。
pub fn install_irq_mask(mask: &'static dyn IrqMask) -> Result<()> {
    let mut installed = false;
    IRQ_MASK.call_once(|| {
        installed = true;
        mask
    });
    if installed {
        Ok(())
    } else {
        Err(NetBufError::IrqMaskInstalled)
    }
}

fn irq_mask() -> &'static dyn IrqMask {
    IRQ_MASK.get().copied().unwrap_or(&NO_IRQ_MASK)
}

/// 一次中断屏蔽的凭据，析构时恢复旧掩码。
pub struct IrqKey {
    mask: &'static dyn IrqMask,
    prior: u32,
}

impl IrqKey {
    /// 屏蔽中断，直到返回值被析构。
    pub fn acquire() -> Self {
        let mask = irq_mask();
        let prior = mask.acquire();
        Self { mask, prior }
    }
}

impl Drop for IrqKey {
    fn drop(&mut self) {
        self.mask.restore(self.prior);
    }
}

/// 可同时在中断与普通上下文访问的共享状态。
pub(crate) struct Exclusive<T> {
    inner: Mutex<T>,
}

impl<T> Exclusive<T> {
    pub(crate) fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    /// 进入临界区。
    pub(crate) fn lock(&self) -> CriticalSection<'_, T> {
        let key = IrqKey::acquire();
        CriticalSection {
            guard: sync::lock(&self.inner),
            _key: key,
        }
    }
}

/// 临界区守卫；`guard` 先于 `_key` 析构。
pub(crate) struct CriticalSection<'a, T> {
    guard: MutexGuard<'a, T>,
    _key: IrqKey,
}

impl<T> Deref for CriticalSection<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for CriticalSection<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}
