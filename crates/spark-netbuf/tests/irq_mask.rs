//! `irq_mask` 集成测试：平台中断屏蔽原语的注入与对称调用。
//!
//! # 测试目标（Why）
//! - 所有计数器更新与链拼接都必须发生在 `acquire`/`restore` 之间；
//! - 原语只能注入一次，重复注入返回稳定错误码。
//!
//! 注入是进程级的，本文件只包含一个测试函数，避免与其他用例相互干扰。

use std::sync::atomic::{AtomicIsize, AtomicUsize, Ordering};

use spark_netbuf::{
    IrqKey, IrqMask, NetBufQueue, NoIrqMask, Pool, PoolConfig, Timeout, codes, install_irq_mask,
};

/// 记录嵌套深度的屏蔽原语：`acquire` 返回旧深度，`restore` 回到旧深度。
struct CountingMask {
    depth: AtomicIsize,
    entries: AtomicUsize,
}

impl IrqMask for CountingMask {
    fn acquire(&self) -> u32 {
        self.entries.fetch_add(1, Ordering::SeqCst);
        let prior = self.depth.fetch_add(1, Ordering::SeqCst);
        u32::try_from(prior).expect("嵌套深度不能为负")
    }

    fn restore(&self, prior: u32) {
        let current = self.depth.swap(prior as isize, Ordering::SeqCst);
        assert_eq!(current, prior as isize + 1, "restore 必须与 acquire 严格对称");
    }
}

static MASK: CountingMask = CountingMask {
    depth: AtomicIsize::new(0),
    entries: AtomicUsize::new(0),
};

#[test]
fn pool_and_queue_run_inside_balanced_critical_sections() {
    install_irq_mask(&MASK).expect("首次注入必须成功");
    let err = install_irq_mask(&NoIrqMask).expect_err("重复注入必须失败");
    assert_eq!(err.code(), codes::IRQ_MASK_INSTALLED);

    let pool = Pool::new(PoolConfig::fixed(2, 8)).expect("构造缓冲池");
    let queue = NetBufQueue::new();

    let before = MASK.entries.load(Ordering::SeqCst);
    let buf = pool.allocate_default(Timeout::NoWait).expect("分配");
    let after_alloc = MASK.entries.load(Ordering::SeqCst);
    assert!(after_alloc > before, "认领必须进入临界区");

    queue.enqueue(buf);
    let buf = queue.dequeue().expect("出队");
    drop(buf);
    assert!(MASK.entries.load(Ordering::SeqCst) >= after_alloc + 3);
    assert_eq!(MASK.depth.load(Ordering::SeqCst), 0, "所有临界区都已退出");

    {
        let _outer = IrqKey::acquire();
        let _inner = IrqKey::acquire();
        assert_eq!(MASK.depth.load(Ordering::SeqCst), 2);
    }
    assert_eq!(MASK.depth.load(Ordering::SeqCst), 0, "嵌套屏蔽按 LIFO 恢复");
}
