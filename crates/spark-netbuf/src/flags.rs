use core::{fmt, ops::BitOr};

/// 描述符标志位集合。
///
/// # 设计背景（Why）
/// - 同一个描述符会被队列、重传缓存、朋友节点缓存等子系统共同关注，
///   需要一组位来表达“处于链中”“数据归外部所有”“仍被某子系统占用”等状态。
///
/// # 契约说明（What）
/// - 低 4 位由缓冲池内部维护：
///   - `FRAGS`：仅在入队后、出队前存在，表示队列中下一节点是本消息的后续分片；
///   - `EXTERNAL_DATA`：数据区由调用方提供，释放时不交还分配策略；
///   - `CLAIMED`：槽位已被认领，空闲槽位的标志位恒为 0；
///   - `PARKED`：最后一份引用因忙标记被搁置在池中，等待所属子系统回收。
/// - 高 4 位为忙标记（[`BufFlags::BUSY_MASK`]），任何一位存在时引用计数归零也不会释放。
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct BufFlags {
    bits: u8,
}

impl BufFlags {
    /// 入队时标记非末尾分片。
    pub const FRAGS: Self = Self::new(0x01);
    /// 数据区由调用方持有。
    pub const EXTERNAL_DATA: Self = Self::new(0x02);
    /// 槽位已认领。
    pub const CLAIMED: Self = Self::new(0x04);
    /// 忙标记阻止了释放，描述符被搁置。
    pub const PARKED: Self = Self::new(0x08);

    /// 广播承载层仍在发送。
    pub const ADV_BUSY: Self = Self::new(0x10);
    /// 朋友节点轮询缓存仍持有。
    pub const FRIEND_POLL_CACHE: Self = Self::new(0x20);
    /// 朋友节点消息队列仍持有。
    pub const FRIEND_QUEUE_CACHE: Self = Self::new(0x40);
    /// PB-ADV 重传缓存仍持有。
    pub const PBADV_CACHE: Self = Self::new(0x80);

    /// 所有忙标记的并集。
    pub const BUSY_MASK: Self = Self::new(0xF0);

    /// 空集合。
    pub const EMPTY: Self = Self::new(0);

    /// 从原始比特构造。
    pub const fn new(bits: u8) -> Self {
        Self { bits }
    }

    /// 底层比特值。
    pub const fn bits(self) -> u8 {
        self.bits
    }

    pub const fn is_empty(self) -> bool {
        self.bits == 0
    }

    /// `other` 的所有位是否都存在。
    pub const fn contains(self, other: Self) -> bool {
        self.bits & other.bits == other.bits
    }

    /// 是否与 `other` 有交集。
    pub const fn intersects(self, other: Self) -> bool {
        self.bits & other.bits != 0
    }

    /// 是否存在任意忙标记。
    pub const fn is_busy(self) -> bool {
        self.intersects(Self::BUSY_MASK)
    }

    /// 是否全部位于忙标记区间内。
    pub const fn is_busy_only(self) -> bool {
        self.bits & !Self::BUSY_MASK.bits == 0
    }

    pub const fn union(self, other: Self) -> Self {
        Self::new(self.bits | other.bits)
    }

    pub const fn difference(self, other: Self) -> Self {
        Self::new(self.bits & !other.bits)
    }
}

impl BitOr for BufFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl fmt::Debug for BufFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(BufFlags, &str); 8] = [
            (BufFlags::FRAGS, "FRAGS"),
            (BufFlags::EXTERNAL_DATA, "EXTERNAL_DATA"),
            (BufFlags::CLAIMED, "CLAIMED"),
            (BufFlags::PARKED, "PARKED"),
            (BufFlags::ADV_BUSY, "ADV_BUSY"),
            (BufFlags::FRIEND_POLL_CACHE, "FRIEND_POLL_CACHE"),
            (BufFlags::FRIEND_QUEUE_CACHE, "FRIEND_QUEUE_CACHE"),
            (BufFlags::PBADV_CACHE, "PBADV_CACHE"),
        ];
        let mut set = f.debug_set();
        for (flag, name) in NAMES {
            if self.contains(flag) {
                set.entry(&format_args!("{name}"));
            }
        }
        set.finish()
    }
}
