use alloc::sync::Arc;
use core::fmt;

use bytes::BytesMut;

use crate::{BufId, Timeout};

/// 外部数据区分配器：分配、保留、释放三元组。
///
/// # 设计背景（Why）
/// - 部分承载层的数据区来自专用 RAM 段或 DMA 区域，缓冲池只管理描述符，
///   数据区的来源与回收交由平台代码决定。
///
/// # 契约说明（What）
/// - `allocate`：返回的 `BytesMut` 以 `len()` 作为可用容量（例如 `BytesMut::zeroed(n)`），
///   可以大于请求值；返回 `None` 表示耗尽，缓冲池会把已认领的槽位退回空闲集合；
/// - `retain`：为克隆描述符提供一份承载相同字节的数据区（共享或复制由实现决定）；
/// - `release`：回收 `allocate`/`retain` 交出的数据区；
/// - 三个方法都在临界区之外、中断开启的状态下调用，可以耗费有界时间，但不得回调缓冲池。
pub trait ExternalAllocator: Send + Sync + 'static {
    /// 为描述符 `buf` 分配至少 `size` 字节。
    fn allocate(&self, buf: BufId, size: usize, timeout: Timeout) -> Option<BytesMut>;

    /// 为克隆出的描述符 `buf` 提供与 `data` 相同内容的数据区。
    fn retain(&self, buf: BufId, data: &BytesMut) -> Option<BytesMut>;

    /// 回收描述符 `buf` 的数据区。
    fn release(&self, buf: BufId, data: BytesMut);
}

/// 数据区分配策略，在缓冲池构造时选定。
///
/// - `Fixed`：池内一块连续区域，按描述符索引等分，释放无需任何动作；
/// - `External`：委托 [`ExternalAllocator`]，`default_size` 为 `allocate_default` 的请求大小。
#[derive(Clone)]
pub enum DataStrategy {
    Fixed {
        data_size: usize,
    },
    External {
        default_size: usize,
        allocator: Arc<dyn ExternalAllocator>,
    },
}

impl DataStrategy {
    /// `allocate_default` 使用的请求大小。
    pub fn default_size(&self) -> usize {
        match self {
            Self::Fixed { data_size } => *data_size,
            Self::External { default_size, .. } => *default_size,
        }
    }
}

impl fmt::Debug for DataStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed { data_size } => f
                .debug_struct("Fixed")
                .field("data_size", data_size)
                .finish(),
            Self::External { default_size, .. } => f
                .debug_struct("External")
                .field("default_size", default_size)
                .finish_non_exhaustive(),
        }
    }
}

/// 描述符数据区的来源，决定释放路径。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum DataOrigin {
    /// 零尺寸分配，没有数据区。
    Empty,
    /// 固定数据池切片，释放时放回槽位。
    Fixed,
    /// 外部分配器提供。
    External,
    /// 调用方提供（`EXTERNAL_DATA`），释放时直接丢弃句柄。
    Caller,
}
