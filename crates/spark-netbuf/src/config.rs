//! 缓冲池声明。
//!
//! # 设计背景（Why）
//! - 缓冲池在固件构建期即确定：槽位数、数据区描述、每槽用户数据大小、销毁钩子。
//!   运行期不存在注册接口，也不会扩容。
//! - 板级配置常以文本表格维护各承载层的池规格，[`PoolLayout`] 提供可序列化的纯数据声明，
//!   只覆盖固定数据池；外部分配器与销毁钩子必须在代码中通过 [`PoolConfig`] 声明。
//!
//! # 契约说明（What）
//! - `buf_count` 必须大于 0；固定数据池的 `buf_count × data_size` 不得溢出；
//! - 默认认领策略为 [`AllocPolicy::ScanForFree`]。

use alloc::{borrow::Cow, string::String, sync::Arc, vec::Vec};
use core::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    BufId,
    data::{DataStrategy, ExternalAllocator},
    error::{NetBufError, Result},
};

/// 描述符回到空闲集合之前调用的销毁钩子，在临界区之外执行。
pub type DestroyHook = Arc<dyn Fn(BufId) + Send + Sync>;

/// 槽位认领策略。
///
/// - `RingLazyInit`：按倒计数顺序认领从未使用过的槽位，倒计数归零后回绕到容量，
///   之后沿同一环序认领已回收的空闲槽位，最多探查一圈；回收只经由引用计数归零发生。
/// - `ScanForFree`：维护可用计数，计数为 0 立即失败；否则递减计数并沿环序跳过
///   标志位非 0 的槽位，直到找到空闲槽位；支持 [`Pool::release`](crate::Pool::release) 直接归还。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocPolicy {
    RingLazyInit,
    #[default]
    ScanForFree,
}

/// 代码侧的缓冲池声明。
#[derive(Clone)]
pub struct PoolConfig {
    pub(crate) name: Cow<'static, str>,
    pub(crate) buf_count: u16,
    pub(crate) strategy: DataStrategy,
    pub(crate) user_data_size: usize,
    pub(crate) policy: AllocPolicy,
    pub(crate) destroy: Option<DestroyHook>,
}

impl PoolConfig {
    /// 固定数据池：`buf_count` 个槽位，每个槽位 `data_size` 字节。
    pub fn fixed(buf_count: u16, data_size: usize) -> Self {
        Self::with_strategy(buf_count, DataStrategy::Fixed { data_size })
    }

    /// 外部分配器数据池。
    pub fn external(
        buf_count: u16,
        default_size: usize,
        allocator: Arc<dyn ExternalAllocator>,
    ) -> Self {
        Self::with_strategy(
            buf_count,
            DataStrategy::External {
                default_size,
                allocator,
            },
        )
    }

    fn with_strategy(buf_count: u16, strategy: DataStrategy) -> Self {
        Self {
            name: Cow::Borrowed("netbuf"),
            buf_count,
            strategy,
            user_data_size: 0,
            policy: AllocPolicy::default(),
            destroy: None,
        }
    }

    /// 池名称，仅用于日志与错误信息。
    pub fn with_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// 每个槽位附带的用户数据字节数。
    pub fn with_user_data_size(mut self, size: usize) -> Self {
        self.user_data_size = size;
        self
    }

    pub fn with_policy(mut self, policy: AllocPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_destroy(mut self, hook: impl Fn(BufId) + Send + Sync + 'static) -> Self {
        self.destroy = Some(Arc::new(hook));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn buf_count(&self) -> u16 {
        self.buf_count
    }

    pub fn strategy(&self) -> &DataStrategy {
        &self.strategy
    }

    pub fn user_data_size(&self) -> usize {
        self.user_data_size
    }

    pub fn policy(&self) -> AllocPolicy {
        self.policy
    }

    /// 校验声明并返回固定数据区的总字节数（外部分配器为 0）。
    pub(crate) fn validate(&self) -> Result<usize> {
        if self.buf_count == 0 {
            return Err(NetBufError::InvalidConfig {
                pool: self.name.clone().into_owned(),
                reason: "buf_count 必须大于 0",
            });
        }
        match &self.strategy {
            DataStrategy::Fixed { data_size } => usize::from(self.buf_count)
                .checked_mul(*data_size)
                .ok_or_else(|| NetBufError::CapacityOverflow {
                    pool: self.name.clone().into_owned(),
                    buf_count: self.buf_count,
                    data_size: *data_size,
                }),
            DataStrategy::External { .. } => Ok(0),
        }
    }
}

impl fmt::Debug for PoolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolConfig")
            .field("name", &self.name)
            .field("buf_count", &self.buf_count)
            .field("strategy", &self.strategy)
            .field("user_data_size", &self.user_data_size)
            .field("policy", &self.policy)
            .field("destroy", &self.destroy.is_some())
            .finish()
    }
}

/// 固定数据池的可序列化声明。
///
/// ```toml
/// [[pool]]
/// name = "adv"
/// buf_count = 15
/// data_size = 29
/// user_data_size = 4
/// policy = "scan_for_free"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolLayout {
    pub name: String,
    pub buf_count: u16,
    pub data_size: usize,
    #[serde(default)]
    pub user_data_size: usize,
    #[serde(default)]
    pub policy: AllocPolicy,
}

impl PoolLayout {
    /// 转换为代码侧声明。
    pub fn into_config(self) -> PoolConfig {
        PoolConfig::fixed(self.buf_count, self.data_size)
            .with_name(self.name)
            .with_user_data_size(self.user_data_size)
            .with_policy(self.policy)
    }
}

/// 一组缓冲池布局，对应文本中的 `[[pool]]` 数组。
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolTable {
    #[serde(rename = "pool", default)]
    pub pools: Vec<PoolLayout>,
}

impl PoolTable {
    /// 从 TOML 文本解析布局表。
    #[cfg(feature = "layout-toml")]
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|err| NetBufError::LayoutParse(alloc::format!("{err}")))
    }
}
