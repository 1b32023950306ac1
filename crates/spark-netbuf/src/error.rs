//! 可恢复错误域。
//!
//! # 设计背景（Why）
//! - 缓冲池运行期只有两类失败：池或存储耗尽（以 `None` 表达，调用方丢弃或重排外层操作），
//!   以及契约违背（越界写入、越界读取、重置仍被引用的缓冲等，以断言终止）。
//! - 真正需要以 `Result` 返回的只有“声明期”错误：缓冲池配置非法、布局文件无法解析、
//!   平台原语重复注入。它们发生在启动阶段，调用方可以据此拒绝启动或回退到默认配置。
//!
//! # 契约说明（What）
//! - 每个变体都有稳定错误码（[`codes`]），遵循 `<域>.<语义>` 命名，
//!   与日志、告警中的机读字段保持一致；
//! - 错误类型满足 `Send + Sync + 'static`，在 `no_std` 下通过 `core::error::Error` 暴露。

use alloc::string::String;

/// 稳定错误码。
pub mod codes {
    /// 缓冲池声明中的字段取值非法。
    pub const INVALID_CONFIG: &str = "netbuf.invalid_config";
    /// 固定数据区总字节数溢出 `usize`。
    pub const CAPACITY_OVERFLOW: &str = "netbuf.capacity_overflow";
    /// 缓冲池布局文本无法解析。
    pub const LAYOUT_PARSE: &str = "netbuf.layout_parse";
    /// 平台中断屏蔽原语已注入。
    pub const IRQ_MASK_INSTALLED: &str = "netbuf.irq_mask_installed";
}

/// 缓冲池声明期错误。
#[derive(Debug, thiserror::Error)]
pub enum NetBufError {
    /// 配置字段取值非法。
    #[error("缓冲池 `{pool}` 配置非法：{reason}")]
    InvalidConfig { pool: String, reason: &'static str },
    /// 固定数据区大小溢出。
    #[error("缓冲池 `{pool}` 数据区容量溢出：{buf_count} × {data_size} 字节")]
    CapacityOverflow {
        pool: String,
        buf_count: u16,
        data_size: usize,
    },
    /// 布局文本解析失败。
    #[error("缓冲池布局解析失败：{0}")]
    LayoutParse(String),
    /// 中断屏蔽原语重复注入。
    #[error("平台中断屏蔽原语已注入，禁止重复注入")]
    IrqMaskInstalled,
}

impl NetBufError {
    /// 返回稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => codes::INVALID_CONFIG,
            Self::CapacityOverflow { .. } => codes::CAPACITY_OVERFLOW,
            Self::LayoutParse(_) => codes::LAYOUT_PARSE,
            Self::IrqMaskInstalled => codes::IRQ_MASK_INSTALLED,
        }
    }
}

/// crate 内统一的结果别名。
pub type Result<T, E = NetBufError> = core::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn codes_follow_namespace_convention() {
        let err = NetBufError::InvalidConfig {
            pool: "adv".to_string(),
            reason: "buf_count 必须大于 0",
        };
        assert_eq!(err.code(), codes::INVALID_CONFIG);
        assert!(err.code().starts_with("netbuf."));
        assert!(err.to_string().contains("adv"));
    }
}
