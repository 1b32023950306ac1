use core::time::Duration;

/// 存储分配步骤的等待上限。
///
/// 缓冲池的槽位认领永远是“失败即返回”，`Timeout` 只透传给
/// [`ExternalAllocator`](crate::ExternalAllocator)，由外部分配器自行解释。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Timeout {
    /// 不等待。
    #[default]
    NoWait,
    /// 最多等待给定时长。
    After(Duration),
    /// 无限等待，仅当外部分配器能保证最终成功时使用。
    Forever,
}

impl Timeout {
    /// 以毫秒构造有限等待。
    pub const fn from_millis(millis: u64) -> Self {
        Self::After(Duration::from_millis(millis))
    }

    /// 是否为非阻塞请求。
    pub fn is_no_wait(&self) -> bool {
        match self {
            Self::NoWait => true,
            Self::After(limit) => limit.is_zero(),
            Self::Forever => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_duration_counts_as_no_wait() {
        assert!(Timeout::NoWait.is_no_wait());
        assert!(Timeout::from_millis(0).is_no_wait());
        assert!(!Timeout::from_millis(5).is_no_wait());
        assert!(!Timeout::Forever.is_no_wait());
    }
}
