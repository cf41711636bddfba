//! 状态类型定义

use super::snapshot::StateSnapshot;
use std::fmt;
use std::sync::Arc;

/// 监听器：`(current, previous)`，返回错误只会被记录，不会中断广播
pub type Listener = Arc<dyn Fn(&StateSnapshot, &StateSnapshot) -> anyhow::Result<()> + Send + Sync>;

/// 订阅 ID（在同一个 store 内单调递增，不复用）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(crate) u64);

impl SubscriptionId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// 订阅/写入的归属方
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// 主应用
    Host,
    /// 子应用（按名称区分）
    Guest(String),
}

impl Scope {
    pub fn guest(name: impl Into<String>) -> Self {
        Self::Guest(name.into())
    }

    pub fn is_guest(&self) -> bool {
        matches!(self, Self::Guest(_))
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => f.write_str("host"),
            Self::Guest(name) => write!(f, "guest:{name}"),
        }
    }
}

/// Store 选项
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreOptions {
    /// 子应用只能修改当前快照中已存在的顶层键，其余键被丢弃并记录告警
    pub restrict_guest_keys: bool,
}
