//! 子应用生命周期转换规则和验证

use super::types::AppStatus;
use thiserror::Error;

/// 生命周期转换错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Invalid transition from {from:?} to {to:?}")]
    InvalidTransition { from: AppStatus, to: AppStatus },
}

/// 生命周期转换
pub struct LifecycleTransition;

impl LifecycleTransition {
    /// 验证状态转换是否合法
    pub fn validate(from: AppStatus, to: AppStatus) -> Result<(), TransitionError> {
        let is_valid = match (from, to) {
            // bootstrap 每个生命周期只执行一次
            (AppStatus::Registered, AppStatus::Bootstrapped) => true,

            // 首次挂载
            (AppStatus::Bootstrapped, AppStatus::Mounted) => true,

            // 路由不再匹配时卸载
            (AppStatus::Mounted, AppStatus::Unmounted) => true,

            // 重新进入路由时再次挂载
            (AppStatus::Unmounted, AppStatus::Mounted) => true,

            // 其他转换都不合法
            _ => false,
        };

        if is_valid {
            Ok(())
        } else {
            Err(TransitionError::InvalidTransition { from, to })
        }
    }

    /// 是否已完成 bootstrap
    pub fn is_bootstrapped(status: AppStatus) -> bool {
        !matches!(status, AppStatus::Registered)
    }
}
