//! 生命周期类型定义

use super::container::MountTarget;
use crate::state::StateActions;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// 子应用生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppStatus {
    /// 已注册，尚未 bootstrap
    Registered,
    /// 一次性初始化已完成
    Bootstrapped,
    /// 正在渲染到挂载点，监听器已注册
    Mounted,
    /// 已卸载，监听器已移除，挂载点已清空
    Unmounted,
}

impl fmt::Display for AppStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Registered => "registered",
            Self::Bootstrapped => "bootstrapped",
            Self::Mounted => "mounted",
            Self::Unmounted => "unmounted",
        };
        f.write_str(s)
    }
}

type RoutePredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// 激活规则：判断当前路径是否应挂载子应用
#[derive(Clone)]
pub enum ActiveRule {
    /// 按路径段前缀匹配：`/micro` 匹配 `/micro`、`/micro/a`，不匹配 `/microscope`
    Prefix(String),
    /// 精确匹配
    Exact(String),
    /// 自定义判断
    Custom(RoutePredicate),
}

impl ActiveRule {
    pub fn prefix(path: impl Into<String>) -> Self {
        Self::Prefix(path.into())
    }

    pub fn exact(path: impl Into<String>) -> Self {
        Self::Exact(path.into())
    }

    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(predicate))
    }

    pub fn matches(&self, path: &str) -> bool {
        let path = normalize_path(path);
        match self {
            Self::Prefix(prefix) => {
                let prefix = normalize_path(prefix);
                if prefix == "/" {
                    return true;
                }
                path == prefix
                    || path
                        .strip_prefix(prefix)
                        .is_some_and(|rest| rest.starts_with('/'))
            }
            Self::Exact(exact) => path == normalize_path(exact),
            Self::Custom(predicate) => predicate(path),
        }
    }
}

impl fmt::Debug for ActiveRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prefix(p) => f.debug_tuple("Prefix").field(p).finish(),
            Self::Exact(p) => f.debug_tuple("Exact").field(p).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// 去掉 query / hash 和结尾的 `/`（根路径保持 `/`）
fn normalize_path(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

/// 子应用注册信息，注册后只读
#[derive(Debug, Clone)]
pub struct MountDescriptor {
    /// 子应用名称（唯一）
    pub name: String,
    /// 远程入口地址
    pub entry: String,
    /// 挂载点选择器，如 `#micro-container`
    pub container: String,
    /// 激活规则
    pub active_rule: ActiveRule,
}

impl MountDescriptor {
    pub fn new(
        name: impl Into<String>,
        entry: impl Into<String>,
        container: impl Into<String>,
        active_rule: ActiveRule,
    ) -> Self {
        Self {
            name: name.into(),
            entry: entry.into(),
            container: container.into(),
            active_rule,
        }
    }
}

/// 子应用运行环境
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuestRuntime {
    /// 由主应用编排挂载
    Hosted,
    /// 独立运行，没有全局状态可用
    Standalone,
}

impl GuestRuntime {
    pub fn label(self) -> &'static str {
        match self {
            Self::Hosted => "hosted (micro-frontend)",
            Self::Standalone => "standalone",
        }
    }
}

/// 挂载时传给子应用的 props
#[derive(Debug, Clone)]
pub struct MountProps {
    /// 子应用名称
    pub name: String,
    /// 挂载点
    pub container: MountTarget,
    /// 全局状态通信接口，独立运行时为 `None`
    pub actions: Option<StateActions>,
    /// 注册时附带的自定义 props
    pub custom: Map<String, Value>,
}

impl MountProps {
    /// 独立运行时使用的 props
    pub fn standalone(name: impl Into<String>, container: MountTarget) -> Self {
        Self {
            name: name.into(),
            container,
            actions: None,
            custom: Map::new(),
        }
    }

    pub fn runtime(&self) -> GuestRuntime {
        if self.actions.is_some() {
            GuestRuntime::Hosted
        } else {
            GuestRuntime::Standalone
        }
    }
}

/// 一次生命周期转换记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleStep {
    pub app: String,
    pub from: AppStatus,
    pub to: AppStatus,
}

/// 主应用生命周期事件
#[derive(Debug, Clone, Serialize)]
pub enum HostEvent {
    /// 子应用注册
    AppRegistered {
        app: String,
        timestamp: DateTime<Utc>,
    },
    /// 路由变化
    RouteChanged {
        path: String,
        timestamp: DateTime<Utc>,
    },
    /// 生命周期转换完成
    AppTransitioned {
        app: String,
        from: AppStatus,
        to: AppStatus,
        timestamp: DateTime<Utc>,
    },
    /// 挂载失败，子应用停留在 Bootstrapped/Unmounted 以便重试
    MountFailed {
        app: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
    /// 主应用关闭
    HostShutdown { timestamp: DateTime<Utc> },
}
