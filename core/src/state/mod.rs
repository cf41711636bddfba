//! # 全局状态模块
//!
//! 主应用与子应用之间的跨边界状态同步：一个发布/订阅式的全局状态容器。
//!
//! ## 设计原则
//!
//! 1. **不可变快照**：每次更新产生新快照，旧引用保持稳定
//! 2. **同步广播**：监听器按注册顺序在调用方线程上执行，无批处理
//! 3. **故障隔离**：单个监听器出错或 panic 不影响同一轮广播中的其他监听器
//! 4. **显式上下文**：store 作为句柄显式传递，而不是全局变量

pub mod actions;
pub mod snapshot;
pub mod store;
pub mod subscription;
pub mod types;

pub use actions::StateActions;
pub use snapshot::StateSnapshot;
pub use store::GlobalState;
pub use subscription::{Subscription, SubscriptionSet};
pub use types::{Listener, Scope, StoreOptions, SubscriptionId};
