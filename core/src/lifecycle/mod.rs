//! # 生命周期桥接
//!
//! 主应用激活 / 停用子应用的契约：
//! `Registered → Bootstrapped → Mounted → Unmounted → Mounted …`
//!
//! 子应用只通过 mount props 中的 [`crate::state::StateActions`] 与主应用通信。

pub mod container;
pub mod host;
pub mod traits;
pub mod transitions;
pub mod types;

pub use container::{ContainerRegistry, MountTarget};
pub use host::{Host, MicroApp, NavigationReport, DEFAULT_EVENT_CAPACITY};
pub use traits::GuestApp;
pub use transitions::{LifecycleTransition, TransitionError};
pub use types::{
    ActiveRule, AppStatus, GuestRuntime, HostEvent, LifecycleStep, MountDescriptor, MountProps,
};
