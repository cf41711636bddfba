//! microhost-core
//!
//! Cross-boundary state synchronization for micro-frontend hosts: a global
//! publish/subscribe state store plus the bootstrap / mount / unmount contract
//! a host uses to activate guest applications.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod state;
