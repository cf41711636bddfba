#[allow(clippy::module_inception)]
pub mod error;
pub mod lifecycle;
pub mod state;

pub use error::CliError;
pub use lifecycle::LifecycleError;
pub use state::StateError;
