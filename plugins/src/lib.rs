pub mod factory;
pub mod host_panel;
pub mod message;
pub mod message_panel;

pub use factory::{build_guest, build_micro_app, BuiltApp};
pub use host_panel::{install_state_logger, HostPanel, HOST_APP_NAME};
pub use message::{compose_message, PanelError};
pub use message_panel::MessagePanelGuest;
