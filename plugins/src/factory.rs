use anyhow::Result;

use microhost_core::config::{AppEntry, GuestKind};
use microhost_core::lifecycle::MicroApp;

use crate::message_panel::MessagePanelGuest;

/// A registered app plus the UI handle the host keeps for driving it.
pub struct BuiltApp {
    pub app: MicroApp,
    pub panel: Option<MessagePanelGuest>,
}

pub fn build_guest(entry: &AppEntry) -> MessagePanelGuest {
    match entry.kind {
        GuestKind::MessagePanel => MessagePanelGuest::new(entry.name.clone()),
    }
}

pub fn build_micro_app(entry: &AppEntry) -> Result<BuiltApp> {
    let props = entry.props_json()?;
    match entry.kind {
        GuestKind::MessagePanel => {
            let guest = build_guest(entry);
            let app = MicroApp::new(entry.descriptor(), guest.clone()).with_props(props);
            Ok(BuiltApp {
                app,
                panel: Some(guest),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use microhost_core::config::AppConfig;
    use microhost_core::lifecycle::GuestApp;

    #[test]
    fn test_build_default_app() {
        let cfg = AppConfig::default();
        let built = build_micro_app(&cfg.apps[0]).unwrap();

        assert_eq!(built.app.descriptor.name, "micro-app");
        assert_eq!(built.app.guest.name(), "micro-app");
        assert!(built.app.descriptor.active_rule.matches("/micro"));
        assert_eq!(built.panel.unwrap().app_name(), "micro-app");
    }
}
