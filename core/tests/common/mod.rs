#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use microhost_core::lifecycle::{GuestApp, MountProps};
use microhost_core::state::SubscriptionSet;

pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn new_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn drain(log: &CallLog) -> Vec<String> {
    std::mem::take(&mut *log.lock().unwrap())
}

/// Guest that records every lifecycle hook and every state notification it sees.
pub struct ProbeGuest {
    pub name: String,
    pub log: CallLog,
    pub subscriptions: SubscriptionSet,
    /// When false, `unmount` forgets to release its subscriptions.
    pub cleanup_on_unmount: bool,
    pub fail_mount: bool,
    /// Number of upcoming mounts that fail after the listener is already registered.
    pub fail_after_subscribe: usize,
}

impl ProbeGuest {
    pub fn new(name: &str, log: &CallLog) -> Self {
        Self {
            name: name.to_string(),
            log: Arc::clone(log),
            subscriptions: SubscriptionSet::new(),
            cleanup_on_unmount: true,
            fail_mount: false,
            fail_after_subscribe: 0,
        }
    }

    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl GuestApp for ProbeGuest {
    fn name(&self) -> &str {
        &self.name
    }

    async fn bootstrap(&mut self) -> anyhow::Result<()> {
        self.record(format!("{}:bootstrap", self.name));
        Ok(())
    }

    async fn mount(&mut self, props: &MountProps) -> anyhow::Result<()> {
        self.record(format!("{}:mount", self.name));
        if self.fail_mount {
            anyhow::bail!("render failed");
        }
        if let Some(actions) = props.actions.as_ref() {
            let log = Arc::clone(&self.log);
            let name = self.name.clone();
            let sub = actions.on_global_state_change(
                move |cur, _prev| {
                    let msg = cur.get_str("message").unwrap_or("-");
                    log.lock().unwrap().push(format!("{name}:state:{msg}"));
                    Ok(())
                },
                true,
            )?;
            if self.fail_after_subscribe > 0 {
                self.fail_after_subscribe -= 1;
                // the subscription handle is dropped without unsubscribing
                drop(sub);
                anyhow::bail!("render failed after subscribing");
            }
            self.subscriptions.push(sub);
        }
        props.container.render(format!("{} ({})", self.name, props.runtime().label()));
        Ok(())
    }

    async fn unmount(&mut self, _props: &MountProps) -> anyhow::Result<()> {
        self.record(format!("{}:unmount", self.name));
        if self.cleanup_on_unmount {
            self.subscriptions.clear();
        }
        Ok(())
    }
}
