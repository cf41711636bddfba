//! 订阅句柄

use super::store::{lock_inner, StoreInner};
use super::types::{Scope, SubscriptionId};
use std::fmt;
use std::sync::{Mutex, Weak};

/// `on_state_change` 返回的订阅记录。
///
/// 句柄只弱引用 store，丢弃句柄不会自动退订；需要随组件销毁一起退订时放进 [`SubscriptionSet`]。
pub struct Subscription {
    id: SubscriptionId,
    scope: Scope,
    store: Weak<Mutex<StoreInner>>,
}

impl Subscription {
    pub(crate) fn new(id: SubscriptionId, scope: Scope, store: Weak<Mutex<StoreInner>>) -> Self {
        Self { id, scope, store }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// 退订；重复调用无副作用。返回本次调用是否真正移除了监听器。
    pub fn unsubscribe(&self) -> bool {
        let Some(store) = self.store.upgrade() else {
            return false;
        };
        let removed = lock_inner(&store).remove(self.id);
        if removed {
            tracing::debug!(subscription = %self.id, scope = %self.scope, "listener removed");
        }
        removed
    }

    /// 监听器是否仍在 store 中
    pub fn is_active(&self) -> bool {
        self.store
            .upgrade()
            .map(|store| lock_inner(&store).contains(self.id))
            .unwrap_or(false)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("scope", &self.scope)
            .finish()
    }
}

/// 组件在挂载期间累积的订阅集合，卸载时一次性退订；丢弃时同样会退订。
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    subscriptions: Vec<Subscription>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// 退订全部并清空，返回实际移除的监听器数量
    pub fn clear(&mut self) -> usize {
        self.subscriptions
            .drain(..)
            .filter(|sub| sub.unsubscribe())
            .count()
    }
}

impl Drop for SubscriptionSet {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{GlobalState, StateSnapshot};
    use serde_json::json;

    #[test]
    fn test_set_clear_unsubscribes_all() {
        let store = GlobalState::new();
        store.init_global_state(StateSnapshot::new()).unwrap();

        let mut set = SubscriptionSet::new();
        set.push(store.on_state_change(|_, _| Ok(()), false).unwrap());
        set.push(store.on_state_change(|_, _| Ok(()), true).unwrap());
        let survivor = store.on_state_change(|_, _| Ok(()), false).unwrap();
        assert_eq!(store.listener_count(), 3);

        assert_eq!(set.clear(), 2);
        assert!(set.is_empty());
        assert_eq!(store.listener_count(), 1);
        assert!(survivor.is_active());

        // 已清空，再次 clear 不再移除任何监听器
        assert_eq!(set.clear(), 0);
    }

    #[test]
    fn test_set_drop_unsubscribes() {
        let store = GlobalState::new();
        store
            .init_global_state(StateSnapshot::from_value(json!({"a": 1})).unwrap())
            .unwrap();
        {
            let mut set = SubscriptionSet::new();
            set.push(store.on_state_change(|_, _| Ok(()), false).unwrap());
            assert_eq!(store.listener_count(), 1);
        }
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn test_subscription_outliving_store() {
        let sub = {
            let store = GlobalState::new();
            store.init_global_state(StateSnapshot::new()).unwrap();
            store.on_state_change(|_, _| Ok(()), false).unwrap()
        };
        assert!(!sub.is_active());
        assert!(!sub.unsubscribe());
    }
}
