//! 通过 mount props 传给子应用的通信接口

use super::snapshot::StateSnapshot;
use super::store::GlobalState;
use super::subscription::Subscription;
use super::types::Scope;
use crate::error::StateError;
use std::fmt;
use std::sync::Arc;

/// 绑定了作用域的 store 访问器。
///
/// 主应用持有 `Scope::Host` 的 actions，每个子应用拿到以自身名称为作用域的副本，
/// 因此 `off_global_state_change` 只会移除该子应用自己注册的监听器。
#[derive(Clone)]
pub struct StateActions {
    store: GlobalState,
    scope: Scope,
}

impl StateActions {
    pub(crate) fn new(store: GlobalState, scope: Scope) -> Self {
        Self { store, scope }
    }

    /// 派生出某个子应用作用域的 actions
    pub fn for_guest(&self, name: impl Into<String>) -> Self {
        Self::new(self.store.clone(), Scope::guest(name))
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn store(&self) -> &GlobalState {
        &self.store
    }

    pub fn set_global_state(&self, partial: StateSnapshot) -> Result<(), StateError> {
        self.store.set_state_as(&self.scope, partial)
    }

    pub fn on_global_state_change<F>(
        &self,
        listener: F,
        fire_immediately: bool,
    ) -> Result<Subscription, StateError>
    where
        F: Fn(&StateSnapshot, &StateSnapshot) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.store
            .subscribe_as(self.scope.clone(), Arc::new(listener), fire_immediately)
    }

    /// 移除本作用域注册的全部监听器，返回移除数量
    pub fn off_global_state_change(&self) -> usize {
        let removed = self.store.remove_scope(&self.scope);
        tracing::debug!(scope = %self.scope, removed, "scope listeners removed");
        removed
    }

    pub fn get_global_state(&self) -> Result<StateSnapshot, StateError> {
        self.store.get_state()
    }
}

impl fmt::Debug for StateActions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateActions")
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}
