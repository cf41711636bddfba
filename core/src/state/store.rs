//! 全局状态容器
//!
//! 主应用与子应用之间唯一的通信通道：双方从不直接调用对方，只对共享状态的变化作出反应。
//! 所有写入都经由 `set_state`，监听器按注册顺序在调用方线程上同步执行。
//!
//! ## 重入策略
//!
//! 广播进行中再次调用 `set_state`（来自监听器，或来自其他线程）不会递归广播，
//! 而是进入待处理队列并立即返回 `Ok(())`；当前广播结束后，由发起广播的调用方按
//! FIFO 顺序逐个与当时的最新快照合并，再各自正常广播。
//!
//! ## 退订
//!
//! 每次广播开始时截取监听器列表：广播中途退订不影响本轮，从下一轮起生效；
//! 广播中途新注册的监听器同样只参与之后的广播。

use super::actions::StateActions;
use super::snapshot::StateSnapshot;
use super::subscription::Subscription;
use super::types::{Listener, Scope, StoreOptions, SubscriptionId};
use crate::error::StateError;
use std::any::Any;
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

struct ListenerEntry {
    id: SubscriptionId,
    scope: Scope,
    listener: Listener,
}

struct PendingUpdate {
    scope: Scope,
    partial: StateSnapshot,
}

struct Broadcast {
    current: StateSnapshot,
    previous: StateSnapshot,
    listeners: Vec<(SubscriptionId, Listener)>,
}

#[derive(Default)]
pub(crate) struct StoreInner {
    /// `None` 表示尚未初始化（或已关闭）
    current: Option<StateSnapshot>,
    listeners: Vec<ListenerEntry>,
    pending: VecDeque<PendingUpdate>,
    broadcasting: bool,
    next_id: u64,
    options: StoreOptions,
}

impl StoreInner {
    /// 合并一次更新；状态未变化时返回 `None`
    fn prepare(&mut self, update: PendingUpdate) -> Option<Broadcast> {
        let restrict = self.options.restrict_guest_keys && update.scope.is_guest();
        let current = self.current.as_mut()?;

        let partial = if restrict {
            let (kept, dropped) = update.partial.partition_keys(|k| current.contains_key(k));
            if !dropped.is_empty() {
                tracing::warn!(
                    scope = %update.scope,
                    keys = ?dropped,
                    "ignoring keys that are not part of the global state"
                );
            }
            kept
        } else {
            update.partial
        };

        let next = current.merge(&partial);
        if next == *current {
            tracing::debug!(scope = %update.scope, "global state unchanged, skipping broadcast");
            return None;
        }

        let previous = std::mem::replace(current, next.clone());
        let listeners = self
            .listeners
            .iter()
            .map(|e| (e.id, Arc::clone(&e.listener)))
            .collect();

        tracing::debug!(
            scope = %update.scope,
            keys = partial.len(),
            "global state changed"
        );

        Some(Broadcast {
            current: next,
            previous,
            listeners,
        })
    }

    pub(crate) fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|e| e.id != id);
        before != self.listeners.len()
    }

    pub(crate) fn contains(&self, id: SubscriptionId) -> bool {
        self.listeners.iter().any(|e| e.id == id)
    }
}

/// 监听器从不在持锁状态下执行，锁中毒时直接取回内部数据
pub(crate) fn lock_inner(inner: &Mutex<StoreInner>) -> MutexGuard<'_, StoreInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 全局状态上下文
///
/// 进程级生命周期：启动时创建并 `init_global_state`，关闭时 `shutdown`。
/// 以引用（克隆句柄）的方式传给主应用和子应用，而不是通过全局变量查找。
#[derive(Clone, Default)]
pub struct GlobalState {
    inner: Arc<Mutex<StoreInner>>,
}

impl GlobalState {
    /// 创建未初始化的上下文
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: StoreOptions) -> Self {
        let inner = StoreInner {
            options,
            ..StoreInner::default()
        };
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        lock_inner(&self.inner)
    }

    /// 初始化全局状态并返回主应用的 actions。
    ///
    /// 重复初始化返回 [`StateError::DuplicateInit`]，已有状态和监听器保持不变。
    pub fn init_global_state(&self, initial: StateSnapshot) -> Result<StateActions, StateError> {
        {
            let mut inner = self.lock();
            if inner.current.is_some() {
                tracing::warn!("global state already initialized, refusing to replace it");
                return Err(StateError::DuplicateInit);
            }
            tracing::info!(keys = initial.len(), "global state initialized");
            inner.current = Some(initial);
        }
        Ok(self.actions())
    }

    /// 主应用作用域的 actions（未初始化时调用其方法会返回 `NotInitialized`）
    pub fn actions(&self) -> StateActions {
        StateActions::new(self.clone(), Scope::Host)
    }

    pub fn is_initialized(&self) -> bool {
        self.lock().current.is_some()
    }

    pub fn options(&self) -> StoreOptions {
        self.lock().options
    }

    /// 当前快照
    pub fn get_state(&self) -> Result<StateSnapshot, StateError> {
        self.lock().current.clone().ok_or(StateError::NotInitialized)
    }

    /// 以主应用身份写入。
    ///
    /// 若另一线程或监听器的广播正在进行，更新只进入队列，返回 `Ok(())` 时尚未生效。
    pub fn set_state(&self, partial: StateSnapshot) -> Result<(), StateError> {
        self.set_state_as(&Scope::Host, partial)
    }

    /// 以主应用身份订阅
    pub fn on_state_change<F>(
        &self,
        listener: F,
        fire_immediately: bool,
    ) -> Result<Subscription, StateError>
    where
        F: Fn(&StateSnapshot, &StateSnapshot) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.subscribe_as(Scope::Host, Arc::new(listener), fire_immediately)
    }

    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    /// 某个作用域当前持有的监听器数量
    pub fn listener_count_for(&self, scope: &Scope) -> usize {
        self.lock()
            .listeners
            .iter()
            .filter(|e| &e.scope == scope)
            .count()
    }

    /// 关闭：丢弃所有监听器和待处理更新，回到未初始化状态。返回被移除的监听器数量。
    pub fn shutdown(&self) -> usize {
        let mut inner = self.lock();
        let removed = inner.listeners.len();
        inner.listeners.clear();
        inner.pending.clear();
        inner.current = None;
        tracing::info!(listeners = removed, "global state shut down");
        removed
    }

    pub(crate) fn set_state_as(&self, scope: &Scope, partial: StateSnapshot) -> Result<(), StateError> {
        {
            let mut inner = self.lock();
            if inner.current.is_none() {
                return Err(StateError::NotInitialized);
            }
            if inner.broadcasting {
                tracing::debug!(scope = %scope, "broadcast in progress, queueing update");
                inner.pending.push_back(PendingUpdate {
                    scope: scope.clone(),
                    partial,
                });
                return Ok(());
            }
            inner.broadcasting = true;
        }

        let mut next_update = Some(PendingUpdate {
            scope: scope.clone(),
            partial,
        });
        while let Some(update) = next_update.take() {
            let prepared = self.lock().prepare(update);
            if let Some(broadcast) = prepared {
                for (id, listener) in &broadcast.listeners {
                    invoke_listener(*id, listener, &broadcast.current, &broadcast.previous);
                }
            }

            let mut inner = self.lock();
            next_update = inner.pending.pop_front();
            if next_update.is_none() {
                inner.broadcasting = false;
            }
        }
        Ok(())
    }

    pub(crate) fn subscribe_as(
        &self,
        scope: Scope,
        listener: Listener,
        fire_immediately: bool,
    ) -> Result<Subscription, StateError> {
        let (id, current) = {
            let mut inner = self.lock();
            let current = inner.current.clone().ok_or(StateError::NotInitialized)?;
            inner.next_id += 1;
            let id = SubscriptionId(inner.next_id);
            inner.listeners.push(ListenerEntry {
                id,
                scope: scope.clone(),
                listener: Arc::clone(&listener),
            });
            (id, current)
        };
        tracing::debug!(subscription = %id, scope = %scope, fire_immediately, "listener registered");

        if fire_immediately {
            invoke_listener(id, &listener, &current, &current);
        }

        Ok(Subscription::new(id, scope, Arc::downgrade(&self.inner)))
    }

    pub(crate) fn remove_scope(&self, scope: &Scope) -> usize {
        let mut inner = self.lock();
        let before = inner.listeners.len();
        inner.listeners.retain(|e| &e.scope != scope);
        before - inner.listeners.len()
    }
}

fn invoke_listener(
    id: SubscriptionId,
    listener: &Listener,
    current: &StateSnapshot,
    previous: &StateSnapshot,
) {
    match catch_unwind(AssertUnwindSafe(|| listener(current, previous))) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            tracing::warn!(subscription = %id, error = %err, "global state listener failed");
        }
        Err(payload) => {
            tracing::warn!(
                subscription = %id,
                panic = panic_message(payload.as_ref()),
                "global state listener panicked"
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn snap(v: Value) -> StateSnapshot {
        StateSnapshot::from_value(v).unwrap()
    }

    type Log = Arc<Mutex<Vec<String>>>;

    fn new_log() -> Log {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    fn recorder(
        log: &Log,
        tag: &'static str,
    ) -> impl Fn(&StateSnapshot, &StateSnapshot) -> anyhow::Result<()> + Send + Sync + 'static {
        let log = Arc::clone(log);
        move |cur, _prev| {
            let msg = cur.get_str("message").unwrap_or("-").to_string();
            log.lock().unwrap().push(format!("{tag}:{msg}"));
            Ok(())
        }
    }

    #[test]
    fn test_requires_initialization() {
        let store = GlobalState::new();
        assert_eq!(
            store.set_state(snap(json!({"a": 1}))),
            Err(StateError::NotInitialized)
        );
        assert!(matches!(
            store.on_state_change(|_, _| Ok(()), false),
            Err(StateError::NotInitialized)
        ));
        assert_eq!(store.get_state(), Err(StateError::NotInitialized));
    }

    #[test]
    fn test_duplicate_init_fails_and_keeps_state() {
        let store = GlobalState::new();
        store.init_global_state(snap(json!({"user": "A"}))).unwrap();
        let err = store.init_global_state(snap(json!({"user": "B"}))).unwrap_err();
        assert_eq!(err, StateError::DuplicateInit);
        assert_eq!(store.get_state().unwrap().to_value(), json!({"user": "A"}));
    }

    #[test]
    fn test_listener_receives_current_and_previous() {
        let store = GlobalState::new();
        store.init_global_state(snap(json!({"user": "A"}))).unwrap();

        let seen: Arc<Mutex<Vec<(Value, Value)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = store
            .on_state_change(
                move |cur, prev| {
                    sink.lock().unwrap().push((cur.to_value(), prev.to_value()));
                    Ok(())
                },
                false,
            )
            .unwrap();

        store.set_state(snap(json!({"message": "hi"}))).unwrap();

        assert_eq!(
            store.get_state().unwrap().to_value(),
            json!({"user": "A", "message": "hi"})
        );
        assert_eq!(
            seen.lock().unwrap().clone(),
            vec![(json!({"user": "A", "message": "hi"}), json!({"user": "A"}))]
        );
    }

    #[test]
    fn test_identical_update_is_noop() {
        let store = GlobalState::new();
        store
            .init_global_state(snap(json!({"message": "hi", "n": 1})))
            .unwrap();
        let log = new_log();
        let _sub = store.on_state_change(recorder(&log, "a"), false).unwrap();

        let before = store.get_state().unwrap();
        store.set_state(snap(json!({"message": "hi"}))).unwrap();
        store.set_state(StateSnapshot::new()).unwrap();

        assert!(entries(&log).is_empty());
        assert!(before.ptr_eq(&store.get_state().unwrap()));
    }

    #[test]
    fn test_final_state_is_fold_of_partials() {
        let store = GlobalState::new();
        let initial = snap(json!({"user": "A", "count": 0}));
        store.init_global_state(initial.clone()).unwrap();

        let partials = vec![
            snap(json!({"count": 1})),
            snap(json!({"message": "x", "nested": {"a": 1}})),
            snap(json!({"nested": {"b": 2}})),
            snap(json!({"count": 1})),
            snap(json!({"user": "B"})),
        ];
        let expected = partials.iter().fold(initial, |acc, p| acc.merge(p));
        for p in partials {
            store.set_state(p).unwrap();
        }
        assert_eq!(store.get_state().unwrap(), expected);
        assert_eq!(
            expected.to_value(),
            json!({"user": "B", "count": 1, "message": "x", "nested": {"b": 2}})
        );
    }

    #[test]
    fn test_listeners_run_in_registration_order() {
        let store = GlobalState::new();
        store.init_global_state(StateSnapshot::new()).unwrap();
        let log = new_log();
        let _a = store.on_state_change(recorder(&log, "a"), false).unwrap();
        let _b = store.on_state_change(recorder(&log, "b"), false).unwrap();

        store.set_state(snap(json!({"message": "1"}))).unwrap();
        store.set_state(snap(json!({"message": "2"}))).unwrap();

        assert_eq!(entries(&log), vec!["a:1", "b:1", "a:2", "b:2"]);
    }

    #[test]
    fn test_fire_immediately_uses_current_for_both() {
        let store = GlobalState::new();
        store.init_global_state(snap(json!({"user": "A"}))).unwrap();

        let calls = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&calls);
        let _sub = store
            .on_state_change(
                move |cur, prev| {
                    assert!(cur.ptr_eq(prev));
                    assert_eq!(cur.to_value(), json!({"user": "A"}));
                    *counter.lock().unwrap() += 1;
                    Ok(())
                },
                true,
            )
            .unwrap();

        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let store = GlobalState::new();
        store.init_global_state(StateSnapshot::new()).unwrap();
        let log = new_log();
        let sub = store.on_state_change(recorder(&log, "a"), false).unwrap();

        assert!(sub.is_active());
        assert!(sub.unsubscribe());
        assert!(!sub.unsubscribe());
        assert!(!sub.is_active());

        store.set_state(snap(json!({"message": "after"}))).unwrap();
        assert!(entries(&log).is_empty());
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn test_unsubscribe_during_broadcast_applies_next_time() {
        let store = GlobalState::new();
        store.init_global_state(StateSnapshot::new()).unwrap();
        let log = new_log();

        let victim: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&victim);
        let _a = store
            .on_state_change(
                move |_, _| {
                    if let Some(sub) = slot.lock().unwrap().as_ref() {
                        sub.unsubscribe();
                    }
                    Ok(())
                },
                false,
            )
            .unwrap();
        let b = store.on_state_change(recorder(&log, "b"), false).unwrap();
        *victim.lock().unwrap() = Some(b);

        store.set_state(snap(json!({"message": "1"}))).unwrap();
        store.set_state(snap(json!({"message": "2"}))).unwrap();

        // b 在第一轮广播中仍被调用，第二轮不再调用
        assert_eq!(entries(&log), vec!["b:1"]);
    }

    #[test]
    fn test_reentrant_update_runs_after_current_broadcast() {
        let store = GlobalState::new();
        store.init_global_state(StateSnapshot::new()).unwrap();
        let log = new_log();

        let echo_store = store.clone();
        let echo_log = Arc::clone(&log);
        let _a = store
            .on_state_change(
                move |cur, _| {
                    let msg = cur.get_str("message").unwrap_or("-").to_string();
                    echo_log.lock().unwrap().push(format!("a:{msg}"));
                    if msg == "ping" {
                        echo_store.set_state(snap(json!({"message": "pong"})))?;
                        echo_log.lock().unwrap().push("a:queued".to_string());
                    }
                    Ok(())
                },
                false,
            )
            .unwrap();
        let _b = store.on_state_change(recorder(&log, "b"), false).unwrap();

        store.set_state(snap(json!({"message": "ping"}))).unwrap();

        assert_eq!(
            entries(&log),
            vec!["a:ping", "a:queued", "b:ping", "a:pong", "b:pong"]
        );
        assert_eq!(store.get_state().unwrap().get_str("message"), Some("pong"));
    }

    #[test]
    fn test_update_from_other_thread_is_deferred_until_broadcast_ends() {
        use std::sync::mpsc;

        let store = GlobalState::new();
        store.init_global_state(StateSnapshot::new()).unwrap();
        let log = new_log();

        let (started_tx, started_rx) = mpsc::channel::<()>();
        let (go_tx, go_rx) = mpsc::channel::<()>();
        let go_rx = Mutex::new(go_rx);
        let _slow = store
            .on_state_change(
                move |cur, _| {
                    if cur.get_str("message") == Some("first") {
                        started_tx.send(())?;
                        go_rx.lock().unwrap().recv()?;
                    }
                    Ok(())
                },
                false,
            )
            .unwrap();
        let _b = store.on_state_change(recorder(&log, "b"), false).unwrap();

        let writer = store.clone();
        let broadcaster =
            std::thread::spawn(move || writer.set_state(snap(json!({"message": "first"}))));

        started_rx.recv().unwrap();
        assert_eq!(store.set_state(snap(json!({"message": "second"}))), Ok(()));
        // 返回时尚未生效
        assert_eq!(store.get_state().unwrap().get_str("message"), Some("first"));

        go_tx.send(()).unwrap();
        broadcaster.join().unwrap().unwrap();
        assert_eq!(store.get_state().unwrap().get_str("message"), Some("second"));
        assert_eq!(entries(&log), vec!["b:first", "b:second"]);
    }

    #[test]
    fn test_listener_registered_mid_broadcast_waits_for_next() {
        let store = GlobalState::new();
        store.init_global_state(StateSnapshot::new()).unwrap();
        let log = new_log();

        let inner_store = store.clone();
        let inner_log = Arc::clone(&log);
        let registered = Arc::new(Mutex::new(Vec::new()));
        let keep = Arc::clone(&registered);
        let _a = store
            .on_state_change(
                move |_, _| {
                    let mut keep = keep.lock().unwrap();
                    if keep.is_empty() {
                        keep.push(inner_store.on_state_change(recorder(&inner_log, "late"), false)?);
                    }
                    Ok(())
                },
                false,
            )
            .unwrap();

        store.set_state(snap(json!({"message": "1"}))).unwrap();
        assert!(entries(&log).is_empty());

        store.set_state(snap(json!({"message": "2"}))).unwrap();
        assert_eq!(entries(&log), vec!["late:2"]);
    }

    #[test]
    fn test_failing_listeners_are_isolated() {
        let store = GlobalState::new();
        store.init_global_state(StateSnapshot::new()).unwrap();
        let log = new_log();

        let _err = store
            .on_state_change(|_, _| Err(anyhow::anyhow!("render failed")), false)
            .unwrap();
        let _panic = store
            .on_state_change(|_, _| -> anyhow::Result<()> { panic!("listener blew up") }, false)
            .unwrap();
        let _ok = store.on_state_change(recorder(&log, "ok"), false).unwrap();

        store.set_state(snap(json!({"message": "1"}))).unwrap();
        store.set_state(snap(json!({"message": "2"}))).unwrap();

        assert_eq!(entries(&log), vec!["ok:1", "ok:2"]);
    }

    #[test]
    fn test_shutdown_drops_listeners() {
        let store = GlobalState::new();
        store.init_global_state(snap(json!({"user": "A"}))).unwrap();
        let log = new_log();
        let sub = store.on_state_change(recorder(&log, "a"), false).unwrap();

        assert_eq!(store.shutdown(), 1);
        assert!(!store.is_initialized());
        assert!(!sub.unsubscribe());
        assert_eq!(
            store.set_state(snap(json!({"message": "x"}))),
            Err(StateError::NotInitialized)
        );

        // 关闭后可以重新初始化
        store.init_global_state(StateSnapshot::new()).unwrap();
        store.set_state(snap(json!({"message": "x"}))).unwrap();
        assert!(entries(&log).is_empty());
    }
}
