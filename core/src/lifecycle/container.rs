//! 挂载点：以文本渲染面代替 DOM 节点

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// 一个可渲染的挂载点。克隆得到的是同一个挂载点的句柄。
#[derive(Clone)]
pub struct MountTarget {
    selector: Arc<str>,
    content: Arc<Mutex<String>>,
}

impl MountTarget {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: Arc::from(selector.into()),
            content: Arc::new(Mutex::new(String::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, String> {
        self.content.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// 整体替换渲染内容
    pub fn render(&self, content: impl Into<String>) {
        *self.lock() = content.into();
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn content(&self) -> String {
        self.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn same_target(&self, other: &MountTarget) -> bool {
        Arc::ptr_eq(&self.content, &other.content)
    }
}

impl fmt::Debug for MountTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountTarget")
            .field("selector", &self.selector)
            .finish_non_exhaustive()
    }
}

/// 主应用当前页面上存在的挂载点
#[derive(Clone, Default)]
pub struct ContainerRegistry {
    targets: Arc<Mutex<HashMap<String, MountTarget>>>,
}

impl ContainerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, MountTarget>> {
        self.targets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 挂上一个挂载点；已存在时返回已有的句柄
    pub fn attach(&self, selector: &str) -> MountTarget {
        self.lock()
            .entry(selector.to_string())
            .or_insert_with(|| MountTarget::new(selector))
            .clone()
    }

    /// 移除挂载点并清空其内容
    pub fn detach(&self, selector: &str) -> Option<MountTarget> {
        let target = self.lock().remove(selector)?;
        target.clear();
        Some(target)
    }

    pub fn get(&self, selector: &str) -> Option<MountTarget> {
        self.lock().get(selector).cloned()
    }

    pub fn contains(&self, selector: &str) -> bool {
        self.lock().contains_key(selector)
    }

    pub fn selectors(&self) -> Vec<String> {
        let mut selectors: Vec<_> = self.lock().keys().cloned().collect();
        selectors.sort();
        selectors
    }
}

impl fmt::Debug for ContainerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerRegistry")
            .field("selectors", &self.selectors())
            .finish()
    }
}
