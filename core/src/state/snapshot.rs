//! 全局状态快照
//!
//! 快照一经发布即不可变：每次更新都基于上一份快照浅合并出一份新快照，
//! 监听器持有的旧引用始终看到旧值。

use crate::error::StateError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// 不可变的键值快照（保持插入顺序）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateSnapshot(Arc<Map<String, Value>>);

impl StateSnapshot {
    /// 空快照
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 JSON 对象构造
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(Arc::new(map))
    }

    /// 从任意 JSON 值构造，非对象返回错误
    pub fn from_value(value: Value) -> Result<Self, StateError> {
        match value {
            Value::Object(map) => Ok(Self::from_map(map)),
            Value::Null => Err(StateError::NotAnObject("null")),
            Value::Bool(_) => Err(StateError::NotAnObject("boolean")),
            Value::Number(_) => Err(StateError::NotAnObject("number")),
            Value::String(_) => Err(StateError::NotAnObject("string")),
            Value::Array(_) => Err(StateError::NotAnObject("array")),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// 读取字符串字段
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// 浅合并：`partial` 的顶层键覆盖当前键，嵌套对象整体替换，不做深合并。
    ///
    /// 已存在的键保留原有位置，新键追加在末尾。
    pub fn merge(&self, partial: &StateSnapshot) -> StateSnapshot {
        if partial.is_empty() {
            return self.clone();
        }
        let mut next = (*self.0).clone();
        for (key, value) in partial.0.iter() {
            next.insert(key.clone(), value.clone());
        }
        Self::from_map(next)
    }

    /// 只保留满足条件的顶层键，返回 (保留后的快照, 被丢弃的键)
    pub fn partition_keys<F>(&self, keep: F) -> (StateSnapshot, Vec<String>)
    where
        F: Fn(&str) -> bool,
    {
        let mut kept = Map::new();
        let mut dropped = Vec::new();
        for (key, value) in self.0.iter() {
            if keep(key) {
                kept.insert(key.clone(), value.clone());
            } else {
                dropped.push(key.clone());
            }
        }
        (Self::from_map(kept), dropped)
    }

    /// 两个句柄是否指向同一份快照
    pub fn ptr_eq(&self, other: &StateSnapshot) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// 序列化为格式化 JSON
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&*self.0)
    }

    pub fn to_value(&self) -> Value {
        Value::Object((*self.0).clone())
    }
}

impl TryFrom<Value> for StateSnapshot {
    type Error = StateError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

impl From<Map<String, Value>> for StateSnapshot {
    fn from(map: Map<String, Value>) -> Self {
        Self::from_map(map)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for StateSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self::from_map(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}
