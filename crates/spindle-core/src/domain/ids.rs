//! Protocol identifiers (strongly-typed ULIDs).
//!
//! `Id<T>` はジェネリックな ID 型で、`T` は PhantomData のマーカー型です。
//! WorkerId と TaskId は同じ表現（ULID）を持ちますが、型としては混同できません。
//!
//! On the wire an id is its bare ULID string; `Display` adds a prefix
//! (`worker-`, `task-`) for logs.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
pub trait IdMarker: Send + Sync + 'static {
    /// Display で使うプレフィックス（例: "worker-", "task-"）
    fn prefix() -> &'static str;
}

#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    /// Generate a fresh id from the wall clock plus random bits.
    pub fn generate() -> Self {
        let timestamp_ms = Utc::now().timestamp_millis() as u64;
        Self::from_ulid(Ulid::from_parts(timestamp_ms, rand::random()))
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// Worker のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Worker {}

impl IdMarker for Worker {
    fn prefix() -> &'static str {
        "worker-"
    }
}

/// Task のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Task {}

impl IdMarker for Task {
    fn prefix() -> &'static str {
        "task-"
    }
}

/// Identity assigned to a worker by its coordinator during the handshake.
pub type WorkerId = Id<Worker>;

/// Identifier of one submitted task; echoed back on its result or error.
pub type TaskId = Id<Task>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_display_with_prefix() {
        let ulid = Ulid::new();
        let worker = WorkerId::from_ulid(ulid);
        let task = TaskId::from_ulid(ulid);

        assert_eq!(worker.as_ulid(), task.as_ulid());
        assert_eq!(worker.to_string(), format!("worker-{ulid}"));
        assert_eq!(task.to_string(), format!("task-{ulid}"));
        // let _: WorkerId = task; // <- does not compile
    }

    #[test]
    fn ids_serialize_as_bare_ulid_string() {
        let ulid = Ulid::new();
        let task_id = TaskId::from_ulid(ulid);

        let value = serde_json::to_value(task_id).unwrap();
        assert_eq!(value, serde_json::Value::String(ulid.to_string()));

        let back: TaskId = serde_json::from_value(value).unwrap();
        assert_eq!(back, task_id);
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = WorkerId::generate();
        let b = WorkerId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        use std::mem::size_of;
        assert_eq!(size_of::<WorkerId>(), size_of::<Ulid>());
        assert_eq!(size_of::<TaskId>(), 16);
    }
}
