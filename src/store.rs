//! Exercise persistence between "question" and "check" requests.
//!
//! `ExerciseStore` is the seam; `MemoryStore` is the in-process backend:
//! put-once, get-many, entries expire after a TTL and the oldest entries
//! are evicted once capacity is reached.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::Exercise;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
  #[error("exercise id already stored: {0}")]
  Duplicate(String),
}

#[async_trait]
pub trait ExerciseStore: Send + Sync {
  /// Store a new exercise and hand back the shared record. Ids are write-once.
  async fn put(&self, exercise: Exercise) -> Result<Arc<Exercise>, StoreError>;

  /// Look up a live exercise. Expired and unknown ids both yield `None`.
  async fn get(&self, id: &str) -> Option<Arc<Exercise>>;

  async fn len(&self) -> usize;
}

struct Slot {
  exercise: Arc<Exercise>,
  stored_at: Instant,
}

#[derive(Default)]
struct Inner {
  by_id: HashMap<String, Slot>,
  order: VecDeque<String>,
}

pub struct MemoryStore {
  inner: RwLock<Inner>,
  ttl: Duration,
  capacity: usize,
}

impl MemoryStore {
  pub fn new(ttl: Duration, capacity: usize) -> Self {
    Self { inner: RwLock::new(Inner::default()), ttl, capacity: capacity.max(1) }
  }

  fn is_expired(&self, slot: &Slot, now: Instant) -> bool { now.duration_since(slot.stored_at) >= self.ttl }
}

impl Inner {
  /// Drop expired entries from the front of the insertion queue.
  fn prune(&mut self, ttl: Duration, now: Instant) -> usize {
    let mut dropped = 0;
    while !self.order.is_empty() {
      let fresh = self
        .order
        .front()
        .and_then(|id| self.by_id.get(id))
        .is_some_and(|slot| now.duration_since(slot.stored_at) < ttl);
      if fresh {
        break;
      }
      if let Some(id) = self.order.pop_front() {
        self.by_id.remove(&id);
      }
      dropped += 1;
    }
    dropped
  }

  fn evict_oldest(&mut self) -> Option<String> {
    let id = self.order.pop_front()?;
    self.by_id.remove(&id);
    Some(id)
  }
}

#[async_trait]
impl ExerciseStore for MemoryStore {
  async fn put(&self, exercise: Exercise) -> Result<Arc<Exercise>, StoreError> {
    let now = Instant::now();
    let mut inner = self.inner.write().await;
    let expired = inner.prune(self.ttl, now);
    if expired > 0 {
      debug!(target: "exercise", expired, "pruned expired exercises");
    }
    if inner.by_id.contains_key(&exercise.id) {
      return Err(StoreError::Duplicate(exercise.id));
    }
    while inner.by_id.len() >= self.capacity {
      match inner.evict_oldest() {
        Some(id) => debug!(target: "exercise", %id, "evicted oldest exercise"),
        None => break,
      }
    }
    let exercise = Arc::new(exercise);
    inner.order.push_back(exercise.id.clone());
    inner.by_id.insert(exercise.id.clone(), Slot { exercise: exercise.clone(), stored_at: now });
    Ok(exercise)
  }

  async fn get(&self, id: &str) -> Option<Arc<Exercise>> {
    let inner = self.inner.read().await;
    let slot = inner.by_id.get(id)?;
    if self.is_expired(slot, Instant::now()) {
      return None;
    }
    Some(slot.exercise.clone())
  }

  async fn len(&self) -> usize {
    let now = Instant::now();
    let inner = self.inner.read().await;
    inner.by_id.values().filter(|s| !self.is_expired(s, now)).count()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{InputShape, Level};
  use crate::expr::{Bindings, Value};

  fn exercise(id: &str) -> Exercise {
    Exercise {
      id: id.to_string(),
      level: Level::ONE,
      template_level: Level::ONE,
      shape: InputShape::IntSequence,
      prompt: "p".into(),
      code: "[x for x in nums]".into(),
      bindings: Bindings::new(),
      answer: Value::List(Vec::new()),
    }
  }

  #[tokio::test]
  async fn put_once_get_many() {
    let store = MemoryStore::new(Duration::from_secs(60), 10);
    store.put(exercise("a")).await.unwrap();
    assert_eq!(store.get("a").await.map(|e| e.id.clone()), Some("a".to_string()));
    assert!(store.get("a").await.is_some());
    assert_eq!(store.put(exercise("a")).await.unwrap_err(), StoreError::Duplicate("a".into()));
    assert!(store.get("missing").await.is_none());
    assert_eq!(store.len().await, 1);
  }

  #[tokio::test]
  async fn oldest_entries_are_evicted_at_capacity() {
    let store = MemoryStore::new(Duration::from_secs(60), 2);
    for id in ["a", "b", "c"] {
      store.put(exercise(id)).await.unwrap();
    }
    assert!(store.get("a").await.is_none());
    assert!(store.get("b").await.is_some());
    assert!(store.get("c").await.is_some());
    assert_eq!(store.len().await, 2);
  }

  #[tokio::test]
  async fn expired_entries_read_as_unknown() {
    let store = MemoryStore::new(Duration::from_millis(20), 10);
    store.put(exercise("a")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert!(store.get("a").await.is_none());
    assert_eq!(store.len().await, 0);
    store.put(exercise("b")).await.unwrap();
    assert!(store.get("b").await.is_some());
  }
}
