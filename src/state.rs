//! Application state: configuration and the exercise store.
//!
//! This module owns:
//!   - the loaded `AppConfig` (limits, display widths, generation cap)
//!   - the `ExerciseStore` shared by HTTP and WebSocket handlers
//!
//! Issuing an exercise = pick a level, synthesize, store.

use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, instrument};

use crate::config::AppConfig;
use crate::domain::{Exercise, Level};
use crate::factory::{self, GenerateError};
use crate::store::{ExerciseStore, MemoryStore, StoreError};

#[derive(Debug, Error)]
pub enum IssueError {
    #[error(transparent)]
    Generate(#[from] GenerateError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ExerciseStore>,
    pub config: AppConfig,
}

impl AppState {
    /// Build state with an in-memory store sized from `config`.
    #[instrument(level = "info", skip_all)]
    pub fn new(config: AppConfig) -> Self {
        let store = MemoryStore::new(config.store.ttl(), config.store.capacity);
        info!(
            target: "compdrill_backend",
            ttl_secs = config.store.ttl_secs,
            capacity = config.store.capacity,
            max_attempts = config.generation.max_attempts,
            "Exercise store ready"
        );
        Self::with_store(config, Arc::new(store))
    }

    pub fn with_store(config: AppConfig, store: Arc<dyn ExerciseStore>) -> Self {
        Self { store, config }
    }

    /// Generate and persist a new exercise. A missing level is drawn with
    /// the standard weights.
    #[instrument(level = "info", skip(self))]
    pub async fn issue_exercise(&self, level: Option<Level>) -> Result<Arc<Exercise>, IssueError> {
        let level = level.unwrap_or_else(|| factory::pick_level(&mut rand::thread_rng()));
        let exercise = factory::generate(level, self.config.generation.max_attempts).map_err(|e| {
            error!(target: "exercise", %level, error = %e, "Exercise generation failed");
            e
        })?;
        Ok(self.store.put(exercise).await?)
    }

    /// Read-only access to a live exercise by id.
    #[instrument(level = "debug", skip(self), fields(%id))]
    pub async fn get_exercise(&self, id: &str) -> Option<Arc<Exercise>> {
        self.store.get(id).await
    }
}
