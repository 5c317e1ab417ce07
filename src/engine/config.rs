//! Store configuration.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default lower bound of rows per parallel task before a chunk is split.
pub const DEFAULT_MIN_PARALLEL_CHUNK_LENGTH: usize = 64;

/// Tunables applied when an [`EntityStore`](crate::EntityStore) is created.
///
/// All fields have working defaults; use the builder-style setters to
/// override individual values.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StoreConfig {
    /// Number of entity slots reserved up front.
    pub initial_entity_capacity: usize,

    /// Whether the event recorder starts enabled.
    pub record_events: bool,

    /// A chunk is processed in parallel only if it holds at least
    /// `task_count * min_parallel_chunk_length` rows.
    pub min_parallel_chunk_length: usize,

    /// Worker threads used by parallel queries in addition to the calling
    /// thread. `None` uses the size of the rayon pool minus one.
    pub worker_count: Option<usize>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            initial_entity_capacity: 1024,
            record_events: false,
            min_parallel_chunk_length: DEFAULT_MIN_PARALLEL_CHUNK_LENGTH,
            worker_count: None,
        }
    }
}

impl StoreConfig {
    /// Sets the number of entity slots reserved up front.
    #[must_use]
    pub fn initial_entity_capacity(mut self, capacity: usize) -> Self {
        self.initial_entity_capacity = capacity;
        self
    }

    /// Starts the store with event recording enabled or disabled.
    #[must_use]
    pub fn record_events(mut self, enabled: bool) -> Self {
        self.record_events = enabled;
        self
    }

    /// Sets the minimum rows per parallel task.
    #[must_use]
    pub fn min_parallel_chunk_length(mut self, length: usize) -> Self {
        self.min_parallel_chunk_length = length.max(1);
        self
    }

    /// Pins the number of extra worker threads used by parallel queries.
    #[must_use]
    pub fn worker_count(mut self, workers: usize) -> Self {
        self.worker_count = Some(workers);
        self
    }

    /// Resolved worker count: the configured value, or the rayon pool size
    /// minus the calling thread.
    pub fn resolved_worker_count(&self) -> usize {
        self.worker_count
            .unwrap_or_else(|| rayon::current_num_threads().saturating_sub(1))
    }
}
