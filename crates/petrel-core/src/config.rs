//! Pipeline tuning knobs.
//!
//! All settings have defaults good enough to run with zero
//! configuration; a host application may deserialize overrides from its
//! settings file.

use std::time::Duration;

use serde::Deserialize;

/// Inbound queue tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Per-drain-cycle time budget in milliseconds. The default of 6 ms
    /// leaves headroom inside a 60 fps frame.
    pub max_frame_time_ms: u64,

    /// Batch size a drain cycle starts from.
    pub initial_batch_size: usize,

    /// Ceiling the batch size grows toward under sustained load.
    pub max_batch_size: usize,

    /// Total queue depth above which the batch is forced to the ceiling
    /// and LOW items are deferred for the cycle.
    pub backpressure_threshold: usize,

    /// When `false`, every item flows through one FIFO lane.
    pub enable_priority: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_frame_time_ms: 6,
            initial_batch_size: 8,
            max_batch_size: 64,
            backpressure_threshold: 256,
            enable_priority: true,
        }
    }
}

impl QueueConfig {
    pub fn max_frame_time(&self) -> Duration {
        Duration::from_millis(self.max_frame_time_ms)
    }
}

/// Idle executor tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IdleConfig {
    /// Work ceiling per idle slot in milliseconds.
    pub max_work_time_per_idle_ms: u64,
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            max_work_time_per_idle_ms: 8,
        }
    }
}

impl IdleConfig {
    pub fn max_work_time(&self) -> Duration {
        Duration::from_millis(self.max_work_time_per_idle_ms)
    }
}

/// Draft autosave tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DraftConfig {
    /// Quiet period before a draft edit is persisted.
    pub debounce_ms: u64,
}

impl Default for DraftConfig {
    fn default() -> Self {
        Self { debounce_ms: 600 }
    }
}

impl DraftConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Aggregate pipeline configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub queue: QueueConfig,
    pub idle: IdleConfig,
    pub draft: DraftConfig,
    /// History page size for backward pagination.
    pub page_size: u32,
}

impl PipelineConfig {
    /// Effective page size; zero falls back to the default of 20.
    pub fn effective_page_size(&self) -> u32 {
        if self.page_size == 0 {
            20
        } else {
            self.page_size
        }
    }
}
