//! Workload configuration types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scripted operation sequence a worker runs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadScript {
    /// Nested mkdir + create per file, then a stat phase over the files
    NestedCreateStat,
    /// mkdir, create, unlink and rmdir over the same tree
    Lifecycle,
    /// Sibling directories in a private namespace; any failure aborts
    PrivateMkdir,
    /// Deep key paths, then stats drawn from a skewed distribution
    SkewedStat,
}

impl Default for WorkloadScript {
    fn default() -> Self {
        WorkloadScript::NestedCreateStat
    }
}

/// Throttle wait mode
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ThrottleMode {
    Sleep,
    Spin,
}

impl Default for ThrottleMode {
    fn default() -> Self {
        ThrottleMode::Sleep
    }
}

/// Pacing delay applied before each scripted operation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ThrottleConfig {
    /// Delay in microseconds (0 disables throttling)
    pub delay_us: u64,
    /// Mode (sleep or spin)
    #[serde(default)]
    pub mode: ThrottleMode,
}

/// Metadata client the workers drive
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// Directory on the local filesystem
    Local,
    /// Remote handler over POSIX message queues
    Remote,
    /// In-memory namespace (dry runs and tests)
    Memory,
}

impl Default for BackendType {
    fn default() -> Self {
        BackendType::Local
    }
}

impl fmt::Display for WorkloadScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkloadScript::NestedCreateStat => write!(f, "nested_create_stat"),
            WorkloadScript::Lifecycle => write!(f, "lifecycle"),
            WorkloadScript::PrivateMkdir => write!(f, "private_mkdir"),
            WorkloadScript::SkewedStat => write!(f, "skewed_stat"),
        }
    }
}

impl fmt::Display for ThrottleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThrottleMode::Sleep => write!(f, "sleep"),
            ThrottleMode::Spin => write!(f, "spin"),
        }
    }
}

impl fmt::Display for ThrottleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}us {}", self.delay_us, self.mode)
    }
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendType::Local => write!(f, "local"),
            BackendType::Remote => write!(f, "remote"),
            BackendType::Memory => write!(f, "memory"),
        }
    }
}
