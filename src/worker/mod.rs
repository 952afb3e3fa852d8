//! Worker thread implementation
//!
//! This module implements the Worker, the execution unit that drives a
//! scripted sequence of metadata operations against a [`MetadataClient`].
//! Each worker runs in its own thread, owns its client and its
//! [`LatencyRecorder`], and times every client call.
//!
//! # Architecture
//!
//! The Worker orchestrates:
//! - **MetadataClient**: performs the operations
//! - **Distribution**: picks keys for stat phases
//! - **Throttle**: paces the worker before each operation
//! - **LatencyRecorder**: records (kind, elapsed, success) for every call
//!
//! # Example
//!
//! ```
//! use mdpulse::client::mock::MockClient;
//! use mdpulse::config::WorkloadConfig;
//! use mdpulse::distribution::{AccessPattern, SamplerFactory};
//! use mdpulse::stats::{GlobalStats, recorder::{CollectingSink, LatencyRecorder}};
//! use mdpulse::util::throttle::Throttle;
//! use mdpulse::worker::Worker;
//! use std::sync::Arc;
//!
//! let workload = WorkloadConfig { count: 10, stat_count: 20, ..Default::default() };
//! let stats = Arc::new(GlobalStats::new(1, 1000));
//! let recorder = LatencyRecorder::register(stats, Arc::new(CollectingSink::new()))?;
//! let sampler = SamplerFactory::new(AccessPattern::Uniform, workload.key_universe(), Some(1))?;
//!
//! let worker = Worker::new(
//!     MockClient::new(),
//!     recorder,
//!     sampler.for_worker(0),
//!     Throttle::disabled(),
//!     workload,
//! );
//! let summary = worker.run()?;
//! assert_eq!(summary.operations, 1 + 10 * 3 + 20);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod layout;

use crate::client::{Errno, MetadataClient, OpResult, OperationKind};
use crate::config::workload::WorkloadScript;
use crate::config::WorkloadConfig;
use crate::distribution::Distribution;
use crate::stats::aggregator::TailLatencyReport;
use crate::stats::recorder::LatencyRecorder;
use crate::util::throttle::Throttle;
use crate::util::time::Timestamp;
use crate::Result;
use anyhow::Context;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// How `mkdir_recursive` treats failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MkdirPolicy {
    /// Abort the run on failure
    pub force: bool,
    /// With `force`, EEXIST does not abort
    pub tolerate_exists: bool,
}

impl MkdirPolicy {
    /// Record failures and keep going
    pub const BEST_EFFORT: MkdirPolicy = MkdirPolicy { force: false, tolerate_exists: false };
    /// Abort on anything but EEXIST
    pub const ENSURE: MkdirPolicy = MkdirPolicy { force: true, tolerate_exists: true };
    /// Abort on any failure
    pub const STRICT: MkdirPolicy = MkdirPolicy { force: true, tolerate_exists: false };
}

/// Outcome of one worker's run
#[derive(Debug, Clone)]
pub struct WorkerSummary {
    pub worker_id: usize,
    /// Timed operations issued
    pub operations: u64,
    /// Timed operations that failed
    pub failures: u64,
    /// Wall-clock time of the script
    pub elapsed: Duration,
    /// Set only on the worker that finished last
    pub tail: Option<TailLatencyReport>,
}

/// Worker thread that executes one workload script
///
/// # Lifecycle
///
/// 1. **Creation**: the coordinator registers a recorder and hands it over
///    together with a client, a key sampler and a throttle
/// 2. **Execution**: `run()` performs the configured script
/// 3. **Completion**: the recorder is finished (even when the script
///    aborted), so the last worker out produces the tail report
pub struct Worker<C: MetadataClient> {
    id: usize,
    client: C,
    recorder: LatencyRecorder,
    distribution: Box<dyn Distribution>,
    throttle: Throttle,
    workload: WorkloadConfig,
    operations: u64,
    failures: u64,
}

impl<C: MetadataClient> Worker<C> {
    pub fn new(
        client: C,
        recorder: LatencyRecorder,
        distribution: Box<dyn Distribution>,
        throttle: Throttle,
        workload: WorkloadConfig,
    ) -> Self {
        Self {
            id: recorder.worker_id(),
            client,
            recorder,
            distribution,
            throttle,
            workload,
            operations: 0,
            failures: 0,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Namespace directory this worker works under
    pub fn namespace(&self) -> String {
        layout::namespace(&self.workload.base_name, self.id)
    }

    /// Run the configured script and leave the run
    pub fn run(mut self) -> Result<WorkerSummary> {
        let start = Instant::now();
        let outcome = self.execute();
        let elapsed = start.elapsed();

        let Worker { id, recorder, operations, failures, .. } = self;
        let tail = recorder.finish();
        outcome.with_context(|| format!("worker {} aborted", id))?;

        info!(worker = id, operations, failures, elapsed_ms = elapsed.as_millis() as u64, "worker finished");
        Ok(WorkerSummary {
            worker_id: id,
            operations,
            failures,
            elapsed,
            tail,
        })
    }

    fn execute(&mut self) -> Result<()> {
        debug!(worker = self.id, script = %self.workload.script, "worker starting");
        match self.workload.script {
            WorkloadScript::NestedCreateStat => self.nested_create_stat(),
            WorkloadScript::Lifecycle => self.lifecycle(),
            WorkloadScript::PrivateMkdir => self.private_mkdir(),
            WorkloadScript::SkewedStat => self.skewed_stat(),
        }
    }

    /// Nested mkdir + create per file, then stats drawn by the access pattern
    fn nested_create_stat(&mut self) -> Result<()> {
        let ns = self.namespace();
        let (count, depth) = (self.workload.count, self.workload.depth);

        self.ensure_dir(&ns, MkdirPolicy::ENSURE)?;
        for i in 0..count {
            let dir = layout::nested_dir(&ns, i, depth);
            self.mkdir_below(&ns, &dir, MkdirPolicy::ENSURE)?;
            let _ = self.create(&layout::nested_file(&ns, i, depth));
        }

        for _ in 0..self.workload.stat_count {
            let key = self.distribution.next_key();
            let _ = self.stat(&layout::nested_file(&ns, key - 1, depth));
        }
        Ok(())
    }

    /// Directories, files, unlinks, then bottom-up rmdirs
    fn lifecycle(&mut self) -> Result<()> {
        let ns = self.namespace();
        let (count, depth) = (self.workload.count, self.workload.depth);

        self.ensure_dir(&ns, MkdirPolicy::BEST_EFFORT)?;
        for i in 0..count {
            let dir = layout::nested_dir(&ns, i, depth);
            self.mkdir_below(&ns, &dir, MkdirPolicy::BEST_EFFORT)?;
        }
        for i in 0..count {
            let _ = self.create(&layout::nested_file(&ns, i, depth));
        }
        for i in 0..count {
            let _ = self.unlink(&layout::nested_file(&ns, i, depth));
        }
        for i in 0..count {
            let dir = layout::nested_dir(&ns, i, depth);
            for prefix in dir_prefixes(&dir, ns.len()).into_iter().rev() {
                let _ = self.rmdir(prefix);
            }
        }
        let _ = self.rmdir(&ns);
        Ok(())
    }

    /// Private sibling directories; any failure aborts
    fn private_mkdir(&mut self) -> Result<()> {
        let ns = self.namespace();
        self.ensure_dir(&ns, MkdirPolicy::STRICT)?;
        for i in 0..self.workload.count {
            self.ensure_dir(&layout::private_dir(&ns, i), MkdirPolicy::STRICT)?;
        }
        Ok(())
    }

    /// Populate deep key paths, then stat keys drawn from the distribution
    fn skewed_stat(&mut self) -> Result<()> {
        let ns = self.namespace();
        let depth = self.workload.depth;

        self.ensure_dir(&ns, MkdirPolicy::ENSURE)?;
        for key in 1..=self.workload.universe {
            self.mkdir_below(&ns, &layout::key_path(&ns, key, depth), MkdirPolicy::ENSURE)?;
        }
        debug!(worker = self.id, keys = self.workload.universe, "key paths populated");

        for _ in 0..self.workload.count {
            let key = self.distribution.next_key();
            let _ = self.stat(&layout::key_path(&ns, key, depth));
        }
        Ok(())
    }

    /// Create every directory along `path`, root to leaf
    ///
    /// Issues MakeDir for each prefix ending at a '/' (the root excluded) and
    /// for `path` itself unless it ends in '/'.
    pub fn mkdir_recursive(&mut self, path: &str, policy: MkdirPolicy) -> Result<()> {
        self.mkdir_below("", path, policy)
    }

    /// `mkdir_recursive` restricted to the prefixes longer than `base`
    fn mkdir_below(&mut self, base: &str, path: &str, policy: MkdirPolicy) -> Result<()> {
        for prefix in dir_prefixes(path, base.len()) {
            self.ensure_dir(prefix, policy)?;
        }
        Ok(())
    }

    fn ensure_dir(&mut self, path: &str, policy: MkdirPolicy) -> Result<()> {
        match self.mkdir(path) {
            Ok(()) => Ok(()),
            Err(errno) if !policy.force => {
                debug!(worker = self.id, path, %errno, "mkdir failed, continuing");
                Ok(())
            }
            Err(Errno::EEXIST) if policy.tolerate_exists => Ok(()),
            Err(errno) => Err(errno).with_context(|| format!("mkdir {}", path)),
        }
    }

    fn mkdir(&mut self, path: &str) -> OpResult<()> {
        let mode = self.workload.mode;
        self.timed(OperationKind::MakeDir, path, |c| c.mkdir(path, mode))
    }

    fn rmdir(&mut self, path: &str) -> OpResult<()> {
        self.timed(OperationKind::RemoveDir, path, |c| c.rmdir(path))
    }

    /// Create + close, timed as one Create
    fn create(&mut self, path: &str) -> OpResult<()> {
        let mode = self.workload.mode;
        self.timed(OperationKind::Create, path, |c| {
            let handle = c.create(path, mode)?;
            c.close(handle)
        })
    }

    fn unlink(&mut self, path: &str) -> OpResult<()> {
        self.timed(OperationKind::Unlink, path, |c| c.unlink(path))
    }

    fn stat(&mut self, path: &str) -> OpResult<()> {
        self.timed(OperationKind::Stat, path, |c| c.getattr(path).map(|_| ()))
    }

    /// Pace, then run one client call under the timer and record it
    fn timed<T>(
        &mut self,
        kind: OperationKind,
        path: &str,
        op: impl FnOnce(&mut C) -> OpResult<T>,
    ) -> OpResult<T> {
        self.throttle.pace();
        let start = Timestamp::now();
        let result = op(&mut self.client);
        let elapsed = start.elapsed();

        self.operations += 1;
        if let Err(errno) = result.as_ref() {
            self.failures += 1;
            debug!(worker = self.id, op = %kind, path, %errno, "operation failed");
        }
        self.recorder.record_op(kind, elapsed, result.is_ok());
        result
    }
}

/// Directory prefixes of `path` longer than `skip` bytes, root to leaf
///
/// Each prefix ending at a '/' counts (the root excluded), plus `path` itself
/// when it does not end in '/'.
fn dir_prefixes(path: &str, skip: usize) -> Vec<&str> {
    let mut prefixes: Vec<&str> = path
        .match_indices('/')
        .map(|(i, _)| &path[..i])
        .filter(|p| !p.is_empty() && p.len() > skip)
        .collect();
    if !path.ends_with('/') && path.len() > skip {
        prefixes.push(path);
    }
    prefixes
}
