//! Background sampler lanes
//!
//! One worker thread per metric kind, woken through a bounded(1) kick
//! queue. [`SamplerPool::kick`] never blocks: at most one kick queues
//! behind a running sample, anything beyond that is dropped and counted.
//! The snapshot field a lane writes keeps its previous value until the
//! worker actually finishes, which is what makes stale-but-valid reads
//! safe on the render path.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use crossbeam_channel::{bounded, Sender, TrySendError};
use log::{debug, warn};

use crate::domain::MetricKind;

/// A lane's sampling body. Runs on the worker thread, never on the render
/// thread.
pub type SampleJob = Box<dyn FnMut() + Send + 'static>;

/// Kick/drop totals for one lane since spawn.
#[derive(Debug, Default)]
pub struct LaneCounters {
    kicked: AtomicUsize,
    dropped: AtomicUsize,
}

impl LaneCounters {
    #[must_use]
    pub fn kicked(&self) -> usize {
        self.kicked.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
struct Lane {
    kick_tx: Sender<()>,
    counters: LaneCounters,
}

/// Fixed set of sampler lanes, one per [`MetricKind`]
///
/// Workers are detached; process shutdown does not join outstanding
/// samples.
#[derive(Debug)]
pub struct SamplerPool {
    lanes: [Lane; MetricKind::COUNT],
}

impl SamplerPool {
    /// Spawn one named worker per metric kind. `jobs` supplies each lane's
    /// body.
    #[must_use]
    pub fn spawn(mut jobs: impl FnMut(MetricKind) -> SampleJob) -> Self {
        let lanes = MetricKind::ALL.map(|kind| Self::spawn_lane(kind, jobs(kind)));
        Self { lanes }
    }

    fn spawn_lane(kind: MetricKind, mut job: SampleJob) -> Lane {
        let (kick_tx, kick_rx) = bounded::<()>(1);
        let spawned = thread::Builder::new()
            .name(format!("glhud-{kind}"))
            .spawn(move || {
                while kick_rx.recv().is_ok() {
                    job();
                }
            });
        if let Err(e) = spawned {
            // The lane stays dead; kicks land in the dropped counter.
            warn!("Failed to spawn {kind} sampler thread: {e}");
        }
        Lane { kick_tx, counters: LaneCounters::default() }
    }

    /// Request one sample on `kind`'s lane. Never blocks.
    pub fn kick(&self, kind: MetricKind) {
        let lane = &self.lanes[kind.index()];
        match lane.kick_tx.try_send(()) {
            Ok(()) => {
                lane.counters.kicked.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Full(())) => {
                lane.counters.dropped.fetch_add(1, Ordering::Relaxed);
                debug!("{kind} sampler busy, dropping kick");
            }
            Err(TrySendError::Disconnected(())) => {
                lane.counters.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Counters for one lane.
    #[must_use]
    pub fn counters(&self, kind: MetricKind) -> &LaneCounters {
        &self.lanes[kind.index()].counters
    }
}
