//! Runtime tests with a synthetic clock and injected sampler lanes.
//!
//! Nothing here touches a GL driver: overlay states come from a test
//! factory and frames are presented at hand-picked instants, so the
//! refresh arithmetic is exact instead of wall-clock dependent.

use std::array;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, OnceLock};
use std::time::{Duration, Instant};

use glhud::config::{MetricSet, OverlayParams};
use glhud::domain::{ContextKey, MetricKind, Viewport};
use glhud::overlay::{FontPair, HudFrame, HudRenderer};
use glhud::registry::OverlayState;
use glhud::runtime::OverlayRuntime;
use glhud::sampler::{SampleJob, SamplerPool};
use glhud::stats::{SwapchainStats, REFRESH_INTERVAL};

/// Renderer that only counts its draw calls.
struct RecordingHud {
    draws: Arc<AtomicUsize>,
}

impl HudRenderer for RecordingHud {
    fn draw(&mut self, _frame: &HudFrame<'_>) {
        self.draws.fetch_add(1, Ordering::Relaxed);
    }
}

fn recording_state(draws: &Arc<AtomicUsize>) -> OverlayState {
    OverlayState::new(
        FontPair::load(24.0),
        Viewport::default(),
        Box::new(RecordingHud { draws: Arc::clone(draws) }),
    )
}

/// Lanes whose jobs only count their executions.
fn counting_pool() -> (SamplerPool, Arc<[AtomicUsize; MetricKind::COUNT]>) {
    let runs: Arc<[AtomicUsize; MetricKind::COUNT]> =
        Arc::new(array::from_fn(|_| AtomicUsize::new(0)));
    let pool = SamplerPool::spawn(|kind| {
        let runs = Arc::clone(&runs);
        Box::new(move || {
            runs[kind.index()].fetch_add(1, Ordering::Relaxed);
        }) as SampleJob
    });
    (pool, runs)
}

fn test_runtime(
    metrics: MetricSet,
) -> (OverlayRuntime, Arc<SwapchainStats>, Arc<[AtomicUsize; MetricKind::COUNT]>) {
    let params = OverlayParams { metrics, ..OverlayParams::default() };
    let stats = Arc::new(SwapchainStats::new());
    let (pool, runs) = counting_pool();
    let runtime = OverlayRuntime::new(params, Arc::clone(&stats), pool, Arc::new(OnceLock::new()));
    (runtime, stats, runs)
}

fn wait_for(counter: &AtomicUsize, target: usize) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while counter.load(Ordering::Relaxed) < target {
        assert!(Instant::now() < deadline, "Timed out waiting for {target} sampler runs");
        std::thread::yield_now();
    }
}

#[test]
fn test_context_states_are_created_once_and_die_together() {
    let (runtime, _stats, _runs) = test_runtime(MetricSet::all());
    let draws = Arc::new(AtomicUsize::new(0));
    let built = Arc::new(AtomicUsize::new(0));

    let key_a = ContextKey(0x1000);
    let key_b = ContextKey(0x2000);

    // Re-activating a known key must not rebuild its state
    for _ in 0..3 {
        let built = Arc::clone(&built);
        let draws = Arc::clone(&draws);
        runtime.activate_context_with(key_a, move || {
            built.fetch_add(1, Ordering::Relaxed);
            recording_state(&draws)
        });
    }
    assert_eq!(built.load(Ordering::Relaxed), 1, "Known key must not rebuild");
    assert_eq!(runtime.context_count(), 1);
    assert_eq!(runtime.current_context(), Some(key_a));
    assert_ne!(runtime.stats().secondary_font_id(), 0, "Active overlay publishes its font");

    {
        let built = Arc::clone(&built);
        let draws = Arc::clone(&draws);
        runtime.activate_context_with(key_b, move || {
            built.fetch_add(1, Ordering::Relaxed);
            recording_state(&draws)
        });
    }
    assert_eq!(built.load(Ordering::Relaxed), 2, "A second key builds a second state");
    assert_eq!(runtime.context_count(), 2);
    assert_eq!(runtime.current_context(), Some(key_b));

    // Null make-current: the host detached, every overlay dies
    runtime.context_activated(std::ptr::null_mut());
    assert_eq!(runtime.context_count(), 0);
    assert_eq!(runtime.current_context(), None);
    assert_eq!(runtime.stats().secondary_font_id(), 0);
}

#[test]
#[allow(clippy::float_cmp)]
fn test_three_refresh_windows_of_sixty_frames_each() {
    // GPU disabled: its lane must never launch anything
    let (runtime, stats, runs) = test_runtime(MetricSet::all().without(MetricKind::Gpu));
    let draws = Arc::new(AtomicUsize::new(0));
    {
        let draws = Arc::clone(&draws);
        runtime.activate_context_with(ContextKey(0xabc), move || recording_state(&draws));
    }

    let epoch = Instant::now();
    // First presented frame arms the refresh clock
    runtime.frame_presented_at(epoch);

    for window in 0..3u32 {
        let start = epoch + REFRESH_INTERVAL * window;
        for _ in 0..59 {
            runtime.frame_presented_at(start + Duration::from_millis(1));
        }
        // Frame 60 lands exactly one interval after the window opened
        runtime.frame_presented_at(start + REFRESH_INTERVAL);
        assert_eq!(stats.fps(), 120.0, "60 frames over 500ms is exactly 120 fps");

        // Drain the lanes so the next kick cannot collide with a running job
        for kind in [MetricKind::Cpu, MetricKind::Memory, MetricKind::Io] {
            wait_for(&runs[kind.index()], window as usize + 1);
        }
    }

    for kind in [MetricKind::Cpu, MetricKind::Memory, MetricKind::Io] {
        assert_eq!(runtime.samplers().counters(kind).kicked(), 3, "{kind} kicks once per window");
        assert_eq!(runtime.samplers().counters(kind).dropped(), 0);
        assert_eq!(runs[kind.index()].load(Ordering::Relaxed), 3);
    }
    assert_eq!(runtime.samplers().counters(MetricKind::Gpu).kicked(), 0);
    assert_eq!(runs[MetricKind::Gpu.index()].load(Ordering::Relaxed), 0);

    // One arming frame plus three windows of sixty, each drawing the HUD
    assert_eq!(draws.load(Ordering::Relaxed), 1 + 3 * 60);
}

#[test]
fn test_presentation_never_waits_for_a_stuck_sampler() {
    let (gate_tx, gate_rx) = mpsc::channel::<()>();
    let (started_tx, started_rx) = mpsc::channel::<()>();
    let mut blocking_parts = Some((started_tx, gate_rx));

    // The cpu lane parks on a gate we never open; the rest are no-ops
    let pool = SamplerPool::spawn(|kind| match kind {
        MetricKind::Cpu => {
            let (started_tx, gate_rx) = blocking_parts.take().expect("one cpu lane");
            Box::new(move || {
                started_tx.send(()).ok();
                gate_rx.recv().ok();
            }) as SampleJob
        }
        _ => Box::new(|| {}) as SampleJob,
    });
    let params = OverlayParams {
        metrics: MetricSet::all().without(MetricKind::Gpu),
        ..OverlayParams::default()
    };
    let stats = Arc::new(SwapchainStats::new());
    let runtime = OverlayRuntime::new(params, stats, pool, Arc::new(OnceLock::new()));

    let epoch = Instant::now();
    let begin = Instant::now();
    runtime.frame_presented_at(epoch);
    for window in 0..3u32 {
        runtime.frame_presented_at(epoch + REFRESH_INTERVAL * (window + 1));
    }
    let spent = begin.elapsed();

    started_rx.recv_timeout(Duration::from_secs(5)).expect("cpu job must have started");
    assert!(spent < Duration::from_millis(200), "Presenting 4 frames took {spent:?}");

    // Three refreshes happened against a lane that never finishes: one kick
    // was consumed, at most one more buffered, the rest shed
    let counters = runtime.samplers().counters(MetricKind::Cpu);
    assert_eq!(counters.kicked() + counters.dropped(), 3);
    assert!(counters.dropped() >= 1, "A stuck lane sheds kicks instead of queueing them");

    drop(gate_tx);
}

#[test]
#[allow(clippy::float_cmp)]
fn test_stale_cpu_value_stays_readable_while_sampling() {
    let (gate_tx, gate_rx) = mpsc::channel::<()>();
    let (started_tx, started_rx) = mpsc::channel::<()>();
    let mut blocking_parts = Some((started_tx, gate_rx));
    let stats = Arc::new(SwapchainStats::new());
    stats.cpu.store(42.0); // the last completed sample

    let pool = {
        let stats = Arc::clone(&stats);
        SamplerPool::spawn(move |kind| match kind {
            MetricKind::Cpu => {
                let (started_tx, gate_rx) = blocking_parts.take().expect("one cpu lane");
                let stats = Arc::clone(&stats);
                Box::new(move || {
                    started_tx.send(()).ok();
                    gate_rx.recv().ok();
                    stats.cpu.store(7.0);
                }) as SampleJob
            }
            _ => Box::new(|| {}) as SampleJob,
        })
    };
    let runtime = OverlayRuntime::new(
        OverlayParams::default(),
        Arc::clone(&stats),
        pool,
        Arc::new(OnceLock::new()),
    );

    let epoch = Instant::now();
    runtime.frame_presented_at(epoch);
    runtime.frame_presented_at(epoch + REFRESH_INTERVAL);

    started_rx.recv_timeout(Duration::from_secs(5)).expect("cpu sample must start");
    // Sample is mid-flight: readers still get the previous value
    assert_eq!(runtime.stats().view().cpu_percent, 42.0);

    gate_tx.send(()).expect("lane is parked on the gate");
    let deadline = Instant::now() + Duration::from_secs(5);
    while runtime.stats().view().cpu_percent != 7.0 {
        assert!(Instant::now() < deadline, "Released sample must land in the snapshot");
        std::thread::yield_now();
    }
}
