//! Frame timing and the shared metrics snapshot
//!
//! Everything here is written on the host's render thread or by sampler
//! workers and read by the overlay renderer without locking. Every shared
//! field is a fixed-width atomic accessed with relaxed ordering: readers
//! get best-effort per-field freshness but never a torn value. Cross-field
//! consistency is explicitly not promised.

use std::array;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::time::{Duration, Instant};

use crate::domain::MetricKind;

/// Number of slots in the per-refresh metrics ring.
pub const FRAME_RING_CAPACITY: usize = 200;

/// Metrics refresh interval. Frames accumulate between refreshes and
/// collapse into an fps value once a full interval has passed.
pub const REFRESH_INTERVAL: Duration = Duration::from_millis(500);

/// Derive frames-per-second from a closed refresh window.
///
/// A zero-length window yields 0.0 rather than dividing by zero.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn compute_fps(frames: u32, elapsed_us: u64) -> f32 {
    if elapsed_us == 0 {
        return 0.0;
    }
    (f64::from(frames) * 1_000_000.0 / elapsed_us as f64) as f32
}

/// A closed refresh window, emitted by [`FrameTimer::frame`] once per
/// [`REFRESH_INTERVAL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshWindow {
    /// Frames presented during the window.
    pub frames: u32,
    /// Window length in microseconds.
    pub elapsed_us: u64,
    /// Ring slot to fill, already reduced modulo the ring capacity.
    pub slot: usize,
}

/// Per-process frame counter and refresh-window clock
///
/// Driven once per buffer swap by the runtime. The timestamp is a
/// parameter so tests can run a synthetic clock. The first presented frame
/// arms the clock; no window closes before one full interval has elapsed.
#[derive(Debug, Default)]
pub struct FrameTimer {
    frames: u32,
    last_refresh: Option<Instant>,
    write_index: usize,
}

impl FrameTimer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one presented frame. Returns a window when a refresh is due,
    /// that is when `now` is at least one interval past the previous
    /// refresh.
    #[allow(clippy::cast_possible_truncation)]
    pub fn frame(&mut self, now: Instant) -> Option<RefreshWindow> {
        let last = *self.last_refresh.get_or_insert(now);
        let elapsed = now.duration_since(last);
        let window = if elapsed >= REFRESH_INTERVAL {
            let window = RefreshWindow {
                frames: self.frames,
                elapsed_us: elapsed.as_micros() as u64,
                slot: self.write_index % FRAME_RING_CAPACITY,
            };
            self.write_index = self.write_index.wrapping_add(1);
            self.frames = 0;
            self.last_refresh = Some(now);
            Some(window)
        } else {
            None
        };
        self.frames += 1;
        window
    }

    /// Frames presented since the last refresh (the current frame
    /// included).
    #[must_use]
    pub fn frames_pending(&self) -> u32 {
        self.frames
    }
}

/// One ring entry: a small bounded magnitude per metric kind
///
/// Cells are bytes because the HUD draws coarse bar heights, not exact
/// readings.
#[derive(Debug)]
pub struct FrameStatsSlot {
    cells: [AtomicU8; MetricKind::COUNT],
}

impl FrameStatsSlot {
    fn new() -> Self {
        Self { cells: array::from_fn(|_| AtomicU8::new(0)) }
    }
}

/// Fixed-capacity ring of [`FrameStatsSlot`]s
///
/// Writes zero the slot first, so a wrapped slot never shows values from
/// two cycles ago mixed with the current ones.
#[derive(Debug)]
pub struct FrameStatsRing {
    slots: [FrameStatsSlot; FRAME_RING_CAPACITY],
}

impl FrameStatsRing {
    #[must_use]
    pub fn new() -> Self {
        Self { slots: array::from_fn(|_| FrameStatsSlot::new()) }
    }

    /// Zero `slot`, then store the given cells.
    pub fn write(&self, slot: usize, values: &[(MetricKind, u8)]) {
        let entry = &self.slots[slot % FRAME_RING_CAPACITY];
        for cell in &entry.cells {
            cell.store(0, Ordering::Relaxed);
        }
        for &(kind, value) in values {
            entry.cells[kind.index()].store(value, Ordering::Relaxed);
        }
    }

    /// Copy one slot out, cells ordered by [`MetricKind::index`].
    #[must_use]
    pub fn read(&self, slot: usize) -> [u8; MetricKind::COUNT] {
        let entry = &self.slots[slot % FRAME_RING_CAPACITY];
        array::from_fn(|i| entry.cells[i].load(Ordering::Relaxed))
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        FRAME_RING_CAPACITY
    }
}

impl Default for FrameStatsRing {
    fn default() -> Self {
        Self::new()
    }
}

/// Aggregate CPU load, written by the cpu sampler lane.
#[derive(Debug, Default)]
pub struct CpuSnapshot {
    percent_bits: AtomicU32,
}

impl CpuSnapshot {
    pub fn store(&self, percent: f32) {
        self.percent_bits.store(percent.to_bits(), Ordering::Relaxed);
    }

    #[must_use]
    pub fn percent(&self) -> f32 {
        f32::from_bits(self.percent_bits.load(Ordering::Relaxed))
    }
}

/// GPU busy percentage, written by the gpu sampler lane.
#[derive(Debug, Default)]
pub struct GpuSnapshot {
    load_percent: AtomicU32,
}

impl GpuSnapshot {
    pub fn store(&self, load_percent: u32) {
        self.load_percent.store(load_percent, Ordering::Relaxed);
    }

    #[must_use]
    pub fn load_percent(&self) -> u32 {
        self.load_percent.load(Ordering::Relaxed)
    }
}

/// System memory totals in KiB, written by the memory sampler lane.
#[derive(Debug, Default)]
pub struct MemorySnapshot {
    total_kib: AtomicU64,
    avail_kib: AtomicU64,
}

impl MemorySnapshot {
    pub fn store(&self, total_kib: u64, avail_kib: u64) {
        self.total_kib.store(total_kib, Ordering::Relaxed);
        self.avail_kib.store(avail_kib, Ordering::Relaxed);
    }

    #[must_use]
    pub fn total_kib(&self) -> u64 {
        self.total_kib.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn avail_kib(&self) -> u64 {
        self.avail_kib.load(Ordering::Relaxed)
    }
}

/// Process IO throughput in MB/s, written by the io sampler lane.
#[derive(Debug, Default)]
pub struct IoSnapshot {
    read_bits: AtomicU32,
    write_bits: AtomicU32,
}

impl IoSnapshot {
    pub fn store(&self, read_mbps: f32, write_mbps: f32) {
        self.read_bits.store(read_mbps.to_bits(), Ordering::Relaxed);
        self.write_bits.store(write_mbps.to_bits(), Ordering::Relaxed);
    }

    #[must_use]
    pub fn read_mbps(&self) -> f32 {
        f32::from_bits(self.read_bits.load(Ordering::Relaxed))
    }

    #[must_use]
    pub fn write_mbps(&self) -> f32 {
        f32::from_bits(self.write_bits.load(Ordering::Relaxed))
    }
}

/// Process-wide metrics snapshot
///
/// Singleton by construction (the runtime owns the only instance),
/// continuously mutated, never reset. Sampler lanes each own exactly one
/// sub-snapshot; the render thread owns `fps` and the ring.
#[derive(Debug, Default)]
pub struct SwapchainStats {
    fps_bits: AtomicU32,
    secondary_font_id: AtomicU32,
    ring: FrameStatsRing,
    pub cpu: CpuSnapshot,
    pub gpu: GpuSnapshot,
    pub memory: MemorySnapshot,
    pub io: IoSnapshot,
}

impl SwapchainStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fps(&self, fps: f32) {
        self.fps_bits.store(fps.to_bits(), Ordering::Relaxed);
    }

    #[must_use]
    pub fn fps(&self) -> f32 {
        f32::from_bits(self.fps_bits.load(Ordering::Relaxed))
    }

    /// Secondary (half-size) font of the current overlay, 0 when no
    /// overlay is live.
    pub fn set_secondary_font_id(&self, id: u32) {
        self.secondary_font_id.store(id, Ordering::Relaxed);
    }

    #[must_use]
    pub fn secondary_font_id(&self) -> u32 {
        self.secondary_font_id.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn ring(&self) -> &FrameStatsRing {
        &self.ring
    }

    /// Point-in-time copy of every displayed scalar. This is the read
    /// surface handed to the overlay renderer.
    #[must_use]
    pub fn view(&self) -> StatsView {
        StatsView {
            fps: self.fps(),
            cpu_percent: self.cpu.percent(),
            gpu_load_percent: self.gpu.load_percent(),
            mem_total_kib: self.memory.total_kib(),
            mem_avail_kib: self.memory.avail_kib(),
            io_read_mbps: self.io.read_mbps(),
            io_write_mbps: self.io.write_mbps(),
            secondary_font_id: self.secondary_font_id(),
        }
    }
}

/// Read-only copy of the snapshot scalars
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsView {
    pub fps: f32,
    pub cpu_percent: f32,
    pub gpu_load_percent: u32,
    pub mem_total_kib: u64,
    pub mem_avail_kib: u64,
    pub io_read_mbps: f32,
    pub io_write_mbps: f32,
    pub secondary_font_id: u32,
}

impl StatsView {
    #[must_use]
    pub fn mem_used_kib(&self) -> u64 {
        self.mem_total_kib.saturating_sub(self.mem_avail_kib)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_fps_for_30_frames_over_half_second() {
        assert_eq!(compute_fps(30, 500_000), 60.0);
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_fps_zero_window_is_zero() {
        assert_eq!(compute_fps(0, 0), 0.0);
        assert_eq!(compute_fps(100, 0), 0.0);
    }

    #[test]
    fn test_timer_first_frame_arms_without_window() {
        let mut timer = FrameTimer::new();
        assert!(timer.frame(Instant::now()).is_none());
        assert_eq!(timer.frames_pending(), 1);
    }

    #[test]
    fn test_timer_closes_window_after_interval() {
        let mut timer = FrameTimer::new();
        let epoch = Instant::now();
        assert!(timer.frame(epoch).is_none());
        for _ in 0..29 {
            assert!(timer.frame(epoch + Duration::from_millis(100)).is_none());
        }
        let window = timer.frame(epoch + REFRESH_INTERVAL).expect("window due");
        assert_eq!(window.frames, 30);
        assert_eq!(window.elapsed_us, 500_000);
        assert_eq!(window.slot, 0);
        // The closing frame starts the next window
        assert_eq!(timer.frames_pending(), 1);
    }

    #[test]
    fn test_timer_slots_advance_and_wrap() {
        let mut timer = FrameTimer::new();
        let epoch = Instant::now();
        assert!(timer.frame(epoch).is_none());
        for i in 0..=FRAME_RING_CAPACITY {
            let at = epoch + REFRESH_INTERVAL * (u32::try_from(i).unwrap() + 1);
            let window = timer.frame(at).expect("every step closes a window");
            assert_eq!(window.slot, i % FRAME_RING_CAPACITY);
        }
    }

    #[test]
    fn test_ring_zeroes_slot_before_write() {
        let ring = FrameStatsRing::new();
        ring.write(3, &[(MetricKind::Cpu, 80), (MetricKind::Io, 12)]);
        assert_eq!(ring.read(3), [80, 0, 0, 12]);

        // Overwriting the same slot with fewer kinds must not leave residue
        ring.write(3, &[(MetricKind::Gpu, 55)]);
        assert_eq!(ring.read(3), [0, 55, 0, 0]);
    }

    #[test]
    fn test_ring_wraps_onto_slot_zero() {
        let ring = FrameStatsRing::new();
        for slot in 0..FRAME_RING_CAPACITY {
            ring.write(slot, &[(MetricKind::Cpu, 1)]);
        }
        // Write number capacity+1 lands on slot 0 again
        ring.write(FRAME_RING_CAPACITY, &[(MetricKind::Memory, 42)]);
        assert_eq!(ring.read(0), [0, 0, 42, 0]);
        // Its neighbor still carries the first cycle's value
        assert_eq!(ring.read(1), [1, 0, 0, 0]);
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_view_copies_are_stable() {
        let stats = SwapchainStats::new();
        stats.cpu.store(42.5);
        stats.memory.store(16_000_000, 4_000_000);
        stats.set_fps(60.0);
        stats.set_secondary_font_id(7);

        let view = stats.view();
        assert_eq!(view.cpu_percent, 42.5);
        assert_eq!(view.mem_used_kib(), 12_000_000);
        assert_eq!(view.fps, 60.0);
        assert_eq!(view.secondary_font_id, 7);

        // Later writes do not retroactively change a taken view
        stats.cpu.store(99.0);
        assert_eq!(view.cpu_percent, 42.5);
    }
}
