//! Process-lifetime runtime wiring
//!
//! One [`OverlayRuntime`] owns everything mutable: overlay params, the
//! shared snapshot, the context registry, the frame timer and the sampler
//! lanes. The exported entry points reach it through
//! [`OverlayRuntime::get`], which assembles the production wiring on
//! first use; tests assemble their own with [`OverlayRuntime::new`] and
//! drive the clock by hand.
//!
//! Writer rules: registry and timer belong to the host's render thread
//! (the mutexes around them are uncontended in practice and exist so the
//! runtime stays `Sync`); snapshot scalars are written by sampler lanes
//! and read anywhere without locks.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Instant;

use libc::c_void;
use log::{debug, info, warn};

use crate::config::OverlayParams;
use crate::domain::{ContextKey, GpuVendor, MetricKind};
use crate::driver::DriverHandle;
use crate::overlay::{FontPair, TextHud};
use crate::registry::{ContextRegistry, OverlayState};
use crate::sampler::{SampleJob, SamplerPool};
use crate::sources::cpu::CpuSource;
use crate::sources::io::IoSource;
use crate::sources::{gpu, memory};
use crate::stats::{compute_fps, FrameTimer, RefreshWindow, SwapchainStats};

pub struct OverlayRuntime {
    params: OverlayParams,
    stats: Arc<SwapchainStats>,
    registry: Mutex<ContextRegistry>,
    timer: Mutex<FrameTimer>,
    samplers: SamplerPool,
    gpu_vendor: Arc<OnceLock<GpuVendor>>,
}

static RUNTIME: OnceLock<OverlayRuntime> = OnceLock::new();

impl OverlayRuntime {
    /// The process-wide runtime, assembled on first use.
    pub fn get() -> &'static OverlayRuntime {
        RUNTIME.get_or_init(|| {
            crate::init_logging();
            let params = OverlayParams::from_env();
            let stats = Arc::new(SwapchainStats::new());
            let gpu_vendor = Arc::new(OnceLock::new());
            let samplers = production_lanes(&stats, &gpu_vendor);
            info!("glhud {} attached", env!("CARGO_PKG_VERSION"));
            Self::new(params, stats, samplers, gpu_vendor)
        })
    }

    /// Assemble a runtime from parts. Production wiring lives in
    /// [`OverlayRuntime::get`]; tests pass their own lanes and snapshot.
    #[must_use]
    pub fn new(
        params: OverlayParams,
        stats: Arc<SwapchainStats>,
        samplers: SamplerPool,
        gpu_vendor: Arc<OnceLock<GpuVendor>>,
    ) -> Self {
        Self {
            params,
            stats,
            registry: Mutex::new(ContextRegistry::new()),
            timer: Mutex::new(FrameTimer::new()),
            samplers,
            gpu_vendor,
        }
    }

    #[must_use]
    pub fn params(&self) -> &OverlayParams {
        &self.params
    }

    /// Snapshot shared with the sampler lanes.
    #[must_use]
    pub fn stats(&self) -> &SwapchainStats {
        &self.stats
    }

    #[must_use]
    pub fn samplers(&self) -> &SamplerPool {
        &self.samplers
    }

    #[must_use]
    pub fn context_count(&self) -> usize {
        self.lock_registry().len()
    }

    #[must_use]
    pub fn current_context(&self) -> Option<ContextKey> {
        self.lock_registry().current()
    }

    /// Bookkeeping after the real context creation returned.
    pub fn context_created(&self, context: *mut c_void) {
        if context.is_null() {
            warn!("Driver returned a null context");
            return;
        }
        debug!("{} created", ContextKey::from_ptr(context));
    }

    /// Bookkeeping after a successful make-current. Null means the host
    /// detached: every overlay state dies.
    pub fn context_activated(&self, context: *mut c_void) {
        if context.is_null() {
            let mut registry = self.lock_registry();
            registry.shutdown_all();
            self.stats.set_secondary_font_id(0);
            return;
        }
        let key = ContextKey::from_ptr(context);
        let mut registry = self.lock_registry();
        registry.activate(key, || self.build_overlay_state());
        self.refresh_secondary_font(&mut registry);
    }

    /// Activation with an injected state factory, bypassing the driver
    /// queries of the production path.
    pub fn activate_context_with(
        &self,
        key: ContextKey,
        make: impl FnOnce() -> OverlayState,
    ) {
        let mut registry = self.lock_registry();
        registry.activate(key, make);
        self.refresh_secondary_font(&mut registry);
    }

    /// Per-swap hook: frame accounting, the periodic metrics refresh, and
    /// the HUD draw for the current context.
    pub fn frame_presented(&self) {
        self.frame_presented_at(Instant::now());
    }

    /// Clock-injected variant of [`OverlayRuntime::frame_presented`].
    pub fn frame_presented_at(&self, now: Instant) {
        let window = self.lock_timer().frame(now);
        if let Some(window) = window {
            self.refresh(window);
        }
        let view = self.stats.view();
        let mut registry = self.lock_registry();
        if let Some(state) = registry.current_state_mut() {
            state.draw(&view, self.stats.ring(), &self.params);
        }
    }

    fn refresh(&self, window: RefreshWindow) {
        let fps = compute_fps(window.frames, window.elapsed_us);
        self.stats.set_fps(fps);
        self.write_ring_slot(window.slot);

        self.samplers.kick(MetricKind::Cpu);
        self.samplers.kick(MetricKind::Memory);
        self.samplers.kick(MetricKind::Io);
        // GPU sampling is display-gated and needs a known vendor to pick
        // its counter.
        if self.params.metrics.contains(MetricKind::Gpu) && self.gpu_vendor.get().is_some() {
            self.samplers.kick(MetricKind::Gpu);
        }
        debug!("refresh: {} frames / {}us -> {fps:.1} fps", window.frames, window.elapsed_us);
    }

    /// Zero the slot, then fill every enabled kind with its current
    /// magnitude.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn write_ring_slot(&self, slot: usize) {
        let view = self.stats.view();
        let mut values: Vec<(MetricKind, u8)> = Vec::with_capacity(MetricKind::COUNT);
        for kind in MetricKind::ALL {
            if !self.params.metrics.contains(kind) {
                continue;
            }
            let magnitude = match kind {
                MetricKind::Cpu => view.cpu_percent.clamp(0.0, 100.0) as u8,
                MetricKind::Gpu => view.gpu_load_percent.min(100) as u8,
                MetricKind::Memory => {
                    if view.mem_total_kib == 0 {
                        0
                    } else {
                        (view.mem_used_kib() * 100 / view.mem_total_kib).min(100) as u8
                    }
                }
                MetricKind::Io => {
                    (view.io_read_mbps + view.io_write_mbps).clamp(0.0, 255.0) as u8
                }
            };
            values.push((kind, magnitude));
        }
        self.stats.ring().write(slot, &values);
    }

    /// Production state factory: queries the driver for the viewport and
    /// vendor, then loads the font pair.
    fn build_overlay_state(&self) -> OverlayState {
        let driver = DriverHandle::get();
        let viewport = driver.viewport();
        if let Some(vendor) = driver.gpu_vendor() {
            let _ = self.gpu_vendor.set(vendor);
        }
        let fonts = FontPair::load(self.params.font_size);
        debug!(
            "Overlay up: {}x{} viewport, {}px font",
            viewport.width, viewport.height, self.params.font_size
        );
        OverlayState::new(fonts, viewport, Box::new(TextHud::new()))
    }

    fn refresh_secondary_font(&self, registry: &mut ContextRegistry) {
        let id = registry.current_state_mut().map_or(0, |state| state.fonts.secondary.id);
        self.stats.set_secondary_font_id(id);
    }

    fn lock_registry(&self) -> MutexGuard<'_, ContextRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_timer(&self) -> MutexGuard<'_, FrameTimer> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn production_lanes(
    stats: &Arc<SwapchainStats>,
    gpu_vendor: &Arc<OnceLock<GpuVendor>>,
) -> SamplerPool {
    SamplerPool::spawn(|kind| match kind {
        MetricKind::Cpu => cpu_lane(Arc::clone(stats)),
        MetricKind::Gpu => gpu_lane(Arc::clone(stats), Arc::clone(gpu_vendor)),
        MetricKind::Memory => memory_lane(Arc::clone(stats)),
        MetricKind::Io => io_lane(Arc::clone(stats)),
    })
}

fn cpu_lane(stats: Arc<SwapchainStats>) -> SampleJob {
    let mut source = CpuSource::new();
    Box::new(move || match source.sample() {
        Ok(percent) => stats.cpu.store(percent),
        Err(e) => debug!("cpu sample failed: {e:#}"),
    })
}

fn memory_lane(stats: Arc<SwapchainStats>) -> SampleJob {
    Box::new(move || match memory::sample() {
        Ok(info) => stats.memory.store(info.total_kib, info.avail_kib),
        Err(e) => debug!("memory sample failed: {e:#}"),
    })
}

fn io_lane(stats: Arc<SwapchainStats>) -> SampleJob {
    let mut source = IoSource::new();
    Box::new(move || match source.sample() {
        Ok(rates) => stats.io.store(rates.read_mbps, rates.write_mbps),
        Err(e) => debug!("io sample failed: {e:#}"),
    })
}

fn gpu_lane(stats: Arc<SwapchainStats>, vendor: Arc<OnceLock<GpuVendor>>) -> SampleJob {
    Box::new(move || {
        let Some(&vendor) = vendor.get() else { return };
        match gpu::sample(vendor) {
            Ok(load) => stats.gpu.store(load),
            Err(e) => debug!("gpu sample failed: {e:#}"),
        }
    })
}
