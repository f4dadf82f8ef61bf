//! HUD composition and the renderer seam
//!
//! Drawing is a collaborator concern: the layer composes a [`HudFrame`]
//! and hands it to whatever [`HudRenderer`] the overlay state carries,
//! staying out of the submission details. The default [`TextHud`] keeps
//! the composed rows and mirrors them to the log when `GLHUD_DEBUG_HUD`
//! is set, which is also what the tests inspect.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;

use log::trace;

use crate::config::OverlayParams;
use crate::domain::{MetricKind, Viewport};
use crate::stats::{FrameStatsRing, StatsView};

/// Handle to a rasterized font at a fixed pixel size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontHandle {
    pub id: u32,
    pub size_px: f32,
}

/// Primary HUD font plus the half-size secondary used for unit suffixes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontPair {
    pub primary: FontHandle,
    pub secondary: FontHandle,
}

// Monotonic id source; ids only need to be unique, never dense.
static NEXT_FONT_ID: AtomicU32 = AtomicU32::new(1);

impl FontPair {
    /// Rasterize the pair for one overlay instance.
    #[must_use]
    pub fn load(size_px: f32) -> Self {
        Self {
            primary: FontHandle { id: NEXT_FONT_ID.fetch_add(1, Ordering::Relaxed), size_px },
            secondary: FontHandle {
                id: NEXT_FONT_ID.fetch_add(1, Ordering::Relaxed),
                size_px: size_px * 0.5,
            },
        }
    }
}

/// Everything a renderer needs for one HUD pass.
#[derive(Debug, Clone, Copy)]
pub struct HudFrame<'a> {
    pub view: StatsView,
    pub ring: &'a FrameStatsRing,
    pub params: &'a OverlayParams,
    pub viewport: Viewport,
    pub fonts: FontPair,
}

/// Renderer seam
///
/// Implementations draw one frame's HUD. Called on the host's render
/// thread with the owning context current, so implementations must not
/// block.
pub trait HudRenderer: Send {
    fn draw(&mut self, frame: &HudFrame<'_>);
}

/// Format the HUD's text rows from a snapshot.
#[must_use]
pub fn compose(view: &StatsView, params: &OverlayParams) -> Vec<String> {
    let mut rows = Vec::with_capacity(MetricKind::COUNT + 1);
    rows.push(format!("FPS {:.1}", view.fps));
    for kind in MetricKind::ALL {
        if !params.metrics.contains(kind) {
            continue;
        }
        let row = match kind {
            MetricKind::Cpu => format!("CPU {:5.1}%", view.cpu_percent),
            MetricKind::Gpu => format!("GPU {:5}%", view.gpu_load_percent),
            MetricKind::Memory => format!(
                "RAM {:.1}/{:.1} GiB",
                kib_to_gib(view.mem_used_kib()),
                kib_to_gib(view.mem_total_kib)
            ),
            MetricKind::Io => {
                format!("IO  {:.1}/{:.1} MB/s", view.io_read_mbps, view.io_write_mbps)
            }
        };
        rows.push(row);
    }
    rows
}

#[allow(clippy::cast_precision_loss)]
fn kib_to_gib(kib: u64) -> f32 {
    kib as f32 / (1024.0 * 1024.0)
}

/// Default renderer: retains the composed rows for inspection and for the
/// debug sink.
#[derive(Debug, Default)]
pub struct TextHud {
    rows: Vec<String>,
    frames_drawn: u64,
}

impl TextHud {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows composed by the most recent draw.
    #[must_use]
    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    #[must_use]
    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }
}

impl HudRenderer for TextHud {
    fn draw(&mut self, frame: &HudFrame<'_>) {
        self.rows = compose(&frame.view, frame.params);
        self.frames_drawn += 1;
        if debug_hud_enabled() {
            trace!(
                "hud {}x{}: {}",
                frame.viewport.width,
                frame.viewport.height,
                self.rows.join(" | ")
            );
        }
    }
}

fn debug_hud_enabled() -> bool {
    static FLAG: OnceLock<bool> = OnceLock::new();
    *FLAG.get_or_init(|| std::env::var_os("GLHUD_DEBUG_HUD").is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::SwapchainStats;

    fn view() -> StatsView {
        let stats = SwapchainStats::new();
        stats.set_fps(59.9);
        stats.cpu.store(31.5);
        stats.gpu.store(74);
        stats.memory.store(16 * 1024 * 1024, 12 * 1024 * 1024);
        stats.io.store(1.3, 0.5);
        stats.view()
    }

    #[test]
    fn test_compose_includes_every_enabled_metric() {
        let rows = compose(&view(), &OverlayParams::default());
        assert_eq!(rows.len(), MetricKind::COUNT + 1);
        assert_eq!(rows[0], "FPS 59.9");
        assert!(rows[1].starts_with("CPU"));
        assert!(rows[2].contains("74%"));
        assert!(rows[3].contains("4.0/16.0 GiB"));
        assert!(rows[4].contains("1.3/0.5 MB/s"));
    }

    #[test]
    fn test_compose_skips_disabled_metrics() {
        let mut params = OverlayParams::default();
        params.metrics = params.metrics.without(MetricKind::Gpu).without(MetricKind::Io);
        let rows = compose(&view(), &params);
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|row| !row.starts_with("GPU")));
    }

    #[test]
    fn test_font_pair_secondary_is_half_size() {
        let fonts = FontPair::load(24.0);
        assert!((fonts.secondary.size_px - 12.0).abs() < f32::EPSILON);
        assert_ne!(fonts.primary.id, fonts.secondary.id);

        let again = FontPair::load(24.0);
        assert_ne!(fonts.primary.id, again.primary.id);
    }

    #[test]
    fn test_text_hud_retains_rows() {
        let params = OverlayParams::default();
        let ring = FrameStatsRing::new();
        let frame = HudFrame {
            view: view(),
            ring: &ring,
            params: &params,
            viewport: Viewport { x: 0, y: 0, width: 1920, height: 1080 },
            fonts: FontPair::load(24.0),
        };
        let mut hud = TextHud::new();
        hud.draw(&frame);
        hud.draw(&frame);
        assert_eq!(hud.frames_drawn(), 2);
        assert_eq!(hud.rows().first().unwrap(), "FPS 59.9");
    }
}
