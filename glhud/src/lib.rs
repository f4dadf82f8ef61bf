//! # glhud - In-Process OpenGL Performance HUD
//!
//! glhud is an `LD_PRELOAD` library that draws a frame-rate and system
//! metrics HUD inside any GLX application without modifying it. It shadows
//! a handful of GLX entry points, keeps per-context overlay state, and
//! refreshes its metrics on a fixed half-second cadence while the host
//! keeps rendering at full speed.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Host Application                         │
//! │                  (any GLX program, unmodified)                  │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ glXSwapBuffers / glXMakeCurrent / ...
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   glhud (this crate, preloaded)                 │
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐      │
//! │  │  interpose   │──▶│   runtime    │──▶│   overlay    │      │
//! │  │  (exports)   │   │ (conductor)  │   │  (HUD draw)  │      │
//! │  └──────┬───────┘   └──────┬───────┘   └──────────────┘      │
//! │         │                  │                                   │
//! │         │           ┌──────┴───────┐   ┌──────────────┐      │
//! │         │           │   sampler    │──▶│   sources    │      │
//! │         │           │  (4 lanes)   │   │ (/proc, drm) │      │
//! │         │           └──────────────┘   └──────────────┘      │
//! │         ▼                                                      │
//! │  ┌──────────────┐   ┌──────────────┐                         │
//! │  │   resolver   │──▶│    driver    │                         │
//! │  │  (dl* boot)  │   │  (real GLX)  │                         │
//! │  └──────────────┘   └──────────────┘                         │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ forwarded calls
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   Real GL Driver (libGL.so.1)                   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! ### Injection Path
//!
//! - [`interpose`]: the exported GLX entry points and the static table
//!   mapping interposed names to replacements; optional `dlsym` override
//!   behind the `dlsym-hook` feature
//! - [`resolver`]: loader bootstrap that recovers the real `dlopen` and
//!   `dlsym` by reading the mapped libc's ELF from disk, so lookups never
//!   recurse into our own overrides
//! - [`driver`]: the real GLX entry points, bound once from `libGL.so.1`
//!   and shared process-wide
//!
//! ### Metrics Pipeline
//!
//! - [`runtime`]: the process-lifetime conductor tying frame accounting,
//!   context bookkeeping and the sampler lanes together
//! - [`stats`]: frame timing, fps derivation, the per-refresh metrics
//!   ring and the lock-free shared snapshot
//! - [`sampler`]: one bounded worker lane per metric kind; kicks are
//!   fire-and-forget and never block the render thread
//! - [`sources`]: the actual readers (`/proc/stat`, `/proc/meminfo`,
//!   `/proc/self/io`, amdgpu sysfs, `nvidia-smi`)
//!
//! ### Overlay and Configuration
//!
//! - [`registry`]: per-context overlay state keyed by GLX context
//!   pointer, plus the current-context tracking
//! - [`overlay`]: HUD row composition, font handles, and the renderer
//!   seam the draw path goes through
//! - [`config`]: overlay parameters from an optional JSON file named by
//!   `GLHUD_CONFIG`
//! - [`domain`]: core domain types (context keys, metric kinds, GPU
//!   vendors) and the error taxonomy
//!
//! ## Typical Usage
//!
//! ```bash
//! # Inject into any GLX application
//! LD_PRELOAD=./libglhud.so glxgears
//!
//! # Pick metrics and HUD geometry from a config file
//! GLHUD_CONFIG=hud.json LD_PRELOAD=./libglhud.so ./game
//!
//! # Verbose logging (quiet by default)
//! GLHUD_LOG=debug LD_PRELOAD=./libglhud.so glxgears
//! ```
//!
//! ## Key Concepts
//!
//! - **LD_PRELOAD**: the dynamic loader resolves symbols in preload order,
//!   so our exports shadow the driver's for the whole process
//! - **Loader bootstrap**: `dlsym` cannot be looked up with `dlsym`; the
//!   real addresses come from `/proc/self/maps` plus the on-disk ELF
//! - **Refresh window**: frames accumulate for 500ms, then collapse into
//!   one fps value, one ring slot and one round of sampler kicks
//! - **Snapshot**: fixed-width atomics read without locks; per-field
//!   freshness, no cross-field consistency
//! - **Context**: GLX contexts come and go; overlay state follows their
//!   make-current lifecycle and dies with a null make-current

// Expose modules for testing
pub mod config;
pub mod domain;
#[allow(unsafe_code)]
pub mod driver;
#[allow(unsafe_code)]
pub mod interpose;
pub mod overlay;
pub mod registry;
#[allow(unsafe_code)]
pub mod resolver;
pub mod runtime;
pub mod sampler;
pub mod sources;
pub mod stats;

use std::sync::Once;

static LOG_INIT: Once = Once::new();

/// Logger setup that is safe to call from every exported entry point.
///
/// A preloaded library has no init hook the host promises to call, so
/// whichever interposed symbol runs first brings the logger up. Quiet by
/// default; `GLHUD_LOG` takes the usual `env_logger` filter syntax. Either
/// diagnostic toggle must produce its per-call lines on its own, so a set
/// toggle widens the default filter for the resolver module.
pub(crate) fn init_logging() {
    LOG_INIT.call_once(|| {
        let verbose_resolver = resolver::debug_dlopen() || resolver::debug_dlsym();
        let env = env_logger::Env::new()
            .filter_or("GLHUD_LOG", default_log_filter(verbose_resolver));
        let _ = env_logger::Builder::from_env(env).format_timestamp_micros().try_init();
    });
}

fn default_log_filter(verbose_resolver: bool) -> &'static str {
    if verbose_resolver {
        "warn,glhud::resolver=debug"
    } else {
        "warn"
    }
}

/// Abort the host after an unrecoverable bootstrap failure.
///
/// Reserved for the two cases where limping on would crash inside the
/// driver anyway: the loader symbols cannot be recovered, or the real GLX
/// entry points are missing.
pub(crate) fn fatal(message: &str) -> ! {
    log::error!("{message}");
    eprintln!("glhud: {message}");
    std::process::exit(1)
}

#[cfg(test)]
mod tests {
    use super::default_log_filter;

    #[test]
    fn test_debug_toggles_widen_the_default_log_filter() {
        assert_eq!(default_log_filter(false), "warn");
        assert!(default_log_filter(true).starts_with("warn,"));
        assert!(default_log_filter(true).contains("glhud::resolver=debug"));
    }
}
