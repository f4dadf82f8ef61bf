//! Per-context overlay state tracking
//!
//! The host owns context identity; this registry shadows it. A key moves
//! unknown -> created (and current) on its first successful activation,
//! switches current on later activations, and dies on explicit destroy or
//! the null-activation full teardown. There is no signal for abandoned
//! contexts the host never re-activates; their state lives until the next
//! full teardown.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;

use log::debug;

use crate::config::OverlayParams;
use crate::domain::{ContextKey, Viewport};
use crate::overlay::{FontPair, HudFrame, HudRenderer};
use crate::stats::{FrameStatsRing, StatsView};

/// Overlay resources owned by one host rendering context.
pub struct OverlayState {
    pub fonts: FontPair,
    pub viewport: Viewport,
    renderer: Box<dyn HudRenderer>,
}

impl OverlayState {
    #[must_use]
    pub fn new(fonts: FontPair, viewport: Viewport, renderer: Box<dyn HudRenderer>) -> Self {
        Self { fonts, viewport, renderer }
    }

    /// Draw one HUD frame with this context's resources.
    pub fn draw(&mut self, view: &StatsView, ring: &FrameStatsRing, params: &OverlayParams) {
        let frame =
            HudFrame { view: *view, ring, params, viewport: self.viewport, fonts: self.fonts };
        self.renderer.draw(&frame);
    }
}

impl fmt::Debug for OverlayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverlayState")
            .field("fonts", &self.fonts)
            .field("viewport", &self.viewport)
            .finish_non_exhaustive()
    }
}

/// What an activation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// First sighting: a state was created and made current.
    Created,
    /// Known context became current again.
    Switched,
}

/// ContextKey -> OverlayState map plus the current-context cursor
///
/// Mutated only on the host's render thread; the runtime serializes
/// access.
#[derive(Debug, Default)]
pub struct ContextRegistry {
    states: HashMap<ContextKey, OverlayState>,
    current: Option<ContextKey>,
}

impl ContextRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `key` current, creating its state on first sight via `make`.
    pub fn activate(&mut self, key: ContextKey, make: impl FnOnce() -> OverlayState) -> Activation {
        let outcome = match self.states.entry(key) {
            Entry::Occupied(_) => Activation::Switched,
            Entry::Vacant(slot) => {
                slot.insert(make());
                Activation::Created
            }
        };
        self.current = Some(key);
        debug!("{key} current ({outcome:?}, {} live)", self.states.len());
        outcome
    }

    /// Null-activation teardown: destroy every state and clear current.
    /// A no-op on an already-empty registry.
    pub fn shutdown_all(&mut self) {
        debug!("Tearing down {} overlay state(s)", self.states.len());
        self.states.clear();
        self.current = None;
    }

    /// Destroy one state. Clears current if it pointed here. Returns
    /// whether the key was known.
    pub fn destroy(&mut self, key: ContextKey) -> bool {
        if self.current == Some(key) {
            self.current = None;
        }
        self.states.remove(&key).is_some()
    }

    #[must_use]
    pub fn current(&self) -> Option<ContextKey> {
        self.current
    }

    /// The current context's state, if one is current.
    pub fn current_state_mut(&mut self) -> Option<&mut OverlayState> {
        let key = self.current?;
        self.states.get_mut(&key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
