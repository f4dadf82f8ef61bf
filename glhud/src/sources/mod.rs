//! OS data sources feeding the sampler lanes
//!
//! Everything in here is best-effort by contract: a failed probe surfaces
//! as an error the lane logs at debug level, and the snapshot keeps its
//! previous value. Nothing in this module may panic or block on the render
//! thread (it never runs there).

pub mod cpu;
pub mod gpu;
pub mod io;
pub mod memory;
