//! Chunk planning
//!
//! A page operation is split into chunks bounded by the controller's
//! FIFO/ECC granularity. This module defines the chunk command type and
//! the planner that produces the ordered chunk list.

mod chunk;
mod planner;

pub use chunk::*;
pub use planner::*;
