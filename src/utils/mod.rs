//! Utility helpers: math extensions, logging timers, and profiling.

pub mod logging;
pub mod math;
pub mod profiling;

pub use math::*;
pub use profiling::PhysicsProfiler;
