pub mod allocator;
pub mod availability;
pub mod dependency;
pub mod interval;

pub use allocator::{AllocationResult, Allocator, Conflict, SessionPlacement};
pub use interval::{FreeInterval, IntervalPool, Overlap};
