//! Cellwise (local) data structures: the block-structured dense system,
//! per-worker scratch buffers, and the worker context.

mod block;
mod scratch;
mod system;

pub use block::*;
pub use scratch::*;
pub use system::*;
