//! Primitive types for the Rollup Node.

pub use block::{BlockInfo, L1Block};
mod block;

pub use rollup::{EventsByBlockHash, RollupInfo};
mod rollup;
