//! The crate exposes the L1 data source consumed by the synchronization engine along with its
//! implementations.

pub use l1::{L1DataSource, L1ProviderError, OnlineL1DataSource};
mod l1;

#[cfg(any(test, feature = "test-utils"))]
/// Common test helpers
pub mod test_utils;
