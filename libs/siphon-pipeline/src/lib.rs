pub mod bus;
pub mod snapshot;
pub mod store;
mod transfer;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use snapshot::{SnapshotReader, SnapshotWriter};
pub use store::{ScanOptions, StoreReader, StoreWriter};
pub use transfer::{Sink, Source};
