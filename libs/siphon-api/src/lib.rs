pub mod error;
pub mod record;
pub mod resource;

pub use error::{ErrorKind, TransferError};
pub use record::{PTTL_MISSING, PTTL_NO_EXPIRY, Record, RecordBatch, TTL_NONE, normalize_pttl};
pub use resource::{FileEndpoint, Resource, StoreEndpoint};
