pub mod codec;
pub mod error;
pub mod schema;
mod store;

pub use codec::{CodecError, DType, Element};
pub use error::{Result, StoreError};
pub use schema::{Confirmation, Table, CONFIRMATION_PHRASE};
pub use store::{InsertReport, PhotoStore, PruneReport, PENDING_PHOTO_LIMIT};
