pub mod collation;
pub mod error;
pub mod types;

pub use collation::{collate, keys_equal};
pub use error::{
    ActionError, ErrorCode, PaginationError, PaginationResult, StoreError, StoreResult,
    SubDocFailure, SubDocumentError,
};
pub use types::{Metadata, Response, Row, ViewId};
