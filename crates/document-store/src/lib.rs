pub mod document;
pub mod error;
pub mod fallback;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use document::{Document, Patch, Version};
pub use error::{DocumentStoreError, Result};
pub use fallback::FallbackDocumentStore;
pub use memory::InMemoryDocumentStore;
pub use postgres::PostgresDocumentStore;
pub use query::{Condition, DocumentQuery, SortOrder};
pub use store::{DocumentStore, DocumentStoreExt, Precondition, WriteBatch, WriteOp};
