pub mod manager;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod repository;
pub mod store;

pub use manager::{connect, DatabaseError, StoreKind};
pub use memory::MemoryDocumentStore;
pub use repository::{Document, Repository};
pub use store::{Collection, DocumentStore, WriteOp};
