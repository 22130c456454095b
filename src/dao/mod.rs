/// Database model definitions.
pub mod models;
/// Session document, catalog and counter persistence.
pub mod session_store;
/// Storage abstraction layer for database operations.
pub mod storage;
