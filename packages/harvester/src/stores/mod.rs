//! Storage implementations for batch and master artifacts.
//!
//! Available backends:
//! - `CsvStore` - CSV files on local disk (production)
//! - `MemoryStore` - In-memory storage for tests

pub mod csv_store;
pub mod memory;

pub use csv_store::CsvStore;
pub use memory::MemoryStore;
