pub mod loader;
pub mod schema;

pub use loader::{load_batch, pack_request, Batch, DataLoadError};
