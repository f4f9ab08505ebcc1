//! Encrypted handle management and the data operations running on it.

mod handle;
mod paths;
mod schema;
mod users;

pub use handle::HandleManager;
pub use paths::StoragePaths;
pub use schema::{
    ensure_schema, migrate_schema_version, update_schema, CURRENT_SCHEMA_VERSION,
};
