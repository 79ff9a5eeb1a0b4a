//! LIMS SDK: schema-driven REST backend for a laboratory information
//! management system. The entity schema is built in; storage is pluggable
//! (in-memory or PostgreSQL). SOP updates that change the version number or
//! effective date emit an immutable VersionChange audit row atomically with
//! the update, and deletes cascade across the foreign-key graph.

pub mod audit;
pub mod error;
pub mod handlers;
pub mod integrity;
pub mod response;
pub mod routes;
pub mod schema;
pub mod service;
pub mod state;
pub mod store;

pub use audit::{sop_version_change, SopSnapshot};
pub use error::{AppError, IntegrityError};
pub use integrity::{check_unique, validate_foreign_keys};
pub use routes::{common_routes, common_routes_with_ready, entity_routes};
pub use schema::{EntityKind, SchemaRegistry};
pub use service::ResourceService;
pub use state::AppState;
pub use store::memory::MemoryStore;
pub use store::postgres::{ensure_database_exists, PgStore};
pub use store::{Store, StoredRecord};
