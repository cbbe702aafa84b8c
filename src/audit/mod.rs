//! Audit subsystem.
//!
//! # Data Flow
//! ```text
//! Request path (many tasks):
//!     → stage.rs / http::proxy build an AuditRecord
//!     → logger.rs submit() (non-blocking, bounded queue)
//!
//! Background (one task):
//!     → logger.rs consumer
//!     → store.rs AuditStore::store()
//! ```
//!
//! # Design Decisions
//! - Exactly one record per terminal outcome of a proxied request
//! - Records are immutable once built and owned by the logger after submit
//! - Audit failures never reach the caller

pub mod capture;
pub mod dump;
pub mod logger;
pub mod record;
pub mod stage;
pub mod store;

pub use logger::{AuditLogger, Submission};
pub use record::{AuditRecord, RecordDraft};
pub use stage::LoggingStage;
pub use store::{AuditStore, JsonLinesStore, MemoryStore, StoreError};
