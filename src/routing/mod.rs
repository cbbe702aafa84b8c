//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (at startup):
//!     RoutesConfig
//!     → table.rs (join URLs, resolve duplicates)
//!     → Freeze as immutable RouteTable
//!
//! Router Assembly:
//!     RouteTable + pipelines
//!     → router.rs (one handler per path, 404 fallback)
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Exact path matching only; no prefixes, no patterns
//! - Deterministic: same document always yields the same table

pub mod router;
pub mod table;

pub use router::build_router;
pub use table::{join_paths, Route, RouteError, RouteTable};
