//! StockGate Core - Domain Types
//!
//! Pure data structures and pure logic for the StockGate inventory gateway.
//! No I/O and no async: everything in this crate is deterministic and
//! directly unit-testable. The `stockgate-api` crate wires these types to
//! the HTTP surface, the shared store, and the inventory backend.

pub mod audit;
pub mod error;
pub mod fallback;
pub mod principal;
pub mod sla;
pub mod stock;

pub use audit::{AuditAction, AuditEvent};
pub use error::ValidationError;
pub use fallback::FallbackCatalog;
pub use principal::{Principal, Role};
pub use sla::{SlaStatus, SlaThresholds};
pub use stock::{QueryMetadata, QuerySource, StockQueryRequest, StockRecord};
