//! Catalog construction errors.
//!
//! All errors implement [`ErrorCode`] for standardized handling.
//!
//! | Variant | Code | Recoverable |
//! |---------|------|-------------|
//! | [`CatalogError::Duplicate`] | `CATALOG_DUPLICATE` | No |
//! | [`CatalogError::NoLinks`] | `CATALOG_NO_LINKS` | No |
//! | [`CatalogError::UndeclaredEdge`] | `CATALOG_UNDECLARED_EDGE` | No |
//! | [`CatalogError::PermissionRequired`] | `CATALOG_PERMISSION_REQUIRED` | No |
//! | [`CatalogError::PermissionForbidden`] | `CATALOG_PERMISSION_FORBIDDEN` | No |
//! | [`CatalogError::Schema`] | `CATALOG_SCHEMA` | No |

use crate::schema::SchemaBuildError;
use thiserror::Error;
use warden_types::{Edge, ErrorCode};

/// Error assembling the message catalog.
///
/// Every variant is a declaration bug; the process should fail fast
/// at startup rather than run with a partial catalog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// Two catalog entries share a name.
    #[error("duplicate message name: {0}")]
    Duplicate(String),

    /// A descriptor declared no link edges.
    #[error("message {0} declares no links")]
    NoLinks(String),

    /// A descriptor declared an edge outside the closed topology.
    #[error("message {message} declares undeclared edge {edge}")]
    UndeclaredEdge {
        /// Offending catalog entry.
        message: String,
        /// The edge outside the topology.
        edge: Edge,
    },

    /// A request flows on `control-controller` without a permission.
    #[error("message {0} flows on control-controller and must declare a permission")]
    PermissionRequired(String),

    /// A request declares a permission but never flows on
    /// `control-controller`.
    #[error("message {0} declares a permission but does not flow on control-controller")]
    PermissionForbidden(String),

    /// A payload schema failed to compile.
    #[error("message {message} has a malformed schema")]
    Schema {
        /// Offending catalog entry.
        message: String,
        /// The underlying compile error.
        #[source]
        source: SchemaBuildError,
    },
}

impl ErrorCode for CatalogError {
    fn code(&self) -> &'static str {
        match self {
            Self::Duplicate(_) => "CATALOG_DUPLICATE",
            Self::NoLinks(_) => "CATALOG_NO_LINKS",
            Self::UndeclaredEdge { .. } => "CATALOG_UNDECLARED_EDGE",
            Self::PermissionRequired(_) => "CATALOG_PERMISSION_REQUIRED",
            Self::PermissionForbidden(_) => "CATALOG_PERMISSION_FORBIDDEN",
            Self::Schema { .. } => "CATALOG_SCHEMA",
        }
    }

    fn is_recoverable(&self) -> bool {
        // Catalog errors are declaration bugs
        false
    }
}
