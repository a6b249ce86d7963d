//! Stable error codes across the workspace.
//!
//! Peers on a link cannot match on each other's Rust error types, and
//! callers should not match on display strings that get reworded.
//! Every error in the workspace therefore carries a stable
//! machine-readable code through the [`ErrorCode`] trait, one prefix
//! per crate:
//!
//! | Prefix | Crate | Examples |
//! |--------|-------|----------|
//! | `ROLE_` | `warden-types` | `ROLE_UNKNOWN` |
//! | `SCHEMA_` | `warden-proto` | `SCHEMA_UNSUPPORTED_KEYWORD` |
//! | `CATALOG_` | `warden-proto` | `CATALOG_DUPLICATE` |
//! | `LINK_` | `warden-link` | `LINK_TIMEOUT`, `LINK_DISCONNECTED` |
//!
//! `is_recoverable` tells callers whether retrying or fixing their
//! input can help: a timed-out request can be retried, a payload the
//! schema rejected cannot.
//!
//! Each crate keeps its codes honest with the [`assert_error_codes`]
//! sweep in its error-module tests.
//!
//! # Example
//!
//! ```
//! use warden_types::ErrorCode;
//!
//! enum SaveStreamError {
//!     Interrupted,
//!     UnknownSave(String),
//! }
//!
//! impl ErrorCode for SaveStreamError {
//!     fn code(&self) -> &'static str {
//!         match self {
//!             Self::Interrupted => "SAVE_STREAM_INTERRUPTED",
//!             Self::UnknownSave(_) => "SAVE_UNKNOWN",
//!         }
//!     }
//!
//!     fn is_recoverable(&self) -> bool {
//!         // A broken stream can be resumed; a bad save name cannot
//!         matches!(self, Self::Interrupted)
//!     }
//! }
//!
//! assert!(SaveStreamError::Interrupted.is_recoverable());
//! assert_eq!(SaveStreamError::UnknownSave("x".into()).code(), "SAVE_UNKNOWN");
//! ```

/// Machine-readable error code interface.
pub trait ErrorCode {
    /// Returns the stable UPPER_SNAKE_CASE code for this error.
    fn code(&self) -> &'static str;

    /// Returns whether retrying or corrective caller action may help.
    fn is_recoverable(&self) -> bool;
}

/// First convention an error code breaks, if any.
///
/// Codes must be non-empty, carry their crate's prefix, and consist
/// of underscore-separated groups of ASCII capitals and digits.
fn broken_rule(code: &str, prefix: &str) -> Option<String> {
    if code.is_empty() {
        return Some("code is empty".to_string());
    }
    if !code.starts_with(prefix) {
        return Some(format!("missing the {prefix:?} prefix"));
    }
    let upper_snake = code.split('_').all(|group| {
        !group.is_empty()
            && group
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    });
    if !upper_snake {
        return Some("not UPPER_SNAKE_CASE".to_string());
    }
    None
}

/// Asserts that one error's code follows the workspace conventions.
///
/// # Panics
///
/// Panics naming the convention the code breaks.
///
/// # Example
///
/// ```
/// use warden_types::{assert_error_code, Role};
///
/// let err = "gateway".parse::<Role>().unwrap_err();
/// assert_error_code(&err, "ROLE_");
/// ```
pub fn assert_error_code<E: ErrorCode>(err: &E, expected_prefix: &str) {
    let code = err.code();
    if let Some(rule) = broken_rule(code, expected_prefix) {
        panic!("bad error code {code:?}: {rule}");
    }
}

/// Sweeps a crate's whole error taxonomy in one call; error modules
/// pass a vector of every variant.
///
/// # Panics
///
/// Panics on the first code breaking a convention.
///
/// # Example
///
/// ```
/// use warden_types::{assert_error_codes, Role, RoleParseError};
///
/// let errors: Vec<RoleParseError> = ["gateway", "relay"]
///     .iter()
///     .map(|name| name.parse::<Role>().unwrap_err())
///     .collect();
/// assert_error_codes(&errors, "ROLE_");
/// ```
pub fn assert_error_codes<E: ErrorCode>(errors: &[E], expected_prefix: &str) {
    for err in errors {
        assert_error_code(err, expected_prefix);
    }
}
