//! Call context passed to every handler.
//!
//! Handlers never read state off an implicit receiver; everything
//! they may need about the invocation arrives as an explicit
//! [`CallContext`]: which link the message came in on, the role pair
//! of that link, and, on controller-side control links, the
//! authenticated caller.

use crate::auth::CallerIdentity;
use std::sync::Arc;
use warden_types::{LinkId, Role};

/// Invocation context for one dispatched message.
#[derive(Debug, Clone)]
pub struct CallContext {
    /// Identity of the link the message arrived on.
    pub link: LinkId,
    /// This side's role.
    pub source: Role,
    /// The peer's role.
    pub target: Role,
    /// Authenticated caller, present only on controller-side control
    /// links.
    pub caller: Option<Arc<CallerIdentity>>,
}

impl CallContext {
    /// Returns the caller's display name, or `"anonymous"` when no
    /// identity is attached.
    #[must_use]
    pub fn caller_name(&self) -> &str {
        self.caller.as_deref().map_or("anonymous", |c| c.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_types::PermissionSet;

    #[test]
    fn caller_name_defaults_to_anonymous() {
        let ctx = CallContext {
            link: LinkId::new(),
            source: Role::Controller,
            target: Role::Control,
            caller: None,
        };
        assert_eq!(ctx.caller_name(), "anonymous");
    }

    #[test]
    fn caller_name_uses_identity() {
        let ctx = CallContext {
            link: LinkId::new(),
            source: Role::Controller,
            target: Role::Control,
            caller: Some(Arc::new(CallerIdentity::new("operator", PermissionSet::admin()))),
        };
        assert_eq!(ctx.caller_name(), "operator");
    }
}
