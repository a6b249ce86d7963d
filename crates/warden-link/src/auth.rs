//! Caller identity and the permission gate.
//!
//! Authorization in the cluster is asymmetric: every link between
//! cluster-owned roles (controller, host, instance) is trusted, and
//! only control clients are checked. After the (out-of-scope)
//! authentication handshake, the controller attaches a
//! [`CallerIdentity`] to the link serving that client; the attach
//! layer then wraps every permission-carrying request handler in a
//! gate that consults a [`PermissionPolicy`] before letting the call
//! through.
//!
//! A denial is an ordinary user-visible request error: the caller
//! sees `permission denied: <permission>`. Every decision is
//! written to the audit log: grants at debug level, denials at warn.
//!
//! # Example
//!
//! ```
//! use warden_link::{CallerIdentity, DefaultPolicy, PermissionPolicy};
//! use warden_types::{Permission, PermissionSet};
//!
//! let policy = DefaultPolicy;
//! let caller = CallerIdentity::new(
//!     "operator",
//!     PermissionSet::from_iter(["core.host.list"]),
//! );
//!
//! assert!(policy.can_call(Some(&caller), &Permission::new("core.host.list")));
//! assert!(!policy.can_call(Some(&caller), &Permission::new("core.host.create")));
//!
//! // No identity attached means no access at all
//! assert!(!policy.can_call(None, &Permission::new("core.host.list")));
//! ```

use crate::context::CallContext;
use crate::error::HandlerError;
use crate::handler::RequestHandler;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use warden_types::{Permission, PermissionSet};

/// The authenticated identity behind a control link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    /// Account name, for audit logs and error messages.
    pub name: String,
    /// Permissions granted through the account's roles.
    pub permissions: PermissionSet,
}

impl CallerIdentity {
    /// Creates an identity from its name and grant set.
    #[must_use]
    pub fn new(name: impl Into<String>, permissions: PermissionSet) -> Self {
        Self {
            name: name.into(),
            permissions,
        }
    }
}

/// Policy deciding whether a caller may invoke a gated request.
///
/// The default implementation checks the caller's grant set. A trait
/// keeps the decision mockable in tests and replaceable without
/// touching dispatch.
pub trait PermissionPolicy: Send + Sync {
    /// Returns `true` if the caller may invoke a request guarded by
    /// `permission`. `caller` is `None` when no identity was attached
    /// to the link.
    fn can_call(&self, caller: Option<&CallerIdentity>, permission: &Permission) -> bool;
}

/// Grant-set policy with audit logging.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPolicy;

impl PermissionPolicy for DefaultPolicy {
    fn can_call(&self, caller: Option<&CallerIdentity>, permission: &Permission) -> bool {
        let Some(caller) = caller else {
            tracing::warn!(
                permission = %permission,
                "request denied: no caller identity on link"
            );
            return false;
        };

        let allowed = caller.permissions.allows(permission);
        if allowed {
            tracing::debug!(
                caller = %caller.name,
                permission = %permission,
                "request allowed"
            );
        } else {
            tracing::warn!(
                caller = %caller.name,
                permission = %permission,
                "request denied: permission not granted"
            );
        }
        allowed
    }
}

/// Request-handler wrapper enforcing one permission.
pub(crate) struct PermissionGate {
    permission: Permission,
    policy: Arc<dyn PermissionPolicy>,
    inner: Arc<dyn RequestHandler>,
}

impl PermissionGate {
    pub(crate) fn new(
        permission: Permission,
        policy: Arc<dyn PermissionPolicy>,
        inner: Arc<dyn RequestHandler>,
    ) -> Self {
        Self {
            permission,
            policy,
            inner,
        }
    }
}

#[async_trait]
impl RequestHandler for PermissionGate {
    async fn handle(&self, ctx: CallContext, data: Value) -> Result<Value, HandlerError> {
        if !self.policy.can_call(ctx.caller.as_deref(), &self.permission) {
            return Err(HandlerError::Request(format!(
                "permission denied: {}",
                self.permission
            )));
        }
        self.inner.handle(ctx, data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::request_handler;
    use serde_json::json;
    use warden_types::{LinkId, Role};

    fn gated() -> PermissionGate {
        PermissionGate::new(
            Permission::new("core.host.list"),
            Arc::new(DefaultPolicy),
            request_handler(|_ctx, _data| async { Ok(json!({"handled": true})) }),
        )
    }

    fn ctx_with(caller: Option<CallerIdentity>) -> CallContext {
        CallContext {
            link: LinkId::new(),
            source: Role::Controller,
            target: Role::Control,
            caller: caller.map(Arc::new),
        }
    }

    #[tokio::test]
    async fn granted_caller_reaches_handler() {
        let caller = CallerIdentity::new("operator", PermissionSet::from_iter(["core.host.list"]));
        let result = gated().handle(ctx_with(Some(caller)), json!({})).await;
        assert_eq!(result.expect("allowed"), json!({"handled": true}));
    }

    #[tokio::test]
    async fn denied_caller_gets_request_error() {
        let caller = CallerIdentity::new("viewer", PermissionSet::new());
        let err = gated()
            .handle(ctx_with(Some(caller)), json!({}))
            .await
            .unwrap_err();
        match err {
            HandlerError::Request(msg) => {
                assert!(msg.contains("permission denied"));
                assert!(msg.contains("core.host.list"));
            }
            HandlerError::Internal(_) => panic!("denial must be user-visible"),
        }
    }

    #[tokio::test]
    async fn missing_identity_is_denied() {
        let err = gated().handle(ctx_with(None), json!({})).await.unwrap_err();
        assert!(matches!(err, HandlerError::Request(_)));
    }

    #[tokio::test]
    async fn admin_grant_passes_any_gate() {
        let caller = CallerIdentity::new("root", PermissionSet::admin());
        let result = gated().handle(ctx_with(Some(caller)), json!({})).await;
        assert!(result.is_ok());
    }

    struct DenyAll;

    impl PermissionPolicy for DenyAll {
        fn can_call(&self, _caller: Option<&CallerIdentity>, _permission: &Permission) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn custom_policy_is_consulted() {
        let gate = PermissionGate::new(
            Permission::new("core.host.list"),
            Arc::new(DenyAll),
            request_handler(|_ctx, _data| async { Ok(Value::Null) }),
        );
        let caller = CallerIdentity::new("root", PermissionSet::admin());
        let err = gate.handle(ctx_with(Some(caller)), json!({})).await.unwrap_err();
        assert!(matches!(err, HandlerError::Request(_)));
    }
}
