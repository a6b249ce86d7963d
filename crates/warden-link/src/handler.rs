//! Handler traits and registration tables.
//!
//! Dispatch targets are explicit registrations, not reflective
//! lookups: each node role builds a [`HandlerTable`] naming the
//! catalog entries it handles, and the attach driver binds that table
//! to every new link. A message the table does not name falls back to
//! the descriptor's forwarding declaration, and failing that, attach
//! aborts with a missing-handler error.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use warden_link::{HandlerError, HandlerTable};
//!
//! let handlers = HandlerTable::new()
//!     .on_request("ping", |_ctx, _data| async { Ok(json!({})) })
//!     .on_event("banlist_update", |_ctx, data| async move {
//!         let name = data["name"].as_str().unwrap_or_default().to_string();
//!         if name.is_empty() {
//!             return Err(HandlerError::request("player name must not be empty"));
//!         }
//!         Ok(())
//!     });
//!
//! assert!(handlers.request("ping").is_some());
//! assert!(handlers.event("banlist_update").is_some());
//! assert!(handlers.request("list_hosts").is_none());
//! ```

use crate::context::CallContext;
use crate::error::HandlerError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Dispatch target for an inbound request.
///
/// The returned object becomes the response payload; the dispatch
/// layer injects the correlation `seq`. Returning [`Value::Null`] (or
/// anything that is not an object) produces the bare `{seq}` response.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Handles one request.
    async fn handle(&self, ctx: CallContext, data: Value) -> Result<Value, HandlerError>;
}

/// Dispatch target for an inbound event.
///
/// Events produce no response; a returned error is only logged.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handles one event.
    async fn handle(&self, ctx: CallContext, data: Value) -> Result<(), HandlerError>;
}

struct FnRequestHandler<F>(F);

#[async_trait]
impl<F, Fut> RequestHandler for FnRequestHandler<F>
where
    F: Fn(CallContext, Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, HandlerError>> + Send,
{
    async fn handle(&self, ctx: CallContext, data: Value) -> Result<Value, HandlerError> {
        (self.0)(ctx, data).await
    }
}

struct FnEventHandler<F>(F);

#[async_trait]
impl<F, Fut> EventHandler for FnEventHandler<F>
where
    F: Fn(CallContext, Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    async fn handle(&self, ctx: CallContext, data: Value) -> Result<(), HandlerError> {
        (self.0)(ctx, data).await
    }
}

/// Wraps an async closure into a [`RequestHandler`].
pub fn request_handler<F, Fut>(f: F) -> Arc<dyn RequestHandler>
where
    F: Fn(CallContext, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    Arc::new(FnRequestHandler(f))
}

/// Wraps an async closure into an [`EventHandler`].
pub fn event_handler<F, Fut>(f: F) -> Arc<dyn EventHandler>
where
    F: Fn(CallContext, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    Arc::new(FnEventHandler(f))
}

/// Explicit registration table for one node role.
///
/// Keys are catalog names (no kind suffix). The same table is bound
/// to every link the node opens; handlers must therefore be shareable
/// and are held behind [`Arc`].
#[derive(Default, Clone)]
pub struct HandlerTable {
    requests: HashMap<String, Arc<dyn RequestHandler>>,
    events: HashMap<String, Arc<dyn EventHandler>>,
}

impl HandlerTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a request handler object.
    #[must_use]
    pub fn request_with(mut self, name: &str, handler: Arc<dyn RequestHandler>) -> Self {
        self.requests.insert(name.to_string(), handler);
        self
    }

    /// Registers an event handler object.
    #[must_use]
    pub fn event_with(mut self, name: &str, handler: Arc<dyn EventHandler>) -> Self {
        self.events.insert(name.to_string(), handler);
        self
    }

    /// Registers an async closure as a request handler.
    #[must_use]
    pub fn on_request<F, Fut>(self, name: &str, f: F) -> Self
    where
        F: Fn(CallContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
    {
        self.request_with(name, request_handler(f))
    }

    /// Registers an async closure as an event handler.
    #[must_use]
    pub fn on_event<F, Fut>(self, name: &str, f: F) -> Self
    where
        F: Fn(CallContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.event_with(name, event_handler(f))
    }

    /// Looks up a request handler by catalog name.
    #[must_use]
    pub fn request(&self, name: &str) -> Option<&Arc<dyn RequestHandler>> {
        self.requests.get(name)
    }

    /// Looks up an event handler by catalog name.
    #[must_use]
    pub fn event(&self, name: &str) -> Option<&Arc<dyn EventHandler>> {
        self.events.get(name)
    }
}

impl std::fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerTable")
            .field("requests", &self.requests.len())
            .field("events", &self.events.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use warden_types::{LinkId, Role};

    fn ctx() -> CallContext {
        CallContext {
            link: LinkId::new(),
            source: Role::Host,
            target: Role::Instance,
            caller: None,
        }
    }

    #[tokio::test]
    async fn closure_request_handler_runs() {
        let handler = request_handler(|_ctx, data| async move {
            Ok(json!({"echo": data}))
        });
        let result = handler.handle(ctx(), json!({"x": 1})).await.expect("handle");
        assert_eq!(result, json!({"echo": {"x": 1}}));
    }

    #[tokio::test]
    async fn closure_event_handler_propagates_errors() {
        let handler = event_handler(|_ctx, _data| async {
            Err(HandlerError::internal("boom"))
        });
        let err = handler.handle(ctx(), json!({})).await.unwrap_err();
        assert!(matches!(err, HandlerError::Internal(_)));
    }

    #[test]
    fn table_lookup_by_name() {
        let table = HandlerTable::new()
            .on_request("ping", |_ctx, _data| async { Ok(Value::Null) })
            .on_event("log_message", |_ctx, _data| async { Ok(()) });
        assert!(table.request("ping").is_some());
        assert!(table.event("log_message").is_some());
        assert!(table.request("log_message").is_none());
        assert!(table.event("ping").is_none());
    }

    #[test]
    fn later_registration_wins() {
        let table = HandlerTable::new()
            .on_request("ping", |_ctx, _data| async { Ok(json!({"v": 1})) })
            .on_request("ping", |_ctx, _data| async { Ok(json!({"v": 2})) });
        assert!(table.request("ping").is_some());
        assert_eq!(table.requests.len(), 1);
    }
}
