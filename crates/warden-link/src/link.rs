//! Link endpoints and envelope dispatch.
//!
//! A [`Link`] is one directional endpoint of a connection between two
//! adjacent roles. It owns the transport connector, the dispatch
//! tables (handlers and validators keyed by wire type), and the
//! pending-awaiter table that correlates responses back to their
//! requests.
//!
//! # Dispatch
//!
//! Every inbound envelope goes through [`Link::dispatch`] in arrival
//! order:
//!
//! 1. Look up the registered validator for the envelope type; none
//!    registered → log and drop.
//! 2. Validate the payload; a failing request is answered with an
//!    error response, failing responses and events are dropped.
//! 3. A pending awaiter matching `(type, data.seq)` resolves and
//!    consumes the envelope.
//! 4. Otherwise the registered handler runs; its outcome is mapped to
//!    the wire for requests and merely logged for events.
//!
//! Handlers may suspend (a forwarding handler awaits the downstream
//! response); while one is suspended this link dispatches nothing
//! further.
//! Correlation does not depend on the dispatch loop though: awaiters
//! resolve through oneshot channels, so a response arriving on a
//! *different* link wakes its caller regardless of what this link is
//! doing.
//!
//! # Teardown
//!
//! When the transport closes, [`Link::serve`] returns after failing
//! every pending awaiter with a disconnection error exactly once and
//! detaching all handlers.

use crate::auth::{CallerIdentity, DefaultPolicy, PermissionPolicy};
use crate::config::LinkConfig;
use crate::connector::Connector;
use crate::context::CallContext;
use crate::error::{HandlerError, LinkError};
use crate::handler::{EventHandler, RequestHandler};
use crate::routes::RouteTable;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use warden_proto::{Envelope, EventSpec, Flow, RequestSpec};
use warden_types::{LinkId, Role};

/// One dispatch-table entry, keyed by wire type.
#[derive(Clone)]
enum Registered {
    /// Inbound requests: validate then handle then respond.
    Request {
        spec: Arc<RequestSpec>,
        handler: Arc<dyn RequestHandler>,
    },
    /// Inbound events: validate then handle.
    Event {
        spec: Arc<EventSpec>,
        handler: Arc<dyn EventHandler>,
    },
    /// Inbound responses on the originating side: validate then
    /// resolve the matching awaiter.
    ResponseValidator { spec: Arc<RequestSpec> },
}

type PendingKey = (String, u64);

/// A directional link endpoint.
pub struct Link {
    id: LinkId,
    source: Role,
    target: Role,
    config: LinkConfig,
    connector: Arc<dyn Connector>,
    routes: Arc<RouteTable>,
    policy: Arc<dyn PermissionPolicy>,
    caller: RwLock<Option<Arc<CallerIdentity>>>,
    registered: RwLock<HashMap<String, Registered>>,
    pending: Mutex<HashMap<PendingKey, oneshot::Sender<Value>>>,
}

impl Link {
    /// Creates a link endpoint with the default permission policy.
    ///
    /// `source` is this side's role, `target` the peer's.
    #[must_use]
    pub fn new(
        source: Role,
        target: Role,
        connector: Arc<dyn Connector>,
        routes: Arc<RouteTable>,
        config: LinkConfig,
    ) -> Arc<Self> {
        Self::with_policy(source, target, connector, routes, config, Arc::new(DefaultPolicy))
    }

    /// Creates a link endpoint with a custom permission policy.
    #[must_use]
    pub fn with_policy(
        source: Role,
        target: Role,
        connector: Arc<dyn Connector>,
        routes: Arc<RouteTable>,
        config: LinkConfig,
        policy: Arc<dyn PermissionPolicy>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: LinkId::new(),
            source,
            target,
            config,
            connector,
            routes,
            policy,
            caller: RwLock::new(None),
            registered: RwLock::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
        })
    }

    /// Identity of this endpoint.
    #[must_use]
    pub fn id(&self) -> LinkId {
        self.id
    }

    /// This side's role.
    #[must_use]
    pub fn source(&self) -> Role {
        self.source
    }

    /// The peer's role.
    #[must_use]
    pub fn target(&self) -> Role {
        self.target
    }

    /// The node's route table.
    #[must_use]
    pub fn routes(&self) -> &Arc<RouteTable> {
        &self.routes
    }

    pub(crate) fn policy(&self) -> Arc<dyn PermissionPolicy> {
        self.policy.clone()
    }

    /// Attaches the authenticated caller identity. Done once by the
    /// controller after the handshake on links serving control
    /// clients.
    pub fn set_caller(&self, caller: CallerIdentity) {
        *self.caller.write() = Some(Arc::new(caller));
    }

    /// Returns `true` once the underlying transport is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.connector.is_closed()
    }

    /// Number of requests currently awaiting a response.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    fn call_context(&self) -> CallContext {
        CallContext {
            link: self.id,
            source: self.source,
            target: self.target,
            caller: self.caller.read().clone(),
        }
    }

    fn register(&self, wire_type: String, entry: Registered) -> Result<(), LinkError> {
        let mut registered = self.registered.write();
        if registered.contains_key(&wire_type) {
            return Err(LinkError::DuplicateHandler(wire_type));
        }
        registered.insert(wire_type, entry);
        Ok(())
    }

    /// Registers the response validator for a request this side may
    /// originate.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::DuplicateHandler`] if the response type is
    /// already registered.
    pub fn set_validator(&self, spec: &Arc<RequestSpec>) -> Result<(), LinkError> {
        self.register(
            spec.response_type(),
            Registered::ResponseValidator { spec: spec.clone() },
        )
    }

    /// Registers the handler for a request this side must serve.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::DuplicateHandler`] if the request type is
    /// already registered; registering twice is a programming error.
    pub fn set_request_handler(
        &self,
        spec: &Arc<RequestSpec>,
        handler: Arc<dyn RequestHandler>,
    ) -> Result<(), LinkError> {
        self.register(
            spec.request_type(),
            Registered::Request {
                spec: spec.clone(),
                handler,
            },
        )
    }

    /// Registers the handler for an event this side must serve.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::DuplicateHandler`] if the event type is
    /// already registered.
    pub fn set_event_handler(
        &self,
        spec: &Arc<EventSpec>,
        handler: Arc<dyn EventHandler>,
    ) -> Result<(), LinkError> {
        self.register(
            spec.event_type(),
            Registered::Event {
                spec: spec.clone(),
                handler,
            },
        )
    }

    /// Registers a one-shot awaiter: the next inbound envelope of
    /// `message_type` whose `data.seq` equals `seq` resolves the
    /// returned receiver instead of reaching a handler.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Internal`] if an awaiter for the same key
    /// already exists.
    pub fn wait_for(
        &self,
        message_type: impl Into<String>,
        seq: u64,
    ) -> Result<oneshot::Receiver<Value>, LinkError> {
        let key = (message_type.into(), seq);
        let mut pending = self.pending.lock();
        if pending.contains_key(&key) {
            return Err(LinkError::Internal(format!(
                "awaiter already registered for {} seq {}",
                key.0, key.1
            )));
        }
        let (tx, rx) = oneshot::channel();
        pending.insert(key, tx);
        Ok(rx)
    }

    /// Sends a request and awaits its response under the link's
    /// configured timeout.
    ///
    /// # Errors
    ///
    /// - [`LinkError::WrongDirection`] if this side may not originate
    ///   the request
    /// - [`LinkError::InvalidPayload`] if `data` fails the request
    ///   schema; nothing is transmitted
    /// - [`LinkError::Request`] if the peer answered with an error
    /// - [`LinkError::Closed`], [`LinkError::Disconnected`],
    ///   [`LinkError::Timeout`] on transport trouble
    pub async fn send_request(
        &self,
        spec: &Arc<RequestSpec>,
        data: Value,
    ) -> Result<Value, LinkError> {
        self.send_request_with_timeout(spec, data, self.config.request_timeout())
            .await
    }

    /// [`send_request`](Self::send_request) with a per-call timeout
    /// override.
    ///
    /// # Errors
    ///
    /// As [`send_request`](Self::send_request).
    pub async fn send_request_with_timeout(
        &self,
        spec: &Arc<RequestSpec>,
        data: Value,
        timeout: Duration,
    ) -> Result<Value, LinkError> {
        if !matches!(spec.flow(self.source, self.target), Flow::Origin | Flow::Both) {
            return Err(LinkError::WrongDirection {
                message: spec.name().to_string(),
                source_role: self.source,
                target: self.target,
            });
        }

        if let Err(violations) = spec.request_schema().validate(&data) {
            error!(
                link = %self.id,
                name = spec.name(),
                ?violations,
                "outbound request payload failed validation; not sent"
            );
            return Err(LinkError::InvalidPayload {
                message: spec.name().to_string(),
                violations,
            });
        }

        let response_type = spec.response_type();
        // The awaiter is registered under the same lock that assigns
        // the sequence number, so a fast response cannot slip past it.
        let (seq, rx) = {
            let mut pending = self.pending.lock();
            let seq = self.connector.send(&spec.request_type(), data)?;
            let (tx, rx) = oneshot::channel();
            pending.insert((response_type.clone(), seq), tx);
            (seq, rx)
        };

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => match response.get("error").and_then(Value::as_str) {
                Some(message) => Err(LinkError::Request(message.to_string())),
                None => Ok(response),
            },
            Ok(Err(_)) => Err(LinkError::Disconnected),
            Err(_) => {
                self.pending.lock().remove(&(response_type, seq));
                warn!(
                    link = %self.id,
                    name = spec.name(),
                    seq,
                    timeout_ms = timeout.as_millis() as u64,
                    "request timed out"
                );
                Err(LinkError::Timeout {
                    message: spec.name().to_string(),
                })
            }
        }
    }

    /// Sends a one-way event. No correlation, no await.
    ///
    /// # Errors
    ///
    /// - [`LinkError::WrongDirection`] if this side may not originate
    ///   the event
    /// - [`LinkError::InvalidPayload`] if `data` fails the event
    ///   schema; nothing is transmitted
    /// - [`LinkError::Closed`] if the transport is gone
    pub fn send_event(&self, spec: &Arc<EventSpec>, data: Value) -> Result<(), LinkError> {
        if !matches!(spec.flow(self.source, self.target), Flow::Origin | Flow::Both) {
            return Err(LinkError::WrongDirection {
                message: spec.name().to_string(),
                source_role: self.source,
                target: self.target,
            });
        }

        if let Err(violations) = spec.event_schema().validate(&data) {
            error!(
                link = %self.id,
                name = spec.name(),
                ?violations,
                "outbound event payload failed validation; not sent"
            );
            return Err(LinkError::InvalidPayload {
                message: spec.name().to_string(),
                violations,
            });
        }

        self.connector.send(&spec.event_type(), data)?;
        Ok(())
    }

    /// Dispatches one inbound envelope. Called by the serve loop in
    /// arrival order.
    pub async fn dispatch(&self, envelope: Envelope) {
        let entry = self.registered.read().get(&envelope.message_type).cloned();
        let Some(entry) = entry else {
            warn!(
                link = %self.id,
                message_type = %envelope.message_type,
                seq = envelope.seq,
                "no validator registered for inbound message; dropping"
            );
            return;
        };

        match entry {
            Registered::ResponseValidator { spec } => self.dispatch_response(&spec, envelope),
            Registered::Request { spec, handler } => {
                self.dispatch_request(&spec, handler, envelope).await;
            }
            Registered::Event { spec, handler } => {
                self.dispatch_event(&spec, handler, envelope).await;
            }
        }
    }

    fn dispatch_response(&self, spec: &RequestSpec, envelope: Envelope) {
        if let Err(violations) = spec.response_schema().validate(&envelope.data) {
            warn!(
                link = %self.id,
                name = spec.name(),
                ?violations,
                data = %envelope.data,
                "inbound response failed validation; dropping"
            );
            return;
        }
        if !self.resolve_pending(&envelope) {
            debug!(
                link = %self.id,
                name = spec.name(),
                seq = envelope.seq,
                "response without awaiter; dropping"
            );
        }
    }

    /// Resolves a matching awaiter, consuming the envelope's data.
    fn resolve_pending(&self, envelope: &Envelope) -> bool {
        let Some(seq) = envelope.data_seq() else {
            return false;
        };
        let waiter = self
            .pending
            .lock()
            .remove(&(envelope.message_type.clone(), seq));
        match waiter {
            Some(tx) => {
                // The awaiter may have timed out concurrently
                let _ = tx.send(envelope.data.clone());
                true
            }
            None => false,
        }
    }

    async fn dispatch_request(
        &self,
        spec: &Arc<RequestSpec>,
        handler: Arc<dyn RequestHandler>,
        envelope: Envelope,
    ) {
        let request_seq = envelope.seq;
        let response_type = spec.response_type();

        if let Err(violations) = spec.request_schema().validate(&envelope.data) {
            warn!(
                link = %self.id,
                name = spec.name(),
                ?violations,
                data = %envelope.data,
                "inbound request failed validation"
            );
            self.reply(
                &response_type,
                json!({"seq": request_seq, "error": "invalid request payload"}),
                request_seq,
            );
            return;
        }

        if self.resolve_pending(&envelope) {
            return;
        }

        let outcome = handler.handle(self.call_context(), envelope.data).await;
        let payload = match outcome {
            Ok(Value::Object(mut map)) => {
                map.insert("seq".to_string(), Value::from(request_seq));
                Value::Object(map)
            }
            Ok(_) => json!({"seq": request_seq}),
            Err(HandlerError::Request(message)) => {
                debug!(
                    link = %self.id,
                    name = spec.name(),
                    seq = request_seq,
                    error = %message,
                    "request refused"
                );
                json!({"seq": request_seq, "error": message})
            }
            Err(HandlerError::Internal(detail)) => {
                error!(
                    link = %self.id,
                    name = spec.name(),
                    seq = request_seq,
                    detail = %detail,
                    "request handler failed"
                );
                json!({"seq": request_seq, "error": "internal error"})
            }
        };

        if spec.response_schema().validate(&payload).is_err() {
            error!(
                link = %self.id,
                name = spec.name(),
                seq = request_seq,
                "handler produced a response outside the declared schema"
            );
            self.reply(
                &response_type,
                json!({"seq": request_seq, "error": "internal error"}),
                request_seq,
            );
            return;
        }

        self.reply(&response_type, payload, request_seq);
    }

    fn reply(&self, response_type: &str, payload: Value, request_seq: u64) {
        if let Err(err) = self.connector.reply(response_type, payload, request_seq) {
            debug!(
                link = %self.id,
                response_type,
                seq = request_seq,
                error = %err,
                "response could not be transmitted"
            );
        }
    }

    async fn dispatch_event(
        &self,
        spec: &Arc<EventSpec>,
        handler: Arc<dyn EventHandler>,
        envelope: Envelope,
    ) {
        if let Err(violations) = spec.event_schema().validate(&envelope.data) {
            warn!(
                link = %self.id,
                name = spec.name(),
                ?violations,
                data = %envelope.data,
                "inbound event failed validation; dropping"
            );
            return;
        }

        if self.resolve_pending(&envelope) {
            return;
        }

        if let Err(err) = handler.handle(self.call_context(), envelope.data).await {
            // Events have no response; faults are logged only
            match err {
                HandlerError::Request(message) => warn!(
                    link = %self.id,
                    name = spec.name(),
                    error = %message,
                    "event handler refused"
                ),
                HandlerError::Internal(detail) => error!(
                    link = %self.id,
                    name = spec.name(),
                    detail = %detail,
                    "event handler failed"
                ),
            }
        }
    }

    /// Drives dispatch until the transport closes, then tears the
    /// link down.
    pub async fn serve(self: Arc<Self>, mut receiver: mpsc::UnboundedReceiver<Envelope>) {
        debug!(
            link = %self.id,
            source = %self.source,
            target = %self.target,
            "link serving"
        );
        while let Some(envelope) = receiver.recv().await {
            self.dispatch(envelope).await;
        }
        self.close("transport closed");
    }

    /// Tears the link down: closes the connector, fails every pending
    /// awaiter with a disconnection error and detaches all handlers.
    /// Idempotent.
    pub fn close(&self, reason: &str) {
        self.connector.close();

        let drained: Vec<(PendingKey, oneshot::Sender<Value>)> =
            self.pending.lock().drain().collect();
        if !drained.is_empty() {
            info!(
                link = %self.id,
                in_flight = drained.len(),
                reason,
                "failing pending requests"
            );
        }
        // Dropping the senders fails each awaiter exactly once
        drop(drained);

        self.registered.write().clear();
        debug!(link = %self.id, reason, "link closed");
    }
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("id", &self.id)
            .field("source", &self.source)
            .field("target", &self.target)
            .field("pending", &self.pending.lock().len())
            .finish()
    }
}


#[cfg(test)]
impl Link {
    /// Test hook: raw reply through the connector.
    fn connector_reply_for_test(&self, message_type: &str, data: Value, seq: u64) {
        self.connector
            .reply(message_type, data, seq)
            .expect("test reply");
    }
}
