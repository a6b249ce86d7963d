//! Forwarding handlers and instance broadcast.
//!
//! When a descriptor declares a forward target, nodes in the middle
//! of the path do not handle the message themselves; they relay it.
//! The attach layer installs one of the constructors below as the
//! default handler whenever the node's [`HandlerTable`] does not name
//! the message explicitly:
//!
//! - [`request_to_instance`]: look up the next hop for the payload's
//!   `instance_id`, relay the request, relay the response back.
//! - [`request_to_controller`]: relay the request up the chain.
//! - [`event_to_instance`] / [`event_to_controller`]: same for
//!   one-way events.
//!
//! A missing route is a user-visible request error; any downstream
//! failure (timeout, disconnect, peer error) is propagated upward as
//! a request error too.
//!
//! [`broadcast_to_instances`] implements the fan-out used by
//! instance-broadcast events: it walks the node's downstream set in
//! insertion order and re-emits the event on every link the
//! descriptor may flow on.
//!
//! [`HandlerTable`]: crate::HandlerTable

use crate::context::CallContext;
use crate::error::{HandlerError, LinkError};
use crate::handler::{EventHandler, RequestHandler};
use crate::routes::RouteTable;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use warden_proto::{EventSpec, Flow, RequestSpec};
use warden_types::InstanceId;

fn instance_id_of(data: &Value) -> Result<InstanceId, HandlerError> {
    data.get("instance_id")
        .and_then(Value::as_u64)
        .map(InstanceId::new)
        // The schema requires instance_id on forwarded messages
        .ok_or_else(|| HandlerError::internal("forwarded payload lacks instance_id"))
}

struct RequestToInstance {
    spec: Arc<RequestSpec>,
    routes: Arc<RouteTable>,
}

#[async_trait]
impl RequestHandler for RequestToInstance {
    async fn handle(&self, _ctx: CallContext, data: Value) -> Result<Value, HandlerError> {
        let instance = instance_id_of(&data)?;
        let Some(route) = self.routes.instance_route(instance) else {
            return Err(HandlerError::Request(format!(
                "instance {instance} is not assigned to a connected host"
            )));
        };
        debug!(
            name = self.spec.name(),
            %instance,
            next_hop = %route.id(),
            "forwarding request toward instance"
        );
        relay_request(&route, &self.spec, data).await
    }
}

struct RequestToController {
    spec: Arc<RequestSpec>,
    routes: Arc<RouteTable>,
}

#[async_trait]
impl RequestHandler for RequestToController {
    async fn handle(&self, _ctx: CallContext, data: Value) -> Result<Value, HandlerError> {
        let Some(route) = self.routes.upstream() else {
            return Err(HandlerError::request("not connected to the controller"));
        };
        debug!(
            name = self.spec.name(),
            next_hop = %route.id(),
            "forwarding request toward controller"
        );
        relay_request(&route, &self.spec, data).await
    }
}

/// Relays a request downstream and maps the outcome back to the
/// origin: the peer's refusal passes through verbatim, every other
/// failure becomes a request error naming the cause.
async fn relay_request(
    route: &Arc<crate::link::Link>,
    spec: &Arc<RequestSpec>,
    data: Value,
) -> Result<Value, HandlerError> {
    match route.send_request(spec, data).await {
        Ok(mut response) => {
            // The relayed response gets this hop's own seq injected
            // when it is re-sent; drop the downstream one.
            if let Value::Object(map) = &mut response {
                map.remove("seq");
            }
            Ok(response)
        }
        Err(LinkError::Request(message)) => Err(HandlerError::Request(message)),
        Err(err) => Err(HandlerError::Request(format!(
            "forwarding {} failed: {err}",
            spec.name()
        ))),
    }
}

struct EventToInstance {
    spec: Arc<EventSpec>,
    routes: Arc<RouteTable>,
}

#[async_trait]
impl EventHandler for EventToInstance {
    async fn handle(&self, _ctx: CallContext, data: Value) -> Result<(), HandlerError> {
        let instance = instance_id_of(&data)?;
        let Some(route) = self.routes.instance_route(instance) else {
            return Err(HandlerError::Request(format!(
                "instance {instance} is not assigned to a connected host"
            )));
        };
        route
            .send_event(&self.spec, data)
            .map_err(|err| HandlerError::Request(format!(
                "forwarding {} failed: {err}",
                self.spec.name()
            )))
    }
}

struct EventToController {
    spec: Arc<EventSpec>,
    routes: Arc<RouteTable>,
}

#[async_trait]
impl EventHandler for EventToController {
    async fn handle(&self, _ctx: CallContext, data: Value) -> Result<(), HandlerError> {
        let Some(route) = self.routes.upstream() else {
            return Err(HandlerError::request("not connected to the controller"));
        };
        route
            .send_event(&self.spec, data)
            .map_err(|err| HandlerError::Request(format!(
                "forwarding {} failed: {err}",
                self.spec.name()
            )))
    }
}

/// Default handler relaying a request toward the instance named by
/// its `instance_id`.
#[must_use]
pub fn request_to_instance(
    spec: Arc<RequestSpec>,
    routes: Arc<RouteTable>,
) -> Arc<dyn RequestHandler> {
    Arc::new(RequestToInstance { spec, routes })
}

/// Default handler relaying a request up toward the controller.
#[must_use]
pub fn request_to_controller(
    spec: Arc<RequestSpec>,
    routes: Arc<RouteTable>,
) -> Arc<dyn RequestHandler> {
    Arc::new(RequestToController { spec, routes })
}

/// Default handler relaying an event toward the instance named by its
/// `instance_id`.
#[must_use]
pub fn event_to_instance(spec: Arc<EventSpec>, routes: Arc<RouteTable>) -> Arc<dyn EventHandler> {
    Arc::new(EventToInstance { spec, routes })
}

/// Default handler relaying an event up toward the controller.
#[must_use]
pub fn event_to_controller(spec: Arc<EventSpec>, routes: Arc<RouteTable>) -> Arc<dyn EventHandler> {
    Arc::new(EventToController { spec, routes })
}

/// Fans an event out to every downstream link the descriptor may
/// flow on, in insertion order. Returns the number of links the
/// event was emitted on; per-link failures are logged and skipped,
/// there is no atomicity across downstreams.
pub fn broadcast_to_instances(
    spec: &Arc<EventSpec>,
    routes: &RouteTable,
    data: &Value,
) -> usize {
    let mut sent = 0;
    for link in routes.downstream_links() {
        if !matches!(spec.flow(link.source(), link.target()), Flow::Origin | Flow::Both) {
            continue;
        }
        match link.send_event(spec, data.clone()) {
            Ok(()) => sent += 1,
            Err(err) => warn!(
                name = spec.name(),
                link = %link.id(),
                error = %err,
                "broadcast emission failed; continuing"
            ),
        }
    }
    sent
}

/// Wrapper installed on instance-broadcast events: fan out first,
/// then run the node's own handler.
pub(crate) struct BroadcastThenHandle {
    pub(crate) spec: Arc<EventSpec>,
    pub(crate) routes: Arc<RouteTable>,
    pub(crate) inner: Arc<dyn EventHandler>,
}

#[async_trait]
impl EventHandler for BroadcastThenHandle {
    async fn handle(&self, ctx: CallContext, data: Value) -> Result<(), HandlerError> {
        let sent = broadcast_to_instances(&self.spec, &self.routes, &data);
        debug!(
            name = self.spec.name(),
            fanned_out = sent,
            "broadcast toward instances"
        );
        self.inner.handle(ctx, data).await
    }
}
