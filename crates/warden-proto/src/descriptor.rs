//! Message descriptors.
//!
//! A descriptor is the immutable declaration of one catalog entry:
//! its name, the link edges it may flow on, its routing attributes
//! and its compiled payload schemas. Descriptors are built through
//! checked builders that enforce the catalog invariants at
//! construction, so a bad declaration fails when the catalog is
//! assembled, before any link exists.
//!
//! # Invariants
//!
//! 1. A request declares a permission if and only if it flows on
//!    `control-controller`, the only edge where the caller is
//!    untrusted.
//! 2. Forwarding to an instance prepends a required
//!    `instance_id: integer` property to the payload schema, so
//!    every hop can route without understanding the payload.
//! 3. Only events broadcast, and only toward instances; requests
//!    have no broadcast attribute by construction.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use warden_proto::{Flow, RequestSpec};
//! use warden_types::{Edge, Role};
//!
//! let spec = RequestSpec::builder("start_instance")
//!     .link(Edge::CONTROL_CONTROLLER)
//!     .link(Edge::CONTROLLER_HOST)
//!     .link(Edge::HOST_INSTANCE)
//!     .permission("core.instance.start")
//!     .forward_to_instance()
//!     .request(json!({"save": {"type": ["string", "null"]}}), &[])
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(spec.request_type(), "start_instance_request");
//! assert_eq!(spec.request_schema().required()[0], "instance_id");
//! assert_eq!(spec.flow(Role::Control, Role::Controller), Flow::Origin);
//! assert_eq!(spec.flow(Role::Controller, Role::Control), Flow::Target);
//! ```

use crate::envelope::{event_type, request_type, response_type};
use crate::error::CatalogError;
use crate::schema::{compile, CompiledSchema};
use serde_json::{json, Map, Value};
use warden_types::{Edge, Permission, Role};

/// Where a received message is relayed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardTarget {
    /// Toward the instance named by the payload's `instance_id`.
    Instance,
    /// Up the chain toward the controller.
    Controller,
}

/// Where a received event is fanned out to.
///
/// The only broadcast target is the downstream instance set;
/// requests cannot broadcast at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastTarget {
    /// Every downstream instance reachable from the receiving node.
    Instance,
}

/// How a message relates to one directional link `(source, target)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// This side may originate the message.
    Origin,
    /// This side must handle the message.
    Target,
    /// Both directions are declared, e.g. `ping`.
    Both,
    /// The message never flows on this link.
    Unrelated,
}

fn classify(links: &[Edge], source: Role, target: Role) -> Flow {
    let origin = links.contains(&Edge::new(source, target));
    let handles = links.contains(&Edge::new(target, source));
    match (origin, handles) {
        (true, true) => Flow::Both,
        (true, false) => Flow::Origin,
        (false, true) => Flow::Target,
        (false, false) => Flow::Unrelated,
    }
}

/// Declaration of a correlated request/response message.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    name: String,
    links: Vec<Edge>,
    permission: Option<Permission>,
    forward_to: Option<ForwardTarget>,
    request_schema: CompiledSchema,
    response_schema: CompiledSchema,
}

impl RequestSpec {
    /// Starts a builder for a request named `name`.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> RequestSpecBuilder {
        RequestSpecBuilder {
            name: name.into(),
            links: Vec::new(),
            permission: None,
            forward_to: None,
            request: PayloadDecl::default(),
            response: PayloadDecl::default(),
        }
    }

    /// Catalog name, without any kind suffix.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wire type of the request envelope.
    #[must_use]
    pub fn request_type(&self) -> String {
        request_type(&self.name)
    }

    /// Wire type of the response envelope.
    #[must_use]
    pub fn response_type(&self) -> String {
        response_type(&self.name)
    }

    /// Declared link edges.
    #[must_use]
    pub fn links(&self) -> &[Edge] {
        &self.links
    }

    /// Permission required of control callers, if any.
    #[must_use]
    pub fn permission(&self) -> Option<&Permission> {
        self.permission.as_ref()
    }

    /// Relay target, if the receiving side forwards this request.
    #[must_use]
    pub fn forward_to(&self) -> Option<ForwardTarget> {
        self.forward_to
    }

    /// Compiled request payload schema.
    #[must_use]
    pub fn request_schema(&self) -> &CompiledSchema {
        &self.request_schema
    }

    /// Compiled response payload schema: the union of the success
    /// shape and the `{seq, error}` shape.
    #[must_use]
    pub fn response_schema(&self) -> &CompiledSchema {
        &self.response_schema
    }

    /// Classifies one directional link against the declared edges.
    #[must_use]
    pub fn flow(&self, source: Role, target: Role) -> Flow {
        classify(&self.links, source, target)
    }
}

/// Declaration of a one-way event message.
#[derive(Debug, Clone)]
pub struct EventSpec {
    name: String,
    links: Vec<Edge>,
    forward_to: Option<ForwardTarget>,
    broadcast_to: Option<BroadcastTarget>,
    event_schema: CompiledSchema,
}

impl EventSpec {
    /// Starts a builder for an event named `name`.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> EventSpecBuilder {
        EventSpecBuilder {
            name: name.into(),
            links: Vec::new(),
            forward_to: None,
            broadcast_to: None,
            payload: PayloadDecl::default(),
        }
    }

    /// Catalog name, without any kind suffix.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wire type of the event envelope.
    #[must_use]
    pub fn event_type(&self) -> String {
        event_type(&self.name)
    }

    /// Declared link edges.
    #[must_use]
    pub fn links(&self) -> &[Edge] {
        &self.links
    }

    /// Relay target, if the receiving side forwards this event.
    #[must_use]
    pub fn forward_to(&self) -> Option<ForwardTarget> {
        self.forward_to
    }

    /// Fan-out target, if the receiving side broadcasts this event.
    #[must_use]
    pub fn broadcast_to(&self) -> Option<BroadcastTarget> {
        self.broadcast_to
    }

    /// Compiled event payload schema.
    #[must_use]
    pub fn event_schema(&self) -> &CompiledSchema {
        &self.event_schema
    }

    /// Classifies one directional link against the declared edges.
    #[must_use]
    pub fn flow(&self, source: Role, target: Role) -> Flow {
        classify(&self.links, source, target)
    }
}

/// Declared payload shape: property subschemas plus the required
/// list. All catalog payloads are strict objects.
#[derive(Debug, Clone, Default)]
struct PayloadDecl {
    properties: Map<String, Value>,
    required: Vec<String>,
}

impl PayloadDecl {
    fn set(&mut self, properties: Value, required: &[&str]) {
        self.properties = match properties {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self.required = required.iter().map(|s| s.to_string()).collect();
    }

    /// Prepends `instance_id: integer` per the forwarding invariant.
    fn prepend_instance_id(&mut self) {
        self.properties
            .entry("instance_id")
            .or_insert_with(|| json!({"type": "integer"}));
        if self.required.first().map(String::as_str) != Some("instance_id") {
            self.required.retain(|name| name != "instance_id");
            self.required.insert(0, "instance_id".to_string());
        }
    }

    fn declaration(&self) -> Value {
        json!({
            "type": "object",
            "properties": self.properties.clone(),
            "required": self.required.clone(),
            "additionalProperties": false,
        })
    }
}

fn check_links(name: &str, links: &[Edge]) -> Result<(), CatalogError> {
    if links.is_empty() {
        return Err(CatalogError::NoLinks(name.to_string()));
    }
    for edge in links {
        if !edge.is_declared() {
            return Err(CatalogError::UndeclaredEdge {
                message: name.to_string(),
                edge: *edge,
            });
        }
    }
    Ok(())
}

fn compile_payload(name: &str, declaration: &Value) -> Result<CompiledSchema, CatalogError> {
    compile(declaration).map_err(|source| CatalogError::Schema {
        message: name.to_string(),
        source,
    })
}

/// Builder for [`RequestSpec`]; see the module docs for invariants.
#[derive(Debug)]
pub struct RequestSpecBuilder {
    name: String,
    links: Vec<Edge>,
    permission: Option<Permission>,
    forward_to: Option<ForwardTarget>,
    request: PayloadDecl,
    response: PayloadDecl,
}

impl RequestSpecBuilder {
    /// Declares an edge this request may flow on.
    #[must_use]
    pub fn link(mut self, edge: Edge) -> Self {
        self.links.push(edge);
        self
    }

    /// Declares the permission control callers need.
    #[must_use]
    pub fn permission(mut self, name: &str) -> Self {
        self.permission = Some(Permission::new(name));
        self
    }

    /// Receiving sides relay this request toward the instance named
    /// by `instance_id`.
    #[must_use]
    pub fn forward_to_instance(mut self) -> Self {
        self.forward_to = Some(ForwardTarget::Instance);
        self
    }

    /// Receiving sides relay this request up toward the controller.
    #[must_use]
    pub fn forward_to_controller(mut self) -> Self {
        self.forward_to = Some(ForwardTarget::Controller);
        self
    }

    /// Declares the request payload: property subschemas and the
    /// required list. Defaults to an empty strict object.
    #[must_use]
    pub fn request(mut self, properties: Value, required: &[&str]) -> Self {
        self.request.set(properties, required);
        self
    }

    /// Declares the success-response payload. A required
    /// `seq: integer` is always injected, and the final response
    /// schema is the union with the `{seq, error}` shape.
    #[must_use]
    pub fn response(mut self, properties: Value, required: &[&str]) -> Self {
        self.response.set(properties, required);
        self
    }

    /// Validates the invariants and compiles the schemas.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] on a missing/forbidden permission, an
    /// empty or undeclared link set, or a malformed schema.
    pub fn build(mut self) -> Result<RequestSpec, CatalogError> {
        check_links(&self.name, &self.links)?;

        let gated = self.links.contains(&Edge::CONTROL_CONTROLLER);
        match (&self.permission, gated) {
            (None, true) => return Err(CatalogError::PermissionRequired(self.name)),
            (Some(_), false) => return Err(CatalogError::PermissionForbidden(self.name)),
            _ => {}
        }

        if self.forward_to == Some(ForwardTarget::Instance) {
            self.request.prepend_instance_id();
        }

        // Success arm: seq plus the declared properties
        self.response
            .properties
            .entry("seq")
            .or_insert_with(|| json!({"type": "integer"}));
        if !self.response.required.iter().any(|name| name == "seq") {
            self.response.required.insert(0, "seq".to_string());
        }
        let response_declaration = json!({
            "anyOf": [
                self.response.declaration(),
                {
                    "type": "object",
                    "properties": {
                        "seq": {"type": "integer"},
                        "error": {"type": "string"},
                    },
                    "required": ["seq", "error"],
                    "additionalProperties": false,
                },
            ],
        });

        Ok(RequestSpec {
            request_schema: compile_payload(&self.name, &self.request.declaration())?,
            response_schema: compile_payload(&self.name, &response_declaration)?,
            name: self.name,
            links: self.links,
            permission: self.permission,
            forward_to: self.forward_to,
        })
    }
}

/// Builder for [`EventSpec`].
#[derive(Debug)]
pub struct EventSpecBuilder {
    name: String,
    links: Vec<Edge>,
    forward_to: Option<ForwardTarget>,
    broadcast_to: Option<BroadcastTarget>,
    payload: PayloadDecl,
}

impl EventSpecBuilder {
    /// Declares an edge this event may flow on.
    #[must_use]
    pub fn link(mut self, edge: Edge) -> Self {
        self.links.push(edge);
        self
    }

    /// Receiving sides relay this event toward the instance named by
    /// `instance_id`.
    #[must_use]
    pub fn forward_to_instance(mut self) -> Self {
        self.forward_to = Some(ForwardTarget::Instance);
        self
    }

    /// Receiving sides relay this event up toward the controller.
    #[must_use]
    pub fn forward_to_controller(mut self) -> Self {
        self.forward_to = Some(ForwardTarget::Controller);
        self
    }

    /// Receiving sides fan this event out to every downstream
    /// instance before handling it locally.
    #[must_use]
    pub fn broadcast_to_instance(mut self) -> Self {
        self.broadcast_to = Some(BroadcastTarget::Instance);
        self
    }

    /// Declares the event payload. Defaults to an empty strict
    /// object.
    #[must_use]
    pub fn payload(mut self, properties: Value, required: &[&str]) -> Self {
        self.payload.set(properties, required);
        self
    }

    /// Validates the invariants and compiles the schema.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] on an empty or undeclared link set,
    /// or a malformed schema.
    pub fn build(mut self) -> Result<EventSpec, CatalogError> {
        check_links(&self.name, &self.links)?;

        if self.forward_to == Some(ForwardTarget::Instance) {
            self.payload.prepend_instance_id();
        }

        Ok(EventSpec {
            event_schema: compile_payload(&self.name, &self.payload.declaration())?,
            name: self.name,
            links: self.links,
            forward_to: self.forward_to,
            broadcast_to: self.broadcast_to,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ping() -> RequestSpec {
        RequestSpec::builder("ping")
            .link(Edge::CONTROL_CONTROLLER)
            .link(Edge::CONTROLLER_CONTROL)
            .link(Edge::CONTROLLER_HOST)
            .link(Edge::HOST_CONTROLLER)
            .link(Edge::HOST_INSTANCE)
            .link(Edge::INSTANCE_HOST)
            .permission("core.ping")
            .build()
            .expect("ping spec")
    }

    #[test]
    fn wire_types_carry_suffixes() {
        let spec = ping();
        assert_eq!(spec.request_type(), "ping_request");
        assert_eq!(spec.response_type(), "ping_response");
    }

    #[test]
    fn flow_classification() {
        let spec = ping();
        // Declared in both directions on control links
        assert_eq!(spec.flow(Role::Control, Role::Controller), Flow::Both);

        let one_way = RequestSpec::builder("list_hosts")
            .link(Edge::CONTROL_CONTROLLER)
            .permission("core.host.list")
            .build()
            .expect("spec");
        assert_eq!(one_way.flow(Role::Control, Role::Controller), Flow::Origin);
        assert_eq!(one_way.flow(Role::Controller, Role::Control), Flow::Target);
        assert_eq!(one_way.flow(Role::Host, Role::Instance), Flow::Unrelated);
    }

    #[test]
    fn permission_required_on_control_edge() {
        let err = RequestSpec::builder("list_hosts")
            .link(Edge::CONTROL_CONTROLLER)
            .build()
            .unwrap_err();
        assert!(matches!(err, CatalogError::PermissionRequired(_)));
    }

    #[test]
    fn permission_forbidden_off_control_edge() {
        let err = RequestSpec::builder("update_instances")
            .link(Edge::HOST_CONTROLLER)
            .permission("core.instance.update")
            .build()
            .unwrap_err();
        assert!(matches!(err, CatalogError::PermissionForbidden(_)));
    }

    #[test]
    fn no_links_rejected() {
        let err = RequestSpec::builder("orphan").build().unwrap_err();
        assert!(matches!(err, CatalogError::NoLinks(_)));
    }

    #[test]
    fn undeclared_edge_rejected() {
        let err = RequestSpec::builder("shortcut")
            .link(Edge::new(Role::Control, Role::Instance))
            .build()
            .unwrap_err();
        assert!(matches!(err, CatalogError::UndeclaredEdge { .. }));
    }

    #[test]
    fn forward_to_instance_prepends_instance_id() {
        let spec = RequestSpec::builder("send_rcon")
            .link(Edge::CONTROL_CONTROLLER)
            .link(Edge::CONTROLLER_HOST)
            .link(Edge::HOST_INSTANCE)
            .permission("core.instance.send_rcon")
            .forward_to_instance()
            .request(json!({"command": {"type": "string"}}), &["command"])
            .build()
            .expect("spec");
        assert_eq!(spec.request_schema().required()[0], "instance_id");
        assert!(spec
            .request_schema()
            .accepts(&json!({"instance_id": 7, "command": "/foo"})));
        assert!(!spec.request_schema().accepts(&json!({"command": "/foo"})));
    }

    #[test]
    fn response_schema_accepts_success_and_error() {
        let spec = RequestSpec::builder("list_saves")
            .link(Edge::CONTROL_CONTROLLER)
            .permission("core.instance.list_saves")
            .response(json!({"list": {"type": "array", "items": {"type": "string"}}}), &["list"])
            .build()
            .expect("spec");
        let schema = spec.response_schema();
        assert!(schema.accepts(&json!({"seq": 1, "list": ["a.zip"]})));
        assert!(schema.accepts(&json!({"seq": 1, "error": "denied"})));
        assert!(!schema.accepts(&json!({"list": ["a.zip"]})));
        assert!(!schema.accepts(&json!({"seq": 1, "list": ["a.zip"], "bogus": 0})));
    }

    #[test]
    fn default_response_is_bare_seq() {
        let spec = ping();
        assert!(spec.response_schema().accepts(&json!({"seq": 3})));
        assert!(!spec.response_schema().accepts(&json!({"seq": 3, "extra": 1})));
    }

    #[test]
    fn event_broadcast_and_forward_attributes() {
        let spec = EventSpec::builder("banlist_update")
            .link(Edge::HOST_CONTROLLER)
            .link(Edge::CONTROLLER_HOST)
            .link(Edge::HOST_INSTANCE)
            .broadcast_to_instance()
            .payload(
                json!({
                    "name": {"type": "string"},
                    "banned": {"type": "boolean"},
                    "reason": {"type": "string"},
                }),
                &["name", "banned", "reason"],
            )
            .build()
            .expect("spec");
        assert_eq!(spec.broadcast_to(), Some(BroadcastTarget::Instance));
        assert_eq!(spec.forward_to(), None);
        assert_eq!(spec.event_type(), "banlist_update_event");
        assert!(spec
            .event_schema()
            .accepts(&json!({"name": "X", "banned": true, "reason": "r"})));
    }

    #[test]
    fn event_forward_to_instance_prepends_instance_id() {
        let spec = EventSpec::builder("instance_note")
            .link(Edge::CONTROLLER_HOST)
            .link(Edge::HOST_INSTANCE)
            .forward_to_instance()
            .payload(json!({"note": {"type": "string"}}), &["note"])
            .build()
            .expect("spec");
        assert_eq!(spec.event_schema().required()[0], "instance_id");
    }
}
