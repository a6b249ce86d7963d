//! Wire protocol for the warden cluster.
//!
//! This crate defines everything that travels on a link between two
//! cluster nodes, without any transport or dispatch machinery:
//!
//! - [`Envelope`]: the on-wire record: type name, sequence number,
//!   payload
//! - [`schema`]: the payload schema compiler and validator
//! - [`RequestSpec`] / [`EventSpec`]: immutable message descriptors
//! - [`Catalog`]: the fixed, process-wide message registry
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Protocol SDK Layer                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  warden-types  : Role, Edge, InstanceId, Permission          │
//! │  warden-proto  : Envelope, schemas, catalog  ◄── HERE        │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Runtime Layer                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  warden-link   : Connector, Link, dispatch, forwarding       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Message Model
//!
//! Two message kinds exist:
//!
//! | Kind | Direction | Correlation | Use Case |
//! |------|-----------|-------------|----------|
//! | Request | Point-to-point | `seq` echoed in response | Queries, commands |
//! | Event | One-way | None | Notifications, fan-out |
//!
//! Every message is declared once in the [`Catalog`] with the link
//! edges it may flow on, its routing attributes (forwarding toward an
//! instance or the controller, broadcast to downstream instances) and
//! its payload schemas. Schemas compile eagerly when the catalog is
//! built and validate on every send and receive.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use warden_proto::{Catalog, Flow};
//! use warden_types::Role;
//!
//! let catalog = Catalog::standard().unwrap();
//!
//! let spec = catalog.request("send_rcon").unwrap();
//! assert_eq!(spec.flow(Role::Control, Role::Controller), Flow::Origin);
//!
//! // Payloads are validated against the declared schema
//! let payload = json!({"instance_id": 7, "command": "/players"});
//! assert!(spec.request_schema().validate(&payload).is_ok());
//! ```

mod catalog;
mod descriptor;
mod envelope;
mod error;
pub mod schema;

pub use catalog::{Catalog, CatalogBuilder, Descriptor};
pub use descriptor::{
    BroadcastTarget, EventSpec, EventSpecBuilder, Flow, ForwardTarget, RequestSpec,
    RequestSpecBuilder,
};
pub use envelope::{
    event_type, kind_of, request_type, response_type, Envelope, MessageKind, EVENT_SUFFIX,
    REQUEST_SUFFIX, RESPONSE_SUFFIX,
};
pub use error::CatalogError;
pub use schema::{CompiledSchema, SchemaBuildError, SchemaViolation};
