//! Core types for the warden cluster protocol.
//!
//! This crate provides the foundational role, topology and permission
//! types shared by every node of a warden cluster: the distributed
//! manager for game-server instances.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Protocol SDK Layer                       │
//! │  (External, SemVer stable, safe to depend on)               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  warden-types  : Role, Edge, InstanceId, Permission ◄── HERE │
//! │  warden-proto  : Envelope, schemas, message catalog          │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Runtime Layer                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  warden-link   : Connector, Link, dispatch, forwarding       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Cluster Topology
//!
//! Four node roles participate in a cluster:
//!
//! - [`Role::Controller`]: the central authority
//! - [`Role::Host`]: a machine daemon running game servers
//! - [`Role::Instance`]: a per-game-server worker
//! - [`Role::Control`]: an admin client
//!
//! Adjacent roles are connected by directional [`Edge`]s drawn from a
//! closed topology set; every live connection is described by the pair
//! of edges between its endpoints.
//!
//! # Example
//!
//! ```
//! use warden_types::{Edge, InstanceId, Permission, Role};
//!
//! // A control client talks to the controller
//! let edge = Edge::CONTROL_CONTROLLER;
//! assert_eq!(edge.source, Role::Control);
//! assert_eq!(edge.target, Role::Controller);
//! assert_eq!(edge.to_string(), "control-controller");
//!
//! // Instances are numbered on the wire
//! let id = InstanceId::new(7);
//! assert_eq!(id.to_string(), "7");
//!
//! // Control-originated requests carry dotted permissions
//! let perm = Permission::new("core.host.list");
//! assert_eq!(perm.as_str(), "core.host.list");
//! ```

mod error;
mod id;
mod permission;
mod role;

pub use error::{assert_error_code, assert_error_codes, ErrorCode};
pub use id::{InstanceId, LinkId};
pub use permission::{Permission, PermissionSet};
pub use role::{Edge, Role, RoleParseError};
