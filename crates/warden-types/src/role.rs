//! Node roles and the link topology.
//!
//! A warden cluster has four node roles. Messages flow over *links*,
//! each named by a directional [`Edge`] between two adjacent roles.
//! The topology is a closed set: a message catalog entry may only
//! declare edges from [`Edge::TOPOLOGY`].
//!
//! ```text
//!   control ──► controller ──► host ──► instance
//!           ◄──            ◄──      ◄──
//! ```
//!
//! Every physical connection is described by two edges, one per
//! direction. A controller serving a control client sees the link as
//! `(controller, control)`; the control client sees the same link as
//! `(control, controller)`.

use crate::error::ErrorCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A node role in the cluster.
///
/// | Role | Description |
/// |------|-------------|
/// | `Controller` | Central authority; owns cluster state |
/// | `Host` | Machine daemon; runs game-server processes |
/// | `Instance` | Per-game-server worker |
/// | `Control` | Admin client |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Central authority.
    Controller,
    /// Machine daemon managing game-server processes.
    Host,
    /// Per-game-server worker.
    Instance,
    /// Admin client.
    Control,
}

impl Role {
    /// All roles, in a fixed order.
    pub const ALL: [Role; 4] = [Role::Controller, Role::Host, Role::Instance, Role::Control];

    /// Returns the lowercase wire name of the role.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Controller => "controller",
            Role::Host => "host",
            Role::Instance => "instance",
            Role::Control => "control",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing a [`Role`] or [`Edge`] from its wire name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role or edge: {0}")]
pub struct RoleParseError(pub String);

impl ErrorCode for RoleParseError {
    fn code(&self) -> &'static str {
        "ROLE_UNKNOWN"
    }

    fn is_recoverable(&self) -> bool {
        // A name outside the closed role set stays outside it
        false
    }
}

impl FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "controller" => Ok(Role::Controller),
            "host" => Ok(Role::Host),
            "instance" => Ok(Role::Instance),
            "control" => Ok(Role::Control),
            other => Err(RoleParseError(other.to_string())),
        }
    }
}

/// A directional edge between two adjacent roles.
///
/// Edges name the direction a message travels: `control-controller`
/// is the control client speaking to the controller, and its
/// [`flipped`](Edge::flipped) counterpart `controller-control` is the
/// controller answering back.
///
/// # Example
///
/// ```
/// use warden_types::{Edge, Role};
///
/// let edge: Edge = "host-instance".parse().unwrap();
/// assert_eq!(edge, Edge::HOST_INSTANCE);
/// assert_eq!(edge.flipped(), Edge::INSTANCE_HOST);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    /// Role the message leaves from.
    pub source: Role,
    /// Role the message arrives at.
    pub target: Role,
}

impl Edge {
    /// Control client → controller.
    pub const CONTROL_CONTROLLER: Edge = Edge::new(Role::Control, Role::Controller);
    /// Controller → control client.
    pub const CONTROLLER_CONTROL: Edge = Edge::new(Role::Controller, Role::Control);
    /// Controller → host daemon.
    pub const CONTROLLER_HOST: Edge = Edge::new(Role::Controller, Role::Host);
    /// Host daemon → controller.
    pub const HOST_CONTROLLER: Edge = Edge::new(Role::Host, Role::Controller);
    /// Host daemon → game-server instance.
    pub const HOST_INSTANCE: Edge = Edge::new(Role::Host, Role::Instance);
    /// Game-server instance → host daemon.
    pub const INSTANCE_HOST: Edge = Edge::new(Role::Instance, Role::Host);

    /// The closed set of edges a message may be declared on.
    pub const TOPOLOGY: [Edge; 6] = [
        Edge::CONTROL_CONTROLLER,
        Edge::CONTROLLER_CONTROL,
        Edge::CONTROLLER_HOST,
        Edge::HOST_CONTROLLER,
        Edge::HOST_INSTANCE,
        Edge::INSTANCE_HOST,
    ];

    /// Creates an edge from a role pair.
    #[must_use]
    pub const fn new(source: Role, target: Role) -> Self {
        Self { source, target }
    }

    /// Returns the edge with source and target swapped.
    #[must_use]
    pub const fn flipped(self) -> Self {
        Self {
            source: self.target,
            target: self.source,
        }
    }

    /// Returns `true` if this edge is part of the declared topology.
    #[must_use]
    pub fn is_declared(self) -> bool {
        Edge::TOPOLOGY.contains(&self)
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.source, self.target)
    }
}

impl FromStr for Edge {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (source, target) = s
            .split_once('-')
            .ok_or_else(|| RoleParseError(s.to_string()))?;
        Ok(Edge::new(source.parse()?, target.parse()?))
    }
}
