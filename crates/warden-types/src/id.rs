//! Identifier types.
//!
//! Instances are numbered with small integers assigned by the
//! controller; the wire form of [`InstanceId`] is a bare integer so
//! payload schemas can require `instance_id: integer`. Live links get
//! a random [`LinkId`] for log correlation and route-table removal;
//! link ids never travel on the wire.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of a game-server instance.
///
/// Assigned by the controller when the instance is created and stable
/// for the instance's lifetime, including across host reassignment.
///
/// # Example
///
/// ```
/// use warden_types::InstanceId;
///
/// let id = InstanceId::new(7);
/// assert_eq!(id.value(), 7);
/// assert_eq!(serde_json::to_value(id).unwrap(), serde_json::json!(7));
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct InstanceId(pub u64);

impl InstanceId {
    /// Creates an instance id from its integer value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the integer value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for InstanceId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Identifier of one live link endpoint.
///
/// Random per connection; a reconnect produces a fresh id. Used for
/// log correlation and to remove links from route tables without
/// comparing by pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkId(Uuid);

impl LinkId {
    /// Creates a fresh random link id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub fn uuid(self) -> Uuid {
        self.0
    }
}

impl Default for LinkId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link:{}", self.0)
    }
}
