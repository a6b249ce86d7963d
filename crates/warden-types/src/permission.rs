//! Permission identifiers and caller grant sets.
//!
//! Permissions are opaque dotted strings of the form
//! `core.<object>.<verb>` (e.g. `core.host.list`,
//! `core.instance.start`). The protocol never interprets the parts;
//! equality is the only operation. Enforcement happens solely on the
//! controller's side of control links; every other link in the
//! cluster is trusted.
//!
//! A caller's grants are collected in a [`PermissionSet`]. The master
//! grant `core.admin` implies every permission.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// The master grant implying every other permission.
pub const ADMIN_PERMISSION: &str = "core.admin";

/// An opaque permission identifier.
///
/// # Example
///
/// ```
/// use warden_types::Permission;
///
/// let perm = Permission::new("core.instance.start");
/// assert_eq!(perm.as_str(), "core.instance.start");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(String);

impl Permission {
    /// Creates a permission from its dotted name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the dotted name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Permission {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// The set of permissions granted to a caller.
///
/// Grants are explicit; [`ADMIN_PERMISSION`] acts as a wildcard.
///
/// # Example
///
/// ```
/// use warden_types::{Permission, PermissionSet};
///
/// let grants = PermissionSet::from_iter(["core.host.list"]);
/// assert!(grants.allows(&Permission::new("core.host.list")));
/// assert!(!grants.allows(&Permission::new("core.host.create")));
///
/// let admin = PermissionSet::admin();
/// assert!(admin.allows(&Permission::new("core.host.create")));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<Permission>);

impl PermissionSet {
    /// Creates an empty grant set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a set holding only the master grant.
    #[must_use]
    pub fn admin() -> Self {
        Self::from_iter([ADMIN_PERMISSION])
    }

    /// Adds a grant.
    pub fn grant(&mut self, permission: impl Into<Permission>) {
        self.0.insert(permission.into());
    }

    /// Removes a grant. Returns `true` if it was present.
    pub fn revoke(&mut self, permission: &Permission) -> bool {
        self.0.remove(permission)
    }

    /// Returns `true` if the permission is granted, either explicitly
    /// or through the master grant.
    #[must_use]
    pub fn allows(&self, permission: &Permission) -> bool {
        self.0.contains(permission) || self.0.contains(&Permission::new(ADMIN_PERMISSION))
    }

    /// Number of explicit grants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no grants are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<P: Into<Permission>> FromIterator<P> for PermissionSet {
    fn from_iter<T: IntoIterator<Item = P>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}
