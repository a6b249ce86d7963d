//! Route table: where forwarded and broadcast traffic goes.
//!
//! Each node owns one [`RouteTable`] shared by all of its links. It
//! holds three things:
//!
//! - **instance routes**: which link is the next hop toward a given
//!   instance. On a host these point straight at instance links; on
//!   the controller they point at the link of the host the instance
//!   is assigned to.
//! - **the downstream set**: the ordered collection of links fanned
//!   out to by broadcast (host links on the controller, instance
//!   links on a host). Broadcast iterates a snapshot of this set in
//!   insertion order; there is no atomicity across downstreams.
//! - **the upstream link**: the next hop toward the controller.
//!
//! Node lifecycle code keeps the table current: links are added when
//! a peer connects and removed on disconnect, which also breaks the
//! reference cycle between a routed link and the table it carries.

use crate::link::Link;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use warden_types::{InstanceId, LinkId};

/// Per-node routing state.
#[derive(Debug, Default)]
pub struct RouteTable {
    instances: RwLock<HashMap<InstanceId, Arc<Link>>>,
    downstream: RwLock<Vec<Arc<Link>>>,
    upstream: RwLock<Option<Arc<Link>>>,
}

impl RouteTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Sets the next hop toward the controller.
    pub fn set_upstream(&self, link: Arc<Link>) {
        *self.upstream.write() = Some(link);
    }

    /// Clears the upstream hop (controller connection lost).
    pub fn clear_upstream(&self) {
        *self.upstream.write() = None;
    }

    /// Returns the next hop toward the controller, if connected.
    #[must_use]
    pub fn upstream(&self) -> Option<Arc<Link>> {
        self.upstream.read().clone()
    }

    /// Appends a link to the broadcast fan-out set.
    pub fn add_downstream(&self, link: Arc<Link>) {
        self.downstream.write().push(link);
    }

    /// Removes a link from the fan-out set and from every instance
    /// route through it.
    pub fn remove_link(&self, id: LinkId) {
        self.downstream.write().retain(|link| link.id() != id);
        self.instances.write().retain(|_, link| link.id() != id);
    }

    /// Records the next hop toward an instance.
    pub fn assign_instance(&self, instance: InstanceId, link: Arc<Link>) {
        self.instances.write().insert(instance, link);
    }

    /// Drops the route toward an instance. Returns `true` if one was
    /// present.
    pub fn unassign_instance(&self, instance: InstanceId) -> bool {
        self.instances.write().remove(&instance).is_some()
    }

    /// Returns the next hop toward an instance, if routed.
    #[must_use]
    pub fn instance_route(&self, instance: InstanceId) -> Option<Arc<Link>> {
        self.instances.read().get(&instance).cloned()
    }

    /// Snapshot of the fan-out set, in insertion order.
    #[must_use]
    pub fn downstream_links(&self) -> Vec<Arc<Link>> {
        self.downstream.read().clone()
    }

    /// Number of links in the fan-out set.
    #[must_use]
    pub fn downstream_count(&self) -> usize {
        self.downstream.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LinkConfig;
    use crate::connector::ChannelConnector;
    use warden_types::Role;

    fn test_link(source: Role, target: Role) -> Arc<Link> {
        let (end, _peer) = ChannelConnector::pair();
        Link::new(source, target, end.connector, RouteTable::new(), LinkConfig::default())
    }

    #[test]
    fn instance_routes() {
        let routes = RouteTable::new();
        let link = test_link(Role::Host, Role::Instance);
        routes.assign_instance(InstanceId::new(7), link.clone());

        let found = routes.instance_route(InstanceId::new(7)).expect("route");
        assert_eq!(found.id(), link.id());
        assert!(routes.instance_route(InstanceId::new(8)).is_none());

        assert!(routes.unassign_instance(InstanceId::new(7)));
        assert!(!routes.unassign_instance(InstanceId::new(7)));
    }

    #[test]
    fn downstream_preserves_insertion_order() {
        let routes = RouteTable::new();
        let first = test_link(Role::Host, Role::Instance);
        let second = test_link(Role::Host, Role::Instance);
        routes.add_downstream(first.clone());
        routes.add_downstream(second.clone());

        let snapshot = routes.downstream_links();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].id(), first.id());
        assert_eq!(snapshot[1].id(), second.id());
    }

    #[test]
    fn remove_link_clears_routes_and_fanout() {
        let routes = RouteTable::new();
        let link = test_link(Role::Host, Role::Instance);
        routes.add_downstream(link.clone());
        routes.assign_instance(InstanceId::new(3), link.clone());

        routes.remove_link(link.id());
        assert_eq!(routes.downstream_count(), 0);
        assert!(routes.instance_route(InstanceId::new(3)).is_none());
    }

    #[test]
    fn upstream_set_and_clear() {
        let routes = RouteTable::new();
        assert!(routes.upstream().is_none());

        let link = test_link(Role::Host, Role::Controller);
        routes.set_upstream(link.clone());
        assert_eq!(routes.upstream().expect("upstream").id(), link.id());

        routes.clear_upstream();
        assert!(routes.upstream().is_none());
    }
}
