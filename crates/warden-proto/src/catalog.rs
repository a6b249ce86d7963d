//! The fixed message catalog.
//!
//! A [`Catalog`] is the process-wide, read-only mapping from message
//! name to descriptor. It is assembled once at startup by
//! [`Catalog::standard`]; every invariant is checked during assembly
//! so a bad declaration aborts startup instead of surfacing on the
//! wire. Iteration order is deterministic (sorted by name), which the
//! attach driver relies on.
//!
//! The standard catalog is the complete fixed message set of the
//! cluster: connection control, controller configuration, host and
//! instance management, saves, mod packs and mods, users and roles,
//! logs, the internal controller↔host traffic, and the event set.
//!
//! # Example
//!
//! ```
//! use warden_proto::{Catalog, Descriptor};
//!
//! let catalog = Catalog::standard().unwrap();
//! let spec = catalog.request("list_hosts").unwrap();
//! assert_eq!(spec.permission().unwrap().as_str(), "core.host.list");
//!
//! // Deterministic iteration for the attach driver
//! let names: Vec<&str> = catalog.iter().map(|(name, _)| name).collect();
//! let mut sorted = names.clone();
//! sorted.sort_unstable();
//! assert_eq!(names, sorted);
//! ```

use crate::descriptor::{EventSpec, RequestSpec, RequestSpecBuilder};
use crate::error::CatalogError;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use warden_types::Edge;

/// One catalog entry.
#[derive(Debug, Clone)]
pub enum Descriptor {
    /// A correlated request/response message.
    Request(Arc<RequestSpec>),
    /// A one-way event message.
    Event(Arc<EventSpec>),
}

impl Descriptor {
    /// Catalog name of the underlying message.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Descriptor::Request(spec) => spec.name(),
            Descriptor::Event(spec) => spec.name(),
        }
    }
}

/// Immutable name → descriptor mapping.
#[derive(Debug, Default)]
pub struct Catalog {
    entries: BTreeMap<String, Descriptor>,
}

impl Catalog {
    /// Starts an empty catalog builder.
    #[must_use]
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder {
            entries: BTreeMap::new(),
        }
    }

    /// Builds the complete standard catalog.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if any declaration violates the
    /// catalog invariants; this is a programming error and should
    /// abort startup.
    pub fn standard() -> Result<Arc<Catalog>, CatalogError> {
        let mut catalog = Catalog::builder();
        connection_messages(&mut catalog)?;
        controller_config_messages(&mut catalog)?;
        host_messages(&mut catalog)?;
        instance_messages(&mut catalog)?;
        save_messages(&mut catalog)?;
        mod_messages(&mut catalog)?;
        user_messages(&mut catalog)?;
        log_messages(&mut catalog)?;
        internal_messages(&mut catalog)?;
        event_messages(&mut catalog)?;
        Ok(Arc::new(catalog.build()))
    }

    /// Looks up any entry by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Descriptor> {
        self.entries.get(name)
    }

    /// Looks up a request descriptor by name.
    #[must_use]
    pub fn request(&self, name: &str) -> Option<&Arc<RequestSpec>> {
        match self.entries.get(name) {
            Some(Descriptor::Request(spec)) => Some(spec),
            _ => None,
        }
    }

    /// Looks up an event descriptor by name.
    #[must_use]
    pub fn event(&self, name: &str) -> Option<&Arc<EventSpec>> {
        match self.entries.get(name) {
            Some(Descriptor::Event(spec)) => Some(spec),
            _ => None,
        }
    }

    /// Iterates entries in deterministic (sorted) order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Descriptor)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    /// Iterates the request descriptors in deterministic order.
    pub fn requests(&self) -> impl Iterator<Item = &Arc<RequestSpec>> {
        self.entries.values().filter_map(|entry| match entry {
            Descriptor::Request(spec) => Some(spec),
            Descriptor::Event(_) => None,
        })
    }

    /// Iterates the event descriptors in deterministic order.
    pub fn events(&self) -> impl Iterator<Item = &Arc<EventSpec>> {
        self.entries.values().filter_map(|entry| match entry {
            Descriptor::Event(spec) => Some(spec),
            Descriptor::Request(_) => None,
        })
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when the catalog has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Accumulates descriptors, rejecting duplicates.
#[derive(Debug)]
pub struct CatalogBuilder {
    entries: BTreeMap<String, Descriptor>,
}

impl CatalogBuilder {
    /// Adds a request descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Duplicate`] if the name is taken.
    pub fn request(&mut self, spec: RequestSpec) -> Result<(), CatalogError> {
        self.insert(Descriptor::Request(Arc::new(spec)))
    }

    /// Adds an event descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Duplicate`] if the name is taken.
    pub fn event(&mut self, spec: EventSpec) -> Result<(), CatalogError> {
        self.insert(Descriptor::Event(Arc::new(spec)))
    }

    fn insert(&mut self, entry: Descriptor) -> Result<(), CatalogError> {
        let name = entry.name().to_string();
        if self.entries.contains_key(&name) {
            return Err(CatalogError::Duplicate(name));
        }
        self.entries.insert(name, entry);
        Ok(())
    }

    /// Finishes the catalog.
    #[must_use]
    pub fn build(self) -> Catalog {
        Catalog {
            entries: self.entries,
        }
    }
}

/// Request originated by a control client, terminating at the
/// controller.
fn control_request(name: &str, permission: &str) -> RequestSpecBuilder {
    RequestSpec::builder(name)
        .link(Edge::CONTROL_CONTROLLER)
        .permission(permission)
}

/// Request originated by a control client and relayed all the way to
/// the owning instance.
fn instance_bound_request(name: &str, permission: &str) -> RequestSpecBuilder {
    RequestSpec::builder(name)
        .link(Edge::CONTROL_CONTROLLER)
        .link(Edge::CONTROLLER_HOST)
        .link(Edge::HOST_INSTANCE)
        .permission(permission)
        .forward_to_instance()
}

/// Request originated by a control client and relayed to the host
/// that owns the instance (the host is the final hop).
fn host_bound_request(name: &str, permission: &str) -> RequestSpecBuilder {
    RequestSpec::builder(name)
        .link(Edge::CONTROL_CONTROLLER)
        .link(Edge::CONTROLLER_HOST)
        .permission(permission)
        .forward_to_instance()
}

fn connection_messages(catalog: &mut CatalogBuilder) -> Result<(), CatalogError> {
    catalog.request(
        RequestSpec::builder("ping")
            .link(Edge::CONTROL_CONTROLLER)
            .link(Edge::CONTROLLER_CONTROL)
            .link(Edge::CONTROLLER_HOST)
            .link(Edge::HOST_CONTROLLER)
            .link(Edge::HOST_INSTANCE)
            .link(Edge::INSTANCE_HOST)
            .permission("core.connection.ping")
            .build()?,
    )?;

    catalog.request(
        RequestSpec::builder("prepare_disconnect")
            .link(Edge::CONTROLLER_CONTROL)
            .link(Edge::CONTROLLER_HOST)
            .link(Edge::HOST_CONTROLLER)
            .link(Edge::HOST_INSTANCE)
            .link(Edge::INSTANCE_HOST)
            .build()?,
    )?;

    catalog.request(
        RequestSpec::builder("prepare_controller_disconnect")
            .link(Edge::HOST_INSTANCE)
            .build()?,
    )?;

    catalog.request(
        control_request("debug_dump_ws", "core.debug.dump_ws").build()?,
    )?;

    Ok(())
}

fn controller_config_messages(catalog: &mut CatalogBuilder) -> Result<(), CatalogError> {
    catalog.request(
        control_request("get_controller_config", "core.controller.get_config")
            .response(json!({"serialized_config": {"type": "object"}}), &["serialized_config"])
            .build()?,
    )?;

    catalog.request(
        control_request("set_controller_config_field", "core.controller.update_config")
            .request(
                json!({
                    "field": {"type": "string"},
                    "value": {"type": "string"},
                }),
                &["field", "value"],
            )
            .build()?,
    )?;

    catalog.request(
        control_request("set_controller_config_prop", "core.controller.update_config")
            .request(
                json!({
                    "field": {"type": "string"},
                    "prop": {"type": "string"},
                    "value": {},
                }),
                &["field", "prop"],
            )
            .build()?,
    )?;

    Ok(())
}

fn host_messages(catalog: &mut CatalogBuilder) -> Result<(), CatalogError> {
    catalog.request(
        control_request("list_hosts", "core.host.list")
            .response(
                json!({
                    "list": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "id": {"type": "integer"},
                                "name": {"type": "string"},
                                "connected": {"type": "boolean"},
                            },
                            "required": ["id", "name", "connected"],
                        },
                    },
                }),
                &["list"],
            )
            .build()?,
    )?;

    catalog.request(
        control_request("set_host_subscriptions", "core.host.subscribe")
            .request(
                json!({
                    "all": {"type": "boolean"},
                    "host_ids": {"type": "array", "items": {"type": "integer"}},
                }),
                &["all", "host_ids"],
            )
            .build()?,
    )?;

    catalog.request(
        control_request("generate_host_token", "core.host.generate_token")
            .request(json!({"host_id": {"type": ["integer", "null"]}}), &["host_id"])
            .response(json!({"token": {"type": "string"}}), &["token"])
            .build()?,
    )?;

    catalog.request(
        control_request("create_host_config", "core.host.create_config")
            .request(
                json!({
                    "id": {"type": ["integer", "null"]},
                    "name": {"type": ["string", "null"]},
                    "generate_token": {"type": "boolean"},
                }),
                &["id", "name", "generate_token"],
            )
            .response(json!({"serialized_config": {"type": "object"}}), &["serialized_config"])
            .build()?,
    )?;

    Ok(())
}

fn instance_messages(catalog: &mut CatalogBuilder) -> Result<(), CatalogError> {
    let instance_item = json!({
        "type": "object",
        "properties": {
            "id": {"type": "integer"},
            "name": {"type": "string"},
            "assigned_host": {"type": ["integer", "null"]},
            "status": {"type": "string"},
        },
        "required": ["id", "name", "assigned_host", "status"],
    });

    catalog.request(
        control_request("get_instance", "core.instance.get")
            .request(json!({"id": {"type": "integer"}}), &["id"])
            .response(json!({"instance": instance_item.clone()}), &["instance"])
            .build()?,
    )?;

    catalog.request(
        control_request("list_instances", "core.instance.list")
            .response(json!({"list": {"type": "array", "items": instance_item}}), &["list"])
            .build()?,
    )?;

    catalog.request(
        control_request("set_instance_subscriptions", "core.instance.subscribe")
            .request(
                json!({
                    "all": {"type": "boolean"},
                    "instance_ids": {"type": "array", "items": {"type": "integer"}},
                }),
                &["all", "instance_ids"],
            )
            .build()?,
    )?;

    catalog.request(
        control_request("create_instance", "core.instance.create")
            .request(json!({"serialized_config": {"type": "object"}}), &["serialized_config"])
            .build()?,
    )?;

    catalog.request(
        control_request("get_instance_config", "core.instance.get_config")
            .request(json!({"instance_id": {"type": "integer"}}), &["instance_id"])
            .response(json!({"serialized_config": {"type": "object"}}), &["serialized_config"])
            .build()?,
    )?;

    catalog.request(
        control_request("set_instance_config_field", "core.instance.update_config")
            .request(
                json!({
                    "instance_id": {"type": "integer"},
                    "field": {"type": "string"},
                    "value": {"type": "string"},
                }),
                &["instance_id", "field", "value"],
            )
            .build()?,
    )?;

    catalog.request(
        control_request("set_instance_config_prop", "core.instance.update_config")
            .request(
                json!({
                    "instance_id": {"type": "integer"},
                    "field": {"type": "string"},
                    "prop": {"type": "string"},
                    "value": {},
                }),
                &["instance_id", "field", "prop"],
            )
            .build()?,
    )?;

    catalog.request(
        control_request("assign_instance_command", "core.instance.assign")
            .request(
                json!({
                    "instance_id": {"type": "integer"},
                    "host_id": {"type": ["integer", "null"]},
                }),
                &["instance_id", "host_id"],
            )
            .build()?,
    )?;

    catalog.request(
        instance_bound_request("start_instance", "core.instance.start")
            .request(json!({"save": {"type": ["string", "null"]}}), &["save"])
            .build()?,
    )?;

    catalog.request(
        instance_bound_request("stop_instance", "core.instance.stop").build()?,
    )?;

    catalog.request(
        instance_bound_request("kill_instance", "core.instance.kill").build()?,
    )?;

    catalog.request(
        host_bound_request("delete_instance", "core.instance.delete").build()?,
    )?;

    catalog.request(
        instance_bound_request("load_scenario", "core.instance.load_scenario")
            .request(
                json!({
                    "scenario": {"type": "string"},
                    "seed": {"type": ["integer", "null"]},
                    "map_gen_settings": {"type": ["object", "null"]},
                    "map_settings": {"type": ["object", "null"]},
                }),
                &["scenario", "seed", "map_gen_settings", "map_settings"],
            )
            .build()?,
    )?;

    catalog.request(
        instance_bound_request("export_data", "core.instance.export_data").build()?,
    )?;

    catalog.request(
        instance_bound_request("extract_players", "core.instance.extract_players").build()?,
    )?;

    catalog.request(
        instance_bound_request("send_rcon", "core.instance.send_rcon")
            .request(json!({"command": {"type": "string"}}), &["command"])
            .response(json!({"result": {"type": "string"}}), &["result"])
            .build()?,
    )?;

    Ok(())
}

fn save_messages(catalog: &mut CatalogBuilder) -> Result<(), CatalogError> {
    let save_item = json!({
        "type": "object",
        "properties": {
            "name": {"type": "string"},
            "size": {"type": "integer"},
            "mtime_ms": {"type": "integer"},
        },
        "required": ["name", "size", "mtime_ms"],
    });

    catalog.request(
        instance_bound_request("list_saves", "core.save.list")
            .response(json!({"list": {"type": "array", "items": save_item}}), &["list"])
            .build()?,
    )?;

    catalog.request(
        instance_bound_request("create_save", "core.save.create")
            .request(
                json!({
                    "name": {"type": "string"},
                    "seed": {"type": ["integer", "null"]},
                    "map_gen_settings": {"type": ["object", "null"]},
                    "map_settings": {"type": ["object", "null"]},
                }),
                &["name"],
            )
            .build()?,
    )?;

    catalog.request(
        host_bound_request("rename_save", "core.save.rename")
            .request(
                json!({
                    "old_name": {"type": "string"},
                    "new_name": {"type": "string"},
                }),
                &["old_name", "new_name"],
            )
            .build()?,
    )?;

    catalog.request(
        host_bound_request("copy_save", "core.save.copy")
            .request(
                json!({
                    "source": {"type": "string"},
                    "destination": {"type": "string"},
                }),
                &["source", "destination"],
            )
            .build()?,
    )?;

    catalog.request(
        host_bound_request("delete_save", "core.save.delete")
            .request(json!({"save": {"type": "string"}}), &["save"])
            .build()?,
    )?;

    catalog.request(
        control_request("download_save", "core.save.download")
            .request(
                json!({
                    "instance_id": {"type": "integer"},
                    "save": {"type": "string"},
                }),
                &["instance_id", "save"],
            )
            .response(json!({"stream_id": {"type": "string"}}), &["stream_id"])
            .build()?,
    )?;

    catalog.request(
        control_request("transfer_save", "core.save.transfer")
            .request(
                json!({
                    "instance_id": {"type": "integer"},
                    "save": {"type": "string"},
                    "target_instance_id": {"type": "integer"},
                    "copy": {"type": "boolean"},
                }),
                &["instance_id", "save", "target_instance_id"],
            )
            .response(json!({"save": {"type": "string"}}), &["save"])
            .build()?,
    )?;

    catalog.request(
        RequestSpec::builder("pull_save")
            .link(Edge::CONTROLLER_HOST)
            .request(
                json!({
                    "instance_id": {"type": "integer"},
                    "save": {"type": "string"},
                    "stream_id": {"type": "string"},
                }),
                &["instance_id", "save", "stream_id"],
            )
            .response(json!({"save": {"type": "string"}}), &["save"])
            .build()?,
    )?;

    catalog.request(
        RequestSpec::builder("push_save")
            .link(Edge::CONTROLLER_HOST)
            .request(
                json!({
                    "instance_id": {"type": "integer"},
                    "save": {"type": "string"},
                    "stream_id": {"type": "string"},
                }),
                &["instance_id", "save", "stream_id"],
            )
            .build()?,
    )?;

    catalog.request(
        control_request("set_save_list_subscriptions", "core.save.subscribe")
            .request(
                json!({
                    "all": {"type": "boolean"},
                    "instance_ids": {"type": "array", "items": {"type": "integer"}},
                }),
                &["all", "instance_ids"],
            )
            .build()?,
    )?;

    Ok(())
}

fn mod_messages(catalog: &mut CatalogBuilder) -> Result<(), CatalogError> {
    catalog.request(
        control_request("get_mod_pack", "core.mod_pack.get")
            .request(json!({"id": {"type": "integer"}}), &["id"])
            .response(json!({"mod_pack": {"type": "object"}}), &["mod_pack"])
            .build()?,
    )?;

    catalog.request(
        control_request("get_default_mod_pack", "core.mod_pack.get")
            .response(json!({"mod_pack": {"type": "object"}}), &["mod_pack"])
            .build()?,
    )?;

    catalog.request(
        control_request("list_mod_packs", "core.mod_pack.list")
            .response(
                json!({"list": {"type": "array", "items": {"type": "object"}}}),
                &["list"],
            )
            .build()?,
    )?;

    catalog.request(
        control_request("create_mod_pack", "core.mod_pack.create")
            .request(json!({"mod_pack": {"type": "object"}}), &["mod_pack"])
            .build()?,
    )?;

    catalog.request(
        control_request("update_mod_pack", "core.mod_pack.update")
            .request(json!({"mod_pack": {"type": "object"}}), &["mod_pack"])
            .build()?,
    )?;

    catalog.request(
        control_request("delete_mod_pack", "core.mod_pack.delete")
            .request(json!({"id": {"type": "integer"}}), &["id"])
            .build()?,
    )?;

    catalog.request(
        control_request("set_mod_pack_subscriptions", "core.mod_pack.subscribe")
            .request(
                json!({
                    "all": {"type": "boolean"},
                    "mod_pack_ids": {"type": "array", "items": {"type": "integer"}},
                }),
                &["all", "mod_pack_ids"],
            )
            .build()?,
    )?;

    catalog.request(
        control_request("get_mod", "core.mod.get")
            .request(
                json!({
                    "name": {"type": "string"},
                    "version": {"type": "string"},
                }),
                &["name", "version"],
            )
            .response(json!({"mod": {"type": "object"}}), &["mod"])
            .build()?,
    )?;

    catalog.request(
        control_request("list_mods", "core.mod.list")
            .response(
                json!({"list": {"type": "array", "items": {"type": "object"}}}),
                &["list"],
            )
            .build()?,
    )?;

    catalog.request(
        control_request("search_mods", "core.mod.search")
            .request(
                json!({
                    "query": {"type": "string"},
                    "page": {"type": "integer"},
                    "page_size": {"type": ["integer", "null"]},
                    "sort": {"type": ["string", "null"]},
                    "sort_order": {"type": ["string", "null"]},
                }),
                &["query", "page"],
            )
            .response(
                json!({
                    "results": {"type": "array", "items": {"type": "object"}},
                    "page_count": {"type": "integer"},
                }),
                &["results", "page_count"],
            )
            .build()?,
    )?;

    catalog.request(
        control_request("download_mod", "core.mod.download")
            .request(
                json!({
                    "name": {"type": "string"},
                    "version": {"type": "string"},
                }),
                &["name", "version"],
            )
            .response(json!({"stream_id": {"type": "string"}}), &["stream_id"])
            .build()?,
    )?;

    catalog.request(
        control_request("delete_mod", "core.mod.delete")
            .request(
                json!({
                    "name": {"type": "string"},
                    "version": {"type": "string"},
                }),
                &["name", "version"],
            )
            .build()?,
    )?;

    catalog.request(
        control_request("set_mod_subscriptions", "core.mod.subscribe")
            .request(
                json!({
                    "all": {"type": "boolean"},
                    "mod_names": {"type": "array", "items": {"type": "string"}},
                }),
                &["all", "mod_names"],
            )
            .build()?,
    )?;

    Ok(())
}

fn user_messages(catalog: &mut CatalogBuilder) -> Result<(), CatalogError> {
    catalog.request(
        control_request("get_user", "core.user.get")
            .request(json!({"name": {"type": "string"}}), &["name"])
            .response(json!({"user": {"type": "object"}}), &["user"])
            .build()?,
    )?;

    catalog.request(
        control_request("list_users", "core.user.list")
            .response(
                json!({"list": {"type": "array", "items": {"type": "object"}}}),
                &["list"],
            )
            .build()?,
    )?;

    catalog.request(
        control_request("set_user_subscriptions", "core.user.subscribe")
            .request(
                json!({
                    "all": {"type": "boolean"},
                    "names": {"type": "array", "items": {"type": "string"}},
                }),
                &["all", "names"],
            )
            .build()?,
    )?;

    catalog.request(
        control_request("create_user", "core.user.create")
            .request(json!({"name": {"type": "string"}}), &["name"])
            .build()?,
    )?;

    catalog.request(
        control_request("revoke_user_token", "core.user.revoke_token")
            .request(json!({"name": {"type": "string"}}), &["name"])
            .build()?,
    )?;

    catalog.request(
        control_request("update_user_roles", "core.user.update_roles")
            .request(
                json!({
                    "name": {"type": "string"},
                    "roles": {"type": "array", "items": {"type": "integer"}},
                }),
                &["name", "roles"],
            )
            .build()?,
    )?;

    catalog.request(
        control_request("set_user_admin", "core.user.set_admin")
            .request(
                json!({
                    "name": {"type": "string"},
                    "create": {"type": "boolean"},
                    "admin": {"type": "boolean"},
                }),
                &["name", "create", "admin"],
            )
            .build()?,
    )?;

    catalog.request(
        control_request("set_user_banned", "core.user.set_banned")
            .request(
                json!({
                    "name": {"type": "string"},
                    "create": {"type": "boolean"},
                    "banned": {"type": "boolean"},
                    "reason": {"type": "string"},
                }),
                &["name", "create", "banned", "reason"],
            )
            .build()?,
    )?;

    catalog.request(
        control_request("set_user_whitelisted", "core.user.set_whitelisted")
            .request(
                json!({
                    "name": {"type": "string"},
                    "create": {"type": "boolean"},
                    "whitelisted": {"type": "boolean"},
                }),
                &["name", "create", "whitelisted"],
            )
            .build()?,
    )?;

    catalog.request(
        control_request("delete_user", "core.user.delete")
            .request(json!({"name": {"type": "string"}}), &["name"])
            .build()?,
    )?;

    catalog.request(
        control_request("list_roles", "core.role.list")
            .response(
                json!({"list": {"type": "array", "items": {"type": "object"}}}),
                &["list"],
            )
            .build()?,
    )?;

    catalog.request(
        control_request("create_role", "core.role.create")
            .request(
                json!({
                    "name": {"type": "string"},
                    "description": {"type": "string"},
                    "permissions": {"type": "array", "items": {"type": "string"}},
                }),
                &["name", "description", "permissions"],
            )
            .response(json!({"id": {"type": "integer"}}), &["id"])
            .build()?,
    )?;

    catalog.request(
        control_request("update_role", "core.role.update")
            .request(
                json!({
                    "id": {"type": "integer"},
                    "name": {"type": "string"},
                    "description": {"type": "string"},
                    "permissions": {"type": "array", "items": {"type": "string"}},
                }),
                &["id", "name", "description", "permissions"],
            )
            .build()?,
    )?;

    catalog.request(
        control_request("grant_default_role_permission", "core.role.update")
            .request(json!({"permission": {"type": "string"}}), &["permission"])
            .build()?,
    )?;

    catalog.request(
        control_request("delete_role", "core.role.delete")
            .request(json!({"id": {"type": "integer"}}), &["id"])
            .build()?,
    )?;

    Ok(())
}

fn log_messages(catalog: &mut CatalogBuilder) -> Result<(), CatalogError> {
    catalog.request(
        control_request("set_log_subscriptions", "core.log.follow")
            .request(
                json!({
                    "all": {"type": "boolean"},
                    "controller": {"type": "boolean"},
                    "host_ids": {"type": "array", "items": {"type": "integer"}},
                    "instance_ids": {"type": "array", "items": {"type": "integer"}},
                    "max_level": {"type": ["string", "null"]},
                }),
                &["all", "controller", "host_ids", "instance_ids"],
            )
            .build()?,
    )?;

    catalog.request(
        control_request("query_log", "core.log.query")
            .request(
                json!({
                    "all": {"type": "boolean"},
                    "controller": {"type": "boolean"},
                    "host_ids": {"type": "array", "items": {"type": "integer"}},
                    "instance_ids": {"type": "array", "items": {"type": "integer"}},
                    "max_level": {"type": ["string", "null"]},
                    "limit": {"type": "integer"},
                    "order": {"enum": ["asc", "desc"]},
                }),
                &["all", "controller", "host_ids", "instance_ids", "limit", "order"],
            )
            .response(
                json!({"log": {"type": "array", "items": {"type": "object"}}}),
                &["log"],
            )
            .build()?,
    )?;

    Ok(())
}

fn internal_messages(catalog: &mut CatalogBuilder) -> Result<(), CatalogError> {
    catalog.request(
        RequestSpec::builder("update_instances")
            .link(Edge::HOST_CONTROLLER)
            .request(
                json!({
                    "instances": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "serialized_config": {"type": "object"},
                                "status": {"type": "string"},
                            },
                            "required": ["serialized_config", "status"],
                        },
                    },
                }),
                &["instances"],
            )
            .build()?,
    )?;

    catalog.request(
        RequestSpec::builder("assign_instance")
            .link(Edge::CONTROLLER_HOST)
            .request(
                json!({
                    "instance_id": {"type": "integer"},
                    "serialized_config": {"type": "object"},
                }),
                &["instance_id", "serialized_config"],
            )
            .build()?,
    )?;

    catalog.request(
        RequestSpec::builder("unassign_instance")
            .link(Edge::CONTROLLER_HOST)
            .request(json!({"instance_id": {"type": "integer"}}), &["instance_id"])
            .build()?,
    )?;

    catalog.request(
        RequestSpec::builder("get_metrics")
            .link(Edge::CONTROLLER_HOST)
            .link(Edge::HOST_INSTANCE)
            .response(
                json!({"results": {"type": "array", "items": {"type": "object"}}}),
                &["results"],
            )
            .build()?,
    )?;

    Ok(())
}

fn event_messages(catalog: &mut CatalogBuilder) -> Result<(), CatalogError> {
    catalog.event(
        EventSpec::builder("debug_ws_message")
            .link(Edge::CONTROLLER_CONTROL)
            .payload(
                json!({
                    "direction": {"type": "string"},
                    "content": {"type": "string"},
                }),
                &["direction", "content"],
            )
            .build()?,
    )?;

    catalog.event(
        EventSpec::builder("account_update")
            .link(Edge::CONTROLLER_CONTROL)
            .payload(
                json!({
                    "roles": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "id": {"type": "integer"},
                                "name": {"type": "string"},
                                "permissions": {"type": "array", "items": {"type": "string"}},
                            },
                            "required": ["id", "name", "permissions"],
                        },
                    },
                }),
                &["roles"],
            )
            .build()?,
    )?;

    catalog.event(
        EventSpec::builder("log_message")
            .link(Edge::INSTANCE_HOST)
            .link(Edge::HOST_CONTROLLER)
            .link(Edge::CONTROLLER_CONTROL)
            .payload(json!({"info": {"type": "object"}}), &["info"])
            .build()?,
    )?;

    catalog.event(
        EventSpec::builder("host_update")
            .link(Edge::CONTROLLER_CONTROL)
            .payload(json!({"update": {"type": "object"}}), &["update"])
            .build()?,
    )?;

    catalog.event(
        EventSpec::builder("instance_initialized")
            .link(Edge::INSTANCE_HOST)
            .payload(
                json!({
                    "instance_id": {"type": "integer"},
                    "plugins": {"type": "object"},
                }),
                &["instance_id"],
            )
            .build()?,
    )?;

    catalog.event(
        EventSpec::builder("instance_status_changed")
            .link(Edge::INSTANCE_HOST)
            .link(Edge::HOST_CONTROLLER)
            .payload(
                json!({
                    "instance_id": {"type": "integer"},
                    "status": {"type": "string"},
                    "game_port": {"type": ["integer", "null"]},
                }),
                &["instance_id", "status"],
            )
            .build()?,
    )?;

    catalog.event(
        EventSpec::builder("instance_update")
            .link(Edge::CONTROLLER_CONTROL)
            .payload(json!({"update": {"type": "object"}}), &["update"])
            .build()?,
    )?;

    catalog.event(
        EventSpec::builder("save_list_update")
            .link(Edge::INSTANCE_HOST)
            .link(Edge::HOST_CONTROLLER)
            .link(Edge::CONTROLLER_CONTROL)
            .forward_to_controller()
            .payload(
                json!({
                    "instance_id": {"type": "integer"},
                    "saves": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "name": {"type": "string"},
                                "size": {"type": "integer"},
                                "mtime_ms": {"type": "integer"},
                            },
                            "required": ["name", "size", "mtime_ms"],
                        },
                    },
                }),
                &["instance_id", "saves"],
            )
            .build()?,
    )?;

    catalog.event(
        EventSpec::builder("mod_pack_update")
            .link(Edge::CONTROLLER_CONTROL)
            .payload(json!({"mod_pack": {"type": "object"}}), &["mod_pack"])
            .build()?,
    )?;

    catalog.event(
        EventSpec::builder("mod_update")
            .link(Edge::CONTROLLER_CONTROL)
            .payload(json!({"mod": {"type": "object"}}), &["mod"])
            .build()?,
    )?;

    catalog.event(
        EventSpec::builder("user_update")
            .link(Edge::CONTROLLER_CONTROL)
            .payload(json!({"user": {"type": "object"}}), &["user"])
            .build()?,
    )?;

    catalog.event(
        EventSpec::builder("controller_connection_event")
            .link(Edge::HOST_INSTANCE)
            .payload(json!({"state": {"enum": ["connected", "dropped", "resumed"]}}), &["state"])
            .build()?,
    )?;

    catalog.event(
        EventSpec::builder("sync_user_lists")
            .link(Edge::CONTROLLER_HOST)
            .payload(
                json!({
                    "adminlist": {"type": "array", "items": {"type": "string"}},
                    "banlist": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "name": {"type": "string"},
                                "reason": {"type": "string"},
                            },
                            "required": ["name", "reason"],
                        },
                    },
                    "whitelist": {"type": "array", "items": {"type": "string"}},
                }),
                &["adminlist", "banlist", "whitelist"],
            )
            .build()?,
    )?;

    catalog.event(
        EventSpec::builder("banlist_update")
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
            .build()?,
    )?;

    catalog.event(
        EventSpec::builder("adminlist_update")
            .link(Edge::HOST_CONTROLLER)
            .link(Edge::CONTROLLER_HOST)
            .link(Edge::HOST_INSTANCE)
            .broadcast_to_instance()
            .payload(
                json!({
                    "name": {"type": "string"},
                    "admin": {"type": "boolean"},
                }),
                &["name", "admin"],
            )
            .build()?,
    )?;

    catalog.event(
        EventSpec::builder("whitelist_update")
            .link(Edge::HOST_CONTROLLER)
            .link(Edge::CONTROLLER_HOST)
            .link(Edge::HOST_INSTANCE)
            .broadcast_to_instance()
            .payload(
                json!({
                    "name": {"type": "string"},
                    "whitelisted": {"type": "boolean"},
                }),
                &["name", "whitelisted"],
            )
            .build()?,
    )?;

    catalog.event(
        EventSpec::builder("player_event")
            .link(Edge::INSTANCE_HOST)
            .link(Edge::HOST_CONTROLLER)
            .forward_to_controller()
            .payload(
                json!({
                    "instance_id": {"type": "integer"},
                    "name": {"type": "string"},
                    "type": {"enum": ["join", "leave", "ban", "unban", "promote", "demote"]},
                    "reason": {"type": "string"},
                }),
                &["instance_id", "name", "type"],
            )
            .build()?,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{BroadcastTarget, ForwardTarget};

    fn standard() -> Arc<Catalog> {
        Catalog::standard().expect("standard catalog builds")
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut builder = Catalog::builder();
        builder
            .request(
                RequestSpec::builder("ping")
                    .link(Edge::HOST_INSTANCE)
                    .build()
                    .expect("spec"),
            )
            .expect("first insert");
        let err = builder
            .event(
                EventSpec::builder("ping")
                    .link(Edge::HOST_INSTANCE)
                    .build()
                    .expect("spec"),
            )
            .unwrap_err();
        assert!(matches!(err, CatalogError::Duplicate(name) if name == "ping"));
    }

    #[test]
    fn standard_catalog_has_expected_entries() {
        let catalog = standard();
        for name in [
            "ping",
            "prepare_disconnect",
            "list_hosts",
            "start_instance",
            "send_rcon",
            "transfer_save",
            "search_mods",
            "grant_default_role_permission",
            "query_log",
            "update_instances",
            "get_metrics",
        ] {
            assert!(catalog.request(name).is_some(), "missing request {name}");
        }
        for name in [
            "debug_ws_message",
            "log_message",
            "save_list_update",
            "banlist_update",
            "adminlist_update",
            "whitelist_update",
            "player_event",
        ] {
            assert!(catalog.event(name).is_some(), "missing event {name}");
        }
    }

    #[test]
    fn permission_iff_control_edge() {
        let catalog = standard();
        for spec in catalog.requests() {
            let gated = spec.links().contains(&Edge::CONTROL_CONTROLLER);
            assert_eq!(
                spec.permission().is_some(),
                gated,
                "permission/link mismatch on {}",
                spec.name()
            );
        }
    }

    #[test]
    fn instance_forwarded_messages_require_instance_id_first() {
        let catalog = standard();
        for spec in catalog.requests() {
            if spec.forward_to() == Some(ForwardTarget::Instance) {
                assert_eq!(
                    spec.request_schema().required().first().map(String::as_str),
                    Some("instance_id"),
                    "instance_id not first on {}",
                    spec.name()
                );
            }
        }
        for spec in catalog.events() {
            if spec.forward_to() == Some(ForwardTarget::Instance) {
                assert_eq!(
                    spec.event_schema().required().first().map(String::as_str),
                    Some("instance_id"),
                    "instance_id not first on {}",
                    spec.name()
                );
            }
        }
    }

    #[test]
    fn broadcast_events_are_the_list_updates() {
        let catalog = standard();
        let broadcasting: Vec<&str> = catalog
            .events()
            .filter(|spec| spec.broadcast_to() == Some(BroadcastTarget::Instance))
            .map(|spec| spec.name())
            .collect();
        assert_eq!(
            broadcasting,
            ["adminlist_update", "banlist_update", "whitelist_update"]
        );
    }

    #[test]
    fn controller_forwarded_events() {
        let catalog = standard();
        let forwarded: Vec<&str> = catalog
            .events()
            .filter(|spec| spec.forward_to() == Some(ForwardTarget::Controller))
            .map(|spec| spec.name())
            .collect();
        assert_eq!(forwarded, ["player_event", "save_list_update"]);
    }

    #[test]
    fn every_request_sample_round_trips() {
        let catalog = standard();
        for spec in catalog.requests() {
            let sample = spec.request_schema().sample();
            assert!(
                spec.request_schema().accepts(&sample),
                "sample invalid for {}",
                spec.name()
            );
            let wire = serde_json::to_string(&sample).expect("serialize");
            let back: serde_json::Value = serde_json::from_str(&wire).expect("deserialize");
            assert_eq!(back, sample, "round trip changed {}", spec.name());
            assert!(spec.request_schema().accepts(&back));
        }
    }

    #[test]
    fn every_event_sample_round_trips() {
        let catalog = standard();
        for spec in catalog.events() {
            let sample = spec.event_schema().sample();
            assert!(
                spec.event_schema().accepts(&sample),
                "sample invalid for {}",
                spec.name()
            );
        }
    }

    #[test]
    fn lookup_by_wrong_kind_returns_none() {
        let catalog = standard();
        assert!(catalog.event("ping").is_none());
        assert!(catalog.request("banlist_update").is_none());
        assert!(catalog.get("banlist_update").is_some());
    }
}
