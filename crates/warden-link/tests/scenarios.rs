//! End-to-end scenarios over an in-process cluster.
//!
//! Each test assembles a fresh control ↔ controller ↔ host ↔ instance
//! chain from channel connector pairs, binds the standard catalog to
//! every link, and drives real multi-hop traffic through it.

use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use warden_link::{
    attach_all, CallerIdentity, ChannelConnector, ConnectorEnd, HandlerError, HandlerTable, Link,
    LinkConfig, LinkError, RouteTable,
};
use warden_proto::{Catalog, Descriptor, Flow};
use warden_types::{InstanceId, PermissionSet, Role};

/// Observations collected by the handlers of one node.
#[derive(Default)]
struct Recorder {
    banlist_updates: Mutex<Vec<Value>>,
    rcon_commands: Mutex<Vec<Value>>,
    started: Mutex<Vec<Value>>,
}

impl Recorder {
    fn banlist_count(&self) -> usize {
        self.banlist_updates.lock().expect("lock").len()
    }
}

/// Fills a role's table with minimal handlers for every non-forwarded
/// message the given link direction must serve: requests answer with
/// the schema's minimal success shape, events are ignored. Entries
/// already present and forwarding defaults are left alone.
fn with_fallbacks(
    catalog: &Catalog,
    mut table: HandlerTable,
    source: Role,
    target: Role,
) -> HandlerTable {
    for (name, entry) in catalog.iter() {
        match entry {
            Descriptor::Request(spec) => {
                if table.request(name).is_some() || spec.forward_to().is_some() {
                    continue;
                }
                if matches!(spec.flow(source, target), Flow::Target | Flow::Both) {
                    let spec = spec.clone();
                    table = table.on_request(name, move |_ctx, _data| {
                        let spec = spec.clone();
                        async move {
                            let mut sample = spec.response_schema().sample();
                            if let Some(map) = sample.as_object_mut() {
                                map.remove("seq");
                            }
                            Ok(sample)
                        }
                    });
                }
            }
            Descriptor::Event(spec) => {
                if table.event(name).is_some() || spec.forward_to().is_some() {
                    continue;
                }
                if matches!(spec.flow(source, target), Flow::Target | Flow::Both) {
                    table = table.on_event(name, |_ctx, _data| async { Ok(()) });
                }
            }
        }
    }
    table
}

fn spawn_link(
    source: Role,
    target: Role,
    routes: Arc<RouteTable>,
    end: ConnectorEnd,
    catalog: &Catalog,
    table: &HandlerTable,
) -> Arc<Link> {
    let link = Link::new(source, target, end.connector, routes, LinkConfig::default());
    attach_all(&link, catalog, table).expect("catalog attaches");
    tokio::spawn(link.clone().serve(end.receiver));
    link
}

struct Cluster {
    catalog: Arc<Catalog>,
    /// Control client's side of its controller connection.
    control: Arc<Link>,
    /// Controller's side of the control connection.
    controller_control: Arc<Link>,
    /// Host's side of its controller connection.
    host_controller: Arc<Link>,
    host_recorder: Arc<Recorder>,
    instance_recorders: Vec<Arc<Recorder>>,
    list_hosts_invocations: Arc<AtomicUsize>,
    /// Signalled when the hanging `generate_host_token` handler has
    /// been entered.
    hang_entered: Arc<Notify>,
}

fn instance_table(recorder: Arc<Recorder>) -> HandlerTable {
    let started = recorder.clone();
    let rcon = recorder.clone();
    let banned = recorder;
    HandlerTable::new()
        .on_request("ping", |_ctx, _data| async { Ok(json!({})) })
        .on_request("prepare_disconnect", |_ctx, _data| async { Ok(json!({})) })
        .on_request("prepare_controller_disconnect", |_ctx, _data| async { Ok(json!({})) })
        .on_request("start_instance", move |_ctx, data| {
            let started = started.clone();
            async move {
                started.started.lock().expect("lock").push(data);
                Ok(json!({}))
            }
        })
        .on_request("stop_instance", |_ctx, _data| async { Ok(json!({})) })
        .on_request("kill_instance", |_ctx, _data| async { Ok(json!({})) })
        .on_request("load_scenario", |_ctx, _data| async { Ok(json!({})) })
        .on_request("export_data", |_ctx, _data| async { Ok(json!({})) })
        .on_request("extract_players", |_ctx, _data| async { Ok(json!({})) })
        .on_request("send_rcon", move |_ctx, data| {
            let rcon = rcon.clone();
            async move {
                let command = data["command"].as_str().unwrap_or_default().to_string();
                rcon.rcon_commands.lock().expect("lock").push(data);
                Ok(json!({"result": format!("ran {command}")}))
            }
        })
        .on_request("create_save", |_ctx, _data| async { Ok(json!({})) })
        .on_request("list_saves", |_ctx, _data| async { Ok(json!({"list": []})) })
        .on_request("get_metrics", |_ctx, _data| async { Ok(json!({"results": []})) })
        .on_event("controller_connection_event", |_ctx, _data| async { Ok(()) })
        .on_event("banlist_update", move |_ctx, data| {
            let banned = banned.clone();
            async move {
                banned.banlist_updates.lock().expect("lock").push(data);
                Ok(())
            }
        })
        .on_event("adminlist_update", |_ctx, _data| async { Ok(()) })
        .on_event("whitelist_update", |_ctx, _data| async { Ok(()) })
}

fn host_table(catalog: &Catalog, recorder: Arc<Recorder>) -> HandlerTable {
    let banned = recorder;
    let table = HandlerTable::new()
        .on_request("ping", |_ctx, _data| async { Ok(json!({})) })
        .on_request("prepare_disconnect", |_ctx, _data| async { Ok(json!({})) })
        .on_request("assign_instance", |_ctx, _data| async { Ok(json!({})) })
        .on_request("unassign_instance", |_ctx, _data| async { Ok(json!({})) })
        .on_request("get_metrics", |_ctx, _data| async { Ok(json!({"results": []})) })
        // The host is the terminus for save file management
        .on_request("delete_instance", |_ctx, _data| async { Ok(json!({})) })
        .on_request("rename_save", |_ctx, _data| async { Ok(json!({})) })
        .on_request("copy_save", |_ctx, _data| async { Ok(json!({})) })
        .on_request("delete_save", |_ctx, _data| async { Ok(json!({})) })
        .on_request("pull_save", |_ctx, data| async move {
            Ok(json!({"save": data["save"].as_str().unwrap_or_default()}))
        })
        .on_request("push_save", |_ctx, _data| async { Ok(json!({})) })
        .on_event("banlist_update", move |_ctx, data| {
            let banned = banned.clone();
            async move {
                banned.banlist_updates.lock().expect("lock").push(data);
                Ok(())
            }
        })
        .on_event("sync_user_lists", |_ctx, _data| async { Ok(()) });
    let table = with_fallbacks(catalog, table, Role::Host, Role::Controller);
    with_fallbacks(catalog, table, Role::Host, Role::Instance)
}

fn controller_table(
    catalog: &Catalog,
    list_hosts_invocations: Arc<AtomicUsize>,
    hang_entered: Arc<Notify>,
) -> HandlerTable {
    let table = HandlerTable::new()
        .on_request("list_hosts", move |_ctx, _data| {
            let invocations = list_hosts_invocations.clone();
            async move {
                invocations.fetch_add(1, Ordering::SeqCst);
                Ok(json!({
                    "list": [{"id": 1, "name": "alpha", "connected": true}],
                }))
            }
        })
        // Never completes: lets tests close the transport with a
        // request in flight.
        .on_request("generate_host_token", move |_ctx, _data| {
            let entered = hang_entered.clone();
            async move {
                entered.notify_one();
                std::future::pending::<()>().await;
                Err(HandlerError::internal("unreachable"))
            }
        })
        .on_request("get_instance", |_ctx, data| async move {
            if data["id"] == json!(404) {
                return Err(HandlerError::request("instance 404 does not exist"));
            }
            Ok(json!({
                "instance": {"id": data["id"], "name": "inst", "assigned_host": 1, "status": "stopped"},
            }))
        })
        // Terminus for the controller-bound event forwards
        .on_event("player_event", |_ctx, _data| async { Ok(()) })
        .on_event("save_list_update", |_ctx, _data| async { Ok(()) });
    let table = with_fallbacks(catalog, table, Role::Controller, Role::Control);
    with_fallbacks(catalog, table, Role::Controller, Role::Host)
}

fn control_table(catalog: &Catalog) -> HandlerTable {
    let table = HandlerTable::new()
        .on_request("ping", |_ctx, _data| async { Ok(json!({})) })
        .on_request("prepare_disconnect", |_ctx, _data| async { Ok(json!({})) });
    with_fallbacks(catalog, table, Role::Control, Role::Controller)
}

impl Cluster {
    /// Builds a cluster with one host and `instances` game servers,
    /// numbered from 7 upward. The control caller holds `permissions`.
    fn new(permissions: PermissionSet, instances: usize) -> Self {
        let catalog = Catalog::standard().expect("standard catalog");
        let controller_routes = RouteTable::new();
        let host_routes = RouteTable::new();

        let list_hosts_invocations = Arc::new(AtomicUsize::new(0));
        let hang_entered = Arc::new(Notify::new());
        let controller_handlers = controller_table(
            &catalog,
            list_hosts_invocations.clone(),
            hang_entered.clone(),
        );
        let host_recorder = Arc::new(Recorder::default());
        let host_handlers = host_table(&catalog, host_recorder.clone());

        // control ↔ controller
        let (control_end, controller_end) = ChannelConnector::pair();
        let control = spawn_link(
            Role::Control,
            Role::Controller,
            RouteTable::new(),
            control_end,
            &catalog,
            &control_table(&catalog),
        );
        let controller_control = Link::new(
            Role::Controller,
            Role::Control,
            controller_end.connector,
            controller_routes.clone(),
            LinkConfig::default(),
        );
        controller_control.set_caller(CallerIdentity::new("operator", permissions));
        attach_all(&controller_control, &catalog, &controller_handlers).expect("attach");
        tokio::spawn(controller_control.clone().serve(controller_end.receiver));

        // controller ↔ host
        let (ch_end, hc_end) = ChannelConnector::pair();
        let controller_host = spawn_link(
            Role::Controller,
            Role::Host,
            controller_routes.clone(),
            ch_end,
            &catalog,
            &controller_handlers,
        );
        let host_controller = spawn_link(
            Role::Host,
            Role::Controller,
            host_routes.clone(),
            hc_end,
            &catalog,
            &host_handlers,
        );
        controller_routes.add_downstream(controller_host.clone());
        host_routes.set_upstream(host_controller.clone());

        // host ↔ instances
        let mut instance_recorders = Vec::new();
        for index in 0..instances {
            let id = InstanceId::new(7 + index as u64);
            let (hi_end, ih_end) = ChannelConnector::pair();
            let host_instance = spawn_link(
                Role::Host,
                Role::Instance,
                host_routes.clone(),
                hi_end,
                &catalog,
                &host_handlers,
            );
            let recorder = Arc::new(Recorder::default());
            let _instance = spawn_link(
                Role::Instance,
                Role::Host,
                RouteTable::new(),
                ih_end,
                &catalog,
                &instance_table(recorder.clone()),
            );
            host_routes.add_downstream(host_instance.clone());
            host_routes.assign_instance(id, host_instance);
            controller_routes.assign_instance(id, controller_host.clone());
            instance_recorders.push(recorder);
        }

        Self {
            catalog,
            control,
            controller_control,
            host_controller,
            host_recorder,
            instance_recorders,
            list_hosts_invocations,
            hang_entered,
        }
    }

    async fn send(&self, name: &str, data: Value) -> Result<Value, LinkError> {
        let spec = self.catalog.request(name).expect("known request");
        self.control.send_request(spec, data).await
    }
}

/// Polls until `predicate` holds or the deadline passes.
async fn wait_until(predicate: impl Fn() -> bool) {
    let deadline = Duration::from_secs(2);
    tokio::time::timeout(deadline, async {
        while !predicate() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition within deadline");
}

#[tokio::test]
async fn list_hosts_with_permission_succeeds() {
    let cluster = Cluster::new(PermissionSet::from_iter(["core.host.list"]), 0);

    let response = cluster.send("list_hosts", json!({})).await.expect("response");
    assert_eq!(response["seq"], 1);
    assert_eq!(response["list"], json!([{"id": 1, "name": "alpha", "connected": true}]));
    assert_eq!(cluster.list_hosts_invocations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn list_hosts_without_permission_is_denied_before_the_handler() {
    let cluster = Cluster::new(PermissionSet::from_iter(["core.instance.list"]), 0);

    let err = cluster.send("list_hosts", json!({})).await.unwrap_err();
    match err {
        LinkError::Request(message) => {
            assert!(message.contains("permission denied"));
            assert!(message.contains("core.host.list"));
        }
        other => panic!("expected request error, got {other:?}"),
    }
    assert_eq!(cluster.list_hosts_invocations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn start_instance_forwards_through_host_to_instance() {
    let cluster = Cluster::new(PermissionSet::admin(), 1);

    let response = cluster
        .send("start_instance", json!({"instance_id": 7, "save": "a.zip"}))
        .await
        .expect("forwarded response");
    assert_eq!(response, json!({"seq": 1}));

    let started = cluster.instance_recorders[0].started.lock().expect("lock");
    assert_eq!(started.len(), 1);
    assert_eq!(started[0], json!({"instance_id": 7, "save": "a.zip"}));
}

#[tokio::test]
async fn banlist_update_reaches_every_instance_exactly_once() {
    let cluster = Cluster::new(PermissionSet::admin(), 3);
    let spec = cluster.catalog.event("banlist_update").expect("spec");

    let payload = json!({"name": "X", "banned": true, "reason": "r"});
    cluster
        .host_controller
        .send_event(spec, payload.clone())
        .expect("emit toward controller");

    wait_until(|| {
        cluster
            .instance_recorders
            .iter()
            .all(|recorder| recorder.banlist_count() == 1)
    })
    .await;

    for recorder in &cluster.instance_recorders {
        let received = recorder.banlist_updates.lock().expect("lock");
        assert_eq!(received.len(), 1, "each instance sees exactly one copy");
        assert_eq!(received[0], payload);
    }
    // The host's own handler ran exactly once, on the copy broadcast
    // back down by the controller.
    assert_eq!(cluster.host_recorder.banlist_count(), 1);
}

#[tokio::test]
async fn send_rcon_to_unassigned_instance_is_a_request_error() {
    let cluster = Cluster::new(PermissionSet::admin(), 1);

    // Instance 7 exists; 99 was never assigned
    let err = cluster
        .send("send_rcon", json!({"instance_id": 99, "command": "/foo"}))
        .await
        .unwrap_err();
    match err {
        LinkError::Request(message) => {
            assert!(message.contains("instance 99"));
            assert!(message.contains("not assigned"));
        }
        other => panic!("expected request error, got {other:?}"),
    }
}

#[tokio::test]
async fn send_rcon_round_trips_to_the_instance() {
    let cluster = Cluster::new(PermissionSet::admin(), 1);

    let response = cluster
        .send("send_rcon", json!({"instance_id": 7, "command": "/players"}))
        .await
        .expect("response");
    assert_eq!(response["result"], "ran /players");

    let commands = cluster.instance_recorders[0].rcon_commands.lock().expect("lock");
    assert_eq!(commands.len(), 1);
}

#[tokio::test]
async fn transport_close_fails_the_in_flight_request() {
    let cluster = Cluster::new(PermissionSet::admin(), 0);

    let waiter = {
        let control = cluster.control.clone();
        let spec = cluster.catalog.request("generate_host_token").expect("spec").clone();
        tokio::spawn(async move { control.send_request(&spec, json!({"host_id": null})).await })
    };

    // The handler has been entered and will never respond
    cluster.hang_entered.notified().await;
    cluster.controller_control.close("test shutdown");

    let result = waiter.await.expect("task");
    assert!(matches!(result.unwrap_err(), LinkError::Disconnected));
    assert_eq!(cluster.control.pending_count(), 0);
}

#[tokio::test]
async fn response_seq_matches_request_seq() {
    let cluster = Cluster::new(PermissionSet::admin(), 0);

    let first = cluster.send("ping", json!({})).await.expect("first");
    let second = cluster.send("ping", json!({})).await.expect("second");
    assert_eq!(first["seq"], 1);
    assert_eq!(second["seq"], 2);
}

#[tokio::test]
async fn request_error_from_the_controller_handler_surfaces() {
    let cluster = Cluster::new(PermissionSet::admin(), 0);

    let err = cluster.send("get_instance", json!({"id": 404})).await.unwrap_err();
    assert!(matches!(err, LinkError::Request(msg) if msg.contains("does not exist")));

    let ok = cluster.send("get_instance", json!({"id": 7})).await.expect("response");
    assert_eq!(ok["instance"]["name"], "inst");
}

#[tokio::test]
async fn invalid_control_payload_never_reaches_the_wire() {
    let cluster = Cluster::new(PermissionSet::admin(), 0);

    let err = cluster
        .send("send_rcon", json!({"command": "/foo"}))
        .await
        .unwrap_err();
    assert!(matches!(err, LinkError::InvalidPayload { .. }));
    assert_eq!(cluster.control.pending_count(), 0);
}

#[tokio::test]
async fn prepare_disconnect_quiesces_the_peer() {
    let cluster = Cluster::new(PermissionSet::admin(), 0);
    let spec = cluster.catalog.request("prepare_disconnect").expect("spec");

    // Controller asks the control client to quiesce, then closes.
    let response = cluster
        .controller_control
        .send_request(spec, json!({}))
        .await
        .expect("peer acknowledged");
    assert_eq!(response["seq"], 1);

    cluster.controller_control.close("shutdown");
    wait_until(|| cluster.control.is_closed()).await;
    assert_eq!(cluster.control.pending_count(), 0);
}
