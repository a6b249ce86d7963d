//! Link runtime for the warden cluster.
//!
//! This crate turns the static declarations of `warden-proto` into
//! live message flow: transport connectors, link endpoints with
//! serial dispatch, request/response correlation, multi-hop
//! forwarding, instance broadcast and the controller-side permission
//! gate.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Protocol SDK Layer                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  warden-types  : Role, Edge, InstanceId, Permission          │
//! │  warden-proto  : Envelope, schemas, catalog                  │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Runtime Layer (THIS CRATE)                  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  connector : transport adapter, sequence numbering           │
//! │  link      : dispatch, pending awaiters, teardown            │
//! │  attach    : catalog → link binding, permission gate         │
//! │  forward   : relay toward instance/controller, broadcast     │
//! │  routes    : per-node routing state                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # A Node in Five Steps
//!
//! ```
//! use serde_json::json;
//! use warden_link::{attach_all, ChannelConnector, HandlerTable, Link, LinkConfig, RouteTable};
//! use warden_proto::Catalog;
//! use warden_types::Role;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! // 1. The catalog is built once per process
//! let catalog = Catalog::standard().unwrap();
//!
//! // 2. Each node owns one route table shared by its links
//! let routes = RouteTable::new();
//!
//! // 3. A transport connection produces a connector pair
//! let (host_end, instance_end) = ChannelConnector::pair();
//!
//! // 4. Wrap each side in a link and bind the catalog
//! let host = Link::new(Role::Host, Role::Instance, host_end.connector,
//!                      routes.clone(), LinkConfig::default());
//! let instance = Link::new(Role::Instance, Role::Host, instance_end.connector,
//!                          RouteTable::new(), LinkConfig::default());
//!
//! let instance_handlers = HandlerTable::new()
//!     .on_request("ping", |_ctx, _data| async { Ok(json!({})) })
//!     // ... one entry per message the instance serves ...
//! #   .on_request("prepare_disconnect", |_ctx, _data| async { Ok(json!({})) })
//! #   .on_request("prepare_controller_disconnect", |_ctx, _data| async { Ok(json!({})) })
//! #   .on_request("start_instance", |_ctx, _data| async { Ok(json!({})) })
//! #   .on_request("stop_instance", |_ctx, _data| async { Ok(json!({})) })
//! #   .on_request("kill_instance", |_ctx, _data| async { Ok(json!({})) })
//! #   .on_request("load_scenario", |_ctx, _data| async { Ok(json!({})) })
//! #   .on_request("export_data", |_ctx, _data| async { Ok(json!({})) })
//! #   .on_request("extract_players", |_ctx, _data| async { Ok(json!({})) })
//! #   .on_request("send_rcon", |_ctx, _data| async { Ok(json!({"result": ""})) })
//! #   .on_request("create_save", |_ctx, _data| async { Ok(json!({})) })
//! #   .on_request("list_saves", |_ctx, _data| async { Ok(json!({"list": []})) })
//! #   .on_request("get_metrics", |_ctx, _data| async { Ok(json!({"results": []})) })
//! #   .on_event("controller_connection_event", |_ctx, _data| async { Ok(()) })
//! #   .on_event("banlist_update", |_ctx, _data| async { Ok(()) })
//! #   .on_event("adminlist_update", |_ctx, _data| async { Ok(()) })
//! #   .on_event("whitelist_update", |_ctx, _data| async { Ok(()) })
//!     ;
//! attach_all(&instance, &catalog, &instance_handlers).unwrap();
//!
//! // The host side of the same link is itself a target for the
//! // instance-originated traffic
//! let host_handlers = HandlerTable::new()
//!     .on_request("ping", |_ctx, _data| async { Ok(json!({})) })
//! #   .on_request("prepare_disconnect", |_ctx, _data| async { Ok(json!({})) })
//! #   .on_event("instance_initialized", |_ctx, _data| async { Ok(()) })
//! #   .on_event("instance_status_changed", |_ctx, _data| async { Ok(()) })
//! #   .on_event("log_message", |_ctx, _data| async { Ok(()) })
//!     // ... and so on ...
//!     ;
//! attach_all(&host, &catalog, &host_handlers).unwrap();
//!
//! // 5. Drive each side's serve loop on its own task
//! tokio::spawn(instance.clone().serve(instance_end.receiver));
//! tokio::spawn(host.clone().serve(host_end.receiver));
//!
//! let ping = catalog.request("ping").unwrap();
//! let response = host.send_request(ping, json!({})).await.unwrap();
//! assert_eq!(response["seq"], 1);
//! # }
//! ```
//!
//! # Concurrency Model
//!
//! Each link dispatches inbound envelopes serially in arrival order
//! on its own serve task; handlers may suspend, e.g. while a
//! forwarder awaits the downstream response. Links share nothing but
//! the immutable catalog and their node's [`RouteTable`]. Response
//! correlation uses oneshot channels, so an awaiter wakes as soon as
//! its response is dispatched on whichever link carries it.

mod attach;
mod auth;
mod config;
mod connector;
mod context;
mod error;
mod forward;
mod handler;
mod link;
mod routes;

pub use attach::attach_all;
pub use auth::{CallerIdentity, DefaultPolicy, PermissionPolicy};
pub use config::{LinkConfig, DEFAULT_REQUEST_TIMEOUT_MS};
pub use connector::{ChannelConnector, Connector, ConnectorEnd};
pub use context::CallContext;
pub use error::{HandlerError, LinkError};
pub use forward::{
    broadcast_to_instances, event_to_controller, event_to_instance, request_to_controller,
    request_to_instance,
};
pub use handler::{event_handler, request_handler, EventHandler, HandlerTable, RequestHandler};
pub use link::Link;
pub use routes::RouteTable;
