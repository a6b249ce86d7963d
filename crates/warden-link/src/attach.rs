//! Attaching catalog entries to links.
//!
//! [`attach_all`] binds the whole catalog to a freshly connected
//! link: it iterates the registry in deterministic order, looks each
//! entry up in the node's [`HandlerTable`] and applies the
//! per-descriptor attach rules. Startup fails loudly: a target link
//! lacking a required handler aborts with an error naming the message
//! and the link's role pair.
//!
//! # Attach Rules
//!
//! For a request on a link classified by [`RequestSpec::flow`]:
//!
//! - *Origin* side: register the response validator so inbound
//!   responses are validated before resolving the awaiter.
//! - *Target* side: pick the handler: the table entry if present,
//!   else the forwarding default when the descriptor declares a
//!   forward target, else fail. If the descriptor carries a
//!   permission and this is the controller side of a control link,
//!   wrap the handler in the permission gate.
//!
//! For an event on a target link: pick the handler the same way, and
//! when the descriptor broadcasts to instances and this node is a
//! broadcast hop (controller or host), wrap it to fan out before
//! handling.

use crate::auth::PermissionGate;
use crate::error::LinkError;
use crate::forward;
use crate::handler::{EventHandler, HandlerTable, RequestHandler};
use crate::link::Link;
use std::sync::Arc;
use tracing::debug;
use warden_proto::{BroadcastTarget, Catalog, Descriptor, EventSpec, Flow, ForwardTarget, RequestSpec};
use warden_types::Role;

impl Link {
    /// Applies the request attach rules for one descriptor.
    ///
    /// # Errors
    ///
    /// - [`LinkError::MissingHandler`] when this side must handle the
    ///   request but no handler is available
    /// - [`LinkError::DuplicateHandler`] when the descriptor was
    ///   already attached
    pub fn attach_request(
        self: &Arc<Self>,
        spec: &Arc<RequestSpec>,
        handler: Option<Arc<dyn RequestHandler>>,
    ) -> Result<(), LinkError> {
        let flow = spec.flow(self.source(), self.target());
        if flow == Flow::Unrelated {
            return Ok(());
        }

        if matches!(flow, Flow::Origin | Flow::Both) {
            self.set_validator(spec)?;
        }

        if matches!(flow, Flow::Target | Flow::Both) {
            let handler = match handler.or_else(|| self.forward_request_default(spec)) {
                Some(handler) => handler,
                None => {
                    return Err(LinkError::MissingHandler {
                        message: spec.name().to_string(),
                        source_role: self.source(),
                        target: self.target(),
                    })
                }
            };

            let handler = match spec.permission() {
                // Only the controller side of a control link is
                // untrusted; everything else skips the gate.
                Some(permission)
                    if (self.source(), self.target()) == (Role::Controller, Role::Control) =>
                {
                    Arc::new(PermissionGate::new(
                        permission.clone(),
                        self.policy(),
                        handler,
                    )) as Arc<dyn RequestHandler>
                }
                _ => handler,
            };

            self.set_request_handler(spec, handler)?;
        }

        Ok(())
    }

    /// Applies the event attach rules for one descriptor.
    ///
    /// # Errors
    ///
    /// As [`attach_request`](Self::attach_request).
    pub fn attach_event(
        self: &Arc<Self>,
        spec: &Arc<EventSpec>,
        handler: Option<Arc<dyn EventHandler>>,
    ) -> Result<(), LinkError> {
        let flow = spec.flow(self.source(), self.target());
        if !matches!(flow, Flow::Target | Flow::Both) {
            return Ok(());
        }

        let handler = match handler.or_else(|| self.forward_event_default(spec)) {
            Some(handler) => handler,
            None => {
                return Err(LinkError::MissingHandler {
                    message: spec.name().to_string(),
                    source_role: self.source(),
                    target: self.target(),
                })
            }
        };

        let handler = if spec.broadcast_to() == Some(BroadcastTarget::Instance)
            && matches!(self.source(), Role::Controller | Role::Host)
        {
            Arc::new(forward::BroadcastThenHandle {
                spec: spec.clone(),
                routes: self.routes().clone(),
                inner: handler,
            }) as Arc<dyn EventHandler>
        } else {
            handler
        };

        self.set_event_handler(spec, handler)
    }

    fn forward_request_default(&self, spec: &Arc<RequestSpec>) -> Option<Arc<dyn RequestHandler>> {
        match spec.forward_to()? {
            ForwardTarget::Instance => Some(forward::request_to_instance(
                spec.clone(),
                self.routes().clone(),
            )),
            ForwardTarget::Controller => Some(forward::request_to_controller(
                spec.clone(),
                self.routes().clone(),
            )),
        }
    }

    fn forward_event_default(&self, spec: &Arc<EventSpec>) -> Option<Arc<dyn EventHandler>> {
        match spec.forward_to()? {
            ForwardTarget::Instance => Some(forward::event_to_instance(
                spec.clone(),
                self.routes().clone(),
            )),
            ForwardTarget::Controller => Some(forward::event_to_controller(
                spec.clone(),
                self.routes().clone(),
            )),
        }
    }
}

/// Binds every catalog entry to a link using the node's handler
/// table.
///
/// # Errors
///
/// Propagates the first attach failure. The error already names the
/// message and the link's role pair; startup should treat it as
/// fatal.
pub fn attach_all(
    link: &Arc<Link>,
    catalog: &Catalog,
    handlers: &HandlerTable,
) -> Result<(), LinkError> {
    for (name, entry) in catalog.iter() {
        match entry {
            Descriptor::Request(spec) => {
                link.attach_request(spec, handlers.request(name).cloned())?;
            }
            Descriptor::Event(spec) => {
                link.attach_event(spec, handlers.event(name).cloned())?;
            }
        }
    }
    debug!(
        link = %link.id(),
        source = %link.source(),
        target = %link.target(),
        entries = catalog.len(),
        "catalog attached"
    );
    Ok(())
}
