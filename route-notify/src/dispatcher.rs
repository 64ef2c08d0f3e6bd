//! Notification fan-out for a single entry mutation.
//!
//! A [`Dispatch`] is built while the table lock is held and delivered after it is
//! released, so subscribers may call back into the registry without deadlocking.

use crate::error::{Result, RouteTableError};
use crate::intrusive_list::{Arena, NodeId};
use crate::observability::events;
use crate::route_entry::{RouteEntry, RouteSnapshot};
use crate::subscriber::{OperationCode, RouteSubscriber, SubscriberId, SubscriberRegistration};
use std::sync::Arc;
use tracing::trace;

const COMPONENT: &str = "dispatcher";

struct Recipient {
    subscriber_id: SubscriberId,
    subscriber: Arc<dyn RouteSubscriber>,
}

#[must_use = "a dispatch does nothing until delivered"]
/// Detached notification: entry snapshot, operation, and recipients in registration order.
pub(crate) struct Dispatch {
    entry: NodeId,
    snapshot: RouteSnapshot,
    op: OperationCode,
    recipients: Vec<Recipient>,
}

impl Dispatch {
    /// Captures every registration of `entry`, in list order.
    ///
    /// The snapshot is taken now; callers that mutate the entry afterwards refresh it
    /// with [`Dispatch::refresh`].
    pub(crate) fn collect(
        entry_id: NodeId,
        entry: &RouteEntry,
        registrations: &Arena<SubscriberRegistration>,
        op: OperationCode,
    ) -> Result<Self> {
        let mut recipients = Vec::new();
        recipients
            .try_reserve_exact(entry.subscribers.len())
            .map_err(RouteTableError::allocation("notification recipients"))?;
        recipients.extend(
            entry
                .subscribers
                .iter(registrations)
                .map(|(_, registration)| Recipient {
                    subscriber_id: registration.subscriber_id,
                    subscriber: registration.subscriber.clone(),
                }),
        );

        Ok(Self {
            entry: entry_id,
            snapshot: entry.snapshot(),
            op,
            recipients,
        })
    }

    /// A notification addressed to one subscriber only.
    pub(crate) fn single(
        entry: NodeId,
        snapshot: RouteSnapshot,
        op: OperationCode,
        subscriber_id: SubscriberId,
        subscriber: Arc<dyn RouteSubscriber>,
    ) -> Self {
        Self {
            entry,
            snapshot,
            op,
            recipients: vec![Recipient {
                subscriber_id,
                subscriber,
            }],
        }
    }

    pub(crate) fn refresh(&mut self, entry: &RouteEntry, op: OperationCode) {
        self.snapshot = entry.snapshot();
        self.op = op;
    }

    /// Handle of the entry this notification describes.
    pub(crate) fn entry(&self) -> NodeId {
        self.entry
    }

    pub(crate) fn op(&self) -> OperationCode {
        self.op
    }

    pub(crate) fn snapshot(&self) -> &RouteSnapshot {
        &self.snapshot
    }

    /// Invokes every recipient in order and returns how many were called.
    pub(crate) fn deliver(self) -> usize {
        trace!(
            event = events::NOTIFY_DISPATCH,
            component = COMPONENT,
            destination = %self.snapshot.destination,
            mask = %self.snapshot.mask,
            op = %self.op,
            recipients = self.recipients.len(),
            "delivering notification"
        );

        for recipient in &self.recipients {
            recipient
                .subscriber
                .notify(&self.snapshot, self.op, recipient.subscriber_id);
        }
        self.recipients.len()
    }
}
