//! Subscriber capability and the registrations that bind it to an entry.

use crate::intrusive_list::{Link, Linked, NodeId};
use crate::route_entry::RouteSnapshot;
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Caller-chosen identity of a subscriber, echoed back on every notification.
pub type SubscriberId = u32;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
/// What happened to the entry a notification is about.
pub enum OperationCode {
    /// Sent once to a subscriber joining an entry that already holds route data.
    Subscribed,
    Add,
    Modify,
    Delete,
}

impl OperationCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationCode::Subscribed => "subscribed",
            OperationCode::Add => "add",
            OperationCode::Modify => "modify",
            OperationCode::Delete => "delete",
        }
    }
}

impl Display for OperationCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives route notifications.
///
/// Called synchronously on the mutating thread, after the table lock has been released.
/// Implementations may call back into the registry but should return promptly: the
/// mutator does not continue until every subscriber of the entry has returned.
///
/// Closures with the matching signature implement this trait directly:
///
/// ```
/// use std::sync::Arc;
/// use route_notify::{OperationCode, RouteSnapshot, RouteSubscriber, SubscriberId};
///
/// let subscriber: Arc<dyn RouteSubscriber> =
///     Arc::new(|snapshot: &RouteSnapshot, op: OperationCode, id: SubscriberId| {
///         println!("subscriber {id}: {op} {snapshot}");
///     });
/// # let _ = subscriber;
/// ```
pub trait RouteSubscriber: Send + Sync {
    fn notify(&self, snapshot: &RouteSnapshot, op: OperationCode, subscriber_id: SubscriberId);
}

impl<F> RouteSubscriber for F
where
    F: Fn(&RouteSnapshot, OperationCode, SubscriberId) + Send + Sync,
{
    fn notify(&self, snapshot: &RouteSnapshot, op: OperationCode, subscriber_id: SubscriberId) {
        self(snapshot, op, subscriber_id)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
/// Result of a successful subscribe call.
pub enum SubscriptionStatus {
    /// The entry was active; the current state has already been delivered.
    Delivered,
    /// No route data exists yet; the first add for the key will be delivered.
    Pending,
    /// The subscriber was already registered and the duplicate was ignored.
    AlreadySubscribed,
}

/// Links one subscriber into exactly one entry's subscriber list.
pub(crate) struct SubscriberRegistration {
    pub(crate) subscriber_id: SubscriberId,
    pub(crate) subscriber: Arc<dyn RouteSubscriber>,
    /// Back-reference to the entry whose list holds this registration.
    pub(crate) owner: NodeId,
    link: Link,
}

impl SubscriberRegistration {
    pub(crate) fn new(
        subscriber_id: SubscriberId,
        subscriber: Arc<dyn RouteSubscriber>,
        owner: NodeId,
    ) -> Self {
        Self {
            subscriber_id,
            subscriber,
            owner,
            link: Link::default(),
        }
    }
}

impl Linked for SubscriberRegistration {
    fn link(&self) -> &Link {
        &self.link
    }

    fn link_mut(&mut self) -> &mut Link {
        &mut self.link
    }
}

#[cfg(test)]
mod tests {
    use super::{OperationCode, RouteSubscriber, SubscriberId};
    use crate::route_entry::{RouteEntry, RouteKey, RouteSnapshot};
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn operation_code_strings_are_stable() {
        assert_eq!(OperationCode::Subscribed.to_string(), "subscribed");
        assert_eq!(OperationCode::Add.to_string(), "add");
        assert_eq!(OperationCode::Modify.to_string(), "modify");
        assert_eq!(OperationCode::Delete.as_str(), "delete");
    }

    #[test]
    fn closure_subscriber_receives_arguments() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let subscriber: Arc<dyn RouteSubscriber> = Arc::new(
            move |snapshot: &RouteSnapshot, op: OperationCode, id: SubscriberId| {
                sink.lock().push((snapshot.key(), op, id));
            },
        );

        let snapshot = RouteEntry::placeholder(RouteKey::new("10.0.0.0", "255.0.0.0")).snapshot();
        subscriber.notify(&snapshot, OperationCode::Add, 4);

        assert_eq!(
            *seen.lock(),
            vec![(RouteKey::new("10.0.0.0", "255.0.0.0"), OperationCode::Add, 4)]
        );
    }
}
