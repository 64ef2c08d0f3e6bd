//! Producer and consumer threads driving one shared registry.

use crate::config::{PublisherConfig, SubscriberConfig};
use crate::error::DemoError;
use route_notify::observability::fields;
use route_notify::{
    OperationCode, RouteRegistry, RouteSnapshot, RouteSubscriber, RouteTableError, SubscriberId,
};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::info;

const PRODUCER_THREAD_NAME: &str = "route-producer";
const CONSUMER_THREAD_NAME: &str = "route-consumer";

/// Logs every notification it receives.
pub(crate) struct LoggingSubscriber;

impl RouteSubscriber for LoggingSubscriber {
    fn notify(&self, snapshot: &RouteSnapshot, op: OperationCode, subscriber_id: SubscriberId) {
        info!(
            subscriber_id,
            op = op.as_str(),
            destination = %snapshot.destination,
            mask = %snapshot.mask,
            oif = fields::format_optional(snapshot.outgoing_interface.as_deref()),
            gateway = fields::format_optional(snapshot.gateway.as_deref()),
            "route notification"
        );
    }
}

pub(crate) fn spawn_producer(
    registry: RouteRegistry,
    publisher: PublisherConfig,
) -> Result<JoinHandle<Result<usize, RouteTableError>>, DemoError> {
    let handle = thread::Builder::new()
        .name(PRODUCER_THREAD_NAME.to_string())
        .spawn(move || -> Result<usize, RouteTableError> {
            for route in &publisher.routes {
                registry.add_or_update(
                    &route.destination,
                    &route.mask,
                    route.outgoing_interface.as_deref(),
                    route.gateway.as_deref(),
                )?;
            }
            info!(routes = publisher.routes.len(), "publisher finished");
            Ok(publisher.routes.len())
        })?;
    Ok(handle)
}

pub(crate) fn spawn_consumer(
    registry: RouteRegistry,
    subscriber: SubscriberConfig,
    callback: Arc<dyn RouteSubscriber>,
) -> Result<JoinHandle<Result<usize, RouteTableError>>, DemoError> {
    let handle = thread::Builder::new()
        .name(CONSUMER_THREAD_NAME.to_string())
        .spawn(move || -> Result<usize, RouteTableError> {
            for subscription in &subscriber.subscriptions {
                let status = registry.subscribe(
                    &subscription.destination,
                    &subscription.mask,
                    callback.clone(),
                    subscription.subscriber_id,
                )?;
                info!(
                    subscriber_id = subscription.subscriber_id,
                    destination = %subscription.destination,
                    mask = %subscription.mask,
                    status = ?status,
                    "subscribed"
                );
            }
            Ok(subscriber.subscriptions.len())
        })?;
    Ok(handle)
}

/// Joins a worker, turning a panic into an error naming the thread.
pub(crate) fn join_worker(
    name: &'static str,
    handle: JoinHandle<Result<usize, RouteTableError>>,
) -> Result<usize, DemoError> {
    let outcome = handle
        .join()
        .map_err(|_| DemoError::WorkerPanicked(name))?;
    Ok(outcome?)
}
