use parking_lot::Mutex;
use route_notify::{OperationCode, RouteRegistry, RouteSnapshot, RouteSubscriber, SubscriberId};
use std::sync::Arc;

pub(crate) const MASK_24: &str = "255.255.255.0";

#[allow(dead_code)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Notification {
    pub(crate) subscriber_id: SubscriberId,
    pub(crate) op: OperationCode,
    pub(crate) snapshot: RouteSnapshot,
}

/// Subscriber that records every notification it receives, in arrival order.
#[derive(Clone, Default)]
pub(crate) struct RecordingSubscriber {
    log: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingSubscriber {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn handle(&self) -> Arc<dyn RouteSubscriber> {
        Arc::new(self.clone())
    }

    #[allow(dead_code)]
    pub(crate) fn notifications(&self) -> Vec<Notification> {
        self.log.lock().clone()
    }

    #[allow(dead_code)]
    pub(crate) fn ops(&self) -> Vec<(SubscriberId, OperationCode)> {
        self.log
            .lock()
            .iter()
            .map(|notification| (notification.subscriber_id, notification.op))
            .collect()
    }

    #[allow(dead_code)]
    pub(crate) fn clear(&self) {
        self.log.lock().clear();
    }
}

impl RouteSubscriber for RecordingSubscriber {
    fn notify(&self, snapshot: &RouteSnapshot, op: OperationCode, subscriber_id: SubscriberId) {
        self.log.lock().push(Notification {
            subscriber_id,
            op,
            snapshot: snapshot.clone(),
        });
    }
}

pub(crate) fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Registry pre-loaded with the three routes a publisher announces at start-up.
#[allow(dead_code)]
pub(crate) fn published_registry(description: &str) -> RouteRegistry {
    let registry = RouteRegistry::new(description);
    for (destination, gateway) in [
        ("192.168.1.2", "192.168.0.1"),
        ("192.168.1.3", "192.168.0.2"),
        ("192.168.1.4", "192.168.0.3"),
    ] {
        registry
            .add_or_update(destination, MASK_24, Some("eth0"), Some(gateway))
            .expect("fixture route should publish");
    }
    registry
}
