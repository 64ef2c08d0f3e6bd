/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

mod support;

use parking_lot::Mutex;
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use route_notify::{
    EntryState, OperationCode, RouteKey, RoutePatch, RouteRegistry, RouteSnapshot,
    RouteSubscriber, RouteTableError, SubscriberId, SubscriptionStatus,
};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use support::{init_logging, Notification, RecordingSubscriber, MASK_24};

const PRODUCERS: usize = 4;
const CONSUMERS: usize = 3;
const KEYS_PER_PRODUCER: usize = 4;

fn producer_destination(producer: usize, key: usize) -> String {
    format!("10.{producer}.{key}.0")
}

fn assert_unique_keys(entries: &[RouteSnapshot]) {
    let mut seen = HashSet::new();
    for entry in entries {
        assert!(seen.insert(entry.key()), "duplicate key {}", entry.key());
    }
}

/// One producer step against one of the producer's own keys.
#[derive(Clone, Copy, Debug)]
enum Step {
    Publish(usize),
    Modify(usize),
    Remove(usize),
}

fn arb_schedule() -> impl Strategy<Value = Vec<Step>> {
    prop::collection::vec(
        prop_oneof![
            3 => (0..KEYS_PER_PRODUCER).prop_map(Step::Publish),
            2 => (0..KEYS_PER_PRODUCER).prop_map(Step::Modify),
            2 => (0..KEYS_PER_PRODUCER).prop_map(Step::Remove),
        ],
        1..40,
    )
}

/// Every published or modified route carries the index of the step that wrote it.
fn interface_for(step: usize) -> String {
    format!("eth{step}")
}

fn step_of(snapshot: &RouteSnapshot) -> Option<usize> {
    snapshot
        .outgoing_interface
        .as_deref()
        .and_then(|oif| oif.strip_prefix("eth"))
        .and_then(|step| step.parse().ok())
}

fn run_schedule(registry: &RouteRegistry, producer: usize, schedule: &[Step]) {
    for (index, step) in schedule.iter().enumerate() {
        let interface = interface_for(index);
        let outcome = match *step {
            Step::Publish(key) => registry
                .add_or_update(
                    &producer_destination(producer, key),
                    MASK_24,
                    Some(interface.as_str()),
                    None,
                )
                .map(|_| ()),
            Step::Modify(key) => registry
                .modify(
                    &producer_destination(producer, key),
                    MASK_24,
                    &RoutePatch::new().outgoing_interface(&interface),
                )
                .map(|_| ()),
            Step::Remove(key) => registry
                .remove(&producer_destination(producer, key), MASK_24)
                .map(|_| ()),
        };
        assert!(
            matches!(outcome, Ok(()) | Err(RouteTableError::NotFound { .. })),
            "producer {producer} step {index} {step:?} failed: {outcome:?}"
        );
    }
}

/// Final route data per destination, replayed sequentially from one producer's steps.
fn expected_routes(producer: usize, schedule: &[Step]) -> BTreeMap<String, usize> {
    let mut routes = BTreeMap::new();
    for (index, step) in schedule.iter().enumerate() {
        match *step {
            Step::Publish(key) => {
                routes.insert(producer_destination(producer, key), index);
            }
            Step::Modify(key) => {
                if let Some(written) = routes.get_mut(&producer_destination(producer, key)) {
                    *written = index;
                }
            }
            Step::Remove(key) => {
                routes.remove(&producer_destination(producer, key));
            }
        }
    }
    routes
}

/// Checks what one subscriber saw on one key against the table it left behind.
fn check_subscriber_view(
    registry: &RouteRegistry,
    destination: &str,
    subscriber_id: SubscriberId,
    seen: &[&Notification],
) -> Result<(), TestCaseError> {
    let current = registry.lookup_by_key(destination, MASK_24).unwrap();
    let Some(last) = seen.last() else {
        // Never notified: the key was never published while subscribed, so the
        // placeholder created for this subscription is still waiting.
        prop_assert_eq!(current.map(|entry| entry.state), Some(EntryState::Placeholder));
        return Ok(());
    };

    prop_assert!(
        matches!(seen[0].op, OperationCode::Subscribed | OperationCode::Add),
        "{destination} subscriber {subscriber_id} started with {:?}",
        seen[0].op
    );
    let steps: Vec<Option<usize>> = seen.iter().map(|n| step_of(&n.snapshot)).collect();
    prop_assert!(steps.iter().all(Option::is_some));
    prop_assert!(
        steps.windows(2).all(|pair| pair[0] <= pair[1]),
        "{destination} subscriber {subscriber_id} saw steps out of order: {steps:?}"
    );
    for notification in &seen[..seen.len() - 1] {
        prop_assert_ne!(notification.op, OperationCode::Delete);
    }

    if last.op != OperationCode::Delete {
        // Still registered, so the last thing delivered is what the table holds.
        let current = current.expect("entry with a live registration is present");
        prop_assert_eq!(&current, &last.snapshot);
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_random_producer_schedules_keep_table_and_subscribers_consistent(
        schedules in prop::collection::vec(arb_schedule(), PRODUCERS)
    ) {
        let registry = RouteRegistry::new("randomized");
        let recorder = RecordingSubscriber::new();

        thread::scope(|scope| {
            for (producer, schedule) in schedules.iter().enumerate() {
                let registry = registry.clone();
                scope.spawn(move || run_schedule(&registry, producer, schedule));
            }

            for consumer in 0..CONSUMERS {
                let registry = registry.clone();
                let recorder = recorder.clone();
                scope.spawn(move || {
                    let subscriber_id = consumer as SubscriberId + 1;
                    for producer in (0..PRODUCERS).rev() {
                        for key in 0..KEYS_PER_PRODUCER {
                            registry
                                .subscribe(
                                    &producer_destination(producer, key),
                                    MASK_24,
                                    recorder.handle(),
                                    subscriber_id,
                                )
                                .expect("each consumer subscribes once per key");
                        }
                        assert_unique_keys(&registry.entries().expect("registry is live"));
                    }
                });
            }
        });

        let entries = registry.entries().unwrap();
        assert_unique_keys(&entries);

        let expected: BTreeMap<String, usize> = schedules
            .iter()
            .enumerate()
            .flat_map(|(producer, schedule)| expected_routes(producer, schedule))
            .collect();
        let active: BTreeMap<String, usize> = entries
            .iter()
            .filter(|entry| entry.is_active())
            .map(|entry| (entry.destination.clone(), step_of(entry).unwrap_or(usize::MAX)))
            .collect();
        prop_assert_eq!(&active, &expected);
        prop_assert_eq!(registry.active_count(), Ok(expected.len()));
        for entry in entries.iter().filter(|entry| !entry.is_active()) {
            prop_assert!(entry.outgoing_interface.is_none() && entry.gateway.is_none());
        }

        let notifications = recorder.notifications();
        for consumer in 0..CONSUMERS {
            let subscriber_id = consumer as SubscriberId + 1;
            for producer in 0..PRODUCERS {
                for key in 0..KEYS_PER_PRODUCER {
                    let destination = producer_destination(producer, key);
                    let seen: Vec<&Notification> = notifications
                        .iter()
                        .filter(|n| {
                            n.subscriber_id == subscriber_id && n.snapshot.destination == destination
                        })
                        .collect();
                    check_subscriber_view(&registry, &destination, subscriber_id, &seen)?;
                }
            }
        }
    }
}

/// Subscriber that blocks inside the first notification matching `gate` until the test
/// releases it, recording `(op, gateway)` once each callback completes.
struct GatedSubscriber {
    seen: Arc<Mutex<Vec<(OperationCode, Option<String>)>>>,
    entered: mpsc::Receiver<()>,
    release: mpsc::Sender<()>,
    handle: Arc<dyn RouteSubscriber>,
}

impl GatedSubscriber {
    fn new(gate: impl Fn(&RouteSnapshot, OperationCode) -> bool + Send + Sync + 'static) -> Self {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (entered_tx, entered) = mpsc::channel::<()>();
        let (release, release_rx) = mpsc::channel::<()>();
        let entered_tx = Mutex::new(entered_tx);
        let release_rx = Mutex::new(release_rx);
        let sink = seen.clone();
        let handle: Arc<dyn RouteSubscriber> = Arc::new(
            move |snapshot: &RouteSnapshot, op: OperationCode, _id: SubscriberId| {
                if gate(snapshot, op) {
                    entered_tx.lock().send(()).expect("test is listening");
                    release_rx.lock().recv().expect("test releases the callback");
                }
                sink.lock().push((op, snapshot.gateway.clone()));
            },
        );
        Self {
            seen,
            entered,
            release,
            handle,
        }
    }

    fn wait_until_blocked(&self) {
        self.entered
            .recv_timeout(Duration::from_secs(5))
            .expect("gated callback should start");
    }

    fn release(&self) {
        self.release.send(()).unwrap();
    }

    fn seen(&self) -> Vec<(OperationCode, Option<String>)> {
        self.seen.lock().clone()
    }
}

fn gateway(value: &str) -> Option<String> {
    Some(value.to_string())
}

#[test]
fn updates_to_one_key_reach_a_subscriber_in_the_order_they_were_applied() {
    init_logging();
    let registry = RouteRegistry::new("update-order");
    registry
        .add_or_update("10.0.0.0", MASK_24, Some("eth0"), Some("1.1.1.0"))
        .unwrap();
    let subscriber = GatedSubscriber::new(|snapshot, op| {
        op == OperationCode::Modify && snapshot.gateway.as_deref() == Some("1.1.1.1")
    });
    registry
        .subscribe("10.0.0.0", MASK_24, subscriber.handle.clone(), 1)
        .unwrap();

    let first = {
        let registry = registry.clone();
        thread::spawn(move || {
            registry.add_or_update("10.0.0.0", MASK_24, Some("eth0"), Some("1.1.1.1"))
        })
    };
    subscriber.wait_until_blocked();

    let second = {
        let registry = registry.clone();
        thread::spawn(move || {
            registry.add_or_update("10.0.0.0", MASK_24, Some("eth0"), Some("2.2.2.2"))
        })
    };
    // Readers are not held up by the pending delivery.
    let during = registry.lookup_by_key("10.0.0.0", MASK_24).unwrap().unwrap();
    assert_eq!(during.gateway, gateway("1.1.1.1"));
    thread::sleep(Duration::from_millis(50));
    assert!(!second.is_finished());

    subscriber.release();
    first.join().unwrap().unwrap();
    second.join().unwrap().unwrap();

    assert_eq!(
        subscriber.seen(),
        vec![
            (OperationCode::Subscribed, gateway("1.1.1.0")),
            (OperationCode::Modify, gateway("1.1.1.1")),
            (OperationCode::Modify, gateway("2.2.2.2")),
        ]
    );
    let current = registry.lookup_by_key("10.0.0.0", MASK_24).unwrap().unwrap();
    assert_eq!(current.gateway, gateway("2.2.2.2"));
}

#[test]
fn removal_waits_for_a_late_subscriber_to_receive_current_state() {
    init_logging();
    let registry = RouteRegistry::new("subscribe-then-delete");
    registry
        .add_or_update("10.0.0.0", MASK_24, Some("eth0"), Some("1.1.1.0"))
        .unwrap();
    let subscriber = GatedSubscriber::new(|_, op| op == OperationCode::Subscribed);

    let subscribing = {
        let registry = registry.clone();
        let handle = subscriber.handle.clone();
        thread::spawn(move || registry.subscribe("10.0.0.0", MASK_24, handle, 1))
    };
    subscriber.wait_until_blocked();

    let remover = {
        let registry = registry.clone();
        thread::spawn(move || registry.remove("10.0.0.0", MASK_24))
    };
    thread::sleep(Duration::from_millis(50));
    assert!(!remover.is_finished());
    assert!(registry.lookup_by_key("10.0.0.0", MASK_24).unwrap().is_some());

    subscriber.release();
    assert_eq!(
        subscribing.join().unwrap(),
        Ok(SubscriptionStatus::Delivered)
    );
    remover.join().unwrap().unwrap();

    assert_eq!(
        subscriber.seen(),
        vec![
            (OperationCode::Subscribed, gateway("1.1.1.0")),
            (OperationCode::Delete, gateway("1.1.1.0")),
        ]
    );
    assert_eq!(registry.lookup_by_key("10.0.0.0", MASK_24), Ok(None));
    assert_eq!(registry.count(), Ok(0));
}

#[test]
fn mutation_of_key_under_removal_waits_for_the_removal_to_finish() {
    init_logging();
    let registry = RouteRegistry::new("removal-wait");
    registry
        .add_or_update("10.0.0.0", MASK_24, Some("eth0"), Some("10.0.0.1"))
        .unwrap();

    let (entered_tx, entered_rx) = mpsc::channel::<()>();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let entered_tx = Mutex::new(entered_tx);
    let release_rx = Mutex::new(release_rx);
    let blocking: Arc<dyn RouteSubscriber> = Arc::new(
        move |_snapshot: &RouteSnapshot, op: OperationCode, _id: SubscriberId| {
            if op == OperationCode::Delete {
                entered_tx.lock().send(()).expect("test is listening");
                release_rx.lock().recv().expect("test releases the callback");
            }
        },
    );
    registry
        .subscribe("10.0.0.0", MASK_24, blocking, 1)
        .unwrap();

    let remover = {
        let registry = registry.clone();
        thread::spawn(move || registry.remove("10.0.0.0", MASK_24))
    };
    entered_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("delete callback should start");

    let writer = {
        let registry = registry.clone();
        thread::spawn(move || registry.add_or_update("10.0.0.0", MASK_24, Some("eth1"), None))
    };
    let reader_view = registry.lookup_by_key("10.0.0.0", MASK_24).unwrap();
    assert_eq!(
        reader_view.and_then(|entry| entry.outgoing_interface),
        Some("eth0".to_string())
    );
    thread::sleep(Duration::from_millis(50));
    assert!(!writer.is_finished());

    release_tx.send(()).unwrap();
    let removed = remover.join().unwrap().unwrap();
    assert_eq!(removed.outgoing_interface.as_deref(), Some("eth0"));

    let written = writer.join().unwrap().unwrap();
    assert_eq!(written.outgoing_interface.as_deref(), Some("eth1"));
    assert_eq!(registry.count(), Ok(1));
    assert_eq!(registry.subscriber_count("10.0.0.0", MASK_24), Ok(0));
}

#[test]
fn teardown_wakes_threads_waiting_on_a_removal() {
    init_logging();
    let registry = RouteRegistry::new("teardown-wait");
    registry
        .add_or_update("10.0.0.0", MASK_24, None, None)
        .unwrap();

    let (entered_tx, entered_rx) = mpsc::channel::<()>();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let entered_tx = Mutex::new(entered_tx);
    let release_rx = Mutex::new(release_rx);
    let blocking: Arc<dyn RouteSubscriber> = Arc::new(
        move |_snapshot: &RouteSnapshot, op: OperationCode, _id: SubscriberId| {
            if op == OperationCode::Delete {
                entered_tx.lock().send(()).expect("test is listening");
                release_rx.lock().recv().expect("test releases the callback");
            }
        },
    );
    registry
        .subscribe("10.0.0.0", MASK_24, blocking, 1)
        .unwrap();

    let remover = {
        let registry = registry.clone();
        thread::spawn(move || registry.remove("10.0.0.0", MASK_24))
    };
    entered_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("delete callback should start");

    let waiter = {
        let registry = registry.clone();
        thread::spawn(move || registry.unsubscribe("10.0.0.0", MASK_24, 1))
    };
    thread::sleep(Duration::from_millis(20));

    assert_eq!(registry.teardown(), Ok(1));
    assert_eq!(waiter.join().unwrap(), Err(RouteTableError::TornDown));

    release_tx.send(()).unwrap();
    assert!(remover.join().unwrap().is_ok());
    assert_eq!(registry.count(), Err(RouteTableError::TornDown));
}

#[derive(Clone, Debug)]
enum Op {
    Add(u8),
    Remove(u8),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![(0u8..12).prop_map(Op::Add), (0u8..12).prop_map(Op::Remove)]
}

proptest! {
    #[test]
    fn prop_count_matches_live_keys(ops in prop::collection::vec(arb_op(), 1..80)) {
        let registry = RouteRegistry::new("model");
        let mut model = BTreeSet::new();

        for op in ops {
            match op {
                Op::Add(key) => {
                    let destination = format!("10.0.{key}.0");
                    prop_assert!(registry.add_or_update(&destination, MASK_24, Some("eth0"), None).is_ok());
                    model.insert(RouteKey::new(&destination, MASK_24));
                }
                Op::Remove(key) => {
                    let destination = format!("10.0.{key}.0");
                    let removed = registry.remove(&destination, MASK_24);
                    prop_assert_eq!(removed.is_ok(), model.remove(&RouteKey::new(&destination, MASK_24)));
                }
            }

            let entries = registry.entries().unwrap();
            let live: BTreeSet<RouteKey> = entries.iter().map(RouteSnapshot::key).collect();
            prop_assert_eq!(live.len(), entries.len());
            prop_assert_eq!(registry.count().unwrap(), model.len());
            prop_assert_eq!(&live, &model);
        }
    }
}
