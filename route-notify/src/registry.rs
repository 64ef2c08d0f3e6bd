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

use crate::config::RegistryConfig;
use crate::dispatcher::Dispatch;
use crate::error::{Result, RouteTableError};
use crate::intrusive_list::NodeId;
use crate::observability::{events, fields};
use crate::route_entry::{RoutePatch, RouteSnapshot};
use crate::route_table::RouteTable;
use crate::subscriber::{OperationCode, RouteSubscriber, SubscriberId, SubscriptionStatus};
use parking_lot::{Condvar, Mutex};
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::thread;
use tracing::debug;

const COMPONENT: &str = "route_registry";

struct Shared {
    /// `None` once the registry has been torn down.
    table: Mutex<Option<RouteTable>>,
    delivery_done: Condvar,
}

/// Thread-safe handle to one route table and its subscriber chains.
///
/// Clones share the same table. Every mutation runs under a single table-wide lock;
/// subscriber callbacks run on the mutating thread after that lock has been released,
/// so they may freely call back into the registry.
///
/// While a notification for a key is being delivered, other threads mutating or
/// subscribing to that key wait for it to finish, so each subscriber sees the changes
/// of one key in the order they were applied. Lookups never wait.
#[derive(Clone)]
pub struct RouteRegistry {
    shared: Arc<Shared>,
}

impl RouteRegistry {
    pub fn new(description: &str) -> Self {
        let config = RegistryConfig {
            description: description.to_string(),
            ..Default::default()
        };
        Self::from_table(RouteTable::new(config))
    }

    pub fn with_config(config: RegistryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_table(RouteTable::new(config)))
    }

    fn from_table(table: RouteTable) -> Self {
        debug!(
            event = events::TABLE_INIT,
            component = COMPONENT,
            description = table.description(),
            "route table initialized"
        );
        Self {
            shared: Arc::new(Shared {
                table: Mutex::new(Some(table)),
                delivery_done: Condvar::new(),
            }),
        }
    }

    fn with_table<R>(&self, f: impl FnOnce(&mut RouteTable) -> Result<R>) -> Result<R> {
        let mut guard = self.shared.table.lock();
        match guard.as_mut() {
            Some(table) => f(table),
            None => Err(RouteTableError::TornDown),
        }
    }

    /// Runs `f` once no other thread is delivering a notification for this key.
    ///
    /// The delivering thread itself is let through rather than waiting on itself; the
    /// table refuses whatever it must not do mid-delivery.
    fn with_settled_key<R>(
        &self,
        destination: &str,
        mask: &str,
        f: impl FnOnce(&mut RouteTable) -> Result<R>,
    ) -> Result<R> {
        let current = thread::current().id();
        let mut guard = self.shared.table.lock();
        loop {
            let Some(table) = guard.as_mut() else {
                return Err(RouteTableError::TornDown);
            };
            match table.delivery_owner(destination, mask) {
                Some(owner) if owner != current => {
                    debug!(
                        event = events::DELIVERY_WAIT,
                        component = COMPONENT,
                        destination,
                        mask,
                        "waiting for concurrent notification to finish"
                    );
                    self.shared.delivery_done.wait(&mut guard);
                }
                _ => return f(table),
            }
        }
    }

    /// Delivers `dispatch` outside the lock, then clears the entry's delivery marker (or
    /// unlinks the entry, for a removal) and wakes waiters.
    fn deliver(&self, dispatch: Dispatch, removal: bool) -> usize {
        let _guard = DeliveryGuard {
            shared: &self.shared,
            entry_id: dispatch.entry(),
            removal,
        };
        dispatch.deliver()
    }

    fn report_failure(operation: &'static str, destination: &str, mask: &str, err: &RouteTableError) {
        debug!(
            event = events::ROUTE_OPERATION_FAILED,
            component = COMPONENT,
            operation,
            destination,
            mask,
            err = %err,
            "route operation failed"
        );
    }

    /// Publishes route data for the key, inserting a new entry or overwriting the
    /// existing one, and notifies the entry's subscribers with `Add` or `Modify`.
    pub fn add_or_update(
        &self,
        destination: &str,
        mask: &str,
        outgoing_interface: Option<&str>,
        gateway: Option<&str>,
    ) -> Result<RouteSnapshot> {
        let owner = thread::current().id();
        let dispatch = self
            .with_settled_key(destination, mask, |table| {
                let dispatch =
                    table.add_or_update(destination, mask, outgoing_interface, gateway)?;
                table.begin_delivery(&dispatch, owner);
                Ok(dispatch)
            })
            .inspect_err(|err| Self::report_failure("add_or_update", destination, mask, err))?;

        let snapshot = dispatch.snapshot().clone();
        let event = match dispatch.op() {
            OperationCode::Add => events::ROUTE_ADD_OK,
            _ => events::ROUTE_UPDATE_OK,
        };
        debug!(
            event,
            component = COMPONENT,
            destination,
            mask,
            oif = fields::format_optional(snapshot.outgoing_interface.as_deref()),
            gateway = fields::format_optional(snapshot.gateway.as_deref()),
            op = %dispatch.op(),
            "route published"
        );
        self.deliver(dispatch, false);
        Ok(snapshot)
    }

    /// Removes an active entry. Subscribers receive `Delete` while the entry is still
    /// linked and visible to lookups; it is unlinked once every callback has returned.
    ///
    /// Returns the entry as it was when the delete was announced.
    pub fn remove(&self, destination: &str, mask: &str) -> Result<RouteSnapshot> {
        let dispatch = self
            .with_settled_key(destination, mask, |table| {
                table.begin_removal(destination, mask, thread::current().id())
            })
            .inspect_err(|err| Self::report_failure("remove", destination, mask, err))?;

        let snapshot = dispatch.snapshot().clone();
        debug!(
            event = events::ROUTE_DELETE_START,
            component = COMPONENT,
            destination,
            mask,
            "announcing route removal"
        );
        self.deliver(dispatch, true);

        debug!(
            event = events::ROUTE_DELETE_OK,
            component = COMPONENT,
            destination,
            mask,
            "route removed"
        );
        Ok(snapshot)
    }

    /// Applies a partial update to an active entry and notifies its subscribers with
    /// `Modify`. Supplying a new mask re-keys the entry.
    pub fn modify(&self, destination: &str, mask: &str, patch: &RoutePatch) -> Result<RouteSnapshot> {
        let owner = thread::current().id();
        let dispatch = self
            .with_settled_key(destination, mask, |table| {
                let dispatch = table.modify(destination, mask, patch)?;
                table.begin_delivery(&dispatch, owner);
                Ok(dispatch)
            })
            .inspect_err(|err| Self::report_failure("modify", destination, mask, err))?;

        let snapshot = dispatch.snapshot().clone();
        debug!(
            event = events::ROUTE_MODIFY_OK,
            component = COMPONENT,
            destination,
            mask,
            new_mask = %snapshot.mask,
            "route modified"
        );
        self.deliver(dispatch, false);
        Ok(snapshot)
    }

    pub fn lookup_by_key(&self, destination: &str, mask: &str) -> Result<Option<RouteSnapshot>> {
        self.with_table(|table| table.lookup_by_key(destination, mask))
    }

    pub fn lookup_by_destination(&self, destination: &str) -> Result<Option<RouteSnapshot>> {
        self.with_table(|table| table.lookup_by_destination(destination))
    }

    pub fn lookup_by_gateway(&self, gateway: &str) -> Result<Option<RouteSnapshot>> {
        self.with_table(|table| table.lookup_by_gateway(gateway))
    }

    /// Number of entries in the table, placeholders included.
    pub fn count(&self) -> Result<usize> {
        self.with_table(|table| Ok(table.count()))
    }

    /// Number of entries carrying route data.
    pub fn active_count(&self) -> Result<usize> {
        self.with_table(|table| Ok(table.active_count()))
    }

    /// Snapshots of every entry, in table order.
    pub fn entries(&self) -> Result<Vec<RouteSnapshot>> {
        self.with_table(|table| Ok(table.entries()))
    }

    pub fn description(&self) -> Result<String> {
        self.with_table(|table| Ok(table.description().to_string()))
    }

    /// Registers `subscriber` for notifications about the key.
    ///
    /// An unknown key gets a placeholder entry so the first publish reaches the
    /// subscriber as `Add`. A key that already has route data is delivered to the new
    /// subscriber immediately as `Subscribed`.
    pub fn subscribe(
        &self,
        destination: &str,
        mask: &str,
        subscriber: Arc<dyn RouteSubscriber>,
        subscriber_id: SubscriberId,
    ) -> Result<SubscriptionStatus> {
        let owner = thread::current().id();
        let (status, dispatch) = self
            .with_settled_key(destination, mask, |table| {
                let (status, dispatch) =
                    table.subscribe(destination, mask, subscriber_id, subscriber)?;
                if let Some(dispatch) = &dispatch {
                    table.begin_delivery(dispatch, owner);
                }
                Ok((status, dispatch))
            })
            .inspect_err(|err| Self::report_failure("subscribe", destination, mask, err))?;

        match status {
            SubscriptionStatus::Delivered => debug!(
                event = events::SUBSCRIBE_ATTACHED,
                component = COMPONENT,
                destination,
                mask,
                subscriber_id,
                "subscriber attached to active route"
            ),
            SubscriptionStatus::Pending => debug!(
                event = events::SUBSCRIBE_PLACEHOLDER,
                component = COMPONENT,
                destination,
                mask,
                subscriber_id,
                "subscriber waiting on placeholder"
            ),
            SubscriptionStatus::AlreadySubscribed => debug!(
                event = events::SUBSCRIBE_DUPLICATE_IGNORED,
                component = COMPONENT,
                destination,
                mask,
                subscriber_id,
                "duplicate subscription ignored"
            ),
        }

        if let Some(dispatch) = dispatch {
            self.deliver(dispatch, false);
        }
        Ok(status)
    }

    /// Drops the subscriber's registration on the key. Returns `false` when it was not
    /// registered there.
    pub fn unsubscribe(&self, destination: &str, mask: &str, subscriber_id: SubscriberId) -> Result<bool> {
        let removed = self
            .with_settled_key(destination, mask, |table| {
                table.unsubscribe(destination, mask, subscriber_id)
            })
            .inspect_err(|err| Self::report_failure("unsubscribe", destination, mask, err))?;

        debug!(
            event = events::UNSUBSCRIBE_OK,
            component = COMPONENT,
            destination,
            mask,
            subscriber_id,
            removed,
            "unsubscribe handled"
        );
        Ok(removed)
    }

    pub fn subscriber_count(&self, destination: &str, mask: &str) -> Result<usize> {
        self.with_table(|table| table.subscriber_count(destination, mask))
    }

    /// Releases every entry and registration without notifying anyone.
    ///
    /// Every later call on this registry, through any clone, fails with
    /// [`RouteTableError::TornDown`]. Returns the number of entries released.
    pub fn teardown(&self) -> Result<usize> {
        let released = {
            let mut guard = self.shared.table.lock();
            let mut table = guard.take().ok_or(RouteTableError::TornDown)?;
            table.teardown()
        };
        self.shared.delivery_done.notify_all();

        debug!(
            event = events::TABLE_TEARDOWN,
            component = COMPONENT,
            released,
            "route table torn down"
        );
        Ok(released)
    }
}

/// Closes a delivery once its callbacks have returned. Runs on drop so the entry is
/// released even when a subscriber callback panics.
struct DeliveryGuard<'a> {
    shared: &'a Shared,
    entry_id: NodeId,
    removal: bool,
}

impl Drop for DeliveryGuard<'_> {
    fn drop(&mut self) {
        if let Some(table) = self.shared.table.lock().as_mut() {
            if self.removal {
                table.finish_removal(self.entry_id);
            } else {
                table.end_delivery(self.entry_id);
            }
        }
        self.shared.delivery_done.notify_all();
    }
}

impl Display for RouteRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.shared.table.lock().as_ref() {
            Some(table) => write!(f, "{table}"),
            None => write!(f, "Route table has been torn down."),
        }
    }
}
