//! Route table core: entry storage, composite-key lookups, and mutation semantics.
//!
//! Nothing here is synchronized. Every mutation returns a [`Dispatch`] instead of
//! notifying, leaving the caller to deliver it once the table lock is released.

use crate::config::{DuplicateSubscriptionPolicy, RegistryConfig};
use crate::dispatcher::Dispatch;
use crate::error::{Result, RouteTableError};
use crate::intrusive_list::{Arena, Iter, ListHead, NodeId};
use crate::route_entry::{
    validate_field, validate_key, validate_optional_field, Delivery, RouteEntry, RouteKey,
    RoutePatch, RouteSnapshot,
};
use crate::subscriber::{
    OperationCode, RouteSubscriber, SubscriberId, SubscriberRegistration, SubscriptionStatus,
};
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::thread::ThreadId;

pub(crate) struct RouteTable {
    description: String,
    duplicate_subscription: DuplicateSubscriptionPolicy,
    max_entries: Option<usize>,
    max_subscribers_per_entry: Option<usize>,
    entries: Arena<RouteEntry>,
    registrations: Arena<SubscriberRegistration>,
    list: ListHead,
}

impl RouteTable {
    pub(crate) fn new(config: RegistryConfig) -> Self {
        Self {
            description: config.description,
            duplicate_subscription: config.duplicate_subscription,
            max_entries: config.max_entries,
            max_subscribers_per_entry: config.max_subscribers_per_entry,
            entries: Arena::new(),
            registrations: Arena::new(),
            list: ListHead::new(),
        }
    }

    pub(crate) fn description(&self) -> &str {
        &self.description
    }

    /// Number of linked entries, placeholders included.
    pub(crate) fn count(&self) -> usize {
        self.list.len()
    }

    pub(crate) fn active_count(&self) -> usize {
        self.iter().filter(|(_, entry)| entry.is_active()).count()
    }

    fn iter(&self) -> Iter<'_, RouteEntry> {
        self.list.iter(&self.entries)
    }

    fn find(&self, destination: &str, mask: &str) -> Option<NodeId> {
        self.iter()
            .find(|(_, entry)| entry.key.matches(destination, mask))
            .map(|(id, _)| id)
    }

    /// Thread currently delivering a notification for this key, if any.
    pub(crate) fn delivery_owner(&self, destination: &str, mask: &str) -> Option<ThreadId> {
        self.iter()
            .find(|(_, entry)| entry.key.matches(destination, mask))
            .and_then(|(_, entry)| entry.delivering)
            .map(|delivery| delivery.owner)
    }

    /// Marks the entry behind `dispatch` as notifying on behalf of `owner`. Until
    /// [`RouteTable::end_delivery`], mutations of the entry are refused here and other
    /// threads wait for it in the registry.
    pub(crate) fn begin_delivery(&mut self, dispatch: &Dispatch, owner: ThreadId) {
        if let Some(entry) = self.entries.get_mut(dispatch.entry()) {
            entry.delivering = Some(Delivery {
                owner,
                removal: false,
            });
        }
    }

    pub(crate) fn end_delivery(&mut self, id: NodeId) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.delivering = None;
        }
    }

    pub(crate) fn lookup_by_key(&self, destination: &str, mask: &str) -> Result<Option<RouteSnapshot>> {
        validate_key(destination, mask)?;
        Ok(self
            .iter()
            .find(|(_, entry)| entry.key.matches(destination, mask))
            .map(|(_, entry)| entry.snapshot()))
    }

    /// First entry in list order with this destination.
    pub(crate) fn lookup_by_destination(&self, destination: &str) -> Result<Option<RouteSnapshot>> {
        validate_field("destination", destination)?;
        Ok(self
            .iter()
            .find(|(_, entry)| entry.key.destination == destination)
            .map(|(_, entry)| entry.snapshot()))
    }

    /// First entry in list order with this gateway. Placeholders never match.
    pub(crate) fn lookup_by_gateway(&self, gateway: &str) -> Result<Option<RouteSnapshot>> {
        validate_field("gateway", gateway)?;
        Ok(self
            .iter()
            .find(|(_, entry)| entry.gateway.as_deref() == Some(gateway))
            .map(|(_, entry)| entry.snapshot()))
    }

    pub(crate) fn entries(&self) -> Vec<RouteSnapshot> {
        self.iter().map(|(_, entry)| entry.snapshot()).collect()
    }

    pub(crate) fn subscriber_count(&self, destination: &str, mask: &str) -> Result<usize> {
        validate_key(destination, mask)?;
        self.iter()
            .find(|(_, entry)| entry.key.matches(destination, mask))
            .map(|(_, entry)| entry.subscribers.len())
            .ok_or_else(|| RouteTableError::not_found(destination, mask))
    }

    fn ensure_entry_capacity(&self) -> Result<()> {
        match self.max_entries {
            Some(limit) if self.entries.len() >= limit => {
                Err(RouteTableError::AllocationFailure { what: "route entry" })
            }
            _ => Ok(()),
        }
    }

    /// Inserts a new active entry or overwrites the route data of the existing one.
    ///
    /// Activating a placeholder yields an `Add` notification, updating an active entry a
    /// `Modify`. Only a true insertion changes the count.
    pub(crate) fn add_or_update(
        &mut self,
        destination: &str,
        mask: &str,
        outgoing_interface: Option<&str>,
        gateway: Option<&str>,
    ) -> Result<Dispatch> {
        validate_key(destination, mask)?;
        validate_optional_field("outgoing_interface", outgoing_interface)?;
        validate_optional_field("gateway", gateway)?;
        let outgoing_interface = outgoing_interface.map(str::to_string);
        let gateway = gateway.map(str::to_string);

        if let Some(id) = self.find(destination, mask) {
            let Some(entry) = self.entries.get_mut(id) else {
                return Err(RouteTableError::not_found(destination, mask));
            };
            entry.ensure_settled()?;
            let mut dispatch =
                Dispatch::collect(id, entry, &self.registrations, OperationCode::Modify)?;
            let op = entry.activate(outgoing_interface, gateway);
            dispatch.refresh(entry, op);
            return Ok(dispatch);
        }

        self.ensure_entry_capacity()?;
        let id = self
            .entries
            .try_insert(RouteEntry::active(
                RouteKey::new(destination, mask),
                outgoing_interface,
                gateway,
            ))
            .map_err(RouteTableError::allocation("route entry"))?;
        let linked = self.list.push_back(&mut self.entries, id);
        debug_assert!(linked, "freshly inserted entry must link");

        match self.entries.get(id) {
            Some(entry) => Dispatch::collect(id, entry, &self.registrations, OperationCode::Add),
            None => Err(RouteTableError::not_found(destination, mask)),
        }
    }

    /// First half of a removal: marks the active entry as being removed by `remover` and
    /// captures its delete notification. The entry stays linked and visible to lookups
    /// until [`RouteTable::finish_removal`].
    pub(crate) fn begin_removal(
        &mut self,
        destination: &str,
        mask: &str,
        remover: ThreadId,
    ) -> Result<Dispatch> {
        validate_key(destination, mask)?;
        let not_found = || RouteTableError::not_found(destination, mask);
        let id = self.find(destination, mask).ok_or_else(not_found)?;
        let entry = self.entries.get_mut(id).ok_or_else(not_found)?;
        if !entry.is_active() {
            return Err(not_found());
        }
        entry.ensure_settled()?;

        let dispatch = Dispatch::collect(id, entry, &self.registrations, OperationCode::Delete)?;
        entry.delivering = Some(Delivery {
            owner: remover,
            removal: true,
        });
        Ok(dispatch)
    }

    /// Second half of a removal: unlinks and frees the entry and its registrations.
    pub(crate) fn finish_removal(&mut self, id: NodeId) -> bool {
        if !self.list.unlink(&mut self.entries, id) {
            return false;
        }
        self.release_entry(id);
        true
    }

    fn release_entry(&mut self, id: NodeId) {
        let Some(entry) = self.entries.remove(id) else {
            return;
        };
        let mut cursor = entry.subscribers.first();
        while let Some(registration_id) = cursor {
            cursor = ListHead::next_of(&self.registrations, registration_id);
            self.registrations.remove(registration_id);
        }
    }

    /// Applies the fields present in `patch` to an active entry.
    ///
    /// A new mask re-keys the entry, which fails if the new key is already taken.
    pub(crate) fn modify(&mut self, destination: &str, mask: &str, patch: &RoutePatch) -> Result<Dispatch> {
        validate_key(destination, mask)?;
        patch.validate()?;
        let not_found = || RouteTableError::not_found(destination, mask);
        let id = self.find(destination, mask).ok_or_else(not_found)?;

        if let Some(new_mask) = patch.mask.as_deref() {
            if new_mask != mask && self.find(destination, new_mask).is_some() {
                return Err(RouteTableError::key_conflict(destination, new_mask));
            }
        }

        let entry = self.entries.get_mut(id).ok_or_else(not_found)?;
        if !entry.is_active() {
            return Err(not_found());
        }
        entry.ensure_settled()?;

        let mut dispatch =
            Dispatch::collect(id, entry, &self.registrations, OperationCode::Modify)?;
        entry.apply_patch(patch);
        dispatch.refresh(entry, OperationCode::Modify);
        Ok(dispatch)
    }

    /// Registers `subscriber` on the key, creating a placeholder entry when the key is
    /// unknown. Returns the immediate `Subscribed` delivery when the entry is active.
    pub(crate) fn subscribe(
        &mut self,
        destination: &str,
        mask: &str,
        subscriber_id: SubscriberId,
        subscriber: Arc<dyn RouteSubscriber>,
    ) -> Result<(SubscriptionStatus, Option<Dispatch>)> {
        validate_key(destination, mask)?;

        let (entry_id, created) = match self.find(destination, mask) {
            Some(id) => (id, false),
            None => {
                self.ensure_entry_capacity()?;
                let id = self
                    .entries
                    .try_insert(RouteEntry::placeholder(RouteKey::new(destination, mask)))
                    .map_err(RouteTableError::allocation("placeholder entry"))?;
                (id, true)
            }
        };

        match self.attach(entry_id, subscriber_id, subscriber) {
            Ok(outcome) => {
                if created {
                    let linked = self.list.push_back(&mut self.entries, entry_id);
                    debug_assert!(linked, "placeholder entry must link");
                }
                Ok(outcome)
            }
            Err(err) => {
                if created {
                    self.entries.remove(entry_id);
                }
                Err(err)
            }
        }
    }

    fn attach(
        &mut self,
        entry_id: NodeId,
        subscriber_id: SubscriberId,
        subscriber: Arc<dyn RouteSubscriber>,
    ) -> Result<(SubscriptionStatus, Option<Dispatch>)> {
        let Some(entry) = self.entries.get_mut(entry_id) else {
            return Err(RouteTableError::AllocationFailure {
                what: "placeholder entry",
            });
        };
        entry.ensure_settled()?;

        let duplicate = entry
            .subscribers
            .iter(&self.registrations)
            .any(|(_, registration)| registration.subscriber_id == subscriber_id);
        if duplicate {
            return match self.duplicate_subscription {
                DuplicateSubscriptionPolicy::Reject => Err(RouteTableError::DuplicateSubscription {
                    destination: entry.key.destination.clone(),
                    mask: entry.key.mask.clone(),
                    subscriber_id,
                }),
                DuplicateSubscriptionPolicy::Idempotent => {
                    Ok((SubscriptionStatus::AlreadySubscribed, None))
                }
            };
        }

        if let Some(limit) = self.max_subscribers_per_entry {
            if entry.subscribers.len() >= limit {
                return Err(RouteTableError::AllocationFailure {
                    what: "subscriber registration",
                });
            }
        }

        let registration_id = self
            .registrations
            .try_insert(SubscriberRegistration::new(
                subscriber_id,
                subscriber.clone(),
                entry_id,
            ))
            .map_err(RouteTableError::allocation("subscriber registration"))?;
        let linked = entry
            .subscribers
            .push_back(&mut self.registrations, registration_id);
        debug_assert!(linked, "fresh registration must link");

        if entry.is_active() {
            let dispatch = Dispatch::single(
                entry_id,
                entry.snapshot(),
                OperationCode::Subscribed,
                subscriber_id,
                subscriber,
            );
            Ok((SubscriptionStatus::Delivered, Some(dispatch)))
        } else {
            Ok((SubscriptionStatus::Pending, None))
        }
    }

    /// Drops one registration. Returns `false` when the subscriber was not registered.
    ///
    /// Allowed while the entry is delivering a change, so a callback may unsubscribe
    /// itself; refused while the entry is being removed.
    pub(crate) fn unsubscribe(
        &mut self,
        destination: &str,
        mask: &str,
        subscriber_id: SubscriberId,
    ) -> Result<bool> {
        validate_key(destination, mask)?;
        let not_found = || RouteTableError::not_found(destination, mask);
        let entry_id = self.find(destination, mask).ok_or_else(not_found)?;
        let entry = self.entries.get(entry_id).ok_or_else(not_found)?;
        if entry.is_being_removed() {
            return Err(RouteTableError::removal_in_progress(destination, mask));
        }

        let registration_id = entry
            .subscribers
            .iter(&self.registrations)
            .find(|(_, registration)| registration.subscriber_id == subscriber_id)
            .map(|(id, _)| id);

        Ok(match registration_id {
            Some(registration_id) => self.detach_registration(registration_id),
            None => false,
        })
    }

    /// Unlinks a registration through its owner back-reference. A placeholder left
    /// without subscribers has no reason to exist and is released with it.
    fn detach_registration(&mut self, registration_id: NodeId) -> bool {
        let Some(owner) = self
            .registrations
            .get(registration_id)
            .map(|registration| registration.owner)
        else {
            return false;
        };
        let Some(entry) = self.entries.get_mut(owner) else {
            return false;
        };
        if !entry.subscribers.unlink(&mut self.registrations, registration_id) {
            return false;
        }
        self.registrations.remove(registration_id);

        let orphaned_placeholder = !entry.is_active() && entry.subscribers.is_empty();
        if orphaned_placeholder && self.list.unlink(&mut self.entries, owner) {
            self.entries.remove(owner);
        }
        true
    }

    /// Releases every entry and registration without notifying anyone.
    pub(crate) fn teardown(&mut self) -> usize {
        let released = self.list.len();
        self.registrations.clear();
        self.entries.clear();
        self.list.init();
        released
    }

    #[cfg(test)]
    pub(crate) fn check_invariants(&self) -> std::result::Result<(), String> {
        use crate::route_entry::EntryState;
        use std::collections::HashSet;

        let mut keys = HashSet::new();
        let mut reachable_registrations = 0;
        for (id, entry) in self.iter() {
            if !keys.insert(entry.key.clone()) {
                return Err(format!("duplicate key {}", entry.key));
            }
            if entry.state == EntryState::Placeholder
                && (entry.outgoing_interface.is_some() || entry.gateway.is_some())
            {
                return Err(format!("placeholder {} carries route data", entry.key));
            }
            for (_, registration) in entry.subscribers.iter(&self.registrations) {
                if registration.owner != id {
                    return Err(format!("registration on {} has wrong owner", entry.key));
                }
                reachable_registrations += 1;
            }
        }
        if keys.len() != self.count() || self.count() != self.entries.len() {
            return Err(format!(
                "count {} disagrees with {} linked and {} stored entries",
                self.count(),
                keys.len(),
                self.entries.len()
            ));
        }
        if reachable_registrations != self.registrations.len() {
            return Err(format!(
                "{} registrations stored but {} reachable",
                self.registrations.len(),
                reachable_registrations
            ));
        }
        Ok(())
    }
}

impl Display for RouteTable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Route Table: {}", self.description)?;
        if self.list.is_empty() {
            return write!(f, "\nNo routes in table.");
        }
        for (_, entry) in self.iter() {
            write!(f, "\n{}", entry.snapshot())?;
        }
        Ok(())
    }
}
