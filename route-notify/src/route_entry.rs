//! Route entry data model: composite key, lifecycle state, and detached snapshots.

use crate::error::{Result, RouteTableError};
use crate::intrusive_list::{Link, Linked, ListHead};
use crate::observability::fields;
use crate::subscriber::OperationCode;
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::thread::ThreadId;

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
/// Composite identity of a route entry. Unique across a table at all times.
pub struct RouteKey {
    pub destination: String,
    pub mask: String,
}

impl RouteKey {
    pub fn new(destination: &str, mask: &str) -> Self {
        Self {
            destination: destination.to_string(),
            mask: mask.to_string(),
        }
    }

    #[inline(always)]
    pub(crate) fn matches(&self, destination: &str, mask: &str) -> bool {
        self.destination == destination && self.mask == mask
    }
}

impl Display for RouteKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.destination, self.mask)
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
/// Whether an entry carries real route data or only hosts early subscribers.
pub enum EntryState {
    Placeholder,
    Active,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
/// Detached copy of one entry, safe to hold after the table lock is released.
///
/// A placeholder snapshot never carries an outgoing interface or gateway; callers
/// tell the two apart through [`RouteSnapshot::state`].
pub struct RouteSnapshot {
    pub destination: String,
    pub mask: String,
    pub outgoing_interface: Option<String>,
    pub gateway: Option<String>,
    pub state: EntryState,
}

impl RouteSnapshot {
    pub fn key(&self) -> RouteKey {
        RouteKey::new(&self.destination, &self.mask)
    }

    pub fn is_active(&self) -> bool {
        self.state == EntryState::Active
    }
}

impl Display for RouteSnapshot {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Destination: {}, Mask: {}, OIF: {}, Gateway: {}",
            self.destination,
            self.mask,
            fields::format_optional(self.outgoing_interface.as_deref()),
            fields::format_optional(self.gateway.as_deref()),
        )?;
        if self.state == EntryState::Placeholder {
            write!(f, " (placeholder)")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
/// Partial update for an existing entry. Absent fields are left untouched.
///
/// ```
/// use route_notify::RoutePatch;
///
/// let patch = RoutePatch::new().gateway("9.9.9.9");
/// assert!(patch.mask.is_none());
/// assert!(patch.outgoing_interface.is_none());
/// assert_eq!(patch.gateway.as_deref(), Some("9.9.9.9"));
/// ```
pub struct RoutePatch {
    pub mask: Option<String>,
    pub outgoing_interface: Option<String>,
    pub gateway: Option<String>,
}

impl RoutePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mask(mut self, mask: &str) -> Self {
        self.mask = Some(mask.to_string());
        self
    }

    pub fn outgoing_interface(mut self, outgoing_interface: &str) -> Self {
        self.outgoing_interface = Some(outgoing_interface.to_string());
        self
    }

    pub fn gateway(mut self, gateway: &str) -> Self {
        self.gateway = Some(gateway.to_string());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.mask.is_none() && self.outgoing_interface.is_none() && self.gateway.is_none()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(RouteTableError::InvalidArgument {
                field: "patch",
                reason: "at least one field must be supplied",
            });
        }
        validate_optional_field("mask", self.mask.as_deref())?;
        validate_optional_field("outgoing_interface", self.outgoing_interface.as_deref())?;
        validate_optional_field("gateway", self.gateway.as_deref())
    }
}

pub(crate) fn validate_field(field: &'static str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(RouteTableError::InvalidArgument {
            field,
            reason: "must not be empty",
        });
    }
    if value.chars().any(char::is_whitespace) {
        return Err(RouteTableError::InvalidArgument {
            field,
            reason: "must not contain whitespace",
        });
    }
    Ok(())
}

pub(crate) fn validate_optional_field(field: &'static str, value: Option<&str>) -> Result<()> {
    match value {
        Some(value) => validate_field(field, value),
        None => Ok(()),
    }
}

pub(crate) fn validate_key(destination: &str, mask: &str) -> Result<()> {
    validate_field("destination", destination)?;
    validate_field("mask", mask)
}

/// Notification being delivered for an entry outside the table lock.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct Delivery {
    pub(crate) owner: ThreadId,
    /// The delivery announces a delete; the entry is unlinked once it completes.
    pub(crate) removal: bool,
}

/// One table member: route payload, table membership link, and its own subscriber list.
pub(crate) struct RouteEntry {
    pub(crate) key: RouteKey,
    pub(crate) outgoing_interface: Option<String>,
    pub(crate) gateway: Option<String>,
    pub(crate) state: EntryState,
    /// Set from the moment a notification is captured until every callback has returned.
    pub(crate) delivering: Option<Delivery>,
    pub(crate) subscribers: ListHead,
    link: Link,
}

impl RouteEntry {
    pub(crate) fn active(
        key: RouteKey,
        outgoing_interface: Option<String>,
        gateway: Option<String>,
    ) -> Self {
        Self {
            key,
            outgoing_interface,
            gateway,
            state: EntryState::Active,
            delivering: None,
            subscribers: ListHead::new(),
            link: Link::default(),
        }
    }

    pub(crate) fn placeholder(key: RouteKey) -> Self {
        Self {
            state: EntryState::Placeholder,
            ..Self::active(key, None, None)
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.state == EntryState::Active
    }

    pub(crate) fn snapshot(&self) -> RouteSnapshot {
        RouteSnapshot {
            destination: self.key.destination.clone(),
            mask: self.key.mask.clone(),
            outgoing_interface: self.outgoing_interface.clone(),
            gateway: self.gateway.clone(),
            state: self.state,
        }
    }

    /// Refuses a mutation while a notification for this entry is still in flight.
    pub(crate) fn ensure_settled(&self) -> Result<()> {
        match self.delivering {
            None => Ok(()),
            Some(delivery) if delivery.removal => Err(RouteTableError::removal_in_progress(
                &self.key.destination,
                &self.key.mask,
            )),
            Some(_) => Err(RouteTableError::notification_in_progress(
                &self.key.destination,
                &self.key.mask,
            )),
        }
    }

    pub(crate) fn is_being_removed(&self) -> bool {
        self.delivering.is_some_and(|delivery| delivery.removal)
    }

    /// Replaces the route data and reports which notification the change warrants.
    pub(crate) fn activate(
        &mut self,
        outgoing_interface: Option<String>,
        gateway: Option<String>,
    ) -> OperationCode {
        self.outgoing_interface = outgoing_interface;
        self.gateway = gateway;
        match std::mem::replace(&mut self.state, EntryState::Active) {
            EntryState::Placeholder => OperationCode::Add,
            EntryState::Active => OperationCode::Modify,
        }
    }

    /// Applies the non-key fields of `patch`. The mask is re-keyed by the table.
    pub(crate) fn apply_patch(&mut self, patch: &RoutePatch) {
        if let Some(mask) = &patch.mask {
            self.key.mask = mask.clone();
        }
        if let Some(outgoing_interface) = &patch.outgoing_interface {
            self.outgoing_interface = Some(outgoing_interface.clone());
        }
        if let Some(gateway) = &patch.gateway {
            self.gateway = Some(gateway.clone());
        }
    }
}

impl Linked for RouteEntry {
    fn link(&self) -> &Link {
        &self.link
    }

    fn link_mut(&mut self) -> &mut Link {
        &mut self.link
    }
}
