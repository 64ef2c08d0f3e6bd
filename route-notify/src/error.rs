//! Error type shared by every table and registry operation.

use crate::subscriber::SubscriberId;
use std::collections::TryReserveError;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Failures reported by the route table and its registry facade.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RouteTableError {
    /// Storage for an entry or registration could not be obtained, either because the
    /// allocator refused or because a configured capacity limit was reached.
    AllocationFailure { what: &'static str },
    NotFound { destination: String, mask: String },
    InvalidArgument { field: &'static str, reason: &'static str },
    DuplicateSubscription {
        destination: String,
        mask: String,
        subscriber_id: SubscriberId,
    },
    /// A key rename would collide with another live entry.
    KeyConflict { destination: String, mask: String },
    /// The entry is being removed by the calling thread, i.e. the call came from one of
    /// its own delete callbacks.
    RemovalInProgress { destination: String, mask: String },
    /// The calling thread is still delivering a notification for the entry, i.e. the
    /// call came from one of its own callbacks.
    NotificationInProgress { destination: String, mask: String },
    TornDown,
}

impl RouteTableError {
    pub(crate) fn not_found(destination: &str, mask: &str) -> Self {
        RouteTableError::NotFound {
            destination: destination.to_string(),
            mask: mask.to_string(),
        }
    }

    pub(crate) fn key_conflict(destination: &str, mask: &str) -> Self {
        RouteTableError::KeyConflict {
            destination: destination.to_string(),
            mask: mask.to_string(),
        }
    }

    pub(crate) fn removal_in_progress(destination: &str, mask: &str) -> Self {
        RouteTableError::RemovalInProgress {
            destination: destination.to_string(),
            mask: mask.to_string(),
        }
    }

    pub(crate) fn notification_in_progress(destination: &str, mask: &str) -> Self {
        RouteTableError::NotificationInProgress {
            destination: destination.to_string(),
            mask: mask.to_string(),
        }
    }

    pub(crate) fn allocation(what: &'static str) -> impl FnOnce(TryReserveError) -> Self {
        move |_| RouteTableError::AllocationFailure { what }
    }
}

impl Display for RouteTableError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteTableError::AllocationFailure { what } => {
                write!(f, "unable to allocate {what}")
            }
            RouteTableError::NotFound { destination, mask } => {
                write!(f, "route {destination}/{mask} not found")
            }
            RouteTableError::InvalidArgument { field, reason } => {
                write!(f, "invalid {field}: {reason}")
            }
            RouteTableError::DuplicateSubscription {
                destination,
                mask,
                subscriber_id,
            } => write!(
                f,
                "subscriber {subscriber_id} is already subscribed to {destination}/{mask}"
            ),
            RouteTableError::KeyConflict { destination, mask } => {
                write!(f, "route {destination}/{mask} already exists")
            }
            RouteTableError::RemovalInProgress { destination, mask } => {
                write!(f, "route {destination}/{mask} is being removed")
            }
            RouteTableError::NotificationInProgress { destination, mask } => {
                write!(f, "route {destination}/{mask} is still notifying its subscribers")
            }
            RouteTableError::TornDown => write!(f, "route table has been torn down"),
        }
    }
}

impl Error for RouteTableError {}

pub type Result<T> = std::result::Result<T, RouteTableError>;
