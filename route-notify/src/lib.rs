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

//! # route-notify
//!
//! `route-notify` keeps a table of routes keyed by `(destination, mask)` and fans every
//! change out to the subscribers registered on the affected route.
//!
//! Subscribers may register before a route exists: the table then holds a placeholder
//! entry for the key, and the first publish reaches them as [`OperationCode::Add`].
//! Subscribing to a route that already has data delivers its current state at once as
//! [`OperationCode::Subscribed`].
//!
//! ```
//! use std::sync::Arc;
//! use route_notify::{OperationCode, RouteRegistry, RouteSnapshot, SubscriberId, SubscriptionStatus};
//!
//! let registry = RouteRegistry::new("Edge routes");
//!
//! let status = registry
//!     .subscribe(
//!         "192.168.1.2",
//!         "255.255.255.0",
//!         Arc::new(|snapshot: &RouteSnapshot, op: OperationCode, id: SubscriberId| {
//!             println!("subscriber {id} got {op}: {snapshot}");
//!         }),
//!         1,
//!     )
//!     .unwrap();
//! assert_eq!(status, SubscriptionStatus::Pending);
//!
//! registry
//!     .add_or_update("192.168.1.2", "255.255.255.0", Some("eth0"), Some("192.168.0.1"))
//!     .unwrap();
//! assert_eq!(registry.count().unwrap(), 1);
//!
//! registry.remove("192.168.1.2", "255.255.255.0").unwrap();
//! assert_eq!(registry.count().unwrap(), 0);
//! ```
//!
//! Library code only emits `tracing` events; installing a subscriber is left to the
//! application.

mod config;
mod dispatcher;
mod error;
pub mod intrusive_list;
#[doc(hidden)]
pub mod observability;
mod registry;
mod route_entry;
mod route_table;
mod subscriber;

pub use config::{DuplicateSubscriptionPolicy, RegistryConfig};
pub use error::{Result, RouteTableError};
pub use registry::RouteRegistry;
pub use route_entry::{EntryState, RouteKey, RoutePatch, RouteSnapshot};
pub use subscriber::{OperationCode, RouteSubscriber, SubscriberId, SubscriptionStatus};
