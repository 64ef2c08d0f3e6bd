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

use crate::error::DemoError;
use route_notify::{RegistryConfig, SubscriberId};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;

const DEMO_MASK: &str = "255.255.255.0";
const DEMO_INTERFACE: &str = "eth0";

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DemoConfig {
    #[serde(default)]
    pub(crate) registry: RegistryConfig,
    pub(crate) publisher: PublisherConfig,
    pub(crate) subscriber: SubscriberConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PublisherConfig {
    pub(crate) routes: Vec<RouteConfig>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RouteConfig {
    pub(crate) destination: String,
    pub(crate) mask: String,
    #[serde(default)]
    pub(crate) outgoing_interface: Option<String>,
    #[serde(default)]
    pub(crate) gateway: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SubscriberConfig {
    pub(crate) subscriptions: Vec<SubscriptionConfig>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SubscriptionConfig {
    pub(crate) destination: String,
    pub(crate) mask: String,
    pub(crate) subscriber_id: SubscriberId,
}

impl DemoConfig {
    pub(crate) fn load(path: &str) -> Result<Self, DemoError> {
        let mut file = File::open(path).map_err(|source| DemoError::ConfigRead {
            path: path.to_string(),
            source,
        })?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|source| DemoError::ConfigRead {
                path: path.to_string(),
                source,
            })?;
        Self::parse(&contents)
    }

    pub(crate) fn parse(contents: &str) -> Result<Self, DemoError> {
        let config: Self = json5::from_str(contents)?;
        config.registry.validate()?;
        Ok(config)
    }

    /// Three published routes and four subscribers, two of which wait on routes that
    /// are never published.
    pub(crate) fn builtin() -> Self {
        let routes = [
            ("192.168.1.2", "192.168.0.1"),
            ("192.168.1.3", "192.168.0.2"),
            ("192.168.1.4", "192.168.0.3"),
        ]
        .into_iter()
        .map(|(destination, gateway)| RouteConfig {
            destination: destination.to_string(),
            mask: DEMO_MASK.to_string(),
            outgoing_interface: Some(DEMO_INTERFACE.to_string()),
            gateway: Some(gateway.to_string()),
        })
        .collect();

        let subscriptions = [
            ("192.168.1.1", 1),
            ("192.168.1.2", 2),
            ("192.168.1.10", 3),
            ("192.168.1.11", 4),
        ]
        .into_iter()
        .map(|(destination, subscriber_id)| SubscriptionConfig {
            destination: destination.to_string(),
            mask: DEMO_MASK.to_string(),
            subscriber_id,
        })
        .collect();

        Self {
            registry: RegistryConfig::default(),
            publisher: PublisherConfig { routes },
            subscriber: SubscriberConfig { subscriptions },
        }
    }
}
