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

mod commands;
mod config;
mod error;
mod shell;
mod workers;

use crate::config::DemoConfig;
use crate::error::DemoError;
use crate::workers::{join_worker, spawn_consumer, spawn_producer, LoggingSubscriber};
use clap::Parser;
use route_notify::{RouteRegistry, RouteSubscriber};
use std::io;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command()]
struct DemoArgs {
    /// json5 file with registry, publisher, and subscriber sections.
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,
    /// Read commands from stdin once the producer and consumer have finished.
    #[arg(short, long)]
    interactive: bool,
}

fn main() -> Result<(), DemoError> {
    let _ = tracing_subscriber::fmt::try_init();

    let args = DemoArgs::parse();
    let config = match &args.config {
        Some(path) => DemoConfig::load(path)?,
        None => DemoConfig::builtin(),
    };

    info!("Started route-notify-demo");

    let registry = RouteRegistry::with_config(config.registry)?;
    let subscriber: Arc<dyn RouteSubscriber> = Arc::new(LoggingSubscriber);

    let producer = spawn_producer(registry.clone(), config.publisher)?;
    let consumer = spawn_consumer(registry.clone(), config.subscriber, subscriber.clone())?;
    let published = join_worker("producer", producer)?;
    let subscribed = join_worker("consumer", consumer)?;
    info!(published, subscribed, "workers finished");

    if args.interactive {
        let stdin = io::stdin();
        let mut stdout = io::stdout();
        shell::run(&registry, &subscriber, stdin.lock(), &mut stdout)?;
    }

    println!("{registry}");
    let released = registry.teardown()?;
    info!(released, "route table released");
    Ok(())
}
