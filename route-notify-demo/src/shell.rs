//! Interactive command loop over a shared registry.

use crate::commands::{parse_command, Command, USAGE};
use crate::error::DemoError;
use route_notify::{RouteRegistry, RouteSubscriber, SubscriptionStatus};
use std::io::{BufRead, Write};
use std::sync::Arc;

const PROMPT: &str = "> ";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Flow {
    Continue,
    Quit,
}

/// Reads commands from `input` until `quit` or end of input.
///
/// Parse and registry errors are reported on `output` and the loop carries on; only
/// I/O failures end it early.
pub(crate) fn run<R: BufRead, W: Write>(
    registry: &RouteRegistry,
    subscriber: &Arc<dyn RouteSubscriber>,
    input: R,
    output: &mut W,
) -> Result<(), DemoError> {
    writeln!(output, "{USAGE}")?;
    write!(output, "{PROMPT}")?;
    output.flush()?;

    for line in input.lines() {
        let line = line?;
        if !line.trim().is_empty() {
            let flow = match parse_command(&line) {
                Ok(command) => match execute(registry, subscriber, command, output) {
                    Ok(flow) => flow,
                    Err(DemoError::Registry(err)) => {
                        writeln!(output, "error: {err}")?;
                        Flow::Continue
                    }
                    Err(err) => return Err(err),
                },
                Err(err) => {
                    writeln!(output, "error: {err}")?;
                    Flow::Continue
                }
            };
            if flow == Flow::Quit {
                return Ok(());
            }
        }
        write!(output, "{PROMPT}")?;
        output.flush()?;
    }
    Ok(())
}

pub(crate) fn execute<W: Write>(
    registry: &RouteRegistry,
    subscriber: &Arc<dyn RouteSubscriber>,
    command: Command,
    output: &mut W,
) -> Result<Flow, DemoError> {
    match command {
        Command::Add {
            destination,
            mask,
            outgoing_interface,
            gateway,
        } => {
            let snapshot = registry.add_or_update(
                &destination,
                &mask,
                Some(outgoing_interface.as_str()),
                Some(gateway.as_str()),
            )?;
            writeln!(output, "published {snapshot}")?;
        }
        Command::Delete { destination, mask } => {
            let snapshot = registry.remove(&destination, &mask)?;
            writeln!(output, "removed {}", snapshot.key())?;
        }
        Command::Modify {
            destination,
            mask,
            patch,
        } => {
            let snapshot = registry.modify(&destination, &mask, &patch)?;
            writeln!(output, "modified {snapshot}")?;
        }
        Command::Subscribe {
            destination,
            mask,
            subscriber_id,
        } => {
            let status =
                registry.subscribe(&destination, &mask, subscriber.clone(), subscriber_id)?;
            let note = match status {
                SubscriptionStatus::Delivered => "current state delivered",
                SubscriptionStatus::Pending => "waiting for the route to be published",
                SubscriptionStatus::AlreadySubscribed => "already subscribed",
            };
            writeln!(
                output,
                "subscriber {subscriber_id} on {destination}/{mask}: {note}"
            )?;
        }
        Command::Unsubscribe {
            destination,
            mask,
            subscriber_id,
        } => {
            let removed = registry.unsubscribe(&destination, &mask, subscriber_id)?;
            if removed {
                writeln!(output, "subscriber {subscriber_id} removed from {destination}/{mask}")?;
            } else {
                writeln!(output, "subscriber {subscriber_id} was not subscribed to {destination}/{mask}")?;
            }
        }
        Command::Show => writeln!(output, "{registry}")?,
        Command::Json => {
            let entries = registry.entries()?;
            writeln!(output, "{}", serde_json::to_string_pretty(&entries)?)?;
        }
        Command::Count => writeln!(
            output,
            "{} entries ({} active)",
            registry.count()?,
            registry.active_count()?
        )?,
        Command::Help => writeln!(output, "{USAGE}")?,
        Command::Quit => return Ok(Flow::Quit),
    }
    Ok(Flow::Continue)
}
