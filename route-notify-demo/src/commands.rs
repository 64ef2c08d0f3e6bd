//! Line-oriented command grammar for the interactive shell.

use route_notify::{RoutePatch, SubscriberId};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub(crate) const USAGE: &str = "\
commands:
  add <dst> <mask> <oif> <gw>
  del <dst> <mask>
  mod <dst> <mask> [mask=<m>] [oif=<o>] [gw=<g>]
  sub <dst> <mask> <id>
  unsub <dst> <mask> <id>
  show | json | count | help | quit";

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum Command {
    Add {
        destination: String,
        mask: String,
        outgoing_interface: String,
        gateway: String,
    },
    Delete {
        destination: String,
        mask: String,
    },
    Modify {
        destination: String,
        mask: String,
        patch: RoutePatch,
    },
    Subscribe {
        destination: String,
        mask: String,
        subscriber_id: SubscriberId,
    },
    Unsubscribe {
        destination: String,
        mask: String,
        subscriber_id: SubscriberId,
    },
    Show,
    Json,
    Count,
    Help,
    Quit,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum ParseError {
    Empty,
    UnknownCommand(String),
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },
    UnexpectedArgument {
        command: &'static str,
        argument: String,
    },
    InvalidSubscriberId(String),
    UnknownField(String),
    EmptyPatch,
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Empty => write!(f, "empty command"),
            ParseError::UnknownCommand(command) => write!(f, "unknown command '{command}'"),
            ParseError::MissingArgument { command, argument } => {
                write!(f, "{command}: missing <{argument}>")
            }
            ParseError::UnexpectedArgument { command, argument } => {
                write!(f, "{command}: unexpected argument '{argument}'")
            }
            ParseError::InvalidSubscriberId(raw) => {
                write!(f, "subscriber id '{raw}' is not a non-negative integer")
            }
            ParseError::UnknownField(field) => {
                write!(f, "mod: unknown field '{field}', expected mask=, oif= or gw=")
            }
            ParseError::EmptyPatch => write!(f, "mod: at least one of mask=, oif=, gw= is required"),
        }
    }
}

impl Error for ParseError {}

struct Arguments<'a> {
    command: &'static str,
    words: std::str::SplitWhitespace<'a>,
}

impl Arguments<'_> {
    fn required(&mut self, argument: &'static str) -> Result<String, ParseError> {
        self.words
            .next()
            .map(str::to_string)
            .ok_or(ParseError::MissingArgument {
                command: self.command,
                argument,
            })
    }

    fn subscriber_id(&mut self) -> Result<SubscriberId, ParseError> {
        let raw = self.required("id")?;
        raw.parse().map_err(|_| ParseError::InvalidSubscriberId(raw))
    }

    fn finish(mut self) -> Result<(), ParseError> {
        match self.words.next() {
            Some(extra) => Err(ParseError::UnexpectedArgument {
                command: self.command,
                argument: extra.to_string(),
            }),
            None => Ok(()),
        }
    }

    fn patch(self) -> Result<RoutePatch, ParseError> {
        let mut patch = RoutePatch::new();
        for word in self.words {
            patch = match word.split_once('=') {
                Some(("mask", value)) => patch.mask(value),
                Some(("oif", value)) => patch.outgoing_interface(value),
                Some(("gw", value)) => patch.gateway(value),
                _ => return Err(ParseError::UnknownField(word.to_string())),
            };
        }
        if patch.is_empty() {
            return Err(ParseError::EmptyPatch);
        }
        Ok(patch)
    }
}

pub(crate) fn parse_command(line: &str) -> Result<Command, ParseError> {
    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return Err(ParseError::Empty);
    };
    let command: &'static str = match name {
        "add" => "add",
        "del" => "del",
        "mod" => "mod",
        "sub" => "sub",
        "unsub" => "unsub",
        "show" => "show",
        "json" => "json",
        "count" => "count",
        "help" => "help",
        "quit" | "exit" => "quit",
        other => return Err(ParseError::UnknownCommand(other.to_string())),
    };
    let mut args = Arguments { command, words };

    let parsed = match command {
        "add" => Command::Add {
            destination: args.required("dst")?,
            mask: args.required("mask")?,
            outgoing_interface: args.required("oif")?,
            gateway: args.required("gw")?,
        },
        "del" => Command::Delete {
            destination: args.required("dst")?,
            mask: args.required("mask")?,
        },
        "mod" => {
            let destination = args.required("dst")?;
            let mask = args.required("mask")?;
            return Ok(Command::Modify {
                destination,
                mask,
                patch: args.patch()?,
            });
        }
        "sub" => Command::Subscribe {
            destination: args.required("dst")?,
            mask: args.required("mask")?,
            subscriber_id: args.subscriber_id()?,
        },
        "unsub" => Command::Unsubscribe {
            destination: args.required("dst")?,
            mask: args.required("mask")?,
            subscriber_id: args.subscriber_id()?,
        },
        "show" => Command::Show,
        "json" => Command::Json,
        "count" => Command::Count,
        "help" => Command::Help,
        _ => Command::Quit,
    };
    args.finish()?;
    Ok(parsed)
}
