//! High-level commands typed at the Entry Point prompt.
//!
//! This module defines the [`Command`] enum, which encapsulates user commands and their
//! arguments, and [`Request`], the subset of commands that become a message for the
//! Entry Point.
//!
//! It serves as an abstraction between the CLI parser and the protocol layer: a parsed
//! [`Request`] is turned into a message [`Body`] with [`Request::into_body`], storing any
//! values in the message's [`MemoryPool`].
//!
//! # Overview
//!
//! - `get [-n] [-c] NAME...`: read parameter values (`-n` next level only, `-c` config only).
//! - `set [-t TYPE] NAME=VALUE...`: write parameter values.
//! - `names [-n] PATH`: list parameter names below `PATH`.
//! - `add OBJECT [NAME=VALUE...]`: create an object instance.
//! - `del OBJECT...`: delete object instances.
//! - `discover BACKEND OBJECT`: ask a backend to report its configuration.
//! - `reboot [DELAY]` and `reset [TYPE] [DELAY]`: device actions.
//! - `init`: trigger the initial actions.
//! - `raw TEXT`: send `TEXT` unchanged.
//! - `.exit`: close the session.
//!
//! # Example
//! ```rust
//! use frontapi::{Command, Request};
//!
//! let cmd: Command = "get -n Device.WiFi.".try_into().unwrap();
//! assert_eq!(
//!     cmd,
//!     Command::Request(Request::Get {
//!         names: vec!["Device.WiFi.".to_string()],
//!         next_level: true,
//!         config_only: false,
//!     })
//! );
//! ```
use thiserror::Error;

use crate::protocol::{
    AddObjectReq, Body, DelObjectReq, DiscoverConfigReq, FrontApiError, GetParamNamesReq,
    GetParamValueReq, MAX_ADDOBJ_PARAMS, MAX_DELOBJ_PARAMS, MAX_GET_PARAMS, MAX_SET_PARAMS,
    MemoryPool, RebootReq, ResetReq, SetParamValueReq, SetType, reset_type,
};

/// List of possible errors when parsing a command.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("unrecognized command '{0}'")]
    UnrecognizedCommand(String),

    #[error("invalid '{command}' command, {reason}")]
    InvalidCommandArguments { command: String, reason: String },

    #[error("no command provided")]
    Empty,
}

/// Commands that are sent to the Entry Point as a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Get {
        names: Vec<String>,
        next_level: bool,
        config_only: bool,
    },
    Set {
        set_type: SetType,
        pairs: Vec<(String, String)>,
    },
    Names {
        path: String,
        next_level: bool,
    },
    Add {
        object: String,
        pairs: Vec<(String, String)>,
    },
    Del {
        objects: Vec<String>,
    },
    Discover {
        backend: String,
        object: String,
    },
    Reboot {
        delay: u32,
    },
    Reset {
        reset_type: u32,
        delay: u32,
    },
    Init,
}

/// High-level user supplied commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Build a message and send it to the Entry Point.
    Request(Request),
    /// Send already encoded message text unchanged.
    Raw(String),
    /// Close the connection and terminate the process.
    Exit,
}

impl TryFrom<&str> for Command {
    type Error = CommandError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let s = s.trim();
        let (word, rest) = s.split_once(char::is_whitespace).unwrap_or((s, ""));
        let args = rest.split_whitespace().collect::<Vec<&str>>();

        let request = match word {
            "" => return Err(CommandError::Empty),
            ".exit" => return Ok(Command::Exit),
            "raw" if rest.trim().is_empty() => {
                return Err(invalid("raw", "requires message text. Example: raw <EP_ApiMsg>..."));
            }
            "raw" => return Ok(Command::Raw(rest.trim().to_string())),
            "get" => parse_get(&args)?,
            "set" => parse_set(&args)?,
            "names" => parse_names(&args)?,
            "add" => parse_add(&args)?,
            "del" => parse_del(&args)?,
            "discover" => match args.as_slice() {
                [backend, object] => Request::Discover {
                    backend: backend.to_string(),
                    object: object.to_string(),
                },
                _ => {
                    return Err(invalid(
                        "discover",
                        "requires backend and object names. Example: discover wifi Device.WiFi.",
                    ));
                }
            },
            "reboot" => match args.as_slice() {
                [] => Request::Reboot { delay: 0 },
                [delay] => Request::Reboot {
                    delay: parse_delay("reboot", delay)?,
                },
                _ => return Err(invalid("reboot", "takes at most a delay in seconds")),
            },
            "reset" => parse_reset(&args)?,
            "init" if args.is_empty() => Request::Init,
            "init" => return Err(invalid("init", "takes no arguments")),
            s => return Err(CommandError::UnrecognizedCommand(s.to_string())),
        };
        Ok(Command::Request(request))
    }
}

impl Request {
    /// Builds the message body, copying values into `pool`.
    pub fn into_body<'buf>(self, pool: &mut MemoryPool<'buf>) -> Result<Body<'buf>, FrontApiError> {
        let body = match self {
            Request::Get {
                names,
                next_level,
                config_only,
            } => Body::GetParamValue(GetParamValueReq {
                next_level,
                config_only,
                names,
            }),
            Request::Set { set_type, pairs } => Body::SetParamValue(SetParamValueReq {
                set_type,
                values: pairs
                    .iter()
                    .map(|(name, value)| pool.pair(name, value))
                    .collect::<Result<_, _>>()?,
            }),
            Request::Names { path, next_level } => {
                Body::GetParamNames(GetParamNamesReq { path, next_level })
            }
            Request::Add { object, pairs } => Body::AddObject(AddObjectReq {
                object,
                values: pairs
                    .iter()
                    .map(|(name, value)| pool.pair(name, value))
                    .collect::<Result<_, _>>()?,
            }),
            Request::Del { objects } => Body::DelObject(DelObjectReq { objects }),
            Request::Discover { backend, object } => {
                Body::DiscoverConfig(DiscoverConfigReq { backend, object })
            }
            Request::Reboot { delay } => Body::Reboot(RebootReq {
                delay_seconds: delay,
            }),
            Request::Reset { reset_type, delay } => Body::Reset(ResetReq {
                reset_type,
                delay_seconds: delay,
            }),
            Request::Init => Body::InitActions,
        };
        Ok(body)
    }
}

fn invalid(command: &str, reason: impl Into<String>) -> CommandError {
    CommandError::InvalidCommandArguments {
        command: command.to_string(),
        reason: reason.into(),
    }
}

/// Splits leading `-x` flags from positional arguments.
fn split_flags<'a>(args: &[&'a str]) -> (Vec<&'a str>, Vec<&'a str>) {
    let positional = args.iter().position(|a| !a.starts_with('-')).unwrap_or(args.len());
    (args[..positional].to_vec(), args[positional..].to_vec())
}

fn parse_get(args: &[&str]) -> Result<Request, CommandError> {
    let (flags, names) = split_flags(args);
    let mut next_level = false;
    let mut config_only = false;
    for flag in flags {
        match flag {
            "-n" | "--next-level" => next_level = true,
            "-c" | "--config-only" => config_only = true,
            other => return Err(invalid("get", format!("unknown flag '{other}'"))),
        }
    }

    if names.is_empty() {
        return Err(invalid(
            "get",
            "requires at least one parameter name. Example: get Device.WiFi.Enable",
        ));
    }
    if names.len() > MAX_GET_PARAMS {
        return Err(invalid("get", format!("accepts at most {MAX_GET_PARAMS} names")));
    }

    Ok(Request::Get {
        names: names.iter().map(|n| n.to_string()).collect(),
        next_level,
        config_only,
    })
}

fn parse_pairs(command: &str, args: &[&str]) -> Result<Vec<(String, String)>, CommandError> {
    args.iter()
        .map(|arg| match arg.split_once('=') {
            Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
            _ => Err(invalid(
                command,
                format!("'{arg}' is not a NAME=VALUE pair"),
            )),
        })
        .collect()
}

fn parse_set_type(s: &str) -> Result<SetType, CommandError> {
    let set_type = match s {
        "apply" => SetType::APPLY,
        "apply-save" => SetType::APPLY_SAVE,
        "test" => SetType::TEST,
        "test-apply" => SetType::TEST_APPLY,
        "test-apply-save" => SetType::TEST_APPLY_SAVE,
        other => other
            .parse::<i32>()
            .map(SetType)
            .map_err(|_| invalid("set", format!("unknown set type '{other}'")))?,
    };

    if !set_type.is_valid() {
        return Err(invalid("set", format!("invalid set type {}", set_type.0)));
    }
    Ok(set_type)
}

fn parse_set(args: &[&str]) -> Result<Request, CommandError> {
    let (set_type, args) = match args {
        ["-t" | "--type", set_type, rest @ ..] => (parse_set_type(set_type)?, rest),
        ["-t" | "--type"] => return Err(invalid("set", "'-t' requires a set type")),
        rest => (SetType::default(), rest),
    };

    if args.is_empty() {
        return Err(invalid(
            "set",
            "requires at least one pair. Example: set Device.WiFi.Enable=true",
        ));
    }
    if args.len() > MAX_SET_PARAMS {
        return Err(invalid("set", format!("accepts at most {MAX_SET_PARAMS} pairs")));
    }

    Ok(Request::Set {
        set_type,
        pairs: parse_pairs("set", args)?,
    })
}

fn parse_names(args: &[&str]) -> Result<Request, CommandError> {
    match args {
        [path] => Ok(Request::Names {
            path: path.to_string(),
            next_level: false,
        }),
        ["-n" | "--next-level", path] => Ok(Request::Names {
            path: path.to_string(),
            next_level: true,
        }),
        _ => Err(invalid(
            "names",
            "requires a single path. Example: names -n Device.WiFi.",
        )),
    }
}

fn parse_add(args: &[&str]) -> Result<Request, CommandError> {
    let Some((object, pairs)) = args.split_first() else {
        return Err(invalid(
            "add",
            "requires an object name. Example: add Device.NAT.PortMapping. Enable=true",
        ));
    };
    if pairs.len() > MAX_ADDOBJ_PARAMS {
        return Err(invalid("add", format!("accepts at most {MAX_ADDOBJ_PARAMS} pairs")));
    }

    Ok(Request::Add {
        object: object.to_string(),
        pairs: parse_pairs("add", pairs)?,
    })
}

fn parse_del(args: &[&str]) -> Result<Request, CommandError> {
    if args.is_empty() {
        return Err(invalid(
            "del",
            "requires at least one object. Example: del Device.NAT.PortMapping.3.",
        ));
    }
    if args.len() > MAX_DELOBJ_PARAMS {
        return Err(invalid("del", format!("accepts at most {MAX_DELOBJ_PARAMS} objects")));
    }

    Ok(Request::Del {
        objects: args.iter().map(|o| o.to_string()).collect(),
    })
}

fn parse_delay(command: &str, s: &str) -> Result<u32, CommandError> {
    s.parse::<u32>().map_err(|_| {
        invalid(
            command,
            "invalid delay; argument should be a non-negative number of seconds.",
        )
    })
}

fn parse_reset(args: &[&str]) -> Result<Request, CommandError> {
    let kind_of = |s: &str| match s {
        "factory" => Ok(reset_type::FACTORY),
        "keep-ip" => Ok(reset_type::KEEP_IP),
        "ghn" => Ok(reset_type::GHN),
        other => other
            .parse::<u32>()
            .map_err(|_| invalid("reset", format!("unknown reset type '{other}'"))),
    };

    let (reset_type, delay) = match args {
        [] => (reset_type::FACTORY, 0),
        [kind] => (kind_of(kind)?, 0),
        [kind, delay] => (kind_of(kind)?, parse_delay("reset", delay)?),
        _ => return Err(invalid("reset", "takes a reset type and a delay. Example: reset keep-ip 5")),
    };
    Ok(Request::Reset { reset_type, delay })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Result<Command, CommandError> {
        Command::try_from(s)
    }

    #[test]
    fn command_from_string() {
        let inputs = vec![
            (".exit", Command::Exit),
            ("  init  ", Command::Request(Request::Init)),
            ("reboot", Command::Request(Request::Reboot { delay: 0 })),
            ("reboot 30", Command::Request(Request::Reboot { delay: 30 })),
            (
                "reset keep-ip 5",
                Command::Request(Request::Reset {
                    reset_type: reset_type::KEEP_IP,
                    delay: 5,
                }),
            ),
            (
                "reset 2",
                Command::Request(Request::Reset {
                    reset_type: reset_type::GHN,
                    delay: 0,
                }),
            ),
            (
                "names -n Device.WiFi.",
                Command::Request(Request::Names {
                    path: "Device.WiFi.".to_string(),
                    next_level: true,
                }),
            ),
            (
                "discover wifi Device.WiFi.",
                Command::Request(Request::Discover {
                    backend: "wifi".to_string(),
                    object: "Device.WiFi.".to_string(),
                }),
            ),
            (
                "del A.1. A.2.",
                Command::Request(Request::Del {
                    objects: vec!["A.1.".to_string(), "A.2.".to_string()],
                }),
            ),
        ];

        for (cmd, expected) in inputs {
            assert_eq!(parse(cmd).unwrap(), expected, "parsing '{cmd}'");
        }
    }

    #[test]
    fn get_flags() {
        let cmd = parse("get -c -n A.B C.D").unwrap();
        assert_eq!(
            cmd,
            Command::Request(Request::Get {
                names: vec!["A.B".to_string(), "C.D".to_string()],
                next_level: true,
                config_only: true,
            })
        );
        assert!(parse("get -x A").is_err());
        assert!(parse("get -n").is_err());
    }

    #[test]
    fn set_pairs_and_types() {
        let cmd = parse("set -t apply-save A.B=1 C.D=").unwrap();
        assert_eq!(
            cmd,
            Command::Request(Request::Set {
                set_type: SetType::APPLY_SAVE,
                pairs: vec![
                    ("A.B".to_string(), "1".to_string()),
                    ("C.D".to_string(), String::new()),
                ],
            })
        );

        let Command::Request(Request::Set { set_type, .. }) = parse("set A=1").unwrap() else {
            panic!("expected a set request");
        };
        assert_eq!(set_type, SetType::APPLY);

        assert!(parse("set -t 8 A=1").is_err());
        assert!(parse("set A").is_err());
        assert!(parse("set =1").is_err());
        assert!(parse("set").is_err());
    }

    #[test]
    fn raw_keeps_text() {
        let cmd = parse("raw <EP_ApiMsg> <hdr/> </EP_ApiMsg>").unwrap();
        assert_eq!(cmd, Command::Raw("<EP_ApiMsg> <hdr/> </EP_ApiMsg>".to_string()));
        assert!(parse("raw   ").is_err());
    }

    #[test]
    fn limits_are_enforced() {
        let names = vec!["A"; MAX_GET_PARAMS + 1].join(" ");
        assert!(parse(&format!("get {names}")).is_err());

        let objects = vec!["A."; MAX_DELOBJ_PARAMS + 1].join(" ");
        assert!(parse(&format!("del {objects}")).is_err());
    }

    #[test]
    fn errors_are_reported() {
        assert_eq!(parse("   "), Err(CommandError::Empty));
        assert_eq!(
            parse("select").unwrap_err().to_string(),
            "unrecognized command 'select'"
        );
        assert_eq!(
            parse("reboot soon").unwrap_err().to_string(),
            "invalid 'reboot' command, invalid delay; argument should be a non-negative number of seconds."
        );
    }

    #[test]
    fn request_into_body_uses_pool() {
        let mut buffer = [0_u8; 64];
        let mut pool = MemoryPool::default();
        pool.init(&mut buffer).unwrap();

        let Command::Request(request) = parse("add Device.NAT.PortMapping. Enable=true").unwrap()
        else {
            panic!("expected a request");
        };
        let body = request.into_body(&mut pool).unwrap();
        match body {
            Body::AddObject(req) => {
                assert_eq!(req.object, "Device.NAT.PortMapping.");
                assert_eq!(req.values[0].name, "Enable");
                assert_eq!(req.values[0].value, "true");
            }
            other => panic!("unexpected body {other:?}"),
        }
        assert_eq!(pool.offset(), 5);
    }

    #[test]
    fn request_into_body_needs_pool_for_values() {
        let mut pool = MemoryPool::default();
        let request = Request::Set {
            set_type: SetType::APPLY,
            pairs: vec![("A".to_string(), "1".to_string())],
        };
        let err = request.into_body(&mut pool).unwrap_err();
        assert_eq!(err.code(), crate::protocol::code::BAD_INPUT_PARAMS);

        let body = Request::Init.into_body(&mut pool).unwrap();
        assert_eq!(body, Body::InitActions);
    }
}
