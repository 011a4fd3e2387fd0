// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broadcaster event decoding.
//!
//! Inbound bus messages are JSON objects with a mandatory `id` discriminator.
//! [`BusEvent::decode`] validates the fields each discriminator requires and
//! projects the message into a tagged [`EventKind`]; unknown discriminators
//! decode to [`EventKind::Other`] so new broadcaster event types never break
//! the agent. Decoding is pure and side-effect free.

use crate::id::{Target, TrackingId};
use crate::voting::Vote;
use serde_json::Value;
use thiserror::Error;

pub const TYPE_COMMAND: &str = "cmd";
pub const TYPE_FULL_UPDATE: &str = "full-update";
pub const TYPE_REQUEST: &str = "request";
pub const TYPE_SERVICE_CHANGE: &str = "service-change";
pub const TYPE_HEARTBEAT: &str = "heartbeat";
pub const TYPE_VOTE: &str = "vote";
pub const TYPE_CALL_INFO: &str = "call-info";

/// Errors from decoding an inbound bus message.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("event \"{event_type}\" is missing attribute \"{attribute}\", event dump: {dump}")]
    IncompleteEvent { event_type: String, attribute: &'static str, dump: String },

    #[error("event has no valid type discriminator, event dump: {dump}")]
    InvalidEventType { dump: String },

    #[error("event \"{event_type}\" is missing attribute \"{attribute}\" in payload, event dump: {dump}")]
    PayloadIntegrity { event_type: String, attribute: &'static str, dump: String },
}

/// Lifecycle state published for a command on a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmdState {
    Started,
    Failed,
    Finished,
}

crate::simple_display! {
    CmdState {
        Started => "started",
        Failed => "failed",
        Finished => "finished",
    }
}

/// A deployment request bound to a target: the command to run and its
/// arguments. Immutable after decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub target: Target,
    pub command: String,
    pub arguments: Vec<String>,
}

impl Request {
    /// Correlation id extracted from the argument list.
    ///
    /// Scans for the `--tracking-id=` prefix; the last occurrence wins, and
    /// only the text up to the next `=` is taken. Requests without the
    /// argument key their election on `None`.
    pub fn tracking_id(&self) -> Option<TrackingId> {
        let mut found = None;
        for argument in &self.arguments {
            if argument.starts_with("--tracking-id=") {
                found = argument.split('=').nth(1).map(TrackingId::new);
            }
        }
        found
    }
}

crate::builder! {
    pub struct RequestBuilder => Request {
        into {
            target: Target = "dev01",
            command: String = "deploy",
        }
        set {
            arguments: Vec<String> = Vec::new(),
        }
    }
}

/// State entry of a `service-change` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceState {
    pub uri: String,
    pub state: String,
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} is {}", self.uri, self.state)
    }
}

/// Decoded variant of a bus message.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// Triggers an election; the target lives on the envelope.
    Request { command: String, arguments: Vec<String> },
    /// A peer's bid in an election.
    Vote { vote: Vote, tracking_id: Option<TrackingId> },
    /// Lifecycle echo of a command on some replica; informational.
    Command { command: String, state: String, message: Option<String> },
    /// Service state transitions; informational.
    ServiceChange { services: Vec<ServiceState> },
    FullUpdate,
    Heartbeat,
    CallInfo,
    /// Unknown discriminator; logged, never an error.
    Other(String),
}

/// An inbound bus message: the subscription topic it arrived on (or the
/// `target` attribute it carried) plus the decoded variant.
#[derive(Debug, Clone, PartialEq)]
pub struct BusEvent {
    pub target: Option<Target>,
    pub kind: EventKind,
}

impl BusEvent {
    /// Decode a raw bus message.
    ///
    /// `topic` is the subscription topic the message arrived on; when absent
    /// the `target` attribute of the message itself is used.
    pub fn decode(topic: Option<Target>, data: &Value) -> Result<Self, DecodeError> {
        let dump = || data.to_string();
        let object = data
            .as_object()
            .ok_or_else(|| DecodeError::InvalidEventType { dump: dump() })?;
        let event_type = object
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| DecodeError::InvalidEventType { dump: dump() })?;

        let target = topic.or_else(|| {
            object.get("target").and_then(Value::as_str).map(Target::new)
        });

        let incomplete = |attribute: &'static str| DecodeError::IncompleteEvent {
            event_type: event_type.to_string(),
            attribute,
            dump: dump(),
        };
        let require =
            |attribute: &'static str| object.get(attribute).ok_or_else(|| incomplete(attribute));
        let require_str = |attribute: &'static str| {
            require(attribute)?.as_str().ok_or_else(|| incomplete(attribute))
        };

        let kind = match event_type {
            TYPE_REQUEST => {
                let command = require_str("cmd")?.to_string();
                let arguments = require("args")?
                    .as_array()
                    .ok_or_else(|| incomplete("args"))?
                    .iter()
                    .map(|value| {
                        value.as_str().map(str::to_string).ok_or_else(|| incomplete("args"))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                EventKind::Request { command, arguments }
            }
            TYPE_VOTE => EventKind::Vote {
                vote: Vote::from_string(require_str("payload")?),
                tracking_id: object
                    .get("tracking_id")
                    .and_then(Value::as_str)
                    .map(TrackingId::new),
            },
            TYPE_COMMAND => EventKind::Command {
                command: require_str("cmd")?.to_string(),
                state: require_str("state")?.to_string(),
                message: object
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            },
            TYPE_SERVICE_CHANGE => {
                let payload =
                    require("payload")?.as_array().ok_or_else(|| incomplete("payload"))?;
                let mut services = Vec::with_capacity(payload.len());
                for entry in payload {
                    let field = |attribute: &'static str| {
                        entry.get(attribute).and_then(Value::as_str).ok_or_else(|| {
                            DecodeError::PayloadIntegrity {
                                event_type: event_type.to_string(),
                                attribute,
                                dump: dump(),
                            }
                        })
                    };
                    services.push(ServiceState {
                        uri: field("uri")?.to_string(),
                        state: field("state")?.to_string(),
                    });
                }
                EventKind::ServiceChange { services }
            }
            TYPE_FULL_UPDATE => EventKind::FullUpdate,
            TYPE_HEARTBEAT => EventKind::Heartbeat,
            TYPE_CALL_INFO => EventKind::CallInfo,
            other => EventKind::Other(other.to_string()),
        };

        Ok(Self { target, kind })
    }

    /// Re-encode into the wire representation.
    ///
    /// `decode(None, &event.to_value())` reproduces the event.
    pub fn to_value(&self) -> Value {
        let mut object = serde_json::Map::new();
        if let Some(target) = &self.target {
            object.insert("target".into(), Value::String(target.as_str().into()));
        }
        let insert_str = |object: &mut serde_json::Map<String, Value>, key: &str, value: &str| {
            object.insert(key.into(), Value::String(value.into()));
        };
        match &self.kind {
            EventKind::Request { command, arguments } => {
                insert_str(&mut object, "id", TYPE_REQUEST);
                insert_str(&mut object, "cmd", command);
                object.insert(
                    "args".into(),
                    Value::Array(
                        arguments.iter().map(|a| Value::String(a.clone())).collect(),
                    ),
                );
            }
            EventKind::Vote { vote, tracking_id } => {
                insert_str(&mut object, "id", TYPE_VOTE);
                insert_str(&mut object, "payload", vote.as_str());
                if let Some(tracking_id) = tracking_id {
                    insert_str(&mut object, "tracking_id", tracking_id.as_str());
                }
            }
            EventKind::Command { command, state, message } => {
                insert_str(&mut object, "id", TYPE_COMMAND);
                insert_str(&mut object, "cmd", command);
                insert_str(&mut object, "state", state);
                if let Some(message) = message {
                    insert_str(&mut object, "message", message);
                }
            }
            EventKind::ServiceChange { services } => {
                insert_str(&mut object, "id", TYPE_SERVICE_CHANGE);
                object.insert(
                    "payload".into(),
                    Value::Array(
                        services
                            .iter()
                            .map(|s| {
                                serde_json::json!({ "uri": s.uri, "state": s.state })
                            })
                            .collect(),
                    ),
                );
            }
            EventKind::FullUpdate => insert_str(&mut object, "id", TYPE_FULL_UPDATE),
            EventKind::Heartbeat => insert_str(&mut object, "id", TYPE_HEARTBEAT),
            EventKind::CallInfo => insert_str(&mut object, "id", TYPE_CALL_INFO),
            EventKind::Other(id) => insert_str(&mut object, "id", id),
        }
        Value::Object(object)
    }

    fn target_label(&self) -> &str {
        self.target.as_ref().map(Target::as_str).unwrap_or("-")
    }
}

impl std::fmt::Display for BusEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let target = self.target_label();
        match &self.kind {
            EventKind::Request { command, arguments } => {
                write!(
                    f,
                    "target[{target}] requested command \"{command}\" using arguments {arguments:?}"
                )
            }
            EventKind::Vote { vote, .. } => write!(f, "vote with value {vote}"),
            EventKind::Command { command, state, message } => match message {
                Some(message) => write!(
                    f,
                    "(broadcaster) target[{target}] command \"{command}\" {state}: {message}"
                ),
                None => write!(
                    f,
                    "(broadcaster) target[{target}] command \"{command}\" {state}."
                ),
            },
            EventKind::ServiceChange { services } => {
                let changes =
                    services.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
                write!(f, "target[{target}] services changed: {changes}")
            }
            EventKind::FullUpdate => {
                write!(f, "target[{target}] full update of status information.")
            }
            EventKind::Heartbeat => write!(f, "heartbeat on {target}"),
            EventKind::CallInfo => write!(f, "call info from target {target}"),
            EventKind::Other(id) => write!(f, "unknown event type {id}"),
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;

#[cfg(test)]
#[path = "event_property_tests.rs"]
mod property_tests;
