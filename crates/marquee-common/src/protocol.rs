//! Wire protocol between the extension host and webview documents.
//!
//! Every message is one JSON object. The top-level key decides its kind:
//!
//! - `{"ready": bool}` (webview -> host): readiness handshake.
//! - `{"west": {"execCommands": [...]}}` (webview -> host): host command requests.
//! - `{"channel": {...}}` (both ways): a namespaced channel frame.
//! - `{"persistence": {...}}` (host -> webview): full state snapshot.
//! - `{"bootstrap": {...}}` (host -> webview): initial payload at panel creation.
//! - anything else: a state envelope `{ "<namespace>": { field: value } }`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ProtocolError;
use crate::types::{JsonMap, Snapshot};

/// Top-level keys that can never be namespace names.
pub const RESERVED_KEYS: &[&str] = &["ready", "west", "persistence", "channel", "bootstrap"];

/// A frame on a namespaced channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChannelFrame {
    /// Host probe sent to an endpoint while registering a channel.
    Hello { namespace: String },
    /// Webview reply to `Hello`, or sent unprompted when a client attaches.
    Ack { namespace: String },
    /// A named event with its payload.
    Event {
        namespace: String,
        event: String,
        #[serde(default)]
        payload: Value,
    },
}

impl ChannelFrame {
    pub fn namespace(&self) -> &str {
        match self {
            Self::Hello { namespace } | Self::Ack { namespace } | Self::Event { namespace, .. } => {
                namespace
            }
        }
    }

    pub fn event(namespace: &str, event: &str, payload: Value) -> Self {
        Self::Event {
            namespace: namespace.to_string(),
            event: event.to_string(),
            payload,
        }
    }

    pub fn to_value(&self) -> Value {
        let frame = serde_json::to_value(self).unwrap_or(Value::Null);
        serde_json::json!({ "channel": frame })
    }
}

/// One host command invocation requested by a webview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
}

impl CommandRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: None,
            options: None,
        }
    }

    /// Arguments as a list: an array is spread, a single value becomes one argument.
    pub fn args_list(&self) -> Vec<Value> {
        match &self.args {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.clone(),
            Some(other) => vec![other.clone()],
        }
    }
}

/// `{ "<namespace>": { field: value, ... }, ... }`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateEnvelope {
    entries: BTreeMap<String, JsonMap>,
}

impl StateEnvelope {
    pub fn new() -> Self {
        Self::default()
    }

    /// An envelope carrying exactly one field of one namespace.
    pub fn single(namespace: &str, field: &str, value: Value) -> Self {
        let mut env = Self::new();
        env.insert(namespace, field, value);
        env
    }

    pub fn insert(&mut self, namespace: &str, field: &str, value: Value) {
        self.entries
            .entry(namespace.to_string())
            .or_default()
            .insert(field.to_string(), value);
    }

    pub fn insert_partial(&mut self, namespace: &str, partial: JsonMap) {
        let entry = self.entries.entry(namespace.to_string()).or_default();
        for (k, v) in partial {
            entry.insert(k, v);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &JsonMap)> {
        self.entries.iter()
    }

    pub fn get(&self, namespace: &str) -> Option<&JsonMap> {
        self.entries.get(namespace)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn from_value(value: &Value) -> Result<Self, ProtocolError> {
        let obj = value.as_object().ok_or(ProtocolError::NotAnObject)?;
        if obj.is_empty() {
            return Err(ProtocolError::MissingNamespace);
        }

        let mut entries = BTreeMap::new();
        for (ns, partial) in obj {
            if RESERVED_KEYS.contains(&ns.as_str()) {
                return Err(ProtocolError::Malformed(format!(
                    "reserved key {ns:?} in state envelope"
                )));
            }
            let fields = partial.as_object().ok_or_else(|| {
                ProtocolError::Malformed(format!("namespace {ns:?} does not carry an object"))
            })?;
            entries.insert(ns.clone(), fields.clone());
        }
        Ok(Self { entries })
    }

    pub fn to_value(&self) -> Value {
        let obj: JsonMap = self
            .entries
            .iter()
            .map(|(ns, fields)| (ns.clone(), Value::Object(fields.clone())))
            .collect();
        Value::Object(obj)
    }
}

/// Initial payload handed to a panel when it is created.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BootstrapPayload {
    pub title: String,
    pub snapshot: Snapshot,
    pub widget_scripts: Vec<String>,
}

/// Messages a webview sends to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum WebviewMessage {
    Ready(bool),
    Commands(Vec<CommandRequest>),
    Channel(ChannelFrame),
    State(StateEnvelope),
}

impl WebviewMessage {
    pub fn parse(value: &Value) -> Result<Self, ProtocolError> {
        let obj = value.as_object().ok_or(ProtocolError::NotAnObject)?;

        if let Some(ready) = obj.get("ready") {
            return ready
                .as_bool()
                .map(Self::Ready)
                .ok_or_else(|| ProtocolError::Malformed("ready must be a boolean".into()));
        }

        if let Some(frame) = obj.get("channel") {
            return parse_frame(frame).map(Self::Channel);
        }

        if let Some(west) = obj.get("west") {
            let commands = west
                .get("execCommands")
                .ok_or_else(|| ProtocolError::Malformed("west without execCommands".into()))?;
            let commands: Vec<CommandRequest> = serde_json::from_value(commands.clone())
                .map_err(|e| ProtocolError::Malformed(format!("execCommands: {e}")))?;
            return Ok(Self::Commands(commands));
        }

        StateEnvelope::from_value(value).map(Self::State)
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Ready(ready) => serde_json::json!({ "ready": ready }),
            Self::Commands(commands) => serde_json::json!({
                "west": { "execCommands": commands }
            }),
            Self::Channel(frame) => frame.to_value(),
            Self::State(env) => env.to_value(),
        }
    }
}

/// Messages the host sends to a webview.
#[derive(Debug, Clone, PartialEq)]
pub enum HostMessage {
    Bootstrap(BootstrapPayload),
    Persistence(Snapshot),
    Channel(ChannelFrame),
    State(StateEnvelope),
}

impl HostMessage {
    pub fn parse(value: &Value) -> Result<Self, ProtocolError> {
        let obj = value.as_object().ok_or(ProtocolError::NotAnObject)?;

        if let Some(bootstrap) = obj.get("bootstrap") {
            return serde_json::from_value(bootstrap.clone())
                .map(Self::Bootstrap)
                .map_err(|e| ProtocolError::Malformed(format!("bootstrap: {e}")));
        }

        if let Some(snapshot) = obj.get("persistence") {
            return serde_json::from_value(snapshot.clone())
                .map(Self::Persistence)
                .map_err(|e| ProtocolError::Malformed(format!("persistence: {e}")));
        }

        if let Some(frame) = obj.get("channel") {
            return parse_frame(frame).map(Self::Channel);
        }

        StateEnvelope::from_value(value).map(Self::State)
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Bootstrap(payload) => serde_json::json!({ "bootstrap": payload }),
            Self::Persistence(snapshot) => serde_json::json!({ "persistence": snapshot }),
            Self::Channel(frame) => frame.to_value(),
            Self::State(env) => env.to_value(),
        }
    }
}

fn parse_frame(frame: &Value) -> Result<ChannelFrame, ProtocolError> {
    let frame: ChannelFrame = serde_json::from_value(frame.clone())
        .map_err(|e| ProtocolError::Malformed(format!("channel frame: {e}")))?;
    if frame.namespace().is_empty() {
        return Err(ProtocolError::MissingNamespace);
    }
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_ready() {
        let msg = WebviewMessage::parse(&json!({ "ready": true })).unwrap();
        assert_eq!(msg, WebviewMessage::Ready(true));

        let msg = WebviewMessage::parse(&json!({ "ready": false })).unwrap();
        assert_eq!(msg, WebviewMessage::Ready(false));
    }

    #[test]
    fn parse_ready_rejects_non_bool() {
        let err = WebviewMessage::parse(&json!({ "ready": "yes" })).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn parse_exec_commands() {
        let msg = WebviewMessage::parse(&json!({
            "west": { "execCommands": [
                { "command": "marquee.jsonImport" },
                { "command": "vscode.openFolder", "args": ["/tmp/project"], "options": { "forceNewWindow": true } }
            ]}
        }))
        .unwrap();

        let WebviewMessage::Commands(cmds) = msg else {
            panic!("expected commands");
        };
        assert_eq!(cmds.len(), 2);
        assert_eq!(cmds[0].command, "marquee.jsonImport");
        assert!(cmds[0].args_list().is_empty());
        assert_eq!(cmds[1].args_list(), vec![json!("/tmp/project")]);
        assert_eq!(cmds[1].options, Some(json!({ "forceNewWindow": true })));
    }

    #[test]
    fn single_arg_becomes_one_element_list() {
        let mut req = CommandRequest::new("workbench.action.openSettings");
        req.args = Some(json!("marquee"));
        assert_eq!(req.args_list(), vec![json!("marquee")]);
    }

    #[test]
    fn parse_state_envelope() {
        let msg = WebviewMessage::parse(&json!({
            "widgets.todo": { "todos": [] },
            "widgets.weather": { "scale": "C" }
        }))
        .unwrap();

        let WebviewMessage::State(env) = msg else {
            panic!("expected state envelope");
        };
        assert_eq!(env.get("widgets.todo").unwrap()["todos"], json!([]));
        assert_eq!(env.get("widgets.weather").unwrap()["scale"], json!("C"));
    }

    #[test]
    fn empty_object_has_no_namespace() {
        let err = WebviewMessage::parse(&json!({})).unwrap_err();
        assert!(matches!(err, ProtocolError::MissingNamespace));
    }

    #[test]
    fn non_object_is_rejected() {
        assert!(matches!(
            WebviewMessage::parse(&json!([1, 2])).unwrap_err(),
            ProtocolError::NotAnObject
        ));
        assert!(matches!(
            WebviewMessage::parse(&json!("ready")).unwrap_err(),
            ProtocolError::NotAnObject
        ));
    }

    #[test]
    fn namespace_with_non_object_partial_is_malformed() {
        let err = WebviewMessage::parse(&json!({ "widgets.todo": 3 })).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn channel_frame_wraps_under_channel_key() {
        let frame = ChannelFrame::event("stateful.marquee", "counter", json!(3));
        let value = frame.to_value();
        assert_eq!(value["channel"]["type"], "event");
        assert_eq!(value["channel"]["namespace"], "stateful.marquee");

        let parsed = WebviewMessage::parse(&value).unwrap();
        assert_eq!(parsed, WebviewMessage::Channel(frame));
    }

    #[test]
    fn channel_frame_requires_namespace() {
        let err = WebviewMessage::parse(&json!({
            "channel": { "type": "ack", "namespace": "" }
        }))
        .unwrap_err();
        assert!(matches!(err, ProtocolError::MissingNamespace));
    }

    #[test]
    fn host_persistence_parses_snapshot() {
        let value = json!({
            "persistence": {
                "widgets.todo": { "state": { "todos": [1] }, "configuration": {} }
            }
        });
        let HostMessage::Persistence(snapshot) = HostMessage::parse(&value).unwrap() else {
            panic!("expected persistence");
        };
        assert_eq!(snapshot["widgets.todo"].state["todos"], json!([1]));
    }

    #[test]
    fn host_bootstrap_uses_camel_case() {
        let msg = HostMessage::Bootstrap(BootstrapPayload {
            title: "Marquee".into(),
            snapshot: Snapshot::new(),
            widget_scripts: vec!["3rdParty/ext/widget.js".into()],
        });
        let value = msg.to_value();
        assert_eq!(value["bootstrap"]["widgetScripts"][0], "3rdParty/ext/widget.js");
        assert_eq!(HostMessage::parse(&value).unwrap(), msg);
    }

    #[test]
    fn state_envelope_rejects_reserved_keys_mixed_in() {
        let err = StateEnvelope::from_value(&json!({
            "widgets.todo": {},
            "persistence": {}
        }))
        .unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }
}
