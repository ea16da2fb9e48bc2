//! Data models exchanged with event sources and the executor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Entryway zone
pub const ZONE_1: &str = "ZONE_1";
/// Secondary zone
pub const ZONE_2: &str = "ZONE_2";
/// Sentinel zone meaning every zone the executor knows about
pub const ALL_ZONES: &str = "ALL";

/// Kind of external signal carried by an [`IntegrationEvent`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    /// Presence detected by a motion sensor
    Motion,
    /// Doorbell pressed
    Doorbell,
    /// Voice assistant intent
    Alexa,
    /// Anything else an adapter forwards
    Generic,
    /// A type string outside the known set, kept verbatim
    Unrecognized(String),
}

impl EventType {
    /// Wire name of the event type
    pub fn as_str(&self) -> &str {
        match self {
            Self::Motion => "MOTION",
            Self::Doorbell => "DOORBELL",
            Self::Alexa => "ALEXA",
            Self::Generic => "GENERIC",
            Self::Unrecognized(raw) => raw,
        }
    }
}

impl From<String> for EventType {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "MOTION" => Self::Motion,
            "DOORBELL" => Self::Doorbell,
            "ALEXA" => Self::Alexa,
            "GENERIC" => Self::Generic,
            _ => Self::Unrecognized(raw),
        }
    }
}

impl From<EventType> for String {
    fn from(event_type: EventType) -> Self {
        match event_type {
            EventType::Unrecognized(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event from the outside world, normalized by a source adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationEvent {
    /// Caller-assigned identifier, used for tracing only
    pub event_id: String,
    /// Event type, drives rule dispatch
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Originating device or skill
    pub source_id: String,
    /// Event-specific data (e.g. voice intent details)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<BTreeMap<String, Value>>,
    /// Occurrence time (ISO 8601)
    pub timestamp: String,
}

impl IntegrationEvent {
    /// Create an event stamped with a fresh id and the current time
    pub fn new(event_type: EventType, source_id: impl Into<String>) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            event_type,
            source_id: source_id.into(),
            payload: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    /// Attach a payload entry
    #[must_use]
    pub fn with_payload(mut self, key: impl Into<String>, value: Value) -> Self {
        self.payload
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value);
        self
    }

    /// Parsed occurrence time, if the timestamp is valid RFC 3339
    pub fn occurred_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Command understood by the executor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandType {
    Power,
    SetBrightness,
    ApplyPreset,
    SetEffect,
}

/// How the executor treats the brightness of an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BrightnessPolicy {
    /// May be scaled by a global dimmer downstream
    Inherit,
    /// Authoritative, applied verbatim
    Override,
}

/// Brightness policy together with its override level.
///
/// Serialized flat into the action as `brightnessPolicy` and, for
/// overrides only, `brightnessOverride`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "brightnessPolicy", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Brightness {
    Inherit,
    Override {
        #[serde(rename = "brightnessOverride")]
        level: u8,
    },
}

impl Brightness {
    /// Policy tag without the level
    pub fn policy(&self) -> BrightnessPolicy {
        match self {
            Self::Inherit => BrightnessPolicy::Inherit,
            Self::Override { .. } => BrightnessPolicy::Override,
        }
    }

    /// Override level, only set for [`Brightness::Override`]
    pub fn override_level(&self) -> Option<u8> {
        match self {
            Self::Inherit => None,
            Self::Override { level } => Some(*level),
        }
    }

    /// Rebuild from the two wire fields, rejecting inconsistent pairs
    pub fn from_parts(policy: BrightnessPolicy, level: Option<u8>) -> Result<Self, String> {
        match (policy, level) {
            (BrightnessPolicy::Inherit, None) => Ok(Self::Inherit),
            (BrightnessPolicy::Override, Some(level)) => Ok(Self::Override { level }),
            (BrightnessPolicy::Inherit, Some(level)) => Err(format!(
                "brightnessOverride {level} given with INHERIT policy"
            )),
            (BrightnessPolicy::Override, None) => {
                Err("OVERRIDE policy requires brightnessOverride".to_string())
            }
        }
    }
}

/// Command payload; its meaning depends on the [`CommandType`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionValue {
    /// Power state
    Flag(bool),
    /// Brightness level (0-255)
    Level(u8),
    /// Preset names, effect parameters and anything else
    Other(Value),
}

impl From<bool> for ActionValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<u8> for ActionValue {
    fn from(value: u8) -> Self {
        Self::Level(value)
    }
}

/// A command for the executor, produced by the rule engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "WireAction")]
pub struct AutomationAction {
    /// Engine-generated identifier (UUID v4)
    pub action_id: String,
    /// What the executor should do
    pub command_type: CommandType,
    /// Command payload
    pub value: ActionValue,
    /// Zones to act on, or `["ALL"]`
    pub target_zones: Vec<String>,
    /// Brightness policy and override level
    #[serde(flatten)]
    pub brightness: Brightness,
}

/// Action as it appears on the wire, before the brightness pair is checked
#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct WireAction {
    action_id: String,
    command_type: CommandType,
    value: ActionValue,
    target_zones: Vec<String>,
    brightness_policy: BrightnessPolicy,
    #[serde(default)]
    brightness_override: Option<u8>,
}

impl TryFrom<WireAction> for AutomationAction {
    type Error = String;

    fn try_from(wire: WireAction) -> Result<Self, Self::Error> {
        Ok(Self {
            action_id: wire.action_id,
            command_type: wire.command_type,
            value: wire.value,
            target_zones: wire.target_zones,
            brightness: Brightness::from_parts(wire.brightness_policy, wire.brightness_override)?,
        })
    }
}

impl AutomationAction {
    /// Create an action with a fresh id
    pub fn new(
        command_type: CommandType,
        value: impl Into<ActionValue>,
        target_zones: &[&str],
        brightness: Brightness,
    ) -> Self {
        Self {
            action_id: uuid::Uuid::new_v4().to_string(),
            command_type,
            value: value.into(),
            target_zones: target_zones.iter().map(|z| z.to_string()).collect(),
            brightness,
        }
    }

    pub fn brightness_policy(&self) -> BrightnessPolicy {
        self.brightness.policy()
    }

    pub fn brightness_override(&self) -> Option<u8> {
        self.brightness.override_level()
    }

    /// Whether the action addresses every zone
    pub fn targets_all(&self) -> bool {
        self.target_zones.len() == 1 && self.target_zones[0] == ALL_ZONES
    }

    /// Whether the action names the given zone explicitly
    pub fn targets(&self, zone: &str) -> bool {
        self.target_zones.iter().any(|z| z == zone)
    }
}
