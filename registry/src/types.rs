//! Core types for the capability registry.

use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::RegistryError;

/// Number of numbered namespace slots (`ns-0` .. `ns-9`).
pub const NUMBERED_SLOT_LIMIT: usize = 10;

const NUMBERED_PREFIX: &str = "ns-";
const DEFAULT_SLOT: &str = "default";

/// Identity of a namespace slot.
///
/// Ordering is numbered slots ascending, then `default`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SlotId {
    Numbered(u8),
    Default,
}

impl SlotId {
    /// Index into the numbered slot table, `None` for the default slot.
    pub fn index(&self) -> Option<usize> {
        match self {
            SlotId::Numbered(n) => Some(*n as usize),
            SlotId::Default => None,
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, SlotId::Default)
    }

    pub(crate) fn numbered(index: usize) -> Self {
        debug_assert!(index < NUMBERED_SLOT_LIMIT);
        SlotId::Numbered(index as u8)
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotId::Numbered(n) => write!(f, "{NUMBERED_PREFIX}{n}"),
            SlotId::Default => f.write_str(DEFAULT_SLOT),
        }
    }
}

impl FromStr for SlotId {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == DEFAULT_SLOT {
            return Ok(SlotId::Default);
        }
        let invalid = || {
            RegistryError::validation(
                "namespace",
                format!("'{s}' is not a namespace slot (expected ns-0..ns-9 or default)"),
            )
        };
        let digits = s.strip_prefix(NUMBERED_PREFIX).ok_or_else(invalid)?;
        // Reject "ns-01", "ns-+1" and friends so every slot has one spelling.
        if digits.is_empty()
            || !digits.bytes().all(|b| b.is_ascii_digit())
            || (digits.len() > 1 && digits.starts_with('0'))
        {
            return Err(invalid());
        }
        match digits.parse::<usize>() {
            Ok(n) if n < NUMBERED_SLOT_LIMIT => Ok(SlotId::numbered(n)),
            _ => Err(invalid()),
        }
    }
}

impl Serialize for SlotId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SlotId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A namespace occupying one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Namespace {
    pub slot_id: SlotId,
    pub display_name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Kind tag shared by every capability reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    Tool,
    Resource,
    DataStore,
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CapabilityKind::Tool => "tool",
            CapabilityKind::Resource => "resource",
            CapabilityKind::DataStore => "data store",
        })
    }
}

fn default_tool_type() -> String {
    "http".to_string()
}

fn default_schema_type() -> String {
    "object".to_string()
}

/// A tool exposed to the agent runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolReference {
    pub namespace_id: SlotId,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Endpoint the tool invocation is routed to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(rename = "type", default = "default_tool_type")]
    pub tool_type: String,
    #[serde(default)]
    pub input_schema: InputSchema,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl ToolReference {
    pub fn new(namespace_id: SlotId, name: impl Into<String>) -> Self {
        Self {
            namespace_id,
            name: name.into(),
            description: String::new(),
            uri: None,
            tool_type: default_tool_type(),
            input_schema: InputSchema::default(),
            labels: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    #[must_use]
    pub fn with_type(mut self, tool_type: impl Into<String>) -> Self {
        self.tool_type = tool_type.into();
        self
    }

    #[must_use]
    pub fn with_input_schema(mut self, input_schema: InputSchema) -> Self {
        self.input_schema = input_schema;
        self
    }

    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// Parameter description of a tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSchema {
    #[serde(rename = "type", default = "default_schema_type")]
    pub schema_type: String,
    #[serde(default)]
    pub properties: BTreeMap<String, Property>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

impl Default for InputSchema {
    fn default() -> Self {
        Self {
            schema_type: default_schema_type(),
            properties: BTreeMap::new(),
            required: Vec::new(),
        }
    }
}

impl InputSchema {
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, property: Property) -> Self {
        self.properties.insert(name.into(), property);
        self
    }

    #[must_use]
    pub fn with_required(mut self, name: impl Into<String>) -> Self {
        self.required.push(name.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    #[serde(rename = "type", default)]
    pub property_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Property {
    pub fn new(property_type: impl Into<String>) -> Self {
        Self {
            property_type: property_type.into(),
            description: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A readable resource, keyed by URI within its namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceReference {
    pub namespace_id: SlotId,
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl ResourceReference {
    pub fn new(namespace_id: SlotId, uri: impl Into<String>) -> Self {
        Self {
            namespace_id,
            uri: uri.into(),
            name: None,
            description: None,
            mime_type: None,
            metadata: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Backend kinds a data store may point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Memory,
    Postgres,
    Redis,
    Oracle,
    S3,
    File,
}

impl BackendKind {
    pub const ALL: [BackendKind; 6] = [
        BackendKind::Memory,
        BackendKind::Postgres,
        BackendKind::Redis,
        BackendKind::Oracle,
        BackendKind::S3,
        BackendKind::File,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Memory => "memory",
            BackendKind::Postgres => "postgres",
            BackendKind::Redis => "redis",
            BackendKind::Oracle => "oracle",
            BackendKind::S3 => "s3",
            BackendKind::File => "file",
        }
    }
}

impl FromStr for BackendKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BackendKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or(())
    }
}

/// Opaque connection descriptor of a data store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub connection: serde_json::Value,
}

impl BackendConfig {
    pub fn new(kind: impl Into<String>, connection: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            connection,
        }
    }
}

/// A data store descriptor, keyed by id within its namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataStore {
    pub namespace_id: SlotId,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    pub backend: BackendConfig,
}

impl DataStore {
    pub fn new(namespace_id: SlotId, id: impl Into<String>, backend: BackendConfig) -> Self {
        Self {
            namespace_id,
            id: id.into(),
            name: None,
            labels: BTreeMap::new(),
            backend,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// Read-only union over the three reference kinds, used by aggregate listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Capability {
    Tool(ToolReference),
    Resource(ResourceReference),
    DataStore(DataStore),
}

impl Capability {
    pub fn kind(&self) -> CapabilityKind {
        match self {
            Capability::Tool(_) => CapabilityKind::Tool,
            Capability::Resource(_) => CapabilityKind::Resource,
            Capability::DataStore(_) => CapabilityKind::DataStore,
        }
    }

    pub fn namespace_id(&self) -> SlotId {
        match self {
            Capability::Tool(t) => t.namespace_id,
            Capability::Resource(r) => r.namespace_id,
            Capability::DataStore(d) => d.namespace_id,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Capability::Tool(t) => &t.name,
            Capability::Resource(r) => &r.uri,
            Capability::DataStore(d) => &d.id,
        }
    }
}
