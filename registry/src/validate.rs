//! Structural validation of capability descriptors.
//!
//! Validation is pure: it never looks at registry state. Uniqueness is the
//! store's job.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::{
    error::{RegistryError, RegistryResult},
    labels::LABEL_KEY_RE,
    types::{BackendKind, DataStore, ResourceReference, ToolReference},
};

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_.\-]{0,127}$").unwrap());

static MIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9!#$&^_.+\-]{0,126}/[A-Za-z0-9][A-Za-z0-9!#$&^_.+\-]{0,126}$")
        .unwrap()
});

static MIME_PARAM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^[A-Za-z0-9!#$&^_.+\-]+=("[^"\\]*"|[A-Za-z0-9!#$&^_.+\-]+)$"#).unwrap()
});

/// Base used to resolve relative URI references.
static URI_BASE: Lazy<Url> = Lazy::new(|| Url::parse("registry://local/").unwrap());

/// Characters RFC 3986 never allows unescaped in a URI reference.
const URI_FORBIDDEN: &[char] = &['<', '>', '"', '{', '}', '|', '\\', '^', '`'];

#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceValidator;

impl ReferenceValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate_tool(&self, tool: &ToolReference) -> RegistryResult<()> {
        check_identifier("name", &tool.name)?;

        if tool.tool_type.trim().is_empty() {
            return Err(RegistryError::validation("type", "must not be empty"));
        }
        if let Some(uri) = &tool.uri {
            check_uri("uri", uri)?;
        }

        let schema = &tool.input_schema;
        if schema.schema_type.trim().is_empty() {
            return Err(RegistryError::validation(
                "inputSchema.type",
                "must not be empty",
            ));
        }
        for (name, property) in &schema.properties {
            if name.trim().is_empty() {
                return Err(RegistryError::validation(
                    "inputSchema.properties",
                    "parameter names must not be empty",
                ));
            }
            if property.property_type.trim().is_empty() {
                return Err(RegistryError::validation(
                    format!("inputSchema.properties.{name}.type"),
                    "parameter must declare a type",
                ));
            }
        }
        if let Some(missing) = schema
            .required
            .iter()
            .find(|name| !schema.properties.contains_key(name.as_str()))
        {
            return Err(RegistryError::validation(
                "inputSchema.required",
                format!("'{missing}' is not a declared property"),
            ));
        }
        check_labels(&tool.labels)
    }

    pub fn validate_resource(&self, resource: &ResourceReference) -> RegistryResult<()> {
        check_uri("uri", &resource.uri)?;

        if let Some(mime_type) = &resource.mime_type {
            // Parameters (`; charset=utf-8`) are allowed after the type/subtype pair.
            let mut parts = mime_type.split(';');
            let essence = parts.next().unwrap_or_default().trim();
            if !MIME_RE.is_match(essence) {
                return Err(RegistryError::validation(
                    "mimeType",
                    format!("'{mime_type}' does not match type/subtype"),
                ));
            }
            if let Some(param) = parts.map(str::trim).find(|p| !MIME_PARAM_RE.is_match(p)) {
                return Err(RegistryError::validation(
                    "mimeType",
                    format!("parameter '{param}' is not of the form key=value"),
                ));
            }
        }
        if resource.metadata.keys().any(|k| k.trim().is_empty()) {
            return Err(RegistryError::validation(
                "metadata",
                "keys must not be empty",
            ));
        }
        Ok(())
    }

    pub fn validate_data_store(&self, store: &DataStore) -> RegistryResult<()> {
        check_identifier("id", &store.id)?;

        let kind = store.backend.kind.trim();
        if kind.is_empty() {
            return Err(RegistryError::validation(
                "backend.kind",
                "must declare a backend kind",
            ));
        }
        if kind.parse::<BackendKind>().is_err() {
            let known: Vec<&str> = BackendKind::ALL.iter().map(BackendKind::as_str).collect();
            return Err(RegistryError::validation(
                "backend.kind",
                format!(
                    "unsupported backend kind '{kind}' (expected one of {})",
                    known.join(", ")
                ),
            ));
        }
        check_labels(&store.labels)
    }
}

fn check_labels(labels: &BTreeMap<String, String>) -> RegistryResult<()> {
    if labels.keys().any(|k| k.trim().is_empty()) {
        return Err(RegistryError::validation("labels", "keys must not be empty"));
    }
    if let Some(key) = labels.keys().find(|k| !LABEL_KEY_RE.is_match(k)) {
        return Err(RegistryError::validation(
            "labels",
            format!("'{key}' is not a valid label key"),
        ));
    }
    Ok(())
}

fn check_identifier(field: &'static str, value: &str) -> RegistryResult<()> {
    if value.is_empty() {
        return Err(RegistryError::validation(field, "must not be empty"));
    }
    if !IDENTIFIER_RE.is_match(value) {
        return Err(RegistryError::validation(
            field,
            format!(
                "'{value}' must start with a letter and contain only letters, digits, '_', '.' or '-' (max 128 chars)"
            ),
        ));
    }
    Ok(())
}

fn check_uri(field: &'static str, uri: &str) -> RegistryResult<()> {
    if uri.is_empty() {
        return Err(RegistryError::validation(field, "must not be empty"));
    }
    if uri
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || URI_FORBIDDEN.contains(&c))
    {
        return Err(RegistryError::validation(
            field,
            format!("'{uri}' contains characters not allowed in a URI"),
        ));
    }
    if let Some(at) = malformed_percent_escape(uri) {
        return Err(RegistryError::validation(
            field,
            format!("'{uri}' has a malformed percent escape at offset {at}"),
        ));
    }
    let parsed = match Url::parse(uri) {
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            // A colon in the first segment of a relative reference would be read as a scheme.
            let first_segment = uri.find(['/', '?', '#']).map_or(uri, |end| &uri[..end]);
            if first_segment.contains(':') {
                return Err(RegistryError::validation(
                    field,
                    format!("'{uri}' has an invalid scheme"),
                ));
            }
            URI_BASE.join(uri)
        }
        other => other,
    };
    parsed
        .map(|_| ())
        .map_err(|e| RegistryError::validation(field, format!("'{uri}' is not a valid URI: {e}")))
}

/// Offset of the first `%` not followed by two hex digits.
fn malformed_percent_escape(uri: &str) -> Option<usize> {
    let bytes = uri.as_bytes();
    bytes.iter().enumerate().find_map(|(i, &b)| {
        let escaped = bytes.get(i + 1..i + 3);
        let valid = escaped.is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
        (b == b'%' && !valid).then_some(i)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ErrorKind,
        types::{BackendConfig, InputSchema, Property, SlotId},
    };

    fn field_of(err: RegistryError) -> String {
        match err {
            RegistryError::Validation { field, .. } => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    fn tool(name: &str) -> ToolReference {
        ToolReference::new(SlotId::Numbered(0), name)
    }

    #[test]
    fn test_tool_names() {
        let v = ReferenceValidator::new();
        for ok in ["weather-lookup", "search_v2", "a", "fs.read"] {
            assert!(v.validate_tool(&tool(ok)).is_ok(), "{ok} should be valid");
        }
        let too_long = "x".repeat(129);
        for bad in ["", "2fast", "-lead", "has space", "emoji🙂", too_long.as_str()] {
            let err = v.validate_tool(&tool(bad)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ValidationError);
            assert_eq!(field_of(err), "name");
        }
    }

    #[test]
    fn test_tool_schema_requires_parameter_types() {
        let v = ReferenceValidator::new();
        let schema = InputSchema::default()
            .with_property("city", Property::new("string"))
            .with_property("days", Property::new(""));
        let err = v
            .validate_tool(&tool("forecast").with_input_schema(schema))
            .unwrap_err();
        assert_eq!(field_of(err), "inputSchema.properties.days.type");
    }

    #[test]
    fn test_tool_schema_empty_parameter_name() {
        let v = ReferenceValidator::new();
        let schema = InputSchema::default().with_property("", Property::new("string"));
        let err = v
            .validate_tool(&tool("forecast").with_input_schema(schema))
            .unwrap_err();
        assert_eq!(field_of(err), "inputSchema.properties");
    }

    #[test]
    fn test_tool_schema_required_must_be_declared() {
        let v = ReferenceValidator::new();
        let schema = InputSchema::default()
            .with_property("city", Property::new("string"))
            .with_required("city");
        assert!(v
            .validate_tool(&tool("forecast").with_input_schema(schema.clone()))
            .is_ok());

        let schema = schema.with_required("country");
        let err = v
            .validate_tool(&tool("forecast").with_input_schema(schema))
            .unwrap_err();
        assert_eq!(field_of(err), "inputSchema.required");
    }

    #[test]
    fn test_tool_uri_and_type() {
        let v = ReferenceValidator::new();
        assert!(v
            .validate_tool(&tool("fetch").with_uri("https://api.example.com/weather"))
            .is_ok());

        let err = v
            .validate_tool(&tool("fetch").with_uri("http://exa mple.com"))
            .unwrap_err();
        assert_eq!(field_of(err), "uri");

        let err = v.validate_tool(&tool("fetch").with_type(" ")).unwrap_err();
        assert_eq!(field_of(err), "type");
    }

    #[test]
    fn test_resource_uri() {
        let v = ReferenceValidator::new();
        for ok in [
            "file:///tmp/notes.txt",
            "s3://bucket/key.csv",
            "https://example.com/a?b=c#d",
            "docs/readme.md",
            "urn:isbn:0451450523",
            "file:///tmp/report%20final.pdf",
            "docs/v1:draft.md",
        ] {
            let resource = ResourceReference::new(SlotId::Default, ok);
            assert!(v.validate_resource(&resource).is_ok(), "{ok} should be valid");
        }
        for bad in [
            "",
            "http://",
            "has space",
            "a<b>",
            "http://[::1",
            "1abc:def",
            "file:///tmp/%zz",
            "docs/trailing%2",
        ] {
            let resource = ResourceReference::new(SlotId::Default, bad);
            let err = v.validate_resource(&resource).unwrap_err();
            assert_eq!(field_of(err), "uri", "{bad} should be rejected");
        }
    }

    #[test]
    fn test_resource_mime_type() {
        let v = ReferenceValidator::new();
        let base = ResourceReference::new(SlotId::Default, "file:///tmp/a.txt");

        assert!(v.validate_resource(&base).is_ok());
        for ok in [
            "text/plain",
            "application/vnd.api+json",
            "text/html; charset=utf-8",
            "multipart/form-data; boundary=\"a b\"; charset=utf-8",
        ] {
            assert!(v
                .validate_resource(&base.clone().with_mime_type(ok))
                .is_ok());
        }
        for bad in [
            "text",
            "text/",
            "/plain",
            "text/plain/extra",
            "",
            "text/plain; ===garbage",
            "text/plain; charset",
            "text/plain; charset=",
            "text/plain;",
        ] {
            let err = v
                .validate_resource(&base.clone().with_mime_type(bad))
                .unwrap_err();
            assert_eq!(field_of(err), "mimeType", "{bad} should be rejected");
        }
    }

    #[test]
    fn test_data_store_backend_kind() {
        let v = ReferenceValidator::new();
        let store = |id: &str, kind: &str| {
            DataStore::new(
                SlotId::Numbered(1),
                id,
                BackendConfig::new(kind, serde_json::json!({})),
            )
        };

        assert!(v.validate_data_store(&store("history", "postgres")).is_ok());
        assert!(v.validate_data_store(&store("blobs", "S3")).is_ok());

        assert_eq!(
            field_of(v.validate_data_store(&store("", "memory")).unwrap_err()),
            "id"
        );
        assert_eq!(
            field_of(v.validate_data_store(&store("cache", "")).unwrap_err()),
            "backend.kind"
        );
        let err = v
            .validate_data_store(&store("cache", "mongodb"))
            .unwrap_err();
        assert!(err.to_string().contains("unsupported backend kind 'mongodb'"));
    }

    #[test]
    fn test_label_keys() {
        let v = ReferenceValidator::new();
        assert!(v
            .validate_tool(&tool("search").with_label("app.io/team", "search"))
            .is_ok());
        for bad in ["", "has space", "-lead", "trail."] {
            let err = v
                .validate_tool(&tool("search").with_label(bad, "x"))
                .unwrap_err();
            assert_eq!(field_of(err), "labels", "{bad:?} should be rejected");
        }

        let store = DataStore::new(
            SlotId::Numbered(1),
            "cache",
            BackendConfig::new("redis", serde_json::json!({})),
        )
        .with_label("env=prod", "x");
        assert_eq!(field_of(v.validate_data_store(&store).unwrap_err()), "labels");
    }
}
