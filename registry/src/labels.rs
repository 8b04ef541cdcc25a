//! Label selectors.
//!
//! A selector is a comma separated list of requirements, all of which must
//! hold for a labelled reference to match:
//!
//! | Requirement   | Matches when                               |
//! |---------------|--------------------------------------------|
//! | `key=value`   | `key` is present with exactly `value`      |
//! | `key==value`  | same as `key=value`                        |
//! | `key!=value`  | `key` is absent or holds a different value |
//! | `key`         | `key` is present                           |
//! | `!key`        | `key` is absent                            |
//!
//! Whitespace around requirements and operators is ignored.

use std::{collections::BTreeMap, fmt, str::FromStr};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    error::{RegistryError, RegistryResult},
    types::{DataStore, ToolReference},
};

pub(crate) static LABEL_KEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9_./\-]{0,61}[A-Za-z0-9])?$").unwrap()
});

static LABEL_VALUE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z0-9]([A-Za-z0-9_./\-]{0,61}[A-Za-z0-9])?)?$").unwrap());

/// References that carry a label map.
pub trait Labeled {
    fn labels(&self) -> &BTreeMap<String, String>;
}

impl Labeled for ToolReference {
    fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }
}

impl Labeled for DataStore {
    fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelRequirement {
    Equals { key: String, value: String },
    NotEquals { key: String, value: String },
    Exists(String),
    Absent(String),
}

impl LabelRequirement {
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        match self {
            LabelRequirement::Equals { key, value } => labels.get(key) == Some(value),
            LabelRequirement::NotEquals { key, value } => labels.get(key) != Some(value),
            LabelRequirement::Exists(key) => labels.contains_key(key),
            LabelRequirement::Absent(key) => !labels.contains_key(key),
        }
    }
}

impl fmt::Display for LabelRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelRequirement::Equals { key, value } => write!(f, "{key}={value}"),
            LabelRequirement::NotEquals { key, value } => write!(f, "{key}!={value}"),
            LabelRequirement::Exists(key) => write!(f, "{key}"),
            LabelRequirement::Absent(key) => write!(f, "!{key}"),
        }
    }
}

/// A parsed label expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSelector {
    requirements: Vec<LabelRequirement>,
}

impl LabelSelector {
    /// Parse `expression`, reporting problems against `field`.
    pub fn parse(field: &str, expression: &str) -> RegistryResult<Self> {
        if expression.trim().is_empty() {
            return Err(RegistryError::validation(field, "must not be empty"));
        }
        let requirements = expression
            .split(',')
            .map(|term| parse_requirement(field, term.trim()))
            .collect::<RegistryResult<Vec<_>>>()?;
        Ok(Self { requirements })
    }

    pub fn requirements(&self) -> &[LabelRequirement] {
        &self.requirements
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }

    pub fn selects<T: Labeled>(&self, reference: &T) -> bool {
        self.matches(reference.labels())
    }
}

impl FromStr for LabelSelector {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse("labels", s)
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, requirement) in self.requirements.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{requirement}")?;
        }
        Ok(())
    }
}

fn parse_requirement(field: &str, term: &str) -> RegistryResult<LabelRequirement> {
    if term.is_empty() {
        return Err(RegistryError::validation(field, "empty requirement"));
    }
    let requirement = if let Some(key) = term.strip_prefix('!') {
        LabelRequirement::Absent(check_key(field, key.trim())?)
    } else if let Some((key, value)) = term.split_once("!=") {
        LabelRequirement::NotEquals {
            key: check_key(field, key.trim())?,
            value: check_value(field, value.trim())?,
        }
    } else if let Some((key, value)) = term.split_once('=') {
        let value = value.strip_prefix('=').unwrap_or(value);
        LabelRequirement::Equals {
            key: check_key(field, key.trim())?,
            value: check_value(field, value.trim())?,
        }
    } else {
        LabelRequirement::Exists(check_key(field, term)?)
    };
    Ok(requirement)
}

fn check_key(field: &str, key: &str) -> RegistryResult<String> {
    if LABEL_KEY_RE.is_match(key) {
        Ok(key.to_string())
    } else {
        Err(RegistryError::validation(
            field,
            format!("'{key}' is not a valid label key"),
        ))
    }
}

fn check_value(field: &str, value: &str) -> RegistryResult<String> {
    if LABEL_VALUE_RE.is_match(value) {
        Ok(value.to_string())
    } else {
        Err(RegistryError::validation(
            field,
            format!("'{value}' is not a valid label value"),
        ))
    }
}
