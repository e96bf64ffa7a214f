//! How a step's partial output is folded into the accumulated data.

use crate::workflow::Data;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Top-level keys of the patch overwrite existing ones.
    #[default]
    Shallow,

    /// Nested objects are merged key by key; anything else overwrites.
    Deep,
}

impl MergeStrategy {
    pub fn merge(self, target: &mut Data, patch: Data) {
        match self {
            MergeStrategy::Shallow => target.extend(patch),
            MergeStrategy::Deep => deep_merge(target, patch),
        }
    }
}

fn deep_merge(target: &mut Data, patch: Data) {
    for (key, value) in patch {
        let Value::Object(nested) = value else {
            target.insert(key, value);
            continue;
        };

        if let Some(Value::Object(existing)) = target.get_mut(&key) {
            deep_merge(existing, nested);
            continue;
        }
        target.insert(key, Value::Object(nested));
    }
}

impl FromStr for MergeStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shallow" => Ok(MergeStrategy::Shallow),
            "deep" => Ok(MergeStrategy::Deep),
            other => Err(format!("unknown merge strategy '{other}'")),
        }
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeStrategy::Shallow => f.write_str("shallow"),
            MergeStrategy::Deep => f.write_str("deep"),
        }
    }
}
