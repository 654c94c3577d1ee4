use std::collections::BTreeMap;

use fluxgate_core::{AppError, AppResult};
use serde::Serialize;
use serde_json::Value;

/// Metadata key that older payloads used to carry the tag list.
pub const LEGACY_TAGS_KEY: &str = "tags";

/// Extensible rule metadata with tags split out of the free-form map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuleAttributes {
    tags: Vec<String>,
    metadata: BTreeMap<String, Value>,
}

impl RuleAttributes {
    /// Creates attributes from an explicit tag list and metadata map.
    ///
    /// A legacy `"tags"` metadata entry is lifted into `tags` when no explicit
    /// tags are given and it holds only strings; explicit tags always win.
    /// Any other shape under that key is rejected.
    pub fn new(tags: Vec<String>, mut metadata: BTreeMap<String, Value>) -> AppResult<Self> {
        let legacy_tags = match metadata.remove(LEGACY_TAGS_KEY) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(values)) => values
                .into_iter()
                .map(|value| match value {
                    Value::String(tag) => Ok(tag),
                    other => Err(AppError::validation(
                        "attributes.tags",
                        format!("tags must be strings, found '{other}'"),
                    )),
                })
                .collect::<AppResult<Vec<_>>>()?,
            Some(other) => {
                return Err(AppError::validation(
                    "attributes.tags",
                    format!("tags must be a list of strings, found '{other}'"),
                ));
            }
        };

        let tags = if tags.is_empty() { legacy_tags } else { tags };

        Ok(Self { tags, metadata })
    }

    /// Returns rule tags in insertion order.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Returns free-form metadata without the reserved tags key.
    #[must_use]
    pub fn metadata(&self) -> &BTreeMap<String, Value> {
        &self.metadata
    }
}
