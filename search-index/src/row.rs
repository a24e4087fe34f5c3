//! Raw rows as returned by the primary store, and the custom-field
//! normalization applied before a row becomes an [`IndexableRecord`].

use serde_json::Value;
use std::collections::BTreeMap;

/// A single row from the primary store's query engine. `id` doubles as the
/// record id once normalized.
#[derive(Debug, Clone, Default)]
pub struct Row {
    pub id: String,
    pub fields: BTreeMap<String, Value>,
}

/// Custom-field keys are prefixed `cf:` or `cf_` by the primary store;
/// strips the prefix so downstream field-policy classification sees the
/// bare field name.
pub fn strip_custom_field_prefix(key: &str) -> &str {
    key.strip_prefix("cf:").or_else(|| key.strip_prefix("cf_")).unwrap_or(key)
}

pub fn normalize_custom_fields(fields: BTreeMap<String, Value>) -> BTreeMap<String, Value> {
    fields.into_iter().map(|(key, value)| (strip_custom_field_prefix(&key).to_string(), value)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_either_custom_field_prefix_style() {
        assert_eq!(strip_custom_field_prefix("cf:phone"), "phone");
        assert_eq!(strip_custom_field_prefix("cf_phone"), "phone");
        assert_eq!(strip_custom_field_prefix("phone"), "phone");
    }
}
