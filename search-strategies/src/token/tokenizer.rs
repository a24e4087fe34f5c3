//! Deterministic, salt-free tokenization shared by indexing and querying so
//! that the same input always hashes to the same token set.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

fn normalize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric()).filter(|s| !s.is_empty()).map(|s| s.to_lowercase())
}

pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Tokenizes free text into a set of deterministic hashes.
pub fn tokenize_text(text: &str) -> BTreeSet<String> {
    normalize(text).map(|token| hash_token(&token)).collect()
}

/// Tokenizes a field value, flattening arrays/objects into their string
/// leaves before tokenizing.
pub fn tokenize_value(value: &Value) -> BTreeSet<String> {
    let mut hashes = BTreeSet::new();
    collect_strings(value, &mut hashes);
    hashes
}

fn collect_strings(value: &Value, out: &mut BTreeSet<String>) {
    match value {
        Value::String(s) => out.extend(tokenize_text(s)),
        Value::Number(n) => out.extend(tokenize_text(&n.to_string())),
        Value::Array(items) => items.iter().for_each(|item| collect_strings(item, out)),
        Value::Object(map) => map.values().for_each(|item| collect_strings(item, out)),
        Value::Bool(_) | Value::Null => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashing_is_deterministic_and_salt_free() {
        assert_eq!(hash_token("ada"), hash_token("ada"));
    }

    #[test]
    fn tokenize_text_lowercases_and_splits_on_punctuation() {
        let tokens = tokenize_text("Ada, Lovelace!");
        assert_eq!(tokens, BTreeSet::from([hash_token("ada"), hash_token("lovelace")]));
    }
}
