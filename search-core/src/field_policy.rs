//! Deterministic classification of entity fields into `searchable`,
//! `hash_only`, and `excluded` partitions, plus presenter redaction when a
//! deployment excludes encrypted fields from external stores.

use crate::model::{EncryptionMapEntry, FieldPolicyConfig, Link, LinkKind, Presenter};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Matches the encrypted-envelope title format `ciphertext:iv:tag:v1`.
pub static ENCRYPTED_TITLE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r".*:.*:.*:v1$").unwrap());

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldClassification {
    pub searchable: BTreeSet<String>,
    pub hash_only: BTreeSet<String>,
    pub excluded: BTreeSet<String>,
}

/// Classifies `fields` per the policy precedence:
/// `excluded` > `hash_only`/encrypted-with-hash > encrypted-without-hash
/// (excluded) > whitelist miss (excluded) > default searchable.
///
/// The union of the three returned sets equals the input key set minus any
/// null-valued keys; the sets are pairwise disjoint (a partition).
pub fn classify_fields(
    fields: &BTreeMap<String, Value>,
    encrypted_fields: &[EncryptionMapEntry],
    policy: &FieldPolicyConfig,
) -> FieldClassification {
    let mut out = FieldClassification::default();

    let encrypted_with_hash: BTreeMap<&str, &str> = encrypted_fields
        .iter()
        .filter_map(|e| e.hash_field.as_deref().map(|hash_field| (e.field.as_str(), hash_field)))
        .collect();
    let encrypted_without_hash: BTreeSet<&str> = encrypted_fields
        .iter()
        .filter(|e| e.hash_field.is_none())
        .map(|e| e.field.as_str())
        .collect();

    for (key, value) in fields {
        if value.is_null() {
            continue;
        }
        if policy.excluded.iter().any(|f| f == key) {
            out.excluded.insert(key.clone());
            continue;
        }
        if policy.hash_only.iter().any(|f| f == key) || encrypted_with_hash.contains_key(key.as_str()) {
            out.hash_only.insert(key.clone());
            continue;
        }
        if encrypted_without_hash.contains(key.as_str()) {
            out.excluded.insert(key.clone());
            continue;
        }
        if let Some(whitelist) = &policy.searchable {
            if !whitelist.iter().any(|f| f == key) {
                out.excluded.insert(key.clone());
                continue;
            }
        }
        out.searchable.insert(key.clone());
    }

    out
}

/// Projects `fields` down to the subset that should be tokenized for the
/// token strategy: `hash_only` fields plus any field whose encryption-map
/// entry names a `hash_field`.
pub fn extract_hash_only_fields(
    fields: &BTreeMap<String, Value>,
    encrypted_fields: &[EncryptionMapEntry],
    policy: &FieldPolicyConfig,
) -> BTreeMap<String, Value> {
    let classification = classify_fields(fields, encrypted_fields, policy);
    fields
        .iter()
        .filter(|(key, _)| classification.hash_only.contains(*key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Projects `fields` down to the subset safe to send to an external
/// full-text/vector driver: the `searchable` partition only.
pub fn extract_searchable_fields(
    fields: &BTreeMap<String, Value>,
    encrypted_fields: &[EncryptionMapEntry],
    policy: &FieldPolicyConfig,
) -> BTreeMap<String, Value> {
    let classification = classify_fields(fields, encrypted_fields, policy);
    fields
        .iter()
        .filter(|(key, _)| classification.searchable.contains(*key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Replaces title/subtitle with empty placeholders and link labels with
/// generic strings, as required when a deployment excludes encrypted
/// fields from the externally-visible presenter. Originals are expected to
/// be re-materialized at query time by the enricher.
pub fn redact_presenter_for_external_store(presenter: &Presenter, links: &[Link]) -> (Presenter, Vec<Link>) {
    let redacted_presenter = Presenter {
        title: Some(String::new()),
        subtitle: Some(String::new()),
        icon: presenter.icon.clone(),
        badge: presenter.badge.clone(),
    };
    let redacted_links = links
        .iter()
        .map(|link| Link {
            href: link.href.clone(),
            label: match link.kind {
                LinkKind::Primary => "Open".to_string(),
                LinkKind::Secondary => "View".to_string(),
            },
            kind: link.kind,
        })
        .collect();
    (redacted_presenter, redacted_links)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn classification_is_a_partition_of_non_null_keys() {
        let input = fields(&[
            ("name", json!("ada")),
            ("ssn", json!("123")),
            ("secret", json!("shh")),
            ("deleted", Value::Null),
        ]);
        let encrypted = vec![
            EncryptionMapEntry { field: "ssn".into(), hash_field: Some("ssn_hash".into()) },
            EncryptionMapEntry { field: "secret".into(), hash_field: None },
        ];
        let policy = FieldPolicyConfig::default();
        let classification = classify_fields(&input, &encrypted, &policy);

        assert_eq!(classification.hash_only, BTreeSet::from(["ssn".to_string()]));
        assert_eq!(classification.excluded, BTreeSet::from(["secret".to_string()]));
        assert_eq!(classification.searchable, BTreeSet::from(["name".to_string()]));

        let mut union: BTreeSet<String> = BTreeSet::new();
        union.extend(classification.searchable.clone());
        union.extend(classification.hash_only.clone());
        union.extend(classification.excluded.clone());
        assert_eq!(union, BTreeSet::from(["name".to_string(), "ssn".to_string(), "secret".to_string()]));
    }

    #[test]
    fn explicit_excluded_wins_over_hash_only() {
        let input = fields(&[("x", json!("v"))]);
        let policy = FieldPolicyConfig { excluded: vec!["x".into()], hash_only: vec!["x".into()], ..Default::default() };
        let classification = classify_fields(&input, &[], &policy);
        assert!(classification.excluded.contains("x"));
        assert!(!classification.hash_only.contains("x"));
    }

    #[test]
    fn whitelist_excludes_fields_not_listed() {
        let input = fields(&[("a", json!(1)), ("b", json!(2))]);
        let policy = FieldPolicyConfig { searchable: Some(vec!["a".into()]), ..Default::default() };
        let classification = classify_fields(&input, &[], &policy);
        assert!(classification.searchable.contains("a"));
        assert!(classification.excluded.contains("b"));
    }

    #[test]
    fn classify_fields_is_idempotent() {
        let input = fields(&[("a", json!(1)), ("b", json!(2))]);
        let encrypted = vec![EncryptionMapEntry { field: "b".into(), hash_field: Some("b_hash".into()) }];
        let policy = FieldPolicyConfig::default();
        let first = classify_fields(&input, &encrypted, &policy);
        let second = classify_fields(&input, &encrypted, &policy);
        assert_eq!(first, second);
    }

    #[test]
    fn extract_searchable_fields_omits_hash_only_and_excluded_keys() {
        let input = fields(&[("name", json!("ada")), ("ssn", json!("123")), ("secret", json!("shh"))]);
        let encrypted = vec![
            EncryptionMapEntry { field: "ssn".into(), hash_field: Some("ssn_hash".into()) },
            EncryptionMapEntry { field: "secret".into(), hash_field: None },
        ];
        let policy = FieldPolicyConfig::default();
        let searchable = extract_searchable_fields(&input, &encrypted, &policy);
        assert_eq!(searchable.keys().collect::<Vec<_>>(), vec!["name"]);
    }

    #[test]
    fn encrypted_title_pattern_matches_envelope_format() {
        assert!(ENCRYPTED_TITLE_PATTERN.is_match("abc:def:ghi:v1"));
        assert!(!ENCRYPTED_TITLE_PATTERN.is_match("Ada Lovelace"));
    }
}
