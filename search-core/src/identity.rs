//! Type-safe identifiers for the hybrid search engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;
use uuid::Uuid;

/// Trait for type-safe UUID-backed identifiers.
///
/// Distinct identifier types cannot be accidentally swapped at compile time
/// even though they share the same representation.
pub trait EntityIdType:
    Copy + Clone + Eq + PartialEq + Hash + fmt::Debug + fmt::Display + FromStr + Serialize + serde::de::DeserializeOwned + Send + Sync + 'static
{
    const ENTITY_NAME: &'static str;

    fn new(uuid: Uuid) -> Self;
    fn as_uuid(&self) -> Uuid;

    fn nil() -> Self {
        Self::new(Uuid::nil())
    }

    fn now_v7() -> Self {
        Self::new(Uuid::now_v7())
    }

    fn new_v4() -> Self {
        Self::new(Uuid::new_v4())
    }
}

#[derive(Debug, Clone)]
pub struct IdParseError {
    pub entity_name: &'static str,
    pub input: String,
    pub source: uuid::Error,
}

impl fmt::Display for IdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} id from '{}': {}", self.entity_name, self.input, self.source)
    }
}

impl std::error::Error for IdParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

macro_rules! define_entity_id {
    ($name:ident, $entity:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(Uuid);

        impl EntityIdType for $name {
            const ENTITY_NAME: &'static str = $entity;

            fn new(uuid: Uuid) -> Self {
                Self(uuid)
            }

            fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::from_str(s).map(Self::new).map_err(|source| IdParseError {
                    entity_name: Self::ENTITY_NAME,
                    input: s.to_string(),
                    source,
                })
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::nil()
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                self.0.serialize(serializer)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                Uuid::deserialize(deserializer).map(Self::new)
            }
        }
    };
}

define_entity_id!(TenantId, "tenant", "Type-safe identifier for a tenant.");
define_entity_id!(OrganizationId, "organization", "Type-safe identifier for an organization within a tenant.");

/// Opaque identifier of the form `"<module>:<entity>"`, e.g. `"crm:contact"`.
///
/// Unlike [`TenantId`]/[`OrganizationId`] this is not UUID-backed: entity
/// identifiers are declared by the host application's entity-config registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Module portion before the first `:`, if present.
    pub fn module(&self) -> Option<&str> {
        self.0.split_once(':').map(|(module, _)| module)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Primary-key identifier of a single row within an entity's backing store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Composite key identifying a single search result / indexed document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResultKey {
    pub entity_id: EntityId,
    pub record_id: RecordId,
}

impl ResultKey {
    pub fn new(entity_id: EntityId, record_id: RecordId) -> Self {
        Self { entity_id, record_id }
    }
}

impl fmt::Display for ResultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_id, self.record_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_id_roundtrips_through_serde() {
        let id = TenantId::now_v7();
        let json = serde_json::to_string(&id).unwrap();
        let back: TenantId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn tenant_and_organization_ids_are_distinct_types() {
        let tenant = TenantId::now_v7();
        let org = OrganizationId::now_v7();
        assert_ne!(tenant.as_uuid(), org.as_uuid());
    }

    #[test]
    fn entity_id_extracts_module() {
        let id = EntityId::new("crm:contact");
        assert_eq!(id.module(), Some("crm"));
    }

    #[test]
    fn result_key_displays_as_composite() {
        let key = ResultKey::new(EntityId::new("crm:contact"), RecordId::new("42"));
        assert_eq!(key.to_string(), "crm:contact:42");
    }
}
