//! Per-Guild Attribute Registry Types
//!
//! Each root guild owns a registry of named, typed attributes describing
//! the custom character fields its organization tracks. The registry fixes
//! an attribute's type at first registration; character-record storage
//! validates values against it before every write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Value type of a registered attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeKind {
    /// Integer-valued attribute (levels, scores, item counts).
    Numeric,
    /// Free-form text attribute.
    Text,
}

/// A registered attribute definition, owned by a root guild.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeDef {
    pub name: String,
    pub kind: AttributeKind,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A concrete attribute value, tagged with its kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum AttributeValue {
    Numeric(i64),
    Text(String),
}

impl AttributeValue {
    /// The kind this value carries.
    pub const fn kind(&self) -> AttributeKind {
        match self {
            Self::Numeric(_) => AttributeKind::Numeric,
            Self::Text(_) => AttributeKind::Text,
        }
    }

    /// Check this value against a registered definition.
    pub fn check_against(&self, def: &AttributeDef) -> CoreResult<()> {
        if self.kind() == def.kind {
            Ok(())
        } else {
            Err(CoreError::TypeConflict)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(kind: AttributeKind) -> AttributeDef {
        AttributeDef {
            name: "level".to_string(),
            kind,
            description: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_value_kind() {
        assert_eq!(AttributeValue::Numeric(3).kind(), AttributeKind::Numeric);
        assert_eq!(
            AttributeValue::Text("mage".to_string()).kind(),
            AttributeKind::Text
        );
    }

    #[test]
    fn test_check_against_matching_kind() {
        assert!(AttributeValue::Numeric(60)
            .check_against(&def(AttributeKind::Numeric))
            .is_ok());
    }

    #[test]
    fn test_check_against_kind_mismatch() {
        let result =
            AttributeValue::Text("sixty".to_string()).check_against(&def(AttributeKind::Numeric));
        assert_eq!(result, Err(CoreError::TypeConflict));
    }

    #[test]
    fn test_value_serde_tagged_form() {
        let json = serde_json::to_value(AttributeValue::Numeric(42)).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "numeric", "value": 42}));
    }
}
