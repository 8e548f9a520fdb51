//! Typed view over `table_schemas` rows.
//!
//! Configs are stored as JSON text; this module parses them into the structs
//! the compute engine and the formula validator work with.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::entity::table_schema;

// ---------- column types ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Text,
    Number,
    Email,
    Url,
    Phone,
    Date,
    Boolean,
    Select,
    MultiSelect,
    Relation,
    File,
    Formula,
    Rollup,
    Lookup,
}

impl ColumnType {
    pub const ALL: [ColumnType; 14] = [
        ColumnType::Text,
        ColumnType::Number,
        ColumnType::Email,
        ColumnType::Url,
        ColumnType::Phone,
        ColumnType::Date,
        ColumnType::Boolean,
        ColumnType::Select,
        ColumnType::MultiSelect,
        ColumnType::Relation,
        ColumnType::File,
        ColumnType::Formula,
        ColumnType::Rollup,
        ColumnType::Lookup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Text => "text",
            ColumnType::Number => "number",
            ColumnType::Email => "email",
            ColumnType::Url => "url",
            ColumnType::Phone => "phone",
            ColumnType::Date => "date",
            ColumnType::Boolean => "boolean",
            ColumnType::Select => "select",
            ColumnType::MultiSelect => "multi_select",
            ColumnType::Relation => "relation",
            ColumnType::File => "file",
            ColumnType::Formula => "formula",
            ColumnType::Rollup => "rollup",
            ColumnType::Lookup => "lookup",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    /// Lookup and rollup values are written only by the compute engine.
    pub fn is_computed(&self) -> bool {
        matches!(self, ColumnType::Lookup | ColumnType::Rollup)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The subset of column types the compute engine refreshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputedKind {
    Lookup,
    Rollup,
}

impl ComputedKind {
    pub const ALL: [ComputedKind; 2] = [ComputedKind::Lookup, ComputedKind::Rollup];

    pub fn column_type(&self) -> ColumnType {
        match self {
            ComputedKind::Lookup => ColumnType::Lookup,
            ComputedKind::Rollup => ColumnType::Rollup,
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.column_type().as_str()
    }
}

// ---------- configs ----------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupConfig {
    /// Field of the source row holding the target row id.
    pub relation_column: String,
    pub target_database_id: Uuid,
    pub target_column: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    Median,
    Unique,
    Empty,
    NotEmpty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    /// Target rows carry `relation_column` pointing back at the source row.
    #[default]
    OneToMany,
    /// The source row's `relation_column` holds one target id.
    ManyToOne,
    /// The source row's `relation_column` holds an array of target ids.
    ManyToMany,
}

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::OneToMany => "one_to_many",
            RelationType::ManyToOne => "many_to_one",
            RelationType::ManyToMany => "many_to_many",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "one_to_many" => Some(RelationType::OneToMany),
            "many_to_one" => Some(RelationType::ManyToOne),
            "many_to_many" => Some(RelationType::ManyToMany),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupConfig {
    pub relation_column: String,
    pub target_database_id: Uuid,
    pub target_column: String,
    pub aggregation: Aggregation,
    #[serde(default)]
    pub relation_type: RelationType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnType {
    Number,
    Text,
    Boolean,
    Date,
}

impl ReturnType {
    pub fn column_type(&self) -> ColumnType {
        match self {
            ReturnType::Number => ColumnType::Number,
            ReturnType::Text => ColumnType::Text,
            ReturnType::Boolean => ColumnType::Boolean,
            ReturnType::Date => ColumnType::Date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaConfig {
    pub expression: String,
    pub return_type: Option<ReturnType>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

// ---------- errors ----------

#[derive(Debug)]
pub enum SchemaError {
    UnknownColumnType(String),
    MissingConfig(ColumnType),
    InvalidConfig(ColumnType, String),
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaError::UnknownColumnType(t) => write!(f, "unknown column type: {t}"),
            SchemaError::MissingConfig(t) => write!(f, "missing {t}_config"),
            SchemaError::InvalidConfig(t, e) => write!(f, "invalid {t}_config: {e}"),
        }
    }
}

impl std::error::Error for SchemaError {}

// ---------- schema records ----------

/// A computed column definition as handed over by the schema store.
/// Configs stay raw until the engine asks for them, so one malformed column
/// does not hide the rest.
#[derive(Debug, Clone)]
pub struct SchemaRecord {
    pub column_name: String,
    pub column_type: ColumnType,
    pub lookup_config: Option<String>,
    pub rollup_config: Option<String>,
}

impl SchemaRecord {
    pub fn from_model(model: &table_schema::Model) -> Result<Self, SchemaError> {
        let column_type = ColumnType::parse(&model.column_type)
            .ok_or_else(|| SchemaError::UnknownColumnType(model.column_type.clone()))?;
        Ok(Self {
            column_name: model.column_name.clone(),
            column_type,
            lookup_config: model.lookup_config.clone(),
            rollup_config: model.rollup_config.clone(),
        })
    }

    pub fn lookup(&self) -> Result<LookupConfig, SchemaError> {
        parse_config(ColumnType::Lookup, self.lookup_config.as_deref())
    }

    pub fn rollup(&self) -> Result<RollupConfig, SchemaError> {
        parse_config(ColumnType::Rollup, self.rollup_config.as_deref())
    }
}

pub fn parse_config<T: serde::de::DeserializeOwned>(
    column_type: ColumnType,
    raw: Option<&str>,
) -> Result<T, SchemaError> {
    let raw = raw
        .filter(|s| !s.trim().is_empty())
        .ok_or(SchemaError::MissingConfig(column_type))?;
    serde_json::from_str(raw).map_err(|e| SchemaError::InvalidConfig(column_type, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(column_type: ColumnType, lookup: Option<&str>, rollup: Option<&str>) -> SchemaRecord {
        SchemaRecord {
            column_name: "computed".to_string(),
            column_type,
            lookup_config: lookup.map(str::to_string),
            rollup_config: rollup.map(str::to_string),
        }
    }

    #[test]
    fn column_type_names_round_trip() {
        for t in ColumnType::ALL {
            assert_eq!(ColumnType::parse(t.as_str()), Some(t));
        }
        assert_eq!(ColumnType::parse("spreadsheet"), None);
        assert!(ColumnType::Lookup.is_computed());
        assert!(!ColumnType::Formula.is_computed());
    }

    #[test]
    fn rollup_config_defaults_relation_type() {
        let target = Uuid::now_v7();
        let raw = format!(
            r#"{{"relation_column":"customer_id","target_database_id":"{target}","target_column":"total","aggregation":"not_empty"}}"#
        );
        let cfg = record(ColumnType::Rollup, None, Some(&raw)).rollup().unwrap();
        assert_eq!(cfg.relation_type, RelationType::OneToMany);
        assert_eq!(cfg.aggregation, Aggregation::NotEmpty);
        assert_eq!(cfg.target_database_id, target);
    }

    #[test]
    fn missing_and_malformed_configs_are_reported() {
        let err = record(ColumnType::Lookup, None, None).lookup().unwrap_err();
        assert!(matches!(err, SchemaError::MissingConfig(ColumnType::Lookup)));

        let err = record(ColumnType::Lookup, Some(r#"{"relation_column": 5}"#), None)
            .lookup()
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidConfig(ColumnType::Lookup, _)));
        assert!(err.to_string().starts_with("invalid lookup_config"));
    }

    #[test]
    fn unknown_aggregation_is_rejected() {
        let raw = format!(
            r#"{{"relation_column":"a","target_database_id":"{}","target_column":"b","aggregation":"mode"}}"#,
            Uuid::now_v7()
        );
        assert!(record(ColumnType::Rollup, None, Some(&raw)).rollup().is_err());
    }
}
