//! Variable-dictionary configuration.
//!
//! The dictionary drives the whole feature build: which logical table each
//! variable reads from, the id/date context columns shared by a table block,
//! the value-transform chain, and the aggregation methods with their
//! follow-up windows. It is loaded once, validated for shape, and consumed
//! read-only by the orchestrator.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::aggregate::AggregationMethod;
use crate::error::{Error, Result};

/// Broad variable typing; continuous and ordinal variables are coerced to
/// numbers before aggregation, categorical ones keep their raw cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarType {
    Cont,
    Ord,
    Cat,
}

/// A value-transform step, applied to the value column before aggregation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transform {
    /// Binary flag: 1 when the value text contains any of the patterns,
    /// otherwise empty
    ContainsAny { patterns: Vec<String> },
    /// Binary flag: 1 when the value is a member of the set, otherwise empty
    IsIn { values: Vec<String> },
    /// Duration in whole years from the value column (as a date) to another
    /// date column; `index_date` refers to the roster anchor
    YearsSince { other_column: String },
}

/// One aggregation method with its parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodSpec {
    pub method: AggregationMethod,
    /// Follow-up window length in days
    pub follow_up: i64,
}

/// One configured variable within a table block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableSpec {
    pub name: String,
    pub var_type: VarType,
    /// The single source column holding the variable's value
    pub value_column: String,
    /// Exempt the variable from numeric coercion even when cont/ord
    /// (age-like variables derived by a transform)
    #[serde(default)]
    pub keep_raw: bool,
    #[serde(default)]
    pub transforms: Vec<Transform>,
    pub methods: Vec<MethodSpec>,
}

/// Id/date context shared by every variable of a table block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommonParams {
    pub id_col: String,
    pub date_col: String,
}

/// All variables sourced from one logical table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableBlock {
    pub table: String,
    pub common: CommonParams,
    pub variables: Vec<VariableSpec>,
}

/// The full dictionary, in processing order. Order affects only the column
/// order of the resulting matrix, never any value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableDictionary {
    pub tables: Vec<TableBlock>,
}

impl VariableDictionary {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let dict: Self = serde_json::from_str(json)?;
        dict.validate()?;
        Ok(dict)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Shape validation: positive follow-up windows, at least one method per
    /// variable, and globally unique variable names (they become matrix
    /// column prefixes).
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for block in &self.tables {
            if block.common.id_col.is_empty() || block.common.date_col.is_empty() {
                return Err(Error::Config(format!(
                    "table block '{}' must declare id_col and date_col",
                    block.table
                )));
            }
            for var in &block.variables {
                if !names.insert(var.name.as_str()) {
                    return Err(Error::Config(format!(
                        "variable '{}' is declared more than once",
                        var.name
                    )));
                }
                if var.value_column.is_empty() {
                    return Err(Error::Config(format!(
                        "variable '{}' has no value column",
                        var.name
                    )));
                }
                if var.methods.is_empty() {
                    return Err(Error::Config(format!(
                        "variable '{}' declares no aggregation methods",
                        var.name
                    )));
                }
                for spec in &var.methods {
                    if spec.follow_up <= 0 {
                        return Err(Error::Config(format!(
                            "variable '{}' method '{}' has a non-positive follow-up window",
                            var.name,
                            spec.method.as_str()
                        )));
                    }
                }
                for transform in &var.transforms {
                    if let Transform::YearsSince { other_column } = transform {
                        if other_column.is_empty() {
                            return Err(Error::Config(format!(
                                "variable '{}' has a years_since transform with no target column",
                                var.name
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
