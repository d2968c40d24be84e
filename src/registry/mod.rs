//! The schema registry: a static, versioned mapping from (epoch, logical
//! table) to physical storage.
//!
//! Source schemas changed across three successive epochs; table names, key
//! columns and even date encodings drifted with them. The registry is loaded
//! once from structured configuration, validated, and consulted as an
//! immutable lookup for the rest of the run. It has no behavior beyond
//! resolution.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};

/// A schema era. Logical tables map to a fixed physical layout within one
/// epoch; the layouts differ between epochs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Epoch {
    Legacy,
    Transition,
    Current,
}

impl Epoch {
    /// All epochs in chronological order
    pub const ALL: [Self; 3] = [Self::Legacy, Self::Transition, Self::Current];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::Transition => "transition",
            Self::Current => "current",
        }
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a physical table encodes its date columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DateClass {
    /// Numeric Minguo-calendar serial; fixed offset yields Gregorian YYYYMMDD
    MinguoNumeric,
    /// Numeric year-month, expanded to the first day of the month
    YearMonthNumeric,
    /// Already date-like; only needs type coercion
    #[default]
    Direct,
}

/// Instruction to inner-join a dependent table onto its main table to recover
/// the date context the dependent table lacks natively. Merge columns pair up
/// positionally: `sub_columns[i]` matches `main_columns[i]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinSpec {
    pub main_table: String,
    pub sub_columns: Vec<String>,
    pub main_columns: Vec<String>,
    /// Rename the dependent merge columns onto the main-side names post-join
    #[serde(default)]
    pub rename_to_main: bool,
}

/// Per-epoch registration of one physical table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicalTable {
    /// Database the table lives in; connection selection is derived from this
    pub database: String,
    /// Columns that uniquely scope a record for join/dedup purposes
    #[serde(default)]
    pub key_columns: Vec<String>,
    #[serde(default)]
    pub date_class: DateClass,
    /// Present when this table is dependent and must inherit a date anchor
    #[serde(default)]
    pub join: Option<JoinSpec>,
}

/// One or many physical tables backing a logical table within an epoch;
/// multiple physical tables are unioned (e.g. a live and an archive variant).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PhysicalNames {
    One(String),
    Many(Vec<String>),
}

impl PhysicalNames {
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        match self {
            Self::One(name) => vec![name.as_str()],
            Self::Many(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

/// Cross-epoch registration of one logical table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicalTable {
    /// Physical table(s) per epoch; an absent epoch means "not applicable"
    pub physical: HashMap<Epoch, PhysicalNames>,
    /// Naming drift: canonical column name to its epoch-specific spellings
    #[serde(default)]
    pub renamed_columns: HashMap<String, HashMap<Epoch, String>>,
}

/// The resolved mapping for one (logical table, epoch) pair
#[derive(Debug)]
pub struct Resolution<'a> {
    pub epoch: Epoch,
    /// Physical tables to fetch and union, with their registrations
    pub tables: Vec<(&'a str, &'a PhysicalTable)>,
    /// Epoch-specific column name to canonical name
    pub renames: FxHashMap<String, String>,
}

/// Static lookup from logical tables to their per-epoch physical layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaRegistry {
    /// Per-epoch physical table registrations
    pub epochs: HashMap<Epoch, HashMap<String, PhysicalTable>>,
    /// Logical table entries used by feature configuration
    pub logical: HashMap<String, LogicalTable>,
}

impl SchemaRegistry {
    /// Parse a registry from JSON and validate its shape
    pub fn from_json_str(json: &str) -> Result<Self> {
        let registry: Self = serde_json::from_str(json)?;
        registry.validate()?;
        Ok(registry)
    }

    /// Load and validate a registry from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Look up one physical table registration within an epoch
    pub fn physical(&self, epoch: Epoch, table: &str) -> Result<&PhysicalTable> {
        self.epochs
            .get(&epoch)
            .and_then(|tables| tables.get(table))
            .ok_or_else(|| Error::UnregisteredTable {
                table: table.to_string(),
                epoch,
            })
    }

    /// Resolve a logical table within one epoch. A miss is
    /// [`Error::UnregisteredTable`]; callers merging across epochs treat that
    /// as "not applicable in this epoch", not as a failure.
    pub fn resolve(&self, logical: &str, epoch: Epoch) -> Result<Resolution<'_>> {
        let entry = self
            .logical
            .get(logical)
            .ok_or_else(|| Error::UnknownLogicalTable(logical.to_string()))?;
        let names = entry
            .physical
            .get(&epoch)
            .ok_or_else(|| Error::UnregisteredTable {
                table: logical.to_string(),
                epoch,
            })?;

        let mut tables = Vec::new();
        for name in names.names() {
            tables.push((name, self.physical(epoch, name)?));
        }

        let mut renames = FxHashMap::default();
        for (canonical, versions) in &entry.renamed_columns {
            if let Some(epoch_name) = versions.get(&epoch) {
                renames.insert(epoch_name.clone(), canonical.clone());
            }
        }

        Ok(Resolution {
            epoch,
            tables,
            renames,
        })
    }

    /// The epochs a logical table is registered in, in chronological order
    #[must_use]
    pub fn epochs_of(&self, logical: &str) -> Vec<Epoch> {
        let Some(entry) = self.logical.get(logical) else {
            return Vec::new();
        };
        Epoch::ALL
            .into_iter()
            .filter(|e| entry.physical.contains_key(e))
            .collect()
    }

    /// Validate registry shape. Join column lists must pair up positionally,
    /// join main tables must be registered in the same epoch, and every
    /// logical entry must resolve to registered physical tables in at least
    /// one epoch.
    pub fn validate(&self) -> Result<()> {
        for (epoch, tables) in &self.epochs {
            for (name, table) in tables {
                let Some(join) = &table.join else { continue };
                if join.sub_columns.is_empty() || join.sub_columns.len() != join.main_columns.len()
                {
                    return Err(Error::Config(format!(
                        "join spec for '{name}' in epoch '{epoch}' pairs {} dependent column(s) \
                         with {} main column(s); the lists must be equal length and non-empty",
                        join.sub_columns.len(),
                        join.main_columns.len()
                    )));
                }
                if !tables.contains_key(&join.main_table) {
                    return Err(Error::Config(format!(
                        "join spec for '{name}' in epoch '{epoch}' references main table \
                         '{}' which is not registered in that epoch",
                        join.main_table
                    )));
                }
            }
        }

        for (logical, entry) in &self.logical {
            if entry.physical.is_empty() {
                return Err(Error::Config(format!(
                    "logical table '{logical}' is registered in no epoch"
                )));
            }
            for (epoch, names) in &entry.physical {
                for name in names.names() {
                    if self.physical(*epoch, name).is_err() {
                        return Err(Error::Config(format!(
                            "logical table '{logical}' maps to '{name}' in epoch '{epoch}', \
                             but that physical table is not registered there"
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(database: &str, keys: &[&str]) -> PhysicalTable {
        PhysicalTable {
            database: database.to_string(),
            key_columns: keys.iter().map(ToString::to_string).collect(),
            date_class: DateClass::Direct,
            join: None,
        }
    }

    fn small_registry() -> SchemaRegistry {
        let mut legacy = HashMap::new();
        legacy.insert("OLD_VISIT".to_string(), entry("care_legacy", &["SID", "VDATE"]));
        let mut current = HashMap::new();
        current.insert("VISIT".to_string(), entry("care", &["SID", "VDATE"]));

        let mut epochs = HashMap::new();
        epochs.insert(Epoch::Legacy, legacy);
        epochs.insert(Epoch::Current, current);

        let mut physical = HashMap::new();
        physical.insert(Epoch::Legacy, PhysicalNames::One("OLD_VISIT".to_string()));
        physical.insert(Epoch::Current, PhysicalNames::One("VISIT".to_string()));
        let mut logical = HashMap::new();
        logical.insert(
            "VISIT".to_string(),
            LogicalTable {
                physical,
                renamed_columns: HashMap::new(),
            },
        );
        SchemaRegistry { epochs, logical }
    }

    #[test]
    fn resolve_hits_and_misses() {
        let registry = small_registry();
        let res = registry.resolve("VISIT", Epoch::Legacy).unwrap();
        assert_eq!(res.tables.len(), 1);
        assert_eq!(res.tables[0].0, "OLD_VISIT");

        // A logical table absent in one epoch is a registry miss, not a panic
        assert!(matches!(
            registry.resolve("VISIT", Epoch::Transition),
            Err(Error::UnregisteredTable { .. })
        ));
        assert!(matches!(
            registry.resolve("NOPE", Epoch::Legacy),
            Err(Error::UnknownLogicalTable(_))
        ));
        assert_eq!(registry.epochs_of("VISIT"), vec![Epoch::Legacy, Epoch::Current]);
    }

    #[test]
    fn validation_rejects_mismatched_join_columns() {
        let mut registry = small_registry();
        let tables = registry.epochs.get_mut(&Epoch::Legacy).unwrap();
        tables.insert(
            "OLD_VISIT_RISK".to_string(),
            PhysicalTable {
                database: "care_legacy".to_string(),
                key_columns: vec!["VISIT_ID".to_string()],
                date_class: DateClass::Direct,
                join: Some(JoinSpec {
                    main_table: "OLD_VISIT".to_string(),
                    sub_columns: vec!["VISIT_ID".to_string(), "PID".to_string()],
                    main_columns: vec!["ID".to_string()],
                    rename_to_main: false,
                }),
            },
        );
        assert!(matches!(registry.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn registry_round_trips_through_json() {
        let json = r#"{
            "epochs": {
                "legacy": {
                    "OLD_VISIT": {
                        "database": "care_legacy",
                        "key_columns": ["SID", "VDATE"],
                        "date_class": "minguo_numeric"
                    }
                }
            },
            "logical": {
                "VISIT": {
                    "physical": { "legacy": "OLD_VISIT" },
                    "renamed_columns": { "VDATE": { "legacy": "V_DATE_OLD" } }
                }
            }
        }"#;
        // The logical entry references OLD_VISIT which is registered: valid
        let registry = SchemaRegistry::from_json_str(json).unwrap();
        let res = registry.resolve("VISIT", Epoch::Legacy).unwrap();
        assert_eq!(res.tables[0].1.date_class, DateClass::MinguoNumeric);
        assert_eq!(res.renames.get("V_DATE_OLD").map(String::as_str), Some("VDATE"));
    }
}
