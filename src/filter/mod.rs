//! A composable `RecordBatch` filter engine.
//!
//! The filter vocabulary is deliberately closed: equality, inequality,
//! substring containment, set membership and boolean algebra. Predicates are
//! evaluated against the textual rendering of a column so that mixed
//! numeric/string key representations across epochs compare consistently.

use arrow::array::{BooleanArray, StringArray};
use arrow::compute::{and, filter_record_batch, not, or};
use arrow::record_batch::RecordBatch;
use std::collections::HashSet;

use crate::error::Result;
use crate::table;

#[derive(Debug, Clone)]
pub enum StringFilter {
    Eq(String),
    Neq(String),
    Contains(String),
}

#[derive(Debug, Clone)]
pub enum Expr {
    Filter {
        column: String,
        filter: StringFilter,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    /// Check if column value is in a set of values
    In(String, Vec<String>),
    AlwaysTrue,
}

impl Expr {
    #[must_use]
    pub fn and(self, rhs: Self) -> Self {
        Self::And(Box::new(self), Box::new(rhs))
    }

    #[must_use]
    pub fn or(self, rhs: Self) -> Self {
        Self::Or(Box::new(self), Box::new(rhs))
    }

    #[must_use]
    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }

    #[must_use]
    pub const fn always_true() -> Self {
        Self::AlwaysTrue
    }

    #[must_use]
    pub fn required_columns(&self) -> HashSet<String> {
        let mut set = HashSet::new();
        self.collect_columns(&mut set);
        set
    }

    fn collect_columns(&self, set: &mut HashSet<String>) {
        match self {
            Self::Filter { column, .. } | Self::In(column, _) => {
                set.insert(column.clone());
            }
            Self::And(lhs, rhs) | Self::Or(lhs, rhs) => {
                lhs.collect_columns(set);
                rhs.collect_columns(set);
            }
            Self::Not(inner) => inner.collect_columns(set),
            Self::AlwaysTrue => {}
        }
    }
}

#[must_use]
pub fn col(name: &str) -> ColumnBuilder {
    ColumnBuilder {
        name: name.to_string(),
    }
}

pub struct ColumnBuilder {
    name: String,
}

impl ColumnBuilder {
    #[must_use]
    pub fn eq(self, val: &str) -> Expr {
        Expr::Filter {
            column: self.name,
            filter: StringFilter::Eq(val.to_string()),
        }
    }

    #[must_use]
    pub fn neq(self, val: &str) -> Expr {
        Expr::Filter {
            column: self.name,
            filter: StringFilter::Neq(val.to_string()),
        }
    }

    #[must_use]
    pub fn contains(self, val: &str) -> Expr {
        Expr::Filter {
            column: self.name,
            filter: StringFilter::Contains(val.to_string()),
        }
    }

    #[must_use]
    pub fn in_list(self, values: Vec<String>) -> Expr {
        Expr::In(self.name, values)
    }
}

/// Evaluate an expression against a record batch, producing a row mask.
pub fn evaluate_expr(batch: &RecordBatch, expr: &Expr) -> Result<BooleanArray> {
    match expr {
        Expr::Filter { column, filter } => string_mask_from_filter(batch, column, filter),
        Expr::And(lhs, rhs) => Ok(and(
            &evaluate_expr(batch, lhs)?,
            &evaluate_expr(batch, rhs)?,
        )?),
        Expr::Or(lhs, rhs) => Ok(or(
            &evaluate_expr(batch, lhs)?,
            &evaluate_expr(batch, rhs)?,
        )?),
        Expr::Not(inner) => Ok(not(&evaluate_expr(batch, inner)?)?),
        Expr::In(column, values) => {
            let array = string_column(batch, column)?;
            let value_set: HashSet<&str> = values.iter().map(String::as_str).collect();
            Ok(array
                .iter()
                .map(|opt| opt.map(|s| value_set.contains(s)))
                .collect())
        }
        Expr::AlwaysTrue => Ok(BooleanArray::from(vec![true; batch.num_rows()])),
    }
}

/// Apply an expression to a batch, keeping only matching rows. Rows where the
/// predicate is null (missing data) are dropped.
pub fn apply_filter(batch: &RecordBatch, expr: &Expr) -> Result<RecordBatch> {
    let mask = evaluate_expr(batch, expr)?;
    Ok(filter_record_batch(batch, &mask)?)
}

fn string_column(batch: &RecordBatch, column: &str) -> Result<StringArray> {
    let array = table::column_by_name(batch, column)?;
    let utf8 = table::cast_to_utf8(&array)?;
    let strings = utf8
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| crate::error::Error::InvalidDataType {
            column: column.to_string(),
            expected: "StringArray".to_string(),
        })?;
    // Clone the downcast view so the cast's backing buffer can be shared out
    Ok(strings.clone())
}

fn string_mask_from_filter(
    batch: &RecordBatch,
    column: &str,
    filter: &StringFilter,
) -> Result<BooleanArray> {
    let array = string_column(batch, column)?;
    let mask = match filter {
        StringFilter::Eq(val) => array.iter().map(|opt| opt.map(|s| s == val)).collect(),
        StringFilter::Neq(val) => array.iter().map(|opt| opt.map(|s| s != val)).collect(),
        StringFilter::Contains(substr) => array
            .iter()
            .map(|opt| opt.map(|s| s.contains(substr.as_str())))
            .collect(),
    };
    Ok(mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn sample_batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, true),
            Field::new("code", DataType::Int64, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec![Some("a1"), Some("b2"), None])),
                Arc::new(Int64Array::from(vec![Some(7), Some(8), Some(7)])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn eq_filter_compares_textually_across_types() {
        let batch = sample_batch();
        // Int column compared through its string rendering
        let filtered = apply_filter(&batch, &col("code").eq("7")).unwrap();
        assert_eq!(filtered.num_rows(), 2);
    }

    #[test]
    fn null_rows_are_dropped_by_predicates() {
        let batch = sample_batch();
        let filtered = apply_filter(&batch, &col("id").contains("1")).unwrap();
        assert_eq!(filtered.num_rows(), 1);
        let filtered = apply_filter(&batch, &col("id").neq("a1")).unwrap();
        // The null id row is neither equal nor unequal; it is dropped
        assert_eq!(filtered.num_rows(), 1);
    }

    #[test]
    fn boolean_algebra_composes() {
        let batch = sample_batch();
        let expr = col("code").eq("7").and(col("id").eq("a1"));
        assert_eq!(apply_filter(&batch, &expr).unwrap().num_rows(), 1);
        let expr = col("id").in_list(vec!["a1".into(), "b2".into()]);
        assert_eq!(apply_filter(&batch, &expr).unwrap().num_rows(), 2);
    }
}
