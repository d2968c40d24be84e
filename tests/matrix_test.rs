//! End-to-end matrix build: window filtering, sentinel assignment, transform
//! chains and the `{variable}_{method}` column contract.

use std::sync::Arc;

use arrow::array::StringArray;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;

use cohort_matrix::matrix::Roster;
use cohort_matrix::source::MemorySource;
use cohort_matrix::table;
use cohort_matrix::{SchemaRegistry, VariableDictionary, build_feature_matrix};

fn registry() -> SchemaRegistry {
    SchemaRegistry::from_json_str(
        r#"{
            "epochs": {
                "current": {
                    "VISIT": {
                        "database": "care",
                        "key_columns": ["PID", "VDATE"],
                        "date_class": "direct"
                    }
                }
            },
            "logical": {
                "VISIT": { "physical": { "current": "VISIT" } }
            }
        }"#,
    )
    .unwrap()
}

fn dictionary() -> VariableDictionary {
    VariableDictionary::from_json_str(
        r#"{
            "tables": [
                {
                    "table": "VISIT",
                    "common": { "id_col": "PID", "date_col": "VDATE" },
                    "variables": [
                        {
                            "name": "score",
                            "var_type": "cont",
                            "value_column": "SCORE",
                            "methods": [
                                { "method": "last", "follow_up": 30 },
                                { "method": "average", "follow_up": 30 },
                                { "method": "occurrence", "follow_up": 30 },
                                { "method": "weighted_average", "follow_up": 30 }
                            ]
                        },
                        {
                            "name": "mood_dx",
                            "var_type": "cat",
                            "value_column": "DIAG",
                            "transforms": [
                                { "kind": "contains_any", "patterns": ["F32", "F33"] }
                            ],
                            "methods": [
                                { "method": "id_exist", "follow_up": 30 }
                            ]
                        },
                        {
                            "name": "age",
                            "var_type": "cont",
                            "value_column": "BIRTH",
                            "keep_raw": true,
                            "transforms": [
                                { "kind": "years_since", "other_column": "index_date" }
                            ],
                            "methods": [
                                { "method": "last", "follow_up": 30 }
                            ]
                        }
                    ]
                }
            ]
        }"#,
    )
    .unwrap()
}

fn utf8_batch(names: &[&str], columns: Vec<Vec<Option<&str>>>) -> RecordBatch {
    let fields: Vec<Field> = names
        .iter()
        .map(|n| Field::new(*n, DataType::Utf8, true))
        .collect();
    let arrays = columns
        .into_iter()
        .map(|c| Arc::new(StringArray::from(c)) as arrow::array::ArrayRef)
        .collect();
    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).unwrap()
}

/// Every roster subject is anchored to 2024-06-01. With a 30-day follow-up,
/// only events strictly between 2024-05-02 (exclusive) and the index date
/// (exclusive) survive.
fn source() -> MemorySource {
    let mut source = MemorySource::new();
    source.insert(
        "care",
        "VISIT",
        utf8_batch(
            &["PID", "VDATE", "SCORE", "DIAG", "BIRTH"],
            vec![
                vec![Some("A"), Some("A"), Some("B"), Some("C"), Some("C")],
                vec![
                    Some("2024-05-22"),
                    Some("2024-05-02"),
                    Some("2024-05-12"),
                    Some("2024-06-01"),
                    Some("2024-03-03"),
                ],
                vec![Some("7"), Some("5"), Some("  "), Some("9"), Some("4")],
                vec![
                    Some("F32 depressive"),
                    Some("Z00"),
                    Some("F41 anxiety"),
                    Some("Z00"),
                    Some("Z00"),
                ],
                vec![Some("1990-03-10"), Some("1990-03-10"), None, None, None],
            ],
        ),
    );
    source
}

fn roster() -> Roster {
    let batch = utf8_batch(
        &["PID", "INDEX_DATE"],
        vec![
            vec![Some("A"), Some("B"), Some("C"), Some("D")],
            vec![Some("2024-06-01"); 4],
        ],
    );
    Roster::from_batch(&batch, "PID", "INDEX_DATE").unwrap()
}

fn column(batch: &RecordBatch, name: &str) -> Vec<Option<String>> {
    table::column_as_strings(batch, name).unwrap()
}

#[test]
fn matrix_covers_every_variable_method_pair() {
    let matrix = build_feature_matrix(&source(), &registry(), &dictionary(), &roster()).unwrap();
    assert_eq!(
        matrix.column_names(),
        vec![
            "score_last",
            "score_average",
            "score_occurrence",
            "score_weighted_average",
            "mood_dx_id_exist",
            "age_last",
        ]
    );

    let batch = matrix.to_record_batch().unwrap();
    assert_eq!(batch.num_rows(), 4);
    // The roster id column keeps its original name and order
    assert_eq!(
        column(&batch, "PID"),
        vec![
            Some("A".to_string()),
            Some("B".to_string()),
            Some("C".to_string()),
            Some("D".to_string()),
        ]
    );
    // The index-date anchor rides along under its source name
    assert_eq!(
        column(&batch, "INDEX_DATE")[0].as_deref(),
        Some("2024-06-01")
    );
}

#[test]
fn sentinel_precedence_per_subject() {
    // A has one in-window score (day 10); the day-30 event sits exactly on
    // the window boundary and is excluded. B is in-window with a blank score.
    // C only has events on the index date or outside the window. D never
    // appears in the source.
    let matrix = build_feature_matrix(&source(), &registry(), &dictionary(), &roster()).unwrap();
    let batch = matrix.to_record_batch().unwrap();

    let last = column(&batch, "score_last");
    assert_eq!(last[0].as_deref(), Some("7"));
    assert_eq!(last[1].as_deref(), Some("-9999"));
    assert_eq!(last[2].as_deref(), Some("9999"));
    assert_eq!(last[3].as_deref(), Some("9999"));

    let average = column(&batch, "score_average");
    assert_eq!(average[0].as_deref(), Some("7"));
    assert_eq!(average[1].as_deref(), Some("-9999"));

    // Count-like methods fill missing subjects with 0, never a sentinel
    let occurrence = column(&batch, "score_occurrence");
    assert_eq!(
        occurrence,
        vec![
            Some("1".to_string()),
            Some("0".to_string()),
            Some("0".to_string()),
            Some("0".to_string()),
        ]
    );

    // The weighted denominator runs over every in-window row, so B's blank
    // row yields 0 rather than a sentinel; C and D stay absent. A's single
    // in-window row gives (7·w)/w, compared numerically since the division
    // does not round-trip exactly through f64.
    let weighted = column(&batch, "score_weighted_average");
    let a: f64 = weighted[0].as_deref().unwrap().parse().unwrap();
    assert!((a - 7.0).abs() < 1e-9);
    assert_eq!(weighted[1].as_deref(), Some("0"));
    assert_eq!(weighted[2].as_deref(), Some("9999"));
    assert_eq!(weighted[3].as_deref(), Some("9999"));
}

#[test]
fn unparsable_numeric_answer_is_not_a_blank_field() {
    // A answered the score field with text that does not parse as a number;
    // B left it blank. Both rows are in-window, so A takes the
    // answered-but-not-selected marker and only B the blank-field one.
    let mut source = MemorySource::new();
    source.insert(
        "care",
        "VISIT",
        utf8_batch(
            &["PID", "VDATE", "SCORE"],
            vec![
                vec![Some("A"), Some("B")],
                vec![Some("2024-05-22"), Some("2024-05-22")],
                vec![Some("refused"), Some("  ")],
            ],
        ),
    );
    let dictionary = VariableDictionary::from_json_str(
        r#"{
            "tables": [
                {
                    "table": "VISIT",
                    "common": { "id_col": "PID", "date_col": "VDATE" },
                    "variables": [
                        {
                            "name": "score",
                            "var_type": "cont",
                            "value_column": "SCORE",
                            "methods": [ { "method": "average", "follow_up": 30 } ]
                        }
                    ]
                }
            ]
        }"#,
    )
    .unwrap();
    let roster = Roster::from_batch(
        &utf8_batch(
            &["PID", "INDEX_DATE"],
            vec![
                vec![Some("A"), Some("B")],
                vec![Some("2024-06-01"); 2],
            ],
        ),
        "PID",
        "INDEX_DATE",
    )
    .unwrap();

    let matrix = build_feature_matrix(&source, &registry(), &dictionary, &roster).unwrap();
    let batch = matrix.to_record_batch().unwrap();
    let average = column(&batch, "score_average");
    assert_eq!(average[0].as_deref(), Some("0"));
    assert_eq!(average[1].as_deref(), Some("-9999"));
}

#[test]
fn transform_chain_flags_and_year_durations() {
    let matrix = build_feature_matrix(&source(), &registry(), &dictionary(), &roster()).unwrap();
    let batch = matrix.to_record_batch().unwrap();

    // A's in-window diagnosis contains F32; B's does not, C's rows fall
    // outside the window, D is unseen. id_exist fills the rest with 0.
    assert_eq!(
        column(&batch, "mood_dx_id_exist"),
        vec![
            Some("1".to_string()),
            Some("0".to_string()),
            Some("0".to_string()),
            Some("0".to_string()),
        ]
    );

    // 1990-03-10 to 2024-06-01 is 34 whole years. B's birth field is blank,
    // so the transformed value is blank too.
    let age = column(&batch, "age_last");
    assert_eq!(age[0].as_deref(), Some("34"));
    assert_eq!(age[1].as_deref(), Some("-9999"));
    assert_eq!(age[2].as_deref(), Some("9999"));
    assert_eq!(age[3].as_deref(), Some("9999"));
}
