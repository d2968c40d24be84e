//! Time-windowed aggregation of per-subject events.
//!
//! For each variable, source events are filtered to a follow-up window
//! relative to the subject's index date, weighted by recency, and reduced by
//! one of a closed set of aggregation methods. A three-way sentinel policy
//! distinguishes *why* a value is empty: the subject never appeared in the
//! source window, appeared but left the field blank, or answered the field
//! without selecting the option.

use chrono::NaiveDate;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

/// Sentinel for a subject with no surviving in-window source row
pub const SENTINEL_ABSENT: &str = "9999";
/// Sentinel for a subject who appeared but whose field was left blank
pub const SENTINEL_BLANK: &str = "-9999";
/// Sentinel for a subject who answered the field without selecting the option
pub const SENTINEL_NOT_SELECTED: &str = "0";

/// A single event value. Values stay typed through the pipeline; the
/// aggregation methods coerce to numbers only where their semantics need one.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Date(NaiveDate),
    Null,
}

impl CellValue {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric view of the value; text and dates do not coerce
    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// One source event for one subject, before windowing
#[derive(Debug, Clone)]
pub struct RawObservation {
    pub id: String,
    pub index_date: Option<NaiveDate>,
    pub event_date: Option<NaiveDate>,
    pub value: CellValue,
    /// Whether the source field itself was blank on this row
    pub raw_blank: bool,
}

/// An event that survived the follow-up window filter
#[derive(Debug, Clone)]
pub struct Observation {
    pub id: String,
    /// Days between the index date and the event; strictly inside (0, follow_up)
    pub day_offset: i64,
    /// Linear recency weight in (0, 1); larger means more recent
    pub weight: f64,
    pub value: CellValue,
    pub raw_blank: bool,
}

/// Filter events to the follow-up window and order them oldest to most
/// recent. Events on the index date itself or exactly at the window boundary
/// are excluded, as are events with no usable date on either side.
#[must_use]
pub fn window_observations(rows: &[RawObservation], follow_up: i64) -> Vec<Observation> {
    let mut kept: Vec<Observation> = rows
        .iter()
        .filter_map(|row| {
            let index_date = row.index_date?;
            let event_date = row.event_date?;
            let day_offset = index_date.signed_duration_since(event_date).num_days();
            if day_offset <= 0 || day_offset >= follow_up {
                return None;
            }
            #[allow(clippy::cast_precision_loss)]
            let weight = (follow_up - day_offset) as f64 / follow_up as f64;
            Some(Observation {
                id: row.id.clone(),
                day_offset,
                weight,
                value: row.value.clone(),
                raw_blank: row.raw_blank,
            })
        })
        .collect();
    // Oldest first so "last" semantics mean latest-within-window, not
    // latest-in-storage-order. Stable sort keeps source order within a day.
    kept.sort_by_key(|obs| std::cmp::Reverse(obs.day_offset));
    kept
}

/// The closed set of aggregation methods. Serde names are the wire names the
/// downstream consumer matches as `{variable}_{method}` column suffixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMethod {
    /// Most recent in-window non-empty value
    Last,
    /// Most recent in-window value scaled by that row's recency weight
    #[serde(alias = "weighted_last")]
    LastWeighted,
    /// 1 if the subject has any non-empty in-window value, else 0
    IdExist,
    /// Count of non-empty in-window values
    Occurrence,
    /// Unweighted mean of in-window values
    Average,
    /// Recency-weighted mean of in-window values
    WeightedAverage,
    /// Sample standard deviation of in-window values
    Std,
    /// Linear trend slope of value against day offset
    Regression,
    /// Sum of recency weights; a recency-decayed visit-count proxy
    WeightedSum,
}

impl AggregationMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Last => "last",
            Self::LastWeighted => "last_weighted",
            Self::IdExist => "id_exist",
            Self::Occurrence => "occurrence",
            Self::Average => "average",
            Self::WeightedAverage => "weighted_average",
            Self::Std => "std",
            Self::Regression => "regression",
            Self::WeightedSum => "weighted_sum",
        }
    }

    /// Count-like methods fill missing subjects with numeric 0 instead of a
    /// sentinel
    #[must_use]
    pub const fn fills_zero(self) -> bool {
        matches!(self, Self::IdExist | Self::Occurrence | Self::WeightedSum)
    }
}

/// One cell of the feature matrix. The three empty states are kept as typed
/// variants internally and serialized to their literal markers only at the
/// output boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureCell {
    Value(f64),
    /// A raw last-value cell: may be text or a date, not just a number
    Raw(CellValue),
    AbsentFromSource,
    BlankField,
    NotSelected,
}

impl FeatureCell {
    /// Render the cell for the external interface. The three sentinel
    /// literals are a stable contract with the downstream consumer.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Value(n) => format_number(*n),
            Self::Raw(CellValue::Number(n)) => format_number(*n),
            Self::Raw(CellValue::Text(s)) => s.clone(),
            Self::Raw(CellValue::Date(d)) => d.format("%Y-%m-%d").to_string(),
            Self::Raw(CellValue::Null) => String::new(),
            Self::AbsentFromSource => SENTINEL_ABSENT.to_string(),
            Self::BlankField => SENTINEL_BLANK.to_string(),
            Self::NotSelected => SENTINEL_NOT_SELECTED.to_string(),
        }
    }

    /// Numeric view, for callers post-processing the matrix
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Value(n) => Some(*n),
            Self::Raw(v) => v.as_f64(),
            _ => None,
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Aggregate windowed observations for every roster id under one method,
/// then apply the sentinel-assignment policy. Returns one cell per roster id,
/// in roster order.
#[must_use]
pub fn aggregate(
    roster_ids: &[String],
    observations: &[Observation],
    method: AggregationMethod,
) -> Vec<FeatureCell> {
    let surviving: FxHashSet<&str> = observations.iter().map(|o| o.id.as_str()).collect();
    let blank_ids: FxHashSet<&str> = observations
        .iter()
        .filter(|o| o.raw_blank)
        .map(|o| o.id.as_str())
        .collect();

    let results = dispatch(observations, method);

    roster_ids
        .iter()
        .map(|id| match results.get(id.as_str()) {
            Some(cell) => cell.clone(),
            // Strict precedence: absent from source wins, then blank field,
            // then answered-but-not-selected. Exactly one rule fires.
            None if method.fills_zero() => FeatureCell::Value(0.0),
            None if !surviving.contains(id.as_str()) => FeatureCell::AbsentFromSource,
            None if blank_ids.contains(id.as_str()) => FeatureCell::BlankField,
            None => FeatureCell::NotSelected,
        })
        .collect()
}

fn dispatch(observations: &[Observation], method: AggregationMethod) -> FxHashMap<&str, FeatureCell> {
    match method {
        AggregationMethod::Last => last_value(observations),
        AggregationMethod::LastWeighted => last_weighted(observations),
        AggregationMethod::IdExist => id_exist(observations),
        AggregationMethod::Occurrence => occurrence(observations),
        AggregationMethod::Average => average(observations),
        AggregationMethod::WeightedAverage => weighted_average(observations),
        AggregationMethod::Std => std_dev(observations),
        AggregationMethod::Regression => regression(observations),
        AggregationMethod::WeightedSum => weighted_sum(observations),
    }
}

/// Observations arrive oldest first, so a plain overwrite per id leaves the
/// most recent non-empty value.
fn last_value(observations: &[Observation]) -> FxHashMap<&str, FeatureCell> {
    let mut out = FxHashMap::default();
    for obs in observations {
        if !obs.value.is_null() {
            out.insert(obs.id.as_str(), FeatureCell::Raw(obs.value.clone()));
        }
    }
    out
}

fn last_weighted(observations: &[Observation]) -> FxHashMap<&str, FeatureCell> {
    let mut out = FxHashMap::default();
    for obs in observations {
        if let Some(value) = obs.value.as_f64() {
            out.insert(obs.id.as_str(), FeatureCell::Value(value * obs.weight));
        }
    }
    out
}

fn id_exist(observations: &[Observation]) -> FxHashMap<&str, FeatureCell> {
    let mut out = FxHashMap::default();
    for obs in observations {
        if !obs.value.is_null() {
            out.insert(obs.id.as_str(), FeatureCell::Value(1.0));
        }
    }
    out
}

fn occurrence(observations: &[Observation]) -> FxHashMap<&str, FeatureCell> {
    let mut counts: FxHashMap<&str, u64> = FxHashMap::default();
    for obs in observations {
        if !obs.value.is_null() {
            *counts.entry(obs.id.as_str()).or_default() += 1;
        }
    }
    counts
        .into_iter()
        .map(|(id, n)| {
            #[allow(clippy::cast_precision_loss)]
            (id, FeatureCell::Value(n as f64))
        })
        .collect()
}

fn numeric_groups<'a>(observations: &'a [Observation]) -> FxHashMap<&'a str, Vec<f64>> {
    let mut groups: FxHashMap<&str, Vec<f64>> = FxHashMap::default();
    for obs in observations {
        if let Some(value) = obs.value.as_f64() {
            groups.entry(obs.id.as_str()).or_default().push(value);
        }
    }
    groups
}

fn average(observations: &[Observation]) -> FxHashMap<&str, FeatureCell> {
    numeric_groups(observations)
        .into_iter()
        .map(|(id, values)| {
            #[allow(clippy::cast_precision_loss)]
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            (id, FeatureCell::Value(mean))
        })
        .collect()
}

fn weighted_average(observations: &[Observation]) -> FxHashMap<&str, FeatureCell> {
    // The denominator runs over every in-window row for the id, including
    // rows whose value is empty; only the numerator skips empties.
    let mut numerators: FxHashMap<&str, f64> = FxHashMap::default();
    let mut denominators: FxHashMap<&str, f64> = FxHashMap::default();
    for obs in observations {
        *denominators.entry(obs.id.as_str()).or_default() += obs.weight;
        if let Some(value) = obs.value.as_f64() {
            *numerators.entry(obs.id.as_str()).or_default() += value * obs.weight;
        }
    }
    denominators
        .into_iter()
        .map(|(id, den)| {
            let num = numerators.get(id).copied().unwrap_or(0.0);
            (id, FeatureCell::Value(num / den))
        })
        .collect()
}

fn std_dev(observations: &[Observation]) -> FxHashMap<&str, FeatureCell> {
    numeric_groups(observations)
        .into_iter()
        .filter_map(|(id, values)| {
            // Sample standard deviation is undefined below two points
            if values.len() < 2 {
                return None;
            }
            #[allow(clippy::cast_precision_loss)]
            let n = values.len() as f64;
            let mean = values.iter().sum::<f64>() / n;
            let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
            Some((id, FeatureCell::Value(variance.sqrt())))
        })
        .collect()
}

fn weighted_sum(observations: &[Observation]) -> FxHashMap<&str, FeatureCell> {
    let mut sums: FxHashMap<&str, f64> = FxHashMap::default();
    for obs in observations {
        *sums.entry(obs.id.as_str()).or_default() += obs.weight;
    }
    sums.into_iter()
        .map(|(id, sum)| (id, FeatureCell::Value(sum)))
        .collect()
}

/// Per-id trend slope of value against day offset. The centering statistics
/// are computed once over the entire filtered population, not per id, so the
/// slope is relative to a population-wide center. That is the observed
/// upstream behavior and is preserved deliberately. Ids with fewer than two
/// in-window points, or a zero centered-x spread, stay undefined and flow
/// into the sentinel path.
fn regression(observations: &[Observation]) -> FxHashMap<&str, FeatureCell> {
    let numeric: Vec<(&str, f64, f64)> = observations
        .iter()
        .filter_map(|obs| {
            #[allow(clippy::cast_precision_loss)]
            let x = obs.day_offset as f64;
            obs.value.as_f64().map(|y| (obs.id.as_str(), x, y))
        })
        .collect();
    if numeric.is_empty() {
        return FxHashMap::default();
    }

    #[allow(clippy::cast_precision_loss)]
    let mean_x = observations
        .iter()
        .map(|o| o.day_offset as f64)
        .sum::<f64>()
        / observations.len() as f64;
    #[allow(clippy::cast_precision_loss)]
    let mean_y = numeric.iter().map(|(_, _, y)| y).sum::<f64>() / numeric.len() as f64;

    let mut numerators: FxHashMap<&str, f64> = FxHashMap::default();
    for (id, x, y) in numeric.iter().copied() {
        *numerators.entry(id).or_default() += (x - mean_x) * (y - mean_y);
    }

    let mut denominators: FxHashMap<&str, f64> = FxHashMap::default();
    let mut point_counts: FxHashMap<&str, usize> = FxHashMap::default();
    for obs in observations {
        #[allow(clippy::cast_precision_loss)]
        let x = obs.day_offset as f64;
        *denominators.entry(obs.id.as_str()).or_default() += (x - mean_x).powi(2);
        *point_counts.entry(obs.id.as_str()).or_default() += 1;
    }

    numerators
        .into_iter()
        .filter_map(|(id, num)| {
            if point_counts.get(id).copied().unwrap_or(0) < 2 {
                return None;
            }
            let den = denominators.get(id).copied().unwrap_or(0.0);
            if den == 0.0 {
                return None;
            }
            let slope = num / den;
            slope.is_finite().then_some((id, FeatureCell::Value(slope)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn raw(id: &str, index: (i32, u32, u32), event: (i32, u32, u32), value: f64) -> RawObservation {
        RawObservation {
            id: id.to_string(),
            index_date: Some(ymd(index.0, index.1, index.2)),
            event_date: Some(ymd(event.0, event.1, event.2)),
            value: CellValue::Number(value),
            raw_blank: false,
        }
    }

    #[test]
    fn window_bounds_are_strict_on_both_sides() {
        let index = (2024, 6, 1);
        let rows = vec![
            raw("a", index, (2024, 6, 1), 1.0),  // offset 0: excluded
            raw("a", index, (2024, 5, 31), 2.0), // offset 1: kept
            raw("a", index, (2023, 6, 2), 3.0),  // offset 365: excluded at boundary
            raw("a", index, (2023, 6, 3), 4.0),  // offset 364: kept
        ];
        let kept = window_observations(&rows, 365);
        assert_eq!(kept.len(), 2);
        for obs in &kept {
            assert!(obs.day_offset > 0 && obs.day_offset < 365);
        }
        // Ordered oldest to most recent
        assert_eq!(kept[0].day_offset, 364);
        assert_eq!(kept[1].day_offset, 1);
    }

    #[test]
    fn weight_decays_linearly_with_offset() {
        let rows = vec![
            raw("a", (2024, 6, 1), (2024, 5, 31), 1.0),
            raw("a", (2024, 6, 1), (2024, 3, 1), 1.0),
        ];
        let kept = window_observations(&rows, 365);
        for obs in &kept {
            assert!(obs.weight > 0.0 && obs.weight < 1.0);
        }
        // More recent events weigh more
        let recent = kept.iter().find(|o| o.day_offset == 1).unwrap();
        let older = kept.iter().find(|o| o.day_offset > 1).unwrap();
        assert!(recent.weight > older.weight);
        assert!((recent.weight - 364.0 / 365.0).abs() < 1e-12);
    }

    #[test]
    fn rows_without_dates_never_match_the_window() {
        let mut no_event = raw("a", (2024, 6, 1), (2024, 5, 1), 1.0);
        no_event.event_date = None;
        let mut no_index = raw("a", (2024, 6, 1), (2024, 5, 1), 1.0);
        no_index.index_date = None;
        assert!(window_observations(&[no_event, no_index], 365).is_empty());
    }

    #[test]
    fn last_takes_most_recent_non_empty() {
        let mut rows = vec![
            raw("a", (2024, 6, 1), (2024, 1, 1), 10.0),
            raw("a", (2024, 6, 1), (2024, 5, 1), 20.0),
        ];
        // Most recent row for "a" is blank: last skips it
        rows.push(RawObservation {
            value: CellValue::Null,
            raw_blank: true,
            ..raw("a", (2024, 6, 1), (2024, 5, 20), 0.0)
        });
        let obs = window_observations(&rows, 365);
        let ids = vec!["a".to_string()];
        let cells = aggregate(&ids, &obs, AggregationMethod::Last);
        assert_eq!(cells[0], FeatureCell::Raw(CellValue::Number(20.0)));
    }

    #[test]
    fn weighted_average_matches_average_under_equal_weights() {
        // Same day offset for every event means identical weights
        let rows = vec![
            raw("a", (2024, 6, 1), (2024, 5, 1), 2.0),
            raw("a", (2024, 6, 1), (2024, 5, 1), 4.0),
            raw("a", (2024, 6, 1), (2024, 5, 1), 9.0),
        ];
        let obs = window_observations(&rows, 365);
        let ids = vec!["a".to_string()];
        let plain = aggregate(&ids, &obs, AggregationMethod::Average);
        let weighted = aggregate(&ids, &obs, AggregationMethod::WeightedAverage);
        let a = plain[0].as_f64().unwrap();
        let b = weighted[0].as_f64().unwrap();
        assert!((a - b).abs() < 1e-12);
        assert!((a - 5.0).abs() < 1e-12);
    }

    #[test]
    fn sentinel_precedence_absent_always_wins() {
        let rows = vec![raw("a", (2024, 6, 1), (2024, 5, 1), 5.0)];
        let obs = window_observations(&rows, 365);
        let ids = vec!["a".to_string(), "b".to_string()];
        for method in [
            AggregationMethod::Last,
            AggregationMethod::Average,
            AggregationMethod::Std,
            AggregationMethod::Regression,
        ] {
            let cells = aggregate(&ids, &obs, method);
            assert_eq!(cells[1], FeatureCell::AbsentFromSource, "{method:?}");
        }
    }

    #[test]
    fn blank_field_and_not_selected_are_distinguished() {
        let blank_row = RawObservation {
            value: CellValue::Null,
            raw_blank: true,
            ..raw("a", (2024, 6, 1), (2024, 5, 1), 0.0)
        };
        let answered_row = RawObservation {
            value: CellValue::Null,
            raw_blank: false,
            ..raw("b", (2024, 6, 1), (2024, 5, 1), 0.0)
        };
        let obs = window_observations(&[blank_row, answered_row], 365);
        let ids = vec!["a".to_string(), "b".to_string()];
        let cells = aggregate(&ids, &obs, AggregationMethod::Average);
        assert_eq!(cells[0], FeatureCell::BlankField);
        assert_eq!(cells[1], FeatureCell::NotSelected);
        assert_eq!(cells[0].render(), SENTINEL_BLANK);
        assert_eq!(cells[1].render(), SENTINEL_NOT_SELECTED);
    }

    #[test]
    fn count_methods_fill_zero_not_sentinels() {
        let rows = vec![raw("a", (2024, 6, 1), (2024, 5, 1), 5.0)];
        let obs = window_observations(&rows, 365);
        let ids = vec!["a".to_string(), "b".to_string()];

        let exist = aggregate(&ids, &obs, AggregationMethod::IdExist);
        assert_eq!(exist, vec![FeatureCell::Value(1.0), FeatureCell::Value(0.0)]);

        let counts = aggregate(&ids, &obs, AggregationMethod::Occurrence);
        assert_eq!(counts[0], FeatureCell::Value(1.0));
        assert_eq!(counts[1], FeatureCell::Value(0.0));
        assert_eq!(counts[1].render(), "0");
    }

    #[test]
    fn roster_scenario_average_and_occurrence() {
        // Roster: A and B, index 2024-06-01; A has one event at offset 30
        // with value 5.0; B has nothing at all.
        let rows = vec![raw("A", (2024, 6, 1), (2024, 5, 2), 5.0)];
        let obs = window_observations(&rows, 365);
        assert_eq!(obs[0].day_offset, 30);
        let ids = vec!["A".to_string(), "B".to_string()];

        let avg = aggregate(&ids, &obs, AggregationMethod::Average);
        assert_eq!(avg[0], FeatureCell::Value(5.0));
        assert_eq!(avg[1].render(), SENTINEL_ABSENT);

        let occ = aggregate(&ids, &obs, AggregationMethod::Occurrence);
        assert_eq!(occ[0].render(), "1");
        assert_eq!(occ[1].render(), "0");
    }

    #[test]
    fn weighted_sum_ignores_values() {
        let mut rows = vec![
            raw("a", (2024, 6, 1), (2024, 5, 1), 100.0),
            raw("a", (2024, 6, 1), (2024, 4, 1), 200.0),
        ];
        rows.push(RawObservation {
            value: CellValue::Null,
            ..raw("a", (2024, 6, 1), (2024, 3, 1), 0.0)
        });
        let obs = window_observations(&rows, 365);
        let ids = vec!["a".to_string()];
        let cells = aggregate(&ids, &obs, AggregationMethod::WeightedSum);
        let expected: f64 = obs.iter().map(|o| o.weight).sum();
        assert!((cells[0].as_f64().unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn std_is_sample_and_undefined_below_two_points() {
        let rows = vec![
            raw("a", (2024, 6, 1), (2024, 5, 1), 2.0),
            raw("a", (2024, 6, 1), (2024, 4, 1), 4.0),
            raw("b", (2024, 6, 1), (2024, 5, 1), 7.0),
        ];
        let obs = window_observations(&rows, 365);
        let ids = vec!["a".to_string(), "b".to_string()];
        let cells = aggregate(&ids, &obs, AggregationMethod::Std);
        // Sample std of {2, 4} is sqrt(2)
        assert!((cells[0].as_f64().unwrap() - 2.0_f64.sqrt()).abs() < 1e-12);
        // One point: undefined, resolved by the sentinel policy
        assert_eq!(cells[1], FeatureCell::NotSelected);
    }

    #[test]
    fn regression_centers_on_the_population() {
        // Two subjects; the centering statistics span both of them.
        let rows = vec![
            raw("a", (2024, 6, 1), (2024, 5, 22), 1.0), // offset 10
            raw("a", (2024, 6, 1), (2024, 5, 12), 2.0), // offset 20
            raw("b", (2024, 6, 1), (2024, 4, 2), 10.0), // offset 60
            raw("b", (2024, 6, 1), (2024, 3, 3), 20.0), // offset 90
        ];
        let obs = window_observations(&rows, 365);
        let ids = vec!["a".to_string(), "b".to_string()];
        let cells = aggregate(&ids, &obs, AggregationMethod::Regression);

        let mean_x = (10.0 + 20.0 + 60.0 + 90.0) / 4.0;
        let mean_y = (1.0 + 2.0 + 10.0 + 20.0) / 4.0;
        let slope = |points: &[(f64, f64)]| {
            let num: f64 = points.iter().map(|(x, y)| (x - mean_x) * (y - mean_y)).sum();
            let den: f64 = points.iter().map(|(x, _)| (x - mean_x).powi(2)).sum();
            num / den
        };
        let expect_a = slope(&[(10.0, 1.0), (20.0, 2.0)]);
        let expect_b = slope(&[(60.0, 10.0), (90.0, 20.0)]);
        assert!((cells[0].as_f64().unwrap() - expect_a).abs() < 1e-9);
        assert!((cells[1].as_f64().unwrap() - expect_b).abs() < 1e-9);
    }

    #[test]
    fn regression_single_point_stays_undefined() {
        let rows = vec![
            raw("a", (2024, 6, 1), (2024, 5, 1), 5.0),
            raw("b", (2024, 6, 1), (2024, 4, 1), 2.0),
            raw("b", (2024, 6, 1), (2024, 3, 1), 3.0),
        ];
        let obs = window_observations(&rows, 365);
        let ids = vec!["a".to_string(), "b".to_string()];
        let cells = aggregate(&ids, &obs, AggregationMethod::Regression);
        assert_eq!(cells[0], FeatureCell::NotSelected);
        assert!(cells[1].as_f64().is_some());
    }

    #[test]
    fn method_names_round_trip_through_serde() {
        let m: AggregationMethod = serde_json::from_str("\"last_weighted\"").unwrap();
        assert_eq!(m, AggregationMethod::LastWeighted);
        // The alternate spelling is accepted as an alias
        let m: AggregationMethod = serde_json::from_str("\"weighted_last\"").unwrap();
        assert_eq!(m, AggregationMethod::LastWeighted);
        assert_eq!(m.as_str(), "last_weighted");
    }
}
