//! Date-encoding normalization.
//!
//! Source tables encode event dates three ways: a Minguo-calendar numeric
//! serial (subject value + a fixed Gregorian offset yields YYYYMMDD), a
//! year-month-only numeric that must be expanded to the first day of the
//! month, and directly date-like values. All three normalize to day-precision
//! `Date32`; anything unparsable or outside the sane calendar bounds becomes
//! null ("no date"), which the follow-up window never matches.

use arrow::array::{Array, Date32Array, Date64Array, TimestampMicrosecondArray,
    TimestampMillisecondArray, TimestampNanosecondArray, TimestampSecondArray};
use arrow::datatypes::{DataType, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use std::sync::Arc;

use crate::error::Result;
use crate::registry::DateClass;
use crate::table::{self, column_as_f64, column_as_strings, column_by_name, naive_to_date32};

/// Fixed offset from the Minguo (Republic) calendar serial to Gregorian YYYYMMDD
const GREGORIAN_OFFSET: i64 = 19_110_000;
/// Serials at or below the offset floor predate the source system entirely
const SERIAL_FLOOR: i64 = 19_110_000;
/// Serials above this ceiling are too far in the future to be real
const SERIAL_CEILING: i64 = 20_300_000;

/// Interpret a Gregorian YYYYMMDD serial, rejecting out-of-bound values
#[must_use]
pub fn serial_to_date(serial: i64) -> Option<NaiveDate> {
    if serial < SERIAL_FLOOR || serial > SERIAL_CEILING {
        return None;
    }
    let year = i32::try_from(serial / 10_000).ok()?;
    let month = u32::try_from((serial / 100) % 100).ok()?;
    let day = u32::try_from(serial % 100).ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Parse a date string with multiple format attempts, truncating any
/// time-of-day component.
#[must_use]
pub fn parse_date_string(s: &str) -> Option<NaiveDate> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    // Datetime renderings: keep the date part only
    let date_part = trimmed
        .split_once(' ')
        .or_else(|| trimmed.split_once('T'))
        .map_or(trimmed, |(date, _)| date);

    const FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d", "%d/%m/%Y", "%d.%m.%Y"];
    for format in FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(date_part, format) {
            return Some(date);
        }
    }
    None
}

fn timestamp_to_date(value: i64, unit: &TimeUnit) -> Option<NaiveDate> {
    let seconds = match unit {
        TimeUnit::Second => value,
        TimeUnit::Millisecond => value.div_euclid(1_000),
        TimeUnit::Microsecond => value.div_euclid(1_000_000),
        TimeUnit::Nanosecond => value.div_euclid(1_000_000_000),
    };
    chrono::DateTime::from_timestamp(seconds, 0).map(|dt| dt.date_naive())
}

/// Extract a column as calendar dates under the `Direct` encoding rule:
/// date-like arrays are truncated to days, strings are parsed with format
/// detection, and anything else coerces to null.
pub fn column_to_naive_dates(
    batch: &RecordBatch,
    column_name: &str,
) -> Result<Vec<Option<NaiveDate>>> {
    let array = column_by_name(batch, column_name)?;
    let dates = match array.data_type() {
        DataType::Date32 => {
            let typed = array
                .as_any()
                .downcast_ref::<Date32Array>()
                .expect("Date32 column downcasts to Date32Array");
            typed
                .iter()
                .map(|opt| opt.and_then(table::date32_to_naive))
                .collect()
        }
        DataType::Date64 => {
            let typed = array
                .as_any()
                .downcast_ref::<Date64Array>()
                .expect("Date64 column downcasts to Date64Array");
            typed
                .iter()
                .map(|opt| opt.and_then(|ms| timestamp_to_date(ms, &TimeUnit::Millisecond)))
                .collect()
        }
        DataType::Timestamp(unit, _) => {
            let values: Vec<Option<i64>> = match unit {
                TimeUnit::Second => array
                    .as_any()
                    .downcast_ref::<TimestampSecondArray>()
                    .map(|a| a.iter().collect()),
                TimeUnit::Millisecond => array
                    .as_any()
                    .downcast_ref::<TimestampMillisecondArray>()
                    .map(|a| a.iter().collect()),
                TimeUnit::Microsecond => array
                    .as_any()
                    .downcast_ref::<TimestampMicrosecondArray>()
                    .map(|a| a.iter().collect()),
                TimeUnit::Nanosecond => array
                    .as_any()
                    .downcast_ref::<TimestampNanosecondArray>()
                    .map(|a| a.iter().collect()),
            }
            .unwrap_or_default();
            values
                .into_iter()
                .map(|opt| opt.and_then(|v| timestamp_to_date(v, unit)))
                .collect()
        }
        _ => {
            let strings = column_as_strings(batch, column_name)?;
            strings
                .into_iter()
                .map(|opt| opt.as_deref().and_then(parse_date_string))
                .collect()
        }
    };
    Ok(dates)
}

/// Normalize one date column in place per its registered encoding class,
/// producing a `Date32` column of the same name.
pub fn normalize_date_column(
    batch: &RecordBatch,
    column_name: &str,
    class: DateClass,
) -> Result<RecordBatch> {
    let dates: Vec<Option<NaiveDate>> = match class {
        DateClass::MinguoNumeric => column_as_f64(batch, column_name)?
            .into_iter()
            .map(|opt| opt.and_then(|v| serial_to_date(v.trunc() as i64 + GREGORIAN_OFFSET)))
            .collect(),
        DateClass::YearMonthNumeric => column_as_f64(batch, column_name)?
            .into_iter()
            .map(|opt| {
                opt.and_then(|v| serial_to_date(v.trunc() as i64 * 100 + GREGORIAN_OFFSET + 1))
            })
            .collect(),
        DateClass::Direct => column_to_naive_dates(batch, column_name)?,
    };
    let array = Date32Array::from(
        dates
            .into_iter()
            .map(|opt| opt.map(naive_to_date32))
            .collect::<Vec<_>>(),
    );
    table::replace_column(batch, column_name, Arc::new(array))
}
