//! Temporal constructors — `date()`, `time()`, `localtime()`, `datetime()`,
//! `localdatetime()`, `duration()`. Each parses the ISO-8601-ish literal
//! formats spec.md §6 names; called with no arguments they are intentionally
//! left unsupported (FlowQuery has no wall-clock "now" concept — every
//! value in a virtual catalog must come from a sub-query or parameter).

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::error::{Error, Result};
use crate::model::{IsoDuration, Value};

fn require_string(function: &str, args: &[Value]) -> Result<String> {
    match args.first() {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(Error::SemanticError(format!(
            "{function}() expects a string literal, got {}",
            other.type_name()
        ))),
        None => Err(Error::SemanticError(format!("{function}() requires one string argument"))),
    }
}

pub fn date(args: &[Value]) -> Result<Value> {
    let s = require_string("date", args)?;
    let d = NaiveDate::parse_from_str(&s, "%Y-%m-%d")
        .map_err(|e| Error::SemanticError(format!("invalid date literal '{s}': {e}")))?;
    Ok(Value::Date(d))
}

pub fn time(args: &[Value]) -> Result<Value> {
    let s = require_string("time", args)?;
    let t = NaiveTime::parse_from_str(&s, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(&s, "%H:%M:%S"))
        .or_else(|_| NaiveTime::parse_from_str(&s, "%H:%M"))
        .map_err(|e| Error::SemanticError(format!("invalid time literal '{s}': {e}")))?;
    Ok(Value::Time(t))
}

pub fn localtime(args: &[Value]) -> Result<Value> {
    time(args)
}

pub fn datetime(args: &[Value]) -> Result<Value> {
    let s = require_string("datetime", args)?;
    let dt = DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::SemanticError(format!("invalid datetime literal '{s}': {e}")))?;
    Ok(Value::DateTime(dt))
}

pub fn localdatetime(args: &[Value]) -> Result<Value> {
    let s = require_string("localdatetime", args)?;
    let dt = NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S"))
        .map_err(|e| Error::SemanticError(format!("invalid localdatetime literal '{s}': {e}")))?;
    Ok(Value::LocalDateTime(dt))
}

/// Parses an ISO-8601 duration: `P<years>Y<months>M<days>DT<hours>H<mins>M<secs>S`,
/// simplified to the four components FlowQuery's `IsoDuration` tracks.
pub fn duration(args: &[Value]) -> Result<Value> {
    let s = require_string("duration", args)?;
    let rest = s
        .strip_prefix('P')
        .ok_or_else(|| Error::SemanticError(format!("invalid duration literal '{s}'")))?;
    let (date_part, time_part) = match rest.split_once('T') {
        Some((d, t)) => (d, Some(t)),
        None => (rest, None),
    };

    let mut months = 0i64;
    let mut days = 0i64;
    for (n, unit) in scan_components(date_part)? {
        match unit {
            'Y' => months += n * 12,
            'M' => months += n,
            'D' => days += n,
            other => return Err(Error::SemanticError(format!("unrecognized duration unit '{other}'"))),
        }
    }

    let mut seconds = 0i64;
    if let Some(time_part) = time_part {
        for (n, unit) in scan_components(time_part)? {
            match unit {
                'H' => seconds += n * 3600,
                'M' => seconds += n * 60,
                'S' => seconds += n,
                other => return Err(Error::SemanticError(format!("unrecognized duration unit '{other}'"))),
            }
        }
    }

    Ok(Value::Duration(IsoDuration {
        months,
        days,
        seconds,
        nanoseconds: 0,
    }))
}

/// Scans a `P`/`T`-segment's `<number><unit>` runs into `(count, unit)` pairs.
fn scan_components(segment: &str) -> Result<Vec<(i64, char)>> {
    let mut out = Vec::new();
    let mut number = String::new();
    for ch in segment.chars() {
        if ch.is_ascii_digit() {
            number.push(ch);
            continue;
        }
        let n: i64 = number
            .parse()
            .map_err(|_| Error::SemanticError(format!("invalid duration component near '{ch}'")))?;
        number.clear();
        out.push((n, ch));
    }
    Ok(out)
}
