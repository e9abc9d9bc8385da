//! Date formats for date-typed properties.
//!
//! A property carries an ordered list of [`DateFormat`]s. The mapping joins their
//! names with `||`; the converter writes with the first and reads with each in
//! order. Named formats use the store's names. Custom formats use the store's
//! pattern syntax (`uuuu-MM-dd HH:mm`) and are translated to strftime patterns
//! once, when metadata is built.

use std::fmt::Write as _;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The in-memory representation of a temporal property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemporalKind {
    /// A zoned instant (`DateTime<Utc>`, `DateTime<FixedOffset>`).
    #[default]
    Instant,
    /// A date-time without offset (`NaiveDateTime`).
    LocalDateTime,
    /// A calendar date (`NaiveDate`).
    LocalDate,
    /// A time of day (`NaiveTime`).
    LocalTime,
    /// An `i64` holding milliseconds since the epoch.
    EpochMillis,
    /// An `i64` holding seconds since the epoch.
    EpochSecond,
}

/// A named or custom date format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)] // variants mirror the store's format names
pub enum DateFormat {
    BasicDate,
    BasicDateTime,
    BasicDateTimeNoMillis,
    BasicOrdinalDate,
    BasicTime,
    BasicTimeNoMillis,
    Date,
    DateHourMinute,
    DateHourMinuteSecond,
    DateHourMinuteSecondMillis,
    DateOptionalTime,
    DateTime,
    DateTimeNoMillis,
    EpochMillis,
    EpochSecond,
    HourMinute,
    HourMinuteSecond,
    HourMinuteSecondMillis,
    OrdinalDate,
    StrictDateOptionalTime,
    Year,
    YearMonth,
    YearMonthDay,
    /// A custom pattern in the store's syntax.
    Custom(String),
}

impl DateFormat {
    /// The default format list used when a date property declares none.
    pub fn defaults() -> Vec<DateFormat> {
        vec![DateFormat::DateOptionalTime, DateFormat::EpochMillis]
    }

    /// The name used in the mapping's `format` parameter.
    pub fn name(&self) -> &str {
        match self {
            DateFormat::BasicDate => "basic_date",
            DateFormat::BasicDateTime => "basic_date_time",
            DateFormat::BasicDateTimeNoMillis => "basic_date_time_no_millis",
            DateFormat::BasicOrdinalDate => "basic_ordinal_date",
            DateFormat::BasicTime => "basic_time",
            DateFormat::BasicTimeNoMillis => "basic_time_no_millis",
            DateFormat::Date => "date",
            DateFormat::DateHourMinute => "date_hour_minute",
            DateFormat::DateHourMinuteSecond => "date_hour_minute_second",
            DateFormat::DateHourMinuteSecondMillis => "date_hour_minute_second_millis",
            DateFormat::DateOptionalTime => "date_optional_time",
            DateFormat::DateTime => "date_time",
            DateFormat::DateTimeNoMillis => "date_time_no_millis",
            DateFormat::EpochMillis => "epoch_millis",
            DateFormat::EpochSecond => "epoch_second",
            DateFormat::HourMinute => "hour_minute",
            DateFormat::HourMinuteSecond => "hour_minute_second",
            DateFormat::HourMinuteSecondMillis => "hour_minute_second_millis",
            DateFormat::OrdinalDate => "ordinal_date",
            DateFormat::StrictDateOptionalTime => "strict_date_optional_time",
            DateFormat::Year => "year",
            DateFormat::YearMonth => "year_month",
            DateFormat::YearMonthDay => "year_month_day",
            DateFormat::Custom(pattern) => pattern,
        }
    }

    /// Joins a format list into the mapping's `format` string.
    pub fn mapping_format(formats: &[DateFormat]) -> String {
        if formats.is_empty() {
            return Self::mapping_format(&Self::defaults());
        }
        formats.iter().map(DateFormat::name).collect::<Vec<_>>().join("||")
    }

    /// Compiles the format into a pattern usable for formatting and parsing.
    pub fn compile(&self) -> Result<DatePattern, String> {
        let strftime = match self {
            DateFormat::EpochMillis => return Ok(DatePattern::EpochMillis),
            DateFormat::EpochSecond => return Ok(DatePattern::EpochSecond),
            DateFormat::DateOptionalTime | DateFormat::StrictDateOptionalTime => {
                return Ok(DatePattern::OptionalTime);
            }
            DateFormat::BasicDate => "%Y%m%d".to_string(),
            DateFormat::BasicDateTime => "%Y%m%dT%H%M%S%.3f%z".to_string(),
            DateFormat::BasicDateTimeNoMillis => "%Y%m%dT%H%M%S%z".to_string(),
            DateFormat::BasicOrdinalDate => "%Y%j".to_string(),
            DateFormat::BasicTime => "%H%M%S%.3f%z".to_string(),
            DateFormat::BasicTimeNoMillis => "%H%M%S%z".to_string(),
            DateFormat::Date | DateFormat::YearMonthDay => "%Y-%m-%d".to_string(),
            DateFormat::DateHourMinute => "%Y-%m-%dT%H:%M".to_string(),
            DateFormat::DateHourMinuteSecond => "%Y-%m-%dT%H:%M:%S".to_string(),
            DateFormat::DateHourMinuteSecondMillis => "%Y-%m-%dT%H:%M:%S%.3f".to_string(),
            DateFormat::DateTime => "%Y-%m-%dT%H:%M:%S%.3f%:z".to_string(),
            DateFormat::DateTimeNoMillis => "%Y-%m-%dT%H:%M:%S%:z".to_string(),
            DateFormat::HourMinute => "%H:%M".to_string(),
            DateFormat::HourMinuteSecond => "%H:%M:%S".to_string(),
            DateFormat::HourMinuteSecondMillis => "%H:%M:%S%.3f".to_string(),
            DateFormat::OrdinalDate => "%Y-%j".to_string(),
            DateFormat::Year => "%Y".to_string(),
            DateFormat::YearMonth => "%Y-%m".to_string(),
            DateFormat::Custom(pattern) => translate_pattern(pattern)?,
        };
        DatePattern::strftime(strftime)
    }
}

/// A compiled date format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatePattern {
    /// Milliseconds since the epoch, written as a number.
    EpochMillis,
    /// Seconds since the epoch, written as a number.
    EpochSecond,
    /// ISO-8601 date with optional time and offset.
    OptionalTime,
    /// A strftime pattern.
    Strftime(StrftimePattern),
}

/// A validated strftime pattern and the components it contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrftimePattern {
    pattern: String,
    has_year: bool,
    has_month: bool,
    has_day: bool,
    has_time: bool,
    has_offset: bool,
}

impl DatePattern {
    fn strftime(pattern: String) -> Result<DatePattern, String> {
        if StrftimeItems::new(&pattern).any(|item| matches!(item, Item::Error)) {
            return Err(format!("invalid date pattern '{}'", pattern));
        }
        let has = |spec: &str| pattern.contains(spec);
        Ok(DatePattern::Strftime(StrftimePattern {
            has_year: has("%Y") || has("%y"),
            has_month: has("%m") || has("%b") || has("%B"),
            has_day: has("%d") || has("%j"),
            has_time: has("%H") || has("%I"),
            has_offset: has("%z") || has("%:z"),
            pattern,
        }))
    }

    /// Formats an instant. Local kinds format without zone information.
    pub fn format(&self, value: &DateTime<FixedOffset>, kind: TemporalKind) -> Result<Value, String> {
        match self {
            DatePattern::EpochMillis => Ok(Value::from(value.timestamp_millis())),
            DatePattern::EpochSecond => Ok(Value::from(value.timestamp())),
            DatePattern::OptionalTime => Ok(Value::String(match kind {
                TemporalKind::LocalDate => value.format("%Y-%m-%d").to_string(),
                TemporalKind::LocalDateTime => value.naive_local().format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
                _ => value.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            })),
            DatePattern::Strftime(p) => {
                let mut out = String::new();
                write!(out, "{}", value.format(&p.pattern))
                    .map_err(|_| format!("cannot format with pattern '{}'", p.pattern))?;
                Ok(Value::String(out))
            }
        }
    }

    /// Parses a stored value, returning `None` if this pattern does not match.
    pub fn parse(&self, value: &Value) -> Option<DateTime<FixedOffset>> {
        match self {
            DatePattern::EpochMillis => epoch_number(value)
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
                .map(|dt| dt.fixed_offset()),
            DatePattern::EpochSecond => epoch_number(value)
                .and_then(|s| Utc.timestamp_opt(s, 0).single())
                .map(|dt| dt.fixed_offset()),
            DatePattern::OptionalTime => parse_optional_time(value.as_str()?),
            DatePattern::Strftime(p) => p.parse(value.as_str()?),
        }
    }
}

impl StrftimePattern {
    fn parse(&self, input: &str) -> Option<DateTime<FixedOffset>> {
        let mut input = input.to_string();
        let mut pattern = self.pattern.clone();

        // Pad partial dates so chrono has a full calendar date to work with.
        if !self.has_year && (self.has_month || self.has_day) {
            return None;
        }
        if !self.has_year {
            input = format!("1970-01-01T{}", input);
            pattern = format!("%Y-%m-%dT{}", pattern);
        } else if !self.has_day {
            if self.has_month {
                input.push_str("|01");
                pattern.push_str("|%d");
            } else {
                input.push_str("|01|01");
                pattern.push_str("|%m|%d");
            }
        }

        if self.has_offset {
            if !self.has_time {
                return None;
            }
            return DateTime::parse_from_str(&input, &pattern).ok();
        }
        if self.has_time || !self.has_year {
            return NaiveDateTime::parse_from_str(&input, &pattern)
                .ok()
                .map(|dt| dt.and_utc().fixed_offset());
        }
        NaiveDate::parse_from_str(&input, &pattern)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc().fixed_offset())
    }
}

fn epoch_number(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn parse_optional_time(input: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt);
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(input, pattern) {
            return Some(dt.and_utc().fixed_offset());
        }
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().fixed_offset())
}

/// Translates a pattern in the store's syntax (`yyyy-MM-dd'T'HH:mm`) to strftime.
pub fn translate_pattern(pattern: &str) -> Result<String, String> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '\'' {
            // '' is an escaped quote, otherwise a quoted literal runs to the next quote
            if chars.get(i + 1) == Some(&'\'') {
                out.push('\'');
                i += 2;
                continue;
            }
            let end = chars[i + 1..]
                .iter()
                .position(|&ch| ch == '\'')
                .ok_or_else(|| format!("unterminated literal in '{}'", pattern))?;
            for &ch in &chars[i + 1..i + 1 + end] {
                push_literal(&mut out, ch);
            }
            i += end + 2;
            continue;
        }

        if !c.is_ascii_alphabetic() {
            push_literal(&mut out, c);
            i += 1;
            continue;
        }

        let run = chars[i..].iter().take_while(|&&ch| ch == c).count();
        let spec = match (c, run) {
            ('y' | 'u', 2) => "%y",
            ('y' | 'u', _) => "%Y",
            ('M', 1 | 2) => "%m",
            ('M', 3) => "%b",
            ('M', _) => "%B",
            ('d', 1 | 2) => "%d",
            ('D', _) => "%j",
            ('H', 1 | 2) => "%H",
            ('h', 1 | 2) => "%I",
            ('m', 1 | 2) => "%M",
            ('s', 1 | 2) => "%S",
            ('S', 3) => "%3f",
            ('S', 6) => "%6f",
            ('S', 9) => "%9f",
            ('a', 1) => "%p",
            ('E', 1..=3) => "%a",
            ('E', _) => "%A",
            ('Z', 1..=4) | ('X' | 'x', 1 | 2) => "%z",
            ('Z', _) | ('X' | 'x', _) => "%:z",
            _ => {
                return Err(format!(
                    "unsupported pattern letter '{}' (x{}) in '{}'",
                    c, run, pattern
                ));
            }
        };
        out.push_str(spec);
        i += run;
    }

    Ok(out)
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn instant(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    #[test]
    fn test_mapping_format() {
        assert_eq!(
            DateFormat::mapping_format(&[DateFormat::BasicDate, DateFormat::BasicTime]),
            "basic_date||basic_time"
        );
        assert_eq!(DateFormat::mapping_format(&[]), "date_optional_time||epoch_millis");
        assert_eq!(
            DateFormat::mapping_format(&[DateFormat::Custom("uuuu-MM-dd".into())]),
            "uuuu-MM-dd"
        );
    }

    #[test]
    fn test_translate_pattern() {
        assert_eq!(translate_pattern("uuuu-MM-dd HH:mm").unwrap(), "%Y-%m-%d %H:%M");
        assert_eq!(
            translate_pattern("yyyy-MM-dd'T'HH:mm:ss.SSSXXX").unwrap(),
            "%Y-%m-%dT%H:%M:%S.%3f%:z"
        );
        assert_eq!(translate_pattern("dd.MM.yy '100%'").unwrap(), "%d.%m.%y 100%%");
        assert!(translate_pattern("yyyy-QQ").is_err());
        assert!(translate_pattern("yyyy 'open").is_err());
    }

    #[test]
    fn test_epoch_millis() {
        let pattern = DateFormat::EpochMillis.compile().unwrap();
        let dt = instant("2024-01-05T10:00:00Z");
        let written = pattern.format(&dt, TemporalKind::Instant).unwrap();
        assert_eq!(written, json!(1_704_448_800_000_i64));
        assert_eq!(pattern.parse(&written), Some(dt));
        assert_eq!(pattern.parse(&json!("1704448800000")), Some(dt));
    }

    #[test]
    fn test_basic_date_round_trip() {
        let pattern = DateFormat::BasicDate.compile().unwrap();
        let dt = instant("2024-03-09T00:00:00Z");
        let written = pattern.format(&dt, TemporalKind::LocalDate).unwrap();
        assert_eq!(written, json!("20240309"));
        assert_eq!(pattern.parse(&written), Some(dt));
    }

    #[test]
    fn test_time_only_pattern() {
        let pattern = DateFormat::HourMinuteSecond.compile().unwrap();
        let parsed = pattern.parse(&json!("13:45:10")).unwrap();
        assert_eq!(parsed, instant("1970-01-01T13:45:10Z"));
        assert!(pattern.parse(&json!("2024-01-01")).is_none());
    }

    #[test]
    fn test_year_month_pattern() {
        let pattern = DateFormat::YearMonth.compile().unwrap();
        assert_eq!(pattern.parse(&json!("2023-07")), Some(instant("2023-07-01T00:00:00Z")));
    }

    #[test]
    fn test_optional_time_variants() {
        let pattern = DateFormat::DateOptionalTime.compile().unwrap();
        assert_eq!(pattern.parse(&json!("2024-01-05")), Some(instant("2024-01-05T00:00:00Z")));
        assert_eq!(
            pattern.parse(&json!("2024-01-05T10:30:00")),
            Some(instant("2024-01-05T10:30:00Z"))
        );
        assert_eq!(
            pattern.parse(&json!("2024-01-05T10:30:00+02:00")),
            Some(instant("2024-01-05T10:30:00+02:00"))
        );
        assert!(pattern.parse(&json!(12345)).is_none());

        let dt = instant("2024-01-05T10:30:00Z");
        assert_eq!(
            pattern.format(&dt, TemporalKind::Instant).unwrap(),
            json!("2024-01-05T10:30:00Z")
        );
        assert_eq!(
            pattern.format(&dt, TemporalKind::LocalDate).unwrap(),
            json!("2024-01-05")
        );
    }

    #[test]
    fn test_custom_pattern_with_offset() {
        let pattern = DateFormat::Custom("uuuu-MM-dd HH:mm Z".into()).compile().unwrap();
        let dt = instant("2024-01-05T10:30:00+01:00");
        let written = pattern.format(&dt, TemporalKind::Instant).unwrap();
        assert_eq!(written, json!("2024-01-05 10:30 +0100"));
        assert_eq!(pattern.parse(&written), Some(dt));
    }
}
