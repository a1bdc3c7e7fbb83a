//! Localized date and time handling: scanning free text for date-like
//! substrings in the environment's preferred order, and rendering values
//! back out with template-style layout strings.

use chrono::{
    DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Timelike,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use super::Environment;

/// The order of date components in the environment's locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DateFormat {
    #[default]
    #[serde(rename = "YYYY-MM-DD")]
    YearMonthDay,
    #[serde(rename = "DD-MM-YYYY")]
    DayMonthYear,
    #[serde(rename = "MM-DD-YYYY")]
    MonthDayYear,
}

impl DateFormat {
    /// The layout string used when formatting without an explicit layout.
    pub fn layout(&self) -> &'static str {
        match self {
            DateFormat::YearMonthDay => "YYYY-MM-DD",
            DateFormat::DayMonthYear => "DD-MM-YYYY",
            DateFormat::MonthDayYear => "MM-DD-YYYY",
        }
    }
}

/// The time layout of the environment's locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeFormat {
    #[default]
    #[serde(rename = "tt:mm")]
    HourMinute,
    #[serde(rename = "tt:mm:ss")]
    HourMinuteSecond,
}

impl TimeFormat {
    pub fn layout(&self) -> &'static str {
        match self {
            TimeFormat::HourMinute => "tt:mm",
            TimeFormat::HourMinuteSecond => "tt:mm:ss",
        }
    }
}

/* ===================== Parsing ===================== */

fn date_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{1,4})[-.\\/_ ](\d{1,2})[-.\\/_ ](\d{1,4})").unwrap())
}

fn time_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d{1,2}):(\d{2})(?::(\d{2})(?:\.(\d{1,9}))?)?\s*(?i:(am|pm))?").unwrap()
    })
}

fn resolve_two_digit_year(year: i32) -> i32 {
    if year >= 90 {
        1900 + year
    } else {
        2000 + year
    }
}

/// Scans text for the first substring that reads as a date in the
/// environment's component order. A leading four-digit number always wins as
/// a year regardless of locale.
pub fn parse_date(env: &Environment, text: &str) -> Option<NaiveDate> {
    for caps in date_pattern().captures_iter(text) {
        let first = &caps[1];
        let a: i32 = first.parse().ok()?;
        let b: i32 = caps[2].parse().ok()?;
        let c: i32 = caps[3].parse().ok()?;

        let (year, month, day) = if first.len() == 4 {
            (a, b, c)
        } else {
            let year = if caps[3].len() == 4 { c } else { resolve_two_digit_year(c) };
            match env.date_format {
                DateFormat::YearMonthDay => {
                    // no four digit year to anchor on, fall back to day first
                    (year, b, a)
                }
                DateFormat::DayMonthYear => (year, b, a),
                DateFormat::MonthDayYear => (year, a, b),
            }
        };

        if let Some(date) = NaiveDate::from_ymd_opt(year, month as u32, day as u32) {
            return Some(date);
        }
    }
    None
}

/// Scans text for a time of day.
pub fn parse_time(text: &str) -> Option<NaiveTime> {
    let caps = time_pattern().captures(text)?;
    let mut hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps[2].parse().ok()?;
    let second: u32 = caps.get(3).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
    let nanos: u32 = match caps.get(4) {
        Some(frac) => {
            let digits = frac.as_str();
            let scaled: u32 = digits.parse().ok()?;
            scaled * 10u32.pow(9 - digits.len() as u32)
        }
        None => 0,
    };

    if let Some(meridiem) = caps.get(5) {
        let pm = meridiem.as_str().eq_ignore_ascii_case("pm");
        if hour > 12 {
            return None;
        }
        hour %= 12;
        if pm {
            hour += 12;
        }
    }

    NaiveTime::from_hms_nano_opt(hour, minute, second, nanos)
}

/// Parses a datetime out of text. ISO-8601 strings are taken whole; anything
/// else is scanned for a date (and optionally a time) in the environment's
/// locale. With `fill_time`, missing time components come from that instant
/// instead of midnight.
pub fn parse_datetime(
    env: &Environment,
    text: &str,
    fill_time: Option<DateTime<FixedOffset>>,
) -> Option<DateTime<FixedOffset>> {
    let trimmed = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt);
    }

    let date = parse_date(env, trimmed)?;
    let time = match parse_time(trimmed) {
        Some(t) => t,
        None => match fill_time {
            Some(now) => NaiveTime::from_hms_nano_opt(
                now.hour(),
                now.minute(),
                now.second(),
                now.nanosecond(),
            )?,
            None => NaiveTime::from_hms_opt(0, 0, 0)?,
        },
    };

    env.timezone
        .from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|dt| dt.fixed_offset())
}

/* ===================== Formatting ===================== */

/// Renders a datetime as ISO-8601 with microseconds, in the environment's
/// timezone.
pub fn iso_datetime(env: &Environment, dt: DateTime<FixedOffset>) -> String {
    dt.with_timezone(&env.timezone)
        .to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Translates a layout string like `DD-MM-YYYY tt:mm` into a chrono format
/// string. Sequences are matched longest first; non-letter characters pass
/// through untouched.
pub fn to_chrono_layout(layout: &str) -> Result<String, String> {
    const MAPPINGS: &[(&str, &str)] = &[
        ("YYYY", "%Y"),
        ("YY", "%y"),
        ("MM", "%m"),
        ("M", "%-m"),
        ("DD", "%d"),
        ("D", "%-d"),
        ("ffffff", "%6f"),
        ("fff", "%3f"),
        ("tt", "%H"),
        ("t", "%-H"),
        ("hh", "%I"),
        ("h", "%-I"),
        ("mm", "%M"),
        ("m", "%-M"),
        ("ss", "%S"),
        ("s", "%-S"),
        ("AA", "%p"),
        ("aa", "%P"),
        ("ZZZ", "%Z"),
        ("Z", "%:z"),
    ];

    let mut out = String::with_capacity(layout.len() * 2);
    let mut rest = layout;

    'outer: while !rest.is_empty() {
        for (seq, repl) in MAPPINGS {
            if rest.starts_with(seq) {
                out.push_str(repl);
                rest = &rest[seq.len()..];
                continue 'outer;
            }
        }
        let ch = rest.chars().next().unwrap();
        if ch.is_ascii_alphabetic() {
            return Err(format!("'{ch}' is not a valid format sequence"));
        }
        if ch == '%' {
            out.push_str("%%");
        } else {
            out.push(ch);
        }
        rest = &rest[ch.len_utf8()..];
    }
    Ok(out)
}

pub fn format_date(date: NaiveDate, layout: &str) -> Result<String, String> {
    let chrono_layout = to_chrono_layout(layout)?;
    Ok(date.format(&chrono_layout).to_string())
}

pub fn format_time(time: NaiveTime, layout: &str) -> Result<String, String> {
    let chrono_layout = to_chrono_layout(layout)?;
    Ok(time.format(&chrono_layout).to_string())
}

pub fn format_datetime(dt: DateTime<FixedOffset>, layout: &str) -> Result<String, String> {
    let chrono_layout = to_chrono_layout(layout)?;
    Ok(dt.format(&chrono_layout).to_string())
}

/// Number of days since `0000-01-01` style epoch math isn't needed; months
/// get added with day-of-month clamping.
pub fn add_months(dt: DateTime<FixedOffset>, months: i64) -> DateTime<FixedOffset> {
    let total = dt.year() as i64 * 12 + dt.month0() as i64 + months;
    let year = total.div_euclid(12) as i32;
    let month0 = total.rem_euclid(12) as u32;

    let mut day = dt.day();
    loop {
        if let Some(date) = NaiveDate::from_ymd_opt(year, month0 + 1, day) {
            let naive = date.and_time(dt.time());
            if let Some(adjusted) = dt.timezone().from_local_datetime(&naive).earliest() {
                return adjusted;
            }
        }
        day -= 1;
        if day == 0 {
            return dt;
        }
    }
}
