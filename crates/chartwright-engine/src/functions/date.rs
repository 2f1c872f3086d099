//! Date and duration functions
//!
//! Times travel through templates as strings in Go's `Time.String()` form
//! (`2006-01-02 15:04:05.999999999 -0700 MST`). Inputs may also be RFC 3339,
//! a plain date, or Unix seconds. Layouts use Go's reference-time notation.
//! Named zones other than `UTC` and `Local` resolve to UTC.

use chrono::format::{Parsed, StrftimeItems, parse};
use chrono::{
    DateTime, Datelike, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, Offset,
    TimeZone, Timelike, Utc,
};
use once_cell::sync::Lazy;
use regex::Regex;

use super::{FuncError, FuncResult, Registry, arg_str};
use crate::value::Value;

const TIME_STRING_LAYOUT: &str = "2006-01-02 15:04:05.999999999 -0700 MST";
const NANOS_PER_SECOND: i64 = 1_000_000_000;

pub(super) fn register(r: &mut Registry) {
    r.fixed("now", 0, |_| Ok(Time::now().to_string().into()));
    r.fixed("date", 2, |a| Ok(format_in_zone(arg_str(a, 0)?, &a[1], "Local").into()));
    r.fixed("dateInZone", 3, date_in_zone);
    r.fixed("date_in_zone", 3, date_in_zone);
    r.fixed("htmlDate", 1, |a| Ok(format_in_zone("2006-01-02", &a[0], "Local").into()));
    r.fixed("htmlDateInZone", 2, |a| {
        Ok(format_in_zone("2006-01-02", &a[0], arg_str(a, 1)?).into())
    });
    r.fixed("toDate", 2, |a| {
        let time = to_date(arg_str(a, 0)?, arg_str(a, 1)?).unwrap_or_else(|_| Time::zero());
        Ok(time.to_string().into())
    });
    r.fixed("mustToDate", 2, |a| {
        Ok(to_date(arg_str(a, 0)?, arg_str(a, 1)?)?.to_string().into())
    });
    r.fixed("unixEpoch", 1, |a| Ok(time_arg(&a[0]).dt.timestamp().to_string().into()));
    r.fixed("dateModify", 2, date_modify);
    r.fixed("date_modify", 2, date_modify);
    r.fixed("mustDateModify", 2, must_date_modify);
    r.fixed("must_date_modify", 2, must_date_modify);
    r.fixed("ago", 1, |a| {
        let elapsed = Utc::now().fixed_offset() - time_arg(&a[0]).dt;
        let nanos = elapsed.num_nanoseconds().unwrap_or(i64::MAX);
        Ok(go_duration(round_to_second(nanos)).into())
    });
    r.fixed("duration", 1, |a| {
        let seconds = match &a[0] {
            Value::String(s) => s.parse::<i64>().unwrap_or(0),
            Value::Int(i) => *i,
            _ => 0,
        };
        Ok(go_duration(seconds.saturating_mul(NANOS_PER_SECOND)).into())
    });
    r.fixed("durationRound", 1, |a| Ok(duration_round(&a[0]).into()));
}

fn date_in_zone(a: &[Value]) -> FuncResult {
    Ok(format_in_zone(arg_str(a, 0)?, &a[1], arg_str(a, 2)?).into())
}

/// Shift a time by a Go duration, leaving it unchanged on a bad duration
fn date_modify(a: &[Value]) -> FuncResult {
    let time = time_arg(&a[1]);
    let modified = modify(&time, arg_str(a, 0)?).unwrap_or_else(|_| time.clone());
    Ok(modified.to_string().into())
}

fn must_date_modify(a: &[Value]) -> FuncResult {
    Ok(modify(&time_arg(&a[1]), arg_str(a, 0)?)?.to_string().into())
}

/// A point in time with the zone name it is displayed with
#[derive(Debug, Clone)]
pub(crate) struct Time {
    dt: DateTime<FixedOffset>,
    zone: String,
}

impl Time {
    fn now() -> Self {
        Time::utc(Utc::now())
    }

    fn utc(dt: DateTime<Utc>) -> Self {
        Time {
            dt: dt.fixed_offset(),
            zone: "UTC".to_string(),
        }
    }

    /// Go's zero `time.Time`
    fn zero() -> Self {
        let dt = NaiveDate::from_ymd_opt(1, 1, 1)
            .unwrap_or(NaiveDate::MIN)
            .and_time(NaiveTime::MIN)
            .and_utc();
        Time::utc(dt)
    }

    fn in_zone(&self, zone: &str) -> Time {
        match zone {
            "Local" => {
                let dt = self.dt.with_timezone(&Local).fixed_offset();
                let zone = if dt.offset().local_minus_utc() == 0 { "UTC" } else { "" };
                Time {
                    dt,
                    zone: zone.to_string(),
                }
            }
            _ => Time::utc(self.dt.with_timezone(&Utc)),
        }
    }

    /// Parse the textual forms a time can take inside a template
    fn parse(text: &str) -> Option<Time> {
        let text = text.trim();
        if let Some(caps) = GO_TIME_STRING.captures(text) {
            let naive = NaiveDateTime::parse_from_str(&caps[1], "%Y-%m-%d %H:%M:%S%.f").ok()?;
            let offset = parse_offset(&caps[2])?;
            let dt = offset.from_local_datetime(&naive).single()?;
            let zone = caps.get(3).map_or("", |m| m.as_str()).to_string();
            return Some(Time { dt, zone });
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            let zone = if dt.offset().local_minus_utc() == 0 { "UTC" } else { "" };
            return Some(Time {
                dt,
                zone: zone.to_string(),
            });
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
            return Some(Time::utc(naive.and_utc()));
        }
        NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()
            .map(|date| Time::utc(date.and_time(NaiveTime::MIN).and_utc()))
    }
}

/// Go's `Time.String()`
impl std::fmt::Display for Time {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format_go(self, TIME_STRING_LAYOUT))
    }
}

static GO_TIME_STRING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}(?:\.\d+)?) ([+-]\d{4})(?: ([A-Za-z][A-Za-z0-9+\-]*))?(?: m=[+-][0-9.]+)?$",
    )
    .expect("valid regex")
});

fn parse_offset(text: &str) -> Option<FixedOffset> {
    let sign = if text.starts_with('-') { -1 } else { 1 };
    let digits = &text[1..];
    let hours: i32 = digits.get(0..2)?.parse().ok()?;
    let minutes: i32 = digits.get(2..4)?.parse().ok()?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Times from values; anything unreadable means now
fn time_arg(value: &Value) -> Time {
    let parsed = match value {
        Value::Int(secs) => Utc.timestamp_opt(*secs, 0).single().map(Time::utc),
        Value::Float(secs) => {
            let whole = secs.trunc() as i64;
            let nanos = (secs.fract() * 1e9) as u32;
            Utc.timestamp_opt(whole, nanos).single().map(Time::utc)
        }
        Value::String(s) => Time::parse(s),
        _ => None,
    };
    parsed.unwrap_or_else(Time::now)
}

fn format_in_zone(layout: &str, value: &Value, zone: &str) -> String {
    format_go(&time_arg(value).in_zone(zone), layout)
}

fn modify(time: &Time, modifier: &str) -> Result<Time, FuncError> {
    let nanos = parse_duration(modifier)?;
    let dt = time
        .dt
        .checked_add_signed(chrono::Duration::nanoseconds(nanos))
        .ok_or_else(|| FuncError::new(format!("time out of range after adding {}", modifier)))?;
    Ok(Time {
        dt,
        zone: time.zone.clone(),
    })
}

fn round_to_second(nanos: i64) -> i64 {
    let rem = nanos % NANOS_PER_SECOND;
    let base = nanos - rem;
    if rem.abs() * 2 >= NANOS_PER_SECOND {
        base + rem.signum() * NANOS_PER_SECOND
    } else {
        base
    }
}

fn duration_round(value: &Value) -> String {
    let nanos = match value {
        Value::String(s) => match parse_duration(s) {
            Ok(nanos) => nanos,
            Err(_) => match Time::parse(s) {
                Some(time) => (Utc::now().fixed_offset() - time.dt)
                    .num_nanoseconds()
                    .unwrap_or(i64::MAX),
                None => 0,
            },
        },
        Value::Int(nanos) => *nanos,
        _ => 0,
    };
    let u = nanos.unsigned_abs();
    const SECOND: u64 = 1_000_000_000;
    const MINUTE: u64 = 60 * SECOND;
    const HOUR: u64 = 60 * MINUTE;
    const DAY: u64 = 24 * HOUR;
    const MONTH: u64 = 30 * DAY;
    const YEAR: u64 = 365 * DAY;
    let (unit, suffix) = match u {
        u if u > YEAR => (YEAR, "y"),
        u if u > MONTH => (MONTH, "mo"),
        u if u > DAY => (DAY, "d"),
        u if u > HOUR => (HOUR, "h"),
        u if u > MINUTE => (MINUTE, "m"),
        u if u > SECOND => (SECOND, "s"),
        _ => return "0s".to_string(),
    };
    format!("{}{}", u / unit, suffix)
}

/// Go's `Duration.String()`
pub(crate) fn go_duration(nanos: i64) -> String {
    if nanos == 0 {
        return "0s".to_string();
    }
    let sign = if nanos < 0 { "-" } else { "" };
    let u = nanos.unsigned_abs();
    let second = NANOS_PER_SECOND as u64;
    if u < second {
        let (div, unit) = match u {
            u if u < 1_000 => (1, "ns"),
            u if u < 1_000_000 => (1_000, "µs"),
            _ => (1_000_000, "ms"),
        };
        return format!("{}{}{}", sign, fraction(u, div), unit);
    }
    let hours = u / (3600 * second);
    let minutes = (u / (60 * second)) % 60;
    let seconds = u % (60 * second);
    let mut out = sign.to_string();
    if hours > 0 {
        out.push_str(&format!("{}h", hours));
    }
    if hours > 0 || minutes > 0 {
        out.push_str(&format!("{}m", minutes));
    }
    out.push_str(&fraction(seconds, second));
    out.push('s');
    out
}

/// `value / div` with the remainder as trimmed decimals
fn fraction(value: u64, div: u64) -> String {
    let whole = value / div;
    let rem = value % div;
    if rem == 0 {
        return whole.to_string();
    }
    let width = div.ilog10() as usize;
    let digits = format!("{:0width$}", rem, width = width);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}

/// Go's `time.ParseDuration`, in nanoseconds
pub(crate) fn parse_duration(text: &str) -> Result<i64, FuncError> {
    let invalid = || FuncError::new(format!("time: invalid duration \"{}\"", text));
    let (negative, mut rest) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    if rest == "0" {
        return Ok(0);
    }
    if rest.is_empty() {
        return Err(invalid());
    }
    let mut total: f64 = 0.0;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let number = &rest[..number_len];
        if number.is_empty() || number == "." {
            return Err(invalid());
        }
        let amount: f64 = number.parse().map_err(|_| invalid())?;
        rest = &rest[number_len..];
        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];
        let scale = match unit {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            "" => {
                return Err(FuncError::new(format!(
                    "time: missing unit in duration \"{}\"",
                    text
                )));
            }
            other => {
                return Err(FuncError::new(format!(
                    "time: unknown unit \"{}\" in duration \"{}\"",
                    other, text
                )));
            }
        };
        total += amount * scale;
    }
    if total > i64::MAX as f64 {
        return Err(invalid());
    }
    let nanos = total.round() as i64;
    Ok(if negative { -nanos } else { nanos })
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Chunk {
    Literal(String),
    LongYear,
    Year,
    LongMonth,
    Month,
    ZeroMonth,
    NumMonth,
    LongWeekday,
    Weekday,
    ZeroDay,
    Day,
    UnderDay,
    ZeroYearDay,
    Hour,
    ZeroHour12,
    Hour12,
    ZeroMinute,
    Minute,
    ZeroSecond,
    Second,
    Pm,
    LowerPm,
    ZoneName,
    Offset,
    OffsetColon,
    OffsetShort,
    IsoOffset,
    IsoOffsetColon,
    IsoOffsetShort,
    Fraction { separator: char, digits: usize, trim: bool },
}

/// Split a Go layout into reference components and literal text
fn tokenize(layout: &str) -> Vec<Chunk> {
    const TOKENS: &[(&str, Chunk)] = &[
        ("January", Chunk::LongMonth),
        ("Jan", Chunk::Month),
        ("Monday", Chunk::LongWeekday),
        ("Mon", Chunk::Weekday),
        ("MST", Chunk::ZoneName),
        ("2006", Chunk::LongYear),
        ("002", Chunk::ZeroYearDay),
        ("01", Chunk::ZeroMonth),
        ("02", Chunk::ZeroDay),
        ("03", Chunk::ZeroHour12),
        ("04", Chunk::ZeroMinute),
        ("05", Chunk::ZeroSecond),
        ("06", Chunk::Year),
        ("15", Chunk::Hour),
        ("1", Chunk::NumMonth),
        ("2", Chunk::Day),
        ("_2", Chunk::UnderDay),
        ("3", Chunk::Hour12),
        ("4", Chunk::Minute),
        ("5", Chunk::Second),
        ("PM", Chunk::Pm),
        ("pm", Chunk::LowerPm),
        ("-07:00", Chunk::OffsetColon),
        ("-0700", Chunk::Offset),
        ("-07", Chunk::OffsetShort),
        ("Z07:00", Chunk::IsoOffsetColon),
        ("Z0700", Chunk::IsoOffset),
        ("Z07", Chunk::IsoOffsetShort),
    ];

    let mut chunks = Vec::new();
    let mut literal = String::new();
    let mut rest = layout;
    'scan: while let Some(c) = rest.chars().next() {
        if c == '.' || c == ',' {
            let bytes = rest.as_bytes();
            if let Some(&digit @ (b'0' | b'9')) = bytes.get(1) {
                let run = bytes[1..].iter().take_while(|&&b| b == digit).count();
                let after = bytes.get(1 + run);
                if !after.is_some_and(u8::is_ascii_digit) {
                    flush(&mut literal, &mut chunks);
                    chunks.push(Chunk::Fraction {
                        separator: c,
                        digits: run,
                        trim: digit == b'9',
                    });
                    rest = &rest[1 + run..];
                    continue;
                }
            }
        }
        if rest.starts_with("_2006") {
            literal.push('_');
            rest = &rest[1..];
            continue;
        }
        for (token, chunk) in TOKENS {
            if rest.starts_with(token) {
                flush(&mut literal, &mut chunks);
                chunks.push(chunk.clone());
                rest = &rest[token.len()..];
                continue 'scan;
            }
        }
        literal.push(c);
        rest = &rest[c.len_utf8()..];
    }
    flush(&mut literal, &mut chunks);
    chunks
}

fn flush(literal: &mut String, chunks: &mut Vec<Chunk>) {
    if !literal.is_empty() {
        chunks.push(Chunk::Literal(std::mem::take(literal)));
    }
}

fn write_offset(out: &mut String, seconds: i32, colon: bool, with_minutes: bool) {
    let sign = if seconds < 0 { '-' } else { '+' };
    let minutes = seconds.abs() / 60;
    out.push(sign);
    out.push_str(&format!("{:02}", minutes / 60));
    if with_minutes {
        if colon {
            out.push(':');
        }
        out.push_str(&format!("{:02}", minutes % 60));
    }
}

/// Format with a Go reference-time layout
fn format_go(time: &Time, layout: &str) -> String {
    let dt = &time.dt;
    let offset = dt.offset().local_minus_utc();
    let hour12 = match dt.hour() % 12 {
        0 => 12,
        h => h,
    };
    let mut out = String::new();
    for chunk in tokenize(layout) {
        match chunk {
            Chunk::Literal(text) => out.push_str(&text),
            Chunk::LongYear => out.push_str(&format!("{:04}", dt.year())),
            Chunk::Year => out.push_str(&format!("{:02}", dt.year().rem_euclid(100))),
            Chunk::LongMonth => out.push_str(&dt.format("%B").to_string()),
            Chunk::Month => out.push_str(&dt.format("%b").to_string()),
            Chunk::ZeroMonth => out.push_str(&format!("{:02}", dt.month())),
            Chunk::NumMonth => out.push_str(&dt.month().to_string()),
            Chunk::LongWeekday => out.push_str(&dt.format("%A").to_string()),
            Chunk::Weekday => out.push_str(&dt.format("%a").to_string()),
            Chunk::ZeroDay => out.push_str(&format!("{:02}", dt.day())),
            Chunk::Day => out.push_str(&dt.day().to_string()),
            Chunk::UnderDay => out.push_str(&format!("{:>2}", dt.day())),
            Chunk::ZeroYearDay => out.push_str(&format!("{:03}", dt.ordinal())),
            Chunk::Hour => out.push_str(&format!("{:02}", dt.hour())),
            Chunk::ZeroHour12 => out.push_str(&format!("{:02}", hour12)),
            Chunk::Hour12 => out.push_str(&hour12.to_string()),
            Chunk::ZeroMinute => out.push_str(&format!("{:02}", dt.minute())),
            Chunk::Minute => out.push_str(&dt.minute().to_string()),
            Chunk::ZeroSecond => out.push_str(&format!("{:02}", dt.second())),
            Chunk::Second => out.push_str(&dt.second().to_string()),
            Chunk::Pm => out.push_str(if dt.hour() >= 12 { "PM" } else { "AM" }),
            Chunk::LowerPm => out.push_str(if dt.hour() >= 12 { "pm" } else { "am" }),
            Chunk::ZoneName => {
                if time.zone.is_empty() {
                    write_offset(&mut out, offset, false, true);
                } else {
                    out.push_str(&time.zone);
                }
            }
            Chunk::Offset => write_offset(&mut out, offset, false, true),
            Chunk::OffsetColon => write_offset(&mut out, offset, true, true),
            Chunk::OffsetShort => write_offset(&mut out, offset, false, false),
            Chunk::IsoOffset | Chunk::IsoOffsetColon | Chunk::IsoOffsetShort if offset == 0 => {
                out.push('Z')
            }
            Chunk::IsoOffset => write_offset(&mut out, offset, false, true),
            Chunk::IsoOffsetColon => write_offset(&mut out, offset, true, true),
            Chunk::IsoOffsetShort => write_offset(&mut out, offset, false, false),
            Chunk::Fraction {
                separator,
                digits,
                trim,
            } => {
                let nanos = format!("{:09}", dt.nanosecond().min(999_999_999));
                let mut part = nanos[..digits.min(9)].to_string();
                if trim {
                    part = part.trim_end_matches('0').to_string();
                    if part.is_empty() {
                        continue;
                    }
                }
                out.push(separator);
                out.push_str(&part);
            }
        }
    }
    out
}

/// Go's `time.ParseInLocation(layout, value, time.Local)`
fn to_date(layout: &str, value: &str) -> Result<Time, FuncError> {
    let failed = || {
        FuncError::new(format!(
            "parsing time \"{}\" as \"{}\": cannot parse",
            value, layout
        ))
    };
    let chunks = tokenize(layout);
    let iso_offset = chunks.iter().any(|c| {
        matches!(
            c,
            Chunk::IsoOffset | Chunk::IsoOffsetColon | Chunk::IsoOffsetShort
        )
    });
    let mut input = value.to_string();
    if iso_offset && input.ends_with('Z') {
        input.pop();
        input.push_str("+00:00");
    }

    let mut format = String::new();
    for chunk in &chunks {
        let item = match chunk {
            Chunk::Literal(text) => {
                format.push_str(&text.replace('%', "%%"));
                continue;
            }
            Chunk::LongYear => "%Y",
            Chunk::Year => "%y",
            Chunk::LongMonth => "%B",
            Chunk::Month => "%b",
            Chunk::ZeroMonth | Chunk::NumMonth => "%m",
            Chunk::LongWeekday => "%A",
            Chunk::Weekday => "%a",
            Chunk::ZeroDay | Chunk::Day => "%d",
            Chunk::UnderDay => "%e",
            Chunk::ZeroYearDay => "%j",
            Chunk::Hour => "%H",
            Chunk::ZeroHour12 | Chunk::Hour12 => "%I",
            Chunk::ZeroMinute | Chunk::Minute => "%M",
            Chunk::ZeroSecond | Chunk::Second => "%S",
            Chunk::Pm | Chunk::LowerPm => "%p",
            Chunk::ZoneName => "%Z",
            Chunk::Offset | Chunk::IsoOffset => "%z",
            Chunk::OffsetColon | Chunk::IsoOffsetColon | Chunk::IsoOffsetShort => "%:z",
            Chunk::OffsetShort => "%#z",
            Chunk::Fraction { .. } => "%.f",
        };
        format.push_str(item);
    }

    let mut parsed = Parsed::new();
    parse(&mut parsed, &input, StrftimeItems::new(&format)).map_err(|_| failed())?;
    let date = parsed
        .to_naive_date()
        .ok()
        .or_else(|| NaiveDate::from_ymd_opt(0, 1, 1))
        .ok_or_else(failed)?;
    let time = parsed.to_naive_time().unwrap_or(NaiveTime::MIN);
    let naive = date.and_time(time);
    let dt = match parsed.to_fixed_offset() {
        Ok(offset) => offset.from_local_datetime(&naive).single(),
        Err(_) => Local
            .from_local_datetime(&naive)
            .single()
            .map(|dt| dt.with_timezone(&dt.offset().fix())),
    }
    .ok_or_else(failed)?;
    let zone = if dt.offset().local_minus_utc() == 0 { "UTC" } else { "" };
    Ok(Time {
        dt,
        zone: zone.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Time {
        Time::parse("2017-03-05 07:04:05.12 +0000 UTC").unwrap()
    }

    #[test]
    fn test_go_time_string() {
        assert_eq!(sample().to_string(), "2017-03-05 07:04:05.12 +0000 UTC");
        assert_eq!(Time::zero().to_string(), "0001-01-01 00:00:00 +0000 UTC");
        let offset = Time::parse("2020-01-02T03:04:05+02:00").unwrap();
        assert_eq!(offset.to_string(), "2020-01-02 03:04:05 +0200 +0200");
    }

    #[test]
    fn test_format_layouts() {
        let t = sample();
        assert_eq!(format_go(&t, "2006-01-02"), "2017-03-05");
        assert_eq!(format_go(&t, "Jan _2 15:04:05.000 MST"), "Mar  5 07:04:05.120 UTC");
        assert_eq!(format_go(&t, "Monday, 3:04PM"), "Sunday, 7:04AM");
        assert_eq!(format_go(&t, "2006-01-02T15:04:05Z07:00"), "2017-03-05T07:04:05Z");
        assert_eq!(format_go(&t, "002 06"), "064 17");
    }

    #[test]
    fn test_unix_input_and_zone() {
        let epoch = format_in_zone("2006-01-02 15:04", &Value::Int(0), "UTC");
        assert_eq!(epoch, "1970-01-01 00:00");
        assert_eq!(format_in_zone("2006", &Value::Int(0), "Mars/Olympus"), "1970");
        let parsed = time_arg(&Value::from("2017-03-05 07:04:05 +0000 UTC"));
        assert_eq!(parsed.dt.timestamp(), 1488697445);
    }

    #[test]
    fn test_to_date() {
        let t = to_date("2006-01-02", "2017-12-31").unwrap();
        assert!(t.to_string().starts_with("2017-12-31 00:00:00"));
        let t = to_date("2006-01-02T15:04:05Z07:00", "2020-06-01T10:00:00Z").unwrap();
        assert_eq!(t.to_string(), "2020-06-01 10:00:00 +0000 UTC");
        assert!(to_date("2006-01-02", "not a date").is_err());
    }

    #[test]
    fn test_durations() {
        assert_eq!(go_duration(3725 * NANOS_PER_SECOND), "1h2m5s");
        assert_eq!(go_duration(90 * NANOS_PER_SECOND), "1m30s");
        assert_eq!(go_duration(1_500_000_000), "1.5s");
        assert_eq!(go_duration(1_500_000), "1.5ms");
        assert_eq!(go_duration(3600 * NANOS_PER_SECOND), "1h0m0s");
        assert_eq!(go_duration(0), "0s");
        assert_eq!(parse_duration("1h30m").unwrap(), 5400 * NANOS_PER_SECOND);
        assert_eq!(parse_duration("-1.5h").unwrap(), -5400 * NANOS_PER_SECOND);
        assert!(parse_duration("10x").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn test_duration_round_and_modify() {
        assert_eq!(duration_round(&Value::from("2h10m")), "2h");
        assert_eq!(duration_round(&Value::from("9600h")), "1y");
        assert_eq!(duration_round(&Value::from("30s")), "30s");
        let later = modify(&sample(), "1h").unwrap();
        assert_eq!(later.to_string(), "2017-03-05 08:04:05.12 +0000 UTC");
        assert!(modify(&sample(), "soon").is_err());
    }

    #[test]
    fn test_date_modify_variants() {
        let time = Value::from("2017-03-05 07:04:05.12 +0000 UTC");
        let shifted = date_modify(&[Value::from("-1h"), time.clone()]).unwrap();
        assert_eq!(shifted.to_string(), "2017-03-05 06:04:05.12 +0000 UTC");
        let unchanged = date_modify(&[Value::from("soon"), time.clone()]).unwrap();
        assert_eq!(unchanged.to_string(), "2017-03-05 07:04:05.12 +0000 UTC");
        assert!(must_date_modify(&[Value::from("soon"), time.clone()]).is_err());
        assert!(must_date_modify(&[Value::from("3000000h"), time]).is_err());
    }
}
