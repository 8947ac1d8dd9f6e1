//! Date phrases, checked before the arithmetic pipeline: intervals
//! (`between A and B`), keywords, `next <weekday>`, `workdays(N) from X`
//! and ISO literals, each with optional `+ 3d` / `- 1w` offsets.

use chrono::{DateTime, Datelike, Days, Local, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::EvalError;
use crate::format::format_number;
use crate::types::{BetweenMeta, CalculationResult, ResultConversion, ResultType};

const MS_PER_DAY: f64 = 86_400_000.0;

static BETWEEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bbetween\s+(.+?)\s+and\s+(.+)").unwrap());
static WORKDAYS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bworkdays?\s*\(\s*(-?\d+)\s*\)\s+from\s+(today|tomorrow|yesterday|\d{4}-\d{2}-\d{2})\b")
        .unwrap()
});
static NEXT_WEEKDAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bnext\s+(sun|mon|tue|wed|thu|fri|sat)(?:day|sday|nesday|rsday|urday)?\b").unwrap()
});
static KEYWORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(now|today|tomorrow|yesterday)\b").unwrap());
static ISO_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{4}-\d{2}-\d{2})\b").unwrap());
static OFFSET: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)([+-])\s*(\d+)\s*([dwmy])\b").unwrap());
static DAY_FIRST: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,2})[/-](\d{1,2})[/-](\d{4})$").unwrap());

/// `|b - a|` between two loosely parsed dates.
#[derive(Debug, Clone, PartialEq)]
pub struct BetweenSpan {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub ms: i64,
}

impl BetweenSpan {
    pub fn summary(&self) -> String {
        let days = self.ms as f64 / MS_PER_DAY;
        format!("{} days ({:.1} weeks)", days.round(), days / 7.0)
    }
}

pub fn is_between_expression(s: &str) -> bool {
    BETWEEN.is_match(s)
}

/// ISO date or datetime, `DD/MM/YYYY`, or a day keyword. Dates without a
/// time are taken as midnight UTC so that intervals count whole days.
pub fn parse_loose_date(token: &str, now: DateTime<Local>) -> Option<DateTime<Utc>> {
    let t = token.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(t, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    let date = match NaiveDate::parse_from_str(t, "%Y-%m-%d") {
        Ok(d) => d,
        Err(_) => match DAY_FIRST.captures(t) {
            Some(caps) => NaiveDate::from_ymd_opt(caps[3].parse().ok()?, caps[2].parse().ok()?, caps[1].parse().ok()?)?,
            None => keyword_date(t, now)?,
        },
    };
    Some(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)))
}

fn keyword_date(token: &str, now: DateTime<Local>) -> Option<NaiveDate> {
    let today = now.date_naive();
    match token.to_lowercase().as_str() {
        "today" => Some(today),
        "tomorrow" => today.checked_add_days(Days::new(1)),
        "yesterday" => today.checked_sub_days(Days::new(1)),
        _ => None,
    }
}

pub fn eval_between_expression(s: &str, now: DateTime<Local>) -> Option<BetweenSpan> {
    let caps = BETWEEN.captures(s)?;
    let a = parse_loose_date(&caps[1], now)?;
    let b = parse_loose_date(&caps[2], now)?;
    Some(BetweenSpan { from: a, to: b, ms: (b - a).num_milliseconds().abs() })
}

fn parse_weekday(prefix: &str) -> Option<Weekday> {
    match prefix.to_lowercase().as_str() {
        "sun" => Some(Weekday::Sun),
        "mon" => Some(Weekday::Mon),
        "tue" => Some(Weekday::Tue),
        "wed" => Some(Weekday::Wed),
        "thu" => Some(Weekday::Thu),
        "fri" => Some(Weekday::Fri),
        "sat" => Some(Weekday::Sat),
        _ => None,
    }
}

/// Next occurrence strictly after `start`; the same weekday is a week out.
pub fn next_weekday(start: DateTime<Local>, target: Weekday) -> Option<DateTime<Local>> {
    let today = start.weekday().num_days_from_sunday();
    let wanted = target.num_days_from_sunday();
    let delta = match (wanted + 7 - today) % 7 {
        0 => 7,
        d => d,
    };
    start.checked_add_days(Days::new(u64::from(delta)))
}

fn is_weekend(date: DateTime<Local>) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Walk `n` business days from `start`, backwards when `n` is negative.
/// Whole weeks are jumped at once; every 7-day span holds 5 business days.
pub fn workdays_from(start: DateTime<Local>, n: i64) -> Option<DateTime<Local>> {
    let total = n.unsigned_abs();
    // Keep the last week for the walk so a weekend start ends on a Friday
    let weeks = total.saturating_sub(1) / 5;
    let mut remaining = total - weeks * 5;
    let jump = Days::new(weeks.checked_mul(7)?);
    let mut out = if n > 0 { start.checked_add_days(jump)? } else { start.checked_sub_days(jump)? };
    while remaining > 0 {
        out = if n > 0 { out.checked_add_days(Days::new(1))? } else { out.checked_sub_days(Days::new(1))? };
        if !is_weekend(out) {
            remaining -= 1;
        }
    }
    Some(out)
}

fn local_midnight(date: NaiveDate) -> Option<DateTime<Local>> {
    Local.from_local_datetime(&date.and_time(NaiveTime::MIN)).earliest()
}

fn resolve_anchor(token: &str, now: DateTime<Local>) -> Option<DateTime<Local>> {
    let date = match keyword_date(token, now) {
        Some(d) => d,
        None => NaiveDate::parse_from_str(token, "%Y-%m-%d").ok()?,
    };
    local_midnight(date)
}

fn add_relative(date: DateTime<Local>, sign: i64, n: u64, unit: &str) -> Option<DateTime<Local>> {
    let forward = sign > 0;
    match unit {
        "d" | "w" => {
            let days = Days::new(n.checked_mul(if unit == "w" { 7 } else { 1 })?);
            if forward { date.checked_add_days(days) } else { date.checked_sub_days(days) }
        }
        _ => {
            let months = u32::try_from(n.checked_mul(if unit == "y" { 12 } else { 1 })?).ok()?;
            if forward { date.checked_add_months(Months::new(months)) } else { date.checked_sub_months(Months::new(months)) }
        }
    }
}

/// Every `+ N unit` / `- N unit` offset in the text, applied in order.
pub fn apply_offsets(s: &str, date: DateTime<Local>) -> Result<DateTime<Local>, EvalError> {
    let mut out = date;
    for caps in OFFSET.captures_iter(s) {
        let sign = if &caps[1] == "-" { -1 } else { 1 };
        let n: u64 = caps[2].parse().map_err(|_| EvalError::DateOutOfRange)?;
        out = add_relative(out, sign, n, &caps[3].to_lowercase()).ok_or(EvalError::DateOutOfRange)?;
    }
    Ok(out)
}

/// Point-in-time phrase, offsets not yet applied. `Ok(None)` when the text
/// holds no date phrase at all.
pub fn parse_date_expression(s: &str, now: DateTime<Local>) -> Result<Option<DateTime<Local>>, EvalError> {
    let date = if let Some(caps) = WORKDAYS.captures(s) {
        caps[1]
            .parse::<i64>()
            .ok()
            .and_then(|n| workdays_from(resolve_anchor(&caps[2], now)?, n))
    } else if let Some(caps) = NEXT_WEEKDAY.captures(s) {
        parse_weekday(&caps[1]).and_then(|day| next_weekday(now, day))
    } else if let Some(caps) = KEYWORD.captures(s) {
        match caps[1].to_lowercase().as_str() {
            "tomorrow" => now.checked_add_days(Days::new(1)),
            "yesterday" => now.checked_sub_days(Days::new(1)),
            _ => Some(now),
        }
    } else if let Some(caps) = ISO_DATE.captures(s) {
        NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d").ok().and_then(local_midnight)
    } else {
        return Ok(None);
    };
    date.map(Some).ok_or(EvalError::DateOutOfRange)
}

// Offsets after an ISO literal must not see the literal's own hyphens
fn offset_tail(s: &str) -> &str {
    match ISO_DATE.find_iter(s).last() {
        Some(m) => &s[m.end()..],
        None => s,
    }
}

pub fn format_date_result(date: DateTime<Local>) -> String {
    date.format("%Y-%m-%d %H:%M").to_string()
}

fn iso_millis(date: DateTime<Utc>) -> String {
    date.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

fn between_result(span: &BetweenSpan, locale: &str) -> CalculationResult {
    let seconds = (span.ms as f64 / 1000.0).round();
    let mut result = CalculationResult::new(seconds, format_number(seconds, 3, locale), Some("s".into()), ResultType::Duration);
    let chips: [(&str, f64, u32); 4] = [
        ("ms", seconds * 1000.0, 0),
        ("min", seconds / 60.0, 3),
        ("h", seconds / 3600.0, 3),
        ("d", seconds / 86400.0, 3),
    ];
    result.conversions = chips
        .iter()
        .map(|(unit, v, p)| ResultConversion::new(*unit, format!("{} {}", format_number(*v, *p, locale), unit)))
        .collect();
    result.metadata.precision_applied = Some(3);
    result.metadata.kind = Some("duration".into());
    result.metadata.between = Some(BetweenMeta {
        from: iso_millis(span.from),
        to: iso_millis(span.to),
        ms: span.ms,
        summary: span.summary(),
    });
    result
}

/// Date or interval result for the line, or `None` to continue with the
/// arithmetic pipeline. A date phrase that cannot be computed is an error.
pub fn evaluate_dates(
    input: &str,
    now: DateTime<Local>,
    locale: &str,
) -> Option<Result<CalculationResult, EvalError>> {
    if is_between_expression(input) {
        if let Some(span) = eval_between_expression(input, now) {
            log::debug!("date interval: {} ms", span.ms);
            return Some(Ok(between_result(&span, locale)));
        }
    }

    let date = match parse_date_expression(input, now) {
        Ok(Some(base)) => apply_offsets(offset_tail(input), base),
        Ok(None) => return None,
        Err(err) => Err(err),
    };
    let date = match date {
        Ok(date) => date,
        Err(err) => {
            log::debug!("date phrase '{}' failed: {}", input, err);
            return Some(Err(err));
        }
    };
    let mut result = CalculationResult::new(
        date.timestamp_millis() as f64,
        format_date_result(date),
        None,
        ResultType::Date,
    );
    result.metadata.kind = Some("date".into());
    Some(Ok(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Wednesday 2024-01-10 09:30 local time
    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 1, 10, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_between_iso_dates() {
        let r = evaluate_dates("between 2024-01-01 and 2024-01-11", now(), "en-US").unwrap().unwrap();
        assert_eq!(r.kind, ResultType::Duration);
        assert_eq!(r.unit.as_deref(), Some("s"));
        assert_eq!(r.value, 864_000.0);
        let between = r.metadata.between.as_ref().unwrap();
        assert_eq!(between.from, "2024-01-01T00:00:00.000Z");
        assert_eq!(between.to, "2024-01-11T00:00:00.000Z");
        assert_eq!(between.summary, "10 days (1.4 weeks)");
        let days = r.conversions.iter().find(|c| c.unit == "d").unwrap();
        assert_eq!(days.display, "10.000 d");
        assert!(r.conversions.iter().all(|c| c.unit != "s"));
    }

    #[test]
    fn test_between_day_first_is_order_free() {
        let r = evaluate_dates("between 11/01/2024 and 01/01/2024", now(), "en-US").unwrap().unwrap();
        assert_eq!(r.value, 864_000.0);
    }

    #[test]
    fn test_next_weekday() {
        let r = evaluate_dates("next monday", now(), "en-US").unwrap().unwrap();
        assert_eq!(r.formatted, "2024-01-15 09:30");
        // same weekday jumps a full week
        let r = evaluate_dates("next wed", now(), "en-US").unwrap().unwrap();
        assert_eq!(r.formatted, "2024-01-17 09:30");
    }

    #[test]
    fn test_offsets_apply_once_and_chain() {
        let r = evaluate_dates("next monday + 2w", now(), "en-US").unwrap().unwrap();
        assert_eq!(r.formatted, "2024-01-29 09:30");
        let r = evaluate_dates("today + 1w + 2d", now(), "en-US").unwrap().unwrap();
        assert_eq!(r.formatted, "2024-01-19 09:30");
        let r = evaluate_dates("today - 3d", now(), "en-US").unwrap().unwrap();
        assert_eq!(r.formatted, "2024-01-07 09:30");
    }

    #[test]
    fn test_month_offset_clamps() {
        let r = evaluate_dates("2024-01-31 + 1m", now(), "en-US").unwrap().unwrap();
        assert_eq!(r.formatted, "2024-02-29 00:00");
    }

    #[test]
    fn test_workdays() {
        // Friday 2024-01-12 plus one business day is Monday
        let r = evaluate_dates("workdays(1) from 2024-01-12", now(), "en-US").unwrap().unwrap();
        assert_eq!(r.formatted, "2024-01-15 00:00");
        let r = evaluate_dates("workdays(-1) from 2024-01-15", now(), "en-US").unwrap().unwrap();
        assert_eq!(r.formatted, "2024-01-12 00:00");
        let r = evaluate_dates("workdays(3) from today", now(), "en-US").unwrap().unwrap();
        assert_eq!(r.formatted, "2024-01-15 00:00");
    }

    #[test]
    fn test_workdays_jump_whole_weeks() {
        // Saturday start: five business days end on Friday
        let r = evaluate_dates("workdays(5) from 2024-01-13", now(), "en-US").unwrap().unwrap();
        assert_eq!(r.formatted, "2024-01-19 00:00");
        let r = evaluate_dates("workdays(10) from 2024-01-10", now(), "en-US").unwrap().unwrap();
        assert_eq!(r.formatted, "2024-01-24 00:00");
        let r = evaluate_dates("workdays(-6) from 2024-01-15", now(), "en-US").unwrap().unwrap();
        assert_eq!(r.formatted, "2024-01-05 00:00");
        let r = evaluate_dates("workdays(2600) from 2024-01-10", now(), "en-US").unwrap().unwrap();
        assert_eq!(r.formatted, "2033-12-28 00:00");
    }

    #[test]
    fn test_uncomputable_dates_are_errors() {
        for line in [
            "workdays(999999999999) from today",
            "2024-01-01 + 4294967295y",
            "today + 99999999999d",
            "today + 99999999999999999999d",
            "2024-02-30",
        ] {
            assert_eq!(evaluate_dates(line, now(), "en-US"), Some(Err(EvalError::DateOutOfRange)), "{}", line);
        }
    }

    #[test]
    fn test_not_a_date() {
        assert!(evaluate_dates("2 + 2", now(), "en-US").is_none());
        assert!(evaluate_dates("5 kg in g", now(), "en-US").is_none());
    }
}
