//! Natural-language connectors and range/list aggregate sugar.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::format::number_literal;
use crate::types::RangeMeta;

static EACH: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\beach\s+([^\s].*?)\b").unwrap());
static PER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bper\b").unwrap());
static AT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bat\b").unwrap());

/// `each X` -> ` * (X)`, `per` and `at` -> `/`.
pub fn apply_connectors(s: &str) -> String {
    let out = EACH.replace_all(s, |caps: &Captures<'_>| format!(" * ({})", &caps[1]));
    let out = PER.replace_all(&out, "/");
    AT.replace_all(&out, "/").into_owned()
}

static STEPPED_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(sum|avg)\s*\(\s*(-?\d+(?:\.\d+)?)\s*\.\.\s*(-?\d+(?:\.\d+)?)\s+step\s+(-?\d+(?:\.\d+)?)\s*\)",
    )
    .unwrap()
});
static RANGE_PAREN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(sum|avg|median)\s*\(\s*(-?\d+)\s*\.\.\s*(-?\d+)\s*\)").unwrap());
static RANGE_BARE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(sum|avg|median)\s+(-?\d+)\s*\.\.\s*(-?\d+)\b").unwrap());
static PERCENT_LIST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(sum|avg)\s*\(\s*([^)]+?%[^)]*)\s*\)\s+of\s+").unwrap());
static LIST_PAREN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(sum|avg|median)\s*\(\s*([^)]+?)\s*\)").unwrap());
static LIST_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(sum|avg)\s+(-?\d+(?:\.\d+)?(?:\s*,\s*-?\d+(?:\.\d+)?)+)\b").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Aggregate {
    Sum,
    Avg,
    Median,
}

impl Aggregate {
    fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "sum" => Some(Aggregate::Sum),
            "avg" => Some(Aggregate::Avg),
            "median" => Some(Aggregate::Median),
            _ => None,
        }
    }
}

/// Rewrite aggregate sugar into plain arithmetic, in this order:
///
/// 1. stepped ranges `sum(2..10 step 2)`
/// 2. integer ranges `sum(1..10)` and `sum 1..10`
/// 3. percent lists `sum(10%, 12%) of X`
/// 4. literal lists `sum(2, 5, 9)`, `avg(...)`, `median(...)`
/// 5. text lists `sum 2, 5, 9`
///
/// Ranges are assumed to have step 1 unless a step is given, so `avg` and
/// `median` of a range are both the midpoint. Median of more than three
/// list items is the mean.
pub fn normalize_range_and_list_fns(input: &str) -> String {
    let s = STEPPED_RANGE.replace_all(input, expand_stepped_range);
    let s = RANGE_PAREN.replace_all(&s, expand_integer_range);
    let s = RANGE_BARE.replace_all(&s, expand_integer_range);
    let s = expand_percent_lists(&s);
    let s = LIST_PAREN.replace_all(&s, expand_list);
    LIST_TEXT.replace_all(&s, expand_list).into_owned()
}

fn expand_stepped_range(caps: &Captures<'_>) -> String {
    let original = caps[0].to_string();
    let (Ok(start), Ok(end), Ok(step)) =
        (caps[2].parse::<f64>(), caps[3].parse::<f64>(), caps[4].parse::<f64>())
    else {
        return original;
    };
    if step == 0.0 {
        return original;
    }
    let n = ((end - start) / step).floor() + 1.0;
    if !n.is_finite() || n <= 0.0 {
        return original;
    }
    let n = number_literal(n);
    let sum = format!(
        "(({}/2) * (({}) + (({}-1)*{})))",
        n,
        number_literal(2.0 * start),
        n,
        number_literal(step)
    );
    match Aggregate::parse(&caps[1]) {
        Some(Aggregate::Sum) => sum,
        _ => format!("({} / {})", sum, n),
    }
}

fn expand_integer_range(caps: &Captures<'_>) -> String {
    let (a, b) = (caps[2].trim(), caps[3].trim());
    match Aggregate::parse(&caps[1]) {
        Some(Aggregate::Sum) => format!("(({a}+{b})*({b}-{a}+1))/2"),
        Some(_) => format!("({a}+{b})/2"),
        None => caps[0].to_string(),
    }
}

fn split_items(list: &str) -> Vec<&str> {
    list.split(',').map(str::trim).filter(|t| !t.is_empty()).collect()
}

fn expand_list(caps: &Captures<'_>) -> String {
    let items = split_items(&caps[2]);
    let Some(aggregate) = Aggregate::parse(&caps[1]) else {
        return caps[0].to_string();
    };
    if items.is_empty() {
        return caps[0].to_string();
    }
    let joined = items.join("+ ");
    let mean = format!("(({})/{})", joined, items.len());
    match (aggregate, items.as_slice()) {
        (Aggregate::Sum, _) => format!("({})", joined),
        (Aggregate::Avg, _) => mean,
        (Aggregate::Median, [a]) => format!("({})", a),
        (Aggregate::Median, [a, b]) => format!("((min(({a}),({b}))+max(({a}),({b})))/2)"),
        (Aggregate::Median, [a, b, c]) => format!(
            "(({a})+({b})+({c}) - min(({a}),({b}),({c})) - max(({a}),({b}),({c})))"
        ),
        (Aggregate::Median, _) => mean,
    }
}

// Distribute the "of" target over each percentage. The target runs up to the
// next operator, closing paren or trailing whitespace.
fn expand_percent_lists(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pos = 0;
    while let Some(caps) = PERCENT_LIST.captures_at(s, pos) {
        let Some(whole) = caps.get(0) else { break };
        let Some(target_len) = percent_target_len(&s[whole.end()..]) else {
            out.push_str(&s[pos..whole.end()]);
            pos = whole.end();
            continue;
        };
        let target = s[whole.end()..whole.end() + target_len].trim();
        let items = split_items(&caps[2]);
        let expanded = items
            .iter()
            .map(|p| format!("({} of {})", p, target))
            .collect::<Vec<_>>()
            .join(" + ");

        out.push_str(&s[pos..whole.start()]);
        match Aggregate::parse(&caps[1]) {
            Some(Aggregate::Sum) => out.push_str(&format!("({})", expanded)),
            _ => out.push_str(&format!("(({})/{})", expanded, items.len())),
        }
        pos = whole.end() + target_len;
    }
    out.push_str(&s[pos..]);
    out
}

fn percent_target_len(rest: &str) -> Option<usize> {
    let first = rest.chars().next()?;
    if first.is_whitespace() {
        return None;
    }
    let mut end = first.len_utf8();
    loop {
        let tail = &rest[end..];
        let stop = tail.is_empty()
            || tail.starts_with(['+', '-', '*', '/', ')'])
            || tail.trim().is_empty();
        if stop {
            return Some(end);
        }
        end += tail.chars().next().map_or(1, char::len_utf8);
    }
}

static SIMPLE_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|[^\w.])(-?\d+(?:\.\d+)?)(?:-|\s*[–—]\s*)(\d+(?:\.\d+)?)(?:\s*([a-z°/]+))?\b")
        .unwrap()
});

/// `5-7 kg`, `10 – 12` -> `{min, max, unit}`. A spaced hyphen is
/// subtraction, not a range, and a descending pair is not a range either.
pub fn detect_simple_range(s: &str) -> Option<RangeMeta> {
    for caps in SIMPLE_RANGE.captures_iter(s) {
        let min: f64 = caps[1].parse().ok()?;
        let max: f64 = caps[2].parse().ok()?;
        if !min.is_finite() || !max.is_finite() || min > max {
            continue;
        }
        let unit = caps.get(3).map(|m| m.as_str().to_lowercase());
        return Some(RangeMeta { min, max, unit });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connectors() {
        assert_eq!(apply_connectors("10 per kg"), "10 / kg");
        assert_eq!(apply_connectors("3 at 4"), "3 / 4");
        assert_eq!(apply_connectors("2 each apple"), "2  * (apple)");
    }

    #[test]
    fn test_integer_ranges() {
        assert_eq!(normalize_range_and_list_fns("sum 1..10"), "((1+10)*(10-1+1))/2");
        assert_eq!(normalize_range_and_list_fns("sum(1..10)"), "((1+10)*(10-1+1))/2");
        assert_eq!(normalize_range_and_list_fns("avg(1..11)"), "(1+11)/2");
        assert_eq!(normalize_range_and_list_fns("median 5..12"), "(5+12)/2");
    }

    #[test]
    fn test_stepped_range() {
        assert_eq!(
            normalize_range_and_list_fns("sum(2..10 step 2)"),
            "((5/2) * ((4) + ((5-1)*2)))"
        );
        assert_eq!(
            normalize_range_and_list_fns("avg(2..10 step 2)"),
            "(((5/2) * ((4) + ((5-1)*2))) / 5)"
        );
    }

    #[test]
    fn test_lists_keep_join_spacing() {
        assert_eq!(normalize_range_and_list_fns("sum(2, 5, 9)"), "(2+ 5+ 9)");
        assert_eq!(normalize_range_and_list_fns("avg(2,5,9)"), "((2+ 5+ 9)/3)");
        assert_eq!(normalize_range_and_list_fns("sum 2, 5, 9"), "(2+ 5+ 9)");
        assert_eq!(normalize_range_and_list_fns("avg 2, 4"), "((2+ 4)/2)");
    }

    #[test]
    fn test_median_lists() {
        assert_eq!(normalize_range_and_list_fns("median(4)"), "(4)");
        assert_eq!(
            normalize_range_and_list_fns("median(1, 3)"),
            "((min((1),(3))+max((1),(3)))/2)"
        );
        assert_eq!(
            normalize_range_and_list_fns("median(2,5,9)"),
            "((2)+(5)+(9) - min((2),(5),(9)) - max((2),(5),(9)))"
        );
        // more than three items falls back to the mean
        assert_eq!(normalize_range_and_list_fns("median(1,2,3,10)"), "((1+ 2+ 3+ 10)/4)");
    }

    #[test]
    fn test_percent_lists() {
        let out = normalize_range_and_list_fns("sum(10%, 12%, 8%) of 2500");
        for part in ["(10% of 2500)", "(12% of 2500)", "(8% of 2500)"] {
            assert!(out.contains(part), "{} missing from {}", part, out);
        }
        assert_eq!(
            normalize_range_and_list_fns("avg(10%,20%) of 300 + 1"),
            "(((10% of 300) + (20% of 300))/2)+ 1"
        );
    }

    #[test]
    fn test_simple_range() {
        let r = detect_simple_range("5-7 kg").unwrap();
        assert_eq!((r.min, r.max, r.unit.as_deref()), (5.0, 7.0, Some("kg")));
        let dashed = detect_simple_range("10 – 12").unwrap();
        assert_eq!((dashed.min, dashed.max), (10.0, 12.0));
        assert_eq!(detect_simple_range("10 - 3"), None);
        assert_eq!(detect_simple_range("5 - 7 kg"), None);
        assert_eq!(detect_simple_range("2024-01"), None);
    }
}
