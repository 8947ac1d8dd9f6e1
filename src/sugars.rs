//! Numeric rewrites: random numbers, fractions, radix and scale literals,
//! constants, separators, percentages, durations, currency symbols and
//! implicit multiplication.
//!
//! Each function is a pure `&str -> String` stage. The evaluator applies them
//! in a fixed order; the comments on each function say what it expects to
//! have already happened.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::format::number_literal;
use crate::units;

/// Seed used when the caller enables `rand` without picking one.
pub const DEFAULT_SEED: i64 = 42;

/// Linear congruential generator (Numerical Recipes constants).
#[derive(Debug, Clone)]
pub struct Lcg {
    state: u32,
}

impl Lcg {
    pub fn new(seed: i64) -> Self {
        let state = seed as u32;
        Self { state: if state == 0 { 123_456_789 } else { state } }
    }

    /// Next value in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        self.state = self.state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        f64::from(self.state) / 4_294_967_296.0
    }
}

static RAND_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\brand\s*\(\s*(-?\d+(?:\.\d+)?)\s*,\s*(-?\d+(?:\.\d+)?)\s*\)").unwrap()
});
static RAND_UNIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\brand\s*\(\s*\)").unwrap());

/// Replace `rand(a, b)` and `rand()` with numbers drawn from `rng`.
pub fn apply_rand(s: &str, rng: &mut Lcg) -> String {
    let ranged = RAND_RANGE.replace_all(s, |caps: &Captures<'_>| {
        let a: f64 = caps[1].parse().unwrap_or(0.0);
        let b: f64 = caps[2].parse().unwrap_or(0.0);
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        number_literal(lo + rng.next_f64() * (hi - lo))
    });
    RAND_UNIT
        .replace_all(&ranged, |_: &Captures<'_>| number_literal(rng.next_f64()))
        .into_owned()
}

const UNICODE_FRACTIONS: [(char, &str); 15] = [
    ('½', "(1/2)"),
    ('¼', "(1/4)"),
    ('¾', "(3/4)"),
    ('⅓', "(1/3)"),
    ('⅔', "(2/3)"),
    ('⅕', "(1/5)"),
    ('⅖', "(2/5)"),
    ('⅗', "(3/5)"),
    ('⅘', "(4/5)"),
    ('⅙', "(1/6)"),
    ('⅚', "(5/6)"),
    ('⅛', "(1/8)"),
    ('⅜', "(3/8)"),
    ('⅝', "(5/8)"),
    ('⅞', "(7/8)"),
];

static FRACTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d+)\s*/\s*(\d+)\b").unwrap());

/// Wrap integer fractions in parentheses (`3/4` -> `(3/4)`) and expand
/// unicode vulgar fractions. Decimal operands are left alone.
pub fn normalize_fractions(s: &str) -> String {
    let mut expanded = String::with_capacity(s.len());
    for ch in s.chars() {
        match UNICODE_FRACTIONS.iter().find(|(c, _)| *c == ch) {
            Some((_, text)) => expanded.push_str(text),
            None => expanded.push(ch),
        }
    }

    let mut out = String::with_capacity(expanded.len());
    let mut last = 0;
    for caps in FRACTION.captures_iter(&expanded) {
        let Some(m) = caps.get(0) else { continue };
        let before = expanded[..m.start()].chars().last();
        let after = &expanded[m.end()..];
        // "1.5/2" and "3/2.5" are decimals, not fractions
        let decimal_before = before == Some('.');
        let decimal_after = after.starts_with('.') && after[1..].starts_with(|c: char| c.is_ascii_digit());
        let wrapped = before == Some('(') && after.starts_with(')');
        out.push_str(&expanded[last..m.start()]);
        if decimal_before || decimal_after || wrapped {
            out.push_str(m.as_str());
        } else {
            out.push_str(&format!("({}/{})", &caps[1], &caps[2]));
        }
        last = m.end();
    }
    out.push_str(&expanded[last..]);
    out
}

static HEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b0x([0-9a-fA-F]+)\b").unwrap());
static OCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b0o([0-7]+)\b").unwrap());
static BIN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b0b([01]+)\b").unwrap());

/// `0x1F`, `0o17`, `0b101` -> decimal. Literals past u128 are accumulated
/// as f64; past f64 they become an overflowing literal that fails evaluation.
pub fn normalize_radix(s: &str) -> String {
    let radix = |re: &Regex, text: &str, base: u32| -> String {
        re.replace_all(text, |caps: &Captures<'_>| match u128::from_str_radix(&caps[1], base) {
            Ok(n) => n.to_string(),
            Err(_) => wide_radix(&caps[1], base),
        })
        .into_owned()
    };
    let s = radix(&HEX, s, 16);
    let s = radix(&OCT, &s, 8);
    radix(&BIN, &s, 2)
}

fn wide_radix(digits: &str, base: u32) -> String {
    let value = digits
        .chars()
        .filter_map(|c| c.to_digit(base))
        .fold(0f64, |acc, d| acc * base as f64 + d as f64);
    if value.is_finite() { number_literal(value) } else { "1e999".to_string() }
}

static SCALE_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d+(?:\.\d+)?)([kKMBT])\b").unwrap());

/// `2k` -> `2000`, `3.5M` -> `3500000`, `1.2B`, `7T`. Lowercase `m`/`b`/`t`
/// are metres, bytes and the like, and are not scale suffixes.
pub fn apply_scale_suffixes(s: &str) -> String {
    SCALE_SUFFIX
        .replace_all(s, |caps: &Captures<'_>| {
            let n: f64 = caps[1].parse().unwrap_or(0.0);
            let factor = match &caps[2] {
                "k" | "K" => 1e3,
                "M" => 1e6,
                "B" => 1e9,
                _ => 1e12,
            };
            number_literal(n * factor)
        })
        .into_owned()
}

static CLAMP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bclamp\s*\(\s*([^,]+?)\s*,\s*([^,]+?)\s*,\s*([^)]+?)\s*\)").unwrap());
static TRIG_CALL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(sin|cos|tan)\s*\(([^)]*)\)").unwrap());
static DEGREE_ARG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(?:deg(?:rees?)?\b|°)").unwrap());
static RAD_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\brad(?:ians?)?\b").unwrap());

/// `clamp(x, lo, hi)` -> `min(max(...))`; degree arguments of trig calls
/// (`sin(30 deg)`, `cos(45°)`) become radians.
pub fn apply_math_sugars(s: &str) -> String {
    let clamped = CLAMP.replace_all(s, "(min(max(($1),($2)),($3)))");
    let to_radians = number_literal(std::f64::consts::PI / 180.0);
    TRIG_CALL
        .replace_all(&clamped, |caps: &Captures<'_>| {
            let inner = DEGREE_ARG.replace_all(&caps[2], |d: &Captures<'_>| {
                format!("(({})*{})", &d[1], to_radians)
            });
            let inner = RAD_WORD.replace_all(&inner, "");
            format!("{}({})", &caps[1], inner)
        })
        .into_owned()
}

static CONSTANTS: Lazy<Vec<(Regex, f64)>> = Lazy::new(|| {
    let table = [
        ("tau", std::f64::consts::TAU),
        ("phi", (1.0 + 5f64.sqrt()) / 2.0),
        ("ln2", std::f64::consts::LN_2),
        ("ln10", std::f64::consts::LN_10),
        ("sqrt2", std::f64::consts::SQRT_2),
        ("sqrt3", 3f64.sqrt()),
        ("pi", std::f64::consts::PI),
        ("e", std::f64::consts::E),
    ];
    table
        .iter()
        .map(|(name, value)| (Regex::new(&format!(r"(?i)\b{}\b", name)).unwrap(), *value))
        .collect()
});

/// Whole-word constants. `1e5` is not touched because `e` is inside a word.
pub fn apply_constants(s: &str) -> String {
    let mut out = s.to_string();
    for (re, value) in CONSTANTS.iter() {
        if re.is_match(&out) {
            out = re.replace_all(&out, number_literal(*value).as_str()).into_owned();
        }
    }
    out
}

static GROUPED_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{1,3}(?:,\d{3})+").unwrap());

/// Drop `_` between digits and `,` used as a thousands separator
/// (`1,234,567`). A comma is only a separator when it splits a number into
/// proper groups of three; anything else stays for argument lists.
pub fn strip_numeric_separators(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut underscored = String::with_capacity(s.len());
    for (i, c) in chars.iter().enumerate() {
        let between_digits = i > 0
            && chars[i - 1].is_ascii_digit()
            && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit());
        if *c == '_' && between_digits {
            continue;
        }
        underscored.push(*c);
    }

    let mut out = String::with_capacity(underscored.len());
    let mut last = 0;
    for m in GROUPED_NUMBER.find_iter(&underscored) {
        let before = underscored[..m.start()].chars().last();
        let after = underscored[m.end()..].chars().next();
        let standalone = !before.is_some_and(|c| c.is_ascii_digit() || c == '.' || c == ',')
            && !after.is_some_and(|c| c.is_ascii_digit());
        out.push_str(&underscored[last..m.start()]);
        if standalone {
            out.push_str(&m.as_str().replace(',', ""));
        } else {
            out.push_str(m.as_str());
        }
        last = m.end();
    }
    out.push_str(&underscored[last..]);
    out
}

static TRAILING_TARGET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(.*?)(\s+(?:in|to)\s+[A-Za-z°][A-Za-z°/²³0-9^]{0,7}\s*)$").unwrap());

#[derive(Clone, Copy)]
enum PercentOp {
    Of,
    On,
    Off,
}

impl PercentOp {
    fn expand(self, percent: &str, base: &str) -> String {
        match self {
            PercentOp::Of => format!("(({}) * ({}/100))", base, percent),
            PercentOp::On => format!("(({b}) + (({b}) * ({p}/100)))", b = base, p = percent),
            PercentOp::Off => format!("(({b}) - (({b}) * ({p}/100)))", b = base, p = percent),
        }
    }
}

static PERCENT_PHRASES: Lazy<Vec<(Regex, PercentOp, bool)>> = Lazy::new(|| {
    let mut phrases = Vec::new();
    for (word, op) in [("of", PercentOp::Of), ("on", PercentOp::On), ("off", PercentOp::Off)] {
        let grouped = format!(r"(?i)(\d+(?:\.\d+)?)\s*%?\s*{}\s*\(([^)]+)\)", word);
        let bare = format!(r"(?i)(\d+(?:\.\d+)?)\s*%?\s*{}\s+([^\s][^+\-*/()]+(?:\([^)]*\))?)", word);
        phrases.push((Regex::new(&grouped).unwrap(), op, false));
        phrases.push((Regex::new(&bare).unwrap(), op, true));
    }
    phrases
});

/// `X% of Y`, `X% on Y`, `X% off Y` -> explicit arithmetic. Runs before
/// bare-percent conversion, which would otherwise eat the `%`. A trailing
/// `in <unit>` clause is left outside the expansion for target extraction.
pub fn expand_percent_phrases(s: &str) -> String {
    let mut out = s.to_string();
    for (re, op, bare) in PERCENT_PHRASES.iter() {
        out = re
            .replace_all(&out, |caps: &Captures<'_>| {
                let percent = &caps[1];
                let base = &caps[2];
                if *bare {
                    if let Some(split) = TRAILING_TARGET.captures(base) {
                        return format!("{}{}", op.expand(percent, &split[1]), &split[2]);
                    }
                }
                op.expand(percent, base)
            })
            .into_owned();
    }
    out
}

static BARE_PERCENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*%").unwrap());

/// `12%` -> `((12)/100)`.
pub fn convert_bare_percent(s: &str) -> String {
    BARE_PERCENT.replace_all(s, "(($1)/100)").into_owned()
}

static DURATION_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d+(?:\.\d+)?)\s*(ms|s|sec|min|h|hr|d|day|days|wk|week|weeks)\b").unwrap()
});
static DURATION_TERM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(ms|s|sec|min|h|hr|d|day|days|wk|week|weeks)\b").unwrap()
});

pub fn has_duration_tokens(s: &str) -> bool {
    DURATION_TOKEN.is_match(s)
}

/// `2 h + 30 min` -> `((2)*3600) + ((30)*60)`: every term in seconds.
pub fn expand_durations(s: &str) -> String {
    DURATION_TERM
        .replace_all(s, |caps: &Captures<'_>| {
            let factor = units::duration_seconds(&caps[2]).unwrap_or(1.0);
            format!("(({})*{})", &caps[1], number_literal(factor))
        })
        .into_owned()
}

static US_DOLLAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)US\$").unwrap());

const CURRENCY_SYMBOLS: [(&str, &str); 7] = [
    ("R$", "BRL"),
    ("$", "USD"),
    ("€", "EUR"),
    ("£", "GBP"),
    ("¥", "JPY"),
    ("₣", "CHF"),
    ("₿", "BTC"),
];

/// `$`, `R$`, `€`, `£`, `¥`, `₣`, `₿` -> space-padded ISO codes. Longer
/// symbols are replaced first so `R$` never turns into `R USD`.
pub fn standardize_currency_symbols(s: &str) -> String {
    let mut out = US_DOLLAR.replace_all(s, " USD ").into_owned();
    for (symbol, code) in CURRENCY_SYMBOLS {
        if out.contains(symbol) {
            out = out.replace(symbol, &format!(" {} ", code));
        }
    }
    out
}

/// `5 0.3` -> `5 * 0.3`: whitespace between two numbers is multiplication.
pub fn implicit_multiplication_between_numbers(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 8);
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() && i > 0 && chars[i - 1].is_ascii_digit() {
            let mut j = i;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            if j < chars.len() && chars[j].is_ascii_digit() {
                out.push_str(" * ");
                i = j;
                continue;
            }
        }
        out.push(c);
        i += 1;
    }
    out
}

/// `)(` -> `)*(`, `2(` -> `2*(`, `)2` -> `)*2`. Digits that end a function
/// name (`log10(`) are not numbers.
pub fn implicit_multiplication_around_parens(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out: Vec<char> = Vec::with_capacity(chars.len() + 8);
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == ')' || c.is_ascii_digit() {
            let mut j = i + 1;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            let next = chars.get(j).copied();
            let insert = match (c, next) {
                (')', Some('(')) => true,
                (')', Some(n)) if n.is_ascii_digit() => true,
                (d, Some('(')) if d.is_ascii_digit() => !ends_identifier(&chars[..=i]),
                _ => false,
            };
            if insert {
                out.push(c);
                out.push('*');
                i = j;
                continue;
            }
        }
        out.push(c);
        i += 1;
    }
    out.into_iter().collect()
}

// True when the trailing alphanumeric run contains a letter ("log10")
fn ends_identifier(prefix: &[char]) -> bool {
    prefix
        .iter()
        .rev()
        .take_while(|c| c.is_ascii_alphanumeric() || **c == '_')
        .any(|c| c.is_ascii_alphabetic() || *c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lcg_is_reproducible() {
        let mut a = Lcg::new(123);
        let mut b = Lcg::new(123);
        let first = a.next_f64();
        assert_eq!(first, 1_218_640_798.0 / 4_294_967_296.0);
        assert_eq!(first, b.next_f64());
        assert_eq!(a.next_f64(), b.next_f64());
        for _ in 0..1000 {
            let x = a.next_f64();
            assert!((0.0..1.0).contains(&x));
        }
    }

    #[test]
    fn test_rand_ranges() {
        let mut rng = Lcg::new(7);
        let out = apply_rand("rand(10, 20)", &mut rng);
        let n: f64 = out.parse().unwrap();
        assert!((10.0..20.0).contains(&n));
        assert_eq!(apply_rand("rand(10, 20)", &mut Lcg::new(7)), out);
    }

    #[test]
    fn test_fractions() {
        assert_eq!(normalize_fractions("3/4 + 1"), "(3/4) + 1");
        assert_eq!(normalize_fractions("½ cup"), "(1/2) cup");
        assert_eq!(normalize_fractions("1.5/2"), "1.5/2");
    }

    #[test]
    fn test_fractions_are_idempotent() {
        let once = normalize_fractions("3/4 + ½ + 1/8");
        assert_eq!(once, "(3/4) + (1/2) + (1/8)");
        assert_eq!(normalize_fractions(&once), once);
    }

    #[test]
    fn test_radix_is_idempotent() {
        let once = normalize_radix("0x1F + 0o17 + 0b101");
        assert_eq!(once, "31 + 15 + 5");
        assert_eq!(normalize_radix(&once), once);
    }

    #[test]
    fn test_radix_past_u128() {
        let wide = normalize_radix(&format!("0x{}", "f".repeat(40)));
        let value: f64 = wide.parse().unwrap();
        assert!((value / 16f64.powi(40) - 1.0).abs() < 1e-12);

        let huge = normalize_radix(&format!("0x{}", "f".repeat(300)));
        assert_eq!(crate::math::evaluate(&huge), Err(crate::error::MathError::NonFinite));
    }

    #[test]
    fn test_scale_suffixes() {
        assert_eq!(apply_scale_suffixes("2k + 500"), "2000 + 500");
        assert_eq!(apply_scale_suffixes("3.5M"), "3500000");
        assert_eq!(apply_scale_suffixes("7T"), "7000000000000");
        // metres and bytes are units, not multipliers
        assert_eq!(apply_scale_suffixes("10m"), "10m");
        assert_eq!(apply_scale_suffixes("2kg"), "2kg");
    }

    #[test]
    fn test_constants_whole_word() {
        assert_eq!(apply_constants("2 * pi"), format!("2 * {}", std::f64::consts::PI));
        assert_eq!(apply_constants("1e5"), "1e5");
        assert_eq!(apply_constants("people"), "people");
    }

    #[test]
    fn test_math_sugars() {
        assert_eq!(apply_math_sugars("clamp(15, 0, 10)"), "(min(max((15),(0)),(10)))");
        let trig = apply_math_sugars("sin(30 deg)");
        assert!(trig.starts_with("sin(((30)*0.0174532925"));
    }

    #[test]
    fn test_separators() {
        assert_eq!(strip_numeric_separators("1,234,567.5"), "1234567.5");
        assert_eq!(strip_numeric_separators("1_000_000"), "1000000");
        assert_eq!(strip_numeric_separators("max(2, 5)"), "max(2, 5)");
        assert_eq!(strip_numeric_separators("1234,567"), "1234,567");
    }

    #[test]
    fn test_percent_phrases() {
        assert_eq!(expand_percent_phrases("10% of 500"), "((500) * (10/100))");
        assert_eq!(expand_percent_phrases("20% off (80)"), "((80) - ((80) * (20/100)))");
        assert_eq!(
            expand_percent_phrases("10% of 1500 g in kg"),
            "((1500 g) * (10/100)) in kg"
        );
        assert_eq!(convert_bare_percent("12%"), "((12)/100)");
    }

    #[test]
    fn test_durations() {
        assert!(has_duration_tokens("2 h + 30 min"));
        assert!(!has_duration_tokens("5 bags"));
        assert_eq!(expand_durations("2 h + 30 min"), "((2)*3600) + ((30)*60)");
    }

    #[test]
    fn test_currency_symbols() {
        assert_eq!(standardize_currency_symbols("R$10").trim(), "BRL 10");
        assert_eq!(standardize_currency_symbols("$100").trim(), "USD 100");
        assert_eq!(standardize_currency_symbols("US$5").trim(), "USD 5");
    }

    #[test]
    fn test_implicit_multiplication() {
        assert_eq!(implicit_multiplication_between_numbers("5 0.3"), "5 * 0.3");
        assert_eq!(implicit_multiplication_between_numbers("1 2 3"), "1 * 2 * 3");
        assert_eq!(implicit_multiplication_around_parens("2(3)(4)"), "2*(3)*(4)");
        assert_eq!(implicit_multiplication_around_parens("(1) 2"), "(1)*2");
        assert_eq!(implicit_multiplication_around_parens("log10(100)"), "log10(100)");
    }
}
