//! Locale-aware fixed-precision number formatting.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

pub const DEFAULT_LOCALE: &str = "en-US";

/// Decimal and grouping separators of a locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Separators {
    pub decimal: char,
    pub group: char,
}

/// Separator convention for a BCP-47 tag. Unknown tags fall back to en-US.
pub fn separators_for(locale: &str) -> Separators {
    let tag = locale.trim().replace('_', "-").to_lowercase();
    if tag == "de-ch" || tag == "fr-ch" || tag == "it-ch" {
        return Separators { decimal: '.', group: '\u{2019}' };
    }
    let language = tag.split('-').next().unwrap_or("en");
    match language {
        "pt" | "es" | "de" | "it" | "nl" | "id" | "tr" | "da" | "el" => {
            Separators { decimal: ',', group: '.' }
        }
        "fr" | "ru" | "pl" | "cs" | "sv" | "fi" | "nb" | "no" | "uk" | "sk" | "hu" => {
            Separators { decimal: ',', group: '\u{202F}' }
        }
        _ => Separators { decimal: '.', group: ',' },
    }
}

/// Format `value` with exactly `digits` fraction digits, rounding half away
/// from zero and grouping thousands by the locale's convention.
pub fn format_number(value: f64, digits: u32, locale: &str) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let plain = fixed_digits(value, digits);
    group_digits(&plain, separators_for(locale))
}

// Plain "-1234.50" style string with the requested number of fraction digits
fn fixed_digits(value: f64, digits: u32) -> String {
    match Decimal::from_f64(value) {
        Some(d) => {
            let mut rounded = d.round_dp_with_strategy(digits, RoundingStrategy::MidpointAwayFromZero);
            if rounded.is_zero() {
                rounded.set_sign_positive(true);
            }
            rounded.rescale(digits);
            rounded.to_string()
        }
        // Out of Decimal's range; std formatting is good enough at that magnitude
        None => format!("{:.*}", digits as usize, value),
    }
}

fn group_digits(plain: &str, seps: Separators) -> String {
    let (sign, unsigned) = match plain.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", plain),
    };
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    let len = int_part.len();
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            grouped.push(seps.group);
        }
        grouped.push(ch);
    }

    let mut out = String::from(sign);
    out.push_str(&grouped);
    if let Some(frac) = frac_part {
        out.push(seps.decimal);
        out.push_str(frac);
    }
    out
}

/// Render a number for re-insertion into an expression: shortest round-trip
/// form, never in exponent notation.
pub fn number_literal(value: f64) -> String {
    format!("{}", value)
}
