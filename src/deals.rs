//! Deal phrases ("5 bags for 400 usd", "2.5 kg @ 15 BRL/kg"): rewrite the
//! line to its total and remember quantity and unit price for the chips.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::format::{format_number, number_literal};
use crate::types::{DealMeta, ResultConversion};

/// Output of deal extraction: the rewritten text and what was inferred.
#[derive(Debug, Clone, PartialEq)]
pub struct DealParse {
    pub normalized: String,
    pub deal: Option<DealMeta>,
}

const UNIT_ALTERNATION: &str = "mm|cm|m|km|in|ft|yd|mi|mg|g|kg|lb|oz|ml|l";

static FOR_TOTAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d+(?:\.\d+)?)\s+([a-zá-ú]+(?:\s+[a-zá-ú]+)*)\s+for\s+(\d+(?:\.\d+)?)\s*([a-z]{3})\b")
        .unwrap()
});
static AT_PRICE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(\d+(?:\.\d+)?)\s+([a-zá-ú]+(?:\s+[a-zá-ú]+)*)\s+(?:@|por)\s+(\d+(?:\.\d+)?)\s*([a-z]{3})(?:\s*(?:each|cada))?\b",
    )
    .unwrap()
});
static PER_UNIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(\d+(?:\.\d+)?)\s*({u})\s+@?\s*(\d+(?:\.\d+)?)\s*([a-z]{{3}})\s*/\s*({u})\b",
        u = UNIT_ALTERNATION
    ))
    .unwrap()
});
static QTY_UNIT_FOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(\d+(?:\.\d+)?)({u})\b[^=]*?\bfor\s+(\d+(?:\.\d+)?)\s*([a-z]{{3}})\b",
        u = UNIT_ALTERNATION
    ))
    .unwrap()
});
static UNIT_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(&format!(r"^(?:{})$", UNIT_ALTERNATION)).unwrap());

fn num(caps: &Captures<'_>, i: usize) -> Option<f64> {
    caps.get(i)?.as_str().parse().ok()
}

fn per_label(label: &str) -> String {
    if UNIT_LABEL.is_match(label) { label.to_string() } else { "each".to_string() }
}

fn unit_price(total: f64, qty: f64) -> Option<f64> {
    let price = total / qty;
    (qty > 0.0 && price.is_finite()).then_some(price)
}

fn rewrite(s: &str, start: usize, end: usize, total: f64, currency: &str) -> String {
    format!("{}{} {}{}", &s[..start], number_literal(total), currency, &s[end..])
}

/// Try the four deal shapes in precedence order; first match wins.
///
/// 1. `<qty> <label> for <total> <CCY>`
/// 2. `<qty> <label> @|por <price> <CCY> [each|cada]`
/// 3. `<qty> <unit> [@] <price> <CCY>/<unit>` (same unit on both sides)
/// 4. `<qty><unit> ... for <total> <CCY>`
pub fn parse_deal_semantics(input: &str) -> DealParse {
    let s = input.trim();
    for parse in [deal_for_total, deal_at_price, deal_per_unit, deal_qty_unit_for] {
        if let Some(found) = parse(s) {
            log::debug!("deal phrase matched: {:?}", found.deal);
            return found;
        }
    }
    DealParse { normalized: input.to_string(), deal: None }
}

fn deal_for_total(s: &str) -> Option<DealParse> {
    let caps = FOR_TOTAL.captures(s)?;
    let whole = caps.get(0)?;
    let qty = num(&caps, 1)?;
    let label = caps[2].to_lowercase();
    let total = num(&caps, 3)?;
    let currency = caps[4].to_uppercase();
    Some(DealParse {
        normalized: rewrite(s, whole.start(), whole.end(), total, &currency),
        deal: Some(DealMeta {
            qty,
            total,
            unit_price: unit_price(total, qty),
            per: per_label(&label),
            currency,
            label: Some(label),
        }),
    })
}

fn deal_at_price(s: &str) -> Option<DealParse> {
    // "2.5 kg @ 15 BRL/kg" is a per-unit price, left for the next shape
    let caps = AT_PRICE
        .captures_iter(s)
        .find(|c| c.get(0).is_some_and(|m| !s[m.end()..].trim_start().starts_with('/')))?;
    let whole = caps.get(0)?;
    let qty = num(&caps, 1)?;
    let label = caps[2].to_lowercase();
    let price = num(&caps, 3)?;
    let currency = caps[4].to_uppercase();
    let total = qty * price;
    Some(DealParse {
        normalized: rewrite(s, whole.start(), whole.end(), total, &currency),
        deal: Some(DealMeta {
            qty,
            total,
            unit_price: Some(price),
            per: per_label(&label),
            currency,
            label: Some(label),
        }),
    })
}

fn deal_per_unit(s: &str) -> Option<DealParse> {
    let mut pos = 0;
    while let Some(caps) = PER_UNIT.captures_at(s, pos) {
        let whole = caps.get(0)?;
        if !caps[2].eq_ignore_ascii_case(&caps[5]) {
            pos = whole.start() + 1;
            while !s.is_char_boundary(pos) {
                pos += 1;
            }
            continue;
        }
        let qty = num(&caps, 1)?;
        let unit = caps[2].to_lowercase();
        let price = num(&caps, 3)?;
        let currency = caps[4].to_uppercase();
        let total = qty * price;
        return Some(DealParse {
            normalized: rewrite(s, whole.start(), whole.end(), total, &currency),
            deal: Some(DealMeta {
                qty,
                total,
                unit_price: Some(price),
                per: unit.clone(),
                currency,
                label: Some(unit),
            }),
        });
    }
    None
}

fn deal_qty_unit_for(s: &str) -> Option<DealParse> {
    let caps = QTY_UNIT_FOR.captures(s)?;
    let whole = caps.get(0)?;
    let qty = num(&caps, 1)?;
    let unit = caps[2].to_lowercase();
    let total = num(&caps, 3)?;
    let currency = caps[4].to_uppercase();
    Some(DealParse {
        normalized: rewrite(s, whole.start(), whole.end(), total, &currency),
        deal: Some(DealMeta {
            qty,
            total,
            unit_price: unit_price(total, qty),
            per: unit.clone(),
            currency,
            label: Some(unit),
        }),
    })
}

/// Leading chips for a deal: unit price, then total. The total chip's unit
/// is "<CCY> total" so it never collides with the result's own unit.
pub fn deal_chips(deal: &DealMeta, locale: &str) -> Vec<ResultConversion> {
    let mut chips = Vec::with_capacity(2);
    if let Some(price) = deal.unit_price {
        chips.push(ResultConversion::new(
            format!("{}/{}", deal.currency, deal.per),
            format!("{} {} / {}", format_number(price, 2, locale), deal.currency, deal.per),
        ));
    }
    chips.push(ResultConversion::new(
        format!("{} total", deal.currency),
        format!("{} {} total", format_number(deal.total, 2, locale), deal.currency),
    ));
    chips
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_total() {
        let parsed = parse_deal_semantics("5 bags for 400 usd");
        assert_eq!(parsed.normalized, "400 USD");
        let deal = parsed.deal.unwrap();
        assert_eq!(deal.qty, 5.0);
        assert_eq!(deal.total, 400.0);
        assert_eq!(deal.unit_price, Some(80.0));
        assert_eq!(deal.per, "each");
        assert_eq!(deal.label.as_deref(), Some("bags"));
    }

    #[test]
    fn test_at_price() {
        let parsed = parse_deal_semantics("3 coffees @ 4.5 usd each");
        assert_eq!(parsed.normalized, "13.5 USD");
        assert_eq!(parsed.deal.unwrap().unit_price, Some(4.5));
    }

    #[test]
    fn test_per_unit_price() {
        let parsed = parse_deal_semantics("2.5 kg @ 15 BRL/kg");
        assert_eq!(parsed.normalized, "37.5 BRL");
        let deal = parsed.deal.unwrap();
        assert_eq!(deal.per, "kg");
        assert_eq!(deal.unit_price, Some(15.0));
    }

    #[test]
    fn test_mismatched_units_are_not_a_deal() {
        let parsed = parse_deal_semantics("2 kg 15 BRL/lb");
        assert_eq!(parsed.deal, None);
        assert_eq!(parsed.normalized, "2 kg 15 BRL/lb");
    }

    #[test]
    fn test_qty_unit_for_total() {
        let parsed = parse_deal_semantics("2kg of rice for 30 brl");
        assert_eq!(parsed.normalized, "30 BRL");
        let deal = parsed.deal.unwrap();
        assert_eq!(deal.per, "kg");
        assert_eq!(deal.unit_price, Some(15.0));
    }

    #[test]
    fn test_chips_order() {
        let deal = parse_deal_semantics("5 bags for 400 usd").deal.unwrap();
        let chips = deal_chips(&deal, "en-US");
        assert_eq!(chips[0], ResultConversion::new("USD/each", "80.00 USD / each"));
        assert_eq!(chips[1], ResultConversion::new("USD total", "400.00 USD total"));
    }

    #[test]
    fn test_zero_quantity_has_no_unit_price() {
        let deal = parse_deal_semantics("0 bags for 10 usd").deal.unwrap();
        assert_eq!(deal.unit_price, None);
        assert_eq!(deal_chips(&deal, "en-US").len(), 1);
    }
}
