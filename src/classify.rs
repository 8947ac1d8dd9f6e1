//! Result kinds: which one a line resolves to, and how each kind renders
//! its value, precision and conversion chips.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::format::format_number;
use crate::market::{looks_like_currency_code, MarketData, COIN_SYMBOLS};
use crate::types::{CalculationResult, ResultConversion, ResultType};
use crate::units::{self, Extent, LengthLike};
use crate::units_extra;

static IN_CLAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+(?:in|to)\s+([A-Za-z°][A-Za-z°/²³0-9^]{0,7})\s*$").unwrap());

/// Conversion target from a trailing `in <unit>` / `to <unit>` clause.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Target {
    pub raw: String,
    pub mass: Option<&'static str>,
    pub currency: Option<String>,
    pub temperature: Option<&'static str>,
    pub data: Option<&'static str>,
    pub css: Option<&'static str>,
    pub length: Option<LengthLike>,
    pub speed: Option<&'static str>,
    pub angle: Option<&'static str>,
    pub duration: Option<&'static str>,
    pub liquid: Option<&'static str>,
    pub energy: Option<&'static str>,
    pub power: Option<&'static str>,
    pub pressure: Option<&'static str>,
}

impl Target {
    /// Every reading of `raw` as a unit, or `None` if it is not a unit at all.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut t = Target {
            raw: raw.to_string(),
            mass: units::canonical_mass(raw),
            temperature: units::canonical_temperature(raw),
            data: units::canonical_data(raw),
            css: unit_in(units::CSS, &raw.to_lowercase()),
            length: units::parse_length_target(raw),
            speed: units::canonical_speed(raw),
            angle: units::canonical_angle(raw),
            duration: units::canonical_duration(raw),
            liquid: units_extra::canonical_liquid(raw),
            energy: units_extra::canonical_energy(raw),
            power: units_extra::canonical_power(raw),
            pressure: units_extra::canonical_pressure(raw),
            ..Default::default()
        };
        // A three-letter word is a currency only when it is no unit we know
        if !t.is_unit() && looks_like_currency_code(raw) {
            t.currency = Some(raw.to_uppercase());
        }
        (t.is_unit() || t.currency.is_some()).then_some(t)
    }

    fn is_unit(&self) -> bool {
        self.mass.is_some()
            || self.temperature.is_some()
            || self.data.is_some()
            || self.css.is_some()
            || self.length.is_some()
            || self.speed.is_some()
            || self.angle.is_some()
            || self.duration.is_some()
            || self.liquid.is_some()
            || self.energy.is_some()
            || self.power.is_some()
            || self.pressure.is_some()
    }
}

fn unit_in(table: units::FactorTable, unit: &str) -> Option<&'static str> {
    units::unit_codes(table).find(|u| *u == unit)
}

/// Strip a trailing conversion clause. The clause must end the line and
/// name something recognizable; otherwise the text is left as is.
pub fn split_in_clause(input: &str) -> (String, Option<Target>) {
    let Some(caps) = IN_CLAUSE.captures(input) else {
        return (input.to_string(), None);
    };
    let (Some(whole), Some(raw)) = (caps.get(0), caps.get(1)) else {
        return (input.to_string(), None);
    };
    match Target::parse(raw.as_str()) {
        Some(target) => (input[..whole.start()].trim().to_string(), Some(target)),
        None => (input.to_string(), None),
    }
}

/// Units found in the normalized text, one detector per dimension.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detection {
    pub mass: Option<&'static str>,
    pub temperature: Option<&'static str>,
    pub data: Option<&'static str>,
    pub css: Option<&'static str>,
    pub length: Option<LengthLike>,
    pub speed: Option<&'static str>,
    pub angle: Option<&'static str>,
    pub liquid: Option<&'static str>,
    pub energy: Option<&'static str>,
    pub power: Option<&'static str>,
    pub pressure: Option<&'static str>,
}

impl Detection {
    pub fn scan(text: &str) -> Self {
        Self {
            mass: units::detect_mass_unit(text),
            temperature: units::detect_temperature_unit(text),
            data: units::detect_data_unit(text),
            css: units::detect_css_unit(text),
            length: units::detect_length_like(text),
            speed: units::detect_speed_unit(text),
            angle: units::detect_angle_unit(text),
            liquid: units_extra::detect_liquid_unit(text),
            energy: units_extra::detect_energy_unit(text),
            power: units_extra::detect_power_unit(text),
            pressure: units_extra::detect_pressure_unit(text),
        }
    }
}

/// The one kind a line resolves to, with source and target units settled.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectedKind {
    Mass { from: &'static str, to: &'static str },
    Temperature { from: &'static str, to: &'static str },
    Data { from: &'static str, to: &'static str },
    Css { from: &'static str, to: &'static str },
    Geometric { extent: Extent, from: &'static str, to: &'static str },
    Speed { from: &'static str, to: &'static str },
    Angle { from: &'static str, to: &'static str },
    Currency { target: Option<String> },
    Duration { to: &'static str },
    Liquid { from: &'static str, to: &'static str },
    Energy { from: &'static str, to: &'static str },
    Power { from: &'static str, to: &'static str },
    Pressure { from: &'static str, to: &'static str },
    Number,
}

/// Inputs to kind selection besides the unit detectors.
#[derive(Debug, Clone, Copy, Default)]
pub struct KindHints<'a> {
    pub target: Option<&'a Target>,
    pub used_currencies: Option<&'a BTreeSet<String>>,
    pub currency_query: Option<&'a str>,
    pub has_durations: bool,
}

// Source unit from the text or the kind default; target defaults to source
fn pair(
    found: Option<&'static str>,
    wanted: Option<&'static str>,
    default: &'static str,
) -> Option<(&'static str, &'static str)> {
    if found.is_none() && wanted.is_none() {
        return None;
    }
    let from = found.unwrap_or(default);
    Some((from, wanted.unwrap_or(from)))
}

/// First match wins: mass, temperature, data, css, length/area/volume,
/// speed, angle, currency, duration, liquid volume, energy, power,
/// pressure, then a plain number.
pub fn detect_kind(found: &Detection, hints: KindHints<'_>) -> DetectedKind {
    let t = hints.target.cloned().unwrap_or_default();

    if let Some((from, to)) = pair(found.mass, t.mass, "kg") {
        return DetectedKind::Mass { from, to };
    }
    if let Some((from, to)) = pair(found.temperature, t.temperature, "c") {
        return DetectedKind::Temperature { from, to };
    }
    if let Some((from, to)) = pair(found.data, t.data, "mb") {
        return DetectedKind::Data { from, to };
    }
    if let Some((from, to)) = pair(found.css, t.css, "px") {
        return DetectedKind::Css { from, to };
    }
    if found.length.is_some() || t.length.is_some() {
        let source = found.length.or(t.length).unwrap_or(LengthLike { extent: Extent::Length, unit: "m" });
        let from = if found.length.is_some() { source.unit } else { "m" };
        let to = t.length.map_or(from, |l| l.unit);
        return DetectedKind::Geometric { extent: source.extent, from, to };
    }
    if let Some((from, to)) = pair(found.speed, t.speed, "m/s") {
        return DetectedKind::Speed { from, to };
    }
    if let Some((from, to)) = pair(found.angle, t.angle, "deg") {
        return DetectedKind::Angle { from, to };
    }
    let currency_target = t.currency.clone().or_else(|| hints.currency_query.map(str::to_uppercase));
    if hints.used_currencies.is_some_and(|u| !u.is_empty()) || currency_target.is_some() {
        return DetectedKind::Currency { target: currency_target };
    }
    if hints.has_durations || t.duration.is_some() {
        return DetectedKind::Duration { to: t.duration.unwrap_or("s") };
    }
    if let Some((from, to)) = pair(found.liquid, t.liquid, "L") {
        return DetectedKind::Liquid { from, to };
    }
    if let Some((from, to)) = pair(found.energy, t.energy, "J") {
        return DetectedKind::Energy { from, to };
    }
    if let Some((from, to)) = pair(found.power, t.power, "W") {
        return DetectedKind::Power { from, to };
    }
    if let Some((from, to)) = pair(found.pressure, t.pressure, "Pa") {
        return DetectedKind::Pressure { from, to };
    }
    DetectedKind::Number
}

/// What a kind renderer needs besides the raw number.
pub struct RenderContext<'a> {
    pub locale: &'a str,
    pub market: &'a dyn MarketData,
    pub approximate: bool,
}

pub fn mass_precision(unit: &str) -> u32 {
    if unit == "g" || unit == "oz" { 1 } else { 2 }
}

pub fn data_precision(unit: &str, value: f64) -> u32 {
    if unit == "b" {
        0
    } else if value < 10.0 {
        3
    } else {
        2
    }
}

pub fn css_precision(unit: &str) -> u32 {
    if unit == "px" { 0 } else { 2 }
}

pub fn geometric_precision(extent: Extent) -> u32 {
    if extent == Extent::Length { 3 } else { 6 }
}

fn chip(value: f64, precision: u32, unit: &str, locale: &str) -> ResultConversion {
    ResultConversion::new(unit, format!("{} {}", format_number(value, precision, locale), unit))
}

fn finish(
    value: f64,
    precision: u32,
    unit: Option<String>,
    kind: ResultType,
    meta_kind: &str,
    conversions: Vec<ResultConversion>,
    locale: &str,
) -> CalculationResult {
    let mut r = CalculationResult::new(value, format_number(value, precision, locale), unit, kind);
    r.conversions = conversions;
    r.metadata.precision_applied = Some(precision);
    r.metadata.kind = Some(meta_kind.to_string());
    r
}

// Shared shape of the linear kinds: convert, format, and chip every other unit
fn render_linear(
    raw: f64,
    from: &str,
    to: &str,
    table: units::FactorTable,
    precision: fn(&str, f64) -> u32,
    kind: ResultType,
    locale: &str,
) -> Option<CalculationResult> {
    let out = units::convert_linear(table, raw, from, to)?;
    let chips = units::unit_codes(table)
        .filter(|u| *u != to)
        .filter_map(|u| {
            let v = units::convert_linear(table, raw, from, u)?;
            Some(chip(v, precision(u, v), u, locale))
        })
        .collect();
    let p = precision(to, out);
    Some(finish(out, p, Some(to.to_string()), kind, &kind.to_string(), chips, locale))
}

fn render_temperature(raw: f64, from: &str, to: &str, locale: &str) -> Option<CalculationResult> {
    let out = units::convert_temperature(raw, from, to)?;
    let chips = units::TEMPERATURE_UNITS
        .iter()
        .filter(|u| **u != to)
        .filter_map(|u| Some(chip(units::convert_temperature(raw, from, u)?, 2, &u.to_uppercase(), locale)))
        .collect();
    Some(finish(out, 2, Some(to.to_uppercase()), ResultType::Temperature, "temperature", chips, locale))
}

fn render_data(raw: f64, from: &str, to: &str, locale: &str) -> Option<CalculationResult> {
    let out = units::convert_data(raw, from, to)?;
    let chips = units::DATA_UNITS
        .iter()
        .filter(|u| **u != to)
        .filter_map(|u| {
            let v = units::convert_data(raw, from, u)?;
            Some(chip(v, data_precision(u, v), &units::data_label(u), locale))
        })
        .collect();
    let p = data_precision(to, out);
    Some(finish(out, p, Some(units::data_label(to)), ResultType::Data, "data", chips, locale))
}

fn render_geometric(raw: f64, extent: Extent, from: &str, to: &str, locale: &str) -> Option<CalculationResult> {
    let out = units::convert_length_pow(raw, from, to, extent)?;
    let p = geometric_precision(extent);
    let sup = extent.superscript();
    let chips = units::unit_codes(units::LENGTH)
        .filter(|u| *u != to)
        .filter_map(|u| Some(chip(units::convert_length_pow(raw, from, u, extent)?, p, &format!("{}{}", u, sup), locale)))
        .collect();
    let kind = match extent {
        Extent::Length => ResultType::Length,
        Extent::Area => ResultType::Area,
        Extent::Volume => ResultType::Volume,
    };
    Some(finish(out, p, Some(format!("{}{}", to, sup)), kind, extent.name(), chips, locale))
}

/// The raw number is in base currency. The target applies only if the
/// market can price it; otherwise the result stays in base.
fn render_currency(raw: f64, target: Option<&str>, ctx: &RenderContext<'_>) -> CalculationResult {
    let market = ctx.market;
    let base = market.base_currency().to_string();
    let (desired, value) = match target.and_then(|t| Some((t, market.convert_from_base(raw, t)?))) {
        Some((t, v)) if t != base => (t.to_string(), v),
        _ => (base.clone(), raw),
    };

    let prefix = if ctx.approximate { "~ " } else { "" };
    let mut chips: Vec<ResultConversion> = market
        .currency_codes()
        .into_iter()
        .filter(|code| *code != desired)
        .filter_map(|code| {
            let v = market.convert_from_base(raw, &code)?;
            let display = format!("{}{} {}", prefix, format_number(v, 2, ctx.locale), code);
            Some(ResultConversion::new(code, display))
        })
        .collect();
    for symbol in COIN_SYMBOLS {
        if let Some(amount) = market.coin_amount_from_base(raw, symbol) {
            let p = if amount < 1.0 { 6 } else { 3 };
            chips.push(chip(amount, p, symbol, ctx.locale));
        }
    }

    let mut r = finish(value, 2, Some(desired), ResultType::Currency, "currency", chips, ctx.locale);
    if ctx.approximate {
        r.metadata.approximate = Some(true);
    }
    r
}

fn render_duration(seconds: f64, to: &str, locale: &str) -> Option<CalculationResult> {
    let out = units::convert_duration(seconds, "s", to)?;
    let chips = units::unit_codes(units::DURATION)
        .filter(|u| *u != to)
        .filter_map(|u| Some(chip(units::convert_duration(seconds, "s", u)?, 3, u, locale)))
        .collect();
    Some(finish(out, 3, Some(to.to_string()), ResultType::Duration, "duration", chips, locale))
}

/// Render `raw` as `kind`. `None` only if a unit code was unknown to its
/// table, which the detectors never produce.
pub fn render(kind: &DetectedKind, raw: f64, ctx: &RenderContext<'_>) -> Option<CalculationResult> {
    let locale = ctx.locale;
    log::debug!("rendering {:?}", kind);
    match kind {
        DetectedKind::Mass { from, to } => {
            render_linear(raw, from, to, units::MASS, |u, _| mass_precision(u), ResultType::Mass, locale)
        }
        DetectedKind::Temperature { from, to } => render_temperature(raw, from, to, locale),
        DetectedKind::Data { from, to } => render_data(raw, from, to, locale),
        DetectedKind::Css { from, to } => {
            render_linear(raw, from, to, units::CSS, |u, _| css_precision(u), ResultType::Css, locale)
        }
        DetectedKind::Geometric { extent, from, to } => render_geometric(raw, *extent, from, to, locale),
        DetectedKind::Speed { from, to } => {
            render_linear(raw, from, to, units::SPEED, |_, _| 2, ResultType::Speed, locale)
        }
        DetectedKind::Angle { from, to } => {
            render_linear(raw, from, to, units::ANGLE, |_, _| 3, ResultType::Angle, locale)
        }
        DetectedKind::Currency { target } => Some(render_currency(raw, target.as_deref(), ctx)),
        DetectedKind::Duration { to } => render_duration(raw, to, locale),
        DetectedKind::Liquid { from, to } => render_linear(
            raw,
            from,
            to,
            units_extra::LIQUID,
            |u, _| units_extra::liquid_precision(u),
            ResultType::Volume,
            locale,
        ),
        DetectedKind::Energy { from, to } => {
            render_linear(raw, from, to, units_extra::ENERGY, units_extra::energy_precision, ResultType::Energy, locale)
        }
        DetectedKind::Power { from, to } => {
            render_linear(raw, from, to, units_extra::POWER, units_extra::power_precision, ResultType::Power, locale)
        }
        DetectedKind::Pressure { from, to } => render_linear(
            raw,
            from,
            to,
            units_extra::PRESSURE,
            units_extra::pressure_precision,
            ResultType::Pressure,
            locale,
        ),
        DetectedKind::Number => {
            Some(finish(raw, 3, None, ResultType::Number, "dimensionless", Vec::new(), locale))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::StaticMarketData;

    fn ctx(market: &StaticMarketData) -> RenderContext<'_> {
        RenderContext { locale: "en-US", market, approximate: false }
    }

    #[test]
    fn test_in_clause() {
        let (expr, target) = split_in_clause("1500 g in kg");
        assert_eq!(expr, "1500 g");
        assert_eq!(target.unwrap().mass, Some("kg"));

        let (_, target) = split_in_clause("20 m/s to km/h");
        assert_eq!(target.unwrap().speed, Some("km/h"));

        let (_, target) = split_in_clause("100 usd in eur");
        assert_eq!(target.unwrap().currency.as_deref(), Some("EUR"));

        // "min" is a unit, so never a currency
        let (_, target) = split_in_clause("2 h in min");
        let target = target.unwrap();
        assert_eq!(target.duration, Some("min"));
        assert_eq!(target.currency, None);

        // unknown words are not targets
        let (expr, target) = split_in_clause("put it in basket");
        assert_eq!(expr, "put it in basket");
        assert!(target.is_none());
    }

    #[test]
    fn test_priority_mass_over_currency() {
        let found = Detection::scan("5 kg + 3 USD");
        let used: BTreeSet<String> = ["USD".to_string()].into();
        let hints = KindHints { used_currencies: Some(&used), ..Default::default() };
        assert_eq!(detect_kind(&found, hints), DetectedKind::Mass { from: "kg", to: "kg" });
    }

    #[test]
    fn test_target_alone_selects_kind() {
        let (_, target) = split_in_clause("5 0.3 in kg");
        let hints = KindHints { target: target.as_ref(), ..Default::default() };
        assert_eq!(detect_kind(&Detection::default(), hints), DetectedKind::Mass { from: "kg", to: "kg" });
        assert_eq!(detect_kind(&Detection::default(), KindHints::default()), DetectedKind::Number);
    }

    #[test]
    fn test_render_mass() {
        let market = StaticMarketData::fallback();
        let r = render(&DetectedKind::Mass { from: "g", to: "kg" }, 1500.0, &ctx(&market)).unwrap();
        assert_eq!(r.value, 1.5);
        assert_eq!(r.formatted, "1.50");
        assert_eq!(r.unit.as_deref(), Some("kg"));
        assert!(r.conversions.iter().all(|c| c.unit != "kg"));
        let grams = r.conversions.iter().find(|c| c.unit == "g").unwrap();
        assert_eq!(grams.display, "1,500.0 g");
    }

    #[test]
    fn test_render_temperature_and_data() {
        let market = StaticMarketData::fallback();
        let t = render(&DetectedKind::Temperature { from: "c", to: "f" }, 0.0, &ctx(&market)).unwrap();
        assert_eq!(t.unit.as_deref(), Some("F"));
        assert!((t.value - 32.0).abs() < 1e-9);

        let d = render(&DetectedKind::Data { from: "gb", to: "mb" }, 2.0, &ctx(&market)).unwrap();
        assert_eq!(d.unit.as_deref(), Some("MB"));
        assert!((d.value - 2000.0).abs() < 1e-9);
        assert!(d.conversions.iter().any(|c| c.unit == "GiB"));
    }

    #[test]
    fn test_render_area_units_carry_power() {
        let market = StaticMarketData::fallback();
        let kind = DetectedKind::Geometric { extent: Extent::Area, from: "m", to: "cm" };
        let r = render(&kind, 1.0, &ctx(&market)).unwrap();
        assert_eq!(r.kind, ResultType::Area);
        assert_eq!(r.unit.as_deref(), Some("cm²"));
        assert!((r.value - 10_000.0).abs() < 1e-6);
        assert!(r.conversions.iter().any(|c| c.unit == "m²"));
    }

    #[test]
    fn test_render_currency_target() {
        let market = StaticMarketData::new("USD").with_rate("EUR", 0.9).with_coin("BTC", 60_000.0);
        let r = render(&DetectedKind::Currency { target: Some("EUR".into()) }, 100.0, &ctx(&market)).unwrap();
        assert_eq!(r.unit.as_deref(), Some("EUR"));
        assert!((r.value - 90.0).abs() < 1e-9);
        assert!(r.conversions.iter().any(|c| c.unit == "USD"));
        assert!(r.conversions.iter().all(|c| c.unit != "EUR"));
        let btc = r.conversions.iter().find(|c| c.unit == "BTC").unwrap();
        assert_eq!(btc.display, "0.001667 BTC");

        // an unpriced target falls back to base
        let r = render(&DetectedKind::Currency { target: Some("XYZ".into()) }, 5.0, &ctx(&market)).unwrap();
        assert_eq!(r.unit.as_deref(), Some("USD"));
    }

    #[test]
    fn test_approximate_currency_chips() {
        let market = StaticMarketData::new("USD").with_rate("EUR", 0.9);
        let ctx = RenderContext { locale: "en-US", market: &market, approximate: true };
        let r = render(&DetectedKind::Currency { target: None }, 10.0, &ctx).unwrap();
        assert_eq!(r.conversions[0].display, "~ 9.00 EUR");
        assert_eq!(r.metadata.approximate, Some(true));
    }

    #[test]
    fn test_render_number() {
        let market = StaticMarketData::fallback();
        let r = render(&DetectedKind::Number, 2.0 / 3.0, &ctx(&market)).unwrap();
        assert_eq!(r.formatted, "0.667");
        assert_eq!(r.metadata.kind.as_deref(), Some("dimensionless"));
        assert!(r.conversions.is_empty());
    }
}
