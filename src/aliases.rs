//! Unit and currency word aliases (Portuguese and long English forms) mapped
//! to the short codes the detectors understand.

use once_cell::sync::Lazy;
use regex::Regex;

static UNIT_ALIASES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    compile(&[
        // length
        (r"\bquil[oô]metros?\b", " km "),
        (r"\bkilometres?\b", " km "),
        (r"\bkilometers?\b", " km "),
        (r"\bcent[ií]metros?\b", " cm "),
        (r"\bcentimet(?:er|re)s?\b", " cm "),
        (r"\bmil[ií]metros?\b", " mm "),
        (r"\bmillimet(?:er|re)s?\b", " mm "),
        (r"\bmetros?\b", " m "),
        (r"\bmet(?:er|re)s?\b", " m "),
        (r"\bp[ée]s\b", " ft "),
        (r"\bp[ée]\b", " ft "),
        (r"\bpolegadas?\b", " in "),
        (r"\bjardas?\b", " yd "),
        (r"\bmilhas?\b", " mi "),
        // mass
        (r"\bquilogramas?\b", " kg "),
        (r"\bkilograms?\b", " kg "),
        (r"\bgramas?\b", " g "),
        (r"\bgrams?\b", " g "),
        (r"\blibras?\b", " lb "),
        (r"\bpounds?\b", " lb "),
        (r"\bon[cç]as?\b", " oz "),
        (r"\bounces?\b", " oz "),
        // liquid volume
        (r"\bmill?ilitros?\b", " ml "),
        (r"\bmillilit(?:er|re)s?\b", " ml "),
        (r"\blitros?\b", " l "),
        (r"\blit(?:er|re)s?\b", " l "),
        (r"\bgal[oõ](?:es|ns)\b", " gal "),
        (r"\bgal[aã]o\b", " gal "),
        (r"\bgallons?\b", " gal "),
        // speed
        (r"\bkmh\b", " km/h "),
        (r"\bkph\b", " km/h "),
        (r"\bmph\b", " mph "),
        // temperature
        (r"\bcel(?:si(?:u|o))?s\b", " c "),
        (r"\bfahrenheit\b", " f "),
        (r"\bkelvin\b", " k "),
        // time
        (r"\bsegundos?\b", " s "),
        (r"\bseconds?\b", " s "),
        (r"\bminutos?\b", " min "),
        (r"\bminutes?\b", " min "),
        (r"\bhoras?\b", " h "),
        (r"\bhours?\b", " h "),
        (r"\bdias?\b", " d "),
        (r"\bsemanas?\b", " wk "),
    ])
});

static CURRENCY_ALIASES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    compile(&[
        (r"\breais\b", " BRL "),
        (r"\breal\b", " BRL "),
        (r"\bd[oó]lares\b", " USD "),
        (r"\bdollars?\b", " USD "),
        (r"\beuros?\b", " EUR "),
        (r"\byen(?:es)?\b", " JPY "),
        (r"\bfrancos?\b", " CHF "),
        (r"\bfrancs?\b", " CHF "),
    ])
});

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

fn compile(table: &[(&str, &'static str)]) -> Vec<(Regex, &'static str)> {
    table
        .iter()
        .map(|(pattern, code)| (Regex::new(&format!("(?i){}", pattern)).unwrap(), *code))
        .collect()
}

/// Replace alias words with space-padded codes and collapse whitespace.
/// Unit aliases run before currency aliases, so "libras" is pounds of mass.
/// Applying it twice gives the same text as applying it once.
pub fn normalize_unit_and_currency_aliases(input: &str) -> String {
    let mut s = format!(" {} ", input);
    for (re, code) in UNIT_ALIASES.iter().chain(CURRENCY_ALIASES.iter()) {
        if re.is_match(&s) {
            s = re.replace_all(&s, *code).into_owned();
        }
    }
    WHITESPACE.replace_all(&s, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_portuguese_units() {
        assert_eq!(normalize_unit_and_currency_aliases("3 quilômetros"), "3 km");
        assert_eq!(normalize_unit_and_currency_aliases("500 gramas em libras"), "500 g em lb");
        assert_eq!(normalize_unit_and_currency_aliases("2 horas"), "2 h");
    }

    #[test]
    fn test_currency_words() {
        assert_eq!(normalize_unit_and_currency_aliases("10 reais + 5 dólares"), "10 BRL + 5 USD");
        assert_eq!(normalize_unit_and_currency_aliases("20 euros"), "20 EUR");
    }

    #[test]
    fn test_idempotent() {
        for input in ["5 metros por segundo", "10 reais", "2 litros de leite", "1500 g in kg"] {
            let once = normalize_unit_and_currency_aliases(input);
            assert_eq!(normalize_unit_and_currency_aliases(&once), once);
        }
    }

    #[test]
    fn test_leaves_codes_alone() {
        assert_eq!(normalize_unit_and_currency_aliases("  12   kg "), "12 kg");
        assert_eq!(normalize_unit_and_currency_aliases("100 USD"), "100 USD");
    }
}
