//! Value format diversifier: explicit per-category surface encodings.
//!
//! Each category enumerates its encodings; `decode` tries them in a fixed,
//! documented priority order and returns the first exact parse. That order is
//! part of the contract: the cross-reference validator and any downstream
//! normalizer must reproduce identical results.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::value::{EncodedValue, Phone, Value};

/// Multiplier for the abbreviated currency form (`12K` = 12_000).
///
/// Abbreviation rounds to the nearest unit, so decoding recovers the original
/// within ± half a unit; we document the looser bound `< CURRENCY_ABBREV_UNIT`
/// as the contract tolerance.
pub const CURRENCY_ABBREV_UNIT: f64 = 1000.0;

/// A canonical value that cannot be represented by the selected encoding.
///
/// Non-fatal: callers fall back to the category's missing marker and log.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("value `{value}` cannot be represented by encoding `{encoding}`")]
    Unrepresentable { encoding: &'static str, value: String },
}

/// A surface string no enabled encoding can parse back.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unparseable {category} value: `{raw}`")]
pub struct Unparseable {
    pub category: &'static str,
    pub raw: String,
}

fn unparseable(category: &'static str, raw: &str) -> Unparseable {
    Unparseable {
        category,
        raw: raw.to_string(),
    }
}

// ============================================================================
// Dates
// ============================================================================

/// Date surface encodings.
///
/// Decode priority: `Iso`, `SlashDmy`, `SlashDmyShort`, `DashDayMonYear`,
/// `DashDayMonYearShort`, then a 10-digit unix epoch. Slash and dash forms
/// are disambiguated by the year token width before parsing, so `25/09/22`
/// never parses as year 22 CE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateEncoding {
    /// `2022-09-25`
    Iso,
    /// `25/09/2022`
    SlashDmy,
    /// `25/09/22`
    SlashDmyShort,
    /// `25-Sep-2022`
    DashDayMonYear,
    /// `25-Sep-22`
    DashDayMonYearShort,
    /// `"1664064000"`
    EpochText,
    /// `1664064000` as a bare integer
    EpochInt,
}

fn date_epoch_seconds(d: NaiveDate) -> i64 {
    NaiveDateTime::new(d, NaiveTime::MIN).and_utc().timestamp()
}

pub fn encode_date(d: NaiveDate, enc: DateEncoding) -> EncodedValue {
    match enc {
        DateEncoding::Iso => EncodedValue::Text(d.format("%Y-%m-%d").to_string()),
        DateEncoding::SlashDmy => EncodedValue::Text(d.format("%d/%m/%Y").to_string()),
        DateEncoding::SlashDmyShort => EncodedValue::Text(d.format("%d/%m/%y").to_string()),
        DateEncoding::DashDayMonYear => EncodedValue::Text(d.format("%d-%b-%Y").to_string()),
        DateEncoding::DashDayMonYearShort => EncodedValue::Text(d.format("%d-%b-%y").to_string()),
        DateEncoding::EpochText => EncodedValue::Text(date_epoch_seconds(d).to_string()),
        DateEncoding::EpochInt => EncodedValue::Int(date_epoch_seconds(d)),
    }
}

pub fn decode_date(raw: &str) -> Result<NaiveDate, Unparseable> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(unparseable("date", raw));
    }

    if s.contains('/') {
        let year_width = s.rsplit('/').next().map(str::len).unwrap_or(0);
        let fmt = if year_width == 4 { "%d/%m/%Y" } else { "%d/%m/%y" };
        return NaiveDate::parse_from_str(s, fmt).map_err(|_| unparseable("date", raw));
    }

    if s.len() == 10 && s.bytes().all(|b| b.is_ascii_digit()) {
        // 10-digit unix epoch as string or integer; seconds resolution.
        let ts: i64 = s.parse().map_err(|_| unparseable("date", raw))?;
        return chrono::DateTime::from_timestamp(ts, 0)
            .map(|dt| dt.date_naive())
            .ok_or_else(|| unparseable("date", raw));
    }

    let parts: Vec<&str> = s.split('-').collect();
    if parts.len() == 3 {
        let fmt = if parts[0].len() == 4 {
            "%Y-%m-%d"
        } else if parts[2].len() == 4 {
            "%d-%b-%Y"
        } else {
            "%d-%b-%y"
        };
        return NaiveDate::parse_from_str(s, fmt).map_err(|_| unparseable("date", raw));
    }

    Err(unparseable("date", raw))
}

// ============================================================================
// Currency
// ============================================================================

/// Currency surface encodings.
///
/// Decode priority: explicit-missing (empty string), quoted-grouped, plain /
/// symbol-grouped (these normalize identically), then the `K` abbreviation.
/// Decode tolerates a trailing `.0`, surrounding double quotes, `$`/`€`
/// symbols, and grouping commas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurrencyEncoding {
    /// `1775.0`
    PlainDecimal,
    /// `$1,775.00`
    SymbolGrouped,
    /// `"1,775.00"` (the quotes are part of the value, as in legacy exports)
    QuotedGrouped,
    /// `12K`; lossy for non-round thousands (see [`CURRENCY_ABBREV_UNIT`]).
    AbbrevK,
}

fn group_thousands(mut n: u64) -> String {
    let mut groups = Vec::new();
    loop {
        let rem = n % 1000;
        n /= 1000;
        if n == 0 {
            groups.push(rem.to_string());
            break;
        }
        groups.push(format!("{rem:03}"));
    }
    groups.reverse();
    groups.join(",")
}

fn grouped_2dp(v: f64) -> String {
    let cents = (v.abs() * 100.0).round() as u64;
    let sign = if v < 0.0 { "-" } else { "" };
    format!("{sign}{}.{:02}", group_thousands(cents / 100), cents % 100)
}

pub fn encode_currency(v: f64, enc: CurrencyEncoding) -> Result<EncodedValue, EncodeError> {
    match enc {
        CurrencyEncoding::PlainDecimal => {
            let text = if v.fract() == 0.0 {
                format!("{v:.1}")
            } else {
                v.to_string()
            };
            Ok(EncodedValue::Text(text))
        }
        CurrencyEncoding::SymbolGrouped => {
            let body = grouped_2dp(v);
            let text = if let Some(stripped) = body.strip_prefix('-') {
                format!("-${stripped}")
            } else {
                format!("${body}")
            };
            Ok(EncodedValue::Text(text))
        }
        CurrencyEncoding::QuotedGrouped => Ok(EncodedValue::Text(format!("\"{}\"", grouped_2dp(v)))),
        CurrencyEncoding::AbbrevK => {
            if v < 0.0 {
                return Err(EncodeError::Unrepresentable {
                    encoding: "abbrev_k",
                    value: v.to_string(),
                });
            }
            let thousands = (v / CURRENCY_ABBREV_UNIT).round() as i64;
            Ok(EncodedValue::Text(format!("{thousands}K")))
        }
    }
}

/// Decode a currency surface string. An empty string is the explicit missing
/// sentinel, not an error.
pub fn decode_currency(raw: &str) -> Result<Value, Unparseable> {
    let mut s = raw.trim();
    if s.is_empty() {
        return Ok(Value::Missing);
    }
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        s = s[1..s.len() - 1].trim();
        if s.is_empty() {
            return Ok(Value::Missing);
        }
    }
    s = s.trim_start_matches(['$', '€']).trim();

    if let Some(body) = s.strip_suffix(['K', 'k']) {
        let thousands: f64 = body
            .replace(',', "")
            .parse()
            .map_err(|_| unparseable("currency", raw))?;
        return Ok(Value::Currency(thousands * CURRENCY_ABBREV_UNIT));
    }

    let cleaned = s.replace(',', "");
    cleaned
        .parse::<f64>()
        .map(Value::Currency)
        .map_err(|_| unparseable("currency", raw))
}

// ============================================================================
// Phones
// ============================================================================

/// Phone surface encodings. All render the same ten digits; decode collapses
/// to digits (tolerating a leading `1` country code) and is exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhoneEncoding {
    /// `(212) 555-4829`
    ParenUs,
    /// `+1-212-555-4829`
    IntlDash,
    /// `212.555.4829`
    Dotted,
    /// `212-555-4829`
    Dashed,
}

pub fn encode_phone(p: Phone, enc: PhoneEncoding) -> EncodedValue {
    let Phone { area, exchange, line } = p;
    let text = match enc {
        PhoneEncoding::ParenUs => format!("({area}) {exchange}-{line}"),
        PhoneEncoding::IntlDash => format!("+1-{area}-{exchange}-{line}"),
        PhoneEncoding::Dotted => format!("{area}.{exchange}.{line}"),
        PhoneEncoding::Dashed => format!("{area}-{exchange}-{line}"),
    };
    EncodedValue::Text(text)
}

pub fn decode_phone(raw: &str) -> Result<Phone, Unparseable> {
    let digits: Vec<u8> = raw.bytes().filter(|b| b.is_ascii_digit()).collect();
    let digits = match digits.len() {
        10 => &digits[..],
        11 if digits[0] == b'1' => &digits[1..],
        _ => return Err(unparseable("phone", raw)),
    };
    let field = |range: std::ops::Range<usize>| -> u16 {
        digits[range]
            .iter()
            .fold(0u16, |acc, b| acc * 10 + u16::from(b - b'0'))
    };
    Ok(Phone {
        area: field(0..3),
        exchange: field(3..6),
        line: field(6..10),
    })
}

// ============================================================================
// Labels
// ============================================================================

/// Closed-vocabulary label encodings (case drift only; `sector` vs `industry`
/// style differences live in the projection specs, not here).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelEncoding {
    Canonical,
    Lower,
    Upper,
}

pub fn encode_label(s: &str, enc: LabelEncoding) -> EncodedValue {
    let text = match enc {
        LabelEncoding::Canonical => s.to_string(),
        LabelEncoding::Lower => s.to_lowercase(),
        LabelEncoding::Upper => s.to_uppercase(),
    };
    EncodedValue::Text(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn date_round_trips_every_encoding() {
        let date = d(2022, 9, 25);
        for enc in [
            DateEncoding::Iso,
            DateEncoding::SlashDmy,
            DateEncoding::SlashDmyShort,
            DateEncoding::DashDayMonYear,
            DateEncoding::DashDayMonYearShort,
            DateEncoding::EpochText,
            DateEncoding::EpochInt,
        ] {
            let surface = encode_date(date, enc).render();
            assert_eq!(decode_date(&surface).unwrap(), date, "encoding {enc:?} -> {surface}");
        }
    }

    #[test]
    fn short_slash_year_is_not_year_22_ce() {
        assert_eq!(decode_date("25/09/22").unwrap(), d(2022, 9, 25));
        assert_eq!(decode_date("25/09/2022").unwrap(), d(2022, 9, 25));
    }

    #[test]
    fn dash_mon_forms_parse() {
        assert_eq!(decode_date("25-Oct-2021").unwrap(), d(2021, 10, 25));
        assert_eq!(decode_date("03-Jan-19").unwrap(), d(2019, 1, 3));
    }

    #[test]
    fn epoch_must_be_ten_digits() {
        assert_eq!(decode_date("1664064000").unwrap(), d(2022, 9, 25));
        // Digit runs of any other width are not dates.
        assert!(decode_date("1234").is_err());
        assert!(decode_date("16640640001").is_err());
    }

    #[test]
    fn currency_plain_decimal_scenario() {
        let surface = encode_currency(1775.0, CurrencyEncoding::PlainDecimal).unwrap();
        assert_eq!(surface, EncodedValue::Text("1775.0".to_string()));
        assert_eq!(decode_currency("1775.0").unwrap(), Value::Currency(1775.0));
    }

    #[test]
    fn currency_symbol_grouped_scenario() {
        let surface = encode_currency(1775.0, CurrencyEncoding::SymbolGrouped).unwrap();
        assert_eq!(surface, EncodedValue::Text("$1,775.00".to_string()));
        assert_eq!(decode_currency("$1,775.00").unwrap(), Value::Currency(1775.0));
    }

    #[test]
    fn currency_quoted_and_symbols_tolerated() {
        assert_eq!(decode_currency("\"12,000,000.00\"").unwrap(), Value::Currency(12_000_000.0));
        assert_eq!(decode_currency("€12,000,000").unwrap(), Value::Currency(12_000_000.0));
    }

    #[test]
    fn currency_empty_is_missing_not_error() {
        assert_eq!(decode_currency("").unwrap(), Value::Missing);
        assert_eq!(decode_currency("  ").unwrap(), Value::Missing);
        assert_eq!(decode_currency("\"\"").unwrap(), Value::Missing);
    }

    #[test]
    fn currency_abbrev_expands_by_exact_multiplier() {
        let surface = encode_currency(12_000.0, CurrencyEncoding::AbbrevK).unwrap();
        assert_eq!(surface, EncodedValue::Text("12K".to_string()));
        assert_eq!(decode_currency("12K").unwrap(), Value::Currency(12_000.0));
    }

    #[test]
    fn currency_abbrev_rejects_negative() {
        let err = encode_currency(-5.0, CurrencyEncoding::AbbrevK).unwrap_err();
        assert!(matches!(err, EncodeError::Unrepresentable { encoding: "abbrev_k", .. }));
    }

    #[test]
    fn phone_round_trips_every_encoding() {
        let phone = Phone { area: 212, exchange: 555, line: 4829 };
        for enc in [
            PhoneEncoding::ParenUs,
            PhoneEncoding::IntlDash,
            PhoneEncoding::Dotted,
            PhoneEncoding::Dashed,
        ] {
            let surface = encode_phone(phone, enc).render();
            assert_eq!(decode_phone(&surface).unwrap(), phone, "encoding {enc:?} -> {surface}");
        }
    }

    #[test]
    fn phone_rejects_wrong_digit_count() {
        assert!(decode_phone("555-0147").is_err());
        assert!(decode_phone("2022-09-25").is_err());
    }

    proptest! {
        #[test]
        fn prop_date_round_trip(days in 0i64..7300) {
            let date = d(2006, 1, 1) + chrono::Days::new(days as u64);
            for enc in [
                DateEncoding::Iso,
                DateEncoding::SlashDmy,
                DateEncoding::SlashDmyShort,
                DateEncoding::DashDayMonYear,
                DateEncoding::DashDayMonYearShort,
                DateEncoding::EpochText,
            ] {
                let surface = encode_date(date, enc).render();
                prop_assert_eq!(decode_date(&surface).unwrap(), date);
            }
        }

        #[test]
        fn prop_currency_grouped_round_trip(cents in 0u64..10_000_000_000) {
            let v = cents as f64 / 100.0;
            let surface = encode_currency(v, CurrencyEncoding::SymbolGrouped).unwrap().render();
            match decode_currency(&surface).unwrap() {
                Value::Currency(back) => prop_assert!((back - v).abs() < 0.005),
                other => prop_assert!(false, "unexpected {:?}", other),
            }
        }

        #[test]
        fn prop_currency_abbrev_within_tolerance(v in 0.0f64..10_000_000.0) {
            let surface = encode_currency(v, CurrencyEncoding::AbbrevK).unwrap().render();
            match decode_currency(&surface).unwrap() {
                Value::Currency(back) => prop_assert!((back - v).abs() < CURRENCY_ABBREV_UNIT),
                other => prop_assert!(false, "unexpected {:?}", other),
            }
        }

        #[test]
        fn prop_phone_round_trip(area in 200u16..999, exchange in 200u16..999, line in 1000u16..9999) {
            let phone = Phone { area, exchange, line };
            for enc in [PhoneEncoding::ParenUs, PhoneEncoding::IntlDash, PhoneEncoding::Dotted, PhoneEncoding::Dashed] {
                let surface = encode_phone(phone, enc).render();
                prop_assert_eq!(decode_phone(&surface).unwrap(), phone);
            }
        }
    }
}
