//! Payload ingest and normalization.
//!
//! This module is responsible for turning the API's loosely-typed `data` rows
//! into `NormalizedRow`s that are safe to aggregate.
//!
//! Design goals:
//! - **One coercion path** for numbers (`parse_decimal`)
//! - **Field-level tolerance**: an unparseable value becomes `None` for that field
//! - **Row-level strictness** for periods: an unmapped code aborts the run
//! - **Arrival order preserved**; chronology is applied at aggregation time

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::{NormalizedRow, NumericField, PeriodScheme};

const KEY_DATA: &str = "data";
const KEY_PERIOD: &str = "dt_mes_bimestre";
const KEY_SEGMENT: &str = "no_segmento";
const KEY_ASSET: &str = "id_ativo";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty value")]
    Empty,
    #[error("not a number: '{0}'")]
    Invalid(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("Unrecognized period code '{code}' in row {row}; refusing to build a mislabeled summary")]
    Mapping { row: usize, code: String },
}

/// Parse a monetary/percentage string into `f64`.
///
/// Accepts Brazilian (`1.234,56`) and international (`1,234.56`) grouping,
/// a bare decimal comma (`100,50`), exponent notation (`1.5E3`), a leading
/// `R$`, a trailing `%`, and a sign before or after the currency symbol
/// (`-R$ 5`, `R$ -5`). Accounting parentheses `(5,00)` mean negative.
///
/// The last separator present is taken as the decimal separator; if only one
/// kind of separator occurs more than once it is treated as grouping. Any
/// other character makes the whole value invalid.
pub fn parse_decimal(raw: &str) -> Result<f64, ParseError> {
    let invalid = || ParseError::Invalid(raw.to_string());

    let mut s = raw.trim();
    if s.is_empty() {
        return Err(ParseError::Empty);
    }

    let mut parenthesized = false;
    if let Some(inner) = s.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
        parenthesized = true;
        s = inner.trim();
    }
    if let Some(rest) = s.strip_suffix('%') {
        s = rest.trim_end();
    }

    let (outer_sign, rest) = split_sign(s);
    s = rest;
    if let Some(rest) = s.strip_prefix("R$") {
        s = rest.trim_start();
    }
    let (inner_sign, rest) = split_sign(s);
    s = rest;

    let sign = match (outer_sign, inner_sign) {
        (Some(_), Some(_)) => return Err(invalid()),
        (a, b) => a.or(b),
    };
    let minus = sign == Some('-');
    if parenthesized && sign.is_some() {
        return Err(invalid());
    }

    let (mantissa, exponent) = match s.find(['e', 'E']) {
        Some(i) => (&s[..i], Some(&s[i + 1..])),
        None => (s, None),
    };

    if !mantissa.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',')
        || !mantissa.chars().any(|c| c.is_ascii_digit())
    {
        return Err(invalid());
    }
    if let Some(exp) = exponent {
        let digits = exp.strip_prefix(['+', '-']).unwrap_or(exp);
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
    }

    let commas = mantissa.matches(',').count();
    let dots = mantissa.matches('.').count();
    let last_comma = mantissa.rfind(',');
    let last_dot = mantissa.rfind('.');

    let canonical = match (last_comma, last_dot) {
        (Some(c), Some(d)) if c > d => {
            if commas > 1 {
                return Err(invalid());
            }
            mantissa.replace('.', "").replace(',', ".")
        }
        (Some(_), Some(_)) => {
            if dots > 1 {
                return Err(invalid());
            }
            mantissa.replace(',', "")
        }
        (Some(_), None) if commas == 1 => mantissa.replace(',', "."),
        (Some(_), None) => mantissa.replace(',', ""),
        (None, Some(_)) if dots > 1 => mantissa.replace('.', ""),
        _ => mantissa.to_string(),
    };

    let text = match exponent {
        Some(exp) => format!("{canonical}e{exp}"),
        None => canonical,
    };
    let value = text.parse::<f64>().map_err(|_| invalid())?;
    if !value.is_finite() {
        return Err(invalid());
    }
    Ok(if minus || parenthesized { -value } else { value })
}

fn split_sign(s: &str) -> (Option<char>, &str) {
    match s.chars().next() {
        Some(c @ ('-' | '+')) => (Some(c), s[1..].trim_start()),
        _ => (None, s),
    }
}

/// Coerce one JSON value into a number; `None` means "missing".
fn coerce_number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => parse_decimal(s).ok(),
        Value::Bool(_) | Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn coerce_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Period code as an integer; fractional or garbage codes are rejected.
fn coerce_period(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn describe(value: Option<&Value>) -> String {
    match value {
        None => "<missing>".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Normalize a parsed payload into typed rows.
pub fn normalize(payload: &Value, scheme: PeriodScheme) -> Result<Vec<NormalizedRow>, NormalizeError> {
    let data = payload
        .get(KEY_DATA)
        .ok_or_else(|| NormalizeError::Malformed("missing 'data' key".to_string()))?
        .as_array()
        .ok_or_else(|| NormalizeError::Malformed("'data' is not an array".to_string()))?;

    if data.is_empty() {
        warn!("No data returned by the API (empty 'data' array)");
        return Ok(Vec::new());
    }

    let mut rows = Vec::with_capacity(data.len());
    for (idx, item) in data.iter().enumerate() {
        let obj = item.as_object().ok_or_else(|| {
            NormalizeError::Malformed(format!("row {} is not an object", idx + 1))
        })?;
        rows.push(normalize_row(idx + 1, obj, scheme)?);
    }

    let missing_totals = rows.iter().filter(|r| r.total_value().is_none()).count();
    if missing_totals > 0 {
        debug!("{missing_totals} row(s) without a usable {}", NumericField::TotalValue.key());
    }

    if rows
        .iter()
        .filter_map(|r| r.total_value())
        .any(|v| v < 0.0)
    {
        warn!("Negative value found in '{}'", NumericField::TotalValue.key());
    }

    Ok(rows)
}

fn normalize_row(
    row: usize,
    obj: &Map<String, Value>,
    scheme: PeriodScheme,
) -> Result<NormalizedRow, NormalizeError> {
    let raw_period = obj.get(KEY_PERIOD);
    let month = coerce_period(raw_period)
        .and_then(|code| scheme.month_for(code))
        .ok_or_else(|| NormalizeError::Mapping {
            row,
            code: describe(raw_period),
        })?;

    let mut out = NormalizedRow::new(month);
    out.segment = coerce_text(obj.get(KEY_SEGMENT));
    out.asset_id = coerce_text(obj.get(KEY_ASSET));
    for field in NumericField::ALL {
        out.set(field, coerce_number(obj.get(field.key())));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Month;
    use serde_json::json;

    #[test]
    fn parse_decimal_handles_common_formats() {
        assert_eq!(parse_decimal("100,50").unwrap(), 100.50);
        assert_eq!(parse_decimal("1.234,56").unwrap(), 1234.56);
        assert_eq!(parse_decimal("1,234.56").unwrap(), 1234.56);
        assert_eq!(parse_decimal("100.50").unwrap(), 100.50);
        assert_eq!(parse_decimal(" R$ 2.500,00 ").unwrap(), 2500.0);
        assert_eq!(parse_decimal("1.234.567").unwrap(), 1_234_567.0);
        assert_eq!(parse_decimal("-12,5").unwrap(), -12.5);
        assert_eq!(parse_decimal("7,5%").unwrap(), 7.5);
    }

    #[test]
    fn parse_decimal_rejects_garbage() {
        assert_eq!(parse_decimal("   "), Err(ParseError::Empty));
        assert!(matches!(parse_decimal("n/d"), Err(ParseError::Invalid(_))));
        assert!(matches!(parse_decimal("1.2,3,4"), Err(ParseError::Invalid(_))));
    }

    #[test]
    fn parse_decimal_keeps_sign_after_currency_symbol() {
        assert_eq!(parse_decimal("R$ -1.234,56").unwrap(), -1234.56);
        assert_eq!(parse_decimal("-R$ 40,00").unwrap(), -40.0);
        assert_eq!(parse_decimal("(5,00)").unwrap(), -5.0);
        assert_eq!(parse_decimal("+3,5").unwrap(), 3.5);
        assert!(matches!(parse_decimal("-R$ -1"), Err(ParseError::Invalid(_))));
    }

    #[test]
    fn parse_decimal_accepts_exponent_notation() {
        assert_eq!(parse_decimal("1.5E7").unwrap(), 1.5e7);
        assert_eq!(parse_decimal("1e3").unwrap(), 1000.0);
        assert_eq!(parse_decimal("2,5e-2").unwrap(), 0.025);
        assert!(matches!(parse_decimal("1e"), Err(ParseError::Invalid(_))));
    }

    #[test]
    fn parse_decimal_rejects_stray_characters() {
        for raw in ["12abc", "2025-01-31", "5-", "R$", "1 2", "--1"] {
            assert!(matches!(parse_decimal(raw), Err(ParseError::Invalid(_))), "{raw}");
        }
    }

    #[test]
    fn unparseable_field_is_missing_not_zero() {
        let payload = json!({"data": [
            {"dt_mes_bimestre": 3, "vl_total_atual": "abc", "vl_patrimonio": 10.5, "no_segmento": "Renda Fixa"}
        ]});
        let rows = normalize(&payload, PeriodScheme::Monthly).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].month, Month::Marco);
        assert_eq!(rows[0].total_value(), None);
        assert_eq!(rows[0].get(NumericField::Patrimony), Some(10.5));
        assert_eq!(rows[0].segment.as_deref(), Some("Renda Fixa"));
    }

    #[test]
    fn period_codes_may_arrive_as_strings() {
        let payload = json!({"data": [{"dt_mes_bimestre": "11", "vl_total_atual": 1.0}]});
        let rows = normalize(&payload, PeriodScheme::Monthly).unwrap();
        assert_eq!(rows[0].month, Month::Novembro);
    }

    #[test]
    fn out_of_range_code_is_mapping_error() {
        let payload = json!({"data": [
            {"dt_mes_bimestre": 1, "vl_total_atual": "1,00"},
            {"dt_mes_bimestre": 7, "vl_total_atual": "1,00"}
        ]});
        let err = normalize(&payload, PeriodScheme::Bimester).unwrap_err();
        assert_eq!(
            err,
            NormalizeError::Mapping {
                row: 2,
                code: "7".to_string()
            }
        );
    }

    #[test]
    fn missing_period_is_mapping_error() {
        let payload = json!({"data": [{"vl_total_atual": "1,00"}]});
        let err = normalize(&payload, PeriodScheme::Monthly).unwrap_err();
        assert!(matches!(err, NormalizeError::Mapping { row: 1, .. }));
    }

    #[test]
    fn empty_data_is_not_an_error() {
        let rows = normalize(&json!({"data": []}), PeriodScheme::Monthly).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn payload_without_data_array_is_malformed() {
        assert!(matches!(
            normalize(&json!({"rows": []}), PeriodScheme::Monthly),
            Err(NormalizeError::Malformed(_))
        ));
        assert!(matches!(
            normalize(&json!({"data": {"a": 1}}), PeriodScheme::Monthly),
            Err(NormalizeError::Malformed(_))
        ));
    }

    #[test]
    fn arrival_order_is_preserved() {
        let payload = json!({"data": [
            {"dt_mes_bimestre": 5, "vl_total_atual": 1},
            {"dt_mes_bimestre": 1, "vl_total_atual": 2},
            {"dt_mes_bimestre": 3, "vl_total_atual": 3}
        ]});
        let rows = normalize(&payload, PeriodScheme::Monthly).unwrap();
        let months: Vec<Month> = rows.iter().map(|r| r.month).collect();
        assert_eq!(months, vec![Month::Maio, Month::Janeiro, Month::Marco]);
    }
}
