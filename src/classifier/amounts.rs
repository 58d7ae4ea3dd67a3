/// Safe numeric coercion for upstream amount fields
///
/// Upstream payloads carry amounts as integers, floats or digit strings
/// depending on the endpoint and token decimals. Classification must never
/// fail on malformed data, so anything unrecognizable coerces to zero.
use serde_json::Value;

/// Coerce a raw JSON value into a non-negative lamport magnitude
///
/// Accepts signed 64-bit-range integers (magnitude taken), finite floats
/// (truncated toward zero, magnitude taken) and pure-digit strings. Anything
/// else - null, objects, exponent/decimal strings, NaN - coerces to zero.
pub fn coerce_amount(value: &Value) -> u64 {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return i.unsigned_abs();
            }
            if let Some(u) = n.as_u64() {
                return u;
            }
            if let Some(f) = n.as_f64() {
                if f.is_finite() {
                    return f.trunc().abs() as u64;
                }
            }
            0
        }
        Value::String(s) => {
            if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
                s.parse::<u64>().unwrap_or(0)
            } else {
                0
            }
        }
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_integer_amounts() {
        assert_eq!(coerce_amount(&json!(1_000_000_000u64)), 1_000_000_000);
        assert_eq!(coerce_amount(&json!(-500)), 500);
        assert_eq!(coerce_amount(&json!(0)), 0);
        assert_eq!(coerce_amount(&json!(u64::MAX)), u64::MAX);
    }

    #[test]
    fn test_float_amounts_truncate_toward_zero() {
        assert_eq!(coerce_amount(&json!(123.9)), 123);
        assert_eq!(coerce_amount(&json!(-123.9)), 123);
        assert_eq!(coerce_amount(&json!(0.4)), 0);
    }

    #[test]
    fn test_digit_strings() {
        assert_eq!(coerce_amount(&json!("900000000")), 900_000_000);
        assert_eq!(coerce_amount(&json!("0")), 0);
    }

    #[test]
    fn test_malformed_values_coerce_to_zero() {
        assert_eq!(coerce_amount(&json!("12.5")), 0);
        assert_eq!(coerce_amount(&json!("1e9")), 0);
        assert_eq!(coerce_amount(&json!("-42")), 0);
        assert_eq!(coerce_amount(&json!("")), 0);
        assert_eq!(coerce_amount(&json!("abc")), 0);
        assert_eq!(coerce_amount(&json!(null)), 0);
        assert_eq!(coerce_amount(&json!({"lamports": 5})), 0);
        assert_eq!(coerce_amount(&json!([1, 2])), 0);
        assert_eq!(coerce_amount(&json!(true)), 0);
    }

    #[test]
    fn test_overflowing_digit_string_coerces_to_zero() {
        assert_eq!(coerce_amount(&json!("99999999999999999999999999")), 0);
    }
}
