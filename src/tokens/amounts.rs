/// Conversions between human amounts and raw integer units
use crate::errors::{EngineResult, SwapEngineError};
use ethers::types::U256;
use ethers::utils::parse_units;

/// Parse a decimal string into raw units, e.g. "0.01" with 18 decimals is 10^16
///
/// Rejects signs, exponents, empty input and more fractional digits than the
/// token supports.
pub fn to_raw_units(amount: &str, decimals: u8) -> EngineResult<U256> {
    let trimmed = amount.trim();
    if trimmed.is_empty() {
        return Err(SwapEngineError::invalid_amount(amount, "empty amount"));
    }
    if trimmed.starts_with('-') {
        return Err(SwapEngineError::invalid_amount(amount, "amount must not be negative"));
    }

    let (integer, fraction) = match trimmed.split_once('.') {
        Some((integer, fraction)) => (integer, fraction),
        None => (trimmed, ""),
    };

    let all_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
    if !all_digits(integer) || !all_digits(fraction) || (integer.is_empty() && fraction.is_empty()) {
        return Err(SwapEngineError::invalid_amount(amount, "not a decimal number"));
    }
    if fraction.len() > decimals as usize {
        return Err(SwapEngineError::invalid_amount(
            amount,
            format!("more than {} fractional digits", decimals),
        ));
    }

    let normalized = format!(
        "{}.{}",
        if integer.is_empty() { "0" } else { integer },
        if fraction.is_empty() { "0" } else { fraction }
    );
    let parsed = parse_units(normalized, decimals as u32)
        .map_err(|e| SwapEngineError::invalid_amount(amount, e.to_string()))?;
    Ok(parsed.into())
}

/// Lossy conversion used for display and scoring
pub fn u256_to_f64(value: U256) -> f64 {
    value
        .0
        .iter()
        .rev()
        .fold(0.0_f64, |acc, limb| acc * 18_446_744_073_709_551_616.0 + *limb as f64)
}

/// Integer part of finite non-negative values, `None` otherwise
pub fn f64_to_u256(value: f64) -> Option<U256> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    U256::from_dec_str(&format!("{:.0}", value.floor())).ok()
}

pub fn from_raw_units(raw: U256, decimals: u8) -> f64 {
    u256_to_f64(raw) / 10f64.powi(decimals as i32)
}

/// `"{:.4} SYMBOL"`, the balance display format
pub fn format_amount(raw: U256, decimals: u8, symbol: &str) -> String {
    format!("{:.4} {}", from_raw_units(raw, decimals), symbol)
}

pub fn gwei_to_wei(gwei: f64) -> EngineResult<U256> {
    if !gwei.is_finite() || gwei < 0.0 {
        return Err(SwapEngineError::invalid_amount(
            gwei.to_string(),
            "gas price must be a non-negative number",
        ));
    }
    let parsed = parse_units(format!("{:.9}", gwei), "gwei")
        .map_err(|e| SwapEngineError::invalid_amount(gwei.to_string(), e.to_string()))?;
    Ok(parsed.into())
}

pub fn wei_to_gwei(wei: U256) -> f64 {
    u256_to_f64(wei) / 1e9
}

/// `raw * percentage / 100` with two decimal places of percentage precision
pub fn apply_percentage(raw: U256, percentage: f64) -> EngineResult<U256> {
    if !percentage.is_finite() || percentage <= 0.0 || percentage > 100.0 {
        return Err(SwapEngineError::invalid_amount(
            percentage.to_string(),
            "percentage must be within (0, 100]",
        ));
    }
    let basis_points = (percentage * 100.0).round() as u64;
    let scaled = raw
        .checked_mul(U256::from(basis_points))
        .ok_or_else(|| SwapEngineError::overflow("percentage of balance"))?;
    Ok(scaled / U256::from(10_000u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_raw_units() {
        assert_eq!(
            to_raw_units("0.01", 18).unwrap(),
            U256::from(10_000_000_000_000_000u64)
        );
        assert_eq!(to_raw_units("1", 6).unwrap(), U256::from(1_000_000u64));
        assert_eq!(to_raw_units(".5", 6).unwrap(), U256::from(500_000u64));
        assert_eq!(to_raw_units("2.", 2).unwrap(), U256::from(200u64));
        assert_eq!(to_raw_units(" 12.345 ", 3).unwrap(), U256::from(12_345u64));
    }

    #[test]
    fn test_to_raw_units_rejects_bad_input() {
        for bad in ["", "-1", "abc", "1e18", "1.2.3", ".", "+1"] {
            assert!(to_raw_units(bad, 18).is_err(), "{} should be rejected", bad);
        }
        assert!(to_raw_units("0.1234567", 6).is_err());
    }

    #[test]
    fn test_format_amount() {
        let raw = U256::from(1_234_567u64);
        assert_eq!(format_amount(raw, 6, "USDC"), "1.2346 USDC");
        assert_eq!(format_amount(U256::zero(), 18, "ETH"), "0.0000 ETH");
    }

    #[test]
    fn test_u256_to_f64_large_values() {
        let value = U256::from(10u64).pow(U256::from(24u64));
        let as_float = u256_to_f64(value);
        assert!((as_float / 1e24 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_f64_to_u256() {
        assert_eq!(f64_to_u256(1234.9), Some(U256::from(1234u64)));
        assert!(f64_to_u256(1e40).unwrap() > U256::from(u128::MAX));
        assert_eq!(f64_to_u256(-1.0), None);
        assert_eq!(f64_to_u256(f64::NAN), None);
    }

    #[test]
    fn test_gwei_conversion() {
        assert_eq!(gwei_to_wei(5.0).unwrap(), U256::from(5_000_000_000u64));
        assert_eq!(gwei_to_wei(0.5).unwrap(), U256::from(500_000_000u64));
        assert!(gwei_to_wei(-1.0).is_err());
        assert_eq!(wei_to_gwei(U256::from(5_000_000_000u64)), 5.0);
    }

    #[test]
    fn test_apply_percentage() {
        let balance = U256::from(1_000u64);
        assert_eq!(apply_percentage(balance, 50.0).unwrap(), U256::from(500u64));
        assert_eq!(apply_percentage(balance, 100.0).unwrap(), balance);
        assert_eq!(apply_percentage(balance, 33.33).unwrap(), U256::from(333u64));
        assert!(apply_percentage(balance, 0.0).is_err());
        assert!(apply_percentage(balance, 150.0).is_err());
    }
}
