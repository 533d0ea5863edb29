/// Constant-product (Uniswap V2) pool math
///
/// All intermediate products are computed in 512 bits so reserves near the
/// 112-bit limit cannot overflow. Fees are in basis points of the input.
use crate::errors::{EngineResult, SwapEngineError};
use ethers::types::{U256, U512};

pub const BPS_DENOMINATOR: u64 = 10_000;

fn narrow(value: U512, operation: &str) -> EngineResult<U256> {
    U256::try_from(value).map_err(|_| SwapEngineError::overflow(operation))
}

/// `a * b / c`, rounded down
pub fn mul_div(a: U256, b: U256, c: U256) -> EngineResult<U256> {
    if c.is_zero() {
        return Err(SwapEngineError::overflow("mul_div by zero"));
    }
    narrow(a.full_mul(b) / U512::from(c), "mul_div")
}

/// `a * b / c`, rounded up
pub fn mul_div_up(a: U256, b: U256, c: U256) -> EngineResult<U256> {
    if c.is_zero() {
        return Err(SwapEngineError::overflow("mul_div_up by zero"));
    }
    let product = a.full_mul(b);
    let divisor = U512::from(c);
    let mut quotient = product / divisor;
    if !(product % divisor).is_zero() {
        quotient += U512::one();
    }
    narrow(quotient, "mul_div_up")
}

fn check_fee(fee_bps: u16) -> EngineResult<U256> {
    if fee_bps as u64 >= BPS_DENOMINATOR {
        return Err(SwapEngineError::invalid_amount(
            fee_bps.to_string(),
            "pool fee must be below 10000 bps",
        ));
    }
    Ok(U256::from(BPS_DENOMINATOR - fee_bps as u64))
}

/// Output for an exact input:
/// `in * (10000 - fee) * R_out / (R_in * 10000 + in * (10000 - fee))`
pub fn get_amount_out(
    amount_in: U256,
    reserve_in: U256,
    reserve_out: U256,
    fee_bps: u16,
) -> EngineResult<U256> {
    if amount_in.is_zero() {
        return Err(SwapEngineError::invalid_amount("0", "input amount must be positive"));
    }
    if reserve_in.is_zero() || reserve_out.is_zero() {
        return Err(SwapEngineError::insufficient_liquidity("pair", "empty reserves"));
    }
    let fee_factor = check_fee(fee_bps)?;

    let amount_in_with_fee = amount_in.full_mul(fee_factor);
    let numerator = amount_in_with_fee
        .checked_mul(U512::from(reserve_out))
        .ok_or_else(|| SwapEngineError::overflow("get_amount_out"))?;
    let denominator = reserve_in
        .full_mul(U256::from(BPS_DENOMINATOR))
        .checked_add(amount_in_with_fee)
        .ok_or_else(|| SwapEngineError::overflow("get_amount_out"))?;
    narrow(numerator / denominator, "get_amount_out")
}

/// Input required for an exact output, rounded up the way the router does
pub fn get_amount_in(
    amount_out: U256,
    reserve_in: U256,
    reserve_out: U256,
    fee_bps: u16,
) -> EngineResult<U256> {
    if amount_out.is_zero() {
        return Err(SwapEngineError::invalid_amount("0", "output amount must be positive"));
    }
    if reserve_in.is_zero() || reserve_out.is_zero() {
        return Err(SwapEngineError::insufficient_liquidity("pair", "empty reserves"));
    }
    if amount_out >= reserve_out {
        return Err(SwapEngineError::insufficient_liquidity(
            "pair",
            format!("requested {} but only {} in reserve", amount_out, reserve_out),
        ));
    }
    let fee_factor = check_fee(fee_bps)?;

    let numerator = reserve_in
        .full_mul(amount_out)
        .checked_mul(U512::from(BPS_DENOMINATOR))
        .ok_or_else(|| SwapEngineError::overflow("get_amount_in"))?;
    let denominator = (reserve_out - amount_out).full_mul(fee_factor);
    narrow(numerator / denominator + U512::one(), "get_amount_in")
}

/// Marginal rate in raw units of output per raw unit of input, fee excluded
pub fn spot_rate(reserve_in: U256, reserve_out: U256) -> Option<f64> {
    if reserve_in.is_zero() {
        return None;
    }
    Some(crate::tokens::u256_to_f64(reserve_out) / crate::tokens::u256_to_f64(reserve_in))
}

/// Price impact of one hop in percent, excluding the LP fee
///
/// For a constant-product pool the execution rate relative to the fee-adjusted
/// spot rate is `R_in / (R_in + in_after_fee)`.
pub fn hop_price_impact_pct(amount_in: U256, reserve_in: U256, fee_bps: u16) -> f64 {
    if reserve_in.is_zero() {
        return 100.0;
    }
    let fee_factor = (BPS_DENOMINATOR - (fee_bps as u64).min(BPS_DENOMINATOR)) as f64
        / BPS_DENOMINATOR as f64;
    let in_after_fee = crate::tokens::u256_to_f64(amount_in) * fee_factor;
    let reserve = crate::tokens::u256_to_f64(reserve_in);
    in_after_fee / (reserve + in_after_fee) * 100.0
}

/// Impact of a multi-hop path: `1 - prod(1 - impact_i)`
pub fn combine_price_impacts(impacts: &[f64]) -> f64 {
    let retained = impacts
        .iter()
        .fold(1.0_f64, |acc, impact| acc * (1.0 - impact / 100.0));
    (1.0 - retained) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(v: u64) -> U256 {
        U256::from(v)
    }

    #[test]
    fn test_amount_out_matches_router_formula() {
        // 1000 in against 1_000_000 / 2_000_000 at 0.3%
        let out = get_amount_out(u(1_000), u(1_000_000), u(2_000_000), 30).unwrap();
        // 9_970_000 * 2_000_000 / (1_000_000 * 10_000 + 9_970_000) = 1992.01
        assert_eq!(out, u(1_992));
    }

    #[test]
    fn test_amount_in_inverts_amount_out() {
        let reserve_in = u(5_000_000);
        let reserve_out = u(3_000_000);
        let wanted = u(12_345);
        let needed = get_amount_in(wanted, reserve_in, reserve_out, 30).unwrap();
        let got = get_amount_out(needed, reserve_in, reserve_out, 30).unwrap();
        assert!(got >= wanted);
        let short = get_amount_out(needed - U256::one(), reserve_in, reserve_out, 30).unwrap();
        assert!(short <= wanted);
    }

    #[test]
    fn test_edge_cases() {
        assert!(get_amount_out(U256::zero(), u(1), u(1), 30).is_err());
        assert!(get_amount_out(u(1), U256::zero(), u(1), 30).is_err());
        assert!(get_amount_in(u(100), u(1_000), u(100), 30).is_err());
        assert!(get_amount_out(u(1), u(1), u(1), 10_000).is_err());
    }

    #[test]
    fn test_large_reserves_do_not_overflow() {
        let big = U256::from(2u64).pow(u(112)) - U256::one();
        let out = get_amount_out(big, big, big, 30).unwrap();
        assert!(out < big);
    }

    #[test]
    fn test_mul_div_rounding() {
        assert_eq!(mul_div(u(10), u(3), u(4)).unwrap(), u(7));
        assert_eq!(mul_div_up(u(10), u(3), u(4)).unwrap(), u(8));
        assert_eq!(mul_div_up(u(8), u(1), u(4)).unwrap(), u(2));
        assert!(mul_div(u(1), u(1), U256::zero()).is_err());
        assert!(mul_div(U256::MAX, U256::MAX, u(1)).is_err());
    }

    #[test]
    fn test_price_impact() {
        let impact = hop_price_impact_pct(u(1_000), u(1_000_000), 0);
        assert!((impact - 0.0999).abs() < 0.001);
        assert_eq!(hop_price_impact_pct(u(1), U256::zero(), 30), 100.0);

        let combined = combine_price_impacts(&[10.0, 10.0]);
        assert!((combined - 19.0).abs() < 1e-9);
        assert_eq!(combine_price_impacts(&[]), 0.0);
    }

    #[test]
    fn test_spot_rate() {
        assert_eq!(spot_rate(u(1_000), u(2_000)), Some(2.0));
        assert_eq!(spot_rate(U256::zero(), u(2_000)), None);
    }
}
