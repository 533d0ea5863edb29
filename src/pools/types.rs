/// Core types for the pools module
use super::math::{get_amount_in, get_amount_out};
use crate::errors::{EngineResult, SwapEngineError};
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

/// A Uniswap-V2 style pair owned by one router
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub address: Address,
    /// Id of the AMM router trading through this pool
    pub dex: String,
    pub token0: Address,
    pub token1: Address,
    pub reserve0: U256,
    pub reserve1: U256,
    pub fee_bps: u16,
}

impl Pool {
    pub fn has_token(&self, token: &Address) -> bool {
        self.token0 == *token || self.token1 == *token
    }

    pub fn other_token(&self, token: &Address) -> Option<Address> {
        if self.token0 == *token {
            Some(self.token1)
        } else if self.token1 == *token {
            Some(self.token0)
        } else {
            None
        }
    }

    /// `(reserve_in, reserve_out)` when trading `token_in` into the pool
    pub fn reserves_for(&self, token_in: &Address) -> Option<(U256, U256)> {
        if self.token0 == *token_in {
            Some((self.reserve0, self.reserve1))
        } else if self.token1 == *token_in {
            Some((self.reserve1, self.reserve0))
        } else {
            None
        }
    }

    pub fn is_empty(&self) -> bool {
        self.reserve0.is_zero() || self.reserve1.is_zero()
    }

    fn directional_reserves(&self, token_in: &Address) -> EngineResult<(U256, U256)> {
        self.reserves_for(token_in).ok_or_else(|| {
            SwapEngineError::insufficient_liquidity(
                format!("{:?}", self.address),
                format!("token {:?} is not in this pool", token_in),
            )
        })
    }

    pub fn amount_out(&self, token_in: &Address, amount_in: U256) -> EngineResult<U256> {
        let (reserve_in, reserve_out) = self.directional_reserves(token_in)?;
        get_amount_out(amount_in, reserve_in, reserve_out, self.fee_bps)
    }

    pub fn amount_in(&self, token_in: &Address, amount_out: U256) -> EngineResult<U256> {
        let (reserve_in, reserve_out) = self.directional_reserves(token_in)?;
        get_amount_in(amount_out, reserve_in, reserve_out, self.fee_bps)
    }

    /// Move reserves as a swap of `amount_in` for `amount_out` would
    pub fn apply_swap(&mut self, token_in: &Address, amount_in: U256, amount_out: U256) -> EngineResult<()> {
        let (reserve_in, reserve_out) = self.directional_reserves(token_in)?;
        if amount_out >= reserve_out {
            return Err(SwapEngineError::insufficient_liquidity(
                format!("{:?}", self.address),
                "swap would drain the output reserve",
            ));
        }
        let new_in = reserve_in
            .checked_add(amount_in)
            .ok_or_else(|| SwapEngineError::overflow("pool reserve"))?;
        let new_out = reserve_out - amount_out;
        if self.token0 == *token_in {
            self.reserve0 = new_in;
            self.reserve1 = new_out;
        } else {
            self.reserve1 = new_in;
            self.reserve0 = new_out;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> Pool {
        Pool {
            address: Address::from_low_u64_be(100),
            dex: "uniswap_v2".to_string(),
            token0: Address::from_low_u64_be(1),
            token1: Address::from_low_u64_be(2),
            reserve0: U256::from(1_000_000u64),
            reserve1: U256::from(2_000_000u64),
            fee_bps: 30,
        }
    }

    #[test]
    fn test_direction_handling() {
        let pool = pool();
        let a = Address::from_low_u64_be(1);
        let b = Address::from_low_u64_be(2);
        assert_eq!(pool.other_token(&a), Some(b));
        assert_eq!(pool.reserves_for(&b), Some((pool.reserve1, pool.reserve0)));
        assert!(pool.amount_out(&Address::from_low_u64_be(3), U256::one()).is_err());
    }

    #[test]
    fn test_apply_swap_moves_reserves() {
        let mut pool = pool();
        let a = Address::from_low_u64_be(1);
        let out = pool.amount_out(&a, U256::from(1_000u64)).unwrap();
        pool.apply_swap(&a, U256::from(1_000u64), out).unwrap();
        assert_eq!(pool.reserve0, U256::from(1_001_000u64));
        assert_eq!(pool.reserve1, U256::from(2_000_000u64) - out);
        assert!(pool.apply_swap(&a, U256::one(), pool.reserve1).is_err());
    }
}
