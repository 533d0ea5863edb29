/// Pool registry shared by every AMM router
///
/// Pools are keyed by pair address with a token adjacency index for path
/// search. The split planner and simulation clone the registry and mutate the
/// clone with `apply_path`; the shared instance only changes on `refresh`.
use super::math::{combine_price_impacts, hop_price_impact_pct, spot_rate};
use super::pathfinder::{find_paths, PathQuery, PoolPath};
use super::types::Pool;
use crate::config::AmmRouterConfig;
use crate::errors::{EngineResult, SwapEngineError};
use crate::logger::{self, LogTag};
use crate::rpc::{erc20, ChainClient};
use crate::tokens::parse_address;
use ethers::types::{Address, U256};
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct PoolRegistry {
    pools: HashMap<Address, Pool>,
    by_token: HashMap<Address, Vec<Address>>,
}

impl PoolRegistry {
    /// Pools declared under every AMM router, tagged with the router id and fee
    pub fn from_config(routers: &[AmmRouterConfig]) -> EngineResult<Self> {
        let mut registry = Self::default();
        for router in routers.iter().filter(|r| r.enabled) {
            for pool in &router.pools {
                let parse_reserve = |value: &str| {
                    U256::from_dec_str(value.trim())
                        .map_err(|e| SwapEngineError::parse_error("pool reserve", e.to_string()))
                };
                registry.insert(Pool {
                    address: parse_address(&pool.address)?,
                    dex: router.id.clone(),
                    token0: parse_address(&pool.token0)?,
                    token1: parse_address(&pool.token1)?,
                    reserve0: parse_reserve(&pool.reserve0)?,
                    reserve1: parse_reserve(&pool.reserve1)?,
                    fee_bps: router.fee_bps,
                });
            }
        }
        Ok(registry)
    }

    pub fn insert(&mut self, pool: Pool) {
        let address = pool.address;
        if let Some(previous) = self.pools.insert(address, pool.clone()) {
            for token in [previous.token0, previous.token1] {
                if let Some(list) = self.by_token.get_mut(&token) {
                    list.retain(|a| *a != address);
                }
            }
        }
        for token in [pool.token0, pool.token1] {
            self.by_token.entry(token).or_default().push(address);
        }
    }

    pub fn get(&self, address: &Address) -> Option<&Pool> {
        self.pools.get(address)
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    pub fn addresses(&self) -> Vec<Address> {
        let mut addresses: Vec<Address> = self.pools.keys().copied().collect();
        addresses.sort();
        addresses
    }

    pub fn pools_with_token(&self, token: &Address) -> Vec<&Pool> {
        self.by_token
            .get(token)
            .map(|list| list.iter().filter_map(|a| self.pools.get(a)).collect())
            .unwrap_or_default()
    }

    pub fn pools_for_pair(&self, a: &Address, b: &Address) -> Vec<&Pool> {
        self.pools_with_token(a)
            .into_iter()
            .filter(|pool| pool.has_token(b))
            .collect()
    }

    pub fn has_token(&self, token: &Address, dex: Option<&str>) -> bool {
        self.pools_with_token(token)
            .iter()
            .any(|pool| dex.map_or(true, |d| pool.dex == d))
    }

    pub fn find_paths(&self, from: Address, to: Address, query: &PathQuery<'_>) -> Vec<PoolPath> {
        find_paths(self, from, to, query)
    }

    pub fn update_reserves(&mut self, address: &Address, reserve0: U256, reserve1: U256) -> bool {
        match self.pools.get_mut(address) {
            Some(pool) => {
                pool.reserve0 = reserve0;
                pool.reserve1 = reserve1;
                true
            }
            None => false,
        }
    }

    fn pool(&self, address: &Address) -> EngineResult<&Pool> {
        self.pools.get(address).ok_or_else(|| {
            SwapEngineError::insufficient_liquidity(format!("{:?}", address), "unknown pool")
        })
    }

    /// Amount at every step of the path for an exact input
    pub fn simulate_exact_in(&self, path: &PoolPath, amount_in: U256) -> EngineResult<Vec<U256>> {
        let mut amounts = Vec::with_capacity(path.tokens.len());
        amounts.push(amount_in);
        for (i, pool_address) in path.pools.iter().enumerate() {
            let pool = self.pool(pool_address)?;
            let out = pool.amount_out(&path.tokens[i], amounts[i])?;
            if out.is_zero() {
                return Err(SwapEngineError::insufficient_liquidity(
                    format!("{:?}", pool_address),
                    "hop output rounds to zero",
                ));
            }
            amounts.push(out);
        }
        Ok(amounts)
    }

    /// Amount at every step of the path for an exact output, computed backwards
    pub fn simulate_exact_out(&self, path: &PoolPath, amount_out: U256) -> EngineResult<Vec<U256>> {
        let mut amounts = vec![U256::zero(); path.tokens.len()];
        if let Some(last) = amounts.last_mut() {
            *last = amount_out;
        }
        for i in (0..path.pools.len()).rev() {
            let pool = self.pool(&path.pools[i])?;
            amounts[i] = pool.amount_in(&path.tokens[i], amounts[i + 1])?;
        }
        Ok(amounts)
    }

    /// Combined price impact of `amounts` flowing through `path`
    pub fn price_impact_pct(&self, path: &PoolPath, amounts: &[U256]) -> EngineResult<f64> {
        let mut impacts = Vec::with_capacity(path.pools.len());
        for (i, pool_address) in path.pools.iter().enumerate() {
            let pool = self.pool(pool_address)?;
            let (reserve_in, _) = pool.reserves_for(&path.tokens[i]).unwrap_or_default();
            impacts.push(hop_price_impact_pct(amounts[i], reserve_in, pool.fee_bps));
        }
        Ok(combine_price_impacts(&impacts))
    }

    /// Apply a simulated swap to the reserves of every pool in the path
    pub fn apply_path(&mut self, path: &PoolPath, amounts: &[U256]) -> EngineResult<()> {
        for (i, pool_address) in path.pools.iter().enumerate() {
            let pool = self.pools.get_mut(pool_address).ok_or_else(|| {
                SwapEngineError::insufficient_liquidity(format!("{:?}", pool_address), "unknown pool")
            })?;
            pool.apply_swap(&path.tokens[i], amounts[i], amounts[i + 1])?;
        }
        Ok(())
    }

    /// Best fee-free marginal rate from `from` to `to` in raw units
    pub fn spot_rate(&self, from: Address, to: Address, max_hops: usize) -> Option<f64> {
        if from == to {
            return Some(1.0);
        }
        let query = PathQuery {
            max_hops,
            ..Default::default()
        };
        self.find_paths(from, to, &query)
            .iter()
            .filter_map(|path| {
                path.pools.iter().enumerate().try_fold(1.0_f64, |rate, (i, address)| {
                    let pool = self.pools.get(address)?;
                    let (reserve_in, reserve_out) = pool.reserves_for(&path.tokens[i])?;
                    spot_rate(reserve_in, reserve_out).map(|hop| rate * hop)
                })
            })
            .fold(None, |best: Option<f64>, rate| match best {
                Some(b) if b >= rate => Some(b),
                _ => Some(rate),
            })
    }
}

/// Reload reserves of every registered pool through `getReserves`
///
/// Failed pools keep their previous snapshot. Returns the number refreshed.
pub async fn refresh_reserves(chain: &dyn ChainClient, registry: &RwLock<PoolRegistry>) -> usize {
    let addresses = registry.read().addresses();
    let mut updates = Vec::with_capacity(addresses.len());

    for address in addresses {
        match erc20::get_reserves(chain, address).await {
            Ok((reserve0, reserve1)) => updates.push((address, reserve0, reserve1)),
            Err(e) => logger::warning(
                LogTag::Route,
                &format!("Keeping snapshot reserves for pool {:?}: {}", address, e),
            ),
        }
    }

    let mut guard = registry.write();
    let refreshed = updates
        .into_iter()
        .filter(|(address, r0, r1)| guard.update_reserves(address, *r0, *r1))
        .count();
    logger::debug(
        LogTag::Route,
        &format!("Refreshed reserves for {}/{} pools", refreshed, guard.len()),
    );
    refreshed
}
