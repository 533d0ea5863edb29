/// Path search over the pool graph
use super::registry::PoolRegistry;
use ethers::types::Address;
use std::collections::HashSet;

/// Tokens visited in order and the pool used for each hop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolPath {
    pub tokens: Vec<Address>,
    pub pools: Vec<Address>,
}

impl PoolPath {
    pub fn hops(&self) -> usize {
        self.pools.len()
    }

    pub fn uses_pool(&self, pool: &Address) -> bool {
        self.pools.contains(pool)
    }
}

/// Search limits for one lookup
#[derive(Debug, Clone, Default)]
pub struct PathQuery<'a> {
    pub max_hops: usize,
    /// Allowed intermediate tokens; empty allows any
    pub connectors: &'a [Address],
    /// Restrict to pools of one router
    pub dex: Option<&'a str>,
}

/// All simple paths from `from` to `to` within `max_hops`
///
/// A pool is never used twice in one path and no token is revisited.
pub fn find_paths(registry: &PoolRegistry, from: Address, to: Address, query: &PathQuery<'_>) -> Vec<PoolPath> {
    let mut results = Vec::new();
    if from == to || query.max_hops == 0 {
        return results;
    }

    let mut tokens = vec![from];
    let mut pools = Vec::new();
    let mut visited: HashSet<Address> = HashSet::from([from]);
    search(registry, to, query, &mut tokens, &mut pools, &mut visited, &mut results);

    results.sort_by_key(|path| path.hops());
    results
}

fn search(
    registry: &PoolRegistry,
    target: Address,
    query: &PathQuery<'_>,
    tokens: &mut Vec<Address>,
    pools: &mut Vec<Address>,
    visited: &mut HashSet<Address>,
    results: &mut Vec<PoolPath>,
) {
    let Some(&current) = tokens.last() else {
        return;
    };

    for pool in registry.pools_with_token(&current) {
        if let Some(dex) = query.dex {
            if pool.dex != dex {
                continue;
            }
        }
        if pool.is_empty() || pools.contains(&pool.address) {
            continue;
        }
        let Some(next) = pool.other_token(&current) else {
            continue;
        };

        if next == target {
            let mut path_tokens = tokens.clone();
            path_tokens.push(next);
            let mut path_pools = pools.clone();
            path_pools.push(pool.address);
            results.push(PoolPath {
                tokens: path_tokens,
                pools: path_pools,
            });
            continue;
        }

        if pools.len() + 1 >= query.max_hops || visited.contains(&next) {
            continue;
        }
        if !query.connectors.is_empty() && !query.connectors.contains(&next) {
            continue;
        }

        tokens.push(next);
        pools.push(pool.address);
        visited.insert(next);
        search(registry, target, query, tokens, pools, visited, results);
        visited.remove(&next);
        pools.pop();
        tokens.pop();
    }
}
