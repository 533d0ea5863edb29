/// Balance lookups for the native coin and ERC-20 tokens
use crate::errors::EngineResult;
use crate::rpc::{erc20, ChainClient};
use crate::tokens::{format_amount, Token};
use ethers::types::{Address, U256};

/// Raw balance of `token` held by `owner`
pub async fn token_balance(chain: &dyn ChainClient, token: &Token, owner: Address) -> EngineResult<U256> {
    if token.is_native() {
        chain.native_balance(owner).await
    } else {
        erc20::balance_of(chain, token.address, owner).await
    }
}

/// `"{:.4} SYMBOL"` balance line
///
/// Decimals and symbol come from the chain for ERC-20 tokens, so the line is
/// correct even for tokens missing from the configured list.
pub async fn check_token_balance(chain: &dyn ChainClient, token: &Token, owner: Address) -> EngineResult<String> {
    if token.is_native() {
        let raw = chain.native_balance(owner).await?;
        return Ok(format_amount(raw, token.decimals, &token.symbol));
    }

    let raw = erc20::balance_of(chain, token.address, owner).await?;
    let decimals = erc20::decimals(chain, token.address).await?;
    let symbol = erc20::symbol(chain, token.address)
        .await
        .unwrap_or_else(|_| token.symbol.clone());
    Ok(format_amount(raw, decimals, &symbol))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::SimulatedChain;

    #[tokio::test]
    async fn test_balance_lines() {
        let chain = SimulatedChain::new(1);
        let owner = Address::from_low_u64_be(1);
        let usdc = Address::from_low_u64_be(2);
        chain.add_token(usdc, "USDC", 6);
        chain.mint(usdc, owner, U256::from(12_345_678u64));
        chain.set_native_balance(owner, U256::from(10u64).pow(U256::from(18u64)));

        // Configured symbol is ignored in favour of the on-chain one
        let token = Token::new(usdc, "usdc?", 18);
        assert_eq!(
            check_token_balance(&chain, &token, owner).await.unwrap(),
            "12.3457 USDC"
        );
        assert_eq!(
            check_token_balance(&chain, &Token::native("ETH"), owner).await.unwrap(),
            "1.0000 ETH"
        );
        assert_eq!(
            token_balance(&chain, &token, owner).await.unwrap(),
            U256::from(12_345_678u64)
        );
    }
}
