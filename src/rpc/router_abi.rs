/// Uniswap V2 router swap functions
///
/// Encoding is used by the AMM router to build transactions and decoding by
/// the simulated chain to execute them.
use crate::errors::{EngineResult, SwapEngineError};
use ethers::abi::{decode, encode, ParamType, Token as AbiToken};
use ethers::types::{Address, Bytes, U256};
use ethers::utils::id;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterFunction {
    SwapExactEthForTokens,
    SwapEthForExactTokens,
    SwapExactTokensForEth,
    SwapTokensForExactEth,
    SwapExactTokensForTokens,
    SwapTokensForExactTokens,
}

impl RouterFunction {
    pub const ALL: [RouterFunction; 6] = [
        RouterFunction::SwapExactEthForTokens,
        RouterFunction::SwapEthForExactTokens,
        RouterFunction::SwapExactTokensForEth,
        RouterFunction::SwapTokensForExactEth,
        RouterFunction::SwapExactTokensForTokens,
        RouterFunction::SwapTokensForExactTokens,
    ];

    pub fn select(native_in: bool, native_out: bool, exact_in: bool) -> Self {
        match (native_in, native_out, exact_in) {
            (true, _, true) => RouterFunction::SwapExactEthForTokens,
            (true, _, false) => RouterFunction::SwapEthForExactTokens,
            (false, true, true) => RouterFunction::SwapExactTokensForEth,
            (false, true, false) => RouterFunction::SwapTokensForExactEth,
            (false, false, true) => RouterFunction::SwapExactTokensForTokens,
            (false, false, false) => RouterFunction::SwapTokensForExactTokens,
        }
    }

    pub fn signature(&self) -> &'static str {
        match self {
            RouterFunction::SwapExactEthForTokens => {
                "swapExactETHForTokens(uint256,address[],address,uint256)"
            }
            RouterFunction::SwapEthForExactTokens => {
                "swapETHForExactTokens(uint256,address[],address,uint256)"
            }
            RouterFunction::SwapExactTokensForEth => {
                "swapExactTokensForETH(uint256,uint256,address[],address,uint256)"
            }
            RouterFunction::SwapTokensForExactEth => {
                "swapTokensForExactETH(uint256,uint256,address[],address,uint256)"
            }
            RouterFunction::SwapExactTokensForTokens => {
                "swapExactTokensForTokens(uint256,uint256,address[],address,uint256)"
            }
            RouterFunction::SwapTokensForExactTokens => {
                "swapTokensForExactTokens(uint256,uint256,address[],address,uint256)"
            }
        }
    }

    pub fn name(&self) -> &'static str {
        let signature = self.signature();
        signature.split('(').next().unwrap_or(signature)
    }

    pub fn native_in(&self) -> bool {
        matches!(
            self,
            RouterFunction::SwapExactEthForTokens | RouterFunction::SwapEthForExactTokens
        )
    }

    pub fn native_out(&self) -> bool {
        matches!(
            self,
            RouterFunction::SwapExactTokensForEth | RouterFunction::SwapTokensForExactEth
        )
    }

    pub fn exact_in(&self) -> bool {
        matches!(
            self,
            RouterFunction::SwapExactEthForTokens
                | RouterFunction::SwapExactTokensForEth
                | RouterFunction::SwapExactTokensForTokens
        )
    }
}

/// A decoded router swap
///
/// `amount` is the exact side (input for exact-in, output for exact-out) and
/// `limit` the slippage bound (minimum output or maximum input). For the ETH
/// input functions the input side travels as the transaction value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterCall {
    pub function: RouterFunction,
    pub amount: U256,
    pub limit: U256,
    pub path: Vec<Address>,
    pub to: Address,
    pub deadline: U256,
}

impl RouterCall {
    /// Calldata and transaction value
    pub fn encode(&self) -> (Bytes, U256) {
        let path = AbiToken::Array(self.path.iter().map(|a| AbiToken::Address(*a)).collect());
        let tail = [path, AbiToken::Address(self.to), AbiToken::Uint(self.deadline)];

        let (args, value): (Vec<AbiToken>, U256) = match self.function {
            // (amountOutMin, path, to, deadline), value = amountIn
            RouterFunction::SwapExactEthForTokens => {
                (std::iter::once(AbiToken::Uint(self.limit)).chain(tail).collect(), self.amount)
            }
            // (amountOut, path, to, deadline), value = amountInMax
            RouterFunction::SwapEthForExactTokens => {
                (std::iter::once(AbiToken::Uint(self.amount)).chain(tail).collect(), self.limit)
            }
            _ => (
                [AbiToken::Uint(self.amount), AbiToken::Uint(self.limit)]
                    .into_iter()
                    .chain(tail)
                    .collect(),
                U256::zero(),
            ),
        };

        let mut data = id(self.function.signature()).to_vec();
        data.extend(encode(&args));
        (Bytes::from(data), value)
    }

    pub fn decode(data: &[u8], value: U256) -> EngineResult<Self> {
        if data.len() < 4 {
            return Err(SwapEngineError::parse_error("router calldata", "missing selector"));
        }
        let function = RouterFunction::ALL
            .into_iter()
            .find(|f| data[..4] == id(f.signature()))
            .ok_or_else(|| SwapEngineError::parse_error("router calldata", "unknown selector"))?;

        let path_type = ParamType::Array(Box::new(ParamType::Address));
        let mut params = Vec::new();
        if !function.native_in() {
            params.push(ParamType::Uint(256));
        }
        params.extend([ParamType::Uint(256), path_type, ParamType::Address, ParamType::Uint(256)]);

        let mut tokens = decode(&params, &data[4..])?.into_iter();
        let mut next_uint = || match tokens.next() {
            Some(AbiToken::Uint(v)) => Ok(v),
            _ => Err(SwapEngineError::parse_error("router calldata", "expected uint256")),
        };
        let first = next_uint()?;
        let second = if function.native_in() { None } else { Some(next_uint()?) };

        let path = match tokens.next() {
            Some(AbiToken::Array(items)) => items
                .into_iter()
                .map(|t| match t {
                    AbiToken::Address(a) => Ok(a),
                    _ => Err(SwapEngineError::parse_error("router calldata", "expected address")),
                })
                .collect::<EngineResult<Vec<Address>>>()?,
            _ => return Err(SwapEngineError::parse_error("router calldata", "expected path")),
        };
        let to = match tokens.next() {
            Some(AbiToken::Address(a)) => a,
            _ => return Err(SwapEngineError::parse_error("router calldata", "expected recipient")),
        };
        let deadline = match tokens.next() {
            Some(AbiToken::Uint(v)) => v,
            _ => return Err(SwapEngineError::parse_error("router calldata", "expected deadline")),
        };

        let (amount, limit) = match (function, second) {
            (RouterFunction::SwapExactEthForTokens, _) => (value, first),
            (RouterFunction::SwapEthForExactTokens, _) => (first, value),
            (_, Some(second)) => (first, second),
            (_, None) => {
                return Err(SwapEngineError::parse_error("router calldata", "missing amount"))
            }
        };

        Ok(Self {
            function,
            amount,
            limit,
            path,
            to,
            deadline,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> Vec<Address> {
        vec![Address::from_low_u64_be(1), Address::from_low_u64_be(2)]
    }

    #[test]
    fn test_selector_matches_router() {
        let sig = RouterFunction::SwapExactEthForTokens.signature();
        assert_eq!(id(sig), [0x7f, 0xf3, 0x6a, 0xb5]);
        assert_eq!(
            id(RouterFunction::SwapExactTokensForEth.signature()),
            [0x18, 0xcb, 0xaf, 0xe5]
        );
        assert_eq!(RouterFunction::SwapExactTokensForEth.name(), "swapExactTokensForETH");
    }

    #[test]
    fn test_eth_input_amount_travels_as_value() {
        let call = RouterCall {
            function: RouterFunction::SwapExactEthForTokens,
            amount: U256::from(10u64).pow(U256::from(16u64)),
            limit: U256::from(900u64),
            path: path(),
            to: Address::from_low_u64_be(9),
            deadline: U256::from(1_700_001_200u64),
        };
        let (data, value) = call.encode();
        assert_eq!(value, call.amount);
        assert_eq!(data.len(), 4 + 32 * 4 + 32 * 3);
        assert_eq!(RouterCall::decode(&data, value).unwrap(), call);
    }

    #[test]
    fn test_token_functions_carry_both_amounts() {
        for function in [
            RouterFunction::SwapExactTokensForEth,
            RouterFunction::SwapTokensForExactTokens,
        ] {
            let call = RouterCall {
                function,
                amount: U256::from(5_000u64),
                limit: U256::from(4_000u64),
                path: path(),
                to: Address::from_low_u64_be(9),
                deadline: U256::from(1_200u64),
            };
            let (data, value) = call.encode();
            assert!(value.is_zero());
            assert_eq!(RouterCall::decode(&data, value).unwrap(), call);
        }
    }

    #[test]
    fn test_function_selection() {
        assert_eq!(
            RouterFunction::select(false, true, true),
            RouterFunction::SwapExactTokensForEth
        );
        assert_eq!(
            RouterFunction::select(true, false, false),
            RouterFunction::SwapEthForExactTokens
        );
        assert!(RouterCall::decode(&[0u8; 3], U256::zero()).is_err());
        assert!(RouterCall::decode(&[0u8; 36], U256::zero()).is_err());
    }
}
