/// Tokens: types, known-token registry and amount conversions
pub mod amounts;
pub mod registry;
pub mod types;

pub use amounts::{
    apply_percentage, f64_to_u256, format_amount, from_raw_units, gwei_to_wei, to_raw_units,
    u256_to_f64, wei_to_gwei,
};
pub use registry::TokenRegistry;
pub use types::{is_native, parse_address, short_address, Token, NATIVE_DECIMALS, NATIVE_TOKEN};
