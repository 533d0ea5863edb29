/// Swap behaviour configuration
use crate::config_struct;

config_struct! {
    /// Slippage, deadline and execution settings
    pub struct SwapsConfig {
        /// Slippage tolerance used when a request does not specify one (5%)
        default_slippage_bps: u16 = 500,
        /// Hard cap for any requested slippage (50%)
        max_slippage_bps: u16 = 5_000,
        /// Progressive slippage ladder for sell retries: 15% -> 25% -> 35% -> 50%
        sell_retry_slippage_bps: Vec<u16> = vec![1_500, 2_500, 3_500, 5_000],
        /// Base delay between sell retries, multiplied by the attempt number
        retry_delay_secs: u64 = 2,
        /// Seconds added to the latest block timestamp for the router deadline
        deadline_secs: u64 = 1_200,
        /// Per-router quote timeout
        quote_timeout_secs: u64 = 15,
        /// Re-quote right before broadcasting and abort if below the minimum output
        preflight_requote: bool = true,
        /// Reload pool reserves from chain before quoting
        refresh_pools: bool = true,
        /// Build and sign but never broadcast
        dry_run: bool = false,
    }
}
