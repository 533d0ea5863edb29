/// Log tags, one per engine subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogTag {
    System,
    Config,
    Swap,
    Router,
    Route,
    Gas,
    Liquidity,
    Slippage,
    Simulation,
    Rpc,
    Wallet,
    Test,
}

impl LogTag {
    pub const ALL: [LogTag; 12] = [
        LogTag::System,
        LogTag::Config,
        LogTag::Swap,
        LogTag::Router,
        LogTag::Route,
        LogTag::Gas,
        LogTag::Liquidity,
        LogTag::Slippage,
        LogTag::Simulation,
        LogTag::Rpc,
        LogTag::Wallet,
        LogTag::Test,
    ];

    /// Uppercase label used in console and file output
    pub fn label(&self) -> &'static str {
        match self {
            LogTag::System => "SYSTEM",
            LogTag::Config => "CONFIG",
            LogTag::Swap => "SWAP",
            LogTag::Router => "ROUTER",
            LogTag::Route => "ROUTE",
            LogTag::Gas => "GAS",
            LogTag::Liquidity => "LIQUIDITY",
            LogTag::Slippage => "SLIPPAGE",
            LogTag::Simulation => "SIM",
            LogTag::Rpc => "RPC",
            LogTag::Wallet => "WALLET",
            LogTag::Test => "TEST",
        }
    }

    /// Key matched against `--debug-<key>` / `--verbose-<key>` flags
    pub fn to_debug_key(&self) -> String {
        match self {
            LogTag::Simulation => "simulation".to_string(),
            other => other.label().to_lowercase(),
        }
    }

    pub fn from_debug_key(key: &str) -> Option<LogTag> {
        LogTag::ALL
            .iter()
            .copied()
            .find(|tag| tag.to_debug_key() == key.to_lowercase())
    }
}

impl std::fmt::Display for LogTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_keys_round_trip() {
        for tag in LogTag::ALL {
            assert_eq!(LogTag::from_debug_key(&tag.to_debug_key()), Some(tag));
        }
        assert_eq!(LogTag::from_debug_key("SWAP"), Some(LogTag::Swap));
        assert_eq!(LogTag::from_debug_key("unknown"), None);
    }
}
