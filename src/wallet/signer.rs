/// Transaction signing with a local private key
use crate::errors::{ConfigurationError, EngineResult, SwapEngineError};
use crate::swaps::types::TxRequest;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionRequest, H256, U256};
use ethers::utils::keccak256;

/// Signed, RLP-encoded transaction ready for `eth_sendRawTransaction`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub raw: Bytes,
    pub hash: H256,
    pub nonce: U256,
}

#[derive(Debug, Clone)]
pub struct WalletSigner {
    wallet: LocalWallet,
    chain_id: u64,
}

fn is_placeholder(key: &str) -> bool {
    let upper = key.to_ascii_uppercase();
    key.is_empty() || upper.contains("YOUR_") || upper.contains("PRIVATE_KEY")
}

impl WalletSigner {
    /// Hex private key, with or without `0x`
    pub fn from_private_key(key: &str, chain_id: u64) -> EngineResult<Self> {
        let key = key.trim();
        if is_placeholder(key) {
            return Err(SwapEngineError::Configuration(ConfigurationError::MissingConfig {
                field: "wallet.private_key".to_string(),
            }));
        }
        let wallet = key.parse::<LocalWallet>().map_err(|e| {
            SwapEngineError::Configuration(ConfigurationError::InvalidPrivateKey {
                error: e.to_string(),
            })
        })?;
        Ok(Self::from_wallet(wallet, chain_id))
    }

    pub fn from_wallet(wallet: LocalWallet, chain_id: u64) -> Self {
        Self {
            wallet: wallet.with_chain_id(chain_id),
            chain_id,
        }
    }

    /// Fresh random key, used by the demo
    pub fn random(chain_id: u64) -> Self {
        Self::from_wallet(LocalWallet::new(&mut rand::thread_rng()), chain_id)
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// EIP-155 legacy transaction priced with `gas_price`
    pub fn sign(&self, tx: &TxRequest, nonce: U256, gas_price: U256) -> EngineResult<SignedTransaction> {
        let request = TransactionRequest::new()
            .from(self.address())
            .to(tx.to)
            .value(tx.value)
            .data(tx.data.clone())
            .gas(tx.gas_limit)
            .gas_price(gas_price)
            .nonce(nonce)
            .chain_id(self.chain_id);
        let typed: TypedTransaction = request.into();

        let signature = self.wallet.sign_transaction_sync(&typed)?;
        let raw = typed.rlp_signed(&signature);
        let hash = H256::from(keccak256(&raw));
        Ok(SignedTransaction { raw, hash, nonce })
    }
}
