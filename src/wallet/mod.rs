/// Wallet: signing and balance checks
pub mod balance;
pub mod signer;

pub use balance::{check_token_balance, token_balance};
pub use signer::{SignedTransaction, WalletSigner};
