pub mod wallet_store;

pub use wallet_store::{WalletFileStats, WalletStore};
