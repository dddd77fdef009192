//! Domain 模块
//!
//! 链族定义、派生路径、密钥派生与钱包/交易模型

pub mod chain_config;
pub mod derivation;
pub mod derivation_path;
pub mod transaction;
pub mod wallet_record;

// 重新导出常用类型
pub use chain_config::{AddressFormat, ChainFamily, ChainRegistry, ChainSpec, SignatureScheme};
pub use derivation::{
    derive_seed, derive_wallet_key, generate_seed_phrase, validate_seed_phrase, verify_record_address,
    DerivationStrategy, DerivationStrategyFactory, DerivedWallet,
};
pub use derivation_path::{DerivationPath, HdPath};
pub use transaction::{
    Balance, SignedTransaction, Transaction, TransactionRequest, TransactionStatus,
};
pub use wallet_record::{CreationMethod, KeyPair, WalletRecord};
