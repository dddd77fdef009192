//! agentwallet - 多链 Agent 钱包核心
//!
//! 每个 agent 独立的钱包库：助记词/私钥派生、带校验和的二进制文件存储，
//! 以及 Ethereum / Substrate / Solana 三类链的统一 Provider 接口。

pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod repository;
pub mod service;
pub mod utils;

// 重新导出常用类型
pub use config::WalletConfig;
pub use error::{Result, WalletError};

pub mod prelude {
    pub use crate::{
        config::WalletConfig,
        domain::{
            Balance, ChainFamily, CreationMethod, SignedTransaction, Transaction,
            TransactionRequest, TransactionStatus, WalletRecord,
        },
        error::{Result, WalletError},
        service::{
            ChainProvider, ConnectionCache, CreateWalletOptions, ExportFormat, StorageOptions,
            WalletManager,
        },
    };
}
