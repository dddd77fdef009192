//! 钱包子系统统一错误类型
//!
//! 派生与存储错误同步返回，不做内部重试；网络错误统一包装为 `Network`。

use std::io;

use thiserror::Error;

use crate::domain::chain_config::ChainFamily;

#[derive(Debug, Error)]
pub enum WalletError {
    /// 助记词未通过词数 / 词表 / 校验和验证
    #[error("invalid seed phrase")]
    InvalidSeedPhrase,

    /// 派生路径格式错误
    #[error("invalid derivation path: {0}")]
    InvalidDerivationPath(String),

    #[error("unsupported creation method: {0}")]
    UnsupportedCreationMethod(String),

    #[error("unsupported chain: {0}")]
    UnsupportedChain(String),

    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("wallet not found: {agent_id}/{wallet_id}")]
    WalletNotFound { agent_id: String, wallet_id: String },

    /// agent / wallet 标识不能作为单级路径使用
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("wallet already exists: {agent_id}/{wallet_id}")]
    WalletAlreadyExists { agent_id: String, wallet_id: String },

    /// 钱包文件校验和不匹配（文件损坏或被篡改）
    #[error("integrity check failed for {path}: expected {expected:08x}, found {actual:08x}")]
    IntegrityError {
        path: String,
        expected: u32,
        actual: u32,
    },

    /// Provider 未连接（connect 之前或 disconnect 之后）
    #[error("{0} provider is not connected")]
    NotConnected(ChainFamily),

    #[error("address validation failed: {0}")]
    AddressValidation(String),

    #[error("failed to build transaction: {0}")]
    TransactionBuild(String),

    #[error("signing failed: {0}")]
    Signing(String),

    /// 传输层失败（HTTP、JSON-RPC 错误对象、响应格式异常）
    #[error("network error: {0}")]
    Network(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    /// 解密失败，包括认证标签校验失败（密码错误）
    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, WalletError>;

impl WalletError {
    /// 稳定的错误码，供上层（CLI）映射提示信息
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidSeedPhrase => "invalid_seed_phrase",
            Self::InvalidDerivationPath(_) => "invalid_derivation_path",
            Self::UnsupportedCreationMethod(_) => "unsupported_creation_method",
            Self::UnsupportedChain(_) => "chain_not_supported",
            Self::InvalidPrivateKey(_) => "invalid_private_key",
            Self::WalletNotFound { .. } => "wallet_not_found",
            Self::InvalidIdentifier(_) => "invalid_identifier",
            Self::WalletAlreadyExists { .. } => "wallet_already_exists",
            Self::IntegrityError { .. } => "integrity_error",
            Self::NotConnected(_) => "not_connected",
            Self::AddressValidation(_) => "invalid_address",
            Self::TransactionBuild(_) => "transaction_build_failed",
            Self::Signing(_) => "signing_failed",
            Self::Network(_) => "network",
            Self::Serialization(_) => "serialization_failed",
            Self::Encryption(_) => "encryption_failed",
            Self::Decryption(_) => "decryption_failed",
            Self::Config(_) => "config_error",
            Self::Io(_) => "io_error",
        }
    }

    pub fn wallet_not_found(agent_id: impl Into<String>, wallet_id: impl Into<String>) -> Self {
        Self::WalletNotFound {
            agent_id: agent_id.into(),
            wallet_id: wallet_id.into(),
        }
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    pub fn tx_build(msg: impl Into<String>) -> Self {
        Self::TransactionBuild(msg.into())
    }

    /// 是否为网络类错误（费用估算降级只对这类错误生效）
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<bincode::Error> for WalletError {
    fn from(e: bincode::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for WalletError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}
