//! 配置管理模块
//! 支持从环境变量（含 .env）和 TOML 配置文件加载配置

use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::chain_config::ChainFamily;

/// 钱包子系统配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalletConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub networks: NetworksConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// 钱包库根目录，布局为 `<base_dir>/<agent_id>/<wallet_id>.wallet`
    pub base_dir: PathBuf,
    /// Unix 下以 0700/0600 权限创建目录与文件
    pub private_permissions: bool,
}

/// 各链族网络配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworksConfig {
    #[serde(default)]
    pub ethereum: EthereumNetworkConfig,
    #[serde(default)]
    pub substrate: SubstrateNetworkConfig,
    #[serde(default)]
    pub solana: SolanaNetworkConfig,
}

/// Ethereum 系网络配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EthereumNetworkConfig {
    pub rpc_url: String,
    /// EIP-155 chain id
    pub chain_id: u64,
    pub request_timeout_secs: u64,
    /// 历史查询向前扫描的区块数
    pub history_block_window: u64,
    pub history_page_size: usize,
    pub default_gas_limit: u64,
}

/// Substrate 系网络配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubstrateNetworkConfig {
    pub rpc_url: String,
    pub request_timeout_secs: u64,
    pub history_block_window: u64,
    pub history_page_size: usize,
    /// Balances pallet 索引（Polkadot 为 5）
    pub balances_pallet_index: u8,
    /// transfer_keep_alive 调用索引
    pub transfer_call_index: u8,
}

/// Solana 系网络配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolanaNetworkConfig {
    pub rpc_url: String,
    pub request_timeout_secs: u64,
    pub history_page_size: usize,
    /// processed / confirmed / finalized
    pub commitment: String,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "text"
    pub enable_file_logging: bool,
    pub log_file_path: Option<String>,
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

/// 默认钱包库位置：`$HOME/.agentwallet/vault`
pub fn default_vault_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".agentwallet")
        .join("vault")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_dir: std::env::var_os("AGENT_WALLET_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_vault_dir),
            private_permissions: env_flag("AGENT_WALLET_PRIVATE_PERMS", true),
        }
    }
}

impl Default for EthereumNetworkConfig {
    fn default() -> Self {
        Self {
            rpc_url: std::env::var("ETH_RPC_URL")
                .unwrap_or_else(|_| "https://ethereum-rpc.publicnode.com".into()),
            chain_id: env_parse("ETH_CHAIN_ID", 1),
            request_timeout_secs: env_parse("ETH_RPC_TIMEOUT_SECS", 30),
            history_block_window: env_parse("ETH_HISTORY_BLOCKS", 100),
            history_page_size: env_parse("ETH_HISTORY_LIMIT", 10),
            default_gas_limit: env_parse("ETH_DEFAULT_GAS_LIMIT", 21_000),
        }
    }
}

impl Default for SubstrateNetworkConfig {
    fn default() -> Self {
        Self {
            rpc_url: std::env::var("SUBSTRATE_RPC_URL")
                .unwrap_or_else(|_| "https://rpc.polkadot.io".into()),
            request_timeout_secs: env_parse("SUBSTRATE_RPC_TIMEOUT_SECS", 30),
            history_block_window: env_parse("SUBSTRATE_HISTORY_BLOCKS", 100),
            history_page_size: env_parse("SUBSTRATE_HISTORY_LIMIT", 10),
            balances_pallet_index: env_parse("SUBSTRATE_BALANCES_PALLET", 5),
            transfer_call_index: env_parse("SUBSTRATE_TRANSFER_CALL", 3),
        }
    }
}

impl Default for SolanaNetworkConfig {
    fn default() -> Self {
        Self {
            rpc_url: std::env::var("SOLANA_RPC_URL")
                .unwrap_or_else(|_| "https://api.mainnet-beta.solana.com".into()),
            request_timeout_secs: env_parse("SOLANA_RPC_TIMEOUT_SECS", 30),
            history_page_size: env_parse("SOLANA_HISTORY_LIMIT", 10),
            commitment: std::env::var("SOLANA_COMMITMENT").unwrap_or_else(|_| "confirmed".into()),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".into()),
            enable_file_logging: env_flag("LOG_FILE_ENABLED", false),
            log_file_path: std::env::var("LOG_FILE_PATH").ok(),
        }
    }
}

impl NetworksConfig {
    pub fn rpc_url(&self, family: ChainFamily) -> &str {
        match family {
            ChainFamily::Ethereum => &self.ethereum.rpc_url,
            ChainFamily::Substrate => &self.substrate.rpc_url,
            ChainFamily::Solana => &self.solana.rpc_url,
        }
    }

    pub fn request_timeout_secs(&self, family: ChainFamily) -> u64 {
        match family {
            ChainFamily::Ethereum => self.ethereum.request_timeout_secs,
            ChainFamily::Substrate => self.substrate.request_timeout_secs,
            ChainFamily::Solana => self.solana.request_timeout_secs,
        }
    }
}

impl WalletConfig {
    /// 从环境变量加载配置（先读取 .env）
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            storage: StorageConfig::default(),
            networks: NetworksConfig::default(),
            logging: LoggingConfig::default(),
        })
    }

    /// 从配置文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: WalletConfig =
            toml::from_str(&content).with_context(|| "Failed to parse config file as TOML")?;

        Ok(config)
    }

    /// 从环境变量和配置文件合并加载（配置文件中出现的段覆盖环境变量）
    pub fn from_env_and_file<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut config = Self::from_env()?;

        if let Some(path) = path {
            if path.as_ref().exists() {
                config = Self::from_file(path)?;
            }
        }

        Ok(config)
    }

    /// 使用指定的钱包库目录（测试和嵌入场景）
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.storage.base_dir = base_dir.into();
        self
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        if self.storage.base_dir.as_os_str().is_empty() {
            anyhow::bail!("storage.base_dir must not be empty");
        }

        for family in ChainFamily::ALL {
            let url = self.networks.rpc_url(family);
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("{family} rpc_url must start with http:// or https://");
            }
            if self.networks.request_timeout_secs(family) == 0 {
                anyhow::bail!("{family} request_timeout_secs must be positive");
            }
        }

        if self.networks.ethereum.chain_id == 0 {
            anyhow::bail!("ethereum.chain_id must be non-zero");
        }
        if self.networks.ethereum.history_page_size == 0
            || self.networks.substrate.history_page_size == 0
            || self.networks.solana.history_page_size == 0
        {
            anyhow::bail!("history_page_size must be positive");
        }

        let valid_commitments = ["processed", "confirmed", "finalized"];
        if !valid_commitments.contains(&self.networks.solana.commitment.as_str()) {
            anyhow::bail!("solana.commitment must be one of: {:?}", valid_commitments);
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!("LOG_LEVEL must be one of: {:?}", valid_levels);
        }

        if self.logging.format != "json" && self.logging.format != "text" {
            anyhow::bail!("LOG_FORMAT must be 'json' or 'text'");
        }

        Ok(())
    }
}
