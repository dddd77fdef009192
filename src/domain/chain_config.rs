//! 链族配置模块
//!
//! 定义支持的三个链族（Ethereum 系、Substrate 系、Solana 系）及其派生、
//! 单位与费用参数

use std::{collections::HashMap, fmt, str::FromStr};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::WalletError;

/// 链族
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainFamily {
    /// Ethereum 系 (EVM)
    Ethereum,
    /// Substrate 系 (Polkadot/Kusama)
    Substrate,
    /// Solana 系
    Solana,
}

/// 签名方案
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureScheme {
    /// secp256k1 ECDSA（可恢复签名）
    Secp256k1,
    /// Ed25519
    Ed25519,
}

/// 地址编码格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFormat {
    /// 十六进制 0x...
    Hex,
    /// Base58（Substrate 简化格式，亦接受 SS58）
    Base58Hash,
    /// Base58 编码的 32 字节公钥
    Base58PublicKey,
}

/// 链族静态参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSpec {
    pub family: ChainFamily,
    pub name: String,
    /// 原生代币符号 (ETH, DOT, SOL)
    pub denomination: String,
    /// 基础单位小数位（10^decimals 为换算因子）
    pub decimals: u32,
    pub signature_scheme: SignatureScheme,
    pub address_format: AddressFormat,
    /// BIP44 coin type（Substrate 为 354，仅作记录）
    pub coin_type: u32,
    /// 默认派生路径
    pub default_derivation_path: String,
    /// 网络不可用时的费用估算兜底值（人类可读单位）
    pub fallback_fee: String,
}

/// 别名表（静态初始化）
static FAMILY_ALIASES: Lazy<HashMap<&'static str, ChainFamily>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for alias in ["ethereum", "ethereum-like", "eth", "evm"] {
        map.insert(alias, ChainFamily::Ethereum);
    }
    for alias in ["substrate", "substrate-like", "polkadot", "dot", "kusama", "ksm"] {
        map.insert(alias, ChainFamily::Substrate);
    }
    for alias in ["solana", "solana-like", "sol"] {
        map.insert(alias, ChainFamily::Solana);
    }
    map
});

impl ChainFamily {
    pub const ALL: [ChainFamily; 3] = [
        ChainFamily::Ethereum,
        ChainFamily::Substrate,
        ChainFamily::Solana,
    ];

    /// 规范名称（小写，用于持久化和缓存键）
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ethereum => "ethereum",
            Self::Substrate => "substrate",
            Self::Solana => "solana",
        }
    }

    pub fn spec(&self) -> ChainSpec {
        match self {
            Self::Ethereum => ChainSpec {
                family: *self,
                name: "Ethereum".to_string(),
                denomination: "ETH".to_string(),
                decimals: 18,
                signature_scheme: SignatureScheme::Secp256k1,
                address_format: AddressFormat::Hex,
                coin_type: 60,
                default_derivation_path: "m/44'/60'/0'/0/0".to_string(),
                // 21000 gas * 20 Gwei
                fallback_fee: "0.00042".to_string(),
            },
            Self::Substrate => ChainSpec {
                family: *self,
                name: "Polkadot".to_string(),
                denomination: "DOT".to_string(),
                decimals: 10,
                signature_scheme: SignatureScheme::Ed25519,
                address_format: AddressFormat::Base58Hash,
                coin_type: 354,
                default_derivation_path: "//hard//stash".to_string(),
                fallback_fee: "0.01".to_string(),
            },
            Self::Solana => ChainSpec {
                family: *self,
                name: "Solana".to_string(),
                denomination: "SOL".to_string(),
                decimals: 9,
                signature_scheme: SignatureScheme::Ed25519,
                address_format: AddressFormat::Base58PublicKey,
                coin_type: 501,
                default_derivation_path: "m/44'/501'/0'/0'/0'".to_string(),
                // 5000 lamports
                fallback_fee: "0.000005".to_string(),
            },
        }
    }

    pub fn default_derivation_path(&self) -> &'static str {
        match self {
            Self::Ethereum => "m/44'/60'/0'/0/0",
            Self::Substrate => "//hard//stash",
            Self::Solana => "m/44'/501'/0'/0'/0'",
        }
    }

    /// 派生路径是否为分层结构（Substrate 使用不透明路径）
    pub fn uses_hierarchical_path(&self) -> bool {
        !matches!(self, Self::Substrate)
    }
}

impl fmt::Display for ChainFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChainFamily {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        FAMILY_ALIASES
            .get(normalized.as_str())
            .copied()
            .ok_or_else(|| WalletError::UnsupportedChain(s.to_string()))
    }
}

/// 链族注册表
pub struct ChainRegistry {
    specs: HashMap<ChainFamily, ChainSpec>,
}

impl ChainRegistry {
    /// 创建预配置的注册表
    pub fn new() -> Self {
        let specs = ChainFamily::ALL
            .iter()
            .map(|family| (*family, family.spec()))
            .collect();
        Self { specs }
    }

    pub fn get(&self, family: ChainFamily) -> Option<&ChainSpec> {
        self.specs.get(&family)
    }

    /// 通过名称或别名获取配置
    pub fn resolve(&self, chain: &str) -> Result<&ChainSpec, WalletError> {
        let family: ChainFamily = chain.parse()?;
        self.specs
            .get(&family)
            .ok_or_else(|| WalletError::UnsupportedChain(chain.to_string()))
    }

    pub fn list_all(&self) -> Vec<&ChainSpec> {
        let mut specs: Vec<&ChainSpec> = self.specs.values().collect();
        specs.sort_by_key(|s| s.family.as_str());
        specs
    }
}

impl Default for ChainRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_aliases() {
        assert_eq!("ETH".parse::<ChainFamily>().unwrap(), ChainFamily::Ethereum);
        assert_eq!(
            "solana-like".parse::<ChainFamily>().unwrap(),
            ChainFamily::Solana
        );
        assert_eq!(
            " Polkadot ".parse::<ChainFamily>().unwrap(),
            ChainFamily::Substrate
        );
        assert!(matches!(
            "bitcoin".parse::<ChainFamily>(),
            Err(WalletError::UnsupportedChain(_))
        ));
    }

    #[test]
    fn test_registry_specs() {
        let registry = ChainRegistry::new();

        let eth = registry.resolve("evm").unwrap();
        assert_eq!(eth.decimals, 18);
        assert_eq!(eth.default_derivation_path, "m/44'/60'/0'/0/0");

        let dot = registry.get(ChainFamily::Substrate).unwrap();
        assert_eq!(dot.decimals, 10);
        assert!(!dot.family.uses_hierarchical_path());

        let sol = registry.resolve("sol").unwrap();
        assert_eq!(sol.decimals, 9);
        assert_eq!(
            sol.default_derivation_path,
            ChainFamily::Solana.default_derivation_path()
        );

        assert_eq!(registry.list_all().len(), 3);
    }
}
