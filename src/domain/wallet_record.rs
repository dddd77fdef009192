//! 钱包记录领域模型
//!
//! 每条记录恰好携带一种秘密材料（私钥或助记词），与创建方式对应；
//! 地址是 (链族, 密钥对) 的纯函数。

use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{
    domain::chain_config::ChainFamily,
    error::{Result, WalletError},
};

/// 钱包创建方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CreationMethod {
    /// 新生成助记词
    Generate,
    /// 从种子短语导入
    Seed,
    /// 从助记词导入
    Mnemonic,
    /// 直接导入私钥
    PrivateKey,
}

impl CreationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generate => "generate",
            Self::Seed => "seed",
            Self::Mnemonic => "mnemonic",
            Self::PrivateKey => "private-key",
        }
    }

    /// 是否以助记词作为秘密材料
    pub fn uses_seed_phrase(&self) -> bool {
        !matches!(self, Self::PrivateKey)
    }
}

impl fmt::Display for CreationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CreationMethod {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "generate" => Ok(Self::Generate),
            "seed" => Ok(Self::Seed),
            "mnemonic" => Ok(Self::Mnemonic),
            "private-key" | "private_key" | "privatekey" => Ok(Self::PrivateKey),
            _ => Err(WalletError::UnsupportedCreationMethod(s.to_string())),
        }
    }
}

/// 密钥对（内存中短暂存在，drop 时清零）
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyPair {
    pub private_key: Vec<u8>,
    pub public_key: Vec<u8>,
}

impl KeyPair {
    pub fn new(private_key: Vec<u8>, public_key: Vec<u8>) -> Self {
        Self {
            private_key,
            public_key,
        }
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(&self.public_key)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("private_key", &"<redacted>")
            .field("public_key", &self.public_key_hex())
            .finish()
    }
}

/// 钱包记录
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletRecord {
    pub id: String,
    pub agent_id: String,
    pub chain: ChainFamily,
    pub address: String,
    /// 私钥 (hex 编码，不带 0x 前缀)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mnemonic: Option<String>,
    pub seed_derivation_path: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
    pub creation_method: CreationMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_metadata: Option<BTreeMap<String, String>>,
}

impl WalletRecord {
    /// 校验秘密材料与创建方式一致（恰好一种），时间戳须为整毫秒
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() || self.agent_id.is_empty() {
            return Err(WalletError::Serialization(
                "wallet record requires id and agentId".to_string(),
            ));
        }

        for (field, value) in [("createdAt", self.created_at), ("updatedAt", self.updated_at)] {
            if !is_whole_millis(value) {
                return Err(WalletError::Serialization(format!(
                    "wallet {} {field} has sub-millisecond precision ({value}); \
                     truncate it with truncate_to_millis first",
                    self.id
                )));
            }
        }

        match (
            self.creation_method.uses_seed_phrase(),
            self.private_key.is_some(),
            self.mnemonic.is_some(),
        ) {
            (true, false, true) | (false, true, false) => Ok(()),
            _ => Err(WalletError::Serialization(format!(
                "wallet {} must carry exactly one secret matching creation method '{}'",
                self.id, self.creation_method
            ))),
        }
    }

    /// 刷新更新时间
    pub fn touch(&mut self) {
        self.updated_at = now_millis();
    }

    pub fn cache_key(&self) -> String {
        connection_key(&self.agent_id, &self.id)
    }
}

impl fmt::Debug for WalletRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletRecord")
            .field("id", &self.id)
            .field("agent_id", &self.agent_id)
            .field("chain", &self.chain)
            .field("address", &self.address)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("mnemonic", &self.mnemonic.as_ref().map(|_| "<redacted>"))
            .field("seed_derivation_path", &self.seed_derivation_path)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .field("creation_method", &self.creation_method)
            .field("chain_metadata", &self.chain_metadata)
            .finish()
    }
}

/// 连接缓存键 `agentId:walletId`
pub fn connection_key(agent_id: &str, wallet_id: &str) -> String {
    format!("{agent_id}:{wallet_id}")
}

/// 当前时间，截断到毫秒（与持久化精度一致）
pub fn now_millis() -> DateTime<Utc> {
    truncate_to_millis(Utc::now())
}

pub fn truncate_to_millis(value: DateTime<Utc>) -> DateTime<Utc> {
    value
        .duration_trunc(Duration::milliseconds(1))
        .unwrap_or(value)
}

fn is_whole_millis(value: DateTime<Utc>) -> bool {
    value.timestamp_subsec_nanos() % 1_000_000 == 0
}
