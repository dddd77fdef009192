//! 钱包导出包
//!
//! 明文：`{version, agentId, exportedAt, format, wallets}`；
//! 加密：`{encrypted: hex(密文) "." hex(tag), iv, salt}`，
//! 密钥 PBKDF2-SHA256(100 000 次) + AES-256-GCM。

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    domain::{
        derivation::verify_record_address,
        wallet_record::{now_millis, WalletRecord},
    },
    error::{Result, WalletError},
    infrastructure::{
        encryption::{self, SealedData, IV_LENGTH, TAG_LENGTH},
        pbkdf2::{derive_key_with_salt, generate_salt, SALT_LENGTH},
    },
};

pub const BUNDLE_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Encrypted,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Encrypted => "encrypted",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "encrypted" => Ok(Self::Encrypted),
            other => Err(WalletError::Serialization(format!(
                "unsupported export format: {other}"
            ))),
        }
    }
}

/// 导出包
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    pub version: String,
    pub agent_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub exported_at: DateTime<Utc>,
    pub format: ExportFormat,
    pub wallets: Vec<WalletRecord>,
}

impl ExportBundle {
    pub fn new(agent_id: impl Into<String>, format: ExportFormat, wallets: Vec<WalletRecord>) -> Self {
        Self {
            version: BUNDLE_VERSION.to_string(),
            agent_id: agent_id.into(),
            exported_at: now_millis(),
            format,
            wallets,
        }
    }
}

/// 密码保护的外层包
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedBundle {
    pub encrypted: String,
    pub iv: String,
    pub salt: String,
}

impl EncryptedBundle {
    fn seal(plaintext: &[u8], password: &str) -> Result<Self> {
        let salt = generate_salt();
        let key = derive_key_with_salt(password, &salt)?;
        let sealed = encryption::seal(plaintext, &key)?;

        Ok(Self {
            encrypted: format!(
                "{}.{}",
                hex::encode(&sealed.ciphertext),
                hex::encode(sealed.tag)
            ),
            iv: hex::encode(sealed.iv),
            salt: hex::encode(salt),
        })
    }

    fn open(&self, password: &str) -> Result<Vec<u8>> {
        let malformed = |what: &str| WalletError::Decryption(format!("malformed bundle: {what}"));

        let (ct_hex, tag_hex) = self
            .encrypted
            .split_once('.')
            .ok_or_else(|| malformed("missing auth tag"))?;
        let ciphertext = hex::decode(ct_hex).map_err(|_| malformed("ciphertext"))?;
        let tag: [u8; TAG_LENGTH] = hex::decode(tag_hex)
            .ok()
            .and_then(|t| t.try_into().ok())
            .ok_or_else(|| malformed("auth tag"))?;
        let iv: [u8; IV_LENGTH] = hex::decode(&self.iv)
            .ok()
            .and_then(|t| t.try_into().ok())
            .ok_or_else(|| malformed("iv"))?;
        let salt = hex::decode(&self.salt)
            .ok()
            .filter(|s| s.len() == SALT_LENGTH)
            .ok_or_else(|| malformed("salt"))?;

        let key = derive_key_with_salt(password, &salt)?;
        encryption::open(&SealedData { ciphertext, tag, iv }, &key)
    }
}

/// 序列化导出包；`Encrypted` 格式必须提供密码
pub fn export_bundle(bundle: &ExportBundle, password: Option<&str>) -> Result<String> {
    let plain = serde_json::to_vec(bundle)?;

    match bundle.format {
        ExportFormat::Json => Ok(String::from_utf8_lossy(&plain).into_owned()),
        ExportFormat::Encrypted => {
            let password = password
                .filter(|p| !p.is_empty())
                .ok_or_else(|| WalletError::Encryption("password required for encrypted export".into()))?;
            let outer = EncryptedBundle::seal(&plain, password)?;
            Ok(serde_json::to_string(&outer)?)
        }
    }
}

/// 解析导出包；加密包先校验认证标签再解析明文，
/// 每个钱包的地址须能由其秘密材料重新算出
pub fn import_bundle(data: &str, password: Option<&str>) -> Result<ExportBundle> {
    let value: Value = serde_json::from_str(data)?;

    let bundle: ExportBundle = if value.get("encrypted").is_some() {
        let outer: EncryptedBundle = serde_json::from_value(value)?;
        let password = password.ok_or_else(|| {
            WalletError::Decryption("bundle is encrypted, password required".into())
        })?;
        let plain = outer.open(password)?;
        serde_json::from_slice(&plain)?
    } else {
        serde_json::from_value(value)?
    };

    if bundle.version != BUNDLE_VERSION {
        return Err(WalletError::Serialization(format!(
            "unsupported bundle version {}",
            bundle.version
        )));
    }
    for wallet in &bundle.wallets {
        wallet.validate()?;
        verify_record_address(wallet)?;
    }

    Ok(bundle)
}
