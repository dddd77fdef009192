//! 钱包文件存储
//!
//! 布局 `<base_dir>/<agent_id>/<wallet_id>.wallet`，文件内容为
//! `bincode(StoredWallet) ‖ be32(checksum)`，读取时先校验再解码。
//! 同一钱包的并发 save 不做串行化，后写者覆盖。

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::{
    domain::{
        chain_config::ChainFamily,
        wallet_record::{CreationMethod, WalletRecord},
    },
    error::{Result, WalletError},
    infrastructure::fs_secure,
};

pub const WALLET_FILE_EXTENSION: &str = "wallet";
const CHECKSUM_LEN: usize = 4;
const STORED_WALLET_VERSION: u8 = 1;

/// 滚动折叠校验和：`c = c * 31 + byte`（u32 回绕）
pub fn checksum(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .fold(0u32, |c, b| c.wrapping_mul(31).wrapping_add(u32::from(*b)))
}

/// 磁盘格式
///
/// 可选字段缺失时按文档化的默认值补齐，兼容早期写入的记录。
#[derive(Debug, Serialize, Deserialize)]
struct StoredWallet {
    version: u8,
    id: String,
    agent_id: String,
    chain: String,
    address: String,
    private_key: Option<String>,
    mnemonic: Option<String>,
    seed_derivation_path: Option<String>,
    created_at: i64,
    updated_at: Option<i64>,
    creation_method: Option<String>,
    chain_metadata: Option<Vec<(String, String)>>,
}

fn millis_to_datetime(ms: i64, path: &Path) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single().ok_or_else(|| {
        WalletError::Serialization(format!("{}: timestamp {ms} out of range", path.display()))
    })
}

impl From<&WalletRecord> for StoredWallet {
    fn from(record: &WalletRecord) -> Self {
        Self {
            version: STORED_WALLET_VERSION,
            id: record.id.clone(),
            agent_id: record.agent_id.clone(),
            chain: record.chain.as_str().to_string(),
            address: record.address.clone(),
            private_key: record.private_key.clone(),
            mnemonic: record.mnemonic.clone(),
            seed_derivation_path: Some(record.seed_derivation_path.clone()),
            created_at: record.created_at.timestamp_millis(),
            updated_at: Some(record.updated_at.timestamp_millis()),
            creation_method: Some(record.creation_method.as_str().to_string()),
            chain_metadata: record
                .chain_metadata
                .as_ref()
                .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
        }
    }
}

impl StoredWallet {
    fn into_record(self, path: &Path) -> Result<WalletRecord> {
        let chain: ChainFamily = self.chain.parse()?;
        let created_at = millis_to_datetime(self.created_at, path)?;
        let updated_at = match self.updated_at {
            Some(ms) => millis_to_datetime(ms, path)?,
            None => created_at,
        };
        let creation_method = match self.creation_method.as_deref() {
            Some(method) => method.parse()?,
            None if self.private_key.is_some() => CreationMethod::PrivateKey,
            None => CreationMethod::Mnemonic,
        };

        Ok(WalletRecord {
            id: self.id,
            agent_id: self.agent_id,
            chain,
            address: self.address,
            private_key: self.private_key,
            mnemonic: self.mnemonic,
            seed_derivation_path: self
                .seed_derivation_path
                .unwrap_or_else(|| chain.default_derivation_path().to_string()),
            created_at,
            updated_at,
            creation_method,
            chain_metadata: self
                .chain_metadata
                .map(|pairs| pairs.into_iter().collect::<BTreeMap<_, _>>()),
        })
    }
}

/// 编码记录并附加校验和
pub fn encode_wallet_file(record: &WalletRecord) -> Result<Vec<u8>> {
    let mut bytes = bincode::serialize(&StoredWallet::from(record))?;
    let sum = checksum(&bytes);
    bytes.extend_from_slice(&sum.to_be_bytes());
    Ok(bytes)
}

/// 校验并解码钱包文件内容
pub fn decode_wallet_file(bytes: &[u8], path: &Path) -> Result<WalletRecord> {
    if bytes.len() < CHECKSUM_LEN {
        return Err(WalletError::IntegrityError {
            path: path.display().to_string(),
            expected: 0,
            actual: checksum(bytes),
        });
    }

    let (payload, trailer) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
    let mut expected = [0u8; CHECKSUM_LEN];
    expected.copy_from_slice(trailer);
    let expected = u32::from_be_bytes(expected);
    let actual = checksum(payload);

    if expected != actual {
        return Err(WalletError::IntegrityError {
            path: path.display().to_string(),
            expected,
            actual,
        });
    }

    let stored: StoredWallet = bincode::deserialize(payload)?;
    stored.into_record(path)
}

/// 单个钱包文件的元数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletFileStats {
    pub size: u64,
    pub modified: DateTime<Utc>,
    /// 部分文件系统不提供创建时间
    pub created: Option<DateTime<Utc>>,
}

/// agent / wallet 标识只能是单级路径名
fn validate_identifier(kind: &str, id: &str) -> Result<()> {
    if id.is_empty()
        || id == "."
        || id == ".."
        || id.contains('/')
        || id.contains('\\')
        || id.contains('\0')
    {
        return Err(WalletError::InvalidIdentifier(format!(
            "{kind} '{id}' is not a valid path segment"
        )));
    }
    Ok(())
}

/// 钱包文件存储
#[derive(Debug, Clone)]
pub struct WalletStore {
    base_dir: PathBuf,
    private_permissions: bool,
}

impl WalletStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            private_permissions: true,
        }
    }

    pub fn with_private_permissions(mut self, enabled: bool) -> Self {
        self.private_permissions = enabled;
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn agent_dir(&self, agent_id: &str) -> Result<PathBuf> {
        validate_identifier("agent id", agent_id)?;
        Ok(self.base_dir.join(agent_id))
    }

    pub fn wallet_path(&self, agent_id: &str, wallet_id: &str) -> Result<PathBuf> {
        validate_identifier("wallet id", wallet_id)?;
        Ok(self
            .agent_dir(agent_id)?
            .join(format!("{wallet_id}.{WALLET_FILE_EXTENSION}")))
    }

    /// 写入钱包（整文件一次写入）
    pub async fn save(&self, record: &WalletRecord) -> Result<PathBuf> {
        record.validate()?;

        let dir = self.agent_dir(&record.agent_id)?;
        fs_secure::ensure_dir(&self.base_dir, self.private_permissions).await?;
        fs_secure::ensure_dir(&dir, self.private_permissions).await?;

        let path = self.wallet_path(&record.agent_id, &record.id)?;
        let bytes = encode_wallet_file(record)?;
        fs_secure::write_file(&path, &bytes, self.private_permissions).await?;

        tracing::info!(
            agent_id = %record.agent_id,
            wallet_id = %record.id,
            chain = %record.chain,
            bytes = bytes.len(),
            "wallet saved"
        );
        Ok(path)
    }

    /// 读取钱包；文件不存在返回 `None`
    pub async fn load(&self, agent_id: &str, wallet_id: &str) -> Result<Option<WalletRecord>> {
        let path = self.wallet_path(agent_id, wallet_id)?;

        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match decode_wallet_file(&bytes, &path) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                tracing::warn!(agent_id, wallet_id, error = %e, "wallet file rejected");
                Err(e)
            }
        }
    }

    /// 删除钱包文件；返回是否确实删除了文件
    pub async fn delete(&self, agent_id: &str, wallet_id: &str) -> Result<bool> {
        let path = self.wallet_path(agent_id, wallet_id)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(agent_id, wallet_id, "wallet file deleted");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn exists(&self, agent_id: &str, wallet_id: &str) -> Result<bool> {
        let path = self.wallet_path(agent_id, wallet_id)?;
        Ok(fs::try_exists(&path).await?)
    }

    /// 列出 agent 下所有钱包 id（排序）
    pub async fn list(&self, agent_id: &str) -> Result<Vec<String>> {
        let dir = self.agent_dir(agent_id)?;
        let mut ids = Vec::new();

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(WALLET_FILE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }

        ids.sort();
        Ok(ids)
    }

    /// 列出所有 agent（base_dir 下的子目录）
    pub async fn list_agents(&self) -> Result<Vec<String>> {
        let mut agents = Vec::new();

        let mut entries = match fs::read_dir(&self.base_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(agents),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    agents.push(name.to_string());
                }
            }
        }

        agents.sort();
        Ok(agents)
    }

    pub async fn stats(&self, agent_id: &str, wallet_id: &str) -> Result<Option<WalletFileStats>> {
        let path = self.wallet_path(agent_id, wallet_id)?;
        let metadata = match fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        Ok(Some(WalletFileStats {
            size: metadata.len(),
            modified: DateTime::<Utc>::from(metadata.modified()?),
            created: metadata.created().ok().map(DateTime::<Utc>::from),
        }))
    }

    /// 复制 agent 的全部钱包文件到 `dest_dir`（原始字节，不重新校验）
    pub async fn backup(&self, agent_id: &str, dest_dir: &Path) -> Result<usize> {
        let src_dir = self.agent_dir(agent_id)?;
        fs_secure::ensure_dir(dest_dir, self.private_permissions).await?;

        let mut copied = 0;
        for wallet_id in self.list(agent_id).await? {
            let file_name = format!("{wallet_id}.{WALLET_FILE_EXTENSION}");
            fs::copy(src_dir.join(&file_name), dest_dir.join(&file_name)).await?;
            copied += 1;
        }

        tracing::info!(agent_id, dest = %dest_dir.display(), copied, "agent wallets backed up");
        Ok(copied)
    }

    /// 从 `src_dir` 复制钱包文件回 agent 目录（覆盖同名文件，不重新校验）
    pub async fn restore(&self, agent_id: &str, src_dir: &Path) -> Result<usize> {
        let dest_dir = self.agent_dir(agent_id)?;
        fs_secure::ensure_dir(&self.base_dir, self.private_permissions).await?;
        fs_secure::ensure_dir(&dest_dir, self.private_permissions).await?;

        let mut entries = fs::read_dir(src_dir).await?;
        let mut restored = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(WALLET_FILE_EXTENSION) {
                continue;
            }
            let Some(file_name) = path.file_name() else {
                continue;
            };
            let target = dest_dir.join(file_name);
            fs::copy(&path, &target).await?;
            if self.private_permissions {
                fs_secure::set_permissions(&target, fs_secure::PRIVATE_FILE_MODE).await?;
            }
            restored += 1;
        }

        tracing::info!(agent_id, src = %src_dir.display(), restored, "agent wallets restored");
        Ok(restored)
    }

    /// agent 目录下钱包文件总字节数
    pub async fn storage_size(&self, agent_id: &str) -> Result<u64> {
        let mut total = 0;
        for wallet_id in self.list(agent_id).await? {
            if let Some(stats) = self.stats(agent_id, &wallet_id).await? {
                total += stats.size;
            }
        }
        Ok(total)
    }

    /// 删除 agent 目录（含全部钱包）；返回删除的钱包数
    pub async fn delete_agent(&self, agent_id: &str) -> Result<usize> {
        let ids = self.list(agent_id).await?;
        let dir = self.agent_dir(agent_id)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tracing::info!(agent_id, removed = ids.len(), "agent wallets deleted");
        Ok(ids.len())
    }
}
