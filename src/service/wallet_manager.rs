//! 钱包管理服务
//!
//! 组合派生引擎与文件存储完成创建 / 导入 / 生成，
//! 并持有 `agent:wallet → Provider` 连接缓存。

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use uuid::Uuid;

use super::{
    connection_cache::ConnectionCache,
    providers::{
        create_provider_with_transport, ChainProvider, HttpTransportFactory, Signer,
        TransportFactory,
    },
    wallet_export::{export_bundle, import_bundle, ExportBundle, ExportFormat},
};
use crate::{
    config::WalletConfig,
    domain::{
        chain_config::ChainFamily,
        derivation::{derive_wallet_key, generate_seed_phrase, normalize_phrase},
        transaction::Balance,
        wallet_record::{now_millis, CreationMethod, WalletRecord},
    },
    error::{Result, WalletError},
    repository::wallet_store::WalletStore,
};

/// 生成助记词的默认强度（12 词）
pub const DEFAULT_SEED_STRENGTH: usize = 128;

/// 创建钱包参数
#[derive(Clone, Default)]
pub struct CreateWalletOptions {
    pub agent_id: String,
    pub chain: Option<ChainFamily>,
    pub method: Option<CreationMethod>,
    pub seed_phrase: Option<String>,
    pub private_key: Option<String>,
    pub derivation_path: Option<String>,
    /// 缺省时生成 UUID v4
    pub wallet_id: Option<String>,
    pub chain_metadata: Option<BTreeMap<String, String>>,
}

impl CreateWalletOptions {
    pub fn new(agent_id: impl Into<String>, chain: ChainFamily, method: CreationMethod) -> Self {
        Self {
            agent_id: agent_id.into(),
            chain: Some(chain),
            method: Some(method),
            ..Default::default()
        }
    }

    pub fn with_seed_phrase(mut self, phrase: impl Into<String>) -> Self {
        self.seed_phrase = Some(phrase.into());
        self
    }

    pub fn with_private_key(mut self, key: impl Into<String>) -> Self {
        self.private_key = Some(key.into());
        self
    }

    pub fn with_derivation_path(mut self, path: impl Into<String>) -> Self {
        self.derivation_path = Some(path.into());
        self
    }

    pub fn with_wallet_id(mut self, id: impl Into<String>) -> Self {
        self.wallet_id = Some(id.into());
        self
    }

    pub fn with_chain_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.chain_metadata = Some(metadata);
        self
    }
}

// 秘密字段不进日志
impl std::fmt::Debug for CreateWalletOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateWalletOptions")
            .field("agent_id", &self.agent_id)
            .field("chain", &self.chain)
            .field("method", &self.method)
            .field("derivation_path", &self.derivation_path)
            .field("wallet_id", &self.wallet_id)
            .finish_non_exhaustive()
    }
}

/// 持久化参数
#[derive(Debug, Clone, Default)]
pub struct StorageOptions {
    /// 覆盖默认钱包库目录
    pub base_dir: Option<PathBuf>,
    /// 允许覆盖同 ID 的已有钱包
    pub overwrite: bool,
}

impl StorageOptions {
    pub fn at(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
            overwrite: false,
        }
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

/// 钱包管理器
pub struct WalletManager {
    config: WalletConfig,
    store: WalletStore,
    connections: ConnectionCache,
    transports: Arc<dyn TransportFactory>,
}

impl WalletManager {
    pub fn new(config: WalletConfig) -> Self {
        let store = WalletStore::new(config.storage.base_dir.clone())
            .with_private_permissions(config.storage.private_permissions);
        Self {
            config,
            store,
            connections: ConnectionCache::new(),
            transports: Arc::new(HttpTransportFactory),
        }
    }

    /// 从环境变量（含 .env）加载配置
    pub fn from_env() -> Result<Self> {
        let config = WalletConfig::from_env().map_err(|e| WalletError::Config(format!("{e:#}")))?;
        config
            .validate()
            .map_err(|e| WalletError::Config(format!("{e:#}")))?;
        Ok(Self::new(config))
    }

    pub fn with_transport_factory(mut self, transports: Arc<dyn TransportFactory>) -> Self {
        self.transports = transports;
        self
    }

    /// 注入共享的连接缓存
    pub fn with_connection_cache(mut self, connections: ConnectionCache) -> Self {
        self.connections = connections;
        self
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    pub fn store(&self) -> &WalletStore {
        &self.store
    }

    pub fn connections(&self) -> &ConnectionCache {
        &self.connections
    }

    fn store_for(&self, storage: &StorageOptions) -> WalletStore {
        match &storage.base_dir {
            Some(dir) => WalletStore::new(dir.clone())
                .with_private_permissions(self.config.storage.private_permissions),
            None => self.store.clone(),
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 创建 / 导入
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// 派生密钥、组装记录并持久化
    pub async fn create_wallet(
        &self,
        options: CreateWalletOptions,
        storage: StorageOptions,
    ) -> Result<WalletRecord> {
        let chain = options
            .chain
            .ok_or_else(|| WalletError::UnsupportedChain("chain is required".into()))?;
        let method = options
            .method
            .ok_or_else(|| WalletError::UnsupportedCreationMethod("creation method is required".into()))?;

        let derived = derive_wallet_key(
            method,
            options.seed_phrase.as_deref(),
            options.private_key.as_deref(),
            options.derivation_path.as_deref(),
            chain,
        )?;

        let wallet_id = options
            .wallet_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let store = self.store_for(&storage);
        if !storage.overwrite && store.exists(&options.agent_id, &wallet_id).await? {
            return Err(WalletError::WalletAlreadyExists {
                agent_id: options.agent_id.clone(),
                wallet_id,
            });
        }

        let (private_key, mnemonic) = if method.uses_seed_phrase() {
            (None, options.seed_phrase.as_deref().map(normalize_phrase))
        } else {
            (Some(derived.private_key_hex()), None)
        };

        let now = now_millis();
        let record = WalletRecord {
            id: wallet_id,
            agent_id: options.agent_id.clone(),
            chain,
            address: derived.address.clone(),
            private_key,
            mnemonic,
            seed_derivation_path: derived.derivation_path.clone(),
            created_at: now,
            updated_at: now,
            creation_method: method,
            chain_metadata: options.chain_metadata.clone(),
        };

        store.save(&record).await?;

        tracing::info!(
            agent_id = %record.agent_id,
            wallet_id = %record.id,
            chain = %chain,
            method = %method,
            address = %record.address,
            "wallet created"
        );

        Ok(record)
    }

    pub async fn import_wallet_from_private_key(
        &self,
        agent_id: &str,
        chain: &str,
        private_key: &str,
    ) -> Result<WalletRecord> {
        let options = CreateWalletOptions::new(agent_id, chain.parse()?, CreationMethod::PrivateKey)
            .with_private_key(private_key);
        self.create_wallet(options, StorageOptions::default()).await
    }

    pub async fn import_wallet_from_seed(
        &self,
        agent_id: &str,
        chain: &str,
        seed_phrase: &str,
        derivation_path: Option<&str>,
    ) -> Result<WalletRecord> {
        self.import_phrase(agent_id, chain, seed_phrase, derivation_path, CreationMethod::Seed)
            .await
    }

    pub async fn import_wallet_from_mnemonic(
        &self,
        agent_id: &str,
        chain: &str,
        mnemonic: &str,
        derivation_path: Option<&str>,
    ) -> Result<WalletRecord> {
        self.import_phrase(agent_id, chain, mnemonic, derivation_path, CreationMethod::Mnemonic)
            .await
    }

    /// 生成新助记词（12 词）后按 seed 流程导入，记录为 `generate`
    pub async fn generate_wallet(
        &self,
        agent_id: &str,
        chain: &str,
        derivation_path: Option<&str>,
    ) -> Result<WalletRecord> {
        let phrase = zeroize::Zeroizing::new(generate_seed_phrase(DEFAULT_SEED_STRENGTH)?);
        self.import_phrase(agent_id, chain, &phrase, derivation_path, CreationMethod::Generate)
            .await
    }

    async fn import_phrase(
        &self,
        agent_id: &str,
        chain: &str,
        phrase: &str,
        derivation_path: Option<&str>,
        method: CreationMethod,
    ) -> Result<WalletRecord> {
        let mut options =
            CreateWalletOptions::new(agent_id, chain.parse()?, method).with_seed_phrase(phrase);
        if let Some(path) = derivation_path {
            options = options.with_derivation_path(path);
        }
        self.create_wallet(options, StorageOptions::default()).await
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 查询 / 删除
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub async fn get_wallet(&self, agent_id: &str, wallet_id: &str) -> Result<Option<WalletRecord>> {
        self.store.load(agent_id, wallet_id).await
    }

    /// 按 ID 排序返回 agent 的全部钱包
    pub async fn list_agent_wallets(&self, agent_id: &str) -> Result<Vec<WalletRecord>> {
        let mut wallets = Vec::new();
        for wallet_id in self.store.list(agent_id).await? {
            if let Some(record) = self.store.load(agent_id, &wallet_id).await? {
                wallets.push(record);
            }
        }
        Ok(wallets)
    }

    pub async fn has_wallet(&self, agent_id: &str, wallet_id: &str) -> Result<bool> {
        self.store.exists(agent_id, wallet_id).await
    }

    /// 删除钱包文件并驱逐缓存连接；返回文件是否存在
    pub async fn remove_wallet(&self, agent_id: &str, wallet_id: &str) -> Result<bool> {
        let removed = self.store.delete(agent_id, wallet_id).await?;
        self.clear_cached_connection(agent_id, wallet_id).await;

        if removed {
            tracing::info!(agent_id = %agent_id, wallet_id = %wallet_id, "wallet removed");
        }
        Ok(removed)
    }

    /// 删除 agent 的全部钱包，返回删除数量
    pub async fn clear_agent_wallets(&self, agent_id: &str) -> Result<usize> {
        let mut removed = 0;
        for wallet_id in self.store.list(agent_id).await? {
            if self.remove_wallet(agent_id, &wallet_id).await? {
                removed += 1;
            }
        }
        // 没有对应文件的缓存连接也一并清掉
        self.connections.evict_agent(agent_id).await;

        tracing::info!(agent_id = %agent_id, removed, "agent wallets cleared");
        Ok(removed)
    }

    /// 合并链元数据并刷新 `updated_at`
    pub async fn update_chain_metadata(
        &self,
        agent_id: &str,
        wallet_id: &str,
        metadata: BTreeMap<String, String>,
    ) -> Result<WalletRecord> {
        let mut record = self
            .store
            .load(agent_id, wallet_id)
            .await?
            .ok_or_else(|| WalletError::wallet_not_found(agent_id, wallet_id))?;

        record
            .chain_metadata
            .get_or_insert_with(BTreeMap::new)
            .extend(metadata);
        record.touch();
        self.store.save(&record).await?;
        Ok(record)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 连接缓存
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub async fn cache_wallet_connection(
        &self,
        agent_id: &str,
        wallet_id: &str,
        provider: Arc<dyn ChainProvider>,
    ) {
        self.connections.insert(agent_id, wallet_id, provider).await;
    }

    pub async fn get_cached_connection(
        &self,
        agent_id: &str,
        wallet_id: &str,
    ) -> Option<Arc<dyn ChainProvider>> {
        self.connections.get(agent_id, wallet_id).await
    }

    /// 驱逐缓存连接并断开；返回是否存在
    pub async fn clear_cached_connection(&self, agent_id: &str, wallet_id: &str) -> bool {
        match self.connections.evict(agent_id, wallet_id).await {
            Some(provider) => {
                if let Err(e) = provider.disconnect().await {
                    tracing::warn!(agent_id = %agent_id, wallet_id = %wallet_id, error = %e, "disconnect on evict failed");
                }
                true
            }
            None => false,
        }
    }

    /// 为钱包建立已连接且绑定签名密钥的 Provider，并写入缓存
    ///
    /// 缓存中已有已连接的 Provider 时直接复用。
    pub async fn connect_wallet(
        &self,
        agent_id: &str,
        wallet_id: &str,
    ) -> Result<Arc<dyn ChainProvider>> {
        if let Some(provider) = self.connections.get(agent_id, wallet_id).await {
            if provider.is_connected().await {
                return Ok(provider);
            }
        }

        let record = self
            .store
            .load(agent_id, wallet_id)
            .await?
            .ok_or_else(|| WalletError::wallet_not_found(agent_id, wallet_id))?;

        let transport = self.transports.create(record.chain, &self.config.networks)?;
        let provider = create_provider_with_transport(record.chain, &self.config.networks, transport);
        provider.connect().await?;
        provider.attach_signer(Signer::from_record(&record)?).await?;

        self.connections
            .insert(agent_id, wallet_id, provider.clone())
            .await;
        Ok(provider)
    }

    /// 查询钱包地址余额（按需建立连接）
    pub async fn get_wallet_balance(&self, agent_id: &str, wallet_id: &str) -> Result<Balance> {
        let record = self
            .store
            .load(agent_id, wallet_id)
            .await?
            .ok_or_else(|| WalletError::wallet_not_found(agent_id, wallet_id))?;
        let provider = self.connect_wallet(agent_id, wallet_id).await?;
        provider.get_balance(&record.address).await
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 导出 / 备份
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub async fn export_agent_wallets(
        &self,
        agent_id: &str,
        format: ExportFormat,
        password: Option<&str>,
    ) -> Result<String> {
        let wallets = self.list_agent_wallets(agent_id).await?;
        let count = wallets.len();
        let bundle = ExportBundle::new(agent_id, format, wallets);
        let data = export_bundle(&bundle, password)?;

        tracing::info!(agent_id = %agent_id, format = %format, wallets = count, "wallets exported");
        Ok(data)
    }

    /// 导入导出包；已存在的钱包在 `overwrite = false` 时跳过
    pub async fn import_agent_wallets(
        &self,
        data: &str,
        password: Option<&str>,
        overwrite: bool,
    ) -> Result<Vec<WalletRecord>> {
        let bundle = import_bundle(data, password)?;
        let mut imported = Vec::with_capacity(bundle.wallets.len());

        for record in bundle.wallets {
            if !overwrite && self.store.exists(&record.agent_id, &record.id).await? {
                tracing::warn!(
                    agent_id = %record.agent_id,
                    wallet_id = %record.id,
                    "wallet already exists, skipped"
                );
                continue;
            }
            self.store.save(&record).await?;
            imported.push(record);
        }

        tracing::info!(agent_id = %bundle.agent_id, imported = imported.len(), "wallets imported");
        Ok(imported)
    }

    pub async fn backup_agent(&self, agent_id: &str, dest_dir: &Path) -> Result<usize> {
        self.store.backup(agent_id, dest_dir).await
    }

    pub async fn restore_agent(&self, agent_id: &str, src_dir: &Path) -> Result<usize> {
        self.store.restore(agent_id, src_dir).await
    }
}
