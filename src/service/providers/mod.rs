//! 链 Provider 抽象
//!
//! 一个 trait 三个实现，按 `ChainFamily` 在构造时选择。
//! 状态机 `Disconnected → Connecting → Connected → Disconnected`，
//! 所有数据操作要求 `Connected`，不自动重连。

pub mod ethereum;
pub mod scale;
pub mod solana;
pub mod solana_message;
pub mod substrate;

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::sync::RwLock;
use zeroize::Zeroizing;

pub use ethereum::EthereumProvider;
pub use solana::SolanaProvider;
pub use substrate::SubstrateProvider;

use crate::{
    config::NetworksConfig,
    domain::{
        chain_config::ChainFamily,
        derivation::{self, decode_private_key, derive_wallet_key},
        transaction::{Balance, SignedTransaction, Transaction, TransactionRequest},
        wallet_record::{CreationMethod, WalletRecord},
    },
    error::{Result, WalletError},
    infrastructure::rpc::{HttpRpcTransport, RpcTransport},
};

/// 连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// 链 Provider
#[async_trait]
pub trait ChainProvider: Send + Sync {
    fn family(&self) -> ChainFamily;

    /// RPC 端点
    fn endpoint(&self) -> &str;

    async fn state(&self) -> ConnectionState;

    async fn is_connected(&self) -> bool {
        self.state().await == ConnectionState::Connected
    }

    /// 存活探测成功后才置为已连接；重复调用无副作用
    async fn connect(&self) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;

    /// 绑定签名密钥，`send_transaction` 使用
    async fn attach_signer(&self, signer: Signer) -> Result<()>;

    async fn get_balance(&self, address: &str) -> Result<Balance>;

    /// 签名并广播，返回 pending 状态的交易
    async fn send_transaction(
        &self,
        from_address: &str,
        request: &TransactionRequest,
    ) -> Result<Transaction>;

    /// 只签名不广播
    async fn sign_transaction(
        &self,
        request: &TransactionRequest,
        private_key: &[u8],
    ) -> Result<SignedTransaction>;

    /// 最近的交易（最新在前，数量受配置页大小限制）
    async fn get_transaction_history(&self, address: &str) -> Result<Vec<Transaction>>;

    fn validate_address(&self, address: &str) -> bool;

    /// 费用估算；网络失败时返回链族兜底常量
    async fn estimate_fee(&self, request: &TransactionRequest) -> Result<String>;

    async fn get_block_number(&self) -> Result<u64>;

    async fn get_transaction(&self, hash: &str) -> Result<Option<Transaction>>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 签名密钥
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// 签名密钥材料（drop 时清零）
pub struct Signer {
    family: ChainFamily,
    private_key: Zeroizing<Vec<u8>>,
    address: String,
}

impl Signer {
    pub fn new(family: ChainFamily, private_key: &[u8]) -> Result<Self> {
        let address = derivation::address_from_private_key(family, private_key)?;
        // Solana 64 字节 keypair 只保留种子部分
        let key = if family == ChainFamily::Solana {
            &private_key[..32]
        } else {
            private_key
        };

        Ok(Self {
            family,
            private_key: Zeroizing::new(key.to_vec()),
            address,
        })
    }

    /// 从钱包记录恢复签名密钥（助记词钱包重新派生）
    pub fn from_record(record: &WalletRecord) -> Result<Self> {
        if let Some(encoded) = record.private_key.as_deref() {
            let key = Zeroizing::new(decode_private_key(record.chain, encoded)?);
            return Self::new(record.chain, &key);
        }

        let derived = derive_wallet_key(
            CreationMethod::Mnemonic,
            record.mnemonic.as_deref(),
            None,
            Some(&record.seed_derivation_path),
            record.chain,
        )?;
        Self::new(record.chain, &derived.key_pair.private_key)
    }

    pub fn family(&self) -> ChainFamily {
        self.family
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn private_key(&self) -> &[u8] {
        &self.private_key
    }

    /// Ethereum 地址大小写不敏感
    pub fn matches(&self, address: &str) -> bool {
        match self.family {
            ChainFamily::Ethereum => self.address.eq_ignore_ascii_case(address),
            _ => self.address == address,
        }
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("family", &self.family)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 共享状态
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// 三个 Provider 共用的连接状态、传输与签名密钥
pub(crate) struct ProviderCore {
    family: ChainFamily,
    transport: Arc<dyn RpcTransport>,
    state: RwLock<ConnectionState>,
    signer: RwLock<Option<Signer>>,
}

impl ProviderCore {
    pub(crate) fn new(family: ChainFamily, transport: Arc<dyn RpcTransport>) -> Self {
        Self {
            family,
            transport,
            state: RwLock::new(ConnectionState::Disconnected),
            signer: RwLock::new(None),
        }
    }

    pub(crate) fn rpc(&self) -> &dyn RpcTransport {
        self.transport.as_ref()
    }

    pub(crate) fn endpoint(&self) -> &str {
        self.transport.endpoint()
    }

    pub(crate) async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// 返回 false 表示已连接，无需再次探测
    pub(crate) async fn begin_connect(&self) -> bool {
        let mut state = self.state.write().await;
        if *state == ConnectionState::Connected {
            return false;
        }
        *state = ConnectionState::Connecting;
        true
    }

    pub(crate) async fn finish_connect(&self, head: &Result<u64>) {
        let mut state = self.state.write().await;
        match head {
            Ok(height) => {
                *state = ConnectionState::Connected;
                tracing::info!(
                    chain = %self.family,
                    endpoint = %self.endpoint(),
                    height,
                    "provider connected"
                );
            }
            Err(e) => {
                *state = ConnectionState::Disconnected;
                tracing::warn!(
                    chain = %self.family,
                    endpoint = %self.endpoint(),
                    error = %e,
                    "provider connect failed"
                );
            }
        }
    }

    pub(crate) async fn disconnect(&self) {
        let mut state = self.state.write().await;
        if *state != ConnectionState::Disconnected {
            tracing::info!(chain = %self.family, endpoint = %self.endpoint(), "provider disconnected");
        }
        *state = ConnectionState::Disconnected;
    }

    pub(crate) async fn ensure_connected(&self) -> Result<()> {
        if *self.state.read().await == ConnectionState::Connected {
            Ok(())
        } else {
            Err(WalletError::NotConnected(self.family))
        }
    }

    pub(crate) async fn attach_signer(&self, signer: Signer) -> Result<()> {
        if signer.family() != self.family {
            return Err(WalletError::Signing(format!(
                "{} signer cannot be attached to {} provider",
                signer.family(),
                self.family
            )));
        }
        tracing::debug!(chain = %self.family, address = %signer.address(), "signer attached");
        *self.signer.write().await = Some(signer);
        Ok(())
    }

    /// 取出与 `from_address` 匹配的签名私钥副本
    pub(crate) async fn signing_key_for(&self, from_address: &str) -> Result<Zeroizing<Vec<u8>>> {
        let guard = self.signer.read().await;
        let signer = guard.as_ref().ok_or_else(|| {
            WalletError::Signing(format!("no signer attached to {} provider", self.family))
        })?;

        if !signer.matches(from_address) {
            return Err(WalletError::AddressValidation(format!(
                "from address {from_address} does not match attached signer {}",
                signer.address()
            )));
        }

        Ok(Zeroizing::new(signer.private_key().to_vec()))
    }

    pub(crate) async fn signer_address(&self) -> Option<String> {
        self.signer
            .read()
            .await
            .as_ref()
            .map(|s| s.address().to_string())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 工厂
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// 按链族创建传输层（测试中替换为脚本化实现）
pub trait TransportFactory: Send + Sync {
    fn create(&self, family: ChainFamily, networks: &NetworksConfig)
        -> Result<Arc<dyn RpcTransport>>;
}

/// 基于 reqwest 的 HTTP 传输工厂
pub struct HttpTransportFactory;

impl TransportFactory for HttpTransportFactory {
    fn create(
        &self,
        family: ChainFamily,
        networks: &NetworksConfig,
    ) -> Result<Arc<dyn RpcTransport>> {
        let transport = HttpRpcTransport::new(
            networks.rpc_url(family),
            Duration::from_secs(networks.request_timeout_secs(family)),
        )?;
        Ok(Arc::new(transport))
    }
}

/// 使用给定传输构建 Provider
pub fn create_provider_with_transport(
    family: ChainFamily,
    networks: &NetworksConfig,
    transport: Arc<dyn RpcTransport>,
) -> Arc<dyn ChainProvider> {
    match family {
        ChainFamily::Ethereum => Arc::new(EthereumProvider::new(
            networks.ethereum.clone(),
            transport,
        )),
        ChainFamily::Substrate => Arc::new(SubstrateProvider::new(
            networks.substrate.clone(),
            transport,
        )),
        ChainFamily::Solana => Arc::new(SolanaProvider::new(networks.solana.clone(), transport)),
    }
}

/// 按配置的 RPC 端点构建 Provider（未连接）
pub fn create_provider(
    family: ChainFamily,
    networks: &NetworksConfig,
) -> Result<Arc<dyn ChainProvider>> {
    let transport = HttpTransportFactory.create(family, networks)?;
    Ok(create_provider_with_transport(family, networks, transport))
}
