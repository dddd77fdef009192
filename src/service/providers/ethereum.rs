//! Ethereum 系 Provider
//!
//! Legacy EIP-155 交易：RLP 编码，k256 ECDSA 对 keccak256 预哈希签名，
//! `v = chain_id * 2 + 35 + recovery_id`。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use k256::ecdsa::SigningKey;
use rlp::RlpStream;
use serde_json::{json, Value};

use super::{ChainProvider, ConnectionState, ProviderCore, Signer};
use crate::{
    config::EthereumNetworkConfig,
    domain::{
        chain_config::ChainFamily,
        derivation::{address_from_private_key, keccak256},
        transaction::{
            Balance, SignedTransaction, Transaction, TransactionRequest, TransactionStatus,
        },
        wallet_record::now_millis,
    },
    error::{Result, WalletError},
    infrastructure::rpc::RpcTransport,
    utils::{
        address_validator::AddressValidator,
        hex_utils::{
            decode_prefixed, parse_quantity, parse_quantity_u64, to_quantity, trim_leading_zeros,
        },
        units::{format_units, parse_units},
    },
};

const ETH_DECIMALS: u32 = 18;
/// 每个非零 calldata 字节的 gas
const CALLDATA_GAS_PER_BYTE: u64 = 16;

/// RLP 整数：大端去前导 0
fn rlp_uint(value: u128) -> Vec<u8> {
    trim_leading_zeros(&value.to_be_bytes()).to_vec()
}

/// 交易参数（签名前已全部确定）
#[derive(Debug, Clone)]
pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub to: [u8; 20],
    pub value: u128,
    pub data: Vec<u8>,
    pub chain_id: u64,
}

impl LegacyTransaction {
    fn append_body(&self, stream: &mut RlpStream) {
        stream.append(&rlp_uint(u128::from(self.nonce)));
        stream.append(&rlp_uint(self.gas_price));
        stream.append(&rlp_uint(u128::from(self.gas_limit)));
        stream.append(&self.to.to_vec());
        stream.append(&rlp_uint(self.value));
        stream.append(&self.data);
    }

    /// EIP-155 签名原文：[nonce, gasPrice, gasLimit, to, value, data, chainId, 0, 0]
    pub fn signing_hash(&self) -> [u8; 32] {
        let mut stream = RlpStream::new();
        stream.begin_list(9);
        self.append_body(&mut stream);
        stream.append(&rlp_uint(u128::from(self.chain_id)));
        stream.append(&Vec::<u8>::new());
        stream.append(&Vec::<u8>::new());
        keccak256(&stream.out())
    }

    /// 签名并返回 (raw_tx, tx_hash, 65 字节 r‖s‖v 签名)
    pub fn sign(&self, private_key: &[u8]) -> Result<(Vec<u8>, [u8; 32], Vec<u8>)> {
        let signing_key = SigningKey::from_slice(private_key)
            .map_err(|e| WalletError::InvalidPrivateKey(format!("secp256k1: {e}")))?;

        let hash = self.signing_hash();
        let (signature, recovery_id) = signing_key
            .sign_prehash_recoverable(&hash)
            .map_err(|e| WalletError::Signing(e.to_string()))?;

        let sig_bytes = signature.to_bytes();
        let (r, s) = sig_bytes.split_at(32);
        let v = u128::from(self.chain_id) * 2 + 35 + u128::from(recovery_id.to_byte());

        let mut stream = RlpStream::new();
        stream.begin_list(9);
        self.append_body(&mut stream);
        stream.append(&rlp_uint(v));
        stream.append(&trim_leading_zeros(r).to_vec());
        stream.append(&trim_leading_zeros(s).to_vec());
        let raw = stream.out().to_vec();

        let mut signature_out = sig_bytes.to_vec();
        signature_out.push(recovery_id.to_byte());

        Ok((raw.clone(), keccak256(&raw), signature_out))
    }
}

fn parse_address(address: &str) -> Result<[u8; 20]> {
    if !AddressValidator::validate_for(ChainFamily::Ethereum, address) {
        return Err(WalletError::AddressValidation(format!(
            "invalid ethereum address: {address}"
        )));
    }
    let bytes = hex::decode(&address[2..])
        .map_err(|e| WalletError::AddressValidation(format!("{address}: {e}")))?;
    bytes
        .try_into()
        .map_err(|_| WalletError::AddressValidation(address.to_string()))
}

/// Ethereum 系 Provider
pub struct EthereumProvider {
    config: EthereumNetworkConfig,
    core: ProviderCore,
}

impl EthereumProvider {
    pub fn new(config: EthereumNetworkConfig, transport: Arc<dyn RpcTransport>) -> Self {
        Self {
            config,
            core: ProviderCore::new(ChainFamily::Ethereum, transport),
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.config.chain_id
    }

    async fn fetch_block_number(&self) -> Result<u64> {
        let result = self.core.rpc().request("eth_blockNumber", json!([])).await?;
        parse_quantity_u64(&result)
    }

    async fn check_chain(&self) -> Result<u64> {
        let chain_id = parse_quantity_u64(&self.core.rpc().request("eth_chainId", json!([])).await?)?;
        if chain_id != self.config.chain_id {
            return Err(WalletError::network(format!(
                "endpoint reports chain id {chain_id}, expected {}",
                self.config.chain_id
            )));
        }
        self.fetch_block_number().await
    }

    async fn gas_price(&self, request: &TransactionRequest) -> Result<u128> {
        if let Some(price) = request.gas_price.as_deref() {
            return price
                .trim()
                .parse::<u128>()
                .map_err(|e| WalletError::tx_build(format!("invalid gas price '{price}': {e}")));
        }
        parse_quantity(&self.core.rpc().request("eth_gasPrice", json!([])).await?)
    }

    fn default_gas_limit(&self, data: &[u8]) -> u64 {
        self.config.default_gas_limit + CALLDATA_GAS_PER_BYTE * data.len() as u64
    }

    /// 构建待签名交易（查询 nonce / gas price）
    async fn build_transaction(
        &self,
        from_address: &str,
        request: &TransactionRequest,
    ) -> Result<LegacyTransaction> {
        let to = parse_address(&request.to)?;
        let value = parse_units(&request.amount, ETH_DECIMALS)?;
        let data = request
            .memo
            .as_deref()
            .map(|m| m.as_bytes().to_vec())
            .unwrap_or_default();

        let nonce = parse_quantity_u64(
            &self
                .core
                .rpc()
                .request("eth_getTransactionCount", json!([from_address, "pending"]))
                .await?,
        )?;
        let gas_price = self.gas_price(request).await?;
        let gas_limit = request
            .gas_limit
            .unwrap_or_else(|| self.default_gas_limit(&data));

        Ok(LegacyTransaction {
            nonce,
            gas_price,
            gas_limit,
            to,
            value,
            data,
            chain_id: self.config.chain_id,
        })
    }

    async fn block_timestamp(&self, block_number: &Value) -> Result<Option<i64>> {
        let block = self
            .core
            .rpc()
            .request("eth_getBlockByNumber", json!([block_number, false]))
            .await?;
        if block.is_null() {
            return Ok(None);
        }
        Ok(Some(parse_quantity_u64(&block["timestamp"])? as i64))
    }

    /// 交易对象 + 回执 -> Transaction
    async fn to_transaction(&self, tx: &Value, timestamp_secs: Option<i64>) -> Result<Transaction> {
        let hash = tx["hash"].as_str().unwrap_or_default().to_string();
        let receipt = self
            .core
            .rpc()
            .request("eth_getTransactionReceipt", json!([hash]))
            .await?;

        let (status, fee) = if receipt.is_null() {
            (TransactionStatus::Pending, None)
        } else {
            let status = match receipt["status"].as_str() {
                Some("0x1") => TransactionStatus::Confirmed,
                Some(_) => TransactionStatus::Failed,
                None => TransactionStatus::Confirmed,
            };
            let gas_used = parse_quantity(&receipt["gasUsed"]).unwrap_or(0);
            let price = parse_quantity(&receipt["effectiveGasPrice"])
                .or_else(|_| parse_quantity(&tx["gasPrice"]))
                .unwrap_or(0);
            // 回执数值溢出时手续费未知
            let fee = gas_used
                .checked_mul(price)
                .map(|wei| format_units(wei, ETH_DECIMALS));
            (status, fee)
        };

        let value = parse_quantity(&tx["value"]).unwrap_or(0);
        let input = tx["input"].as_str().filter(|s| *s != "0x").map(str::to_string);
        let timestamp = timestamp_secs
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or_else(now_millis);

        Ok(Transaction {
            hash,
            from: tx["from"].as_str().unwrap_or_default().to_string(),
            to: tx["to"].as_str().unwrap_or_default().to_string(),
            amount: format_units(value, ETH_DECIMALS),
            chain: ChainFamily::Ethereum,
            timestamp,
            status,
            fee,
            data: input,
        })
    }
}

#[async_trait]
impl ChainProvider for EthereumProvider {
    fn family(&self) -> ChainFamily {
        ChainFamily::Ethereum
    }

    fn endpoint(&self) -> &str {
        self.core.endpoint()
    }

    async fn state(&self) -> ConnectionState {
        self.core.state().await
    }

    async fn connect(&self) -> Result<()> {
        if !self.core.begin_connect().await {
            return Ok(());
        }
        let head = self.check_chain().await;
        self.core.finish_connect(&head).await;
        head.map(|_| ())
    }

    async fn disconnect(&self) -> Result<()> {
        self.core.disconnect().await;
        Ok(())
    }

    async fn attach_signer(&self, signer: Signer) -> Result<()> {
        self.core.attach_signer(signer).await
    }

    async fn get_balance(&self, address: &str) -> Result<Balance> {
        self.core.ensure_connected().await?;
        parse_address(address)?;

        let wei = parse_quantity(
            &self
                .core
                .rpc()
                .request("eth_getBalance", json!([address, "latest"]))
                .await?,
        )?;
        let block_number = self.fetch_block_number().await?;

        Ok(Balance {
            amount: format_units(wei, ETH_DECIMALS),
            denomination: ChainFamily::Ethereum.spec().denomination,
            chain: ChainFamily::Ethereum,
            address: address.to_string(),
            block_number,
        })
    }

    async fn send_transaction(
        &self,
        from_address: &str,
        request: &TransactionRequest,
    ) -> Result<Transaction> {
        self.core.ensure_connected().await?;
        let key = self.core.signing_key_for(from_address).await?;

        let signed = self.sign_transaction(request, &key).await?;
        let result = self
            .core
            .rpc()
            .request("eth_sendRawTransaction", json!([signed.signed_payload]))
            .await?;
        let hash = result
            .as_str()
            .map(str::to_string)
            .unwrap_or(signed.tx_hash);

        tracing::info!(
            chain = "ethereum",
            from = %from_address,
            to = %request.to,
            amount = %request.amount,
            tx_hash = %hash,
            "transaction broadcast"
        );

        Ok(Transaction {
            hash,
            from: from_address.to_string(),
            to: request.to.clone(),
            amount: request.amount.clone(),
            chain: ChainFamily::Ethereum,
            timestamp: now_millis(),
            status: TransactionStatus::Pending,
            fee: None,
            data: request.memo.clone(),
        })
    }

    async fn sign_transaction(
        &self,
        request: &TransactionRequest,
        private_key: &[u8],
    ) -> Result<SignedTransaction> {
        self.core.ensure_connected().await?;
        let from = address_from_private_key(ChainFamily::Ethereum, private_key)?;

        let tx = self.build_transaction(&from, request).await?;
        let (raw, hash, signature) = tx.sign(private_key)?;

        Ok(SignedTransaction {
            tx_hash: format!("0x{}", hex::encode(hash)),
            signed_payload: format!("0x{}", hex::encode(raw)),
            signature: Some(format!("0x{}", hex::encode(signature))),
            request: request.clone(),
        })
    }

    async fn get_transaction_history(&self, address: &str) -> Result<Vec<Transaction>> {
        self.core.ensure_connected().await?;
        parse_address(address)?;

        let latest = self.fetch_block_number().await?;
        let oldest = latest.saturating_sub(self.config.history_block_window.saturating_sub(1));
        let mut history = Vec::new();

        // 从最新区块向前扫描，达到页大小即停止
        'blocks: for number in (oldest..=latest).rev() {
            let block = self
                .core
                .rpc()
                .request("eth_getBlockByNumber", json!([to_quantity(u128::from(number)), true]))
                .await?;
            if block.is_null() {
                continue;
            }
            let timestamp = parse_quantity_u64(&block["timestamp"]).ok().map(|t| t as i64);

            let Some(txs) = block["transactions"].as_array() else {
                continue;
            };
            for tx in txs.iter().rev() {
                let matches = |field: &str| {
                    tx[field]
                        .as_str()
                        .map(|a| a.eq_ignore_ascii_case(address))
                        .unwrap_or(false)
                };
                if matches("from") || matches("to") {
                    history.push(self.to_transaction(tx, timestamp).await?);
                    if history.len() >= self.config.history_page_size {
                        break 'blocks;
                    }
                }
            }
        }

        Ok(history)
    }

    fn validate_address(&self, address: &str) -> bool {
        AddressValidator::validate_for(ChainFamily::Ethereum, address)
    }

    async fn estimate_fee(&self, request: &TransactionRequest) -> Result<String> {
        self.core.ensure_connected().await?;
        let to = parse_address(&request.to)?;
        let value = parse_units(&request.amount, ETH_DECIMALS)?;

        let estimate = async {
            let gas_price = self.gas_price(request).await?;
            let gas_limit = match request.gas_limit {
                Some(limit) => limit,
                None => {
                    let mut call = json!({
                        "to": format!("0x{}", hex::encode(to)),
                        "value": to_quantity(value),
                    });
                    if let Some(from) = self.core.signer_address().await {
                        call["from"] = json!(from);
                    }
                    if let Some(memo) = request.memo.as_deref() {
                        call["data"] = json!(format!("0x{}", hex::encode(memo.as_bytes())));
                    }
                    parse_quantity_u64(
                        &self.core.rpc().request("eth_estimateGas", json!([call])).await?,
                    )?
                }
            };
            Ok::<_, WalletError>(format_units(
                gas_price.saturating_mul(u128::from(gas_limit)),
                ETH_DECIMALS,
            ))
        };

        match estimate.await {
            Ok(fee) => Ok(fee),
            Err(e) if e.is_network() => {
                let fallback = ChainFamily::Ethereum.spec().fallback_fee;
                tracing::warn!(error = %e, fallback = %fallback, "ethereum fee estimate fell back");
                Ok(fallback)
            }
            Err(e) => Err(e),
        }
    }

    async fn get_block_number(&self) -> Result<u64> {
        self.core.ensure_connected().await?;
        self.fetch_block_number().await
    }

    async fn get_transaction(&self, hash: &str) -> Result<Option<Transaction>> {
        self.core.ensure_connected().await?;
        if decode_prefixed(hash).map(|b| b.len()).unwrap_or(0) != 32 {
            return Err(WalletError::tx_build(format!("invalid transaction hash: {hash}")));
        }

        let tx = self
            .core
            .rpc()
            .request("eth_getTransactionByHash", json!([hash]))
            .await?;
        if tx.is_null() {
            return Ok(None);
        }

        let timestamp = match tx.get("blockNumber").filter(|b| !b.is_null()) {
            Some(number) => self.block_timestamp(number).await?,
            None => None,
        };
        Ok(Some(self.to_transaction(&tx, timestamp).await?))
    }
}
