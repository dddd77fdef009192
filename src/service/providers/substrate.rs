//! Substrate 系 Provider
//!
//! 直接读 `System.Account` 存储，手工拼装 v4 签名 extrinsic
//! （`Balances` 转账 + Ed25519 `MultiSignature`）。

use std::sync::Arc;

use async_trait::async_trait;
use blake2::{digest::consts::U16, Blake2b, Digest};
use chrono::{TimeZone, Utc};
use ed25519_dalek::{Signer as _, SigningKey};
use serde_json::{json, Value};

use super::{
    scale::{compact, encode_compact, read_u128_le, read_u32_le, read_u64_le, ScaleReader},
    ChainProvider, ConnectionState, ProviderCore, Signer,
};
use crate::{
    config::SubstrateNetworkConfig,
    domain::{
        chain_config::ChainFamily,
        derivation::blake2b_256,
        transaction::{
            Balance, SignedTransaction, Transaction, TransactionRequest, TransactionStatus,
        },
        wallet_record::now_millis,
    },
    error::{Result, WalletError},
    infrastructure::rpc::RpcTransport,
    utils::{
        address_validator::AddressValidator,
        hex_utils::{decode_prefixed, parse_quantity_u64},
        units::{format_units, parse_units},
    },
};

const SUBSTRATE_DECIMALS: u32 = 10;
/// twox128("System") ‖ twox128("Account")
const SYSTEM_ACCOUNT_PREFIX: &str =
    "26aa394eea5630e07c48ae0c9558cef7b99d880ec681799c0cf30e8886371da9";
/// twox128("Timestamp") ‖ twox128("Now")
const TIMESTAMP_NOW_KEY: &str =
    "0xf0c365c3cf59d671eb72da0e7a4113c49f1f0515f462cdcf84e0f1d6045dfcbb";
/// 签名 extrinsic v4
const EXTRINSIC_V4_SIGNED: u8 = 0x84;
const MULTI_ADDRESS_ID: u8 = 0x00;
const MULTI_SIGNATURE_ED25519: u8 = 0x00;
const IMMORTAL_ERA: u8 = 0x00;
/// 超过该长度的签名原文先做 blake2-256
const MAX_RAW_PAYLOAD: usize = 256;

fn blake2_128(data: &[u8]) -> [u8; 16] {
    Blake2b::<U16>::digest(data).into()
}

/// `System.Account` 存储键（Blake2_128Concat）
pub fn account_storage_key(account: &[u8; 32]) -> String {
    format!(
        "0x{}{}{}",
        SYSTEM_ACCOUNT_PREFIX,
        hex::encode(blake2_128(account)),
        hex::encode(account)
    )
}

fn account_id(address: &str) -> Result<[u8; 32]> {
    AddressValidator::substrate_account_id(address).ok_or_else(|| {
        WalletError::AddressValidation(format!("invalid substrate address: {address}"))
    })
}

fn display_account(account: &[u8; 32]) -> String {
    bs58::encode(account).into_string()
}

/// `AccountInfo` 中的 (nonce, free)
fn decode_account_info(storage: &Value) -> Result<(u32, u128)> {
    let Some(hex_data) = storage.as_str() else {
        // 账户不存在
        return Ok((0, 0));
    };
    let bytes = decode_prefixed(hex_data)?;
    Ok((read_u32_le(&bytes, 0)?, read_u128_le(&bytes, 16)?))
}

/// 运行时签名参数
#[derive(Debug, Clone)]
pub struct SigningContext {
    pub spec_version: u32,
    pub transaction_version: u32,
    pub genesis_hash: [u8; 32],
    pub nonce: u32,
}

/// 待签名转账
pub struct TransferExtrinsic {
    call: Vec<u8>,
    extra: Vec<u8>,
}

impl TransferExtrinsic {
    pub fn new(
        pallet_index: u8,
        call_index: u8,
        dest: &[u8; 32],
        amount: u128,
        nonce: u32,
    ) -> Self {
        let mut call = vec![pallet_index, call_index, MULTI_ADDRESS_ID];
        call.extend_from_slice(dest);
        encode_compact(amount, &mut call);

        let mut extra = vec![IMMORTAL_ERA];
        encode_compact(u128::from(nonce), &mut extra);
        encode_compact(0, &mut extra); // tip

        Self { call, extra }
    }

    /// call ‖ extra ‖ spec_version ‖ tx_version ‖ genesis ‖ block_hash（不朽交易为 genesis）
    pub fn signing_payload(&self, ctx: &SigningContext) -> Vec<u8> {
        let mut payload = Vec::with_capacity(self.call.len() + self.extra.len() + 72);
        payload.extend_from_slice(&self.call);
        payload.extend_from_slice(&self.extra);
        payload.extend_from_slice(&ctx.spec_version.to_le_bytes());
        payload.extend_from_slice(&ctx.transaction_version.to_le_bytes());
        payload.extend_from_slice(&ctx.genesis_hash);
        payload.extend_from_slice(&ctx.genesis_hash);

        if payload.len() > MAX_RAW_PAYLOAD {
            blake2b_256(&payload).to_vec()
        } else {
            payload
        }
    }

    /// compact(len) ‖ 0x84 ‖ signer ‖ signature ‖ extra ‖ call
    pub fn encode_signed(&self, signer: &[u8; 32], signature: &[u8; 64]) -> Vec<u8> {
        let mut body = Vec::with_capacity(1 + 33 + 65 + self.extra.len() + self.call.len());
        body.push(EXTRINSIC_V4_SIGNED);
        body.push(MULTI_ADDRESS_ID);
        body.extend_from_slice(signer);
        body.push(MULTI_SIGNATURE_ED25519);
        body.extend_from_slice(signature);
        body.extend_from_slice(&self.extra);
        body.extend_from_slice(&self.call);

        let mut out = compact(body.len() as u128);
        out.extend_from_slice(&body);
        out
    }
}

/// 从区块中解出的签名转账
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedTransfer {
    pub hash: [u8; 32],
    pub from: [u8; 32],
    pub to: [u8; 32],
    pub amount: u128,
}

/// 解码签名的 `Balances` 转账 extrinsic；其它类型返回 `None`
pub fn decode_transfer(extrinsic: &[u8], pallet_index: u8) -> Result<Option<DecodedTransfer>> {
    let mut reader = ScaleReader::new(extrinsic);
    reader.read_compact()?;
    if reader.read_u8()? != EXTRINSIC_V4_SIGNED {
        return Ok(None);
    }
    if reader.read_u8()? != MULTI_ADDRESS_ID {
        return Ok(None);
    }
    let from = reader.read_array32()?;

    let sig_len = match reader.read_u8()? {
        0x00 | 0x01 => 64,
        0x02 => 65,
        _ => return Ok(None),
    };
    reader.read_bytes(sig_len)?;

    // mortal era 占两个字节
    if reader.read_u8()? != IMMORTAL_ERA {
        reader.read_u8()?;
    }
    reader.read_compact()?; // nonce
    reader.read_compact()?; // tip

    if reader.read_u8()? != pallet_index {
        return Ok(None);
    }
    // transfer_allow_death / transfer / transfer_keep_alive
    if !matches!(reader.read_u8()?, 0 | 3 | 7) {
        return Ok(None);
    }
    if reader.read_u8()? != MULTI_ADDRESS_ID {
        return Ok(None);
    }
    let to = reader.read_array32()?;
    let amount = reader.read_compact()?;

    Ok(Some(DecodedTransfer {
        hash: blake2b_256(extrinsic),
        from,
        to,
        amount,
    }))
}

/// Substrate 系 Provider
pub struct SubstrateProvider {
    config: SubstrateNetworkConfig,
    core: ProviderCore,
}

impl SubstrateProvider {
    pub fn new(config: SubstrateNetworkConfig, transport: Arc<dyn RpcTransport>) -> Self {
        Self {
            config,
            core: ProviderCore::new(ChainFamily::Substrate, transport),
        }
    }

    async fn fetch_block_number(&self) -> Result<u64> {
        let header = self.core.rpc().request("chain_getHeader", json!([])).await?;
        parse_quantity_u64(&header["number"])
    }

    async fn account_info(&self, account: &[u8; 32]) -> Result<(u32, u128)> {
        let storage = self
            .core
            .rpc()
            .request("state_getStorage", json!([account_storage_key(account)]))
            .await?;
        decode_account_info(&storage)
    }

    async fn signing_context(&self, account: &[u8; 32]) -> Result<SigningContext> {
        let runtime = self
            .core
            .rpc()
            .request("state_getRuntimeVersion", json!([]))
            .await?;
        let version = |field: &str| -> Result<u32> {
            runtime[field]
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| WalletError::network(format!("runtime version missing {field}")))
        };
        let spec_version = version("specVersion")?;
        let transaction_version = version("transactionVersion")?;

        let genesis = self
            .core
            .rpc()
            .request("chain_getBlockHash", json!([0]))
            .await?;
        let genesis_hash: [u8; 32] = genesis
            .as_str()
            .map(decode_prefixed)
            .transpose()?
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| WalletError::network("invalid genesis hash"))?;

        let (nonce, _) = self.account_info(account).await?;

        Ok(SigningContext {
            spec_version,
            transaction_version,
            genesis_hash,
            nonce,
        })
    }

    fn build_transfer(&self, request: &TransactionRequest, nonce: u32) -> Result<TransferExtrinsic> {
        let dest = account_id(&request.to)?;
        let amount = parse_units(&request.amount, SUBSTRATE_DECIMALS)?;
        Ok(TransferExtrinsic::new(
            self.config.balances_pallet_index,
            self.config.transfer_call_index,
            &dest,
            amount,
            nonce,
        ))
    }

    fn signing_key(private_key: &[u8]) -> Result<SigningKey> {
        let bytes: [u8; 32] = private_key.try_into().map_err(|_| {
            WalletError::InvalidPrivateKey(format!(
                "expected 32 bytes, got {}",
                private_key.len()
            ))
        })?;
        Ok(SigningKey::from_bytes(&bytes))
    }

    async fn block_hash(&self, number: u64) -> Result<Option<String>> {
        let hash = self
            .core
            .rpc()
            .request("chain_getBlockHash", json!([number]))
            .await?;
        Ok(hash.as_str().map(str::to_string))
    }

    async fn block_timestamp(&self, block_hash: &str) -> Result<Option<i64>> {
        let value = self
            .core
            .rpc()
            .request("state_getStorage", json!([TIMESTAMP_NOW_KEY, block_hash]))
            .await?;
        match value.as_str() {
            Some(hex_data) => Ok(Some(read_u64_le(&decode_prefixed(hex_data)?, 0)? as i64)),
            None => Ok(None),
        }
    }

    /// 扫描最近区块中的转账；`filter` 返回 true 的条目被收集
    async fn scan_transfers<F>(&self, limit: usize, mut filter: F) -> Result<Vec<Transaction>>
    where
        F: FnMut(&DecodedTransfer) -> bool + Send,
    {
        let latest = self.fetch_block_number().await?;
        let oldest = latest.saturating_sub(self.config.history_block_window.saturating_sub(1));
        let mut found = Vec::new();

        for number in (oldest..=latest).rev() {
            let Some(hash) = self.block_hash(number).await? else {
                continue;
            };
            let block = self.core.rpc().request("chain_getBlock", json!([hash])).await?;
            let Some(extrinsics) = block["block"]["extrinsics"].as_array() else {
                continue;
            };

            let mut matched = Vec::new();
            for encoded in extrinsics.iter().filter_map(Value::as_str) {
                let Ok(bytes) = decode_prefixed(encoded) else {
                    continue;
                };
                // 无法解码的 extrinsic（其它签名扩展布局）直接跳过
                if let Ok(Some(transfer)) = decode_transfer(&bytes, self.config.balances_pallet_index)
                {
                    if filter(&transfer) {
                        matched.push(transfer);
                    }
                }
            }
            if matched.is_empty() {
                continue;
            }

            let timestamp = self
                .block_timestamp(&hash)
                .await?
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
                .unwrap_or_else(now_millis);

            for transfer in matched {
                found.push(Transaction {
                    hash: format!("0x{}", hex::encode(transfer.hash)),
                    from: display_account(&transfer.from),
                    to: display_account(&transfer.to),
                    amount: format_units(transfer.amount, SUBSTRATE_DECIMALS),
                    chain: ChainFamily::Substrate,
                    timestamp,
                    status: TransactionStatus::Confirmed,
                    fee: None,
                    data: None,
                });
                if found.len() >= limit {
                    return Ok(found);
                }
            }
        }

        Ok(found)
    }
}

#[async_trait]
impl ChainProvider for SubstrateProvider {
    fn family(&self) -> ChainFamily {
        ChainFamily::Substrate
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
        let head = self.fetch_block_number().await;
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
        let account = account_id(address)?;

        let (_, free) = self.account_info(&account).await?;
        let block_number = self.fetch_block_number().await?;

        Ok(Balance {
            amount: format_units(free, SUBSTRATE_DECIMALS),
            denomination: ChainFamily::Substrate.spec().denomination,
            chain: ChainFamily::Substrate,
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
            .request("author_submitExtrinsic", json!([signed.signed_payload]))
            .await?;
        let hash = result
            .as_str()
            .map(str::to_string)
            .unwrap_or(signed.tx_hash);

        tracing::info!(
            chain = "substrate",
            from = %from_address,
            to = %request.to,
            amount = %request.amount,
            tx_hash = %hash,
            "extrinsic submitted"
        );

        Ok(Transaction {
            hash,
            from: from_address.to_string(),
            to: request.to.clone(),
            amount: request.amount.clone(),
            chain: ChainFamily::Substrate,
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
        let signing_key = Self::signing_key(private_key)?;
        let signer_account = signing_key.verifying_key().to_bytes();

        // 先校验请求，避免无效请求触发 RPC
        self.build_transfer(request, 0)?;
        let ctx = self.signing_context(&signer_account).await?;
        let transfer = self.build_transfer(request, ctx.nonce)?;

        let signature = signing_key.sign(&transfer.signing_payload(&ctx)).to_bytes();
        let extrinsic = transfer.encode_signed(&signer_account, &signature);

        Ok(SignedTransaction {
            tx_hash: format!("0x{}", hex::encode(blake2b_256(&extrinsic))),
            signed_payload: format!("0x{}", hex::encode(&extrinsic)),
            signature: Some(format!("0x{}", hex::encode(signature))),
            request: request.clone(),
        })
    }

    async fn get_transaction_history(&self, address: &str) -> Result<Vec<Transaction>> {
        self.core.ensure_connected().await?;
        let account = account_id(address)?;

        self.scan_transfers(self.config.history_page_size, |t| {
            t.from == account || t.to == account
        })
        .await
    }

    fn validate_address(&self, address: &str) -> bool {
        AddressValidator::validate_for(ChainFamily::Substrate, address)
    }

    async fn estimate_fee(&self, request: &TransactionRequest) -> Result<String> {
        self.core.ensure_connected().await?;
        let transfer = self.build_transfer(request, 0)?;

        // 零签名 extrinsic 只用于 weight/长度计费
        let placeholder = transfer.encode_signed(&[0u8; 32], &[0u8; 64]);
        let info = self
            .core
            .rpc()
            .request(
                "payment_queryInfo",
                json!([format!("0x{}", hex::encode(&placeholder))]),
            )
            .await;

        let partial_fee = info.and_then(|info| {
            let fee = &info["partialFee"];
            fee.as_str()
                .and_then(|s| s.parse::<u128>().ok())
                .or_else(|| fee.as_u64().map(u128::from))
                .ok_or_else(|| WalletError::network(format!("unexpected partialFee: {fee}")))
        });

        match partial_fee {
            Ok(fee) => Ok(format_units(fee, SUBSTRATE_DECIMALS)),
            Err(e) if e.is_network() => {
                let fallback = ChainFamily::Substrate.spec().fallback_fee;
                tracing::warn!(error = %e, fallback = %fallback, "substrate fee estimate fell back");
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
        let target: [u8; 32] = decode_prefixed(hash)
            .ok()
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| WalletError::tx_build(format!("invalid extrinsic hash: {hash}")))?;

        let mut found = self.scan_transfers(1, |t| t.hash == target).await?;
        Ok(found.pop())
    }
}

#[cfg(test)]
mod tests {
    use ed25519_dalek::{Signature, Signer as _, Verifier};

    use super::*;

    const ALICE: &str = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";

    #[test]
    fn test_account_storage_key_layout() {
        let account = account_id(ALICE).unwrap();
        let key = account_storage_key(&account);
        assert!(key.starts_with("0x26aa394eea5630e07c48ae0c9558cef7b99d880ec681799c0cf30e8886371da9"));
        // 0x + 32 字节前缀 + 16 字节哈希 + 32 字节账户
        assert_eq!(key.len(), 2 + 2 * (32 + 16 + 32));
        assert!(key.ends_with("d43593c715fdd31c61141abd04a99fd6822c8558854ccde39a5684e7a56da27d"));
    }

    #[test]
    fn test_decode_account_info() {
        let mut info = vec![0u8; 80];
        info[0] = 4;
        info[16..32].copy_from_slice(&15_000_000_000u128.to_le_bytes());
        let value = json!(format!("0x{}", hex::encode(&info)));
        assert_eq!(decode_account_info(&value).unwrap(), (4, 15_000_000_000));
        assert_eq!(decode_account_info(&Value::Null).unwrap(), (0, 0));
    }

    #[test]
    fn test_signed_transfer_roundtrips_through_decoder() {
        let signing_key = SigningKey::from_bytes(&[7u8; 32]);
        let signer = signing_key.verifying_key().to_bytes();
        let dest = account_id(ALICE).unwrap();
        let ctx = SigningContext {
            spec_version: 1_000_000,
            transaction_version: 25,
            genesis_hash: [0x91; 32],
            nonce: 3,
        };

        let transfer = TransferExtrinsic::new(5, 3, &dest, 12_345_000_000, ctx.nonce);
        let payload = transfer.signing_payload(&ctx);
        let signature = signing_key.sign(&payload);
        let extrinsic = transfer.encode_signed(&signer, &signature.to_bytes());

        signing_key
            .verifying_key()
            .verify(&payload, &Signature::from_bytes(&signature.to_bytes()))
            .unwrap();

        let decoded = decode_transfer(&extrinsic, 5).unwrap().unwrap();
        assert_eq!(decoded.from, signer);
        assert_eq!(decoded.to, dest);
        assert_eq!(decoded.amount, 12_345_000_000);
        assert_eq!(decoded.hash, blake2b_256(&extrinsic));

        // 其它 pallet 不是转账
        assert!(decode_transfer(&extrinsic, 4).unwrap().is_none());
    }
}
