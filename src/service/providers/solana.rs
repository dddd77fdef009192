//! Solana 系 Provider

use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{TimeZone, Utc};
use ed25519_dalek::{Signer as _, SigningKey};
use futures::future::join_all;
use serde_json::{json, Value};

use super::{
    solana_message::{decode_pubkey, encode_transaction, TransferMessage},
    ChainProvider, ConnectionState, ProviderCore, Signer,
};
use crate::{
    config::SolanaNetworkConfig,
    domain::{
        chain_config::ChainFamily,
        derivation::solana_seed,
        transaction::{
            Balance, SignedTransaction, Transaction, TransactionRequest, TransactionStatus,
        },
        wallet_record::now_millis,
    },
    error::{Result, WalletError},
    infrastructure::rpc::RpcTransport,
    utils::{
        address_validator::AddressValidator,
        units::{format_units, parse_units},
    },
};

const LAMPORTS_DECIMALS: u32 = 9;

fn signing_key(private_key: &[u8]) -> Result<SigningKey> {
    Ok(SigningKey::from_bytes(&solana_seed(private_key)?))
}

fn lamports(amount: &str) -> Result<u64> {
    let value = parse_units(amount, LAMPORTS_DECIMALS)?;
    u64::try_from(value)
        .map_err(|_| WalletError::tx_build(format!("amount {amount} exceeds u64 lamports")))
}

/// 从 jsonParsed 交易中取出第一个系统转账 (source, destination, lamports)
fn parse_system_transfer(tx: &Value) -> Option<(String, String, u64)> {
    tx["transaction"]["message"]["instructions"]
        .as_array()?
        .iter()
        .filter(|ix| ix["program"].as_str() == Some("system"))
        .find_map(|ix| {
            let parsed = &ix["parsed"];
            if parsed["type"].as_str() != Some("transfer") {
                return None;
            }
            let info = &parsed["info"];
            Some((
                info["source"].as_str()?.to_string(),
                info["destination"].as_str()?.to_string(),
                info["lamports"].as_u64()?,
            ))
        })
}

/// 从 jsonParsed 交易中取出 memo
fn parse_memo(tx: &Value) -> Option<String> {
    tx["transaction"]["message"]["instructions"]
        .as_array()?
        .iter()
        .find(|ix| ix["program"].as_str() == Some("spl-memo"))
        .and_then(|ix| ix["parsed"].as_str())
        .map(str::to_string)
}

/// Solana 系 Provider
pub struct SolanaProvider {
    config: SolanaNetworkConfig,
    core: ProviderCore,
}

impl SolanaProvider {
    pub fn new(config: SolanaNetworkConfig, transport: Arc<dyn RpcTransport>) -> Self {
        Self {
            config,
            core: ProviderCore::new(ChainFamily::Solana, transport),
        }
    }

    fn commitment(&self) -> Value {
        json!({ "commitment": self.config.commitment })
    }

    async fn fetch_slot(&self) -> Result<u64> {
        let slot = self
            .core
            .rpc()
            .request("getSlot", json!([self.commitment()]))
            .await?;
        slot.as_u64()
            .ok_or_else(|| WalletError::network(format!("unexpected getSlot result: {slot}")))
    }

    async fn latest_blockhash(&self) -> Result<[u8; 32]> {
        let result = self
            .core
            .rpc()
            .request("getLatestBlockhash", json!([self.commitment()]))
            .await?;
        let blockhash = result["value"]["blockhash"]
            .as_str()
            .ok_or_else(|| WalletError::network("getLatestBlockhash: missing blockhash"))?;
        decode_pubkey(blockhash).map_err(|e| WalletError::network(e.to_string()))
    }

    fn check_address(address: &str) -> Result<()> {
        if AddressValidator::validate_for(ChainFamily::Solana, address) {
            Ok(())
        } else {
            Err(WalletError::AddressValidation(format!(
                "invalid solana address: {address}"
            )))
        }
    }

    fn build_message(
        &self,
        from: [u8; 32],
        request: &TransactionRequest,
        blockhash: [u8; 32],
    ) -> Result<Vec<u8>> {
        let to = decode_pubkey(&request.to)?;
        let message = TransferMessage::transfer(
            from,
            to,
            lamports(&request.amount)?,
            blockhash,
            request.memo.as_deref(),
        )?;
        Ok(message.serialize())
    }

    async fn fetch_transaction(&self, signature: &str) -> Result<Option<Transaction>> {
        let tx = self
            .core
            .rpc()
            .request(
                "getTransaction",
                json!([
                    signature,
                    {
                        "encoding": "jsonParsed",
                        "maxSupportedTransactionVersion": 0,
                        "commitment": self.config.commitment,
                    }
                ]),
            )
            .await?;
        if tx.is_null() {
            return Ok(None);
        }

        let (from, to, amount) = parse_system_transfer(&tx).unwrap_or_default();
        let meta = &tx["meta"];
        let status = if meta["err"].is_null() {
            TransactionStatus::Confirmed
        } else {
            TransactionStatus::Failed
        };
        let fee = meta["fee"]
            .as_u64()
            .map(|f| format_units(u128::from(f), LAMPORTS_DECIMALS));
        let timestamp = tx["blockTime"]
            .as_i64()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or_else(now_millis);

        Ok(Some(Transaction {
            hash: signature.to_string(),
            from,
            to,
            amount: format_units(u128::from(amount), LAMPORTS_DECIMALS),
            chain: ChainFamily::Solana,
            timestamp,
            status,
            fee,
            data: parse_memo(&tx),
        }))
    }
}

#[async_trait]
impl ChainProvider for SolanaProvider {
    fn family(&self) -> ChainFamily {
        ChainFamily::Solana
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
        let head = self.fetch_slot().await;
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
        Self::check_address(address)?;

        let result = self
            .core
            .rpc()
            .request("getBalance", json!([address, self.commitment()]))
            .await?;
        let lamports = result["value"]
            .as_u64()
            .ok_or_else(|| WalletError::network(format!("unexpected getBalance result: {result}")))?;
        let slot = result["context"]["slot"].as_u64().unwrap_or_default();

        Ok(Balance {
            amount: format_units(u128::from(lamports), LAMPORTS_DECIMALS),
            denomination: ChainFamily::Solana.spec().denomination,
            chain: ChainFamily::Solana,
            address: address.to_string(),
            block_number: slot,
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
            .request(
                "sendTransaction",
                json!([
                    signed.signed_payload,
                    {
                        "encoding": "base64",
                        "preflightCommitment": self.config.commitment,
                    }
                ]),
            )
            .await?;
        let hash = result
            .as_str()
            .map(str::to_string)
            .unwrap_or(signed.tx_hash);

        tracing::info!(
            chain = "solana",
            from = %from_address,
            to = %request.to,
            amount = %request.amount,
            signature = %hash,
            "transaction sent"
        );

        Ok(Transaction {
            hash,
            from: from_address.to_string(),
            to: request.to.clone(),
            amount: request.amount.clone(),
            chain: ChainFamily::Solana,
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
        let key = signing_key(private_key)?;
        let from = key.verifying_key().to_bytes();

        Self::check_address(&request.to)?;
        lamports(&request.amount)?;

        let blockhash = self.latest_blockhash().await?;
        let message = self.build_message(from, request, blockhash)?;
        let signature = key.sign(&message).to_bytes();
        let wire = encode_transaction(&signature, &message);

        Ok(SignedTransaction {
            tx_hash: bs58::encode(signature).into_string(),
            signed_payload: BASE64.encode(wire),
            signature: Some(bs58::encode(signature).into_string()),
            request: request.clone(),
        })
    }

    async fn get_transaction_history(&self, address: &str) -> Result<Vec<Transaction>> {
        self.core.ensure_connected().await?;
        Self::check_address(address)?;

        let signatures = self
            .core
            .rpc()
            .request(
                "getSignaturesForAddress",
                json!([address, { "limit": self.config.history_page_size }]),
            )
            .await?;
        let signatures: Vec<String> = signatures
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|e| e["signature"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        let fetched = join_all(signatures.iter().map(|sig| self.fetch_transaction(sig))).await;

        let mut history = Vec::with_capacity(fetched.len());
        for result in fetched {
            if let Some(tx) = result? {
                history.push(tx);
            }
        }
        Ok(history)
    }

    fn validate_address(&self, address: &str) -> bool {
        AddressValidator::validate_for(ChainFamily::Solana, address)
    }

    async fn estimate_fee(&self, request: &TransactionRequest) -> Result<String> {
        self.core.ensure_connected().await?;
        let to = decode_pubkey(&request.to)?;
        lamports(&request.amount)?;

        // 无签名者时用收款方作为付款方占位
        let payer = match self.core.signer_address().await {
            Some(address) => decode_pubkey(&address)?,
            None => to,
        };

        let estimate = async {
            let blockhash = self.latest_blockhash().await?;
            let message = self.build_message(payer, request, blockhash)?;
            let result = self
                .core
                .rpc()
                .request(
                    "getFeeForMessage",
                    json!([BASE64.encode(message), self.commitment()]),
                )
                .await?;
            result["value"]
                .as_u64()
                .map(|fee| format_units(u128::from(fee), LAMPORTS_DECIMALS))
                .ok_or_else(|| WalletError::network("getFeeForMessage returned no fee"))
        };

        match estimate.await {
            Ok(fee) => Ok(fee),
            Err(e) if e.is_network() => {
                let fallback = ChainFamily::Solana.spec().fallback_fee;
                tracing::warn!(error = %e, fallback = %fallback, "solana fee estimate fell back");
                Ok(fallback)
            }
            Err(e) => Err(e),
        }
    }

    async fn get_block_number(&self) -> Result<u64> {
        self.core.ensure_connected().await?;
        self.fetch_slot().await
    }

    async fn get_transaction(&self, hash: &str) -> Result<Option<Transaction>> {
        self.core.ensure_connected().await?;
        let valid = bs58::decode(hash)
            .into_vec()
            .map(|b| b.len() == 64)
            .unwrap_or(false);
        if !valid {
            return Err(WalletError::tx_build(format!("invalid signature: {hash}")));
        }
        self.fetch_transaction(hash).await
    }
}
