//! 交易领域模型
//!
//! 金额字段一律为人类可读的十进制字符串（ETH / DOT / SOL），
//! 与链上基础单位的换算见 `utils::units`。

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::chain_config::ChainFamily;

/// 交易状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// 已广播，等待上链
    Pending,
    /// 已上链且执行成功
    Confirmed,
    /// 链上执行失败
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        }
    }

    /// 是否为最终状态
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }

    /// 状态转换是否合法（只允许 pending -> 最终状态）
    pub fn can_transition_to(&self, target: TransactionStatus) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::Confirmed) | (Self::Pending, Self::Failed)
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 余额快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub amount: String,
    pub denomination: String,
    pub chain: ChainFamily,
    pub address: String,
    /// 查询时的区块高度（Solana 为 slot）
    pub block_number: u64,
}

/// 转账请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub to: String,
    pub amount: String,
    pub chain: ChainFamily,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    /// Gas 价格（wei，十进制字符串），仅 Ethereum 系使用
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<u64>,
}

impl TransactionRequest {
    pub fn new(chain: ChainFamily, to: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            amount: amount.into(),
            chain,
            memo: None,
            gas_price: None,
            gas_limit: None,
        }
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    pub fn with_gas(mut self, gas_price: Option<String>, gas_limit: Option<u64>) -> Self {
        self.gas_price = gas_price;
        self.gas_limit = gas_limit;
        self
    }
}

/// 链上交易
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub hash: String,
    pub from: String,
    pub to: String,
    pub amount: String,
    pub chain: ChainFamily,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub status: TransactionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// 已签名但未广播的交易
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedTransaction {
    pub tx_hash: String,
    /// 可直接广播的载荷（Ethereum/Substrate 为 0x hex，Solana 为 base64）
    pub signed_payload: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    pub request: TransactionRequest,
}
