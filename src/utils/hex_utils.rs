//! JSON-RPC 数值与 hex 辅助函数

use serde_json::Value;

use crate::error::{Result, WalletError};

/// 解析 `0x` 前缀的十六进制数量（Ethereum quantity）
pub fn parse_quantity(value: &Value) -> Result<u128> {
    let s = value
        .as_str()
        .ok_or_else(|| WalletError::network(format!("expected hex quantity, got {value}")))?;
    let digits = s.strip_prefix("0x").unwrap_or(s);
    if digits.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(digits, 16)
        .map_err(|e| WalletError::network(format!("invalid hex quantity '{s}': {e}")))
}

pub fn parse_quantity_u64(value: &Value) -> Result<u64> {
    let v = parse_quantity(value)?;
    u64::try_from(v).map_err(|_| WalletError::network(format!("quantity {v} exceeds u64")))
}

/// u128 -> `0x` 十六进制数量
pub fn to_quantity(value: u128) -> String {
    format!("0x{value:x}")
}

/// 解码 `0x` 前缀 hex 字节串
pub fn decode_prefixed(s: &str) -> Result<Vec<u8>> {
    hex::decode(s.strip_prefix("0x").unwrap_or(s))
        .map_err(|e| WalletError::network(format!("invalid hex data: {e}")))
}

/// 去掉大端字节串的前导 0（RLP 整数编码要求）
pub fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}
