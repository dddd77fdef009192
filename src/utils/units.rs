//! 金额单位换算
//!
//! 人类可读十进制字符串 <-> 链上基础单位（wei / planck / lamports）

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::error::{Result, WalletError};

/// 十进制字符串 -> 基础单位
///
/// 小数位超过 `decimals` 或为负数时报错，不做舍入。
pub fn parse_units(amount: &str, decimals: u32) -> Result<u128> {
    let value = Decimal::from_str_exact(amount.trim())
        .or_else(|_| Decimal::from_str(amount.trim()))
        .map_err(|e| WalletError::tx_build(format!("invalid amount '{amount}': {e}")))?
        .normalize();

    if value.is_sign_negative() && !value.is_zero() {
        return Err(WalletError::tx_build(format!(
            "amount must not be negative: {amount}"
        )));
    }
    if value.scale() > decimals {
        return Err(WalletError::tx_build(format!(
            "amount {amount} has more than {decimals} decimal places"
        )));
    }

    let mantissa = u128::try_from(value.mantissa())
        .map_err(|_| WalletError::tx_build(format!("invalid amount '{amount}'")))?;
    10u128
        .checked_pow(decimals - value.scale())
        .and_then(|factor| mantissa.checked_mul(factor))
        .ok_or_else(|| WalletError::tx_build(format!("amount {amount} overflows")))
}

/// 基础单位 -> 十进制字符串（去掉末尾多余的 0）
pub fn format_units(value: u128, decimals: u32) -> String {
    if let Ok(signed) = i128::try_from(value) {
        if let Ok(d) = Decimal::try_from_i128_with_scale(signed, decimals) {
            return d.normalize().to_string();
        }
    }

    // 超出 Decimal 96 位尾数范围时按字符串处理
    let digits = value.to_string();
    let decimals = decimals as usize;
    let (int_part, frac_part) = if digits.len() > decimals {
        let split = digits.len() - decimals;
        (digits[..split].to_string(), digits[split..].to_string())
    } else {
        ("0".to_string(), format!("{digits:0>decimals$}"))
    };

    let frac = frac_part.trim_end_matches('0');
    if frac.is_empty() {
        int_part
    } else {
        format!("{int_part}.{frac}")
    }
}
