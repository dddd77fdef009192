//! 地址验证模块
//!
//! 三个链族统一的地址格式校验

use blake2::{Blake2b512, Digest as _};

use crate::{domain::chain_config::ChainFamily, error::Result};

/// SS58 校验和前缀
const SS58_PREFIX: &[u8] = b"SS58PRE";

/// 地址验证器
pub struct AddressValidator;

impl AddressValidator {
    /// 验证地址格式
    ///
    /// # 参数
    /// - `chain`: 链标识符（支持别名）
    /// - `address`: 待验证的地址
    ///
    /// # 返回
    /// - Ok(true): 地址有效
    /// - Ok(false): 地址无效
    /// - Err: 不支持的链
    pub fn validate(chain: &str, address: &str) -> Result<bool> {
        let family: ChainFamily = chain.parse()?;
        Ok(Self::validate_for(family, address))
    }

    pub fn validate_for(family: ChainFamily, address: &str) -> bool {
        match family {
            ChainFamily::Ethereum => Self::validate_evm_address(address),
            ChainFamily::Substrate => Self::validate_substrate_address(address),
            ChainFamily::Solana => Self::validate_solana_address(address),
        }
    }

    /// 验证EVM地址（支持EIP-55 Checksum）
    fn validate_evm_address(address: &str) -> bool {
        let Some(hex_part) = address.strip_prefix("0x") else {
            return false;
        };

        if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return false;
        }

        // 混合大小写时必须满足 EIP-55
        let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());
        let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
        if has_upper && has_lower {
            return Self::verify_eip55_checksum(hex_part);
        }

        true
    }

    /// 验证EIP-55 Checksum
    /// https://eips.ethereum.org/EIPS/eip-55
    fn verify_eip55_checksum(hex_part: &str) -> bool {
        use sha3::{Digest, Keccak256};

        let hash = Keccak256::digest(hex_part.to_lowercase().as_bytes());

        hex_part.chars().enumerate().all(|(i, ch)| {
            if !ch.is_ascii_alphabetic() {
                return true;
            }
            let nibble = if i % 2 == 0 {
                hash[i / 2] >> 4
            } else {
                hash[i / 2] & 0x0f
            };
            ch.is_ascii_uppercase() == (nibble >= 8)
        })
    }

    /// 验证Solana地址（Base58编码，32字节）
    fn validate_solana_address(address: &str) -> bool {
        if address.len() < 32 || address.len() > 44 {
            return false;
        }

        matches!(bs58::decode(address).into_vec(), Ok(decoded) if decoded.len() == 32)
    }

    /// 验证Substrate地址
    ///
    /// 接受两种形式：简化格式（base58 编码的 32 字节）和带校验和的 SS58。
    fn validate_substrate_address(address: &str) -> bool {
        let Ok(decoded) = bs58::decode(address).into_vec() else {
            return false;
        };

        match decoded.len() {
            32 => true,
            35 | 36 => Self::verify_ss58_checksum(&decoded),
            _ => false,
        }
    }

    /// SS58: prefix(1|2) ‖ account(32) ‖ blake2b-512("SS58PRE" ‖ prefix ‖ account)[..2]
    fn verify_ss58_checksum(decoded: &[u8]) -> bool {
        let prefix_len = if decoded[0] & 0b0100_0000 == 0 { 1 } else { 2 };
        if decoded.len() != prefix_len + 32 + 2 {
            return false;
        }

        let (body, checksum) = decoded.split_at(decoded.len() - 2);
        let mut hasher = Blake2b512::new();
        hasher.update(SS58_PREFIX);
        hasher.update(body);
        let hash = hasher.finalize();

        hash[..2] == *checksum
    }

    /// 提取 Substrate 地址中的 32 字节账户
    ///
    /// 简化格式直接解码；SS58 去掉前缀与校验和。
    pub fn substrate_account_id(address: &str) -> Option<[u8; 32]> {
        if !Self::validate_substrate_address(address) {
            return None;
        }
        let decoded = bs58::decode(address).into_vec().ok()?;
        let start = match decoded.len() {
            32 => 0,
            35 => 1,
            _ => 2,
        };
        decoded[start..start + 32].try_into().ok()
    }
}
