//! AES-256-GCM 加密/解密模块
//! 用于导出包的密码保护；密文与认证标签分开保存

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, WalletError};

pub const IV_LENGTH: usize = 12;
pub const TAG_LENGTH: usize = 16;
pub const KEY_LENGTH: usize = 32;

/// 加密结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedData {
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_LENGTH],
    pub iv: [u8; IV_LENGTH],
}

/// 加密密钥（使用Zeroize保护）
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    key: [u8; KEY_LENGTH],
}

impl EncryptionKey {
    pub fn new(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    pub fn from_slice(key: &[u8]) -> Result<Self> {
        let key: [u8; KEY_LENGTH] = key.try_into().map_err(|_| {
            WalletError::Encryption(format!("key must be {KEY_LENGTH} bytes for AES-256"))
        })?;
        Ok(Self { key })
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.key
    }

    fn cipher(&self) -> Result<Aes256Gcm> {
        Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| WalletError::Encryption(format!("invalid key: {e}")))
    }
}

/// 加密数据（随机 12 字节 IV）
pub fn seal(plaintext: &[u8], key: &EncryptionKey) -> Result<SealedData> {
    let cipher = key.cipher()?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let mut combined = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| WalletError::Encryption(e.to_string()))?;

    // aes-gcm 输出为 ciphertext ‖ tag
    let split = combined.len() - TAG_LENGTH;
    let mut tag = [0u8; TAG_LENGTH];
    tag.copy_from_slice(&combined[split..]);
    combined.truncate(split);

    let mut iv = [0u8; IV_LENGTH];
    iv.copy_from_slice(&nonce);

    Ok(SealedData {
        ciphertext: combined,
        tag,
        iv,
    })
}

/// 解密数据，先校验认证标签
pub fn open(sealed: &SealedData, key: &EncryptionKey) -> Result<Vec<u8>> {
    let cipher = key.cipher()?;

    let mut combined = Vec::with_capacity(sealed.ciphertext.len() + TAG_LENGTH);
    combined.extend_from_slice(&sealed.ciphertext);
    combined.extend_from_slice(&sealed.tag);

    cipher
        .decrypt(Nonce::from_slice(&sealed.iv), combined.as_slice())
        .map_err(|_| {
            WalletError::Decryption("authentication tag mismatch (wrong password?)".to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open() {
        let key = EncryptionKey::new(*b"01234567890123456789012345678901");
        let data = b"Hello, World!";

        let sealed = seal(data, &key).unwrap();
        assert_eq!(sealed.ciphertext.len(), data.len());
        assert_ne!(sealed.ciphertext, data);

        assert_eq!(open(&sealed, &key).unwrap(), data);
    }

    #[test]
    fn test_tampering_is_detected() {
        let key = EncryptionKey::new([7u8; 32]);
        let mut sealed = seal(b"payload", &key).unwrap();
        sealed.tag[0] ^= 0x01;
        assert!(matches!(open(&sealed, &key), Err(WalletError::Decryption(_))));

        let sealed = seal(b"payload", &key).unwrap();
        let other = EncryptionKey::new([8u8; 32]);
        assert!(open(&sealed, &other).is_err());

        assert!(EncryptionKey::from_slice(&[0u8; 16]).is_err());
    }
}
