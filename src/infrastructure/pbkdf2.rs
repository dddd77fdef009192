//! PBKDF2 密钥派生模块
//! 用于从导出密码派生加密密钥

use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;

use crate::{
    error::{Result, WalletError},
    infrastructure::encryption::{EncryptionKey, KEY_LENGTH},
};

/// PBKDF2 密钥派生参数
pub const PBKDF2_ITERATIONS: u32 = 100_000;
pub const SALT_LENGTH: usize = 16;

/// 生成随机盐值
pub fn generate_salt() -> [u8; SALT_LENGTH] {
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// 从密码和盐值派生密钥
pub fn derive_key_with_salt(password: &str, salt: &[u8]) -> Result<EncryptionKey> {
    if salt.len() != SALT_LENGTH {
        return Err(WalletError::Encryption(format!(
            "salt must be {SALT_LENGTH} bytes"
        )));
    }

    let mut key = [0u8; KEY_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key);

    Ok(EncryptionKey::new(key))
}
