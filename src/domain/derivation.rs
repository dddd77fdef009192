//! 密钥派生引擎
//!
//! - 助记词校验 / 生成 / 种子计算 (BIP39)
//! - 简化分层派生：每一级 `HMAC-SHA512(chain_code, key ‖ 0x00 ‖ be32(index | 2^31))`，
//!   不是 BIP32 secp256k1 CKD
//! - 按链族计算公钥与地址

use bip39::{Language, Mnemonic};
use blake2::{digest::consts::U32, Blake2b};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha512;
use sha3::{Digest, Keccak256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{
    domain::{
        chain_config::ChainFamily,
        derivation_path::{DerivationPath, HdPath},
        wallet_record::{CreationMethod, KeyPair, WalletRecord},
    },
    error::{Result, WalletError},
    utils::address_validator::AddressValidator,
};

type HmacSha512 = Hmac<Sha512>;
pub(crate) type Blake2b256 = Blake2b<U32>;

/// 私钥长度（三个链族统一为 32 字节）
pub const PRIVATE_KEY_LEN: usize = 32;

/// 派生结果
#[derive(Debug, Clone)]
pub struct DerivedWallet {
    pub key_pair: KeyPair,
    pub address: String,
    /// 实际使用的派生路径（分层路径为规范化写法）
    pub derivation_path: String,
}

impl DerivedWallet {
    /// 私钥 (hex 编码，仅用于持久化)
    pub fn private_key_hex(&self) -> String {
        hex::encode(&self.key_pair.private_key)
    }
}

/// 分层派生的中间结果
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    pub private_key: [u8; 32],
    pub chain_code: [u8; 32],
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 助记词
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// 规范化助记词：去首尾空白、合并空白、转小写
pub fn normalize_phrase(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_mnemonic(phrase: &str) -> Result<Mnemonic> {
    let normalized = normalize_phrase(phrase);
    let words = normalized.split(' ').count();
    if words != 12 && words != 24 {
        return Err(WalletError::InvalidSeedPhrase);
    }
    Mnemonic::parse_in(Language::English, &normalized).map_err(|_| WalletError::InvalidSeedPhrase)
}

/// 12 或 24 个词，且通过 BIP39 英文词表与校验和验证
pub fn validate_seed_phrase(phrase: &str) -> bool {
    parse_mnemonic(phrase).is_ok()
}

/// 生成新的助记词（128 位 → 12 词，256 位 → 24 词）
pub fn generate_seed_phrase(strength_bits: usize) -> Result<String> {
    let entropy_len = match strength_bits {
        128 => 16,
        256 => 32,
        other => {
            return Err(WalletError::Config(format!(
                "unsupported seed strength {other} bits (expected 128 or 256)"
            )))
        }
    };

    let mut entropy = vec![0u8; entropy_len];
    rand::thread_rng().fill_bytes(&mut entropy);

    let mnemonic = Mnemonic::from_entropy_in(Language::English, &entropy)
        .map_err(|_| WalletError::InvalidSeedPhrase);
    entropy.zeroize();

    Ok(mnemonic?.to_string())
}

/// BIP39 种子 (PBKDF2-HMAC-SHA512, 2048 轮)
pub fn derive_seed(phrase: &str, passphrase: &str) -> Result<[u8; 64]> {
    Ok(parse_mnemonic(phrase)?.to_seed(passphrase))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 分层派生
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// 按五段路径逐级派生
pub fn derive_key_from_seed(seed: &[u8; 64], path: &HdPath) -> Result<DerivedKey> {
    let mut key = DerivedKey {
        private_key: [0u8; 32],
        chain_code: [0u8; 32],
    };
    key.private_key.copy_from_slice(&seed[..32]);
    key.chain_code.copy_from_slice(&seed[32..]);

    for component in path.components() {
        let mut mac = HmacSha512::new_from_slice(&key.chain_code)
            .map_err(|e| WalletError::InvalidDerivationPath(e.to_string()))?;
        mac.update(&key.private_key);
        mac.update(&[0x00]);
        mac.update(&component.derivation_index().to_be_bytes());

        let mut output = mac.finalize().into_bytes();
        key.private_key.copy_from_slice(&output[..32]);
        key.chain_code.copy_from_slice(&output[32..]);
        output.as_mut_slice().zeroize();
    }

    Ok(key)
}

pub(crate) fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

pub(crate) fn blake2b_256(data: &[u8]) -> [u8; 32] {
    Blake2b256::digest(data).into()
}

fn require_key_len(private_key: &[u8]) -> Result<[u8; 32]> {
    private_key.try_into().map_err(|_| {
        WalletError::InvalidPrivateKey(format!(
            "expected {PRIVATE_KEY_LEN} bytes, got {}",
            private_key.len()
        ))
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 链族策略
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// 钱包派生策略 trait
pub trait DerivationStrategy: Send + Sync {
    fn family(&self) -> ChainFamily;

    /// 从 BIP39 种子派生
    fn derive_from_seed(&self, seed: &[u8; 64], path: &DerivationPath) -> Result<DerivedWallet>;

    /// 从原始私钥计算公钥与地址
    fn from_private_key(&self, private_key: &[u8], path: &str) -> Result<DerivedWallet>;

    fn validate_address(&self, address: &str) -> bool {
        AddressValidator::validate_for(self.family(), address)
    }
}

/// Ethereum 系：公钥 = keccak256(私钥)，地址 = 0x + hex(keccak256(公钥)[12..])
pub struct EthereumStrategy;

impl EthereumStrategy {
    fn wallet_from_key(private_key: [u8; 32], path: String) -> DerivedWallet {
        let public_key = keccak256(&private_key);
        let address = format!("0x{}", hex::encode(&keccak256(&public_key)[12..]));

        DerivedWallet {
            key_pair: KeyPair::new(private_key.to_vec(), public_key.to_vec()),
            address,
            derivation_path: path,
        }
    }
}

impl DerivationStrategy for EthereumStrategy {
    fn family(&self) -> ChainFamily {
        ChainFamily::Ethereum
    }

    fn derive_from_seed(&self, seed: &[u8; 64], path: &DerivationPath) -> Result<DerivedWallet> {
        let hd = path
            .as_hd()
            .ok_or_else(|| WalletError::InvalidDerivationPath(path.to_string()))?;
        let derived = derive_key_from_seed(seed, hd)?;
        Ok(Self::wallet_from_key(derived.private_key, hd.to_string()))
    }

    fn from_private_key(&self, private_key: &[u8], path: &str) -> Result<DerivedWallet> {
        let key = require_key_len(private_key)?;
        Ok(Self::wallet_from_key(key, path.to_string()))
    }
}

/// Substrate 系：私钥 = seed[0..32]，公钥 = blake2b-256(私钥)，
/// 地址 = base58(blake2b-256(公钥))。路径只记录不参与计算。
pub struct SubstrateStrategy;

impl SubstrateStrategy {
    fn wallet_from_key(private_key: [u8; 32], path: String) -> DerivedWallet {
        let public_key = blake2b_256(&private_key);
        let address = bs58::encode(blake2b_256(&public_key)).into_string();

        DerivedWallet {
            key_pair: KeyPair::new(private_key.to_vec(), public_key.to_vec()),
            address,
            derivation_path: path,
        }
    }
}

impl DerivationStrategy for SubstrateStrategy {
    fn family(&self) -> ChainFamily {
        ChainFamily::Substrate
    }

    fn derive_from_seed(&self, seed: &[u8; 64], path: &DerivationPath) -> Result<DerivedWallet> {
        let mut private_key = [0u8; 32];
        private_key.copy_from_slice(&seed[..32]);
        Ok(Self::wallet_from_key(private_key, path.to_string()))
    }

    fn from_private_key(&self, private_key: &[u8], path: &str) -> Result<DerivedWallet> {
        let key = require_key_len(private_key)?;
        Ok(Self::wallet_from_key(key, path.to_string()))
    }
}

/// Solana 系：派生出的 32 字节作为 Ed25519 种子，地址 = base58(公钥)
pub struct SolanaStrategy;

impl SolanaStrategy {
    fn wallet_from_key(private_key: [u8; 32], path: String) -> DerivedWallet {
        let signing_key = ed25519_dalek::SigningKey::from_bytes(&private_key);
        let public_key = signing_key.verifying_key().to_bytes();
        let address = bs58::encode(public_key).into_string();

        DerivedWallet {
            key_pair: KeyPair::new(private_key.to_vec(), public_key.to_vec()),
            address,
            derivation_path: path,
        }
    }
}

impl DerivationStrategy for SolanaStrategy {
    fn family(&self) -> ChainFamily {
        ChainFamily::Solana
    }

    fn derive_from_seed(&self, seed: &[u8; 64], path: &DerivationPath) -> Result<DerivedWallet> {
        let hd = path
            .as_hd()
            .ok_or_else(|| WalletError::InvalidDerivationPath(path.to_string()))?;
        let derived = derive_key_from_seed(seed, hd)?;
        Ok(Self::wallet_from_key(derived.private_key, hd.to_string()))
    }

    /// 接受 32 字节种子或 64 字节 keypair（后 32 字节必须是对应公钥）
    fn from_private_key(&self, private_key: &[u8], path: &str) -> Result<DerivedWallet> {
        let key = solana_seed(private_key)?;
        Ok(Self::wallet_from_key(key, path.to_string()))
    }
}

/// 取出 Ed25519 种子；64 字节 keypair 的公钥半部分与种子不符时拒绝
pub fn solana_seed(private_key: &[u8]) -> Result<[u8; 32]> {
    match private_key.len() {
        32 => require_key_len(private_key),
        64 => {
            let seed = require_key_len(&private_key[..32])?;
            let public_key = ed25519_dalek::SigningKey::from_bytes(&seed)
                .verifying_key()
                .to_bytes();
            if private_key[32..] != public_key {
                return Err(WalletError::InvalidPrivateKey(
                    "keypair public half does not match its secret seed".to_string(),
                ));
            }
            Ok(seed)
        }
        other => Err(WalletError::InvalidPrivateKey(format!(
            "expected 32 or 64 bytes, got {other}"
        ))),
    }
}

/// 策略工厂
pub struct DerivationStrategyFactory;

impl DerivationStrategyFactory {
    pub fn create_strategy(family: ChainFamily) -> Box<dyn DerivationStrategy> {
        match family {
            ChainFamily::Ethereum => Box::new(EthereumStrategy),
            ChainFamily::Substrate => Box::new(SubstrateStrategy),
            ChainFamily::Solana => Box::new(SolanaStrategy),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 入口
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// 解析私钥字符串：hex（可带 0x 前缀）；Solana 额外接受 base58
pub fn decode_private_key(family: ChainFamily, encoded: &str) -> Result<Vec<u8>> {
    let trimmed = encoded.trim();
    let hex_part = trimmed.strip_prefix("0x").unwrap_or(trimmed);

    if let Ok(bytes) = hex::decode(hex_part) {
        return Ok(bytes);
    }

    if family == ChainFamily::Solana {
        if let Ok(bytes) = bs58::decode(trimmed).into_vec() {
            return Ok(bytes);
        }
    }

    Err(WalletError::InvalidPrivateKey(
        "private key is neither hex nor a supported encoding".to_string(),
    ))
}

/// 由私钥字节计算指定链族的地址
pub fn address_from_private_key(family: ChainFamily, private_key: &[u8]) -> Result<String> {
    let strategy = DerivationStrategyFactory::create_strategy(family);
    Ok(strategy
        .from_private_key(private_key, family.default_derivation_path())?
        .address)
}

/// 按创建方式派生钱包密钥
///
/// * `PrivateKey`：直接使用私钥，路径仅记录（缺省为链族默认路径）
/// * 其余方式：先校验助记词，再以空口令计算种子并按路径派生
pub fn derive_wallet_key(
    method: CreationMethod,
    seed_phrase: Option<&str>,
    private_key: Option<&str>,
    derivation_path: Option<&str>,
    family: ChainFamily,
) -> Result<DerivedWallet> {
    let strategy = DerivationStrategyFactory::create_strategy(family);
    let path = derivation_path.unwrap_or(family.default_derivation_path());

    match method {
        CreationMethod::PrivateKey => {
            let encoded = private_key.ok_or_else(|| {
                WalletError::InvalidPrivateKey("private key is required".to_string())
            })?;
            let mut bytes = decode_private_key(family, encoded)?;
            let derived = strategy.from_private_key(&bytes, path);
            bytes.zeroize();
            derived
        }
        CreationMethod::Generate | CreationMethod::Seed | CreationMethod::Mnemonic => {
            let phrase = seed_phrase.ok_or(WalletError::InvalidSeedPhrase)?;
            if !validate_seed_phrase(phrase) {
                return Err(WalletError::InvalidSeedPhrase);
            }
            let parsed_path = DerivationPath::parse_for(family, path)?;
            let mut seed = derive_seed(phrase, "")?;
            let derived = strategy.derive_from_seed(&seed, &parsed_path);
            seed.zeroize();
            derived
        }
    }
}

/// 由记录中的秘密材料重新计算地址，与记录地址不符时拒绝
pub fn verify_record_address(record: &WalletRecord) -> Result<()> {
    let derived = derive_wallet_key(
        record.creation_method,
        record.mnemonic.as_deref(),
        record.private_key.as_deref(),
        Some(&record.seed_derivation_path),
        record.chain,
    )?;

    let matches = match record.chain {
        ChainFamily::Ethereum => derived.address.eq_ignore_ascii_case(&record.address),
        ChainFamily::Substrate | ChainFamily::Solana => derived.address == record.address,
    };
    if !matches {
        return Err(WalletError::AddressValidation(format!(
            "wallet {} address {} does not match its key material",
            record.id, record.address
        )));
    }
    Ok(())
}
