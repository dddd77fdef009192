//! 派生路径
//!
//! 分层路径 `m/<purpose>'/<coinType>'/<account>'/<change>/<index>` 解析为五段结构；
//! Substrate 的 `//hard//stash` 等写法按不透明字符串原样透传。

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    domain::chain_config::ChainFamily,
    error::{Result, WalletError},
};

/// 硬化索引标志位
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

/// 路径段数（purpose / coinType / account / change / index）
pub const HD_PATH_DEPTH: usize = 5;

/// 路径中的单个分量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathComponent {
    pub index: u32,
    pub hardened: bool,
}

impl PathComponent {
    pub fn hardened(index: u32) -> Self {
        Self {
            index,
            hardened: true,
        }
    }

    pub fn normal(index: u32) -> Self {
        Self {
            index,
            hardened: false,
        }
    }

    /// HMAC 输入使用的 32 位索引（简化方案对所有分量都置硬化位）
    pub fn derivation_index(&self) -> u32 {
        self.index | HARDENED_OFFSET
    }

    fn parse(raw: &str, path: &str) -> Result<Self> {
        let (digits, hardened) = match raw.strip_suffix('\'').or_else(|| raw.strip_suffix('h')) {
            Some(d) => (d, true),
            None => (raw, false),
        };

        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(WalletError::InvalidDerivationPath(format!(
                "{path}: component '{raw}' is not a number"
            )));
        }

        let index: u32 = digits.parse().map_err(|_| {
            WalletError::InvalidDerivationPath(format!("{path}: component '{raw}' out of range"))
        })?;
        if index >= HARDENED_OFFSET {
            return Err(WalletError::InvalidDerivationPath(format!(
                "{path}: component '{raw}' exceeds 2^31-1"
            )));
        }

        Ok(Self { index, hardened })
    }
}

impl fmt::Display for PathComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hardened {
            write!(f, "{}'", self.index)
        } else {
            write!(f, "{}", self.index)
        }
    }
}

/// 五段分层路径
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HdPath {
    pub purpose: PathComponent,
    pub coin_type: PathComponent,
    pub account: PathComponent,
    pub change: PathComponent,
    pub index: PathComponent,
}

impl HdPath {
    /// 按链族习惯构建 BIP44 路径
    ///
    /// Ethereum 系 change/index 不硬化，Solana 系全部硬化。
    pub fn for_family(family: ChainFamily, account: u32, change: u32, index: u32) -> Result<Self> {
        let path = match family {
            ChainFamily::Ethereum => Self {
                purpose: PathComponent::hardened(44),
                coin_type: PathComponent::hardened(60),
                account: PathComponent::hardened(account),
                change: PathComponent::normal(change),
                index: PathComponent::normal(index),
            },
            ChainFamily::Solana => Self {
                purpose: PathComponent::hardened(44),
                coin_type: PathComponent::hardened(501),
                account: PathComponent::hardened(account),
                change: PathComponent::hardened(change),
                index: PathComponent::hardened(index),
            },
            ChainFamily::Substrate => {
                return Err(WalletError::InvalidDerivationPath(
                    "substrate uses opaque derivation paths".to_string(),
                ))
            }
        };

        if path.components().iter().any(|c| c.index >= HARDENED_OFFSET) {
            return Err(WalletError::InvalidDerivationPath(path.to_string()));
        }
        Ok(path)
    }

    pub fn components(&self) -> [PathComponent; HD_PATH_DEPTH] {
        [
            self.purpose,
            self.coin_type,
            self.account,
            self.change,
            self.index,
        ]
    }
}

impl FromStr for HdPath {
    type Err = WalletError;

    fn from_str(path: &str) -> Result<Self> {
        let mut parts = path.split('/');

        if parts.next() != Some("m") {
            return Err(WalletError::InvalidDerivationPath(format!(
                "{path}: must start with 'm'"
            )));
        }

        let components = parts
            .map(|raw| PathComponent::parse(raw, path))
            .collect::<Result<Vec<_>>>()?;

        match components.as_slice() {
            [purpose, coin_type, account, change, index] => Ok(Self {
                purpose: *purpose,
                coin_type: *coin_type,
                account: *account,
                change: *change,
                index: *index,
            }),
            _ => Err(WalletError::InvalidDerivationPath(format!(
                "{path}: expected {HD_PATH_DEPTH} components, found {}",
                components.len()
            ))),
        }
    }
}

impl fmt::Display for HdPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for c in self.components() {
            write!(f, "/{c}")?;
        }
        Ok(())
    }
}

/// 派生路径：分层结构或不透明字符串
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DerivationPath {
    Hierarchical(HdPath),
    Opaque(String),
}

impl DerivationPath {
    /// 按链族解析
    ///
    /// Substrate 系一律视为不透明路径；其它链族必须是合法的五段分层路径。
    pub fn parse_for(family: ChainFamily, path: &str) -> Result<Self> {
        if family.uses_hierarchical_path() {
            Ok(Self::Hierarchical(path.parse()?))
        } else {
            Ok(Self::Opaque(path.to_string()))
        }
    }

    pub fn default_for(family: ChainFamily) -> Self {
        match family.default_derivation_path().parse::<HdPath>() {
            Ok(hd) if family.uses_hierarchical_path() => Self::Hierarchical(hd),
            _ => Self::Opaque(family.default_derivation_path().to_string()),
        }
    }

    pub fn as_hd(&self) -> Option<&HdPath> {
        match self {
            Self::Hierarchical(hd) => Some(hd),
            Self::Opaque(_) => None,
        }
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hierarchical(hd) => hd.fmt(f),
            Self::Opaque(raw) => f.write_str(raw),
        }
    }
}
