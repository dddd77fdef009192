//! SCALE 编解码（Substrate 交易所需的最小子集）

use crate::error::{Result, WalletError};

/// Compact<u128> 编码
pub fn encode_compact(value: u128, out: &mut Vec<u8>) {
    if value < 1 << 6 {
        out.push((value as u8) << 2);
    } else if value < 1 << 14 {
        out.extend_from_slice(&(((value as u16) << 2) | 0b01).to_le_bytes());
    } else if value < 1 << 30 {
        out.extend_from_slice(&(((value as u32) << 2) | 0b10).to_le_bytes());
    } else {
        let bytes = value.to_le_bytes();
        let len = bytes
            .iter()
            .rposition(|b| *b != 0)
            .map(|i| i + 1)
            .unwrap_or(0)
            .max(4);
        out.push((((len - 4) as u8) << 2) | 0b11);
        out.extend_from_slice(&bytes[..len]);
    }
}

pub fn compact(value: u128) -> Vec<u8> {
    let mut out = Vec::with_capacity(5);
    encode_compact(value, &mut out);
    out
}

/// 顺序读取器
pub struct ScaleReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ScaleReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(WalletError::Serialization(format!(
                "scale: need {n} bytes at offset {}, have {}",
                self.pos,
                self.remaining()
            )));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_array32(&mut self) -> Result<[u8; 32]> {
        let mut out = [0u8; 32];
        out.copy_from_slice(self.read_bytes(32)?);
        Ok(out)
    }

    pub fn read_compact(&mut self) -> Result<u128> {
        let first = self.read_u8()?;
        match first & 0b11 {
            0b00 => Ok(u128::from(first >> 2)),
            0b01 => {
                let second = self.read_u8()?;
                Ok(u128::from(u16::from_le_bytes([first, second]) >> 2))
            }
            0b10 => {
                let rest = self.read_bytes(3)?;
                Ok(u128::from(
                    u32::from_le_bytes([first, rest[0], rest[1], rest[2]]) >> 2,
                ))
            }
            _ => {
                let len = usize::from(first >> 2) + 4;
                if len > 16 {
                    return Err(WalletError::Serialization(format!(
                        "scale: compact integer of {len} bytes exceeds u128"
                    )));
                }
                let mut buf = [0u8; 16];
                buf[..len].copy_from_slice(self.read_bytes(len)?);
                Ok(u128::from_le_bytes(buf))
            }
        }
    }
}

/// 读取小端 u128（AccountInfo.data.free 等）
pub fn read_u128_le(bytes: &[u8], offset: usize) -> Result<u128> {
    let slice = bytes.get(offset..offset + 16).ok_or_else(|| {
        WalletError::Serialization(format!("scale: u128 at offset {offset} out of range"))
    })?;
    let mut buf = [0u8; 16];
    buf.copy_from_slice(slice);
    Ok(u128::from_le_bytes(buf))
}

pub fn read_u32_le(bytes: &[u8], offset: usize) -> Result<u32> {
    let slice = bytes.get(offset..offset + 4).ok_or_else(|| {
        WalletError::Serialization(format!("scale: u32 at offset {offset} out of range"))
    })?;
    let mut buf = [0u8; 4];
    buf.copy_from_slice(slice);
    Ok(u32::from_le_bytes(buf))
}

pub fn read_u64_le(bytes: &[u8], offset: usize) -> Result<u64> {
    let slice = bytes.get(offset..offset + 8).ok_or_else(|| {
        WalletError::Serialization(format!("scale: u64 at offset {offset} out of range"))
    })?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(slice);
    Ok(u64::from_le_bytes(buf))
}
