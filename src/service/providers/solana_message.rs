//! Solana legacy 消息编码（系统转账 + 可选 Memo）

use crate::error::{Result, WalletError};

/// System Program（全 0 公钥）
pub const SYSTEM_PROGRAM_ID: [u8; 32] = [0u8; 32];
/// Memo Program v2
pub const MEMO_PROGRAM_ID: &str = "MemoSq4gqABAXKb96qnH8TysNcWxMyWCqXgDLGmfcHr";
/// SystemInstruction::Transfer
const SYSTEM_TRANSFER_INDEX: u32 = 2;

/// compact-u16 (shortvec) 编码
pub fn encode_shortvec(mut len: usize, out: &mut Vec<u8>) {
    loop {
        let mut byte = (len & 0x7f) as u8;
        len >>= 7;
        if len == 0 {
            out.push(byte);
            return;
        }
        byte |= 0x80;
        out.push(byte);
    }
}

pub fn decode_pubkey(address: &str) -> Result<[u8; 32]> {
    let bytes = bs58::decode(address)
        .into_vec()
        .map_err(|e| WalletError::AddressValidation(format!("{address}: {e}")))?;
    bytes
        .try_into()
        .map_err(|_| WalletError::AddressValidation(format!("{address}: not a 32-byte key")))
}

struct CompiledInstruction {
    program_id_index: u8,
    accounts: Vec<u8>,
    data: Vec<u8>,
}

/// 已编译的 legacy 消息
pub struct TransferMessage {
    account_keys: Vec<[u8; 32]>,
    num_readonly_unsigned: u8,
    recent_blockhash: [u8; 32],
    instructions: Vec<CompiledInstruction>,
}

impl TransferMessage {
    /// 账户顺序：付款方(签名,可写) → 收款方(可写) → 只读程序账户；相同公钥只出现一次
    pub fn transfer(
        from: [u8; 32],
        to: [u8; 32],
        lamports: u64,
        recent_blockhash: [u8; 32],
        memo: Option<&str>,
    ) -> Result<Self> {
        let mut account_keys = vec![from];
        if to != from {
            account_keys.push(to);
        }

        let mut readonly = vec![SYSTEM_PROGRAM_ID];
        if memo.is_some() {
            readonly.push(decode_pubkey(MEMO_PROGRAM_ID)?);
        }
        for key in readonly.iter() {
            if account_keys.contains(key) {
                return Err(WalletError::tx_build(
                    "program id cannot be used as a transfer account",
                ));
            }
        }
        let num_readonly_unsigned = readonly.len() as u8;
        account_keys.extend(readonly);

        let index_of = |key: &[u8; 32]| -> u8 {
            account_keys
                .iter()
                .position(|k| k == key)
                .unwrap_or_default() as u8
        };

        let mut transfer_data = Vec::with_capacity(12);
        transfer_data.extend_from_slice(&SYSTEM_TRANSFER_INDEX.to_le_bytes());
        transfer_data.extend_from_slice(&lamports.to_le_bytes());

        let mut instructions = vec![CompiledInstruction {
            program_id_index: index_of(&SYSTEM_PROGRAM_ID),
            accounts: vec![index_of(&from), index_of(&to)],
            data: transfer_data,
        }];

        if let Some(memo) = memo {
            instructions.push(CompiledInstruction {
                program_id_index: index_of(&decode_pubkey(MEMO_PROGRAM_ID)?),
                accounts: vec![],
                data: memo.as_bytes().to_vec(),
            });
        }

        Ok(Self {
            account_keys,
            num_readonly_unsigned,
            recent_blockhash,
            instructions,
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(256);
        // header: 1 个签名者，0 个只读签名者
        out.push(1);
        out.push(0);
        out.push(self.num_readonly_unsigned);

        encode_shortvec(self.account_keys.len(), &mut out);
        for key in &self.account_keys {
            out.extend_from_slice(key);
        }
        out.extend_from_slice(&self.recent_blockhash);

        encode_shortvec(self.instructions.len(), &mut out);
        for ix in &self.instructions {
            out.push(ix.program_id_index);
            encode_shortvec(ix.accounts.len(), &mut out);
            out.extend_from_slice(&ix.accounts);
            encode_shortvec(ix.data.len(), &mut out);
            out.extend_from_slice(&ix.data);
        }
        out
    }
}

/// 单签名交易线格式：shortvec(1) ‖ signature ‖ message
pub fn encode_transaction(signature: &[u8; 64], message: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + 64 + message.len());
    encode_shortvec(1, &mut out);
    out.extend_from_slice(signature);
    out.extend_from_slice(message);
    out
}
