//! 钱包文件存储集成测试
//!
//! - 保存 / 读取往返
//! - 单字节篡改检测
//! - 列表、备份、恢复、删除

use agentwallet::{
    domain::{wallet_record::truncate_to_millis, ChainFamily, CreationMethod, WalletRecord},
    error::WalletError,
    repository::WalletStore,
};
use chrono::{TimeZone, Utc};
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

mod common;

fn mnemonic_record(agent_id: &str, wallet_id: &str) -> WalletRecord {
    let created = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
    WalletRecord {
        id: wallet_id.into(),
        agent_id: agent_id.into(),
        chain: ChainFamily::Solana,
        address: "3WrwvcsJDRqxFWwWL6n8uMDQ8PkCkBjQPkZZTRTfnxwv".into(),
        private_key: None,
        mnemonic: Some(common::TEST_MNEMONIC.into()),
        seed_derivation_path: "m/44'/501'/0'/0'/0'".into(),
        created_at: created,
        updated_at: Utc.timestamp_millis_opt(1_700_000_050_000).unwrap(),
        creation_method: CreationMethod::Mnemonic,
        chain_metadata: Some([("cluster".to_string(), "devnet".to_string())].into()),
    }
}

fn key_record(agent_id: &str, wallet_id: &str) -> WalletRecord {
    let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
    WalletRecord {
        id: wallet_id.into(),
        agent_id: agent_id.into(),
        chain: ChainFamily::Ethereum,
        address: common::ETH_TEST_ADDRESS.into(),
        private_key: Some(common::ETH_TEST_KEY.into()),
        mnemonic: None,
        seed_derivation_path: "m/44'/60'/0'/0/0".into(),
        created_at: now,
        updated_at: now,
        creation_method: CreationMethod::PrivateKey,
        chain_metadata: None,
    }
}

#[tokio::test]
async fn test_save_load_roundtrip() {
    let dir = TempDir::new().unwrap();
    let store = WalletStore::new(dir.path());

    let with_mnemonic = mnemonic_record("agent1", "sol-main");
    let with_key = key_record("agent1", "eth-main");
    assert_ok!(store.save(&with_mnemonic).await);
    assert_ok!(store.save(&with_key).await);

    let loaded = store.load("agent1", "sol-main").await.unwrap().unwrap();
    assert_eq!(loaded, with_mnemonic);
    assert!(loaded.private_key.is_none());

    let loaded = store.load("agent1", "eth-main").await.unwrap().unwrap();
    assert_eq!(loaded, with_key);
    assert!(loaded.mnemonic.is_none());

    assert!(store.load("agent1", "missing").await.unwrap().is_none());
    assert!(store.load("nobody", "missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_sub_millisecond_timestamps_are_refused_before_writing() {
    let dir = TempDir::new().unwrap();
    let store = WalletStore::new(dir.path());

    let mut record = key_record("agent1", "precise");
    record.created_at = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();

    assert!(matches!(
        store.save(&record).await,
        Err(WalletError::Serialization(_))
    ));
    assert!(store.load("agent1", "precise").await.unwrap().is_none());

    record.created_at = truncate_to_millis(record.created_at);
    assert_ok!(store.save(&record).await);
    let loaded = store.load("agent1", "precise").await.unwrap().unwrap();
    assert_eq!(loaded, record);
    assert_eq!(loaded.created_at.timestamp_subsec_millis(), 123);
}

#[tokio::test]
async fn test_every_single_byte_flip_is_detected() {
    let dir = TempDir::new().unwrap();
    let store = WalletStore::new(dir.path());
    let path = store.save(&key_record("agent1", "w1")).await.unwrap();
    let original = std::fs::read(&path).unwrap();

    for i in 0..original.len() {
        let mut corrupted = original.clone();
        corrupted[i] ^= 0x01;
        std::fs::write(&path, &corrupted).unwrap();

        let result = store.load("agent1", "w1").await;
        assert!(
            matches!(result, Err(WalletError::IntegrityError { .. })),
            "flip at byte {i} was not detected"
        );
    }

    std::fs::write(&path, &original).unwrap();
    assert!(assert_ok!(store.load("agent1", "w1").await).is_some());
}

#[tokio::test]
async fn test_truncated_file_is_integrity_error() {
    let dir = TempDir::new().unwrap();
    let store = WalletStore::new(dir.path());
    let path = store.save(&key_record("agent1", "w1")).await.unwrap();

    std::fs::write(&path, [0u8, 1, 2]).unwrap();
    assert!(matches!(
        store.load("agent1", "w1").await,
        Err(WalletError::IntegrityError { .. })
    ));
}

#[tokio::test]
async fn test_list_stats_and_delete() {
    let dir = TempDir::new().unwrap();
    let store = WalletStore::new(dir.path());

    store.save(&key_record("agent2", "b")).await.unwrap();
    store.save(&key_record("agent2", "a")).await.unwrap();
    store.save(&mnemonic_record("agent1", "c")).await.unwrap();
    std::fs::write(dir.path().join("agent2").join("notes.txt"), "ignored").unwrap();

    assert_eq!(store.list("agent2").await.unwrap(), vec!["a", "b"]);
    assert_eq!(store.list_agents().await.unwrap(), vec!["agent1", "agent2"]);
    assert!(store.list("agent3").await.unwrap().is_empty());

    let stats = store.stats("agent2", "a").await.unwrap().unwrap();
    assert!(stats.size > 4);
    assert_eq!(store.storage_size("agent2").await.unwrap(), stats.size * 2);

    assert!(store.delete("agent2", "a").await.unwrap());
    assert!(!store.delete("agent2", "a").await.unwrap());
    assert!(!store.exists("agent2", "a").await.unwrap());

    assert_eq!(store.delete_agent("agent2").await.unwrap(), 1);
    assert_eq!(store.list_agents().await.unwrap(), vec!["agent1"]);
}

#[tokio::test]
async fn test_backup_and_restore() {
    let vault = TempDir::new().unwrap();
    let backup = TempDir::new().unwrap();
    let store = WalletStore::new(vault.path());

    store.save(&key_record("agent1", "w1")).await.unwrap();
    store.save(&mnemonic_record("agent1", "w2")).await.unwrap();

    let dest = backup.path().join("agent1-backup");
    assert_eq!(store.backup("agent1", &dest).await.unwrap(), 2);

    store.delete_agent("agent1").await.unwrap();
    assert!(store.list("agent1").await.unwrap().is_empty());

    assert_eq!(store.restore("agent1", &dest).await.unwrap(), 2);
    assert_eq!(
        store.load("agent1", "w2").await.unwrap().unwrap(),
        mnemonic_record("agent1", "w2")
    );
}

#[tokio::test]
async fn test_rejects_path_like_identifiers() {
    let dir = TempDir::new().unwrap();
    let store = WalletStore::new(dir.path());

    assert_err!(store.list("..").await);

    let record = key_record("../escape", "w1");
    assert!(matches!(
        store.save(&record).await,
        Err(WalletError::InvalidIdentifier(_))
    ));
    assert!(matches!(
        store.load("agent1", "a/b").await,
        Err(WalletError::InvalidIdentifier(_))
    ));
}

#[cfg(unix)]
#[tokio::test]
async fn test_private_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let store = WalletStore::new(dir.path().join("vault"));
    let path = store.save(&key_record("agent1", "w1")).await.unwrap();

    let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o600);
    let dir_mode = std::fs::metadata(path.parent().unwrap())
        .unwrap()
        .permissions()
        .mode()
        & 0o777;
    assert_eq!(dir_mode, 0o700);
}
