//! 链 Provider 集成测试（脚本化 JSON-RPC）

use std::sync::Arc;

use agentwallet::{
    config::{EthereumNetworkConfig, SolanaNetworkConfig, SubstrateNetworkConfig},
    domain::{ChainFamily, TransactionRequest, TransactionStatus},
    error::WalletError,
    service::providers::{
        ethereum::LegacyTransaction,
        substrate::{account_storage_key, decode_transfer},
        ChainProvider, ConnectionState, EthereumProvider, Signer, SolanaProvider,
        SubstrateProvider,
    },
    utils::AddressValidator,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ed25519_dalek::{Signature, SigningKey, Verifier};
use k256::ecdsa::{RecoveryId, VerifyingKey};
use rlp::Rlp;
use serde_json::json;
use sha3::{Digest, Keccak256};

mod common;

use common::{MockTransport, ETH_TEST_ADDRESS, ETH_TEST_KEY};

const ALICE: &str = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";
const ETH_RECIPIENT: &str = "0x3535353535353535353535353535353535353535";

fn eth_key() -> Vec<u8> {
    hex::decode(ETH_TEST_KEY).unwrap()
}

fn ethereum(transport: &Arc<MockTransport>) -> EthereumProvider {
    common::init_test_logging();
    let config = EthereumNetworkConfig {
        chain_id: 1,
        history_block_window: 100,
        history_page_size: 10,
        default_gas_limit: 21_000,
        ..Default::default()
    };
    EthereumProvider::new(config, transport.clone())
}

fn substrate(transport: &Arc<MockTransport>) -> SubstrateProvider {
    let config = SubstrateNetworkConfig {
        history_block_window: 3,
        balances_pallet_index: 5,
        transfer_call_index: 3,
        ..Default::default()
    };
    SubstrateProvider::new(config, transport.clone())
}

fn solana(transport: &Arc<MockTransport>) -> SolanaProvider {
    let config = SolanaNetworkConfig {
        commitment: "confirmed".into(),
        history_page_size: 5,
        ..Default::default()
    };
    SolanaProvider::new(config, transport.clone())
}

async fn connected_ethereum() -> (Arc<MockTransport>, EthereumProvider) {
    let transport = MockTransport::new();
    common::script_ethereum_connect(&transport);
    let provider = ethereum(&transport);
    provider.connect().await.unwrap();
    (transport, provider)
}

// ============ 连接状态 ============

#[tokio::test]
async fn test_operations_require_connection() {
    let transport = MockTransport::new();
    common::script_ethereum_connect(&transport);
    let provider = ethereum(&transport);
    let request = TransactionRequest::new(ChainFamily::Ethereum, ETH_RECIPIENT, "1");

    async fn assert_all_not_connected(provider: &dyn ChainProvider, request: &TransactionRequest) {
        let not_connected = |r: Result<(), WalletError>| matches!(r, Err(WalletError::NotConnected(_)));
        assert!(not_connected(provider.get_balance(ETH_TEST_ADDRESS).await.map(|_| ())));
        assert!(not_connected(provider.send_transaction(ETH_TEST_ADDRESS, request).await.map(|_| ())));
        assert!(not_connected(provider.sign_transaction(request, &eth_key()).await.map(|_| ())));
        assert!(not_connected(provider.get_transaction_history(ETH_TEST_ADDRESS).await.map(|_| ())));
        assert!(not_connected(provider.estimate_fee(request).await.map(|_| ())));
        assert!(not_connected(provider.get_block_number().await.map(|_| ())));
        assert!(not_connected(provider.get_transaction("0x00").await.map(|_| ())));
    }

    assert_eq!(provider.state().await, ConnectionState::Disconnected);
    assert_all_not_connected(&provider, &request).await;
    // 未连接时不发出任何请求
    assert_eq!(transport.call_count(), 0);

    provider.connect().await.unwrap();
    assert!(provider.is_connected().await);
    assert_eq!(provider.get_block_number().await.unwrap(), 0x112a880);

    provider.disconnect().await.unwrap();
    provider.disconnect().await.unwrap();
    assert_eq!(provider.state().await, ConnectionState::Disconnected);
    assert_all_not_connected(&provider, &request).await;
}

#[tokio::test]
async fn test_connect_is_idempotent() {
    let (transport, provider) = connected_ethereum().await;
    let chain_id_calls = transport.calls_to("eth_chainId").len();

    provider.connect().await.unwrap();
    assert_eq!(transport.calls_to("eth_chainId").len(), chain_id_calls);
}

#[tokio::test]
async fn test_connect_failure_leaves_disconnected() {
    let transport = MockTransport::new();
    transport
        .respond("eth_chainId", json!("0x89"))
        .respond("eth_blockNumber", json!("0x1"));
    let provider = ethereum(&transport);

    assert!(matches!(provider.connect().await, Err(WalletError::Network(_))));
    assert_eq!(provider.state().await, ConnectionState::Disconnected);

    let sol_transport = MockTransport::new();
    sol_transport.fail("getSlot", "connection refused");
    let sol = solana(&sol_transport);
    assert!(sol.connect().await.is_err());
    assert!(!sol.is_connected().await);
}

// ============ Ethereum ============

#[tokio::test]
async fn test_ethereum_balance() {
    let (transport, provider) = connected_ethereum().await;
    transport.respond("eth_getBalance", json!("0x6f05b59d3b20000"));

    let balance = provider.get_balance(ETH_TEST_ADDRESS).await.unwrap();
    assert_eq!(balance.amount, "0.5");
    assert_eq!(balance.denomination, "ETH");
    assert_eq!(balance.chain, ChainFamily::Ethereum);
    assert_eq!(balance.block_number, 0x112a880);
    assert_eq!(
        transport.calls_to("eth_getBalance"),
        vec![json!([ETH_TEST_ADDRESS, "latest"])]
    );

    assert!(matches!(
        provider.get_balance("0x1234").await,
        Err(WalletError::AddressValidation(_))
    ));
}

#[tokio::test]
async fn test_ethereum_sign_transaction() {
    let (transport, provider) = connected_ethereum().await;
    transport
        .respond("eth_getTransactionCount", json!("0x5"))
        .respond("eth_gasPrice", json!("0x4a817c800"));

    let request = TransactionRequest::new(ChainFamily::Ethereum, ETH_RECIPIENT, "0.5").with_memo("hi");
    let signed = provider.sign_transaction(&request, &eth_key()).await.unwrap();

    // nonce 按简化地址查询
    assert_eq!(
        transport.calls_to("eth_getTransactionCount"),
        vec![json!([ETH_TEST_ADDRESS, "pending"])]
    );
    assert!(transport.calls_to("eth_sendRawTransaction").is_empty());

    let raw = hex::decode(signed.signed_payload.trim_start_matches("0x")).unwrap();
    assert_eq!(
        signed.tx_hash,
        format!("0x{}", hex::encode(Keccak256::digest(&raw)))
    );

    let rlp = Rlp::new(&raw);
    assert_eq!(rlp.item_count().unwrap(), 9);
    let nonce: u64 = rlp.val_at(0).unwrap();
    let gas_price: u64 = rlp.val_at(1).unwrap();
    let gas_limit: u64 = rlp.val_at(2).unwrap();
    let to: Vec<u8> = rlp.val_at(3).unwrap();
    let value: u128 = rlp.val_at(4).unwrap();
    let data: Vec<u8> = rlp.val_at(5).unwrap();
    let v: u64 = rlp.val_at(6).unwrap();
    assert_eq!(nonce, 5);
    assert_eq!(gas_price, 20_000_000_000);
    assert_eq!(gas_limit, 21_000 + 16 * 2);
    assert_eq!(to, vec![0x35; 20]);
    assert_eq!(value, 500_000_000_000_000_000);
    assert_eq!(data, b"hi".to_vec());
    assert!(v == 37 || v == 38);

    // 签名可恢复出私钥对应的 secp256k1 公钥
    let unsigned = LegacyTransaction {
        nonce,
        gas_price: u128::from(gas_price),
        gas_limit,
        to: [0x35; 20],
        value,
        data,
        chain_id: 1,
    };
    let sig = hex::decode(signed.signature.unwrap().trim_start_matches("0x")).unwrap();
    let recovered = VerifyingKey::recover_from_prehash(
        &unsigned.signing_hash(),
        &k256::ecdsa::Signature::from_slice(&sig[..64]).unwrap(),
        RecoveryId::from_byte(sig[64]).unwrap(),
    )
    .unwrap();
    let expected = k256::ecdsa::SigningKey::from_slice(&eth_key()).unwrap();
    assert_eq!(&recovered, expected.verifying_key());
}

#[tokio::test]
async fn test_ethereum_explicit_gas_skips_rpc() {
    let (transport, provider) = connected_ethereum().await;
    transport.respond("eth_getTransactionCount", json!("0x0"));

    let request = TransactionRequest::new(ChainFamily::Ethereum, ETH_RECIPIENT, "1")
        .with_gas(Some("1000000000".into()), Some(50_000));
    let signed = provider.sign_transaction(&request, &eth_key()).await.unwrap();

    assert!(transport.calls_to("eth_gasPrice").is_empty());
    let raw = hex::decode(signed.signed_payload.trim_start_matches("0x")).unwrap();
    let rlp = Rlp::new(&raw);
    assert_eq!(rlp.val_at::<u64>(1).unwrap(), 1_000_000_000);
    assert_eq!(rlp.val_at::<u64>(2).unwrap(), 50_000);
}

#[tokio::test]
async fn test_ethereum_send_requires_matching_signer() {
    let (transport, provider) = connected_ethereum().await;
    transport
        .respond("eth_getTransactionCount", json!("0x1"))
        .respond("eth_gasPrice", json!("0x3b9aca00"))
        .respond("eth_sendRawTransaction", json!("0xfeed"));
    let request = TransactionRequest::new(ChainFamily::Ethereum, ETH_RECIPIENT, "0.1");

    assert!(matches!(
        provider.send_transaction(ETH_TEST_ADDRESS, &request).await,
        Err(WalletError::Signing(_))
    ));

    let solana_signer = Signer::new(ChainFamily::Solana, &[1u8; 32]).unwrap();
    assert!(matches!(
        provider.attach_signer(solana_signer).await,
        Err(WalletError::Signing(_))
    ));

    provider
        .attach_signer(Signer::new(ChainFamily::Ethereum, &eth_key()).unwrap())
        .await
        .unwrap();
    assert!(matches!(
        provider.send_transaction(ETH_RECIPIENT, &request).await,
        Err(WalletError::AddressValidation(_))
    ));

    let tx = provider
        .send_transaction(&ETH_TEST_ADDRESS.to_uppercase().replace("0X", "0x"), &request)
        .await
        .unwrap();
    assert_eq!(tx.hash, "0xfeed");
    assert_eq!(tx.status, TransactionStatus::Pending);
    assert_eq!(tx.amount, "0.1");

    let sent = transport.calls_to("eth_sendRawTransaction");
    assert_eq!(sent.len(), 1);
    assert!(sent[0][0].as_str().unwrap().starts_with("0xf8"));
}

#[tokio::test]
async fn test_ethereum_fee_estimate_and_fallback() {
    let (transport, provider) = connected_ethereum().await;
    transport
        .respond("eth_gasPrice", json!("0x3b9aca00"))
        .respond("eth_estimateGas", json!("0x5208"));
    let request = TransactionRequest::new(ChainFamily::Ethereum, ETH_RECIPIENT, "1");

    assert_eq!(provider.estimate_fee(&request).await.unwrap(), "0.000021");

    transport.fail("eth_gasPrice", "upstream timeout");
    assert_eq!(provider.estimate_fee(&request).await.unwrap(), "0.00042");

    // 非网络错误不降级
    let bad = TransactionRequest::new(ChainFamily::Ethereum, "0xnope", "1");
    assert!(matches!(
        provider.estimate_fee(&bad).await,
        Err(WalletError::AddressValidation(_))
    ));
}

#[tokio::test]
async fn test_ethereum_history_scan() {
    let (transport, provider) = connected_ethereum().await;
    transport.respond("eth_blockNumber", json!("0x2"));

    let ours = json!({
        "hash": "0xaaa",
        "from": ETH_TEST_ADDRESS.to_uppercase().replace("0X", "0x"),
        "to": ETH_RECIPIENT,
        "value": "0xde0b6b3a7640000",
        "gasPrice": "0x3b9aca00",
        "input": "0x",
    });
    let unrelated = json!({
        "hash": "0xbbb",
        "from": ETH_RECIPIENT,
        "to": "0x0000000000000000000000000000000000000001",
        "value": "0x1",
        "input": "0x",
    });
    transport
        .respond_once(
            "eth_getBlockByNumber",
            json!({ "timestamp": "0x6553f100", "transactions": [ours, unrelated] }),
        )
        .respond_once("eth_getBlockByNumber", json!({ "timestamp": "0x6553f0f0", "transactions": [] }))
        .respond_once("eth_getBlockByNumber", serde_json::Value::Null);
    transport.respond(
        "eth_getTransactionReceipt",
        json!({ "status": "0x1", "gasUsed": "0x5208", "effectiveGasPrice": "0x3b9aca00" }),
    );

    let history = provider.get_transaction_history(ETH_TEST_ADDRESS).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].hash, "0xaaa");
    assert_eq!(history[0].amount, "1");
    assert_eq!(history[0].status, TransactionStatus::Confirmed);
    assert_eq!(history[0].fee.as_deref(), Some("0.000021"));
    assert_eq!(history[0].timestamp.timestamp(), 0x6553f100);

    let scanned: Vec<_> = transport
        .calls_to("eth_getBlockByNumber")
        .into_iter()
        .map(|p| p[0].clone())
        .collect();
    assert_eq!(scanned, vec![json!("0x2"), json!("0x1"), json!("0x0")]);
}

#[tokio::test]
async fn test_ethereum_get_transaction() {
    let (transport, provider) = connected_ethereum().await;
    let hash = format!("0x{}", "ab".repeat(32));

    transport.respond_once("eth_getTransactionByHash", serde_json::Value::Null);
    assert!(provider.get_transaction(&hash).await.unwrap().is_none());

    transport.respond_once(
        "eth_getTransactionByHash",
        json!({
            "hash": hash,
            "from": ETH_TEST_ADDRESS,
            "to": ETH_RECIPIENT,
            "value": "0x0",
            "input": "0x6869",
            "blockNumber": null,
        }),
    );
    transport.respond("eth_getTransactionReceipt", serde_json::Value::Null);
    let tx = provider.get_transaction(&hash).await.unwrap().unwrap();
    assert_eq!(tx.status, TransactionStatus::Pending);
    assert_eq!(tx.data.as_deref(), Some("0x6869"));

    assert!(matches!(
        provider.get_transaction("0x1234").await,
        Err(WalletError::TransactionBuild(_))
    ));
}

#[tokio::test]
async fn test_ethereum_oversized_receipt_leaves_fee_unknown() {
    let (transport, provider) = connected_ethereum().await;
    let hash = format!("0x{}", "cd".repeat(32));
    let tx = json!({
        "hash": hash,
        "from": ETH_TEST_ADDRESS,
        "to": ETH_RECIPIENT,
        "value": "0xde0b6b3a7640000",
        "input": "0x",
        "blockNumber": null,
    });

    transport.respond_once("eth_getTransactionByHash", tx.clone());
    transport.respond_once(
        "eth_getTransactionReceipt",
        json!({
            "status": "0x1",
            "gasUsed": format!("0x{}", "f".repeat(32)),
            "effectiveGasPrice": "0x2",
        }),
    );
    let fetched = provider.get_transaction(&hash).await.unwrap().unwrap();
    assert_eq!(fetched.status, TransactionStatus::Confirmed);
    assert_eq!(fetched.amount, "1");
    assert!(fetched.fee.is_none());

    // 正常回执仍计算手续费
    transport.respond_once("eth_getTransactionByHash", tx);
    transport.respond_once(
        "eth_getTransactionReceipt",
        json!({ "status": "0x1", "gasUsed": "0x5208", "effectiveGasPrice": "0x3b9aca00" }),
    );
    let fetched = provider.get_transaction(&hash).await.unwrap().unwrap();
    assert_eq!(fetched.fee.as_deref(), Some("0.000021"));
}

// ============ Substrate ============

fn account_info_hex(nonce: u32, free: u128) -> String {
    let mut info = vec![0u8; 80];
    info[..4].copy_from_slice(&nonce.to_le_bytes());
    info[16..32].copy_from_slice(&free.to_le_bytes());
    format!("0x{}", hex::encode(info))
}

async fn connected_substrate() -> (Arc<MockTransport>, SubstrateProvider) {
    let transport = MockTransport::new();
    transport.respond("chain_getHeader", json!({ "number": "0x10" }));
    let provider = substrate(&transport);
    provider.connect().await.unwrap();
    (transport, provider)
}

#[tokio::test]
async fn test_substrate_balance() {
    let (transport, provider) = connected_substrate().await;
    transport.respond("state_getStorage", json!(account_info_hex(2, 12_345_000_000)));

    let balance = provider.get_balance(ALICE).await.unwrap();
    assert_eq!(balance.amount, "1.2345");
    assert_eq!(balance.denomination, "DOT");
    assert_eq!(balance.block_number, 16);

    let account = AddressValidator::substrate_account_id(ALICE).unwrap();
    assert_eq!(
        transport.calls_to("state_getStorage"),
        vec![json!([account_storage_key(&account)])]
    );

    // 账户不存在
    transport.respond("state_getStorage", serde_json::Value::Null);
    assert_eq!(provider.get_balance(ALICE).await.unwrap().amount, "0");
}

#[tokio::test]
async fn test_substrate_sign_transaction() {
    let (transport, provider) = connected_substrate().await;
    transport
        .respond("state_getRuntimeVersion", json!({ "specVersion": 1_002_000, "transactionVersion": 26 }))
        .respond("chain_getBlockHash", json!(format!("0x{}", "91".repeat(32))))
        .respond("state_getStorage", json!(account_info_hex(7, 0)));

    let key = [0x11u8; 32];
    let request = TransactionRequest::new(ChainFamily::Substrate, ALICE, "2.5");
    let signed = provider.sign_transaction(&request, &key).await.unwrap();

    let extrinsic = hex::decode(signed.signed_payload.trim_start_matches("0x")).unwrap();
    let decoded = decode_transfer(&extrinsic, 5).unwrap().unwrap();
    let signer = SigningKey::from_bytes(&key).verifying_key().to_bytes();
    assert_eq!(decoded.from, signer);
    assert_eq!(decoded.to, AddressValidator::substrate_account_id(ALICE).unwrap());
    assert_eq!(decoded.amount, 25_000_000_000);
    assert_eq!(signed.tx_hash, format!("0x{}", hex::encode(decoded.hash)));

    // nonce 查询的是签名公钥对应的账户
    assert_eq!(
        transport.calls_to("state_getStorage"),
        vec![json!([account_storage_key(&signer)])]
    );
    assert!(transport.calls_to("author_submitExtrinsic").is_empty());

    assert!(matches!(
        provider.sign_transaction(&request, &key[..16]).await,
        Err(WalletError::InvalidPrivateKey(_))
    ));
}

#[tokio::test]
async fn test_substrate_fee_estimate_and_fallback() {
    let (transport, provider) = connected_substrate().await;
    let request = TransactionRequest::new(ChainFamily::Substrate, ALICE, "1");

    transport.respond("payment_queryInfo", json!({ "weight": 1, "class": "normal", "partialFee": "154000000" }));
    assert_eq!(provider.estimate_fee(&request).await.unwrap(), "0.0154");

    transport.fail("payment_queryInfo", "method not found");
    assert_eq!(provider.estimate_fee(&request).await.unwrap(), "0.01");
}

#[tokio::test]
async fn test_substrate_history_and_lookup() {
    let (transport, provider) = connected_substrate().await;
    transport.respond("chain_getHeader", json!({ "number": "0x2" }));
    transport
        .respond("state_getRuntimeVersion", json!({ "specVersion": 1, "transactionVersion": 1 }))
        .respond("state_getStorage", json!(account_info_hex(0, 0)))
        .respond("chain_getBlockHash", json!(format!("0x{}", "22".repeat(32))));

    let request = TransactionRequest::new(ChainFamily::Substrate, ALICE, "3");
    let signed = provider.sign_transaction(&request, &[0x22u8; 32]).await.unwrap();

    transport.respond(
        "chain_getBlock",
        json!({ "block": { "extrinsics": ["0x280403000b207b3a8d8a01", signed.signed_payload] } }),
    );
    // 1_700_000_000_000 ms
    transport.respond("state_getStorage", json!("0x0068e5cf8b010000"));

    let history = provider.get_transaction_history(ALICE).await.unwrap();
    assert_eq!(history.len(), 3);
    assert!(history.iter().all(|tx| tx.hash == signed.tx_hash));
    assert_eq!(history[0].amount, "3");
    assert_eq!(history[0].timestamp.timestamp_millis(), 1_700_000_000_000);
    assert_eq!(history[0].status, TransactionStatus::Confirmed);

    let found = provider.get_transaction(&signed.tx_hash).await.unwrap().unwrap();
    assert_eq!(found.hash, signed.tx_hash);
    let missing = format!("0x{}", "00".repeat(32));
    assert!(provider.get_transaction(&missing).await.unwrap().is_none());
}

// ============ Solana ============

async fn connected_solana() -> (Arc<MockTransport>, SolanaProvider) {
    let transport = MockTransport::new();
    transport.respond("getSlot", json!(250_000_000u64));
    let provider = solana(&transport);
    provider.connect().await.unwrap();
    (transport, provider)
}

const SOL_RECIPIENT: &str = "3WrwvcsJDRqxFWwWL6n8uMDQ8PkCkBjQPkZZTRTfnxwv";

#[tokio::test]
async fn test_solana_balance() {
    let (transport, provider) = connected_solana().await;
    transport.respond(
        "getBalance",
        json!({ "context": { "slot": 250_000_010u64 }, "value": 1_500_000_000u64 }),
    );

    let balance = provider.get_balance(SOL_RECIPIENT).await.unwrap();
    assert_eq!(balance.amount, "1.5");
    assert_eq!(balance.denomination, "SOL");
    assert_eq!(balance.block_number, 250_000_010);
    assert_eq!(provider.get_block_number().await.unwrap(), 250_000_000);

    assert!(matches!(
        provider.get_balance("0x1234").await,
        Err(WalletError::AddressValidation(_))
    ));
}

#[tokio::test]
async fn test_solana_sign_and_send() {
    let (transport, provider) = connected_solana().await;
    let blockhash = bs58::encode([7u8; 32]).into_string();
    transport
        .respond("getLatestBlockhash", json!({ "context": { "slot": 1 }, "value": { "blockhash": blockhash, "lastValidBlockHeight": 10 } }))
        .respond("sendTransaction", json!("5igned"));

    let seed = [3u8; 32];
    let signing_key = SigningKey::from_bytes(&seed);
    let request = TransactionRequest::new(ChainFamily::Solana, SOL_RECIPIENT, "0.25").with_memo("gm");
    let signed = provider.sign_transaction(&request, &seed).await.unwrap();

    let wire = BASE64.decode(&signed.signed_payload).unwrap();
    assert_eq!(wire[0], 1);
    let signature = Signature::from_slice(&wire[1..65]).unwrap();
    let message = &wire[65..];
    signing_key.verifying_key().verify(message, &signature).unwrap();
    assert_eq!(signed.tx_hash, bs58::encode(&wire[1..65]).into_string());
    // 4 个账户（含 memo 程序）之后是 recent blockhash
    assert_eq!(&message[4 + 4 * 32..4 + 5 * 32], &[7u8; 32]);
    assert!(message.ends_with(b"gm"));

    let signer = Signer::new(ChainFamily::Solana, &seed).unwrap();
    let from = signer.address().to_string();
    provider.attach_signer(signer).await.unwrap();

    let tx = provider.send_transaction(&from, &request).await.unwrap();
    assert_eq!(tx.hash, "5igned");
    assert_eq!(tx.status, TransactionStatus::Pending);
    let sent = transport.calls_to("sendTransaction");
    assert_eq!(sent[0][1]["encoding"], "base64");
    assert_eq!(sent[0][1]["preflightCommitment"], "confirmed");
}

#[tokio::test]
async fn test_solana_history() {
    let (transport, provider) = connected_solana().await;
    transport.respond(
        "getSignaturesForAddress",
        json!([{ "signature": "sig1", "slot": 2 }, { "signature": "sig2", "slot": 1 }]),
    );
    transport.respond(
        "getTransaction",
        json!({
            "blockTime": 1_700_000_000,
            "meta": { "err": null, "fee": 5000 },
            "transaction": { "message": { "instructions": [
                { "program": "system", "parsed": { "type": "transfer", "info": {
                    "source": SOL_RECIPIENT, "destination": "11111111111111111111111111111112", "lamports": 2_000_000_000u64 } } }
            ] } }
        }),
    );

    let history = provider.get_transaction_history(SOL_RECIPIENT).await.unwrap();
    let hashes: Vec<_> = history.iter().map(|tx| tx.hash.as_str()).collect();
    assert_eq!(hashes, vec!["sig1", "sig2"]);
    assert_eq!(history[0].amount, "2");
    assert_eq!(history[0].fee.as_deref(), Some("0.000005"));
    assert_eq!(history[0].from, SOL_RECIPIENT);
    assert_eq!(history[0].status, TransactionStatus::Confirmed);

    assert_eq!(
        transport.calls_to("getSignaturesForAddress"),
        vec![json!([SOL_RECIPIENT, { "limit": 5 }])]
    );
    let fetch = &transport.calls_to("getTransaction")[0];
    assert_eq!(fetch[1]["encoding"], "jsonParsed");
    assert_eq!(fetch[1]["maxSupportedTransactionVersion"], 0);
}

#[tokio::test]
async fn test_solana_fee_estimate_and_fallback() {
    let (transport, provider) = connected_solana().await;
    let request = TransactionRequest::new(ChainFamily::Solana, SOL_RECIPIENT, "1");
    transport.respond(
        "getLatestBlockhash",
        json!({ "value": { "blockhash": bs58::encode([1u8; 32]).into_string() } }),
    );

    transport.respond("getFeeForMessage", json!({ "context": { "slot": 1 }, "value": 10_000 }));
    assert_eq!(provider.estimate_fee(&request).await.unwrap(), "0.00001");

    transport.respond("getFeeForMessage", json!({ "context": { "slot": 1 }, "value": null }));
    assert_eq!(provider.estimate_fee(&request).await.unwrap(), "0.000005");

    assert!(matches!(
        provider.get_transaction("not-a-signature").await,
        Err(WalletError::TransactionBuild(_))
    ));
}
