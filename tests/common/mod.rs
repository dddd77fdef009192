//! 测试辅助模块
//! 脚本化 JSON-RPC 传输与临时钱包库

#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, Once},
};

use agentwallet::{
    config::{NetworksConfig, WalletConfig},
    domain::ChainFamily,
    error::{Result, WalletError},
    infrastructure::{init_default_logging, rpc::RpcTransport},
    service::{providers::TransportFactory, WalletManager},
};
use async_trait::async_trait;
use serde_json::Value;
use tempfile::TempDir;

pub const TEST_MNEMONIC: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
pub const ETH_TEST_KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
pub const ETH_TEST_ADDRESS: &str = "0x4b321da4a45f0c8452b4cd8ac621f15663689b06";

#[derive(Clone)]
enum Scripted {
    Ok(Value),
    Fail(String),
}

/// 按方法名返回预置结果的传输层，记录全部调用
#[derive(Default)]
pub struct MockTransport {
    once: Mutex<HashMap<String, VecDeque<Scripted>>>,
    sticky: Mutex<HashMap<String, Scripted>>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 每次调用都返回该结果
    pub fn respond(&self, method: &str, result: Value) -> &Self {
        self.sticky
            .lock()
            .unwrap()
            .insert(method.to_string(), Scripted::Ok(result));
        self
    }

    /// 只返回一次，优先于 `respond`
    pub fn respond_once(&self, method: &str, result: Value) -> &Self {
        self.once
            .lock()
            .unwrap()
            .entry(method.to_string())
            .or_default()
            .push_back(Scripted::Ok(result));
        self
    }

    /// 该方法始终返回网络错误
    pub fn fail(&self, method: &str, message: &str) -> &Self {
        self.sticky
            .lock()
            .unwrap()
            .insert(method.to_string(), Scripted::Fail(message.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, method: &str) -> Vec<Value> {
        self.calls()
            .into_iter()
            .filter(|(m, _)| m == method)
            .map(|(_, params)| params)
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl RpcTransport for MockTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        self.calls
            .lock()
            .unwrap()
            .push((method.to_string(), params));

        let once = self
            .once
            .lock()
            .unwrap()
            .get_mut(method)
            .and_then(VecDeque::pop_front);
        let scripted = once.or_else(|| self.sticky.lock().unwrap().get(method).cloned());

        match scripted {
            Some(Scripted::Ok(value)) => Ok(value),
            Some(Scripted::Fail(message)) => Err(WalletError::network(format!("{method}: {message}"))),
            None => Err(WalletError::network(format!("no scripted response for {method}"))),
        }
    }

    fn endpoint(&self) -> &str {
        "mock://rpc"
    }
}

/// 所有链族共用同一个 MockTransport
pub struct MockTransportFactory {
    pub transport: Arc<MockTransport>,
}

impl TransportFactory for MockTransportFactory {
    fn create(
        &self,
        _family: ChainFamily,
        _networks: &NetworksConfig,
    ) -> Result<Arc<dyn RpcTransport>> {
        Ok(self.transport.clone())
    }
}

static LOGGING: Once = Once::new();

/// 每个测试二进制只初始化一次日志
pub fn init_test_logging() {
    LOGGING.call_once(init_default_logging);
}

/// 指向临时目录的管理器（目录随 TempDir 一起删除）
pub fn temp_manager() -> (TempDir, WalletManager) {
    init_test_logging();
    let dir = TempDir::new().expect("create temp dir");
    let manager = WalletManager::new(WalletConfig::default().with_base_dir(dir.path()));
    (dir, manager)
}

/// 带脚本化传输的临时管理器
pub fn temp_manager_with_mock() -> (TempDir, WalletManager, Arc<MockTransport>) {
    let (dir, manager) = temp_manager();
    let transport = MockTransport::new();
    let manager = manager.with_transport_factory(Arc::new(MockTransportFactory {
        transport: transport.clone(),
    }));
    (dir, manager, transport)
}

/// 预置 Ethereum 主网连接探测
pub fn script_ethereum_connect(transport: &MockTransport) {
    transport
        .respond("eth_chainId", Value::String("0x1".into()))
        .respond("eth_blockNumber", Value::String("0x112a880".into()));
}
