//! JSON-RPC 2.0 传输层
//!
//! Provider 只依赖 `RpcTransport`，生产环境使用基于 reqwest 的 HTTP 实现。

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Result, WalletError};

/// JSON-RPC 传输
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// 发送请求并返回 `result` 字段；`error` 对象转换为 `Network` 错误
    async fn request(&self, method: &str, params: Value) -> Result<Value>;

    /// 端点描述（用于日志）
    fn endpoint(&self) -> &str;
}

/// HTTP JSON-RPC 客户端
pub struct HttpRpcTransport {
    http_client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl HttpRpcTransport {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            http_client,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }
}

/// 从 JSON-RPC 响应体中取出 `result`
pub fn extract_result(method: &str, mut body: Value) -> Result<Value> {
    if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown RPC error");
        let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(-1);
        return Err(WalletError::network(format!(
            "{method}: RPC error {code}: {message}"
        )));
    }

    match body.get_mut("result") {
        Some(result) => Ok(result.take()),
        None => Err(WalletError::network(format!(
            "{method}: missing result field in RPC response"
        ))),
    }
}

#[async_trait]
impl RpcTransport for HttpRpcTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id
        });

        tracing::trace!(endpoint = %self.url, method, id, "rpc request");

        let response = self
            .http_client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(WalletError::network(format!(
                "{method}: HTTP {status}: {body}"
            )));
        }

        let json: Value = serde_json::from_str(&body)
            .map_err(|e| WalletError::network(format!("{method}: invalid JSON response: {e}")))?;

        extract_result(method, json)
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}
