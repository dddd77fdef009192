//! 钱包连接缓存
//!
//! 键为 `agent_id:wallet_id`，进程内有效，无过期、无持久化。

use std::{collections::HashMap, sync::Arc};

use tokio::sync::RwLock;

use super::providers::ChainProvider;
use crate::domain::wallet_record::connection_key;

#[derive(Clone, Default)]
pub struct ConnectionCache {
    entries: Arc<RwLock<HashMap<String, Arc<dyn ChainProvider>>>>,
}

impl ConnectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入（覆盖同键旧连接）
    pub async fn insert(&self, agent_id: &str, wallet_id: &str, provider: Arc<dyn ChainProvider>) {
        let key = connection_key(agent_id, wallet_id);
        let previous = self.entries.write().await.insert(key, provider);
        if previous.is_some() {
            tracing::debug!(agent_id = %agent_id, wallet_id = %wallet_id, "cached connection replaced");
        }
    }

    pub async fn get(&self, agent_id: &str, wallet_id: &str) -> Option<Arc<dyn ChainProvider>> {
        self.entries
            .read()
            .await
            .get(&connection_key(agent_id, wallet_id))
            .cloned()
    }

    /// 移除并返回被驱逐的连接
    pub async fn evict(&self, agent_id: &str, wallet_id: &str) -> Option<Arc<dyn ChainProvider>> {
        self.entries
            .write()
            .await
            .remove(&connection_key(agent_id, wallet_id))
    }

    /// 驱逐某个 agent 的全部连接，返回数量
    pub async fn evict_agent(&self, agent_id: &str) -> usize {
        let prefix = format!("{agent_id}:");
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(&prefix));
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
