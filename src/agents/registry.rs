//! Agent 注册表：按角色名（不区分大小写）登记
//!
//! 同名再次注册时原地替换并递增版本号，不产生重复条目；保留首次注册的顺序。

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::agents::AgentHandle;

struct Registration {
    key: String,
    handle: Arc<AgentHandle>,
    version: u32,
}

#[derive(Default)]
pub struct AgentRegistry {
    entries: RwLock<Vec<Registration>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册或更新，返回句柄与当前版本（首次为 1）
    pub async fn register(&self, handle: AgentHandle) -> (Arc<AgentHandle>, u32) {
        let key = handle.role_name().to_lowercase();
        let handle = Arc::new(handle);
        let mut entries = self.entries.write().await;
        match entries.iter_mut().find(|e| e.key == key) {
            Some(existing) => {
                existing.handle = Arc::clone(&handle);
                existing.version += 1;
                (handle, existing.version)
            }
            None => {
                entries.push(Registration {
                    key,
                    handle: Arc::clone(&handle),
                    version: 1,
                });
                (handle, 1)
            }
        }
    }

    pub async fn get(&self, name: &str) -> Option<Arc<AgentHandle>> {
        let key = name.to_lowercase();
        self.entries
            .read()
            .await
            .iter()
            .find(|e| e.key == key)
            .map(|e| Arc::clone(&e.handle))
    }

    pub async fn version(&self, name: &str) -> Option<u32> {
        let key = name.to_lowercase();
        self.entries
            .read()
            .await
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.version)
    }

    /// 已注册名称（小写，按首次注册顺序）
    pub async fn names(&self) -> Vec<String> {
        self.entries.read().await.iter().map(|e| e.key.clone()).collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
