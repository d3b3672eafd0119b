use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::GameError;
use crate::store::{GameStore, with_deadline};

/// 只读的玩家状态快照，供推送通道使用
///
/// 不获取任何玩家锁，失败也不会影响牌堆和抽牌。
#[derive(Clone)]
pub struct SessionQuery {
    store: Arc<dyn GameStore>,
    timeout: Duration,
}

impl SessionQuery {
    pub fn new(store: Arc<dyn GameStore>, timeout: Duration) -> Self {
        SessionQuery { store, timeout }
    }

    pub async fn snapshot(&self) -> Result<Vec<HashMap<String, String>>, GameError> {
        let players = with_deadline("all_statuses", self.timeout, self.store.all_statuses()).await?;
        debug!("快照包含 {} 条玩家状态", players.len());
        Ok(players)
    }
}
