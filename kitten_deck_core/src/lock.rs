use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::state::PlayerId;

type LockTable = DashMap<PlayerId, Arc<Mutex<()>>>;

/// 按玩家划分的互斥锁表
///
/// 同一玩家的 “读牌堆 → 选牌 → 移除 → 结算效果” 必须串行执行，
/// 不同玩家之间互不影响。没有任何持有者或等待者时，表项会被移除。
#[derive(Debug, Default)]
pub struct PlayerLocks {
    locks: Arc<LockTable>,
}

impl PlayerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取玩家的锁，持有期间同一玩家的其他操作会等待
    pub async fn acquire(&self, player: &PlayerId) -> PlayerGuard {
        // 先克隆出 Arc 再 await，避免持有 DashMap 分片锁
        let lock = self.locks.entry(player.clone()).or_default().clone();
        // 等待期间被取消时，由 slot 负责清理表项
        let slot = LockSlot { lock: Some(lock.clone()), player: player.clone(), locks: self.locks.clone() };
        let guard = lock.lock_owned().await;
        PlayerGuard { _guard: guard, _slot: slot }
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// 玩家锁的持有凭证，释放时顺带清理空闲表项
#[must_use]
#[derive(Debug)]
pub struct PlayerGuard {
    // 字段按声明顺序析构：先解锁，再检查表项
    _guard: OwnedMutexGuard<()>,
    _slot: LockSlot,
}

#[derive(Debug)]
struct LockSlot {
    lock: Option<Arc<Mutex<()>>>,
    player: PlayerId,
    locks: Arc<LockTable>,
}

impl Drop for LockSlot {
    fn drop(&mut self) {
        drop(self.lock.take());
        // 引用只剩表本身时说明没有持有者和等待者。
        // 新请求克隆 Arc 与这里的检查都在同一分片锁下进行，不会误删
        self.locks.remove_if(&self.player, |_, lock| Arc::strong_count(lock) == 1);
    }
}
