//! 存储层契约
//!
//! 核心只依赖两个按玩家分键的抽象：
//! - 牌堆 `deck:<player>`：有序列表，按多重集合使用
//! - 玩家状态 `user:<player>`：字段表
//!
//! 真正的存储引擎 (Redis 等) 在外部实现这些 trait。
//! 这里附带一个进程内实现 [`MemoryStore`]，用于测试和单机运行。

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{GameError, StoreError};
use crate::state::PlayerId;

pub const DECK_KEY_PREFIX: &str = "deck:";
pub const STATUS_KEY_PREFIX: &str = "user:";

pub fn deck_key(player: &PlayerId) -> String {
    format!("{DECK_KEY_PREFIX}{player}")
}

pub fn status_key(player: &PlayerId) -> String {
    format!("{STATUS_KEY_PREFIX}{player}")
}

/// 牌堆存储
#[async_trait]
pub trait DeckStore: Send + Sync {
    /// 读取整个牌堆，不存在时返回空列表
    async fn get_all(&self, player: &PlayerId) -> Result<Vec<String>, StoreError>;

    /// 一次性追加多张牌
    async fn push_many(&self, player: &PlayerId, cards: &[String]) -> Result<(), StoreError>;

    /// 移除一张值为 `card` 的牌，返回是否真的移除了
    async fn remove_one(&self, player: &PlayerId, card: &str) -> Result<bool, StoreError>;

    /// 原子地用 `cards` 替换整个牌堆
    async fn replace(&self, player: &PlayerId, cards: &[String]) -> Result<(), StoreError>;

    /// 只删除牌堆。游戏逻辑淘汰玩家时走 `purge_player`，这里留给运维脚本等外部调用方
    async fn delete_deck(&self, player: &PlayerId) -> Result<(), StoreError>;
}

/// 玩家状态存储
#[async_trait]
pub trait StatusStore: Send + Sync {
    async fn get_field(&self, player: &PlayerId, field: &str) -> Result<Option<String>, StoreError>;

    async fn set_field(&self, player: &PlayerId, field: &str, value: &str) -> Result<(), StoreError>;

    /// 只删除状态记录，同样供外部调用方使用
    async fn delete_status(&self, player: &PlayerId) -> Result<(), StoreError>;

    /// 枚举所有 `user:*` 记录
    async fn all_statuses(&self) -> Result<Vec<HashMap<String, String>>, StoreError>;
}

/// 完整的存储后端
#[async_trait]
pub trait GameStore: DeckStore + StatusStore {
    /// 原子地删除玩家的牌堆和状态 (淘汰)
    async fn purge_player(&self, player: &PlayerId) -> Result<(), StoreError>;
}

/// 给一次存储调用加上超时，并把错误转换为 StoreUnavailable
pub(crate) async fn with_deadline<T, F>(op: &'static str, timeout: Duration, fut: F) -> Result<T, GameError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(res) => res.map_err(GameError::store(op)),
        Err(_) => Err(GameError::StoreUnavailable {
            op,
            source: StoreError::Timeout { op, timeout },
        }),
    }
}

// --- 进程内实现 ---

#[derive(Debug, Default)]
struct MemoryData {
    lists: HashMap<String, Vec<String>>,
    hashes: HashMap<String, HashMap<String, String>>,
}

/// 进程内的存储实现，语义与 Redis 的 list / hash 一致：
/// 空列表、空字段表等同于键不存在
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<MemoryData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeckStore for MemoryStore {
    async fn get_all(&self, player: &PlayerId) -> Result<Vec<String>, StoreError> {
        Ok(self.data.lock().lists.get(&deck_key(player)).cloned().unwrap_or_default())
    }

    async fn push_many(&self, player: &PlayerId, cards: &[String]) -> Result<(), StoreError> {
        if cards.is_empty() {
            return Ok(());
        }
        self.data
            .lock()
            .lists
            .entry(deck_key(player))
            .or_default()
            .extend_from_slice(cards);
        Ok(())
    }

    async fn remove_one(&self, player: &PlayerId, card: &str) -> Result<bool, StoreError> {
        let mut data = self.data.lock();
        let key = deck_key(player);
        let Some(list) = data.lists.get_mut(&key) else {
            return Ok(false);
        };
        let Some(pos) = list.iter().position(|c| c == card) else {
            return Ok(false);
        };
        list.remove(pos);
        if list.is_empty() {
            data.lists.remove(&key);
        }
        Ok(true)
    }

    async fn replace(&self, player: &PlayerId, cards: &[String]) -> Result<(), StoreError> {
        let mut data = self.data.lock();
        if cards.is_empty() {
            data.lists.remove(&deck_key(player));
        } else {
            data.lists.insert(deck_key(player), cards.to_vec());
        }
        Ok(())
    }

    async fn delete_deck(&self, player: &PlayerId) -> Result<(), StoreError> {
        self.data.lock().lists.remove(&deck_key(player));
        Ok(())
    }
}

#[async_trait]
impl StatusStore for MemoryStore {
    async fn get_field(&self, player: &PlayerId, field: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .data
            .lock()
            .hashes
            .get(&status_key(player))
            .and_then(|fields| fields.get(field).cloned()))
    }

    async fn set_field(&self, player: &PlayerId, field: &str, value: &str) -> Result<(), StoreError> {
        self.data
            .lock()
            .hashes
            .entry(status_key(player))
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn delete_status(&self, player: &PlayerId) -> Result<(), StoreError> {
        self.data.lock().hashes.remove(&status_key(player));
        Ok(())
    }

    async fn all_statuses(&self) -> Result<Vec<HashMap<String, String>>, StoreError> {
        let data = self.data.lock();
        let mut keys: Vec<&String> = data
            .hashes
            .keys()
            .filter(|key| key.starts_with(STATUS_KEY_PREFIX))
            .collect();
        keys.sort();
        Ok(keys.into_iter().map(|key| data.hashes[key].clone()).collect())
    }
}

#[async_trait]
impl GameStore for MemoryStore {
    async fn purge_player(&self, player: &PlayerId) -> Result<(), StoreError> {
        // 同一把锁下删除两个键，读者看不到只删了一半的状态
        let mut data = self.data.lock();
        data.lists.remove(&deck_key(player));
        data.hashes.remove(&status_key(player));
        Ok(())
    }
}

/// 测试用的存储包装：可以让指定操作失败或变慢
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashSet;
    use std::io;

    #[derive(Default)]
    pub(crate) struct FlakyStore {
        pub(crate) inner: MemoryStore,
        failing: Mutex<HashSet<&'static str>>,
        delay: Mutex<Option<Duration>>,
        // remove_one 在真正删除之前先被“别人”抢走
        steal_on_remove: Mutex<bool>,
    }

    impl FlakyStore {
        pub(crate) fn fail(&self, op: &'static str) {
            self.failing.lock().insert(op);
        }

        pub(crate) fn heal(&self) {
            self.failing.lock().clear();
        }

        pub(crate) fn slow_down(&self, delay: Duration) {
            *self.delay.lock() = Some(delay);
        }

        pub(crate) fn steal_next_remove(&self) {
            *self.steal_on_remove.lock() = true;
        }

        async fn check(&self, op: &'static str) -> Result<(), StoreError> {
            let delay = *self.delay.lock();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if self.failing.lock().contains(op) {
                return Err(StoreError::backend(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    format!("injected failure: {op}"),
                )));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl DeckStore for FlakyStore {
        async fn get_all(&self, player: &PlayerId) -> Result<Vec<String>, StoreError> {
            self.check("get_all").await?;
            self.inner.get_all(player).await
        }

        async fn push_many(&self, player: &PlayerId, cards: &[String]) -> Result<(), StoreError> {
            self.check("push_many").await?;
            self.inner.push_many(player, cards).await
        }

        async fn remove_one(&self, player: &PlayerId, card: &str) -> Result<bool, StoreError> {
            self.check("remove_one").await?;
            let steal = std::mem::take(&mut *self.steal_on_remove.lock());
            if steal {
                self.inner.remove_one(player, card).await?;
            }
            self.inner.remove_one(player, card).await
        }

        async fn replace(&self, player: &PlayerId, cards: &[String]) -> Result<(), StoreError> {
            self.check("replace").await?;
            self.inner.replace(player, cards).await
        }

        async fn delete_deck(&self, player: &PlayerId) -> Result<(), StoreError> {
            self.check("delete_deck").await?;
            self.inner.delete_deck(player).await
        }
    }

    #[async_trait]
    impl StatusStore for FlakyStore {
        async fn get_field(&self, player: &PlayerId, field: &str) -> Result<Option<String>, StoreError> {
            self.check("get_field").await?;
            self.inner.get_field(player, field).await
        }

        async fn set_field(&self, player: &PlayerId, field: &str, value: &str) -> Result<(), StoreError> {
            self.check("set_field").await?;
            self.inner.set_field(player, field, value).await
        }

        async fn delete_status(&self, player: &PlayerId) -> Result<(), StoreError> {
            self.check("delete_status").await?;
            self.inner.delete_status(player).await
        }

        async fn all_statuses(&self) -> Result<Vec<HashMap<String, String>>, StoreError> {
            self.check("all_statuses").await?;
            self.inner.all_statuses().await
        }
    }

    #[async_trait]
    impl GameStore for FlakyStore {
        async fn purge_player(&self, player: &PlayerId) -> Result<(), StoreError> {
            self.check("purge_player").await?;
            self.inner.purge_player(player).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: &str) -> PlayerId {
        PlayerId::parse(id).unwrap()
    }

    fn cards(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_remove_one_removes_single_instance() {
        let store = MemoryStore::new();
        let alice = player("alice");
        store.push_many(&alice, &cards(&["Cat", "Defuse", "Cat"])).await.unwrap();

        assert!(store.remove_one(&alice, "Cat").await.unwrap());
        assert_eq!(store.get_all(&alice).await.unwrap(), cards(&["Defuse", "Cat"]));
        assert!(!store.remove_one(&alice, "Shuffle").await.unwrap());
        assert!(!store.remove_one(&player("nobody"), "Cat").await.unwrap());
    }

    #[tokio::test]
    async fn test_replace_overwrites() {
        let store = MemoryStore::new();
        let alice = player("alice");
        store.push_many(&alice, &cards(&["Cat", "Cat"])).await.unwrap();
        store.replace(&alice, &cards(&["Shuffle"])).await.unwrap();
        assert_eq!(store.get_all(&alice).await.unwrap(), cards(&["Shuffle"]));
    }

    #[tokio::test]
    async fn test_purge_removes_both_records() {
        let store = MemoryStore::new();
        let alice = player("alice");
        let bob = player("bob");
        store.push_many(&alice, &cards(&["Cat"])).await.unwrap();
        store.set_field(&alice, "defuse", "1").await.unwrap();
        store.set_field(&bob, "defuse", "0").await.unwrap();

        store.purge_player(&alice).await.unwrap();

        assert!(store.get_all(&alice).await.unwrap().is_empty());
        assert_eq!(store.get_field(&alice, "defuse").await.unwrap(), None);
        assert_eq!(store.all_statuses().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_deck_and_status_are_independent() {
        let store = MemoryStore::new();
        let alice = player("alice");
        let bob = player("bob");
        store.push_many(&alice, &cards(&["Cat", "Defuse"])).await.unwrap();
        store.set_field(&alice, "defuse", "1").await.unwrap();
        store.push_many(&bob, &cards(&["Cat"])).await.unwrap();

        store.delete_deck(&alice).await.unwrap();
        assert!(store.get_all(&alice).await.unwrap().is_empty());
        assert_eq!(store.get_field(&alice, "defuse").await.unwrap().as_deref(), Some("1"));

        store.delete_status(&alice).await.unwrap();
        assert_eq!(store.get_field(&alice, "defuse").await.unwrap(), None);
        assert!(store.all_statuses().await.unwrap().is_empty());

        // 删除不存在的记录不算错误，也不影响其他玩家
        store.delete_deck(&alice).await.unwrap();
        store.delete_status(&alice).await.unwrap();
        assert_eq!(store.get_all(&bob).await.unwrap(), cards(&["Cat"]));
    }

    #[tokio::test]
    async fn test_deadline_maps_timeout() {
        let res: Result<(), GameError> = with_deadline("slow", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(
            res,
            Err(GameError::StoreUnavailable { op: "slow", source: StoreError::Timeout { .. } })
        ));
    }
}
