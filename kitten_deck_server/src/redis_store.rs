use std::collections::HashMap;

use async_trait::async_trait;
use kitten_deck_core::{
    DeckStore, GameStore, PlayerId, STATUS_KEY_PREFIX, StatusStore, StoreError, deck_key, status_key,
};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tracing::info;

use crate::error::ServerError;

/// 基于 Redis 的存储：牌堆是 list，玩家状态是 hash
///
/// 多条命令需要同时生效的地方 (替换牌堆、淘汰玩家) 使用 MULTI/EXEC 管道。
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Result<Self, ServerError> {
        let client = Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        info!("已连接到 Redis");
        Ok(RedisStore { conn })
    }
}

#[async_trait]
impl DeckStore for RedisStore {
    async fn get_all(&self, player: &PlayerId) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        conn.lrange(deck_key(player), 0, -1).await.map_err(StoreError::backend)
    }

    async fn push_many(&self, player: &PlayerId, cards: &[String]) -> Result<(), StoreError> {
        if cards.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let _: i64 = conn.rpush(deck_key(player), cards).await.map_err(StoreError::backend)?;
        Ok(())
    }

    async fn remove_one(&self, player: &PlayerId, card: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.lrem(deck_key(player), 1, card).await.map_err(StoreError::backend)?;
        Ok(removed > 0)
    }

    async fn replace(&self, player: &PlayerId, cards: &[String]) -> Result<(), StoreError> {
        let key = deck_key(player);
        let mut pipe = redis::pipe();
        pipe.atomic().del(&key).ignore();
        if !cards.is_empty() {
            pipe.rpush(&key, cards).ignore();
        }
        let mut conn = self.conn.clone();
        pipe.query_async::<()>(&mut conn).await.map_err(StoreError::backend)
    }

    async fn delete_deck(&self, player: &PlayerId) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.del(deck_key(player)).await.map_err(StoreError::backend)?;
        Ok(())
    }
}

#[async_trait]
impl StatusStore for RedisStore {
    async fn get_field(&self, player: &PlayerId, field: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        conn.hget(status_key(player), field).await.map_err(StoreError::backend)
    }

    async fn set_field(&self, player: &PlayerId, field: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .hset(status_key(player), field, value)
            .await
            .map_err(StoreError::backend)?;
        Ok(())
    }

    async fn delete_status(&self, player: &PlayerId) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.del(status_key(player)).await.map_err(StoreError::backend)?;
        Ok(())
    }

    async fn all_statuses(&self) -> Result<Vec<HashMap<String, String>>, StoreError> {
        let mut conn = self.conn.clone();
        let mut keys: Vec<String> = conn
            .keys(format!("{STATUS_KEY_PREFIX}*"))
            .await
            .map_err(StoreError::backend)?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        keys.sort();

        let mut pipe = redis::pipe();
        for key in &keys {
            pipe.hgetall(key);
        }
        let statuses: Vec<HashMap<String, String>> =
            pipe.query_async(&mut conn).await.map_err(StoreError::backend)?;
        Ok(drop_vanished(statuses))
    }
}

// KEYS 与 HGETALL 之间被删除的记录会变成空表
fn drop_vanished(statuses: Vec<HashMap<String, String>>) -> Vec<HashMap<String, String>> {
    statuses.into_iter().filter(|fields| !fields.is_empty()).collect()
}

#[async_trait]
impl GameStore for RedisStore {
    async fn purge_player(&self, player: &PlayerId) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        redis::pipe()
            .atomic()
            .del(deck_key(player))
            .ignore()
            .del(status_key(player))
            .ignore()
            .query_async::<()>(&mut conn)
            .await
            .map_err(StoreError::backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    // 运行方式: REDIS_URL=redis://127.0.0.1:6379 cargo test -- --ignored
    async fn connect() -> Option<RedisStore> {
        let url = std::env::var("REDIS_URL").ok().filter(|url| !url.trim().is_empty())?;
        Some(RedisStore::connect(&url).await.unwrap())
    }

    // 每次运行用不同的玩家名，避免和库里已有的数据冲突
    fn unique_player(name: &str) -> PlayerId {
        let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        PlayerId::parse(&format!("{name}-{}-{nanos}", std::process::id())).unwrap()
    }

    fn cards(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_vanished_records_are_dropped() {
        let kept = HashMap::from([("defuse".to_string(), "1".to_string())]);
        let statuses = vec![HashMap::new(), kept.clone(), HashMap::new()];
        assert_eq!(drop_vanished(statuses), vec![kept]);
    }

    #[tokio::test]
    #[ignore = "需要 REDIS_URL 指向可用的 Redis"]
    async fn test_redis_replace_and_remove() {
        let Some(store) = connect().await else { return };
        let alice = unique_player("alice");

        store.push_many(&alice, &cards(&["Cat", "Cat", "Defuse"])).await.unwrap();
        assert!(store.remove_one(&alice, "Cat").await.unwrap());
        assert_eq!(store.get_all(&alice).await.unwrap(), cards(&["Cat", "Defuse"]));
        assert!(!store.remove_one(&alice, "Shuffle").await.unwrap());

        store.replace(&alice, &cards(&["Shuffle", "Exploding Kitten"])).await.unwrap();
        assert_eq!(store.get_all(&alice).await.unwrap(), cards(&["Shuffle", "Exploding Kitten"]));

        store.replace(&alice, &[]).await.unwrap();
        assert!(store.get_all(&alice).await.unwrap().is_empty());

        store.purge_player(&alice).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "需要 REDIS_URL 指向可用的 Redis"]
    async fn test_redis_purge_removes_both_records() {
        let Some(store) = connect().await else { return };
        let alice = unique_player("alice");
        let bob = unique_player("bob");
        store.push_many(&alice, &cards(&["Cat"])).await.unwrap();
        store.set_field(&alice, "defuse", "1").await.unwrap();
        store.push_many(&bob, &cards(&["Defuse"])).await.unwrap();

        store.purge_player(&alice).await.unwrap();

        assert!(store.get_all(&alice).await.unwrap().is_empty());
        assert_eq!(store.get_field(&alice, "defuse").await.unwrap(), None);
        assert_eq!(store.get_all(&bob).await.unwrap(), cards(&["Defuse"]));

        store.purge_player(&bob).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "需要 REDIS_URL 指向可用的 Redis"]
    async fn test_redis_all_statuses_lists_live_records() {
        let Some(store) = connect().await else { return };
        let alice = unique_player("alice");
        let marker = alice.to_string();
        store.set_field(&alice, "defuse", "0").await.unwrap();
        store.set_field(&alice, "marker", &marker).await.unwrap();

        let is_alice = |fields: &HashMap<String, String>| fields.get("marker") == Some(&marker);
        let statuses = store.all_statuses().await.unwrap();
        assert!(statuses.iter().any(is_alice));
        assert!(statuses.iter().all(|fields| !fields.is_empty()));

        store.delete_status(&alice).await.unwrap();
        let statuses = store.all_statuses().await.unwrap();
        assert!(!statuses.iter().any(is_alice));
        assert!(statuses.iter().all(|fields| !fields.is_empty()));
    }
}
