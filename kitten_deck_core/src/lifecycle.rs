use std::sync::Arc;

use parking_lot::Mutex;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info};

use crate::card::{CardKind, deck_names, parse_deck};
use crate::error::GameError;
use crate::lock::PlayerLocks;
use crate::state::{GameConfig, PlayerId, StartedGame};
use crate::store::{GameStore, with_deadline};

/// 进程内唯一的随机源
pub type SharedRng = Arc<Mutex<StdRng>>;

pub fn os_rng() -> SharedRng {
    Arc::new(Mutex::new(StdRng::from_os_rng()))
}

pub fn seeded_rng(seed: u64) -> SharedRng {
    Arc::new(Mutex::new(StdRng::seed_from_u64(seed)))
}

/// 牌堆生命周期：新建、恢复、重置
#[derive(Clone)]
pub struct DeckLifecycle {
    store: Arc<dyn GameStore>,
    locks: Arc<PlayerLocks>,
    rng: SharedRng,
    config: GameConfig,
}

impl DeckLifecycle {
    pub fn new(store: Arc<dyn GameStore>, locks: Arc<PlayerLocks>, rng: SharedRng, config: GameConfig) -> Self {
        DeckLifecycle { store, locks, rng, config }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// 已有非空牌堆则原样返回 (恢复)，否则洗一副新牌并持久化
    pub async fn start_or_resume(&self, player: &PlayerId) -> Result<StartedGame, GameError> {
        let _guard = self.locks.acquire(player).await;

        let existing = self.load(player).await?;
        if !existing.is_empty() {
            info!("玩家 {} 恢复游戏，剩余 {} 张牌", player, existing.len());
            return Ok(StartedGame { deck: existing, resumed: true });
        }

        let fresh = self.shuffle_new();
        with_deadline(
            "push_many",
            self.config.store_timeout,
            self.store.push_many(player, &deck_names(&fresh)),
        )
        .await?;
        // 以存储中的内容为准
        let deck = self.load(player).await?;
        info!("玩家 {} 开始新游戏", player);
        Ok(StartedGame { deck, resumed: false })
    }

    /// 丢弃现有牌堆，原子地换成一副新洗的牌
    pub async fn reset(&self, player: &PlayerId) -> Result<Vec<CardKind>, GameError> {
        let _guard = self.locks.acquire(player).await;
        self.reset_locked(player).await
    }

    pub async fn has_active_game(&self, player: &PlayerId) -> Result<bool, GameError> {
        Ok(!self.load(player).await?.is_empty())
    }

    /// 调用方必须已经持有该玩家的锁
    pub(crate) async fn reset_locked(&self, player: &PlayerId) -> Result<Vec<CardKind>, GameError> {
        let fresh = self.shuffle_new();
        with_deadline(
            "replace",
            self.config.store_timeout,
            self.store.replace(player, &deck_names(&fresh)),
        )
        .await?;
        debug!("玩家 {} 的牌堆已重置: {:?}", player, fresh);
        Ok(fresh)
    }

    pub(crate) async fn load(&self, player: &PlayerId) -> Result<Vec<CardKind>, GameError> {
        let raw = with_deadline("get_all", self.config.store_timeout, self.store.get_all(player)).await?;
        parse_deck(&raw)
    }

    pub(crate) fn store(&self) -> &Arc<dyn GameStore> {
        &self.store
    }

    pub(crate) fn locks(&self) -> &Arc<PlayerLocks> {
        &self.locks
    }

    pub(crate) fn rng(&self) -> &SharedRng {
        &self.rng
    }

    fn shuffle_new(&self) -> Vec<CardKind> {
        let mut rng = self.rng.lock();
        self.config.composition.shuffled(&mut *rng)
    }
}
