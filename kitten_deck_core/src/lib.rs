//! # 炸弹猫牌堆核心逻辑库
//!
//! 这个 `core` crate 包含了每个玩家牌堆的状态管理：
//! 牌堆的新建与恢复、抽牌状态机、拆弹/炸弹/洗牌效果的结算，
//! 以及玩家状态快照。持久化通过 [`GameStore`] 注入，
//! 与具体的网络服务器、存储引擎解耦。

mod card;
mod error;
mod lifecycle;
mod lock;
mod logic;
mod message;
mod session;
mod state;
mod store;

pub use card::*;

pub use error::*;

pub use lifecycle::{DeckLifecycle, SharedRng, os_rng, seeded_rng};

pub use lock::{PlayerGuard, PlayerLocks};

pub use logic::DrawResolver;

pub use message::*;

pub use session::SessionQuery;

pub use state::*;

pub use store::*;

use std::collections::HashMap;
use std::sync::Arc;

/// 对外的服务入口，把三个组件绑在同一个存储和同一张锁表上
#[derive(Clone)]
pub struct DeckService {
    lifecycle: DeckLifecycle,
    resolver: DrawResolver,
    session: SessionQuery,
}

impl DeckService {
    pub fn new(store: Arc<dyn GameStore>, config: GameConfig) -> Self {
        Self::with_rng(store, config, os_rng())
    }

    pub fn with_rng(store: Arc<dyn GameStore>, config: GameConfig, rng: SharedRng) -> Self {
        let session = SessionQuery::new(store.clone(), config.store_timeout);
        let lifecycle = DeckLifecycle::new(store, Arc::new(PlayerLocks::new()), rng, config);
        let resolver = DrawResolver::new(lifecycle.clone());
        DeckService { lifecycle, resolver, session }
    }

    pub async fn start_or_resume(&self, player: &str) -> Result<StartedGame, GameError> {
        let player = PlayerId::parse(player)?;
        self.lifecycle.start_or_resume(&player).await
    }

    pub async fn draw(&self, player: &str) -> Result<DrawOutcome, GameError> {
        let player = PlayerId::parse(player)?;
        self.resolver.draw(&player).await
    }

    pub async fn reset(&self, player: &str) -> Result<Vec<CardKind>, GameError> {
        let player = PlayerId::parse(player)?;
        self.lifecycle.reset(&player).await
    }

    pub async fn has_active_game(&self, player: &str) -> Result<bool, GameError> {
        let player = PlayerId::parse(player)?;
        self.lifecycle.has_active_game(&player).await
    }

    pub async fn snapshot(&self) -> Result<Vec<HashMap<String, String>>, GameError> {
        self.session.snapshot().await
    }
}
