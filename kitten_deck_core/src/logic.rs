use rand::Rng;
use tracing::{info, warn};

use crate::card::CardKind;
use crate::error::GameError;
use crate::lifecycle::DeckLifecycle;
use crate::state::*;
use crate::store::with_deadline;

// --- 抽牌状态机 ---

/// 抽牌结算器
///
/// 对同一玩家，整个 “读牌堆 → 随机选牌 → 移除 → 结算效果” 过程都在该玩家的锁内完成。
/// 存储是唯一的事实来源，这里不缓存任何牌堆内容。
#[derive(Clone)]
pub struct DrawResolver {
    lifecycle: DeckLifecycle,
}

impl DrawResolver {
    pub fn new(lifecycle: DeckLifecycle) -> Self {
        DrawResolver { lifecycle }
    }

    /// 为玩家抽一张牌并结算其效果
    ///
    /// - 牌堆为空或不存在：重新初始化一副新牌，并返回 `EmptyDeck`
    ///   (策略为 `ReinitializeAndDraw` 时直接在新牌堆上抽牌)
    /// - 否则从剩余的牌中均匀随机选一张，移除一张同种类的牌，再结算效果
    ///
    /// 任何影响结果的写操作失败，整个抽牌都报告失败。
    pub async fn draw(&self, player: &PlayerId) -> Result<DrawOutcome, GameError> {
        let _guard = self.lifecycle.locks().acquire(player).await;

        let mut deck = self.lifecycle.load(player).await?;
        if deck.is_empty() {
            self.lifecycle.reset_locked(player).await?;
            info!("玩家 {} 的牌堆已空，已重新初始化", player);
            if self.lifecycle.config().empty_deck_policy == EmptyDeckPolicy::Reinitialize {
                return Err(GameError::EmptyDeck { player: player.to_string() });
            }
            deck = self.lifecycle.load(player).await?;
            if deck.is_empty() {
                return Err(GameError::EmptyDeck { player: player.to_string() });
            }
        }

        let card = {
            let mut rng = self.lifecycle.rng().lock();
            deck[rng.random_range(0..deck.len())]
        };
        info!("玩家 {} 抽到了 {}", player, card);

        let removed = with_deadline(
            "remove_one",
            self.lifecycle.config().store_timeout,
            self.lifecycle.store().remove_one(player, card.name()),
        )
        .await?;
        if !removed {
            // 读牌堆之后这张牌已被别的进程拿走
            warn!("玩家 {} 的 {} 已被并发请求移除", player, card);
            return Err(GameError::DrawConflict { player: player.to_string() });
        }

        let effect = self.apply_effect(player, card).await?;
        Ok(DrawOutcome::new(card, effect))
    }

    async fn apply_effect(&self, player: &PlayerId, card: CardKind) -> Result<DrawEffect, GameError> {
        let store = self.lifecycle.store();
        let timeout = self.lifecycle.config().store_timeout;

        match card {
            CardKind::Cat => Ok(DrawEffect::Consumed),
            CardKind::Defuse => {
                // 拆弹牌不叠加，最多持有 1 张
                with_deadline("set_field", timeout, store.set_field(player, DEFUSE_FIELD, "1")).await?;
                Ok(DrawEffect::DefuseKept)
            }
            CardKind::Shuffle => {
                self.lifecycle.reset_locked(player).await?;
                Ok(DrawEffect::Reshuffled)
            }
            CardKind::ExplodingKitten => {
                let raw = with_deadline("get_field", timeout, store.get_field(player, DEFUSE_FIELD)).await?;
                if defuse_count(raw.as_deref())? > 0 {
                    with_deadline("set_field", timeout, store.set_field(player, DEFUSE_FIELD, "0")).await?;
                    info!("玩家 {} 用拆弹牌化解了炸弹", player);
                    return Ok(DrawEffect::Defused);
                }

                with_deadline("purge_player", timeout, store.purge_player(player)).await?;
                info!("玩家 {} 抽到炸弹且没有拆弹牌，游戏结束", player);
                Ok(DrawEffect::Exploded)
            }
        }
    }
}

fn defuse_count(raw: Option<&str>) -> Result<u32, GameError> {
    match raw {
        None => Ok(0),
        Some(value) => value.trim().parse().map_err(|_| GameError::CorruptRecord {
            detail: format!("{DEFUSE_FIELD} 字段不是非负整数: {value:?}"),
        }),
    }
}
