use crate::card::{CardKind, DeckComposition};
use crate::error::GameError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// 玩家状态记录里的拆弹字段
pub const DEFUSE_FIELD: &str = "defuse";

const MAX_PLAYER_ID_LEN: usize = 64;

/// 玩家标识，即存储层的键后缀 (deck:<id> / user:<id>)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    /// 校验玩家标识，任何存储访问之前调用
    pub fn parse(raw: &str) -> Result<Self, GameError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(GameError::InvalidPlayer { reason: "玩家标识为空" });
        }
        if raw.len() > MAX_PLAYER_ID_LEN {
            return Err(GameError::InvalidPlayer { reason: "玩家标识过长" });
        }
        if raw.chars().any(char::is_control) {
            return Err(GameError::InvalidPlayer { reason: "玩家标识包含控制字符" });
        }
        // 快照按 user:* 枚举，标识里不能带通配符
        if raw.contains(['*', '?', '[', ']']) {
            return Err(GameError::InvalidPlayer { reason: "玩家标识包含通配符" });
        }
        Ok(PlayerId(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PlayerId {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PlayerId::parse(s)
    }
}

/// 抽到一张牌后产生的效果
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DrawEffect {
    /// 普通牌，从牌堆中移除
    Consumed,
    /// 拿到拆弹牌
    DefuseKept,
    /// 牌堆被重新洗成一副新牌
    Reshuffled,
    /// 用拆弹牌化解了炸弹
    Defused,
    /// 没有拆弹牌，游戏结束
    Exploded,
}

/// 一次抽牌的结果，不持久化
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DrawOutcome {
    pub card: CardKind,
    pub symbol: &'static str,
    pub message: String,
    pub effect: DrawEffect,
    pub game_over: bool,
}

impl DrawOutcome {
    pub(crate) fn new(card: CardKind, effect: DrawEffect) -> Self {
        let message = match effect {
            DrawEffect::Consumed => "You drew a Cat card! One Cat card has been removed from your deck.",
            DrawEffect::DefuseKept => "You drew a Defuse card! Keep this to defuse an Exploding Kitten.",
            DrawEffect::Reshuffled => "You drew a Shuffle card! The deck is reshuffled.",
            DrawEffect::Defused => "You defused the Exploding Kitten using your Defuse card!",
            DrawEffect::Exploded => "You drew an Exploding Kitten! You lose!",
        };
        DrawOutcome {
            card,
            symbol: card.symbol(),
            message: message.to_string(),
            effect,
            game_over: effect == DrawEffect::Exploded,
        }
    }
}

/// 开始或恢复游戏的结果
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StartedGame {
    pub deck: Vec<CardKind>,
    pub resumed: bool,
}

/// 抽到空牌堆时的处理方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyDeckPolicy {
    /// 重新初始化牌堆，本次抽牌仍然返回 EmptyDeck
    #[default]
    Reinitialize,
    /// 重新初始化牌堆后立即再抽一次
    ReinitializeAndDraw,
}

impl FromStr for EmptyDeckPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reinitialize" => Ok(EmptyDeckPolicy::Reinitialize),
            "reinitialize_and_draw" => Ok(EmptyDeckPolicy::ReinitializeAndDraw),
            other => Err(format!("未知的空牌堆策略: {other}")),
        }
    }
}

/// 核心的配置
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub composition: DeckComposition,
    /// 每次存储调用的超时
    pub store_timeout: Duration,
    pub empty_deck_policy: EmptyDeckPolicy,
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            composition: DeckComposition::default(),
            store_timeout: Duration::from_secs(2),
            empty_deck_policy: EmptyDeckPolicy::default(),
        }
    }
}
