use crate::card::CardKind;
use crate::state::{DrawEffect, DrawOutcome, StartedGame};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// --- 客户端 -> 服务器 的请求 ---

/// /start-game 和 /draw-card 的请求体
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PlayerRequest {
    pub username: String,
}

// --- 服务器 -> 客户端 的响应 ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StartGameReply {
    pub message: String,
    pub username: String,
    pub deck: Vec<CardKind>,
}

impl StartGameReply {
    pub fn new(username: String, started: StartedGame) -> Self {
        let message = if started.resumed { "Resuming game" } else { "Game started" };
        StartGameReply {
            message: message.to_string(),
            username,
            deck: started.deck,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DrawCardReply {
    pub message: String,
    /// 牌面符号
    pub card: String,
    #[serde(rename = "type")]
    pub kind: CardKind,
    pub effect: DrawEffect,
    pub game_over: bool,
}

impl From<DrawOutcome> for DrawCardReply {
    fn from(outcome: DrawOutcome) -> Self {
        DrawCardReply {
            message: outcome.message,
            card: outcome.symbol.to_string(),
            kind: outcome.card,
            effect: outcome.effect,
            game_over: outcome.game_over,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LeaderboardReply {
    pub leaderboard: String,
}

/// 错误响应。空牌堆沿用 `message` 字段，其余错误使用 `error` 字段
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ErrorReply {
    Message { message: String },
    Error { error: String },
}

/// 推送通道上发送的玩家状态快照
pub type PlayersSnapshot = Vec<HashMap<String, String>>;
