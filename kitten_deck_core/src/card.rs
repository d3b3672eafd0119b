use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::GameError;

// --- 核心数据结构定义 ---

/// 牌的种类 (CardKind)
/// 存储层里保存的是种类名称字符串，例如 "Exploding Kitten"
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum CardKind {
    #[serde(rename = "Cat")]
    Cat, // 普通牌，抽到即消耗
    #[serde(rename = "Defuse")]
    Defuse, // 拆弹牌
    #[serde(rename = "Shuffle")]
    Shuffle, // 洗牌牌，重置整副牌
    #[serde(rename = "Exploding Kitten")]
    ExplodingKitten, // 炸弹
}

/// 牌目录中的一项 (Card)
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize)]
pub struct Card {
    pub kind: CardKind,
    pub symbol: &'static str,
}

/// 静态牌目录，不属于游戏状态
pub const CATALOG: [Card; 4] = [
    Card { kind: CardKind::Cat, symbol: "😼" },
    Card { kind: CardKind::Defuse, symbol: "🙅‍♂️" },
    Card { kind: CardKind::Shuffle, symbol: "🔀" },
    Card { kind: CardKind::ExplodingKitten, symbol: "💣" },
];

impl CardKind {
    pub const ALL: [CardKind; 4] = [
        CardKind::Cat,
        CardKind::Defuse,
        CardKind::Shuffle,
        CardKind::ExplodingKitten,
    ];

    /// 存储层使用的标识
    pub fn name(self) -> &'static str {
        match self {
            CardKind::Cat => "Cat",
            CardKind::Defuse => "Defuse",
            CardKind::Shuffle => "Shuffle",
            CardKind::ExplodingKitten => "Exploding Kitten",
        }
    }

    pub fn card(self) -> Card {
        // CATALOG 与 ALL 顺序一致
        CATALOG[self as usize]
    }

    pub fn symbol(self) -> &'static str {
        self.card().symbol
    }
}

impl fmt::Display for CardKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.symbol, self.kind)
    }
}

impl FromStr for CardKind {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CardKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| GameError::CorruptRecord {
                detail: format!("牌目录中不存在的牌: {s:?}"),
            })
    }
}

// --- 牌组构成 ---

/// 一副新牌的构成 (每种牌的张数)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckComposition {
    pub cats: usize,
    pub defuses: usize,
    pub shuffles: usize,
    pub bombs: usize,
}

impl Default for DeckComposition {
    /// 默认 5 张：2 Cat, 1 Defuse, 1 Shuffle, 1 Exploding Kitten
    fn default() -> Self {
        DeckComposition { cats: 2, defuses: 1, shuffles: 1, bombs: 1 }
    }
}

impl DeckComposition {
    pub fn size(&self) -> usize {
        self.cats + self.defuses + self.shuffles + self.bombs
    }

    /// 未洗牌的牌组，按目录顺序排列
    pub fn cards(&self) -> Vec<CardKind> {
        let mut deck = Vec::with_capacity(self.size());
        for (kind, count) in [
            (CardKind::Cat, self.cats),
            (CardKind::Defuse, self.defuses),
            (CardKind::Shuffle, self.shuffles),
            (CardKind::ExplodingKitten, self.bombs),
        ] {
            deck.extend(std::iter::repeat_n(kind, count));
        }
        deck
    }

    /// 生成一副均匀随机排列的新牌
    pub fn shuffled<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<CardKind> {
        let mut deck = self.cards();
        deck.shuffle(rng);
        deck
    }
}

/// 把存储层的字符串牌组解析为 CardKind
pub fn parse_deck(raw: &[String]) -> Result<Vec<CardKind>, GameError> {
    raw.iter().map(|s| s.parse()).collect()
}

pub fn deck_names(deck: &[CardKind]) -> Vec<String> {
    deck.iter().map(|kind| kind.name().to_string()).collect()
}

/// 按种类排序后的牌组，便于比较多重集合
pub fn sorted(deck: &[CardKind]) -> Vec<CardKind> {
    let mut deck = deck.to_vec();
    deck.sort();
    deck
}

// --- 单元测试 ---
