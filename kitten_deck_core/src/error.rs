use std::time::Duration;

use thiserror::Error;

/// 存储层 (外部键值存储) 的错误
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("存储操作 {op} 超时 ({timeout:?})")]
    Timeout { op: &'static str, timeout: Duration },
    #[error("存储后端错误: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StoreError::Backend(Box::new(err))
    }
}

/// 核心对外暴露的错误
#[derive(Error, Debug)]
pub enum GameError {
    /// 存储不可用，直接上报，核心内部不重试
    #[error("存储不可用 ({op}): {source}")]
    StoreUnavailable {
        op: &'static str,
        #[source]
        source: StoreError,
    },
    /// 牌堆已空；此时已经重新初始化了一副新牌
    #[error("玩家 {player} 的牌堆已空")]
    EmptyDeck { player: String },
    #[error("非法的玩家标识: {reason}")]
    InvalidPlayer { reason: &'static str },
    /// 读取到牌堆后，要移除的牌已被其他请求拿走
    #[error("玩家 {player} 的抽牌与其他请求冲突")]
    DrawConflict { player: String },
    #[error("存储中的数据损坏: {detail}")]
    CorruptRecord { detail: String },
}

impl GameError {
    pub(crate) fn store(op: &'static str) -> impl FnOnce(StoreError) -> GameError {
        move |source| GameError::StoreUnavailable { op, source }
    }
}
