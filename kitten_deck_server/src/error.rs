use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use kitten_deck_core::{ErrorReply, GameError};
use thiserror::Error;
use tracing::{error, warn};

/// 启动和连接层面的错误
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("配置错误: {detail}")]
    Config { detail: String },
    #[error("Redis 错误: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
    #[error("序列化失败: {0}")]
    Json(#[from] serde_json::Error),
    #[error("WebSocket 错误: {0}")]
    WebSocket(#[from] axum::Error),
}

/// HTTP 接口的错误，负责映射状态码和响应体
#[derive(Debug)]
pub enum ApiError {
    /// 请求体无法解析
    BadRequest,
    Game(GameError),
}

impl From<GameError> for ApiError {
    fn from(err: GameError) -> Self {
        ApiError::Game(err)
    }
}

impl ApiError {
    fn status_and_body(&self) -> (StatusCode, ErrorReply) {
        match self {
            ApiError::BadRequest => (
                StatusCode::BAD_REQUEST,
                ErrorReply::Error { error: "Invalid request".to_string() },
            ),
            ApiError::Game(GameError::EmptyDeck { .. }) => (
                StatusCode::BAD_REQUEST,
                ErrorReply::Message { message: "No cards left in the deck".to_string() },
            ),
            ApiError::Game(err @ GameError::InvalidPlayer { .. }) => (
                StatusCode::BAD_REQUEST,
                ErrorReply::Error { error: err.to_string() },
            ),
            ApiError::Game(GameError::DrawConflict { .. }) => (
                StatusCode::CONFLICT,
                ErrorReply::Error { error: "Another draw is in progress, please retry".to_string() },
            ),
            ApiError::Game(GameError::StoreUnavailable { .. } | GameError::CorruptRecord { .. }) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorReply::Error { error: "Game state is temporarily unavailable".to_string() },
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        if status.is_server_error() {
            error!("请求处理失败: {:?}", self);
        } else {
            warn!("请求被拒绝: {:?}", self);
        }
        (status, Json(body)).into_response()
    }
}
