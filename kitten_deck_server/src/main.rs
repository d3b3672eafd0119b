mod config;
mod error;
mod redis_store;

use std::sync::Arc;

use axum::{
    extract::{
        rejection::JsonRejection,
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::{header, HeaderValue, Method},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use futures_util::{stream::SplitSink, stream::StreamExt, SinkExt};
use serde::Serialize;
use tokio::sync::broadcast;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use kitten_deck_core::{
    DeckService, DrawCardReply, GameStore, LeaderboardReply, MemoryStore, PlayerRequest, PlayersSnapshot,
    StartGameReply,
};

use crate::config::ServerConfig;
use crate::error::{ApiError, ServerError};
use crate::redis_store::RedisStore;

// 推送通道的缓冲区大小，落后太多的连接会丢弃旧快照
const EVENT_BUFFER: usize = 32;

// 服务器全局状态
struct AppState {
    service: DeckService,
    // 玩家状态快照的广播通道，每个 WebSocket 连接订阅一份
    events: broadcast::Sender<Arc<PlayersSnapshot>>,
}

type SharedState = Arc<AppState>;

impl AppState {
    fn new(service: DeckService) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        AppState { service, events }
    }

    /// 向所有连接推送最新快照；失败只记录日志，不影响游戏状态
    async fn publish_snapshot(&self) {
        match self.service.snapshot().await {
            Ok(players) => {
                // 没有订阅者时 send 会返回错误，可以忽略
                let _ = self.events.send(Arc::new(players));
            }
            Err(e) => warn!("获取玩家快照失败: {}", e),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,tower_http=info".into()))
        .init();

    let config = ServerConfig::from_env()?;

    let store: Arc<dyn GameStore> = match &config.redis_url {
        Some(url) => Arc::new(RedisStore::connect(url).await?),
        None => {
            warn!("未设置 REDIS_URL，使用进程内存储，重启后数据会丢失");
            Arc::new(MemoryStore::new())
        }
    };
    let state = SharedState::new(AppState::new(DeckService::new(store, config.game.clone())));

    let app = router(state)
        .layer(cors_layer(&config)?)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    info!("服务器正在监听 {}:{}", config.host, config.port);
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: SharedState) -> Router {
    Router::new()
        .route("/start-game", post(start_game))
        .route("/draw-card", post(draw_card))
        .route("/leaderboard", get(leaderboard))
        // 实时推送玩家状态
        .route("/ws", get(players_feed))
        .with_state(state)
}

fn cors_layer(config: &ServerConfig) -> Result<CorsLayer, ServerError> {
    let origin = HeaderValue::from_str(&config.allowed_origin).map_err(|e| ServerError::Config {
        detail: format!("KITTEN_ALLOWED_ORIGIN 不是合法的 Origin: {e}"),
    })?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::ORIGIN, header::CONTENT_TYPE, header::AUTHORIZATION])
        .expose_headers([header::CONTENT_LENGTH])
        .allow_credentials(true))
}

/// 开始游戏；已有牌堆时恢复游戏
async fn start_game(
    State(state): State<SharedState>,
    payload: Result<Json<PlayerRequest>, JsonRejection>,
) -> Result<Json<StartGameReply>, ApiError> {
    let Json(request) = payload.map_err(|_| ApiError::BadRequest)?;
    info!("玩家 {} 请求开始游戏", request.username);

    let started = state.service.start_or_resume(&request.username).await?;
    spawn_publish(&state);
    Ok(Json(StartGameReply::new(request.username.trim().to_string(), started)))
}

/// 抽一张牌
async fn draw_card(
    State(state): State<SharedState>,
    payload: Result<Json<PlayerRequest>, JsonRejection>,
) -> Result<Json<DrawCardReply>, ApiError> {
    let Json(request) = payload.map_err(|_| ApiError::BadRequest)?;
    info!("玩家 {} 正在抽牌", request.username);

    let outcome = state.service.draw(&request.username).await?;
    spawn_publish(&state);
    Ok(Json(outcome.into()))
}

/// 排行榜 (暂未实现排名)
async fn leaderboard() -> Json<LeaderboardReply> {
    info!("获取排行榜");
    Json(LeaderboardReply { leaderboard: "Top players".to_string() })
}

fn spawn_publish(state: &SharedState) {
    let state = state.clone();
    tokio::spawn(async move { state.publish_snapshot().await });
}

/// `/ws`：升级后只做单向推送，客户端发来的内容一律忽略
async fn players_feed(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| stream_snapshots(socket, state))
}

/// 先推一份当前快照，之后每次广播都转发一次，直到客户端断开或广播关闭
async fn stream_snapshots(socket: WebSocket, state: SharedState) {
    let (mut sender, mut receiver) = socket.split();
    // 先订阅，避免错过连接建立期间的更新
    let mut events = state.events.subscribe();
    info!("WebSocket 连接已建立");

    // 连接建立后先发送一次当前快照
    match state.service.snapshot().await {
        Ok(players) => {
            if let Err(e) = send_json(&mut sender, &players).await {
                warn!("发送玩家快照失败: {}", e);
                return;
            }
        }
        Err(e) => {
            warn!("获取玩家快照失败: {}", e);
            return;
        }
    }

    // 专门负责把广播的快照写入 WebSocket
    let mut send_task = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(players) => {
                    if send_json(&mut sender, &*players).await.is_err() {
                        // 发送失败，说明客户端已断开
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("WebSocket 连接落后，跳过了 {} 个快照", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // 读循环只用来检测连接关闭
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
    info!("WebSocket 连接关闭");
}

async fn send_json<T: Serialize>(
    sender: &mut SplitSink<WebSocket, Message>,
    value: &T,
) -> Result<(), ServerError> {
    let payload = serde_json::to_string(value)?;
    sender.send(Message::Text(payload.into())).await?;
    Ok(())
}
