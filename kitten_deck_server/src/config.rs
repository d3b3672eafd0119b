//! 从环境变量加载的服务器配置

use std::env;
use std::time::Duration;

use kitten_deck_core::{EmptyDeckPolicy, GameConfig};

use crate::error::ServerError;

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:3000";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// 未设置时使用进程内存储
    pub redis_url: Option<String>,
    /// 允许跨域访问的前端地址
    pub allowed_origin: String,
    pub game: GameConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ServerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ServerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("KITTEN_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = match lookup("KITTEN_PORT") {
            None => DEFAULT_PORT,
            Some(raw) => raw.parse::<u16>().map_err(|_| ServerError::Config {
                detail: format!("KITTEN_PORT 必须是合法端口号，实际为 '{raw}'"),
            })?,
        };

        let redis_url = lookup("REDIS_URL").filter(|url| !url.trim().is_empty());

        let allowed_origin =
            lookup("KITTEN_ALLOWED_ORIGIN").unwrap_or_else(|| DEFAULT_ALLOWED_ORIGIN.to_string());

        let mut game = GameConfig::default();
        if let Some(raw) = lookup("KITTEN_STORE_TIMEOUT_MS") {
            let millis = raw.parse::<u64>().ok().filter(|ms| *ms > 0).ok_or_else(|| ServerError::Config {
                detail: format!("KITTEN_STORE_TIMEOUT_MS 必须是正整数，实际为 '{raw}'"),
            })?;
            game.store_timeout = Duration::from_millis(millis);
        }
        if let Some(raw) = lookup("KITTEN_EMPTY_DECK_POLICY") {
            game.empty_deck_policy = raw
                .parse::<EmptyDeckPolicy>()
                .map_err(|detail| ServerError::Config { detail })?;
        }

        Ok(ServerConfig { host, port, redis_url, allowed_origin, game })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<ServerConfig, ServerError> {
        let vars: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 8080);
        assert!(config.redis_url.is_none());
        assert_eq!(config.allowed_origin, "http://localhost:3000");
        assert_eq!(config.game.store_timeout, Duration::from_secs(2));
        assert_eq!(config.game.empty_deck_policy, EmptyDeckPolicy::Reinitialize);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("KITTEN_PORT", "9000"),
            ("REDIS_URL", "redis://127.0.0.1:6379/0"),
            ("KITTEN_STORE_TIMEOUT_MS", "250"),
            ("KITTEN_EMPTY_DECK_POLICY", "reinitialize_and_draw"),
        ])
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.redis_url.as_deref(), Some("redis://127.0.0.1:6379/0"));
        assert_eq!(config.game.store_timeout, Duration::from_millis(250));
        assert_eq!(config.game.empty_deck_policy, EmptyDeckPolicy::ReinitializeAndDraw);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(config_from(&[("KITTEN_PORT", "http")]), Err(ServerError::Config { .. })));
        assert!(config_from(&[("KITTEN_STORE_TIMEOUT_MS", "0")]).is_err());
        assert!(config_from(&[("KITTEN_EMPTY_DECK_POLICY", "retry")]).is_err());
        // 空的 REDIS_URL 视为未设置
        assert!(config_from(&[("REDIS_URL", " ")]).unwrap().redis_url.is_none());
    }
}
