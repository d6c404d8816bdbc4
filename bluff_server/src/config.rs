//! 服务器配置，全部从环境变量读取

use bluff_core::{DisconnectPolicy, SessionConfig};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// 文本行协议 (TCP) 监听地址
    pub line_addr: SocketAddr,
    /// JSON WebSocket 监听地址
    pub ws_addr: SocketAddr,
    /// 每一局的配置
    pub session: SessionConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 用任意键值来源构造配置，未设置的键取默认值
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = SessionConfig::default();

        let line_addr = parse_or(&lookup, "BLUFF_LINE_ADDR", SocketAddr::from(([0, 0, 0, 0], 12345)))?;
        let ws_addr = parse_or(&lookup, "BLUFF_WS_ADDR", SocketAddr::from(([0, 0, 0, 0], 8082)))?;
        let seats_required = parse_or(&lookup, "BLUFF_SEATS", defaults.seats_required)?;
        let window_ms = parse_or(&lookup, "BLUFF_WINDOW_MS", defaults.challenge_window.as_millis() as u64)?;

        // 0 表示不限时
        let turn_timeout = match lookup("BLUFF_TURN_TIMEOUT_MS") {
            None => defaults.turn_timeout,
            Some(raw) => match parse::<u64>("BLUFF_TURN_TIMEOUT_MS", &raw)? {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
        };

        let disconnect_policy = match lookup("BLUFF_DISCONNECT_POLICY") {
            None => defaults.disconnect_policy,
            Some(raw) => match raw.trim().to_lowercase().as_str() {
                "eliminate" => DisconnectPolicy::Eliminate,
                "skip" => DisconnectPolicy::Skip,
                other => {
                    return Err(ConfigError::Invalid {
                        var: "BLUFF_DISCONNECT_POLICY".to_string(),
                        reason: format!("expected `eliminate` or `skip`, got `{}`", other),
                    });
                }
            },
        };

        let session = SessionConfig {
            seats_required,
            challenge_window: Duration::from_millis(window_ms),
            turn_timeout,
            disconnect_policy,
            ..defaults
        };
        session.validate().map_err(|e| ConfigError::Invalid {
            var: "session".to_string(),
            reason: e.to_string(),
        })?;

        Ok(ServerConfig { line_addr, ws_addr, session })
    }
}

fn parse<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var: key.to_string(),
        reason: e.to_string(),
    })
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => parse(key, &raw),
        None => Ok(default),
    }
}
