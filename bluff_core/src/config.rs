//! 对局配置

use crate::card::DeckComposition;
use crate::error::GameError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 玩家断线时的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisconnectPolicy {
    /// 直接淘汰
    #[default]
    Eliminate,
    /// 保留座位，轮到时自动跳过
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// 凑满多少个座位后开局 (默认 4)
    pub seats_required: usize,
    /// 质疑窗口时长 (默认 5 秒)
    pub challenge_window: Duration,
    pub deck: DeckComposition,
    pub disconnect_policy: DisconnectPolicy,
    /// 轮到的玩家超过这个时间不出牌就视为弃权；None 表示不限时
    pub turn_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            seats_required: 4,
            challenge_window: Duration::from_secs(5),
            deck: DeckComposition::default(),
            disconnect_policy: DisconnectPolicy::Eliminate,
            turn_timeout: Some(Duration::from_secs(60)),
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), GameError> {
        if self.seats_required < 2 {
            return Err(GameError::InvalidConfig(format!(
                "seats_required must be at least 2, got {}",
                self.seats_required
            )));
        }
        if self.challenge_window.is_zero() {
            return Err(GameError::InvalidConfig("challenge_window must be positive".to_string()));
        }
        if self.turn_timeout.is_some_and(|t| t.is_zero()) {
            return Err(GameError::InvalidConfig("turn_timeout must be positive".to_string()));
        }
        if self.deck.total() < self.seats_required {
            return Err(GameError::InvalidConfig(format!(
                "deck of {} cards cannot serve {} seats",
                self.deck.total(),
                self.seats_required
            )));
        }
        Ok(())
    }
}
