//! 质疑窗口
//!
//! 窗口只负责裁决"谁是第一个质疑者"，不做任何等待。
//! 等待由协调者用带截止时间的接收完成 (见 coordinator.rs)。

use crate::state::{Claim, SeatId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChallengeOutcome {
    NoChallenge,
    ChallengedBy(SeatId),
}

/// 一次质疑信号的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// 成为当前的第一质疑者
    Accepted,
    /// 已有更早的质疑者，本信号作废 (不会顺延到下一个窗口)
    Discarded,
    /// 出牌者本人、已淘汰或已离线的座位
    Ineligible,
    /// 截止时间之后才到达
    Late,
    /// 窗口打开之前就已发出，针对的不是这次声明
    Early,
}

#[derive(Debug, Clone)]
pub struct ChallengeWindow {
    accused: SeatId,
    eligible: BTreeSet<SeatId>,
    opened_at: Instant,
    deadline: Instant,
    first: Option<(Instant, SeatId)>,
}

impl ChallengeWindow {
    /// 为一次声明打开窗口，除出牌者外的所有可质疑座位都有资格
    pub fn open(claim: &Claim, challengers: impl IntoIterator<Item = SeatId>, duration: Duration, now: Instant) -> Self {
        let eligible = challengers.into_iter().filter(|&id| id != claim.author).collect();
        ChallengeWindow {
            accused: claim.author,
            eligible,
            opened_at: now,
            deadline: now + duration,
            first: None,
        }
    }

    pub fn accused(&self) -> SeatId {
        self.accused
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// 按到达时间先后裁决，同一时刻到达时座位号小者优先
    pub fn offer(&mut self, seat: SeatId, arrived_at: Instant) -> Signal {
        if !self.eligible.contains(&seat) {
            return Signal::Ineligible;
        }
        if arrived_at < self.opened_at {
            return Signal::Early;
        }
        if arrived_at > self.deadline {
            return Signal::Late;
        }
        match self.first {
            Some(current) if current <= (arrived_at, seat) => Signal::Discarded,
            _ => {
                self.first = Some((arrived_at, seat));
                Signal::Accepted
            }
        }
    }

    /// 座位中途离线，失去质疑资格。已被接受的质疑仍然有效。
    pub fn withdraw(&mut self, seat: SeatId) {
        self.eligible.remove(&seat);
    }

    pub fn is_decided(&self) -> bool {
        self.first.is_some()
    }

    /// 没有人能质疑时窗口可以立即关闭
    pub fn has_eligible(&self) -> bool {
        !self.eligible.is_empty()
    }

    pub fn outcome(&self) -> ChallengeOutcome {
        match self.first {
            Some((_, seat)) => ChallengeOutcome::ChallengedBy(seat),
            None => ChallengeOutcome::NoChallenge,
        }
    }
}
