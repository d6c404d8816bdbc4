use crate::card::{Card, Rank};
use crate::state::{EliminationReason, SeatId, SessionView};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

// --- 客户端 -> 服务器 的消息 ---
// 与具体传输协议无关，文本行协议和 JSON 桥接都映射到这里。

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum PlayerMessage {
    /// 请求入座
    Join,
    /// 出牌：actual 张真牌 + fake 张充数牌
    SubmitClaim { actual: usize, fake: usize },
    /// 喊"BLUFF"质疑当前声明
    Challenge,
    /// 请求一份当前状态快照
    Status,
    /// 主动离开
    Disconnect,
}

// --- 服务器 -> 客户端 的事件 ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// 有玩家入座
    PlayerJoined { seat: SeatId },
    /// 开局前有玩家离开，座位被释放
    PlayerLeft { seat: SeatId },
    /// 新一轮开始，公布本轮点数
    RoundStarted { rank: Rank },
    /// 某座位的手牌 (只发给该座位)
    HandUpdated { seat: SeatId, hand: Vec<Card> },
    /// 轮到某座位出牌
    TurnStarted { seat: SeatId },
    /// 某座位宣称打出了 claimed_count 张本轮点数
    ClaimMade { seat: SeatId, claimed_count: usize },
    /// 质疑窗口打开
    ChallengeWindowOpened { accused: SeatId, closes_in_ms: u64 },
    /// 窗口内无人质疑
    NoChallenge,
    /// 有人质疑，公开亮牌结果
    ChallengeRaised {
        accuser: SeatId,
        accused: SeatId,
        actual_count: usize,
        claimed_count: usize,
    },
    SeatEliminated { seat: SeatId, reason: EliminationReason },
    /// 断线或超时的座位被跳过
    TurnSkipped { seat: SeatId },
    GameOver { winner: Option<SeatId> },
    /// 操作被拒绝 (只发给出错的座位)
    Rejected { reason: String },
    Snapshot(SessionView),
}

/// 事件的接收方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    All,
    Seat(SeatId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub to: Recipient,
    pub event: SessionEvent,
}

impl Envelope {
    pub fn all(event: SessionEvent) -> Self {
        Envelope { to: Recipient::All, event }
    }

    pub fn seat(seat: SeatId, event: SessionEvent) -> Self {
        Envelope { to: Recipient::Seat(seat), event }
    }
}

/// 单个连接的出站队列，由桥接层创建并持有接收端
pub type Outbox = mpsc::Sender<SessionEvent>;

/// 会话事件的单向扇出。实现者不能阻塞协调者。
pub trait SessionBroadcast: Send + Sync + 'static {
    /// 座位入座时登记其连接
    fn attach(&self, _seat: SeatId, _outbox: Outbox) {}

    fn detach(&self, _seat: SeatId) {}

    fn publish(&self, to: Recipient, event: SessionEvent);
}

impl<T: SessionBroadcast + ?Sized> SessionBroadcast for Arc<T> {
    fn attach(&self, seat: SeatId, outbox: Outbox) {
        (**self).attach(seat, outbox)
    }

    fn detach(&self, seat: SeatId) {
        (**self).detach(seat)
    }

    fn publish(&self, to: Recipient, event: SessionEvent) {
        (**self).publish(to, event)
    }
}

/// 把所有事件原样转发到一个无界通道，便于记录和测试
impl SessionBroadcast for mpsc::UnboundedSender<Envelope> {
    fn publish(&self, to: Recipient, event: SessionEvent) {
        let _ = self.send(Envelope { to, event });
    }
}
