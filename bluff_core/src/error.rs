//! 对局错误类型。没有任何错误会终止进程，对局只会因胜负条件结束。

use crate::state::SeatId;
use thiserror::Error;

/// 出牌不合法的具体原因
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidMoveReason {
    #[error("a claim must cover at least one card")]
    ZeroClaim,
    #[error("claimed count is smaller than the actual count")]
    CountMismatch,
    #[error("need {needed} matching cards but only hold {held}")]
    NotEnoughMatching { needed: usize, held: usize },
    #[error("need {needed} cards to disguise but only hold {held}")]
    NotEnoughToDisguise { needed: usize, held: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    /// 只报告给出错的座位，回合不推进
    #[error("invalid move: {0}")]
    InvalidMove(#[from] InvalidMoveReason),

    /// 不会修改任何状态
    #[error("seat {seat} acted out of turn")]
    OutOfTurn { seat: SeatId, expected: Option<SeatId> },

    #[error("seat {0} is disconnected")]
    SeatDisconnected(SeatId),

    /// 桥接层收到的消息格式错误，只影响该连接
    #[error("protocol error: {0}")]
    ProtocolError(String),

    #[error("the session is full")]
    SessionFull,

    #[error("unknown seat {0}")]
    UnknownSeat(SeatId),

    #[error("seat {0} has been eliminated")]
    Eliminated(SeatId),

    #[error("the game is not running")]
    NotRunning,

    #[error("the session has closed")]
    SessionClosed,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
