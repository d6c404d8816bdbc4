//! 两种桥接共用的连接逻辑：入座、转发玩家消息、断线清理

use std::sync::Arc;

use bluff_core::{GameError, Outbox, PlayerMessage, SeatId, SessionBroadcast, SessionEvent};
use tracing::{info, warn};

use crate::{SharedState, Table};

/// 每个连接的出站队列长度
pub const OUTBOX_CAPACITY: usize = 32;

struct Seat {
    table: Arc<Table>,
    id: SeatId,
}

impl Seat {
    // 协调者已退出说明这一局结束了，连接可以去下一桌重新入座
    fn is_live(&self) -> bool {
        !self.table.handle.is_closed()
    }
}

pub struct Connection {
    state: SharedState,
    outbox: Outbox,
    seat: Option<Seat>,
}

impl Connection {
    pub fn new(state: SharedState, outbox: Outbox) -> Self {
        Connection { state, outbox, seat: None }
    }

    pub fn seat_id(&self) -> Option<SeatId> {
        self.seat.as_ref().map(|s| s.id)
    }

    /// 处理一条玩家消息。出错时把原因只回给这个连接。
    pub async fn handle(&mut self, message: PlayerMessage) {
        if let Err(e) = self.dispatch(message).await {
            self.reject(&e);
        }
    }

    pub fn reject(&self, error: &GameError) {
        let event = SessionEvent::Rejected { reason: error.to_string() };
        if self.outbox.try_send(event).is_err() {
            warn!("无法向连接回报错误: {}", error);
        }
    }

    async fn dispatch(&mut self, message: PlayerMessage) -> Result<(), GameError> {
        match message {
            PlayerMessage::Join => {
                if self.seat.as_ref().is_some_and(Seat::is_live) {
                    return Err(GameError::ProtocolError("already seated".to_string()));
                }
                let table = self.state.current();
                let id = table.handle.join(self.outbox.clone()).await?;
                info!("连接入座: 座位 {} (对局 {})", id, table.handle.session_id());
                self.seat = Some(Seat { table, id });
                Ok(())
            }
            PlayerMessage::Disconnect => {
                self.leave().await;
                Ok(())
            }
            message => {
                let seat = self
                    .seat
                    .as_ref()
                    .ok_or_else(|| GameError::ProtocolError("join a session first".to_string()))?;
                seat.table.handle.send(seat.id, message).await
            }
        }
    }

    /// 让出座位。套接字关闭时也会调用。
    pub async fn leave(&mut self) {
        let Some(seat) = self.seat.take() else { return };
        info!("座位 {} 离开", seat.id);
        if seat.is_live() {
            let _ = seat.table.handle.disconnect(seat.id).await;
        }
        seat.table.registry.detach(seat.id);
    }
}
