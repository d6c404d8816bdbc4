use bluff_core::{Outbox, Recipient, SeatId, SessionBroadcast, SessionEvent};
use dashmap::DashMap;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

/// 座位到网络连接的映射，协调者通过它把事件扇出到各个连接
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<SeatId, Outbox>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn deliver(&self, seat: SeatId, outbox: &Outbox, event: SessionEvent) {
        // 只用 try_send，慢连接丢消息也不能拖住协调者
        match outbox.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!("向座位 {} 发送事件失败（队列已满）", seat),
            Err(TrySendError::Closed(_)) => warn!("向座位 {} 发送事件失败（可能已断开）", seat),
        }
    }
}

impl SessionBroadcast for ConnectionRegistry {
    fn attach(&self, seat: SeatId, outbox: Outbox) {
        debug!("登记座位 {} 的连接", seat);
        self.connections.insert(seat, outbox);
    }

    fn detach(&self, seat: SeatId) {
        if self.connections.remove(&seat).is_some() {
            debug!("注销座位 {} 的连接", seat);
        }
    }

    fn publish(&self, to: Recipient, event: SessionEvent) {
        match to {
            Recipient::All => {
                for entry in self.connections.iter() {
                    self.deliver(*entry.key(), entry.value(), event.clone());
                }
            }
            Recipient::Seat(seat) => match self.connections.get(&seat) {
                Some(outbox) => self.deliver(seat, outbox.value(), event),
                None => debug!("座位 {} 没有在线连接，事件丢弃", seat),
            },
        }
    }
}
