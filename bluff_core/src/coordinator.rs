//! 协调者：对局状态唯一的写入者
//!
//! 每个连接任务只把解析好的指令推入协调者的收件箱，协调者逐条处理，
//! 所有状态修改因此天然串行。协调者从不阻塞在任何单个连接的 I/O 上。

use crate::config::SessionConfig;
use crate::error::GameError;
use crate::message::{Envelope, Outbox, PlayerMessage, Recipient, SessionBroadcast, SessionEvent};
use crate::state::{GamePhase, GameSession, SeatId, SessionId};
use crate::window::{ChallengeWindow, Signal};
use std::collections::VecDeque;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

const INBOX_CAPACITY: usize = 128;

/// 发往协调者的指令
#[derive(Debug)]
pub enum Command {
    Join {
        outbox: Outbox,
        reply: oneshot::Sender<Result<SeatId, GameError>>,
    },
    Act {
        seat: SeatId,
        message: PlayerMessage,
        /// 连接任务收到该消息的时刻，用于裁决质疑先后
        received_at: Instant,
    },
}

/// 协调者句柄，可自由克隆给各个连接任务
#[derive(Clone, Debug)]
pub struct SessionHandle {
    sender: mpsc::Sender<Command>,
    session_id: SessionId,
}

impl SessionHandle {
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// 请求入座，成功后 `outbox` 会收到该座位的所有事件
    pub async fn join(&self, outbox: Outbox) -> Result<SeatId, GameError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(Command::Join { outbox, reply })
            .await
            .map_err(|_| GameError::SessionClosed)?;
        response.await.map_err(|_| GameError::SessionClosed)?
    }

    /// 转发一条玩家消息，并在此刻打上到达时间戳
    pub async fn send(&self, seat: SeatId, message: PlayerMessage) -> Result<(), GameError> {
        let command = Command::Act { seat, message, received_at: Instant::now() };
        self.sender.send(command).await.map_err(|_| GameError::SessionClosed)
    }

    pub async fn submit_claim(&self, seat: SeatId, actual: usize, fake: usize) -> Result<(), GameError> {
        self.send(seat, PlayerMessage::SubmitClaim { actual, fake }).await
    }

    pub async fn challenge(&self, seat: SeatId) -> Result<(), GameError> {
        self.send(seat, PlayerMessage::Challenge).await
    }

    pub async fn status(&self, seat: SeatId) -> Result<(), GameError> {
        self.send(seat, PlayerMessage::Status).await
    }

    pub async fn disconnect(&self, seat: SeatId) -> Result<(), GameError> {
        self.send(seat, PlayerMessage::Disconnect).await
    }
}

enum Next {
    Command(Command),
    TimedOut,
    Closed,
}

pub struct Coordinator<B: SessionBroadcast> {
    session: GameSession,
    inbox: mpsc::Receiver<Command>,
    broadcast: B,
    // 质疑窗口期间收到的其他指令，窗口关闭后按到达顺序处理
    deferred: VecDeque<Command>,
    // (回合序号, 截止时刻)
    turn_deadline: Option<(u64, Instant)>,
}

impl<B: SessionBroadcast> Coordinator<B> {
    pub fn new(config: SessionConfig, broadcast: B) -> Result<(Self, SessionHandle), GameError> {
        Ok(Self::with_session(GameSession::new(config)?, broadcast))
    }

    pub fn with_session(session: GameSession, broadcast: B) -> (Self, SessionHandle) {
        let (sender, inbox) = mpsc::channel(INBOX_CAPACITY);
        let handle = SessionHandle { sender, session_id: session.id() };
        let coordinator = Coordinator {
            session,
            inbox,
            broadcast,
            deferred: VecDeque::new(),
            turn_deadline: None,
        };
        (coordinator, handle)
    }

    /// 运行事件循环直到游戏结束，返回获胜座位
    pub async fn run(mut self) -> Option<SeatId> {
        let id = self.session.id();
        info!(session = %id, "协调者启动");

        loop {
            let phase = self.session.phase().clone();
            match phase {
                GamePhase::GameOver { winner } => {
                    info!(session = %id, ?winner, "协调者退出");
                    return winner;
                }
                GamePhase::ChallengeWindow => self.run_challenge_window().await,
                GamePhase::AwaitingClaim(seat) => {
                    let deadline = self.turn_deadline();
                    match self.next_command(deadline).await {
                        Next::Command(command) => self.handle(command),
                        Next::TimedOut => match self.session.fold_turn(seat) {
                            Ok(events) => self.publish(events),
                            Err(e) => warn!(session = %id, "超时弃权失败: {}", e),
                        },
                        Next::Closed => break,
                    }
                }
                GamePhase::WaitingForPlayers | GamePhase::RoundStart => match self.next_command(None).await {
                    Next::Command(command) => self.handle(command),
                    Next::TimedOut | Next::Closed => break,
                },
            }
        }

        info!(session = %id, "所有句柄已关闭，协调者退出");
        None
    }

    fn turn_deadline(&mut self) -> Option<Instant> {
        let timeout = self.session.config().turn_timeout?;
        let serial = self.session.turn_serial();
        match self.turn_deadline {
            Some((s, deadline)) if s == serial => Some(deadline),
            _ => {
                let deadline = Instant::now() + timeout;
                self.turn_deadline = Some((serial, deadline));
                Some(deadline)
            }
        }
    }

    async fn next_command(&mut self, deadline: Option<Instant>) -> Next {
        if let Some(command) = self.deferred.pop_front() {
            return Next::Command(command);
        }
        let received = match deadline {
            Some(deadline) => match timeout_at(deadline, self.inbox.recv()).await {
                Ok(received) => received,
                Err(_) => return Next::TimedOut,
            },
            None => self.inbox.recv().await,
        };
        received.map_or(Next::Closed, Next::Command)
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Join { outbox, reply } => match self.session.join() {
                Ok((seat, events)) => {
                    // 先登记连接再广播，保证新座位能收到自己的入座和发牌事件
                    self.broadcast.attach(seat, outbox);
                    let _ = reply.send(Ok(seat));
                    self.publish(events);
                }
                Err(e) => {
                    let _ = reply.send(Err(e));
                }
            },
            Command::Act { seat, message, .. } => self.handle_action(seat, message),
        }
    }

    fn handle_action(&mut self, seat: SeatId, message: PlayerMessage) {
        let result = match message {
            PlayerMessage::SubmitClaim { actual, fake } => {
                self.session.submit_claim(seat, actual, actual.saturating_add(fake))
            }
            PlayerMessage::Challenge => {
                debug!(session = %self.session.id(), seat = %seat, "窗口外的质疑，丢弃");
                return;
            }
            PlayerMessage::Status => {
                self.send_snapshot(seat);
                return;
            }
            PlayerMessage::Disconnect => {
                self.broadcast.detach(seat);
                Ok(self.session.disconnect(seat))
            }
            PlayerMessage::Join => Err(GameError::ProtocolError("already seated".to_string())),
        };

        match result {
            Ok(events) => self.publish(events),
            Err(e) => {
                debug!(session = %self.session.id(), seat = %seat, "拒绝操作: {}", e);
                self.broadcast.publish(Recipient::Seat(seat), SessionEvent::Rejected { reason: e.to_string() });
            }
        }
    }

    /// 打开质疑窗口并等待：第一个合格质疑到达或截止时间到，二者先到者为准。
    async fn run_challenge_window(&mut self) {
        let Some(claim) = self.session.live_claim().cloned() else { return };
        let challengers: Vec<SeatId> = self
            .session
            .seats()
            .iter()
            .filter(|s| s.is_active() && s.connected)
            .map(|s| s.id)
            .collect();
        let mut window = ChallengeWindow::open(&claim, challengers, self.session.config().challenge_window, Instant::now());
        debug!(session = %self.session.id(), accused = %claim.author, "质疑窗口打开");

        while !window.is_decided() && window.has_eligible() {
            match timeout_at(window.deadline(), self.inbox.recv()).await {
                Ok(Some(command)) => self.route_during_window(command, &mut window),
                Ok(None) | Err(_) => break,
            }
        }
        // 已经排在收件箱里的指令一并裁决，早于截止时间的质疑仍然有效
        for _ in 0..INBOX_CAPACITY {
            match self.inbox.try_recv() {
                Ok(command) => self.route_during_window(command, &mut window),
                Err(_) => break,
            }
        }

        let outcome = window.outcome();
        info!(session = %self.session.id(), accused = %claim.author, ?outcome, "质疑窗口关闭");
        let events = self.session.resolve_challenge(outcome);
        self.publish(events);
    }

    fn route_during_window(&mut self, command: Command, window: &mut ChallengeWindow) {
        match command {
            Command::Act { seat, message: PlayerMessage::Challenge, received_at } => {
                if !self.session.latch_challenge(seat) {
                    debug!(session = %self.session.id(), seat = %seat, "无资格质疑");
                    return;
                }
                match window.offer(seat, received_at) {
                    Signal::Accepted => info!(session = %self.session.id(), seat = %seat, "收到质疑"),
                    signal => debug!(session = %self.session.id(), seat = %seat, ?signal, "质疑信号作废"),
                }
            }
            Command::Act { seat, message: PlayerMessage::Status, .. } => self.send_snapshot(seat),
            Command::Act { seat, message: PlayerMessage::Disconnect, received_at } => {
                window.withdraw(seat);
                self.session.disconnect(seat);
                self.deferred.push_back(Command::Act { seat, message: PlayerMessage::Disconnect, received_at });
            }
            Command::Join { reply, .. } => {
                let _ = reply.send(Err(GameError::SessionFull));
            }
            other => self.deferred.push_back(other),
        }
    }

    fn send_snapshot(&self, seat: SeatId) {
        let view = self.session.for_client(Some(seat));
        self.broadcast.publish(Recipient::Seat(seat), SessionEvent::Snapshot(view));
    }

    fn publish(&self, events: Vec<Envelope>) {
        for Envelope { to, event } in events {
            self.broadcast.publish(to, event);
        }
    }
}
