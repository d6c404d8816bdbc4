//! 文本行协议桥接 (TCP)
//!
//! 每行一条指令：`JOIN`、`PLAY <actual> <fake>`、`BLUFF`、`STATUS`、`EXIT`，大小写不敏感。
//! 服务器事件渲染成人类可读的文本行。

use std::io;
use std::net::SocketAddr;

use bluff_core::{Card, GameError, GamePhase, PlayerMessage, SessionEvent, SessionView};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::SharedState;
use crate::connection::{Connection, OUTBOX_CAPACITY};

const GREETING: &str = "Welcome to Bluff! Type JOIN to take a seat.\n";

pub async fn serve(listener: TcpListener, state: SharedState) -> io::Result<()> {
    loop {
        let (socket, addr) = listener.accept().await?;
        info!("新的文本行连接: {}", addr);
        tokio::spawn(handle_socket(socket, addr, state.clone()));
    }
}

/// 处理单个文本行连接的生命周期
async fn handle_socket(socket: TcpStream, addr: SocketAddr, state: SharedState) {
    let (reader, mut writer) = socket.into_split();
    let (tx, mut rx) = mpsc::channel::<SessionEvent>(OUTBOX_CAPACITY);

    // 专门负责把事件渲染后写回套接字
    tokio::spawn(async move {
        if writer.write_all(GREETING.as_bytes()).await.is_err() {
            return;
        }
        while let Some(event) = rx.recv().await {
            for line in render_event(&event) {
                if writer.write_all(format!("{}\n", line).as_bytes()).await.is_err() {
                    return;
                }
            }
        }
    });

    let mut connection = Connection::new(state, tx);
    let mut lines = BufReader::new(reader).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("读取 {} 失败: {}", addr, e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(&line) {
            Ok(PlayerMessage::Disconnect) => break,
            Ok(message) => connection.handle(message).await,
            Err(e) => {
                warn!("来自 {} 的无效指令: {}", addr, e);
                connection.reject(&e);
            }
        }
    }

    let seat = connection.seat_id();
    connection.leave().await;
    info!("文本行连接关闭: {} (座位 {:?})", addr, seat);
}

/// 解析一行指令
pub fn parse_line(line: &str) -> Result<PlayerMessage, GameError> {
    let mut words = line.split_whitespace();
    let command = words.next().unwrap_or_default().to_uppercase();
    let args: Vec<&str> = words.collect();

    let message = match (command.as_str(), args.as_slice()) {
        ("JOIN", []) => PlayerMessage::Join,
        ("BLUFF", []) => PlayerMessage::Challenge,
        ("STATUS", []) => PlayerMessage::Status,
        ("EXIT", []) => PlayerMessage::Disconnect,
        ("PLAY", [actual, fake]) => PlayerMessage::SubmitClaim {
            actual: parse_count(actual)?,
            fake: parse_count(fake)?,
        },
        ("PLAY", _) => return Err(protocol_error("usage: PLAY <actual> <fake>")),
        _ => return Err(protocol_error(&format!("unknown command `{}`", line.trim()))),
    };
    Ok(message)
}

fn parse_count(word: &str) -> Result<usize, GameError> {
    word.parse()
        .map_err(|_| protocol_error(&format!("`{}` is not a card count", word)))
}

fn protocol_error(detail: &str) -> GameError {
    GameError::ProtocolError(detail.to_string())
}

/// 把一个事件渲染成若干行文本
pub fn render_event(event: &SessionEvent) -> Vec<String> {
    let line = match event {
        SessionEvent::PlayerJoined { seat } => format!("Player {} joined.", seat),
        SessionEvent::PlayerLeft { seat } => format!("Player {} left.", seat),
        SessionEvent::RoundStarted { rank } => format!("Round: {}", rank),
        SessionEvent::HandUpdated { hand, .. } => format!("Your hand: {}", render_hand(hand)),
        SessionEvent::TurnStarted { seat } => format!("Player {}'s turn.", seat),
        SessionEvent::ClaimMade { seat, claimed_count } => {
            format!("Player {} claims {} card(s).", seat, claimed_count)
        }
        SessionEvent::ChallengeWindowOpened { accused, closes_in_ms } => format!(
            "Type BLUFF within {:.1}s to challenge Player {}.",
            *closes_in_ms as f64 / 1000.0,
            accused
        ),
        SessionEvent::NoChallenge => "No one called bluff.".to_string(),
        SessionEvent::ChallengeRaised { accuser, accused, actual_count, claimed_count } => format!(
            "Player {} called bluff on Player {}: {} real card(s) out of {} claimed.",
            accuser, accused, actual_count, claimed_count
        ),
        SessionEvent::SeatEliminated { seat, reason } => format!("Player {} is out ({}).", seat, reason),
        SessionEvent::TurnSkipped { seat } => format!("Player {}'s turn was skipped.", seat),
        SessionEvent::GameOver { winner: Some(seat) } => format!("Game over! Player {} wins.", seat),
        SessionEvent::GameOver { winner: None } => "Game over! No winner.".to_string(),
        SessionEvent::Rejected { reason } => format!("Error: {}", reason),
        SessionEvent::Snapshot(view) => return render_snapshot(view),
    };
    vec![line]
}

fn render_hand(hand: &[Card]) -> String {
    let cards: Vec<String> = hand.iter().map(Card::to_string).collect();
    format!("[{}]", cards.join(", "))
}

fn render_phase(phase: &GamePhase) -> String {
    match phase {
        GamePhase::WaitingForPlayers => "waiting for players".to_string(),
        GamePhase::RoundStart => "dealing".to_string(),
        GamePhase::AwaitingClaim(seat) => format!("Player {} to play", seat),
        GamePhase::ChallengeWindow => "challenge window open".to_string(),
        GamePhase::GameOver { winner: Some(seat) } => format!("game over, Player {} won", seat),
        GamePhase::GameOver { winner: None } => "game over".to_string(),
    }
}

fn render_snapshot(view: &SessionView) -> Vec<String> {
    let mut lines = vec![format!("Status: {}", render_phase(&view.phase))];
    if let Some(rank) = view.round_rank {
        lines.push(format!("Round: {}", rank));
    }
    if let Some(claim) = &view.live_claim {
        lines.push(format!("Player {} claims {} card(s).", claim.author, claim.claimed_count));
    }
    for seat in &view.seats {
        let mut line = format!("Player {}: {} card(s)", seat.id, seat.hand_size);
        if seat.eliminated {
            line.push_str(", out");
        }
        if !seat.connected {
            line.push_str(", offline");
        }
        if view.your_seat == Some(seat.id) {
            line.push_str(" (you)");
        }
        lines.push(line);
    }
    if view.your_seat.is_some() {
        lines.push(format!("Your hand: {}", render_hand(&view.your_hand)));
    }
    lines
}
