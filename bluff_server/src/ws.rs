//! JSON over WebSocket 桥接：入站 `PlayerMessage`，出站 `SessionEvent`

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use bluff_core::{GameError, PlayerMessage, SessionEvent};
use futures_util::{SinkExt, stream::StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::SharedState;
use crate::connection::{Connection, OUTBOX_CAPACITY};

/// 处理 WebSocket 连接请求
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// 处理单个 WebSocket 连接的生命周期
async fn handle_socket(socket: WebSocket, state: SharedState) {
    let (mut sender, mut receiver) = socket.split();

    // 创建一个 MPSC 通道，协调者经由注册表把事件放进来
    let (tx, mut rx) = mpsc::channel::<SessionEvent>(OUTBOX_CAPACITY);

    // 启动一个新任务，专门负责将 MPSC 通道中的事件发送到 WebSocket
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let payload = match serde_json::to_string(&event) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("序列化事件失败: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(payload.into())).await.is_err() {
                // 发送失败，说明客户端已断开，退出任务
                break;
            }
        }
    });

    let mut connection = Connection::new(state, tx);

    // 主循环，处理从客户端接收到的消息
    while let Some(Ok(msg)) = receiver.next().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        match serde_json::from_str::<PlayerMessage>(&text) {
            Ok(PlayerMessage::Disconnect) => break,
            Ok(message) => connection.handle(message).await,
            Err(e) => {
                warn!("解析消息失败: {}", e);
                connection.reject(&GameError::ProtocolError(e.to_string()));
            }
        }
    }

    // 客户端断开连接，执行清理工作
    let seat = connection.seat_id();
    connection.leave().await;
    info!("WebSocket 客户端连接关闭 (座位 {:?})", seat);
}
