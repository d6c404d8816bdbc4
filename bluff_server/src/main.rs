use std::error::Error;
use std::future::IntoFuture;
use std::sync::Arc;

use axum::{Router, routing::get};
use bluff_core::{Coordinator, GameError, SessionConfig, SessionHandle};
use parking_lot::RwLock as P_RwLock;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;
use crate::registry::ConnectionRegistry;

mod config;
mod connection;
mod line;
mod registry;
mod ws;

// 服务器全局状态：当前正在凑人或进行中的那一桌
struct AppState {
    session: SessionConfig,
    current: P_RwLock<Arc<Table>>,
}

// 一局游戏：协调者句柄 + 该局所有座位的连接
struct Table {
    handle: SessionHandle,
    registry: Arc<ConnectionRegistry>,
}

type SharedState = Arc<AppState>;
type TableCoordinator = Coordinator<Arc<ConnectionRegistry>>;

impl AppState {
    fn new(session: SessionConfig) -> Result<(Self, TableCoordinator), GameError> {
        let (table, coordinator) = Table::open(&session)?;
        let state = AppState {
            session,
            current: P_RwLock::new(Arc::new(table)),
        };
        Ok((state, coordinator))
    }

    /// 新连接入座时使用的桌子
    fn current(&self) -> Arc<Table> {
        self.current.read().clone()
    }

    /// 上一局结束后换上一张新桌子
    fn replace_table(&self) -> Result<TableCoordinator, GameError> {
        let (table, coordinator) = Table::open(&self.session)?;
        *self.current.write() = Arc::new(table);
        Ok(coordinator)
    }
}

impl Table {
    fn open(session: &SessionConfig) -> Result<(Self, TableCoordinator), GameError> {
        let registry = Arc::new(ConnectionRegistry::new());
        let (coordinator, handle) = Coordinator::new(session.clone(), registry.clone())?;
        info!("新的一桌已就绪: {}", handle.session_id());
        Ok((Table { handle, registry }, coordinator))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env()?;
    info!(
        "配置: {} 人一局，质疑窗口 {:?}，断线处理 {:?}",
        config.session.seats_required, config.session.challenge_window, config.session.disconnect_policy
    );

    let (state, coordinator) = AppState::new(config.session.clone())?;
    let state = SharedState::new(state);
    tokio::spawn(run_tables(state.clone(), coordinator));

    let app = Router::new()
        .route("/ws", get(ws::websocket_handler))
        .with_state(state.clone());

    let ws_listener = tokio::net::TcpListener::bind(config.ws_addr).await?;
    info!("WebSocket 服务正在监听 {}", config.ws_addr);
    let line_listener = tokio::net::TcpListener::bind(config.line_addr).await?;
    info!("文本行服务正在监听 {}", config.line_addr);

    tokio::select! {
        result = axum::serve(ws_listener, app).into_future() => result?,
        result = line::serve(line_listener, state) => result?,
    }
    Ok(())
}

/// 一局接一局地运行协调者
async fn run_tables(state: SharedState, mut coordinator: TableCoordinator) {
    loop {
        let session_id = state.current().handle.session_id();
        match coordinator.run().await {
            Some(winner) => info!("对局 {} 结束，座位 {} 获胜", session_id, winner),
            None => info!("对局 {} 结束，无人获胜", session_id),
        }

        coordinator = match state.replace_table() {
            Ok(next) => next,
            Err(e) => {
                error!("无法创建新的一桌: {}", e);
                return;
            }
        };
    }
}
