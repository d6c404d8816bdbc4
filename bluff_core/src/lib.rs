//! # 吹牛 (Bluff) 核心逻辑库
//!
//! 这个 `core` crate 包含了吹牛纸牌游戏的全部核心状态管理：
//! 牌组与发牌、出牌声明校验、限时质疑窗口、淘汰与胜负判定，
//! 以及把所有状态修改串行化的协调者任务和客户端-服务器事件定义。
//! 它与具体传输协议 (文本行、JSON over WebSocket) 解耦，
//! 可以被任何上层桥接复用。

mod card;
mod config;
mod coordinator;
mod error;
mod logic;
mod message;
mod state;
mod window;

pub use card::*;

pub use config::*;

pub use coordinator::*;

pub use error::*;

pub use message::*;

pub use state::*;

pub use window::*;
