use futures_util::{SinkExt, StreamExt};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use url::Url;

use bluff_core::{PlayerMessage, SessionEvent};

const DEFAULT_URL: &str = "ws://127.0.0.1:8082/ws";

fn prompt() -> std::io::Result<()> {
    print!("> ");
    std::io::stdout().flush()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 第一个命令行参数可以指定服务器地址
    let url = Url::parse(&std::env::args().nth(1).unwrap_or_else(|| DEFAULT_URL.to_string()))?;

    println!("正在连接到: {}", url);
    let (ws_stream, _) = connect_async(url.as_str()).await?;
    println!("连接成功!");

    let (mut write, mut read) = ws_stream.split();

    // 启动一个任务来处理从服务器接收的事件
    tokio::spawn(async move {
        while let Some(msg) = read.next().await {
            match msg {
                Ok(Message::Text(text)) => match serde_json::from_str::<SessionEvent>(&text) {
                    Ok(event) => {
                        // 简单地将收到的事件打印到控制台
                        println!("\n<-- [服务器事件]:\n{:#?}\n", event);
                        let _ = prompt(); // 重新显示输入提示符
                    }
                    Err(e) => eprintln!("解析服务器事件失败: {}", e),
                },
                Ok(Message::Close(_)) => {
                    println!("\n服务器关闭了连接");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    eprintln!("接收消息时出错: {}", e);
                    break;
                }
            }
        }
    });

    // 主任务处理用户输入
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    println!("--- 吹牛客户端 ---");
    println!("可用命令:");
    println!("  join                      - 入座，凑满人数后自动开局");
    println!("  play <真牌数> <假牌数>    - 出牌，对外宣称两者之和");
    println!("  bluff                     - 质疑上一位的出牌");
    println!("  status                    - 查看当前状态和自己的手牌");
    println!("  exit                      - 退出");

    loop {
        prompt()?;

        let Some(line) = stdin.next_line().await? else { break };
        let parts: Vec<&str> = line.split_whitespace().collect();

        let player_msg = match parts.as_slice() {
            ["join"] => PlayerMessage::Join,
            ["play", actual, fake] => match (actual.parse(), fake.parse()) {
                (Ok(actual), Ok(fake)) => PlayerMessage::SubmitClaim { actual, fake },
                _ => {
                    println!("无效的牌数: {} {}", actual, fake);
                    continue;
                }
            },
            ["play", ..] => {
                println!("用法: play <真牌数> <假牌数>");
                continue;
            }
            ["bluff"] => PlayerMessage::Challenge,
            ["status"] => PlayerMessage::Status,
            ["exit"] => {
                println!("正在断开连接...");
                let payload = serde_json::to_string(&PlayerMessage::Disconnect)?;
                write.send(Message::Text(payload.into())).await?;
                break;
            }
            [] => continue,
            _ => {
                println!("未知命令: {}", line);
                continue;
            }
        };

        let payload = serde_json::to_string(&player_msg)?;
        write.send(Message::Text(payload.into())).await?;
    }

    let _ = write.close().await;
    Ok(())
}
