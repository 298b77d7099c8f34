//! 日誌系統初始化

use tracing_subscriber::{fmt, EnvFilter};

/// 依 `-v` 次數決定預設等級
fn default_level(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// 初始化日誌系統
///
/// 設定 `RUST_LOG` 時以環境變數為準，例如 `RUST_LOG=plan_optimizer=trace`。
/// 日誌輸出到 stderr，stdout 保留給指令結果。
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level(verbosity)));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
