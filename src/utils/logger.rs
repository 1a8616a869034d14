use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 初始化 CLI 日誌；`level` 來自設定檔，優先順序低於 RUST_LOG
pub fn init_cli_logger(verbose: bool, json: bool, level: Option<&str>) {
    let default_directive = match (verbose, level) {
        (true, _) => "data_smith=debug,info".to_string(),
        (false, Some(level)) => format!("data_smith={}", level),
        (false, None) => "data_smith=info".to_string(),
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if json {
        // 給日誌收集器用的 JSON 格式
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.compact())
            .init();
    }
}
