use clap::Parser;
use data_smith::adapters::probe_csv;
use data_smith::config::{AppConfig, Command, RunArgs};
use data_smith::utils::error::{EnhancerError, ErrorSeverity};
use data_smith::utils::{logger, validation::Validate};
use data_smith::{
    Collaborator, ConfigIntent, ConfigOrchestrator, DatasetSchema, HttpCollaborator, LocalStorage,
    Notice, Result, Storage, WireConfig,
};
use std::path::Path;

#[tokio::main]
async fn main() {
    let cli = data_smith::CliConfig::parse();

    let app = match cli.resolve() {
        Ok(app) => app,
        Err(e) => {
            logger::init_cli_logger(cli.verbose, cli.log_json, None);
            tracing::error!("❌ Configuration loading failed: {}", e);
            exit_with(&e);
        }
    };

    // 初始化日誌
    logger::init_cli_logger(cli.verbose, app.logging.json, app.logging.level.as_deref());

    tracing::info!("Starting data-smith CLI");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
        tracing::debug!("Resolved config: {:?}", app);
    }

    // 驗證命令列參數
    if let Err(e) = cli.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        exit_with(&e);
    }

    let outcome = match &cli.command {
        Command::Run(args) => run(&app, args).await,
        Command::Download { result_file } => download(&app, result_file).await,
    };

    if let Err(e) = outcome {
        exit_with(&e);
    }
}

fn exit_with(e: &EnhancerError) -> ! {
    // 記錄詳細錯誤信息
    tracing::error!(
        "❌ data-smith failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    // 輸出用戶友好的錯誤信息
    eprintln!("{}", Notice::from(e));
    eprintln!("💡 建議: {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}

async fn run(app: &AppConfig, args: &RunArgs) -> Result<()> {
    let collaborator = HttpCollaborator::new(&app.service.base_url, app.timeout())?;

    // 讀取輸入檔案
    let directory = args
        .input
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = args
        .input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| EnhancerError::InvalidConfigValueError {
            field: "input".to_string(),
            value: args.input.display().to_string(),
            reason: "input must name a file".to_string(),
        })?;
    let bytes = LocalStorage::new(directory).read_file(&file_name).await?;
    let (_, row_count) = probe_csv(&bytes)?;

    let uploaded = collaborator.upload(&file_name, bytes).await?;
    println!(
        "📤 Uploaded {} ({} columns, {} rows)",
        uploaded.dataset_id,
        uploaded.columns.len(),
        row_count
    );

    let mut orchestrator = ConfigOrchestrator::new(app.debounce());
    orchestrator.accept_dataset(
        DatasetSchema::new(uploaded.dataset_id, uploaded.columns).with_row_count(row_count),
    );

    if let Some(path) = &args.transformation {
        let content = tokio::fs::read_to_string(path).await?;
        let generated = WireConfig::from_json_str(&content)?;
        orchestrator.apply(&ConfigIntent::MergeGenerated { generated })?;
        println!("✅ Loaded transformation from {}", path.display());
    }

    if let Some(instruction) = &args.instruction {
        let notice = orchestrator
            .generate_from_instruction(&collaborator, instruction, args.dataset_description.as_deref())
            .await?;
        println!("{}", notice);
    }

    if let Some(rows) = args.generate_rows {
        let description = args
            .dataset_description
            .clone()
            .unwrap_or_else(|| orchestrator.config().dataset_description().to_string());
        println!("{}", orchestrator.set_row_generation(rows, &description)?);
    }

    orchestrator.flush_editors();

    for view in orchestrator.column_views() {
        println!(
            "  • {}{}: batch {}, context [{}]{}",
            view.name,
            if view.is_new { " (new)" } else { "" },
            view.entry.batch_size.get(),
            view.entry.context_columns.join(", "),
            if view.entry.ignore_rows_with_existing_value {
                ", skipping rows with values"
            } else {
                ""
            }
        );
    }

    let prepared = orchestrator.prepare_submission()?;
    println!("📋 {}", prepared.plan.summary());
    if let Some(estimate) = prepared.plan.estimate_text() {
        println!("⏱️ Estimated processing time: {}", estimate);
    }

    if args.dry_run {
        println!("{}", prepared.wire.to_json_pretty()?);
        return Ok(());
    }

    let receipt = orchestrator.submit(&collaborator).await?;
    println!("🚀 Processing started: {}", receipt.result_file);

    // 只嘗試下載一次；還沒好就提示稍後再取
    match collaborator.download(&receipt.result_file).await {
        Ok(data) => save_result(app, &receipt.result_file, &data).await,
        Err(EnhancerError::NotFound { .. }) => {
            println!(
                "⏳ Result not ready yet. Fetch it later with: data-smith download {}",
                receipt.result_file
            );
            Ok(())
        }
        Err(e) => Err(e),
    }
}

async fn download(app: &AppConfig, result_file: &str) -> Result<()> {
    let collaborator = HttpCollaborator::new(&app.service.base_url, app.timeout())?;
    let data = collaborator.download(result_file).await?;
    save_result(app, result_file, &data).await
}

async fn save_result(app: &AppConfig, result_file: &str, data: &[u8]) -> Result<()> {
    let storage = LocalStorage::new(&app.output.path);
    storage.write_file(result_file, data).await?;

    let saved = storage.resolve(result_file)?;
    tracing::info!("✅ Result saved to: {}", saved.display());
    println!("✅ Result saved to: {}", saved.display());
    Ok(())
}
