use crate::config::toml_config::{AppConfig, DEFAULT_CONFIG_FILE};
use crate::utils::error::Result;
use crate::utils::validation::{validate_file_extension, validate_path, Validate};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "data-smith")]
#[command(about = "Configure and run LLM-driven CSV column enhancement", version)]
pub struct CliConfig {
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    #[arg(long, global = true, help = "Override [service] base_url")]
    pub api_base_url: Option<String>,

    #[arg(long, global = true, help = "Override [output] path")]
    pub output_path: Option<String>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Upload a CSV, build a configuration and submit it for processing
    Run(RunArgs),
    /// Fetch a result file produced by an earlier run
    Download {
        result_file: String,
    },
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    #[arg(long)]
    pub input: PathBuf,

    /// Natural-language description of the transformation
    #[arg(long)]
    pub instruction: Option<String>,

    #[arg(long)]
    pub dataset_description: Option<String>,

    /// JSON file holding a transformation in wire format
    #[arg(long)]
    pub transformation: Option<PathBuf>,

    #[arg(long, allow_negative_numbers = true)]
    pub generate_rows: Option<i64>,

    /// Print the plan without submitting
    #[arg(long)]
    pub dry_run: bool,
}

impl CliConfig {
    /// 讀取 TOML 後以命令列參數覆寫
    pub fn resolve(&self) -> Result<AppConfig> {
        let mut config = AppConfig::load_or_default(&self.config)?;

        if let Some(base_url) = &self.api_base_url {
            config.service.base_url = base_url.clone();
        }
        if let Some(output_path) = &self.output_path {
            config.output.path = output_path.clone();
        }
        if self.log_json {
            config.logging.json = true;
        }

        config.validate()?;
        Ok(config)
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        if let Command::Run(args) = &self.command {
            let input = args.input.to_string_lossy();
            validate_path("input", &input)?;
            validate_file_extension("input", &input, &["csv"])?;

            if let Some(transformation) = &args.transformation {
                validate_file_extension("transformation", &transformation.to_string_lossy(), &["json"])?;
            }
        }
        Ok(())
    }
}
