use anyhow::Context;
use clap::Parser;
use option_price_fetcher::config::toml_config::TomlConfig;
use option_price_fetcher::core::columns::ColumnMap;
use option_price_fetcher::core::render::preview_table;
use option_price_fetcher::core::spreadsheet::{normalize_rows, read_sheet, InputFormat};
use option_price_fetcher::core::{ConfigProvider, Storage};
use option_price_fetcher::utils::{logger, validation::Validate};
use option_price_fetcher::{EtlEngine, LocalStorage, QuoteLookup, QuotePipeline, YahooClient};
use std::collections::HashSet;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "toml-etl")]
#[command(about = "Option price fetcher driven by a TOML configuration file")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "quotes.toml")]
    config: String,

    /// Override the input file from config
    #[arg(short, long)]
    input: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Dry run - show what would be processed without calling the quote provider
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 初始化日誌
    logger::init_cli_logger(args.verbose);

    tracing::info!("🚀 Starting TOML-based option price fetcher");
    tracing::info!("📁 Loading configuration from: {}", args.config);

    // 載入 TOML 配置
    let mut config = match TomlConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 應用命令列覆蓋設定
    if let Some(input) = &args.input {
        config.input.path = Some(input.clone());
        tracing::info!("🔧 Input overridden to: {}", input);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    if let Some(path) = config.input.path.clone() {
        let absolute = std::path::absolute(&path)
            .with_context(|| format!("resolving input path '{}'", path))?;
        config.input.path = Some(absolute.to_string_lossy().into_owned());
    }

    tracing::info!("✅ Configuration loaded and validated successfully");

    display_config_summary(&config, &args);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No quotes will be fetched");
        perform_dry_run(&config).await?;
        return Ok(());
    }

    // 決定監控設定
    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let client = YahooClient::builder(config.api_endpoint())
        .crumb(config.crumb())
        .user_agent(config.user_agent())
        .timeout(Duration::from_secs(config.timeout_seconds()))
        .build()
        .context("building quote provider client")?;
    let lookup =
        QuoteLookup::new(client).with_request_delay(Duration::from_millis(config.request_delay_ms()));

    let storage = LocalStorage::new(config.output_path().to_string());
    let pipeline = QuotePipeline::new(storage, config, lookup);
    let engine = EtlEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(report) => {
            println!("{}", preview_table(&report.priced_rows));
            println!();
            println!(
                "✅ Done! {} rows: {} priced, {} without match, {} errors",
                report.summary.total, report.summary.success, report.summary.no_match, report.summary.errors
            );
            println!("📁 Output saved to: {}", report.output_path);
        }
        Err(e) => {
            // 記錄詳細錯誤信息
            tracing::error!(
                "❌ Run failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("{}", e.cli_report());

            let exit_code = e.exit_code();
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

fn display_config_summary(config: &TomlConfig, args: &Args) {
    println!("📋 Configuration Summary:");
    println!(
        "  Pipeline: {} v{}",
        config.pipeline.name, config.pipeline.version
    );
    println!("  Source: {}", config.api_endpoint());
    println!("  Input: {}", config.input_path());
    println!("  Output: {}", config.output_path());
    println!("  Formats: {}", config.load.output_formats.join(", "));
    if config.compress_output() {
        println!("  Compression: {} (ZIP)", config.zip_filename());
    }
    println!("  Request delay: {}ms", config.request_delay_ms());

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
}

async fn perform_dry_run(config: &TomlConfig) -> anyhow::Result<()> {
    println!("🔍 Dry Run Analysis:");
    println!();

    let input_path = config.input_path();
    let format = InputFormat::from_path(input_path)?;
    let storage = LocalStorage::new(".".to_string());
    let bytes = storage
        .read_file(input_path)
        .await
        .with_context(|| format!("reading input '{}'", input_path))?;
    let sheet = read_sheet(bytes, format)?;

    // 欄位解析
    let overrides = config.column_overrides();
    let columns = ColumnMap::resolve(&sheet.headers, &overrides)?;
    println!("📄 Input Analysis:");
    println!("  Format: {:?}", format);
    println!("  Columns: {}", sheet.headers.join(", "));
    println!(
        "  Resolved: symbol='{}', expiry='{}', cp='{}', strike='{}'",
        sheet.headers[columns.symbol],
        sheet.headers[columns.expiry],
        sheet.headers[columns.option_type],
        sheet.headers[columns.strike]
    );
    let extra = columns.extra_headers();
    if !extra.is_empty() {
        println!("  Pass-through columns: {}", extra.join(", "));
    }

    let extracted = normalize_rows(sheet, &overrides)?;
    let valid: Vec<_> = extracted
        .rows
        .iter()
        .filter_map(|row| row.request.as_ref().ok())
        .collect();
    let symbols: HashSet<&str> = valid.iter().map(|r| r.symbol.as_str()).collect();
    let chains: HashSet<(&str, chrono::NaiveDate)> =
        valid.iter().map(|r| (r.symbol.as_str(), r.expiry)).collect();

    println!();
    println!("📊 Rows:");
    println!("  Total: {}", extracted.rows.len());
    println!("  Parseable: {}", valid.len());
    for row in extracted.rows.iter().filter(|row| row.request.is_err()) {
        if let Err(reason) = &row.request {
            println!("  ⚠️ Row {}: {}", row.row_number, reason);
        }
    }

    println!();
    println!("📡 Provider requests (upper bound):");
    println!("  Expiration lookups: {}", symbols.len());
    println!("  Chain lookups: {}", chains.len());

    println!();
    println!("✅ Dry run analysis complete. Use --verbose for more details during actual run.");

    Ok(())
}
