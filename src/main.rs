use clap::Parser;
use option_price_fetcher::core::render::preview_table;
use option_price_fetcher::utils::logger::{self, LogFormat};
use option_price_fetcher::utils::validation::Validate;
use option_price_fetcher::{CliConfig, EtlEngine, LocalStorage, QuoteLookup, QuotePipeline, YahooClient};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = CliConfig::parse();

    // 初始化日誌
    let log_format = if config.log_json {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };
    logger::init_logger(config.verbose, log_format);

    tracing::info!("Starting option-price-fetcher");
    tracing::debug!("CLI config: {:?}", config);

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    // 輸入路徑轉為絕對路徑，避免被輸出目錄當成根目錄
    config.input = std::path::absolute(&config.input)?
        .to_string_lossy()
        .into_owned();

    let monitor_enabled = config.monitor;
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let client = match YahooClient::builder(&config.api_endpoint)
        .crumb(config.crumb.clone())
        .timeout(Duration::from_secs(config.timeout_seconds))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };
    let lookup = QuoteLookup::new(client).with_request_delay(Duration::from_millis(config.request_delay_ms));

    // 創建存儲和管道
    let show_preview = !config.no_preview;
    let storage = LocalStorage::new(config.output_path.clone());
    let pipeline = QuotePipeline::new(storage, config, lookup);

    // 創建ETL引擎並運行
    let engine = EtlEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(report) => {
            if show_preview {
                println!("{}", preview_table(&report.priced_rows));
                println!();
            }
            let summary = &report.summary;
            println!(
                "✅ Done! {} rows: {} priced, {} without match, {} errors",
                summary.total, summary.success, summary.no_match, summary.errors
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
