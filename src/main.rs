//! # enviame-quote
//!
//! パッケージJSONを読み込み、Enviame の配送料金を見積もって標準出力にJSONで出す。
//! 通知は標準エラー出力に出す。

use clap::Parser;
use enviame_shipping::{
    api_key, carriers, config, init_logging, EnviameClient, NoticeLog, Package,
    ShippingRateQuoter,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// Quote shipping rates for a package through the Enviame pricing API.
#[derive(Debug, Parser)]
#[command(author, about = "Enviame shipping quote", long_about = None)]
struct Args {
    /// Directory holding `enviame_config.json` and `enviame_api_key.json`.
    ///
    /// A default configuration is written there on first use.
    #[arg(long, value_name = "DIR", env = "ENVIAME_CONFIG_DIR", default_value = ".")]
    config_dir: PathBuf,
    /// Package JSON file (destination and line items) to quote.
    #[arg(long, value_name = "FILE", required_unless_present_any(["api_key", "list_carriers"]))]
    package: Option<PathBuf>,
    /// Store the Enviame API key in the config directory and exit.
    #[arg(long, value_name = "KEY")]
    api_key: Option<String>,
    /// Print the known carrier codes and exit.
    #[arg(long)]
    list_carriers: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), String> {
    if args.list_carriers {
        for (code, name) in carriers::CARRIERS {
            println!("{code}\t{name}");
        }
        return Ok(());
    }

    if let Some(key) = args.api_key {
        return api_key::save_api_key(&args.config_dir, &key);
    }

    let package_path = args
        .package
        .ok_or_else(|| "--package is required".to_string())?;
    let contents = std::fs::read_to_string(&package_path)
        .map_err(|e| format!("Failed to read package file {}: {e}", package_path.display()))?;
    let package: Package =
        serde_json::from_str(&contents).map_err(|e| format!("Invalid package JSON: {e}"))?;

    let settings = config::load(&args.config_dir)?;
    let key = api_key::load_api_key(&args.config_dir)?;

    let notices = Arc::new(NoticeLog::new());
    let quoter = ShippingRateQuoter::new(settings, EnviameClient::new(key), Arc::clone(&notices));

    let rates = quoter.quote(&package).await;

    for notice in notices.notices() {
        eprintln!("[{:?}] {}", notice.level, notice.message);
    }

    let output = serde_json::to_string_pretty(&rates)
        .map_err(|e| format!("Failed to serialize rates: {e}"))?;
    println!("{output}");
    Ok(())
}
