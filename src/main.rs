use clap::Parser;
use hotel_snapshot::browser::webdriver::WebDriverPage;
use hotel_snapshot::config::WebDriverSettings;
use hotel_snapshot::store::{FsBlobStore, JsonlDataset};
use hotel_snapshot::{RunStatus, Snapshot};
use std::process::ExitCode;

mod args;
use args::Args;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let input = match args.to_run_input() {
        Ok(input) => input,
        Err(e) => {
            env_logger::init();
            ::log::error!("Invalid input: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // --debug raises the default level; RUST_LOG still wins when set
    let default_level = if input.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let snapshot = match Snapshot::new(&input) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            ::log::error!("Invalid input: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let config = snapshot.config();
    ::log::info!("Snapshotting {} for hotel {}", config.home_url, config.hotel_id);

    let store = FsBlobStore::new(args.output_dir.join("key_value_store"));
    let dataset = JsonlDataset::new(args.output_dir.join("dataset.jsonl"));

    let mut settings = WebDriverSettings::from_env();
    if let Some(url) = &args.webdriver_url {
        settings.webdriver_url = url.clone();
    }

    let result = match WebDriverPage::connect(&settings, &config.viewport, config.max_requests_per_minute).await {
        Ok(page) => {
            let result = snapshot.run(&page, &store, &dataset).await;
            page.close().await;
            result
        }
        Err(e) => {
            ::log::error!("Failed to start browser: {}", e);
            println!("Note: a WebDriver server (e.g., ChromeDriver) is required.");
            println!("Set WEBDRIVER_URL or --webdriver-url if not using http://localhost:4444");
            snapshot
                .record_failure(&format!("browser-unavailable: {e}"), &store, &dataset)
                .await
        }
    };

    match result {
        Ok(output) => {
            match output.status {
                RunStatus::Ok => ::log::info!(
                    "Snapshot complete: {} pages, {} warnings",
                    output.pages.len(),
                    output.warnings.len()
                ),
                RunStatus::Failed => ::log::warn!(
                    "Snapshot failed: {}",
                    output.error.as_deref().unwrap_or("unknown error")
                ),
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            ::log::error!("Failed to store run document: {}", e);
            ExitCode::FAILURE
        }
    }
}
