use clap::Parser;
use hotel_snapshot::RunInput;
use hotel_snapshot::error::ConfigError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "hotel-snapshot")]
#[command(about = "Captures a mobile snapshot and shallow crawl of a hotel website")]
#[command(version)]
pub struct Args {
    /// JSON input file; flags below override its fields
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Hotel identifier
    #[arg(long)]
    pub hotel_id: Option<String>,

    /// Hotel website domain, with or without scheme
    #[arg(short, long)]
    pub domain: Option<String>,

    /// Extra starting URL (repeatable)
    #[arg(long = "seed-url")]
    pub seed_urls: Vec<String>,

    /// Maximum number of content pages, homepage included
    #[arg(long)]
    pub max_pages: Option<i64>,

    /// Maximum link depth from the homepage
    #[arg(long)]
    pub max_depth: Option<i64>,

    #[arg(long)]
    pub max_requests_per_minute: Option<i64>,

    /// Don't keep page HTML in the output
    #[arg(long)]
    pub no_html: bool,

    /// Don't keep response headers in the output
    #[arg(long)]
    pub no_headers: bool,

    /// Skip the homepage screenshots (the run will be marked failed)
    #[arg(long)]
    pub no_screenshot: bool,

    /// Don't try to dismiss consent banners
    #[arg(long)]
    pub no_consent: bool,

    /// Verbose logging
    #[arg(long)]
    pub debug: bool,

    /// Directory for screenshots, the run document and the dataset
    #[arg(short, long, default_value = "./storage")]
    pub output_dir: PathBuf,

    /// WebDriver endpoint (defaults to $WEBDRIVER_URL or http://localhost:4444)
    #[arg(long)]
    pub webdriver_url: Option<String>,
}

impl Args {
    /// Builds the run input from the input file, if any, with flags applied on top
    pub fn to_run_input(&self) -> Result<RunInput, ConfigError> {
        let mut input = match &self.input {
            Some(path) => RunInput::from_file(path)?,
            None => RunInput::default(),
        };

        if let Some(hotel_id) = &self.hotel_id {
            input.hotel_id = hotel_id.clone();
        }
        if let Some(domain) = &self.domain {
            input.domain = domain.clone();
        }
        input.seed_urls.extend(self.seed_urls.iter().cloned());
        if let Some(max_pages) = self.max_pages {
            input.max_pages = max_pages;
        }
        if let Some(max_depth) = self.max_depth {
            input.max_depth = max_depth;
        }
        if let Some(rpm) = self.max_requests_per_minute {
            input.max_requests_per_minute = rpm;
        }
        if self.no_html {
            input.store_html = false;
        }
        if self.no_headers {
            input.store_headers = false;
        }
        if self.no_screenshot {
            input.take_home_mobile_screenshot = false;
        }
        if self.no_consent {
            input.try_dismiss_consent = false;
        }
        input.debug |= self.debug;

        Ok(input)
    }
}
