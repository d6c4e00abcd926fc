pub mod site;

#[cfg(test)]
mod tests;

pub use site::{CrawlOutcome, CrawlStats, SiteCrawler};
