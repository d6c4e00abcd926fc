//! Parsers for the documents a run captures: HTML for link discovery and robots.txt for
//! sitemap declarations. Sitemaps and llms.txt are kept raw.

pub mod html;
pub mod robots;

#[cfg(test)]
mod tests;
