//! The pending work of one run.
//!
//! Entries are deduplicated by their unique key for the lifetime of the frontier, so a URL is
//! visited at most once even when it is rediscovered after being dequeued. Special files use
//! keys prefixed with their kind, so a content link to the same URL never shadows them.

use crate::utils::canonicalize_url;
use std::collections::{HashSet, VecDeque};
use std::fmt;

/// Well-known metadata files fetched alongside content pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialFileKind {
    Robots,
    Sitemap,
    Llms,
}

impl SpecialFileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpecialFileKind::Robots => "robots.txt",
            SpecialFileKind::Sitemap => "sitemap.xml",
            SpecialFileKind::Llms => "llms.txt",
        }
    }
}

impl fmt::Display for SpecialFileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a queued request is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// The normalized homepage; always visited first
    Home,
    /// A content page at the given link depth
    Content { depth: u32, is_seed: bool },
    SpecialFile(SpecialFileKind),
}

/// A queued unit of work. Never mutated once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub url: String,
    /// Deduplication key; the canonical URL unless given explicitly
    pub unique_key: String,
    pub kind: RequestKind,
}

impl FrontierEntry {
    pub fn new(url: &str, kind: RequestKind) -> Self {
        Self {
            url: url.to_string(),
            unique_key: canonicalize_url(url),
            kind,
        }
    }

    pub fn home(url: &str) -> Self {
        Self::new(url, RequestKind::Home)
    }

    pub fn seed(url: &str) -> Self {
        Self::new(url, RequestKind::Content { depth: 0, is_seed: true })
    }

    pub fn link(url: &str, depth: u32) -> Self {
        Self::new(url, RequestKind::Content { depth, is_seed: false })
    }

    pub fn special(url: &str, kind: SpecialFileKind) -> Self {
        let key = format!("{kind}:{}", canonicalize_url(url));
        Self::new(url, RequestKind::SpecialFile(kind)).with_unique_key(&key)
    }

    pub fn with_unique_key(mut self, key: &str) -> Self {
        self.unique_key = key.to_string();
        self
    }
}

/// Where an entry lands in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    /// Ahead of everything already queued
    Front,
    Back,
}

/// FIFO queue with front insertion and key-based deduplication.
#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<FrontierEntry>,
    seen: HashSet<String>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an entry. Returns `false` when its key was already seen.
    pub fn enqueue(&mut self, entry: FrontierEntry, priority: Priority) -> bool {
        if !self.seen.insert(entry.unique_key.clone()) {
            ::log::trace!("Skipping already queued: {}", entry.url);
            return false;
        }
        match priority {
            Priority::Front => self.queue.push_front(entry),
            Priority::Back => self.queue.push_back(entry),
        }
        true
    }

    /// Queues several entries at the front, keeping their relative order.
    ///
    /// Returns the entries that were actually queued, in that order.
    pub fn enqueue_front_all(&mut self, entries: Vec<FrontierEntry>) -> Vec<FrontierEntry> {
        let mut added: Vec<FrontierEntry> = entries
            .into_iter()
            .rev()
            .filter(|entry| self.enqueue(entry.clone(), Priority::Front))
            .collect();
        added.reverse();
        added
    }

    pub fn dequeue(&mut self) -> Option<FrontierEntry> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Whether the key was ever enqueued
    pub fn has_seen(&self, unique_key: &str) -> bool {
        self.seen.contains(unique_key)
    }

    /// Drops everything still pending.
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_with_front_priority() {
        let mut frontier = Frontier::new();
        frontier.enqueue(FrontierEntry::link("https://a.com/1", 1), Priority::Back);
        frontier.enqueue(FrontierEntry::link("https://a.com/2", 1), Priority::Back);
        frontier.enqueue(
            FrontierEntry::special("https://a.com/robots.txt", SpecialFileKind::Robots),
            Priority::Front,
        );

        let order: Vec<String> = std::iter::from_fn(|| frontier.dequeue()).map(|e| e.url).collect();
        assert_eq!(
            order,
            vec!["https://a.com/robots.txt", "https://a.com/1", "https://a.com/2"]
        );
    }

    #[test]
    fn test_front_all_keeps_order() {
        let mut frontier = Frontier::new();
        frontier.enqueue(FrontierEntry::link("https://a.com/page", 1), Priority::Back);
        let added = frontier.enqueue_front_all(vec![
            FrontierEntry::special("https://a.com/robots.txt", SpecialFileKind::Robots),
            FrontierEntry::special("https://a.com/llms.txt", SpecialFileKind::Llms),
            FrontierEntry::special("https://a.com/robots.txt", SpecialFileKind::Robots),
        ]);
        let added: Vec<&str> = added.iter().map(|e| e.url.as_str()).collect();
        assert_eq!(added, vec!["https://a.com/robots.txt", "https://a.com/llms.txt"]);
        assert_eq!(frontier.dequeue().unwrap().url, "https://a.com/robots.txt");
        assert_eq!(frontier.dequeue().unwrap().url, "https://a.com/llms.txt");
        assert_eq!(frontier.dequeue().unwrap().url, "https://a.com/page");
    }

    #[test]
    fn test_dedup_by_canonical_key() {
        let mut frontier = Frontier::new();
        assert!(frontier.enqueue(FrontierEntry::link("https://a.com/x#top", 1), Priority::Back));
        assert!(!frontier.enqueue(FrontierEntry::link("https://a.com/x", 2), Priority::Back));
        assert_eq!(frontier.len(), 1);

        // Still deduplicated after the entry was consumed
        frontier.dequeue();
        assert!(!frontier.enqueue(FrontierEntry::link("https://a.com/x", 1), Priority::Back));
        assert!(frontier.has_seen("https://a.com/x"));
    }

    #[test]
    fn test_special_files_do_not_share_content_keys() {
        let mut frontier = Frontier::new();
        assert!(frontier.enqueue(FrontierEntry::link("https://a.com/sitemap.xml", 1), Priority::Back));
        let sitemap = FrontierEntry::special("https://a.com/sitemap.xml", SpecialFileKind::Sitemap);
        assert_eq!(sitemap.unique_key, "sitemap.xml:https://a.com/sitemap.xml");
        assert!(frontier.enqueue(sitemap.clone(), Priority::Front));
        assert!(!frontier.enqueue(sitemap, Priority::Front));
        assert!(frontier.has_seen("https://a.com/sitemap.xml"));
        assert_eq!(frontier.dequeue().unwrap().kind, RequestKind::SpecialFile(SpecialFileKind::Sitemap));
    }

    #[test]
    fn test_explicit_unique_key() {
        let mut frontier = Frontier::new();
        let a = FrontierEntry::link("https://a.com/x", 1).with_unique_key("one");
        let b = FrontierEntry::link("https://a.com/x", 1).with_unique_key("two");
        assert!(frontier.enqueue(a, Priority::Back));
        assert!(frontier.enqueue(b, Priority::Back));
        assert_eq!(frontier.len(), 2);
    }
}
