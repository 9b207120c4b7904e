use once_cell::sync::Lazy;
use std::collections::HashMap;
use tracing::{debug, trace};

use crate::models::{
    ContainerHint, EpisodeNavigationContext, SourceDescriptor, TranslationEntry, TranslationKind,
};
use crate::utils::{PlayerError, PlayerResult};

/// Fixed request headers each hosting provider expects.
static HOST_HEADERS: Lazy<HashMap<&'static str, &'static [(&'static str, &'static str)]>> =
    Lazy::new(|| {
        let mut table: HashMap<&'static str, &'static [(&'static str, &'static str)]> =
            HashMap::new();
        table.insert(
            "aniboom",
            &[
                ("Referer", "https://aniboom.one/"),
                ("Origin", "https://aniboom.one"),
                ("Accept-Language", "ru-RU"),
            ],
        );
        table.insert("sibnet", &[("Referer", "https://video.sibnet.ru/")]);
        table.insert("kodik", &[("Referer", "https://kodik.info/")]);
        table
    });

/// Domain suffixes used to recognise a host when the catalogue's hosting label is unknown.
static HOST_DOMAINS: &[(&str, &str)] = &[
    ("aniboom.one", "aniboom"),
    ("sibnet.ru", "sibnet"),
    ("kodik.info", "kodik"),
    ("kodikres.com", "kodik"),
];

/// Request headers for a source served by `hosting` from `url`.
pub fn headers_for(hosting: &str, url: &str) -> Vec<(String, String)> {
    let key = hosting.trim().to_ascii_lowercase();
    let host_key = if HOST_HEADERS.contains_key(key.as_str()) {
        Some(key)
    } else {
        host_from_url(url)
    };

    host_key
        .and_then(|key| HOST_HEADERS.get(key.as_str()))
        .map(|headers| {
            headers
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect()
        })
        .unwrap_or_default()
}

fn host_from_url(raw: &str) -> Option<String> {
    let parsed = url::Url::parse(raw).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    HOST_DOMAINS
        .iter()
        .find(|(domain, _)| host == *domain || host.ends_with(&format!(".{}", domain)))
        .map(|(_, key)| key.to_string())
}

/// Numeric height of a quality label ("1080p" -> 1080); 0 when there is none.
pub fn quality_rank(label: &str) -> u32 {
    label
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect::<String>()
        .parse()
        .unwrap_or(0)
}

fn quality_matches(advertised: &str, requested: &str) -> bool {
    if advertised.trim().eq_ignore_ascii_case(requested.trim()) {
        return true;
    }
    let rank = quality_rank(advertised);
    rank > 0 && rank == quality_rank(requested)
}

/// Turns the advertised catalogue for a series into playable source descriptors.
#[derive(Debug, Clone, Default)]
pub struct SourceResolver {
    entries: Vec<TranslationEntry>,
    context: EpisodeNavigationContext,
}

impl SourceResolver {
    pub fn new(entries: Vec<TranslationEntry>, context: EpisodeNavigationContext) -> Self {
        Self { entries, context }
    }

    pub fn context(&self) -> EpisodeNavigationContext {
        self.context
    }

    pub fn set_context(&mut self, context: EpisodeNavigationContext) {
        self.context = context;
    }

    pub fn set_catalogue(
        &mut self,
        entries: Vec<TranslationEntry>,
        context: EpisodeNavigationContext,
    ) {
        debug!(
            "Catalogue replaced: {} entries, {} episodes",
            entries.len(),
            context.total_episodes
        );
        self.entries = entries;
        self.context = context;
    }

    pub fn resolve(
        &self,
        episode: u32,
        kind: TranslationKind,
        quality: &str,
    ) -> PlayerResult<SourceDescriptor> {
        self.resolve_preferring(episode, kind, quality, None)
    }

    /// Like [`resolve`](Self::resolve), preferring entries from `author` when
    /// several studios offer the same kind and quality.
    pub fn resolve_preferring(
        &self,
        episode: u32,
        kind: TranslationKind,
        quality: &str,
        author: Option<&str>,
    ) -> PlayerResult<SourceDescriptor> {
        let unavailable = || PlayerError::SourceUnavailable {
            episode,
            kind,
            quality: quality.to_string(),
        };

        if !self.context.contains(episode) {
            return Err(unavailable());
        }

        let mut candidates = self.entries.iter().filter(|entry| {
            entry.episode == episode && entry.kind == kind && quality_matches(&entry.quality, quality)
        });

        let entry = match author {
            Some(author) => {
                let all: Vec<&TranslationEntry> = candidates.collect();
                all.iter()
                    .find(|entry| entry.author == author)
                    .or_else(|| all.first())
                    .copied()
            }
            None => candidates.next(),
        }
        .ok_or_else(unavailable)?;

        trace!(
            "Resolved episode {} {} {} to {} ({})",
            episode, kind, quality, entry.url, entry.hosting
        );

        Ok(SourceDescriptor {
            url: entry.url.clone(),
            episode,
            kind,
            quality: entry.quality.clone(),
            hosting: entry.hosting.clone(),
            author: entry.author.clone(),
            target_id: entry.target_id.clone(),
            headers: headers_for(&entry.hosting, &entry.url),
            container: ContainerHint::from_url(&entry.url),
            embed_url: entry.page_url.clone().unwrap_or_else(|| entry.url.clone()),
        })
    }

    /// Qualities advertised for an episode and kind, best first.
    pub fn available_qualities(&self, episode: u32, kind: TranslationKind) -> Vec<String> {
        let mut qualities: Vec<String> = Vec::new();
        for entry in self
            .entries
            .iter()
            .filter(|entry| entry.episode == episode && entry.kind == kind)
        {
            if !qualities.iter().any(|q| quality_matches(q, &entry.quality)) {
                qualities.push(entry.quality.clone());
            }
        }
        qualities.sort_by_key(|q| std::cmp::Reverse(quality_rank(q)));
        qualities
    }

    pub fn available_kinds(&self, episode: u32) -> Vec<TranslationKind> {
        let mut kinds: Vec<TranslationKind> = Vec::new();
        for entry in self.entries.iter().filter(|entry| entry.episode == episode) {
            if !kinds.contains(&entry.kind) {
                kinds.push(entry.kind);
            }
        }
        kinds
    }

    /// Quality to use when switching episode or kind: the current one if it is
    /// advertised, else the best one not above it, else the lowest on offer.
    pub fn quality_for_switch(
        &self,
        episode: u32,
        kind: TranslationKind,
        current_quality: &str,
    ) -> Option<String> {
        let qualities = self.available_qualities(episode, kind);
        if let Some(exact) = qualities.iter().find(|q| quality_matches(q, current_quality)) {
            return Some(exact.clone());
        }

        let current_rank = quality_rank(current_quality);
        qualities
            .iter()
            .find(|q| quality_rank(q) <= current_rank)
            .or_else(|| qualities.last())
            .cloned()
    }
}
