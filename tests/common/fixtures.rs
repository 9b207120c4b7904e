use kadr::models::{EpisodeNavigationContext, TargetId, TranslationEntry, TranslationKind};

pub const EPISODES: u32 = 12;
pub const DURATION_MS: u64 = 1_200_000;

pub struct Fixtures;

impl Fixtures {
    pub fn entry(episode: u32, kind: TranslationKind, quality: &str) -> TranslationEntry {
        TranslationEntry {
            episode,
            kind,
            hosting: "aniboom".to_string(),
            author: "AniDub".to_string(),
            quality: quality.to_string(),
            url: Self::url(episode, kind, quality),
            target_id: TargetId::new(format!("serial-{}", episode)),
            page_url: Some(format!("https://anime.example.org/watch/{}", episode)),
        }
    }

    pub fn url(episode: u32, kind: TranslationKind, quality: &str) -> String {
        format!(
            "https://cdn.example.org/{}/{}/{}/index.m3u8",
            episode, kind, quality
        )
    }

    /// Twelve episodes. Dubbed in 360/720/1080 everywhere, subtitled in
    /// 360/720 everywhere, and episode 12 has no 1080 dub.
    pub fn catalogue() -> Vec<TranslationEntry> {
        let mut entries = Vec::new();
        for episode in 1..=EPISODES {
            for quality in ["360", "720", "1080"] {
                if episode == EPISODES && quality == "1080" {
                    continue;
                }
                entries.push(Self::entry(episode, TranslationKind::Dubbed, quality));
            }
            for quality in ["360", "720"] {
                entries.push(Self::entry(episode, TranslationKind::Subtitled, quality));
            }
        }
        entries
    }

    pub fn context(episode: u32) -> EpisodeNavigationContext {
        EpisodeNavigationContext::new(episode, EPISODES)
    }
}
