// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Release resolution: mapping an item title to a known series and episodes.
//!
//! Adapters only see the [`ReleaseResolver`] trait. Items whose title does not
//! resolve are dropped from listings; that is not an error.
//!
//! [`SceneTitleParser`] is a small standalone resolver for scene-style names
//! (`Series.Title.S01E02.720p-GRP`, `Series Title 1x02`), optionally limited
//! to a set of known series.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::RemoteEpisode;

/// Maps a title to a known release.
pub trait ReleaseResolver: Send + Sync {
    fn resolve(&self, title: &str) -> Option<RemoteEpisode>;
}

impl<F> ReleaseResolver for F
where
    F: Fn(&str) -> Option<RemoteEpisode> + Send + Sync,
{
    fn resolve(&self, title: &str) -> Option<RemoteEpisode> {
        self(title)
    }
}

/// `Title.S01E02E03` style.
static STANDARD_EPISODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?P<title>.+?)[ ._-]+s(?P<season>\d{1,2})(?P<episodes>(?:[ ._-]?e\d{1,3})+)(?:[ ._-]|$)")
        .expect("standard episode regex is valid")
});

/// `Title 1x02` style.
static CROSS_EPISODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?P<title>.+?)[ ._-]+(?P<season>\d{1,2})x(?P<episode>\d{1,3})(?:[ ._-]|$)")
        .expect("cross episode regex is valid")
});

static EPISODE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)e(\d{1,3})").expect("episode number regex is valid"));

/// Regex-based resolver for scene release names.
#[derive(Debug, Clone, Default)]
pub struct SceneTitleParser {
    /// Normalized series titles to accept; empty accepts any parsed series.
    known_series: Vec<String>,
}

impl SceneTitleParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only resolve titles belonging to one of these series.
    pub fn with_known_series<I, S>(mut self, series: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.known_series = series
            .into_iter()
            .map(|s| normalize_title(s.as_ref()))
            .collect();
        self
    }

    /// Parse a release title without checking it against known series.
    pub fn parse(&self, title: &str) -> Option<RemoteEpisode> {
        if let Some(caps) = STANDARD_EPISODE.captures(title) {
            let season = caps["season"].parse().ok()?;
            let episode_numbers: Vec<u32> = EPISODE_NUMBER
                .captures_iter(&caps["episodes"])
                .filter_map(|c| c[1].parse().ok())
                .collect();

            if episode_numbers.is_empty() {
                return None;
            }

            return Some(RemoteEpisode {
                series_title: display_title(&caps["title"]),
                season_number: season,
                episode_numbers,
            });
        }

        let caps = CROSS_EPISODE.captures(title)?;
        Some(RemoteEpisode {
            series_title: display_title(&caps["title"]),
            season_number: caps["season"].parse().ok()?,
            episode_numbers: vec![caps["episode"].parse().ok()?],
        })
    }
}

impl ReleaseResolver for SceneTitleParser {
    fn resolve(&self, title: &str) -> Option<RemoteEpisode> {
        let episode = self.parse(title)?;

        if self.known_series.is_empty()
            || self.known_series.contains(&normalize_title(&episode.series_title))
        {
            Some(episode)
        } else {
            tracing::trace!(title = %title, series = %episode.series_title, "Unknown series");
            None
        }
    }
}

fn display_title(raw: &str) -> String {
    raw.split(|c| c == '.' || c == '_' || c == ' ')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn normalize_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}
