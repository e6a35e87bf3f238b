use async_trait::async_trait;
use fuzzy_matcher::{skim::SkimMatcherV2, FuzzyMatcher};
use lofty::prelude::*;
use rand::seq::SliceRandom;
use serenity::{
    builder::CreateEmbed,
    model::{id::UserId, mention::Mentionable},
};
use songbird::input::{File, Input};
use std::{
    borrow::Cow,
    collections::HashSet,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::{
    audio::{
        error::PlayerError,
        track::{format_length, Playable, UNKNOWN_PLACEHOLDER},
    },
    ui::embeds::colors,
};

/// Discord rejects more autocomplete choices than this.
pub const AUTOCOMPLETE_LIMIT: usize = 25;
/// Maximum length of an autocomplete choice.
pub const CHOICE_MAX_CHARS: usize = 100;

/// Tag metadata of one file in the music folder.
#[derive(Debug, Clone, PartialEq)]
pub struct SongData {
    pub path: PathBuf,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub track_num: Option<u32>,
    pub duration: Option<Duration>,
}

impl SongData {
    fn read(path: &Path) -> Option<Self> {
        let tagged = match lofty::read_from_path(path) {
            Ok(tagged) => tagged,
            Err(e) => {
                debug!("Skipping {}: {}", path.display(), e);
                return None;
            }
        };

        let tag = tagged.primary_tag().or_else(|| tagged.first_tag());

        let title = tag
            .and_then(|t| tag_text(t.title()))
            .or_else(|| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(|| UNKNOWN_PLACEHOLDER.to_string());

        let duration = tagged.properties().duration();

        Some(Self {
            path: path.to_path_buf(),
            title,
            artist: tag.and_then(|t| tag_text(t.artist())),
            album: tag.and_then(|t| tag_text(t.album())),
            track_num: tag.and_then(|t| t.track()),
            duration: (!duration.is_zero()).then_some(duration),
        })
    }

    pub fn field(&self, field: SongField) -> Option<&str> {
        match field {
            SongField::Title => Some(&self.title),
            SongField::Artist => self.artist.as_deref(),
            SongField::Album => self.album.as_deref(),
        }
    }

    /// Album order: track number (unnumbered last), then title.
    fn album_order(&self) -> (u32, String) {
        (self.track_num.unwrap_or(u32::MAX), self.title.to_lowercase())
    }
}

fn tag_text(value: Option<Cow<'_, str>>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SongField {
    Title,
    Artist,
    Album,
}

impl SongField {
    /// Maps a `play-local` option name to its field.
    pub fn from_option(name: &str) -> Option<Self> {
        match name {
            "title" => Some(Self::Title),
            "artist" => Some(Self::Artist),
            "album" => Some(Self::Album),
            _ => None,
        }
    }
}

/// Searchable index of the local music folder.
pub struct LocalLibrary {
    songs: Vec<SongData>,
    matcher: SkimMatcherV2,
}

impl LocalLibrary {
    /// Walks `dir` and reads the tags of every file lofty understands.
    pub fn scan(dir: &Path) -> Self {
        let songs: Vec<SongData> = WalkDir::new(dir)
            .follow_links(true)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| SongData::read(entry.path()))
            .collect();

        info!("📚 Indexed {} local songs from {}", songs.len(), dir.display());
        Self::from_songs(songs)
    }

    pub fn from_songs(songs: Vec<SongData>) -> Self {
        Self {
            songs,
            matcher: SkimMatcherV2::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    /// Songs matching every non-empty filter, best match first.
    ///
    /// A candidate whose field is shorter than the query never matches, so
    /// searching "Mezzanine" won't hit an album called "Me".
    pub fn find_possible_songs(
        &self,
        title: Option<&str>,
        album: Option<&str>,
        artist: Option<&str>,
    ) -> Vec<&SongData> {
        let filters: Vec<(SongField, String)> = [
            (SongField::Title, title),
            (SongField::Album, album),
            (SongField::Artist, artist),
        ]
        .into_iter()
        .filter_map(|(field, query)| {
            let query = query?.trim();
            (!query.is_empty()).then(|| (field, query.to_lowercase()))
        })
        .collect();

        let mut scored: Vec<(&SongData, i64)> = self
            .songs
            .iter()
            .filter_map(|song| {
                filters.iter().try_fold(0, |total, (field, query)| {
                    let value = song.field(*field)?.to_lowercase();
                    if value.chars().count() < query.chars().count() {
                        return None;
                    }
                    Some(total + self.matcher.fuzzy_match(&value, query)?)
                })
                .map(|score| (song, score))
            })
            .collect();

        scored.sort_by(|a, b| b.1.cmp(&a.1));
        scored.into_iter().map(|(song, _)| song).collect()
    }

    /// Sorts an album's songs into playback order.
    pub fn album_order(songs: &mut [&SongData]) {
        songs.sort_by_key(|song| song.album_order());
    }

    /// Autocomplete choices for `field`.
    ///
    /// `others` holds the values already entered in the other options; only
    /// songs matching them exactly are suggested. With no input at all a
    /// random sample is returned.
    pub fn autocomplete(
        &self,
        field: SongField,
        partial: &str,
        others: &[(SongField, String)],
    ) -> Vec<String> {
        let partial = partial.trim();
        let others: Vec<&(SongField, String)> =
            others.iter().filter(|(_, value)| !value.trim().is_empty()).collect();

        if partial.is_empty() && others.is_empty() {
            let values = self.distinct(field, self.songs.iter());
            return values
                .choose_multiple(&mut rand::thread_rng(), AUTOCOMPLETE_LIMIT)
                .map(|value| truncate_choice(value))
                .collect();
        }

        let mut candidates: Vec<&SongData> = self
            .songs
            .iter()
            .filter(|song| {
                others
                    .iter()
                    .all(|(other, value)| song.field(*other) == Some(value.as_str()))
            })
            .collect();
        Self::album_order(&mut candidates);

        let partial_len = partial.chars().count();
        let values: Vec<&str> = self
            .distinct(field, candidates.into_iter())
            .into_iter()
            .filter(|value| value.chars().count() >= partial_len)
            .collect();

        let ranked: Vec<&str> = if partial.is_empty() {
            values
        } else {
            let query = partial.to_lowercase();
            let mut scored: Vec<(&str, i64)> = values
                .into_iter()
                .filter_map(|value| {
                    self.matcher
                        .fuzzy_match(&value.to_lowercase(), &query)
                        .map(|score| (value, score))
                })
                .collect();
            scored.sort_by(|a, b| b.1.cmp(&a.1));
            scored.into_iter().map(|(value, _)| value).collect()
        };

        ranked
            .into_iter()
            .take(AUTOCOMPLETE_LIMIT)
            .map(truncate_choice)
            .collect()
    }

    /// Distinct values of `field`, in first-seen order.
    fn distinct<'a>(
        &self,
        field: SongField,
        songs: impl Iterator<Item = &'a SongData>,
    ) -> Vec<&'a str> {
        let mut seen = HashSet::new();
        songs
            .filter_map(|song| song.field(field))
            .filter(|value| seen.insert(*value))
            .collect()
    }
}

fn truncate_choice(value: &str) -> String {
    value.chars().take(CHOICE_MAX_CHARS).collect()
}

/// A song from the local music folder.
#[derive(Debug)]
pub struct LocalTrack {
    song: SongData,
    requester: UserId,
}

impl LocalTrack {
    pub fn new(song: SongData, requester: UserId) -> Self {
        Self { song, requester }
    }
}

#[async_trait]
impl Playable for LocalTrack {
    async fn generate_source(&self) -> Result<Input, PlayerError> {
        if !self.song.path.is_file() {
            return Err(PlayerError::Resolution(format!(
                "**{}** is no longer in the music folder",
                self.song.title
            )));
        }
        Ok(File::new(self.song.path.clone()).into())
    }

    fn create_embed(&self) -> CreateEmbed {
        let track_num = self
            .song
            .track_num
            .map(|n| n.to_string())
            .unwrap_or_else(|| "N/A".to_string());

        CreateEmbed::new()
            .title("Now playing")
            .description(&self.song.title)
            .color(colors::LOCAL)
            .field("#", track_num, true)
            .field("Artist", self.song.artist.as_deref().unwrap_or(UNKNOWN_PLACEHOLDER), true)
            .field("Album", self.song.album.as_deref().unwrap_or(UNKNOWN_PLACEHOLDER), true)
            .field("Duration", format_length(self.song.duration), true)
            .field("Requested by", self.requester.mention().to_string(), true)
    }

    fn name(&self) -> &str {
        &self.song.title
    }

    fn url(&self) -> Option<&str> {
        None
    }

    fn length(&self) -> Option<Duration> {
        self.song.duration
    }

    fn author(&self) -> Option<&str> {
        self.song.artist.as_deref()
    }

    fn requester(&self) -> UserId {
        self.requester
    }
}
