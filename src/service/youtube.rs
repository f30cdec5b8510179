use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::{CatalogProvider, PlaylistDocument, RawItem};
use crate::normalize::format_duration;

const MUSIC_BASE_URL: &str = "https://music.youtube.com";

/// Availability values yt-dlp reports for entries that cannot be streamed
const UNAVAILABLE: [&str; 4] = ["private", "needs_auth", "premium_only", "subscriber_only"];

/// Placeholder titles YouTube uses for removed playlist entries
const REMOVED_TITLES: [&str; 2] = ["[Private video]", "[Deleted video]"];

/// YouTube Music catalog backed by yt-dlp.
///
/// Search results and playlists are fetched with `--flat-playlist` (metadata
/// only) and reshaped into the loosely-typed item layout the normalizer reads.
pub struct YtDlpCatalog {
    ytdlp_path: PathBuf,
    timeout: Duration,
}

impl YtDlpCatalog {
    /// Create a new catalog client
    ///
    /// This will error if yt-dlp is not found in PATH or at the configured path.
    pub async fn new(ytdlp_path: Option<&str>, timeout: Duration) -> Result<Self> {
        let path = match ytdlp_path {
            Some(p) => PathBuf::from(p),
            None => which::which("yt-dlp").unwrap_or_else(|_| PathBuf::from("yt-dlp")),
        };

        // Verify yt-dlp exists and is executable
        let check = Command::new(&path)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match check {
            Ok(status) if status.success() => Ok(Self {
                ytdlp_path: path,
                timeout,
            }),
            Ok(_) => Err(anyhow!(
                "yt-dlp found but returned error. Please ensure yt-dlp is properly installed."
            )),
            Err(_) => Err(anyhow!(
                "yt-dlp not found at '{}'. The catalog requires yt-dlp to be installed.\n\
                 Install via: nix-shell -p yt-dlp, brew install yt-dlp, or pip install yt-dlp",
                path.display()
            )),
        }
    }

    pub fn search_url(query: &str) -> String {
        format!("{}/search?q={}", MUSIC_BASE_URL, urlencoding::encode(query))
    }

    pub fn playlist_url(playlist_id: &str) -> String {
        format!(
            "{}/playlist?list={}",
            MUSIC_BASE_URL,
            urlencoding::encode(playlist_id)
        )
    }

    // === yt-dlp Helper Methods ===

    /// Execute yt-dlp and return its stdout.
    ///
    /// The child is killed if the call times out or the caller goes away.
    async fn run_ytdlp(&self, args: &[&str]) -> Result<String> {
        let child = Command::new(&self.ytdlp_path)
            .args(args)
            .args(["--no-warnings"])
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| anyhow!("yt-dlp timed out after {}s", self.timeout.as_secs()))?
            .context("Failed to run yt-dlp")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("yt-dlp failed: {}", stderr.trim()));
        }

        String::from_utf8(output.stdout).context("yt-dlp produced invalid UTF-8")
    }

    /// Execute yt-dlp with `-j` and parse each output line
    async fn run_ytdlp_lines(&self, args: &[&str]) -> Result<Vec<Value>> {
        let stdout = self.run_ytdlp(args).await?;
        Ok(stdout
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }

    /// Execute yt-dlp with `-J` and parse the single document
    async fn run_ytdlp_single(&self, args: &[&str]) -> Result<Value> {
        let stdout = self.run_ytdlp(args).await?;
        serde_json::from_str(stdout.trim()).context("yt-dlp returned malformed JSON")
    }

    // === Reshaping ===

    /// Turn one flat search entry into a raw catalog item.
    ///
    /// The entry URL decides the kind: watch pages are songs, `list=` pages
    /// are playlists (or albums for auto-generated album lists), channel and
    /// browse pages keep their browse id.
    pub(crate) fn search_entry_to_raw(entry: &Value) -> RawItem {
        let url = entry
            .get("url")
            .or_else(|| entry.get("webpage_url"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let id = entry.get("id").and_then(Value::as_str).unwrap_or_default();

        let mut item = Map::new();

        if url.contains("/watch") || entry.get("ie_key").and_then(Value::as_str) == Some("Youtube") {
            let video_id = query_param(url, "v").unwrap_or(id);
            let kind = if url.starts_with(MUSIC_BASE_URL) { "song" } else { "video" };
            item.insert("videoId".into(), json!(video_id));
            item.insert("resultType".into(), json!(kind));
        } else if let Some(list) = query_param(url, "list") {
            // Auto-generated album lists
            let kind = if list.starts_with("OLAK5uy_") { "album" } else { "playlist" };
            item.insert("playlistId".into(), json!(list));
            item.insert("resultType".into(), json!(kind));
        } else if url.contains("/channel/") || id.starts_with("UC") {
            item.insert("browseId".into(), json!(id));
            item.insert("resultType".into(), json!("channel"));
        } else {
            let browse_id = url.rsplit("/browse/").next().filter(|b| *b != url).unwrap_or(id);
            let kind = if browse_id.starts_with("MPRE") {
                Some("album")
            } else if browse_id.starts_with("VL") {
                Some("playlist")
            } else if browse_id.starts_with("MPSP") {
                Some("podcast")
            } else {
                None
            };
            item.insert("browseId".into(), json!(browse_id));
            if let Some(kind) = kind {
                item.insert("resultType".into(), json!(kind));
            }
        }

        if let Some(title) = entry.get("title") {
            item.insert("title".into(), title.clone());
        }
        item.insert("artists".into(), Value::Array(entry_artists(entry)));
        if let Some(thumbnails) = entry.get("thumbnails") {
            item.insert("thumbnails".into(), thumbnails.clone());
        }
        if let Some(duration) = entry.get("duration").filter(|d| !d.is_null()) {
            item.insert("duration".into(), duration.clone());
        }
        if let Some(album) = entry.get("album").and_then(Value::as_str) {
            item.insert("album".into(), json!({ "name": album }));
        }

        Value::Object(item)
    }

    /// Reshape a `-J` playlist dump into a playlist document.
    pub(crate) fn playlist_to_document(info: &Value, playlist_id: &str) -> PlaylistDocument {
        let tracks: Vec<Value> = info
            .get("entries")
            .and_then(Value::as_array)
            .map(|entries| entries.iter().map(Self::playlist_entry_to_track).collect())
            .unwrap_or_default();

        json!({
            "id": info.get("id").and_then(Value::as_str).unwrap_or(playlist_id),
            "title": info.get("title").cloned().unwrap_or(Value::Null),
            "description": info.get("description").cloned().unwrap_or(Value::Null),
            "author": info
                .get("uploader")
                .or_else(|| info.get("channel"))
                .cloned()
                .unwrap_or(Value::Null),
            "trackCount": tracks.len(),
            "tracks": tracks,
        })
    }

    fn playlist_entry_to_track(entry: &Value) -> Value {
        let title = entry.get("title").and_then(Value::as_str);
        let restricted = entry
            .get("availability")
            .and_then(Value::as_str)
            .map(|a| UNAVAILABLE.contains(&a))
            .unwrap_or(false);
        let removed = title.map(|t| REMOVED_TITLES.contains(&t)).unwrap_or(false);
        let seconds = entry.get("duration").and_then(Value::as_f64).map(|d| d as u64);

        json!({
            "videoId": entry.get("id").cloned().unwrap_or(Value::Null),
            "title": title,
            "artists": entry_artists(entry),
            "duration": seconds.map(format_duration),
            "duration_seconds": seconds,
            "thumbnails": entry.get("thumbnails").cloned().unwrap_or_else(|| json!([])),
            "isAvailable": !(restricted || removed),
        })
    }
}

/// Artist list from yt-dlp metadata, falling back to the uploading channel
fn entry_artists(entry: &Value) -> Vec<Value> {
    if let Some(artists) = entry.get("artists").and_then(Value::as_array) {
        let named: Vec<Value> = artists
            .iter()
            .filter_map(Value::as_str)
            .map(|name| json!({ "name": name }))
            .collect();
        if !named.is_empty() {
            return named;
        }
    }

    entry
        .get("channel")
        .or_else(|| entry.get("uploader"))
        .and_then(Value::as_str)
        .map(|name| {
            vec![json!({
                "name": name.trim_end_matches(" - Topic"),
                "id": entry.get("channel_id").cloned().unwrap_or(Value::Null),
            })]
        })
        .unwrap_or_default()
}

fn query_param<'a>(url: &'a str, key: &str) -> Option<&'a str> {
    let (_, query) = url.split_once('?')?;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v)
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl CatalogProvider for YtDlpCatalog {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<RawItem>> {
        let url = Self::search_url(query);
        let end = limit.to_string();
        let entries = self
            .run_ytdlp_lines(&["--flat-playlist", "-j", "--playlist-end", &end, &url])
            .await
            .with_context(|| format!("Catalog search for '{}' failed", query))?;

        Ok(entries.iter().map(Self::search_entry_to_raw).collect())
    }

    async fn get_playlist(&self, playlist_id: &str) -> Result<PlaylistDocument> {
        let url = Self::playlist_url(playlist_id);
        let info = self
            .run_ytdlp_single(&["--flat-playlist", "-J", &url])
            .await
            .with_context(|| format!("Fetching playlist {} failed", playlist_id))?;

        Ok(Self::playlist_to_document(&info, playlist_id))
    }
}
