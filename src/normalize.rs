//! Maps one raw catalog item onto a [`CanonicalResult`], or says why it can't.
//!
//! Pure and I/O free. Rules are applied in order and the first rejection wins:
//! identifier, channel detection, title. Type, artist, thumbnail, duration and
//! album are then derived without further rejections.

use serde_json::Value;

use crate::service::{CanonicalResult, RawItem, ResultType};

/// Collection ids are sometimes wrapped in a browse id carrying this prefix
pub const COLLECTION_PREFIX: &str = "VL";

/// Browse ids of channels (and artist pages) start with this
const CHANNEL_ID_PREFIX: &str = "UC";

/// Explicit result-type tags naming a channel/publisher entity
const CHANNEL_RESULT_TYPES: [&str; 3] = ["channel", "artist", "profile"];

const HINT_FIELDS: [&str; 3] = ["resultType", "category", "type"];

pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Why a raw item was not turned into a result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// No content, browse or collection id could be derived
    MissingId,
    /// The item is a channel or publisher, not playable or browsable content
    Channel,
    /// Title missing or whitespace only
    EmptyTitle,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::MissingId => write!(f, "no usable identifier"),
            Rejection::Channel => write!(f, "channel result"),
            Rejection::EmptyTitle => write!(f, "empty title"),
        }
    }
}

/// Where the derived identifier came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdSource {
    Content,
    Browse,
    Collection,
}

/// Normalize one raw catalog item.
pub fn normalize(item: &RawItem) -> Result<CanonicalResult, Rejection> {
    let result_type = derive_type(item);

    let (id, source) = derive_id(item, result_type).ok_or(Rejection::MissingId)?;

    if is_channel(item, &id, source) {
        return Err(Rejection::Channel);
    }

    let title = str_field(item, "title")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(Rejection::EmptyTitle)?
        .to_string();

    Ok(CanonicalResult {
        id,
        title,
        artist: derive_artist(item),
        thumbnail_url: derive_thumbnail(item),
        result_type,
        duration: derive_duration(item),
        album: derive_album(item),
    })
}

/// Strip the collection prefix from a playlist id, if present.
pub fn strip_collection_prefix(id: &str) -> &str {
    id.strip_prefix(COLLECTION_PREFIX).unwrap_or(id)
}

fn str_field<'a>(item: &'a Value, key: &str) -> Option<&'a str> {
    item.get(key).and_then(Value::as_str)
}

fn non_empty_field(item: &Value, key: &str) -> Option<String> {
    str_field(item, key)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn derive_id(item: &Value, result_type: ResultType) -> Option<(String, IdSource)> {
    if result_type == ResultType::Playlist {
        let collection = non_empty_field(item, "playlistId")
            .or_else(|| non_empty_field(item, "browseId"))
            .map(|id| strip_collection_prefix(&id).to_string())
            .filter(|id| !id.is_empty());
        if let Some(id) = collection {
            return Some((id, IdSource::Collection));
        }
    }

    non_empty_field(item, "videoId")
        .map(|id| (id, IdSource::Content))
        .or_else(|| non_empty_field(item, "browseId").map(|id| (id, IdSource::Browse)))
        .or_else(|| non_empty_field(item, "playlistId").map(|id| (id, IdSource::Collection)))
}

fn is_channel(item: &Value, id: &str, source: IdSource) -> bool {
    let tagged = str_field(item, "resultType")
        .map(|t| {
            let t = t.trim().to_lowercase();
            CHANNEL_RESULT_TYPES.contains(&t.as_str())
        })
        .unwrap_or(false);

    // Video ids are random and may start with anything, so only browse ids count
    tagged || (source == IdSource::Browse && id.starts_with(CHANNEL_ID_PREFIX))
}

fn hint_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.to_lowercase()),
        other => Some(other.to_string().to_lowercase()),
    }
}

fn derive_type(item: &Value) -> ResultType {
    let hints: Vec<String> = HINT_FIELDS
        .iter()
        .filter_map(|key| item.get(*key).and_then(hint_text))
        .collect();

    ResultType::PRIORITY
        .into_iter()
        .find(|candidate| hints.iter().any(|h| h.contains(candidate.as_str())))
        .unwrap_or(ResultType::Song)
}

/// Pull a display name out of either a plain string or a `{ "name": ... }` object.
fn name_of(value: &Value) -> Option<String> {
    let name = match value {
        Value::String(s) => s.as_str(),
        Value::Object(_) => value.get("name").and_then(Value::as_str)?,
        _ => return None,
    };
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_string())
}

fn derive_artist(item: &Value) -> String {
    let artists: Vec<String> = item
        .get("artists")
        .and_then(Value::as_array)
        .map(|list| list.iter().filter_map(name_of).collect())
        .unwrap_or_default();

    if !artists.is_empty() {
        return artists.join(" & ");
    }

    match item.get("author") {
        Some(Value::Array(list)) => list.iter().find_map(name_of),
        Some(author) => name_of(author),
        None => None,
    }
    .unwrap_or_else(|| UNKNOWN_ARTIST.to_string())
}

fn derive_thumbnail(item: &Value) -> Option<String> {
    item.get("thumbnails")
        .and_then(Value::as_array)
        .and_then(|list| {
            list.iter()
                .rev()
                .find_map(|t| t.get("url").and_then(Value::as_str))
        })
        .filter(|url| !url.is_empty())
        .map(str::to_string)
}

fn derive_duration(item: &Value) -> String {
    match item.get("duration") {
        Some(Value::String(s)) => return s.trim().to_string(),
        Some(Value::Number(n)) => {
            if let Some(secs) = n.as_f64().filter(|s| *s >= 0.0) {
                return format_duration(secs as u64);
            }
        }
        _ => {}
    }

    item.get("duration_seconds")
        .and_then(Value::as_f64)
        .filter(|s| *s >= 0.0)
        .map(|secs| format_duration(secs as u64))
        .unwrap_or_default()
}

fn derive_album(item: &Value) -> Option<String> {
    item.get("album").and_then(name_of)
}

/// Format seconds as "m:ss", or "h:mm:ss" past the hour.
pub fn format_duration(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}
