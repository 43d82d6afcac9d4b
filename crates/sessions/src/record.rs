use std::path::{Path, PathBuf};

use {
    chrono::{DateTime, SecondsFormat, Utc},
    serde::{Deserialize, Serialize},
    uuid::Uuid,
};

/// Number of leading id characters embedded in a session's file name.
const ID_PREFIX_LEN: usize = 8;

/// Byte budget for the name part of a file name. The timestamp and id
/// prefix add 30 more, which keeps the whole segment under the common
/// 255-byte limit.
const MAX_NAME_BYTES: usize = 200;

/// A live session as held by the registry.
///
/// Records are immutable once inserted; closing a session removes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: Uuid,
    pub name: String,
    #[serde(with = "rfc3339")]
    pub creation_time: DateTime<Utc>,
    pub file_path: PathBuf,
}

impl SessionRecord {
    /// Build a record for a freshly created session rooted under `log_dir`.
    ///
    /// The creation time is truncated to whole seconds so the serialized
    /// timestamp and the one embedded in the file name agree.
    pub fn new(log_dir: &Path, name: &str, now: DateTime<Utc>) -> Self {
        let id = Uuid::new_v4();
        let creation_time = DateTime::from_timestamp(now.timestamp(), 0).unwrap_or(now);
        let file_path = derive_file_path(log_dir, name, &creation_time, &id);
        Self {
            id,
            name: name.to_string(),
            creation_time,
            file_path,
        }
    }
}

/// `<log_dir>/<name>-<creation time>-<id prefix>`.
///
/// Pure: the same inputs always give the same path.
pub fn derive_file_path(
    log_dir: &Path,
    name: &str,
    creation_time: &DateTime<Utc>,
    id: &Uuid,
) -> PathBuf {
    let id = id.to_string();
    let prefix = &id[..ID_PREFIX_LEN];
    let stamp = creation_time.to_rfc3339_opts(SecondsFormat::Secs, true);
    log_dir.join(format!("{}-{stamp}-{prefix}", sanitize_segment(name)))
}

/// Replace anything that could escape or break a single path segment, and
/// cut the result to [`MAX_NAME_BYTES`] on a char boundary.
pub fn sanitize_segment(name: &str) -> String {
    let mut cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if cleaned.len() > MAX_NAME_BYTES {
        let mut end = MAX_NAME_BYTES;
        while !cleaned.is_char_boundary(end) {
            end -= 1;
        }
        cleaned.truncate(end);
    }
    // A bare "." or ".." would otherwise read as a directory reference.
    if cleaned.chars().all(|c| c == '.') {
        cleaned.replace('.', "_")
    } else {
        cleaned
    }
}

mod rfc3339 {
    use {
        chrono::{DateTime, SecondsFormat, Utc},
        serde::{Deserialize, Deserializer, Serializer, de::Error},
    };

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(D::Error::custom)
    }
}
