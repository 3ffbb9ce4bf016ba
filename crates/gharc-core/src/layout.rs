//! Repository content layout: where uploads and archive documents live.
//!
//! Uploads go to `diaries/<kind-subdir>/<unique-name>`, archives to
//! `diaries/<year>/<month>/<day>-<slug>.md`, so a descending sort on the path
//! lists the newest archives first.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rand::Rng;
use unicode_normalization::UnicodeNormalization;

/// Top-level directory holding every upload and archive.
pub const ROOT_DIR: &str = "diaries";

/// File suffix that marks an archive document.
pub const ARCHIVE_EXTENSION: &str = ".md";

/// MIME type reported when neither the content nor the name gives one away.
pub const FALLBACK_MIME: &str = "application/octet-stream";

/// Slug used when a title has no usable characters.
const DEFAULT_SLUG: &str = "archive";

const TOKEN_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const TOKEN_LEN: usize = 6;

/// Media kind of an uploaded file; selects its subdirectory and how the
/// archive document links to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Pdf,
    Other,
}

impl MediaKind {
    pub fn from_mime(mime: &str) -> Self {
        let mime = mime.trim().to_ascii_lowercase();
        if mime.starts_with("image/") {
            MediaKind::Image
        } else if mime.starts_with("video/") {
            MediaKind::Video
        } else if mime.starts_with("audio/") {
            MediaKind::Audio
        } else if mime == "application/pdf" {
            MediaKind::Pdf
        } else {
            MediaKind::Other
        }
    }

    pub fn subdirectory(self) -> &'static str {
        match self {
            MediaKind::Image => "images",
            MediaKind::Video => "videos",
            MediaKind::Audio => "audios",
            MediaKind::Pdf => "pdfs",
            MediaKind::Other => "attachments",
        }
    }
}

/// MIME type of an upload: sniffed from the leading bytes, else guessed from
/// the file extension.
///
/// Text formats such as SVG have no reliable magic, so a `text/*` sniff
/// defers to the extension when it knows better.
pub fn detect_mime(file_name: &str, bytes: &[u8]) -> String {
    let sniffed = infer::get(bytes).map(|t| t.mime_type());
    match sniffed {
        Some(mime) if !mime.starts_with("text/") => mime.to_string(),
        _ => mime_guess::from_path(file_name)
            .first_raw()
            .or(sniffed)
            .unwrap_or(FALLBACK_MIME)
            .to_string(),
    }
}

/// Keeps ASCII alphanumerics and CJK ideographs; everything else becomes `_`.
pub fn sanitize_base_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || ('\u{4e00}'..='\u{9fa5}').contains(&c) {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Splits `name.ext`; names without a usable extension return `None`.
fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    }
}

/// Builds `<unix-millis>_<random>_<sanitized-base>[.<ext>]` for an upload.
pub fn unique_file_name(original: &str, now: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let token: String = (0..TOKEN_LEN)
        .map(|_| TOKEN_ALPHABET[rng.gen_range(0..TOKEN_ALPHABET.len())] as char)
        .collect();

    let (stem, ext) = split_extension(original);
    let base = sanitize_base_name(stem);
    match ext.map(|e| sanitize_base_name(e)) {
        Some(ext) => format!("{}_{}_{}.{}", now.timestamp_millis(), token, base, ext),
        None => format!("{}_{}_{}", now.timestamp_millis(), token, base),
    }
}

/// Repository path for an uploaded file of `kind`.
pub fn upload_path(kind: MediaKind, file_name: &str) -> String {
    format!("{}/{}/{}", ROOT_DIR, kind.subdirectory(), file_name)
}

/// Normalizes a title into a path-safe slug.
///
/// Strips accents (NFD, then drops combining marks), lowercases, turns
/// whitespace runs into `-`, drops anything that is not an ASCII word
/// character or `-`, and collapses repeated dashes.
pub fn slugify(title: &str) -> String {
    let folded: String = title
        .trim()
        .nfd()
        .filter(|c| !('\u{300}'..='\u{36f}').contains(c))
        .collect();
    let mut out = String::with_capacity(folded.len());
    let mut prev_dash = false;
    for c in folded.to_lowercase().chars() {
        let c = if c.is_whitespace() { '-' } else { c };
        if c == '-' {
            if !prev_dash {
                out.push('-');
            }
            prev_dash = true;
        } else if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
            prev_dash = false;
        }
    }
    let slug = out.trim_matches('-');
    if slug.is_empty() {
        DEFAULT_SLUG.to_string()
    } else {
        slug.to_string()
    }
}

/// Repository path of the archive document created on `date` for `title`.
pub fn archive_path(date: NaiveDate, title: &str) -> String {
    format!(
        "{}/{:04}/{:02}/{:02}-{}{}",
        ROOT_DIR,
        date.year(),
        date.month(),
        date.day(),
        slugify(title),
        ARCHIVE_EXTENSION
    )
}

pub fn is_archive_document(name: &str) -> bool {
    name.ends_with(ARCHIVE_EXTENSION)
}
