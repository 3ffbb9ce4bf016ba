//! Archive document codec.
//!
//! An archive is a markdown file: a `# title` heading, an optional
//! description, an `*Archived on: ...*` line, a `---` rule, then one `##`
//! section per uploaded file. Only the header is decoded back; the file
//! section is carried through updates byte for byte.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::layout::MediaKind;

/// Prefix of the line holding the archive's creation timestamp.
pub const ARCHIVED_ON_MARKER: &str = "*Archived on:";

/// Horizontal rule between the header and the file-link section.
pub const SEPARATOR: &str = "\n---\n";

const RAW_HOST: &str = "https://raw.githubusercontent.com";
const WEB_HOST: &str = "https://github.com";

/// Repository and branch that uploaded files are linked against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoCoords {
    pub owner: String,
    pub repo: String,
    pub branch: String,
}

impl RepoCoords {
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            branch: branch.into(),
        }
    }

    /// Direct download URL, suitable for inline image embeds.
    pub fn raw_url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            RAW_HOST, self.owner, self.repo, self.branch, path
        )
    }

    /// GitHub web view of a file.
    pub fn blob_url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}/blob/{}/{}",
            WEB_HOST, self.owner, self.repo, self.branch, path
        )
    }
}

/// One uploaded file referenced by an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLink {
    /// Original file name as the user picked it.
    pub display_name: String,
    /// Repository-relative path under a kind subdirectory.
    pub stored_path: String,
    pub kind: MediaKind,
}

/// Editable part of an archive document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArchiveHeader {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("no '---' separator after the archive header")]
    MissingSeparator,
}

/// RFC 1123 timestamp in GMT, e.g. `Fri, 05 Jan 2024 10:00:00 GMT`.
pub fn format_archived_on(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn push_header(out: &mut String, title: &str, description: &str) {
    out.push_str("# ");
    out.push_str(title);
    out.push_str("\n\n");
    if !description.is_empty() {
        out.push_str(description);
        out.push_str("\n\n");
    }
}

fn link_line(coords: &RepoCoords, link: &FileLink) -> String {
    let name = &link.display_name;
    let path = &link.stored_path;
    match link.kind {
        MediaKind::Image => format!("![{}]({})", name, coords.raw_url(path)),
        MediaKind::Video => format!("[Watch video: {}]({})", name, coords.blob_url(path)),
        MediaKind::Audio => format!("[Listen to audio: {}]({})", name, coords.blob_url(path)),
        MediaKind::Pdf | MediaKind::Other => {
            format!("[View file on GitHub: {}]({})", name, coords.blob_url(path))
        }
    }
}

/// Renders a complete archive document.
pub fn encode(
    coords: &RepoCoords,
    title: &str,
    description: &str,
    created_at: DateTime<Utc>,
    links: &[FileLink],
) -> String {
    let mut out = String::new();
    push_header(&mut out, title, description);
    out.push_str(ARCHIVED_ON_MARKER);
    out.push(' ');
    out.push_str(&format_archived_on(created_at));
    out.push_str("*\n");
    out.push_str(SEPARATOR);
    out.push('\n');
    for link in links {
        out.push_str("## ");
        out.push_str(&link.display_name);
        out.push_str("\n\n");
        out.push_str(&link_line(coords, link));
        out.push_str("\n\n");
    }
    out
}

fn is_blank(line: &str) -> bool {
    line.is_empty() || line == "\r"
}

/// Parses the title and description out of an archive document.
///
/// Lines are split on `\n` only, so a `\r\n` inside the description comes
/// back as written. When the whole document uses CRLF endings (the title
/// line ends in `\r`), the line break closing the description is dropped.
///
/// A document without the archived-on line is read leniently: everything
/// after the title is the description.
pub fn decode(text: &str) -> ArchiveHeader {
    let text = text.strip_suffix('\n').unwrap_or(text);
    let mut lines = text.split('\n');
    let first_raw = lines.next().unwrap_or("");
    let crlf = first_raw.ends_with('\r');
    let first = first_raw.trim_end_matches('\r');
    let stripped = first.trim_start_matches('#');
    let title = if stripped.len() != first.len() {
        stripped.strip_prefix(' ').unwrap_or(stripped)
    } else {
        first
    };

    let rest: Vec<&str> = lines.collect();
    let mut body: &[&str] = &rest;
    if body.first().is_some_and(|l| is_blank(l)) {
        body = &body[1..];
    }

    let mut description = match body.iter().position(|l| l.starts_with(ARCHIVED_ON_MARKER)) {
        Some(end) => {
            let mut desc = &body[..end];
            if desc.last().is_some_and(|l| is_blank(l)) {
                desc = &desc[..desc.len() - 1];
            }
            desc.join("\n")
        }
        None => body.join("\n"),
    };
    if crlf && description.ends_with('\r') {
        description.pop();
    }

    ArchiveHeader {
        title: title.to_string(),
        description,
    }
}

/// Rewrites the header of an existing archive document.
///
/// The archived-on line and everything after the separator are kept
/// verbatim. A document with no separator is rejected rather than silently
/// losing its file links.
pub fn reencode(
    old_text: &str,
    new_title: &str,
    new_description: &str,
) -> Result<String, CodecError> {
    let mut offset = 0usize;
    let mut archived_on: Option<(usize, &str)> = None;
    for line in old_text.split('\n') {
        if line.starts_with(ARCHIVED_ON_MARKER) {
            archived_on = Some((offset, line.trim_end_matches('\r')));
            break;
        }
        offset += line.len() + 1;
    }

    let search_from = archived_on.map(|(at, _)| at).unwrap_or(0);
    let sep_at = old_text[search_from..]
        .find(SEPARATOR)
        .map(|i| i + search_from)
        .ok_or(CodecError::MissingSeparator)?;
    let files = &old_text[sep_at + SEPARATOR.len()..];

    let mut out = String::with_capacity(old_text.len() + new_title.len());
    push_header(&mut out, new_title, new_description);
    match archived_on {
        Some((_, line)) => {
            out.push_str(line);
            out.push('\n');
        }
        None => tracing::warn!("archive document has no archived-on line; dropping it"),
    }
    out.push_str(SEPARATOR);
    out.push_str(files);
    Ok(out)
}
