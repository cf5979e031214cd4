//! Derives the ordered list of chapter files from the book's contents file.
//!
//! Everything before the `[1. Introduction]` line is front matter. After it,
//! each non-blank line is either a link line naming a directory and a file,
//! or a bullet naming another file in the most recent directory.

use thiserror::Error;

/// First contents line that refers to a chapter file.
pub const FIRST_CHAPTER_MARKER: &str = "[1. Introduction]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentsEntry {
    /// `[label](dir/file)`
    Link { dir: String, file: String },
    /// `* stem`, a file under the last linked directory.
    Bullet { stem: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContentsError {
    #[error("contents has no `[1. Introduction]` line")]
    MissingFirstChapter,

    #[error("contents line {line}: expected a `[...](dir/file)` link or a `* ` bullet: {text:?}")]
    UnrecognizedLine { line: usize, text: String },

    #[error("contents line {line}: link has no `](` target: {text:?}")]
    LinkWithoutTarget { line: usize, text: String },

    #[error("contents line {line}: link target has no directory: {text:?}")]
    LinkWithoutDirectory { line: usize, text: String },

    #[error("contents line {line}: bullet appears before any directory link: {text:?}")]
    BulletWithoutDirectory { line: usize, text: String },
}

fn decode_spaces(text: &str) -> String {
    text.replace("%20", " ")
}

/// Classifies one chapter line of the contents file. `line` is 1-based and
/// only used for error reporting.
pub fn parse_entry(line: usize, text: &str) -> Result<ContentsEntry, ContentsError> {
    let text = text.trim_end();

    if text.starts_with('[') {
        let Some((_, target)) = text.split_once("](") else {
            return Err(ContentsError::LinkWithoutTarget {
                line,
                text: text.to_owned(),
            });
        };
        let target = match target.rfind(')') {
            Some(close) => &target[..close],
            None => target,
        };
        let Some((dir, file)) = target.split_once('/') else {
            return Err(ContentsError::LinkWithoutDirectory {
                line,
                text: text.to_owned(),
            });
        };
        return Ok(ContentsEntry::Link {
            dir: decode_spaces(dir),
            file: decode_spaces(file),
        });
    }

    if let Some(bullet) = text.strip_prefix('*') {
        let stem = bullet.strip_prefix(' ').unwrap_or(bullet);
        return Ok(ContentsEntry::Bullet {
            stem: decode_spaces(stem),
        });
    }

    Err(ContentsError::UnrecognizedLine {
        line,
        text: text.to_owned(),
    })
}

/// Returns the chapter files named by the contents, as `dir/file` paths
/// relative to the book root, in reading order.
pub fn chapter_files<S: AsRef<str>>(lines: &[S]) -> Result<Vec<String>, ContentsError> {
    let start = lines
        .iter()
        .position(|line| line.as_ref().starts_with(FIRST_CHAPTER_MARKER))
        .ok_or(ContentsError::MissingFirstChapter)?;

    let mut files = Vec::new();
    let mut current_dir: Option<String> = None;

    for (idx, line) in lines.iter().enumerate().skip(start) {
        let line = line.as_ref();
        if line.trim().is_empty() {
            continue;
        }

        match parse_entry(idx + 1, line)? {
            ContentsEntry::Link { dir, file } => {
                files.push(format!("{dir}/{file}"));
                current_dir = Some(dir);
            }
            ContentsEntry::Bullet { stem } => {
                let Some(dir) = current_dir.as_deref() else {
                    return Err(ContentsError::BulletWithoutDirectory {
                        line: idx + 1,
                        text: line.trim_end().to_owned(),
                    });
                };
                files.push(format!("{dir}/{stem}.md"));
            }
        }
    }

    Ok(files)
}
