//! Rewrites file-based markdown links into in-document anchors.
//!
//! A section is rewritten once, line by line. Links to `http:`/`https:`
//! targets are copied untouched; every other link target is normalized into
//! the anchor its heading gets once all files are merged into one document.

use std::fmt;

/// Marker line closing every rewritten section.
pub const PAGE_BREAK: &str = "<!-- page break -->\n";

/// Anchors the index sections carry in the merged book. They are assigned by
/// hand and do not follow the normalization rule.
pub const INDEX_ANCHORS: [(&str, &str); 2] = [
    ("(#index)", "(#book6-Main-Index)"),
    ("(#citex)", "(#book6-Citation-Index)"),
];

const LINK_OPEN: &str = "](";
const ENCODED_SPACE: &str = "%20";
const CONTENTS_ANCHOR: &str = "list-of-contents";
const HEADING_LINK: &str = "## [";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenSection {
    pub lines: Vec<String>,
    pub warnings: Vec<RewriteWarning>,
    /// Internal link targets as written in the source, before normalization.
    pub targets: Vec<LinkTarget>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTarget {
    /// 1-based line number in the source file.
    pub line: usize,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteWarning {
    pub line: usize,
    pub kind: WarningKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarningKind {
    /// `](` with no closing `)` on the same line.
    UnterminatedLink,
    /// Target starts with a digit but has no `%20` after the chapter number.
    MissingChapterSeparator { target: String },
    EmptyTarget,
}

impl fmt::Display for RewriteWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            WarningKind::UnterminatedLink => {
                write!(f, "line {}: link target is not closed", self.line)
            }
            WarningKind::MissingChapterSeparator { target } => write!(
                f,
                "line {}: numbered target has no %20 after the number: {target}",
                self.line
            ),
            WarningKind::EmptyTarget => write!(f, "line {}: link target is empty", self.line),
        }
    }
}

/// One piece of a line, as seen by the link scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Piece<'a> {
    /// Copied to the output as is.
    Verbatim(&'a str),
    /// `head` runs up to and including `](`; `target` excludes the `)`.
    Internal { head: &'a str, target: &'a str },
    /// From the start of a link head whose target never closes to the end
    /// of the line.
    Unterminated(&'a str),
}

struct LinkScanner<'a> {
    rest: &'a str,
}

impl<'a> LinkScanner<'a> {
    fn new(line: &'a str) -> Self {
        Self { rest: line }
    }
}

impl<'a> Iterator for LinkScanner<'a> {
    type Item = Piece<'a>;

    fn next(&mut self) -> Option<Piece<'a>> {
        if self.rest.is_empty() {
            return None;
        }

        let remaining = self.rest;
        let Some(open) = remaining.find(LINK_OPEN) else {
            self.rest = "";
            return Some(Piece::Verbatim(remaining));
        };
        let (head, after) = remaining.split_at(open + LINK_OPEN.len());

        if after.starts_with("http:") || after.starts_with("https:") {
            self.rest = after;
            return Some(Piece::Verbatim(head));
        }

        let Some(close) = after.find(')') else {
            self.rest = "";
            return Some(Piece::Unterminated(remaining));
        };

        self.rest = &after[close + 1..];
        Some(Piece::Internal {
            head,
            target: &after[..close],
        })
    }
}

/// Anchor derived from an internal link target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub name: String,
    pub issue: Option<WarningKind>,
    /// False when the target already was an in-document anchor.
    pub names_file: bool,
}

/// Normalizes an internal link target into the anchor of the heading it
/// points to. Targets that already are anchors (`#x`) are kept as written.
pub fn anchor_for(target: &str) -> Anchor {
    if let Some(name) = target.strip_prefix('#') {
        return Anchor {
            name: name.to_owned(),
            issue: None,
            names_file: false,
        };
    }
    if target.is_empty() {
        return Anchor {
            name: String::new(),
            issue: Some(WarningKind::EmptyTarget),
            names_file: true,
        };
    }

    let mut issue = None;
    let mut name = match target.rsplit_once('/') {
        Some((_, file)) => file,
        None => target,
    };

    if name.starts_with(|c: char| c.is_ascii_digit()) {
        match name.split_once(ENCODED_SPACE) {
            Some((_, rest)) => name = rest,
            None => {
                issue = Some(WarningKind::MissingChapterSeparator {
                    target: target.to_owned(),
                });
            }
        }
    }

    let name = name.strip_suffix(".md").unwrap_or(name);
    let name = name.replace(ENCODED_SPACE, "-").replace('.', "").to_lowercase();
    let name = if name == "contents" {
        CONTENTS_ANCHOR.to_owned()
    } else {
        name
    };

    Anchor {
        name,
        issue,
        names_file: true,
    }
}

/// Rewrites every link on one line. Returns the new line together with the
/// internal targets it saw and any problems met on the way.
fn rewrite_line(
    line: &str,
    line_no: usize,
    targets: &mut Vec<LinkTarget>,
    warnings: &mut Vec<RewriteWarning>,
) -> String {
    let mut out = String::with_capacity(line.len() + 16);

    for piece in LinkScanner::new(line) {
        match piece {
            Piece::Verbatim(text) => out.push_str(text),
            Piece::Unterminated(text) => {
                warnings.push(RewriteWarning {
                    line: line_no,
                    kind: WarningKind::UnterminatedLink,
                });
                out.push_str(text);
            }
            Piece::Internal { head, target } => {
                let anchor = anchor_for(target);
                if let Some(kind) = anchor.issue {
                    warnings.push(RewriteWarning {
                        line: line_no,
                        kind,
                    });
                }
                if anchor.names_file {
                    targets.push(LinkTarget {
                        line: line_no,
                        target: target.to_owned(),
                    });
                }
                out.push_str(head);
                out.push('#');
                out.push_str(&anchor.name);
                out.push(')');
            }
        }
    }

    // Chapter contents item: drop the heading marker, keep the link.
    if out.starts_with(HEADING_LINK) {
        out.replace_range(..HEADING_LINK.len() - 1, "");
    }
    out
}

/// Rewrites one source file's lines into a section ending in [`PAGE_BREAK`].
pub fn rewrite_section<S: AsRef<str>>(lines: &[S]) -> RewrittenSection {
    let mut targets = Vec::new();
    let mut warnings = Vec::new();
    let mut out = Vec::with_capacity(lines.len() + 1);

    for (idx, line) in lines.iter().enumerate() {
        out.push(rewrite_line(line.as_ref(), idx + 1, &mut targets, &mut warnings));
    }
    out.push(PAGE_BREAK.to_owned());

    RewrittenSection {
        lines: out,
        warnings,
        targets,
    }
}

/// Points the contents' links at the hand-named index anchors.
pub fn apply_index_anchors(lines: &mut [String]) {
    for line in lines.iter_mut() {
        for (from, to) in INDEX_ANCHORS {
            if line.contains(from) {
                *line = line.replace(from, to);
            }
        }
    }
}
