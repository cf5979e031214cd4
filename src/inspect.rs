use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::bake::{CONTENTS_FILE, read_lines};
use crate::cli::{FilesArgs, RewriteArgs};
use crate::contents::chapter_files;
use crate::rewrite::{apply_index_anchors, rewrite_section};

pub fn files(args: FilesArgs) -> anyhow::Result<()> {
    let root = PathBuf::from(&args.root);
    let contents = read_lines(&root, CONTENTS_FILE)?;
    let files = chapter_files(&contents).with_context(|| format!("parse {CONTENTS_FILE}"))?;

    let mut stdout = std::io::stdout().lock();
    for file in files {
        writeln!(stdout, "{file}").context("write file list")?;
    }
    stdout.flush().context("flush file list")?;
    Ok(())
}

pub fn rewrite(args: RewriteArgs) -> anyhow::Result<()> {
    let path = Path::new(&args.file);
    let lines = read_lines(Path::new(""), path)?;

    let mut section = rewrite_section(&lines);
    if args.contents {
        apply_index_anchors(&mut section.lines);
    }
    for warning in &section.warnings {
        tracing::warn!(file = %path.display(), "{warning}");
    }

    let mut stdout = std::io::stdout().lock();
    for line in &section.lines {
        stdout
            .write_all(line.as_bytes())
            .context("write rewritten section")?;
    }
    stdout.flush().context("flush rewritten section")?;
    Ok(())
}
