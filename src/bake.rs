use std::fmt;
use std::io::{BufRead, IsTerminal as _, Write};
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::cli::BakeArgs;
use crate::contents::chapter_files;
use crate::document::{Document, Section, split_lines};
use crate::logging::LOG_FILE_ONLY;
use crate::rewrite::{PAGE_BREAK, apply_index_anchors, rewrite_section};

pub const TITLE_FILE: &str = "title.md";
pub const CONTENTS_FILE: &str = "Contents.md";
pub const MAIN_INDEX_FILE: &str = "Index.md";
pub const CITATION_INDEX_FILE: &str = "Citex.md";
pub const OUTPUT_FILE: &str = "baked.md";
pub const LOG_FILE: &str = "bakeBook.log";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC%z";

#[derive(Debug, Clone)]
pub struct BakeConfig {
    pub root: PathBuf,
    pub verbose: bool,
}

impl BakeConfig {
    pub fn output_path(&self) -> PathBuf {
        self.root.join(OUTPUT_FILE)
    }

    pub fn log_path(&self) -> PathBuf {
        self.root.join(LOG_FILE)
    }
}

/// State owned by one bake run.
#[derive(Debug)]
pub struct RunContext {
    started_at: String,
    warnings: usize,
}

impl RunContext {
    pub fn new(started_at: impl Into<String>) -> Self {
        Self {
            started_at: started_at.into(),
            warnings: 0,
        }
    }

    pub fn started_at(&self) -> &str {
        &self.started_at
    }

    pub fn warn(&mut self, message: impl fmt::Display) {
        tracing::warn!("{message}");
        self.warnings += 1;
    }

    pub fn warnings(&self) -> usize {
        self.warnings
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BakeReport {
    pub output: PathBuf,
    pub sections: usize,
    pub warnings: usize,
}

pub fn timestamp_now() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Runs one bake. `confirm` is asked before anything under the root is
/// touched, the log file included.
pub fn run(
    args: BakeArgs,
    verbose: bool,
    confirm: impl FnOnce() -> anyhow::Result<bool>,
) -> anyhow::Result<()> {
    let config = BakeConfig {
        root: PathBuf::from(&args.root),
        verbose,
    };

    if !args.yes && !confirm().context("ask for confirmation")? {
        println!("Cancelled; nothing written.");
        return Ok(());
    }

    crate::logging::init(verbose, Some(&config.log_path())).context("init logging")?;
    tracing::debug!(?args, "parsed cli");

    let mut ctx = RunContext::new(timestamp_now());
    tracing::info!("bake run at {}", ctx.started_at());
    tracing::info!(root = %config.root.display(), verbose = config.verbose, "running in directory");

    let report = match bake(&config, &mut ctx) {
        Ok(report) => report,
        Err(err) => {
            tracing::error!(target: LOG_FILE_ONLY, "CRASH {err:#}");
            return Err(err);
        }
    };

    println!("{} written", report.output.display());
    if report.warnings > 0 {
        println!("{} warning(s)", report.warnings);
    }
    println!("Check {}.", config.log_path().display());

    Ok(())
}

/// Builds the whole book in memory, then writes it in one go.
pub fn bake(config: &BakeConfig, ctx: &mut RunContext) -> anyhow::Result<BakeReport> {
    let document = assemble(&config.root, ctx)?;

    let out_path = config.output_path();
    std::fs::write(&out_path, document.render())
        .with_context(|| format!("write baked book: {}", out_path.display()))?;
    tracing::info!("'{}' written", out_path.display());

    Ok(BakeReport {
        output: out_path,
        sections: document.sections().len(),
        warnings: ctx.warnings(),
    })
}

/// Title page, contents, chapters in contents order, then both indexes.
pub fn assemble(root: &Path, ctx: &mut RunContext) -> anyhow::Result<Document> {
    let mut document = Document::new();

    let mut title = read_lines(root, TITLE_FILE)?;
    title.push(format!("\nVersion captured at {}\n", ctx.started_at()));
    title.push(PAGE_BREAK.to_owned());
    document.push(Section {
        source: PathBuf::from(TITLE_FILE),
        lines: title,
    });

    let contents = read_lines(root, CONTENTS_FILE)?;
    let files = chapter_files(&contents).with_context(|| format!("parse {CONTENTS_FILE}"))?;
    tracing::debug!(count = files.len(), "chapter files listed");

    let mut section = rewrite_checked(root, Path::new(CONTENTS_FILE), &contents, ctx);
    apply_index_anchors(&mut section.lines);
    document.push(section);

    for file in &files {
        tracing::debug!(file = %file, "baking chapter");
        let lines = read_lines(root, file)?;
        document.push(rewrite_checked(root, Path::new(file), &lines, ctx));
    }

    for name in [MAIN_INDEX_FILE, CITATION_INDEX_FILE] {
        let lines = read_lines(root, name)?;
        document.push(rewrite_checked(root, Path::new(name), &lines, ctx));
    }

    Ok(document)
}

/// Reads a book file as lines; invalid UTF-8 is replaced, not rejected.
pub fn read_lines(root: &Path, relative: impl AsRef<Path>) -> anyhow::Result<Vec<String>> {
    let path = root.join(relative);
    let bytes = std::fs::read(&path).with_context(|| format!("read {}", path.display()))?;
    Ok(split_lines(&String::from_utf8_lossy(&bytes)))
}

fn rewrite_checked(root: &Path, source: &Path, lines: &[String], ctx: &mut RunContext) -> Section {
    let rewritten = rewrite_section(lines);
    for warning in &rewritten.warnings {
        ctx.warn(format_args!("{}: {warning}", source.display()));
    }

    let base = root.join(source.parent().unwrap_or(Path::new("")));
    for link in &rewritten.targets {
        if !local_target_exists(&base, &link.target) {
            ctx.warn(format_args!(
                "{}: line {}: linked file not found: {}",
                source.display(),
                link.line,
                link.target
            ));
        }
    }

    Section {
        source: source.to_path_buf(),
        lines: rewritten.lines,
    }
}

/// Whether a link target names an existing file, looked up from `base`.
pub fn local_target_exists(base: &Path, target: &str) -> bool {
    let path = match target.split_once('#') {
        Some((path, _)) => path,
        None => target,
    };
    if path.is_empty() {
        return true;
    }
    base.join(path.replace("%20", " ")).exists()
}

/// Asks on the terminal whether to start. Without a terminal there is nobody
/// to ask, so the run goes ahead.
pub fn confirm_start() -> anyhow::Result<bool> {
    let stdin = std::io::stdin();
    if !stdin.is_terminal() {
        return Ok(true);
    }
    ask(&mut stdin.lock(), &mut std::io::stderr())
}

fn ask(input: &mut impl BufRead, prompt: &mut impl Write) -> anyhow::Result<bool> {
    write!(
        prompt,
        "Will read the current book text. Touch no files until done!\nContinue? [y/N] "
    )?;
    prompt.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(accepted(&answer))
}

fn accepted(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    const STAMP: &str = "2026-01-01 00:00:00 UTC+0000";

    fn write(root: &Path, relative: &str, contents: &str) -> anyhow::Result<()> {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        Ok(())
    }

    fn mini_book(root: &Path) -> anyhow::Result<()> {
        write(root, "title.md", "# Book\n")?;
        write(
            root,
            "Contents.md",
            "# Contents\n\n[Index](#index)\n\n[1. Introduction](1.%20Intro/Intro.md)\n",
        )?;
        write(
            root,
            "1. Intro/Intro.md",
            "## Intro\n\nSee [contents](../Contents.md) and [web](https://example.com).\n",
        )?;
        write(root, "Index.md", "")?;
        write(root, "Citex.md", "")?;
        Ok(())
    }

    #[test]
    fn mini_book_bakes_in_order_with_five_page_breaks() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        mini_book(temp.path())?;
        let config = BakeConfig {
            root: temp.path().to_path_buf(),
            verbose: false,
        };
        let mut ctx = RunContext::new(STAMP);

        let report = bake(&config, &mut ctx)?;
        assert_eq!(report.sections, 5);
        assert_eq!(report.warnings, 0);

        let baked = fs::read_to_string(config.output_path())?;
        assert_eq!(baked.matches(PAGE_BREAK).count(), 5);
        let expected = format!(
            "# Book\n\nVersion captured at {STAMP}\n{PAGE_BREAK}\
# Contents\n\n[Index](#book6-Main-Index)\n\n[1. Introduction](#intro)\n{PAGE_BREAK}\
## Intro\n\nSee [contents](#list-of-contents) and [web](https://example.com).\n{PAGE_BREAK}\
{PAGE_BREAK}{PAGE_BREAK}"
        );
        assert_eq!(baked, expected);
        Ok(())
    }

    #[test]
    fn missing_linked_file_is_a_warning() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        mini_book(temp.path())?;
        write(temp.path(), "Index.md", "[gone](Nowhere.md)\n[there](Citex.md#top)\n")?;

        let mut ctx = RunContext::new(STAMP);
        let document = assemble(temp.path(), &mut ctx)?;
        assert_eq!(ctx.warnings(), 1);
        assert_eq!(document.sections()[3].lines[0], "[gone](#nowhere)\n");
        Ok(())
    }

    #[test]
    fn missing_chapter_file_is_fatal_and_writes_nothing() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        mini_book(temp.path())?;
        fs::remove_file(temp.path().join("1. Intro").join("Intro.md"))?;
        let config = BakeConfig {
            root: temp.path().to_path_buf(),
            verbose: false,
        };

        let err = bake(&config, &mut RunContext::new(STAMP)).unwrap_err();
        assert!(format!("{err:#}").contains("Intro.md"));
        assert!(!config.output_path().exists());
        Ok(())
    }

    #[test]
    fn malformed_contents_is_fatal() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        mini_book(temp.path())?;
        write(
            temp.path(),
            "Contents.md",
            "[1. Introduction](1.%20Intro/Intro.md)\n- not a bullet\n",
        )?;

        let err = assemble(temp.path(), &mut RunContext::new(STAMP)).unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
        Ok(())
    }

    #[test]
    fn invalid_utf8_is_replaced() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        fs::write(temp.path().join("bad.md"), b"caf\xe9\nok\n")?;
        let lines = read_lines(temp.path(), "bad.md")?;
        assert_eq!(lines, vec!["caf\u{FFFD}\n", "ok\n"]);
        Ok(())
    }

    #[test]
    fn target_lookup_decodes_spaces_and_ignores_fragments() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        write(temp.path(), "Part One/Some Page.md", "")?;
        fs::create_dir(temp.path().join("Other"))?;
        let base = temp.path().join("Other");
        assert!(local_target_exists(&base, "../Part%20One/Some%20Page.md#x"));
        assert!(!local_target_exists(&base, "../Part%20One/Missing.md"));
        assert!(local_target_exists(&base, ""));
        Ok(())
    }

    #[test]
    fn only_yes_answers_start_the_run() {
        for answer in ["y", "yes", "Y\n", " YES \r\n"] {
            assert!(accepted(answer), "{answer:?}");
        }
        for answer in ["", "\n", "n", "no\n", "yep"] {
            assert!(!accepted(answer), "{answer:?}");
        }
    }

    #[test]
    fn ask_prompts_and_reads_one_answer() -> anyhow::Result<()> {
        let mut prompt = Vec::new();
        assert!(ask(&mut std::io::Cursor::new("y\nignored\n"), &mut prompt)?);
        assert!(String::from_utf8(prompt)?.contains("Continue? [y/N]"));

        assert!(!ask(&mut std::io::Cursor::new(""), &mut Vec::new())?);
        Ok(())
    }

    #[test]
    fn cancelled_run_leaves_previous_log_and_output_alone() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        mini_book(temp.path())?;
        write(temp.path(), LOG_FILE, "previous run log\n")?;
        let args = BakeArgs {
            root: temp.path().to_string_lossy().to_string(),
            yes: false,
        };

        run(args, false, || Ok(false))?;

        assert_eq!(
            fs::read_to_string(temp.path().join(LOG_FILE))?,
            "previous run log\n"
        );
        assert!(!temp.path().join(OUTPUT_FILE).exists());
        Ok(())
    }
}
