use std::path::PathBuf;

/// Splits text into lines that keep their terminators.
pub fn split_lines(text: &str) -> Vec<String> {
    text.split_inclusive('\n').map(str::to_owned).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// File the section was read from, relative to the book root.
    pub source: PathBuf,
    pub lines: Vec<String>,
}

/// The baked book: sections in reading order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Document {
    sections: Vec<Section>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, section: Section) {
        self.sections.push(section);
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Concatenates every section. A line with no terminator gets one when
    /// another line follows it.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in self.sections.iter().flat_map(|section| &section.lines) {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(line);
        }
        out
    }
}
