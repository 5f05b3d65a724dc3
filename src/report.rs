//! False, missed and detected descriptor listings.
//!
//! Evaluations append entries as the comparison matrix moves through its
//! levels. The same entries render as a terse raw stream for scripts and as
//! a banner-separated listing for people.

use std::fmt;
use std::io::Write;

use crate::comparison::Level;
use crate::Result;

/// What an entry reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    /// A candidate with no surviving target.
    False,
    /// A target with no surviving candidate.
    Missed,
    /// A target with its surviving candidates.
    Detect,
}

impl ReportKind {
    pub fn name(&self) -> &'static str {
        match self {
            ReportKind::False => "FALSE",
            ReportKind::Missed => "MISSED",
            ReportKind::Detect => "DETECT",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportEntry {
    pub kind: ReportKind,
    /// Matrix level when the entry was produced.
    pub level: Level,
    /// Whether a match filter had already run.
    pub filtered: bool,
    /// The descriptor, plus any detail that follows it on a raw line.
    pub line: String,
}

impl ReportEntry {
    /// `<descriptor> FALSE 1`, or for detections
    /// `<target> DETECT 1 <detail>`.
    pub fn raw_line(&self) -> String {
        match self.kind {
            ReportKind::Detect => {
                let (head, detail) = self.line.split_once('\t').unwrap_or((&self.line, ""));
                format!("{} {} {} {}", head, self.kind, self.level.value(), detail)
                    .trim_end()
                    .to_string()
            }
            _ => format!("{} {} {}", self.line, self.kind, self.level.value()),
        }
    }

    fn banner(&self) -> String {
        let mut banner = format!("LEVEL {}", self.level.value());
        if self.filtered {
            banner.push('C');
        }
        banner
    }
}

/// Entries in emission order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    entries: Vec<ReportEntry>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: ReportKind, level: Level, filtered: bool, line: impl Into<String>) {
        self.entries.push(ReportEntry {
            kind,
            level,
            filtered,
            line: line.into(),
        });
    }

    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries of one kind, in emission order.
    pub fn of_kind(&self, kind: ReportKind) -> impl Iterator<Item = &ReportEntry> + '_ {
        self.entries.iter().filter(move |e| e.kind == kind)
    }

    pub fn extend(&mut self, other: Report) {
        self.entries.extend(other.entries);
    }

    /// Write one raw line per entry, with a `#LEVEL` marker whenever the
    /// level or filter state changes.
    pub fn write_raw<W: Write>(&self, mut out: W) -> Result<()> {
        let mut section: Option<String> = None;
        for entry in &self.entries {
            let banner = entry.banner();
            if section.as_deref() != Some(banner.as_str()) {
                writeln!(out, "#{}", banner)?;
                section = Some(banner);
            }
            writeln!(out, "{}", entry.raw_line())?;
        }
        out.flush()?;
        Ok(())
    }

    /// Human readable listing grouped under level banners.
    pub fn to_verbose(&self) -> String {
        let mut text = String::new();
        let mut section: Option<(String, ReportKind)> = None;
        for entry in &self.entries {
            let key = (entry.banner(), entry.kind);
            if section.as_ref() != Some(&key) {
                let title = match entry.kind {
                    ReportKind::False => "FALSE DETECTIONS",
                    ReportKind::Missed => "MISSED DETECTIONS",
                    ReportKind::Detect => "DETECTION(S)",
                };
                text.push_str(&banner(&format!("{} {}", key.0, title), 53));
                section = Some(key);
            }
            text.push_str(&entry.line.replace('\t', "\n\t"));
            text.push('\n');
        }
        text
    }
}

/// A title centered in a box of `width` characters.
pub(crate) fn banner(title: &str, width: usize) -> String {
    let rule = "*".repeat(width);
    let inner = width.saturating_sub(2);
    format!("\n{}\n*{:^inner$}*\n{}\n", rule, title, rule, inner = inner)
}
