//! Rule 33: no AI-tool references in committed content.
//!
//! Treatment depends on the file class:
//! - documentation: any match blocks
//! - source and tests: only matches inside comments block
//! - configuration: matches warn
//! - commit message: any match blocks

use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};

use crate::domain::{FileClass, FlowforgeError, Finding, Result, RuleResult, StagedFile};

use super::{CheckInput, Checker, CheckerKind, Tally, Wording};

pub const DEFAULT_KEYWORDS: &[&str] = &[
    "claude",
    "anthropic",
    "chatgpt",
    "openai",
    "copilot",
    "gpt-4",
    "gpt-3.5",
    "ai-generated",
    "ai generated",
    "generated by ai",
    "generated with ai",
    "ai assistant",
];

/// Internal paths where tool names are legitimate.
pub const DEFAULT_ALLOW_LIST: &[&str] = &[".flowforge/", ".claude/", "CLAUDE.md", "AGENTS.md"];

const HASH_COMMENT_EXTENSIONS: &[&str] = &["py", "sh", "bash", "rb"];

pub struct AiReferences {
    keywords: Regex,
    allow_list: Vec<String>,
}

impl AiReferences {
    /// Build a checker from a keyword list (matched case-insensitively on
    /// word boundaries) and an allow-list of path prefixes.
    pub fn new(keywords: &[&str], allow_list: &[&str]) -> Result<Self> {
        Ok(Self {
            keywords: keyword_pattern(keywords)?,
            allow_list: allow_list.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// [`DEFAULT_KEYWORDS`] and [`DEFAULT_ALLOW_LIST`].
    pub fn standard() -> Self {
        static KEYWORDS: OnceLock<Regex> = OnceLock::new();
        let keywords = KEYWORDS.get_or_init(|| {
            keyword_pattern(DEFAULT_KEYWORDS).expect("escaped keywords compile")
        });
        Self {
            keywords: keywords.clone(),
            allow_list: DEFAULT_ALLOW_LIST.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn is_allowed(&self, path: &str) -> bool {
        self.allow_list.iter().any(|entry| {
            if entry.ends_with('/') {
                path.starts_with(entry.as_str())
            } else {
                path == entry || path.ends_with(&format!("/{entry}"))
            }
        })
    }

    fn first_match<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.keywords.find(text).map(|m| m.as_str())
    }

    fn scan_comments(&self, file: &StagedFile, tally: &mut Tally) {
        let hash_comments = file
            .extension()
            .is_some_and(|ext| HASH_COMMENT_EXTENSIONS.contains(&ext));
        let sql = file.extension() == Some("sql");

        let mut in_block = false;
        let mut last_line = 0u32;
        for added in &file.added_lines {
            if added.line != last_line + 1 {
                in_block = false;
            }
            last_line = added.line;

            let comment = comment_text(&added.text, &mut in_block, hash_comments, sql);
            if let Some(hit) = comment.and_then(|c| self.first_match(c)) {
                tally.block(Finding::at_line(
                    &file.path,
                    added.line,
                    format!("comment references '{hit}'"),
                ));
            }
        }
    }
}

impl Default for AiReferences {
    fn default() -> Self {
        Self::standard()
    }
}

/// Case-insensitive whole-word alternation of `keywords`.
fn keyword_pattern(keywords: &[&str]) -> Result<Regex> {
    let alternation = keywords
        .iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = format!(r"\b(?:{alternation})\b");
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| FlowforgeError::InvalidPattern {
            pattern,
            reason: e.to_string(),
        })
}

/// First of `markers` that sits outside a quoted string literal.
///
/// `//` preceded by `:` is a URL scheme separator, not a comment.
fn find_marker<'m>(line: &str, markers: &[&'m str]) -> Option<(usize, &'m str)> {
    let bytes = line.as_bytes();
    let mut quote: Option<u8> = None;
    let mut idx = 0;
    while idx < bytes.len() {
        let b = bytes[idx];
        match quote {
            Some(_) if b == b'\\' => {
                idx += 2;
                continue;
            }
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if matches!(b, b'\'' | b'"' | b'`') => quote = Some(b),
            None => {
                let hit = markers.iter().find(|m| bytes[idx..].starts_with(m.as_bytes()));
                if let Some(&marker) = hit {
                    let url = marker == "//" && idx > 0 && bytes[idx - 1] == b':';
                    if !url {
                        return Some((idx, marker));
                    }
                }
            }
        }
        idx += 1;
    }
    None
}

/// Comment portion of `line`, tracking `/* ... */` state across lines.
fn comment_text<'a>(
    line: &'a str,
    in_block: &mut bool,
    hash_comments: bool,
    sql: bool,
) -> Option<&'a str> {
    if *in_block {
        if let Some(end) = line.find("*/") {
            *in_block = false;
            return Some(&line[..end]);
        }
        return Some(line);
    }

    let line_marker = if hash_comments {
        "#"
    } else if sql {
        "--"
    } else {
        "//"
    };
    match find_marker(line, &["/*", "<!--", line_marker]) {
        Some((start, "/*")) => {
            let rest = &line[start + 2..];
            match rest.find("*/") {
                Some(end) => Some(&rest[..end]),
                None => {
                    *in_block = true;
                    Some(rest)
                }
            }
        }
        Some((start, marker)) => Some(&line[start + marker.len()..]),
        None if line.trim_start().starts_with('*') => Some(line),
        None => None,
    }
}

impl Checker for AiReferences {
    fn kind(&self) -> CheckerKind {
        CheckerKind::AiReferences
    }

    fn check(&self, input: &CheckInput<'_>) -> RuleResult {
        let mut tally = Tally::default();

        if let Some(message) = input.commit_message {
            if let Some(hit) = self.first_match(message) {
                tally.block(Finding::general(format!(
                    "commit message references '{hit}'"
                )));
            }
        }

        for file in input.changeset.live_files() {
            if self.is_allowed(&file.path) {
                continue;
            }
            match file.class() {
                FileClass::Doc => {
                    for added in &file.added_lines {
                        if let Some(hit) = self.first_match(&added.text) {
                            tally.block(Finding::at_line(
                                &file.path,
                                added.line,
                                format!("documentation references '{hit}'"),
                            ));
                        }
                    }
                }
                FileClass::Source | FileClass::Test => self.scan_comments(file, &mut tally),
                FileClass::Config => {
                    for added in &file.added_lines {
                        if let Some(hit) = self.first_match(&added.text) {
                            tally.warn(Finding::at_line(
                                &file.path,
                                added.line,
                                format!("configuration references '{hit}'"),
                            ));
                        }
                    }
                }
                FileClass::Other => {}
            }
        }

        tally.finish(
            self.kind(),
            Wording {
                pass: "no AI tool references",
                block: "AI tool references in committed content",
                warn: "AI tool references in configuration",
                fix: "Remove AI tool references; describe what the change does instead".to_string(),
            },
        )
    }
}
