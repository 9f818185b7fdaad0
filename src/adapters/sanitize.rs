//! Log sanitization for identifier-like content.
//!
//! Patient datasets carry MRNs, national ids, contact details and dates of
//! birth next to the attributes we classify. None of that belongs in logs.
//! Builders only log counts, but every formatted line still goes through
//! [`SanitizingMakeWriter`] before it reaches the sink.
//!
//! Input is capped at `COHORTGRAPH_SANITIZE_MAX_BYTES` (default 16 KiB) per
//! call; anything beyond the cap is dropped and marked `[TRUNCATED]`.

use regex::{Regex, RegexSet};
use std::sync::OnceLock;
use tracing_subscriber::fmt::MakeWriter;

static PATTERNS: OnceLock<Patterns> = OnceLock::new();

const DEFAULT_SANITIZE_MAX_BYTES: usize = 16 * 1024;

/// Pattern, replacement. Order matters: earlier rules run first.
const RULES: &[(&str, &str)] = &[
    // Contextual patient identifiers: patient_id=ABC-12, patient: "X7".
    // The key and separator are kept.
    (
        r#"(?i)\b(patient(?:[_-]?id)?\s*[:=]\s*)"?[A-Za-z0-9_.-]+"?"#,
        "${1}[REDACTED-ID]",
    ),
    (r"(?i)\bMRN[:#\s]?\s*\d{5,12}\b", "[REDACTED-MRN]"),
    (r"\b\d{3}-\d{2}-\d{4}\b", "[REDACTED-SSN]"),
    (
        r"(?i)\b[a-z0-9](?:[a-z0-9._%+-]{0,62}[a-z0-9])?@(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,}\b",
        "[REDACTED-EMAIL]",
    ),
    (
        r"\b(?:\+?\d{1,3}[-.\s]?)?\(?\d{3}\)?[-.\s]\d{3}[-.\s]\d{4}\b",
        "[REDACTED-PHONE]",
    ),
    // Dates: 1980-04-12, 12/04/1980, 12.04.1980
    (
        r"\b(?:\d{4}-\d{2}-\d{2}|\d{1,2}[/.]\d{1,2}[/.]\d{4})\b",
        "[REDACTED-DATE]",
    ),
    (r"\b\d{9,}\b", "[REDACTED-NUMBER]"),
];

struct Pattern {
    regex: Regex,
    replacement: &'static str,
}

struct Patterns {
    set: RegexSet,
    rules: Vec<Pattern>,
}

fn patterns() -> &'static Patterns {
    PATTERNS.get_or_init(|| {
        let rules: Vec<Pattern> = RULES
            .iter()
            .filter_map(|&(pattern, replacement)| match Regex::new(pattern) {
                Ok(regex) => Some(Pattern { regex, replacement }),
                Err(e) => {
                    eprintln!("cohortgraph: skipping invalid sanitizer pattern: {e}");
                    None
                }
            })
            .collect();
        let set = RegexSet::new(rules.iter().map(|p| p.regex.as_str()))
            .unwrap_or_else(|_| RegexSet::empty());
        Patterns { set, rules }
    })
}

fn max_sanitize_bytes() -> usize {
    std::env::var("COHORTGRAPH_SANITIZE_MAX_BYTES")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|&v| v > 0)
        .unwrap_or(DEFAULT_SANITIZE_MAX_BYTES)
}

fn truncate_to_char_boundary(input: &str, max_bytes: usize) -> (&str, bool) {
    if input.len() <= max_bytes {
        return (input, false);
    }
    let mut end = max_bytes;
    while end > 0 && !input.is_char_boundary(end) {
        end -= 1;
    }
    (&input[..end], true)
}

/// Redact identifier-like content from `input`.
#[must_use]
pub fn sanitize(input: &str) -> String {
    sanitize_with_limit(input, max_sanitize_bytes())
}

fn sanitize_with_limit(input: &str, max_bytes: usize) -> String {
    let patterns = patterns();
    let (prefix, truncated) = truncate_to_char_boundary(input, max_bytes);

    let mut result = prefix.to_string();
    for idx in patterns.set.matches(prefix).into_iter() {
        let rule = &patterns.rules[idx];
        result = rule.regex.replace_all(&result, rule.replacement).into_owned();
    }

    if truncated {
        result.push_str(" [TRUNCATED]");
    }
    result
}

/// Whether `input` contains anything the sanitizer would redact.
#[must_use]
pub fn contains_identifier(input: &str) -> bool {
    let (prefix, _) = truncate_to_char_boundary(input, max_sanitize_bytes());
    patterns().set.is_match(prefix)
}

/// `MakeWriter` wrapper that sanitizes each formatted log line before it
/// reaches the inner writer.
#[derive(Debug, Clone)]
pub struct SanitizingMakeWriter<M> {
    inner: M,
}

impl<M> SanitizingMakeWriter<M> {
    #[must_use]
    pub fn new(inner: M) -> Self {
        Self { inner }
    }
}

/// Line-buffering writer produced by [`SanitizingMakeWriter`].
pub struct SanitizingWriter<W> {
    inner: W,
    buffer: Vec<u8>,
}

impl<W: std::io::Write> SanitizingWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
        }
    }

    fn write_sanitized(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        let text = String::from_utf8_lossy(bytes);
        self.inner.write_all(sanitize(&text).as_bytes())
    }

    fn flush_lines(&mut self) -> std::io::Result<()> {
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.write_sanitized(&line)?;
        }
        Ok(())
    }
}

impl<W: std::io::Write> std::io::Write for SanitizingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);

        // A single line with no newline must not grow without bound.
        if self.buffer.len() > max_sanitize_bytes().saturating_mul(2) {
            let pending = std::mem::take(&mut self.buffer);
            self.write_sanitized(&pending)?;
            self.inner.write_all(b"\n")?;
            return Ok(buf.len());
        }

        self.flush_lines()?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_lines()?;
        if !self.buffer.is_empty() {
            let pending = std::mem::take(&mut self.buffer);
            self.write_sanitized(&pending)?;
        }
        self.inner.flush()
    }
}

impl<'a, M> MakeWriter<'a> for SanitizingMakeWriter<M>
where
    M: MakeWriter<'a>,
{
    type Writer = SanitizingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        SanitizingWriter::new(self.inner.make_writer())
    }
}
