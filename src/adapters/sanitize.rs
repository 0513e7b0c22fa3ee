//! Redaction of identifiers and secrets from log output.
//!
//! Assessment logs carry labels, confidences and fingerprints only, but free
//! text from intake documents can still end up in error messages. Every
//! formatted log line passes through [`sanitize`] via
//! [`SanitizingMakeWriter`], which redacts:
//! - email addresses and phone numbers
//! - SSN-like and medical record numbers
//! - dates of birth written next to a DOB/birth keyword
//! - `key=value` secrets, long hex key material and PEM blocks
//!
//! Inputs longer than the configured cap are truncated before scanning.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

use regex::{Regex, RegexSet};
use tracing_subscriber::fmt::MakeWriter;

/// Default per-line scan cap (16 KiB).
pub const DEFAULT_MAX_BYTES: usize = 16 * 1024;

static MAX_BYTES: AtomicUsize = AtomicUsize::new(DEFAULT_MAX_BYTES);

/// Set the per-line scan cap. Zero is ignored.
pub fn set_max_bytes(max_bytes: usize) {
    if max_bytes > 0 {
        MAX_BYTES.store(max_bytes, Ordering::Relaxed);
    }
}

fn max_bytes() -> usize {
    MAX_BYTES.load(Ordering::Relaxed)
}

struct Rule {
    regex: Regex,
    replacement: &'static str,
}

struct Rules {
    /// Single-scan prefilter over `line_rules`
    any: RegexSet,
    line_rules: Vec<Rule>,
    /// Multi-line blocks, kept out of the set to bound its size
    pem: Rule,
}

const LINE_RULES: &[(&str, &str)] = &[
    (
        r"(?i)\b[a-z0-9](?:[a-z0-9._%+-]{0,62}[a-z0-9])?@(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,}\b",
        "[REDACTED-EMAIL]",
    ),
    (
        r"(?i)\b(?:dob|d\.o\.b\.?|date[ _-]of[ _-]birth|born)\b\s*[:=]?\s*(?:\d{1,4}[-/.]\d{1,2}[-/.]\d{1,4})",
        "[REDACTED-DOB]",
    ),
    (r"\b\d{3}-\d{2}-\d{4}\b", "[REDACTED-SSN]"),
    (
        r"(?i)\b(?:mrn|medical[ _-]record(?:[ _-]number)?|patient[ _-]id)\b\s*[:#=]?\s*[A-Z0-9-]{4,20}\b",
        "[REDACTED-MRN]",
    ),
    (
        r"(?:\+\d{1,3}[-.\s]?)?\(?\b\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b",
        "[REDACTED-PHONE]",
    ),
    (
        r"(?i)\b(?:api[_-]?key|token|secret|password|passwd|seed|signing[_-]?key|private[_-]?key)\b\s*[:=]\s*[A-Za-z0-9+/_-]{16,}={0,2}",
        "[REDACTED-SECRET]",
    ),
    (r"\b[0-9a-fA-F]{32,}\b", "[REDACTED-KEY]"),
];

fn rules() -> &'static Rules {
    static RULES: OnceLock<Rules> = OnceLock::new();
    RULES.get_or_init(|| {
        // Patterns are compile-time constants covered by the tests below.
        let any = RegexSet::new(LINE_RULES.iter().map(|(p, _)| *p)).expect("Valid regex set");
        let line_rules = LINE_RULES
            .iter()
            .map(|(pattern, replacement)| Rule {
                regex: Regex::new(pattern).expect("Valid regex"),
                replacement,
            })
            .collect();
        let pem = Rule {
            regex: Regex::new(
                r"(?s)-----BEGIN [A-Z0-9 ]{0,40}KEY-----.{0,4096}?-----END [A-Z0-9 ]{0,40}KEY-----",
            )
            .expect("Valid regex"),
            replacement: "[REDACTED-PEM]",
        };
        Rules {
            any,
            line_rules,
            pem,
        }
    })
}

fn clip(input: &str, limit: usize) -> (&str, bool) {
    if input.len() <= limit {
        return (input, false);
    }
    let mut end = limit;
    while end > 0 && !input.is_char_boundary(end) {
        end -= 1;
    }
    (&input[..end], true)
}

/// Redact identifiers and secrets from `input`.
#[must_use]
pub fn sanitize(input: &str) -> String {
    sanitize_with_limit(input, max_bytes())
}

fn sanitize_with_limit(input: &str, limit: usize) -> String {
    let rules = rules();
    let (text, clipped) = clip(input, limit);

    let mut out = text.to_string();
    for idx in rules.any.matches(text).iter() {
        let rule = &rules.line_rules[idx];
        out = rule.regex.replace_all(&out, rule.replacement).into_owned();
    }
    if out.contains("-----BEGIN ") {
        out = rules.pem.regex.replace_all(&out, rules.pem.replacement).into_owned();
    }

    if clipped {
        out.push_str(" [TRUNCATED]");
    }
    out
}

/// Whether `input` holds anything [`sanitize`] would redact.
#[must_use]
pub fn contains_sensitive(input: &str) -> bool {
    let rules = rules();
    let (text, _) = clip(input, max_bytes());
    rules.any.is_match(text) || (text.contains("-----BEGIN ") && rules.pem.regex.is_match(text))
}

/// `MakeWriter` wrapper that sanitizes each formatted line before it
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

impl<'a, M> MakeWriter<'a> for SanitizingMakeWriter<M>
where
    M: MakeWriter<'a>,
{
    type Writer = SanitizingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        SanitizingWriter {
            inner: self.inner.make_writer(),
            pending: Vec::new(),
        }
    }
}

/// Line-buffering writer produced by [`SanitizingMakeWriter`].
pub struct SanitizingWriter<W: Write> {
    inner: W,
    pending: Vec<u8>,
}

impl<W: Write> SanitizingWriter<W> {
    fn emit(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        let clean = sanitize(&String::from_utf8_lossy(bytes));
        self.inner.write_all(clean.as_bytes())
    }

    fn drain_complete_lines(&mut self) -> std::io::Result<()> {
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            self.emit(&line)?;
        }
        Ok(())
    }
}

impl<W: Write> Write for SanitizingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.pending.extend_from_slice(buf);

        // A formatter that never writes a newline must not grow the buffer forever.
        if self.pending.len() > max_bytes().saturating_mul(2) {
            let pending = std::mem::take(&mut self.pending);
            self.emit(&pending)?;
            self.inner.write_all(b"\n")?;
            return Ok(buf.len());
        }

        self.drain_complete_lines()?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.drain_complete_lines()?;
        if !self.pending.is_empty() {
            let pending = std::mem::take(&mut self.pending);
            self.emit(&pending)?;
        }
        self.inner.flush()
    }
}

impl<W: Write> Drop for SanitizingWriter<W> {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
