//! Clickable link detection for terminal lines.
//!
//! Each link kind pairs a regex with an activation handler. Kinds are kept in
//! registration order; every kind is matched independently, so one line can
//! yield spans of several kinds over the same text.

use std::sync::Arc;

use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;

/// What the UI should do when a link is activated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkAction {
    OpenUrl(String),
    CopyText(String),
}

pub type LinkHandler = Arc<dyn Fn(&str) -> LinkAction + Send + Sync>;

/// A match inside a string, in character columns. `end` is exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkMatch {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

#[derive(Clone)]
pub struct LinkSpan {
    pub kind: String,
    /// Zero-based column of the first character.
    pub start_col: usize,
    /// Column one past the last character.
    pub end_col: usize,
    pub text: String,
    pub hover_text: String,
    handler: LinkHandler,
}

impl LinkSpan {
    pub fn activate(&self) -> LinkAction {
        (self.handler)(&self.text)
    }
}

impl std::fmt::Debug for LinkSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkSpan")
            .field("kind", &self.kind)
            .field("start_col", &self.start_col)
            .field("end_col", &self.end_col)
            .field("text", &self.text)
            .finish()
    }
}

/// Anything that can hand out the text of a buffer line (the terminal
/// widget's link-provider extension point).
pub trait LineSource {
    fn line_text(&self, index: usize) -> Option<String>;
}

struct LinkPattern {
    regex: Regex,
    hover_label: String,
    trim_punctuation: bool,
    handler: LinkHandler,
}

pub struct LinkDetector {
    patterns: IndexMap<String, LinkPattern>,
}

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '}', '\'', '"'];

impl LinkDetector {
    pub fn new() -> Self {
        Self {
            patterns: IndexMap::new(),
        }
    }

    /// Detector with the built-in kinds: `url`, `filePath`, `ipv4`, `email`.
    pub fn with_defaults() -> Self {
        let mut detector = Self::new();
        detector.insert(
            "url",
            Regex::new(r#"\b(?:https?|ftp)://[^\s<>"'`]+"#).expect("url pattern"),
            "Open",
            true,
            Arc::new(|text: &str| LinkAction::OpenUrl(text.to_string())),
        );
        detector.insert(
            "filePath",
            Regex::new(r#"(?:^|[\s('"=])(?P<link>(?:~|\.{1,2})?(?:/[\w.\-]+)+/?)"#)
                .expect("path pattern"),
            "Copy path",
            true,
            Arc::new(|text: &str| LinkAction::CopyText(text.to_string())),
        );
        detector.insert(
            "ipv4",
            Regex::new(
                r"\b(?:(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\.){3}(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)(?::\d{1,5})?\b",
            )
            .expect("ipv4 pattern"),
            "Open",
            false,
            Arc::new(|text: &str| LinkAction::OpenUrl(format!("http://{text}"))),
        );
        detector.insert(
            "email",
            Regex::new(r"\b[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}\b")
                .expect("email pattern"),
            "Email",
            false,
            Arc::new(|text: &str| LinkAction::OpenUrl(format!("mailto:{text}"))),
        );
        detector
    }

    /// Adds or replaces a link kind. A capture group named `link` narrows the
    /// span to that group; otherwise the whole match is the link.
    pub fn register(
        &mut self,
        kind: impl Into<String>,
        pattern: &str,
        hover_label: impl Into<String>,
        handler: LinkHandler,
    ) -> Result<(), regex::Error> {
        let regex = Regex::new(pattern)?;
        self.insert(kind, regex, hover_label, false, handler);
        Ok(())
    }

    pub fn unregister(&mut self, kind: &str) -> bool {
        self.patterns.shift_remove(kind).is_some()
    }

    pub fn kinds(&self) -> Vec<&str> {
        self.patterns.keys().map(String::as_str).collect()
    }

    fn insert(
        &mut self,
        kind: impl Into<String>,
        regex: Regex,
        hover_label: impl Into<String>,
        trim_punctuation: bool,
        handler: LinkHandler,
    ) {
        self.patterns.insert(
            kind.into(),
            LinkPattern {
                regex,
                hover_label: hover_label.into(),
                trim_punctuation,
                handler,
            },
        );
    }

    /// Matches of every kind found in `text`. Kinds without matches are omitted.
    pub fn test_string(&self, text: &str) -> IndexMap<String, Vec<LinkMatch>> {
        let mut found = IndexMap::new();
        for (kind, pattern) in &self.patterns {
            let matches = find_matches(pattern, text);
            if !matches.is_empty() {
                found.insert(kind.clone(), matches);
            }
        }
        found
    }

    pub fn provide_links_for_line(&self, line: &str) -> Vec<LinkSpan> {
        let mut spans = Vec::new();
        for (kind, pattern) in &self.patterns {
            for m in find_matches(pattern, line) {
                spans.push(LinkSpan {
                    kind: kind.clone(),
                    start_col: m.start,
                    end_col: m.end,
                    hover_text: format!("{} {}", pattern.hover_label, m.text),
                    text: m.text,
                    handler: pattern.handler.clone(),
                });
            }
        }
        spans
    }

    /// Link spans for buffer line `index` of `source`.
    pub fn provide_links(&self, source: &dyn LineSource, index: usize) -> Vec<LinkSpan> {
        source
            .line_text(index)
            .map(|line| self.provide_links_for_line(&line))
            .unwrap_or_default()
    }
}

impl Default for LinkDetector {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn find_matches(pattern: &LinkPattern, text: &str) -> Vec<LinkMatch> {
    let mut out = Vec::new();
    for caps in pattern.regex.captures_iter(text) {
        let Some(m) = caps.name("link").or_else(|| caps.get(0)) else {
            continue;
        };
        let mut matched = m.as_str();
        if pattern.trim_punctuation {
            matched = matched.trim_end_matches(TRAILING_PUNCTUATION);
        }
        if matched.is_empty() {
            continue;
        }
        let start = text[..m.start()].chars().count();
        let end = start + matched.chars().count();
        out.push(LinkMatch {
            start,
            end,
            text: matched.to_string(),
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_columns_are_offsets_into_line() {
        let detector = LinkDetector::with_defaults();
        let line = "see https://example.com/docs.";
        let spans: Vec<_> = detector
            .provide_links_for_line(line)
            .into_iter()
            .filter(|s| s.kind == "url")
            .collect();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].start_col, 4);
        assert_eq!(spans[0].text, "https://example.com/docs");
        assert_eq!(spans[0].end_col, 4 + spans[0].text.len());
        assert_eq!(spans[0].hover_text, "Open https://example.com/docs");
        assert_eq!(
            spans[0].activate(),
            LinkAction::OpenUrl("https://example.com/docs".into())
        );
    }

    #[test]
    fn columns_count_characters_not_bytes() {
        let detector = LinkDetector::with_defaults();
        let spans = detector.provide_links_for_line("→ → http://a.io");
        let url = spans.iter().find(|s| s.kind == "url").unwrap();
        assert_eq!(url.start_col, 4);
        assert_eq!(url.end_col, 15);
    }

    #[test]
    fn one_line_matches_several_kinds() {
        let detector = LinkDetector::with_defaults();
        let found = detector.test_string("ping 10.0.0.1 or mail ops@example.com, log at /var/log/syslog");
        assert_eq!(found["ipv4"][0].text, "10.0.0.1");
        assert_eq!(found["email"][0].text, "ops@example.com");
        assert_eq!(found["filePath"][0].text, "/var/log/syslog");
        assert!(!found.contains_key("url"));
    }

    #[test]
    fn spans_of_a_kind_do_not_overlap() {
        let detector = LinkDetector::with_defaults();
        let spans = detector.provide_links_for_line("http://a.io http://b.io/x http://c.io");
        let urls: Vec<_> = spans.iter().filter(|s| s.kind == "url").collect();
        assert_eq!(urls.len(), 3);
        for pair in urls.windows(2) {
            assert!(pair[0].end_col <= pair[1].start_col);
        }
    }

    #[test]
    fn invalid_octets_are_not_ips() {
        let detector = LinkDetector::with_defaults();
        let found = detector.test_string("version 999.300.1.1");
        assert!(!found.contains_key("ipv4"));
        let found = detector.test_string("listening on 127.0.0.1:8080");
        assert_eq!(found["ipv4"][0].text, "127.0.0.1:8080");
    }

    #[test]
    fn path_handler_copies_relative_paths() {
        let detector = LinkDetector::with_defaults();
        let spans = detector.provide_links_for_line("edit ./src/main.rs now");
        let path = spans.iter().find(|s| s.kind == "filePath").unwrap();
        assert_eq!(path.text, "./src/main.rs");
        assert_eq!(path.start_col, 5);
        assert_eq!(path.activate(), LinkAction::CopyText("./src/main.rs".into()));
    }

    #[test]
    fn custom_kinds_keep_registration_order() {
        let mut detector = LinkDetector::new();
        detector
            .register(
                "ticket",
                r"\bJIRA-\d+\b",
                "Open ticket",
                Arc::new(|t: &str| LinkAction::OpenUrl(format!("https://jira/{t}"))),
            )
            .unwrap();
        detector
            .register(
                "sha",
                r"\b[0-9a-f]{7,40}\b",
                "Copy",
                Arc::new(|t: &str| LinkAction::CopyText(t.into())),
            )
            .unwrap();
        assert_eq!(detector.kinds(), vec!["ticket", "sha"]);
        assert!(detector.register("bad", "(", "x", Arc::new(|t: &str| LinkAction::CopyText(t.into()))).is_err());
        let spans = detector.provide_links_for_line("fix JIRA-12 in deadbeef1");
        assert_eq!(spans[0].activate(), LinkAction::OpenUrl("https://jira/JIRA-12".into()));
        assert_eq!(spans[1].text, "deadbeef1");
        assert!(detector.unregister("sha"));
        assert_eq!(detector.kinds(), vec!["ticket"]);
    }

    struct Lines(Vec<&'static str>);

    impl LineSource for Lines {
        fn line_text(&self, index: usize) -> Option<String> {
            self.0.get(index).map(|s| s.to_string())
        }
    }

    #[test]
    fn provide_links_reads_from_line_source() {
        let detector = LinkDetector::with_defaults();
        let lines = Lines(vec!["nothing here", "go to https://rust-lang.org"]);
        assert!(detector.provide_links(&lines, 0).is_empty());
        assert_eq!(detector.provide_links(&lines, 1)[0].start_col, 6);
        assert!(detector.provide_links(&lines, 5).is_empty());
    }
}
