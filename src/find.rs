//! Plain and regex search over a text buffer.
//!
//! Matches are reported as character ranges. Search wraps around the buffer
//! boundary and flags wrapped results so the caller can tell the user.

use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use regex::{Regex, RegexBuilder};

use crate::editable::TextBuffer;
use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SearchMode {
    /// Literal substring
    #[default]
    Plain,
    Regex,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SearchDirection {
    #[default]
    Forward,
    Backward,
}

/// What to look for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FindQuery {
    pub pattern: String,
    pub mode: SearchMode,
    pub case_sensitive: bool,
}

impl FindQuery {
    pub fn plain(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            mode: SearchMode::Plain,
            case_sensitive: true,
        }
    }

    pub fn regex(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            mode: SearchMode::Regex,
            case_sensitive: true,
        }
    }

    pub fn case_insensitive(mut self) -> Self {
        self.case_sensitive = false;
        self
    }
}

/// A match as a character range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindMatch {
    pub range: Range<usize>,
    /// The match was found after wrapping around the buffer boundary
    pub wrapped: bool,
}

/// Cooperative cancellation flag shared with a search running elsewhere.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-document search session.
///
/// Keeps the compiled pattern of the last query and a flattened copy of the
/// buffer for the last revision searched.
#[derive(Debug, Default)]
pub struct FindEngine {
    compiled: Option<(FindQuery, Regex)>,
    haystack: Option<(u64, String)>,
}

impl FindEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `query`, reusing the previous compilation when unchanged.
    /// A bad pattern leaves the previous compilation in place.
    pub fn compile(&mut self, query: &FindQuery) -> Result<&Regex> {
        let cached = matches!(&self.compiled, Some((q, _)) if q == query);
        if !cached {
            let source = match query.mode {
                SearchMode::Plain => regex::escape(&query.pattern),
                SearchMode::Regex => query.pattern.clone(),
            };
            let regex = RegexBuilder::new(&source)
                .case_insensitive(!query.case_sensitive)
                .multi_line(true)
                .build()
                .map_err(|e| EngineError::Pattern(e.to_string()))?;
            tracing::debug!("find: compiled {:?} ({:?})", query.pattern, query.mode);
            self.compiled = Some((query.clone(), regex));
        }
        match &self.compiled {
            Some((_, regex)) => Ok(regex),
            None => Err(EngineError::Pattern(query.pattern.clone())),
        }
    }

    fn refresh_haystack(&mut self, buffer: &TextBuffer) {
        let fresh = self
            .haystack
            .as_ref()
            .is_some_and(|(rev, _)| *rev == buffer.revision());
        if !fresh {
            self.haystack = Some((buffer.revision(), buffer.content()));
        }
    }

    /// Find the next match from `from` in `direction`, wrapping once.
    pub fn search(
        &mut self,
        buffer: &TextBuffer,
        query: &FindQuery,
        direction: SearchDirection,
        from: usize,
    ) -> Result<Option<FindMatch>> {
        self.search_cancellable(buffer, query, direction, from, &CancelToken::new())
    }

    /// Like [`search`](Self::search), checking `cancel` between candidates.
    pub fn search_cancellable(
        &mut self,
        buffer: &TextBuffer,
        query: &FindQuery,
        direction: SearchDirection,
        from: usize,
        cancel: &CancelToken,
    ) -> Result<Option<FindMatch>> {
        if query.pattern.is_empty() {
            return Ok(None);
        }
        buffer.check_offset(from)?;
        self.compile(query)?;
        self.refresh_haystack(buffer);
        let (Some((_, regex)), Some((_, text))) = (&self.compiled, &self.haystack) else {
            return Ok(None);
        };

        let from_byte = buffer.char_to_byte(from);
        let found = match direction {
            SearchDirection::Forward => {
                match next_match(regex, text, from_byte, cancel)? {
                    Some(r) => Some(to_match(buffer, r, false)),
                    None => next_match(regex, text, 0, cancel)?
                        .filter(|r| r.start < from_byte)
                        .map(|r| to_match(buffer, r, true)),
                }
            }
            SearchDirection::Backward => {
                // Last match ending at or before `from`, else the last one
                // starting at or after it
                let mut before = None;
                let mut after = None;
                let mut pos = 0;
                while let Some(r) = next_match(regex, text, pos, cancel)? {
                    if r.end <= from_byte {
                        before = Some(r.clone());
                    } else if r.start >= from_byte {
                        after = Some(r.clone());
                    }
                    pos = next_boundary(text, r.start);
                }
                match before {
                    Some(r) => Some(to_match(buffer, r, false)),
                    None => after.map(|r| to_match(buffer, r, true)),
                }
            }
        };
        if found.as_ref().is_some_and(|m| m.wrapped) {
            tracing::debug!("find: wrapped around");
        }
        Ok(found)
    }

    /// Every non-empty match in buffer order.
    pub fn find_all(
        &mut self,
        buffer: &TextBuffer,
        query: &FindQuery,
    ) -> Result<Vec<Range<usize>>> {
        if query.pattern.is_empty() {
            return Ok(Vec::new());
        }
        self.compile(query)?;
        self.refresh_haystack(buffer);
        let (Some((_, regex)), Some((_, text))) = (&self.compiled, &self.haystack) else {
            return Ok(Vec::new());
        };
        Ok(regex
            .find_iter(text)
            .filter(|m| m.start() != m.end())
            .map(|m| to_match(buffer, m.range(), false).range)
            .collect())
    }

    /// True when `range` is exactly a match of `query`.
    pub fn is_match_at(
        &mut self,
        buffer: &TextBuffer,
        query: &FindQuery,
        range: Range<usize>,
    ) -> Result<bool> {
        if range.is_empty() || query.pattern.is_empty() {
            return Ok(false);
        }
        buffer.check_range(&range)?;
        self.compile(query)?;
        self.refresh_haystack(buffer);
        let (Some((_, regex)), Some((_, text))) = (&self.compiled, &self.haystack) else {
            return Ok(false);
        };
        let start = buffer.char_to_byte(range.start);
        let end = buffer.char_to_byte(range.end);
        Ok(regex
            .find_at(text, start)
            .is_some_and(|m| m.start() == start && m.end() == end))
    }

    /// Replacement text for the match at `range`.
    ///
    /// Regex queries expand `$1`/`${name}` references; plain queries insert
    /// `template` literally.
    pub fn expand_replacement(
        &mut self,
        buffer: &TextBuffer,
        query: &FindQuery,
        range: Range<usize>,
        template: &str,
    ) -> Result<String> {
        if query.mode == SearchMode::Plain {
            return Ok(template.to_string());
        }
        buffer.check_range(&range)?;
        self.compile(query)?;
        self.refresh_haystack(buffer);
        let (Some((_, regex)), Some((_, text))) = (&self.compiled, &self.haystack) else {
            return Ok(template.to_string());
        };
        let start = buffer.char_to_byte(range.start);
        let end = buffer.char_to_byte(range.end);
        let caps = regex
            .captures_at(text, start)
            .filter(|c| c.get(0).is_some_and(|m| m.start() == start && m.end() == end))
            .ok_or_else(|| EngineError::range(range.clone(), buffer.len()))?;
        let mut expanded = String::new();
        caps.expand(template, &mut expanded);
        Ok(expanded)
    }
}

/// First non-empty match starting at or after byte `pos`. Overlapping
/// candidates are seen because every scan restarts at a chosen position.
fn next_match(
    regex: &Regex,
    text: &str,
    mut pos: usize,
    cancel: &CancelToken,
) -> Result<Option<Range<usize>>> {
    while pos <= text.len() {
        if cancel.is_cancelled() {
            tracing::debug!("find: cancelled");
            return Err(EngineError::Cancelled);
        }
        let Some(m) = regex.find_at(text, pos) else {
            return Ok(None);
        };
        if m.start() < m.end() {
            return Ok(Some(m.range()));
        }
        pos = next_boundary(text, m.start());
    }
    Ok(None)
}

/// Byte index of the character after the one at `pos`
fn next_boundary(text: &str, pos: usize) -> usize {
    text[pos..]
        .chars()
        .next()
        .map_or(text.len() + 1, |ch| pos + ch.len_utf8())
}

fn to_match(buffer: &TextBuffer, bytes: Range<usize>, wrapped: bool) -> FindMatch {
    FindMatch {
        range: buffer.byte_to_char(bytes.start)..buffer.byte_to_char(bytes.end),
        wrapped,
    }
}
