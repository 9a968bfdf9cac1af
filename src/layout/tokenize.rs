//! Splits buffer text into layout units: one unit per grid cell.

use ropey::iter::Chars;
use ropey::Rope;
use std::collections::VecDeque;
use std::iter::Peekable;

use crate::glyph::{self, split_run};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Char(char),
    /// Tate-chu-yoko pair
    Group([char; 2]),
    /// Line break (`\n`)
    Break,
}

/// A run of buffer characters that occupies exactly one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unit {
    pub start: usize,
    pub end: usize,
    pub kind: UnitKind,
}

impl Unit {
    pub fn first_char(&self) -> char {
        match self.kind {
            UnitKind::Char(c) => c,
            UnitKind::Group([c, _]) => c,
            UnitKind::Break => '\n',
        }
    }

    pub fn is_break(&self) -> bool {
        matches!(self.kind, UnitKind::Break)
    }

    /// Must not be placed in the first cell of a wrapped column
    pub fn is_line_head_prohibited(&self) -> bool {
        matches!(self.kind, UnitKind::Char(c) if glyph::is_line_head_prohibited(c))
    }

    /// Must not be placed in the last cell of a wrapped column
    pub fn is_line_end_prohibited(&self) -> bool {
        matches!(self.kind, UnitKind::Char(c) if glyph::is_line_end_prohibited(c))
    }

    pub fn shifted(self, delta: isize) -> Self {
        Self {
            start: (self.start as isize + delta) as usize,
            end: (self.end as isize + delta) as usize,
            kind: self.kind,
        }
    }
}

/// Iterator over layout units starting at a unit boundary.
///
/// `from` must not fall inside an alphanumeric run (the caller picks a
/// restart point where the preceding character is not a run character).
pub struct Tokenizer<'a> {
    chars: Peekable<Chars<'a>>,
    pos: usize,
    pending: VecDeque<Unit>,
    tate_chu_yoko: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(rope: &'a Rope, from: usize, tate_chu_yoko: bool) -> Self {
        let from = from.min(rope.len_chars());
        Self {
            chars: rope.chars_at(from).peekable(),
            pos: from,
            pending: VecDeque::new(),
            tate_chu_yoko,
        }
    }

    fn push_run(&mut self, first: char) {
        let mut run = vec![first];
        while let Some(&c) = self.chars.peek() {
            if !glyph::is_run_char(c) {
                break;
            }
            run.push(c);
            self.chars.next();
        }

        let base = self.pos;
        for seg in split_run(&run) {
            let start = base + seg.start;
            let kind = if seg.grouped {
                UnitKind::Group([run[seg.start], run[seg.start + 1]])
            } else {
                UnitKind::Char(run[seg.start])
            };
            self.pending.push_back(Unit {
                start,
                end: start + seg.len,
                kind,
            });
        }
        self.pos += run.len();
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Unit;

    fn next(&mut self) -> Option<Unit> {
        if let Some(unit) = self.pending.pop_front() {
            return Some(unit);
        }

        let ch = self.chars.next()?;
        if self.tate_chu_yoko && glyph::is_run_char(ch) {
            self.push_run(ch);
            return self.pending.pop_front();
        }

        let start = self.pos;
        self.pos += 1;
        let kind = if ch == '\n' {
            UnitKind::Break
        } else {
            UnitKind::Char(ch)
        };
        Some(Unit {
            start,
            end: start + 1,
            kind,
        })
    }
}

/// True when a tokenizer may restart at `offset` without splitting a run
pub fn is_clean_boundary(rope: &Rope, offset: usize) -> bool {
    if offset == 0 || offset >= rope.len_chars() {
        return true;
    }
    !(glyph::is_run_char(rope.char(offset - 1)) && glyph::is_run_char(rope.char(offset)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str, tcy: bool) -> Vec<UnitKind> {
        let rope = Rope::from_str(text);
        Tokenizer::new(&rope, 0, tcy).map(|u| u.kind).collect()
    }

    #[test]
    fn test_tokenize_plain_text() {
        assert_eq!(
            kinds("あ\nい", true),
            vec![UnitKind::Char('あ'), UnitKind::Break, UnitKind::Char('い')]
        );
    }

    #[test]
    fn test_tokenize_groups_digit_pair() {
        assert_eq!(
            kinds("第12話", true),
            vec![
                UnitKind::Char('第'),
                UnitKind::Group(['1', '2']),
                UnitKind::Char('話')
            ]
        );
    }

    #[test]
    fn test_tokenize_without_tate_chu_yoko() {
        assert_eq!(
            kinds("12", false),
            vec![UnitKind::Char('1'), UnitKind::Char('2')]
        );
    }

    #[test]
    fn test_tokenize_offsets_are_contiguous() {
        let rope = Rope::from_str("x12あ1234\nAB");
        let units: Vec<Unit> = Tokenizer::new(&rope, 0, true).collect();
        let mut expected = 0;
        for unit in &units {
            assert_eq!(unit.start, expected);
            expected = unit.end;
        }
        assert_eq!(expected, rope.len_chars());
    }

    #[test]
    fn test_clean_boundary() {
        let rope = Rope::from_str("ab12あ");
        assert!(is_clean_boundary(&rope, 0));
        assert!(!is_clean_boundary(&rope, 2));
        assert!(is_clean_boundary(&rope, 4));
    }
}
