//! Vertical-writing glyph rules: kinsoku classes, vertical glyph substitution,
//! rotation of Latin characters and tate-chu-yoko run splitting.
//!
//! Everything here is a pure function of a character and its neighbours.

use serde::{Deserialize, Serialize};

/// Characters that must not start a column (closing brackets, punctuation, small kana).
pub const LINE_HEAD_PROHIBITED: &[char] = &[
    '、', '。', '，', '．', '・', '：', '；', '！', '？', '‼', '⁇', '⁈', '⁉', '）', '］', '｝',
    '〕', '〉', '》', '」', '』', '】', '〙', '〗', '〟', '’', '”', '｣', 'ヽ', 'ヾ', 'ゝ', 'ゞ',
    '々', '〻', 'ー', 'ぁ', 'ぃ', 'ぅ', 'ぇ', 'ぉ', 'っ', 'ゃ', 'ゅ', 'ょ', 'ゎ', 'ゕ', 'ゖ', 'ァ',
    'ィ', 'ゥ', 'ェ', 'ォ', 'ッ', 'ャ', 'ュ', 'ョ', 'ヮ', 'ヵ', 'ヶ', ')', ']', '}', ',', '.',
    '!', '?', ':', ';',
];

/// Characters that must not end a column (opening brackets).
pub const LINE_END_PROHIBITED: &[char] = &[
    '（', '［', '｛', '〔', '〈', '《', '「', '『', '【', '〘', '〖', '〝', '‘', '“', '｢', '(',
    '[', '{',
];

/// Horizontal glyph -> vertical presentation form.
const VERTICAL_FORMS: &[(char, char)] = &[
    ('、', '︑'),
    ('。', '︒'),
    ('，', '︐'),
    ('：', '︓'),
    ('；', '︔'),
    ('！', '︕'),
    ('？', '︖'),
    ('…', '︙'),
    ('‥', '︰'),
    ('「', '﹁'),
    ('」', '﹂'),
    ('『', '﹃'),
    ('』', '﹄'),
    ('（', '︵'),
    ('）', '︶'),
    ('［', '﹇'),
    ('］', '﹈'),
    ('｛', '︷'),
    ('｝', '︸'),
    ('〔', '︹'),
    ('〕', '︺'),
    ('〈', '︿'),
    ('〉', '﹀'),
    ('《', '︽'),
    ('》', '︾'),
    ('【', '︻'),
    ('】', '︼'),
    ('〖', '︗'),
    ('〗', '︘'),
    ('ー', '｜'),
    ('—', '︱'),
    ('–', '︲'),
    ('_', '︳'),
    ('〜', '≀'),
];

/// Kinsoku class of a character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prohibition {
    None,
    /// Cannot be the first cell of a column
    LineHead,
    /// Cannot be the last cell of a column
    LineEnd,
}

/// How a cell's character is presented in vertical flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderHint {
    /// Drawn as stored
    Upright,
    /// Drawn with the vertical presentation form instead of the stored glyph
    Substituted { glyph: char },
    /// Drawn rotated 90 degrees clockwise
    Rotated,
    /// Two characters set horizontally inside one cell. `group` is the buffer
    /// offset of the first character of the group.
    TateChuYoko { group: usize },
    /// Paragraph break; occupies a cell but draws nothing
    LineBreak,
}

impl RenderHint {
    pub fn is_line_break(&self) -> bool {
        matches!(self, RenderHint::LineBreak)
    }
}

pub fn prohibition(ch: char) -> Prohibition {
    if LINE_HEAD_PROHIBITED.contains(&ch) {
        Prohibition::LineHead
    } else if LINE_END_PROHIBITED.contains(&ch) {
        Prohibition::LineEnd
    } else {
        Prohibition::None
    }
}

pub fn is_line_head_prohibited(ch: char) -> bool {
    prohibition(ch) == Prohibition::LineHead
}

pub fn is_line_end_prohibited(ch: char) -> bool {
    prohibition(ch) == Prohibition::LineEnd
}

/// Vertical presentation form for `ch`, if it has one
pub fn vertical_form(ch: char) -> Option<char> {
    VERTICAL_FORMS
        .iter()
        .find(|(horizontal, _)| *horizontal == ch)
        .map(|(_, vertical)| *vertical)
}

/// Characters that can take part in a tate-chu-yoko run
pub fn is_run_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric()
}

/// Render hint for a single character outside a tate-chu-yoko group.
///
/// ASCII alphanumerics are rotated. Runs that form groups are split by
/// [`split_run`] before a character reaches this function.
pub fn classify(ch: char) -> RenderHint {
    if ch == '\n' {
        return RenderHint::LineBreak;
    }
    if let Some(glyph) = vertical_form(ch) {
        return RenderHint::Substituted { glyph };
    }
    if is_run_char(ch) {
        return RenderHint::Rotated;
    }
    RenderHint::Upright
}

/// A slice of a maximal alphanumeric run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSegment {
    /// Index of the first character within the run
    pub start: usize,
    /// Number of characters (1 or 2)
    pub len: usize,
    /// True when the segment is a tate-chu-yoko group
    pub grouped: bool,
}

/// Split a maximal run of ASCII alphanumerics into cells.
///
/// A run of exactly two characters becomes one group. In longer runs digit
/// sub-runs are paired from the left, so a group never holds more than two
/// digits; letters and an odd trailing digit fall back to a rotated cell of
/// their own.
pub fn split_run(run: &[char]) -> Vec<RunSegment> {
    let single = |start| RunSegment {
        start,
        len: 1,
        grouped: false,
    };

    if run.len() == 2 {
        return vec![RunSegment {
            start: 0,
            len: 2,
            grouped: true,
        }];
    }
    if run.len() < 2 {
        return (0..run.len()).map(single).collect();
    }

    let mut segments = Vec::with_capacity(run.len());
    let mut i = 0;
    while i < run.len() {
        if run[i].is_ascii_digit() {
            let digits = run[i..].iter().take_while(|c| c.is_ascii_digit()).count();
            let end = i + digits;
            while i + 2 <= end {
                segments.push(RunSegment {
                    start: i,
                    len: 2,
                    grouped: true,
                });
                i += 2;
            }
            if i < end {
                segments.push(single(i));
                i += 1;
            }
        } else {
            segments.push(single(i));
            i += 1;
        }
    }
    segments
}
