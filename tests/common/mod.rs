//! Shared test helpers for integration tests
//!
//! Note: Functions may appear unused because each test file compiles separately.

#![allow(dead_code)]

use narrative_edit::editable::{Document, EditOptions};
use narrative_edit::layout::{CellPos, GridSize};

/// Document on a `rows` x `cols` grid with default options
pub fn doc(text: &str, rows: usize, cols: usize) -> Document {
    Document::new(text, GridSize { rows, cols }, EditOptions::default())
}

/// Document with tate-chu-yoko switched off
pub fn doc_without_tcy(text: &str, rows: usize, cols: usize) -> Document {
    Document::new(
        text,
        GridSize { rows, cols },
        EditOptions::default().with_tate_chu_yoko(false),
    )
}

/// Stored text of one exported column, top to bottom (line breaks included)
pub fn column_text(document: &Document, page: usize, col: usize) -> String {
    document
        .export_layout()
        .get(page)
        .map(|p| p.column(col).map(|c| c.text.as_str()).collect())
        .unwrap_or_default()
}

pub fn cell(page: usize, col: usize, row: usize) -> CellPos {
    CellPos::new(page, col, row)
}

/// Small deterministic generator so property tests need no extra crates
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed.wrapping_mul(6364136223846793005).wrapping_add(1))
    }

    pub fn next_u32(&mut self) -> u32 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 33) as u32
    }

    pub fn below(&mut self, n: usize) -> usize {
        if n == 0 {
            0
        } else {
            self.next_u32() as usize % n
        }
    }

    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[self.below(items.len())]
    }
}

/// Characters exercising every layout path: kana, kanji, brackets and small
/// kana under kinsoku, ASCII runs for tate-chu-yoko, and line breaks
pub const ALPHABET: &[char] = &[
    'あ', 'い', 'う', '猫', '吾', '輩', '「', '」', '『', '』', '（', '）', '、', '。', 'ー', 'っ',
    'ゃ', '…', '！', '？', '1', '2', '3', 'a', 'B', '\n', '\u{3000}',
];

/// Random manuscript text of `len` characters
pub fn random_text(rng: &mut Lcg, len: usize) -> String {
    (0..len).map(|_| *rng.pick(ALPHABET)).collect()
}
