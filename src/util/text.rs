//! Utility functions for manuscript text

use serde::{Deserialize, Serialize};

/// Ideographic space inserted by the Tab key
pub const IDEOGRAPHIC_SPACE: char = '\u{3000}';

/// Check if a character is punctuation or a symbol (ASCII or CJK)
pub fn is_punctuation(ch: char) -> bool {
    ch.is_ascii_punctuation()
        || matches!(
            ch,
            '、' | '。'
                | '，'
                | '．'
                | '・'
                | '：'
                | '；'
                | '！'
                | '？'
                | '…'
                | '‥'
                | '—'
                | '―'
                | '〜'
                | '「'
                | '」'
                | '『'
                | '』'
                | '（'
                | '）'
                | '［'
                | '］'
                | '｛'
                | '｝'
                | '〔'
                | '〕'
                | '〈'
                | '〉'
                | '《'
                | '》'
                | '【'
                | '】'
                | '〝'
                | '〟'
                | '‘'
                | '’'
                | '“'
                | '”'
        )
}

/// Character class for word navigation.
///
/// Japanese has no spaces between words, so script changes act as word
/// boundaries (kanji compound -> okurigana, katakana loanword -> particle).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharType {
    Whitespace,
    /// ASCII and full-width Latin letters and digits
    WordChar,
    Hiragana,
    /// Katakana, including the prolonged sound mark
    Katakana,
    Kanji,
    Punctuation,
}

/// Get the character type for word navigation
pub fn char_type(ch: char) -> CharType {
    match ch {
        c if c.is_whitespace() => CharType::Whitespace,
        '\u{3041}'..='\u{309F}' => CharType::Hiragana,
        '\u{30A0}'..='\u{30FF}' | '\u{31F0}'..='\u{31FF}' | '\u{FF66}'..='\u{FF9F}' => {
            CharType::Katakana
        }
        // CJK unified ideographs, extension A, iteration marks
        '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}' | '々' | '〆' | '〇' => CharType::Kanji,
        c if is_punctuation(c) => CharType::Punctuation,
        _ => CharType::WordChar,
    }
}

/// Check if a character is a word boundary (symbol or whitespace)
pub fn is_word_boundary(ch: char) -> bool {
    matches!(char_type(ch), CharType::Whitespace | CharType::Punctuation)
}

/// Number of characters a writer would count: everything except line breaks
pub fn character_count(text: &str) -> usize {
    text.chars().filter(|c| *c != '\n' && *c != '\r').count()
}

/// Line break convention of a file on disk. Buffers always hold `\n`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NewlineMode {
    #[default]
    #[serde(rename = "lf")]
    Lf,
    #[serde(rename = "crlf")]
    CrLf,
    #[serde(rename = "cr")]
    Cr,
}

impl NewlineMode {
    /// Detect the convention from the first line break in `text`
    pub fn detect(text: &str) -> Self {
        match text.find(['\r', '\n']) {
            Some(i) if text[i..].starts_with("\r\n") => NewlineMode::CrLf,
            Some(i) if text[i..].starts_with('\r') => NewlineMode::Cr,
            _ => NewlineMode::Lf,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NewlineMode::Lf => "\n",
            NewlineMode::CrLf => "\r\n",
            NewlineMode::Cr => "\r",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            NewlineMode::Lf => "LF",
            NewlineMode::CrLf => "CRLF",
            NewlineMode::Cr => "CR",
        }
    }

    /// Convert `\n`-normalised text to this convention for writing
    pub fn apply(&self, text: &str) -> String {
        match self {
            NewlineMode::Lf => text.to_string(),
            other => text.replace('\n', other.as_str()),
        }
    }
}

/// Normalise CRLF and lone CR to LF
pub fn normalize_newlines(text: &str) -> String {
    if !text.contains('\r') {
        return text.to_string();
    }
    text.replace("\r\n", "\n").replace('\r', "\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_type_scripts() {
        assert_eq!(char_type('猫'), CharType::Kanji);
        assert_eq!(char_type('ね'), CharType::Hiragana);
        assert_eq!(char_type('ネ'), CharType::Katakana);
        assert_eq!(char_type('ー'), CharType::Katakana);
        assert_eq!(char_type('。'), CharType::Punctuation);
        assert_eq!(char_type('「'), CharType::Punctuation);
        assert_eq!(char_type(IDEOGRAPHIC_SPACE), CharType::Whitespace);
        assert_eq!(char_type('a'), CharType::WordChar);
        assert_eq!(char_type('Ａ'), CharType::WordChar);
    }

    #[test]
    fn test_word_boundary() {
        assert!(is_word_boundary('、'));
        assert!(is_word_boundary(' '));
        assert!(!is_word_boundary('猫'));
    }

    #[test]
    fn test_character_count_excludes_line_breaks() {
        assert_eq!(character_count("あい\nう\r\n"), 3);
        assert_eq!(character_count(""), 0);
        assert_eq!(character_count("　あ"), 2);
    }

    #[test]
    fn test_newline_detect() {
        assert_eq!(NewlineMode::detect("a\r\nb\nc"), NewlineMode::CrLf);
        assert_eq!(NewlineMode::detect("a\rb"), NewlineMode::Cr);
        assert_eq!(NewlineMode::detect("a\nb\r\n"), NewlineMode::Lf);
        assert_eq!(NewlineMode::detect("no breaks"), NewlineMode::Lf);
    }

    #[test]
    fn test_normalize_and_apply() {
        let normalized = normalize_newlines("あ\r\nい\rう\n");
        assert_eq!(normalized, "あ\nい\nう\n");
        assert_eq!(NewlineMode::CrLf.apply(&normalized), "あ\r\nい\r\nう\r\n");
        assert_eq!(NewlineMode::Lf.apply(&normalized), normalized);
    }

    #[test]
    fn test_newline_mode_serde_labels() {
        let json = serde_json::to_string(&NewlineMode::CrLf).unwrap();
        assert_eq!(json, "\"crlf\"");
        let mode: NewlineMode = serde_json::from_str("\"cr\"").unwrap();
        assert_eq!(mode, NewlineMode::Cr);
    }
}
