//! Utility modules

pub mod file_validation;
pub mod text;

pub use text::{
    char_type, character_count, is_punctuation, is_word_boundary, normalize_newlines, CharType,
    NewlineMode, IDEOGRAPHIC_SPACE,
};

pub use file_validation::{
    decode_text, encode_text, encoding_for_label, filename_for_display, read_text_file,
    validate_file_for_opening, DecodedText, FileOpenError, MAX_FILE_SIZE,
};
