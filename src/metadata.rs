//! Novel metadata: overview, characters, chapter memos and progress goals.
//!
//! Stored beside a manuscript as `<file>.narrative.json`, or on its own as a
//! `*.plot.json` plot file. Both wrap the payload as
//! `{"meta": {...}, "metadata": {...}}`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

use crate::config_paths::{write_atomic, APP_ID};
use crate::error::Result;

pub const SIDECAR_SUFFIX: &str = ".narrative.json";
pub const PLOT_SUFFIX: &str = ".plot.json";
pub const METADATA_SCHEMA: u64 = 1;

pub const MAX_CHAPTER_NUMBER: i64 = 9999;
pub const MAX_TARGET_CHARS: i64 = 1_000_000;
pub const DEFAULT_DAILY_TARGET: i64 = 2000;

/// Characters per standard 20x20 manuscript sheet, used for page estimates
pub const CHARS_PER_SHEET: f64 = 400.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressGoals {
    #[serde(deserialize_with = "daily_target")]
    pub daily_target_chars: i64,
}

impl Default for ProgressGoals {
    fn default() -> Self {
        Self {
            daily_target_chars: DEFAULT_DAILY_TARGET,
        }
    }
}

impl ProgressGoals {
    /// Progress against the daily target for a manuscript of `current` characters
    pub fn report(&self, current: usize) -> ProgressReport {
        let target = self.daily_target_chars.max(0) as usize;
        let rate = (target > 0).then(|| current as f64 / target as f64 * 100.0);
        ProgressReport {
            current,
            target,
            rate,
            remaining: (target > 0).then(|| target.saturating_sub(current)),
            sheets: current as f64 / CHARS_PER_SHEET,
        }
    }
}

/// Derived progress figures; `rate` and `remaining` are `None` without a target.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressReport {
    pub current: usize,
    pub target: usize,
    /// Percent of the target reached
    pub rate: Option<f64>,
    pub remaining: Option<usize>,
    /// Estimated 400-character manuscript sheets
    pub sheets: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterProfile {
    #[serde(deserialize_with = "loose_string")]
    pub name: String,
    #[serde(deserialize_with = "loose_string")]
    pub role: String,
    #[serde(deserialize_with = "loose_string")]
    pub goal: String,
    #[serde(deserialize_with = "loose_string")]
    pub conflict: String,
    #[serde(deserialize_with = "loose_string")]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChapterMemo {
    #[serde(deserialize_with = "chapter_number")]
    pub number: i64,
    #[serde(deserialize_with = "loose_string")]
    pub title: String,
    #[serde(deserialize_with = "loose_string")]
    pub purpose: String,
    #[serde(deserialize_with = "loose_string")]
    pub summary: String,
    #[serde(deserialize_with = "loose_count")]
    pub target_chars: i64,
}

impl Default for ChapterMemo {
    fn default() -> Self {
        Self {
            number: 1,
            title: String::new(),
            purpose: String::new(),
            summary: String::new(),
            target_chars: 0,
        }
    }
}

/// Planning notes that accompany one manuscript.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NovelMetadata {
    #[serde(deserialize_with = "loose_string")]
    pub work_title: String,
    #[serde(deserialize_with = "loose_string")]
    pub genre: String,
    #[serde(deserialize_with = "loose_string")]
    pub point_of_view: String,
    #[serde(deserialize_with = "loose_string")]
    pub era_setting: String,
    #[serde(deserialize_with = "loose_string")]
    pub logline: String,
    #[serde(deserialize_with = "loose_string")]
    pub main_plot: String,
    #[serde(deserialize_with = "loose_string")]
    pub sub_plot: String,
    #[serde(deserialize_with = "loose_string")]
    pub world_notes: String,
    #[serde(deserialize_with = "loose_string")]
    pub glossary_notes: String,
    #[serde(deserialize_with = "loose_string")]
    pub reference_notes: String,
    #[serde(deserialize_with = "loose_list")]
    pub characters: Vec<CharacterProfile>,
    #[serde(deserialize_with = "loose_list")]
    pub chapters: Vec<ChapterMemo>,
    #[serde(deserialize_with = "loose_goals")]
    pub progress_goals: ProgressGoals,
}

impl NovelMetadata {
    /// Build from a JSON payload, clamping numeric fields into range.
    /// Mistyped fields are coerced or defaulted one by one; only a payload
    /// that is not an object yields empty metadata.
    pub fn from_value(value: Value) -> Self {
        match serde_json::from_value::<NovelMetadata>(value) {
            Ok(metadata) => metadata.clamped(),
            Err(e) => {
                tracing::warn!("ignoring malformed metadata payload: {}", e);
                Self::default()
            }
        }
    }

    pub fn clamped(mut self) -> Self {
        for chapter in &mut self.chapters {
            chapter.number = chapter.number.clamp(1, MAX_CHAPTER_NUMBER);
            chapter.target_chars = chapter.target_chars.clamp(0, MAX_TARGET_CHARS);
        }
        self.progress_goals.daily_target_chars = self
            .progress_goals
            .daily_target_chars
            .clamp(0, MAX_TARGET_CHARS);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// `<path>.narrative.json`
pub fn sidecar_path_for(path: &Path) -> PathBuf {
    append_suffix(path, SIDECAR_SUFFIX)
}

/// `<path>.plot.json`
pub fn plot_path_for(path: &Path) -> PathBuf {
    append_suffix(path, PLOT_SUFFIX)
}

fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Short file name stem for an unnamed manuscript: the work title, else the
/// first non-blank line, else `untitled`. Path-hostile characters are
/// stripped and the result cut to five characters.
pub fn filename_seed(metadata: &NovelMetadata, text: &str, untitled: &str) -> String {
    let title = metadata.work_title.trim();
    let seed = if title.is_empty() {
        text.lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or(untitled)
    } else {
        title
    };
    let seed: String = seed
        .chars()
        .filter(|c| {
            !c.is_whitespace() && !matches!(c, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|')
        })
        .take(5)
        .collect();
    if seed.is_empty() {
        "story".to_string()
    } else {
        seed
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

fn envelope(metadata: &NovelMetadata, plot: bool) -> Result<Value> {
    let mut meta = json!({
        "app": APP_ID,
        "schema": METADATA_SCHEMA,
        "saved_at": unix_now(),
    });
    if plot {
        meta["type"] = json!("plot");
    }
    Ok(json!({
        "meta": meta,
        "metadata": serde_json::to_value(metadata)?,
    }))
}

/// Read the sidecar of a manuscript.
///
/// A missing or unreadable sidecar degrades to empty metadata so the text can
/// still be opened.
pub fn load_sidecar(text_path: &Path) -> (NovelMetadata, PathBuf) {
    let sidecar = sidecar_path_for(text_path);
    if !sidecar.exists() {
        return (NovelMetadata::default(), sidecar);
    }
    let parsed = fs::read_to_string(&sidecar)
        .map_err(crate::error::EngineError::from)
        .and_then(|raw| Ok(serde_json::from_str::<Value>(&raw)?));
    let metadata = match parsed {
        Ok(mut value) => NovelMetadata::from_value(
            value
                .get_mut("metadata")
                .map(Value::take)
                .unwrap_or_else(|| json!({})),
        ),
        Err(e) => {
            tracing::warn!("failed to read metadata sidecar {}: {}", sidecar.display(), e);
            NovelMetadata::default()
        }
    };
    (metadata, sidecar)
}

/// Write the sidecar of a manuscript; returns its path.
pub fn save_sidecar(text_path: &Path, metadata: &NovelMetadata) -> Result<PathBuf> {
    let sidecar = sidecar_path_for(text_path);
    let payload = serde_json::to_string_pretty(&envelope(metadata, false)?)?;
    write_atomic(&sidecar, payload.as_bytes())?;
    tracing::info!("saved metadata sidecar {}", sidecar.display());
    Ok(sidecar)
}

/// Normalise a user-chosen plot file name to end in `.plot.json` (or `.json`).
pub fn plot_file_name(path: &Path) -> PathBuf {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    if is_json {
        path.to_path_buf()
    } else {
        plot_path_for(path)
    }
}

pub fn save_plot(path: &Path, metadata: &NovelMetadata) -> Result<PathBuf> {
    let path = plot_file_name(path);
    let payload = serde_json::to_string_pretty(&envelope(metadata, true)?)?;
    write_atomic(&path, payload.as_bytes())?;
    tracing::info!("saved plot {}", path.display());
    Ok(path)
}

/// Read a plot file. Files without a `metadata` wrapper are read as a bare
/// payload.
pub fn load_plot(path: &Path) -> Result<NovelMetadata> {
    let raw = fs::read_to_string(path)?;
    let mut value: Value = serde_json::from_str(&raw)?;
    let payload = if value.get("metadata").is_some() {
        value["metadata"].take()
    } else {
        value
    };
    Ok(NovelMetadata::from_value(payload))
}

// ============================================================================
// Field coercion
// ============================================================================

fn loose_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f as i64)
            })
        }
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn loose_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn chapter_number<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(loose_int(&Value::deserialize(deserializer)?).unwrap_or(1))
}

fn loose_count<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(loose_int(&Value::deserialize(deserializer)?).unwrap_or(0))
}

fn daily_target<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(loose_int(&Value::deserialize(deserializer)?).unwrap_or(DEFAULT_DAILY_TARGET))
}

/// Entries that are not objects are dropped
fn loose_list<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

fn loose_goals<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<ProgressGoals, D::Error> {
    Ok(serde_json::from_value(Value::deserialize(deserializer)?).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NovelMetadata {
        NovelMetadata {
            work_title: "吾輩は猫である".to_string(),
            characters: vec![CharacterProfile {
                name: "苦沙弥".to_string(),
                role: "主人".to_string(),
                ..Default::default()
            }],
            chapters: vec![ChapterMemo {
                number: 1,
                title: "一".to_string(),
                target_chars: 8000,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_clamps_numeric_fields() {
        let value = json!({
            "chapters": [
                {"number": 0, "target_chars": -5},
                {"number": 12000, "target_chars": 5_000_000}
            ],
            "progress_goals": {"daily_target_chars": -1}
        });
        let metadata = NovelMetadata::from_value(value);
        assert_eq!(metadata.chapters[0].number, 1);
        assert_eq!(metadata.chapters[0].target_chars, 0);
        assert_eq!(metadata.chapters[1].number, 9999);
        assert_eq!(metadata.chapters[1].target_chars, 1_000_000);
        assert_eq!(metadata.progress_goals.daily_target_chars, 0);
    }

    #[test]
    fn test_missing_fields_default() {
        let metadata = NovelMetadata::from_value(json!({"genre": "SF"}));
        assert_eq!(metadata.genre, "SF");
        assert_eq!(metadata.progress_goals.daily_target_chars, 2000);
        assert!(metadata.characters.is_empty());
    }

    #[test]
    fn test_mistyped_field_keeps_the_rest() {
        let metadata = NovelMetadata::from_value(json!({
            "work_title": "吾輩は猫である",
            "genre": 7,
            "characters": [{"name": "迷亭", "notes": null}, "stray"],
            "chapters": [{"number": "3", "target_chars": 1500.0}, {"number": "x"}],
            "progress_goals": {"daily_target_chars": "800"}
        }));
        assert_eq!(metadata.work_title, "吾輩は猫である");
        assert_eq!(metadata.genre, "7");
        assert_eq!(metadata.characters.len(), 1);
        assert_eq!(metadata.characters[0].name, "迷亭");
        assert_eq!(metadata.chapters[0].number, 3);
        assert_eq!(metadata.chapters[0].target_chars, 1500);
        assert_eq!(metadata.chapters[1].number, 1);
        assert_eq!(metadata.progress_goals.daily_target_chars, 800);
    }

    #[test]
    fn test_mistyped_numbers_are_still_clamped() {
        let metadata = NovelMetadata::from_value(json!({
            "chapters": [{"number": "12000", "target_chars": "-3"}],
            "progress_goals": "daily"
        }));
        assert_eq!(metadata.chapters[0].number, MAX_CHAPTER_NUMBER);
        assert_eq!(metadata.chapters[0].target_chars, 0);
        assert_eq!(metadata.progress_goals, ProgressGoals::default());
    }

    #[test]
    fn test_malformed_payload_is_empty() {
        assert!(NovelMetadata::from_value(json!({"characters": 3})).is_empty());
        assert!(NovelMetadata::from_value(json!("nope")).is_empty());
    }

    #[test]
    fn test_paths() {
        let path = Path::new("/tmp/novel.txt");
        assert_eq!(sidecar_path_for(path), PathBuf::from("/tmp/novel.txt.narrative.json"));
        assert_eq!(plot_path_for(path), PathBuf::from("/tmp/novel.txt.plot.json"));
        assert_eq!(plot_file_name(Path::new("a/plan")), PathBuf::from("a/plan.plot.json"));
        assert_eq!(plot_file_name(Path::new("a/plan.json")), PathBuf::from("a/plan.json"));
    }

    #[test]
    fn test_filename_seed() {
        let blank = NovelMetadata::default();
        assert_eq!(filename_seed(&sample(), "", "無題"), "吾輩は猫で");
        assert_eq!(filename_seed(&blank, "\n  序 章: 始まり\n", "無題"), "序章始まり");
        assert_eq!(filename_seed(&blank, "", "untitled"), "untit");
        assert_eq!(filename_seed(&blank, "???", "無題"), "story");
    }

    #[test]
    fn test_progress_report() {
        let report = ProgressGoals::default().report(500);
        assert_eq!(report.rate, Some(25.0));
        assert_eq!(report.remaining, Some(1500));
        assert_eq!(report.sheets, 1.25);

        let none = ProgressGoals { daily_target_chars: 0 }.report(10);
        assert_eq!(none.rate, None);
        assert_eq!(none.remaining, None);
    }

    #[test]
    fn test_sidecar_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let text = dir.path().join("novel.txt");
        let written = save_sidecar(&text, &sample()).unwrap();
        assert!(written.ends_with("novel.txt.narrative.json"));

        let raw: Value = serde_json::from_str(&fs::read_to_string(&written).unwrap()).unwrap();
        assert_eq!(raw["meta"]["app"], "Narrative_Edit");
        assert_eq!(raw["meta"]["schema"], 1);
        assert!(raw["meta"]["saved_at"].as_u64().is_some());

        let (loaded, path) = load_sidecar(&text);
        assert_eq!(loaded, sample());
        assert_eq!(path, written);
    }

    #[test]
    fn test_unreadable_sidecar_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let text = dir.path().join("novel.txt");
        fs::write(sidecar_path_for(&text), "{not json").unwrap();
        let (loaded, _) = load_sidecar(&text);
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_plot_file_tagged_and_bare_payload_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let written = save_plot(&dir.path().join("plan"), &sample()).unwrap();
        let raw: Value = serde_json::from_str(&fs::read_to_string(&written).unwrap()).unwrap();
        assert_eq!(raw["meta"]["type"], "plot");
        assert_eq!(load_plot(&written).unwrap(), sample());

        let bare = dir.path().join("bare.json");
        fs::write(&bare, r#"{"work_title": "こころ"}"#).unwrap();
        assert_eq!(load_plot(&bare).unwrap().work_title, "こころ");
    }
}
