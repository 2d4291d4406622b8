use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::state::Scoreboard;
use crate::ai::AiDifficulty;
use crate::console_warn;

/// 对战模式。序列化值沿用前端的 `player` / `ai`。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum GameMode {
    #[default]
    #[serde(rename = "player")]
    HumanVsHuman,
    #[serde(rename = "ai")]
    HumanVsAi,
}

impl GameMode {
    pub fn is_ai(self) -> bool {
        self == GameMode::HumanVsAi
    }
}

impl FromStr for GameMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "player" | "human" | "human-vs-human" | "pvp" => Ok(GameMode::HumanVsHuman),
            "ai" | "human-vs-ai" | "pve" => Ok(GameMode::HumanVsAi),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl FromStr for Theme {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            _ => Err(()),
        }
    }
}

/// 需要持久化的全部偏好与比分。缺失字段回落到默认值。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    pub scores: Scoreboard,
    pub mode: GameMode,
    pub difficulty: AiDifficulty,
    pub theme: Theme,
    pub sound_enabled: bool,
    pub effects_enabled: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            scores: Scoreboard::default(),
            mode: GameMode::default(),
            difficulty: AiDifficulty::default(),
            theme: Theme::default(),
            sound_enabled: true,
            effects_enabled: true,
        }
    }
}

impl Preferences {
    /// 逐字段解析：某个字段的值无法识别时只有该字段回落到默认值，
    /// 其余字段（尤其是比分）照常读取。整份文档不是 JSON 对象时才算损坏。
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        let document: Value =
            serde_json::from_str(json).map_err(|err| StoreError::Corrupt(err.to_string()))?;
        match document {
            Value::Object(fields) => Ok(Self::from_fields(&fields)),
            other => Err(StoreError::Corrupt(format!(
                "expected a JSON object, found {other}"
            ))),
        }
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        serde_json::to_string(self).map_err(|err| StoreError::Corrupt(err.to_string()))
    }

    fn from_fields(fields: &Map<String, Value>) -> Self {
        let defaults = Self::default();
        Self {
            scores: fields
                .get("scores")
                .map_or(defaults.scores, scoreboard_from_value),
            mode: field_or(fields, "mode", defaults.mode),
            difficulty: field_or(fields, "difficulty", defaults.difficulty),
            theme: field_or(fields, "theme", defaults.theme),
            sound_enabled: field_or(fields, "soundEnabled", defaults.sound_enabled),
            effects_enabled: field_or(fields, "effectsEnabled", defaults.effects_enabled),
        }
    }

    /// 从旧版前端的分散键（`ticTacToeScores`、`ticTacToeTheme` 等）拼出偏好。
    /// 一个旧键都没有时返回 `None`。
    pub fn from_legacy<F>(read: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if LEGACY_KEYS.into_iter().all(|key| read(key).is_none()) {
            return None;
        }
        let mut prefs = Self::default();
        if let Some(scores) = read(LEGACY_SCORES_KEY) {
            match serde_json::from_str::<Value>(&scores) {
                Ok(value) => prefs.scores = scoreboard_from_value(&value),
                Err(err) => console_warn!("ignoring legacy scores: {err}"),
            }
        }
        if let Some(theme) = read(LEGACY_THEME_KEY) {
            prefs.theme = theme.parse().unwrap_or_default();
        }
        // 旧版只认字面量 "false"。
        if let Some(effects) = read(LEGACY_EFFECTS_KEY) {
            prefs.effects_enabled = effects != "false";
        }
        if let Some(sound) = read(LEGACY_SOUND_KEY) {
            prefs.sound_enabled = sound != "false";
        }
        if let Some(mode) = read(LEGACY_MODE_KEY) {
            prefs.mode = mode.parse().unwrap_or_default();
        }
        if let Some(difficulty) = read(LEGACY_DIFFICULTY_KEY) {
            prefs.difficulty = difficulty.parse().unwrap_or_default();
        }
        Some(prefs)
    }
}

pub const LEGACY_SCORES_KEY: &str = "ticTacToeScores";
pub const LEGACY_THEME_KEY: &str = "ticTacToeTheme";
pub const LEGACY_EFFECTS_KEY: &str = "ticTacToeEffects";
pub const LEGACY_SOUND_KEY: &str = "ticTacToeSound";
pub const LEGACY_MODE_KEY: &str = "ticTacToeMode";
pub const LEGACY_DIFFICULTY_KEY: &str = "ticTacToeDifficulty";

const LEGACY_KEYS: [&str; 6] = [
    LEGACY_SCORES_KEY,
    LEGACY_THEME_KEY,
    LEGACY_EFFECTS_KEY,
    LEGACY_SOUND_KEY,
    LEGACY_MODE_KEY,
    LEGACY_DIFFICULTY_KEY,
];

fn field_or<T: DeserializeOwned>(fields: &Map<String, Value>, key: &str, fallback: T) -> T {
    match fields.get(key) {
        None => fallback,
        Some(value) => T::deserialize(value).unwrap_or_else(|err| {
            console_warn!("ignoring stored {key}: {err}");
            fallback
        }),
    }
}

/// 比分同样逐项读取，单个计数坏掉不影响其他计数。
fn scoreboard_from_value(value: &Value) -> Scoreboard {
    let Value::Object(fields) = value else {
        console_warn!("ignoring stored scores: {value}");
        return Scoreboard::default();
    };
    Scoreboard {
        x_wins: field_or(fields, "xWins", 0),
        o_wins: field_or(fields, "oWins", 0),
        draws: field_or(fields, "draws", 0),
        x_score: field_or(fields, "xScore", 0),
        o_score: field_or(fields, "oScore", 0),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("preference storage is unavailable: {0}")]
    Unavailable(String),
    #[error("stored preferences could not be read: {0}")]
    Corrupt(String),
}

/// 偏好存储。会话启动时读取一次，之后每次变更都整体写回。
pub trait PreferenceStore {
    fn load(&self) -> Result<Preferences, StoreError>;
    fn save(&mut self, preferences: &Preferences) -> Result<(), StoreError>;
}

/// 内存中的存储，保存序列化后的 JSON，与浏览器实现走同一条路径。
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    document: Option<String>,
    saves: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接放入一份原始文档，用于模拟旧版本或手工改过的存储内容。
    pub fn with_document(document: impl Into<String>) -> Self {
        Self {
            document: Some(document.into()),
            saves: 0,
        }
    }

    pub fn with_preferences(preferences: &Preferences) -> Result<Self, StoreError> {
        Ok(Self {
            document: Some(preferences.to_json()?),
            saves: 0,
        })
    }

    pub fn document(&self) -> Option<&str> {
        self.document.as_deref()
    }

    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl PreferenceStore for MemoryStore {
    fn load(&self) -> Result<Preferences, StoreError> {
        match &self.document {
            Some(json) => Preferences::from_json(json),
            None => Ok(Preferences::default()),
        }
    }

    fn save(&mut self, preferences: &Preferences) -> Result<(), StoreError> {
        self.document = Some(preferences.to_json()?);
        self.saves += 1;
        Ok(())
    }
}

impl PreferenceStore for () {
    fn load(&self) -> Result<Preferences, StoreError> {
        Ok(Preferences::default())
    }

    fn save(&mut self, _preferences: &Preferences) -> Result<(), StoreError> {
        Ok(())
    }
}
