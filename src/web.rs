//! 浏览器端协作者：JS 回调对象与 `localStorage`。

use serde::Serialize;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::js_sys::{Array, Function, Reflect};
use web_sys::Storage;

use crate::game::{Notification, NotificationQueue, PreferenceStore, Preferences, StoreError};
use crate::{console_log, console_warn};

/// `localStorage` 中保存偏好的键。
pub const STORAGE_KEY: &str = "ticTacToePreferences";

fn to_js<T: Serialize>(value: &T) -> JsValue {
    serde_wasm_bindgen::to_value(value)
        .unwrap_or_else(|serialize_err| JsValue::from_str(&serialize_err.to_string()))
}

/// 把排队的会话回调转发给 JS 对象上的同名函数，缺失的回调直接忽略：
/// `onMoveApplied(index, player, animate)`、`onGameEnded(result, highlight)`、
/// `onScoreChanged(scoreboard)`、`onStatusChanged(status)`、`onBoardReset()`、`onSound(cue)`。
#[derive(Debug, Clone)]
pub struct JsCallbacks {
    target: JsValue,
}

impl JsCallbacks {
    pub fn new(target: JsValue) -> Self {
        Self { target }
    }

    fn callback(&self, name: &str) -> Option<Function> {
        if self.target.is_undefined() || self.target.is_null() {
            return None;
        }
        Reflect::get(&self.target, &JsValue::from_str(name))
            .ok()?
            .dyn_into::<Function>()
            .ok()
    }

    fn invoke(&self, name: &str, args: &[JsValue]) {
        let Some(function) = self.callback(name) else {
            return;
        };
        let args: Array = args.iter().collect();
        if let Err(err) = function.apply(&self.target, &args) {
            console_warn!("{name} callback threw: {err:?}");
        }
    }

    /// 投递排队的回调，直到队列清空。回调里引发的新回调也在这一轮送出。
    pub fn deliver(&self, queue: &NotificationQueue) {
        loop {
            let batch = queue.drain();
            if batch.is_empty() {
                break;
            }
            for notification in &batch {
                self.dispatch(notification);
            }
        }
    }

    fn dispatch(&self, notification: &Notification) {
        match notification {
            Notification::MoveApplied {
                index,
                player,
                animate,
            } => self.invoke(
                "onMoveApplied",
                &[
                    JsValue::from(*index as u32),
                    JsValue::from_str(player.as_str()),
                    JsValue::from_bool(*animate),
                ],
            ),
            Notification::GameEnded { result, highlight } => {
                self.invoke("onGameEnded", &[to_js(result), JsValue::from_bool(*highlight)])
            }
            Notification::ScoreChanged(scoreboard) => {
                self.invoke("onScoreChanged", &[to_js(scoreboard)])
            }
            Notification::StatusChanged(status) => self.invoke("onStatusChanged", &[to_js(status)]),
            Notification::BoardReset => self.invoke("onBoardReset", &[]),
            Notification::Sound(cue) => self.invoke("onSound", &[to_js(cue)]),
        }
    }
}

/// 基于 `window.localStorage` 的偏好存储，整份偏好存为一个 JSON 文档。
/// 新键不存在时读取旧版前端的分散键，下次保存即写入新键。
#[derive(Debug, Clone)]
pub struct LocalStorageStore {
    key: String,
}

impl LocalStorageStore {
    pub fn new() -> Self {
        Self::with_key(STORAGE_KEY)
    }

    pub fn with_key(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    fn storage() -> Result<Storage, StoreError> {
        let window =
            web_sys::window().ok_or_else(|| StoreError::Unavailable("no window".into()))?;
        window
            .local_storage()
            .map_err(|err| StoreError::Unavailable(format!("{err:?}")))?
            .ok_or_else(|| StoreError::Unavailable("localStorage is disabled".into()))
    }
}

impl Default for LocalStorageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PreferenceStore for LocalStorageStore {
    fn load(&self) -> Result<Preferences, StoreError> {
        let storage = Self::storage()?;
        let stored = storage
            .get_item(&self.key)
            .map_err(|err| StoreError::Unavailable(format!("{err:?}")))?;
        match stored {
            Some(json) => Preferences::from_json(&json),
            None => {
                let legacy = Preferences::from_legacy(|key| storage.get_item(key).ok().flatten());
                if legacy.is_some() {
                    console_log!("migrating preferences from legacy storage keys");
                }
                Ok(legacy.unwrap_or_default())
            }
        }
    }

    fn save(&mut self, preferences: &Preferences) -> Result<(), StoreError> {
        let json = preferences.to_json()?;
        Self::storage()?
            .set_item(&self.key, &json)
            .map_err(|err| StoreError::Unavailable(format!("{err:?}")))
    }
}
