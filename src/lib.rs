pub mod ai;
pub mod game;
pub mod utils;
pub mod web;

use std::cell::{RefCell, RefMut};
use std::rc::Rc;
use std::str::FromStr;

use gloo_timers::future::TimeoutFuture;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;

pub use ai::{select_move, AiAgent, AiConfig, AiDecision, AiDifficulty, MoveRule};
pub use game::{
    AiTicket, AudioCue, Board, Cell, CellIndex, Cue, GameEvent, GameMode, GameResult,
    GameSession, IntegrityError, MemoryStore, MoveOutcome, Notification, NotificationQueue,
    PreferenceStore, Preferences, Player, Renderer, RuleEngine, RuleError, RuleResolution,
    Scoreboard, SessionSnapshot, Status, StoreError, Theme, WinLine, WIN_LINES,
};
pub use web::{JsCallbacks, LocalStorageStore};

#[cfg(all(feature = "wee_alloc", target_arch = "wasm32"))]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

/// AI "思考" 的默认延迟。
pub const DEFAULT_AI_DELAY_MS: u32 = 500;

#[wasm_bindgen(start)]
pub fn start() {
    utils::set_panic_hook();
}

fn to_js_error(error: RuleError) -> JsValue {
    to_value(&error).unwrap_or_else(|serialize_err| JsValue::from_str(&serialize_err.to_string()))
}

fn serde_to_js_error<E: std::fmt::Display>(error: E) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn board_from_js(cells: JsValue) -> Result<Board, JsValue> {
    let cells: Vec<Cell> = from_value(cells).map_err(JsValue::from)?;
    Board::from_slice(&cells).map_err(|error| to_js_error(RuleError::IntegrityViolation { error }))
}

fn parse_difficulty(difficulty: Option<&str>) -> AiDifficulty {
    difficulty
        .and_then(|value| AiDifficulty::from_str(value).ok())
        .unwrap_or_default()
}

type BrowserSession = GameSession<NotificationQueue, NotificationQueue, LocalStorageStore>;

fn busy_error() -> JsValue {
    JsValue::from_str("game session is busy")
}

/// 浏览器端的对局句柄。会话与延迟任务共享同一个 `Rc<RefCell<..>>`；
/// 会话产生的回调先进入队列，借用释放后才交给 JS，
/// 所以回调里可以再调用本对象的方法。
#[wasm_bindgen]
pub struct TicTacToe {
    session: Rc<RefCell<BrowserSession>>,
    queue: NotificationQueue,
    callbacks: JsCallbacks,
    ai_delay_ms: u32,
}

#[wasm_bindgen]
impl TicTacToe {
    #[wasm_bindgen(constructor)]
    pub fn new(callbacks: JsValue) -> TicTacToe {
        let queue = NotificationQueue::new();
        let session = GameSession::new(queue.clone(), queue.clone(), LocalStorageStore::new());
        let game = TicTacToe {
            session: Rc::new(RefCell::new(session)),
            queue,
            callbacks: JsCallbacks::new(callbacks),
            ai_delay_ms: DEFAULT_AI_DELAY_MS,
        };
        game.flush();
        game
    }

    #[wasm_bindgen(getter, js_name = aiDelayMs)]
    pub fn ai_delay_ms(&self) -> u32 {
        self.ai_delay_ms
    }

    #[wasm_bindgen(setter, js_name = aiDelayMs)]
    pub fn set_ai_delay_ms(&mut self, delay_ms: u32) {
        self.ai_delay_ms = delay_ms;
    }

    pub fn play(&self, index: u32) -> Result<JsValue, JsValue> {
        let outcome = self.session_mut()?.play(index as usize);
        self.flush();
        let outcome = outcome.map_err(to_js_error)?;
        if let Some(ticket) = outcome.ai_pending {
            self.schedule_ai(ticket);
        }
        to_value(&outcome).map_err(JsValue::from)
    }

    #[wasm_bindgen(js_name = newGame)]
    pub fn new_game(&self) -> Result<(), JsValue> {
        let ticket = self.session_mut()?.new_game();
        self.flush();
        self.schedule_if_needed(ticket);
        Ok(())
    }

    #[wasm_bindgen(js_name = resetScores)]
    pub fn reset_scores(&self) -> Result<(), JsValue> {
        let ticket = self.session_mut()?.reset_scores();
        self.flush();
        self.schedule_if_needed(ticket);
        Ok(())
    }

    #[wasm_bindgen(js_name = setMode)]
    pub fn set_mode(&self, mode: &str) -> Result<(), JsValue> {
        let mode = GameMode::from_str(mode)
            .map_err(|_| JsValue::from_str(&format!("unknown game mode: {mode}")))?;
        let ticket = self.session_mut()?.set_mode(mode);
        self.flush();
        self.schedule_if_needed(ticket);
        Ok(())
    }

    #[wasm_bindgen(js_name = setDifficulty)]
    pub fn set_difficulty(&self, difficulty: &str) -> Result<(), JsValue> {
        let difficulty = AiDifficulty::from_str(difficulty)
            .map_err(|_| JsValue::from_str(&format!("unknown difficulty: {difficulty}")))?;
        self.session_mut()?.set_difficulty(difficulty);
        self.flush();
        Ok(())
    }

    #[wasm_bindgen(js_name = toggleSound)]
    pub fn toggle_sound(&self) -> Result<bool, JsValue> {
        let enabled = self.session_mut()?.toggle_sound();
        self.flush();
        Ok(enabled)
    }

    #[wasm_bindgen(js_name = setEffects)]
    pub fn set_effects(&self, enabled: bool) -> Result<(), JsValue> {
        self.session_mut()?.set_effects_enabled(enabled);
        self.flush();
        Ok(())
    }

    #[wasm_bindgen(js_name = setTheme)]
    pub fn set_theme(&self, theme: &str) -> Result<(), JsValue> {
        let theme = Theme::from_str(theme)
            .map_err(|_| JsValue::from_str(&format!("unknown theme: {theme}")))?;
        self.session_mut()?.set_theme(theme);
        self.flush();
        Ok(())
    }

    pub fn status(&self) -> Result<JsValue, JsValue> {
        let status = self.session.try_borrow().map_err(|_| busy_error())?.status();
        to_value(&status).map_err(JsValue::from)
    }

    #[wasm_bindgen(js_name = stateJson)]
    pub fn state_json(&self) -> Result<String, JsValue> {
        let snapshot = self
            .session
            .try_borrow()
            .map_err(|_| busy_error())?
            .snapshot();
        serde_json::to_string(&snapshot).map_err(serde_to_js_error)
    }

    fn session_mut(&self) -> Result<RefMut<'_, BrowserSession>, JsValue> {
        self.session.try_borrow_mut().map_err(|_| busy_error())
    }

    /// 必须在会话借用释放之后调用。
    fn flush(&self) {
        self.callbacks.deliver(&self.queue);
    }

    fn schedule_if_needed(&self, ticket: Option<AiTicket>) {
        if let Some(ticket) = ticket {
            self.schedule_ai(ticket);
        }
    }

    fn schedule_ai(&self, ticket: AiTicket) {
        let session = Rc::clone(&self.session);
        let queue = self.queue.clone();
        let callbacks = self.callbacks.clone();
        let delay = self.ai_delay_ms;
        spawn_local(async move {
            if delay > 0 {
                TimeoutFuture::new(delay).await;
            }
            let resolved = match session.try_borrow_mut() {
                Ok(mut session) => session.resolve_ai_move(ticket),
                Err(_) => {
                    console_warn!("AI move skipped: session is busy");
                    return;
                }
            };
            callbacks.deliver(&queue);
            match resolved {
                Ok(Some(outcome)) => {
                    console_log!("AI played {} ({:?})", outcome.index, outcome.ai_rule)
                }
                Ok(None) => {}
                Err(error) => console_warn!("AI move rejected: {error}"),
            }
        });
    }
}

/// 判定任意棋盘（`["X", "", "O", ...]`）的局面。
#[wasm_bindgen(js_name = "evaluateBoard")]
pub fn evaluate_board(cells: JsValue) -> Result<JsValue, JsValue> {
    let board = board_from_js(cells)?;
    to_value(&RuleEngine::evaluate(&board)).map_err(JsValue::from)
}

/// 无状态落子：返回新棋盘、事件与判定。
#[wasm_bindgen(js_name = "applyMove")]
pub fn apply_move(cells: JsValue, index: u32) -> Result<JsValue, JsValue> {
    let mut board = board_from_js(cells)?;
    let resolution = RuleEngine::new()
        .play(&mut board, index as usize)
        .map_err(to_js_error)?;
    to_value(&resolution).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "computeAiMove")]
pub fn compute_ai_move(cells: JsValue, difficulty: Option<String>) -> Result<JsValue, JsValue> {
    let board = board_from_js(cells)?;
    let difficulty = parse_difficulty(difficulty.as_deref());
    let mut agent = AiAgent::new(AiConfig::from_difficulty(difficulty));
    let decision = agent.decide(&board);
    to_value(&decision).map_err(JsValue::from)
}
