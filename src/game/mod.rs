//! 游戏核心逻辑模块（棋盘、规则引擎、会话）。

pub mod notifications;
pub mod preferences;
pub mod rules;
pub mod session;
pub mod state;

pub use notifications::{Notification, NotificationQueue};
pub use preferences::{GameMode, MemoryStore, PreferenceStore, Preferences, StoreError, Theme};
pub use rules::{RuleEngine, RuleError, RuleResolution};
pub use session::{
    AiTicket, AudioCue, Cue, GameSession, MoveOutcome, Renderer, SessionSnapshot, Status,
    AI_PLAYER,
};
pub use state::{
    Board, Cell, CellIndex, GameEvent, GameResult, IntegrityError, Player, Scoreboard, WinLine,
    BOARD_SIZE, CENTER, CORNERS, EDGES, WIN_LINES, WIN_POINTS,
};
