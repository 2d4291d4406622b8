//! 会话回调的延迟投递。
//!
//! 浏览器端的会话放在 `RefCell` 里，回调若在会话借用期间同步调用 JS，
//! JS 再回头读取对局状态就会重复借用。这里先把回调排进队列，
//! 等借用释放后再由宿主统一投递。

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use super::session::{AudioCue, Cue, Renderer, Status};
use super::state::{CellIndex, GameResult, Player, Scoreboard};

/// 一次待投递的回调，与 `Renderer` / `AudioCue` 的方法一一对应。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    MoveApplied {
        index: CellIndex,
        player: Player,
        animate: bool,
    },
    GameEnded {
        result: GameResult,
        highlight: bool,
    },
    ScoreChanged(Scoreboard),
    StatusChanged(Status),
    BoardReset,
    Sound(Cue),
}

/// 共享的回调队列。克隆出的句柄指向同一个队列，
/// 同时作为会话的渲染端和音效端时，顺序与会话发出的顺序一致。
#[derive(Debug, Clone, Default)]
pub struct NotificationQueue {
    pending: Rc<RefCell<VecDeque<Notification>>>,
}

impl NotificationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, notification: Notification) {
        self.pending.borrow_mut().push_back(notification);
    }

    /// 取出当前排队的全部回调。返回前队列的借用已经释放，
    /// 处理回调时可以继续往队列里追加。
    pub fn drain(&self) -> Vec<Notification> {
        self.pending.borrow_mut().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.borrow().is_empty()
    }
}

impl Renderer for NotificationQueue {
    fn move_applied(&mut self, index: CellIndex, player: Player, animate: bool) {
        self.push(Notification::MoveApplied {
            index,
            player,
            animate,
        });
    }

    fn game_ended(&mut self, result: &GameResult, highlight: bool) {
        self.push(Notification::GameEnded {
            result: *result,
            highlight,
        });
    }

    fn score_changed(&mut self, scoreboard: &Scoreboard) {
        self.push(Notification::ScoreChanged(*scoreboard));
    }

    fn status_changed(&mut self, status: &Status) {
        self.push(Notification::StatusChanged(*status));
    }

    fn board_reset(&mut self) {
        self.push(Notification::BoardReset);
    }
}

impl AudioCue for NotificationQueue {
    fn play(&mut self, cue: Cue) {
        self.push(Notification::Sound(cue));
    }
}
