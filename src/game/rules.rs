use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::state::{Board, CellIndex, GameEvent, GameResult, IntegrityError, Player, BOARD_SIZE};

/// 非法落子。所有变体都可恢复，出错时棋盘保持原样。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[serde(tag = "type")]
pub enum RuleError {
    #[error("cell index {index} is outside the board")]
    IndexOutOfRange { index: usize },
    #[error("cell {index} is already occupied")]
    CellOccupied { index: CellIndex },
    #[error("the game is already finished")]
    GameFinished,
    #[error("it is {expected}'s turn, not {actual}'s")]
    NotPlayerTurn { expected: Player, actual: Player },
    #[error("waiting for the AI to move")]
    AiMovePending,
    #[error("board integrity violated: {error:?}")]
    IntegrityViolation { error: IntegrityError },
}

impl RuleError {
    /// 除了棋盘数据本身损坏，其余都属于 "InvalidMove"。
    pub fn is_invalid_move(&self) -> bool {
        !matches!(self, RuleError::IntegrityViolation { .. })
    }
}

/// 一次落子后的结果：新棋盘、事件以及局面判定。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleResolution {
    pub board: Board,
    pub events: Vec<GameEvent>,
    pub result: GameResult,
}

impl RuleResolution {
    pub fn new(board: Board, mut events: Vec<GameEvent>) -> Self {
        let result = board.evaluate();
        match result {
            GameResult::Won { player, line } => {
                events.push(GameEvent::GameWon { player, line });
            }
            GameResult::Draw => events.push(GameEvent::GameDrawn),
            GameResult::InProgress => {}
        }
        Self {
            board,
            events,
            result,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RuleEngine;

impl RuleEngine {
    pub fn new() -> Self {
        Self
    }

    fn ensure_in_range(index: usize) -> Result<(), RuleError> {
        if index >= BOARD_SIZE {
            return Err(RuleError::IndexOutOfRange { index });
        }
        Ok(())
    }

    fn ensure_not_finished(board: &Board) -> Result<(), RuleError> {
        if board.is_finished() {
            return Err(RuleError::GameFinished);
        }
        Ok(())
    }

    /// 校验并落子；失败时不修改棋盘。
    /// 反序列化得到的棋盘可能与棋子数不符，落子前先做一致性检查。
    pub fn apply_move(
        &self,
        board: &mut Board,
        index: usize,
        player: Player,
    ) -> Result<(), RuleError> {
        Self::ensure_in_range(index)?;
        Self::ensure_integrity(board)?;
        Self::ensure_not_finished(board)?;

        let expected = board.current_player();
        if expected != player {
            return Err(RuleError::NotPlayerTurn {
                expected,
                actual: player,
            });
        }
        if !board.is_empty_cell(index) {
            return Err(RuleError::CellOccupied { index });
        }

        board.place(index, player);
        Ok(())
    }

    /// 以当前行动方落子，并给出事件与判定。
    pub fn play(&self, board: &mut Board, index: usize) -> Result<RuleResolution, RuleError> {
        let player = board.current_player();
        self.apply_move(board, index, player)?;
        let events = vec![GameEvent::MoveApplied { index, player }];
        Ok(RuleResolution::new(board.clone(), events))
    }

    pub fn evaluate(board: &Board) -> GameResult {
        board.evaluate()
    }

    pub fn ensure_integrity(board: &Board) -> Result<(), RuleError> {
        board
            .integrity_check()
            .map_err(|error| RuleError::IntegrityViolation { error })
    }
}
