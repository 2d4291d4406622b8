//! AI 落子算法（贪心启发式）。

pub mod heuristic;

pub use heuristic::{
    completing_cell, select_move, AiAgent, AiConfig, AiDecision, AiDifficulty, MoveRule,
};
