use std::str::FromStr;

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::game::{Board, Cell, CellIndex, Player, CENTER, CORNERS, EDGES, WIN_LINES};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AiDifficulty {
    Easy,
    #[default]
    #[serde(alias = "normal")]
    Medium,
    Hard,
}

impl AiDifficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            AiDifficulty::Easy => "easy",
            AiDifficulty::Medium => "medium",
            AiDifficulty::Hard => "hard",
        }
    }
}

impl FromStr for AiDifficulty {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(AiDifficulty::Easy),
            "medium" | "normal" => Ok(AiDifficulty::Medium),
            "hard" => Ok(AiDifficulty::Hard),
            _ => Err(()),
        }
    }
}

/// 产生落子的规则，按优先级排列。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MoveRule {
    Win,
    Block,
    Center,
    Corner,
    Edge,
    Random,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub difficulty: AiDifficulty,
    /// 每次决策使用启发式策略（而非随机）的概率。
    pub smart_probability: f64,
}

impl AiConfig {
    pub fn from_difficulty(difficulty: AiDifficulty) -> Self {
        let smart_probability = match difficulty {
            AiDifficulty::Easy => 0.0,
            AiDifficulty::Medium => 0.7,
            AiDifficulty::Hard => 1.0,
        };
        Self {
            difficulty,
            smart_probability,
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        AiConfig::from_difficulty(AiDifficulty::default())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AiDecision {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cell: Option<CellIndex>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<MoveRule>,
    pub difficulty: AiDifficulty,
}

/// 贪心启发式 AI：能赢就赢，能堵就堵，然后中心、角、边。不做搜索。
pub struct AiAgent {
    config: AiConfig,
    rng: SmallRng,
}

impl AiAgent {
    pub fn new(config: AiConfig) -> Self {
        Self {
            config,
            rng: SmallRng::from_entropy(),
        }
    }

    pub fn with_seed(config: AiConfig, seed: u64) -> Self {
        Self {
            config,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    pub fn set_difficulty(&mut self, difficulty: AiDifficulty) {
        self.config = AiConfig::from_difficulty(difficulty);
    }

    pub fn select_move(&mut self, board: &Board) -> Option<CellIndex> {
        self.decide(board).cell
    }

    /// 为棋盘上的当前行动方选择一个空格。无空格时 `cell` 为 `None`。
    pub fn decide(&mut self, board: &Board) -> AiDecision {
        self.decide_as(board, board.current_player())
    }

    pub fn decide_as(&mut self, board: &Board, me: Player) -> AiDecision {
        let difficulty = self.config.difficulty;
        let use_strategy = match difficulty {
            AiDifficulty::Easy => false,
            AiDifficulty::Hard => true,
            AiDifficulty::Medium => self.rng.gen::<f64>() < self.config.smart_probability,
        };

        let choice = if use_strategy {
            self.strategic_move(board, me)
        } else {
            self.random_move(board).map(|cell| (cell, MoveRule::Random))
        };

        AiDecision {
            cell: choice.map(|(cell, _)| cell),
            rule: choice.map(|(_, rule)| rule),
            difficulty,
        }
    }

    fn random_move(&mut self, board: &Board) -> Option<CellIndex> {
        board.empty_cells().choose(&mut self.rng).copied()
    }

    fn strategic_move(&mut self, board: &Board, me: Player) -> Option<(CellIndex, MoveRule)> {
        if let Some(cell) = completing_cell(board, me) {
            return Some((cell, MoveRule::Win));
        }
        if let Some(cell) = completing_cell(board, me.opponent()) {
            return Some((cell, MoveRule::Block));
        }
        if board.is_empty_cell(CENTER) {
            return Some((CENTER, MoveRule::Center));
        }
        if let Some(cell) = self.pick_among(board, &CORNERS) {
            return Some((cell, MoveRule::Corner));
        }
        if let Some(cell) = self.pick_among(board, &EDGES) {
            return Some((cell, MoveRule::Edge));
        }
        self.random_move(board).map(|cell| (cell, MoveRule::Random))
    }

    fn pick_among(&mut self, board: &Board, candidates: &[CellIndex]) -> Option<CellIndex> {
        let available: Vec<CellIndex> = candidates
            .iter()
            .copied()
            .filter(|&cell| board.is_empty_cell(cell))
            .collect();
        available.choose(&mut self.rng).copied()
    }
}

/// 按固定连线顺序找出 `player` 下一步即可连成三子的空格。
/// 每条线 `[a, b, c]` 依次检查缺 c、缺 b、缺 a 三种情形。
pub fn completing_cell(board: &Board, player: Player) -> Option<CellIndex> {
    let mark = Cell::from(player);
    let cells = board.cells();
    WIN_LINES.iter().find_map(|&[a, b, c]| {
        [(a, b, c), (a, c, b), (b, c, a)]
            .into_iter()
            .find(|&(first, second, gap)| {
                cells[first] == mark && cells[second] == mark && cells[gap].is_empty()
            })
            .map(|(_, _, gap)| gap)
    })
}

/// 一次性选子，使用系统熵初始化的随机数。
pub fn select_move(board: &Board, difficulty: AiDifficulty) -> Option<CellIndex> {
    AiAgent::new(AiConfig::from_difficulty(difficulty)).select_move(board)
}
