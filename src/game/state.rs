use serde::{Deserialize, Serialize};
use std::fmt;

/// 棋盘格子数量（3×3）。
pub const BOARD_SIZE: usize = 9;
/// 中心格。
pub const CENTER: CellIndex = 4;
pub const CORNERS: [CellIndex; 4] = [0, 2, 6, 8];
pub const EDGES: [CellIndex; 4] = [1, 3, 5, 7];

/// 格子下标，按行优先排列：
/// ```text
/// 0 | 1 | 2
/// 3 | 4 | 5
/// 6 | 7 | 8
/// ```
pub type CellIndex = usize;
/// 一条获胜连线上的三个格子。
pub type WinLine = [CellIndex; 3];

/// 固定的 8 条获胜连线：先三行，再三列，最后两条对角线。AI 的扫描顺序依赖这里的排列。
pub const WIN_LINES: [WinLine; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Player {
    X,
    O,
}

impl Player {
    pub fn opponent(self) -> Self {
        match self {
            Player::X => Player::O,
            Player::O => Player::X,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Player::X => "X",
            Player::O => "O",
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单个格子的内容。序列化为 `""`、`"X"`、`"O"`，与前端的数组表示一致。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Cell {
    #[default]
    #[serde(rename = "")]
    Empty,
    X,
    O,
}

impl Cell {
    pub fn is_empty(self) -> bool {
        self == Cell::Empty
    }

    pub fn player(self) -> Option<Player> {
        match self {
            Cell::Empty => None,
            Cell::X => Some(Player::X),
            Cell::O => Some(Player::O),
        }
    }
}

impl From<Player> for Cell {
    fn from(player: Player) -> Self {
        match player {
            Player::X => Cell::X,
            Player::O => Cell::O,
        }
    }
}

/// 对局结果。`Won` 和 `Draw` 为终局。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum GameResult {
    InProgress,
    Won { player: Player, line: WinLine },
    Draw,
}

impl GameResult {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GameResult::InProgress)
    }

    pub fn winner(&self) -> Option<Player> {
        match self {
            GameResult::Won { player, .. } => Some(*player),
            _ => None,
        }
    }
}

/// 游戏事件流，供前端回放。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum GameEvent {
    MoveApplied { index: CellIndex, player: Player },
    GameWon { player: Player, line: WinLine },
    GameDrawn,
    ScoreChanged { scoreboard: Scoreboard },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum IntegrityError {
    InvalidLength { len: usize },
    CellCountMismatch { x: usize, o: usize },
}

/// 棋盘状态：9 个格子加上当前行动方。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Board {
    cells: [Cell; BOARD_SIZE],
    current_player: Player,
}

impl Board {
    pub fn new() -> Self {
        Self {
            cells: [Cell::Empty; BOARD_SIZE],
            current_player: Player::X,
        }
    }

    /// 由已有格子构造棋盘，行动方由双方棋子数推出（X 先手）。
    pub fn from_cells(cells: [Cell; BOARD_SIZE]) -> Result<Self, IntegrityError> {
        let board = Self {
            cells,
            current_player: Player::X,
        };
        let (x, o) = (board.count(Player::X), board.count(Player::O));
        if x != o && x != o + 1 {
            return Err(IntegrityError::CellCountMismatch { x, o });
        }
        let current_player = if x == o { Player::X } else { Player::O };
        Ok(Self {
            current_player,
            ..board
        })
    }

    pub fn from_slice(cells: &[Cell]) -> Result<Self, IntegrityError> {
        let cells: [Cell; BOARD_SIZE] = cells
            .try_into()
            .map_err(|_| IntegrityError::InvalidLength { len: cells.len() })?;
        Self::from_cells(cells)
    }

    pub fn cells(&self) -> &[Cell; BOARD_SIZE] {
        &self.cells
    }

    pub fn cell(&self, index: CellIndex) -> Option<Cell> {
        self.cells.get(index).copied()
    }

    pub fn current_player(&self) -> Player {
        self.current_player
    }

    pub fn is_empty_cell(&self, index: CellIndex) -> bool {
        self.cell(index).is_some_and(Cell::is_empty)
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().all(|cell| !cell.is_empty())
    }

    pub fn empty_cells(&self) -> Vec<CellIndex> {
        (0..BOARD_SIZE)
            .filter(|&index| self.cells[index].is_empty())
            .collect()
    }

    pub fn count(&self, player: Player) -> usize {
        let target = Cell::from(player);
        self.cells.iter().filter(|&&cell| cell == target).count()
    }

    /// 落子并交换行动方。调用方负责先校验（见 `RuleEngine::apply_move`）。
    pub(crate) fn place(&mut self, index: CellIndex, player: Player) {
        self.cells[index] = Cell::from(player);
        self.current_player = player.opponent();
    }

    /// 扫描 8 条连线，先判胜再判和：满盘且成线算胜。
    pub fn evaluate(&self) -> GameResult {
        for line in WIN_LINES {
            let [a, b, c] = line;
            if let Some(player) = self.cells[a].player() {
                if self.cells[b] == self.cells[a] && self.cells[c] == self.cells[a] {
                    return GameResult::Won { player, line };
                }
            }
        }

        if self.is_full() {
            GameResult::Draw
        } else {
            GameResult::InProgress
        }
    }

    pub fn is_finished(&self) -> bool {
        self.evaluate().is_terminal()
    }

    pub fn integrity_check(&self) -> Result<(), IntegrityError> {
        let (x, o) = (self.count(Player::X), self.count(Player::O));
        let expected = if x == o { Player::X } else { Player::O };
        if (x != o && x != o + 1) || expected != self.current_player {
            return Err(IntegrityError::CellCountMismatch { x, o });
        }
        Ok(())
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.cells.chunks(3) {
            let symbols: Vec<&str> = row
                .iter()
                .map(|cell| match cell {
                    Cell::Empty => ".",
                    Cell::X => "X",
                    Cell::O => "O",
                })
                .collect();
            writeln!(f, "{}", symbols.join(" "))?;
        }
        Ok(())
    }
}

/// 跨局累计的比分，只在终局时变动，直到显式重置。
/// 序列化键名与浏览器端保存的 JSON 保持一致。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Scoreboard {
    pub x_wins: u32,
    pub o_wins: u32,
    pub draws: u32,
    pub x_score: u32,
    pub o_score: u32,
}

/// 每赢一局加的分数。
pub const WIN_POINTS: u32 = 5;

impl Scoreboard {
    /// 记录一局结果，返回比分是否变化。计数在 `u32::MAX` 处饱和。
    pub fn record(&mut self, result: &GameResult) -> bool {
        match result {
            GameResult::InProgress => false,
            GameResult::Won {
                player: Player::X, ..
            } => {
                self.x_wins = self.x_wins.saturating_add(1);
                self.x_score = self.x_score.saturating_add(WIN_POINTS);
                true
            }
            GameResult::Won {
                player: Player::O, ..
            } => {
                self.o_wins = self.o_wins.saturating_add(1);
                self.o_score = self.o_score.saturating_add(WIN_POINTS);
                true
            }
            GameResult::Draw => {
                self.draws = self.draws.saturating_add(1);
                true
            }
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn games_played(&self) -> u32 {
        self.x_wins
            .saturating_add(self.o_wins)
            .saturating_add(self.draws)
    }
}
