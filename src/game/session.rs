use serde::{Deserialize, Serialize};

use super::preferences::{GameMode, PreferenceStore, Preferences, Theme};
use super::rules::{RuleEngine, RuleError};
use super::state::{Board, CellIndex, GameEvent, GameResult, Player, Scoreboard};
use crate::ai::{AiAgent, AiConfig, AiDifficulty, MoveRule};
use crate::{console_log, console_warn};

/// 人机模式下 AI 固定执 O，X 总是先手。
pub const AI_PLAYER: Player = Player::O;

/// 音效种类。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Cue {
    Click,
    Win,
    Draw,
}

/// 状态栏展示的内容。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum Status {
    Turn { player: Player },
    AiThinking,
    Won { player: Player },
    Draw,
}

/// 渲染端回调。默认实现为空，按需覆盖。
pub trait Renderer {
    fn move_applied(&mut self, _index: CellIndex, _player: Player, _animate: bool) {}
    fn game_ended(&mut self, _result: &GameResult, _highlight: bool) {}
    fn score_changed(&mut self, _scoreboard: &Scoreboard) {}
    fn status_changed(&mut self, _status: &Status) {}
    fn board_reset(&mut self) {}
}

pub trait AudioCue {
    fn play(&mut self, cue: Cue);
}

impl Renderer for () {}

impl AudioCue for () {
    fn play(&mut self, _cue: Cue) {}
}

/// 延迟 AI 落子的凭据。开新局后旧凭据失效。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AiTicket {
    generation: u64,
}

impl AiTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveOutcome {
    pub index: CellIndex,
    pub player: Player,
    pub result: GameResult,
    pub events: Vec<GameEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_rule: Option<MoveRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_pending: Option<AiTicket>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub board: Board,
    pub result: GameResult,
    pub status: Status,
    pub preferences: Preferences,
    pub ai_pending: bool,
}

/// 一次游戏会话：持有棋盘、比分与偏好，通过三个注入的协作者与外界交互。
pub struct GameSession<R, A, P> {
    board: Board,
    preferences: Preferences,
    engine: RuleEngine,
    ai: AiAgent,
    generation: u64,
    pending_ai: Option<AiTicket>,
    renderer: R,
    audio: A,
    store: P,
}

impl<R, A, P> GameSession<R, A, P>
where
    R: Renderer,
    A: AudioCue,
    P: PreferenceStore,
{
    pub fn new(renderer: R, audio: A, store: P) -> Self {
        let preferences = store.load().unwrap_or_else(|err| {
            console_warn!("falling back to default preferences: {err}");
            Preferences::default()
        });
        let ai = AiAgent::new(AiConfig::from_difficulty(preferences.difficulty));
        let mut session = Self {
            board: Board::new(),
            preferences,
            engine: RuleEngine::new(),
            ai,
            generation: 0,
            pending_ai: None,
            renderer,
            audio,
            store,
        };
        session.renderer.score_changed(&session.preferences.scores);
        session.notify_status();
        session
    }

    /// 替换 AI（例如使用固定种子），难度沿用当前偏好。
    pub fn with_ai_agent(mut self, mut agent: AiAgent) -> Self {
        agent.set_difficulty(self.preferences.difficulty);
        self.ai = agent;
        self
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn result(&self) -> GameResult {
        self.board.evaluate()
    }

    pub fn is_active(&self) -> bool {
        !self.board.is_finished()
    }

    pub fn scores(&self) -> &Scoreboard {
        &self.preferences.scores
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn pending_ai(&self) -> Option<AiTicket> {
        self.pending_ai
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn audio(&self) -> &A {
        &self.audio
    }

    pub fn store(&self) -> &P {
        &self.store
    }

    pub fn status(&self) -> Status {
        match self.board.evaluate() {
            GameResult::Won { player, .. } => Status::Won { player },
            GameResult::Draw => Status::Draw,
            GameResult::InProgress => {
                let player = self.board.current_player();
                if self.preferences.mode.is_ai() && player == AI_PLAYER {
                    Status::AiThinking
                } else {
                    Status::Turn { player }
                }
            }
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            board: self.board.clone(),
            result: self.result(),
            status: self.status(),
            preferences: self.preferences.clone(),
            ai_pending: self.pending_ai.is_some(),
        }
    }

    /// 人类玩家落子。人机模式下轮到 AI 时返回的结果里带有 `ai_pending`，
    /// 调用方应在延迟后调用 `resolve_ai_move`。
    pub fn play(&mut self, index: CellIndex) -> Result<MoveOutcome, RuleError> {
        if self.pending_ai.is_some() {
            return Err(RuleError::AiMovePending);
        }
        let mut outcome = self.apply(index, true)?;
        outcome.ai_pending = self.request_ai_move();
        Ok(outcome)
    }

    /// 轮到 AI 且对局进行中时签发凭据；已有未决凭据时原样返回。
    pub fn request_ai_move(&mut self) -> Option<AiTicket> {
        if let Some(ticket) = self.pending_ai {
            return Some(ticket);
        }
        if !self.preferences.mode.is_ai()
            || self.board.current_player() != AI_PLAYER
            || self.board.is_finished()
        {
            return None;
        }
        let ticket = AiTicket {
            generation: self.generation,
        };
        self.pending_ai = Some(ticket);
        Some(ticket)
    }

    /// 兑现延迟的 AI 落子。过期凭据（开过新局）直接丢弃，不触碰棋盘。
    pub fn resolve_ai_move(&mut self, ticket: AiTicket) -> Result<Option<MoveOutcome>, RuleError> {
        if self.pending_ai != Some(ticket) {
            console_log!(
                "discarding stale AI move from game {} (current {})",
                ticket.generation,
                self.generation
            );
            return Ok(None);
        }
        self.pending_ai = None;

        if self.board.is_finished() || self.board.current_player() != AI_PLAYER {
            return Ok(None);
        }

        let decision = self.ai.decide_as(&self.board, AI_PLAYER);
        let Some(index) = decision.cell else {
            return Ok(None);
        };
        let mut outcome = self.apply(index, false)?;
        outcome.ai_rule = decision.rule;
        Ok(Some(outcome))
    }

    fn apply(&mut self, index: CellIndex, click: bool) -> Result<MoveOutcome, RuleError> {
        let player = self.board.current_player();
        let resolution = self.engine.play(&mut self.board, index)?;
        let mut events = resolution.events;

        if click {
            self.cue(Cue::Click);
        }
        self.renderer
            .move_applied(index, player, self.preferences.effects_enabled);

        if resolution.result.is_terminal() {
            self.finish(&resolution.result);
            events.push(GameEvent::ScoreChanged {
                scoreboard: self.preferences.scores,
            });
        }
        self.notify_status();

        Ok(MoveOutcome {
            index,
            player,
            result: resolution.result,
            events,
            ai_rule: None,
            ai_pending: None,
        })
    }

    fn finish(&mut self, result: &GameResult) {
        self.preferences.scores.record(result);
        console_log!("game {} ended: {:?}\n{}", self.generation, result, self.board);

        self.renderer
            .game_ended(result, self.preferences.effects_enabled);
        self.renderer.score_changed(&self.preferences.scores);
        match result {
            GameResult::Won { .. } => self.cue(Cue::Win),
            GameResult::Draw => self.cue(Cue::Draw),
            GameResult::InProgress => {}
        }
        self.persist();
    }

    /// 开新局，同时作废任何未决的 AI 落子。
    pub fn new_game(&mut self) -> Option<AiTicket> {
        self.generation += 1;
        self.pending_ai = None;
        self.board = Board::new();
        self.renderer.board_reset();
        self.notify_status();
        self.request_ai_move()
    }

    pub fn reset_scores(&mut self) -> Option<AiTicket> {
        self.preferences.scores.reset();
        self.persist();
        self.renderer.score_changed(&self.preferences.scores);
        self.new_game()
    }

    pub fn set_mode(&mut self, mode: GameMode) -> Option<AiTicket> {
        self.preferences.mode = mode;
        self.persist();
        self.new_game()
    }

    pub fn set_difficulty(&mut self, difficulty: AiDifficulty) {
        self.preferences.difficulty = difficulty;
        self.ai.set_difficulty(difficulty);
        self.persist();
    }

    pub fn set_sound_enabled(&mut self, enabled: bool) {
        self.preferences.sound_enabled = enabled;
        self.persist();
    }

    pub fn toggle_sound(&mut self) -> bool {
        let enabled = !self.preferences.sound_enabled;
        self.set_sound_enabled(enabled);
        enabled
    }

    pub fn set_effects_enabled(&mut self, enabled: bool) {
        self.preferences.effects_enabled = enabled;
        self.persist();
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.preferences.theme = theme;
        self.persist();
    }

    fn cue(&mut self, cue: Cue) {
        if self.preferences.sound_enabled {
            self.audio.play(cue);
        }
    }

    fn notify_status(&mut self) {
        let status = self.status();
        self.renderer.status_changed(&status);
    }

    fn persist(&mut self) {
        if let Err(err) = self.store.save(&self.preferences) {
            console_warn!("failed to save preferences: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::preferences::MemoryStore;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Move(CellIndex, Player, bool),
        Ended(GameResult),
        Scores(Scoreboard),
        Status(Status),
        Reset,
    }

    #[derive(Default)]
    struct RecordingRenderer {
        calls: Vec<Call>,
    }

    impl Renderer for RecordingRenderer {
        fn move_applied(&mut self, index: CellIndex, player: Player, animate: bool) {
            self.calls.push(Call::Move(index, player, animate));
        }

        fn game_ended(&mut self, result: &GameResult, _highlight: bool) {
            self.calls.push(Call::Ended(*result));
        }

        fn score_changed(&mut self, scoreboard: &Scoreboard) {
            self.calls.push(Call::Scores(*scoreboard));
        }

        fn status_changed(&mut self, status: &Status) {
            self.calls.push(Call::Status(*status));
        }

        fn board_reset(&mut self) {
            self.calls.push(Call::Reset);
        }
    }

    #[derive(Default)]
    struct RecordingAudio {
        cues: Vec<Cue>,
    }

    impl AudioCue for RecordingAudio {
        fn play(&mut self, cue: Cue) {
            self.cues.push(cue);
        }
    }

    type TestSession = GameSession<RecordingRenderer, RecordingAudio, MemoryStore>;

    fn session_with(preferences: Preferences) -> TestSession {
        let store = MemoryStore::with_preferences(&preferences).expect("store");
        GameSession::new(RecordingRenderer::default(), RecordingAudio::default(), store)
            .with_ai_agent(AiAgent::with_seed(AiConfig::default(), 17))
    }

    fn ai_session(difficulty: AiDifficulty) -> TestSession {
        session_with(Preferences {
            mode: GameMode::HumanVsAi,
            difficulty,
            ..Preferences::default()
        })
    }

    fn play_all(session: &mut TestSession, moves: &[CellIndex]) -> MoveOutcome {
        let mut last = None;
        for &index in moves {
            last = Some(session.play(index).expect("legal move"));
        }
        last.expect("at least one move")
    }

    #[test]
    fn human_game_win_updates_scoreboard_and_store() {
        let mut session = session_with(Preferences::default());
        let outcome = play_all(&mut session, &[0, 4, 1, 7, 2]);

        assert_eq!(
            outcome.result,
            GameResult::Won {
                player: Player::X,
                line: [0, 1, 2]
            }
        );
        assert!(outcome.ai_pending.is_none());
        assert!(!session.is_active());
        assert_eq!(session.scores().x_wins, 1);
        assert_eq!(session.scores().x_score, 5);
        assert_eq!(session.status(), Status::Won { player: Player::X });

        let stored = session.store().load().expect("stored prefs");
        assert_eq!(stored.scores.x_wins, 1);
        assert!(outcome
            .events
            .iter()
            .any(|event| matches!(event, GameEvent::ScoreChanged { .. })));

        let calls = &session.renderer().calls;
        assert!(calls.contains(&Call::Ended(outcome.result)));
        assert_eq!(
            session.audio().cues,
            vec![Cue::Click, Cue::Click, Cue::Click, Cue::Click, Cue::Click, Cue::Win]
        );
    }

    #[test]
    fn draw_counts_as_draw() {
        let mut session = session_with(Preferences::default());
        let outcome = play_all(&mut session, &[0, 1, 2, 4, 3, 5, 7, 6, 8]);
        assert_eq!(outcome.result, GameResult::Draw);
        assert_eq!(session.scores().draws, 1);
        assert_eq!(session.scores().x_score + session.scores().o_score, 0);
        assert_eq!(session.audio().cues.last(), Some(&Cue::Draw));
    }

    #[test]
    fn moves_after_game_end_are_rejected() {
        let mut session = session_with(Preferences::default());
        play_all(&mut session, &[0, 4, 1, 7, 2]);
        let before = session.board().clone();
        assert_eq!(session.play(8).unwrap_err(), RuleError::GameFinished);
        assert_eq!(session.board(), &before);
        assert_eq!(session.scores().games_played(), 1);
    }

    #[test]
    fn ai_replies_after_human_move() {
        let mut session = ai_session(AiDifficulty::Hard);
        let outcome = session.play(0).expect("human move");
        let ticket = outcome.ai_pending.expect("AI should be scheduled");
        assert_eq!(session.status(), Status::AiThinking);

        assert_eq!(session.play(1).unwrap_err(), RuleError::AiMovePending);

        let reply = session
            .resolve_ai_move(ticket)
            .expect("AI move")
            .expect("AI should move");
        assert_eq!(reply.player, Player::O);
        assert_eq!(reply.index, 4);
        assert_eq!(reply.ai_rule, Some(MoveRule::Center));
        assert!(session.pending_ai().is_none());
        assert_eq!(session.status(), Status::Turn { player: Player::X });
        // AI 落子不播放点击音效。
        assert_eq!(session.audio().cues, vec![Cue::Click]);
    }

    #[test]
    fn stale_ai_ticket_is_discarded_after_new_game() {
        let mut session = ai_session(AiDifficulty::Hard);
        let ticket = session
            .play(0)
            .expect("human move")
            .ai_pending
            .expect("AI scheduled");

        assert!(session.new_game().is_none());
        assert!(matches!(session.resolve_ai_move(ticket), Ok(None)));
        assert_eq!(session.board(), &Board::new());
        assert_eq!(session.board().current_player(), Player::X);
    }

    #[test]
    fn hard_ai_blocks_through_the_session() {
        let mut session = ai_session(AiDifficulty::Hard);
        let ticket = session.play(0).unwrap().ai_pending.unwrap();
        session.resolve_ai_move(ticket).unwrap();
        let ticket = session.play(1).unwrap().ai_pending.unwrap();
        let reply = session.resolve_ai_move(ticket).unwrap().unwrap();
        assert_eq!(reply.index, 2);
        assert_eq!(reply.ai_rule, Some(MoveRule::Block));
    }

    #[test]
    fn preferences_are_loaded_and_saved() {
        let mut preferences = Preferences {
            mode: GameMode::HumanVsAi,
            sound_enabled: false,
            ..Preferences::default()
        };
        preferences.scores.o_wins = 3;
        let mut session = session_with(preferences.clone());
        assert_eq!(session.preferences(), &preferences);

        session.play(4).expect("human move");
        assert!(session.audio().cues.is_empty(), "sound is disabled");

        assert!(session.toggle_sound());
        session.set_theme(Theme::Dark);
        session.set_effects_enabled(false);
        session.set_difficulty(AiDifficulty::Easy);

        let stored = session.store().load().expect("stored");
        assert!(stored.sound_enabled);
        assert_eq!(stored.theme, Theme::Dark);
        assert!(!stored.effects_enabled);
        assert_eq!(stored.difficulty, AiDifficulty::Easy);
        assert_eq!(stored.scores.o_wins, 3);
    }

    #[test]
    fn unreadable_preference_does_not_wipe_stored_scores() {
        let store = MemoryStore::with_document(
            r#"{"scores":{"xWins":7,"oWins":2,"draws":1,"xScore":35,"oScore":10},
                "mode":"player","difficulty":"bogus","theme":"neon"}"#,
        );
        let mut session =
            GameSession::new(RecordingRenderer::default(), RecordingAudio::default(), store);
        assert_eq!(session.scores().x_wins, 7);
        assert_eq!(session.preferences().difficulty, AiDifficulty::Medium);

        session.set_theme(Theme::Light);

        let stored = session.store().load().expect("stored");
        assert_eq!(stored.scores.x_wins, 7);
        assert_eq!(stored.scores.o_score, 10);
        assert_eq!(stored.theme, Theme::Light);
        assert!(session
            .store()
            .document()
            .is_some_and(|doc| doc.contains(r#""difficulty":"medium""#)));
    }

    #[test]
    fn reset_scores_clears_counters_and_starts_over() {
        let mut session = session_with(Preferences::default());
        play_all(&mut session, &[0, 4, 1, 7, 2]);
        session.reset_scores();

        assert_eq!(session.scores(), &Scoreboard::default());
        assert_eq!(session.board(), &Board::new());
        assert_eq!(
            session.store().load().expect("stored").scores,
            Scoreboard::default()
        );
        let calls = &session.renderer().calls;
        assert!(calls.ends_with(&[
            Call::Scores(Scoreboard::default()),
            Call::Reset,
            Call::Status(Status::Turn { player: Player::X }),
        ]));
    }

    #[test]
    fn switching_mode_cancels_pending_ai_move() {
        let mut session = ai_session(AiDifficulty::Medium);
        let ticket = session.play(8).unwrap().ai_pending.unwrap();
        session.set_mode(GameMode::HumanVsHuman);

        assert!(session.resolve_ai_move(ticket).unwrap().is_none());
        assert_eq!(session.board().empty_cells().len(), 9);
        // 双人模式下 O 由人类落子。
        session.play(0).unwrap();
        let outcome = session.play(1).expect("human plays O");
        assert_eq!(outcome.player, Player::O);
        assert!(outcome.ai_pending.is_none());
    }

    #[test]
    fn renderer_sees_moves_with_animation_flag() {
        let mut session = session_with(Preferences {
            effects_enabled: false,
            ..Preferences::default()
        });
        session.play(3).unwrap();
        assert!(session
            .renderer()
            .calls
            .contains(&Call::Move(3, Player::X, false)));
    }
}
