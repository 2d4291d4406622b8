//! 浏览器环境下的导出函数测试：`wasm-pack test --headless --firefox`。
#![cfg(target_arch = "wasm32")]

use std::cell::RefCell;
use std::rc::Rc;

use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;
use web_sys::js_sys::{Object, Reflect};

use wasm_tictactoe::{
    apply_move, compute_ai_move, evaluate_board, AiDecision, GameResult, MoveOutcome, MoveRule,
    Player, RuleError, TicTacToe,
};

wasm_bindgen_test_configure!(run_in_browser);

fn cells(layout: &str) -> JsValue {
    let cells: Vec<String> = layout
        .chars()
        .map(|c| match c {
            'X' | 'O' => c.to_string(),
            _ => String::new(),
        })
        .collect();
    to_value(&cells).expect("cells")
}

#[wasm_bindgen_test]
fn evaluate_board_reports_wins() {
    let result: GameResult = from_value(evaluate_board(cells("XXXOO____")).expect("evaluate"))
        .expect("result");
    assert_eq!(
        result,
        GameResult::Won {
            player: Player::X,
            line: [0, 1, 2]
        }
    );
}

#[wasm_bindgen_test]
fn apply_move_rejects_occupied_cells() {
    let error = apply_move(cells("X________"), 0).expect_err("occupied");
    let error: RuleError = from_value(error).expect("tagged error");
    assert_eq!(error, RuleError::CellOccupied { index: 0 });
}

#[wasm_bindgen_test]
fn hard_ai_blocks_from_javascript() {
    let decision: AiDecision =
        from_value(compute_ai_move(cells("XX_O_____"), Some("hard".into())).expect("decision"))
            .expect("decision");
    assert_eq!(decision.cell, Some(2));
    assert_eq!(decision.rule, Some(MoveRule::Block));
}

#[wasm_bindgen_test]
async fn stale_ai_move_is_dropped_after_new_game() {
    let mut game = TicTacToe::new(JsValue::UNDEFINED);
    game.set_ai_delay_ms(20);
    game.set_mode("ai").expect("mode");

    let outcome: MoveOutcome = from_value(game.play(0).expect("human move")).expect("outcome");
    assert!(outcome.ai_pending.is_some());
    game.new_game().expect("new game");

    gloo_timers::future::TimeoutFuture::new(60).await;
    let state = game.state_json().expect("state");
    assert!(state.contains(r#""cells":["","","","","","","","",""]"#));
}

#[wasm_bindgen_test]
fn callbacks_can_read_state_from_inside_a_move() {
    let slot: Rc<RefCell<Option<Rc<TicTacToe>>>> = Rc::default();
    let seen: Rc<RefCell<Vec<String>>> = Rc::default();
    let on_status = {
        let slot = Rc::clone(&slot);
        let seen = Rc::clone(&seen);
        Closure::<dyn FnMut(JsValue)>::new(move |_status: JsValue| {
            if let Some(game) = slot.borrow().as_ref() {
                let state = game.state_json().expect("state inside callback");
                seen.borrow_mut().push(state);
            }
        })
    };
    let callbacks = Object::new();
    Reflect::set(
        &callbacks,
        &JsValue::from_str("onStatusChanged"),
        on_status.as_ref(),
    )
    .expect("install callback");

    let game = Rc::new(TicTacToe::new(callbacks.into()));
    game.set_mode("player").expect("mode");
    *slot.borrow_mut() = Some(Rc::clone(&game));

    game.play(4).expect("move while callbacks read state");

    let seen = seen.borrow();
    assert!(!seen.is_empty());
    assert!(seen
        .iter()
        .all(|state| state.contains(r#""cells":["","","","","X","","","",""]"#)));
}

#[wasm_bindgen_test]
fn legacy_storage_keys_are_picked_up() {
    let storage = web_sys::window()
        .and_then(|window| window.local_storage().ok().flatten())
        .expect("localStorage");
    storage
        .remove_item(wasm_tictactoe::web::STORAGE_KEY)
        .expect("clear new key");
    storage
        .set_item(
            "ticTacToeScores",
            r#"{"xWins":4,"oWins":1,"draws":0,"xScore":20,"oScore":5}"#,
        )
        .expect("legacy scores");
    storage
        .set_item("ticTacToeDifficulty", "normal")
        .expect("legacy difficulty");

    let game = TicTacToe::new(JsValue::UNDEFINED);
    let state = game.state_json().expect("state");
    assert!(state.contains(r#""xWins":4"#));
    assert!(state.contains(r#""difficulty":"medium""#));

    storage.remove_item("ticTacToeScores").expect("cleanup");
    storage.remove_item("ticTacToeDifficulty").expect("cleanup");
}
