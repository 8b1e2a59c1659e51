//! Property-based tests for the game state machine
//!
//! These tests verify key invariants hold across arbitrary tool-call
//! sequences.

use super::transition::transition;
use super::*;
use crate::conversation::ToolCall;
use crate::game::{GameMode, Roster, Side};
use chrono::{TimeZone, Utc};
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_context() -> GameContext {
    GameContext::new("test-game", GameMode::HumanVsAi, Roster::default())
}

fn fresh_state() -> GameState {
    GameState::new("Alex", "Amy")
}

fn apply_all(mut state: GameState, events: Vec<Event>) -> (GameState, Vec<Effect>) {
    let context = test_context();
    let mut effects = Vec::new();
    for event in events {
        if let Ok(result) = transition(&state, &context, event) {
            state = result.new_state;
            effects.extend(result.effects);
        }
    }
    (state, effects)
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_side() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::User), Just(Side::Opponent)]
}

fn arb_character() -> impl Strategy<Value = String> {
    let names: Vec<String> = Roster::default().names().to_vec();
    prop_oneof![
        prop::sample::select(names),
        "[A-Z][a-z]{2,8}".prop_map(|s| format!("Not{s}")),
    ]
}

fn arb_tool_call() -> impl Strategy<Value = ToolCall> {
    prop_oneof![
        ("[a-z0-9]{6}", arb_character()).prop_map(|(id, name)| ToolCall::new(
            id,
            "eliminateCharacter",
            format!(r#"{{"characterName":"{name}"}}"#)
        )),
        ("[a-z0-9]{6}", prop_oneof![Just("user"), Just("llm")]).prop_map(|(id, w)| ToolCall::new(
            id,
            "endGame",
            format!(r#"{{"winner":"{w}"}}"#)
        )),
        ("[a-z0-9]{6}", "[a-zA-Z{}\":]{0,12}")
            .prop_map(|(id, args)| ToolCall::new(id, "eliminateCharacter", args)),
        ("[a-z0-9]{6}", "[a-zA-Z]{3,10}").prop_map(|(id, name)| ToolCall::new(id, name, "{}")),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single().unwrap_or_default();
    prop_oneof![
        8 => (arb_side(), arb_tool_call()).prop_map(move |(side, call)| Event::ToolCallCompleted { side, call, now }),
        1 => Just(Event::ForceTie { now }),
        1 => arb_character().prop_map(|character| Event::ToggleElimination { character }),
        1 => "[a-z ]{1,20}".prop_map(|text| Event::PlayerMessage { to: Side::Opponent, text }),
    ]
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_eliminate_twice_equals_once(side in arb_side(), name in arb_character()) {
        let event = || Event::ToolCallCompleted {
            side,
            call: ToolCall::new("t", "eliminateCharacter", format!(r#"{{"characterName":"{name}"}}"#)),
            now: Utc::now(),
        };
        let (once, _) = apply_all(fresh_state(), vec![event()]);
        let (twice, _) = apply_all(fresh_state(), vec![event(), event()]);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn prop_completed_is_terminal(events in proptest::collection::vec(arb_event(), 1..30)) {
        let context = test_context();
        let mut state = fresh_state();
        let mut completed_with = None;
        for event in events {
            let before = state.clone();
            if let Ok(result) = transition(&state, &context, event) {
                state = result.new_state;
                if before.is_completed() {
                    prop_assert_eq!(&state, &before);
                    prop_assert!(result.effects.is_empty());
                }
            } else {
                prop_assert_eq!(&state, &before);
            }
            if let Some(phase) = &completed_with {
                prop_assert_eq!(&state.phase, phase);
            } else if state.is_completed() {
                completed_with = Some(state.phase.clone());
            }
        }
    }

    #[test]
    fn prop_completion_persisted_at_most_once(events in proptest::collection::vec(arb_event(), 1..30)) {
        let (state, effects) = apply_all(fresh_state(), events);
        let completions = effects
            .iter()
            .filter(|e| matches!(e, Effect::PersistCompletion { .. }))
            .count();
        prop_assert_eq!(completions, usize::from(state.is_completed()));
    }

    #[test]
    fn prop_eliminated_sets_stay_in_roster(events in proptest::collection::vec(arb_event(), 1..30)) {
        let roster = Roster::default();
        let (state, _) = apply_all(fresh_state(), events);
        for name in state.user_eliminated.iter().chain(state.opponent_eliminated.iter()) {
            prop_assert!(roster.contains(name));
        }
    }

    #[test]
    fn prop_every_dispatch_answers_its_call(side in arb_side(), call in arb_tool_call()) {
        let mut state = fresh_state();
        state.phase = GamePhase::InProgress;
        let id = call.id.clone();
        let result = transition(&state, &test_context(), Event::ToolCallCompleted {
            side,
            call,
            now: Utc::now(),
        }).unwrap();
        let answers = result.effects.iter().filter(|e| matches!(
            e,
            Effect::AppendMessage { side: s, message } if *s == side && message.tool_call_id.as_deref() == Some(id.as_str())
        )).count();
        prop_assert_eq!(answers, 1);
    }
}
