//! Test fixtures and helpers.
//!
//! Pre-built games and spawn shortcuts for consistent testing.

use empire_core::prelude::*;

/// A game on a flat, empty map with the standard stat set.
#[must_use]
pub fn flat_game(width: u32, height: u32, player_count: u8) -> Game {
    Game::new(GameData::standard(), Map::new(width, height), player_count)
}

/// A two-player game on the default generated map.
#[must_use]
pub fn generated_game() -> Game {
    Game::new_generated(GameData::standard(), &MapConfig::default(), 2)
        .expect("default generated game")
}

/// Give a player a large stockpile of every resource.
pub fn grant_resources(game: &mut Game, player: u8) {
    if let Some(state) = game.player_mut(player) {
        state.resources = ResourceAmount::new(10_000, 10_000, 10_000, 10_000);
    }
}

/// Run `steps` simulation steps at the standard tick duration.
pub fn run_steps(game: &mut Game, steps: u32) {
    for _ in 0..steps {
        game.simulate(TICK_DURATION);
    }
}

/// Run simulation steps until `predicate` holds, failing after
/// `max_steps`.
///
/// # Panics
///
/// Panics when the predicate never becomes true.
pub fn run_until(game: &mut Game, max_steps: u32, mut predicate: impl FnMut(&Game) -> bool) {
    for _ in 0..max_steps {
        if predicate(game) {
            return;
        }
        game.simulate(TICK_DURATION);
    }
    panic!("predicate not satisfied within {max_steps} steps");
}

/// Drain and return all events currently accumulated in a game.
pub fn drain_events(game: &mut Game) -> Vec<GameEvent> {
    game.take_events()
}
