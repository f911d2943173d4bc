//! Determinism testing utilities.
//!
//! The server is the single simulation authority, but determinism
//! still matters: a fixed map seed and a fixed command script must
//! replay to the same state, both for debugging and for the
//! pathfinding/tie-breaking guarantees the simulation makes.
//!
//! Known sources of non-determinism guarded against here:
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   The simulation always iterates in sorted object-id order.
//! - **System randomness**: map generation uses a seeded PRNG only.

use empire_core::prelude::*;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// State hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of steps simulated per run.
    pub steps: u32,
}

impl DeterminismResult {
    /// Assert that all runs matched, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different state hashes.
    pub fn assert_deterministic(&self) {
        assert!(
            self.is_deterministic,
            "Simulation is non-deterministic!\n\
             Runs: {}\n\
             Steps: {}\n\
             Hashes: {:?}",
            self.hashes.len(),
            self.steps,
            self.hashes
        );
    }
}

/// Run the same setup-and-script `runs` times for `steps` steps each
/// and compare final state hashes.
///
/// `setup` builds a fresh game; `script` is invoked before every step
/// with the step index and may apply commands.
pub fn run_determinism_test(
    runs: u32,
    steps: u32,
    setup: impl Fn() -> Game,
    script: impl Fn(&mut Game, u32),
) -> DeterminismResult {
    let mut hashes = Vec::with_capacity(runs as usize);
    for _ in 0..runs {
        let mut game = setup();
        for step in 0..steps {
            script(&mut game, step);
            game.simulate(TICK_DURATION);
        }
        hashes.push(game.state_hash());
    }

    let is_deterministic = hashes.windows(2).all(|pair| pair[0] == pair[1]);
    DeterminismResult {
        is_deterministic,
        hashes,
        steps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn test_generated_game_replays_identically() {
        let result = run_determinism_test(
            3,
            60,
            fixtures::generated_game,
            |game, step| {
                // Exercise commands mid-run: move every unit once.
                if step == 5 {
                    let units: Vec<ObjectId> = game
                        .objects()
                        .sorted_ids()
                        .into_iter()
                        .filter(|&id| {
                            game.objects()
                                .get(id)
                                .is_some_and(|o| o.is_unit() && o.player == 0)
                        })
                        .collect();
                    let _ = game.apply_command(
                        0,
                        PlayerCommand::MoveToMapCoord {
                            target: Vec2::new(20.0, 20.0),
                            units,
                        },
                    );
                }
            },
        );
        result.assert_deterministic();
    }
}
