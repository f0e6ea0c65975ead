use serde::{Deserialize, Serialize};

use crate::board::{TileMove, TileSpawn};

/// Audio cues the round fires by name. Playback is the host's business.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sound {
    Error,
    Match,
    Clock,
    NextLevel,
    GameOver,
    Music,
}

/// Terminal hand-off to another top-level game state.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SceneChange {
    LevelTransition { level: u32, score: u32 },
    GameOver { score: u32 },
}

/// Everything the round needs from the outside world, injected at
/// construction so the core stays testable in isolation.
///
/// The tween methods are the suspension points of the cascade protocol: each
/// call returns only once the requested animation has settled, and the board
/// is mutated strictly before or after such a call, never during. The service
/// is trusted to always settle; there are no timeouts and no cancellation.
pub trait RoundServices {
    /// Fire-and-forget audio cue.
    fn play_sound(&mut self, sound: Sound);

    fn pause_sound(&mut self, sound: Sound);

    /// Tween every listed tile to its destination concurrently; returns once
    /// all of them have settled.
    fn tween_moves(&mut self, moves: &[TileMove], duration_ms: u32);

    /// Tween a single freshly spawned tile into place; returns once it has
    /// settled. Refill tiles trickle in one at a time through this.
    fn tween_spawn(&mut self, spawn: &TileSpawn, duration_ms: u32);

    /// Start delivering one tick per second to the round's
    /// `on_second_elapsed`.
    fn schedule_second_tick(&mut self);

    /// Stop all scheduled tasks; called when leaving the round.
    fn cancel_scheduled(&mut self);

    fn change_scene(&mut self, change: SceneChange);
}
