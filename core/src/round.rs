use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::error::Result;
use crate::generator::RandomTileGenerator;
use crate::hint::{find_hint, Hint};
use crate::services::{RoundServices, SceneChange, Sound};
use crate::tile::Tile;
use crate::types::{manhattan, CellCount, Coord2};

/// Round tunables. Score weights, pacing, and goal scaling are data, not
/// rules; hosts may ship their own table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoundConfig {
    pub board_size: Coord2,
    /// Countdown ceiling in seconds; the timer can never exceed it.
    pub max_timer: u32,
    pub starting_goal: u32,
    /// Per-level goal multiplier in percent, applied cumulatively.
    pub goal_scale_pct: u32,
    pub flat_tile_score: u32,
    pub star_tile_score: u32,
    /// Seconds granted back per matched tile.
    pub seconds_per_tile: u32,
    /// The clock cue fires on every tick at or below this.
    pub warning_secs: u32,
    pub hints_per_level: u32,
    pub swap_tween_ms: u32,
    pub fall_tween_ms: u32,
    pub refill_tween_ms: u32,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            board_size: (8, 8),
            max_timer: 60,
            starting_goal: 250,
            goal_scale_pct: 125,
            flat_tile_score: 5,
            star_tile_score: 30,
            seconds_per_tile: 2,
            warning_secs: 5,
            hints_per_level: 3,
            swap_tween_ms: 100,
            fall_tween_ms: 250,
            refill_tween_ms: 100,
        }
    }
}

impl RoundConfig {
    /// Score goal on entering `level`. The scale compounds over every level
    /// entered so far: 250, 500, 1500, 7500… with the defaults.
    pub fn goal_for_level(&self, level: u32) -> u32 {
        let mut goal = self.starting_goal;
        for entered in 1..=level {
            goal *= (entered * self.goal_scale_pct / 100).max(1);
        }
        goal
    }

    fn tile_score(&self, tile: &Tile) -> u32 {
        if tile.pattern.is_bonus() {
            self.star_tile_score
        } else {
            self.flat_tile_score
        }
    }
}

/// Hand-off bundle from the previous round or the title screen.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundParams {
    pub level: u32,
    pub score: u32,
}

impl Default for RoundParams {
    fn default() -> Self {
        Self { level: 1, score: 0 }
    }
}

/// What a cursor selection did to the round.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectOutcome {
    Selected,
    Deselected,
    /// Second selection was further than one cell away; selection dropped
    /// with a failure cue. Distinct from a rejected swap.
    TooFar,
    SwapMatched { tiles_matched: CellCount },
    /// Adjacent swap produced no match: shown, then reverted.
    SwapRejected,
    /// The round already ended; input is not processed.
    Ignored,
}

impl SelectOutcome {
    /// Whether this outcome could have changed visible state.
    pub const fn has_update(self) -> bool {
        use SelectOutcome::*;
        match self {
            Selected => true,
            Deselected => true,
            TooFar => true,
            SwapMatched { .. } => true,
            SwapRejected => true,
            Ignored => false,
        }
    }
}

/// Turn orchestration for one level: selection state machine, swap gate,
/// cascade resolution, score/timer bookkeeping, and win/lose hand-off.
#[derive(Clone, Debug)]
pub struct RoundController {
    config: RoundConfig,
    board: Board,
    generator: RandomTileGenerator,
    level: u32,
    score: u32,
    score_goal: u32,
    timer: u32,
    selected: Option<Coord2>,
    remaining_hints: u32,
    hint: Option<Hint>,
    ended: bool,
}

impl RoundController {
    /// Enters a fresh round: rolls a matchless board for the level, resets
    /// the timer and hints, and compounds the score goal.
    pub fn new(config: RoundConfig, params: RoundParams, seed: u64) -> Self {
        let mut generator = RandomTileGenerator::new(seed);
        let board = Board::generate(config.board_size, params.level, &mut generator);
        Self::with_board(config, params.score, generator, board)
    }

    /// Rebuilds a controller around an existing board, e.g. one restored
    /// from a snapshot. The level is the board's.
    pub fn resume(config: RoundConfig, score: u32, seed: u64, board: Board) -> Self {
        Self::with_board(config, score, RandomTileGenerator::new(seed), board)
    }

    fn with_board(
        config: RoundConfig,
        score: u32,
        generator: RandomTileGenerator,
        board: Board,
    ) -> Self {
        let level = board.level();
        let score_goal = config.goal_for_level(level);
        log::debug!("Entering level {} with goal {}", level, score_goal);
        Self {
            timer: config.max_timer,
            remaining_hints: config.hints_per_level,
            config,
            board,
            generator,
            level,
            score,
            score_goal,
            selected: None,
            hint: None,
            ended: false,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn config(&self) -> &RoundConfig {
        &self.config
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn score_goal(&self) -> u32 {
        self.score_goal
    }

    pub fn timer(&self) -> u32 {
        self.timer
    }

    pub fn selected(&self) -> Option<Coord2> {
        self.selected
    }

    pub fn remaining_hints(&self) -> u32 {
        self.remaining_hints
    }

    pub fn hint(&self) -> Option<Hint> {
        self.hint
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Starts the one-second countdown task.
    pub fn begin(&mut self, services: &mut impl RoundServices) {
        services.schedule_second_tick();
    }

    /// Leaves the round: stops scheduled tasks and the music.
    pub fn finish(&mut self, services: &mut impl RoundServices) {
        services.cancel_scheduled();
        services.pause_sound(Sound::Music);
    }

    /// Feeds one cursor selection through the Idle/Selected machine.
    ///
    /// Any second selection lands back in Idle: same tile deselects, a
    /// distant tile drops the selection with a failure cue, an adjacent tile
    /// goes through swap evaluation. A legal swap commits and resolves
    /// cascades before this returns; an illegal one is shown and reverted.
    pub fn select_at(
        &mut self,
        cursor: Coord2,
        services: &mut impl RoundServices,
    ) -> Result<SelectOutcome> {
        if self.ended {
            return Ok(SelectOutcome::Ignored);
        }
        let cursor = self.board.validate_coords(cursor)?;

        match self.selected.take() {
            None => {
                self.selected = Some(cursor);
                Ok(SelectOutcome::Selected)
            }
            Some(prev) if prev == cursor => Ok(SelectOutcome::Deselected),
            Some(prev) if manhattan(prev, cursor) > 1 => {
                services.play_sound(Sound::Error);
                Ok(SelectOutcome::TooFar)
            }
            Some(prev) => self.evaluate_swap(prev, cursor, services),
        }
    }

    /// Counts down one second. Scheduled externally via
    /// [`RoundServices::schedule_second_tick`].
    pub fn on_second_elapsed(&mut self, services: &mut impl RoundServices) {
        if self.ended {
            return;
        }
        self.timer = self.timer.saturating_sub(1);
        if self.timer <= self.config.warning_secs {
            services.play_sound(Sound::Clock);
        }
    }

    /// Per-frame terminal guards. Win is checked before loss, so reaching
    /// the goal on the very tick the timer dies still advances the level.
    /// At most one scene change ever fires.
    pub fn update(&mut self, services: &mut impl RoundServices) {
        if self.ended {
            return;
        }
        if self.score >= self.score_goal {
            self.ended = true;
            services.play_sound(Sound::NextLevel);
            services.change_scene(SceneChange::LevelTransition {
                level: self.level + 1,
                score: self.score_goal,
            });
        } else if self.timer == 0 {
            self.ended = true;
            services.play_sound(Sound::GameOver);
            services.change_scene(SceneChange::GameOver { score: self.score });
        }
    }

    /// Surfaces a hint-worthy move, if any hints are left. With none left
    /// the search does not run at all. A fruitless search clears the cue and
    /// costs nothing.
    pub fn request_hint(&mut self) -> Option<Hint> {
        if self.ended || self.remaining_hints == 0 {
            return None;
        }
        match find_hint(&mut self.board) {
            Some(found) => {
                self.remaining_hints -= 1;
                self.hint = Some(found);
                log::debug!(
                    "Hint at {:?} / {:?}, {} left",
                    found.a,
                    found.b,
                    self.remaining_hints
                );
                Some(found)
            }
            None => {
                self.hint = None;
                None
            }
        }
    }

    fn evaluate_swap(
        &mut self,
        a: Coord2,
        b: Coord2,
        services: &mut impl RoundServices,
    ) -> Result<SelectOutcome> {
        if self.board.would_match(a, b)? {
            let moves = self.board.swap_moves(a, b)?;
            services.tween_moves(&moves, self.config.swap_tween_ms);
            self.board.swap(a, b)?;
            // the hint cue lives until the next committed legal swap
            self.hint = None;
            let tiles_matched = self.resolve_cascades(services)?;
            Ok(SelectOutcome::SwapMatched { tiles_matched })
        } else {
            // commit the attempt anyway so the player sees it, then restore
            let forward = self.board.swap_moves(a, b)?;
            services.tween_moves(&forward, self.config.swap_tween_ms);
            self.board.swap(a, b)?;
            services.play_sound(Sound::Error);
            let back = self.board.swap_moves(b, a)?;
            services.tween_moves(&back, self.config.swap_tween_ms);
            self.board.swap(b, a)?;
            Ok(SelectOutcome::SwapRejected)
        }
    }

    /// Detect, score, remove, fall, refill; repeated until a detection pass
    /// comes up empty. Survivors of one step drop together; refills trickle
    /// in one at a time. Returns how many tiles matched in total.
    fn resolve_cascades(&mut self, services: &mut impl RoundServices) -> Result<CellCount> {
        let mut total: CellCount = 0;
        loop {
            if self.board.calculate_matches().is_empty() {
                break;
            }
            services.play_sound(Sound::Match);
            let removed = self.board.remove_matches();
            total += removed.len() as CellCount;
            self.apply_score(&removed);

            let falls = self.board.falling_tiles();
            if !falls.is_empty() {
                services.tween_moves(&falls, self.config.fall_tween_ms);
                self.board.apply_moves(&falls)?;
            }
            for spawn in self.board.refill_tiles(&mut self.generator) {
                services.tween_spawn(&spawn, self.config.refill_tween_ms);
                self.board.place_spawn(spawn)?;
            }
        }
        debug_assert!(self.board.matches().is_empty());
        Ok(total)
    }

    fn apply_score(&mut self, removed: &[Tile]) {
        let mut gained = 0;
        for tile in removed {
            gained += self.config.tile_score(tile);
        }
        self.score += gained;
        let reward = removed.len() as u32 * self.config.seconds_per_tile;
        self.timer = (self.timer + reward).min(self.config.max_timer);
        log::debug!(
            "Matched {} tiles for {} points, timer now {}",
            removed.len(),
            gained,
            self.timer
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{TileMove, TileSpawn};
    use crate::error::GameError;
    use crate::tile::{TileColor, TileId, TilePattern};
    use alloc::vec::Vec;
    use TileColor::*;

    #[derive(Default)]
    struct FakeServices {
        sounds: Vec<Sound>,
        paused: Vec<Sound>,
        tween_batches: Vec<(usize, u32)>,
        spawn_tweens: Vec<u32>,
        scheduled: u32,
        cancelled: u32,
        scenes: Vec<SceneChange>,
    }

    impl RoundServices for FakeServices {
        fn play_sound(&mut self, sound: Sound) {
            self.sounds.push(sound);
        }

        fn pause_sound(&mut self, sound: Sound) {
            self.paused.push(sound);
        }

        fn tween_moves(&mut self, moves: &[TileMove], duration_ms: u32) {
            self.tween_batches.push((moves.len(), duration_ms));
        }

        fn tween_spawn(&mut self, _spawn: &TileSpawn, duration_ms: u32) {
            self.spawn_tweens.push(duration_ms);
        }

        fn schedule_second_tick(&mut self) {
            self.scheduled += 1;
        }

        fn cancel_scheduled(&mut self) {
            self.cancelled += 1;
        }

        fn change_scene(&mut self, change: SceneChange) {
            self.scenes.push(change);
        }
    }

    fn board_from(colors: &[&[TileColor]]) -> Board {
        let rows: Vec<Vec<(TileColor, TilePattern)>> = colors
            .iter()
            .map(|row| row.iter().map(|&color| (color, TilePattern::Flat)).collect())
            .collect();
        let borrowed: Vec<&[(TileColor, TilePattern)]> =
            rows.iter().map(|row| row.as_slice()).collect();
        Board::from_rows(1, &borrowed).unwrap()
    }

    /// A board where swapping (2,0) and (2,1) matches the top two rows.
    fn matchable_board() -> Board {
        board_from(&[
            &[Red, Red, Green],
            &[Green, Green, Red],
            &[Blue, Yellow, Blue],
        ])
    }

    /// Latin-square layout: no adjacent swap anywhere produces a match.
    fn deadlocked_board() -> Board {
        board_from(&[
            &[Red, Green, Blue],
            &[Green, Blue, Red],
            &[Blue, Red, Green],
        ])
    }

    fn round_with(board: Board) -> RoundController {
        RoundController::resume(RoundConfig::default(), 0, 0xC0FFEE, board)
    }

    #[test]
    fn default_goal_compounds_per_level() {
        let config = RoundConfig::default();
        assert_eq!(config.goal_for_level(1), 250);
        assert_eq!(config.goal_for_level(2), 500);
        assert_eq!(config.goal_for_level(3), 1500);
        assert_eq!(config.goal_for_level(4), 7500);
    }

    #[test]
    fn first_selection_highlights_second_same_deselects() {
        let mut round = round_with(deadlocked_board());
        let mut services = FakeServices::default();

        assert_eq!(round.select_at((1, 1), &mut services), Ok(SelectOutcome::Selected));
        assert_eq!(round.selected(), Some((1, 1)));
        assert_eq!(round.select_at((1, 1), &mut services), Ok(SelectOutcome::Deselected));
        assert_eq!(round.selected(), None);
        assert!(services.sounds.is_empty());
    }

    #[test]
    fn distant_second_selection_is_a_failure_cue_never_a_swap() {
        let mut round = round_with(deadlocked_board());
        let mut services = FakeServices::default();

        round.select_at((0, 0), &mut services).unwrap();
        let outcome = round.select_at((2, 2), &mut services).unwrap();

        assert_eq!(outcome, SelectOutcome::TooFar);
        assert_eq!(round.selected(), None);
        assert_eq!(services.sounds, [Sound::Error]);
        assert!(services.tween_batches.is_empty());
    }

    #[test]
    fn out_of_bounds_selection_is_an_error() {
        let mut round = round_with(deadlocked_board());
        let mut services = FakeServices::default();

        assert_eq!(
            round.select_at((7, 7), &mut services),
            Err(GameError::InvalidCoords)
        );
    }

    #[test]
    fn legal_swap_commits_cascades_and_settles_at_rest() {
        let mut round = round_with(matchable_board());
        let mut services = FakeServices::default();

        round.select_at((2, 0), &mut services).unwrap();
        let outcome = round.select_at((2, 1), &mut services).unwrap();

        let SelectOutcome::SwapMatched { tiles_matched } = outcome else {
            panic!("expected a matched swap, got {:?}", outcome);
        };
        assert!(tiles_matched >= 6);
        assert_eq!(round.selected(), None);

        // level 1 refills are all flat, so the total weight is exact
        assert_eq!(round.score(), u32::from(tiles_matched) * 5);
        assert!(services.sounds.contains(&Sound::Match));

        // every removed tile was replaced by exactly one spawn tween
        assert_eq!(services.spawn_tweens.len(), usize::from(tiles_matched));
        assert_eq!(round.board().iter_tiles().count(), 9);

        // the board is back at rest
        assert!(round.board().clone().calculate_matches().is_empty());
    }

    #[test]
    fn swap_animation_precedes_fall_and_refill_pacing() {
        // swapping (2,1)/(2,2) matches the middle row, so the whole top row
        // has to drop one cell
        let board = board_from(&[
            &[Green, Blue, Yellow],
            &[Red, Red, Green],
            &[Blue, Yellow, Red],
        ]);
        let mut round = round_with(board);
        let config = round.config().clone();
        let mut services = FakeServices::default();

        round.select_at((2, 1), &mut services).unwrap();
        round.select_at((2, 2), &mut services).unwrap();

        assert_eq!(services.tween_batches[0], (2, config.swap_tween_ms));
        // survivors of the first removal drop together in one batch
        assert_eq!(services.tween_batches[1].1, config.fall_tween_ms);
        assert!(services.spawn_tweens.iter().all(|&ms| ms == config.refill_tween_ms));
    }

    #[test]
    fn illegal_swap_is_shown_reverted_and_free() {
        let mut round = round_with(deadlocked_board());
        let snapshot = round.board().clone();
        let mut services = FakeServices::default();

        round.select_at((0, 0), &mut services).unwrap();
        let outcome = round.select_at((1, 0), &mut services).unwrap();

        assert_eq!(outcome, SelectOutcome::SwapRejected);
        assert_eq!(round.board(), &snapshot);
        assert_eq!(round.score(), 0);
        assert_eq!(round.timer(), round.config().max_timer);
        assert_eq!(services.sounds, [Sound::Error]);
        // forward and back, two tiles each
        assert_eq!(services.tween_batches.len(), 2);
        assert!(services.tween_batches.iter().all(|&(tiles, _)| tiles == 2));
    }

    #[test]
    fn score_weights_flat_and_star_tiles_from_config() {
        let mut round = round_with(deadlocked_board());
        let removed = [
            Tile::new(TileId(100), (0, 0), Red, TilePattern::Flat),
            Tile::new(TileId(101), (1, 0), Red, TilePattern::Star),
            Tile::new(TileId(102), (2, 0), Red, TilePattern::Flat),
        ];

        round.apply_score(&removed);

        assert_eq!(round.score(), 5 + 30 + 5);
    }

    #[test]
    fn timer_reward_is_clamped_to_the_ceiling() {
        let mut round = round_with(deadlocked_board());
        let mut services = FakeServices::default();

        // a reward at full timer must not push past the ceiling
        let tile = Tile::new(TileId(100), (0, 0), Red, TilePattern::Flat);
        round.apply_score(&[tile]);
        assert_eq!(round.timer(), round.config().max_timer);

        round.on_second_elapsed(&mut services);
        round.on_second_elapsed(&mut services);
        round.on_second_elapsed(&mut services);
        assert_eq!(round.timer(), round.config().max_timer - 3);
        assert!(services.sounds.is_empty());

        round.apply_score(&[tile]);
        assert_eq!(round.timer(), round.config().max_timer - 1);
    }

    #[test]
    fn clock_cue_fires_on_every_low_tick() {
        let config = RoundConfig {
            max_timer: 7,
            ..Default::default()
        };
        let mut round = RoundController::resume(config, 0, 1, deadlocked_board());
        let mut services = FakeServices::default();

        for _ in 0..7 {
            round.on_second_elapsed(&mut services);
        }

        // ticks at 6 are silent; 5, 4, 3, 2, 1, 0 all warn
        assert_eq!(services.sounds, [Sound::Clock; 6]);
        assert_eq!(round.timer(), 0);
    }

    #[test]
    fn hints_run_out_and_the_search_stops_running() {
        let config = RoundConfig {
            hints_per_level: 1,
            ..Default::default()
        };
        let mut round = RoundController::resume(config, 0, 1, matchable_board());

        let hint = round.request_hint().unwrap();
        assert_eq!(hint.a, (2, 0));
        assert_eq!(hint.b, (2, 1));
        assert_eq!(round.remaining_hints(), 0);
        assert_eq!(round.hint(), Some(hint));

        // the pair is still on the board, but no hints are left
        assert_eq!(round.request_hint(), None);
        assert_eq!(round.hint(), Some(hint));
        assert_eq!(round.remaining_hints(), 0);
    }

    #[test]
    fn fruitless_hint_search_is_free() {
        let mut round = round_with(deadlocked_board());

        assert_eq!(round.request_hint(), None);
        assert_eq!(round.remaining_hints(), round.config().hints_per_level);
        assert_eq!(round.hint(), None);
    }

    #[test]
    fn committed_swap_clears_the_hint_cue() {
        let mut round = round_with(matchable_board());
        let mut services = FakeServices::default();

        round.request_hint().unwrap();
        assert!(round.hint().is_some());

        round.select_at((2, 0), &mut services).unwrap();
        round.select_at((2, 1), &mut services).unwrap();

        assert_eq!(round.hint(), None);
    }

    #[test]
    fn reaching_the_goal_wins_even_on_a_dead_timer() {
        let config = RoundConfig {
            starting_goal: 0,
            max_timer: 0,
            ..Default::default()
        };
        let mut round = RoundController::resume(config, 0, 1, deadlocked_board());
        let mut services = FakeServices::default();

        round.update(&mut services);

        assert_eq!(
            services.scenes,
            [SceneChange::LevelTransition { level: 2, score: 0 }]
        );
        assert_eq!(services.sounds, [Sound::NextLevel]);
        assert!(round.is_ended());

        // the latch keeps further frames quiet
        round.update(&mut services);
        assert_eq!(services.scenes.len(), 1);
    }

    #[test]
    fn timer_exhaustion_hands_off_the_final_score() {
        let config = RoundConfig {
            max_timer: 2,
            ..Default::default()
        };
        let mut round = RoundController::resume(config, 40, 1, deadlocked_board());
        let mut services = FakeServices::default();

        round.on_second_elapsed(&mut services);
        round.update(&mut services);
        assert!(services.scenes.is_empty());

        round.on_second_elapsed(&mut services);
        round.update(&mut services);

        assert_eq!(services.scenes, [SceneChange::GameOver { score: 40 }]);
        assert!(services.sounds.contains(&Sound::GameOver));
    }

    #[test]
    fn an_ended_round_ignores_all_input() {
        let config = RoundConfig {
            max_timer: 0,
            ..Default::default()
        };
        let mut round = RoundController::resume(config, 0, 1, matchable_board());
        let mut services = FakeServices::default();
        round.update(&mut services);
        assert!(round.is_ended());

        assert_eq!(
            round.select_at((2, 0), &mut services),
            Ok(SelectOutcome::Ignored)
        );
        assert!(!SelectOutcome::Ignored.has_update());
        assert_eq!(round.request_hint(), None);

        let timer = round.timer();
        round.on_second_elapsed(&mut services);
        assert_eq!(round.timer(), timer);
    }

    #[test]
    fn begin_and_finish_drive_the_scheduler() {
        let mut round = round_with(deadlocked_board());
        let mut services = FakeServices::default();

        round.begin(&mut services);
        assert_eq!(services.scheduled, 1);

        round.finish(&mut services);
        assert_eq!(services.cancelled, 1);
        assert_eq!(services.paused, [Sound::Music]);
    }

    #[test]
    fn fresh_rounds_roll_matchless_boards_of_the_configured_size() {
        let round = RoundController::new(RoundConfig::default(), RoundParams::default(), 7);

        assert_eq!(round.board().size(), (8, 8));
        assert_eq!(round.level(), 1);
        assert_eq!(round.score_goal(), 250);
        assert!(round.board().clone().calculate_matches().is_empty());
    }
}
