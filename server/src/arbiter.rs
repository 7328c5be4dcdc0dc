//! Turn and scoring arbitration
//!
//! The arbiter owns the per-session turn state machine:
//! `AwaitingShot(player)` -> `Simulating(player)` -> `AwaitingShot(next)`
//! or `GameOver(winner)`. After every physics step it inspects the table
//! for pocketed bodies, applies the scoring rules, and resolves the turn
//! once the table has settled.
//!
//! Resolution order within a tick: first-contact bookkeeping, then
//! terminal-zone checks in ascending body id, then (if settled) a single
//! turn resolution with precedence game over > foul > extra-turn
//! consumption > plain switch.

use log::{debug, info};
use shared::{
    other_seat, Body, BodyKind, Team, Vec2, CUE_SPAWN, POCKETS, POCKET_CAPTURE_RADIUS,
    REQUIRED_CAPTURES,
};

use crate::physics::StepOutcome;

/// The turn state machine. `GameOver` is terminal until a session reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    AwaitingShot { player: usize },
    Simulating { player: usize },
    GameOver { winner: usize },
}

/// Notifications emitted for the session layer to log and broadcast on.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleEvent {
    Captured {
        body_id: u32,
        kind: BodyKind,
        credited_to: usize,
    },
    CueScratched,
    Foul {
        offender: usize,
    },
    ExtraTurnConsumed {
        player: usize,
        remaining: u32,
    },
    TurnPassed {
        to: usize,
    },
    GameOver {
        winner: usize,
    },
}

/// What the shot currently in flight has done so far.
#[derive(Debug, Default)]
struct ShotRecord {
    first_contact: Option<BodyKind>,
    fouled: bool,
    scratched: bool,
}

pub struct Arbiter {
    state: TurnState,
    extra_turns: u32,
    scores: [Vec<Team>; 2],
    shot: ShotRecord,
}

impl Arbiter {
    pub fn new() -> Self {
        Self {
            state: TurnState::AwaitingShot { player: 0 },
            extra_turns: 0,
            scores: [Vec::new(), Vec::new()],
            shot: ShotRecord::default(),
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn scores(&self) -> &[Vec<Team>; 2] {
        &self.scores
    }

    pub fn extra_turns(&self) -> u32 {
        self.extra_turns
    }

    /// The seat holding the turn, if the game is still running.
    pub fn current_player(&self) -> Option<usize> {
        match self.state {
            TurnState::AwaitingShot { player } | TurnState::Simulating { player } => Some(player),
            TurnState::GameOver { .. } => None,
        }
    }

    pub fn winner(&self) -> Option<usize> {
        match self.state {
            TurnState::GameOver { winner } => Some(winner),
            _ => None,
        }
    }

    pub fn is_game_over(&self) -> bool {
        matches!(self.state, TurnState::GameOver { .. })
    }

    /// Whether a move from `seat` is acceptable right now. Moves from the
    /// wrong seat, during simulation, or after game over are no-ops.
    pub fn accepts_move_from(&self, seat: usize) -> bool {
        matches!(self.state, TurnState::AwaitingShot { player } if player == seat)
    }

    /// Commits the acting player's shot and starts simulating.
    pub fn begin_shot(&mut self, seat: usize) -> bool {
        if !self.accepts_move_from(seat) {
            return false;
        }

        self.shot = ShotRecord::default();
        self.state = TurnState::Simulating { player: seat };
        debug!("Player {} shot committed", seat);
        true
    }

    /// Inspects the table after one physics step: records the cue's first
    /// contact, consumes pocketed bodies, and resolves the turn once the
    /// step reports the table settled.
    pub fn tick(&mut self, bodies: &mut Vec<Body>, outcome: &StepOutcome) -> Vec<RuleEvent> {
        let player = match self.state {
            TurnState::Simulating { player } => player,
            _ => return Vec::new(),
        };

        let mut events = Vec::new();
        self.record_first_contact(bodies, &outcome.contacts);
        self.apply_captures(bodies, player, &mut events);

        if outcome.settled && !self.is_game_over() {
            self.resolve_turn(player, &mut events);
        }

        events
    }

    /// Returns to a fresh game: player 0 to act, scores cleared.
    pub fn reset(&mut self) {
        self.state = TurnState::AwaitingShot { player: 0 };
        self.extra_turns = 0;
        self.scores = [Vec::new(), Vec::new()];
        self.shot = ShotRecord::default();
    }

    fn record_first_contact(&mut self, bodies: &[Body], contacts: &[(u32, u32)]) {
        if self.shot.first_contact.is_some() {
            return;
        }

        let cue_id = match bodies.iter().find(|b| b.kind == BodyKind::Cue) {
            Some(cue) => cue.id,
            None => return,
        };

        for &(a, b) in contacts {
            let other = if a == cue_id {
                b
            } else if b == cue_id {
                a
            } else {
                continue;
            };

            if let Some(hit) = bodies.iter().find(|body| body.id == other) {
                self.shot.first_contact = Some(hit.kind);
                return;
            }
        }
    }

    /// Removes every body resting in a pocket, in ascending id order, and
    /// applies the scoring rule for each.
    fn apply_captures(&mut self, bodies: &mut Vec<Body>, player: usize, events: &mut Vec<RuleEvent>) {
        let mut index = 0;
        while index < bodies.len() && !self.is_game_over() {
            if !in_pocket(&bodies[index]) {
                index += 1;
                continue;
            }

            match bodies[index].kind {
                BodyKind::Cue => {
                    // Scratch: the cue returns to its spawn instead of
                    // leaving the table.
                    let cue = &mut bodies[index];
                    cue.position = CUE_SPAWN;
                    cue.velocity = Vec2::default();
                    self.shot.scratched = true;
                    info!("Player {} scratched the cue", player);
                    events.push(RuleEvent::CueScratched);
                    index += 1;
                }
                BodyKind::Colored(team) => {
                    let body = bodies.remove(index);
                    let credited_to = if team == Team::of_seat(player) {
                        self.scores[player].push(team);
                        self.extra_turns += 1;
                        debug!(
                            "Player {} pocketed own ball {} ({} captured)",
                            player,
                            body.id,
                            self.scores[player].len()
                        );
                        player
                    } else {
                        let owner = body.owner.unwrap_or_else(|| other_seat(player));
                        self.scores[owner].push(team);
                        self.shot.fouled = true;
                        debug!("Player {} pocketed opponent ball {}", player, body.id);
                        owner
                    };
                    events.push(RuleEvent::Captured {
                        body_id: body.id,
                        kind: body.kind,
                        credited_to,
                    });
                }
                BodyKind::Black => {
                    bodies.remove(index);
                    let winner = if self.scores[player].len() >= REQUIRED_CAPTURES {
                        player
                    } else {
                        other_seat(player)
                    };
                    self.state = TurnState::GameOver { winner };
                    info!("Black ball pocketed, player {} wins", winner);
                    events.push(RuleEvent::GameOver { winner });
                }
            }
        }
    }

    /// Hitting the black first is only legal once the shooter's own set is
    /// complete; hitting the opponent's color first never is.
    fn first_contact_foul(&self, player: usize) -> bool {
        match self.shot.first_contact {
            Some(BodyKind::Black) => self.scores[player].len() < REQUIRED_CAPTURES,
            Some(BodyKind::Colored(team)) => team != Team::of_seat(player),
            Some(BodyKind::Cue) | None => false,
        }
    }

    fn resolve_turn(&mut self, player: usize, events: &mut Vec<RuleEvent>) {
        let fouled = self.shot.scratched || self.shot.fouled || self.first_contact_foul(player);

        if fouled {
            // Forced double turn-loss: the opponent takes over with one
            // banked bonus turn. Bonuses earned during the fouled shot are
            // forfeited.
            let next = other_seat(player);
            self.extra_turns = 1;
            self.state = TurnState::AwaitingShot { player: next };
            info!("Foul by player {}, turn passes to {}", player, next);
            events.push(RuleEvent::Foul { offender: player });
            events.push(RuleEvent::TurnPassed { to: next });
        } else if self.extra_turns > 0 {
            self.extra_turns -= 1;
            self.state = TurnState::AwaitingShot { player };
            debug!(
                "Player {} keeps the turn ({} bonus shots left)",
                player, self.extra_turns
            );
            events.push(RuleEvent::ExtraTurnConsumed {
                player,
                remaining: self.extra_turns,
            });
        } else {
            let next = other_seat(player);
            self.state = TurnState::AwaitingShot { player: next };
            debug!("Turn passes to player {}", next);
            events.push(RuleEvent::TurnPassed { to: next });
        }
    }
}

fn in_pocket(body: &Body) -> bool {
    POCKETS
        .iter()
        .any(|pocket| body.position.sub(pocket).magnitude() < POCKET_CAPTURE_RADIUS)
}
