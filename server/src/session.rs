//! Session pairing and per-session game state
//!
//! Sessions live in an explicit keyed table. Each one owns its entity
//! state exclusively; nothing is shared across sessions, and a session
//! that loses a player leaves the table immediately.

use std::collections::HashMap;
use std::fmt;

use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use shared::{
    other_seat, Body, BodyKind, MoveIntent, Packet, Team, Vec2, BALL_RADIUS, CUE_SPAWN, MAX_POWER,
    RACK_APEX, REQUIRED_CAPTURES,
};

use crate::arbiter::{Arbiter, RuleEvent, TurnState};
use crate::physics::{self, Bounds};

/// Outcome of a pairing attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum PairOutcome {
    /// Parked until an opponent arrives.
    Waiting,
    /// Pairing completed; the new session is live.
    Paired { session_id: u64 },
}

/// Session lifecycle violations, surfaced to the offending client.
#[derive(Debug, PartialEq, Eq)]
pub enum LifecycleError {
    AlreadyWaiting,
    AlreadyInSession,
    NotInSession,
    GameStillRunning,
}

impl fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            LifecycleError::AlreadyWaiting => "already waiting for an opponent",
            LifecycleError::AlreadyInSession => "already in a game",
            LifecycleError::NotInSession => "not in a game",
            LifecycleError::GameStillRunning => "game is still running",
        };
        f.write_str(message)
    }
}

/// Outcome of a submitted move.
#[derive(Debug, PartialEq)]
pub enum MoveOutcome {
    /// Aim or power update accepted; relay the intent to the opponent.
    Updated {
        session_id: u64,
        opponent: u32,
        intent: MoveIntent,
    },
    /// Shot committed; the simulation is running.
    Committed { session_id: u64 },
    /// Rule violation: a no-op apart from an optional rejection notice.
    Rejected { reason: &'static str },
    /// Sender is not part of any session.
    NotInSession,
}

/// What happened when a client went away.
#[derive(Debug, PartialEq, Eq)]
pub enum DisconnectOutcome {
    /// The client was parked in the waiting slot.
    WasWaiting,
    /// A live session ended; notify the surviving client.
    SessionEnded { session_id: u64, remaining: u32 },
}

/// State change from one tick of one session, for broadcasting.
#[derive(Debug)]
pub struct TickUpdate {
    pub session_id: u64,
    pub events: Vec<RuleEvent>,
}

/// One paired two-player game instance.
pub struct Session {
    id: u64,
    /// Client ids by seat. Seat 0 acts first.
    players: [u32; 2],
    bodies: Vec<Body>,
    arbiter: Arbiter,
    bounds: Bounds,
    pending_aim: f32,
    pending_power: f32,
}

impl Session {
    fn new<R: Rng>(id: u64, players: [u32; 2], rng: &mut R) -> Self {
        Self {
            id,
            players,
            bodies: rack_bodies(rng),
            arbiter: Arbiter::new(),
            bounds: Bounds::default(),
            pending_aim: 0.0,
            pending_power: 0.0,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn players(&self) -> [u32; 2] {
        self.players
    }

    pub fn seat_of(&self, client_id: u32) -> Option<usize> {
        self.players.iter().position(|&p| p == client_id)
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn arbiter(&self) -> &Arbiter {
        &self.arbiter
    }

    /// Full-state snapshot for both clients.
    pub fn state_packet(&self) -> Packet {
        let (game_over, winner) = match self.arbiter.state() {
            TurnState::GameOver { winner } => (true, Some(winner)),
            _ => (false, None),
        };

        Packet::State {
            session_id: self.id,
            bodies: self.bodies.clone(),
            scores: self.arbiter.scores().clone(),
            current_player: self.arbiter.current_player().unwrap_or(0),
            extra_turns: self.arbiter.extra_turns(),
            game_over,
            winner,
        }
    }

    fn submit(&mut self, seat: usize, intent: MoveIntent) -> MoveOutcome {
        if !self.arbiter.accepts_move_from(seat) {
            let reason = match self.arbiter.state() {
                TurnState::Simulating { .. } => "table still in motion",
                TurnState::GameOver { .. } => "game is over",
                TurnState::AwaitingShot { .. } => "not your turn",
            };
            return MoveOutcome::Rejected { reason };
        }

        match intent {
            MoveIntent::Aim { angle } => {
                self.pending_aim = angle;
                MoveOutcome::Updated {
                    session_id: self.id,
                    opponent: self.players[other_seat(seat)],
                    intent,
                }
            }
            MoveIntent::Power { power } => {
                self.pending_power = power.clamp(0.0, MAX_POWER);
                MoveOutcome::Updated {
                    session_id: self.id,
                    opponent: self.players[other_seat(seat)],
                    intent,
                }
            }
            MoveIntent::Shoot { angle, power } => {
                if power <= 0.0 {
                    return MoveOutcome::Rejected {
                        reason: "shot needs power",
                    };
                }

                let cue = match self.bodies.iter_mut().find(|b| b.kind == BodyKind::Cue) {
                    Some(cue) => cue,
                    None => {
                        warn!("Session {} has no cue ball", self.id);
                        return MoveOutcome::Rejected { reason: "no cue ball" };
                    }
                };

                let power = power.clamp(0.0, MAX_POWER);
                cue.velocity = Vec2 {
                    x: angle.cos() * power,
                    y: angle.sin() * power,
                };
                self.arbiter.begin_shot(seat);
                self.pending_aim = 0.0;
                self.pending_power = 0.0;
                MoveOutcome::Committed { session_id: self.id }
            }
        }
    }

    /// Advances the simulation by one tick. Returns the arbiter's events,
    /// or None when no shot is in flight.
    fn step(&mut self, dt: f32) -> Option<Vec<RuleEvent>> {
        if !matches!(self.arbiter.state(), TurnState::Simulating { .. }) {
            return None;
        }

        let outcome = physics::step(&mut self.bodies, &self.bounds, dt);
        Some(self.arbiter.tick(&mut self.bodies, &outcome))
    }

    fn reset<R: Rng>(&mut self, rng: &mut R) {
        self.bodies = rack_bodies(rng);
        self.arbiter.reset();
        self.pending_aim = 0.0;
        self.pending_power = 0.0;
    }
}

/// Keyed table of live sessions plus the single waiting slot.
pub struct SessionTable {
    sessions: HashMap<u64, Session>,
    session_by_client: HashMap<u32, u64>,
    waiting: Option<u32>,
    next_session_id: u64,
    rng: StdRng,
}

impl SessionTable {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            session_by_client: HashMap::new(),
            waiting: None,
            next_session_id: 1,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn session(&self, session_id: u64) -> Option<&Session> {
        self.sessions.get(&session_id)
    }

    pub fn session_of(&self, client_id: u32) -> Option<u64> {
        self.session_by_client.get(&client_id).copied()
    }

    /// First caller parks in the waiting slot; the second completes the
    /// pairing and starts a session with the waiting client in seat 0.
    pub fn pair_waiting(&mut self, client_id: u32) -> Result<PairOutcome, LifecycleError> {
        if self.waiting == Some(client_id) {
            return Err(LifecycleError::AlreadyWaiting);
        }
        if self.session_by_client.contains_key(&client_id) {
            return Err(LifecycleError::AlreadyInSession);
        }

        match self.waiting.take() {
            Some(first) => {
                let session_id = self.next_session_id;
                self.next_session_id += 1;

                let session = Session::new(session_id, [first, client_id], &mut self.rng);
                self.session_by_client.insert(first, session_id);
                self.session_by_client.insert(client_id, session_id);
                self.sessions.insert(session_id, session);

                info!(
                    "Session {} started: client {} (seat 0) vs client {} (seat 1)",
                    session_id, first, client_id
                );
                Ok(PairOutcome::Paired { session_id })
            }
            None => {
                self.waiting = Some(client_id);
                info!("Client {} waiting for an opponent", client_id);
                Ok(PairOutcome::Waiting)
            }
        }
    }

    /// Validates and applies a move intent from a client.
    pub fn submit_move(&mut self, client_id: u32, intent: MoveIntent) -> MoveOutcome {
        let session_id = match self.session_by_client.get(&client_id) {
            Some(id) => *id,
            None => return MoveOutcome::NotInSession,
        };

        let session = match self.sessions.get_mut(&session_id) {
            Some(session) => session,
            None => return MoveOutcome::NotInSession,
        };

        let seat = match session.seat_of(client_id) {
            Some(seat) => seat,
            None => return MoveOutcome::NotInSession,
        };

        session.submit(seat, intent)
    }

    /// Advances every session with a shot in flight by one tick.
    pub fn tick(&mut self, dt: f32) -> Vec<TickUpdate> {
        let mut updates = Vec::new();

        for session in self.sessions.values_mut() {
            if let Some(events) = session.step(dt) {
                updates.push(TickUpdate {
                    session_id: session.id,
                    events,
                });
            }
        }

        updates
    }

    /// Removes a departing client. A live session is torn down immediately;
    /// the survivor is reported so the caller can notify them.
    pub fn on_disconnect(&mut self, client_id: u32) -> Option<DisconnectOutcome> {
        if self.waiting == Some(client_id) {
            self.waiting = None;
            info!("Waiting client {} left the queue", client_id);
            return Some(DisconnectOutcome::WasWaiting);
        }

        let session_id = self.session_by_client.remove(&client_id)?;
        let session = self.sessions.remove(&session_id)?;
        let remaining = session.players[other_seat(session.seat_of(client_id)?)];
        self.session_by_client.remove(&remaining);

        info!(
            "Session {} ended: client {} left, client {} remains",
            session_id, client_id, remaining
        );
        Some(DisconnectOutcome::SessionEnded {
            session_id,
            remaining,
        })
    }

    /// Restart request: only valid once the game is over.
    pub fn restart(&mut self, client_id: u32) -> Result<u64, LifecycleError> {
        let session_id = self
            .session_by_client
            .get(&client_id)
            .copied()
            .ok_or(LifecycleError::NotInSession)?;
        let session = self
            .sessions
            .get_mut(&session_id)
            .ok_or(LifecycleError::NotInSession)?;

        if !session.arbiter.is_game_over() {
            return Err(LifecycleError::GameStillRunning);
        }

        session.reset(&mut self.rng);
        info!("Session {} restarted", session_id);
        Ok(session_id)
    }
}

/// Builds the opening layout: cue at its spawn, fifteen balls racked in a
/// five-row triangle with the black at the rack center and the colored
/// slots shuffled between the two teams.
fn rack_bodies<R: Rng>(rng: &mut R) -> Vec<Body> {
    let mut bodies = vec![Body::new(0, BodyKind::Cue, CUE_SPAWN)];

    let mut colors = Vec::with_capacity(REQUIRED_CAPTURES * 2);
    colors.extend(std::iter::repeat(BodyKind::Colored(Team::Red)).take(REQUIRED_CAPTURES));
    colors.extend(std::iter::repeat(BodyKind::Colored(Team::Blue)).take(REQUIRED_CAPTURES));
    colors.shuffle(rng);

    let spacing = BALL_RADIUS * 2.2;
    let mut id = 1;
    let mut color_index = 0;

    for row in 0..5 {
        for col in 0..=row {
            let position = Vec2 {
                x: RACK_APEX.x + spacing * row as f32 * 1.2,
                y: RACK_APEX.y - spacing * row as f32 / 2.0 + spacing * col as f32,
            };
            let kind = if row == 2 && col == 1 {
                BodyKind::Black
            } else {
                let kind = colors[color_index];
                color_index += 1;
                kind
            };
            bodies.push(Body::new(id, kind, position));
            id += 1;
        }
    }

    bodies
}
