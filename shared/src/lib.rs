use serde::{Deserialize, Serialize};

// Table geometry. An axis-aligned rectangle with six pockets, cue spawn on
// the left, rack apex on the right.
pub const TABLE_LEFT: f32 = 100.0;
pub const TABLE_RIGHT: f32 = 700.0;
pub const TABLE_TOP: f32 = 150.0;
pub const TABLE_BOTTOM: f32 = 450.0;
pub const BALL_RADIUS: f32 = 12.0;
pub const POCKET_CAPTURE_RADIUS: f32 = 20.0;
pub const CUE_SPAWN: Vec2 = Vec2 { x: 200.0, y: 300.0 };
pub const RACK_APEX: Vec2 = Vec2 { x: 550.0, y: 300.0 };

pub const POCKETS: [Vec2; 6] = [
    Vec2 { x: 115.0, y: 165.0 },
    Vec2 { x: 400.0, y: 165.0 },
    Vec2 { x: 685.0, y: 165.0 },
    Vec2 { x: 115.0, y: 435.0 },
    Vec2 { x: 400.0, y: 435.0 },
    Vec2 { x: 685.0, y: 435.0 },
];

// Simulation tuning.
pub const FRICTION: f32 = 0.99;
pub const STOP_THRESHOLD: f32 = 5.0;
pub const RESTITUTION: f32 = 0.98;
pub const WALL_RESTITUTION: f32 = 0.95;
pub const MAX_POWER: f32 = 1000.0;

/// Colored balls a player must pocket before the black becomes a legal target.
pub const REQUIRED_CAPTURES: usize = 7;

pub const PROTOCOL_VERSION: u32 = 1;

/// Returns the opposing seat index.
pub const fn other_seat(seat: usize) -> usize {
    1 - seat
}

/// A vector in 2D space. Positive x is right, positive y is down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    ///Returns the magnitude of the vector.
    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    ///Returns the normalized vector.
    pub fn normalize(&self) -> Vec2 {
        let mag = self.magnitude();
        if mag == 0.0 {
            Vec2 { x: 0.0, y: 0.0 }
        } else {
            Vec2 {
                x: self.x / mag,
                y: self.y / mag,
            }
        }
    }

    ///Returns the scaled vector.
    pub fn scale(&self, scalar: f32) -> Vec2 {
        Vec2 {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }

    ///Returns the sum of two vectors.
    pub fn add(&self, other: &Vec2) -> Vec2 {
        Vec2 {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }

    ///Returns the difference of two vectors.
    pub fn sub(&self, other: &Vec2) -> Vec2 {
        Vec2 {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }

    ///Returns the dot product of two vectors.
    pub fn dot(&self, other: &Vec2) -> f32 {
        self.x * other.x + self.y * other.y
    }
}

/// The two ball colors, one per seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Team {
    Red,
    Blue,
}

impl Team {
    /// The team assigned to a seat: seat 0 plays red, seat 1 plays blue.
    pub fn of_seat(seat: usize) -> Team {
        if seat == 0 {
            Team::Red
        } else {
            Team::Blue
        }
    }

    /// The seat that owns this color.
    pub fn seat(&self) -> usize {
        match self {
            Team::Red => 0,
            Team::Blue => 1,
        }
    }
}

/// Discriminates the simulated bodies the rule arbiter cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyKind {
    Cue,
    Colored(Team),
    Black,
}

/// A movable simulated object on the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub id: u32,
    pub kind: BodyKind,
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
    /// Seat owning this ball's color. Fixed at creation.
    pub owner: Option<usize>,
}

impl Body {
    pub fn new(id: u32, kind: BodyKind, position: Vec2) -> Self {
        let owner = match kind {
            BodyKind::Colored(team) => Some(team.seat()),
            BodyKind::Cue | BodyKind::Black => None,
        };

        Self {
            id,
            kind,
            position,
            velocity: Vec2::default(),
            radius: BALL_RADIUS,
            owner,
        }
    }

    pub fn speed(&self) -> f32 {
        self.velocity.magnitude()
    }
}

/// A single move submitted by a client. Consumed once, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MoveIntent {
    /// Adjust the pending shot direction (radians).
    Aim { angle: f32 },
    /// Adjust the pending shot power.
    Power { power: f32 },
    /// Commit the shot. Rejected unless power is positive.
    Shoot { angle: f32, power: f32 },
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    // client -> server
    Join {
        client_version: u32,
    },
    Move {
        intent: MoveIntent,
    },
    Restart,
    Heartbeat {
        timestamp: u64,
    },
    Leave,

    // server -> client
    Waiting,
    Start {
        session_id: u64,
        seat: usize,
    },
    State {
        session_id: u64,
        bodies: Vec<Body>,
        scores: [Vec<Team>; 2],
        current_player: usize,
        extra_turns: u32,
        game_over: bool,
        winner: Option<usize>,
    },
    OpponentMove {
        intent: MoveIntent,
    },
    MoveRejected {
        reason: String,
    },
    OpponentLeft,
    Error {
        message: String,
    },
}
