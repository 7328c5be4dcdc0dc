//! Deterministic physics step for the table simulation
//!
//! One call to [`step`] advances every body by a single tick: integrate,
//! reflect off the rails, resolve pairwise collisions in canonical order,
//! then apply friction and the stop threshold. Scoring and body removal
//! are the arbiter's job; this module only moves things.

use shared::{
    Body, Vec2, FRICTION, RESTITUTION, STOP_THRESHOLD, TABLE_BOTTOM, TABLE_LEFT, TABLE_RIGHT,
    TABLE_TOP, WALL_RESTITUTION,
};

/// Extra gap added when separating an overlapping pair, so the resulting
/// distance is at least the sum of radii after float rounding.
const SEPARATION_SLOP: f32 = 0.01;

/// The fixed boundary rectangle bodies bounce off.
#[derive(Debug, Clone, Copy)]
pub struct Bounds {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl Default for Bounds {
    fn default() -> Self {
        Bounds {
            left: TABLE_LEFT,
            right: TABLE_RIGHT,
            top: TABLE_TOP,
            bottom: TABLE_BOTTOM,
        }
    }
}

/// What one tick of simulation observed.
#[derive(Debug, Clone, Default)]
pub struct StepOutcome {
    /// Body id pairs that collided this tick, in resolution order.
    pub contacts: Vec<(u32, u32)>,
    /// True when every body has come to rest.
    pub settled: bool,
}

/// Advances all bodies by `dt` seconds.
///
/// `bodies` must be sorted by ascending id; pair resolution visits
/// unordered pairs in that canonical order so repeated runs over the same
/// input produce identical results.
pub fn step(bodies: &mut [Body], bounds: &Bounds, dt: f32) -> StepOutcome {
    debug_assert!(bodies.windows(2).all(|w| w[0].id < w[1].id));

    for body in bodies.iter_mut() {
        body.position = body.position.add(&body.velocity.scale(dt));
    }

    for body in bodies.iter_mut() {
        reflect_off_bounds(body, bounds);
    }

    let mut contacts = Vec::new();
    for i in 0..bodies.len() {
        for j in (i + 1)..bodies.len() {
            let (head, tail) = bodies.split_at_mut(j);
            let a = &mut head[i];
            let b = &mut tail[0];
            if resolve_pair(a, b) {
                contacts.push((a.id, b.id));
            }
        }
    }

    let mut settled = true;
    for body in bodies.iter_mut() {
        body.velocity = body.velocity.scale(FRICTION);
        if body.speed() < STOP_THRESHOLD {
            body.velocity = Vec2::default();
        } else {
            settled = false;
        }
    }

    StepOutcome { contacts, settled }
}

/// Clamps a body back inside the rails and reflects the perpendicular
/// velocity component. The component is only negated while it still points
/// outward, so a body sitting exactly on a rail never reflects twice.
fn reflect_off_bounds(body: &mut Body, bounds: &Bounds) {
    let r = body.radius;

    if body.position.x - r < bounds.left {
        body.position.x = bounds.left + r;
        if body.velocity.x < 0.0 {
            body.velocity.x = -body.velocity.x * WALL_RESTITUTION;
        }
    } else if body.position.x + r > bounds.right {
        body.position.x = bounds.right - r;
        if body.velocity.x > 0.0 {
            body.velocity.x = -body.velocity.x * WALL_RESTITUTION;
        }
    }

    if body.position.y - r < bounds.top {
        body.position.y = bounds.top + r;
        if body.velocity.y < 0.0 {
            body.velocity.y = -body.velocity.y * WALL_RESTITUTION;
        }
    } else if body.position.y + r > bounds.bottom {
        body.position.y = bounds.bottom - r;
        if body.velocity.y > 0.0 {
            body.velocity.y = -body.velocity.y * WALL_RESTITUTION;
        }
    }
}

/// Detects and resolves a collision between two bodies.
/// Returns true if the pair was overlapping.
fn resolve_pair(a: &mut Body, b: &mut Body) -> bool {
    let delta = b.position.sub(&a.position);
    let distance = delta.magnitude();
    let min_distance = a.radius + b.radius;

    if distance >= min_distance {
        return false;
    }

    // Coincident centers leave the normal undefined; pick the x axis.
    let normal = if distance < f32::EPSILON {
        Vec2 { x: 1.0, y: 0.0 }
    } else {
        delta.scale(1.0 / distance)
    };

    let push = (min_distance - distance) / 2.0 + SEPARATION_SLOP;
    a.position = a.position.add(&normal.scale(-push));
    b.position = b.position.add(&normal.scale(push));

    // Equal-mass elastic exchange of the normal components, damped by the
    // restitution factor. Tangential components stay with their body.
    let a_normal = a.velocity.dot(&normal);
    let b_normal = b.velocity.dot(&normal);
    let a_tangent = a.velocity.sub(&normal.scale(a_normal));
    let b_tangent = b.velocity.sub(&normal.scale(b_normal));

    a.velocity = a_tangent.add(&normal.scale(b_normal)).scale(RESTITUTION);
    b.velocity = b_tangent.add(&normal.scale(a_normal)).scale(RESTITUTION);

    true
}
