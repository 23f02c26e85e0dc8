use crate::organisms::components::Energy;
use crate::organisms::tuning::LifeCycleTuning;

/// Life-cycle state machine - organisms can be in one of these states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifeCycleState {
    /// Accumulating energy, extending structure when short on it (default state)
    Growing,
    /// Banked energy above the reproduction threshold
    Reproducing,
    /// Lifetime exceeded or structure lost
    Dying,
    /// Terminal
    Destroyed,
}

/// What an organism does with its turn. At most one action per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifeCycleAction {
    Expire,
    Reproduce,
    Grow,
    Idle,
    /// Seed reached full sprout status
    Sprout,
}

impl LifeCycleAction {
    pub fn state(self) -> LifeCycleState {
        match self {
            LifeCycleAction::Expire => LifeCycleState::Dying,
            LifeCycleAction::Reproduce => LifeCycleState::Reproducing,
            LifeCycleAction::Sprout => LifeCycleState::Destroyed,
            LifeCycleAction::Grow | LifeCycleAction::Idle => LifeCycleState::Growing,
        }
    }
}

/// Component tracking an organism's current life-cycle state
#[derive(Debug, Clone, Copy)]
pub struct LifeCycle {
    pub state: LifeCycleState,
    /// Simulation time the current state was entered
    pub since_ms: f64,
}

impl LifeCycle {
    pub fn new(now_ms: f64) -> Self {
        Self {
            state: LifeCycleState::Growing,
            since_ms: now_ms,
        }
    }

    /// Returns true when the state actually changed
    pub fn set_state(&mut self, new_state: LifeCycleState, now_ms: f64) -> bool {
        if self.state != new_state {
            self.state = new_state;
            self.since_ms = now_ms;
            true
        } else {
            false
        }
    }
}

/// Fraction of the lifetime already spent
pub fn life_fraction(now_ms: f64, spawn_time_ms: f64, max_lifetime_ms: f64) -> f64 {
    if max_lifetime_ms <= 0.0 {
        return f64::INFINITY;
    }
    (now_ms - spawn_time_ms) / max_lifetime_ms
}

/// Energy expected at end of life if the average conversion rate so far holds
pub fn projected_energy(energy: &Energy, life_fraction: f64, max_lifetime_ms: f64) -> f32 {
    let rate = energy.total as f64 / max_lifetime_ms;
    (energy.current as f64 + rate * (1.0 - life_fraction) * max_lifetime_ms) as f32
}

/// Decide an adult's action: expiry, then reproduction, then growth
pub fn decide_adult(energy: &Energy, life_fraction: f64, tuning: &LifeCycleTuning) -> LifeCycleAction {
    if life_fraction > 1.0 {
        return LifeCycleAction::Expire;
    }
    if energy.ratio(tuning.reproduction_energy) > 1.0 {
        return LifeCycleAction::Reproduce;
    }
    if projected_energy(energy, life_fraction, tuning.max_lifetime_ms)
        < tuning.reproduction_energy * 2.0
    {
        LifeCycleAction::Grow
    } else {
        LifeCycleAction::Idle
    }
}

pub fn decide_seed(sprout_status: f32, life_fraction: f64) -> LifeCycleAction {
    if life_fraction > 1.0 {
        LifeCycleAction::Expire
    } else if sprout_status >= 1.0 {
        LifeCycleAction::Sprout
    } else {
        LifeCycleAction::Idle
    }
}
