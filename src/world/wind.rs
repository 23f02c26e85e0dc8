//! Coarse pressure field and the wind it implies.
//!
//! Pressure flows from high to low between neighboring coarse cells, carrying
//! heat with it. Cells fully packed with buried solid terrain are pinned to
//! the [`BLOCKED`] sentinel and take no part in the exchange.

use std::collections::{BTreeMap, VecDeque};
use std::f64::consts::FRAC_1_SQRT_2;

use glam::{IVec2, Vec2};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::world::atmosphere::AtmosphereField;
use crate::world::grid::{CoarseLayout, TerrainGrid, COARSE_FACTOR};

/// Pressure value marking a coarse cell as blocked by terrain
pub const BLOCKED: f64 = -1.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindConfig {
    /// Pa
    pub base_pressure: f64,
    /// Fraction of a pressure difference exchanged per pair visit, in (0, 1]
    pub flow_strength: f64,
    /// Pressure impulse as a fraction of the base pressure
    pub impulse_fraction: f64,
    pub gust_theta_step: f64,
    /// Minimum spacing between two freshly generated gust functions
    pub gust_interval_ms: f64,
    pub gust_period_min: f64,
    pub gust_period_max: f64,
    pub gust_amplitude_min: f64,
    pub gust_amplitude_max: f64,
    pub air_density: f64,
    /// Samples kept per cell for velocity smoothing
    pub smoothing_window: usize,
    /// Weight of the history average in a smoothed velocity
    pub smoothing_weight: f32,
    /// Force diagonal partners of edge cells back to base pressure
    pub pin_boundary: bool,
}

impl Default for WindConfig {
    fn default() -> Self {
        Self {
            base_pressure: 101_325.0,
            flow_strength: 0.5,
            impulse_fraction: 0.01,
            gust_theta_step: 0.01,
            gust_interval_ms: 1000.0,
            gust_period_min: 8.0,
            gust_period_max: 13.0,
            gust_amplitude_min: 10.0,
            gust_amplitude_max: 30.0,
            air_density: 1.225,
            smoothing_window: 5,
            smoothing_weight: 0.8,
            pin_boundary: true,
        }
    }
}

/// Periodic pressure source attached to coarse cells
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GustFunction {
    pub period: f64,
    pub amplitude: f64,
}

impl GustFunction {
    pub fn random<R: Rng + ?Sized>(config: &WindConfig, rng: &mut R) -> Self {
        Self {
            period: rng.gen_range(config.gust_period_min..config.gust_period_max),
            amplitude: rng.gen_range(config.gust_amplitude_min..config.gust_amplitude_max),
        }
    }

    /// Pressure contribution at phase `theta`; NaN where the log argument is negative
    pub fn value(&self, theta: f64) -> f64 {
        self.amplitude * ((-1.0 + (theta / self.period).cos().sin()).ln_1p() + 1.9)
    }
}

/// True when every terrain position under a coarse cell holds a buried
/// solid collidable cell
pub fn is_blocked_by_terrain(terrain: &TerrainGrid, coarse_pos: IVec2) -> bool {
    let origin = coarse_pos * COARSE_FACTOR;
    (0..COARSE_FACTOR).all(|dx| {
        (0..COARSE_FACTOR).all(|dy| {
            terrain
                .iter_at(origin + IVec2::new(dx, dy))
                .any(|(_, cell)| cell.blocks_wind())
        })
    })
}

#[derive(Debug, Clone)]
pub struct WindField {
    layout: CoarseLayout,
    pressure: Vec<f64>,
    gust_slots: Vec<Option<usize>>,
    gusts: Vec<GustFunction>,
    last_gust_added_ms: f64,
    theta: f64,
    history: Vec<VecDeque<Vec2>>,
    velocity: Vec<Vec2>,
    resets: u64,
    config: WindConfig,
}

impl WindField {
    pub fn new(terrain: &TerrainGrid, config: WindConfig) -> Self {
        let layout = CoarseLayout::for_terrain(terrain.width(), terrain.height());
        let mut field = Self {
            layout,
            pressure: Vec::new(),
            gust_slots: Vec::new(),
            gusts: Vec::new(),
            last_gust_added_ms: f64::NEG_INFINITY,
            theta: 0.0,
            history: Vec::new(),
            velocity: Vec::new(),
            resets: 0,
            config,
        };
        field.initialize_pressure_map(terrain);
        field
    }

    /// Base pressure everywhere except blocked cells. Clears gusts and velocity history.
    pub fn initialize_pressure_map(&mut self, terrain: &TerrainGrid) {
        let len = self.layout.len();
        self.pressure = self
            .layout
            .positions()
            .map(|pos| {
                if is_blocked_by_terrain(terrain, pos) {
                    BLOCKED
                } else {
                    self.config.base_pressure
                }
            })
            .collect();
        self.gust_slots = vec![None; len];
        self.gusts.clear();
        self.last_gust_added_ms = f64::NEG_INFINITY;
        self.history = vec![VecDeque::with_capacity(self.config.smoothing_window); len];
        self.velocity = vec![Vec2::ZERO; len];
    }

    pub fn layout(&self) -> CoarseLayout {
        self.layout
    }

    pub fn config(&self) -> &WindConfig {
        &self.config
    }

    /// Times the field was rebuilt after a non-finite pressure
    pub fn resets(&self) -> u64 {
        self.resets
    }

    pub fn tick(&mut self, terrain: &TerrainGrid, atmosphere: &mut AtmosphereField) {
        self.theta += self.config.gust_theta_step;

        if self.pressure.iter().any(|p| !p.is_finite()) {
            warn!("[WIND] Non-finite pressure detected, reinitializing the field");
            self.resets += 1;
            self.initialize_pressure_map(terrain);
            return;
        }

        self.update_blocked_cells(terrain);
        self.apply_gusts();
        self.flow(atmosphere);
        self.refresh_velocities();
    }

    fn update_blocked_cells(&mut self, terrain: &TerrainGrid) {
        for pos in self.layout.positions() {
            let idx = self.layout.index(pos);
            if is_blocked_by_terrain(terrain, pos) {
                self.pressure[idx] = BLOCKED;
            } else if self.pressure[idx] < 0.0 {
                let inherited = self
                    .layout
                    .direct(pos)
                    .iter()
                    .map(|n| self.pressure[self.layout.index(*n)])
                    .find(|p| *p >= 0.0)
                    .unwrap_or(self.config.base_pressure);
                self.pressure[idx] = inherited;
            }
        }
    }

    fn apply_gusts(&mut self) {
        for idx in 0..self.pressure.len() {
            let Some(gust) = self.gust_slots[idx].and_then(|slot| self.gusts.get(slot).copied()) else {
                continue;
            };
            if self.pressure[idx] < 0.0 {
                continue;
            }
            let contribution = gust.value(self.theta);
            if contribution.is_finite() {
                self.pressure[idx] = (self.pressure[idx] + contribution).max(0.0);
            }
        }
    }

    fn pressure_diff(&self, from: f64, to: f64) -> f64 {
        if from < 0.0 || to < 0.0 || !from.is_finite() || !to.is_finite() {
            return 0.0;
        }
        (from - to) * self.config.flow_strength
    }

    /// Exchange pressure between neighbors, highest-pressure cells first
    fn flow(&mut self, atmosphere: &mut AtmosphereField) {
        let mut buckets: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (idx, p) in self.pressure.iter().enumerate() {
            if *p >= 0.0 {
                buckets.entry(p.floor() as i64).or_default().push(idx);
            }
        }

        for idx in buckets.into_values().rev().flatten() {
            let pos = self.layout.position(idx);

            for n in self.layout.direct(pos) {
                let n_idx = self.layout.index(n);
                if n_idx == idx {
                    continue;
                }
                let diff = self.pressure_diff(self.pressure[idx], self.pressure[n_idx]);
                if diff == 0.0 {
                    continue;
                }
                let (source, receiver) = if diff > 0.0 { (idx, n_idx) } else { (n_idx, idx) };
                self.advect_heat(atmosphere, source, receiver, diff.abs());
                self.pressure[idx] -= diff;
                self.pressure[n_idx] += diff;
            }

            for n in self.layout.diagonal(pos) {
                let n_idx = self.layout.index(n);
                if n_idx == idx {
                    continue;
                }
                if self.config.pin_boundary
                    && self.layout.is_boundary(pos)
                    && self.pressure[n_idx] >= 0.0
                {
                    self.pressure[n_idx] = self.config.base_pressure;
                }
                let diff = self.pressure_diff(self.pressure[idx], self.pressure[n_idx])
                    * FRAC_1_SQRT_2;
                self.pressure[idx] -= diff;
                self.pressure[n_idx] += diff;
            }
        }
    }

    /// Mix the source's temperature into the receiver, weighted by the pressure moved
    fn advect_heat(&self, atmosphere: &mut AtmosphereField, source: usize, receiver: usize, flow: f64) {
        let receiver_pressure = self.pressure[receiver];
        let denominator = receiver_pressure + flow;
        if denominator <= 0.0 {
            return;
        }
        let receiver_pos = self.layout.position(receiver);
        let receiver_t = atmosphere.coarse_temperature(receiver_pos);
        let source_t = atmosphere.coarse_temperature(self.layout.position(source));
        let mixed = (receiver_pressure * receiver_t + flow * source_t) / denominator;
        atmosphere.update_temperature_at(receiver_pos, mixed);
    }

    fn refresh_velocities(&mut self) {
        for idx in 0..self.pressure.len() {
            let sample = self.instant_velocity(idx);
            self.velocity[idx] = if self.pressure[idx] < 0.0 {
                Vec2::ZERO
            } else {
                self.smooth(idx, sample)
            };
        }
    }

    /// Unsmoothed velocity from the sign-selected pressure gradients
    fn instant_velocity(&self, idx: usize) -> Vec2 {
        let own = self.pressure[idx];
        if own <= 0.0 {
            return Vec2::ZERO;
        }
        let pos = self.layout.position(idx);
        // blocked neighbors exert no gradient
        let gradient = |offset: IVec2| {
            let other = self.pressure[self.layout.index(pos + offset)];
            if other < 0.0 {
                0.0
            } else {
                other - own
            }
        };

        let net_x = opposing_gradient(gradient(IVec2::NEG_X), gradient(IVec2::X));
        let net_y = opposing_gradient(gradient(IVec2::NEG_Y), gradient(IVec2::Y));
        let density = self.config.air_density * own / self.config.base_pressure;

        Vec2::new(
            speed_from_gradient(net_x, density) as f32,
            speed_from_gradient(net_y, density) as f32,
        )
    }

    fn smooth(&mut self, idx: usize, sample: Vec2) -> Vec2 {
        let window = self.config.smoothing_window.max(1);
        let weight = self.config.smoothing_weight;
        let history = &mut self.history[idx];
        if history.is_empty() {
            history.push_back(sample);
            return sample;
        }
        let average = history.iter().copied().sum::<Vec2>() / history.len() as f32;
        history.push_back(sample);
        while history.len() > window {
            history.pop_front();
        }
        average * weight + sample * (1.0 - weight)
    }

    pub fn coarse_pressure(&self, pos: IVec2) -> f64 {
        self.pressure[self.layout.index(pos)]
    }

    pub fn pressure_at(&self, terrain_pos: IVec2) -> f64 {
        self.coarse_pressure(self.layout.from_terrain(terrain_pos))
    }

    pub fn coarse_velocity(&self, pos: IVec2) -> Vec2 {
        self.velocity[self.layout.index(pos)]
    }

    /// Smoothed wind velocity over a terrain position
    pub fn velocity_at(&self, terrain_pos: IVec2) -> Vec2 {
        self.coarse_velocity(self.layout.from_terrain(terrain_pos))
    }

    pub fn is_blocked(&self, pos: IVec2) -> bool {
        self.coarse_pressure(pos) < 0.0
    }

    pub fn blocked_count(&self) -> usize {
        self.pressure.iter().filter(|p| **p < 0.0).count()
    }

    /// Sum over open cells
    pub fn total_pressure(&self) -> f64 {
        self.pressure.iter().filter(|p| **p >= 0.0).sum()
    }

    /// Overwrite an open cell's pressure; blocked cells stay blocked
    pub fn set_coarse_pressure(&mut self, pos: IVec2, pressure: f64) {
        let idx = self.layout.index(pos);
        if self.pressure[idx] >= 0.0 {
            self.pressure[idx] = pressure.max(0.0);
        }
    }

    fn impulse(&self) -> f64 {
        self.config.base_pressure * self.config.impulse_fraction
    }

    fn shift_pressure_around(&mut self, terrain_pos: IVec2, amount: f64) {
        let pos = self.layout.from_terrain(terrain_pos);
        let mut targets = vec![pos];
        targets.extend(self.layout.direct(pos));
        for target in targets {
            let idx = self.layout.index(target);
            if self.pressure[idx] >= 0.0 {
                self.pressure[idx] = (self.pressure[idx] + amount).max(0.0);
            }
        }
    }

    /// Raise pressure at a terrain position and its four direct coarse neighbors
    pub fn add_pressure(&mut self, terrain_pos: IVec2) {
        self.shift_pressure_around(terrain_pos, self.impulse());
    }

    /// Lower pressure at a terrain position and its four direct coarse neighbors, floored at zero
    pub fn remove_pressure(&mut self, terrain_pos: IVec2) {
        self.shift_pressure_around(terrain_pos, -self.impulse());
    }

    /// Attach a gust function to the coarse cell under a terrain position.
    ///
    /// A new function is generated only when the previous one is older than
    /// the gust interval; otherwise the latest one is reused. The timestamp
    /// refreshes on every call.
    pub fn add_gust<R: Rng + ?Sized>(&mut self, terrain_pos: IVec2, now_ms: f64, rng: &mut R) {
        if self.gusts.is_empty() || now_ms - self.last_gust_added_ms > self.config.gust_interval_ms {
            self.gusts.push(GustFunction::random(&self.config, rng));
            debug!("[WIND] New gust function #{}", self.gusts.len());
        }
        self.last_gust_added_ms = now_ms;
        let idx = self.layout.index(self.layout.from_terrain(terrain_pos));
        self.gust_slots[idx] = Some(self.gusts.len() - 1);
    }

    pub fn clear_gust(&mut self, terrain_pos: IVec2) {
        let idx = self.layout.index(self.layout.from_terrain(terrain_pos));
        self.gust_slots[idx] = None;
    }

    /// Gust function driving the coarse cell under a terrain position
    pub fn gust_at(&self, terrain_pos: IVec2) -> Option<GustFunction> {
        let idx = self.layout.index(self.layout.from_terrain(terrain_pos));
        self.gust_slots[idx].and_then(|slot| self.gusts.get(slot).copied())
    }

    pub fn gust_count(&self) -> usize {
        self.gust_slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Scale an open coarse cell's pressure
    pub fn multiply_pressure(&mut self, pos: IVec2, factor: f64) {
        let idx = self.layout.index(pos);
        if self.pressure[idx] >= 0.0 {
            self.pressure[idx] = (self.pressure[idx] * factor).max(0.0);
        }
    }
}

/// `left - right` when the gradients disagree in sign, otherwise no flow
fn opposing_gradient(a: f64, b: f64) -> f64 {
    if a * b <= 0.0 {
        a - b
    } else {
        0.0
    }
}

fn speed_from_gradient(net: f64, density: f64) -> f64 {
    if net == 0.0 || density <= 0.0 {
        return 0.0;
    }
    net.signum() * (2.0 * net.abs() / density).sqrt()
}
