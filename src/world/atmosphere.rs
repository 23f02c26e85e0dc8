//! Coarse temperature and water-saturation fields.
//!
//! Both grids sit at a quarter of the terrain resolution and wrap at the
//! edges. Each tick runs an order-dependent pairwise diffusion over the
//! direct and diagonal neighbors, then rolls for condensation ("rain"),
//! which drops water cells into the terrain.

use glam::IVec2;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::world::cell::TerrainCell;
use crate::world::grid::{CoarseLayout, TerrainGrid, COARSE_FACTOR};

/// Tunable constants of the atmosphere model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AtmosphereConfig {
    /// Kelvin
    pub start_temperature: f64,
    pub temperature_divisor: f64,
    pub saturation_divisor: f64,
    /// Relative humidity treated as a full cloud
    pub cloud_max_humidity: f64,
    /// Multiple of `cloud_max_humidity` a cell must exceed before it can rain
    pub cloud_rain_threshold: f64,
    /// Multiple of `cloud_max_humidity` at which rain probability saturates
    pub cloud_rain_max: f64,
    /// Water pressure that condenses into one water cell
    pub pascals_per_water_square: f64,
    /// Weight of neighbor saturation in the aggregate water check
    pub neighbor_water_weight: f64,
    /// Second Bernoulli gate applied after the humidity-scaled draw
    pub rain_chance: f64,
    /// Water carried by a freshly condensed water cell
    pub rain_drop_water: f32,
    /// Saturation added per water impulse, as a fraction of saturation pressure
    pub water_impulse_fraction: f64,
    /// Pivot used by the negative temperature impulse
    pub cooling_pivot: f64,
}

impl Default for AtmosphereConfig {
    fn default() -> Self {
        Self {
            start_temperature: 273.0 + 20.0,
            temperature_divisor: 8.0,
            saturation_divisor: 2.0,
            cloud_max_humidity: 4.0,
            cloud_rain_threshold: 2.0,
            cloud_rain_max: 8.0,
            pascals_per_water_square: 1e11,
            neighbor_water_weight: 0.8,
            rain_chance: 0.01,
            rain_drop_water: 0.05,
            water_impulse_fraction: 0.10,
            cooling_pivot: 200.0,
        }
    }
}

/// Temperature-dependent maximum water-vapor pressure (Pa), `t` in Kelvin
pub fn saturation_pressure_of_water_vapor(t: f64) -> f64 {
    (77.345 + 0.057 * t - 7235.0 / t).exp() / t.powf(8.2)
}

#[derive(Debug, Clone)]
pub struct AtmosphereField {
    layout: CoarseLayout,
    temperature: Vec<f64>,
    water_saturation: Vec<f64>,
    config: AtmosphereConfig,
}

impl AtmosphereField {
    pub fn new(terrain_width: i32, terrain_height: i32, config: AtmosphereConfig) -> Self {
        let layout = CoarseLayout::for_terrain(terrain_width, terrain_height);
        let mut field = Self {
            layout,
            temperature: Vec::new(),
            water_saturation: Vec::new(),
            config,
        };
        field.init();
        field
    }

    /// Reset both grids to the uniform starting state
    pub fn init(&mut self) {
        let start_temperature = self.config.start_temperature;
        let start_saturation = saturation_pressure_of_water_vapor(start_temperature)
            * self.config.cloud_max_humidity
            * self.config.cloud_rain_threshold;
        self.temperature = vec![start_temperature; self.layout.len()];
        self.water_saturation = vec![start_saturation; self.layout.len()];
    }

    pub fn layout(&self) -> CoarseLayout {
        self.layout
    }

    pub fn config(&self) -> &AtmosphereConfig {
        &self.config
    }

    /// Diffuse both fields, then roll for rain. Returns the number of water
    /// cells condensed into the terrain.
    pub fn tick<R: Rng + ?Sized>(&mut self, terrain: &mut TerrainGrid, rng: &mut R) -> usize {
        self.diffuse();
        self.do_rain(terrain, rng)
    }

    /// One diffusion pass over each field, without rain
    pub fn diffuse(&mut self) {
        diffuse_pass(&self.layout, &mut self.temperature, self.config.temperature_divisor);
        diffuse_pass(&self.layout, &mut self.water_saturation, self.config.saturation_divisor);
    }

    fn rain_humidity_threshold(&self) -> f64 {
        self.config.cloud_max_humidity * 5.0 * self.config.cloud_rain_threshold
    }

    /// Condensation pass.
    ///
    /// Random draws are only consumed for cells that pass the humidity and
    /// water gates, so a dry field never rains whatever the generator returns.
    pub fn do_rain<R: Rng + ?Sized>(&mut self, terrain: &mut TerrainGrid, rng: &mut R) -> usize {
        let humidity_gate = self.rain_humidity_threshold();
        let humidity_ceiling = self.config.cloud_max_humidity * 5.0 * self.config.cloud_rain_max;
        let used_per_square = self.config.pascals_per_water_square / 5.0;
        let mut drops = 0;

        for pos in self.layout.positions() {
            let neighbors = self.layout.direct(pos);
            let aggregate_humidity = self.coarse_humidity(pos)
                + neighbors.iter().map(|n| self.coarse_humidity(*n)).sum::<f64>();
            let aggregate_water = self.water_saturation[self.layout.index(pos)]
                + neighbors
                    .iter()
                    .map(|n| self.water_saturation[self.layout.index(*n)])
                    .sum::<f64>()
                    * self.config.neighbor_water_weight;

            if aggregate_humidity <= humidity_gate
                || aggregate_water <= self.config.pascals_per_water_square
            {
                continue;
            }

            let probability = aggregate_humidity / humidity_ceiling;
            if !(rng.gen::<f64>() < probability && rng.gen::<f64>() < self.config.rain_chance) {
                continue;
            }

            let offset = IVec2::new(rng.gen_range(0..COARSE_FACTOR), rng.gen_range(0..COARSE_FACTOR));
            let drop_pos = drop_position(terrain, pos, offset);
            let drop = TerrainCell::water(drop_pos, self.config.rain_drop_water);
            if terrain.insert(drop).is_none() {
                continue;
            }

            drops += 1;
            self.debit_saturation(pos, used_per_square);
            for n in neighbors {
                self.debit_saturation(n, used_per_square);
            }
        }

        if drops > 0 {
            debug!("[ATMOSPHERE] Condensed {} water cells", drops);
        }
        drops
    }

    fn debit_saturation(&mut self, pos: IVec2, amount: f64) {
        let idx = self.layout.index(pos);
        self.water_saturation[idx] = (self.water_saturation[idx] - amount).max(0.0);
    }

    /// Relative humidity of a coarse cell
    pub fn coarse_humidity(&self, pos: IVec2) -> f64 {
        let idx = self.layout.index(pos);
        let capacity = saturation_pressure_of_water_vapor(self.temperature[idx]);
        if !capacity.is_finite() || capacity <= 0.0 {
            return 0.0;
        }
        self.water_saturation[idx] / capacity
    }

    pub fn coarse_temperature(&self, pos: IVec2) -> f64 {
        self.temperature[self.layout.index(pos)]
    }

    pub fn coarse_water_saturation(&self, pos: IVec2) -> f64 {
        self.water_saturation[self.layout.index(pos)]
    }

    /// Overwrite a coarse cell's temperature (heat advection by the wind field)
    pub fn update_temperature_at(&mut self, pos: IVec2, temperature: f64) {
        let idx = self.layout.index(pos);
        self.temperature[idx] = temperature.max(0.0);
    }

    /// Overwrite a coarse cell's water saturation
    pub fn set_water_saturation_at(&mut self, pos: IVec2, saturation: f64) {
        let idx = self.layout.index(pos);
        self.water_saturation[idx] = saturation.max(0.0);
    }

    pub fn humidity_at(&self, terrain_pos: IVec2) -> f64 {
        self.coarse_humidity(self.layout.from_terrain(terrain_pos))
    }

    pub fn temperature_at(&self, terrain_pos: IVec2) -> f64 {
        self.coarse_temperature(self.layout.from_terrain(terrain_pos))
    }

    pub fn water_saturation_at(&self, terrain_pos: IVec2) -> f64 {
        self.coarse_water_saturation(self.layout.from_terrain(terrain_pos))
    }

    /// Temperature impulse at a terrain position and its four direct coarse neighbors.
    ///
    /// Warming adds one degree per call regardless of `delta`; cooling pulls
    /// the temperature toward the cooling pivot by a ratio of `delta`. A zero
    /// delta is ignored.
    pub fn add_temperature(&mut self, terrain_pos: IVec2, delta: f64) {
        let pos = self.layout.from_terrain(terrain_pos);
        self.apply_temperature_impulse(pos, delta);
        for n in self.layout.direct(pos) {
            self.apply_temperature_impulse(n, delta);
        }
    }

    fn apply_temperature_impulse(&mut self, pos: IVec2, delta: f64) {
        let idx = self.layout.index(pos);
        let current = self.temperature[idx];
        let updated = if delta > 0.0 {
            current + 1.0
        } else if delta < 0.0 {
            let side = -1.0;
            (current * (delta - side) + side * self.config.cooling_pivot) / delta
        } else {
            return;
        };
        self.temperature[idx] = if updated.is_finite() { updated.max(0.0) } else { current };
    }

    /// Humidify a terrain position and its four direct coarse neighbors
    pub fn add_water_saturation(&mut self, terrain_pos: IVec2) {
        let pos = self.layout.from_terrain(terrain_pos);
        self.apply_water_impulse(pos);
        for n in self.layout.direct(pos) {
            self.apply_water_impulse(n);
        }
    }

    fn apply_water_impulse(&mut self, pos: IVec2) {
        let idx = self.layout.index(pos);
        let capacity = saturation_pressure_of_water_vapor(self.temperature[idx]);
        if capacity.is_finite() {
            self.water_saturation[idx] += self.config.water_impulse_fraction * capacity;
        }
    }

    /// Set a coarse cell's saturation to a multiple of its saturation pressure
    pub fn set_humidity_multiple(&mut self, pos: IVec2, multiple: f64) {
        let idx = self.layout.index(pos);
        let capacity = saturation_pressure_of_water_vapor(self.temperature[idx]);
        if capacity.is_finite() {
            self.water_saturation[idx] = (capacity * multiple).max(0.0);
        }
    }

    pub fn total_temperature(&self) -> f64 {
        self.temperature.iter().sum()
    }

    pub fn total_water_saturation(&self) -> f64 {
        self.water_saturation.iter().sum()
    }

    pub fn mean_temperature(&self) -> f64 {
        self.total_temperature() / self.temperature.len().max(1) as f64
    }
}

/// Order-dependent one-directional diffusion.
///
/// Cells are visited row-major; each pushes `(self - neighbor) / divisor`
/// toward every lower direct, then diagonal, neighbor. Transfers apply
/// immediately so later comparisons see updated values.
pub fn diffuse_pass(layout: &CoarseLayout, values: &mut [f64], divisor: f64) {
    for pos in layout.positions() {
        let idx = layout.index(pos);
        let mut own = values[idx];
        for n in layout.direct(pos).into_iter().chain(layout.diagonal(pos)) {
            let n_idx = layout.index(n);
            if n_idx == idx {
                continue;
            }
            let other = values[n_idx];
            if other >= own {
                continue;
            }
            let diff = (own - other) / divisor;
            values[idx] -= diff;
            values[n_idx] += diff;
            own = values[idx];
        }
    }
}

/// Terrain position for a drop at `offset` inside a coarse cell. Clamped so a
/// partial coarse cell on the far edge never wraps its drops to the other side.
fn drop_position(terrain: &TerrainGrid, coarse: IVec2, offset: IVec2) -> IVec2 {
    let pos = coarse * COARSE_FACTOR + offset;
    IVec2::new(
        pos.x.min(terrain.width() - 1),
        pos.y.min(terrain.height() - 1),
    )
}
