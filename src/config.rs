use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::organisms::{LifeCycleTuning, OrganismTuning};
use crate::world::{AtmosphereConfig, TerrainConfig, WindConfig, COARSE_FACTOR};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("world size {width}x{height} must be non-zero multiples of 4")]
    Dimensions { width: u32, height: u32 },
    #[error("{field} must be {requirement}, got {value}")]
    OutOfRange {
        field: &'static str,
        requirement: &'static str,
        value: f64,
    },
    #[error("unknown preset `{0}` (expected balanced, lush or harsh)")]
    UnknownPreset(String),
}

/// Everything needed to build a [`Simulation`](crate::Simulation)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    /// Terrain cells
    pub width: u32,
    pub height: u32,
    /// Seeds terrain generation, the simulation RNG and the initial scatter
    pub seed: u64,
    /// Simulation milliseconds per tick when driven by the bevy app
    pub tick_ms: f64,
    /// The demo binary exits after this many ticks; 0 runs forever
    pub max_ticks: u64,
    /// Recompute population stats every N ticks
    pub stats_interval: u64,
    /// Log a stats summary every N ticks
    pub log_interval: u64,
    pub regenerate_terrain: bool,
    pub terrain: TerrainConfig,
    pub atmosphere: AtmosphereConfig,
    pub wind: WindConfig,
    pub organisms: OrganismTuning,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            width: 128,
            height: 96,
            seed: 42,
            tick_ms: 50.0,
            max_ticks: 0,
            stats_interval: 100,
            log_interval: 500,
            regenerate_terrain: true,
            terrain: TerrainConfig::default(),
            atmosphere: AtmosphereConfig::default(),
            wind: WindConfig::default(),
            organisms: OrganismTuning::default(),
        }
    }
}

fn require(field: &'static str, requirement: &'static str, value: f64, ok: bool) -> Result<(), ConfigError> {
    if ok && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            requirement,
            value,
        })
    }
}

/// Field names are `[max_lifetime_ms, throttle_interval_ms, reproduction_energy]`
fn validate_lifecycle(fields: [&'static str; 3], tuning: &LifeCycleTuning) -> Result<(), ConfigError> {
    require(
        fields[0],
        "positive",
        tuning.max_lifetime_ms,
        tuning.max_lifetime_ms > 0.0,
    )?;
    require(
        fields[1],
        "positive",
        tuning.throttle_interval_ms,
        tuning.throttle_interval_ms > 0.0,
    )?;
    require(
        fields[2],
        "positive",
        tuning.reproduction_energy as f64,
        tuning.reproduction_energy > 0.0,
    )
}

impl SimulationConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: SimulationConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Default config with a named organism preset
    pub fn with_preset(name: &str) -> Result<Self, ConfigError> {
        let organisms = match name {
            "balanced" => OrganismTuning::balanced(),
            "lush" => OrganismTuning::lush(),
            "harsh" => OrganismTuning::harsh(),
            other => return Err(ConfigError::UnknownPreset(other.to_string())),
        };
        Ok(Self {
            organisms,
            ..Self::default()
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let factor = COARSE_FACTOR as u32;
        if self.width == 0
            || self.height == 0
            || self.width % factor != 0
            || self.height % factor != 0
        {
            return Err(ConfigError::Dimensions {
                width: self.width,
                height: self.height,
            });
        }
        require("tick_ms", "positive", self.tick_ms, self.tick_ms > 0.0)?;

        let atmosphere = &self.atmosphere;
        require(
            "atmosphere.temperature_divisor",
            "at least 1",
            atmosphere.temperature_divisor,
            atmosphere.temperature_divisor >= 1.0,
        )?;
        require(
            "atmosphere.saturation_divisor",
            "at least 1",
            atmosphere.saturation_divisor,
            atmosphere.saturation_divisor >= 1.0,
        )?;
        require(
            "atmosphere.start_temperature",
            "positive",
            atmosphere.start_temperature,
            atmosphere.start_temperature > 0.0,
        )?;
        require(
            "atmosphere.rain_chance",
            "within [0, 1]",
            atmosphere.rain_chance,
            (0.0..=1.0).contains(&atmosphere.rain_chance),
        )?;

        let wind = &self.wind;
        require(
            "wind.flow_strength",
            "within (0, 1]",
            wind.flow_strength,
            wind.flow_strength > 0.0 && wind.flow_strength <= 1.0,
        )?;
        require(
            "wind.base_pressure",
            "positive",
            wind.base_pressure,
            wind.base_pressure > 0.0,
        )?;
        require(
            "wind.gust_period_max",
            "greater than gust_period_min",
            wind.gust_period_max,
            wind.gust_period_max > wind.gust_period_min && wind.gust_period_min > 0.0,
        )?;
        require(
            "wind.gust_amplitude_max",
            "greater than gust_amplitude_min",
            wind.gust_amplitude_max,
            wind.gust_amplitude_max > wind.gust_amplitude_min,
        )?;

        let organisms = &self.organisms;
        validate_lifecycle(
            [
                "organisms.plant.max_lifetime_ms",
                "organisms.plant.throttle_interval_ms",
                "organisms.plant.reproduction_energy",
            ],
            &organisms.plant,
        )?;
        validate_lifecycle(
            [
                "organisms.cactus.max_lifetime_ms",
                "organisms.cactus.throttle_interval_ms",
                "organisms.cactus.reproduction_energy",
            ],
            &organisms.cactus,
        )?;
        validate_lifecycle(
            [
                "organisms.seed.max_lifetime_ms",
                "organisms.seed.throttle_interval_ms",
                "organisms.seed.reproduction_energy",
            ],
            &organisms.seed,
        )?;
        require(
            "stats_interval",
            "positive",
            self.stats_interval as f64,
            self.stats_interval > 0,
        )?;
        require(
            "log_interval",
            "positive",
            self.log_interval as f64,
            self.log_interval > 0,
        )?;
        for (field, fraction) in [
            ("organisms.uptake.air_uptake_fraction", organisms.uptake.air_uptake_fraction),
            ("organisms.uptake.water_uptake_fraction", organisms.uptake.water_uptake_fraction),
            ("organisms.uptake.root_uptake_fraction", organisms.uptake.root_uptake_fraction),
        ] {
            require(field, "within [0, 1]", fraction as f64, (0.0..=1.0).contains(&fraction))?;
        }
        Ok(())
    }
}
