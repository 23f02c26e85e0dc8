//! Terrarium: a toroidal terrain world with a coarse atmosphere, a pressure
//! driven wind field and rooted plant life cycles.

pub mod config;
pub mod organisms;
pub mod simulation;
pub mod world;

pub use config::{ConfigError, SimulationConfig};
pub use simulation::{SimClock, Simulation};
