use std::time::Duration;

use bevy::app::{AppExit, ScheduleRunnerPlugin};
use bevy::prelude::*;
use terrarium::organisms::OrganismPlugin;
use terrarium::world::{SimulationSet, WorldPlugin};
use terrarium::{Simulation, SimulationConfig};
use tracing_subscriber::EnvFilter;

fn main() {
    // Initialize tracing subscriber for better error visibility
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Optional JSON config path as the only argument
    let config = match std::env::args().nth(1) {
        Some(path) => SimulationConfig::load(&path),
        None => Ok(SimulationConfig::default()),
    };
    let sim = match config.and_then(Simulation::new) {
        Ok(sim) => sim,
        Err(err) => {
            error!("Failed to start simulation: {err}");
            std::process::exit(1);
        }
    };
    let frame = Duration::from_secs_f64(sim.config().tick_ms / 1000.0);

    info!("Terrarium initialized ({}x{}, seed {})", sim.config().width, sim.config().height, sim.config().seed);

    App::new()
        .add_plugins(MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(frame)))
        .insert_resource(sim)
        .add_plugins((WorldPlugin, OrganismPlugin))
        .add_systems(Update, exit_after_max_ticks.after(SimulationSet::Stats))
        .run();
}

fn exit_after_max_ticks(sim: Res<Simulation>, mut exit: EventWriter<AppExit>) {
    let max_ticks = sim.config().max_ticks;
    if max_ticks > 0 && sim.clock.ticks() >= max_ticks {
        info!("Reached {} ticks, shutting down", max_ticks);
        sim.stats.log_summary(sim.clock.ticks());
        exit.send(AppExit);
    }
}
