use std::time::Duration;

use rand::Rng;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use parasite_sim::config::SimConfig;
use parasite_sim::game::constants::physics::{TICK_DURATION_MS, TICK_RATE};
use parasite_sim::game::entity::EntityKind;
use parasite_sim::game::events::{Event, EventKind};
use parasite_sim::game::input_buffer::{InputBuffer, InputBufferError, InputCommand};
use parasite_sim::game::simulation::Simulation;
use parasite_sim::game::state::EndReason;
#[cfg(feature = "persistence")]
use parasite_sim::persistence::JsonFileStore;
#[cfg(not(feature = "persistence"))]
use parasite_sim::persistence::MemoryStore;
use parasite_sim::persistence::{load_or_default, PersistenceBackend};
use parasite_sim::util::vec2::Vec2;

/// Radius range of spawned hostile cells
const CELL_RADIUS: (f32, f32) = (10.0, 28.0);
/// Health of spawned hostile cells
const CELL_HEALTH: f32 = 40.0;
const NUTRIENT_RADIUS: f32 = 6.0;
/// Seconds between wander targets of the demo input driver
const WANDER_INTERVAL: Duration = Duration::from_secs(2);
/// Ticks between progress log lines
const REPORT_EVERY_TICKS: u64 = TICK_RATE as u64 * 5;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("Parasite Simulation v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = SimConfig::load_or_default();
    info!(
        "Configuration loaded: arena {}x{}, cell size {}",
        config.world_width, config.world_height, config.spatial_cell_size
    );

    let backend = create_backend();
    let persistent = load_or_default(backend.as_ref());

    let mut sim = Simulation::new(config, persistent)?.with_backend(backend);
    subscribe_log_handlers(&sim);

    let cells: usize = env_or("SIM_CELLS", 40);
    let nutrients: usize = env_or("SIM_NUTRIENTS", 80);
    sim.start_run()?;
    populate(&mut sim, cells, nutrients);

    // Demo input driver on its own thread
    let input = InputBuffer::default();
    let sender = input.sender();
    let (width, height) = (sim.bounds().width, sim.bounds().height);
    std::thread::spawn(move || {
        let mut rng = rand::thread_rng();
        loop {
            let target = Vec2::new(rng.gen_range(0.0..width), rng.gen_range(0.0..height));
            match sender.try_send(InputCommand::SteerToward(target)) {
                Ok(()) | Err(InputBufferError::Full) => {}
                Err(InputBufferError::Disconnected) => break,
            }
            std::thread::sleep(WANDER_INTERVAL);
        }
    });

    let run_limit = async {
        match std::env::var("SIM_RUN_SECONDS").ok().and_then(|s| s.parse::<u64>().ok()) {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(run_limit);

    let mut interval = tokio::time::interval(Duration::from_secs_f32(TICK_DURATION_MS / 1000.0));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    info!("Simulation running at {} Hz", TICK_RATE);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                sim.drain_input(&input);
                let report = sim.tick(TICK_DURATION_MS);

                if report.parasite_died {
                    info!("Parasite died, starting a new run");
                    if let Err(e) = sim.start_run() {
                        error!("Failed to start a new run: {}", e);
                        break;
                    }
                }
                replenish_nutrients(&mut sim, nutrients);

                if sim.tick_count() % REPORT_EVERY_TICKS == 0 {
                    let run = sim.state().run();
                    info!(
                        level = run.level,
                        biomass = run.total_biomass,
                        cells_cleared = run.cells_cleared,
                        alive = sim.alive_count(),
                        "Progress"
                    );
                }
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!("Failed to listen for Ctrl+C: {}", e);
                }
                info!("Shutdown signal received");
                break;
            }
            _ = &mut run_limit => {
                info!("Run time limit reached");
                break;
            }
        }
    }

    // Persist progress of the unfinished run
    if sim.state().is_run_active() {
        sim.end_run(EndReason::Shutdown);
    }
    info!("Simulation stopped");

    Ok(())
}

#[cfg(feature = "persistence")]
fn create_backend() -> Box<dyn PersistenceBackend> {
    let path: String = env_or("SIM_SAVE_PATH", "parasite_save.json".to_string());
    info!("Persistent progress at {}", path);
    Box::new(JsonFileStore::new(path))
}

#[cfg(not(feature = "persistence"))]
fn create_backend() -> Box<dyn PersistenceBackend> {
    info!("Persistence disabled, progress kept in memory");
    Box::new(MemoryStore::new())
}

/// Log the events a presentation layer would react to
fn subscribe_log_handlers(sim: &Simulation) {
    let bus = sim.bus();
    bus.subscribe(EventKind::LevelUp, |event| {
        if let Event::LevelUp { level } = event {
            info!(level, "Level up");
        }
    });
    bus.subscribe(EventKind::GameOver, |event| {
        if let Event::GameOver {
            reason,
            level,
            currency_earned,
        } = event
        {
            info!(?reason, level, currency_earned, "Game over");
        }
    });
    bus.subscribe(EventKind::WallHit, |event| {
        if let Event::WallHit { entity, speed, .. } = event {
            debug!(entity, speed, "Wall hit");
        }
    });
}

fn populate(sim: &mut Simulation, cells: usize, nutrients: usize) {
    let mut rng = rand::thread_rng();
    let (width, height) = (sim.bounds().width, sim.bounds().height);

    for _ in 0..cells {
        let position = Vec2::new(rng.gen_range(0.0..width), rng.gen_range(0.0..height));
        let radius = rng.gen_range(CELL_RADIUS.0..CELL_RADIUS.1);
        let Ok(id) = sim.spawn(EntityKind::Cell, position, radius, CELL_HEALTH) else {
            continue;
        };
        if let Some(cell) = sim.entity_mut(id) {
            cell.velocity = Vec2::from_angle(rng.gen_range(0.0..std::f32::consts::TAU)) * 60.0;
        }
    }
    for _ in 0..nutrients {
        let position = Vec2::new(rng.gen_range(0.0..width), rng.gen_range(0.0..height));
        // Refusals are logged by the simulation
        let _ = sim.spawn(EntityKind::Nutrient, position, NUTRIENT_RADIUS, 0.0);
    }
}

fn replenish_nutrients(sim: &mut Simulation, target: usize) {
    let alive = sim
        .entities()
        .filter(|e| e.kind == EntityKind::Nutrient)
        .count();
    if alive < target {
        populate(sim, 0, target - alive);
    }
}
