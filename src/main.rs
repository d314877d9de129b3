//! Astro Sim headless runner
//!
//! Loads a config tree, flies the player ship through a campaign with a
//! simple autopilot and logs what happens. Useful for balancing levels
//! without a renderer.
//!
//! Usage: `astro-sim [CONFIG_DIR] [CAMPAIGN] [SECONDS]`

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::error::Error;
    use std::path::PathBuf;

    use astro_sim::blueprint::{CampaignSpec, ShipSpec};
    use astro_sim::sim::{Campaign, DestroyCause, PlayerIntent, SimEvent, TickInput, tick};
    use astro_sim::{Registry, SimSettings, World};

    const DEFAULT_CONFIG_DIR: &str = "assets/config";
    const DEFAULT_SECONDS: f64 = 120.0;

    struct Args {
        config_dir: PathBuf,
        campaign: Option<String>,
        seconds: f64,
    }

    fn parse_args() -> Result<Args, Box<dyn Error>> {
        let mut args = std::env::args().skip(1);
        let config_dir = args.next().map_or_else(|| PathBuf::from(DEFAULT_CONFIG_DIR), PathBuf::from);
        let campaign = args.next();
        let seconds = match args.next() {
            Some(s) => s.parse().map_err(|e| format!("bad duration {s:?}: {e}"))?,
            None => DEFAULT_SECONDS,
        };
        Ok(Args {
            config_dir,
            campaign,
            seconds,
        })
    }

    /// First defined key of a class
    fn first_key(registry: &Registry, class: &str) -> Result<String, Box<dyn Error>> {
        registry
            .keys_of(class)
            .into_iter()
            .next()
            .map(|(_, key)| key)
            .ok_or_else(|| format!("config defines no {class}").into())
    }

    /// Sweep left and right while holding the trigger
    fn autopilot(frame: u64) -> TickInput {
        let mut intents = Vec::new();
        if frame == 0 {
            intents.extend([PlayerIntent::StartFiring, PlayerIntent::AccelLeft]);
        }
        match frame % 240 {
            120 => intents.extend([PlayerIntent::AccelRight, PlayerIntent::AccelRight]),
            0 if frame > 0 => intents.extend([PlayerIntent::AccelLeft, PlayerIntent::AccelLeft]),
            _ => {}
        }
        TickInput { intents }
    }

    pub fn run() -> Result<(), Box<dyn Error>> {
        let args = parse_args()?;
        let settings = SimSettings::load(&args.config_dir.join("settings.json"))?;
        let mut registry = Registry::new();
        registry.load_dir(&args.config_dir)?;

        let campaign_key = match args.campaign {
            Some(key) => key,
            None => first_key(&registry, "Campaign")?,
        };
        let spec: CampaignSpec = registry.build_key("Campaign", &campaign_key)?;
        let mut campaign = Campaign::new(spec);
        let player: ShipSpec = registry.build_key("PlayerShip", &first_key(&registry, "PlayerShip")?)?;

        let dt = 1.0 / settings.max_fps;
        let mut world = World::new(settings);
        world.spawn_player(&player);
        if let Some(level) = campaign.current_level() {
            world.start_level(level.clone());
        }

        let frames = (args.seconds / dt as f64).ceil() as u64;
        let mut kills = 0usize;
        for frame in 0..frames {
            tick(&mut world, &autopilot(frame), dt);
            for event in world.drain_events() {
                match event {
                    SimEvent::EntityDestroyed {
                        kind,
                        key,
                        cause: DestroyCause::Killed,
                        ..
                    } if kind.is_ship() => {
                        kills += 1;
                        log::debug!("{} destroyed", key.as_deref().unwrap_or("ship"));
                    }
                    SimEvent::LevelComplete { name } => {
                        log::info!("Cleared {name} at {:.1}s", world.now());
                        campaign.won_level();
                        if let Some(next) = campaign.current_level() {
                            world.start_level(next.clone());
                        }
                    }
                    _ => {}
                }
            }
            if world.player().is_none() {
                log::info!("Player lost at {:.1}s", world.now());
                break;
            }
            if campaign.is_complete() {
                break;
            }
        }
        log::info!(
            "{}: {} levels cleared, {kills} ships destroyed, {:.1}s simulated",
            campaign.name(),
            campaign.level_index(),
            world.now()
        );
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(e) = native::run() {
        log::error!("{e}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The library is embedded by a host page; there is nothing to run here
}
