//! Formations, wave conditions, levels and campaigns

use crate::config::{ConfigError, FromTemplate, TemplateView, Value};

use super::behavior::{FireBehaviorSpec, MoveBehaviorSpec};
use super::items::ShipSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormationLayout {
    Grid { rows: usize, columns: usize },
    /// Single row holding every ship
    Line,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormationSpec {
    pub key: Option<String>,
    pub layout: FormationLayout,
    /// Ship blueprints and how many of each
    pub ships: Vec<(ShipSpec, usize)>,
    /// Formation extent as proportions of the screen size
    pub width: f32,
    pub height: f32,
    /// Replaces the default fly-on-screen-then-release movement
    pub move_behavior: Option<MoveBehaviorSpec>,
    /// Applied to every member
    pub fire_behavior: Option<FireBehaviorSpec>,
    /// Proportional x of the anchor
    pub center_x: f32,
    /// Proportional y where the anchor stops; defaults to half the formation height
    pub dest_y: Option<f32>,
}

impl FormationSpec {
    pub fn num_ships(&self) -> usize {
        self.ships.iter().map(|(_, count)| count).sum()
    }
}

fn ship_entry(view: &TemplateView<'_>, value: &Value) -> Result<(ShipSpec, usize), ConfigError> {
    let (ship, count) = match value.as_list() {
        Some([ship, count]) => {
            let count = count
                .as_i64()
                .and_then(|c| usize::try_from(c).ok())
                .ok_or_else(|| view.error("ships", "counts must be non-negative integers"))?;
            (ship, count)
        }
        Some(_) => return Err(view.error("ships", "expected [ship, count] pairs")),
        None => (value, 1),
    };
    let ship = view.nested("ships", ship, "Ship")?.build()?;
    Ok((ship, count))
}

impl FromTemplate for FormationSpec {
    fn from_template(view: &TemplateView<'_>) -> Result<Self, ConfigError> {
        let ships = view
            .list("ships")?
            .iter()
            .map(|v| ship_entry(view, v))
            .collect::<Result<Vec<_>, _>>()?;
        let total: usize = ships.iter().map(|(_, c)| c).sum();
        if total == 0 {
            return Err(view.error("ships", "a formation needs at least one ship"));
        }

        let layout = if view.is_a("Grid") {
            let (rows, columns) = (view.usize("rows")?, view.usize("columns")?);
            if total > rows * columns {
                return Err(view.error(
                    "ships",
                    format!("grid has {total} ships and only {} slots", rows * columns),
                ));
            }
            FormationLayout::Grid { rows, columns }
        } else if view.is_a("Line") {
            FormationLayout::Line
        } else {
            return Err(view.error("<class>", "formations are Grid or Line"));
        };

        Ok(Self {
            key: view.key().map(str::to_string),
            layout,
            ships,
            width: view.f32("width")?,
            height: view.f32("height")?,
            move_behavior: view
                .opt_template("move_behavior", "MoveBehavior")?
                .map(|v| v.build())
                .transpose()?,
            fire_behavior: view
                .opt_template("fire_behavior", "FireBehavior")?
                .map(|v| v.build())
                .transpose()?,
            center_x: view.f32_or("center_x", 0.5)?,
            dest_y: view.opt_f32("dest_y")?,
        })
    }
}

/// Predicate part of a wave condition
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConditionKind {
    /// Seconds since the last deployment
    Timer { time: f32 },
    /// Fraction of the last wave's ships still remaining
    PercentOfLastWave { percent: f32 },
    /// Fraction of every deployed ship still remaining
    PercentOfAllWaves { percent: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveConditionSpec {
    pub kind: ConditionKind,
    /// Seconds between triggering and readiness
    pub delay: f32,
}

impl FromTemplate for WaveConditionSpec {
    fn from_template(view: &TemplateView<'_>) -> Result<Self, ConfigError> {
        let percent = |view: &TemplateView<'_>| -> Result<f32, ConfigError> {
            let p = view.f32_or("percent", 0.0)?;
            if !(0.0..=1.0).contains(&p) {
                return Err(view.error("percent", "must be between 0 and 1"));
            }
            Ok(p)
        };
        let kind = if view.is_a("Timer") {
            ConditionKind::Timer {
                time: view.f32("time")?,
            }
        } else if view.is_a("PercentOfLastWave") {
            ConditionKind::PercentOfLastWave {
                percent: percent(view)?,
            }
        } else if view.is_a("PercentOfAllWaves") {
            ConditionKind::PercentOfAllWaves {
                percent: percent(view)?,
            }
        } else {
            return Err(view.error("<class>", "not a WaveCondition"));
        };
        Ok(Self {
            kind,
            delay: view.f32_or("delay", 0.0)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WaveSpec {
    pub condition: WaveConditionSpec,
    pub formations: Vec<FormationSpec>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LevelSpec {
    pub key: Option<String>,
    pub name: String,
    pub waves: Vec<WaveSpec>,
}

impl FromTemplate for LevelSpec {
    fn from_template(view: &TemplateView<'_>) -> Result<Self, ConfigError> {
        let mut waves = Vec::new();
        for wave in view.list("waves")? {
            let map = wave
                .as_map()
                .ok_or_else(|| view.error("waves", "each wave is {condition, formations}"))?;
            let condition = map
                .get("condition")
                .ok_or_else(|| view.error("waves", "wave without a condition"))?;
            let condition = view.nested("waves", condition, "WaveCondition")?.build()?;
            let formations = map
                .get("formations")
                .and_then(Value::as_list)
                .ok_or_else(|| view.error("waves", "wave without a formations list"))?
                .iter()
                .map(|f| view.nested("waves", f, "Formation").and_then(|v| v.build()))
                .collect::<Result<Vec<_>, _>>()?;
            waves.push(WaveSpec {
                condition,
                formations,
            });
        }
        Ok(Self {
            key: view.key().map(str::to_string),
            name: view.str("name")?.to_string(),
            waves,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CampaignSpec {
    pub key: Option<String>,
    pub name: String,
    pub levels: Vec<LevelSpec>,
}

impl FromTemplate for CampaignSpec {
    fn from_template(view: &TemplateView<'_>) -> Result<Self, ConfigError> {
        let levels = view
            .templates("levels", "Level")?
            .iter()
            .map(|v| v.build())
            .collect::<Result<Vec<_>, _>>()?;
        if levels.is_empty() {
            return Err(view.error("levels", "a campaign needs at least one level"));
        }
        Ok(Self {
            key: view.key().map(str::to_string),
            name: view.str("name")?.to_string(),
            levels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Registry;

    const LEVEL: &str = r#"
Projectile[Pellet]: {speed: 300}
Weapon[Popgun]:
  rate_of_fire: 1
  projectile: Projectile[Pellet]
EnemyShip[Drone]:
  acceleration: 100
  max_speed: 50
  weapons: [Weapon(Popgun)]
  move_behavior: Idle[]
Grid[Block]:
  ships: [[EnemyShip(Drone), 5]]
  rows: 2
  columns: 3
  width: 0.5
  height: 0.2
Level[First]:
  name: First Contact
  waves:
    - condition:
        Timer[]: {time: 0}
      formations: [Grid(Block)]
    - condition: LastWaveDefeated[]
      formations: [Grid(Block)]
"#;

    fn level_registry() -> Registry {
        let mut registry = Registry::new();
        registry.load_str(LEVEL, "level").unwrap();
        registry.check_for_undefined_objects().unwrap();
        registry
    }

    #[test]
    fn test_formation_blueprint() {
        let grid: FormationSpec = level_registry().build_key("Grid", "Block").unwrap();
        assert_eq!(grid.num_ships(), 5);
        assert_eq!(grid.layout, FormationLayout::Grid { rows: 2, columns: 3 });
        assert_eq!(grid.center_x, 0.5);
    }

    #[test]
    fn test_level_waves() {
        let level: LevelSpec = level_registry().build_key("Level", "First").unwrap();
        assert_eq!(level.name, "First Contact");
        assert_eq!(level.waves.len(), 2);
        assert_eq!(level.waves[0].condition.kind, ConditionKind::Timer { time: 0.0 });
        assert_eq!(
            level.waves[1].condition.kind,
            ConditionKind::PercentOfLastWave { percent: 0.0 }
        );
    }

    #[test]
    fn test_grid_overflow_rejected() {
        let mut registry = level_registry();
        registry
            .load_str(
                "Grid[Crowded]:\n  ships: [[EnemyShip(Drone), 7]]\n  rows: 2\n  columns: 3\n  width: 0.5\n  height: 0.2\n",
                "crowded",
            )
            .unwrap();
        registry.check_for_undefined_objects().unwrap();
        assert!(registry.build_key::<FormationSpec>("Grid", "Crowded").is_err());
    }
}
