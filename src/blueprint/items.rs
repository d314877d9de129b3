//! Ships and the things they carry: projectiles, weapons, shields

use crate::config::{ConfigError, FromTemplate, TemplateView};

use super::behavior::{EffectSpec, FireBehaviorSpec, MoveBehaviorSpec};
use super::shape::ShapeSpec;

fn elasticity(view: &TemplateView<'_>, default: f32) -> Result<f32, ConfigError> {
    let e = view.f32_or("elasticity", default)?;
    if !(0.0..=1.0).contains(&e) {
        return Err(view.error("elasticity", "must be between 0 and 1"));
    }
    Ok(e)
}

fn positive(view: &TemplateView<'_>, field: &str) -> Result<f32, ConfigError> {
    let x = view.f32(field)?;
    if x <= 0.0 {
        return Err(view.error(field, "must be positive"));
    }
    Ok(x)
}

fn non_negative(view: &TemplateView<'_>, field: &str, default: f32) -> Result<f32, ConfigError> {
    let x = view.f32_or(field, default)?;
    if x < 0.0 {
        return Err(view.error(field, "must not be negative"));
    }
    Ok(x)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectileSpec {
    pub key: Option<String>,
    pub shape: ShapeSpec,
    /// Launch speed relative to the firer
    pub speed: f32,
    pub damage: f32,
    /// Number of distinct targets hit before the projectile is spent
    pub piercing: u32,
    pub mass: f32,
    pub elasticity: f32,
    /// Steering acceleration (homing projectiles)
    pub acceleration: f32,
    pub max_speed: f32,
    pub move_behavior: Option<MoveBehaviorSpec>,
    pub effects: Vec<EffectSpec>,
}

impl FromTemplate for ProjectileSpec {
    fn from_template(view: &TemplateView<'_>) -> Result<Self, ConfigError> {
        let speed = positive(view, "speed")?;
        let piercing = view.usize("piercing")?;
        if piercing == 0 {
            return Err(view.error("piercing", "must be at least 1"));
        }
        Ok(Self {
            key: view.key().map(str::to_string),
            shape: ShapeSpec::from_field(view, "shape")?.unwrap_or(ShapeSpec::Rect {
                width: 4,
                height: 12,
            }),
            speed,
            damage: non_negative(view, "damage", 1.0)?,
            piercing: piercing as u32,
            mass: positive(view, "mass")?,
            elasticity: elasticity(view, 0.0)?,
            acceleration: non_negative(view, "acceleration", 0.0)?,
            max_speed: view.opt_f32("max_speed")?.unwrap_or(speed),
            move_behavior: view
                .opt_template("move_behavior", "MoveBehavior")?
                .map(|v| v.build())
                .transpose()?,
            effects: view
                .templates("effects", "Effect")?
                .iter()
                .map(|v| v.build())
                .collect::<Result<_, _>>()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeaponSpec {
    pub key: Option<String>,
    pub rate_of_fire: f32,
    /// Seconds between shots
    pub shot_interval: f32,
    /// Fired together on every shot
    pub projectiles: Vec<ProjectileSpec>,
}

impl FromTemplate for WeaponSpec {
    fn from_template(view: &TemplateView<'_>) -> Result<Self, ConfigError> {
        let rate_of_fire = positive(view, "rate_of_fire")?;
        let mut projectiles: Vec<ProjectileSpec> = view
            .templates("projectiles", "Projectile")?
            .iter()
            .map(|v| v.build())
            .collect::<Result<_, _>>()?;
        if let Some(single) = view.opt_template("projectile", "Projectile")? {
            projectiles.push(single.build()?);
        }
        if projectiles.is_empty() {
            return Err(view.error("projectiles", "a weapon needs at least one projectile"));
        }
        Ok(Self {
            key: view.key().map(str::to_string),
            rate_of_fire,
            shot_interval: view.f32_or("shot_interval", 1.0 / rate_of_fire)?,
            projectiles,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShieldSpec {
    pub key: Option<String>,
    pub capacity: f32,
    /// Integrity regained per second once recharging
    pub recharge_rate: f32,
    /// Seconds after the last hit before recharging starts
    pub recharge_delay: f32,
    /// Explicit shape; otherwise the owner's bounds grown by `padding`
    pub shape: Option<ShapeSpec>,
    pub padding: f32,
    pub elasticity: f32,
}

impl FromTemplate for ShieldSpec {
    fn from_template(view: &TemplateView<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            key: view.key().map(str::to_string),
            capacity: positive(view, "capacity")?,
            recharge_rate: non_negative(view, "recharge_rate", 0.0)?,
            recharge_delay: non_negative(view, "recharge_delay", 0.0)?,
            shape: ShapeSpec::from_field(view, "shape")?,
            padding: non_negative(view, "padding", 6.0)?,
            elasticity: elasticity(view, 0.5)?,
        })
    }
}

/// Which ship class a template belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShipClass {
    Player,
    Enemy,
    /// Plain `Ship`: usable on either side
    Neutral,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShipSpec {
    pub key: Option<String>,
    pub class: ShipClass,
    pub shape: ShapeSpec,
    pub hp: f32,
    pub mass: f32,
    pub elasticity: f32,
    pub acceleration: f32,
    pub max_speed: f32,
    /// `max_speed² / (2 * acceleration)`
    pub stopping_distance: f32,
    /// Confined ships stop at the screen edge; others are culled far off screen
    pub confined: bool,
    pub weapons: Vec<WeaponSpec>,
    pub shield: Option<ShieldSpec>,
    pub move_behavior: Option<MoveBehaviorSpec>,
    pub fire_behavior: Option<FireBehaviorSpec>,
}

impl FromTemplate for ShipSpec {
    fn from_template(view: &TemplateView<'_>) -> Result<Self, ConfigError> {
        let class = if view.is_a("PlayerShip") {
            ShipClass::Player
        } else if view.is_a("EnemyShip") {
            ShipClass::Enemy
        } else {
            ShipClass::Neutral
        };
        let acceleration = non_negative(view, "acceleration", 0.0)?;
        let max_speed = non_negative(view, "max_speed", 0.0)?;
        Ok(Self {
            key: view.key().map(str::to_string),
            class,
            shape: ShapeSpec::from_field(view, "shape")?.unwrap_or_default(),
            hp: positive(view, "hp")?,
            mass: positive(view, "mass")?,
            elasticity: elasticity(view, 0.5)?,
            acceleration,
            max_speed,
            stopping_distance: view.opt_f32("stopping_distance")?.unwrap_or(0.0),
            confined: view.bool_or("confined", true)?,
            weapons: view
                .templates("weapons", "Weapon")?
                .iter()
                .map(|v| v.build())
                .collect::<Result<_, _>>()?,
            shield: view
                .opt_template("shield", "Shield")?
                .map(|v| v.build())
                .transpose()?,
            move_behavior: view
                .opt_template("move_behavior", "MoveBehavior")?
                .map(|v| v.build())
                .transpose()?,
            fire_behavior: view
                .opt_template("fire_behavior", "FireBehavior")?
                .map(|v| v.build())
                .transpose()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Registry;

    const HANGAR: &str = r#"
Projectile[Bullet]:
  speed: 2000
  damage: 5
Weapon[Chaingun]:
  rate_of_fire: 10.0
  projectiles:
    - Projectile[Bullet]
Shield[Bubble]:
  capacity: 20
  recharge_rate: 5
  recharge_delay: 2
EnemyShip[Drone]:
  acceleration: 200
  max_speed: 100
  hp: 3
  weapons:
    - Weapon(Chaingun)
  shield: Shield(Bubble)
  move_behavior: Idle[]
"#;

    fn hangar() -> Registry {
        let mut registry = Registry::new();
        registry.load_str(HANGAR, "hangar").unwrap();
        registry.check_for_undefined_objects().unwrap();
        registry
    }

    #[test]
    fn test_weapon_blueprint() {
        let weapon: WeaponSpec = hangar().build_key("Weapon", "Chaingun").unwrap();
        assert_eq!(weapon.projectiles[0].damage, 5.0);
        assert_eq!(weapon.projectiles[0].piercing, 1);
        assert!((weapon.shot_interval - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_ship_blueprint() {
        let ship: ShipSpec = hangar().build_key("EnemyShip", "Drone").unwrap();
        assert_eq!(ship.class, ShipClass::Enemy);
        assert_eq!(ship.hp, 3.0);
        assert_eq!(ship.weapons.len(), 1);
        assert_eq!(ship.shield.as_ref().map(|s| s.capacity), Some(20.0));
        assert!((ship.stopping_distance - 25.0).abs() < 1e-4);
        assert_eq!(ship.move_behavior, Some(MoveBehaviorSpec::Idle));
    }

    #[test]
    fn test_enemy_ship_requires_move_behavior() {
        let mut registry = Registry::new();
        let err = registry
            .load_str("EnemyShip[Lazy]: {acceleration: 1, max_speed: 1, weapons: []}\n", "doc")
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequiredField { .. }));
    }

    #[test]
    fn test_weapon_without_projectile_rejected() {
        let mut registry = Registry::new();
        registry.load_str("Weapon[Empty]: {rate_of_fire: 1}\n", "doc").unwrap();
        registry.check_for_undefined_objects().unwrap();
        assert!(registry.build_key::<WeaponSpec>("Weapon", "Empty").is_err());
    }

    #[test]
    fn test_non_positive_rate_of_fire_rejected() {
        let mut registry = Registry::new();
        let err = registry
            .load_str("Weapon[Stuck]: {rate_of_fire: 0}\n", "doc")
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
