//! Class schemas for configurable templates
//!
//! A schema lists the fields a class must have, the defaults it supplies,
//! and the hooks that compute derived values once an instance is set up.

use super::error::ConfigError;
use super::registry::Template;
use super::value::Value;

/// Computes derived values on a freshly set-up template
pub type InitializeHook = fn(&mut Template) -> Result<(), ConfigError>;

/// Declaration of one configurable class
#[derive(Debug, Clone)]
pub struct ClassSchema {
    pub name: String,
    /// Parent class (used for `is_a` checks and typed dispatch)
    pub parent: Option<String>,
    /// Fields that must be present once defaults are merged
    pub required: Vec<String>,
    /// Defaults merged under the configured fields
    pub defaults: Vec<(String, Value)>,
    /// Fields copied to new instances even if no config mentions them
    pub extra_copy_fields: Vec<String>,
    /// Initialization hooks, parent first
    pub hooks: Vec<InitializeHook>,
}

impl ClassSchema {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            parent: None,
            required: Vec::new(),
            defaults: Vec::new(),
            extra_copy_fields: Vec::new(),
            hooks: Vec::new(),
        }
    }

    /// Start from a parent's declaration (required fields, defaults, hooks)
    pub fn extends(parent: &ClassSchema, name: &str) -> Self {
        Self {
            name: name.to_string(),
            parent: Some(parent.name.clone()),
            required: parent.required.clone(),
            defaults: parent.defaults.clone(),
            extra_copy_fields: parent.extra_copy_fields.clone(),
            hooks: parent.hooks.clone(),
        }
    }

    /// Replace the required field list
    pub fn required(mut self, fields: &[&str]) -> Self {
        self.required = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Add to the required field list
    pub fn also_required(mut self, fields: &[&str]) -> Self {
        self.required.extend(fields.iter().map(|f| f.to_string()));
        self
    }

    pub fn default(mut self, field: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        match self.defaults.iter_mut().find(|(f, _)| f == field) {
            Some(slot) => slot.1 = value,
            None => self.defaults.push((field.to_string(), value)),
        }
        self
    }

    /// Default given as a YAML snippet (for lists and maps)
    pub fn default_yaml(self, field: &str, yaml: &str) -> Self {
        let raw: serde_yaml::Value = serde_yaml::from_str(yaml).unwrap_or(serde_yaml::Value::Null);
        self.default(field, Value::from_plain_yaml(&raw))
    }

    pub fn extra_copy(mut self, fields: &[&str]) -> Self {
        self.extra_copy_fields.extend(fields.iter().map(|f| f.to_string()));
        self
    }

    pub fn on_initialize(mut self, hook: InitializeHook) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Required, defaulted and extra-copy fields, in declaration order
    pub fn declared_fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = Vec::new();
        let declared = self
            .required
            .iter()
            .chain(self.defaults.iter().map(|(f, _)| f))
            .chain(self.extra_copy_fields.iter());
        for field in declared {
            if !fields.contains(field) {
                fields.push(field.clone());
            }
        }
        fields
    }
}

fn numeric_field(template: &Template, field: &str) -> Option<f64> {
    template.fields.get(field).and_then(Value::as_f64)
}

/// Stopping distance for anything with a speed cap and an acceleration
fn movable_initialize(template: &mut Template) -> Result<(), ConfigError> {
    let max_speed = numeric_field(template, "max_speed");
    let acceleration = numeric_field(template, "acceleration");
    if let (Some(max_speed), Some(acceleration)) = (max_speed, acceleration) {
        if acceleration < 0.0 || max_speed < 0.0 {
            return Err(ConfigError::invalid(
                &template.class,
                template.key.as_deref(),
                "acceleration",
                "speeds and accelerations must be non-negative",
            ));
        }
        if acceleration > 0.0 {
            let stopping_distance = max_speed * max_speed / (2.0 * acceleration);
            template
                .derived
                .insert("stopping_distance".into(), Value::Float(stopping_distance));
        }
    }
    Ok(())
}

fn weapon_initialize(template: &mut Template) -> Result<(), ConfigError> {
    match numeric_field(template, "rate_of_fire") {
        Some(rate) if rate > 0.0 => {
            template
                .derived
                .insert("shot_interval".into(), Value::Float(1.0 / rate));
            Ok(())
        }
        _ => Err(ConfigError::invalid(
            &template.class,
            template.key.as_deref(),
            "rate_of_fire",
            "must be a positive number",
        )),
    }
}

fn shield_initialize(template: &mut Template) -> Result<(), ConfigError> {
    match numeric_field(template, "capacity") {
        Some(capacity) if capacity > 0.0 => Ok(()),
        _ => Err(ConfigError::invalid(
            &template.class,
            template.key.as_deref(),
            "capacity",
            "must be a positive number",
        )),
    }
}

/// Every class the simulation knows how to build
pub fn builtin_schemas() -> Vec<ClassSchema> {
    let projectile = ClassSchema::new("Projectile")
        .required(&["speed"])
        .default_yaml("shape", "{rect: [4, 12]}")
        .default("damage", 1i64)
        .default("piercing", 1i64)
        .default("mass", 1.0)
        .default("elasticity", 0.0)
        .default_yaml("effects", "[]")
        .default("move_behavior", Value::Null)
        .default("acceleration", 0.0)
        .default("max_speed", Value::Null)
        .on_initialize(movable_initialize);

    let weapon = ClassSchema::new("Weapon")
        .required(&["rate_of_fire"])
        .default_yaml("projectiles", "[]")
        .default("projectile", Value::Null)
        .on_initialize(weapon_initialize);

    let shield = ClassSchema::new("Shield")
        .required(&["capacity", "recharge_rate", "recharge_delay"])
        .default("shape", Value::Null)
        .default("padding", 6.0)
        .default("elasticity", 0.5)
        .on_initialize(shield_initialize);

    let ship = ClassSchema::new("Ship")
        .required(&["acceleration", "max_speed", "weapons"])
        .default_yaml("shape", "{rect: [32, 32]}")
        .default("hp", 10.0)
        .default("mass", 100.0)
        .default("elasticity", 0.5)
        .default("confined", true)
        .default("shield", Value::Null)
        .default("move_behavior", Value::Null)
        .default("fire_behavior", Value::Null)
        .on_initialize(movable_initialize);
    let player_ship = ClassSchema::extends(&ship, "PlayerShip");
    let enemy_ship = ClassSchema::extends(&ship, "EnemyShip")
        .also_required(&["move_behavior"])
        .default("confined", false);

    let move_behavior = ClassSchema::new("MoveBehavior");
    let idle = ClassSchema::extends(&move_behavior, "Idle");
    let patrol = ClassSchema::extends(&move_behavior, "Patrol")
        .default("dests", Value::Null)
        .default("box", Value::Null)
        .default("reached_dest_threshold", 10.0)
        .default("decelerate", true);
    let homing = ClassSchema::extends(&move_behavior, "Homing")
        .default("acquisition_angle", 45.0)
        .default("decelerate", false);
    let move_on_screen =
        ClassSchema::extends(&move_behavior, "MoveOnScreen").required(&["initial_dest"]);

    let fire_behavior = ClassSchema::new("FireBehavior");
    let never_fire = ClassSchema::extends(&fire_behavior, "NeverFire");
    let fire_constantly = ClassSchema::extends(&fire_behavior, "FireConstantly");
    let aim_at_target = ClassSchema::extends(&fire_behavior, "AimAtTarget").default("lead", true);

    let effect = ClassSchema::new("Effect").required(&["duration"]);
    let mind_control = ClassSchema::extends(&effect, "MindControl")
        .default("move_behavior", Value::Null)
        .default("fire_behavior", Value::Null);
    let stat_override = ClassSchema::extends(&effect, "StatOverride")
        .default("max_speed", Value::Null)
        .default("acceleration", Value::Null);

    let formation = ClassSchema::new("Formation")
        .required(&["ships", "width", "height"])
        .default("move_behavior", Value::Null)
        .default("fire_behavior", Value::Null)
        .default("center_x", 0.5)
        .default("dest_y", Value::Null);
    let grid = ClassSchema::extends(&formation, "Grid").also_required(&["rows", "columns"]);
    let line = ClassSchema::extends(&formation, "Line");

    let wave_condition = ClassSchema::new("WaveCondition").default("delay", 0.0);
    let timer = ClassSchema::extends(&wave_condition, "Timer").required(&["time"]);
    let percent_of_last = ClassSchema::extends(&wave_condition, "PercentOfLastWave").required(&["percent"]);
    let last_defeated = ClassSchema::extends(&percent_of_last, "LastWaveDefeated")
        .required(&[])
        .default("percent", 0.0);
    let percent_of_all = ClassSchema::extends(&wave_condition, "PercentOfAllWaves").required(&["percent"]);
    let all_defeated = ClassSchema::extends(&percent_of_all, "AllWavesDefeated")
        .required(&[])
        .default("percent", 0.0);

    let level = ClassSchema::new("Level")
        .required(&["name", "waves"])
        .default_yaml("shop_items", "[]");
    let campaign = ClassSchema::new("Campaign").required(&["name", "levels"]);

    vec![
        projectile,
        weapon,
        shield,
        ship,
        player_ship,
        enemy_ship,
        move_behavior,
        idle,
        patrol,
        homing,
        move_on_screen,
        fire_behavior,
        never_fire,
        fire_constantly,
        aim_at_target,
        effect,
        mind_control,
        stat_override,
        formation,
        grid,
        line,
        wave_condition,
        timer,
        percent_of_last,
        last_defeated,
        percent_of_all,
        all_defeated,
        level,
        campaign,
    ]
}
