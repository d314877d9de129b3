//! Levels and campaigns
//!
//! A level deploys its waves in order as their conditions become ready and
//! is done once every wave is out and no ship of any formation remains.
//! A campaign is an ordered list of levels with a cursor.

use serde::{Deserialize, Serialize};

use super::entity::Entities;
use super::formation::FormationRun;
use super::state::{SimEvent, World};
use super::wave::{WaveCondition, WaveProgress};
use crate::blueprint::{CampaignSpec, LevelSpec};

#[derive(Debug)]
pub struct LevelRun {
    spec: LevelSpec,
    conditions: Vec<WaveCondition>,
    next_wave: usize,
    /// Every formation deployed so far, with the wave it belongs to
    formations: Vec<(usize, FormationRun)>,
    started_at: f64,
    last_deployment: Option<f64>,
    completed: bool,
}

impl LevelRun {
    pub fn new(spec: LevelSpec, now: f64) -> Self {
        let conditions = spec.waves.iter().map(|w| WaveCondition::new(w.condition)).collect();
        Self {
            spec,
            conditions,
            next_wave: 0,
            formations: Vec::new(),
            started_at: now,
            last_deployment: None,
            completed: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &LevelSpec {
        &self.spec
    }

    pub fn waves_deployed(&self) -> usize {
        self.next_wave
    }

    pub fn formations(&self) -> impl Iterator<Item = &FormationRun> {
        self.formations.iter().map(|(_, f)| f)
    }

    pub fn ships_remaining(&self, entities: &Entities) -> usize {
        self.formations.iter().map(|(_, f)| f.ships_remaining(entities)).sum()
    }

    pub fn is_done(&self, entities: &Entities) -> bool {
        self.next_wave >= self.spec.waves.len() && self.ships_remaining(entities) == 0
    }

    /// Whether the level already reported completion
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    fn progress(&self, entities: &Entities) -> WaveProgress {
        let tally = |wave: Option<usize>| {
            self.formations
                .iter()
                .filter(|(w, _)| wave.is_none_or(|wave| *w == wave))
                .fold((0, 0), |(remaining, total), (_, f)| {
                    (remaining + f.ships_remaining(entities), total + f.num_ships())
                })
        };
        WaveProgress {
            last_deployment: self.last_deployment.unwrap_or(self.started_at),
            last_wave: match self.next_wave.checked_sub(1) {
                Some(last) => tally(Some(last)),
                None => (0, 0),
            },
            all_waves: tally(None),
        }
    }

    /// Check the next wave's condition
    pub fn next_wave_ready(&mut self, now: f64, entities: &Entities) -> bool {
        let progress = self.progress(entities);
        match self.conditions.get_mut(self.next_wave) {
            Some(condition) => condition.check(now, &progress),
            None => false,
        }
    }

    fn deploy_next_wave(&mut self, world: &mut World) {
        let Some(wave) = self.spec.waves.get(self.next_wave) else {
            return;
        };
        let wave_index = self.next_wave;
        let screen = *world.screen();
        for spec in &wave.formations {
            let run = FormationRun::deploy(spec, &screen, &mut world.rng);
            self.formations.push((wave_index, run));
        }
        log::info!(
            "{}: wave {} of {} deployed",
            self.spec.name,
            wave_index + 1,
            self.spec.waves.len()
        );
        self.next_wave += 1;
        self.last_deployment = Some(world.now());
        world.push_event(SimEvent::WaveDeployed { wave: wave_index });
    }

    pub(crate) fn tick(&mut self, world: &mut World, elapsed: f32) {
        let now = world.now();
        if self.next_wave_ready(now, &world.entities) {
            self.deploy_next_wave(world);
        }
        for (_, formation) in &mut self.formations {
            formation.tick(world, elapsed);
        }
        if !self.completed && self.is_done(&world.entities) {
            self.completed = true;
            log::info!("Level {} complete", self.spec.name);
            world.push_event(SimEvent::LevelComplete {
                name: self.spec.name.clone(),
            });
        }
    }

    /// Start over from the first wave
    pub fn reset(&mut self, now: f64) {
        for condition in &mut self.conditions {
            condition.reset();
        }
        self.next_wave = 0;
        self.formations.clear();
        self.started_at = now;
        self.last_deployment = None;
        self.completed = false;
    }
}

/// Saved position in a campaign
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignProgress {
    pub key: String,
    pub level: usize,
}

#[derive(Debug, Clone)]
pub struct Campaign {
    spec: CampaignSpec,
    level: usize,
}

impl Campaign {
    pub fn new(spec: CampaignSpec) -> Self {
        Self { spec, level: 0 }
    }

    /// Pick up saved progress; a cursor past the end means completed
    pub fn resume(spec: CampaignSpec, progress: &CampaignProgress) -> Self {
        let level = progress.level.min(spec.levels.len());
        Self { spec, level }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn level_index(&self) -> usize {
        self.level
    }

    pub fn current_level(&self) -> Option<&LevelSpec> {
        self.spec.levels.get(self.level)
    }

    pub fn won_level(&mut self) {
        if self.level < self.spec.levels.len() {
            self.level += 1;
        }
        if self.is_complete() {
            log::info!("Campaign {} complete", self.spec.name);
        }
    }

    pub fn is_complete(&self) -> bool {
        self.level >= self.spec.levels.len()
    }

    pub fn reset(&mut self) {
        self.level = 0;
    }

    /// `None` for campaigns built without a registry key
    pub fn progress(&self) -> Option<CampaignProgress> {
        self.spec.key.as_ref().map(|key| CampaignProgress {
            key: key.clone(),
            level: self.level,
        })
    }
}
