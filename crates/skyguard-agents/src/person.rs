//! Crowd member agents.
//!
//! A person wanders the festival grounds driven by a small activity
//! machine, slowly burning stamina. Each tick a malaise roll can throw
//! the person into distress; distress immobilizes them, starts the
//! survival clock, and is resolved only by treatment from outside (or by
//! the clock running out). All movement is authorized through the
//! arbiter like every other agent.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use skyguard_arbiter::ArbiterHandle;
use skyguard_types::{
    AgentRef, BehaviorProfile, PersonActivity, PersonId, Position, WorldSnapshot,
};
use skyguard_world::Grid;
use tracing::{debug, info, warn};

use crate::config::PersonConfig;
use crate::error::AgentError;

/// Stamina level below which a person stops to rest.
const REST_THRESHOLD: f64 = 0.2;

/// Stamina level at which a resting person gets up again.
const RESTED_THRESHOLD: f64 = 0.9;

/// Radius of one random-walk hop, in cells.
const WANDER_RADIUS: f64 = 5.0;

/// One crowd member's complete mutable state.
#[derive(Debug)]
pub struct Person {
    /// The person's id.
    pub id: PersonId,
    /// Current position.
    pub position: Position,
    /// Fixed behavioral traits.
    pub profile: BehaviorProfile,
    /// Current activity.
    pub activity: PersonActivity,
    /// Stamina in `[0, 1]`.
    pub stamina: f64,
    /// Whether the person is still part of the simulation.
    pub alive: bool,

    distress_ticks: u32,
    queue_ticks_left: u32,
    objective: Option<Position>,
    departed: bool,
    arbiter: ArbiterHandle,
    config: PersonConfig,
    rng: SmallRng,
}

impl Person {
    /// Create a healthy person at the given position.
    #[must_use]
    pub fn new(
        id: PersonId,
        position: Position,
        profile: BehaviorProfile,
        arbiter: ArbiterHandle,
        config: PersonConfig,
    ) -> Self {
        Self {
            id,
            position,
            profile,
            activity: PersonActivity::default(),
            stamina: 1.0,
            alive: true,
            distress_ticks: 0,
            queue_ticks_left: 0,
            objective: None,
            departed: false,
            arbiter,
            config,
            rng: SmallRng::from_rng(&mut rand::rng()),
        }
    }

    /// Whether the person is still taking turns (neither treated nor dead).
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.alive && !self.departed
    }

    /// Advance the person by one tick.
    pub async fn take_turn(
        &mut self,
        snapshot: &WorldSnapshot,
        grid: &Grid,
    ) -> Result<(), AgentError> {
        if !self.is_active() {
            return Ok(());
        }

        // Treatment is observed, not received: the arbiter already pulled
        // the person off the grid when the save was granted.
        if snapshot.person(self.id).is_some_and(|p| p.treated) {
            info!(person = %self.id, "treated; leaving the grounds");
            self.departed = true;
            return Ok(());
        }

        if self.activity == PersonActivity::InDistress {
            self.distress_ticks = self.distress_ticks.saturating_add(1);
            if self.distress_ticks >= self.config.distress_lifespan {
                warn!(person = %self.id, ticks = self.distress_ticks, "died untreated");
                self.alive = false;
                self.arbiter.report_death(self.id).await?;
            }
            // Distress immobilizes.
            return Ok(());
        }

        let malaise = self.config.base_malaise
            * (1.0 - self.profile.malaise_resistance)
            * (1.0 - self.stamina);
        if self.rng.random::<f64>() < malaise {
            debug!(person = %self.id, stamina = self.stamina, "collapsed into distress");
            self.activity = PersonActivity::InDistress;
            self.distress_ticks = 0;
            self.objective = None;
            self.arbiter.report_distress(self.id, true).await?;
            return Ok(());
        }

        match self.activity {
            PersonActivity::Exploring => {
                self.stamina = (self.stamina - self.config.explore_drain).max(0.0);
                if self.stamina <= REST_THRESHOLD {
                    self.activity = PersonActivity::Resting;
                    self.objective = None;
                } else if self.rng.random::<f64>() < self.profile.poi_interest
                    && let Some(target) = self.pick_poi(grid)
                {
                    self.activity = PersonActivity::SeekingPoi;
                    self.objective = Some(target);
                } else {
                    self.wander(snapshot, grid).await?;
                }
            }
            PersonActivity::SeekingPoi => {
                self.stamina = (self.stamina - self.config.explore_drain).max(0.0);
                match self.objective {
                    Some(target) if self.position.euclidean(&target) <= 1.0 => {
                        self.activity = PersonActivity::InQueue;
                        self.queue_ticks_left = self.config.queue_ticks;
                        self.objective = None;
                    }
                    Some(target) => self.walk_toward(target).await?,
                    None => self.activity = PersonActivity::Exploring,
                }
            }
            PersonActivity::InQueue => {
                self.stamina = (self.stamina + self.config.rest_regen).min(1.0);
                self.queue_ticks_left = self.queue_ticks_left.saturating_sub(1);
                if self.queue_ticks_left == 0 {
                    self.activity = PersonActivity::Exploring;
                }
            }
            PersonActivity::Resting => {
                self.stamina = (self.stamina + self.config.rest_regen).min(1.0);
                if self.stamina >= RESTED_THRESHOLD {
                    self.activity = PersonActivity::Exploring;
                }
            }
            PersonActivity::InDistress => {}
        }
        Ok(())
    }

    /// Pick a random point of interest to visit, weighted by nothing
    /// fancier than a uniform draw.
    fn pick_poi(&mut self, grid: &Grid) -> Option<Position> {
        let pois: Vec<Position> = grid
            .obstacles()
            .iter()
            .filter(|o| o.poi.is_some())
            .map(|o| o.position)
            .collect();
        if pois.is_empty() {
            return None;
        }
        pois.get(self.rng.random_range(0..pois.len())).copied()
    }

    /// One hop of the bounded random walk, yielding to personal space.
    async fn wander(&mut self, snapshot: &WorldSnapshot, grid: &Grid) -> Result<(), AgentError> {
        // A neighbor pressing inside the personal-space radius overrides
        // any objective: head straight away first.
        if let Some(neighbor) = self.nearest_neighbor(snapshot) {
            let dist = self.position.euclidean(&neighbor);
            if dist > f64::EPSILON && dist < self.profile.personal_space {
                let scale = self.profile.personal_space / dist;
                let x = (self.position.x + (self.position.x - neighbor.x) * scale)
                    .clamp(0.5, f64::from(grid.width()) - 0.5);
                let y = (self.position.y + (self.position.y - neighbor.y) * scale)
                    .clamp(0.5, f64::from(grid.height()) - 0.5);
                self.objective = Some(Position::new(x, y));
            }
        }
        let reached = self
            .objective
            .is_none_or(|target| self.position.euclidean(&target) <= 0.5);
        if reached {
            let x = (self.position.x + self.rng.random_range(-WANDER_RADIUS..WANDER_RADIUS))
                .clamp(0.5, f64::from(grid.width()) - 0.5);
            let y = (self.position.y + self.rng.random_range(-WANDER_RADIUS..WANDER_RADIUS))
                .clamp(0.5, f64::from(grid.height()) - 0.5);
            self.objective = Some(Position::new(x, y));
        }
        if let Some(target) = self.objective {
            self.walk_toward(target).await?;
        }
        Ok(())
    }

    /// Position of the nearest other person still on the grid.
    fn nearest_neighbor(&self, snapshot: &WorldSnapshot) -> Option<Position> {
        snapshot
            .people
            .iter()
            .filter(|p| p.id != self.id && !p.position.is_sentinel())
            .map(|p| p.position)
            .min_by(|a, b| {
                self.position
                    .euclidean(a)
                    .total_cmp(&self.position.euclidean(b))
            })
    }

    /// Step toward a target through the arbiter; a denied move discards
    /// the objective so the next tick picks another direction.
    async fn walk_toward(&mut self, target: Position) -> Result<(), AgentError> {
        let speed = self.config.speed * self.profile.speed;
        let next = self.position.step_toward(&target, speed);
        if self
            .arbiter
            .request_move(AgentRef::Person(self.id), next)
            .await?
        {
            self.position = next;
        } else {
            self.objective = None;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use skyguard_arbiter::spawn;

    use super::*;

    fn profile() -> BehaviorProfile {
        BehaviorProfile {
            speed: 1.0,
            malaise_resistance: 0.5,
            poi_interest: 0.0,
            personal_space: 1.0,
        }
    }

    async fn setup(lifespan: u32) -> (Person, ArbiterHandle, Grid) {
        let grid = Grid::new(20, 20).unwrap();
        let (arbiter, _task) = spawn(grid.clone());
        let person = Person::new(
            PersonId::new(0),
            Position::new(10.0, 10.0),
            profile(),
            arbiter.clone(),
            PersonConfig {
                distress_lifespan: lifespan,
                ..PersonConfig::default()
            },
        );
        arbiter
            .register(AgentRef::Person(person.id), person.position)
            .await
            .unwrap();
        (person, arbiter, grid)
    }

    #[tokio::test]
    async fn distress_runs_out_the_clock() {
        let (mut person, arbiter, grid) = setup(3).await;
        person.activity = PersonActivity::InDistress;
        arbiter.report_distress(person.id, true).await.unwrap();

        for _ in 0..3 {
            let snapshot = arbiter.snapshot().await.unwrap();
            person.take_turn(&snapshot, &grid).await.unwrap();
        }
        assert!(!person.alive);

        let snapshot = arbiter.snapshot().await.unwrap();
        let record = snapshot.person(person.id).unwrap();
        assert!(!record.alive);
        assert!(record.position.is_sentinel());

        // Dead people issue no further requests.
        let before = person.position;
        person.take_turn(&snapshot, &grid).await.unwrap();
        assert_eq!(person.position, before);
    }

    #[tokio::test]
    async fn distress_immobilizes() {
        let (mut person, arbiter, grid) = setup(100).await;
        person.activity = PersonActivity::InDistress;
        let before = person.position;
        for _ in 0..5 {
            let snapshot = arbiter.snapshot().await.unwrap();
            person.take_turn(&snapshot, &grid).await.unwrap();
        }
        assert_eq!(person.position, before);
        assert!(person.alive);
    }

    #[tokio::test]
    async fn treated_person_leaves() {
        let (mut person, arbiter, grid) = setup(100).await;
        person.activity = PersonActivity::InDistress;
        arbiter.report_distress(person.id, true).await.unwrap();
        arbiter
            .request_save_person(person.id, AgentRef::Drone(skyguard_types::DroneId::new(0)))
            .await
            .unwrap();

        let snapshot = arbiter.snapshot().await.unwrap();
        person.take_turn(&snapshot, &grid).await.unwrap();
        assert!(!person.is_active());
        assert!(person.alive);
    }

    #[tokio::test]
    async fn exploring_moves_and_drains_stamina() {
        let (mut person, arbiter, grid) = setup(100).await;
        let before_stamina = person.stamina;
        let before = person.position;
        let mut moved = false;
        for _ in 0..10 {
            let snapshot = arbiter.snapshot().await.unwrap();
            person.take_turn(&snapshot, &grid).await.unwrap();
            if person.position != before {
                moved = true;
            }
        }
        assert!(person.stamina < before_stamina);
        assert!(moved || person.activity == PersonActivity::InDistress);
    }

    #[tokio::test]
    async fn crowded_wanderer_backs_off_to_personal_space() {
        let grid = Grid::new(20, 20).unwrap();
        let (arbiter, _task) = spawn(grid.clone());
        let mut person = Person::new(
            PersonId::new(0),
            Position::new(10.0, 10.0),
            BehaviorProfile {
                speed: 1.0,
                malaise_resistance: 1.0,
                poi_interest: 0.0,
                personal_space: 3.0,
            },
            arbiter.clone(),
            PersonConfig::default(),
        );
        arbiter
            .register(AgentRef::Person(person.id), person.position)
            .await
            .unwrap();
        let neighbor_at = Position::new(10.5, 10.0);
        arbiter
            .register(AgentRef::Person(PersonId::new(1)), neighbor_at)
            .await
            .unwrap();

        for _ in 0..6 {
            let snapshot = arbiter.snapshot().await.unwrap();
            person.take_turn(&snapshot, &grid).await.unwrap();
        }
        assert!(person.position.euclidean(&neighbor_at) >= 3.0);
    }
}
