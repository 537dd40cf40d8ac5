//! Ground rescuer units: created lazily, never destroyed, only recycled.

use skyguard_types::{PersonSighting, Position, RescuerId, RescuerPhase};

/// A ground unit owned by exactly one rescue point.
#[derive(Debug, Clone)]
pub struct Rescuer {
    /// The rescuer's id (unique across all rescue points).
    pub id: RescuerId,
    /// Current position.
    pub position: Position,
    /// The home rescue point's position.
    pub home: Position,
    /// Motion state.
    pub phase: RescuerPhase,
    /// The person currently assigned, if any.
    pub assigned: Option<PersonSighting>,
}

impl Rescuer {
    /// A fresh idle rescuer standing at its home point.
    pub const fn new(id: RescuerId, home: Position) -> Self {
        Self {
            id,
            position: home,
            home,
            phase: RescuerPhase::Idle,
            assigned: None,
        }
    }

    /// Whether this rescuer can take a new mission.
    pub fn is_idle(&self) -> bool {
        self.phase == RescuerPhase::Idle
    }

    /// Put the rescuer on a mission toward a sighted person.
    pub const fn dispatch(&mut self, target: PersonSighting) {
        self.assigned = Some(target);
        self.phase = RescuerPhase::MovingToPerson;
    }

    /// The point the rescuer is currently heading for, if moving.
    pub fn objective(&self) -> Option<Position> {
        match self.phase {
            RescuerPhase::Idle => None,
            RescuerPhase::MovingToPerson => self.assigned.map(|p| p.position),
            RescuerPhase::ReturningToBase => Some(self.home),
        }
    }

    /// Whether the rescuer has reached its current objective
    /// (within one cell).
    pub fn arrived(&self) -> bool {
        self.objective()
            .is_some_and(|target| self.position.euclidean(&target) <= 1.0)
    }

    /// Finish the save attempt and head home.
    pub const fn head_home(&mut self) {
        self.assigned = None;
        self.phase = RescuerPhase::ReturningToBase;
    }

    /// Recycle the rescuer at its home point.
    pub const fn rest(&mut self) {
        self.assigned = None;
        self.phase = RescuerPhase::Idle;
    }
}
