//! Type-safe identifier wrappers for simulation entities.
//!
//! Every entity in the simulation has a strongly-typed ID to prevent
//! accidental mixing of identifiers at compile time. IDs are plain `u32`
//! values assigned sequentially at spawn time: several protocols break
//! ties by "lowest id", so the ordering of the raw integer is part of
//! the contract.

use serde::{Deserialize, Serialize};

/// Generates a newtype wrapper around `u32` with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub u32);

        impl $name {
            /// Wrap a raw numeric identifier.
            pub const fn new(raw: u32) -> Self {
                Self(raw)
            }

            /// Return the inner numeric value.
            pub const fn into_inner(self) -> u32 {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u32> for $name {
            fn from(raw: u32) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for u32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a drone.
    DroneId
}

define_id! {
    /// Unique identifier for a crowd member.
    PersonId
}

define_id! {
    /// Unique identifier for a ground rescuer unit.
    RescuerId
}

define_id! {
    /// Unique identifier for a rescue point (zone dispatcher).
    RescuePointId
}

/// A reference to any agent that can occupy a grid cell or hold a claim.
///
/// The arbiter keys its position table and claim table by this type so a
/// drone and a rescuer with the same numeric id never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AgentRef {
    /// A drone agent.
    Drone(DroneId),
    /// A person agent.
    Person(PersonId),
    /// A ground rescuer unit.
    Rescuer(RescuerId),
}

impl core::fmt::Display for AgentRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Drone(id) => write!(f, "drone/{id}"),
            Self::Person(id) => write!(f, "person/{id}"),
            Self::Rescuer(id) => write!(f, "rescuer/{id}"),
        }
    }
}
