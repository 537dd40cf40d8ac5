//! The four interchangeable allocation protocols.
//!
//! Each protocol is one async step function run between a drone's battery
//! management and its act phase. A protocol's only job is deciding which
//! drone takes which person; actually flying the rescue is shared drone
//! logic. All inter-drone coordination goes through mailbox messages and
//! the arbiter's claim layer, never through direct peer mutation.

pub(crate) mod best_fit;
pub(crate) mod bidding;
pub(crate) mod direct_claim;
pub(crate) mod zone_dispatch;
