//! Generation-stamped model loads.
//!
//! Every asynchronous load carries a [`ModelTicket`] stamped with the id's
//! generation at the time it was issued. Any later decision about that id
//! (a new load, a switch to a primitive, removal) bumps the generation, so a
//! completion whose ticket no longer matches is simply dropped.

use std::collections::HashMap;

use crate::bounds::Bounds3;
use crate::factory::ModelRequest;
use crate::shape::ShapeId;

/// Identifies one issued model load.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelTicket {
    pub id: ShapeId,
    pub generation: u64,
    pub url: String,
}

/// A loaded model handed back to the reconciler.
#[derive(Debug, Clone)]
pub struct LoadedModel<M> {
    /// Backend asset, e.g. a glTF scene handle.
    pub asset: M,
    /// Local-space bounds of the asset, if the loader could compute them.
    pub bounds: Option<Bounds3>,
}

/// What happened to a completed load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The model was spawned and registered.
    Applied,
    /// The ticket was superseded; the result was discarded.
    Stale,
    /// The load or the spawn failed; the entity is absent.
    Failed,
}

/// Per-id generation counters.
#[derive(Debug, Default)]
pub(crate) struct LoadGate {
    generations: HashMap<ShapeId, u64>,
}

impl LoadGate {
    /// Increment and capture the generation for a new load.
    pub fn issue(&mut self, id: &ShapeId) -> u64 {
        let generation = self.generations.entry(id.clone()).or_insert(0);
        *generation += 1;
        *generation
    }

    /// Whether `generation` is still the latest for `id`.
    pub fn is_current(&self, id: &ShapeId, generation: u64) -> bool {
        self.generations.get(id) == Some(&generation)
    }

    /// Make every outstanding ticket for `id` stale.
    pub fn invalidate(&mut self, id: &ShapeId) {
        if let Some(generation) = self.generations.get_mut(id) {
            *generation += 1;
        }
    }
}

/// A load in flight and the latest request for it.
#[derive(Debug, Clone)]
pub(crate) struct PendingModel {
    pub ticket: ModelTicket,
    pub request: ModelRequest,
}
