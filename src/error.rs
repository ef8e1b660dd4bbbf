use thiserror::Error;

use crate::{buildings::BuildingKind, grid::TilePos};

/// Failures surfaced by player commands and the simulation core.
///
/// None of these are fatal: every caller recovers locally, usually by leaving
/// the world untouched and pushing a notice for the player.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("cannot place {kind} at {origin}: site is occupied, unbuildable or off the map")]
    InvalidSite { kind: BuildingKind, origin: TilePos },

    #[error("not enough resources for {what}")]
    InsufficientResources { what: String },

    /// Carries the display form of the stale id, e.g. `resident_3`.
    #[error("unknown entity {0}")]
    UnknownEntity(String),

    #[error("no {0} available")]
    MissingCollaborator(&'static str),

    #[error("population cap of {cap} reached")]
    PopulationCapReached { cap: u32 },

    #[error("map can only grow: current size {current}, requested {requested}")]
    InvalidExpansion { current: u32, requested: u32 },

    #[error("cannot terraform tile {0}")]
    InvalidTerraform(TilePos),
}
