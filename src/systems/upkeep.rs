use anyhow::Result;

use crate::{
    engine::{System, SystemContext},
    world::World,
};

/// Residents eat from the food stock.
pub struct UpkeepSystem;

impl UpkeepSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for UpkeepSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for UpkeepSystem {
    fn name(&self) -> &str {
        "upkeep"
    }

    fn run(&mut self, ctx: &SystemContext, world: &mut World) -> Result<()> {
        world.ledger.decay_food(ctx.dt as f64);
        Ok(())
    }
}
