use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{agents::Tool, config::LedgerConfig, error::SimError, events::SimEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Food,
    Wood,
    Money,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Resource::Food => "food",
            Resource::Wood => "wood",
            Resource::Money => "money",
        };
        f.write_str(label)
    }
}

/// A bundle of resource quantities, used for costs and production tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amounts(BTreeMap<Resource, f64>);

impl Amounts {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with(mut self, resource: Resource, amount: f64) -> Self {
        *self.0.entry(resource).or_insert(0.0) += amount;
        self
    }

    pub fn get(&self, resource: Resource) -> f64 {
        self.0.get(&resource).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Resource, f64)> + '_ {
        self.0.iter().map(|(resource, amount)| (*resource, *amount))
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(|amount| *amount == 0.0)
    }
}

impl fmt::Display for Amounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .iter()
            .map(|(resource, amount)| format!("{resource} {amount}"))
            .collect();
        f.write_str(&parts.join(", "))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CropKind {
    Wheat,
    Tomato,
    Potato,
}

impl CropKind {
    /// Market price of one unit.
    pub fn price(self) -> f64 {
        match self {
            CropKind::Wheat => 50.0,
            CropKind::Tomato => 80.0,
            CropKind::Potato => 60.0,
        }
    }
}

impl fmt::Display for CropKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CropKind::Wheat => "wheat",
            CropKind::Tomato => "tomato",
            CropKind::Potato => "potato",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropYield {
    pub crop: CropKind,
    pub quantity: u32,
}

/// Authoritative store of the village's stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLedger {
    pub food: f64,
    pub wood: f64,
    pub money: f64,
    pub harvested: BTreeMap<CropKind, u32>,
    pub seeds: BTreeMap<CropKind, u32>,
    /// Tools sitting in the barn, ready to be borrowed.
    pub tools: BTreeMap<Tool, u32>,
    pub watering_can_filled: bool,
    pub population: u32,
    pub population_cap: u32,
    #[serde(skip)]
    food_per_resident: f64,
}

impl ResourceLedger {
    pub fn new(config: &LedgerConfig) -> Self {
        Self {
            food: config.food,
            wood: config.wood,
            money: config.money,
            harvested: BTreeMap::new(),
            seeds: config.seeds.clone(),
            tools: config.tools.clone(),
            watering_can_filled: config.watering_can_filled,
            population: 0,
            population_cap: config.population_cap,
            food_per_resident: config.food_per_resident,
        }
    }

    pub fn amount(&self, resource: Resource) -> f64 {
        match resource {
            Resource::Food => self.food,
            Resource::Wood => self.wood,
            Resource::Money => self.money,
        }
    }

    fn slot(&mut self, resource: Resource) -> &mut f64 {
        match resource {
            Resource::Food => &mut self.food,
            Resource::Wood => &mut self.wood,
            Resource::Money => &mut self.money,
        }
    }

    pub fn can_afford(&self, cost: &Amounts) -> bool {
        cost.iter()
            .all(|(resource, amount)| self.amount(resource) >= amount)
    }

    /// Takes the whole cost or nothing.
    pub fn consume(&mut self, cost: &Amounts) -> Result<(), SimError> {
        if !self.can_afford(cost) {
            return Err(SimError::InsufficientResources {
                what: cost.to_string(),
            });
        }
        for (resource, amount) in cost.iter() {
            *self.slot(resource) -= amount;
        }
        Ok(())
    }

    pub fn produce(&mut self, amounts: &Amounts) {
        for (resource, amount) in amounts.iter() {
            *self.slot(resource) += amount;
        }
    }

    pub fn add_harvest(&mut self, crop: CropKind, quantity: u32) {
        *self.harvested.entry(crop).or_insert(0) += quantity;
    }

    /// Sells up to `amount` units of a crop, returning the money earned.
    pub fn sell_crop(&mut self, crop: CropKind, amount: u32) -> f64 {
        let held = self.harvested.get(&crop).copied().unwrap_or(0);
        let sold = amount.min(held);
        if sold == 0 {
            return 0.0;
        }
        let earned = crop.price() * sold as f64;
        self.money += earned;
        self.harvested.insert(crop, held - sold);
        debug!(%crop, sold, earned, "sold crop");
        earned
    }

    pub fn sell_all(&mut self) -> f64 {
        let held: Vec<(CropKind, u32)> = self
            .harvested
            .iter()
            .map(|(crop, quantity)| (*crop, *quantity))
            .collect();
        held.into_iter()
            .map(|(crop, quantity)| self.sell_crop(crop, quantity))
            .sum()
    }

    /// Residents eat continuously. There is no penalty once food runs out.
    pub fn decay_food(&mut self, dt: f64) {
        let eaten = self.population as f64 * self.food_per_resident * dt;
        self.food = (self.food - eaten).max(0.0);
    }

    pub fn seed_count(&self, crop: CropKind) -> u32 {
        self.seeds.get(&crop).copied().unwrap_or(0)
    }

    pub fn take_seed(&mut self, crop: CropKind) -> bool {
        match self.seeds.get_mut(&crop) {
            Some(count) if *count > 0 => {
                *count -= 1;
                true
            }
            _ => false,
        }
    }

    pub fn tool_stock(&self, tool: Tool) -> u32 {
        self.tools.get(&tool).copied().unwrap_or(0)
    }

    pub fn take_tool(&mut self, tool: Tool) -> bool {
        match self.tools.get_mut(&tool) {
            Some(count) if *count > 0 => {
                *count -= 1;
                true
            }
            _ => false,
        }
    }

    pub fn return_tool(&mut self, tool: Tool) {
        *self.tools.entry(tool).or_insert(0) += 1;
    }

    pub fn fill_watering_can(&mut self) {
        self.watering_can_filled = true;
    }

    /// Empties the shared can, reporting whether there was water in it.
    pub fn drain_watering_can(&mut self) -> bool {
        std::mem::replace(&mut self.watering_can_filled, false)
    }

    pub fn has_room(&self) -> bool {
        self.population < self.population_cap
    }

    /// Applies the stock side of a domain event.
    pub fn observe(&mut self, event: &SimEvent) {
        match event {
            SimEvent::ResourceProduced {
                resources, crop, ..
            } => {
                self.produce(resources);
                if let Some(crop) = crop {
                    self.add_harvest(crop.crop, crop.quantity);
                }
            }
            SimEvent::PopulationIncreased { amount, .. } => {
                self.population_cap += amount;
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buildings::{BuildingId, BuildingKind};

    fn ledger() -> ResourceLedger {
        ResourceLedger::new(&LedgerConfig::default())
    }

    #[test]
    fn consume_is_all_or_nothing() {
        let mut ledger = ledger();
        ledger.wood = 5.0;
        let cost = Amounts::new()
            .with(Resource::Wood, 20.0)
            .with(Resource::Money, 100.0);

        let err = ledger.consume(&cost).unwrap_err();
        assert!(matches!(err, SimError::InsufficientResources { .. }));
        assert_eq!(ledger.wood, 5.0);
        assert_eq!(ledger.money, 1000.0);

        ledger.wood = 25.0;
        ledger.consume(&cost).unwrap();
        assert_eq!(ledger.wood, 5.0);
        assert_eq!(ledger.money, 900.0);
    }

    #[test]
    fn sell_crop_clamps_to_held_quantity() {
        let mut ledger = ledger();
        ledger.add_harvest(CropKind::Tomato, 2);

        let earned = ledger.sell_crop(CropKind::Tomato, 5);
        assert_eq!(earned, 160.0);
        assert_eq!(ledger.money, 1160.0);
        assert_eq!(ledger.harvested[&CropKind::Tomato], 0);
        assert_eq!(ledger.sell_crop(CropKind::Wheat, 1), 0.0);
    }

    #[test]
    fn sell_all_sums_every_crop() {
        let mut ledger = ledger();
        ledger.add_harvest(CropKind::Wheat, 1);
        ledger.add_harvest(CropKind::Potato, 2);

        assert_eq!(ledger.sell_all(), 170.0);
        assert!(ledger.harvested.values().all(|quantity| *quantity == 0));
    }

    #[test]
    fn food_decays_with_population_and_floors_at_zero() {
        let mut ledger = ledger();
        ledger.population = 4;
        ledger.food = 1.0;

        ledger.decay_food(1.0);
        assert!((ledger.food - 0.6).abs() < 1e-9);

        ledger.decay_food(100.0);
        assert_eq!(ledger.food, 0.0);
    }

    #[test]
    fn observe_applies_production_and_capacity() {
        let mut ledger = ledger();
        let building = BuildingId::new(1);
        ledger.observe(&SimEvent::ResourceProduced {
            building,
            kind: BuildingKind::Farm,
            resources: Amounts::new().with(Resource::Food, 5.0),
            crop: Some(CropYield {
                crop: CropKind::Potato,
                quantity: 1,
            }),
        });
        ledger.observe(&SimEvent::PopulationIncreased {
            building,
            amount: 2,
        });

        assert_eq!(ledger.food, 105.0);
        assert_eq!(ledger.harvested[&CropKind::Potato], 1);
        assert_eq!(ledger.population_cap, 12);
    }

    #[test]
    fn tools_are_borrowed_and_returned() {
        let mut ledger = ledger();
        assert!(ledger.take_tool(Tool::Hoe));
        assert!(!ledger.take_tool(Tool::Hoe));
        ledger.return_tool(Tool::Hoe);
        assert_eq!(ledger.tool_stock(Tool::Hoe), 1);

        ledger.fill_watering_can();
        assert!(ledger.drain_watering_can());
        assert!(!ledger.drain_watering_can());
    }
}
