mod calendar;
mod production;
pub mod residents;
mod upkeep;

pub use calendar::CalendarSystem;
pub use production::ProductionSystem;
pub use residents::ResidentSystem;
pub use upkeep::UpkeepSystem;
