//! Domain events and the command queue consumed by the view layer.
//!
//! The core never talks to a renderer directly. Everything it wants shown is
//! queued in the [`Outbox`] during a tick and drained once per tick by the
//! engine, which forwards it to every registered [`Presenter`].

use std::mem;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    agents::{AgentId, Errand, Profession},
    buildings::{BuildingId, BuildingKind},
    calendar::Season,
    farm::FarmState,
    grid::{Position, TilePos},
    ledger::{Amounts, CropYield},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimEvent {
    BuildingPlaced {
        building: BuildingId,
        kind: BuildingKind,
        origin: TilePos,
    },
    BuildingCompleted {
        building: BuildingId,
        kind: BuildingKind,
    },
    BuildingDemolished {
        building: BuildingId,
        kind: BuildingKind,
    },
    ResourceProduced {
        building: BuildingId,
        kind: BuildingKind,
        resources: Amounts,
        crop: Option<CropYield>,
    },
    PopulationIncreased {
        building: BuildingId,
        amount: u32,
    },
    FarmStateChanged {
        building: BuildingId,
        from: FarmState,
        to: FarmState,
    },
    ResidentSpawned {
        agent: AgentId,
        profession: Profession,
    },
    ResidentRemoved {
        agent: AgentId,
    },
    ProfessionChanged {
        agent: AgentId,
        from: Profession,
        to: Profession,
    },
    WorkAssigned {
        agent: AgentId,
        building: BuildingId,
    },
    WorkReleased {
        agent: AgentId,
        building: BuildingId,
    },
    ErrandStarted {
        agent: AgentId,
        errand: Errand,
        destination: Position,
    },
    ErrandFinished {
        agent: AgentId,
        errand: Errand,
        success: bool,
    },
    MapExpanded {
        from: u32,
        to: u32,
    },
    DayStarted {
        day: u32,
    },
    SeasonChanged {
        season: Season,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct VisualHandle(u64);

impl VisualHandle {
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "variant", rename_all = "snake_case")]
pub enum VisualKind {
    Building(BuildingKind),
    /// Placeholder shown while a building is under construction.
    ConstructionSite(BuildingKind),
    Resident(Profession),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    Build,
    Till,
    Seed,
    Water,
    Harvest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ViewCommand {
    CreateVisual {
        handle: VisualHandle,
        kind: VisualKind,
        position: Position,
    },
    RemoveVisual {
        handle: VisualHandle,
    },
    PlayEffect {
        effect: EffectKind,
        position: Position,
    },
    Notify {
        message: String,
        severity: Severity,
    },
}

/// Per-tick queue of events and view commands.
#[derive(Debug, Default)]
pub struct Outbox {
    events: Vec<SimEvent>,
    commands: Vec<ViewCommand>,
    next_handle: u64,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_event(&mut self, event: SimEvent) {
        self.events.push(event);
    }

    pub fn create_visual(&mut self, kind: VisualKind, position: Position) -> VisualHandle {
        self.next_handle += 1;
        let handle = VisualHandle(self.next_handle);
        self.commands.push(ViewCommand::CreateVisual {
            handle,
            kind,
            position,
        });
        handle
    }

    pub fn remove_visual(&mut self, handle: VisualHandle) {
        self.commands.push(ViewCommand::RemoveVisual { handle });
    }

    pub fn play_effect(&mut self, effect: EffectKind, position: Position) {
        self.commands
            .push(ViewCommand::PlayEffect { effect, position });
    }

    pub fn notify(&mut self, message: impl Into<String>, severity: Severity) {
        self.commands.push(ViewCommand::Notify {
            message: message.into(),
            severity,
        });
    }

    pub fn events(&self) -> &[SimEvent] {
        &self.events
    }

    pub fn commands(&self) -> &[ViewCommand] {
        &self.commands
    }

    pub fn drain(&mut self) -> (Vec<SimEvent>, Vec<ViewCommand>) {
        (mem::take(&mut self.events), mem::take(&mut self.commands))
    }
}

/// The rendering side of the game, as seen from the simulation.
pub trait Presenter: Send {
    fn create_visual(&mut self, handle: VisualHandle, kind: VisualKind, position: Position);
    fn remove_visual(&mut self, handle: VisualHandle);
    fn play_effect(&mut self, effect: EffectKind, position: Position);
    fn notify(&mut self, message: &str, severity: Severity);

    fn on_event(&mut self, _event: &SimEvent) {}

    fn apply(&mut self, command: &ViewCommand) {
        match command {
            ViewCommand::CreateVisual {
                handle,
                kind,
                position,
            } => self.create_visual(*handle, *kind, *position),
            ViewCommand::RemoveVisual { handle } => self.remove_visual(*handle),
            ViewCommand::PlayEffect { effect, position } => self.play_effect(*effect, *position),
            ViewCommand::Notify { message, severity } => self.notify(message, *severity),
        }
    }
}

/// Headless presenter that turns view commands into log lines.
#[derive(Debug, Default)]
pub struct TracingPresenter;

impl Presenter for TracingPresenter {
    fn create_visual(&mut self, handle: VisualHandle, kind: VisualKind, position: Position) {
        debug!(handle = handle.raw(), ?kind, %position, "create visual");
    }

    fn remove_visual(&mut self, handle: VisualHandle) {
        debug!(handle = handle.raw(), "remove visual");
    }

    fn play_effect(&mut self, effect: EffectKind, position: Position) {
        debug!(?effect, %position, "effect");
    }

    fn notify(&mut self, message: &str, severity: Severity) {
        match severity {
            Severity::Warning | Severity::Error => warn!(?severity, "{message}"),
            Severity::Info | Severity::Success => info!(?severity, "{message}"),
        }
    }
}

/// Keeps everything it is handed. Handy in tests and for replay.
#[derive(Debug, Default, Clone)]
pub struct RecordingPresenter {
    pub commands: Vec<ViewCommand>,
    pub events: Vec<SimEvent>,
}

impl RecordingPresenter {
    pub fn notices(&self) -> impl Iterator<Item = (&str, Severity)> {
        self.commands.iter().filter_map(|command| match command {
            ViewCommand::Notify { message, severity } => Some((message.as_str(), *severity)),
            _ => None,
        })
    }
}

impl Presenter for RecordingPresenter {
    fn create_visual(&mut self, handle: VisualHandle, kind: VisualKind, position: Position) {
        self.commands.push(ViewCommand::CreateVisual {
            handle,
            kind,
            position,
        });
    }

    fn remove_visual(&mut self, handle: VisualHandle) {
        self.commands.push(ViewCommand::RemoveVisual { handle });
    }

    fn play_effect(&mut self, effect: EffectKind, position: Position) {
        self.commands
            .push(ViewCommand::PlayEffect { effect, position });
    }

    fn notify(&mut self, message: &str, severity: Severity) {
        self.commands.push(ViewCommand::Notify {
            message: message.to_string(),
            severity,
        });
    }

    fn on_event(&mut self, event: &SimEvent) {
        self.events.push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbox_hands_out_fresh_handles_and_drains() {
        let mut outbox = Outbox::new();
        let first = outbox.create_visual(
            VisualKind::Resident(Profession::Farmer),
            Position::new(1.0, 2.0),
        );
        let second = outbox.create_visual(
            VisualKind::Building(BuildingKind::Barn),
            Position::new(3.0, 4.0),
        );
        outbox.notify("hello", Severity::Info);
        outbox.push_event(SimEvent::DayStarted { day: 2 });

        assert_ne!(first, second);
        let (events, commands) = outbox.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(commands.len(), 3);
        assert!(outbox.events().is_empty());
        assert!(outbox.commands().is_empty());
    }

    #[test]
    fn recording_presenter_replays_commands() {
        let mut outbox = Outbox::new();
        outbox.play_effect(EffectKind::Till, Position::new(0.0, 0.0));
        outbox.notify("no seeds", Severity::Warning);
        let (_, commands) = outbox.drain();

        let mut presenter = RecordingPresenter::default();
        for command in &commands {
            presenter.apply(command);
        }

        assert_eq!(presenter.commands, commands);
        let notices: Vec<_> = presenter.notices().collect();
        assert_eq!(notices, vec![("no seeds", Severity::Warning)]);
    }
}
