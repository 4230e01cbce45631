//! Report generation
//!
//! Session and probe results, rendered as plain text or JSON.

use gamekit_interop::simulator::{SimStats, SimulatedRuntime};
use gamekit_interop::SymbolStatus;
use serde::Serialize;
use std::fmt;

/// One delegate event as the recording listener saw it
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReceivedEvent {
    Cancelled {
        at: String,
        view_controller: usize,
    },
    Failed {
        at: String,
        view_controller: usize,
        domain: String,
        code: i64,
        description: Option<String>,
    },
}

impl ReceivedEvent {
    pub fn summary(&self) -> String {
        match self {
            ReceivedEvent::Cancelled { view_controller, .. } => {
                format!("cancelled (controller {:#x})", view_controller)
            }
            ReceivedEvent::Failed { view_controller, domain, code, description, .. } => match description {
                Some(description) => format!(
                    "failed (controller {:#x}): {} ({}): {}",
                    view_controller, domain, code, description
                ),
                None => format!("failed (controller {:#x}): {} ({})", view_controller, domain, code),
            },
        }
    }

    fn at(&self) -> &str {
        match self {
            ReceivedEvent::Cancelled { at, .. } | ReceivedEvent::Failed { at, .. } => at,
        }
    }
}

/// Object accounting of the simulated backend at the end of a session
#[derive(Debug, Clone, Serialize)]
pub struct SimulatorSummary {
    pub live_objects: usize,
    pub constructed: usize,
    pub deallocated: usize,
    pub over_releases: usize,
    pub invalid_accesses: usize,
    pub delegates_created: usize,
    pub callbacks_delivered: usize,
}

impl SimulatorSummary {
    pub fn capture(sim: &SimulatedRuntime) -> Self {
        let SimStats {
            constructed,
            deallocated,
            over_releases,
            invalid_accesses,
            delegates_created,
            callbacks_delivered,
            ..
        } = sim.stats();

        Self {
            live_objects: sim.live_objects(),
            constructed,
            deallocated,
            over_releases,
            invalid_accesses,
            delegates_created,
            callbacks_delivered,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub backend: String,
    pub view_controller: usize,
    pub show_existing_matches: bool,
    pub min_players: usize,
    pub max_players: usize,
    pub invite_message: Option<String>,
    pub events_fired: usize,
    pub events_skipped: usize,
    pub received: Vec<ReceivedEvent>,
    pub simulator: Option<SimulatorSummary>,
}

impl fmt::Display for SessionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "═══════════════════════════════════════════════")?;
        writeln!(f, "  Matchmaker Session ({})", self.backend)?;
        writeln!(f, "═══════════════════════════════════════════════\n")?;

        writeln!(f, "View controller:       {:#x}", self.view_controller)?;
        writeln!(f, "Show existing matches: {}", self.show_existing_matches)?;
        writeln!(f, "Players:               {}..={}", self.min_players, self.max_players)?;
        writeln!(
            f,
            "Invite message:        {}",
            self.invite_message.as_deref().unwrap_or("(none)")
        )?;

        writeln!(
            f,
            "\nEvents: {} fired, {} skipped, {} received",
            self.events_fired,
            self.events_skipped,
            self.received.len()
        )?;
        for event in &self.received {
            writeln!(f, "  [{}] {}", event.at(), event.summary())?;
        }

        if let Some(sim) = &self.simulator {
            writeln!(f, "\nSimulator:")?;
            writeln!(f, "  Constructed:   {}", sim.constructed)?;
            writeln!(f, "  Deallocated:   {}", sim.deallocated)?;
            writeln!(f, "  Still alive:   {}", sim.live_objects)?;
            writeln!(f, "  Over-releases: {}", sim.over_releases)?;
        }

        Ok(())
    }
}

/// Symbol table of a native bridge library
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub library: String,
    pub symbols: Vec<SymbolStatus>,
}

impl ProbeReport {
    pub fn missing(&self) -> usize {
        self.symbols.iter().filter(|s| !s.present).count()
    }
}

impl fmt::Display for ProbeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Probing: {}", self.library)?;
        for symbol in &self.symbols {
            let mark = if symbol.present { "✓" } else { "✗" };
            writeln!(f, "  {} {}", mark, symbol.name)?;
        }
        writeln!(
            f,
            "\n{} of {} symbols present",
            self.symbols.len() - self.missing(),
            self.symbols.len()
        )
    }
}
