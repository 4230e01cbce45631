//! Scripted matchmaker session
//!
//! Builds a request and a view controller, applies the configured properties,
//! attaches a recording delegate, fires the scripted events (simulated backend
//! only) and tears everything down again.

use crate::config::{MatchmakerConfig, ScriptedEvent};
use crate::report::{ReceivedEvent, SessionReport, SimulatorSummary};
use chrono::Utc;
use gamekit_interop::simulator::SimulatedRuntime;
use gamekit_interop::{
    Bridge, InteropError, MatchRequest, NsError, TurnBasedMatchmakerDelegate,
    TurnBasedMatchmakerViewController,
};
use std::sync::{Arc, Mutex};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("min_players ({min}) is greater than max_players ({max})")]
    InvalidPlayerRange { min: usize, max: usize },

    #[error("Native view controller could not be created")]
    ViewControllerUnavailable,

    #[error(transparent)]
    Interop(#[from] InteropError),
}

/// Delegate that keeps every event it receives
#[derive(Default)]
struct RecordingDelegate {
    events: Mutex<Vec<ReceivedEvent>>,
}

impl RecordingDelegate {
    fn push(&self, event: ReceivedEvent) {
        log::info!("Delegate received: {}", event.summary());
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }

    fn take(&self) -> Vec<ReceivedEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }
}

impl TurnBasedMatchmakerDelegate for RecordingDelegate {
    fn was_cancelled(&self, view_controller: &TurnBasedMatchmakerViewController) {
        self.push(ReceivedEvent::Cancelled {
            at: Utc::now().to_rfc3339(),
            view_controller: view_controller.id(),
        });
    }

    fn did_fail_with_error(&self, view_controller: &TurnBasedMatchmakerViewController, error: NsError) {
        self.push(ReceivedEvent::Failed {
            at: Utc::now().to_rfc3339(),
            view_controller: view_controller.id(),
            domain: error.domain,
            code: error.code,
            description: error.localized_description,
        });
    }
}

/// Run one session against `bridge`
///
/// `simulator` must be the runtime behind `bridge` when the simulated backend
/// is in use; without it scripted events are skipped.
pub fn run_session(
    bridge: &Bridge,
    simulator: Option<&SimulatedRuntime>,
    matchmaker: &MatchmakerConfig,
    events: &[ScriptedEvent],
) -> Result<SessionReport, SessionError> {
    if let (Some(min), Some(max)) = (matchmaker.min_players, matchmaker.max_players) {
        if min > max {
            return Err(SessionError::InvalidPlayerRange { min, max });
        }
    }

    let request = MatchRequest::new(bridge);
    if let Some(min) = matchmaker.min_players {
        request.set_min_players(min)?;
    }
    if let Some(max) = matchmaker.max_players {
        request.set_max_players(max)?;
    }
    if let Some(message) = &matchmaker.invite_message {
        request.set_invite_message(Some(message.as_str()))?;
    }

    let view_controller = TurnBasedMatchmakerViewController::new(bridge, Some(&request))?;
    if !view_controller.is_valid() {
        return Err(SessionError::ViewControllerUnavailable);
    }
    if let Some(show) = matchmaker.show_existing_matches {
        view_controller.set_show_existing_matches(show)?;
    }

    let recorder = Arc::new(RecordingDelegate::default());
    view_controller.set_delegate(Some(recorder.clone()))?;

    let mut fired = 0;
    let mut skipped = 0;
    match simulator {
        Some(sim) => {
            let this = view_controller.handle().as_raw("TurnBasedMatchmakerViewController")?;
            for event in events {
                let delivered = match event {
                    ScriptedEvent::Cancel => sim.fire_cancelled(this),
                    ScriptedEvent::Fail { domain, code, description } => {
                        let mut error = NsError::new(domain.clone(), *code);
                        error.localized_description = description.clone();
                        sim.fire_failed(this, &error)
                    }
                };
                if delivered {
                    fired += 1;
                } else {
                    log::warn!("Scripted event {:?} was not delivered", event);
                }
            }
        }
        None => {
            if !events.is_empty() {
                log::warn!(
                    "Skipping {} scripted event(s): only the simulated backend can fire events",
                    events.len()
                );
            }
            skipped = events.len();
        }
    }

    let report = SessionReport {
        backend: bridge.runtime().name().to_string(),
        view_controller: view_controller.id(),
        show_existing_matches: view_controller.show_existing_matches()?,
        min_players: request.min_players()?,
        max_players: request.max_players()?,
        invite_message: request.invite_message()?,
        events_fired: fired,
        events_skipped: skipped,
        received: recorder.take(),
        simulator: None,
    };

    view_controller.dispose()?;
    request.dispose();

    Ok(SessionReport {
        simulator: simulator.map(SimulatorSummary::capture),
        ..report
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simulated() -> (Arc<SimulatedRuntime>, Bridge) {
        let sim = Arc::new(SimulatedRuntime::new());
        let bridge = Bridge::new(sim.clone());
        (sim, bridge)
    }

    #[test]
    fn test_session_records_scripted_events() {
        let (sim, bridge) = simulated();
        let matchmaker = MatchmakerConfig {
            show_existing_matches: Some(false),
            min_players: Some(2),
            max_players: Some(4),
            invite_message: Some("Your turn".to_string()),
        };
        let events = vec![
            ScriptedEvent::Cancel,
            ScriptedEvent::Fail {
                domain: "GKErrorDomain".to_string(),
                code: 3,
                description: Some("Communications failure".to_string()),
            },
        ];

        let report = run_session(&bridge, Some(&sim), &matchmaker, &events).unwrap();

        assert_eq!(report.backend, "simulated");
        assert!(!report.show_existing_matches);
        assert_eq!((report.min_players, report.max_players), (2, 4));
        assert_eq!(report.invite_message.as_deref(), Some("Your turn"));
        assert_eq!(report.events_fired, 2);
        assert_eq!(report.received.len(), 2);

        let summary = report.simulator.unwrap();
        assert_eq!(summary.live_objects, 0);
        assert_eq!(summary.over_releases, 0);
        assert!(bridge.delegates().is_empty());
    }

    #[test]
    fn test_session_without_simulator_skips_events() {
        let (_sim, bridge) = simulated();
        let report = run_session(&bridge, None, &MatchmakerConfig::default(), &[ScriptedEvent::Cancel]).unwrap();

        assert_eq!(report.events_fired, 0);
        assert_eq!(report.events_skipped, 1);
        assert!(report.received.is_empty());
        assert!(report.simulator.is_none());
    }

    #[test]
    fn test_invalid_player_range() {
        let (sim, bridge) = simulated();
        let matchmaker = MatchmakerConfig {
            min_players: Some(8),
            max_players: Some(2),
            ..Default::default()
        };

        let result = run_session(&bridge, Some(&sim), &matchmaker, &[]);
        assert!(matches!(result, Err(SessionError::InvalidPlayerRange { min: 8, max: 2 })));
    }

    #[test]
    fn test_failed_request_aborts_session() {
        let (sim, bridge) = simulated();
        sim.fail_next_constructions(1);

        let result = run_session(&bridge, Some(&sim), &MatchmakerConfig::default(), &[]);
        assert!(matches!(
            result,
            Err(SessionError::Interop(InteropError::InvalidHandle("MatchRequest")))
        ));
        assert_eq!(sim.stats().constructed, 0);
    }
}
