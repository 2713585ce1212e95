//! Analysis session controller
//!
//! Drives the NotRun -> Running -> Done lifecycle. Every operation takes the
//! current `SessionState` and returns the next one; nothing is stored here
//! except the collaborators. Invalid requests leave the phase alone and
//! record the reason in `last_error`.
//!
//! `start` is split into `begin`, `run_pipeline` and `complete` so a host
//! can release its lock while the slow stages run. `complete` ignores
//! results whose generation no longer matches, which is how a reset issued
//! mid-run wins over the in-flight pipeline.

use crate::config::Config;
use crate::recommender::{self, RecommendationEngine};
use crate::telemetry::SnapshotCollector;
use devopt_common::llm_client::LlmError;
use devopt_common::reconciler::EditTable;
use devopt_common::{Phase, Recommendation, SessionState, SettingsStore, Snapshot};
use tracing::{info, warn};

pub const ALREADY_RUNNING: &str = "An analysis is already running.";
pub const NOTHING_TO_APPLY: &str = "Run an analysis before applying recommendations.";

/// Proof that `begin` accepted a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunTicket {
    generation: u64,
}

/// Output of the pipeline stages
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub snapshot: Snapshot,
    pub recommendation: Recommendation,
}

/// Owns the pipeline collaborators
pub struct SessionController {
    collector: SnapshotCollector,
    settings: SettingsStore,
    engine: Box<dyn RecommendationEngine>,
    edits: EditTable,
}

impl SessionController {
    pub fn new(
        collector: SnapshotCollector,
        settings: SettingsStore,
        engine: Box<dyn RecommendationEngine>,
        edits: EditTable,
    ) -> Self {
        Self {
            collector,
            settings,
            engine,
            edits,
        }
    }

    /// Wire up the real collaborators. Fails when the AI engine has no API key.
    pub fn from_config(config: &Config) -> Result<Self, LlmError> {
        let engine = recommender::build_engine(config)?;
        let settings = SettingsStore::new(config.editor.resolved_settings_path());
        info!(
            "Session using {} engine, editor settings at {}",
            engine.name(),
            settings.path().display()
        );
        Ok(Self::new(
            SnapshotCollector::for_this_machine(config.telemetry.process_limit),
            settings,
            engine,
            config.reconcile.edit_table(),
        ))
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    /// Run the whole analysis synchronously
    pub fn start(&self, state: SessionState) -> SessionState {
        let (running, ticket) = match self.begin(state) {
            Ok(accepted) => accepted,
            Err(rejected) => return rejected,
        };
        let report = self.run_pipeline();
        self.complete(running, ticket, report)
    }

    /// Enter Running, clearing previous results. Rejected while already Running.
    pub fn begin(&self, state: SessionState) -> Result<(SessionState, RunTicket), SessionState> {
        if state.phase == Phase::Running {
            info!("Ignoring start: analysis already running");
            return Err(SessionState {
                last_error: Some(ALREADY_RUNNING.to_string()),
                ..state
            });
        }

        let generation = state.generation.wrapping_add(1);
        info!("Starting analysis run {}", generation);
        Ok((
            SessionState {
                phase: Phase::Running,
                generation,
                ..SessionState::default()
            },
            RunTicket { generation },
        ))
    }

    /// Collect the snapshot and produce advice. Touches no session state.
    pub fn run_pipeline(&self) -> AnalysisReport {
        let ide_settings = self.settings.load();
        let snapshot = self.collector.collect(ide_settings);
        let recommendation = self.engine.produce(&snapshot);
        AnalysisReport {
            snapshot,
            recommendation,
        }
    }

    /// Enter Done with the report, unless the run was superseded
    pub fn complete(&self, state: SessionState, ticket: RunTicket, report: AnalysisReport) -> SessionState {
        if state.phase != Phase::Running || state.generation != ticket.generation {
            info!(
                "Discarding results of run {} (session now at run {}, {})",
                ticket.generation, state.generation, state.phase
            );
            return state;
        }

        info!("Analysis run {} complete", ticket.generation);
        SessionState {
            phase: Phase::Done,
            snapshot: Some(report.snapshot),
            recommendation: Some(report.recommendation),
            ..state
        }
    }

    /// The pipeline for `ticket` died; back to NotRun unless superseded
    pub fn abort(&self, state: SessionState, ticket: RunTicket, reason: &str) -> SessionState {
        if state.phase != Phase::Running || state.generation != ticket.generation {
            return state;
        }

        warn!("Analysis run {} failed: {}", ticket.generation, reason);
        SessionState {
            phase: Phase::NotRun,
            last_error: Some(format!("Analysis failed: {}", reason)),
            ..state
        }
    }

    /// Reconcile the editor settings against the edit table. Phase is unchanged.
    pub fn apply_config_changes(&self, state: SessionState) -> SessionState {
        if state.phase != Phase::Done || state.snapshot.is_none() {
            info!("Ignoring apply: session is {}", state.phase);
            return SessionState {
                last_error: Some(NOTHING_TO_APPLY.to_string()),
                ..state
            };
        }

        let applied_changes = self.edits.reconcile_and_persist(&self.settings);
        SessionState {
            applied_changes,
            last_error: None,
            ..state
        }
    }

    /// Back to NotRun with nothing stored
    pub fn reset(&self, state: SessionState) -> SessionState {
        info!("Resetting session (was {})", state.phase);
        SessionState {
            generation: state.generation.wrapping_add(1),
            ..SessionState::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probes::NoProbe;
    use crate::recommender::RuleBasedEngine;
    use crate::telemetry::{MachineSample, MetricsProvider};
    use devopt_common::{DiskUsage, MemoryUsage, NetworkCounters};
    use tempfile::TempDir;

    struct QuietMachine;

    impl MetricsProvider for QuietMachine {
        fn sample(&self) -> MachineSample {
            MachineSample {
                cpu_percent: 5.0,
                memory: MemoryUsage { percent: 30.0, ..MemoryUsage::default() },
                disk: DiskUsage { percent: 40.0, ..DiskUsage::default() },
                os: "Linux".to_string(),
                python_version: "3.12.0".to_string(),
                network: NetworkCounters::default(),
                processes: Vec::new(),
            }
        }
    }

    fn controller(temp: &TempDir) -> SessionController {
        SessionController::new(
            SnapshotCollector::new(Box::new(QuietMachine), Box::new(NoProbe), Box::new(NoProbe), 100),
            SettingsStore::new(temp.path().join("settings.json")),
            Box::new(RuleBasedEngine),
            EditTable::standard(),
        )
    }

    #[test]
    fn test_start_reaches_done() {
        let temp = TempDir::new().unwrap();
        let state = controller(&temp).start(SessionState::default());

        assert_eq!(state.phase, Phase::Done);
        assert!(state.snapshot.is_some());
        assert!(matches!(state.recommendation, Some(Recommendation::Advisories(_))));
        assert!(state.applied_changes.is_empty());
        assert_eq!(state.generation, 1);
    }

    #[test]
    fn test_begin_rejected_while_running() {
        let temp = TempDir::new().unwrap();
        let ctl = controller(&temp);
        let (running, _ticket) = ctl.begin(SessionState::default()).unwrap();

        let rejected = ctl.begin(running.clone()).unwrap_err();
        assert_eq!(rejected.phase, Phase::Running);
        assert_eq!(rejected.generation, running.generation);
        assert_eq!(rejected.last_error.as_deref(), Some(ALREADY_RUNNING));
    }

    #[test]
    fn test_restart_from_done_clears_previous_results() {
        let temp = TempDir::new().unwrap();
        let ctl = controller(&temp);
        let done = ctl.apply_config_changes(ctl.start(SessionState::default()));
        assert!(!done.applied_changes.is_empty());

        let (running, _) = ctl.begin(done).unwrap();
        assert!(running.is_cleared());
        assert_eq!(running.phase, Phase::Running);
    }

    #[test]
    fn test_reset_discards_in_flight_results() {
        let temp = TempDir::new().unwrap();
        let ctl = controller(&temp);

        let (running, ticket) = ctl.begin(SessionState::default()).unwrap();
        let report = ctl.run_pipeline();
        let reset = ctl.reset(running);
        let after = ctl.complete(reset.clone(), ticket, report);

        assert_eq!(after, reset);
        assert_eq!(after.phase, Phase::NotRun);
        assert!(after.snapshot.is_none());
    }

    #[test]
    fn test_stale_ticket_after_new_run() {
        let temp = TempDir::new().unwrap();
        let ctl = controller(&temp);

        let (running, old_ticket) = ctl.begin(SessionState::default()).unwrap();
        let reset = ctl.reset(running);
        let (running_again, new_ticket) = ctl.begin(reset).unwrap();

        let stale = ctl.complete(running_again.clone(), old_ticket, ctl.run_pipeline());
        assert_eq!(stale.phase, Phase::Running);

        let fresh = ctl.complete(stale, new_ticket, ctl.run_pipeline());
        assert_eq!(fresh.phase, Phase::Done);
    }

    #[test]
    fn test_abort_returns_to_not_run() {
        let temp = TempDir::new().unwrap();
        let ctl = controller(&temp);

        let (running, ticket) = ctl.begin(SessionState::default()).unwrap();
        let aborted = ctl.abort(running, ticket, "worker panicked");
        assert_eq!(aborted.phase, Phase::NotRun);
        assert_eq!(aborted.last_error.as_deref(), Some("Analysis failed: worker panicked"));

        let (running, ticket) = ctl.begin(aborted).unwrap();
        let reset = ctl.reset(running);
        assert_eq!(ctl.abort(reset.clone(), ticket, "late"), reset);
    }

    #[test]
    fn test_apply_requires_done() {
        let temp = TempDir::new().unwrap();
        let ctl = controller(&temp);

        let state = ctl.apply_config_changes(SessionState::default());
        assert_eq!(state.phase, Phase::NotRun);
        assert_eq!(state.last_error.as_deref(), Some(NOTHING_TO_APPLY));
        assert!(!temp.path().join("settings.json").exists());
    }

    #[test]
    fn test_apply_writes_settings_and_keeps_phase() {
        let temp = TempDir::new().unwrap();
        let ctl = controller(&temp);

        let applied = ctl.apply_config_changes(ctl.start(SessionState::default()));
        assert_eq!(applied.phase, Phase::Done);
        assert_eq!(
            applied.applied_changes,
            vec![
                "Set 'editor.renderWhitespace' to 'all'.",
                "Set 'editor.fontSize' to 14.",
                "Editor settings updated successfully.",
            ]
        );

        let again = ctl.apply_config_changes(applied);
        assert_eq!(again.applied_changes, vec!["No editor settings changes needed."]);
    }

    #[test]
    fn test_reset_from_every_phase() {
        let temp = TempDir::new().unwrap();
        let ctl = controller(&temp);

        let not_run = SessionState::default();
        let (running, _) = ctl.begin(SessionState::default()).unwrap();
        let done = ctl.apply_config_changes(ctl.start(SessionState::default()));

        for state in [not_run, running, done] {
            let reset = ctl.reset(state);
            assert_eq!(reset.phase, Phase::NotRun);
            assert!(reset.is_cleared());
            assert!(reset.last_error.is_none());
        }
    }
}
