//! Diagnostic status poller.
//!
//! Watches the diagnostics of one engagement. While any of them is
//! `processing` the poller checks their status on the [`PollSchedule`];
//! once one reaches `completed` or `failed` its full details are refetched
//! and the file list is rebuilt. With nothing processing the poller sleeps
//! until [`DiagnosticPoller::submit`] wakes it.

use crate::api::ApiResult;
use crate::models::{Diagnostic, DiagnosticStatus, FileMeta};
use crate::polling::files::collect_file_list;
use crate::polling::schedule::PollSchedule;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Diagnostic endpoints the poller needs.
#[async_trait]
pub trait DiagnosticSource: Send + Sync {
    /// All diagnostics of an engagement.
    async fn list(&self, engagement_id: &str) -> ApiResult<Vec<Diagnostic>>;

    /// Current status of one diagnostic.
    async fn status(&self, diagnostic_id: &str) -> ApiResult<DiagnosticStatus>;

    /// Full details (files, report) of one diagnostic.
    async fn details(&self, diagnostic_id: &str) -> ApiResult<Diagnostic>;

    /// Submit a draft diagnostic for generation.
    async fn submit(&self, diagnostic_id: &str) -> ApiResult<()>;
}

/// What consumers render from.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiagnosticSnapshot {
    pub diagnostics: Vec<Diagnostic>,
    pub files: Vec<FileMeta>,
    pub processing: usize,
}

impl DiagnosticSnapshot {
    fn build(diagnostics: &[Diagnostic]) -> Self {
        Self {
            processing: diagnostics
                .iter()
                .filter(|d| d.status == DiagnosticStatus::Processing)
                .count(),
            files: collect_file_list(diagnostics),
            diagnostics: diagnostics.to_vec(),
        }
    }
}

/// Result of one status-check pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// Diagnostics whose status was requested.
    pub checked: usize,
    /// Diagnostics observed reaching a terminal state.
    pub finished: usize,
    /// Status requests that failed and will be retried.
    pub failed_checks: usize,
    /// The pass did not run because another fetch was in flight.
    pub skipped: bool,
}

struct PollState {
    diagnostics: Vec<Diagnostic>,
    /// Ids seen processing at the last sync.
    processing: HashSet<String>,
    processing_since: Option<Instant>,
}

/// Clears the in-flight flag when dropped.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct DiagnosticPoller {
    source: Arc<dyn DiagnosticSource>,
    engagement_id: String,
    schedule: PollSchedule,
    state: Mutex<PollState>,
    in_flight: AtomicBool,
    wake: Notify,
    snapshots: watch::Sender<DiagnosticSnapshot>,
}

impl DiagnosticPoller {
    pub fn new(
        source: Arc<dyn DiagnosticSource>,
        engagement_id: impl Into<String>,
        schedule: PollSchedule,
    ) -> Self {
        let (snapshots, _) = watch::channel(DiagnosticSnapshot::default());

        Self {
            source,
            engagement_id: engagement_id.into(),
            schedule,
            state: Mutex::new(PollState {
                diagnostics: Vec::new(),
                processing: HashSet::new(),
                processing_since: None,
            }),
            in_flight: AtomicBool::new(false),
            wake: Notify::new(),
            snapshots,
        }
    }

    /// Receive a snapshot every time the diagnostic list changes.
    pub fn subscribe(&self) -> watch::Receiver<DiagnosticSnapshot> {
        self.snapshots.subscribe()
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> DiagnosticSnapshot {
        self.snapshots.borrow().clone()
    }

    fn try_begin(&self) -> Option<InFlight<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(&self.in_flight))
    }

    /// Restart the fast window whenever a diagnostic newly enters
    /// processing; clear it once nothing is processing.
    fn sync_processing(state: &mut PollState) {
        let processing: HashSet<String> = state
            .diagnostics
            .iter()
            .filter(|d| d.status == DiagnosticStatus::Processing)
            .map(|d| d.id.clone())
            .collect();

        if processing.is_empty() {
            state.processing_since = None;
        } else if !processing.is_subset(&state.processing) {
            state.processing_since = Some(Instant::now());
        }

        state.processing = processing;
    }

    fn publish(&self, state: &PollState) {
        self.snapshots
            .send_replace(DiagnosticSnapshot::build(&state.diagnostics));
    }

    /// Fetch the full diagnostic list. Returns `Ok(false)` if skipped
    /// because another fetch was already in flight.
    pub async fn load(&self) -> ApiResult<bool> {
        let Some(_guard) = self.try_begin() else {
            debug!("Diagnostic list fetch already in flight, skipping");
            return Ok(false);
        };

        let diagnostics = self.source.list(&self.engagement_id).await?;
        info!(
            "Loaded {} diagnostics for engagement {}",
            diagnostics.len(),
            self.engagement_id
        );

        let mut state = self.state.lock().await;
        state.diagnostics = diagnostics;
        Self::sync_processing(&mut state);
        self.publish(&state);

        Ok(true)
    }

    /// Check the status of every processing diagnostic once.
    ///
    /// Status failures are logged and left for the next pass.
    pub async fn poll_once(&self) -> TickOutcome {
        let Some(_guard) = self.try_begin() else {
            debug!("Poll skipped: fetch already in flight");
            return TickOutcome {
                skipped: true,
                ..TickOutcome::default()
            };
        };

        let processing: Vec<String> = {
            let state = self.state.lock().await;
            state
                .diagnostics
                .iter()
                .filter(|d| d.status == DiagnosticStatus::Processing)
                .map(|d| d.id.clone())
                .collect()
        };

        let mut outcome = TickOutcome::default();
        let mut refreshed: Vec<Diagnostic> = Vec::new();
        let mut status_only: Vec<(String, DiagnosticStatus)> = Vec::new();

        for id in processing {
            outcome.checked += 1;

            match self.source.status(&id).await {
                Ok(status) if status.is_terminal() => {
                    info!("Diagnostic {} is {}", id, status);
                    outcome.finished += 1;

                    match self.source.details(&id).await {
                        Ok(details) => refreshed.push(details),
                        Err(e) => {
                            warn!("Failed to refetch diagnostic {}: {}", id, e);
                            status_only.push((id, status));
                        }
                    }
                }
                Ok(DiagnosticStatus::Processing) => {
                    debug!("Diagnostic {} still processing", id);
                }
                Ok(status) => status_only.push((id, status)),
                Err(e) => {
                    outcome.failed_checks += 1;
                    warn!("Status check for diagnostic {} failed: {}", id, e);
                }
            }
        }

        let mut state = self.state.lock().await;
        for details in refreshed {
            match state.diagnostics.iter_mut().find(|d| d.id == details.id) {
                Some(existing) => *existing = details,
                None => state.diagnostics.push(details),
            }
        }
        for (id, status) in status_only {
            if let Some(existing) = state.diagnostics.iter_mut().find(|d| d.id == id) {
                existing.status = status;
            }
        }
        Self::sync_processing(&mut state);
        self.publish(&state);

        outcome
    }

    /// Submit a diagnostic for generation and start watching it.
    pub async fn submit(&self, diagnostic_id: &str) -> ApiResult<()> {
        self.source.submit(diagnostic_id).await?;
        info!("Submitted diagnostic {}", diagnostic_id);

        let mut state = self.state.lock().await;
        match state.diagnostics.iter_mut().find(|d| d.id == diagnostic_id) {
            Some(existing) => existing.status = DiagnosticStatus::Processing,
            None => state.diagnostics.push(Diagnostic {
                id: diagnostic_id.to_string(),
                engagement_id: Some(self.engagement_id.clone()),
                title: None,
                status: DiagnosticStatus::Processing,
                report: None,
                files: Vec::new(),
                updated_at: None,
            }),
        }
        Self::sync_processing(&mut state);
        self.publish(&state);
        drop(state);

        self.wake.notify_one();
        Ok(())
    }

    /// Run the poll loop on a background task.
    pub fn spawn(self: &Arc<Self>) -> PollerHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let poller = Arc::clone(self);

        let task = tokio::spawn(async move { poller.run(token).await });

        PollerHandle {
            cancel,
            task: Some(task),
        }
    }

    async fn run(&self, cancel: CancellationToken) {
        debug!("Poller started for engagement {}", self.engagement_id);

        loop {
            let delay = {
                let state = self.state.lock().await;
                self.schedule
                    .next_delay(state.processing_since, Instant::now())
            };

            match delay {
                Some(delay) => {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = self.wake.notified() => {
                            debug!("Woken by a submission, rescheduling");
                        }
                        _ = tokio::time::sleep(delay) => {
                            let outcome = self.poll_once().await;
                            debug!("Poll pass: {:?}", outcome);
                        }
                    }
                }
                None => {
                    debug!("Nothing processing, waiting for a submission");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = self.wake.notified() => {}
                    }
                }
            }
        }

        debug!("Poller stopped for engagement {}", self.engagement_id);
    }
}

/// Owns a running poll loop. Dropping the handle cancels the loop.
pub struct PollerHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Cancel the loop and wait for it to exit.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Poller task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use serde_json::json;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Scripted source: each status call pops the next entry (`None` is a
    /// failure); an empty script answers `processing`.
    #[derive(Default)]
    struct FakeDiagnosticSource {
        listed: Vec<Diagnostic>,
        statuses: std::sync::Mutex<VecDeque<Option<DiagnosticStatus>>>,
        details: HashMap<String, Diagnostic>,
        status_calls: AtomicUsize,
        submitted: std::sync::Mutex<Vec<String>>,
    }

    impl FakeDiagnosticSource {
        fn script(self, statuses: Vec<Option<DiagnosticStatus>>) -> Self {
            *self.statuses.lock().unwrap() = statuses.into();
            self
        }

        fn status_calls(&self) -> usize {
            self.status_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DiagnosticSource for FakeDiagnosticSource {
        async fn list(&self, _engagement_id: &str) -> ApiResult<Vec<Diagnostic>> {
            Ok(self.listed.clone())
        }

        async fn status(&self, _diagnostic_id: &str) -> ApiResult<DiagnosticStatus> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            match self.statuses.lock().unwrap().pop_front() {
                Some(Some(status)) => Ok(status),
                Some(None) => Err(ApiError::Connect("http://fake".to_string())),
                None => Ok(DiagnosticStatus::Processing),
            }
        }

        async fn details(&self, diagnostic_id: &str) -> ApiResult<Diagnostic> {
            self.details
                .get(diagnostic_id)
                .cloned()
                .ok_or_else(|| ApiError::from_status(404, "missing".to_string()))
        }

        async fn submit(&self, diagnostic_id: &str) -> ApiResult<()> {
            self.submitted
                .lock()
                .unwrap()
                .push(diagnostic_id.to_string());
            Ok(())
        }
    }

    fn upload() -> FileMeta {
        FileMeta {
            id: Some("f1".to_string()),
            name: "intake.pdf".to_string(),
            size: 2048,
            uploaded_by: Some("Client".to_string()),
            tag: Some("intake".to_string()),
            url: None,
        }
    }

    fn diagnostic(id: &str, status: DiagnosticStatus) -> Diagnostic {
        Diagnostic {
            id: id.to_string(),
            engagement_id: Some("e1".to_string()),
            title: Some("Readiness".to_string()),
            status,
            report: None,
            files: vec![upload()],
            updated_at: None,
        }
    }

    fn completed_with_report(id: &str) -> Diagnostic {
        Diagnostic {
            report: Some(json!({"file": {"id": "r1", "file_name": "Strategy Report.pdf"}})),
            ..diagnostic(id, DiagnosticStatus::Completed)
        }
    }

    fn poller(source: FakeDiagnosticSource) -> (Arc<FakeDiagnosticSource>, Arc<DiagnosticPoller>) {
        let source = Arc::new(source);
        let poller = Arc::new(DiagnosticPoller::new(
            source.clone(),
            "e1",
            PollSchedule::default(),
        ));
        (source, poller)
    }

    #[tokio::test]
    async fn test_completion_adds_report_exactly_once() {
        let (_, poller) = poller(
            FakeDiagnosticSource {
                listed: vec![diagnostic("d1", DiagnosticStatus::Processing)],
                details: HashMap::from([("d1".to_string(), completed_with_report("d1"))]),
                ..FakeDiagnosticSource::default()
            }
            .script(vec![Some(DiagnosticStatus::Completed)]),
        );

        poller.load().await.unwrap();
        assert_eq!(poller.snapshot().processing, 1);
        assert_eq!(poller.snapshot().files.len(), 1);

        let outcome = poller.poll_once().await;
        assert_eq!(outcome.checked, 1);
        assert_eq!(outcome.finished, 1);

        // Further passes have nothing to check and must not duplicate files.
        let outcome = poller.poll_once().await;
        assert_eq!(outcome.checked, 0);

        let snapshot = poller.snapshot();
        assert_eq!(snapshot.processing, 0);
        let reports = snapshot
            .files
            .iter()
            .filter(|f| f.name == "Strategy Report.pdf")
            .count();
        assert_eq!(reports, 1);
        assert_eq!(snapshot.files.len(), 2);
    }

    #[tokio::test]
    async fn test_status_failure_is_retried() {
        let (_, poller) = poller(
            FakeDiagnosticSource {
                listed: vec![diagnostic("d1", DiagnosticStatus::Processing)],
                details: HashMap::from([("d1".to_string(), completed_with_report("d1"))]),
                ..FakeDiagnosticSource::default()
            }
            .script(vec![None, Some(DiagnosticStatus::Completed)]),
        );
        poller.load().await.unwrap();

        let first = poller.poll_once().await;
        assert_eq!(first.failed_checks, 1);
        assert_eq!(poller.snapshot().processing, 1);

        let second = poller.poll_once().await;
        assert_eq!(second.finished, 1);
        assert_eq!(poller.snapshot().processing, 0);
    }

    #[tokio::test]
    async fn test_failed_details_still_records_terminal_status() {
        let (_, poller) = poller(
            FakeDiagnosticSource {
                listed: vec![diagnostic("d1", DiagnosticStatus::Processing)],
                ..FakeDiagnosticSource::default()
            }
            .script(vec![Some(DiagnosticStatus::Failed)]),
        );
        poller.load().await.unwrap();
        poller.poll_once().await;

        let snapshot = poller.snapshot();
        assert_eq!(snapshot.diagnostics[0].status, DiagnosticStatus::Failed);
        assert_eq!(snapshot.processing, 0);
    }

    #[tokio::test]
    async fn test_in_flight_guard_skips_overlapping_fetches() {
        let (source, poller) = poller(FakeDiagnosticSource {
            listed: vec![diagnostic("d1", DiagnosticStatus::Processing)],
            ..FakeDiagnosticSource::default()
        });
        poller.load().await.unwrap();

        let guard = poller.try_begin().expect("guard should be free");
        assert!(poller.poll_once().await.skipped);
        assert!(!poller.load().await.unwrap());
        assert_eq!(source.status_calls(), 0);

        drop(guard);
        assert!(!poller.poll_once().await.skipped);
        assert_eq!(source.status_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_stops_once_nothing_processing() {
        let (source, poller) = poller(
            FakeDiagnosticSource {
                listed: vec![diagnostic("d1", DiagnosticStatus::Processing)],
                details: HashMap::from([("d1".to_string(), completed_with_report("d1"))]),
                ..FakeDiagnosticSource::default()
            }
            .script(vec![
                Some(DiagnosticStatus::Processing),
                Some(DiagnosticStatus::Completed),
            ]),
        );
        poller.load().await.unwrap();

        let handle = poller.spawn();
        tokio::time::sleep(Duration::from_secs(300)).await;

        assert_eq!(source.status_calls(), 2);
        assert_eq!(poller.snapshot().processing, 0);
        assert!(handle.is_running());
        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_falls_back_to_slow_interval() {
        let (source, poller) = poller(FakeDiagnosticSource {
            listed: vec![diagnostic("d1", DiagnosticStatus::Processing)],
            ..FakeDiagnosticSource::default()
        });
        poller.load().await.unwrap();

        let handle = poller.spawn();

        tokio::time::sleep(Duration::from_secs(121)).await;
        let fast_calls = source.status_calls();
        assert!((23..=24).contains(&fast_calls), "fast calls: {}", fast_calls);

        tokio::time::sleep(Duration::from_secs(60)).await;
        let slow_calls = source.status_calls() - fast_calls;
        assert!((2..=3).contains(&slow_calls), "slow calls: {}", slow_calls);

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_wakes_idle_poller() {
        let (source, poller) = poller(
            FakeDiagnosticSource {
                listed: vec![diagnostic("d1", DiagnosticStatus::Draft)],
                details: HashMap::from([("d1".to_string(), completed_with_report("d1"))]),
                ..FakeDiagnosticSource::default()
            }
            .script(vec![Some(DiagnosticStatus::Completed)]),
        );
        poller.load().await.unwrap();
        let mut updates = poller.subscribe();

        let handle = poller.spawn();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.status_calls(), 0);

        poller.submit("d1").await.unwrap();
        assert_eq!(updates.borrow_and_update().processing, 1);
        assert_eq!(*source.submitted.lock().unwrap(), vec!["d1".to_string()]);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(source.status_calls(), 1);
        assert!(updates.has_changed().unwrap());
        assert_eq!(
            updates.borrow_and_update().diagnostics[0].status,
            DiagnosticStatus::Completed
        );

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(source.status_calls(), 1);
        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_submission_during_slow_phase_restarts_fast_polling() {
        let (source, poller) = poller(FakeDiagnosticSource {
            listed: vec![
                diagnostic("d1", DiagnosticStatus::Processing),
                diagnostic("d2", DiagnosticStatus::Draft),
            ],
            ..FakeDiagnosticSource::default()
        });
        poller.load().await.unwrap();
        let handle = poller.spawn();

        // Past the fast window: d1 is now polled every 30s.
        tokio::time::sleep(Duration::from_secs(160)).await;
        let before = source.status_calls();

        poller.submit("d2").await.unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;

        assert!(
            source.status_calls() > before,
            "no status check within 6s of submitting"
        );
        assert_eq!(poller.snapshot().processing, 2);

        // Both diagnostics are back on the fast interval.
        let calls = source.status_calls();
        tokio::time::sleep(Duration::from_secs(120)).await;
        let fast_calls = source.status_calls() - calls;
        assert!(fast_calls >= 40, "fast calls after submit: {}", fast_calls);

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_cancels_loop() {
        let (source, poller) = poller(FakeDiagnosticSource {
            listed: vec![diagnostic("d1", DiagnosticStatus::Processing)],
            ..FakeDiagnosticSource::default()
        });
        poller.load().await.unwrap();

        drop(poller.spawn());
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(source.status_calls(), 0);
    }
}
