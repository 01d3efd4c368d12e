//! The certificate view-model controller.
//!
//! One [`Dashboard`] actor owns the cached certificate collection for a
//! session. All cache reads and writes happen on the actor task, so no
//! locking is needed; gateway calls run as spawned tasks and report back as
//! events, applied in completion order. Each fetch replaces the collection
//! wholesale (the service is the source of truth), so last writer wins.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use certwatch_client::{CertificateApi, GatewayError};
use certwatch_common::filter::FilterState;
use certwatch_common::params::ImportRow;
use certwatch_common::stats::CertificateStats;
use certwatch_common::views::CertificateRecord;

#[derive(Debug, Error)]
pub enum ControllerError {
    /// Another mutation for the same certificate is still in flight.
    #[error("another operation for this certificate is still in progress")]
    Busy,

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// The dashboard session has ended; the request was never issued.
    #[error("dashboard session closed")]
    Closed,
}

/// A write operation requested by the presentation layer.
#[derive(Debug, Clone)]
pub enum MutationIntent {
    Add { protocol: String, domain: String, port: Option<u16> },
    Delete { id: u64 },
    Refresh { id: u64 },
    Import { rows: Vec<ImportRow> },
}

impl MutationIntent {
    /// The record a mutation targets. `Add` and `Import` create records the
    /// client has no id for yet; conflicts there are the service's problem.
    fn target_id(&self) -> Option<u64> {
        match self {
            MutationIntent::Delete { id } | MutationIntent::Refresh { id } => Some(*id),
            MutationIntent::Add { .. } | MutationIntent::Import { .. } => None,
        }
    }
}

/// The derived projection handed to the presentation layer.
#[derive(Debug, Clone, Default)]
pub struct DashboardView {
    /// The cached collection with the current filter applied.
    pub records: Vec<CertificateRecord>,

    /// Stats over the whole cached collection, not the filtered subset.
    pub stats: CertificateStats,

    /// True until the first fetch lands; transient re-fetches do not blank
    /// an already-populated view.
    pub loading: bool,

    pub mutating: bool,

    /// Message from the most recent failed fetch or mutation, cleared by
    /// the next successful fetch.
    pub last_error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DashboardOptions {
    pub poll_interval: Duration,
    pub refresh_refetch_delay: Duration,
}

impl Default for DashboardOptions {
    fn default() -> Self {
        DashboardOptions {
            poll_interval: Duration::from_secs(300),
            refresh_refetch_delay: Duration::from_secs(2),
        }
    }
}

enum Command {
    SetFilter(FilterState),
    Mutate(MutationIntent, oneshot::Sender<Result<String, ControllerError>>),
}

enum Event {
    FetchDone(Result<Vec<CertificateRecord>, GatewayError>),
    MutationDone { id: Option<u64>, failure: Option<String>, refetch: Duration },
    RefetchDue,
}

/// Cheap handle to a running dashboard session. All methods go through the
/// actor's command channel; once the session's cancellation token fires the
/// actor is gone and every call returns [`ControllerError::Closed`].
#[derive(Clone)]
pub struct DashboardHandle {
    cmd_tx: mpsc::Sender<Command>,
    view_rx: watch::Receiver<DashboardView>,
}

impl DashboardHandle {
    /// Snapshot of the current derived view.
    pub fn view(&self) -> DashboardView {
        self.view_rx.borrow().clone()
    }

    /// Receiver that yields a change notification for every view update.
    pub fn views(&self) -> watch::Receiver<DashboardView> {
        self.view_rx.clone()
    }

    pub async fn set_filter(&self, filter: FilterState) -> Result<(), ControllerError> {
        self.cmd_tx
            .send(Command::SetFilter(filter))
            .await
            .map_err(|_| ControllerError::Closed)
    }

    /// Issue a mutation and wait for its outcome. The returned string is the
    /// user-facing success message for the action.
    pub async fn mutate(&self, intent: MutationIntent) -> Result<String, ControllerError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Mutate(intent, tx))
            .await
            .map_err(|_| ControllerError::Closed)?;
        rx.await.map_err(|_| ControllerError::Closed)?
    }

    pub async fn add(
        &self,
        protocol: String,
        domain: String,
        port: Option<u16>,
    ) -> Result<String, ControllerError> {
        self.mutate(MutationIntent::Add { protocol, domain, port }).await
    }

    pub async fn delete(&self, id: u64) -> Result<String, ControllerError> {
        self.mutate(MutationIntent::Delete { id }).await
    }

    pub async fn refresh(&self, id: u64) -> Result<String, ControllerError> {
        self.mutate(MutationIntent::Refresh { id }).await
    }

    pub async fn import(&self, rows: Vec<ImportRow>) -> Result<String, ControllerError> {
        self.mutate(MutationIntent::Import { rows }).await
    }
}

pub struct Dashboard {
    api: Arc<dyn CertificateApi>,
    options: DashboardOptions,

    records: Vec<CertificateRecord>,
    filter: FilterState,
    loaded_once: bool,
    last_error: Option<String>,

    /// Ids with a mutation in flight. A second mutation on a busy id is
    /// rejected; mutations on distinct ids run concurrently.
    busy: HashSet<u64>,
    mutations_in_flight: usize,
    fetches_in_flight: usize,

    view_tx: watch::Sender<DashboardView>,
}

impl Dashboard {
    /// Start a session actor. It runs until `cancel` fires or every handle
    /// is dropped; in-flight gateway completions after that point are
    /// discarded, never applied to a dead view.
    pub fn spawn(
        api: Arc<dyn CertificateApi>,
        options: DashboardOptions,
        cancel: CancellationToken,
    ) -> DashboardHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (view_tx, view_rx) = watch::channel(DashboardView {
            loading: true,
            ..Default::default()
        });

        let dashboard = Dashboard {
            api,
            options,
            records: Vec::new(),
            filter: FilterState::default(),
            loaded_once: false,
            last_error: None,
            busy: HashSet::new(),
            mutations_in_flight: 0,
            fetches_in_flight: 0,
            view_tx,
        };
        tokio::spawn(dashboard.run(cmd_rx, cancel));

        DashboardHandle { cmd_tx, view_rx }
    }

    async fn run(mut self, mut cmd_rx: mpsc::Receiver<Command>, cancel: CancellationToken) {
        // Dropping the set on teardown aborts everything still in flight,
        // so late completions can never touch a dead view.
        let mut tasks: JoinSet<Event> = JoinSet::new();

        // First poll tick only after one full interval; the initial load is
        // issued here.
        let mut poll = tokio::time::interval_at(
            Instant::now() + self.options.poll_interval,
            self.options.poll_interval,
        );
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        self.spawn_fetch(&mut tasks);
        self.publish();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("session cancelled, dropping in-flight work");
                    break;
                }
                cmd = cmd_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd, &mut tasks),
                    None => break,
                },
                _ = poll.tick() => {
                    // A fetch already in flight is not queued behind.
                    if self.fetches_in_flight == 0 {
                        self.spawn_fetch(&mut tasks);
                        self.publish();
                    } else {
                        debug!("poll tick skipped, fetch in flight");
                    }
                }
                Some(joined) = tasks.join_next() => match joined {
                    Ok(event) => {
                        self.handle_event(event, &mut tasks);
                        self.publish();
                    }
                    Err(err) => error!("dashboard task failed: {err}"),
                },
            }
        }
    }

    fn handle_command(&mut self, cmd: Command, tasks: &mut JoinSet<Event>) {
        match cmd {
            Command::SetFilter(filter) => {
                self.filter = filter;
                self.publish();
            }
            Command::Mutate(intent, reply) => {
                if let Some(id) = intent.target_id() {
                    if self.busy.contains(&id) {
                        let _ = reply.send(Err(ControllerError::Busy));
                        return;
                    }
                    self.busy.insert(id);
                }

                // A triggered re-check completes asynchronously on the
                // service side, so its re-fetch waits out the configured
                // delay; other mutations re-fetch immediately.
                let refetch = match &intent {
                    MutationIntent::Refresh { .. } => self.options.refresh_refetch_delay,
                    _ => Duration::ZERO,
                };
                let id = intent.target_id();
                let api = self.api.clone();

                self.mutations_in_flight += 1;
                tasks.spawn(async move {
                    let result = execute(api, intent).await;
                    let failure = result.as_ref().err().map(ToString::to_string);
                    let _ = reply.send(result.map_err(ControllerError::from));
                    Event::MutationDone { id, failure, refetch }
                });
                self.publish();
            }
        }
    }

    fn handle_event(&mut self, event: Event, tasks: &mut JoinSet<Event>) {
        match event {
            Event::FetchDone(result) => {
                self.fetches_in_flight -= 1;
                match result {
                    Ok(records) => {
                        info!(count = records.len(), "certificate collection refreshed");
                        self.records = records;
                        self.loaded_once = true;
                        self.last_error = None;
                    }
                    Err(err) => {
                        // Stale-but-present beats empty: keep the last-known
                        // good collection.
                        warn!("fetch failed: {err}");
                        self.last_error = Some(err.to_string());
                    }
                }
            }
            Event::MutationDone { id, failure, refetch } => {
                self.mutations_in_flight -= 1;
                if let Some(id) = id {
                    self.busy.remove(&id);
                }
                match failure {
                    None if refetch.is_zero() => self.spawn_fetch(tasks),
                    None => {
                        tasks.spawn(async move {
                            tokio::time::sleep(refetch).await;
                            Event::RefetchDue
                        });
                    }
                    Some(message) => {
                        warn!("mutation failed: {message}");
                        self.last_error = Some(message);
                    }
                }
            }
            Event::RefetchDue => self.spawn_fetch(tasks),
        }
    }

    fn spawn_fetch(&mut self, tasks: &mut JoinSet<Event>) {
        self.fetches_in_flight += 1;
        let api = self.api.clone();
        tasks.spawn(async move { Event::FetchDone(api.fetch_all().await) });
    }

    fn publish(&self) {
        let now = Utc::now();
        let view = DashboardView {
            records: self.filter.apply(&self.records, now),
            stats: CertificateStats::compute(&self.records, now),
            loading: self.fetches_in_flight > 0 && !self.loaded_once,
            mutating: self.mutations_in_flight > 0,
            last_error: self.last_error.clone(),
        };
        let _ = self.view_tx.send(view);
    }
}

async fn execute(
    api: Arc<dyn CertificateApi>,
    intent: MutationIntent,
) -> Result<String, GatewayError> {
    match intent {
        MutationIntent::Add { protocol, domain, port } => {
            let record = api.add(&protocol, &domain, port).await?;
            Ok(format!("{} added for monitoring", record.url))
        }
        MutationIntent::Delete { id } => {
            api.delete(id).await?;
            Ok("certificate deleted".into())
        }
        MutationIntent::Refresh { id } => {
            api.refresh(id).await?;
            Ok("certificate check triggered".into())
        }
        MutationIntent::Import { rows } => {
            let summary = api.import_bulk(&rows).await?;
            Ok(summary.to_string())
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;

    use certwatch_common::filter::StatusFilter;
    use certwatch_common::views::{CertificateStatus, ImportSummary};

    use super::*;

    struct MockApi {
        records: Mutex<Vec<CertificateRecord>>,
        fetch_calls: AtomicUsize,
        fetch_delay: Duration,
        mutation_delay: Duration,
    }

    impl MockApi {
        fn with_records(records: Vec<CertificateRecord>) -> Self {
            MockApi {
                records: Mutex::new(records),
                fetch_calls: AtomicUsize::new(0),
                fetch_delay: Duration::ZERO,
                mutation_delay: Duration::ZERO,
            }
        }

        fn fetch_calls(&self) -> usize {
            self.fetch_calls.load(Ordering::SeqCst)
        }

        fn contains(&self, id: u64) -> bool {
            self.records.lock().unwrap().iter().any(|r| r.id == id)
        }
    }

    #[async_trait]
    impl CertificateApi for MockApi {
        async fn fetch_all(&self) -> Result<Vec<CertificateRecord>, GatewayError> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.fetch_delay).await;
            Ok(self.records.lock().unwrap().clone())
        }

        async fn add(
            &self,
            protocol: &str,
            domain: &str,
            port: Option<u16>,
        ) -> Result<CertificateRecord, GatewayError> {
            tokio::time::sleep(self.mutation_delay).await;
            let url = certwatch_client::canonical_url(protocol, domain, port)?;
            let mut records = self.records.lock().unwrap();
            if records.iter().any(|r| r.url == url) {
                return Err(GatewayError::Conflict("URL already exists".into()));
            }
            let id = records.iter().map(|r| r.id).max().unwrap_or(0) + 1;
            let record = test_record(id, CertificateStatus::Pending, None);
            records.push(record.clone());
            Ok(record)
        }

        async fn delete(&self, id: u64) -> Result<(), GatewayError> {
            tokio::time::sleep(self.mutation_delay).await;
            let mut records = self.records.lock().unwrap();
            let before = records.len();
            records.retain(|r| r.id != id);
            if records.len() == before {
                return Err(GatewayError::NotFound("Certificate not found".into()));
            }
            Ok(())
        }

        async fn refresh(&self, id: u64) -> Result<(), GatewayError> {
            tokio::time::sleep(self.mutation_delay).await;
            if !self.records.lock().unwrap().iter().any(|r| r.id == id) {
                return Err(GatewayError::NotFound("Certificate not found".into()));
            }
            Ok(())
        }

        async fn import_bulk(&self, rows: &[ImportRow]) -> Result<ImportSummary, GatewayError> {
            tokio::time::sleep(self.mutation_delay).await;
            Ok(ImportSummary { added: rows.len() as u64, skipped: 0, errors: vec![] })
        }
    }

    fn test_record(id: u64, status: CertificateStatus, days: Option<i64>) -> CertificateRecord {
        CertificateRecord {
            id,
            url: format!("https://host-{id}.example.com"),
            subject: Some(format!("host-{id}.example.com")),
            issuer: Some("Example CA".into()),
            serial_number: None,
            valid_from: None,
            valid_until: days.map(|d| Utc::now() + ChronoDuration::days(d)),
            last_checked: None,
            days_remaining: days,
            status,
        }
    }

    fn fixture() -> Vec<CertificateRecord> {
        vec![
            test_record(1, CertificateStatus::Valid, Some(5)),
            test_record(2, CertificateStatus::Valid, Some(90)),
            test_record(3, CertificateStatus::Expired, None),
        ]
    }

    async fn settle() {
        // Paused-clock runtimes auto-advance once every task is idle, so a
        // short sleep lets the actor drain its queues deterministically.
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn initial_fetch_populates_view_and_stats() {
        let api = Arc::new(MockApi::with_records(fixture()));
        let handle = Dashboard::spawn(api, DashboardOptions::default(), CancellationToken::new());

        settle().await;
        let view = handle.view();
        assert!(!view.loading);
        assert_eq!(view.records.len(), 3);
        assert_eq!(view.stats.total, 3);
        assert_eq!(view.stats.valid, 2);
        assert_eq!(view.stats.expired, 1);
        assert_eq!(view.stats.expiring, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn set_filter_re_derives_the_view_without_a_fetch() {
        let api = Arc::new(MockApi::with_records(fixture()));
        let handle =
            Dashboard::spawn(api.clone(), DashboardOptions::default(), CancellationToken::new());
        settle().await;

        handle
            .set_filter(FilterState { status: StatusFilter::Expired, ..Default::default() })
            .await
            .unwrap();
        settle().await;

        let view = handle.view();
        assert_eq!(view.records.len(), 1);
        assert_eq!(view.records[0].id, 3);
        // Stats stay collection-wide.
        assert_eq!(view.stats.total, 3);
        assert_eq!(api.fetch_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn delete_re_fetches_immediately_on_success() {
        let api = Arc::new(MockApi::with_records(fixture()));
        let handle =
            Dashboard::spawn(api.clone(), DashboardOptions::default(), CancellationToken::new());
        settle().await;

        let message = handle.delete(2).await.unwrap();
        assert_eq!(message, "certificate deleted");
        settle().await;

        assert_eq!(api.fetch_calls(), 2);
        let view = handle.view();
        assert_eq!(view.stats.total, 2);
        assert!(view.records.iter().all(|r| r.id != 2));
    }

    #[tokio::test(start_paused = true)]
    async fn second_mutation_on_a_busy_id_is_rejected() {
        let mut api = MockApi::with_records(fixture());
        api.mutation_delay = Duration::from_secs(60);
        let api = Arc::new(api);
        let handle =
            Dashboard::spawn(api.clone(), DashboardOptions::default(), CancellationToken::new());
        settle().await;

        let first = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.delete(1).await })
        };
        settle().await;

        // First delete is in flight; a second on the same id bounces.
        let err = handle.delete(1).await.unwrap_err();
        assert!(matches!(err, ControllerError::Busy));

        // A mutation on a different id is independent.
        handle.refresh(2).await.unwrap();

        tokio::time::sleep(Duration::from_secs(61)).await;
        first.await.unwrap().unwrap();
        assert!(!api.contains(1));
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_on_unknown_id_surfaces_not_found_and_leaves_cache_alone() {
        let api = Arc::new(MockApi::with_records(fixture()));
        let handle =
            Dashboard::spawn(api.clone(), DashboardOptions::default(), CancellationToken::new());
        settle().await;

        let err = handle.refresh(99).await.unwrap_err();
        assert!(matches!(err, ControllerError::Gateway(GatewayError::NotFound(_))));

        // Failed mutations schedule no re-fetch and keep the cached view.
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(api.fetch_calls(), 1);
        assert_eq!(handle.view().stats.total, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_re_fetches_only_after_the_configured_delay() {
        let api = Arc::new(MockApi::with_records(fixture()));
        let handle =
            Dashboard::spawn(api.clone(), DashboardOptions::default(), CancellationToken::new());
        settle().await;

        handle.refresh(1).await.unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(api.fetch_calls(), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(api.fetch_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_tick_is_skipped_while_a_fetch_is_in_flight() {
        let mut api = MockApi::with_records(fixture());
        api.fetch_delay = Duration::from_secs(420);
        let api = Arc::new(api);
        let handle =
            Dashboard::spawn(api.clone(), DashboardOptions::default(), CancellationToken::new());
        settle().await;

        // Initial fetch runs until t=420s; the t=300s tick must not stack a
        // second fetch behind it.
        tokio::time::sleep(Duration::from_secs(310)).await;
        assert_eq!(api.fetch_calls(), 1);

        // The t=600s tick finds no fetch in flight and fires.
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(api.fetch_calls(), 2);

        drop(handle);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_failure_keeps_the_previous_collection() {
        struct FlakyApi {
            inner: MockApi,
            fail_from_call: usize,
        }

        #[async_trait]
        impl CertificateApi for FlakyApi {
            async fn fetch_all(&self) -> Result<Vec<CertificateRecord>, GatewayError> {
                let call = self.inner.fetch_calls.fetch_add(1, Ordering::SeqCst);
                if call >= self.fail_from_call {
                    return Err(GatewayError::Transport("connection refused".into()));
                }
                Ok(self.inner.records.lock().unwrap().clone())
            }
            async fn add(
                &self,
                protocol: &str,
                domain: &str,
                port: Option<u16>,
            ) -> Result<CertificateRecord, GatewayError> {
                self.inner.add(protocol, domain, port).await
            }
            async fn delete(&self, id: u64) -> Result<(), GatewayError> {
                self.inner.delete(id).await
            }
            async fn refresh(&self, id: u64) -> Result<(), GatewayError> {
                self.inner.refresh(id).await
            }
            async fn import_bulk(&self, rows: &[ImportRow]) -> Result<ImportSummary, GatewayError> {
                self.inner.import_bulk(rows).await
            }
        }

        let api = Arc::new(FlakyApi {
            inner: MockApi::with_records(fixture()),
            fail_from_call: 1,
        });
        let handle =
            Dashboard::spawn(api.clone(), DashboardOptions::default(), CancellationToken::new());
        settle().await;
        assert_eq!(handle.view().stats.total, 3);

        // Next poll fetch fails; the view keeps the stale collection and
        // reports the error.
        tokio::time::sleep(Duration::from_secs(301)).await;
        let view = handle.view();
        assert_eq!(view.stats.total, 3);
        assert!(view.last_error.as_deref().unwrap().contains("connection refused"));
        assert!(!view.loading);
    }

    #[tokio::test(start_paused = true)]
    async fn import_returns_the_service_summary_and_re_fetches() {
        let api = Arc::new(MockApi::with_records(fixture()));
        let handle =
            Dashboard::spawn(api.clone(), DashboardOptions::default(), CancellationToken::new());
        settle().await;

        let rows = vec![
            ImportRow { protocol: None, domain: "a.example.com".into(), port: None },
            ImportRow { protocol: None, domain: "b.example.com".into(), port: None },
        ];
        let message = handle.import(rows).await.unwrap();
        assert_eq!(message, "2 added, 0 skipped");
        settle().await;
        assert_eq!(api.fetch_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_discards_in_flight_completions() {
        let mut api = MockApi::with_records(fixture());
        api.mutation_delay = Duration::from_secs(60);
        let api = Arc::new(api);
        let cancel = CancellationToken::new();
        let handle = Dashboard::spawn(api.clone(), DashboardOptions::default(), cancel.clone());
        settle().await;

        let pending = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.delete(1).await })
        };
        settle().await;

        cancel.cancel();
        tokio::time::sleep(Duration::from_secs(61)).await;

        // The session is gone: the pending mutation resolves Closed and new
        // commands are refused.
        assert!(matches!(pending.await.unwrap(), Err(ControllerError::Closed)));
        assert!(matches!(handle.refresh(2).await, Err(ControllerError::Closed)));
    }
}
