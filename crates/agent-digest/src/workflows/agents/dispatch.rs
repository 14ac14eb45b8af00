//! Batch run: one pass over the subscriber list, one independent pipeline per subscriber.

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};

use super::digest::DigestComposer;
use super::directory::{DirectoryError, SubscriberDirectory};
use super::domain::{DomainSite, Subscriber};
use super::indices::select_indices;
use super::mail::{DeliveryError, NotificationSender, OutboundMail};
use super::query;
use super::render::{DigestRenderer, RenderError, DIGEST_TEMPLATE};
use super::search::{SearchError, SearchGateway, SearchResult};
use super::translations::{TranslationCatalog, TranslationError, TranslationLoader};
use crate::config::{AppConfig, AppEnvironment};

/// Bounded retry with doubling backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
        }
    }

    /// Delay before attempt `attempt + 1`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff.saturating_mul(1 << exponent)
    }
}

/// Everything a run needs to know besides its collaborators.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub environment: AppEnvironment,
    pub force: bool,
    pub domain: DomainSite,
    pub index_prefix: String,
    pub from_address: String,
    pub concurrency: usize,
    pub search_timeout: Duration,
    pub mail_timeout: Duration,
    pub retry: RetryPolicy,
}

impl RunConfig {
    pub fn from_app(config: &AppConfig, force: bool) -> Self {
        Self {
            environment: config.environment,
            force,
            domain: config.domain.clone(),
            index_prefix: config.search.index_prefix.clone(),
            from_address: config.mail.from_address.clone(),
            concurrency: config.dispatch.concurrency,
            search_timeout: config.search.timeout,
            mail_timeout: config.mail.timeout,
            retry: RetryPolicy {
                max_attempts: config.dispatch.max_attempts,
                initial_backoff: config.dispatch.initial_backoff,
            },
        }
    }

    /// Runs only in production unless forced.
    pub fn gate_open(&self) -> bool {
        self.force || self.environment == AppEnvironment::Production
    }
}

/// Collaborators injected into the dispatcher.
#[derive(Clone)]
pub struct DispatchPorts {
    pub directory: Arc<dyn SubscriberDirectory>,
    pub translations: Arc<dyn TranslationLoader>,
    pub search: Arc<dyn SearchGateway>,
    pub renderer: Arc<dyn DigestRenderer>,
    pub sender: Arc<dyn NotificationSender>,
    pub composer: DigestComposer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Aborted,
}

#[derive(Debug, thiserror::Error)]
pub enum SubscriberFailure {
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

#[derive(Debug)]
pub enum SubscriberOutcome {
    Sent,
    NoMatches,
    Unconfirmed,
    /// Same subscriber appeared earlier in this run.
    Duplicate,
    Cancelled,
    Failed(SubscriberFailure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub subscriber_id: i64,
    pub reason: String,
}

/// End-of-run tally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub run_id: String,
    pub sent: usize,
    pub no_matches: usize,
    pub unconfirmed: usize,
    pub duplicates: usize,
    pub cancelled: usize,
    pub failures: Vec<FailureRecord>,
}

impl RunReport {
    fn new(run_id: String) -> Self {
        Self {
            run_id,
            sent: 0,
            no_matches: 0,
            unconfirmed: 0,
            duplicates: 0,
            cancelled: 0,
            failures: Vec::new(),
        }
    }

    fn record(&mut self, subscriber_id: i64, outcome: SubscriberOutcome) {
        match outcome {
            SubscriberOutcome::Sent => self.sent += 1,
            SubscriberOutcome::NoMatches => self.no_matches += 1,
            SubscriberOutcome::Unconfirmed => self.unconfirmed += 1,
            SubscriberOutcome::Duplicate => self.duplicates += 1,
            SubscriberOutcome::Cancelled => self.cancelled += 1,
            SubscriberOutcome::Failed(failure) => self.failures.push(FailureRecord {
                subscriber_id,
                reason: failure.to_string(),
            }),
        }
    }

    pub fn skipped(&self) -> usize {
        self.no_matches + self.unconfirmed + self.duplicates + self.cancelled
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Environment gate closed; nothing was touched.
    Gated { environment: AppEnvironment },
    Completed(RunReport),
}

/// Run-level failures. Per-subscriber errors never surface here.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Configuration(#[from] TranslationError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Raising the flag stops new subscriber pipelines from starting.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Dedupe keys already claimed during one run.
#[derive(Debug, Default)]
struct DeliveryLedger {
    keys: Mutex<HashSet<String>>,
}

impl DeliveryLedger {
    /// Returns false when the key was claimed before.
    fn claim(&self, key: &str) -> bool {
        let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        keys.insert(key.to_string())
    }
}

struct RunContext<'a> {
    run_id: String,
    now: DateTime<Utc>,
    today: NaiveDate,
    catalog: &'a TranslationCatalog,
    ledger: DeliveryLedger,
}

pub struct Dispatcher {
    config: RunConfig,
    ports: DispatchPorts,
    state: Mutex<RunState>,
    stop: StopHandle,
}

impl Dispatcher {
    pub fn new(config: RunConfig, ports: DispatchPorts) -> Self {
        Self {
            config,
            ports,
            state: Mutex::new(RunState::Idle),
            stop: StopHandle::default(),
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn state(&self) -> RunState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    fn transition(&self, next: RunState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = *state;
        debug!(from = ?previous, to = ?next, "dispatcher state change");
        *state = next;
    }

    pub async fn run(&self) -> Result<RunOutcome, DispatchError> {
        self.run_at(Local::now()).await
    }

    pub async fn run_at(&self, now: DateTime<Local>) -> Result<RunOutcome, DispatchError> {
        if !self.config.gate_open() {
            info!(
                environment = self.config.environment.label(),
                "agent mailing skipped outside production"
            );
            return Ok(RunOutcome::Gated {
                environment: self.config.environment,
            });
        }

        self.transition(RunState::Running);
        info!(
            started_at = %now.format("%Y-%m-%d %H:%M:%S"),
            domain = %self.config.domain.name,
            "agent email sending started"
        );

        let prepared = self.prepare().await;
        let (catalog, subscribers) = match prepared {
            Ok(prepared) => prepared,
            Err(err) => {
                self.transition(RunState::Aborted);
                error!(error = %err, "agent email sending aborted");
                return Err(err);
            }
        };

        let run = RunContext {
            run_id: now.format("%Y%m%d%H%M%S").to_string(),
            now: now.with_timezone(&Utc),
            today: now.date_naive(),
            catalog: &catalog,
            ledger: DeliveryLedger::default(),
        };

        let outcomes: Vec<(i64, SubscriberOutcome)> = stream::iter(subscribers.iter())
            .map(|subscriber| {
                let run = &run;
                async move { (subscriber.id, self.process(subscriber, run).await) }
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        let mut report = RunReport::new(run.run_id.clone());
        for (subscriber_id, outcome) in outcomes {
            report.record(subscriber_id, outcome);
        }

        self.transition(RunState::Completed);
        info!(
            ended_at = %Local::now().format("%Y-%m-%d %H:%M:%S"),
            sent = report.sent,
            skipped = report.skipped(),
            failed = report.failed(),
            "agent email sending ended"
        );

        Ok(RunOutcome::Completed(report))
    }

    async fn prepare(&self) -> Result<(TranslationCatalog, Vec<Subscriber>), DispatchError> {
        let catalog = self
            .ports
            .translations
            .load(&self.config.domain.language)?;
        let subscribers = self.ports.directory.active_subscribers().await?;
        Ok((catalog, subscribers))
    }

    async fn process(&self, subscriber: &Subscriber, run: &RunContext<'_>) -> SubscriberOutcome {
        if self.stop.is_stopped() {
            return SubscriberOutcome::Cancelled;
        }
        if !subscriber.is_confirmed() {
            return SubscriberOutcome::Unconfirmed;
        }

        let dedupe_key = format!("{}:{}", run.run_id, subscriber.id);
        if !run.ledger.claim(&dedupe_key) {
            return SubscriberOutcome::Duplicate;
        }

        info!(
            subscriber_id = subscriber.id,
            email = %subscriber.email.address,
            digest_type = subscriber.digest_type.label(),
            "processing agent"
        );

        match self.deliver(subscriber, run, dedupe_key).await {
            Ok(outcome) => outcome,
            Err(failure) => {
                warn!(subscriber_id = subscriber.id, error = %failure, "agent digest failed");
                SubscriberOutcome::Failed(failure)
            }
        }
    }

    async fn deliver(
        &self,
        subscriber: &Subscriber,
        run: &RunContext<'_>,
        dedupe_key: String,
    ) -> Result<SubscriberOutcome, SubscriberFailure> {
        let request = query::compile(subscriber, self.config.domain.id, run.now);
        let indices = select_indices(&self.config.index_prefix, &subscriber.languages);

        let SearchResult { total_hits, hits } = with_retry(
            self.config.retry,
            self.config.search_timeout,
            || SearchError::Timeout,
            SearchError::is_retryable,
            || self.ports.search.execute(&indices, &request),
        )
        .await?;

        info!(subscriber_id = subscriber.id, total_hits, "listings found");
        if total_hits == 0 {
            return Ok(SubscriberOutcome::NoMatches);
        }

        let digest = self.ports.composer.compose(
            subscriber,
            total_hits,
            hits,
            run.catalog,
            &self.config.domain,
            run.today,
        );
        let html = self
            .ports
            .renderer
            .render(DIGEST_TEMPLATE, &digest.template_params())?;

        let mail = OutboundMail {
            from: self.config.from_address.clone(),
            to: digest.recipient,
            subject: digest.subject,
            text: None,
            html,
            images: digest.images,
            tags: digest.tags,
            dedupe_key,
        };

        with_retry(
            self.config.retry,
            self.config.mail_timeout,
            || DeliveryError::Timeout,
            DeliveryError::is_retryable,
            || self.ports.sender.send(&mail),
        )
        .await?;

        Ok(SubscriberOutcome::Sent)
    }
}

/// Runs `call` under `limit`, retrying errors `is_retryable` accepts until the policy is spent.
async fn with_retry<T, E, F, Fut>(
    policy: RetryPolicy,
    limit: Duration,
    on_timeout: fn() -> E,
    is_retryable: fn(&E) -> bool,
    mut call: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 1;
    loop {
        let result = match tokio::time::timeout(limit, call()).await {
            Ok(result) => result,
            Err(_) => Err(on_timeout()),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_attempts && is_retryable(&err) => {
                let delay = policy.backoff(attempt);
                debug!(attempt, ?delay, error = %err, "retrying after transient failure");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
