use crate::browser::{BrowserError, ChromiumSession, UiPage};
use crate::config::AppConfig;
use crate::draft::{Auxiliary, ListingDraft, build_draft};
use crate::executor::{self, Executor, FlowInput, Halted, StepError};
use crate::models::{Advertisement, Marketplace, RunRequest, StepReport};
use crate::photos::PhotoStager;
use crate::pricing::{format_amount, quote};
use crate::rates::ExchangeRates;
use crate::resolver::{ResolveError, Resolver};
use crate::retry::{Backoff, WaitOutcome};
use crate::store::{AdvertisementStore, StoreError};
use serde::Serialize;
use std::{sync::Arc, time::Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{Span, debug, info, info_span, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Error)]
#[error("{stage}: {message}")]
pub struct PipelineError {
    stage: &'static str,
    message: String,
    kind: PipelineErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineErrorKind {
    /// An optional step failed; the advertisement carries on.
    RecoverableStep,
    /// The current advertisement is abandoned; the queue moves on.
    FatalAdvertisement,
    /// Not logged in or the browser is gone; the whole run stops.
    Session,
    /// A single download or lookup failed and was replaced by a fallback.
    TransientNetwork,
    InvalidInput,
    Internal,
}

impl PipelineError {
    fn new(stage: &'static str, message: impl Into<String>, kind: PipelineErrorKind) -> Self {
        Self {
            stage,
            message: message.into(),
            kind,
        }
    }

    pub fn invalid_input(stage: &'static str, message: impl Into<String>) -> Self {
        Self::new(stage, message, PipelineErrorKind::InvalidInput)
    }

    pub fn internal(stage: &'static str, message: impl Into<String>) -> Self {
        Self::new(stage, message, PipelineErrorKind::Internal)
    }

    pub fn session(stage: &'static str, message: impl Into<String>) -> Self {
        Self::new(stage, message, PipelineErrorKind::Session)
    }

    pub fn fatal(stage: &'static str, message: impl Into<String>) -> Self {
        Self::new(stage, message, PipelineErrorKind::FatalAdvertisement)
    }

    pub fn stage(&self) -> &'static str {
        self.stage
    }

    pub fn kind(&self) -> PipelineErrorKind {
        self.kind
    }

    pub fn detail(&self) -> &str {
        &self.message
    }
}

/// Logging context of one batch. Created by the controller and handed to the
/// executor so every line of a run shares the run id and marketplace.
#[derive(Debug, Clone)]
pub struct RunLog {
    run_id: Uuid,
    marketplace: Marketplace,
    span: Span,
}

impl RunLog {
    pub fn new(marketplace: Marketplace) -> Self {
        let run_id = Uuid::new_v4();
        let span = info_span!("publish_run", run_id = %run_id, marketplace = %marketplace);
        Self {
            run_id,
            marketplace,
            span,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn marketplace(&self) -> Marketplace {
        self.marketplace
    }

    pub fn step(&self, advertisement_id: i64, report: &StepReport) {
        info!(
            parent: &self.span,
            target = "hermes.executor",
            advertisement_id,
            step = %report.step,
            outcome = %report.outcome,
            elapsed_ms = report.elapsed_ms as u64,
            detail = report.detail.as_deref().unwrap_or(""),
            "step_finished"
        );
    }

    pub fn warning(&self, advertisement_id: i64, step: &str, message: &str) {
        warn!(
            parent: &self.span,
            target = "hermes.executor",
            advertisement_id,
            step,
            message,
            "step_warning"
        );
    }

    pub fn retry(&self, step: &str, attempt: u32, error: &str) {
        debug!(parent: &self.span, target = "hermes.executor", step, attempt, error, "step_retry");
    }

    fn advertisement(&self, report: &AdvertisementReport) {
        match report.status {
            AdvertisementStatus::Published => info!(
                parent: &self.span,
                target = "hermes.pipeline",
                advertisement_id = report.advertisement_id,
                warnings = report.warnings.len(),
                "advertisement_published"
            ),
            AdvertisementStatus::Failed | AdvertisementStatus::Rejected => warn!(
                parent: &self.span,
                target = "hermes.pipeline",
                advertisement_id = report.advertisement_id,
                status = ?report.status,
                stage = report.stage.unwrap_or(""),
                error = report.error.as_deref().unwrap_or(""),
                "advertisement_not_published"
            ),
        }
        crate::metrics::advertisement_finished(report.status.as_str());
    }

    fn tally(&self, summary: &RunSummary) {
        info!(
            parent: &self.span,
            target = "hermes.pipeline",
            attempted = summary.attempted,
            published = summary.published,
            failed = summary.failed,
            rejected = summary.rejected,
            warnings = summary.warnings,
            "run_finished"
        );
        crate::metrics::run_finished(self.marketplace.as_str(), summary.published, summary.failed);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvertisementStatus {
    Published,
    Failed,
    /// Ineligible before any page interaction.
    Rejected,
}

impl AdvertisementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdvertisementStatus::Published => "published",
            AdvertisementStatus::Failed => "failed",
            AdvertisementStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AdvertisementReport {
    pub advertisement_id: i64,
    pub status: AdvertisementStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whether the verification read-back matched the draft.
    pub verified: bool,
    pub warnings: Vec<String>,
    pub steps: Vec<StepReport>,
}

impl AdvertisementReport {
    fn rejected(advertisement_id: i64, error: &PipelineError) -> Self {
        Self::not_published(advertisement_id, AdvertisementStatus::Rejected, error)
    }

    fn failed(advertisement_id: i64, error: &PipelineError) -> Self {
        Self::not_published(advertisement_id, AdvertisementStatus::Failed, error)
    }

    fn not_published(
        advertisement_id: i64,
        status: AdvertisementStatus,
        error: &PipelineError,
    ) -> Self {
        Self {
            advertisement_id,
            status,
            stage: Some(error.stage()),
            error: Some(error.detail().to_string()),
            verified: false,
            warnings: Vec::new(),
            steps: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub marketplace: Marketplace,
    pub attempted: usize,
    pub published: usize,
    pub failed: usize,
    pub rejected: usize,
    pub warnings: usize,
    pub advertisements: Vec<AdvertisementReport>,
}

impl RunSummary {
    fn new(log: &RunLog) -> Self {
        Self {
            run_id: log.run_id(),
            marketplace: log.marketplace(),
            attempted: 0,
            published: 0,
            failed: 0,
            rejected: 0,
            warnings: 0,
            advertisements: Vec::new(),
        }
    }

    fn record(&mut self, report: AdvertisementReport) {
        self.attempted += 1;
        self.warnings += report.warnings.len();
        match report.status {
            AdvertisementStatus::Published => self.published += 1,
            AdvertisementStatus::Failed => self.failed += 1,
            AdvertisementStatus::Rejected => self.rejected += 1,
        }
        self.advertisements.push(report);
    }
}

/// Outer loop over the unpublished queue: one advertisement at a time on one
/// page, publish flag flipped only after a confirmed submission.
#[derive(Clone)]
pub struct Pipeline {
    config: Arc<AppConfig>,
    store: Arc<dyn AdvertisementStore>,
    rates: ExchangeRates,
    photos: PhotoStager,
    cancel: CancellationToken,
}

impl Pipeline {
    pub fn new(config: AppConfig, store: Arc<dyn AdvertisementStore>, rates: ExchangeRates) -> Self {
        let photos = PhotoStager::new(&config.photos);
        Self {
            config: Arc::new(config),
            store,
            rates,
            photos,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Attaches to the browser, then publishes the queue for `request`.
    pub async fn run(&self, request: RunRequest) -> Result<RunSummary, PipelineError> {
        let session = ChromiumSession::start(&self.config.browser)
            .await
            .map_err(|err| PipelineError::session("browser", err.to_string()))?;
        let page = session
            .open_page(request.marketplace.home_url())
            .await
            .map_err(|err| PipelineError::session("browser", err.to_string()))?;
        self.run_on(&page, &request).await
    }

    pub async fn run_on(
        &self,
        page: &dyn UiPage,
        request: &RunRequest,
    ) -> Result<RunSummary, PipelineError> {
        let marketplace = request.marketplace;
        let log = RunLog::new(marketplace);
        let started = Instant::now();

        let ads = self
            .store
            .list_unpublished(marketplace, request.user_id.as_deref())
            .await
            .map_err(|err| PipelineError::internal("store", err.to_string()))?;
        info!(
            parent: &log.span,
            target = "hermes.pipeline",
            queued = ads.len(),
            user_id = request.user_id.as_deref().unwrap_or(""),
            "run_started"
        );
        if ads.is_empty() {
            let summary = RunSummary::new(&log);
            log.tally(&summary);
            return Ok(summary);
        }

        self.wait_for_login(page, marketplace).await?;
        let summary = self.process_queue(page, marketplace, ads, &log).await?;
        crate::metrics::stage_elapsed("run", started.elapsed().as_millis());
        Ok(summary)
    }

    /// Navigates to the marketplace and polls until the account menu shows.
    pub async fn wait_for_login(
        &self,
        page: &dyn UiPage,
        marketplace: Marketplace,
    ) -> Result<(), PipelineError> {
        page.goto(marketplace.home_url())
            .await
            .map_err(|err| PipelineError::session("login", err.to_string()))?;
        let timing = &self.config.timing;
        let probe = executor::login_probe(marketplace);
        let resolver = Resolver::new(page, timing.resolver_timeout(), timing.poll_interval());
        let backoff = Backoff::within(timing.login_wait(), timing.login_poll());
        let outcome = backoff
            .poll(&self.cancel, |attempt| {
                let resolver = &resolver;
                let probe = &probe;
                async move {
                    match resolver.probe(probe).await {
                        Ok(Some(_)) => Some(()),
                        Ok(None) => {
                            if attempt == 1 {
                                info!(target = "hermes.pipeline", %marketplace, "waiting_for_login");
                            }
                            None
                        }
                        Err(err) => {
                            debug!(target = "hermes.pipeline", error = %err, "login_probe_failed");
                            None
                        }
                    }
                }
            })
            .await;
        match outcome {
            WaitOutcome::Ready(()) => Ok(()),
            WaitOutcome::Cancelled => Err(PipelineError::session("login", "run cancelled")),
            WaitOutcome::Exhausted { attempts } => Err(PipelineError::session(
                "login",
                format!("no authenticated session after {attempts} check(s)"),
            )),
        }
    }

    /// Publishes `ads` in order. Per-advertisement failures are recorded and
    /// skipped; only a session failure ends the run early.
    pub async fn process_queue(
        &self,
        page: &dyn UiPage,
        marketplace: Marketplace,
        ads: Vec<Advertisement>,
        log: &RunLog,
    ) -> Result<RunSummary, PipelineError> {
        let mut summary = RunSummary::new(log);
        for ad in ads {
            if self.cancel.is_cancelled() {
                return Err(PipelineError::session("queue", "run cancelled"));
            }
            let report = self.process_one(page, marketplace, &ad, log).await?;
            log.advertisement(&report);
            summary.record(report);
        }
        log.tally(&summary);
        Ok(summary)
    }

    async fn process_one(
        &self,
        page: &dyn UiPage,
        marketplace: Marketplace,
        ad: &Advertisement,
        log: &RunLog,
    ) -> Result<AdvertisementReport, PipelineError> {
        let missing = ad.missing_fields();
        if !missing.is_empty() {
            let error = PipelineError::fatal(
                "eligibility",
                format!("missing mandatory fields: {}", missing.join(", ")),
            );
            return Ok(AdvertisementReport::rejected(ad.id, &error));
        }

        let auxiliary = self.fetch_auxiliary(ad, marketplace).await;
        let draft = build_draft(ad, marketplace, &auxiliary);
        let Some((price, floor_price)) = self.price_fields(&draft).await else {
            let error = PipelineError::fatal("pricing", "advertisement has no usable price");
            return Ok(AdvertisementReport::rejected(ad.id, &error));
        };

        let limit = self.config.photos.max_for(marketplace);
        let staged = match self.photos.stage(&ad.photos, &ad.photo_rotations, limit).await {
            Ok(staged) => staged,
            Err(err) => {
                let error = PipelineError::fatal("photos", err.to_string());
                return Ok(AdvertisementReport::failed(ad.id, &error));
            }
        };
        let mut transient = staged
            .skipped()
            .iter()
            .map(|uri| format!("photos: skipped {uri}"))
            .collect::<Vec<_>>();

        let input = FlowInput {
            photos: staged.files(),
            price,
            floor_price,
            country_of_origin: match marketplace {
                Marketplace::Grailed => self.config.grailed.country_of_origin.as_deref(),
                Marketplace::Vinted => None,
            },
        };
        let plan = executor::plan(&draft, &input);
        let outcome = Executor::new(page, &self.config.timing, log)
            .with_cancel(self.cancel.clone())
            .execute(ad.id, &plan)
            .await;
        if let Err(err) = staged.cleanup() {
            warn!(target = "hermes.photos", advertisement_id = ad.id, error = %err, "scratch_cleanup_failed");
        }

        let execution = match outcome {
            Ok(execution) => execution,
            Err(halted) => return halted_report(ad.id, halted),
        };

        let mut report = AdvertisementReport {
            advertisement_id: ad.id,
            status: AdvertisementStatus::Published,
            stage: None,
            error: None,
            verified: execution.complete,
            warnings: Vec::new(),
            steps: execution.reports,
        };
        if !execution.warnings.is_empty() {
            debug!(
                target = "hermes.pipeline",
                advertisement_id = ad.id,
                kind = ?PipelineErrorKind::RecoverableStep,
                count = execution.warnings.len(),
                "optional_steps_degraded"
            );
        }
        transient.extend(execution.warnings);
        report.warnings = transient;

        if let Err(err) = self.store.set_published(ad.id, marketplace, true).await {
            // The listing is live; a rerun would publish it twice.
            let error = PipelineError::internal("publish_flag", err.to_string());
            report.status = AdvertisementStatus::Failed;
            report.stage = Some(error.stage());
            report.error = Some(error.detail().to_string());
        }
        Ok(report)
    }

    /// Style and header lookups get one retry; after that the draft is built
    /// from the advertisement alone.
    async fn fetch_auxiliary(&self, ad: &Advertisement, marketplace: Marketplace) -> Auxiliary {
        let mut last: Option<StoreError> = None;
        for attempt in 1..=2u32 {
            match self.try_fetch_auxiliary(ad, marketplace).await {
                Ok(auxiliary) => return auxiliary,
                Err(err) => {
                    debug!(target = "hermes.store", advertisement_id = ad.id, attempt, error = %err, "auxiliary_lookup_failed");
                    last = Some(err);
                }
            }
        }
        if let Some(err) = last {
            warn!(
                target = "hermes.pipeline",
                advertisement_id = ad.id,
                kind = ?PipelineErrorKind::TransientNetwork,
                error = %err,
                "auxiliary_unavailable_minimal_description"
            );
        }
        Auxiliary::Unavailable
    }

    async fn try_fetch_auxiliary(
        &self,
        ad: &Advertisement,
        marketplace: Marketplace,
    ) -> Result<Auxiliary, StoreError> {
        let exact_style = match ad.product_type.as_deref().map(str::trim) {
            Some(sub_type) if !sub_type.is_empty() => {
                self.store.get_style_by_sub_type(sub_type).await?
            }
            _ => None,
        };
        let active_styles = self.store.list_active_styles().await?;
        let headers = self.store.list_active_headers(marketplace).await?;
        Ok(Auxiliary::Available {
            exact_style,
            active_styles,
            headers,
        })
    }

    /// Vinted takes the local price as-is; Grailed gets the converted quote
    /// and, when enabled, a floor price.
    async fn price_fields(&self, draft: &ListingDraft) -> Option<(String, Option<String>)> {
        let price_local = draft.price_local?;
        match draft.marketplace {
            Marketplace::Vinted => Some((format_amount(price_local), None)),
            Marketplace::Grailed => {
                let (rate, source) = self.rates.rate().await;
                let pricing = &self.config.pricing;
                let quoted = quote(price_local, rate, pricing.markup_percent, pricing.floor_fraction);
                debug!(
                    target = "hermes.pipeline",
                    advertisement_id = draft.advertisement_id,
                    rate,
                    source = ?source,
                    listing = quoted.listing,
                    "price_quoted"
                );
                let floor = quoted
                    .floor
                    .filter(|_| self.config.grailed.fill_floor_price)
                    .map(|floor| floor.to_string());
                Some((quoted.listing.to_string(), floor))
            }
        }
    }
}

fn halted_report(advertisement_id: i64, halted: Halted) -> Result<AdvertisementReport, PipelineError> {
    let Halted {
        step,
        error,
        reports,
        warnings,
    } = halted;
    if let Some(session) = session_failure(&error) {
        return Err(session);
    }
    let error = PipelineError::fatal(step.as_str(), error.to_string());
    let mut report = AdvertisementReport::failed(advertisement_id, &error);
    report.steps = reports;
    report.warnings = warnings;
    Ok(report)
}

/// Browser loss and cancellation end the run rather than the advertisement.
fn session_failure(error: &StepError) -> Option<PipelineError> {
    let browser = match error {
        StepError::Browser(err) | StepError::Resolve(ResolveError::Browser(err)) => err,
        _ if error.is_cancelled() => {
            return Some(PipelineError::session("executor", "run cancelled"));
        }
        _ => return None,
    };
    matches!(browser, BrowserError::Unreachable(_))
        .then(|| PipelineError::session("browser", browser.to_string()))
}
