//! Per-advertisement form state machine. A marketplace flow turns a draft into
//! an ordered list of [`PlannedStep`]s; the [`Executor`] walks that list
//! against a live page, one resolver-driven interaction at a time.

pub mod grailed;
pub mod vinted;

use crate::browser::{BrowserError, ElementHandle, UiPage};
use crate::config::TimingConfig;
use crate::draft::ListingDraft;
use crate::mapping::normalize_key;
use crate::models::{Marketplace, StepReport};
use crate::pipeline::RunLog;
use crate::resolver::{Locator, ResolveError, Resolved, Resolver, Target};
use crate::retry::{Backoff, WaitOutcome};
use rand::Rng;
use serde::Serialize;
use std::{fmt, path::PathBuf, time::Duration, time::Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Navigate,
    SelectCategory,
    SelectBrand,
    SelectSize,
    FillTitle,
    SelectColor,
    SelectCondition,
    FillDescription,
    SelectStyle,
    FillPrice,
    FillCountryOfOrigin,
    UploadPhotos,
    Verify,
    Submit,
}

impl Step {
    pub const ORDER: [Step; 14] = [
        Step::Navigate,
        Step::SelectCategory,
        Step::SelectBrand,
        Step::SelectSize,
        Step::FillTitle,
        Step::SelectColor,
        Step::SelectCondition,
        Step::FillDescription,
        Step::SelectStyle,
        Step::FillPrice,
        Step::FillCountryOfOrigin,
        Step::UploadPhotos,
        Step::Verify,
        Step::Submit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Navigate => "navigate",
            Step::SelectCategory => "select_category",
            Step::SelectBrand => "select_brand",
            Step::SelectSize => "select_size",
            Step::FillTitle => "fill_title",
            Step::SelectColor => "select_color",
            Step::SelectCondition => "select_condition",
            Step::FillDescription => "fill_description",
            Step::SelectStyle => "select_style",
            Step::FillPrice => "fill_price",
            Step::FillCountryOfOrigin => "fill_country_of_origin",
            Step::UploadPhotos => "upload_photos",
            Step::Verify => "verify",
            Step::Submit => "submit",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPolicy {
    /// Exhausting the step abandons the advertisement.
    Required,
    /// Failure is logged and the flow moves on.
    Optional,
}

/// A field read back during verification.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldCheck {
    pub field: &'static str,
    pub target: Target,
    pub expected: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Load `url` and wait until `ready` shows up.
    Navigate { url: String, ready: Target },
    Click(Target),
    /// Replace the field's content with `value`.
    Fill { target: Target, value: String },
    /// Open a dropdown and pick one option.
    Choose {
        trigger: Target,
        option: Target,
        expected: String,
    },
    /// Open a nested menu and click one entry per level.
    Path {
        trigger: Target,
        levels: Vec<Target>,
        expected: String,
    },
    /// Type into an autocomplete and pick the matching suggestion.
    Search {
        field: Target,
        query: String,
        option: Target,
    },
    /// Hand files to a file input, then wait for `done` if given.
    Upload {
        input: Target,
        files: Vec<PathBuf>,
        done: Option<Target>,
    },
    Verify(Vec<FieldCheck>),
    /// Click `button`, then wait until the page leaves `leave_url` or
    /// `success` appears.
    Confirm {
        button: Target,
        leave_url: String,
        success: Target,
    },
    /// Failure of the inner action becomes a warning.
    BestEffort(Box<Action>),
}

impl Action {
    /// Actions with side effects on the listing must not be replayed.
    fn retryable(&self) -> bool {
        match self {
            Action::Upload { .. } | Action::Confirm { .. } => false,
            Action::BestEffort(inner) => inner.retryable(),
            _ => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedStep {
    pub step: Step,
    pub policy: StepPolicy,
    pub actions: Vec<Action>,
    pub skip_reason: Option<&'static str>,
}

impl PlannedStep {
    pub fn required(step: Step, actions: Vec<Action>) -> Self {
        Self {
            step,
            policy: StepPolicy::Required,
            actions,
            skip_reason: None,
        }
    }

    pub fn optional(step: Step, actions: Vec<Action>) -> Self {
        Self {
            step,
            policy: StepPolicy::Optional,
            actions,
            skip_reason: None,
        }
    }

    pub fn skipped(step: Step, reason: &'static str) -> Self {
        Self {
            step,
            policy: StepPolicy::Optional,
            actions: Vec::new(),
            skip_reason: Some(reason),
        }
    }

    fn retryable(&self) -> bool {
        self.actions.iter().all(Action::retryable)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Applied,
    /// The control already held the intended value; nothing was touched.
    AlreadySatisfied,
    /// No option matched; ArrowDown + Enter picked the highlighted one.
    KeyboardFallback,
    Skipped,
    /// Verification found fields that do not match the draft.
    Incomplete,
    Failed,
}

impl StepOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepOutcome::Applied => "applied",
            StepOutcome::AlreadySatisfied => "already_satisfied",
            StepOutcome::KeyboardFallback => "keyboard_fallback",
            StepOutcome::Skipped => "skipped",
            StepOutcome::Incomplete => "incomplete",
            StepOutcome::Failed => "failed",
        }
    }

    /// Combines the outcomes of consecutive actions within one step.
    fn merge(self, next: StepOutcome) -> StepOutcome {
        use StepOutcome::*;
        match (self, next) {
            (Incomplete, _) | (_, Incomplete) => Incomplete,
            (KeyboardFallback, _) | (_, KeyboardFallback) => KeyboardFallback,
            (AlreadySatisfied, AlreadySatisfied) => AlreadySatisfied,
            (Skipped, other) | (other, Skipped) => other,
            _ => Applied,
        }
    }
}

#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Browser(#[from] BrowserError),
    #[error("{what} not confirmed after {attempts} check(s)")]
    Timeout { what: &'static str, attempts: u32 },
    #[error("cancelled")]
    Cancelled,
}

impl StepError {
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            StepError::Cancelled | StepError::Resolve(ResolveError::Cancelled(_))
        )
    }
}

/// What a step left behind when the flow completed.
#[derive(Debug, Clone, Serialize)]
pub struct Execution {
    pub reports: Vec<StepReport>,
    pub warnings: Vec<String>,
    /// Result of the verification read-back; `true` when no check failed.
    pub complete: bool,
}

/// A required step gave up; nothing after it ran.
#[derive(Debug)]
pub struct Halted {
    pub step: Step,
    pub error: StepError,
    pub reports: Vec<StepReport>,
    pub warnings: Vec<String>,
}

/// Inputs of a marketplace flow besides the draft itself.
#[derive(Debug, Clone, Default)]
pub struct FlowInput<'a> {
    pub photos: &'a [PathBuf],
    /// Listing price as typed into the form.
    pub price: String,
    pub floor_price: Option<String>,
    pub country_of_origin: Option<&'a str>,
}

pub fn plan(draft: &ListingDraft, input: &FlowInput<'_>) -> Vec<PlannedStep> {
    match draft.marketplace {
        Marketplace::Vinted => vinted::plan(draft, input),
        Marketplace::Grailed => grailed::plan(draft, input),
    }
}

/// Element only present for an authenticated session.
pub fn login_probe(marketplace: Marketplace) -> Target {
    match marketplace {
        Marketplace::Vinted => vinted::login_probe(),
        Marketplace::Grailed => grailed::login_probe(),
    }
}

/// Dropdown entry: an ARIA option with that name, else any interactive
/// element showing the text.
fn option_target(name: &'static str, label: &str) -> Target {
    Target::new(
        name,
        vec![
            Locator::role("option", Some(label)),
            Locator::role("menuitem", Some(label)),
            Locator::text(label),
        ],
    )
}

/// Read-back checks for every field the flow sets: typed text, autocomplete
/// queries and the trigger of each dropdown or nested menu.
fn form_checks(plan: &[PlannedStep]) -> Vec<FieldCheck> {
    plan.iter()
        .flat_map(|planned| planned.actions.iter())
        .filter_map(|action| {
            let (target, expected) = match action {
                Action::Fill { target, value } => (target, value),
                Action::Search { field, query, .. } => (field, query),
                Action::Choose {
                    trigger, expected, ..
                }
                | Action::Path {
                    trigger, expected, ..
                } => (trigger, expected),
                _ => return None,
            };
            Some(FieldCheck {
                field: target.name,
                target: target.clone(),
                expected: expected.clone(),
            })
        })
        .collect()
}

struct StepResult {
    outcome: StepOutcome,
    detail: Option<String>,
    warnings: Vec<String>,
}

impl StepResult {
    fn new(outcome: StepOutcome) -> Self {
        Self {
            outcome,
            detail: None,
            warnings: Vec::new(),
        }
    }
}

pub struct Executor<'a> {
    page: &'a dyn UiPage,
    timing: &'a TimingConfig,
    log: &'a RunLog,
    cancel: CancellationToken,
}

impl<'a> Executor<'a> {
    pub fn new(page: &'a dyn UiPage, timing: &'a TimingConfig, log: &'a RunLog) -> Self {
        Self {
            page,
            timing,
            log,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn resolver(&self) -> Resolver<'a> {
        Resolver::new(
            self.page,
            self.timing.resolver_timeout(),
            self.timing.poll_interval(),
        )
        .with_cancel(self.cancel.clone())
    }

    /// Runs the plan in order. Optional failures become warnings; the first
    /// required failure stops the flow before anything is submitted.
    pub async fn execute(
        &self,
        advertisement_id: i64,
        plan: &[PlannedStep],
    ) -> Result<Execution, Halted> {
        let mut reports = Vec::with_capacity(plan.len());
        let mut warnings = Vec::new();
        let mut complete = true;

        for planned in plan {
            let step = planned.step;
            if let Some(reason) = planned.skip_reason {
                let report =
                    StepReport::new(step.as_str(), StepOutcome::Skipped.as_str(), 0, Some(reason.into()));
                self.log.step(advertisement_id, &report);
                reports.push(report);
                continue;
            }

            let started = Instant::now();
            let result = self.run_with_retries(planned).await;
            let elapsed_ms = started.elapsed().as_millis();
            crate::metrics::stage_elapsed(step.as_str(), elapsed_ms);

            match result {
                Ok(result) => {
                    if result.outcome == StepOutcome::Incomplete {
                        complete = false;
                    }
                    let report = StepReport::new(
                        step.as_str(),
                        result.outcome.as_str(),
                        elapsed_ms,
                        result.detail,
                    );
                    self.log.step(advertisement_id, &report);
                    for warning in result.warnings {
                        self.log.warning(advertisement_id, step.as_str(), &warning);
                        warnings.push(format!("{step}: {warning}"));
                    }
                    reports.push(report);
                }
                Err(error) => {
                    let report = StepReport::new(
                        step.as_str(),
                        StepOutcome::Failed.as_str(),
                        elapsed_ms,
                        Some(error.to_string()),
                    );
                    self.log.step(advertisement_id, &report);
                    reports.push(report);
                    if planned.policy == StepPolicy::Required || error.is_cancelled() {
                        return Err(Halted {
                            step,
                            error,
                            reports,
                            warnings,
                        });
                    }
                    self.log
                        .warning(advertisement_id, step.as_str(), &error.to_string());
                    warnings.push(format!("{step}: {error}"));
                }
            }
        }

        Ok(Execution {
            reports,
            warnings,
            complete,
        })
    }

    async fn run_with_retries(&self, planned: &PlannedStep) -> Result<StepResult, StepError> {
        let attempts = if planned.retryable() {
            1 + self.timing.step_retries
        } else {
            1
        };
        let mut attempt = 1;
        loop {
            match self.run_step(planned).await {
                Ok(result) => return Ok(result),
                Err(err) if err.is_cancelled() || attempt >= attempts => return Err(err),
                Err(err) => {
                    self.log.retry(planned.step.as_str(), attempt, &err.to_string());
                    attempt += 1;
                    self.settle().await?;
                }
            }
        }
    }

    async fn run_step(&self, planned: &PlannedStep) -> Result<StepResult, StepError> {
        let mut merged = StepResult::new(StepOutcome::Skipped);
        for action in &planned.actions {
            let result = self.perform(action).await?;
            merged.outcome = merged.outcome.merge(result.outcome);
            merged.warnings.extend(result.warnings);
            if result.detail.is_some() {
                merged.detail = result.detail;
            }
        }
        if merged.outcome == StepOutcome::Skipped {
            merged.outcome = StepOutcome::Applied;
        }
        Ok(merged)
    }

    async fn perform(&self, action: &Action) -> Result<StepResult, StepError> {
        match action {
            Action::BestEffort(inner) => match Box::pin(self.perform(inner)).await {
                Ok(result) => Ok(result),
                Err(err) if err.is_cancelled() => Err(err),
                Err(err) => {
                    let mut result = StepResult::new(StepOutcome::Skipped);
                    result.warnings.push(err.to_string());
                    Ok(result)
                }
            },
            Action::Navigate { url, ready } => {
                self.page.goto(url).await?;
                self.resolver().resolve(ready).await?;
                Ok(StepResult::new(StepOutcome::Applied))
            }
            Action::Click(target) => self.click(target).await,
            Action::Fill { target, value } => self.fill(target, value).await,
            Action::Choose {
                trigger,
                option,
                expected,
            } => {
                let handle = self.element(trigger).await?;
                if self.holds(handle, expected).await? {
                    return Ok(StepResult::new(StepOutcome::AlreadySatisfied));
                }
                self.page.click(handle).await?;
                self.settle().await?;
                self.click(option).await
            }
            Action::Path {
                trigger,
                levels,
                expected,
            } => {
                let handle = self.element(trigger).await?;
                if self.holds(handle, expected).await? {
                    return Ok(StepResult::new(StepOutcome::AlreadySatisfied));
                }
                self.page.click(handle).await?;
                self.settle().await?;
                let mut outcome = StepOutcome::Applied;
                for level in levels {
                    outcome = outcome.merge(self.click(level).await?.outcome);
                }
                Ok(StepResult::new(outcome))
            }
            Action::Search {
                field,
                query,
                option,
            } => {
                let handle = self.element(field).await?;
                if self.holds(handle, query).await? {
                    return Ok(StepResult::new(StepOutcome::AlreadySatisfied));
                }
                self.page.type_text(handle, query).await?;
                self.settle().await?;
                self.click(option).await
            }
            Action::Upload { input, files, done } => {
                let handle = self.element(input).await?;
                self.page.upload_files(handle, files).await?;
                if let Some(done) = done {
                    self.wait_for(done, self.timing.upload_wait(), "photo upload")
                        .await?;
                }
                let mut result = StepResult::new(StepOutcome::Applied);
                result.detail = Some(format!("{} file(s)", files.len()));
                Ok(result)
            }
            Action::Verify(checks) => self.verify(checks).await,
            Action::Confirm {
                button,
                leave_url,
                success,
            } => {
                let handle = self.element(button).await?;
                self.page.click(handle).await?;
                self.wait_for_submission(leave_url, success).await?;
                Ok(StepResult::new(StepOutcome::Applied))
            }
        }
    }

    async fn element(&self, target: &Target) -> Result<ElementHandle, StepError> {
        match self.resolver().resolve(target).await? {
            Resolved::Element { handle, .. } => Ok(handle),
            Resolved::Keyboard => Err(ResolveError::NotFound {
                target: target.name,
                tried: target.candidates.len(),
            }
            .into()),
        }
    }

    async fn click(&self, target: &Target) -> Result<StepResult, StepError> {
        let outcome = match self.resolver().resolve(target).await? {
            Resolved::Element { handle, .. } => {
                self.page.click(handle).await?;
                StepOutcome::Applied
            }
            Resolved::Keyboard => StepOutcome::KeyboardFallback,
        };
        self.settle().await?;
        Ok(StepResult::new(outcome))
    }

    async fn fill(&self, target: &Target, value: &str) -> Result<StepResult, StepError> {
        let handle = self.element(target).await?;
        let current = self.page.read_value(handle).await?;
        if current.trim() == value.trim() {
            return Ok(StepResult::new(StepOutcome::AlreadySatisfied));
        }
        self.page.type_text(handle, value).await?;
        self.settle().await?;
        Ok(StepResult::new(StepOutcome::Applied))
    }

    async fn holds(&self, handle: ElementHandle, expected: &str) -> Result<bool, StepError> {
        let wanted = normalize_key(expected);
        if wanted.is_empty() {
            return Ok(false);
        }
        let current = self.page.read_value(handle).await?;
        Ok(normalize_key(&current) == wanted)
    }

    /// Reads every field back without waiting. Mismatches are reported, never
    /// raised.
    async fn verify(&self, checks: &[FieldCheck]) -> Result<StepResult, StepError> {
        let resolver = self.resolver();
        let mut mismatched = Vec::new();
        let mut warnings = Vec::new();
        for check in checks {
            let found = match resolver.probe(&check.target).await {
                Ok(found) => found,
                Err(err) => {
                    warnings.push(format!("{} unreadable: {err}", check.field));
                    mismatched.push(check.field);
                    continue;
                }
            };
            let Some(info) = found else {
                warnings.push(format!("{} not found on the form", check.field));
                mismatched.push(check.field);
                continue;
            };
            let actual = match self.page.read_value(info.handle).await {
                Ok(value) => value,
                Err(err) => {
                    warnings.push(format!("{} unreadable: {err}", check.field));
                    mismatched.push(check.field);
                    continue;
                }
            };
            if !normalize_key(&actual).contains(&normalize_key(&check.expected)) {
                warnings.push(format!(
                    "{} reads {:?}, expected {:?}",
                    check.field, actual, check.expected
                ));
                mismatched.push(check.field);
            }
        }
        let mut result = if mismatched.is_empty() {
            StepResult::new(StepOutcome::Applied)
        } else {
            let mut result = StepResult::new(StepOutcome::Incomplete);
            result.detail = Some(format!("mismatched: {}", mismatched.join(", ")));
            result
        };
        result.warnings = warnings;
        Ok(result)
    }

    async fn wait_for(
        &self,
        target: &Target,
        budget: Duration,
        what: &'static str,
    ) -> Result<(), StepError> {
        let resolver = self.resolver();
        let backoff = Backoff::within(budget, self.timing.poll_interval());
        let outcome = backoff
            .poll(&self.cancel, |_| {
                let resolver = &resolver;
                async move { resolver.probe(target).await.ok().flatten() }
            })
            .await;
        match outcome {
            WaitOutcome::Ready(_) => Ok(()),
            WaitOutcome::Cancelled => Err(StepError::Cancelled),
            WaitOutcome::Exhausted { attempts } => Err(StepError::Timeout { what, attempts }),
        }
    }

    async fn wait_for_submission(&self, leave_url: &str, success: &Target) -> Result<(), StepError> {
        let resolver = self.resolver();
        let leave = leave_url.trim_end_matches('/');
        let backoff = Backoff::within(self.timing.submit_wait(), self.timing.poll_interval());
        let outcome = backoff
            .poll(&self.cancel, |_| {
                let resolver = &resolver;
                async move {
                    if let Ok(url) = self.page.current_url().await
                        && !url.is_empty()
                        && url.trim_end_matches('/') != leave
                    {
                        return Some(());
                    }
                    resolver.probe(success).await.ok().flatten().map(|_| ())
                }
            })
            .await;
        match outcome {
            WaitOutcome::Ready(()) => Ok(()),
            WaitOutcome::Cancelled => Err(StepError::Cancelled),
            WaitOutcome::Exhausted { attempts } => Err(StepError::Timeout {
                what: "submission",
                attempts,
            }),
        }
    }

    async fn settle(&self) -> Result<(), StepError> {
        let delay = settle_delay(self.timing);
        if delay.is_zero() {
            return Ok(());
        }
        tokio::select! {
            _ = self.cancel.cancelled() => Err(StepError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

fn settle_delay(timing: &TimingConfig) -> Duration {
    let jitter = if timing.settle_jitter_ms > 0 {
        rand::rng().random_range(0..=timing.settle_jitter_ms)
    } else {
        0
    };
    Duration::from_millis(timing.settle_ms + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakeAction, FakePage};

    fn timing() -> TimingConfig {
        TimingConfig::instant()
    }

    fn log() -> RunLog {
        RunLog::new(Marketplace::Vinted)
    }

    fn fill(css: &'static str, value: &str) -> Vec<Action> {
        vec![Action::Fill {
            target: Target::new(css, vec![Locator::css(css)]),
            value: value.into(),
        }]
    }

    #[tokio::test]
    async fn optional_failure_continues_and_required_failure_halts() {
        let page = FakePage::strict();
        let title = page.add(&["#title"]);
        let submit = page.add(&["#submit"]);
        let plan = vec![
            PlannedStep::required(Step::FillTitle, fill("#title", "Nike Bluza M")),
            PlannedStep::optional(Step::SelectStyle, fill("#style", "Y2K")),
            PlannedStep::required(Step::FillPrice, fill("#price", "120")),
            PlannedStep::required(
                Step::Submit,
                vec![Action::Click(Target::new("submit", vec![Locator::css("#submit")]))],
            ),
        ];
        let timing = timing();
        let log = log();
        let halted = Executor::new(&page, &timing, &log)
            .execute(1, &plan)
            .await
            .expect_err("price is required");

        assert_eq!(halted.step, Step::FillPrice);
        assert_eq!(halted.warnings.len(), 1);
        let outcomes: Vec<_> = halted.reports.iter().map(|r| r.outcome.as_str()).collect();
        assert_eq!(outcomes, vec!["applied", "failed", "failed"]);
        assert_eq!(page.value(title), Some("Nike Bluza M".into()));
        assert!(!page.actions().contains(&FakeAction::Click(submit)));
    }

    #[tokio::test]
    async fn dropdown_already_holding_the_value_is_not_touched() {
        let page = FakePage::strict();
        let trigger = page.add(&["#condition"]);
        page.set_value(trigger, "Bardzo dobry");
        let plan = vec![PlannedStep::required(
            Step::SelectCondition,
            vec![Action::Choose {
                trigger: Target::new("condition", vec![Locator::css("#condition")]),
                option: Target::new("condition option", vec![Locator::text("Bardzo dobry")]),
                expected: "bardzo dobry".into(),
            }],
        )];
        let timing = timing();
        let log = log();
        let done = Executor::new(&page, &timing, &log)
            .execute(1, &plan)
            .await
            .expect("satisfied");
        assert_eq!(done.reports[0].outcome, "already_satisfied");
        assert!(page.actions().is_empty());
    }

    #[tokio::test]
    async fn dropdown_opens_and_picks_revealed_option() {
        let page = FakePage::strict();
        let trigger = page.add(&["#size"]);
        let option = page.add_hidden_text("W31");
        page.reveal_on_click(trigger, option);
        page.select_on_click(option, trigger, "W31");
        let plan = vec![PlannedStep::required(
            Step::SelectSize,
            vec![Action::Choose {
                trigger: Target::new("size", vec![Locator::css("#size")]),
                option: Target::new("size option", vec![Locator::text("W31")]),
                expected: "W31".into(),
            }],
        )];
        let timing = timing();
        let log = log();
        let done = Executor::new(&page, &timing, &log)
            .execute(1, &plan)
            .await
            .expect("selected");
        assert_eq!(done.reports[0].outcome, "applied");
        assert_eq!(
            page.actions(),
            vec![FakeAction::Click(trigger), FakeAction::Click(option)]
        );
        assert_eq!(page.value(trigger), Some("W31".into()));
    }

    #[tokio::test]
    async fn missing_option_with_keyboard_fallback_is_reported() {
        let page = FakePage::strict();
        page.add(&["#color"]);
        let plan = vec![PlannedStep::optional(
            Step::SelectColor,
            vec![Action::Choose {
                trigger: Target::new("color", vec![Locator::css("#color")]),
                option: Target::new("color option", vec![Locator::text("Czarny")])
                    .with_keyboard_fallback(),
                expected: "Czarny".into(),
            }],
        )];
        let timing = timing();
        let log = log();
        let done = Executor::new(&page, &timing, &log)
            .execute(1, &plan)
            .await
            .expect("fallback");
        assert_eq!(done.reports[0].outcome, "keyboard_fallback");
    }

    #[tokio::test]
    async fn verification_mismatch_warns_but_submission_proceeds() {
        let page = FakePage::strict();
        let title = page.add(&["#title"]);
        page.set_value(title, "Something else");
        let submit = page.add(&["#submit"]);
        page.navigate_on_click(submit, "https://www.vinted.pl/items/99");
        page.goto("https://www.vinted.pl/items/new").await.expect("goto");
        let plan = vec![
            PlannedStep::required(
                Step::Verify,
                vec![Action::Verify(vec![
                    FieldCheck {
                        field: "title",
                        target: Target::new("title", vec![Locator::css("#title")]),
                        expected: "Nike Bluza M".into(),
                    },
                    FieldCheck {
                        field: "price",
                        target: Target::new("price", vec![Locator::css("#price")]),
                        expected: "120".into(),
                    },
                ])],
            ),
            PlannedStep::required(
                Step::Submit,
                vec![Action::Confirm {
                    button: Target::new("submit", vec![Locator::css("#submit")]),
                    leave_url: "https://www.vinted.pl/items/new".into(),
                    success: Target::new("success", vec![Locator::css("#success")]),
                }],
            ),
        ];
        let timing = timing();
        let log = log();
        let done = Executor::new(&page, &timing, &log)
            .execute(1, &plan)
            .await
            .expect("submitted");
        assert!(!done.complete);
        assert_eq!(done.warnings.len(), 2);
        assert_eq!(done.reports[0].outcome, "incomplete");
        assert_eq!(done.reports[1].outcome, "applied");
    }

    #[tokio::test]
    async fn dropdown_selection_is_read_back_from_its_trigger() {
        let page = FakePage::strict();
        let trigger = page.add(&["#size"]);
        let option = page.add_text("M");
        page.select_on_click(option, trigger, "L");
        let mut plan = vec![PlannedStep::required(
            Step::SelectSize,
            vec![Action::Choose {
                trigger: Target::new("size dropdown", vec![Locator::css("#size")]),
                option: Target::new("size option", vec![Locator::text("M")]),
                expected: "M".into(),
            }],
        )];
        let checks = form_checks(&plan);
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].field, "size dropdown");
        plan.push(PlannedStep::optional(Step::Verify, vec![Action::Verify(checks)]));

        let timing = timing();
        let log = log();
        let done = Executor::new(&page, &timing, &log)
            .execute(1, &plan)
            .await
            .expect("flow continues");
        assert_eq!(done.reports[0].outcome, "applied");
        assert_eq!(done.reports[1].outcome, "incomplete");
        assert!(!done.complete);
        assert_eq!(
            done.warnings,
            vec!["verify: size dropdown reads \"L\", expected \"M\"".to_string()]
        );
    }

    #[tokio::test]
    async fn unconfirmed_submission_is_not_retried() {
        let page = FakePage::strict();
        let submit = page.add(&["#submit"]);
        page.goto("https://www.grailed.com/sell/new").await.expect("goto");
        let plan = vec![PlannedStep::required(
            Step::Submit,
            vec![Action::Confirm {
                button: Target::new("submit", vec![Locator::css("#submit")]),
                leave_url: "https://www.grailed.com/sell/new".into(),
                success: Target::new("success", vec![Locator::css("#success")]),
            }],
        )];
        let timing = timing();
        let log = log();
        let halted = Executor::new(&page, &timing, &log)
            .execute(1, &plan)
            .await
            .expect_err("never confirmed");
        assert!(matches!(halted.error, StepError::Timeout { what: "submission", .. }));
        let clicks = page
            .actions()
            .into_iter()
            .filter(|action| *action == FakeAction::Click(submit))
            .count();
        assert_eq!(clicks, 1);
    }

    #[tokio::test]
    async fn best_effort_action_failure_is_a_warning() {
        let page = FakePage::strict();
        let price = page.add(&["#price"]);
        let plan = vec![PlannedStep::required(
            Step::FillPrice,
            vec![
                Action::Fill {
                    target: Target::new("price", vec![Locator::css("#price")]),
                    value: "65".into(),
                },
                Action::BestEffort(Box::new(Action::Fill {
                    target: Target::new("floor price", vec![Locator::css("#floor")]),
                    value: "52".into(),
                })),
            ],
        )];
        let timing = timing();
        let log = log();
        let done = Executor::new(&page, &timing, &log)
            .execute(1, &plan)
            .await
            .expect("price filled");
        assert_eq!(page.value(price), Some("65".into()));
        assert_eq!(done.warnings.len(), 1);
        assert_eq!(done.reports[0].outcome, "applied");
    }

    #[tokio::test]
    async fn skipped_steps_are_reported_without_touching_the_page() {
        let page = FakePage::strict();
        let plan = vec![PlannedStep::skipped(Step::FillCountryOfOrigin, "not configured")];
        let timing = timing();
        let log = log();
        let done = Executor::new(&page, &timing, &log)
            .execute(1, &plan)
            .await
            .expect("skipped");
        assert_eq!(done.reports[0].outcome, "skipped");
        assert!(page.queries().is_empty());
    }
}
