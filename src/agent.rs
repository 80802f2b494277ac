use std::sync::Arc;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::brain::DecisionService;
use crate::config::AgentConfig;
use crate::dispatch::Dispatcher;
use crate::error::{AgentError, Result};
use crate::hands::BrowserCapability;
use crate::snapshots::save_screenshot;
use crate::types::{InputItem, Observation, ResponseEnvelope, SafetyCheck};

/// How a run ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Answer(String),
    /// The turn budget ran out before the service answered.
    Exhausted { turns: usize },
    /// The deadline passed or the token was cancelled.
    Cancelled,
}

/// Observation owed to the service for the action it asked for last turn.
struct PendingCall {
    call_id: String,
    observation: Observation,
    acknowledged: Vec<SafetyCheck>,
}

struct TurnResult {
    answer: Option<String>,
    pending: Option<PendingCall>,
}

/// Closes the page exactly once.
///
/// `release` closes it on the blocking pool. Dropping an unreleased guard (a panic,
/// or the run future being dropped) closes it inline.
struct PageGuard(Option<Arc<dyn BrowserCapability>>);

impl PageGuard {
    fn new(browser: Arc<dyn BrowserCapability>) -> Self {
        Self(Some(browser))
    }

    async fn release(mut self) {
        let Some(browser) = self.0.take() else {
            return;
        };
        match tokio::task::spawn_blocking(move || browser.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("failed to close browser: {e:#}"),
            Err(e) => warn!("browser close task failed: {e}"),
        }
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        if let Some(browser) = self.0.take() {
            if let Err(e) = browser.close() {
                warn!("failed to close browser: {e:#}");
            }
        }
    }
}

/// Drives the decision service and the browser turn by turn until the goal is answered.
pub struct Agent {
    service: Arc<dyn DecisionService>,
    browser: Arc<dyn BrowserCapability>,
    config: AgentConfig,
}

impl Agent {
    pub fn new(
        service: Arc<dyn DecisionService>,
        browser: Arc<dyn BrowserCapability>,
        config: AgentConfig,
    ) -> Self {
        Self {
            service,
            browser,
            config,
        }
    }

    /// Run one task to completion.
    ///
    /// `cancel` and `deadline` are only checked at the start of each turn; an action or
    /// service call already in flight is allowed to finish. The browser is closed on
    /// every exit path.
    pub async fn run(
        &self,
        cancel: &CancellationToken,
        deadline: Instant,
        goal: &str,
        start_url: &str,
        max_turns: usize,
    ) -> Result<Outcome> {
        let page = PageGuard::new(self.browser.clone());
        let result = self.drive(cancel, deadline, goal, start_url, max_turns).await;
        page.release().await;
        result
    }

    async fn drive(
        &self,
        cancel: &CancellationToken,
        deadline: Instant,
        goal: &str,
        start_url: &str,
        max_turns: usize,
    ) -> Result<Outcome> {
        self.open(start_url).await?;

        let dispatcher = Dispatcher::new(self.browser.clone(), self.config.wait_duration);
        let mut previous_response_id: Option<String> = None;
        let mut pending: Option<PendingCall> = None;

        for turn in 1..=max_turns {
            if cancel.is_cancelled() || Instant::now() >= deadline {
                info!(turn, "run cancelled");
                return Ok(Outcome::Cancelled);
            }

            let input = match (&previous_response_id, pending.take()) {
                (None, _) => vec![InputItem::user(goal)],
                (Some(_), Some(call)) => vec![InputItem::call_output(
                    call.call_id,
                    &call.observation,
                    call.acknowledged,
                )],
                (Some(_), None) => Vec::new(),
            };

            info!(turn, max_turns, "asking decision service for next step");
            let response = self
                .service
                .send(&self.config.model, previous_response_id.as_deref(), &input)
                .await?;
            previous_response_id = Some(response.id.clone());

            let result = self.handle_response(turn, &response, &dispatcher).await?;
            if let Some(answer) = result.answer {
                info!(turn, "final answer received");
                return Ok(Outcome::Answer(answer));
            }
            pending = result.pending;

            if turn < max_turns && !self.config.turn_delay.is_zero() {
                tokio::time::sleep(self.config.turn_delay).await;
            }
        }

        info!(max_turns, "turn budget exhausted");
        Ok(Outcome::Exhausted { turns: max_turns })
    }

    async fn open(&self, url: &str) -> Result<()> {
        info!(%url, "opening start page");
        let browser = self.browser.clone();
        let target = url.to_string();
        tokio::task::spawn_blocking(move || browser.open(&target))
            .await?
            .map_err(|source| AgentError::Startup {
                url: url.to_string(),
                source,
            })
    }

    /// Execute the first action of the response and look for a final answer.
    async fn handle_response(
        &self,
        turn: usize,
        response: &ResponseEnvelope,
        dispatcher: &Dispatcher,
    ) -> Result<TurnResult> {
        let mut result = TurnResult {
            answer: None,
            pending: None,
        };
        let mut dispatched = false;

        for item in &response.output {
            if let Some(action) = &item.action {
                if dispatched {
                    warn!(turn, kind = action.kind(), "ignoring additional action in the same turn");
                } else {
                    dispatched = true;
                    for check in &item.pending_safety_checks {
                        warn!(turn, id = %check.id, code = %check.code, message = %check.message, "pending safety check");
                    }

                    info!(turn, kind = action.kind(), "executing action");
                    let runner = dispatcher.clone();
                    let action = action.clone();
                    let observation =
                        tokio::task::spawn_blocking(move || runner.execute(&action)).await??;
                    self.persist(turn, &observation);

                    match &item.call_id {
                        Some(call_id) => {
                            let acknowledged = if self.config.acknowledge_safety_checks {
                                item.pending_safety_checks.clone()
                            } else {
                                Vec::new()
                            };
                            result.pending = Some(PendingCall {
                                call_id: call_id.clone(),
                                observation,
                                acknowledged,
                            });
                        }
                        None => warn!(turn, "action has no call_id, observation will not be reported"),
                    }
                }
            }

            if let Some(text) = item.final_answer() {
                result.answer = Some(text.to_string());
                break;
            }
        }

        if !dispatched && result.answer.is_none() {
            debug!(turn, "response carried neither an action nor an answer");
        }
        Ok(result)
    }

    fn persist(&self, turn: usize, observation: &Observation) {
        let Some(dir) = &self.config.screenshots_dir else {
            return;
        };
        match save_screenshot(dir, turn, &observation.screenshot) {
            Ok(path) => debug!(turn, path = %path.display(), url = %observation.location, "screenshot saved"),
            Err(e) => warn!(turn, "failed to save screenshot: {e}"),
        }
    }
}
