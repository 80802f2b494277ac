use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::ServiceConfig;
use crate::error::{AgentError, Result};
use crate::types::{Action, InputItem, ResponseEnvelope};

const TOOL_TYPE: &str = "computer-preview";

/// The remote model that looks at the page and proposes the next step.
#[async_trait]
pub trait DecisionService: Send + Sync {
    /// One round trip. `previous_response_id` is `None` only on the first turn.
    async fn send(
        &self,
        model: &str,
        previous_response_id: Option<&str>,
        input: &[InputItem],
    ) -> Result<ResponseEnvelope>;
}

#[derive(Debug, Serialize)]
struct ComputerTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    display_width: u32,
    display_height: u32,
    environment: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: &'a [InputItem],
    tools: [ComputerTool<'a>; 1],
    truncation: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    previous_response_id: Option<&'a str>,
}

/// Client for the OpenAI Responses API with the computer-use tool enabled.
pub struct Brain {
    client: Client,
    config: ServiceConfig,
}

impl Brain {
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(AgentError::Transport)?;
        Ok(Self { client, config })
    }

    fn request<'a>(
        &'a self,
        model: &'a str,
        previous_response_id: Option<&'a str>,
        input: &'a [InputItem],
    ) -> ResponsesRequest<'a> {
        ResponsesRequest {
            model,
            input,
            tools: [ComputerTool {
                kind: TOOL_TYPE,
                display_width: self.config.display_width,
                display_height: self.config.display_height,
                environment: &self.config.environment,
            }],
            truncation: "auto",
            previous_response_id,
        }
    }
}

#[async_trait]
impl DecisionService for Brain {
    async fn send(
        &self,
        model: &str,
        previous_response_id: Option<&str>,
        input: &[InputItem],
    ) -> Result<ResponseEnvelope> {
        log_input(input);

        let response = self
            .client
            .post(self.config.responses_url())
            .bearer_auth(&self.config.api_key)
            .json(&self.request(model, previous_response_id, input))
            .send()
            .await
            .map_err(AgentError::Transport)?;

        let status = response.status();
        let body = response.text().await.map_err(AgentError::Transport)?;

        if !status.is_success() {
            let message = api_error_message(&body);
            warn!(%status, %message, "decision service rejected the request");
            return Err(AgentError::Status {
                status,
                body: message,
            });
        }

        let envelope: ResponseEnvelope =
            serde_json::from_str(&body).map_err(AgentError::Decode)?;
        log_response(&envelope);
        Ok(envelope)
    }
}

/// Pull `error.message` out of an API error body, falling back to the raw text.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(String::from))
        .unwrap_or_else(|| body.to_string())
}

pub(crate) fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{cut}...")
}

fn log_input(input: &[InputItem]) {
    for (i, item) in input.iter().enumerate() {
        match item {
            InputItem::Message { role, content } => {
                debug!(item = i + 1, %role, content = %preview(content, 100), "input message");
            }
            InputItem::ComputerCallOutput {
                call_id,
                output,
                acknowledged_safety_checks,
            } => {
                debug!(
                    item = i + 1,
                    %call_id,
                    url = %output.current_url,
                    output_type = %output.kind,
                    acknowledged = acknowledged_safety_checks.len(),
                    "input computer_call_output"
                );
            }
        }
    }
}

fn log_response(response: &ResponseEnvelope) {
    debug!(
        id = %response.id,
        status = %response.status,
        items = response.output.len(),
        "response received"
    );

    for (i, item) in response.output.iter().enumerate() {
        let n = i + 1;
        if let Some(action) = &item.action {
            log_action(n, action);
        }
        if item.role.as_deref() == Some("assistant") {
            for part in &item.content {
                if let Some(text) = &part.text {
                    debug!(item = n, text = %text, "assistant text");
                }
            }
        }
        for check in &item.pending_safety_checks {
            debug!(item = n, code = %check.code, message = %check.message, "pending safety check");
        }
    }
}

fn log_action(item: usize, action: &Action) {
    match action {
        Action::Type { text } => {
            debug!(item, kind = "type", text = %preview(text, 50), "action");
        }
        Action::Click { x, y, button } => {
            debug!(item, kind = "click", x, y, ?button, "action");
        }
        Action::DoubleClick { x, y } | Action::Move { x, y } => {
            debug!(item, kind = action.kind(), x, y, "action");
        }
        Action::Scroll {
            x,
            y,
            scroll_x,
            scroll_y,
        } => {
            debug!(item, kind = "scroll", x, y, scroll_x, scroll_y, "action");
        }
        Action::KeyPress { keys } => {
            debug!(item, kind = "keypress", ?keys, "action");
        }
        other => {
            debug!(item, kind = other.kind(), "action");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Observation;
    use serde_json::json;

    fn brain() -> Brain {
        Brain::new(ServiceConfig::new("sk-test").with_display(1280, 800)).unwrap()
    }

    #[test]
    fn first_turn_request_has_no_continuation() {
        let brain = brain();
        let input = vec![InputItem::user("open the docs")];
        let body = serde_json::to_value(brain.request("m1", None, &input)).unwrap();
        assert_eq!(
            body,
            json!({
                "model": "m1",
                "input": [{"type": "message", "role": "user", "content": "open the docs"}],
                "tools": [{
                    "type": "computer-preview",
                    "display_width": 1280,
                    "display_height": 800,
                    "environment": "browser"
                }],
                "truncation": "auto"
            })
        );
    }

    #[test]
    fn later_turn_request_threads_response_id() {
        let brain = brain();
        let obs = Observation {
            screenshot: vec![0xff],
            location: "about:blank".into(),
        };
        let input = vec![InputItem::call_output("call_2", &obs, Vec::new())];
        let body = serde_json::to_value(brain.request("m1", Some("resp_1"), &input)).unwrap();
        assert_eq!(body["previous_response_id"], "resp_1");
        assert_eq!(body["input"][0]["call_id"], "call_2");
        assert_eq!(body["input"][0]["output"]["current_url"], "about:blank");
    }

    #[test]
    fn error_message_is_extracted() {
        let body = r#"{"error":{"message":"Invalid API key","type":"invalid_request_error"}}"#;
        assert_eq!(api_error_message(body), "Invalid API key");
        assert_eq!(api_error_message("gateway timeout"), "gateway timeout");
    }

    #[test]
    fn preview_truncates_on_char_boundaries() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("abcdefghijkl", 8), "abcde...");
        assert_eq!(preview("ééééééééé", 5), "éé...");
    }
}
