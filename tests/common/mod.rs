#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde_json::{Value, json};

use computer_use_agent::brain::DecisionService;
use computer_use_agent::config::AgentConfig;
use computer_use_agent::hands::BrowserCapability;
use computer_use_agent::types::{InputItem, KeyCode, MouseButton, ResponseEnvelope};
use computer_use_agent::{AgentError, Result as AgentResult};

pub const PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake";

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Open(String),
    Screenshot,
    Location,
    Click(i64, i64, MouseButton),
    DoubleClick(i64, i64),
    Move(i64, i64),
    Type(String),
    Scroll(i64, i64, i64, i64),
    Keys(Vec<KeyCode>),
    Close,
}

/// Browser fake that records every primitive it is asked to perform.
#[derive(Default)]
pub struct RecordingBrowser {
    calls: Mutex<Vec<Call>>,
    location: Mutex<String>,
    close_thread: Mutex<Option<ThreadId>>,
    fail_open: bool,
    fail_click: bool,
    fail_screenshot: bool,
    fail_location: bool,
    empty_screenshot: bool,
}

impl RecordingBrowser {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_open() -> Arc<Self> {
        Arc::new(Self {
            fail_open: true,
            ..Default::default()
        })
    }

    pub fn failing_click() -> Arc<Self> {
        Arc::new(Self {
            fail_click: true,
            ..Default::default()
        })
    }

    pub fn failing_screenshot() -> Arc<Self> {
        Arc::new(Self {
            fail_screenshot: true,
            ..Default::default()
        })
    }

    pub fn failing_location() -> Arc<Self> {
        Arc::new(Self {
            fail_location: true,
            ..Default::default()
        })
    }

    pub fn blank_screenshot() -> Arc<Self> {
        Arc::new(Self {
            empty_screenshot: true,
            ..Default::default()
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    /// Calls other than the screenshot/location capture and the lifecycle ones.
    pub fn actions(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| {
                !matches!(
                    c,
                    Call::Open(_) | Call::Screenshot | Call::Location | Call::Close
                )
            })
            .collect()
    }

    /// Thread that performed the last `close`.
    pub fn close_thread(&self) -> Option<ThreadId> {
        *self.close_thread.lock().unwrap()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl BrowserCapability for RecordingBrowser {
    fn open(&self, url: &str) -> Result<()> {
        self.record(Call::Open(url.to_string()));
        if self.fail_open {
            bail!("net::ERR_NAME_NOT_RESOLVED");
        }
        *self.location.lock().unwrap() = url.to_string();
        Ok(())
    }

    fn screenshot(&self) -> Result<Vec<u8>> {
        self.record(Call::Screenshot);
        if self.fail_screenshot {
            bail!("target crashed");
        }
        if self.empty_screenshot {
            return Ok(Vec::new());
        }
        Ok(PNG.to_vec())
    }

    fn current_location(&self) -> Result<String> {
        self.record(Call::Location);
        if self.fail_location {
            bail!("execution context destroyed");
        }
        Ok(self.location.lock().unwrap().clone())
    }

    fn click(&self, x: i64, y: i64, button: MouseButton) -> Result<()> {
        self.record(Call::Click(x, y, button));
        if self.fail_click {
            bail!("node detached");
        }
        Ok(())
    }

    fn double_click(&self, x: i64, y: i64) -> Result<()> {
        self.record(Call::DoubleClick(x, y));
        Ok(())
    }

    fn move_pointer(&self, x: i64, y: i64) -> Result<()> {
        self.record(Call::Move(x, y));
        Ok(())
    }

    fn type_text(&self, text: &str) -> Result<()> {
        self.record(Call::Type(text.to_string()));
        Ok(())
    }

    fn scroll(&self, x: i64, y: i64, scroll_x: i64, scroll_y: i64) -> Result<()> {
        self.record(Call::Scroll(x, y, scroll_x, scroll_y));
        Ok(())
    }

    fn key_press(&self, keys: &[KeyCode]) -> Result<()> {
        self.record(Call::Keys(keys.to_vec()));
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.record(Call::Close);
        *self.close_thread.lock().unwrap() = Some(std::thread::current().id());
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SentRequest {
    pub model: String,
    pub previous_response_id: Option<String>,
    pub input: Vec<InputItem>,
}

/// Decision service fake replaying scripted `output` arrays.
///
/// Once the script runs dry every reply asks for a screenshot, so the service never answers.
#[derive(Default)]
pub struct ScriptedService {
    script: Mutex<VecDeque<Value>>,
    requests: Mutex<Vec<SentRequest>>,
    latency: Duration,
    fail_on_call: Option<usize>,
}

impl ScriptedService {
    pub fn new(script: Vec<Value>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Default::default()
        }
    }

    pub fn never_answers() -> Self {
        Self::new(Vec::new())
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn failing_on_call(mut self, n: usize) -> Self {
        self.fail_on_call = Some(n);
        self
    }

    pub fn requests(&self) -> Vec<SentRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl DecisionService for ScriptedService {
    async fn send(
        &self,
        model: &str,
        previous_response_id: Option<&str>,
        input: &[InputItem],
    ) -> AgentResult<ResponseEnvelope> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let n = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(SentRequest {
                model: model.to_string(),
                previous_response_id: previous_response_id.map(String::from),
                input: input.to_vec(),
            });
            requests.len()
        };

        if self.fail_on_call == Some(n) {
            return Err(AgentError::Status {
                status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                body: "upstream overloaded".into(),
            });
        }

        let output = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| json!([computer_call(&format!("call_{n}"), json!({"type": "screenshot"}))]));

        Ok(serde_json::from_value(json!({
            "id": format!("resp_{n}"),
            "status": "completed",
            "output": output,
        }))
        .unwrap())
    }
}

pub fn computer_call(call_id: &str, action: Value) -> Value {
    json!({
        "type": "computer_call",
        "id": format!("cu_{call_id}"),
        "call_id": call_id,
        "action": action,
        "pending_safety_checks": [],
        "status": "completed"
    })
}

pub fn assistant_message(text: &str) -> Value {
    json!({
        "type": "message",
        "id": "msg_1",
        "role": "assistant",
        "content": [{"type": "output_text", "text": text, "annotations": []}]
    })
}

pub fn assistant_refusal(reason: &str) -> Value {
    json!({
        "type": "message",
        "id": "msg_1",
        "role": "assistant",
        "content": [{"type": "refusal", "refusal": reason}]
    })
}

pub fn fast_config() -> AgentConfig {
    AgentConfig {
        turn_delay: Duration::ZERO,
        wait_duration: Duration::from_millis(10),
        ..Default::default()
    }
}
