use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_MODEL: &str = "computer-use-preview-2025-03-11";
pub const DEFAULT_MAX_TURNS: usize = 20;
pub const DEFAULT_VIEWPORT: (u32, u32) = (1024, 768);

/// Mouse button named by the service. Unknown names fall back to the primary button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
}

impl MouseButton {
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "right" => Self::Right,
            "middle" | "wheel" => Self::Middle,
            _ => Self::Left,
        }
    }
}

/// Physical keys the dispatcher is able to press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCode {
    Enter,
    Delete,
    Tab,
    Escape,
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
    PageUp,
    PageDown,
}

impl KeyCode {
    /// Translate a key name sent by the service. Matching is case-insensitive.
    pub fn from_name(name: &str) -> Option<Self> {
        let key = match name.trim().to_ascii_lowercase().as_str() {
            "enter" | "return" => Self::Enter,
            "delete" => Self::Delete,
            "tab" => Self::Tab,
            "escape" | "esc" => Self::Escape,
            "left" | "arrowleft" | "arrow_left" => Self::ArrowLeft,
            "right" | "arrowright" | "arrow_right" => Self::ArrowRight,
            "up" | "arrowup" | "arrow_up" => Self::ArrowUp,
            "down" | "arrowdown" | "arrow_down" => Self::ArrowDown,
            "page_up" | "pageup" => Self::PageUp,
            "page_down" | "pagedown" => Self::PageDown,
            _ => return None,
        };
        Some(key)
    }

    /// The DOM `KeyboardEvent.key` value Chrome expects for this key.
    pub fn dom_key(self) -> &'static str {
        match self {
            Self::Enter => "Enter",
            Self::Delete => "Delete",
            Self::Tab => "Tab",
            Self::Escape => "Escape",
            Self::ArrowLeft => "ArrowLeft",
            Self::ArrowRight => "ArrowRight",
            Self::ArrowUp => "ArrowUp",
            Self::ArrowDown => "ArrowDown",
            Self::PageUp => "PageUp",
            Self::PageDown => "PageDown",
        }
    }
}

/// Reads an explicit `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Action object exactly as it appears on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
struct WireAction {
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    keys: Vec<String>,
    #[serde(default)]
    button: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    text: String,
    #[serde(default, deserialize_with = "null_as_default")]
    x: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    y: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    scroll_x: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    scroll_y: i64,
}

/// A single UI operation the decision service asks the agent to perform.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "WireAction")]
pub enum Action {
    Screenshot,
    Type { text: String },
    Click { x: i64, y: i64, button: MouseButton },
    DoubleClick { x: i64, y: i64 },
    Move { x: i64, y: i64 },
    Scroll { x: i64, y: i64, scroll_x: i64, scroll_y: i64 },
    KeyPress { keys: Vec<String> },
    /// Any duration requested by the service is ignored.
    Wait,
    Unrecognized { kind: String },
}

impl From<WireAction> for Action {
    fn from(wire: WireAction) -> Self {
        let WireAction {
            kind,
            keys,
            button,
            text,
            x,
            y,
            scroll_x,
            scroll_y,
        } = wire;

        match kind.as_str() {
            "screenshot" => Action::Screenshot,
            "type" => Action::Type { text },
            "click" => Action::Click {
                x,
                y,
                button: button.as_deref().map(MouseButton::from_name).unwrap_or_default(),
            },
            "double_click" => Action::DoubleClick { x, y },
            "move" => Action::Move { x, y },
            "scroll" => Action::Scroll {
                x,
                y,
                scroll_x,
                scroll_y,
            },
            "keypress" => Action::KeyPress { keys },
            "wait" => Action::Wait,
            _ => Action::Unrecognized { kind },
        }
    }
}

impl Action {
    /// Wire name of the action kind.
    pub fn kind(&self) -> &str {
        match self {
            Action::Screenshot => "screenshot",
            Action::Type { .. } => "type",
            Action::Click { .. } => "click",
            Action::DoubleClick { .. } => "double_click",
            Action::Move { .. } => "move",
            Action::Scroll { .. } => "scroll",
            Action::KeyPress { .. } => "keypress",
            Action::Wait => "wait",
            Action::Unrecognized { kind } => kind,
        }
    }
}

/// Advisory attached to an action that the service wants acknowledged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyCheck {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub code: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
    /// Set instead of `text` when the model declines the task.
    #[serde(default)]
    pub refusal: Option<String>,
}

impl ContentPart {
    fn body(&self) -> Option<&str> {
        self.text
            .as_deref()
            .or(self.refusal.as_deref())
            .filter(|text| !text.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputItem {
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub call_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub action: Option<Action>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: Vec<ContentPart>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pending_safety_checks: Vec<SafetyCheck>,
}

impl OutputItem {
    /// Text of the first non-empty content part, if this item is an assistant message.
    /// A refusal counts as an answer.
    pub fn final_answer(&self) -> Option<&str> {
        if self.role.as_deref() != Some("assistant") {
            return None;
        }
        self.content.iter().find_map(ContentPart::body)
    }
}

/// One reply from the decision service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseEnvelope {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub model: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub output: Vec<OutputItem>,
}

/// Screenshot and location captured after every action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub screenshot: Vec<u8>,
    pub location: String,
}

impl Observation {
    pub fn data_url(&self) -> String {
        format!("data:image/png;base64,{}", STANDARD.encode(&self.screenshot))
    }

    pub fn to_computer_output(&self) -> ComputerOutput {
        ComputerOutput {
            kind: "input_image".to_string(),
            image_url: self.data_url(),
            current_url: self.location.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComputerOutput {
    #[serde(rename = "type")]
    pub kind: String,
    pub image_url: String,
    pub current_url: String,
}

/// An item sent to the decision service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputItem {
    Message {
        role: String,
        content: String,
    },
    ComputerCallOutput {
        call_id: String,
        output: ComputerOutput,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        acknowledged_safety_checks: Vec<SafetyCheck>,
    },
}

impl InputItem {
    pub fn user(content: impl Into<String>) -> Self {
        InputItem::Message {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn call_output(
        call_id: impl Into<String>,
        observation: &Observation,
        acknowledged_safety_checks: Vec<SafetyCheck>,
    ) -> Self {
        InputItem::ComputerCallOutput {
            call_id: call_id.into(),
            output: observation.to_computer_output(),
            acknowledged_safety_checks,
        }
    }
}
