//! The fixed list of capabilities a session can expose.

use napier_types::Platform;
use serde_json::{json, Value};

/// A capability that can be exposed to the voice agent as a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Battery,
    Brightness,
    Flash,
    OpenTab,
    Click,
    TypeText,
    GetUrl,
    Scroll,
    GetText,
}

impl Capability {
    /// Every capability, device tools first.
    pub const ALL: [Capability; 9] = [
        Capability::Battery,
        Capability::Brightness,
        Capability::Flash,
        Capability::OpenTab,
        Capability::Click,
        Capability::TypeText,
        Capability::GetUrl,
        Capability::Scroll,
        Capability::GetText,
    ];

    /// The tool name the agent uses to call this capability.
    pub fn name(self) -> &'static str {
        match self {
            Self::Battery => "battery",
            Self::Brightness => "brightness",
            Self::Flash => "flash",
            Self::OpenTab => "open_tab",
            Self::Click => "click",
            Self::TypeText => "type_text",
            Self::GetUrl => "get_url",
            Self::Scroll => "scroll",
            Self::GetText => "get_text",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Whether this capability needs a browser document.
    pub fn is_browser_only(self) -> bool {
        !matches!(self, Self::Battery | Self::Brightness | Self::Flash)
    }

    /// Whether this capability may be registered on `platform`.
    pub fn available_on(self, platform: Platform) -> bool {
        !self.is_browser_only() || platform.is_browser()
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Battery => "Gets the device battery level as a number between 0 and 1.",
            Self::Brightness => "Changes the screen brightness to a level between 0 and 1.",
            Self::Flash => "Briefly flashes the screen at full brightness.",
            Self::OpenTab => "Opens a URL in a new browser tab.",
            Self::Click => "Clicks the first element matching a CSS selector.",
            Self::TypeText => "Types text into the element matching a CSS selector.",
            Self::GetUrl => "Returns the URL of the current page.",
            Self::Scroll => "Scrolls the page to the given x/y position.",
            Self::GetText => "Returns the text content of the element matching a CSS selector.",
        }
    }

    /// JSON schema of the arguments object.
    pub fn parameters(self) -> Value {
        match self {
            Self::Battery | Self::Flash | Self::GetUrl => {
                json!({"type": "object", "properties": {}})
            }
            Self::Brightness => json!({
                "type": "object",
                "properties": {
                    "brightness": {"type": "number", "minimum": 0, "maximum": 1}
                },
                "required": ["brightness"]
            }),
            Self::OpenTab => json!({
                "type": "object",
                "properties": {"url": {"type": "string"}},
                "required": ["url"]
            }),
            Self::Click | Self::GetText => json!({
                "type": "object",
                "properties": {"selector": {"type": "string"}},
                "required": ["selector"]
            }),
            Self::TypeText => json!({
                "type": "object",
                "properties": {
                    "selector": {"type": "string"},
                    "text": {"type": "string"}
                },
                "required": ["selector", "text"]
            }),
            Self::Scroll => json!({
                "type": "object",
                "properties": {
                    "x": {"type": "number"},
                    "y": {"type": "number"}
                },
                "required": ["x", "y"]
            }),
        }
    }
}
