//! Browser DOM tools. Only registered when the session runs in a browser.

use crate::capability::Capability;
use crate::error::ToolError;
use crate::tool::{number_arg, string_arg, ToolHandler};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrowserError {
    #[error("no element matches selector '{0}'")]
    ElementNotFound(String),

    #[error("the browser blocked opening '{0}'")]
    Blocked(String),

    #[error("{0}")]
    Failed(String),
}

/// DOM operations available inside a browser document.
#[async_trait]
pub trait BrowserApi: Send + Sync {
    async fn open_tab(&self, url: &str) -> Result<(), BrowserError>;
    async fn click(&self, selector: &str) -> Result<(), BrowserError>;
    async fn type_text(&self, selector: &str, text: &str) -> Result<(), BrowserError>;
    async fn current_url(&self) -> Result<String, BrowserError>;
    async fn scroll_to(&self, x: f64, y: f64) -> Result<(), BrowserError>;
    async fn element_text(&self, selector: &str) -> Result<String, BrowserError>;
}

pub(crate) struct BrowserTool {
    capability: Capability,
    browser: Arc<dyn BrowserApi>,
}

impl BrowserTool {
    pub(crate) fn new(capability: Capability, browser: Arc<dyn BrowserApi>) -> Self {
        debug_assert!(capability.is_browser_only());
        Self {
            capability,
            browser,
        }
    }

    async fn dispatch(&self, args: &Value) -> Result<Value, ToolError> {
        let b = &self.browser;
        let value = match self.capability {
            Capability::OpenTab => {
                let url = string_arg(args, "url")?;
                b.open_tab(&url).await.map_err(failed)?;
                json!(format!("Opened {url} in a new tab."))
            }
            Capability::Click => {
                let selector = string_arg(args, "selector")?;
                b.click(&selector).await.map_err(failed)?;
                json!(format!("Clicked element {selector}."))
            }
            Capability::TypeText => {
                let selector = string_arg(args, "selector")?;
                let text = match args.get("text").and_then(Value::as_str) {
                    Some(t) => t.to_string(),
                    None => return Err(ToolError::InvalidArguments("'text' must be a string".into())),
                };
                b.type_text(&selector, &text).await.map_err(failed)?;
                json!(format!("Typed text into {selector}."))
            }
            Capability::GetUrl => json!(b.current_url().await.map_err(failed)?),
            Capability::Scroll => {
                let x = number_arg(args, "x")?;
                let y = number_arg(args, "y")?;
                b.scroll_to(x, y).await.map_err(failed)?;
                json!(format!("Scrolled to ({x}, {y})."))
            }
            Capability::GetText => {
                let selector = string_arg(args, "selector")?;
                json!(b.element_text(&selector).await.map_err(failed)?)
            }
            other => {
                return Err(ToolError::Failed(format!(
                    "{} is not a browser tool",
                    other.name()
                )))
            }
        };
        Ok(value)
    }
}

fn failed(e: BrowserError) -> ToolError {
    ToolError::Failed(e.to_string())
}

#[async_trait]
impl ToolHandler for BrowserTool {
    async fn call(&self, args: Value) -> Result<Value, ToolError> {
        tracing::debug!(tool = self.capability.name(), "browser tool call");
        self.dispatch(&args).await
    }
}
