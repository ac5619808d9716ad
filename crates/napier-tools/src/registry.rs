//! Per-session tool registry.

use crate::browser::{BrowserApi, BrowserTool};
use crate::capability::Capability;
use crate::device::{DeviceApi, DeviceTool, UnsupportedDevice};
use crate::error::ToolCallError;
use crate::tool::{Tool, ToolDefinition, ToolHandler};
use futures_util::FutureExt;
use napier_types::Platform;
use serde_json::Value;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Host APIs available to the current runtime.
#[derive(Clone)]
pub struct EnvironmentCapabilities {
    pub device: Arc<dyn DeviceApi>,
    /// Present only when running inside a browser document.
    pub browser: Option<Arc<dyn BrowserApi>>,
}

impl EnvironmentCapabilities {
    pub fn new(device: Arc<dyn DeviceApi>) -> Self {
        Self {
            device,
            browser: None,
        }
    }

    /// An environment with no device or browser APIs at all.
    pub fn headless() -> Self {
        Self::new(Arc::new(UnsupportedDevice))
    }

    pub fn with_browser(mut self, browser: Arc<dyn BrowserApi>) -> Self {
        self.browser = Some(browser);
        self
    }
}

impl Default for EnvironmentCapabilities {
    fn default() -> Self {
        Self::headless()
    }
}

/// Builds the tool set for one session.
///
/// Device tools are always present; their handlers report unsupported APIs
/// as results. Browser tools are added only when the platform is a browser
/// *and* the environment carries a [`BrowserApi`]. No I/O happens here.
pub fn build_registry(platform: Platform, env: &EnvironmentCapabilities) -> ToolRegistry {
    let mut tools = BTreeMap::new();

    for capability in Capability::ALL {
        if !capability.available_on(platform) {
            continue;
        }
        let handler: Arc<dyn ToolHandler> = if capability.is_browser_only() {
            match &env.browser {
                Some(browser) => Arc::new(BrowserTool::new(capability, Arc::clone(browser))),
                None => continue,
            }
        } else {
            Arc::new(DeviceTool::new(capability, Arc::clone(&env.device)))
        };
        tools.insert(capability.name(), Tool::new(capability, handler));
    }

    tracing::debug!(
        platform = platform.as_str(),
        count = tools.len(),
        "built tool registry"
    );

    ToolRegistry { tools }
}

/// Mapping from tool name to [`Tool`] for one session. Immutable once built.
#[derive(Clone, Debug, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, Tool>,
}

impl ToolRegistry {
    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Tool names in sorted order.
    pub fn names(&self) -> Vec<&'static str> {
        self.tools.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(Tool::definition).collect()
    }

    /// Runs the named tool.
    ///
    /// A panicking handler is contained and reported as
    /// [`ToolCallError::Panicked`].
    pub async fn invoke(&self, name: &str, args: Value) -> Result<Value, ToolCallError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolCallError::UnknownTool(name.to_string()))?;

        match AssertUnwindSafe(tool.handler().call(args))
            .catch_unwind()
            .await
        {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                tracing::info!(tool = name, "tool returned an error: {}", e);
                Err(ToolCallError::Failed {
                    name: name.to_string(),
                    message: e.to_string(),
                })
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(tool = name, "tool handler panicked: {}", message);
                Err(ToolCallError::Panicked {
                    name: name.to_string(),
                    message,
                })
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}
