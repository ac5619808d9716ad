//! Device tools: battery, brightness, flash.

use crate::capability::Capability;
use crate::error::ToolError;
use crate::tool::{number_arg, ToolHandler};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// How long the screen stays at full brightness when flashing.
pub const FLASH_DURATION: Duration = Duration::from_millis(200);

pub const BATTERY_UNSUPPORTED: &str =
    "Error: Device does not support retrieving the battery level.";
pub const BRIGHTNESS_UNSUPPORTED: &str =
    "Error: Device does not support changing the screen brightness.";
pub const FLASH_DONE: &str = "Successfully flashed the screen.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("not supported on this device")]
    Unsupported,

    #[error("{0}")]
    Failed(String),
}

/// Host device APIs.
#[async_trait]
pub trait DeviceApi: Send + Sync {
    /// Battery level in `0.0..=1.0`, or `None` if the platform cannot report
    /// one. Negative readings are treated as unsupported too.
    async fn battery_level(&self) -> Option<f64>;

    /// Sets the system brightness to `level` in `0.0..=1.0`.
    async fn set_brightness(&self, level: f64) -> Result<(), DeviceError>;
}

/// A device with no battery or brightness APIs (desktop browsers, tests).
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedDevice;

#[async_trait]
impl DeviceApi for UnsupportedDevice {
    async fn battery_level(&self) -> Option<f64> {
        None
    }

    async fn set_brightness(&self, _level: f64) -> Result<(), DeviceError> {
        Err(DeviceError::Unsupported)
    }
}

/// Handler for the three device capabilities.
pub(crate) struct DeviceTool {
    capability: Capability,
    device: Arc<dyn DeviceApi>,
}

impl DeviceTool {
    pub(crate) fn new(capability: Capability, device: Arc<dyn DeviceApi>) -> Self {
        debug_assert!(!capability.is_browser_only());
        Self { capability, device }
    }

    async fn battery(&self) -> Value {
        match self.device.battery_level().await {
            Some(level) if level >= 0.0 => json!(level),
            _ => json!(BATTERY_UNSUPPORTED),
        }
    }

    async fn brightness(&self, args: &Value) -> Result<Value, ToolError> {
        let level = number_arg(args, "brightness")?;
        if !(0.0..=1.0).contains(&level) {
            return Err(ToolError::InvalidArguments(format!(
                "brightness must be between 0 and 1, got {level}"
            )));
        }
        match self.device.set_brightness(level).await {
            Ok(()) => Ok(json!(level)),
            Err(DeviceError::Unsupported) => Ok(json!(BRIGHTNESS_UNSUPPORTED)),
            Err(DeviceError::Failed(msg)) => Err(ToolError::Failed(msg)),
        }
    }

    async fn flash(&self) -> Result<Value, ToolError> {
        match self.device.set_brightness(1.0).await {
            Ok(()) => {}
            Err(DeviceError::Unsupported) => return Ok(json!(BRIGHTNESS_UNSUPPORTED)),
            Err(DeviceError::Failed(msg)) => return Err(ToolError::Failed(msg)),
        }

        // The call returns right away; dimming happens in the background.
        let device = Arc::clone(&self.device);
        tokio::spawn(async move {
            tokio::time::sleep(FLASH_DURATION).await;
            if let Err(e) = device.set_brightness(0.0).await {
                tracing::warn!("failed to restore brightness after flash: {}", e);
            }
        });

        Ok(json!(FLASH_DONE))
    }
}

#[async_trait]
impl ToolHandler for DeviceTool {
    async fn call(&self, args: Value) -> Result<Value, ToolError> {
        tracing::debug!(tool = self.capability.name(), "device tool call");
        match self.capability {
            Capability::Battery => Ok(self.battery().await),
            Capability::Brightness => self.brightness(&args).await,
            Capability::Flash => self.flash().await,
            other => Err(ToolError::Failed(format!(
                "{} is not a device tool",
                other.name()
            ))),
        }
    }
}
