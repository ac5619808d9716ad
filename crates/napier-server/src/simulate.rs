//! Server-side stand-ins for the device tools.
//!
//! These answer `/api/execute-tool` without touching any device. They share
//! tool names with the client's real device tools but not their results.

use napier_tools::Capability;
use rand::Rng;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimulationError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
}

/// Runs the stand-in for a device tool. Browser-only tools are unknown here.
pub fn simulate_tool(tool: &str, data: &Value) -> Result<Value, SimulationError> {
    match Capability::from_name(tool) {
        Some(Capability::Battery) => {
            let level: f64 = rand::thread_rng().gen_range(0.0..=1.0);
            Ok(json!({ "batteryLevel": format!("{level:.2}") }))
        }
        Some(Capability::Brightness) => Ok(json!({
            "brightness": data.get("brightness").cloned().unwrap_or(Value::Null)
        })),
        Some(Capability::Flash) => Ok(json!({ "success": true })),
        _ => Err(SimulationError::UnknownTool(tool.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn battery_is_a_two_decimal_string_in_range() {
        for _ in 0..50 {
            let result = simulate_tool("battery", &json!({})).unwrap();
            let level = result["batteryLevel"].as_str().unwrap();
            assert_eq!(level.len(), 4, "{level}");
            let parsed: f64 = level.parse().unwrap();
            assert!((0.0..=1.0).contains(&parsed));
        }
    }

    #[test]
    fn brightness_echoes_the_request() {
        assert_eq!(
            simulate_tool("brightness", &json!({"brightness": 0.4})).unwrap(),
            json!({"brightness": 0.4})
        );
        assert_eq!(
            simulate_tool("brightness", &json!({})).unwrap(),
            json!({"brightness": null})
        );
    }

    #[test]
    fn flash_succeeds() {
        assert_eq!(
            simulate_tool("flash", &Value::Null).unwrap(),
            json!({"success": true})
        );
    }

    #[test]
    fn browser_tools_are_not_simulated() {
        let err = simulate_tool("open_tab", &json!({"url": "https://a.b"})).unwrap_err();
        assert_eq!(err.to_string(), "Unknown tool: open_tab");
    }

    #[test]
    fn every_device_capability_has_a_stand_in() {
        for capability in Capability::ALL {
            let outcome = simulate_tool(capability.name(), &json!({}));
            assert_eq!(outcome.is_ok(), !capability.is_browser_only(), "{capability:?}");
        }
    }
}
