//! Capability tools and the tool registry.
//!
//! A *tool* is a named capability the remote voice agent may invoke during a
//! session: reading the battery level, changing screen brightness, flashing
//! the screen, and (in a browser) a handful of DOM interactions. The set of
//! tools is fixed by the [`Capability`] enum; which of them a session gets is
//! decided once per session by [`build_registry`] from the runtime
//! [`Platform`](napier_types::Platform) and the host APIs available in
//! [`EnvironmentCapabilities`].
//!
//! Host APIs are reached only through the [`DeviceApi`] and [`BrowserApi`]
//! traits. A missing device API is not an error: the tool answers with a
//! descriptive "unsupported" string so the agent can tell the user.

pub mod browser;
pub mod capability;
pub mod device;
pub mod error;
pub mod registry;
pub mod tool;

pub use browser::{BrowserApi, BrowserError};
pub use capability::Capability;
pub use device::{DeviceApi, DeviceError, UnsupportedDevice};
pub use error::{ToolCallError, ToolError};
pub use registry::{build_registry, EnvironmentCapabilities, ToolRegistry};
pub use tool::{Tool, ToolDefinition, ToolHandler};
