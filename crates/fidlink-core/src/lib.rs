//! Device communication and control layer between `fidlink-api` and the CLI.
//!
//! - **[`Fiducials`]**: the facade. Created with no controller selected;
//!   [`select_device()`](Fiducials::select_device) builds the hardware or
//!   simulator [`ChannelController`], switches every channel off and reads
//!   status once.
//!
//! - **[`DeviceLink`]**: everything needed to talk to one remote device.
//!   A watch-guarded [`DeviceRegistry`] record, an optional
//!   [`DiscoveryAgent`] that fills it from UDP announcements, a
//!   [`ConnectionManager`] that owns the RPC handle, and a
//!   [`RemoteInvoker`] that retries a failed call once after reconnecting.
//!
//! - **Shutter harness** ([`shutter`]): per-spectrograph command queues, each
//!   drained by its own worker task.

pub mod channels;
pub mod config;
pub mod connection;
pub mod discovery;
pub mod error;
pub mod facade;
pub mod invoker;
pub mod link;
pub mod registry;
pub mod shutter;

// ── Primary re-exports ──────────────────────────────────────────────
pub use channels::{ChannelController, ChannelState, ChannelStatus, Duty, StatusReport};
pub use config::{
    ChannelDescriptor, ChannelSet, ControllerKind, DiscoverySettings, FiducialConfig,
    StaticAddress,
};
pub use connection::ConnectionManager;
pub use discovery::DiscoveryAgent;
pub use error::CoreError;
pub use facade::Fiducials;
pub use invoker::RemoteInvoker;
pub use link::{DeviceLink, Reachability};
pub use registry::{DeviceRecord, DeviceRegistry, MatchOutcome};
pub use shutter::{Preparation, ShutterBank, ShutterWorker, Spectrograph, SpectrographTarget};

// Wire types callers need without depending on fidlink-api directly.
pub use fidlink_api::{Announcement, Seeker, ShutterAction};
