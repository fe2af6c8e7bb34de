//! # EMBER
//!
//! Application layer over [`ember_core`].
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                     App                      │
//! │  ┌──────────┐  ┌──────────┐  ┌────────────┐  │
//! │  │ Plugin A │  │ Plugin B │  │  Plugin C  │  │
//! │  └────┬─────┘  └────┬─────┘  └─────┬──────┘  │
//! │       │ systems     │ systems      │ systems │
//! │       ▼             ▼              ▼         │
//! │  ┌────────────────────────────────────────┐  │
//! │  │ Schedule: startup → update* → cleanup  │  │
//! │  └───────────────────┬────────────────────┘  │
//! │                      ▼                       │
//! │  ┌────────────────────────────────────────┐  │
//! │  │ World: entities, components, resources │  │
//! │  │        EventChannel<WindowEvent>, ...   │  │
//! │  └────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Plugins only share the World: one pushes events into a channel, others
//! subscribe to it.
//!
//! ## Modules
//!
//! - `app`: frame loop, exit handling, configuration
//! - `schedule`: startup/update/cleanup system lists
//! - `plugin`: the [`Plugin`] trait
//! - `time`: the [`Time`] resource
//! - `window`: window events and [`ExitOnWindowClose`]

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]

pub mod app;
pub mod error;
pub mod plugin;
pub mod schedule;
pub mod time;
pub mod window;

// Re-export the core
pub use ember_core as core;

pub use app::{App, AppConfig, AppExit, RunSummary};
pub use error::{AppError, AppResult};
pub use plugin::Plugin;
pub use schedule::{BoxedSystem, Schedule, Stage};
pub use time::Time;
pub use window::{ExitOnWindowClose, WindowEvent};
