//! # App
//!
//! Owns the World and the Schedule and drives frames:
//!
//! ```text
//! run()
//! ├─ startup systems
//! ├─ frame 1..N
//! │    ├─ Time::tick
//! │    ├─ update systems
//! │    └─ stop if an AppExit was sent or max_frames reached
//! └─ cleanup systems (reverse order, also after an error)
//! ```

use serde::{Deserialize, Serialize};

use ember_core::{Reader, World, WorldConfig};

use crate::error::{AppError, AppResult};
use crate::plugin::Plugin;
use crate::schedule::{Schedule, Stage};
use crate::time::Time;

/// Event that ends [`App::run`] after the current frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AppExit;

/// Configuration for the App.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Sizing of the World.
    pub world: WorldConfig,
    /// Stop after this many frames even without an [`AppExit`].
    pub max_frames: Option<u64>,
}

impl AppConfig {
    /// Parses a config from TOML text.
    ///
    /// ```toml
    /// max_frames = 600
    ///
    /// [world]
    /// entity_capacity = 100000
    /// ```
    ///
    /// # Errors
    ///
    /// [`AppError::Config`] if the text is not valid TOML or a field has
    /// the wrong type.
    pub fn from_toml_str(text: &str) -> AppResult<Self> {
        toml::from_str(text).map_err(|e| AppError::Config(e.to_string()))
    }
}

/// Summary of a finished run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunSummary {
    /// Frames executed.
    pub frames: u64,
    /// Whether the run ended because of an [`AppExit`] event.
    pub exit_requested: bool,
}

/// Composition root.
///
/// # Example
///
/// ```rust
/// use ember::{App, AppConfig, AppExit};
/// use ember_core::World;
///
/// let mut app = App::with_config(AppConfig { max_frames: Some(100), ..AppConfig::default() });
/// app.add_system(|world: &mut World| {
///     let frame = world.resource::<ember::Time>().map_or(0, ember::Time::frame);
///     if frame == 3 {
///         world.send_event(AppExit);
///     }
///     Ok(())
/// });
/// let summary = app.run().unwrap();
/// assert_eq!(summary.frames, 3);
/// assert!(summary.exit_requested);
/// ```
pub struct App {
    world: World,
    schedule: Schedule,
    exit_reader: Reader<AppExit>,
    config: AppConfig,
    plugins: Vec<&'static str>,
}

impl App {
    /// Creates an App with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    /// Creates an App from `config`.
    #[must_use]
    pub fn with_config(config: AppConfig) -> Self {
        let mut world = World::with_config(config.world.clone());
        world.insert_resource(Time::new());
        let exit_reader = world.subscribe::<AppExit>();

        Self {
            world,
            schedule: Schedule::new(),
            exit_reader,
            config,
            plugins: Vec::new(),
        }
    }

    /// The World.
    #[inline]
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// The World, mutably.
    #[inline]
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Configuration this App was built with.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Names of the plugins added so far, in order.
    #[must_use]
    pub fn plugins(&self) -> &[&'static str] {
        &self.plugins
    }

    /// The schedule.
    #[must_use]
    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Builds `plugin` into this App.
    pub fn add_plugin(&mut self, plugin: impl Plugin) -> &mut Self {
        tracing::debug!(plugin = plugin.name(), "adding plugin");
        self.plugins.push(plugin.name());
        plugin.build(self);
        self
    }

    /// Adds an update system.
    pub fn add_system<F>(&mut self, system: F) -> &mut Self
    where
        F: FnMut(&mut World) -> AppResult<()> + 'static,
    {
        self.schedule.add_system(Stage::Update, system);
        self
    }

    /// Adds a startup system.
    pub fn add_startup_system<F>(&mut self, system: F) -> &mut Self
    where
        F: FnMut(&mut World) -> AppResult<()> + 'static,
    {
        self.schedule.add_system(Stage::Startup, system);
        self
    }

    /// Adds a cleanup system. Cleanup systems run in reverse order.
    pub fn add_cleanup_system<F>(&mut self, system: F) -> &mut Self
    where
        F: FnMut(&mut World) -> AppResult<()> + 'static,
    {
        self.schedule.add_system(Stage::Cleanup, system);
        self
    }

    /// Stores a resource in the World.
    pub fn insert_resource<R: 'static>(&mut self, value: R) -> &mut Self {
        self.world.insert_resource(value);
        self
    }

    /// Ensures an event channel for `E` exists.
    pub fn add_event<E: 'static>(&mut self) -> &mut Self {
        self.world.add_event::<E>();
        self
    }

    /// Runs one frame of update systems.
    ///
    /// # Returns
    ///
    /// `true` if an [`AppExit`] was sent before or during the frame.
    ///
    /// # Errors
    ///
    /// The first error an update system returns.
    pub fn update(&mut self) -> AppResult<bool> {
        if let Some(time) = self.world.resource_mut::<Time>() {
            time.tick();
        }
        let frame = self.world.resource::<Time>().map_or(0, Time::frame);

        let span = tracing::trace_span!("frame", frame);
        let _guard = span.enter();
        self.schedule.run(Stage::Update, &mut self.world)?;

        Ok(self.world.read_events(&mut self.exit_reader).next().is_some())
    }

    /// Runs startup, frames until exit, then cleanup.
    ///
    /// Cleanup systems run even if startup or a frame failed.
    ///
    /// # Errors
    ///
    /// The first error any system returns. If both a frame and cleanup
    /// fail, the frame's error wins.
    pub fn run(&mut self) -> AppResult<RunSummary> {
        tracing::info!(plugins = self.plugins.len(), "app starting");

        let result = self.run_frames();
        let cleanup = self.schedule.run(Stage::Cleanup, &mut self.world);
        let summary = result?;
        cleanup?;

        tracing::info!(frames = summary.frames, "app finished");
        Ok(summary)
    }

    fn run_frames(&mut self) -> AppResult<RunSummary> {
        self.schedule.run(Stage::Startup, &mut self.world)?;

        let mut frames = 0;
        loop {
            if self.config.max_frames.is_some_and(|max| frames >= max) {
                return Ok(RunSummary {
                    frames,
                    exit_requested: false,
                });
            }
            let exit_requested = self.update()?;
            frames += 1;
            if exit_requested {
                return Ok(RunSummary {
                    frames,
                    exit_requested,
                });
            }
        }
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("world", &self.world)
            .field("schedule", &self.schedule)
            .field("plugins", &self.plugins)
            .finish_non_exhaustive()
    }
}
