//! # System Schedule
//!
//! Systems are closures over the World, grouped into three stages:
//!
//! ```text
//! startup  (once, registration order)
//!    │
//!    ▼
//! update   (every frame, registration order)  ◄──┐
//!    │                                           │
//!    ├───────────────────────────────────────────┘
//!    ▼
//! cleanup  (once, REVERSE registration order)
//! ```
//!
//! Cleanup runs in reverse so that a plugin registered later, which may
//! depend on an earlier one, tears down first.

use std::any::type_name;

use ember_core::World;

use crate::error::AppResult;

/// A boxed system.
pub type BoxedSystem = Box<dyn FnMut(&mut World) -> AppResult<()>>;

/// When a system runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Once, before the first frame.
    Startup,
    /// Once per frame.
    Update,
    /// Once, after the last frame.
    Cleanup,
}

struct SystemEntry {
    name: &'static str,
    run: BoxedSystem,
}

impl SystemEntry {
    fn run(&mut self, world: &mut World) -> AppResult<()> {
        let span = tracing::trace_span!("system", name = self.name);
        let _guard = span.enter();
        (self.run)(world)
    }
}

/// Ordered systems for each [`Stage`].
#[derive(Default)]
pub struct Schedule {
    startup: Vec<SystemEntry>,
    update: Vec<SystemEntry>,
    cleanup: Vec<SystemEntry>,
}

impl Schedule {
    /// Creates an empty schedule.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a system to `stage`.
    pub fn add_system<F>(&mut self, stage: Stage, system: F)
    where
        F: FnMut(&mut World) -> AppResult<()> + 'static,
    {
        let entry = SystemEntry {
            name: type_name::<F>(),
            run: Box::new(system),
        };
        tracing::debug!(?stage, system = entry.name, "system added");
        self.stage_mut(stage).push(entry);
    }

    /// Number of systems in `stage`.
    #[must_use]
    pub fn len(&self, stage: Stage) -> usize {
        match stage {
            Stage::Startup => self.startup.len(),
            Stage::Update => self.update.len(),
            Stage::Cleanup => self.cleanup.len(),
        }
    }

    /// Checks if no system is registered in any stage.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.startup.is_empty() && self.update.is_empty() && self.cleanup.is_empty()
    }

    fn stage_mut(&mut self, stage: Stage) -> &mut Vec<SystemEntry> {
        match stage {
            Stage::Startup => &mut self.startup,
            Stage::Update => &mut self.update,
            Stage::Cleanup => &mut self.cleanup,
        }
    }

    /// Runs every system of `stage` in its order, stopping at the first
    /// error.
    ///
    /// # Errors
    ///
    /// The first error a system returns.
    pub fn run(&mut self, stage: Stage, world: &mut World) -> AppResult<()> {
        match stage {
            Stage::Startup => run_all(self.startup.iter_mut(), world),
            Stage::Update => run_all(self.update.iter_mut(), world),
            Stage::Cleanup => run_all(self.cleanup.iter_mut().rev(), world),
        }
    }
}

fn run_all<'a>(systems: impl Iterator<Item = &'a mut SystemEntry>, world: &mut World) -> AppResult<()> {
    for system in systems {
        system.run(world)?;
    }
    Ok(())
}

impl std::fmt::Debug for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = |systems: &[SystemEntry]| systems.iter().map(|s| s.name).collect::<Vec<_>>();
        f.debug_struct("Schedule")
            .field("startup", &names(&self.startup))
            .field("update", &names(&self.update))
            .field("cleanup", &names(&self.cleanup))
            .finish()
    }
}
