//! # Window Events
//!
//! The windowing backend lives outside this crate. It pushes
//! [`WindowEvent`]s into the World; any number of systems subscribe to
//! them without knowing about the backend or each other.

use ember_core::World;

use crate::app::{App, AppExit};
use crate::plugin::Plugin;

/// Something that happened to the window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowEvent {
    /// The drawable area changed size.
    Resized {
        /// New width in pixels.
        width: u32,
        /// New height in pixels.
        height: u32,
    },
    /// The window gained or lost focus.
    Focused(bool),
    /// The user asked to close the window.
    CloseRequested,
}

/// Turns [`WindowEvent::CloseRequested`] into [`AppExit`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ExitOnWindowClose;

impl Plugin for ExitOnWindowClose {
    fn build(&self, app: &mut App) {
        app.add_event::<WindowEvent>();
        let mut reader = app.world_mut().subscribe::<WindowEvent>();

        app.add_system(move |world: &mut World| {
            let close = world
                .read_events(&mut reader)
                .any(|event| *event == WindowEvent::CloseRequested);
            if close {
                tracing::info!("window close requested");
                world.send_event(AppExit);
            }
            Ok(())
        });
    }
}
