//! # Plugins
//!
//! A plugin is a bundle of resources, events and systems added to an
//! [`App`] in one call. Plugins never reference each other directly; they
//! talk through event channels stored in the World.

use std::any::type_name;

use crate::app::App;

/// A unit of App configuration.
///
/// # Example
///
/// ```rust
/// use ember::{App, Plugin};
///
/// struct Gravity(f32);
///
/// struct PhysicsPlugin;
///
/// impl Plugin for PhysicsPlugin {
///     fn build(&self, app: &mut App) {
///         app.insert_resource(Gravity(-9.81));
///     }
/// }
///
/// let mut app = App::new();
/// app.add_plugin(PhysicsPlugin);
/// assert!(app.world().contains_resource::<Gravity>());
/// ```
pub trait Plugin: 'static {
    /// Adds this plugin's resources, events and systems.
    fn build(&self, app: &mut App);

    /// Diagnostic name.
    fn name(&self) -> &'static str {
        type_name::<Self>()
    }
}
