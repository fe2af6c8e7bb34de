//! Integration tests for the App, plugins and cross-plugin events.

use ember::core::World;
use ember::{App, AppConfig, AppError, AppExit, ExitOnWindowClose, Plugin, WindowEvent};

#[derive(Default)]
struct Trace(Vec<String>);

fn trace(world: &mut World, line: impl Into<String>) {
    world.resource_or_insert_with(Trace::default).0.push(line.into());
}

/// Registers startup and cleanup systems that record `tag`.
struct Traced(&'static str);

impl Plugin for Traced {
    fn build(&self, app: &mut App) {
        let tag = self.0;
        app.add_startup_system(move |world: &mut World| {
            trace(world, format!("start {tag}"));
            Ok(())
        });
        app.add_cleanup_system(move |world: &mut World| {
            trace(world, format!("stop {tag}"));
            Ok(())
        });
    }
}

/// Stand-in for a windowing backend: emits a close request on frame 4.
struct FakeWindow;

impl Plugin for FakeWindow {
    fn build(&self, app: &mut App) {
        app.add_event::<WindowEvent>();
        app.add_system(|world: &mut World| {
            let frame = world.resource::<ember::Time>().map_or(0, ember::Time::frame);
            if frame == 2 {
                world.send_event(WindowEvent::Resized {
                    width: 1280,
                    height: 720,
                });
            }
            if frame == 4 {
                world.send_event(WindowEvent::CloseRequested);
            }
            Ok(())
        });
    }
}

/// Unrelated subscriber that only cares about resizes.
struct Viewport;

#[derive(Debug, PartialEq, Eq)]
struct ViewportSize(u32, u32);

impl Plugin for Viewport {
    fn build(&self, app: &mut App) {
        app.insert_resource(ViewportSize(0, 0));
        let mut reader = app.world_mut().subscribe::<WindowEvent>();
        app.add_system(move |world: &mut World| {
            let last = world
                .read_events(&mut reader)
                .filter_map(|event| match *event {
                    WindowEvent::Resized { width, height } => Some(ViewportSize(width, height)),
                    _ => None,
                })
                .last();
            if let Some(size) = last {
                world.insert_resource(size);
            }
            Ok(())
        });
    }
}

#[test]
fn test_cleanup_runs_in_reverse_order() {
    let mut app = App::with_config(AppConfig {
        max_frames: Some(1),
        ..AppConfig::default()
    });
    app.add_plugin(Traced("audio"))
        .add_plugin(Traced("physics"))
        .add_plugin(Traced("render"));
    app.run().unwrap();

    let lines = &app.world().resource::<Trace>().unwrap().0;
    assert_eq!(
        lines,
        &[
            "start audio",
            "start physics",
            "start render",
            "stop render",
            "stop physics",
            "stop audio",
        ]
    );
}

#[test]
fn test_window_close_exits_through_decoupled_plugins() {
    let mut app = App::with_config(AppConfig {
        max_frames: Some(100),
        ..AppConfig::default()
    });
    app.add_plugin(FakeWindow)
        .add_plugin(Viewport)
        .add_plugin(ExitOnWindowClose);

    let summary = app.run().unwrap();
    assert!(summary.exit_requested);
    assert_eq!(summary.frames, 4);
    assert_eq!(
        app.world().resource::<ViewportSize>(),
        Some(&ViewportSize(1280, 720))
    );
    assert_eq!(app.plugins().len(), 3);
}

#[test]
fn test_system_error_still_runs_cleanup() {
    let mut app = App::new();
    app.add_plugin(Traced("net"));
    app.add_system(|_: &mut World| {
        Err(AppError::System {
            system: "net_poll",
            message: "socket closed".into(),
        })
    });

    let err = app.run().unwrap_err();
    assert_eq!(err.to_string(), "system `net_poll` failed: socket closed");
    let lines = &app.world().resource::<Trace>().unwrap().0;
    assert_eq!(lines.last().map(String::as_str), Some("stop net"));
}

#[test]
fn test_ecs_errors_convert() {
    let mut app = App::with_config(AppConfig {
        max_frames: Some(1),
        ..AppConfig::default()
    });
    app.add_startup_system(|world: &mut World| {
        let e = world.create_entity();
        world.attach(e, 1u32)?;
        Ok(())
    });

    let err = app.run().unwrap_err();
    assert!(matches!(err, AppError::Ecs(_)));
}

#[test]
fn test_manual_update_loop() {
    let mut app = App::new();
    app.add_system(|world: &mut World| {
        if world.resource::<ember::Time>().map_or(0, ember::Time::frame) == 2 {
            world.send_event(AppExit);
        }
        Ok(())
    });

    assert!(!app.update().unwrap());
    assert!(app.update().unwrap());
    assert!(!app.update().unwrap());
}
