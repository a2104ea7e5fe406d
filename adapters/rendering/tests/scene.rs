use std::time::Duration;

use pipeflow_core::{Archetype, Command, DrawTier, Event, GroupId, Point, WaterTint};
use pipeflow_rendering::{tint_color, Color, Scene};
use pipeflow_world::{self as world, query, World};

fn execute(world: &mut World, command: Command) -> Vec<Event> {
    let mut events = Vec::new();
    world::apply(world, command, &mut events);
    events
}

fn build_corner(world: &mut World) -> GroupId {
    let path = vec![
        Point::new(0.0, 0.0),
        Point::new(1.0, 0.0),
        Point::new(1.0, 1.0),
    ];
    execute(world, Command::BuildBatch { paths: vec![path] })
        .into_iter()
        .find_map(|event| match event {
            Event::GroupBuilt { group, .. } => Some(group),
            _ => None,
        })
        .expect("group built")
}

fn scene(world: &World) -> Scene {
    Scene::from_views(
        &query::piece_view(world),
        &query::connectors(world),
        &query::walker_view(world),
        &query::groups(world),
    )
}

#[test]
fn dry_pieces_render_white_in_draw_order() {
    let mut world = World::new();
    let _ = build_corner(&mut world);

    let scene = scene(&world);
    assert_eq!(scene.pieces.len(), 3);
    assert_eq!(scene.wet_pieces(), 0);
    assert!(scene
        .pieces
        .iter()
        .all(|piece| piece.fill_color() == Color::WHITE));

    let tiers: Vec<DrawTier> = scene.pieces.iter().map(|piece| piece.tier).collect();
    assert_eq!(tiers, vec![DrawTier::Back, DrawTier::Back, DrawTier::Front]);

    let corner = scene
        .pieces
        .iter()
        .find(|piece| piece.archetype == Archetype::Corner)
        .expect("corner piece");
    assert!((corner.rotation_radians - std::f32::consts::PI).abs() < 1e-5);
    assert_eq!(corner.layer, "Default");
    assert_eq!(corner.visual, "corner");
}

#[test]
fn wet_pieces_take_the_group_tint() {
    let mut world = World::new();
    let group = build_corner(&mut world);
    let events = execute(
        &mut world,
        Command::AttachConnector {
            anchor: Point::new(0.5, 0.0),
            points: vec![Point::new(0.5, 0.0)],
        },
    );
    let source = match events.as_slice() {
        [Event::ConnectorAttached { node }] => *node,
        other => panic!("unexpected events {other:?}"),
    };
    let _ = execute(&mut world, Command::ToggleSource { node: source });
    let _ = execute(
        &mut world,
        Command::Tick {
            dt: Duration::from_secs(1),
        },
    );

    let wet = scene(&world);
    assert_eq!(wet.wet_pieces(), 3);
    assert!(wet
        .pieces
        .iter()
        .all(|piece| piece.fill_color() == tint_color(WaterTint::Clean)));
    assert!(wet
        .connectors
        .iter()
        .any(|node| node.is_source && node.has_water));

    let _ = execute(&mut world, Command::CycleWaterTint { group });
    let tinted = scene(&world);
    assert!(tinted
        .pieces
        .iter()
        .all(|piece| piece.water == Some(tint_color(WaterTint::Dirty))));
}

#[test]
fn walkers_carry_position_and_heading() {
    let mut world = World::new();
    let group = build_corner(&mut world);
    let _ = execute(
        &mut world,
        Command::SpawnFlow {
            group,
            path: 0,
            start: None,
        },
    );

    let scene = scene(&world);
    assert_eq!(scene.walkers.len(), 1);
    let walker = scene.walkers[0];
    assert_eq!(walker.position, Point::new(0.0, 0.0));
    assert!(walker.heading_radians.abs() < 1e-6);
    assert_eq!(walker.color, tint_color(WaterTint::Clean));
}
