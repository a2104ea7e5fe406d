use std::time::Duration;

use pipeflow_core::{Command, Event, GridPosition, GroupId, NetworkConfig, NodeId, Point};
use pipeflow_world::{self as world, query, World};

fn execute(world: &mut World, command: Command) -> Vec<Event> {
    let mut events = Vec::new();
    world::apply(world, command, &mut events);
    events
}

fn tick(world: &mut World, millis: u64) -> Vec<Event> {
    execute(
        world,
        Command::Tick {
            dt: Duration::from_millis(millis),
        },
    )
}

fn attach(world: &mut World, points: &[(f32, f32)]) -> NodeId {
    let points: Vec<Point> = points.iter().map(|(x, y)| Point::new(*x, *y)).collect();
    let events = execute(
        world,
        Command::AttachConnector {
            anchor: points[0],
            points,
        },
    );
    match events.as_slice() {
        [Event::ConnectorAttached { node }] => *node,
        other => panic!("unexpected events {other:?}"),
    }
}

fn build(world: &mut World, raw: &[(f32, f32)]) -> GroupId {
    let path: Vec<Point> = raw.iter().map(|(x, y)| Point::new(*x, *y)).collect();
    execute(world, Command::BuildBatch { paths: vec![path] })
        .into_iter()
        .find_map(|event| match event {
            Event::GroupBuilt { group, .. } => Some(group),
            _ => None,
        })
        .expect("group built")
}

fn node_at(world: &World, x: f32, y: f32) -> NodeId {
    query::node_at(world, GridPosition::from_point(Point::new(x, y))).expect("piece node")
}

fn wet(world: &World, node: NodeId) -> bool {
    query::connector(world, node)
        .map(|snapshot| snapshot.has_water)
        .unwrap_or(false)
}

fn toggle(world: &mut World, node: NodeId) -> Vec<Event> {
    execute(world, Command::ToggleSource { node })
}

#[test]
fn water_spreads_along_a_linear_chain_one_delay_at_a_time() {
    let mut world = World::new();
    let a = attach(&mut world, &[(0.0, 0.0)]);
    let b = attach(&mut world, &[(0.05, 0.0), (1.0, 0.0)]);
    let c = attach(&mut world, &[(1.05, 0.0)]);

    let events = toggle(&mut world, a);
    assert_eq!(
        events,
        vec![
            Event::SourceToggled {
                node: a,
                is_source: true
            },
            Event::WaterChanged {
                node: a,
                has_water: true
            },
        ]
    );
    assert!(!wet(&world, b));

    let _ = tick(&mut world, 200);
    assert!(wet(&world, b), "neighbour should be wet after one delay");
    assert!(!wet(&world, c), "second hop should still be pending");

    let _ = tick(&mut world, 200);
    assert!(wet(&world, c));

    let _ = tick(&mut world, 200);
    assert_eq!(query::pending_tasks(&world), 0);

    let _ = toggle(&mut world, a);
    assert!(!wet(&world, a) && !wet(&world, b) && !wet(&world, c));
    let _ = tick(&mut world, 1_000);
    assert!(!wet(&world, a) && !wet(&world, b) && !wet(&world, c));
}

#[test]
fn one_large_tick_drains_the_whole_chain() {
    let mut world = World::new();
    let a = attach(&mut world, &[(0.0, 0.0)]);
    let b = attach(&mut world, &[(0.05, 0.0), (1.0, 0.0)]);
    let c = attach(&mut world, &[(1.05, 0.0)]);

    let _ = toggle(&mut world, a);
    let events = tick(&mut world, 10_000);

    let reached: Vec<NodeId> = events
        .iter()
        .filter_map(|event| match event {
            Event::WaterChanged {
                node,
                has_water: true,
            } => Some(*node),
            _ => None,
        })
        .collect();
    assert_eq!(reached, vec![b, c]);
    assert_eq!(query::pending_tasks(&world), 0);
}

#[test]
fn built_pipes_conduct_through_their_openings() {
    let mut world = World::new();
    let _ = build(&mut world, &[(0.0, 0.0), (3.0, 0.0)]);
    let source = node_at(&world, 0.0, 0.0);

    let _ = toggle(&mut world, source);
    let _ = tick(&mut world, 1_000);

    for x in 0..4 {
        assert!(wet(&world, node_at(&world, x as f32, 0.0)), "cell {x} dry");
    }
}

#[test]
fn loops_terminate_with_every_node_wet() {
    let mut world = World::new();
    let _ = build(
        &mut world,
        &[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.0, 0.0)],
    );
    let source = node_at(&world, 0.0, 0.0);

    let _ = toggle(&mut world, source);
    let _ = tick(&mut world, 5_000);

    assert!(query::connectors(&world).iter().all(|node| node.has_water));
    assert_eq!(query::connectors(&world).len(), 4);
    assert_eq!(query::pending_tasks(&world), 0);
}

#[test]
fn sources_combine_and_withdraw_independently() {
    let mut world = World::new();
    let _ = build(&mut world, &[(0.0, 0.0), (1.0, 0.0)]);
    let _ = build(&mut world, &[(0.0, 5.0), (1.0, 5.0)]);
    let first = node_at(&world, 0.0, 0.0);
    let second = node_at(&world, 0.0, 5.0);

    let _ = toggle(&mut world, first);
    let _ = toggle(&mut world, second);
    let _ = tick(&mut world, 1_000);
    assert!(query::connectors(&world).iter().all(|node| node.has_water));

    let _ = toggle(&mut world, first);
    let _ = tick(&mut world, 1_000);

    assert!(!wet(&world, first));
    assert!(!wet(&world, node_at(&world, 1.0, 0.0)));
    assert!(wet(&world, second));
    assert!(wet(&world, node_at(&world, 1.0, 5.0)));
}

#[test]
fn refreshing_without_sources_dries_everything() {
    let mut world = World::new();
    let _ = build(&mut world, &[(0.0, 0.0), (2.0, 0.0)]);
    let source = node_at(&world, 0.0, 0.0);
    let _ = toggle(&mut world, source);
    let _ = tick(&mut world, 1_000);

    let _ = toggle(&mut world, source);
    let events = execute(&mut world, Command::RefreshWater);

    assert!(events.is_empty(), "nothing left to dry");
    assert!(query::connectors(&world).iter().all(|node| !node.has_water));
}

#[test]
fn removing_a_wet_group_cancels_pending_spreads() {
    let mut world = World::new();
    let group = build(&mut world, &[(0.0, 0.0), (3.0, 0.0)]);
    let source = node_at(&world, 0.0, 0.0);
    let _ = toggle(&mut world, source);
    assert_eq!(query::pending_tasks(&world), 1);

    let _ = execute(&mut world, Command::RemoveGroup { group });

    assert_eq!(query::pending_tasks(&world), 0);
    assert!(query::connectors(&world).is_empty());
    let events = tick(&mut world, 1_000);
    assert_eq!(
        events,
        vec![Event::TimeAdvanced {
            dt: Duration::from_millis(1_000)
        }]
    );
}

#[test]
fn piece_connectors_cannot_be_detached_directly() {
    let mut world = World::new();
    let _ = build(&mut world, &[(0.0, 0.0), (1.0, 0.0)]);
    let node = node_at(&world, 0.0, 0.0);

    assert!(execute(&mut world, Command::DetachConnector { node }).is_empty());

    let external = attach(&mut world, &[(5.0, 5.0)]);
    assert_eq!(
        execute(&mut world, Command::DetachConnector { node: external }),
        vec![Event::ConnectorDetached { node: external }]
    );
}

#[test]
fn parallel_pipes_on_a_fine_grid_stay_separate() {
    let mut world = World::new();
    let events = execute(
        &mut world,
        Command::Configure {
            config: NetworkConfig {
                grid_size: 0.2,
                ..NetworkConfig::default()
            },
        },
    );
    assert_eq!(events, vec![Event::ConfigApplied]);

    let _ = build(&mut world, &[(0.0, 0.0), (0.6, 0.0)]);
    let _ = build(&mut world, &[(0.0, 0.2), (0.6, 0.2)]);
    let source = attach(&mut world, &[(0.1, 0.0)]);
    let _ = toggle(&mut world, source);
    let _ = tick(&mut world, 10_000);

    for x in [0.0, 0.2, 0.4, 0.6] {
        assert!(wet(&world, node_at(&world, x, 0.0)), "lower pipe at {x}");
        assert!(!wet(&world, node_at(&world, x, 0.2)), "upper pipe at {x}");
    }
}

#[test]
fn configurations_that_would_bridge_cells_are_rejected() {
    let mut world = World::new();
    let events = execute(
        &mut world,
        Command::Configure {
            config: NetworkConfig {
                grid_size: 0.1,
                ..NetworkConfig::default()
            },
        },
    );
    assert!(events.is_empty());
    assert_eq!(query::config(&world).grid_size, 1.0);
}
