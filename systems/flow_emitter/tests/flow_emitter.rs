use std::time::Duration;

use pipeflow_core::{Command, Event, GroupId, Point};
use pipeflow_system_flow_emitter::{Config, FlowEmitter};
use pipeflow_world::{self as world, query, World};

fn built_world() -> (World, GroupId) {
    let mut world = World::new();
    let mut events = Vec::new();
    world::apply(
        &mut world,
        Command::BuildBatch {
            paths: vec![vec![Point::new(0.0, 0.0), Point::new(4.0, 0.0)]],
        },
        &mut events,
    );
    let group = events
        .iter()
        .find_map(|event| match event {
            Event::GroupBuilt { group, .. } => Some(*group),
            _ => None,
        })
        .expect("group built");
    (world, group)
}

fn elapsed(millis: u64) -> Event {
    Event::TimeAdvanced {
        dt: Duration::from_millis(millis),
    }
}

#[test]
fn toggled_group_spawns_immediately_then_once_per_interval() {
    let (world, group) = built_world();
    let groups = query::groups(&world);
    let mut emitter = FlowEmitter::new(Config::new(Duration::from_millis(500)));
    let mut commands = Vec::new();

    assert!(emitter.toggle(group));
    emitter.handle(&[], &groups, &mut commands);
    assert_eq!(
        commands,
        vec![Command::SpawnFlow {
            group,
            path: 0,
            start: None
        }],
        "starting a flow should spawn right away",
    );

    commands.clear();
    emitter.handle(&[elapsed(400)], &groups, &mut commands);
    assert!(commands.is_empty(), "no spawn before a full interval");

    emitter.handle(&[elapsed(1_100)], &groups, &mut commands);
    assert_eq!(commands.len(), 3, "expected one spawn per elapsed interval");
}

#[test]
fn untoggled_groups_stay_dry() {
    let (world, _) = built_world();
    let mut emitter = FlowEmitter::new(Config::default());
    let mut commands = Vec::new();

    emitter.handle(&[elapsed(5_000)], &query::groups(&world), &mut commands);

    assert!(commands.is_empty());
}

#[test]
fn removed_groups_stop_emitting() {
    let (mut world, group) = built_world();
    let mut emitter = FlowEmitter::new(Config::default());
    let _ = emitter.toggle(group);

    let mut events = Vec::new();
    world::apply(&mut world, Command::RemoveGroup { group }, &mut events);
    let mut commands = Vec::new();
    emitter.handle(&events, &query::groups(&world), &mut commands);

    assert!(commands.is_empty());
    assert!(!emitter.is_flowing(group));
}

#[test]
fn emitted_commands_drive_walkers_in_the_world() {
    let (mut world, group) = built_world();
    let mut emitter = FlowEmitter::new(Config::default());
    let _ = emitter.toggle(group);

    let mut spawned = 0;
    let mut pending = Vec::new();
    for _ in 0..10 {
        let mut commands = Vec::new();
        emitter.handle(&pending, &query::groups(&world), &mut commands);
        pending.clear();
        for command in commands {
            world::apply(&mut world, command, &mut pending);
        }
        spawned += pending
            .iter()
            .filter(|event| matches!(event, Event::WalkerSpawned { .. }))
            .count();
        world::apply(
            &mut world,
            Command::Tick {
                dt: Duration::from_millis(250),
            },
            &mut pending,
        );
    }

    assert_eq!(spawned, 5, "one walker per half second plus the initial one");
    assert!(!query::walker_view(&world).is_empty());
}
