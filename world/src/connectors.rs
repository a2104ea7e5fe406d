//! Connector graph used by water propagation.
//!
//! Every node carries a handful of connection points. Two nodes are
//! neighbours when any point of one lies within the configured tolerance of
//! any point of the other. Points are bucketed into a uniform hash whose cell
//! size equals the tolerance, so a lookup only inspects the 3x3 block of
//! buckets around each query point.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use pipeflow_core::{ConnectorSnapshot, NodeId, PieceId, Point};

/// Connector node stored inside the world.
#[derive(Clone, Debug)]
pub(crate) struct ConnectorNode {
    pub(crate) id: NodeId,
    pub(crate) anchor: Point,
    pub(crate) points: Vec<Point>,
    /// Owning piece, `None` for external connectors.
    pub(crate) piece: Option<PieceId>,
    pub(crate) is_source: bool,
    /// Doubles as the visited marker of a propagation pass.
    pub(crate) has_water: bool,
}

impl ConnectorNode {
    pub(crate) fn snapshot(&self) -> ConnectorSnapshot {
        ConnectorSnapshot {
            id: self.id,
            anchor: self.anchor,
            piece: self.piece,
            is_source: self.is_source,
            has_water: self.has_water,
        }
    }
}

type Bucket = (i64, i64);

#[derive(Debug)]
struct ProximityIndex {
    cell_size: f32,
    buckets: HashMap<Bucket, Vec<(NodeId, Point)>>,
}

impl ProximityIndex {
    fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            buckets: HashMap::new(),
        }
    }

    fn bucket_of(&self, point: Point) -> Bucket {
        (
            (point.x / self.cell_size).floor() as i64,
            (point.y / self.cell_size).floor() as i64,
        )
    }

    fn insert(&mut self, node: NodeId, point: Point) {
        let bucket = self.bucket_of(point);
        self.buckets.entry(bucket).or_default().push((node, point));
    }

    fn remove(&mut self, node: NodeId, point: Point) {
        let bucket = self.bucket_of(point);
        let emptied = match self.buckets.get_mut(&bucket) {
            Some(entries) => {
                entries.retain(|(candidate, _)| *candidate != node);
                entries.is_empty()
            }
            None => false,
        };
        if emptied {
            let _ = self.buckets.remove(&bucket);
        }
    }

    fn touching(&self, point: Point, radius: f32, found: &mut BTreeSet<NodeId>) {
        let (bx, by) = self.bucket_of(point);
        for dx in -1..=1 {
            for dy in -1..=1 {
                let Some(entries) = self.buckets.get(&(bx + dx, by + dy)) else {
                    continue;
                };
                for (node, candidate) in entries {
                    if candidate.distance(point) <= radius {
                        let _ = found.insert(*node);
                    }
                }
            }
        }
    }
}

/// Nodes keyed by identifier together with their proximity index.
#[derive(Debug)]
pub(crate) struct ConnectorGraph {
    tolerance: f32,
    nodes: BTreeMap<NodeId, ConnectorNode>,
    index: ProximityIndex,
    next_node_id: NodeId,
}

impl ConnectorGraph {
    pub(crate) fn new(tolerance: f32) -> Self {
        Self {
            tolerance,
            nodes: BTreeMap::new(),
            index: ProximityIndex::new(tolerance),
            next_node_id: NodeId::new(0),
        }
    }

    /// Adds a node and returns its identifier.
    pub(crate) fn attach(
        &mut self,
        anchor: Point,
        points: Vec<Point>,
        piece: Option<PieceId>,
    ) -> NodeId {
        let id = self.next_node_id;
        self.next_node_id = id.next();
        for point in &points {
            self.index.insert(id, *point);
        }
        let _ = self.nodes.insert(
            id,
            ConnectorNode {
                id,
                anchor,
                points,
                piece,
                is_source: false,
                has_water: false,
            },
        );
        id
    }

    /// Removes a node; unknown identifiers yield `None`.
    pub(crate) fn detach(&mut self, id: NodeId) -> Option<ConnectorNode> {
        let node = self.nodes.remove(&id)?;
        for point in &node.points {
            self.index.remove(id, *point);
        }
        Some(node)
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<&ConnectorNode> {
        self.nodes.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut ConnectorNode> {
        self.nodes.get_mut(&id)
    }

    /// Iterates nodes in identifier order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &ConnectorNode> {
        self.nodes.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut ConnectorNode> {
        self.nodes.values_mut()
    }

    /// Nodes touching the given node, sorted by identifier and excluding itself.
    pub(crate) fn neighbors(&self, id: NodeId) -> Vec<NodeId> {
        let Some(node) = self.nodes.get(&id) else {
            return Vec::new();
        };
        let mut found = BTreeSet::new();
        for point in &node.points {
            self.index.touching(*point, self.tolerance, &mut found);
        }
        let _ = found.remove(&id);
        found.into_iter().collect()
    }

    /// Removes every node owned by a piece, returning their identifiers.
    pub(crate) fn detach_piece_nodes(&mut self) -> Vec<NodeId> {
        let owned: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|node| node.piece.is_some())
            .map(|node| node.id)
            .collect();
        for id in &owned {
            let _ = self.detach(*id);
        }
        owned
    }
}
