use crate::SmallKeyHashMap;

use starfield_core::{glam::DVec3, octant_id_at_level, OctantBox, OctantId, MAX_OCTANT_LEVEL};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Index of a node in the `Octree` arena. Nodes are never removed, so indices are stable for the lifetime of the tree.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct NodeIndex(pub u32);

impl NodeIndex {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum OctreeError {
    #[error("octant {0:?} already exists")]
    DuplicateOctantId(OctantId),
    #[error("parent of octant {0:?} does not exist")]
    OrphanOctant(OctantId),
    #[error("octant {0:?} is deeper than the maximum level")]
    TooDeep(OctantId),
    #[error("stored bounds of octant {0:?} disagree with its path")]
    BoundsMismatch(OctantId),
}

/// One octant of the topology. Children are sparse: absent children are `None`, never zero-sized.
#[derive(Clone, Debug, PartialEq)]
pub struct OctreeNode {
    id: OctantId,
    bounds: OctantBox,
    parent: Option<NodeIndex>,
    children: [Option<NodeIndex>; 8],
    own_points: usize,
    num_points: usize,
    num_octants: usize,
    max_depth: u8,
}

impl OctreeNode {
    fn new(id: OctantId, bounds: OctantBox, parent: Option<NodeIndex>) -> Self {
        Self {
            id,
            bounds,
            parent,
            children: [None; 8],
            own_points: 0,
            num_points: 0,
            num_octants: 0,
            max_depth: 0,
        }
    }

    #[inline]
    pub fn id(&self) -> OctantId {
        self.id
    }

    #[inline]
    pub fn level(&self) -> u8 {
        self.id.level()
    }

    #[inline]
    pub fn bounds(&self) -> &OctantBox {
        &self.bounds
    }

    #[inline]
    pub fn parent(&self) -> Option<NodeIndex> {
        self.parent
    }

    #[inline]
    pub fn child(&self, child_index: u8) -> Option<NodeIndex> {
        self.children[child_index as usize]
    }

    #[inline]
    pub fn children(&self) -> impl '_ + Iterator<Item = NodeIndex> {
        self.children.iter().filter_map(|c| *c)
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.iter().all(Option::is_none)
    }

    /// Number of points in the bucket owned directly by this octant.
    #[inline]
    pub fn own_points(&self) -> usize {
        self.own_points
    }

    /// Number of points in this subtree, including this octant's own bucket.
    #[inline]
    pub fn num_points(&self) -> usize {
        self.num_points
    }

    /// Number of strict descendant octants.
    #[inline]
    pub fn num_octants(&self) -> usize {
        self.num_octants
    }

    /// Height of this subtree. A leaf has max depth 0.
    #[inline]
    pub fn max_depth(&self) -> u8 {
        self.max_depth
    }
}

/// The persisted form of a node: enough to rebuild the topology, with aggregates recomputed on load.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct NodeRecord {
    pub id: OctantId,
    pub parent: Option<OctantId>,
    pub level: u8,
    pub bounds: OctantBox,
    pub own_points: usize,
}

/// The static spatial hierarchy: an arena of `OctreeNode`s plus a map from `OctantId` to arena slot.
///
/// Children are always allocated after their parents, so arena order is a valid topological order. This is what lets
/// `update_aggregates` run as a single reverse sweep.
#[derive(Clone, Debug)]
pub struct Octree {
    nodes: Vec<OctreeNode>,
    index: SmallKeyHashMap<OctantId, NodeIndex>,
}

impl Octree {
    pub const ROOT: NodeIndex = NodeIndex(0);

    /// A tree with only a root octant covering `root_box`.
    pub fn new(root_box: OctantBox) -> Self {
        let mut index = SmallKeyHashMap::default();
        index.insert(OctantId::ROOT, Self::ROOT);

        Self {
            nodes: vec![OctreeNode::new(OctantId::ROOT, root_box, None)],
            index,
        }
    }

    /// Rebuilds a tree from persisted records, in any order. Aggregates are recomputed.
    pub fn from_records(
        root_box: OctantBox,
        mut records: Vec<NodeRecord>,
    ) -> Result<Self, OctreeError> {
        records.sort_by_key(|r| (r.level, r.id));

        let mut tree = Self::new(root_box);
        let mut has_root_record = false;
        for record in records.into_iter() {
            if record.id == OctantId::ROOT {
                if has_root_record {
                    return Err(OctreeError::DuplicateOctantId(OctantId::ROOT));
                }
                has_root_record = true;
                tree.nodes[0].own_points = record.own_points;
                continue;
            }
            if record.parent != record.id.parent() || record.level != record.id.level() {
                return Err(OctreeError::OrphanOctant(record.id));
            }
            let parent_id = record.id.parent().ok_or(OctreeError::OrphanOctant(record.id))?;
            let parent = tree
                .index_of(parent_id)
                .ok_or(OctreeError::OrphanOctant(record.id))?;
            let child_index = record.id.child_index().unwrap_or(0);
            let node = tree.insert_child(parent, child_index)?;
            if tree.node(node).bounds != record.bounds {
                return Err(OctreeError::BoundsMismatch(record.id));
            }
            tree.set_own_points(node, record.own_points);
        }
        tree.update_aggregates();

        Ok(tree)
    }

    pub fn records(&self) -> impl '_ + Iterator<Item = NodeRecord> {
        self.nodes.iter().map(move |node| NodeRecord {
            id: node.id,
            parent: node.parent.map(|p| self.nodes[p.index()].id),
            level: node.level(),
            bounds: node.bounds,
            own_points: node.own_points,
        })
    }

    #[inline]
    pub fn root_box(&self) -> &OctantBox {
        &self.nodes[0].bounds
    }

    #[inline]
    pub fn root(&self) -> &OctreeNode {
        &self.nodes[0]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.root().num_points == 0
    }

    /// Height of the whole tree.
    #[inline]
    pub fn depth(&self) -> u8 {
        self.root().max_depth
    }

    #[inline]
    pub fn node(&self, index: NodeIndex) -> &OctreeNode {
        &self.nodes[index.index()]
    }

    #[inline]
    pub fn index_of(&self, id: OctantId) -> Option<NodeIndex> {
        self.index.get(&id).cloned()
    }

    #[inline]
    pub fn get(&self, id: OctantId) -> Option<&OctreeNode> {
        self.index_of(id).map(|i| self.node(i))
    }

    #[inline]
    pub fn nodes(&self) -> impl '_ + Iterator<Item = (NodeIndex, &OctreeNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (NodeIndex(i as u32), node))
    }

    /// Materializes the child of `parent` at `child_index` with a correctly halved box. Fails if the id is already taken.
    pub fn insert_child(
        &mut self,
        parent: NodeIndex,
        child_index: u8,
    ) -> Result<NodeIndex, OctreeError> {
        let parent_node = &self.nodes[parent.index()];
        if parent_node.level() >= MAX_OCTANT_LEVEL {
            return Err(OctreeError::TooDeep(parent_node.id));
        }
        let id = parent_node.id.child(child_index);
        if parent_node.children[child_index as usize].is_some() || self.index.contains_key(&id) {
            return Err(OctreeError::DuplicateOctantId(id));
        }
        let bounds = parent_node.bounds.child(child_index);

        let node = NodeIndex(self.nodes.len() as u32);
        self.nodes.push(OctreeNode::new(id, bounds, Some(parent)));
        self.nodes[parent.index()].children[child_index as usize] = Some(node);
        self.index.insert(id, node);

        Ok(node)
    }

    #[inline]
    pub fn set_own_points(&mut self, node: NodeIndex, own_points: usize) {
        self.nodes[node.index()].own_points = own_points;
    }

    /// Recomputes `num_points`, `num_octants` and `max_depth` for every node in one bottom-up sweep.
    pub fn update_aggregates(&mut self) {
        for node in self.nodes.iter_mut() {
            node.num_points = node.own_points;
            node.num_octants = 0;
            node.max_depth = 0;
        }
        for i in (1..self.nodes.len()).rev() {
            let (num_points, num_octants, max_depth) = {
                let n = &self.nodes[i];
                (n.num_points, n.num_octants, n.max_depth)
            };
            if let Some(parent) = self.nodes[i].parent {
                let p = &mut self.nodes[parent.index()];
                p.num_points += num_points;
                p.num_octants += 1 + num_octants;
                p.max_depth = p.max_depth.max(max_depth + 1);
            }
        }
    }

    /// Arena indices from the root down to `id`, inclusive. Empty if `id` is not in the tree.
    pub fn ancestry(&self, id: OctantId) -> Vec<NodeIndex> {
        let mut path = Vec::with_capacity(id.level() as usize + 1);
        let mut current = self.index_of(id);
        while let Some(node) = current {
            path.push(node);
            current = self.node(node).parent;
        }
        path.reverse();

        path
    }

    /// The existing octant at `level` that receives `p` under the shared boundary rule.
    pub fn locate(&self, p: DVec3, level: u8) -> Option<&OctreeNode> {
        self.get(octant_id_at_level(self.root_box(), p, level))
    }

    /// Visit every node reachable from the root. This is a pre-order, depth-first traversal.
    pub fn visit_preorder(&self, visitor: &mut impl OctreeVisitor) -> VisitStatus {
        self.visit_subtree_preorder(Self::ROOT, visitor)
    }

    /// Same as `visit_preorder`, but only for the subtree rooted at `node`.
    pub fn visit_subtree_preorder(
        &self,
        node: NodeIndex,
        visitor: &mut impl OctreeVisitor,
    ) -> VisitStatus {
        let octree_node = self.node(node);
        let status = visitor.visit_octant(node, octree_node);
        if status != VisitStatus::Continue {
            return status;
        }

        for child in octree_node.children() {
            if self.visit_subtree_preorder(child, visitor) == VisitStatus::ExitEarly {
                return VisitStatus::ExitEarly;
            }
        }

        VisitStatus::Continue
    }
}

pub trait OctreeVisitor {
    fn visit_octant(&mut self, index: NodeIndex, node: &OctreeNode) -> VisitStatus;
}

impl<F> OctreeVisitor for F
where
    F: FnMut(NodeIndex, &OctreeNode) -> VisitStatus,
{
    #[inline]
    fn visit_octant(&mut self, index: NodeIndex, node: &OctreeNode) -> VisitStatus {
        (self)(index, node)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VisitStatus {
    /// Continue traversing this branch.
    Continue,
    /// Stop traversing this branch.
    Stop,
    /// Stop traversing the entire tree. No further nodes will be visited.
    ExitEarly,
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod test {
    use super::*;

    use pretty_assertions::assert_eq;

    fn small_tree() -> Octree {
        let mut tree = Octree::new(OctantBox::new(DVec3::ZERO, 8.0));
        let a = tree.insert_child(Octree::ROOT, 0).unwrap();
        let b = tree.insert_child(Octree::ROOT, 7).unwrap();
        let c = tree.insert_child(a, 3).unwrap();
        tree.set_own_points(Octree::ROOT, 4);
        tree.set_own_points(a, 2);
        tree.set_own_points(b, 1);
        tree.set_own_points(c, 5);
        tree.update_aggregates();

        tree
    }

    #[test]
    fn aggregates_are_bottom_up_sums() {
        let tree = small_tree();
        let root = tree.root();

        assert_eq!(root.num_points(), 12);
        assert_eq!(root.num_octants(), 3);
        assert_eq!(root.max_depth(), 2);
        assert_eq!(tree.depth(), 2);

        let a = tree.get(OctantId::ROOT.child(0)).unwrap();
        assert_eq!(a.num_points(), 7);
        assert_eq!(a.num_octants(), 1);
        assert_eq!(a.max_depth(), 1);
    }

    #[test]
    fn duplicate_child_is_rejected() {
        let mut tree = small_tree();

        assert_eq!(
            tree.insert_child(Octree::ROOT, 7),
            Err(OctreeError::DuplicateOctantId(OctantId::ROOT.child(7)))
        );
    }

    #[test]
    fn children_are_strictly_inside_parents() {
        let tree = small_tree();
        tree.visit_preorder(&mut |_: NodeIndex, node: &OctreeNode| {
            for child in node.children() {
                let child = tree.node(child);
                assert!(node.bounds().contains_box(child.bounds()));
                assert!(child.bounds().half_size < node.bounds().half_size);
            }
            VisitStatus::Continue
        });
    }

    /// Everything about a node that does not depend on arena order.
    fn node_summary(
        tree: &Octree,
        node: &OctreeNode,
    ) -> (OctantId, OctantBox, usize, usize, usize, u8, Vec<OctantId>) {
        (
            node.id(),
            *node.bounds(),
            node.own_points(),
            node.num_points(),
            node.num_octants(),
            node.max_depth(),
            node.children().map(|c| tree.node(c).id()).collect(),
        )
    }

    fn assert_same_topology(expected: &Octree, actual: &Octree) {
        assert_eq!(actual.len(), expected.len());
        for (_, node) in expected.nodes() {
            let other = actual.get(node.id()).unwrap();
            assert_eq!(node_summary(actual, other), node_summary(expected, node));
            assert_eq!(
                other.parent().map(|p| actual.node(p).id()),
                node.parent().map(|p| expected.node(p).id())
            );
        }
    }

    #[test]
    fn records_round_trip_rebuilds_same_topology() {
        let tree = small_tree();
        let mut records: Vec<_> = tree.records().collect();
        records.reverse();

        let rebuilt = Octree::from_records(*tree.root_box(), records).unwrap();

        assert_same_topology(&tree, &rebuilt);
    }

    #[test]
    fn records_round_trip_does_not_depend_on_creation_order() {
        // Deeper and higher child indices first, so arena order differs from the sorted record order.
        let mut tree = Octree::new(OctantBox::new(DVec3::ZERO, 8.0));
        let b = tree.insert_child(Octree::ROOT, 7).unwrap();
        let d = tree.insert_child(b, 5).unwrap();
        let a = tree.insert_child(Octree::ROOT, 2).unwrap();
        let c = tree.insert_child(b, 1).unwrap();
        let e = tree.insert_child(Octree::ROOT, 0).unwrap();
        for (i, node) in [Octree::ROOT, a, b, c, d, e].iter().enumerate() {
            tree.set_own_points(*node, i + 1);
        }
        tree.update_aggregates();

        let rebuilt = Octree::from_records(*tree.root_box(), tree.records().collect()).unwrap();

        assert_ne!(
            rebuilt.index_of(OctantId::ROOT.child(0)),
            tree.index_of(OctantId::ROOT.child(0))
        );
        assert_same_topology(&tree, &rebuilt);
    }

    #[test]
    fn duplicate_root_record_is_rejected() {
        let tree = small_tree();
        let mut records: Vec<_> = tree.records().collect();
        records.push(records[0]);

        assert_eq!(
            Octree::from_records(*tree.root_box(), records).unwrap_err(),
            OctreeError::DuplicateOctantId(OctantId::ROOT)
        );
    }

    #[test]
    fn orphan_record_is_rejected() {
        let root_box = OctantBox::new(DVec3::ZERO, 8.0);
        let id = OctantId::ROOT.child(1).child(2);
        let orphan = NodeRecord {
            id,
            parent: id.parent(),
            level: 2,
            bounds: root_box.child(1).child(2),
            own_points: 1,
        };

        assert_eq!(
            Octree::from_records(root_box, vec![orphan]).unwrap_err(),
            OctreeError::OrphanOctant(id)
        );
    }

    #[test]
    fn ancestry_is_root_first() {
        let tree = small_tree();
        let id = OctantId::ROOT.child(0).child(3);
        let ids: Vec<_> = tree
            .ancestry(id)
            .into_iter()
            .map(|i| tree.node(i).id())
            .collect();

        assert_eq!(ids, vec![OctantId::ROOT, OctantId::ROOT.child(0), id]);
        assert!(tree.ancestry(OctantId::ROOT.child(5)).is_empty());
    }

    #[test]
    fn locate_follows_coordinates_to_existing_octants() {
        let tree = small_tree();
        let p = DVec3::new(-6.0, -2.0, -2.0);

        let leaf = tree.locate(p, 2).unwrap();
        assert_eq!(leaf.id(), OctantId::ROOT.child(0).child(3));
        assert!(leaf.is_leaf());
        assert_eq!(tree.locate(p, 1).unwrap().id(), OctantId::ROOT.child(0));
        assert!(!tree.locate(p, 1).unwrap().is_leaf());
        // Child 7 has no children.
        assert!(tree.locate(DVec3::splat(5.0), 2).is_none());
    }

    #[test]
    fn stop_prunes_subtree() {
        let tree = small_tree();
        let mut visited = Vec::new();
        tree.visit_preorder(&mut |_: NodeIndex, node: &OctreeNode| {
            visited.push(node.id());
            if node.id() == OctantId::ROOT.child(0) {
                VisitStatus::Stop
            } else {
                VisitStatus::Continue
            }
        });

        assert_eq!(
            visited,
            vec![
                OctantId::ROOT,
                OctantId::ROOT.child(0),
                OctantId::ROOT.child(7)
            ]
        );
    }
}
