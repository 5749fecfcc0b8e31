mod bucket;
mod builder;
mod tree;

pub use bucket::Bucket;
pub use builder::{BuildError, BuildParams, BuiltOctree, OctreeBuilder};
pub use tree::{
    NodeIndex, NodeRecord, Octree, OctreeError, OctreeNode, OctreeVisitor, VisitStatus,
};
