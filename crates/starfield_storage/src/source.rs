use crate::{Bucket, BuiltOctree, Octree, SmallKeyHashMap, StorageError};

use starfield_core::{CatalogPoint, OctantId, PointId};

/// Where a runtime index gets its data. The topology is read once, buckets are read lazily, one octant at a time.
///
/// Reads may be issued from loader threads, so implementations must be shareable.
pub trait OctreeSource<P>: Send + Sync {
    fn read_topology(&self) -> Result<Octree, StorageError>;

    /// Returns `None` if `octant` owns no points.
    fn read_bucket(&self, octant: OctantId) -> Result<Option<Bucket<P>>, StorageError>;

    /// The octant whose bucket holds point `id`, if any.
    fn locate_point(&self, id: PointId) -> Result<Option<OctantId>, StorageError>;
}

/// An `OctreeSource` that keeps every bucket in memory. Useful for catalogs that were just built, and for tests.
#[derive(Clone, Debug)]
pub struct MemorySource<P> {
    octree: Octree,
    buckets: SmallKeyHashMap<OctantId, Bucket<P>>,
    points: SmallKeyHashMap<PointId, OctantId>,
}

impl<P> MemorySource<P>
where
    P: CatalogPoint,
{
    pub fn new(built: BuiltOctree<P>) -> Self {
        let BuiltOctree {
            octree, buckets, ..
        } = built;

        let mut points = SmallKeyHashMap::default();
        for bucket in buckets.iter() {
            for p in bucket.points.iter() {
                points.insert(p.id(), bucket.octant);
            }
        }
        let buckets = buckets.into_iter().map(|b| (b.octant, b)).collect();

        Self {
            octree,
            buckets,
            points,
        }
    }

    pub fn octree(&self) -> &Octree {
        &self.octree
    }
}

impl<P> From<BuiltOctree<P>> for MemorySource<P>
where
    P: CatalogPoint,
{
    fn from(built: BuiltOctree<P>) -> Self {
        Self::new(built)
    }
}

impl<P> OctreeSource<P> for MemorySource<P>
where
    P: Clone + Send + Sync,
{
    fn read_topology(&self) -> Result<Octree, StorageError> {
        Ok(self.octree.clone())
    }

    fn read_bucket(&self, octant: OctantId) -> Result<Option<Bucket<P>>, StorageError> {
        Ok(self.buckets.get(&octant).cloned())
    }

    fn locate_point(&self, id: PointId) -> Result<Option<OctantId>, StorageError> {
        Ok(self.points.get(&id).cloned())
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
