use crate::{
    Bucket, BuiltOctree, Compression, NodeRecord, Octree, OctreeSource, StorageError,
};

use starfield_core::{CatalogPoint, OctantBox, OctantId, PointId};

use serde::{Deserialize, Serialize};
use sled::{Batch, Db, Tree};
use tracing::info;

const META_KEY: &[u8] = b"octree";

/// Summary of the persisted octree, stored once per database.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct OctreeMeta {
    pub root_box: OctantBox,
    pub num_octants: usize,
    pub num_points: usize,
    pub depth: u8,
}

/// A persistent octree of compressed point buckets, backed by the `sled` crate.
///
/// The data lives in four trees:
///   - `octree_meta`: one `OctreeMeta` record
///   - `octree_nodes`: `NodeRecord`s keyed by big-endian `OctantId`, so a parent always sorts before its children on the same
///     level
///   - `octree_buckets`: compressed `Bucket`s keyed by big-endian `OctantId`
///   - `octree_points`: the owning `OctantId` of every point, keyed by big-endian `PointId`
///
/// The DB values are only portable if the `compression` used respects endianness of the current machine. Use
/// `BincodeCompression` if you absolutely need portability across machines with different endianness.
pub struct OctreeDb<P, Compr> {
    meta: Tree,
    nodes: Tree,
    buckets: Tree,
    points: Tree,
    compression: Compr,
    marker: std::marker::PhantomData<P>,
}

impl<P, Compr> OctreeDb<P, Compr> {
    pub fn open(db: &Db, compression: Compr) -> Result<Self, StorageError> {
        Ok(Self {
            meta: db.open_tree("octree_meta")?,
            nodes: db.open_tree("octree_nodes")?,
            buckets: db.open_tree("octree_buckets")?,
            points: db.open_tree("octree_points")?,
            compression,
            marker: Default::default(),
        })
    }

    pub fn read_meta(&self) -> Result<Option<OctreeMeta>, StorageError> {
        self.meta
            .get(META_KEY)?
            .map(|bytes| bincode::deserialize(&bytes).map_err(StorageError::from))
            .transpose()
    }

    pub async fn flush(&self) -> Result<usize, StorageError> {
        let mut flushed = 0;
        for tree in [&self.meta, &self.nodes, &self.buckets, &self.points] {
            flushed += tree.flush_async().await?;
        }

        Ok(flushed)
    }
}

impl<P, Compr> OctreeDb<P, Compr>
where
    P: CatalogPoint,
    Compr: Compression<Data = Bucket<P>, CompressedData = Vec<u8>>,
{
    /// Replaces whatever was stored with `built`. Each tree is written with a single atomic batch, and the metadata goes last,
    /// so a reader never sees metadata for a partially written octree.
    pub fn write(&self, built: &BuiltOctree<P>) -> Result<(), StorageError> {
        self.meta.remove(META_KEY)?;
        for tree in [&self.nodes, &self.buckets, &self.points] {
            tree.clear()?;
        }

        let mut nodes = Batch::default();
        for record in built.octree.records() {
            nodes.insert(&record.id.to_be_bytes()[..], bincode::serialize(&record)?);
        }

        let mut buckets = Batch::default();
        let mut points = Batch::default();
        for bucket in built.buckets.iter() {
            let octant_bytes = bucket.octant.to_be_bytes();
            for p in bucket.points.iter() {
                points.insert(&p.id().to_be_bytes()[..], &octant_bytes[..]);
            }
            // PERF: IVec will copy the bytes instead of moving, because it needs to also allocate room for an internal header
            buckets.insert(&octant_bytes[..], self.compression.compress(bucket)?.take());
        }

        self.nodes.apply_batch(nodes)?;
        self.buckets.apply_batch(buckets)?;
        self.points.apply_batch(points)?;

        let root = built.octree.root();
        let meta = OctreeMeta {
            root_box: *root.bounds(),
            num_octants: built.octree.len(),
            num_points: root.num_points(),
            depth: built.octree.depth(),
        };
        self.meta.insert(META_KEY, bincode::serialize(&meta)?)?;

        info!(
            "Wrote octree with {} octants and {} points",
            meta.num_octants, meta.num_points
        );

        Ok(())
    }
}

impl<P, Compr> OctreeSource<P> for OctreeDb<P, Compr>
where
    P: CatalogPoint + Send + Sync,
    Compr: Compression<Data = Bucket<P>, CompressedData = Vec<u8>> + Send + Sync,
{
    fn read_topology(&self) -> Result<Octree, StorageError> {
        let meta = self.read_meta()?.ok_or(StorageError::MissingRoot)?;

        let records = self
            .nodes
            .iter()
            .map(|kv| -> Result<NodeRecord, StorageError> {
                let (_, bytes) = kv?;

                Ok(bincode::deserialize(&bytes)?)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let octree = Octree::from_records(meta.root_box, records)?;

        if octree.len() != meta.num_octants || octree.root().num_points() != meta.num_points {
            return Err(StorageError::Corrupt(format!(
                "expected {} octants and {} points, found {} and {}",
                meta.num_octants,
                meta.num_points,
                octree.len(),
                octree.root().num_points()
            )));
        }

        Ok(octree)
    }

    fn read_bucket(&self, octant: OctantId) -> Result<Option<Bucket<P>>, StorageError> {
        self.buckets
            .get(octant.to_be_bytes())?
            .map(|compressed| Compr::decompress(&compressed.to_vec()))
            .transpose()
    }

    fn locate_point(&self, id: PointId) -> Result<Option<OctantId>, StorageError> {
        self.points
            .get(id.to_be_bytes())?
            .map(|bytes| {
                let mut code = [0; 16];
                if bytes.len() != code.len() {
                    return Err(StorageError::Corrupt(format!(
                        "bad octant id for point {}",
                        id
                    )));
                }
                code.copy_from_slice(&bytes);

                OctantId::from_be_bytes(code)
                    .ok_or_else(|| StorageError::Corrupt(format!("null octant id for point {}", id)))
            })
            .transpose()
    }
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
    use crate::{BincodeCompression, BuildParams, NoCompression, OctreeBuilder};

    use starfield_core::{BrightnessOrder, StarPoint};
    use utilities::data_sets::{nine_star_fixture, random_star_catalog};

    use pretty_assertions::assert_eq;

    fn temporary_db() -> sled::Result<Db> {
        sled::Config::default()
            .temporary(true)
            .use_compression(false)
            .mode(sled::Mode::LowSpace)
            .open()
    }

    #[test]
    fn db_round_trip() -> Result<(), StorageError> {
        let built = OctreeBuilder::new(BuildParams {
            max_points_per_node: 32,
            ..Default::default()
        })
        .build(random_star_catalog(1000, 100.0), &BrightnessOrder)
        .unwrap();

        let db = temporary_db()?;
        let octree_db = OctreeDb::open(&db, BincodeCompression::new(NoCompression))?;
        octree_db.write(&built)?;

        let octree = octree_db.read_topology()?;
        assert_eq!(octree.len(), built.octree.len());
        assert_eq!(octree.root().num_points(), 1000 - built.num_discarded);
        for (_, node) in built.octree.nodes() {
            // Arena slots differ after a reload, so compare by id.
            let loaded = octree.get(node.id()).unwrap();
            assert_eq!(loaded.bounds(), node.bounds());
            assert_eq!(loaded.own_points(), node.own_points());
            assert_eq!(loaded.num_points(), node.num_points());
            assert_eq!(loaded.num_octants(), node.num_octants());
            assert_eq!(loaded.max_depth(), node.max_depth());
            let loaded_children: Vec<_> = loaded.children().map(|c| octree.node(c).id()).collect();
            let built_children: Vec<_> = node
                .children()
                .map(|c| built.octree.node(c).id())
                .collect();
            assert_eq!(loaded_children, built_children);
        }

        for bucket in built.buckets.iter() {
            assert_eq!(octree_db.read_bucket(bucket.octant)?.as_ref(), Some(bucket));
            for p in bucket.points.iter() {
                assert_eq!(octree_db.locate_point(p.id)?, Some(bucket.octant));
            }
        }

        Ok(())
    }

    #[cfg(feature = "lz4")]
    #[test]
    fn lz4_buckets_round_trip() -> Result<(), StorageError> {
        let built = OctreeBuilder::new(BuildParams {
            max_points_per_node: 4,
            ..Default::default()
        })
        .build(nine_star_fixture(), &BrightnessOrder)
        .unwrap();

        let db = temporary_db()?;
        let octree_db = OctreeDb::open(&db, BincodeCompression::new(crate::Lz4 { level: 10 }))?;
        octree_db.write(&built)?;

        let root = octree_db.read_bucket(OctantId::ROOT)?.unwrap();
        assert_eq!(Some(&root), built.bucket(OctantId::ROOT));

        Ok(())
    }

    #[test]
    fn empty_db_has_no_root() -> Result<(), StorageError> {
        let db = temporary_db()?;
        let octree_db: OctreeDb<StarPoint, BincodeCompression<Bucket<StarPoint>, NoCompression>> =
            OctreeDb::open(&db, BincodeCompression::new(NoCompression))?;

        assert!(matches!(
            octree_db.read_topology(),
            Err(StorageError::MissingRoot)
        ));
        assert_eq!(octree_db.read_bucket(OctantId::ROOT)?, None);
        assert_eq!(octree_db.locate_point(0)?, None);

        Ok(())
    }

    #[test]
    fn rewrite_replaces_previous_octree() -> Result<(), StorageError> {
        let db = temporary_db()?;
        let octree_db = OctreeDb::open(&db, BincodeCompression::new(NoCompression))?;

        let big = OctreeBuilder::new(BuildParams {
            max_points_per_node: 8,
            ..Default::default()
        })
        .build(random_star_catalog(500, 10.0), &BrightnessOrder)
        .unwrap();
        octree_db.write(&big)?;

        let small = OctreeBuilder::new(BuildParams {
            max_points_per_node: 4,
            ..Default::default()
        })
        .build(nine_star_fixture(), &BrightnessOrder)
        .unwrap();
        octree_db.write(&small)?;

        let octree = octree_db.read_topology()?;
        assert_eq!(octree.len(), small.octree.len());
        assert_eq!(octree_db.read_meta()?.map(|m| m.num_points), Some(9));

        Ok(())
    }
}
