//! Builds a star catalog octree and persists it to a sled database.
//!
//! Every non-empty line of the catalog that does not start with `#` holds `id x y z magnitude`, separated by whitespace.

use starfield::prelude::*;
use starfield::storage::sled;

use anyhow::{anyhow, Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Instant;
use structopt::StructOpt;

/// Sorts a star catalog by brightness and distributes it into an octree of compressed point buckets.
#[derive(Debug, StructOpt)]
#[structopt(name = "build_octree")]
struct Options {
    /// Text catalog with one `id x y z magnitude` star per line.
    #[structopt(parse(from_os_str))]
    catalog: PathBuf,

    /// Directory of the sled database to (re)write.
    #[structopt(parse(from_os_str))]
    db_dir: PathBuf,

    /// Capacity of each octant's bucket.
    #[structopt(long, default_value = "100000")]
    max_points_per_node: usize,

    /// Deepest level the builder may create before giving up.
    #[structopt(long, default_value = "25")]
    max_levels: u8,
}

fn main() -> Result<()> {
    let options = Options::from_args();

    println!("Loading {}", options.catalog.display());
    let catalog = load_catalog(&options.catalog)?;
    println!("Loaded {} stars", catalog.len());

    let params = BuildParams {
        max_points_per_node: options.max_points_per_node,
        max_levels: options.max_levels,
        ..Default::default()
    };
    let start = Instant::now();
    let built = OctreeBuilder::new(params)
        .build(catalog, &BrightnessOrder)
        .context("Failed to build octree")?;
    println!(
        "Built {} octants of depth {} in {:.2?}; discarded {} stars",
        built.octree.len(),
        built.octree.depth(),
        start.elapsed(),
        built.num_discarded
    );

    let start = Instant::now();
    write_db(&options.db_dir, &built)
        .with_context(|| format!("Failed to write {}", options.db_dir.display()))?;
    println!("Wrote {} in {:.2?}", options.db_dir.display(), start.elapsed());

    Ok(())
}

fn load_catalog(path: &Path) -> Result<Vec<StarPoint>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut catalog = Vec::new();
    for (line_number, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let star = parse_star(line)
            .ok_or_else(|| anyhow!("{}:{}: bad star {:?}", path.display(), line_number + 1, line))?;
        catalog.push(star);
    }

    Ok(catalog)
}

fn parse_star(line: &str) -> Option<StarPoint> {
    let mut fields = line.split_whitespace();
    let id = fields.next()?.parse().ok()?;
    let x = fields.next()?.parse().ok()?;
    let y = fields.next()?.parse().ok()?;
    let z = fields.next()?.parse().ok()?;
    let magnitude = fields.next()?.parse().ok()?;
    if fields.next().is_some() {
        return None;
    }

    Some(StarPoint::new(id, DVec3::new(x, y, z), magnitude))
}

fn write_db(path: &Path, built: &BuiltOctree<StarPoint>) -> Result<()> {
    let db = sled::open(path)?;
    let compression = BincodeCompression::<Bucket<StarPoint>, _>::new(Lz4::default());
    let octree_db = OctreeDb::open(&db, compression)?;
    octree_db.write(built)?;
    futures::executor::block_on(octree_db.flush())?;

    Ok(())
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

    #[test]
    fn star_lines_parse() {
        let star = parse_star("42  1.5 -2 3e2\t6.25").unwrap();

        assert_eq!(star.id, 42);
        assert_eq!(star.position, DVec3::new(1.5, -2.0, 300.0));
        assert_eq!(star.magnitude, 6.25);

        assert!(parse_star("42 1.5 -2 3e2").is_none());
        assert!(parse_star("42 1.5 -2 3e2 6.25 extra").is_none());
        assert!(parse_star("x 1 2 3 4").is_none());
    }

    #[test]
    fn options_take_positional_paths_and_capacity_flag() {
        let options = Options::from_iter_safe(&[
            "build_octree",
            "stars.txt",
            "stars.db",
            "--max-points-per-node",
            "64",
        ])
        .unwrap();

        assert_eq!(options.catalog, PathBuf::from("stars.txt"));
        assert_eq!(options.db_dir, PathBuf::from("stars.db"));
        assert_eq!(options.max_points_per_node, 64);
        assert_eq!(options.max_levels, 25);

        assert!(Options::from_iter_safe(&["build_octree", "stars.txt"]).is_err());
    }

    #[test]
    fn catalog_and_db_round_trip() -> Result<()> {
        let dir = std::env::temp_dir().join(format!("build_octree_test_{}", std::process::id()));
        std::fs::create_dir_all(&dir)?;
        let catalog_path = dir.join("stars.txt");
        std::fs::write(
            &catalog_path,
            "# id x y z magnitude\n1 0 0 0 1.0\n\n2 1 1 1 2.0\n3 -1 -1 -1 3.0\n",
        )?;

        let catalog = load_catalog(&catalog_path)?;
        assert_eq!(catalog.len(), 3);
        let built = OctreeBuilder::new(BuildParams::default()).build(catalog, &BrightnessOrder)?;

        let db_path = dir.join("stars.db");
        write_db(&db_path, &built)?;
        {
            let db = sled::open(&db_path)?;
            let octree_db: OctreeDb<StarPoint, _> = OctreeDb::open(
                &db,
                BincodeCompression::<Bucket<StarPoint>, _>::new(Lz4::default()),
            )?;
            assert_eq!(octree_db.read_topology()?.root().num_points(), 3);
            assert_eq!(octree_db.locate_point(2)?, Some(OctantId::ROOT));
        }
        std::fs::remove_dir_all(&dir)?;

        Ok(())
    }
}
