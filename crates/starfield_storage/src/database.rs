mod octree_db;

pub use octree_db::*;

pub use sled;
