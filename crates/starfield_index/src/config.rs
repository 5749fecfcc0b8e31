use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use thiserror::Error;

/// Tuning for an `OctreeIndex`. Angles are in the units of `ViewState::view_angle`.
///
/// Deserialized configs go through the same checks as `IndexConfig::new`, but fail with an `InvalidIndexConfig` error
/// instead of panicking.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(try_from = "UncheckedIndexConfig")]
pub struct IndexConfig {
    /// An octant must look at least this big before its children are considered at all.
    pub descend_threshold: f64,
    /// Children are fully opaque once their parent looks at least this big. Between `descend_threshold` and this, they fade
    /// in linearly.
    pub fade_threshold: f64,
    /// An octant that intersects the frustum is observed only if it looks at least this big. Keeping this below
    /// `descend_threshold` lets a distant octant stand in for its whole subtree.
    pub render_threshold: f64,
    /// Lazy eviction starts once resident buckets hold more points than this.
    pub max_resident_points: usize,
    /// Load completions applied per frame. The rest wait in the queue for later frames.
    pub max_completions_per_frame: usize,
}

impl IndexConfig {
    pub fn new(
        descend_threshold: f64,
        fade_threshold: f64,
        render_threshold: f64,
        max_resident_points: usize,
        max_completions_per_frame: usize,
    ) -> Self {
        let config = Self {
            descend_threshold,
            fade_threshold,
            render_threshold,
            max_resident_points,
            max_completions_per_frame,
        };
        if let Err(e) = config.validate() {
            panic!("{}", e);
        }

        config
    }

    pub fn validate(&self) -> Result<(), InvalidIndexConfig> {
        if !(self.render_threshold >= 0.0) {
            return Err(InvalidIndexConfig("render_threshold must be non-negative"));
        }
        if !(self.descend_threshold >= self.render_threshold) {
            return Err(InvalidIndexConfig(
                "descend_threshold must not be below render_threshold",
            ));
        }
        if !(self.fade_threshold >= self.descend_threshold) {
            return Err(InvalidIndexConfig(
                "fade_threshold must not be below descend_threshold",
            ));
        }
        if self.max_completions_per_frame == 0 {
            return Err(InvalidIndexConfig(
                "max_completions_per_frame must be positive",
            ));
        }

        Ok(())
    }

    /// The opacity that children of an octant with `view_angle` inherit, relative to their parent.
    #[inline]
    pub fn child_fade(&self, view_angle: f64) -> f32 {
        let span = self.fade_threshold - self.descend_threshold;
        if span <= 0.0 {
            return 1.0;
        }

        ((view_angle - self.descend_threshold) / span).clamp(0.0, 1.0) as f32
    }
}

#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
#[error("invalid index config: {0}")]
pub struct InvalidIndexConfig(pub &'static str);

#[derive(Deserialize)]
struct UncheckedIndexConfig {
    descend_threshold: f64,
    fade_threshold: f64,
    render_threshold: f64,
    max_resident_points: usize,
    max_completions_per_frame: usize,
}

impl TryFrom<UncheckedIndexConfig> for IndexConfig {
    type Error = InvalidIndexConfig;

    fn try_from(unchecked: UncheckedIndexConfig) -> Result<Self, Self::Error> {
        let config = Self {
            descend_threshold: unchecked.descend_threshold,
            fade_threshold: unchecked.fade_threshold,
            render_threshold: unchecked.render_threshold,
            max_resident_points: unchecked.max_resident_points,
            max_completions_per_frame: unchecked.max_completions_per_frame,
        };
        config.validate()?;

        Ok(config)
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self::new(0.9, 1.4, 0.1, 5_000_000, 64)
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
