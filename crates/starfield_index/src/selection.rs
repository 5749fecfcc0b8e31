use crate::IndexConfig;

use starfield_core::{OctantId, ViewState, MAX_OCTANT_LEVEL};
use starfield_storage::{NodeIndex, Octree, OctreeNode, VisitStatus};

/// An octant chosen by `select_octants` for the current view.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SelectedOctant {
    pub node: NodeIndex,
    pub id: OctantId,
    pub view_angle: f64,
    /// Product of the fades of all ancestors, in `[0, 1]`.
    pub opacity: f32,
}

/// Traverse `octree` top-down, depth-first, to find the octants that are observed from `view`. `selected_rx` receives each
/// observed octant before any of its descendants.
///
/// An octant is observed when its box intersects the frustum and its view angle reaches `config.render_threshold`. Its
/// children are only tested when, in addition, its view angle reaches `config.descend_threshold`. So a child is never tested
/// unless its parent was observed in the same pass, and the work is proportional to the number of observed octants.
pub fn select_octants(
    octree: &Octree,
    view: &ViewState,
    config: &IndexConfig,
    mut selected_rx: impl FnMut(&SelectedOctant, &OctreeNode),
) {
    // Opacity inherited by the children of the most recently observed octant at each level. Pre-order traversal guarantees the
    // parent's entry is current when a child is visited.
    let mut child_opacity = [0.0f32; MAX_OCTANT_LEVEL as usize + 1];

    octree.visit_preorder(&mut |node_index: NodeIndex, node: &OctreeNode| {
        let bounds = node.bounds();
        if !view.sees(bounds) {
            return VisitStatus::Stop;
        }
        let view_angle = view.view_angle(bounds);
        if view_angle < config.render_threshold {
            return VisitStatus::Stop;
        }

        let level = node.level() as usize;
        let opacity = if level == 0 {
            1.0
        } else {
            child_opacity[level - 1]
        };
        selected_rx(
            &SelectedOctant {
                node: node_index,
                id: node.id(),
                view_angle,
                opacity,
            },
            node,
        );

        if view_angle < config.descend_threshold {
            return VisitStatus::Stop;
        }
        child_opacity[level] = opacity * config.child_fade(view_angle);

        VisitStatus::Continue
    });
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
