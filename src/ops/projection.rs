use crate::model::node::{DragProjection, FlattenedNode};
use crate::ops::validator::{MoveRejection, MoveValidator, StructuralValidator};

/// Compute where `active_id` would land if dropped over `over_id` now.
///
/// `drag_offset_x` is the cumulative horizontal pointer travel since the drag
/// started and `indentation_width` the distance of one depth level, both in
/// the same unit (pixels, terminal cells, ...). When `validator` is given it
/// replaces the structural checks rather than adding to them.
pub fn project<T: Clone>(
    items: &[FlattenedNode<T>],
    active_id: &str,
    over_id: &str,
    drag_offset_x: f64,
    indentation_width: f64,
    validator: Option<&dyn MoveValidator<T>>,
) -> DragProjection<T> {
    let (Some(active_idx), Some(over_idx)) = (position(items, active_id), position(items, over_id))
    else {
        return DragProjection::rejected(MoveRejection::NodeNotFound);
    };
    let active = &items[active_idx];
    let over = &items[over_idx];

    let drag_depth = drag_depth(drag_offset_x, indentation_width);

    // Passing over a nested row without horizontal travel keeps the original depth.
    let default_depth = if drag_depth == 0 && over.depth > active.depth {
        active.depth
    } else {
        over.depth
    };
    let projected = if drag_depth == 0 {
        default_depth as i64
    } else {
        active.depth as i64 + drag_depth
    };

    // Dragging right in place may nest under the row above. The first row
    // has nothing above it to nest under.
    let max_depth = if active_idx == over_idx && drag_depth > 0 {
        over_idx.checked_sub(1).map_or(0, |i| items[i].depth + 1)
    } else {
        over.depth + 1
    };
    let min_depth = 0;
    let depth = projected.clamp(min_depth as i64, max_depth as i64) as usize;

    let parent_id = resolve_parent(items, active, over_idx, depth);
    let parent_node = parent_id
        .as_deref()
        .and_then(|pid| items.iter().find(|item| item.id() == pid))
        .cloned();

    let check = match validator {
        Some(v) => v.validate(active, parent_node.as_ref(), parent_id.as_deref()),
        None => StructuralValidator.validate(active, parent_node.as_ref(), parent_id.as_deref()),
    };

    tracing::trace!(
        active = active_id,
        over = over_id,
        drag_depth,
        depth,
        parent = ?parent_id,
        can_drop = check.can_move,
        "drag projection"
    );

    DragProjection {
        depth,
        max_depth,
        min_depth,
        parent_id,
        parent_node,
        can_drop: check.can_move,
        reason: check.reason,
    }
}

/// Signed number of indentation levels covered by the horizontal drag.
pub fn drag_depth(drag_offset_x: f64, indentation_width: f64) -> i64 {
    if indentation_width <= 0.0 || !drag_offset_x.is_finite() {
        return 0;
    }
    (drag_offset_x / indentation_width).round() as i64
}

/// Resolve the parent row for a drop at `depth` relative to the hovered row.
/// The active row is never a candidate.
fn resolve_parent<T>(
    items: &[FlattenedNode<T>],
    active: &FlattenedNode<T>,
    over_idx: usize,
    depth: usize,
) -> Option<String> {
    if depth == 0 {
        return None;
    }
    let over = &items[over_idx];
    if depth == over.depth && over.parent_id.as_deref() != Some(active.id()) {
        return over.parent_id.clone();
    }

    let target = depth - 1;
    for item in items[..=over_idx].iter().rev() {
        if item.id() == active.id() {
            continue;
        }
        if item.depth == target {
            return Some(item.id().to_string());
        }
        if item.depth < target {
            return None;
        }
    }
    None
}

/// 1-based sibling position for the active row once dropped under `parent_id`.
///
/// Dragging down inserts after the hovered row, dragging up before it. With
/// no following sibling the row is appended.
pub fn compute_order<T>(
    items: &[FlattenedNode<T>],
    active_id: &str,
    over_id: &str,
    parent_id: Option<&str>,
) -> usize {
    let siblings: Vec<&FlattenedNode<T>> = items
        .iter()
        .filter(|item| item.parent_id.as_deref() == parent_id && item.id() != active_id)
        .collect();

    let (Some(active), Some(over)) = (
        items.iter().find(|i| i.id() == active_id),
        items.iter().find(|i| i.id() == over_id),
    ) else {
        return siblings.len() + 1;
    };

    let dragging_down = active.flat_index < over.flat_index;
    siblings
        .iter()
        .position(|s| {
            if dragging_down {
                s.flat_index > over.flat_index
            } else {
                s.flat_index >= over.flat_index
            }
        })
        .map_or(siblings.len() + 1, |p| p + 1)
}

fn position<T>(items: &[FlattenedNode<T>], id: &str) -> Option<usize> {
    items.iter().position(|item| item.id() == id)
}
