use crate::config::{GroupConfig, LayoutConfig};

use super::types::Position;

/// Size and interior grid of one event container.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContainerGeometry {
    pub columns: usize,
    pub rows: usize,
    pub width: f32,
    pub height: f32,
}

impl ContainerGeometry {
    pub fn for_members(count: usize, config: &LayoutConfig) -> Self {
        let group = &config.group;
        let max_columns = group.max_columns.max(1);
        let count = count.max(1);
        let columns = count.min(max_columns);
        let rows = count.div_ceil(max_columns);
        let width = 2.0 * group.padding
            + columns as f32 * config.node_width
            + columns.saturating_sub(1) as f32 * group.member_gap;
        let height = group.header_height
            + 2.0 * group.padding
            + rows as f32 * config.node_height
            + rows.saturating_sub(1) as f32 * group.member_gap;
        Self {
            columns,
            rows,
            width,
            height,
        }
    }
}

/// Grid cell `(row, column)` of the `index`-th member, row-major.
pub fn member_cell(index: usize, group: &GroupConfig) -> (usize, usize) {
    let max_columns = group.max_columns.max(1);
    (index / max_columns, index % max_columns)
}

/// Member position relative to the container's top-left corner.
pub fn member_offset(index: usize, config: &LayoutConfig) -> Position {
    let group = &config.group;
    let (row, column) = member_cell(index, group);
    Position::new(
        group.padding + column as f32 * (config.node_width + group.member_gap),
        group.header_height + group.padding + row as f32 * (config.node_height + group.member_gap),
    )
}

/// Stacks containers top to bottom from `origin`; once the next one would
/// pass the height budget a new column starts to the right of the widest
/// container so far. A container taller than the budget gets a column of
/// its own.
pub fn flow_containers(sizes: &[ContainerGeometry], origin: Position, group: &GroupConfig) -> Vec<Position> {
    let mut positions = Vec::with_capacity(sizes.len());
    let mut column_x = origin.x;
    let mut column_width = 0.0f32;
    let mut y = origin.y;

    for size in sizes {
        let used = y - origin.y;
        if used > 0.0 && used + size.height > group.column_height_budget {
            column_x += column_width + group.spacing;
            column_width = 0.0;
            y = origin.y;
        }
        positions.push(Position::new(column_x, y));
        column_width = column_width.max(size.width);
        y += size.height + group.spacing;
    }
    positions
}
