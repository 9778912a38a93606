//! Shared position conversion helpers.
//!
//! Tree-sitter positions are zero-based. Reported positions are one-based.

/// Converts a Tree-sitter position (0-based) to one-based display coordinates.
#[must_use]
pub(crate) fn point_to_one_based(pos: tree_sitter::Point) -> (u32, u32) {
    let line = u32::try_from(pos.row.saturating_add(1)).unwrap_or(u32::MAX);
    let column = u32::try_from(pos.column.saturating_add(1)).unwrap_or(u32::MAX);
    (line, column)
}

/// Returns the leading whitespace of the line containing `offset`.
pub(crate) fn line_indent(source: &str, offset: usize) -> &str {
    let line_start = source
        .get(..offset)
        .and_then(|head| head.rfind('\n'))
        .map_or(0, |idx| idx + 1);
    let line = source.get(line_start..).unwrap_or_default();
    let width = line
        .find(|c: char| c != ' ' && c != '\t')
        .unwrap_or(line.len());
    line.get(..width).unwrap_or_default()
}
