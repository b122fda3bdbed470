//! Line merging for trail geometries.
//!
//! Parts are sewn together at nodes where exactly two part ends meet. Parts
//! are reversed where needed so each merged run is continuous. Nodes touched
//! by one end, or by three or more, terminate a run.

use std::collections::{HashMap, HashSet};

use geo::{Coord, Geometry, LineString, MultiLineString};

use super::{GeometryError, kind_name};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum End {
    First,
    Last,
}

/// Exact coordinate key; `-0.0` and `0.0` collapse to one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct NodeKey(u64, u64);

impl From<Coord<f64>> for NodeKey {
    fn from(coord: Coord<f64>) -> Self {
        let canonical = |value: f64| if value == 0.0 { 0.0_f64 } else { value };
        Self(canonical(coord.x).to_bits(), canonical(coord.y).to_bits())
    }
}

/// Merge the line parts of a shape into as few continuous lines as possible.
///
/// A `LineString` is returned unchanged. A `MultiLineString` collapses to a
/// `LineString` when every part joins into one run; otherwise the merged runs
/// are returned as a `MultiLineString`. Other shapes are rejected.
///
/// ```
/// use geo::{Geometry, LineString, MultiLineString};
/// use greenway_core::geometry::merge_lines;
///
/// let parts = MultiLineString::new(vec![
///     LineString::from(vec![(0.0, 0.0), (1.0, 0.0)]),
///     LineString::from(vec![(2.0, 0.0), (1.0, 0.0)]),
/// ]);
/// let merged = merge_lines(Geometry::MultiLineString(parts)).expect("lines merge");
/// assert_eq!(
///     merged,
///     Geometry::LineString(LineString::from(vec![(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]))
/// );
/// ```
pub fn merge_lines(shape: Geometry<f64>) -> Result<Geometry<f64>, GeometryError> {
    match shape {
        Geometry::LineString(line) => Ok(Geometry::LineString(line)),
        Geometry::MultiLineString(lines) => {
            let mut runs = merge_parts(&lines.0);
            if runs.len() == 1 {
                if let Some(run) = runs.pop() {
                    return Ok(Geometry::LineString(run));
                }
            }
            Ok(Geometry::MultiLineString(MultiLineString::new(runs)))
        }
        other => Err(GeometryError::UnsupportedMerge {
            kind: kind_name(&other),
        }),
    }
}

struct PartGraph<'a> {
    parts: &'a [LineString<f64>],
    ends_at: HashMap<NodeKey, Vec<(usize, End)>>,
}

impl<'a> PartGraph<'a> {
    fn new(parts: &'a [LineString<f64>]) -> Self {
        let mut ends_at: HashMap<NodeKey, Vec<(usize, End)>> = HashMap::new();
        for (index, part) in parts.iter().enumerate() {
            if let (Some(first), Some(last)) = (part.0.first(), part.0.last()) {
                ends_at
                    .entry(NodeKey::from(*first))
                    .or_default()
                    .push((index, End::First));
                ends_at
                    .entry(NodeKey::from(*last))
                    .or_default()
                    .push((index, End::Last));
            }
        }
        Self { parts, ends_at }
    }

    fn degree(&self, coord: Option<&Coord<f64>>) -> usize {
        coord
            .and_then(|c| self.ends_at.get(&NodeKey::from(*c)))
            .map_or(0, Vec::len)
    }

    fn oriented(&self, index: usize, forward: bool) -> Vec<Coord<f64>> {
        let Some(part) = self.parts.get(index) else {
            return Vec::new();
        };
        if forward {
            part.0.clone()
        } else {
            part.0.iter().rev().copied().collect()
        }
    }

    /// Follow degree-two nodes from `start`, consuming parts as they join.
    fn walk(&self, start: usize, forward: bool, visited: &mut HashSet<usize>) -> LineString<f64> {
        visited.insert(start);
        let mut coords = self.oriented(start, forward);
        let mut current = (start, if forward { End::Last } else { End::First });

        while let Some(tail) = coords.last().copied() {
            let Some(ends) = self.ends_at.get(&NodeKey::from(tail)) else {
                break;
            };
            if ends.len() != 2 {
                break;
            }
            let Some(&(next, joined_end)) = ends
                .iter()
                .find(|&&end| end != current && !visited.contains(&end.0))
            else {
                break;
            };
            visited.insert(next);
            let next_forward = joined_end == End::First;
            coords.extend(self.oriented(next, next_forward).into_iter().skip(1));
            current = (next, if next_forward { End::Last } else { End::First });
        }

        LineString::new(coords)
    }
}

fn merge_parts(parts: &[LineString<f64>]) -> Vec<LineString<f64>> {
    let graph = PartGraph::new(parts);
    let mut visited = HashSet::new();
    let mut runs = Vec::new();

    // Runs start at nodes that do not continue a chain.
    for (index, part) in parts.iter().enumerate() {
        if visited.contains(&index) {
            continue;
        }
        if graph.degree(part.0.first()) != 2 {
            runs.push(graph.walk(index, true, &mut visited));
        } else if graph.degree(part.0.last()) != 2 {
            runs.push(graph.walk(index, false, &mut visited));
        }
    }

    // Whatever is left forms closed loops.
    for index in 0..parts.len() {
        if !visited.contains(&index) {
            runs.push(graph.walk(index, true, &mut visited));
        }
    }

    runs
}
