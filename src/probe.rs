//! Precomputed probe paths over a core region.
//!
//! A probe path is a deterministic walk through the coordinate space that
//! starts at an anchor (the center or one of the corners) and visits each
//! coordinate at most once. On a core collision the table picks the path
//! whose anchor is nearest to the colliding coordinate and scans a bounded
//! window around the closest point on that path.
//!
//! Paths are stored flattened in one arena and only depend on the
//! dimension sizes, so they are rebuilt whenever the table is resized.

use ahash::AHashSet;
use std::ops::Range;

use crate::hash::Shape;

/// Fractional part of the golden ratio; drives the dimension sequence.
const GOLDEN_CONJUGATE: f64 = 0.618_033_988_749_895;

/// Picks the dimension advanced at `step`, following the Weyl sequence
/// `frac(step * φ⁻¹)`.
#[inline]
fn dimension_for_step(step: usize, dimensions: usize) -> usize {
    let frac: f64 = (step as f64 * GOLDEN_CONJUGATE).fract();
    ((frac * dimensions as f64) as usize).min(dimensions - 1)
}

/// Moves one coordinate by `+1`/`-1` along `dim`, wrapping at the edges.
#[inline]
fn stepped(coordinate: &[usize], sizes: &[usize], dim: usize, forward: bool) -> Vec<usize> {
    let mut next: Vec<usize> = coordinate.to_vec();
    let size: usize = sizes[dim];
    next[dim] = if forward {
        (next[dim] + 1) % size
    } else {
        (next[dim] + size - 1) % size
    };
    next
}

#[inline]
fn manhattan(a: &[usize], b: &[usize]) -> usize {
    a.iter().zip(b.iter()).map(|(x, y)| x.abs_diff(*y)).sum()
}

/// Walks the core space from `anchor`, returning up to `max_len` distinct
/// coordinates in visiting order.
///
/// Each step advances the dimension chosen by the golden-ratio sequence by
/// `+1`. If that lands on an already visited coordinate the remaining
/// dimensions are tried in order, then the same dimensions in the `-1`
/// direction. When every neighbour has been visited the walk stops early.
pub fn generate_path(shape: &Shape, anchor: &[usize], max_len: usize) -> Vec<Vec<usize>> {
    let sizes: &[usize] = shape.dimension_sizes();
    let dimensions: usize = sizes.len();
    let limit: usize = max_len.min(shape.core_capacity());

    let mut path: Vec<Vec<usize>> = Vec::with_capacity(limit);
    let mut visited: AHashSet<usize> = AHashSet::with_capacity(limit);
    if limit == 0 {
        return path;
    }

    let mut current: Vec<usize> = anchor.to_vec();
    visited.insert(shape.linearize(&current));
    path.push(current.clone());

    let mut step: usize = 0;
    while path.len() < limit {
        let preferred: usize = dimension_for_step(step, dimensions);
        let mut advanced: Option<Vec<usize>> = None;
        'search: for forward in [true, false] {
            for k in 0..dimensions {
                let dim: usize = (preferred + k) % dimensions;
                let candidate: Vec<usize> = stepped(&current, sizes, dim, forward);
                if visited.insert(shape.linearize(&candidate)) {
                    advanced = Some(candidate);
                    break 'search;
                }
            }
        }
        match advanced {
            Some(next) => {
                path.push(next.clone());
                current = next;
            }
            None => break,
        }
        step += 1;
    }
    path
}

/// Center first, then corners in bitmask order, without duplicates.
pub fn anchors(shape: &Shape, max_anchors: usize) -> Vec<Vec<usize>> {
    let sizes: &[usize] = shape.dimension_sizes();
    let mut result: Vec<Vec<usize>> = Vec::with_capacity(max_anchors);
    let mut seen: AHashSet<usize> = AHashSet::new();
    if max_anchors == 0 {
        return result;
    }

    let center: Vec<usize> = sizes.iter().map(|s| s / 2).collect();
    seen.insert(shape.linearize(&center));
    result.push(center);

    let corner_bits: u32 = sizes.len().min(16) as u32;
    for mask in 0..(1usize << corner_bits) {
        if result.len() >= max_anchors {
            break;
        }
        let corner: Vec<usize> = sizes
            .iter()
            .enumerate()
            .map(|(i, s)| if i < 16 && mask & (1 << i) != 0 { s - 1 } else { 0 })
            .collect();
        if seen.insert(shape.linearize(&corner)) {
            result.push(corner);
        }
    }
    result
}

/// All probe paths of a core layout, flattened into one arena.
#[derive(Debug, Clone)]
pub struct ProbePaths {
    dimensions: usize,
    anchors: Vec<Vec<usize>>,
    /// Linearized coordinates of every path, back to back.
    offsets: Vec<usize>,
    /// Same coordinates unflattened, `dimensions` values per step.
    coordinates: Vec<usize>,
    spans: Vec<Range<usize>>,
}

impl ProbePaths {
    pub fn build(shape: &Shape, max_anchors: usize, max_path_len: usize) -> ProbePaths {
        let anchors: Vec<Vec<usize>> = anchors(shape, max_anchors);
        let mut offsets: Vec<usize> = Vec::with_capacity(anchors.len() * max_path_len);
        let mut coordinates: Vec<usize> =
            Vec::with_capacity(anchors.len() * max_path_len * shape.dimensions());
        let mut spans: Vec<Range<usize>> = Vec::with_capacity(anchors.len());
        for anchor in anchors.iter() {
            let start: usize = offsets.len();
            for coordinate in generate_path(shape, anchor, max_path_len) {
                offsets.push(shape.linearize(&coordinate));
                coordinates.extend_from_slice(&coordinate);
            }
            spans.push(start..offsets.len());
        }
        ProbePaths {
            dimensions: shape.dimensions(),
            anchors,
            offsets,
            coordinates,
            spans,
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    #[cfg(test)]
    pub fn anchor(&self, path: usize) -> &[usize] {
        &self.anchors[path]
    }

    /// Linearized coordinates of one path.
    pub fn path(&self, path: usize) -> &[usize] {
        &self.offsets[self.spans[path].clone()]
    }

    fn coordinate_at(&self, position: usize) -> &[usize] {
        let start: usize = position * self.dimensions;
        &self.coordinates[start..start + self.dimensions]
    }

    /// Index of the path whose anchor is closest to `coordinate`. Ties go to
    /// the earlier anchor.
    pub fn nearest_anchor(&self, coordinate: &[usize]) -> Option<usize> {
        self.anchors
            .iter()
            .enumerate()
            .min_by_key(|(i, anchor)| (manhattan(anchor, coordinate), *i))
            .map(|(i, _)| i)
    }

    /// Position on `path` of the step closest to `coordinate`.
    fn nearest_index(&self, path: usize, coordinate: &[usize]) -> usize {
        let span: Range<usize> = self.spans[path].clone();
        let mut best: usize = 0;
        let mut best_distance: usize = usize::MAX;
        for (i, position) in span.enumerate() {
            let distance: usize = manhattan(self.coordinate_at(position), coordinate);
            if distance < best_distance {
                best = i;
                best_distance = distance;
                if distance == 0 {
                    break;
                }
            }
        }
        best
    }

    /// The bounded sequence of core offsets scanned when the primary
    /// coordinate `core_offset` is taken.
    ///
    /// The window starts at the path step closest to the coordinate, walks
    /// forward for about half the budget and then backward from just before
    /// the start. Budget left over at either end of the path is spent in the
    /// other direction.
    pub fn window(&self, shape: &Shape, core_offset: usize, budget: usize) -> ProbeWindow<'_> {
        let coordinate: Vec<usize> = shape.coordinate_of(core_offset);
        let Some(path) = self.nearest_anchor(&coordinate) else {
            return ProbeWindow::empty();
        };
        let steps: &[usize] = self.path(path);
        if steps.is_empty() {
            return ProbeWindow::empty();
        }
        let start: usize = self.nearest_index(path, &coordinate);
        let ahead: usize = steps.len() - start;
        let behind: usize = start;
        let forward: usize = ((budget + 1) / 2).min(ahead);
        let backward: usize = (budget - forward).min(behind);
        let forward: usize = (budget - backward).min(ahead);
        ProbeWindow {
            steps,
            start,
            forward,
            backward,
            emitted: 0,
        }
    }
}

/// Iterator over the core offsets of one probe window.
#[derive(Debug, Clone)]
pub struct ProbeWindow<'a> {
    steps: &'a [usize],
    start: usize,
    forward: usize,
    backward: usize,
    emitted: usize,
}

impl<'a> ProbeWindow<'a> {
    fn empty() -> Self {
        ProbeWindow {
            steps: &[],
            start: 0,
            forward: 0,
            backward: 0,
            emitted: 0,
        }
    }
}

impl<'a> Iterator for ProbeWindow<'a> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let i: usize = self.emitted;
        let offset: Option<usize> = if i < self.forward {
            Some(self.steps[self.start + i])
        } else if i < self.forward + self.backward {
            Some(self.steps[self.start - (i - self.forward + 1)])
        } else {
            None
        };
        if offset.is_some() {
            self.emitted += 1;
        }
        offset
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left: usize = self.forward + self.backward - self.emitted;
        (left, Some(left))
    }
}

impl<'a> ExactSizeIterator for ProbeWindow<'a> {}
