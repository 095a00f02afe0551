//! Scatter-accumulation into the UV grid and normalization.
//!
//! Accumulation is plain summation, so it is independent of the order in
//! which pixels arrive. The parallel path never shares a buffer between
//! threads: every batch element owns its own slots, and large batch elements
//! are folded into per-thread partial grids that are summed afterwards.

use ndarray::{Array2, Array4, ArrayView1, Axis};
use rayon::prelude::*;

/// Pixels folded by one rayon task before partial grids are merged.
const FOLD_CHUNK: usize = 16 * 1024;

/// Per-slot feature sums and pixel counts.
#[derive(Debug, Clone, PartialEq)]
pub struct UvAccumulator {
    /// Row-major `(slots, width)` sums.
    sums: Vec<f32>,
    /// One pixel count per slot.
    counts: Vec<u32>,
    /// Values per row (`C + 2`).
    width: usize,
}

impl UvAccumulator {
    /// An all-zero accumulator for `slots` rows of `width` values.
    pub fn zeros(slots: usize, width: usize) -> Self {
        Self {
            sums: vec![0.0; slots * width],
            counts: vec![0; slots],
            width,
        }
    }

    /// Number of slots.
    #[inline]
    pub fn num_slots(&self) -> usize {
        self.counts.len()
    }

    /// Values per slot.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Add one gathered row into `slot`.
    #[inline]
    pub fn add(&mut self, slot: usize, row: ArrayView1<'_, f32>) {
        let start = slot * self.width;
        for (acc, &value) in self.sums[start..start + self.width].iter_mut().zip(row.iter()) {
            *acc += value;
        }
        self.counts[slot] += 1;
    }

    /// Sum another accumulator of the same shape into this one.
    pub fn merge(mut self, other: Self) -> Self {
        debug_assert_eq!(self.sums.len(), other.sums.len());
        for (a, b) in self.sums.iter_mut().zip(&other.sums) {
            *a += b;
        }
        for (a, b) in self.counts.iter_mut().zip(&other.counts) {
            *a += b;
        }
        self
    }

    /// Number of pixels accumulated into `slot`.
    #[inline]
    pub fn count(&self, slot: usize) -> u32 {
        self.counts[slot]
    }

    /// Accumulated sums of `slot`.
    #[inline]
    pub fn sum(&self, slot: usize) -> &[f32] {
        &self.sums[slot * self.width..(slot + 1) * self.width]
    }

    fn append(&mut self, other: Self) {
        debug_assert_eq!(self.width, other.width);
        self.sums.extend(other.sums);
        self.counts.extend(other.counts);
    }
}

/// Scatter-add every gathered row into its flat slot.
///
/// `rows` is `(N, C + 2)` and `slots[i]` is the flat slot of row `i`. Rows
/// may arrive in any order in both modes.
pub fn scatter_accumulate(
    rows: &Array2<f32>,
    slots: &[usize],
    batch_size: usize,
    resolution: usize,
    parallel: bool,
) -> UvAccumulator {
    debug_assert_eq!(rows.nrows(), slots.len());
    let width = rows.ncols();
    let cells = resolution * resolution;

    if !parallel {
        let mut acc = UvAccumulator::zeros(batch_size * cells, width);
        for (row, &slot) in rows.axis_iter(Axis(0)).zip(slots) {
            acc.add(slot, row);
        }
        return acc;
    }

    let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); batch_size];
    for (i, &slot) in slots.iter().enumerate() {
        buckets[slot / cells].push(i);
    }

    let per_batch: Vec<UvAccumulator> = buckets
        .par_iter()
        .enumerate()
        .map(|(batch, members)| accumulate_batch(rows, slots, members, batch * cells, cells))
        .collect();

    let mut acc = UvAccumulator::zeros(0, width);
    for grid in per_batch {
        acc.append(grid);
    }
    acc
}

/// Accumulate the rows `members` of one batch element whose slots start at
/// `base`.
fn accumulate_batch(
    rows: &Array2<f32>,
    slots: &[usize],
    members: &[usize],
    base: usize,
    cells: usize,
) -> UvAccumulator {
    let width = rows.ncols();
    let fold_chunk = |acc: UvAccumulator, chunk: &[usize]| {
        chunk.iter().fold(acc, |mut acc, &i| {
            acc.add(slots[i] - base, rows.row(i));
            acc
        })
    };

    if members.len() <= FOLD_CHUNK {
        return fold_chunk(UvAccumulator::zeros(cells, width), members);
    }

    members
        .par_chunks(FOLD_CHUNK)
        .fold(|| UvAccumulator::zeros(cells, width), fold_chunk)
        .reduce(|| UvAccumulator::zeros(cells, width), UvAccumulator::merge)
}

/// Divide each slot's sums by `count + epsilon` and append the coverage mask.
///
/// Returns a `(slots, width + 1)` array. Uncovered slots read as all zero.
pub fn normalize(acc: UvAccumulator, epsilon: f32) -> Array2<f32> {
    let width = acc.width();
    let mut out = Array2::zeros((acc.num_slots(), width + 1));

    for (slot, mut row) in out.axis_iter_mut(Axis(0)).enumerate() {
        let count = acc.count(slot);
        let denom = count as f32 + epsilon;
        for (dst, &sum) in row.iter_mut().zip(acc.sum(slot)) {
            *dst = sum / denom;
        }
        row[width] = if count > 0 { 1.0 } else { 0.0 };
    }

    out
}

/// Reinterpret `(B * R * R, K)` slot rows as a channel-first `(B, K, R, R)`
/// array, with slot `b * R^2 + v * R + u` landing at `[b, .., v, u]`.
pub fn to_channels_first(slot_rows: Array2<f32>, batch_size: usize, resolution: usize) -> Array4<f32> {
    let channels = slot_rows.ncols();
    let cells = resolution * resolution;
    debug_assert_eq!(slot_rows.nrows(), batch_size * cells);

    Array4::from_shape_fn((batch_size, channels, resolution, resolution), |(b, c, v, u)| {
        slot_rows[[b * cells + v * resolution + u, c]]
    })
}
