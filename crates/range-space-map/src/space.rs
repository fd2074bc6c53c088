// Copyright (c) 2025 Felix Kahle.
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the
// "Software"), to deal in the Software without restriction, including
// without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to
// permit persons to whom the Software is furnished to do so, subject to
// the following conditions:
//
// The above copyright notice and this permission notice shall be
// included in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
// MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE
// LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION
// OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION
// WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! # The interval map
//!
//! [`Space`] maps every value of a metric to an optional payload, stored as
//! maximal, pairwise-disjoint, non-adjacent closed ranges tagged with
//! payloads. Between mutations the store is *canonical*: stored ranges are
//! non-empty, sorted, disjoint, and no two adjacent ranges carry equal
//! payloads (they would have been coalesced).
//!
//! Three painting primitives mutate the map:
//!
//! - [`mark`](Space::mark) overwrites a range unconditionally;
//! - [`fill`](Space::fill) paints only currently unmapped values;
//! - [`blend`](Space::blend) merges a color into existing payloads through a
//!   caller-supplied combinator, which may also erase.
//!
//! Each walks from the leftmost affected node rightward along the in-order
//! links, reusing existing nodes wherever possible, and re-establishes
//! canonical form before returning. Metric bounds are never stepped without
//! a witness: `hi + 1` is only ever computed when some stored value is known
//! to be strictly greater, and symmetrically for `lo - 1`, so saturation at
//! the ends of the key space needs no special cases at the call sites.

use crate::tree::Tree;
use range_space_core::{Metric, Range};
use std::fmt;
use std::iter::FusedIterator;
use tracing::trace;

/// A discrete interval map from metric values to payloads.
///
/// # Examples
///
/// ```
/// use range_space_core::Range;
/// use range_space_map::Space;
///
/// let mut routes: Space<u32, char> = Space::new();
/// routes.mark(Range::new(10, 20), 'A');
/// routes.mark(Range::new(21, 30), 'A'); // adjacent, same payload: coalesced
/// assert_eq!(routes.len(), 1);
/// assert_eq!(routes.get(25), Some(&'A'));
/// assert_eq!(routes.get(31), None);
/// ```
#[derive(Clone)]
pub struct Space<M, P> {
    tree: Tree<M, P>,
}

impl<M: Metric, P> Space<M, P> {
    /// Creates an empty space: every metric value is unmapped.
    pub fn new() -> Self {
        Self { tree: Tree::new() }
    }

    /// Number of distinct stored ranges.
    #[inline]
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// `true` if no value is mapped.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// The payload mapped at `metric`, if any.
    #[inline]
    pub fn get(&self, metric: M) -> Option<&P> {
        self.tree.find(metric).map(|i| self.tree.payload(i))
    }

    /// The stored range containing `metric` together with its payload.
    #[inline]
    pub fn find(&self, metric: M) -> Option<(Range<M>, &P)> {
        self.tree
            .find(metric)
            .map(|i| (self.tree.range(i), self.tree.payload(i)))
    }

    /// Iterates the stored ranges in ascending order.
    #[inline]
    pub fn iter(&self) -> Iter<'_, M, P> {
        Iter {
            tree: &self.tree,
            cursor: self.tree.head(),
        }
    }

    /// Unmaps everything and releases node storage.
    pub fn clear(&mut self) {
        self.tree.clear();
    }
}

impl<M: Metric, P: Clone + PartialEq> Space<M, P> {
    /// Sets the payload for every value in `range`, regardless of its
    /// current state. An empty range is a no-op.
    ///
    /// # Examples
    ///
    /// ```
    /// use range_space_core::Range;
    /// use range_space_map::Space;
    ///
    /// let mut space: Space<u32, char> = Space::new();
    /// space.mark(Range::new(10, 30), 'A');
    /// space.mark(Range::new(15, 20), 'B');
    /// let split: Vec<_> = space.iter().map(|(r, &p)| (r.lo(), r.hi(), p)).collect();
    /// assert_eq!(split, vec![(10, 14, 'A'), (15, 20, 'B'), (21, 30, 'A')]);
    /// ```
    pub fn mark(&mut self, range: Range<M>, payload: P) {
        if range.is_empty() {
            return;
        }
        trace!(range = %range, "mark");
        let lo = range.lo();
        let hi = range.hi();
        // The node that ends up carrying the painted range. Reusing an
        // existing node whenever one is available keeps allocation rare.
        let mut x: Option<usize> = None;
        let mut cursor: Option<usize>;

        if let Some(n) = self.tree.lower_bound(lo) {
            let nr = self.tree.range(n);
            if nr.lo() == lo {
                // A predecessor may be left-adjacent with the same payload;
                // stepping lo down is safe because its existence implies
                // lo is not the metric minimum.
                let pred = self.tree.prev(n).filter(|&p| {
                    *self.tree.payload(p) == payload
                        && self.tree.range(p).hi().successor() == lo
                });
                if let Some(p) = pred {
                    x = Some(p);
                    cursor = Some(n);
                    self.tree.set_max(p, hi);
                } else if nr.hi() <= hi {
                    // Entirely subsumed by the request: reuse in place.
                    x = Some(n);
                    cursor = self.tree.next(n);
                    self.tree.set_max(n, hi);
                    self.tree.set_payload(n, payload.clone());
                } else if *self.tree.payload(n) == payload {
                    return; // covered by an existing range with equal payload
                } else {
                    // The node strictly covers the request with a different
                    // payload: clip it past the request and slot in front.
                    self.tree.set_min(n, hi.successor());
                    self.tree.insert_before(n, range, payload);
                    debug_assert!(self.tree.check_invariants());
                    return;
                }
            } else if *self.tree.payload(n) == payload && nr.hi() >= lo.predecessor() {
                // Left-adjacent or overlapping with the same payload;
                // nr.lo() < lo, so lo has a predecessor.
                if nr.hi() >= hi {
                    return;
                }
                x = Some(n);
                cursor = self.tree.next(n);
                self.tree.set_max(n, hi);
            } else if nr.hi() <= hi {
                // Left skew overlap with a different payload, or a gap.
                cursor = self.tree.next(n);
                if nr.hi() >= lo {
                    self.tree.set_max(n, lo.predecessor());
                } else if let Some(y) = cursor.filter(|&y| self.tree.range(y).hi() <= hi) {
                    // n was the lower bound, so y starts past lo; the
                    // request covers y entirely and it can be repurposed.
                    x = Some(y);
                    cursor = self.tree.next(y);
                    self.tree.set_range(y, range);
                    self.tree.set_payload(y, payload.clone());
                }
            } else {
                // Strictly covered with a different payload: split in three.
                let n_hi = nr.hi();
                let n_payload = self.tree.payload(n).clone();
                self.tree.set_max(n, lo.predecessor());
                let xi = self.tree.insert_after(n, range, payload);
                self.tree
                    .insert_after(xi, Range::new(hi.successor(), n_hi), n_payload);
                debug_assert!(self.tree.check_invariants());
                return;
            }
        } else if let Some(h) = self.tree.head() {
            // Every node starts past the request. The first one may still
            // overlap or be right-adjacent; the short-circuit keeps the
            // successor step guarded by hi < head.lo.
            let h_range = self.tree.range(h);
            if *self.tree.payload(h) == payload
                && (h_range.lo() <= hi || hi.successor() == h_range.lo())
            {
                x = Some(h);
                cursor = self.tree.next(h);
                self.tree.set_min(h, lo);
                if self.tree.range(h).hi() < hi {
                    self.tree.set_max(h, hi);
                }
            } else {
                let xi = self.tree.prepend(range, payload.clone());
                x = Some(xi);
                cursor = self.tree.next(xi);
            }
        } else {
            self.tree.append(range, payload);
            debug_assert!(self.tree.check_invariants());
            return;
        }

        let x = match x {
            Some(x) => x,
            None => match cursor {
                Some(n) => self.tree.insert_before(n, range, payload.clone()),
                None => self.tree.append(range, payload.clone()),
            },
        };

        // Right sweep: everything from the cursor on either dissolves into
        // x or bounds the painted region.
        while let Some(n) = cursor {
            let nr = self.tree.range(n);
            if nr.hi() <= hi {
                // Fully covered by the new painting.
                cursor = self.tree.next(n);
                self.tree.remove(n);
            } else if hi < nr.lo() && hi.successor() < nr.lo() {
                break; // gap past the painted region
            } else if *self.tree.payload(n) == payload {
                // Skew overlap or adjacency with equal payload: absorb.
                let n_hi = nr.hi();
                cursor = self.tree.next(n);
                self.tree.remove(n);
                self.tree.set_max(x, n_hi);
            } else if nr.lo() <= hi {
                // Skew overlap, different payload: clip and stop.
                self.tree.set_min(n, hi.successor());
                break;
            } else {
                break;
            }
        }
        debug_assert!(self.tree.check_invariants());
    }

    /// Sets the payload for every value in `range` that currently has none;
    /// mapped values are left untouched. An empty range is a no-op.
    ///
    /// # Examples
    ///
    /// ```
    /// use range_space_core::Range;
    /// use range_space_map::Space;
    ///
    /// let mut space: Space<u32, char> = Space::new();
    /// space.mark(Range::new(10, 20), 'A');
    /// space.fill(Range::new(5, 30), 'B');
    /// let got: Vec<_> = space.iter().map(|(r, &p)| (r.lo(), r.hi(), p)).collect();
    /// assert_eq!(got, vec![(5, 9, 'B'), (10, 20, 'A'), (21, 30, 'B')]);
    /// ```
    pub fn fill(&mut self, range: Range<M>, payload: P) {
        if range.is_empty() {
            return;
        }
        trace!(range = %range, "fill");
        // The still-unpainted prefix shrinks as nodes are passed; the carry
        // x, when present, is the node being stretched over it.
        let mut min = range.lo();
        let max = range.hi();
        let mut x: Option<usize> = None;
        let mut cursor: Option<usize>;

        match self.tree.lower_bound(min) {
            Some(n) => {
                let nr = self.tree.range(n);
                if nr.lo() < min {
                    // nr.lo() < min, so min has a predecessor.
                    if nr.hi() < min.predecessor() {
                        cursor = self.tree.next(n); // disjoint, not adjacent
                    } else if nr.hi() >= max {
                        return; // the request is inside a mapped range
                    } else if *self.tree.payload(n) != payload {
                        min = nr.hi().successor();
                        cursor = self.tree.next(n);
                    } else {
                        // Overlapping or adjacent with equal payload: carry.
                        x = Some(n);
                        cursor = self.tree.next(n);
                    }
                } else {
                    cursor = Some(n);
                }
            }
            None => cursor = self.tree.head(),
        }

        // Invariant from here on: every cursor node starts at or past min.
        while let Some(n) = cursor {
            let nr = self.tree.range(n);
            if *self.tree.payload(n) == payload {
                if let Some(xi) = x {
                    if nr.hi() <= max {
                        // Covered: dissolve into the carry.
                        cursor = self.tree.next(n);
                        self.tree.remove(n);
                    } else if nr.lo() <= max || nr.lo() == max.successor() {
                        // Overlap or adjacency with a larger end: absorb it
                        // and the fill is complete.
                        let n_hi = nr.hi();
                        self.tree.remove(n);
                        self.tree.set_max(xi, n_hi);
                        return;
                    } else {
                        self.tree.set_max(xi, max);
                        return;
                    }
                } else if nr.hi() <= max {
                    x = Some(n);
                    cursor = self.tree.next(n);
                    self.tree.set_min(n, min);
                } else if nr.lo() <= max || nr.lo() == max.successor() {
                    self.tree.set_min(n, min);
                    return;
                } else {
                    self.tree.insert_before(n, Range::new(min, max), payload);
                    debug_assert!(self.tree.check_invariants());
                    return;
                }
            } else if let Some(xi) = x {
                if max < nr.lo() {
                    self.tree.set_max(xi, max);
                    return;
                } else if max <= nr.hi() {
                    self.tree.set_max(xi, nr.lo().predecessor());
                    return;
                } else {
                    // n sits inside the fill: close the carry against it,
                    // then resume past it.
                    self.tree.set_max(xi, nr.lo().predecessor());
                    x = None;
                    min = nr.hi().successor();
                    cursor = self.tree.next(n);
                }
            } else {
                if max < nr.lo() {
                    self.tree.insert_before(n, Range::new(min, max), payload);
                    debug_assert!(self.tree.check_invariants());
                    return;
                }
                if min < nr.lo() {
                    self.tree
                        .insert_before(n, Range::new(min, nr.lo().predecessor()), payload.clone());
                }
                if max <= nr.hi() {
                    debug_assert!(self.tree.check_invariants());
                    return;
                }
                min = nr.hi().successor();
                cursor = self.tree.next(n);
            }
        }
        // min is past every stored range.
        match x {
            Some(xi) => self.tree.set_max(xi, max),
            None => {
                self.tree.append(Range::new(min, max), payload);
            }
        }
        debug_assert!(self.tree.check_invariants());
    }

    /// Unmaps every value in `range`. An empty range is a no-op.
    ///
    /// # Examples
    ///
    /// ```
    /// use range_space_core::Range;
    /// use range_space_map::Space;
    ///
    /// let mut space: Space<u32, char> = Space::new();
    /// space.mark(Range::new(10, 30), 'A');
    /// space.erase(Range::new(15, 20));
    /// let got: Vec<_> = space.iter().map(|(r, &p)| (r.lo(), r.hi(), p)).collect();
    /// assert_eq!(got, vec![(10, 14, 'A'), (21, 30, 'A')]);
    /// ```
    pub fn erase(&mut self, range: Range<M>) {
        if range.is_empty() {
            return;
        }
        trace!(range = %range, "erase");
        let mut cursor = self.tree.lower_bound(range.lo()).or_else(|| self.tree.head());
        while let Some(n) = cursor {
            let nr = self.tree.range(n);
            if nr.hi() < range.lo() {
                cursor = self.tree.next(n);
                continue;
            }
            if nr.lo() > range.hi() {
                break;
            }
            if nr.lo() < range.lo() {
                if nr.hi() > range.hi() {
                    // Erasing the middle of a strictly covering node:
                    // split, keeping the payload on both remnants.
                    let tail = Range::new(range.hi().successor(), nr.hi());
                    let payload = self.tree.payload(n).clone();
                    self.tree.set_max(n, range.lo().predecessor());
                    self.tree.insert_after(n, tail, payload);
                    break;
                }
                self.tree.set_max(n, range.lo().predecessor());
                cursor = self.tree.next(n);
            } else if nr.hi() <= range.hi() {
                cursor = self.tree.next(n);
                self.tree.remove(n);
            } else {
                self.tree.set_min(n, range.hi().successor());
                break;
            }
        }
        debug_assert!(self.tree.check_invariants());
    }
}

impl<M: Metric, P: Clone + PartialEq + Default> Space<M, P> {
    /// Blends `color` into every value of `range` through `blender`.
    ///
    /// For a mapped value the combinator receives its current payload;
    /// for an unmapped value it receives a default-constructed payload
    /// (the result of that one blend — the *plain color* — paints all
    /// unmapped subranges). A `false` return marks the blended payload
    /// transparent: the corresponding subrange ends up unmapped.
    ///
    /// An empty range is a no-op.
    ///
    /// # Examples
    ///
    /// ```
    /// use range_space_core::Range;
    /// use range_space_map::Space;
    ///
    /// let mut space: Space<u32, u8> = Space::new();
    /// space.mark(Range::new(10, 20), 3);
    /// space.blend(Range::new(15, 25), 5, |p, c| {
    ///     *p += c;
    ///     *p != 0
    /// });
    /// let got: Vec<_> = space.iter().map(|(r, &p)| (r.lo(), r.hi(), p)).collect();
    /// assert_eq!(got, vec![(10, 14, 3), (15, 20, 8), (21, 25, 5)]);
    /// ```
    pub fn blend<U, F>(&mut self, range: Range<M>, color: U, mut blender: F)
    where
        F: FnMut(&mut P, &U) -> bool,
    {
        if range.is_empty() {
            return;
        }
        trace!(range = %range, "blend");
        // The color unmapped values take, if they take one at all.
        let mut plain = P::default();
        let keep_plain = blender(&mut plain, &color);

        let mut remaining = range;
        let mut cursor = self.tree.lower_bound(range.lo()).or_else(|| self.tree.head());

        while !remaining.is_empty() {
            let Some(n) = cursor else { break };
            let nr = self.tree.range(n);
            if nr.hi() < remaining.lo() {
                cursor = self.tree.next(n);
                continue;
            }
            if nr.lo() > remaining.hi() {
                // No overlap left; the rest of the request is one unmapped
                // stretch bounded by n.
                if keep_plain {
                    self.paint_gap(Some(n), remaining, &plain);
                }
                remaining.clear();
                break;
            }

            // n overlaps the remaining region. If it extends left of it,
            // split off the part to keep and continue with the stub.
            let n = if nr.lo() < remaining.lo() {
                let stub = Range::new(remaining.lo(), nr.hi());
                let payload = self.tree.payload(n).clone();
                self.tree.set_max(n, remaining.lo().predecessor());
                self.tree.insert_after(n, stub, payload)
            } else {
                n
            };
            let nr = self.tree.range(n);

            // Unmapped gap on the left of n, inside the request.
            if keep_plain && remaining.lo() < nr.lo() {
                let gap = Range::new(remaining.lo(), nr.lo().predecessor());
                // Never pull n itself over the gap here: n's payload has
                // not been blended yet. Coalescing with it happens after.
                let pred = self.tree.prev(n).filter(|&p| {
                    self.tree.range(p).hi().successor() == gap.lo()
                        && *self.tree.payload(p) == plain
                });
                match pred {
                    Some(p) => self.tree.set_max(p, gap.hi()),
                    None => {
                        self.tree.insert_before(n, gap, plain.clone());
                    }
                }
            }

            // Blend the overlapping part of n.
            let right_extends = nr.hi() > remaining.hi();
            let split_hi = if right_extends { remaining.hi() } else { nr.hi() };
            let mut blended = self.tree.payload(n).clone();
            let keep = blender(&mut blended, &color);
            let next_n = self.tree.next(n);
            if split_hi == M::max_value() {
                remaining.clear();
            } else {
                remaining.assign_min(split_hi.successor());
            }

            if keep {
                if right_extends {
                    if blended == *self.tree.payload(n) {
                        // The blend is a fixpoint here; n already covers the
                        // region. A left split above may now be spurious.
                        self.coalesce_left(n);
                    } else {
                        self.tree.set_min(n, split_hi.successor());
                        let xi =
                            self.tree
                                .insert_before(n, Range::new(nr.lo(), split_hi), blended);
                        self.coalesce_left(xi);
                    }
                    break;
                }
                if blended != *self.tree.payload(n) {
                    self.tree.set_payload(n, blended);
                }
                let n = self.coalesce_left(n);
                if remaining.is_empty() {
                    // The right boundary is final; the successor was not
                    // part of the request.
                    self.coalesce_right(n);
                }
            } else if right_extends {
                self.tree.set_min(n, split_hi.successor());
                break;
            } else {
                self.tree.remove(n);
            }
            cursor = next_n;
        }

        if keep_plain && !remaining.is_empty() {
            // Past every stored range: one trailing unmapped stretch.
            self.paint_gap(None, remaining, &plain);
        }
        debug_assert!(self.tree.check_invariants());
    }

    /// Paints an unmapped `gap` with the plain color, coalescing into the
    /// neighbors where adjacency and payload allow. `bound` is the node
    /// just right of the gap, or `None` when the gap is past every node.
    fn paint_gap(&mut self, bound: Option<usize>, gap: Range<M>, plain: &P) {
        let pred = match bound {
            Some(n) => self.tree.prev(n),
            None => self.tree.tail(),
        };
        let pred = pred.filter(|&p| {
            self.tree.range(p).hi().successor() == gap.lo() && *self.tree.payload(p) == *plain
        });
        let succ = bound.filter(|&n| {
            gap.hi() < self.tree.range(n).lo()
                && gap.hi().successor() == self.tree.range(n).lo()
                && *self.tree.payload(n) == *plain
        });
        match (pred, succ) {
            (Some(p), Some(n)) => {
                // The gap bridges two plain-colored neighbors.
                let n_hi = self.tree.range(n).hi();
                self.tree.remove(n);
                self.tree.set_max(p, n_hi);
            }
            (Some(p), None) => self.tree.set_max(p, gap.hi()),
            (None, Some(n)) => self.tree.set_min(n, gap.lo()),
            (None, None) => {
                match bound {
                    Some(n) => {
                        self.tree.insert_before(n, gap, plain.clone());
                    }
                    None => {
                        self.tree.append(gap, plain.clone());
                    }
                };
            }
        }
    }

    /// Merges `index` with its predecessor if they are adjacent with equal
    /// payloads. Returns the surviving node.
    fn coalesce_left(&mut self, index: usize) -> usize {
        if let Some(p) = self.tree.prev(index) {
            let p_range = self.tree.range(p);
            if p_range.hi().successor() == self.tree.range(index).lo()
                && *self.tree.payload(p) == *self.tree.payload(index)
            {
                self.tree.remove(p);
                self.tree.set_min(index, p_range.lo());
            }
        }
        index
    }

    /// Merges `index` with its successor if they are adjacent with equal
    /// payloads. Returns the surviving node.
    fn coalesce_right(&mut self, index: usize) -> usize {
        if let Some(s) = self.tree.next(index) {
            let s_range = self.tree.range(s);
            if self.tree.range(index).hi().successor() == s_range.lo()
                && *self.tree.payload(index) == *self.tree.payload(s)
            {
                self.tree.remove(s);
                self.tree.set_max(index, s_range.hi());
            }
        }
        index
    }
}

impl<M: Metric, P> Default for Space<M, P> {
    fn default() -> Self {
        Self::new()
    }
}

/// Two spaces are equal when they map the same values to the same payloads;
/// canonical form makes that the same as having identical range lists.
impl<M: Metric, P: PartialEq> PartialEq for Space<M, P> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .zip(other.iter())
                .all(|((ra, pa), (rb, pb))| ra == rb && pa == pb)
    }
}

impl<M: Metric, P: Eq> Eq for Space<M, P> {}

impl<M: Metric, P: fmt::Debug> fmt::Debug for Space<M, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(r, p)| (format!("{r}"), p)))
            .finish()
    }
}

/// In-order iterator over a [`Space`], yielding each stored range with a
/// reference to its payload.
#[derive(Clone)]
pub struct Iter<'a, M, P> {
    tree: &'a Tree<M, P>,
    cursor: Option<usize>,
}

impl<'a, M: Metric, P> Iterator for Iter<'a, M, P> {
    type Item = (Range<M>, &'a P);

    fn next(&mut self) -> Option<Self::Item> {
        let i = self.cursor?;
        self.cursor = self.tree.next(i);
        Some((self.tree.range(i), self.tree.payload(i)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.tree.len()))
    }
}

impl<M: Metric, P> FusedIterator for Iter<'_, M, P> {}

impl<'a, M: Metric, P> IntoIterator for &'a Space<M, P> {
    type Item = (Range<M>, &'a P);
    type IntoIter = Iter<'a, M, P>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
