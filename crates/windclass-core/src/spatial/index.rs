//! Envelope index used to prune cell candidates before exact intersection.
//!
//! Entries are sorted by the minimum x of their bounding rectangle. A query
//! binary-searches the x window that could overlap and then checks the full
//! rectangles, which is enough for the few thousand cells of a reanalysis grid.

use geo::{BoundingRect, Polygon, Rect};

use crate::grid::CellId;

#[derive(Debug, Clone)]
pub struct EnvelopeIndex {
    entries: Vec<(Rect<f64>, CellId)>,
    /// Widest envelope in x; bounds how far left a match can start.
    max_width: f64,
}

impl EnvelopeIndex {
    /// Index the bounding rectangles of the given polygons. Empty polygons
    /// have no envelope and are skipped.
    pub fn build<'a, I>(polygons: I) -> Self
    where
        I: IntoIterator<Item = (CellId, &'a Polygon<f64>)>,
    {
        let mut entries: Vec<(Rect<f64>, CellId)> = polygons
            .into_iter()
            .filter_map(|(id, poly)| poly.bounding_rect().map(|r| (r, id)))
            .collect();
        entries.sort_by(|a, b| a.0.min().x.total_cmp(&b.0.min().x).then(a.1.cmp(&b.1)));
        let max_width = entries.iter().map(|(r, _)| r.width()).fold(0.0, f64::max);
        Self { entries, max_width }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids whose envelope touches `query`, in ascending id order.
    pub fn query(&self, query: &Rect<f64>) -> Vec<CellId> {
        let lo = query.min().x - self.max_width;
        let hi = query.max().x;
        let start = self.entries.partition_point(|(r, _)| r.min().x < lo);
        let end = self.entries.partition_point(|(r, _)| r.min().x <= hi);

        let mut hits: Vec<CellId> = self.entries[start..end.max(start)]
            .iter()
            .filter(|(r, _)| envelopes_touch(r, query))
            .map(|&(_, id)| id)
            .collect();
        hits.sort_unstable();
        hits
    }
}

fn envelopes_touch(a: &Rect<f64>, b: &Rect<f64>) -> bool {
    a.min().x <= b.max().x && b.min().x <= a.max().x && a.min().y <= b.max().y && b.min().y <= a.max().y
}
