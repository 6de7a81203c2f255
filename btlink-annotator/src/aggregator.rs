//! Deduplicated accumulation of annotation text per image address.

use derive_more::Display;
use hashbrown::HashMap;

use crate::ImageView;

/// Where an annotation is anchored, relative to the branch it describes.
///
/// The rendering tag names the semantic role of the bucket *content*, which
/// is the opposite end of the branch: text anchored at a branch site
/// describes destinations, text anchored at a target describes sources.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnchorClass {
    /// Anchored at the branch site; the content describes the destination
    SourceAnchored,
    /// Anchored at the branch target; the content describes the source
    DestinationAnchored,
}

impl AnchorClass {
    /// Tag prefixed to a rendered bucket.
    fn render_tag(self) -> &'static str {
        match self {
            AnchorClass::SourceAnchored => "dst",
            AnchorClass::DestinationAnchored => "src",
        }
    }
}

/// Rendering order of the two classes when one address carries both.
const RENDER_ORDER: [AnchorClass; 2] =
    [AnchorClass::SourceAnchored, AnchorClass::DestinationAnchored];

/// Accumulates annotation fragments per `(address, class)` bucket and writes
/// them to the host store in a single final commit.
///
/// Each bucket is an insertion-ordered set: adding a fragment that is already
/// present is a no-op and does not reorder the bucket, so committed output is
/// deterministic for a given event order.
pub(crate) struct AnnotationAggregator {
    buckets: HashMap<(u64, AnchorClass), Vec<String>>,
    /// Addresses in the order they first received a fragment
    address_order: Vec<u64>,
}

impl AnnotationAggregator {
    pub(crate) fn new() -> Self {
        Self {
            buckets: HashMap::new(),
            address_order: Vec::new(),
        }
    }

    /// Insert `text` into the bucket for `(addr, class)`, unless already present.
    pub(crate) fn add(&mut self, addr: u64, class: AnchorClass, text: String) {
        let known_address = RENDER_ORDER
            .iter()
            .any(|class| self.buckets.contains_key(&(addr, *class)));
        if !known_address {
            self.address_order.push(addr);
        }
        let bucket = self.buckets.entry((addr, class)).or_default();
        if !bucket.contains(&text) {
            bucket.push(text);
        }
    }

    /// Write every non-empty bucket to the host annotation store.
    ///
    /// Each bucket renders as `"<tag>: "` followed by its fragments joined
    /// with `", "`. An address carrying both classes gets both lines, the
    /// source-anchored one first. Pre-existing host text at an address is kept
    /// and the new lines appended after a line break. Exactly one annotation
    /// read and one write happen per distinct address.
    ///
    /// Consumes the aggregator: commit happens once, at the end of a run.
    /// Returns the number of addresses written.
    pub(crate) fn commit<V: ImageView>(self, view: &mut V) -> Result<usize, V::Error> {
        let mut written = 0;
        for addr in self.address_order {
            let mut lines = Vec::new();
            for class in RENDER_ORDER {
                if let Some(bucket) = self.buckets.get(&(addr, class))
                    && !bucket.is_empty()
                {
                    lines.push(format!("{}: {}", class.render_tag(), bucket.join(", ")));
                }
            }
            if lines.is_empty() {
                continue;
            }
            let mut text = lines.join("\n");
            if let Some(existing) = view.annotation_at(addr)?
                && !existing.is_empty()
            {
                text = format!("{existing}\n{text}");
            }
            view.set_annotation(addr, &text)?;
            written += 1;
        }

        Ok(written)
    }
}
