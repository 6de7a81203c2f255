//! Correlate a captured indirect-branch trace with one loaded binary image
//! and attach human-readable annotations at branch sites and targets.
//!
//! The trace records register snapshots taken immediately before and after
//! each indirect call/jump, tagged with the owning module and its
//! capture-time load base. Those bases rarely match the base the image is
//! analyzed at, so every traced address is rebased into the analysis address
//! space first. Each event is then validated against the image (does the
//! branch site really hold an indirect call/jmp?) and rendered into
//! annotation text: at the branch site a `dst:` line naming where the branch
//! went, at the target a `src:` line naming where it came from. Duplicated
//! events collapse into one fragment, and everything is written to the host
//! annotation store in a single commit at the end of the run.
//!
//! The embedding analysis platform is only reached through the [`ImageView`]
//! trait, so the engine runs against any host, or against a test double:
//!
//! ```rust, ignore
//! let mut view = MyPlatformView::new(/* ... */);
//! let summary = TraceAnnotator::new(&mut view)
//!     .annotate_trace_file(Some(Path::new("branches.json")))?;
//! log::info!("{} addresses annotated", summary.annotated_addresses);
//! ```

pub mod error;

mod aggregator;
mod classifier;
mod image_view;
mod translate;
mod vtable;

use std::path::Path;

use btlink_trace_reader::{BranchTrace, parse_trace};

use crate::{aggregator::AnnotationAggregator, classifier::BranchOutcome, error::AnnotatorError};
pub use crate::{aggregator::AnchorClass, image_view::ImageView, translate::rebase};

/// The one instruction-set family the classifier understands.
pub const SUPPORTED_ARCHITECTURE: &str = "x86_64";

/// What an annotation run did.
///
/// Returned by [`TraceAnnotator::annotate_trace_file`]; purely informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Events annotated at both the branch site and the target
    pub committed: usize,
    /// Events whose target lives in another module
    pub cross_module: usize,
    /// Events dropped by per-event validation
    pub skipped: usize,
    /// Distinct addresses written to the annotation store
    pub annotated_addresses: usize,
}

/// Driver for one annotation run over a host image.
pub struct TraceAnnotator<'a, V: ImageView> {
    view: &'a mut V,
}

impl<'a, V: ImageView> TraceAnnotator<'a, V> {
    /// Create an annotator over the given host image view.
    #[must_use]
    pub fn new(view: &'a mut V) -> Self {
        Self { view }
    }

    /// Run against the trace file at `trace_path`, typically the path the
    /// host UI obtained from the user (hence the [`Option`]).
    ///
    /// Parsing and classification share one failure scope: any fatal error
    /// aborts the run before the single commit, leaving the host annotation
    /// store untouched. Per-event validation failures only skip that event.
    pub fn annotate_trace_file(
        &mut self,
        trace_path: Option<&Path>,
    ) -> Result<RunSummary, AnnotatorError<V>> {
        self.ensure_supported_architecture()?;
        let trace_path = trace_path.ok_or(AnnotatorError::MissingInput)?;
        let text = std::fs::read_to_string(trace_path).map_err(AnnotatorError::ReadInput)?;
        let trace = parse_trace(&text)?;
        self.run(&trace)
    }

    /// Run against an already-parsed trace. Same failure scope as
    /// [`annotate_trace_file`][Self::annotate_trace_file].
    pub fn annotate_trace(&mut self, trace: &BranchTrace) -> Result<RunSummary, AnnotatorError<V>> {
        self.ensure_supported_architecture()?;
        self.run(trace)
    }

    fn ensure_supported_architecture(&self) -> Result<(), AnnotatorError<V>> {
        let architecture = self.view.architecture();
        if architecture == SUPPORTED_ARCHITECTURE {
            Ok(())
        } else {
            Err(AnnotatorError::UnsupportedArchitecture(
                architecture.to_owned(),
            ))
        }
    }

    fn run(&mut self, trace: &BranchTrace) -> Result<RunSummary, AnnotatorError<V>> {
        let mut aggregator = AnnotationAggregator::new();
        let mut committed = 0;
        let mut cross_module = 0;
        let mut skipped = 0;
        for event in &trace.branches {
            match classifier::classify_event(self.view, &trace.modules, &mut aggregator, event)? {
                BranchOutcome::Committed => committed += 1,
                BranchOutcome::CrossModule => cross_module += 1,
                BranchOutcome::Skipped(_) => skipped += 1,
            }
        }
        let annotated_addresses = aggregator
            .commit(self.view)
            .map_err(AnnotatorError::Image)?;
        log::debug!(
            "Annotation run finished: {committed} committed, {cross_module} cross-module, \
             {skipped} skipped, {annotated_addresses} addresses written"
        );

        Ok(RunSummary {
            committed,
            cross_module,
            skipped,
            annotated_addresses,
        })
    }
}
