//! Per-event classification of captured branch events.

use btlink_trace_reader::{BranchEvent, ModuleTable};
use derive_more::Display;

use crate::{
    ImageView,
    aggregator::{AnchorClass, AnnotationAggregator},
    error::{AnnotatorError, AnnotatorResult},
    translate::rebase,
    vtable,
};

/// Terminal state of one classified event.
#[derive(Debug, Clone, Copy)]
pub(crate) enum BranchOutcome {
    /// Annotations registered at both the branch site and the target
    Committed,
    /// The target lives in another module; one source-side annotation only
    CrossModule,
    /// Event dropped with a diagnostic logged
    Skipped(SkipReason),
}

/// Why a same-module event was dropped.
#[derive(Debug, Display, Clone, Copy)]
pub(crate) enum SkipReason {
    /// No instruction decodes at the computed branch-site address
    #[display("unresolvable instruction")]
    UnresolvableInstruction,
    /// The branch site does not hold a call/jmp
    #[display("not an indirect branch")]
    NonIndirectInstruction,
}

/// Default prefix the analysis platform gives to functions it could not name.
const PLACEHOLDER_NAME_PREFIX: &str = "sub";

/// Filter out platform placeholder names: only user- or symbol-derived names
/// are worth repeating in annotation text.
fn resolvable(name: String) -> Option<String> {
    (!name.starts_with(PLACEHOLDER_NAME_PREFIX)).then_some(name)
}

/// Leading-mnemonic check, case-insensitive prefix match.
fn is_branch_mnemonic(disassembly: &str) -> bool {
    ["call", "jmp"].iter().any(|mnemonic| {
        disassembly
            .get(..mnemonic.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(mnemonic))
    })
}

/// Classify one event and register its annotations in `aggregator`.
///
/// The trace is untrusted input: a site that no longer decodes, or whose
/// instruction is not an indirect call/jmp, only skips this event, so stale
/// or unmapped entries never poison sibling events. A module name missing
/// from the table is fatal for the whole run, as is any host error.
pub(crate) fn classify_event<V: ImageView>(
    view: &mut V,
    modules: &ModuleTable,
    aggregator: &mut AnnotationAggregator,
    event: &BranchEvent,
) -> AnnotatorResult<BranchOutcome, V> {
    let before = &event.before;
    let after = &event.after;
    let before_base = modules
        .base_of(&before.module)
        .ok_or_else(|| AnnotatorError::UnknownModule(before.module.clone()))?;
    let after_base = modules
        .base_of(&after.module)
        .ok_or_else(|| AnnotatorError::UnknownModule(after.module.clone()))?;

    let image_base = view.image_base();
    let src_addr = rebase(before.registers.pc(), before_base, image_base);

    if before.module != after.module {
        // Nothing about the foreign module's code is available locally, so
        // the capture-time labels are all we can anchor at the branch site.
        aggregator.add(
            src_addr,
            AnchorClass::SourceAnchored,
            format!("<{}>.{}", after.module, after.func),
        );
        return Ok(BranchOutcome::CrossModule);
    }

    let Some(disassembly) = view.disassembly_at(src_addr).map_err(AnnotatorError::Image)? else {
        log::warn!("Cannot get instruction at {src_addr:#x}, event skipped");
        return Ok(BranchOutcome::Skipped(SkipReason::UnresolvableInstruction));
    };
    if !is_branch_mnemonic(&disassembly) {
        log::warn!("{disassembly} at {src_addr:#x} is not an indirect branch, event skipped");
        return Ok(BranchOutcome::Skipped(SkipReason::NonIndirectInstruction));
    }

    let dst_addr = rebase(after.registers.pc(), after_base, image_base);

    let mut source_text = format!("{dst_addr:#x}");
    if let Some(name) = view
        .function_at(dst_addr)
        .map_err(AnnotatorError::Image)?
        .and_then(resolvable)
    {
        source_text.push_str(&format!("({name})"));
    }
    if let Some(fragment) =
        vtable::evidence(view, before, before_base, src_addr).map_err(AnnotatorError::Image)?
    {
        source_text.push_str(&fragment);
    }
    aggregator.add(src_addr, AnchorClass::SourceAnchored, source_text);

    let mut destination_text = format!("{src_addr:#x}");
    if let Some(name) = view
        .functions_containing(src_addr)
        .map_err(AnnotatorError::Image)?
        .into_iter()
        .next()
        .and_then(resolvable)
    {
        destination_text.push_str(&format!("({name})"));
    }
    aggregator.add(dst_addr, AnchorClass::DestinationAnchored, destination_text);

    Ok(BranchOutcome::Committed)
}
