//! Best-effort detection of vtable-style dispatch behind an indirect branch.

use btlink_trace_reader::BranchEndpoint;

use crate::{ImageView, translate::rebase};

/// Look for evidence that the indirect branch at `src_addr` dispatches
/// through a table of function pointers: a register-indirect memory operand
/// whose base register held the address of a named symbol at capture time.
///
/// Returns the fragment to append to the source-anchored text, or [`None`]
/// when any step of the heuristic does not apply. Failing to find evidence is
/// always silent; only host errors propagate.
pub(crate) fn evidence<V: ImageView>(
    view: &mut V,
    before: &BranchEndpoint,
    module_base: u64,
    src_addr: u64,
) -> Result<Option<String>, V::Error> {
    let tokens = view.first_operand_tokens_at(src_addr)?;
    let Some(displacement) = memory_displacement(&tokens) else {
        return Ok(None);
    };
    // First displacement token is the base register, e.g. `rax` in [rax+0x10]
    let Some(register) = displacement.first() else {
        return Ok(None);
    };
    let Some(captured) = before.registers.get(register) else {
        return Ok(None);
    };
    let table_addr = rebase(captured, module_base, view.image_base());
    let Some(symbol) = view.symbol_at(table_addr)? else {
        return Ok(None);
    };

    Ok(Some(format!(" (vt:{table_addr:#x}({symbol}))")))
}

/// Token subsequence between the first `[` and its matching `]`, exclusive.
///
/// Brackets are assumed not to nest. An unclosed `[` yields everything after
/// it.
fn memory_displacement(tokens: &[String]) -> Option<&[String]> {
    let open = tokens.iter().position(|token| token == "[")?;
    let rest = &tokens[open + 1..];
    let close = rest
        .iter()
        .position(|token| token == "]")
        .unwrap_or(rest.len());
    Some(&rest[..close])
}

#[cfg(test)]
mod tests {
    use super::memory_displacement;

    fn tokens(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|text| (*text).to_owned()).collect()
    }

    #[test]
    fn test_displacement_between_brackets() {
        let tokens = tokens(&["[", "rax", "+", "0x10", "]"]);
        let displacement = memory_displacement(&tokens).unwrap();
        assert_eq!(displacement, &tokens[1..4]);
    }

    #[test]
    fn test_displacement_skips_leading_tokens() {
        let tokens = tokens(&["qword", "[", "rcx", "]"]);
        let displacement = memory_displacement(&tokens).unwrap();
        assert_eq!(displacement, &tokens[2..3]);
    }

    #[test]
    fn test_no_brackets_means_no_displacement() {
        assert!(memory_displacement(&tokens(&["rax"])).is_none());
        assert!(memory_displacement(&tokens(&[])).is_none());
    }

    #[test]
    fn test_unclosed_bracket_takes_rest() {
        let tokens = tokens(&["[", "rdx", "+", "8"]);
        let displacement = memory_displacement(&tokens).unwrap();
        assert_eq!(displacement, &tokens[1..]);
    }

    #[test]
    fn test_empty_displacement_is_empty_slice() {
        let tokens = tokens(&["[", "]"]);
        let displacement = memory_displacement(&tokens).unwrap();
        assert!(displacement.is_empty());
    }
}
