//! Reader for captured indirect-branch trace documents.
//!
//! A trace document is a JSON file produced by an external capture tool. It
//! records the load base of every module that was mapped at capture time, and
//! an ordered list of branch events, each holding the register state
//! immediately before and immediately after one observed indirect transfer:
//!
//! ```json
//! {
//!   "modules": [ { "name": "main", "addr": "0x100000000" } ],
//!   "branches": [
//!     {
//!       "before": { "module": "main", "func": "caller",
//!                   "registers": { "rip": "0x100000180", "rax": "0x100000800" } },
//!       "after":  { "module": "main", "func": "callee",
//!                   "registers": { "rip": "0x100000200" } }
//!     }
//!   ]
//! }
//! ```
//!
//! All addresses and register values are hexadecimal strings. The `rip`
//! register is mandatory in every snapshot; other registers are optional.
//! Parsing is atomic: any malformed field rejects the whole document.

pub mod error;

use hashbrown::HashMap;
use serde::Deserialize;

pub use crate::error::TraceError;
use crate::error::ReaderResult;

/// Register holding the program counter. Required in every snapshot.
pub const PC_REGISTER: &str = "rip";

#[derive(Deserialize)]
struct RawTraceDocument {
    modules: Vec<RawModule>,
    branches: Vec<RawBranchEvent>,
}

#[derive(Deserialize)]
struct RawModule {
    name: String,
    addr: String,
}

#[derive(Deserialize)]
struct RawBranchEvent {
    before: RawEndpoint,
    after: RawEndpoint,
}

#[derive(Deserialize)]
struct RawEndpoint {
    module: String,
    func: String,
    registers: std::collections::HashMap<String, String>,
}

/// Module load bases as recorded at capture time, keyed by module name.
///
/// The module name is the unique key of the table.
#[derive(Debug, Clone)]
pub struct ModuleTable {
    bases: HashMap<String, u64>,
}

impl ModuleTable {
    /// Capture-time load base of `module`, if the module is in the table.
    #[must_use]
    pub fn base_of(&self, module: &str) -> Option<u64> {
        self.bases.get(module).copied()
    }

    /// Number of modules in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bases.len()
    }

    /// Whether the table holds no modules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    /// Iterate over `(name, base)` pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.bases.iter().map(|(name, base)| (name.as_str(), *base))
    }
}

/// Register values captured at one program point.
#[derive(Debug, Clone)]
pub struct RegisterSnapshot {
    /// Program counter, extracted from `values` at parse time
    pc: u64,
    values: HashMap<String, u64>,
}

impl RegisterSnapshot {
    /// The captured program counter.
    #[must_use]
    pub fn pc(&self) -> u64 {
        self.pc
    }

    /// Value of `register` at the capture point, if it was recorded.
    #[must_use]
    pub fn get(&self, register: &str) -> Option<u64> {
        self.values.get(register).copied()
    }
}

/// One side of a branch event: where execution was (or arrived) and the
/// register state captured there.
///
/// `func` is the capture tool's descriptive label for the surrounding
/// function. It is never used for address resolution.
#[derive(Debug, Clone)]
pub struct BranchEndpoint {
    pub module: String,
    pub func: String,
    pub registers: RegisterSnapshot,
}

/// One observed indirect transfer: the state just before the branch executed
/// and the state just after it landed.
#[derive(Debug, Clone)]
pub struct BranchEvent {
    pub before: BranchEndpoint,
    pub after: BranchEndpoint,
}

/// A fully parsed trace: the module table and the ordered event list.
///
/// Both are immutable once built.
#[derive(Debug, Clone)]
pub struct BranchTrace {
    pub modules: ModuleTable,
    pub branches: Vec<BranchEvent>,
}

/// Parse a trace document.
///
/// Fails atomically: an invalid document, a missing required field, a
/// non-hexadecimal address or register value, a duplicated module name, or a
/// snapshot without `rip` all reject the whole document.
pub fn parse_trace(text: &str) -> ReaderResult<BranchTrace> {
    let raw: RawTraceDocument = serde_json::from_str(text)?;

    let mut bases = HashMap::with_capacity(raw.modules.len());
    for module in raw.modules {
        let base = parse_hex(&module.addr).ok_or_else(|| TraceError::InvalidModuleBase {
            module: module.name.clone(),
            value: module.addr.clone(),
        })?;
        if bases.insert(module.name.clone(), base).is_some() {
            return Err(TraceError::DuplicateModule(module.name));
        }
    }

    let branches = raw
        .branches
        .into_iter()
        .map(convert_event)
        .collect::<ReaderResult<Vec<_>>>()?;

    log::debug!(
        "Parsed trace document: {} modules, {} branch events",
        bases.len(),
        branches.len()
    );

    Ok(BranchTrace {
        modules: ModuleTable { bases },
        branches,
    })
}

fn convert_event(raw: RawBranchEvent) -> ReaderResult<BranchEvent> {
    Ok(BranchEvent {
        before: convert_endpoint(raw.before)?,
        after: convert_endpoint(raw.after)?,
    })
}

fn convert_endpoint(raw: RawEndpoint) -> ReaderResult<BranchEndpoint> {
    let mut values = HashMap::with_capacity(raw.registers.len());
    for (register, value) in raw.registers {
        let parsed = parse_hex(&value).ok_or_else(|| TraceError::InvalidRegisterValue {
            register: register.clone(),
            value,
        })?;
        values.insert(register, parsed);
    }
    let pc = values
        .get(PC_REGISTER)
        .copied()
        .ok_or(TraceError::MissingRegister(PC_REGISTER))?;

    Ok(BranchEndpoint {
        module: raw.module,
        func: raw.func,
        registers: RegisterSnapshot { pc, values },
    })
}

/// Parse a hexadecimal string, with or without a leading `0x`.
fn parse_hex(text: &str) -> Option<u64> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u64::from_str_radix(digits, 16).ok()
}
