use thiserror::Error;

/// Failure to turn a trace document into a [`BranchTrace`][crate::BranchTrace].
///
/// Any of these means the whole document is rejected; the reader never
/// produces a partial module table or event list.
#[derive(Error, Debug)]
pub enum TraceError {
    /// Not valid JSON, or a required field is absent
    #[error("Invalid trace document")]
    Document(#[from] serde_json::Error),
    /// Module base address is not a hexadecimal string
    #[error("Module {module} has non-hexadecimal base address {value:?}")]
    InvalidModuleBase { module: String, value: String },
    /// The same module name occurs twice in the module table
    #[error("Module {0} appears more than once in the module table")]
    DuplicateModule(String),
    /// Register value is not a hexadecimal string
    #[error("Register {register} holds non-hexadecimal value {value:?}")]
    InvalidRegisterValue { register: String, value: String },
    /// A mandatory register is absent from a captured snapshot
    #[error("Register {0} is missing from a captured snapshot")]
    MissingRegister(&'static str),
}

pub(crate) type ReaderResult<T> = core::result::Result<T, TraceError>;
