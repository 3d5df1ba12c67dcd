/// Public error taxonomy, stable across backends.
///
/// Every public entry point catches every internal fault and returns one of
/// these; no fault crosses the API boundary as anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ErrorCode {
    NoError = 0,
    GeneralError = -1,
    OutOfMemory = -2,
    UnidentifiedException = -3,
    UninitializedInstance = -4,
    OutOfRange = -5,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorCode::NoError => "no error",
            ErrorCode::GeneralError => "general error",
            ErrorCode::OutOfMemory => "out of memory",
            ErrorCode::UnidentifiedException => "unidentified exception",
            ErrorCode::UninitializedInstance => "uninitialized instance",
            ErrorCode::OutOfRange => "out of range",
        };
        f.write_str(s)
    }
}

impl std::error::Error for ErrorCode {}

/// Internal fault type, carrying context for logging, collapsed to an
/// [`ErrorCode`] at every public entry point.
#[derive(Debug, thiserror::Error)]
pub(crate) enum EngineError {
    #[error("allocation failed: {0}")]
    OutOfMemory(String),
    #[error("index {index} out of range [0, {bound}) for {what}")]
    OutOfRange {
        what: &'static str,
        index: i64,
        bound: usize,
    },
    #[error("unknown instance handle {0}")]
    UnknownInstance(crate::Handle),
    #[error("non-finite value encountered while {0}")]
    Numerical(String),
    #[error("no backend factory accepted instance parameters")]
    NoBackendAccepted,
    #[error("internal fault: {0}")]
    Internal(String),
}

impl From<&EngineError> for ErrorCode {
    fn from(err: &EngineError) -> Self {
        match err {
            EngineError::OutOfMemory(_) => ErrorCode::OutOfMemory,
            EngineError::OutOfRange { .. } => ErrorCode::OutOfRange,
            EngineError::UnknownInstance(_) => ErrorCode::UninitializedInstance,
            EngineError::Numerical(_) => ErrorCode::GeneralError,
            EngineError::NoBackendAccepted => ErrorCode::GeneralError,
            EngineError::Internal(_) => ErrorCode::UnidentifiedException,
        }
    }
}

pub(crate) type EngineResult<T> = Result<T, EngineError>;

/// Runs `body`, logging and translating any internal fault into the public
/// [`ErrorCode`] taxonomy. Index-out-of-range and unknown-instance faults
/// are immediate; numerical faults are still routed through here by
/// individual call sites that choose not to continue a partial schedule.
pub(crate) fn boundary<T>(body: impl FnOnce() -> EngineResult<T>) -> Result<T, ErrorCode> {
    match body() {
        Ok(value) => Ok(value),
        Err(err) => {
            log::warn!("{err}");
            Err(ErrorCode::from(&err))
        }
    }
}
