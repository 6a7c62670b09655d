#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// The run completed. Individual operation failures do not change this.
    Success = 0,

    /// The backend could not be prepared (unreadable profiles file, no profile of the backend's
    /// kind, workload construction failed).
    SetupError = 20,

    /// Invalid CLI/config input (bad flags, unreadable test definition, unknown operation, etc.).
    InvalidInput = 30,

    /// Internal/runtime error (IO errors, unexpected invariants).
    RuntimeError = 40,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}
