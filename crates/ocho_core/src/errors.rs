use thiserror::Error;

/// Resource faults. These are fatal: the driver is expected to stop the
/// machine and report the message. Decode faults are not errors; `step`
/// reports those through [`crate::StepOutcome::Unsupported`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("memory access out of range at {0:#06X}")]
    IllegalAddress(u16),
    #[error("call stack overflow (depth {0})")]
    StackOverflow(usize),
    #[error("return with an empty call stack")]
    StackUnderflow,
    #[error("program image is {size} bytes, only {max} bytes fit")]
    ProgramTooLarge { size: usize, max: usize },
}
