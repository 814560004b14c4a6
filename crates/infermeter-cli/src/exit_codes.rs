#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// The run completed and a report was written, even if one target failed.
    Success = 0,

    /// Neither target produced a result (both unreachable, not ready or broken).
    NoTargetCompleted = 10,

    /// Invalid CLI/config/test data (bad flags, unreadable config, empty sample pool, etc.).
    InvalidInput = 30,

    /// Internal/runtime error (report write failure, client construction, etc.).
    RuntimeError = 40,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    #[must_use]
    pub fn from_completion(no_target_completed: bool) -> Self {
        if no_target_completed {
            Self::NoTargetCompleted
        } else {
            Self::Success
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_values_are_stable() {
        assert_eq!(ExitCode::Success.as_i32(), 0);
        assert_eq!(ExitCode::NoTargetCompleted.as_i32(), 10);
        assert_eq!(ExitCode::InvalidInput.as_i32(), 30);
        assert_eq!(ExitCode::RuntimeError.as_i32(), 40);
    }

    #[test]
    fn completion_maps_to_exit_code() {
        assert_eq!(ExitCode::from_completion(false), ExitCode::Success);
        assert_eq!(ExitCode::from_completion(true), ExitCode::NoTargetCompleted);
    }
}
