use thiserror::Error;

/// Every problem found while validating one payload.
#[derive(Error, Debug, Clone, Default, PartialEq, Eq)]
#[error("validation failed: {}", .problems.join("; "))]
pub struct ValidationError {
    pub problems: Vec<String>,
}

impl ValidationError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(problem: impl Into<String>) -> Self {
        ValidationError {
            problems: vec![problem.into()],
        }
    }

    pub fn push(&mut self, problem: impl Into<String>) {
        self.problems.push(problem.into());
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.problems.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}
