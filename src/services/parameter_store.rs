use crate::error::ParameterError;
use crate::models::TransformParameters;

/// Holds the latest valid parameter snapshot.
///
/// Every accepted mutation replaces the snapshot; a rejected one leaves it
/// untouched. Snapshots handed out earlier (e.g. inside an in-flight request)
/// are never affected.
#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
    current: TransformParameters,
}

impl ParameterStore {
    pub fn new(initial: TransformParameters) -> Self {
        Self { current: initial }
    }

    /// Latest valid snapshot
    pub fn snapshot(&self) -> TransformParameters {
        self.current
    }

    /// Returns `Ok(true)` when the stored value actually changed.
    pub fn set_color_count(&mut self, colors: i64) -> Result<bool, ParameterError> {
        let next = self.current.with_colors(colors)?;
        Ok(self.replace(next))
    }

    /// Returns `Ok(true)` when the stored value actually changed.
    pub fn set_print_size(&mut self, size: i64) -> Result<bool, ParameterError> {
        let next = self.current.with_size(size)?;
        Ok(self.replace(next))
    }

    fn replace(&mut self, next: TransformParameters) -> bool {
        if next == self.current {
            return false;
        }
        tracing::debug!(from = %self.current, to = %next, "Parameters changed");
        self.current = next;
        true
    }
}
