use tracing::debug;

use super::errors::{Error, ErrorImpl, ErrorKind};

/// Per-compilation diagnostic sink.
///
/// Accumulates up to `limit` records. The first report past the limit is
/// replaced by a single `ErrorLimitExceeded` record and everything after it
/// is dropped.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    records: Vec<Error>,
    limit: usize,
    saturated: bool,
}

impl Diagnostics {
    pub fn new(limit: usize) -> Self {
        Diagnostics {
            records: vec![],
            limit,
            saturated: false,
        }
    }

    pub fn report(&mut self, error: Error) {
        if self.saturated {
            return;
        }

        if self.records.len() >= self.limit {
            debug!(limit = self.limit, "diagnostic limit reached");
            let position = error.get_position().clone();
            let context = String::from(error.get_context());
            self.records.push(
                Error::new(ErrorImpl::ErrorLimitExceeded { limit: self.limit }, position)
                    .with_context(&context),
            );
            self.saturated = true;
            return;
        }

        debug!(error = %error, "diagnostic");
        self.records.push(error);
    }

    /// True once the limit record has been appended; the current pass stops.
    pub fn is_saturated(&self) -> bool {
        self.saturated
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn records(&self) -> &[Error] {
        &self.records
    }

    pub fn count_kind(&self, kind: ErrorKind) -> usize {
        self.records.iter().filter(|r| r.kind() == kind).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Error> {
        self.records.iter()
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Diagnostics::new(10)
    }
}
