use anyhow::Result;

use crate::daemon::collection::TrackedSample;

/// Represents an event processor. This should realistically be able to abstract over different
/// options: local storage, remote server saving.
pub trait EventProcessor {
    fn process_next(
        &mut self,
        message: TrackedSample,
    ) -> impl std::future::Future<Output = Result<()>>;

    fn finalize(&mut self) -> impl std::future::Future<Output = Result<()>>;
}
