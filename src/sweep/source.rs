use thiserror::Error;

/// Failure modes of the external capture source, split by what the driver
/// may safely do next.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The save dialog confirmation did not land; the save itself has not
    /// happened, so re-issuing the trigger is safe.
    #[error("save confirmation failed: {0}")]
    ConfirmationFailed(String),
    /// The action failed and the save may or may not have partially
    /// happened. Never retried; the item is skipped.
    #[error("source action failed: {0}")]
    ActionFailed(String),
    /// The source is gone entirely. Fatal for the run; whatever already
    /// landed on disk is still reconciled.
    #[error("capture source unreachable: {0}")]
    ConnectionLost(String),
}

/// The narrow boundary to the external viewer/device. Implementations own
/// all UI automation; the acquisition loop only ever asks for these two
/// irreversible actions and must bound its own patience elsewhere (the
/// directory watcher observes the effects).
pub trait CaptureSource {
    /// Make the source persist the current item under a name derived from
    /// `proposed_name` (the sequence number as a decimal string; the source
    /// appends whatever extension it likes).
    fn trigger_save(&mut self, proposed_name: &str) -> Result<(), SourceError>;

    /// Move the source to the next candidate item.
    fn advance_next(&mut self) -> Result<(), SourceError>;
}
