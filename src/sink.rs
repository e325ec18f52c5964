use crate::errors::SinkError;
use crate::projection::{Bucket, Projection};

/// A backend recording projected observations
pub trait Sink {
    fn name(&self) -> &'static str;

    /// Publishes one cycle of projections and retires the given stale buckets.
    /// Both must become visible together, a reader never observes half a cycle.
    ///
    /// # Arguments
    ///
    /// * 'projections' - everything projected this cycle
    /// * 'stale' - buckets published last cycle but absent now
    fn publish(&mut self, projections: &[Projection], stale: &[Bucket]) -> Result<(), SinkError>;

    /// Whether the sink keeps labeled series alive until explicitly retracted.
    /// Only such sinks need stale buckets reconciled.
    fn tracks_labels(&self) -> bool {
        false
    }
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn publish(&mut self, projections: &[Projection], stale: &[Bucket]) -> Result<(), SinkError> {
        (**self).publish(projections, stale)
    }

    fn tracks_labels(&self) -> bool {
        (**self).tracks_labels()
    }
}
