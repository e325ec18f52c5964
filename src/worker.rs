use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use chrono::{DateTime, Local, TimeZone};
use log::{debug, error, info};
use crate::errors::CycleError;
use crate::manager_forecast::ForecastSource;
use crate::projection::{project, Bucket};
use crate::reconcile::PublishedLabels;
use crate::sink::Sink;
use crate::time_buckets::bucket;

/// Outcome of a successful poll cycle
#[derive(Debug)]
pub struct CycleReport {
    pub published: usize,
    pub retracted: Vec<Bucket>,
}

/// One fetch -> project -> reconcile -> publish pipeline
pub struct Pipeline<F: ForecastSource, S: Sink> {
    fetcher: F,
    sink: S,
    published: PublishedLabels<Bucket>,
}

impl<F: ForecastSource, S: Sink> Pipeline<F, S> {
    pub fn new(fetcher: F, sink: S) -> Pipeline<F, S> {
        Pipeline { fetcher, sink, published: PublishedLabels::new() }
    }

    /// Runs one cycle. On any error the previously published state is left as is.
    ///
    /// # Arguments
    ///
    /// * 'now' - the instant buckets are labeled relative to
    pub fn run_cycle<Tz: TimeZone>(&mut self, now: &DateTime<Tz>) -> Result<CycleReport, CycleError>
    where
        Tz::Offset: Display,
    {
        let snapshot = self.fetcher.fetch()?;
        let projections = project(&snapshot, |t| bucket(t, now));

        let buckets = projections.iter()
            .map(|p| p.bucket.clone())
            .collect::<Vec<Bucket>>();

        let stale = if self.sink.tracks_labels() {
            self.published.stale(&buckets)
        } else {
            Vec::new()
        };

        self.sink.publish(&projections, &stale)?;
        self.published.advance(buckets);

        Ok(CycleReport { published: projections.len(), retracted: stale })
    }
}

/// The poll loop, runs one cycle per interval until shutdown is requested.
/// Failed cycles are logged and the loop carries on with the next interval.
///
/// # Arguments
///
/// * 'pipeline' - the pipeline to drive
/// * 'interval' - time to sleep between cycles
/// * 'shutdown' - set to true to leave the loop
pub fn run<F: ForecastSource, S: Sink>(pipeline: &mut Pipeline<F, S>, interval: Duration, shutdown: &AtomicBool) {
    info!("polling forecast every {} seconds, publishing to {}", interval.as_secs(), pipeline.sink.name());

    while !shutdown.load(Ordering::SeqCst) {
        match pipeline.run_cycle(&Local::now()) {
            Ok(report) => {
                for b in &report.retracted {
                    debug!("retracted stale bucket {}", b);
                }
                info!("cycle done: {} buckets published, {} retracted, {} tracked",
                    report.published, report.retracted.len(), pipeline.published.labels().len());
            },
            Err(e) => error!("cycle failed, keeping previously published data: {}", e),
        }

        sleep(interval, shutdown);
    }

    info!("shutdown requested, leaving poll loop");
}

/// Sleeps for the given duration in steps of at most one second, returning early on shutdown
///
/// # Arguments
///
/// * 'duration' - total time to sleep
/// * 'shutdown' - shutdown flag
fn sleep(duration: Duration, shutdown: &AtomicBool) {
    let step = Duration::from_secs(1);
    let mut left = duration;

    while !left.is_zero() && !shutdown.load(Ordering::SeqCst) {
        let nap = left.min(step);
        thread::sleep(nap);
        left -= nap;
    }
}
