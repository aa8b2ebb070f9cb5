//! Output feature list shared by concurrently running jobs.
//!
//! Jobs never hold the list while they compute. They hand over their whole
//! result in one [`RowSink::append_rows`] call, either directly (one short
//! exclusive section on the list) or through a [`FeatureListCollector`],
//! which moves row batches over a channel to a single thread that owns the
//! writes.
//!
//! ```text
//! ┌─────────┐   Vec<FeatureRow>   ┌──────────────────┐
//! │  Job 0  │ ──────────────────▶ │                  │
//! │  Job 1  │ ──────────────────▶ │ collector thread │ ──▶ FeatureList
//! │  Job N  │ ──────────────────▶ │                  │
//! └─────────┘   bounded channel   └──────────────────┘
//! ```

use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Sender};
use log::debug;
use uuid::Uuid;

use crate::series::FeatureRow;

/// Errors that can occur while publishing rows.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The collector is no longer receiving
    #[error("Feature list collector disconnected")]
    Disconnected,

    /// The collector thread could not be started
    #[error("Failed to spawn collector thread: {0}")]
    SpawnError(String),

    /// The collector thread panicked
    #[error("Feature list collector thread panicked")]
    ThreadPanicked,
}

/// Destination of the rows produced by a job.
pub trait RowSink: Send + Sync {
    /// Append all rows of one job in a single exclusive step.
    fn append_rows(&self, rows: Vec<FeatureRow>) -> Result<(), PublishError>;
}

/// Caller-owned collection of expanded feature rows.
#[derive(Debug)]
pub struct FeatureList {
    id: Uuid,
    name: String,
    rows: Mutex<Vec<FeatureRow>>,
}

impl FeatureList {
    /// Create an empty list.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            rows: Mutex::new(Vec::new()),
        }
    }

    /// Unique id of this list.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Display name of this list.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the list has no rows.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of the current rows, ordered by feature id.
    pub fn rows(&self) -> Vec<FeatureRow> {
        let mut rows = self.lock().clone();
        rows.sort_by_key(|r| r.feature_id);
        rows
    }

    /// Take the rows out of the list, ordered by feature id.
    pub fn into_rows(self) -> Vec<FeatureRow> {
        let mut rows = self.rows.into_inner().unwrap_or_else(PoisonError::into_inner);
        rows.sort_by_key(|r| r.feature_id);
        rows
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<FeatureRow>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RowSink for FeatureList {
    fn append_rows(&self, rows: Vec<FeatureRow>) -> Result<(), PublishError> {
        self.lock().extend(rows);
        Ok(())
    }
}

/// Background thread owning all writes to a [`FeatureList`].
pub struct FeatureListCollector {
    sender: Option<Sender<Vec<FeatureRow>>>,
    handle: Option<JoinHandle<usize>>,
    list: Arc<FeatureList>,
}

impl FeatureListCollector {
    /// Start collecting into `list`. At most `capacity` batches wait in the
    /// channel before senders block.
    pub fn spawn(list: Arc<FeatureList>, capacity: usize) -> Result<Self, PublishError> {
        let (sender, receiver) = bounded::<Vec<FeatureRow>>(capacity.max(1));
        let target = Arc::clone(&list);

        let handle = thread::Builder::new()
            .name("ims-expander-collector".to_string())
            .spawn(move || {
                let mut batches = 0;
                for rows in receiver {
                    // appending to an in-memory list cannot fail
                    let _ = target.append_rows(rows);
                    batches += 1;
                }
                batches
            })
            .map_err(|e| PublishError::SpawnError(e.to_string()))?;

        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
            list,
        })
    }

    /// A sink jobs can publish through. Each clone feeds the same collector.
    pub fn sender(&self) -> Result<RowSender, PublishError> {
        self.sender
            .as_ref()
            .map(|sender| RowSender {
                sender: sender.clone(),
            })
            .ok_or(PublishError::Disconnected)
    }

    /// Stop accepting rows, wait until every queued batch is appended, and
    /// return the list.
    ///
    /// All [`RowSender`]s must be dropped first, otherwise this blocks.
    pub fn finish(mut self) -> Result<Arc<FeatureList>, PublishError> {
        self.sender.take();
        let handle = self.handle.take().ok_or(PublishError::Disconnected)?;
        let batches = handle.join().map_err(|_| PublishError::ThreadPanicked)?;
        debug!("Collected {batches} row batches into {}", self.list.name());
        Ok(Arc::clone(&self.list))
    }
}

impl Drop for FeatureListCollector {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// [`RowSink`] handing rows to a [`FeatureListCollector`].
#[derive(Clone)]
pub struct RowSender {
    sender: Sender<Vec<FeatureRow>>,
}

impl RowSink for RowSender {
    fn append_rows(&self, rows: Vec<FeatureRow>) -> Result<(), PublishError> {
        self.sender
            .send(rows)
            .map_err(|_| PublishError::Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::{FeatureSummary, IonMobilogramTimeSeries, SummedMobilogram};
    use crate::source::{MobilityScanInfo, RawDataFileRef};
    use crate::trace::AcceptedPoint;

    fn row(feature_id: u64) -> FeatureRow {
        let point = |scan_number| AcceptedPoint {
            scan: MobilityScanInfo {
                frame_index: 0,
                retention_time: 1.0,
                scan_number,
                mobility: 1.0,
            },
            mz: 100.0,
            intensity: 1.0,
        };
        let series = IonMobilogramTimeSeries::from_points(vec![point(0), point(1)]).unwrap();
        FeatureRow {
            feature_id,
            raw_file: RawDataFileRef::new("run.d"),
            summary: FeatureSummary::from_series(&series),
            mobilogram: SummedMobilogram::default(),
            series,
        }
    }

    #[test]
    fn test_direct_append() {
        let list = FeatureList::new("expanded");
        list.append_rows(vec![row(3), row(1)]).unwrap();
        list.append_rows(vec![]).unwrap();
        assert_eq!(list.len(), 2);
        let ids: Vec<u64> = list.into_rows().iter().map(|r| r.feature_id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_collector_from_many_threads() {
        let list = Arc::new(FeatureList::new("expanded"));
        let collector = FeatureListCollector::spawn(Arc::clone(&list), 2).unwrap();

        thread::scope(|s| {
            for t in 0..4u64 {
                let sender = collector.sender().unwrap();
                s.spawn(move || {
                    sender.append_rows(vec![row(t * 10), row(t * 10 + 1)]).unwrap();
                });
            }
        });

        let list = collector.finish().unwrap();
        assert_eq!(list.len(), 8);
        assert_eq!(list.rows()[0].feature_id, 0);
    }

    #[test]
    fn test_sender_after_finish_disconnects() {
        let list = Arc::new(FeatureList::new("expanded"));
        let collector = FeatureListCollector::spawn(list, 1).unwrap();
        let sender = collector.sender().unwrap();
        drop(sender);
        let list = collector.finish().unwrap();
        assert!(list.is_empty());
    }
}
