//! Per-image accumulation of refined boundaries and their reduction to a
//! single summary record.
//!
//! A [`Session`] is owned by whoever drives the workflow for one open
//! image. It grows by one entry per successful refinement, shrinks by its
//! newest entry on [`delete_last`](Session::delete_last), and is reduced
//! by [`finalize`](Session::finalize). Persisting the summary goes
//! through a [`SummarySink`]; the entries are only cleared once the sink
//! reports success, so a failed write can be retried.

use crate::config::AnalysisConfig;
use crate::edge::EdgeField;
use crate::features;
use crate::snake::{self, RefineReport};
use crate::types::{
    AnalysisError, Boundary, BoundaryIndex, Dimensions, FeatureTuple, ImageId, RefinedCurve,
    SummaryRecord,
};

/// Destination for finalized summary records.
pub trait SummarySink {
    /// Error reported when a record could not be stored.
    type Error;

    /// Store one record. On error nothing may have been stored.
    ///
    /// # Errors
    ///
    /// Implementation-defined.
    fn append(&mut self, record: &SummaryRecord) -> Result<(), Self::Error>;
}

impl SummarySink for Vec<SummaryRecord> {
    type Error = std::convert::Infallible;

    fn append(&mut self, record: &SummaryRecord) -> Result<(), Self::Error> {
        self.push(record.clone());
        Ok(())
    }
}

/// Why [`Session::finalize_into`] failed.
#[derive(Debug, thiserror::Error)]
pub enum FinalizeError<E> {
    /// The session could not be summarized.
    #[error(transparent)]
    Session(AnalysisError),

    /// The sink rejected the record.
    #[error("failed to store summary record: {0}")]
    Sink(E),
}

/// One recorded boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// Stable handle, never reused within the session.
    pub index: BoundaryIndex,
    /// The refined outline.
    pub curve: RefinedCurve,
    /// Features measured on `curve`, in physical units.
    pub features: FeatureTuple,
}

/// Result of [`Session::refine`].
#[derive(Debug, Clone, PartialEq)]
pub struct RefinedEntry {
    /// Handle of the newly recorded boundary.
    pub index: BoundaryIndex,
    /// The refined outline, now held by the session.
    pub curve: RefinedCurve,
    /// Features measured on `curve`, in physical units.
    pub features: FeatureTuple,
    /// How the snake iteration ended.
    pub report: RefineReport,
}

/// Refined boundaries collected for one open image.
#[derive(Debug, Clone)]
pub struct Session {
    image_id: ImageId,
    dimensions: Dimensions,
    entries: Vec<Entry>,
    next_index: usize,
}

impl Session {
    /// Start an empty session for the image `image_id` of extent
    /// `dimensions`.
    #[must_use]
    pub fn open(image_id: ImageId, dimensions: Dimensions) -> Self {
        log::info!("session opened for {image_id} ({dimensions})");
        Self {
            image_id,
            dimensions,
            entries: Vec::new(),
            next_index: 0,
        }
    }

    #[must_use]
    pub const fn image_id(&self) -> &ImageId {
        &self.image_id
    }

    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Number of recorded boundaries.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Recorded boundaries, oldest first.
    #[must_use]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Append a refined curve and its features.
    pub fn record(&mut self, features: FeatureTuple, curve: RefinedCurve) -> BoundaryIndex {
        let index = BoundaryIndex(self.next_index);
        self.next_index += 1;
        self.entries.push(Entry {
            index,
            curve,
            features,
        });
        log::debug!("recorded boundary {index}; session now holds {}", self.len());
        index
    }

    /// Refine `boundary`, measure the result, and record it.
    ///
    /// The session's dimensions are the image space the boundary was
    /// drawn in, so `field` must match them.
    ///
    /// # Errors
    ///
    /// Propagates [`snake::refine`] errors; nothing is recorded on error.
    pub fn refine(
        &mut self,
        boundary: &Boundary,
        field: &EdgeField,
        config: &AnalysisConfig,
    ) -> Result<RefinedEntry, AnalysisError> {
        let (curve, report) =
            snake::refine_with_report(boundary, field, self.dimensions, &config.snake)?;
        let features = features::extract(&curve, config.magnification);
        let index = self.record(features, curve.clone());
        Ok(RefinedEntry {
            index,
            curve,
            features,
            report,
        })
    }

    /// Remove the newest entry, returning its index.
    ///
    /// Returns `None` when there is nothing to delete.
    pub fn delete_last(&mut self) -> Option<BoundaryIndex> {
        let Some(entry) = self.entries.pop() else {
            log::info!("no boundaries to delete");
            return None;
        };
        log::debug!("deleted boundary {}", entry.index);
        Some(entry.index)
    }

    /// Reduce the recorded features to one summary record.
    ///
    /// Leaves the session untouched.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::EmptySession`] when nothing is recorded.
    pub fn finalize(&self) -> Result<SummaryRecord, AnalysisError> {
        let features: Vec<FeatureTuple> = self.entries.iter().map(|e| e.features).collect();
        summarize(self.image_id.clone(), &features)
    }

    /// Finalize and hand the record to `sink`, clearing the session only
    /// when the sink succeeds.
    ///
    /// # Errors
    ///
    /// [`FinalizeError::Session`] for an empty session,
    /// [`FinalizeError::Sink`] when the sink fails. The session keeps its
    /// entries in both cases.
    pub fn finalize_into<S: SummarySink>(
        &mut self,
        sink: &mut S,
    ) -> Result<SummaryRecord, FinalizeError<S::Error>> {
        let record = self.finalize().map_err(FinalizeError::Session)?;
        sink.append(&record).map_err(FinalizeError::Sink)?;
        log::info!(
            "finalized {} with {} boundaries",
            self.image_id,
            record.snake_refined_count
        );
        self.clear();
        Ok(record)
    }

    /// Drop every entry. Indices keep increasing afterwards.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// End the session, returning how many unfinalized entries were
    /// discarded.
    #[must_use = "unfinalized boundaries are lost; report the count"]
    pub fn close(self) -> usize {
        let discarded = self.entries.len();
        if discarded > 0 {
            log::warn!(
                "closing {} with {discarded} unfinalized boundaries",
                self.image_id
            );
        }
        discarded
    }
}

/// Mean, standard error of the mean, and maximum of one feature column.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ColumnStats {
    mean: f64,
    se: f64,
    max: f64,
}

#[allow(clippy::cast_precision_loss)]
fn column_stats(values: impl Iterator<Item = f64> + Clone) -> ColumnStats {
    let n = values.clone().count() as f64;
    let mean = values.clone().sum::<f64>() / n;
    let variance = values.clone().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    ColumnStats {
        mean,
        se: variance.sqrt() / n.sqrt(),
        max: values.fold(f64::NEG_INFINITY, f64::max),
    }
}

/// Reduce `features` to a summary record for `image_id`.
///
/// Standard error uses the population standard deviation divided by
/// `sqrt(n)`; the reduction does not depend on the order of `features`.
///
/// # Errors
///
/// Returns [`AnalysisError::EmptySession`] when `features` is empty.
pub fn summarize(
    image_id: ImageId,
    features: &[FeatureTuple],
) -> Result<SummaryRecord, AnalysisError> {
    if features.is_empty() {
        return Err(AnalysisError::EmptySession);
    }
    let area = column_stats(features.iter().map(|f| f.area));
    let perimeter = column_stats(features.iter().map(|f| f.perimeter));
    let radius = column_stats(features.iter().map(|f| f.radius));
    let smoothness = column_stats(features.iter().map(|f| f.smoothness));

    Ok(SummaryRecord {
        image_id,
        area_mean: area.mean,
        area_se: area.se,
        area_worst: area.max,
        perimeter_mean: perimeter.mean,
        perimeter_se: perimeter.se,
        perimeter_worst: perimeter.max,
        radius_mean: radius.mean,
        radius_se: radius.se,
        radius_worst: radius.max,
        smoothness_mean: smoothness.mean,
        smoothness_worst: smoothness.max,
        snake_refined_count: features.len(),
    })
}
