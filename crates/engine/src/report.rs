//! The derived dashboard model recomputed on every change.

use serde::{Deserialize, Serialize};

use crate::{
    ChartPoint, DataItem, EngineError, Selection, Stats, StatusHistogram,
    stats::{chart_series, compute_stats, status_histogram},
    view::{available_months, compose},
};

/// Loading and error state of one mirror as seen by the dashboard.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceState {
    /// First snapshot or first error delivered.
    pub loaded: bool,
    pub error: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub selection: Selection,
    /// Composed, filtered and sorted records.
    pub items: Vec<DataItem>,
    /// Month selector options, over both mirrors.
    pub months: Vec<String>,
    pub stats: Stats,
    pub chart: Vec<ChartPoint>,
    pub statuses: StatusHistogram,
    pub travel: SourceState,
    pub business: SourceState,
}

impl Report {
    /// Computes the report over the current mirror contents.
    pub fn build(travel: &[DataItem], business: &[DataItem], selection: &Selection) -> Self {
        let items = compose(travel, business, selection.mode, &selection.month);
        Self {
            selection: selection.clone(),
            months: available_months(travel, business),
            stats: compute_stats(&items),
            chart: chart_series(&items),
            statuses: status_histogram(&items, selection.mode),
            items,
            travel: SourceState::default(),
            business: SourceState::default(),
        }
    }

    /// `true` once both mirrors delivered their first snapshot or error.
    pub fn is_loaded(&self) -> bool {
        self.travel.loaded && self.business.loaded
    }

    /// First mirror error to show as a banner, if any.
    pub fn banner(&self) -> Option<&str> {
        self.travel
            .error
            .as_deref()
            .or(self.business.error.as_deref())
    }
}

impl SourceState {
    pub fn new(loaded: bool, error: Option<&EngineError>) -> Self {
        Self {
            loaded,
            error: error.map(ToString::to_string),
        }
    }
}
