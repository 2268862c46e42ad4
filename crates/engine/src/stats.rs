//! Aggregations over a composed view.
//!
//! Everything here is a pure function of its inputs: no I/O, no state, safe
//! to recompute on every change.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{DataItem, GroupStatus, MoneyCents, ViewMode, money::margin_bps};

/// Maximum number of groups in the chart series.
pub const CHART_LIMIT: usize = 20;

/// Name used for chart groups with a blank destination or project name.
pub const UNKNOWN_LABEL: &str = "unknown";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub total_revenue: MoneyCents,
    pub total_expense: MoneyCents,
    pub total_profit: MoneyCents,
    /// Recruited people over travel records.
    pub total_pax: u64,
    /// Travel records with status confirmed.
    pub active_groups: usize,
    pub project_count: usize,
}

impl Stats {
    /// Average profit margin in basis points, 0 without revenue.
    pub fn margin_bps(&self) -> i64 {
        margin_bps(self.total_profit, self.total_revenue)
    }
}

pub fn compute_stats(items: &[DataItem]) -> Stats {
    let mut stats = Stats::default();
    for item in items {
        stats.total_revenue += item.revenue();
        stats.total_expense += item.expense();
        match item {
            DataItem::Travel(group) => {
                stats.total_pax += u64::from(group.recruit_count);
                if group.status == GroupStatus::Confirmed {
                    stats.active_groups += 1;
                }
            }
            DataItem::Business(_) => stats.project_count += 1,
        }
    }
    stats.total_profit = stats.total_revenue - stats.total_expense;
    stats
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub name: String,
    pub revenue: MoneyCents,
    pub profit: MoneyCents,
}

/// Revenue and profit per destination / project, highest revenue first.
///
/// Names are grouped verbatim; only blank names collapse into
/// [`UNKNOWN_LABEL`].
///
/// Groups with the same revenue keep the order in which they first appear in
/// `items`. At most [`CHART_LIMIT`] groups are returned.
pub fn chart_series(items: &[DataItem]) -> Vec<ChartPoint> {
    let mut points: Vec<ChartPoint> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for item in items {
        let name = match item.display_name() {
            name if name.trim().is_empty() => UNKNOWN_LABEL,
            name => name,
        };
        let slot = *index.entry(name.to_string()).or_insert_with(|| {
            points.push(ChartPoint {
                name: name.to_string(),
                revenue: MoneyCents::ZERO,
                profit: MoneyCents::ZERO,
            });
            points.len() - 1
        });
        points[slot].revenue += item.revenue();
        points[slot].profit += item.profit();
    }

    points.sort_by(|a, b| b.revenue.cmp(&a.revenue));
    points.truncate(CHART_LIMIT);
    points
}

/// Histogram bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusBucket {
    Waiting,
    Confirmed,
    Cancelled,
    Other,
}

impl StatusBucket {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Other => "other",
        }
    }
}

impl From<&GroupStatus> for StatusBucket {
    fn from(value: &GroupStatus) -> Self {
        match value {
            GroupStatus::Waiting => Self::Waiting,
            GroupStatus::Confirmed => Self::Confirmed,
            GroupStatus::Cancelled => Self::Cancelled,
            GroupStatus::Unrecognized(_) => Self::Other,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusHistogram {
    pub waiting: usize,
    pub confirmed: usize,
    pub cancelled: usize,
    pub other: usize,
}

impl StatusHistogram {
    /// Buckets to display: the three known statuses always, `Other` only when
    /// something landed in it.
    pub fn entries(&self) -> Vec<(StatusBucket, usize)> {
        let mut entries = vec![
            (StatusBucket::Waiting, self.waiting),
            (StatusBucket::Confirmed, self.confirmed),
            (StatusBucket::Cancelled, self.cancelled),
        ];
        if self.other > 0 {
            entries.push((StatusBucket::Other, self.other));
        }
        entries
    }

    pub fn total(&self) -> usize {
        self.waiting + self.confirmed + self.cancelled + self.other
    }
}

/// Counts travel records per status. All zero for [`ViewMode::BusinessOnly`].
pub fn status_histogram(items: &[DataItem], mode: ViewMode) -> StatusHistogram {
    let mut histogram = StatusHistogram::default();
    if mode == ViewMode::BusinessOnly {
        return histogram;
    }
    for group in items.iter().filter_map(DataItem::as_travel) {
        match StatusBucket::from(&group.status) {
            StatusBucket::Waiting => histogram.waiting += 1,
            StatusBucket::Confirmed => histogram.confirmed += 1,
            StatusBucket::Cancelled => histogram.cancelled += 1,
            StatusBucket::Other => histogram.other += 1,
        }
    }
    histogram
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BusinessProject, TravelGroup, store::DocumentId};

    fn travel(id: &str, destination: &str, revenue: i64, expense: i64, status: GroupStatus) -> DataItem {
        DataItem::Travel(TravelGroup {
            id: DocumentId::from(id),
            group_no: id.to_string(),
            date: "2024-03-01".to_string(),
            destination: destination.to_string(),
            person_in_charge: String::new(),
            status,
            recruit_count: 5,
            revenue: MoneyCents::from_units(revenue),
            expense: MoneyCents::from_units(expense),
            created_at: None,
            updated_at: None,
            creator_id: None,
        })
    }

    fn business(id: &str, name: &str, revenue: i64, expense: i64) -> DataItem {
        DataItem::Business(BusinessProject {
            id: DocumentId::from(id),
            project_name: name.to_string(),
            date: "2024-03-15".to_string(),
            person_in_charge: String::new(),
            revenue: MoneyCents::from_units(revenue),
            expense: MoneyCents::from_units(expense),
            created_at: None,
            updated_at: None,
            creator_id: None,
        })
    }

    #[test]
    fn stats_split_by_kind() {
        let items = [
            travel("a", "Kyoto", 1000, 400, GroupStatus::Confirmed),
            travel("c", "Osaka", 10, 20, GroupStatus::Waiting),
            business("b", "Expo", 2000, 500),
        ];
        let stats = compute_stats(&items);
        assert_eq!(stats.total_revenue, MoneyCents::from_units(3010));
        assert_eq!(stats.total_expense, MoneyCents::from_units(920));
        assert_eq!(stats.total_profit, MoneyCents::from_units(2090));
        assert_eq!(stats.total_pax, 10);
        assert_eq!(stats.active_groups, 1);
        assert_eq!(stats.project_count, 1);
    }

    #[test]
    fn empty_input_gives_zero_stats() {
        let stats = compute_stats(&[]);
        assert_eq!(stats, Stats::default());
        assert_eq!(stats.margin_bps(), 0);
    }

    #[test]
    fn chart_groups_and_ranks_by_revenue() {
        let items = [
            travel("a", "Kyoto", 100, 50, GroupStatus::Waiting),
            business("b", "Expo", 300, 400),
            travel("c", " ", 200, 0, GroupStatus::Waiting),
            travel("d", "Kyoto", 150, 0, GroupStatus::Waiting),
        ];
        let chart = chart_series(&items);
        let names: Vec<&str> = chart.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Expo", "Kyoto", "unknown"]);
        assert_eq!(chart[1].revenue, MoneyCents::from_units(250));
        assert_eq!(chart[1].profit, MoneyCents::from_units(200));
        assert_eq!(chart[0].profit, MoneyCents::from_units(-100));
    }

    #[test]
    fn chart_groups_names_verbatim() {
        let items = [
            travel("a", "Kyoto", 30, 0, GroupStatus::Waiting),
            travel("b", "Kyoto ", 20, 0, GroupStatus::Waiting),
            travel("c", "", 10, 0, GroupStatus::Waiting),
            travel("d", "  ", 5, 0, GroupStatus::Waiting),
        ];
        let chart = chart_series(&items);
        let names: Vec<&str> = chart.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Kyoto", "Kyoto ", "unknown"]);
        assert_eq!(chart[2].revenue, MoneyCents::from_units(15));
    }

    #[test]
    fn huge_amounts_saturate_instead_of_panicking() {
        let mut items = vec![
            travel("a", "Kyoto", 0, 0, GroupStatus::Confirmed),
            travel("b", "Kyoto", 0, 0, GroupStatus::Confirmed),
        ];
        for item in &mut items {
            if let DataItem::Travel(group) = item {
                group.revenue = MoneyCents::new(9_000_000_000_000_000_000);
                group.expense = MoneyCents::new(-9_000_000_000_000_000_000);
            }
        }

        let stats = compute_stats(&items);
        assert_eq!(stats.total_revenue, MoneyCents::new(i64::MAX));
        assert_eq!(stats.total_expense, MoneyCents::new(i64::MIN));
        assert_eq!(stats.total_profit, MoneyCents::new(i64::MAX));

        let chart = chart_series(&items);
        assert_eq!(chart[0].revenue, MoneyCents::new(i64::MAX));
        assert_eq!(chart[0].profit, MoneyCents::new(i64::MAX));
    }

    #[test]
    fn chart_keeps_top_twenty() {
        let items: Vec<DataItem> = (0..30)
            .map(|i| business(&format!("p{i}"), &format!("Project {i}"), i, 0))
            .collect();
        let chart = chart_series(&items);
        assert_eq!(chart.len(), CHART_LIMIT);
        assert_eq!(chart[0].name, "Project 29");
        assert_eq!(chart[19].name, "Project 10");
    }

    #[test]
    fn chart_ties_keep_first_appearance() {
        let items = [
            business("x", "Beta", 10, 0),
            business("y", "Alpha", 10, 0),
        ];
        let names: Vec<String> = chart_series(&items).into_iter().map(|p| p.name).collect();
        assert_eq!(names, ["Beta", "Alpha"]);
    }

    #[test]
    fn histogram_always_has_known_buckets() {
        let empty = status_histogram(&[], ViewMode::Total);
        let buckets: Vec<StatusBucket> = empty.entries().into_iter().map(|(b, _)| b).collect();
        assert_eq!(
            buckets,
            [StatusBucket::Waiting, StatusBucket::Confirmed, StatusBucket::Cancelled]
        );
        assert_eq!(empty.total(), 0);

        let items = [
            travel("a", "Kyoto", 0, 0, GroupStatus::Confirmed),
            travel("b", "Kyoto", 0, 0, GroupStatus::Unrecognized("postponed".to_string())),
            business("c", "Expo", 0, 0),
        ];
        let histogram = status_histogram(&items, ViewMode::Total);
        assert_eq!(histogram.confirmed, 1);
        assert_eq!(histogram.other, 1);
        assert_eq!(histogram.entries().len(), 4);
    }

    #[test]
    fn histogram_is_suppressed_for_business_view() {
        let items = [travel("a", "Kyoto", 0, 0, GroupStatus::Confirmed)];
        assert_eq!(
            status_histogram(&items, ViewMode::BusinessOnly),
            StatusHistogram::default()
        );
    }
}
