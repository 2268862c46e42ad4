//! Typed records and the normalizer that builds them from raw documents.
//!
//! A [`DataItem`] is either a [`TravelGroup`] or a [`BusinessProject`]. Fields
//! that only exist for one kind are reachable only after matching on the
//! variant.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    MoneyCents,
    store::{Document, DocumentId, Fields},
};

/// Discriminant of the two record collections.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Travel,
    Business,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Travel => "travel",
            Self::Business => "business",
        }
    }
}

/// Lifecycle of a travel group.
///
/// Values written by other clients that match none of the known statuses are
/// kept verbatim in [`GroupStatus::Unrecognized`] so they can be counted
/// separately.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GroupStatus {
    #[default]
    Waiting,
    Confirmed,
    Cancelled,
    Unrecognized(String),
}

impl GroupStatus {
    /// Parses a stored status. Accepts the canonical names (any case) and the
    /// Chinese labels stored in the collection (`等待`, `成团`, `取消`).
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_lowercase().as_str() {
            "" | "waiting" | "等待" => Self::Waiting,
            "confirmed" | "成团" => Self::Confirmed,
            "cancelled" | "canceled" | "取消" => Self::Cancelled,
            _ => Self::Unrecognized(trimmed.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Waiting => "waiting",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Unrecognized(raw) => raw,
        }
    }

    /// Label written to the store, shared with the other clients of the
    /// collection. Unrecognized values are written back verbatim.
    pub fn stored_label(&self) -> &str {
        match self {
            Self::Waiting => "等待",
            Self::Confirmed => "成团",
            Self::Cancelled => "取消",
            Self::Unrecognized(raw) => raw,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized(_))
    }
}

impl From<String> for GroupStatus {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<GroupStatus> for String {
    fn from(value: GroupStatus) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TravelGroup {
    pub id: DocumentId,
    pub group_no: String,
    pub date: String,
    pub destination: String,
    pub person_in_charge: String,
    pub status: GroupStatus,
    pub recruit_count: u32,
    pub revenue: MoneyCents,
    pub expense: MoneyCents,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub creator_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessProject {
    pub id: DocumentId,
    pub project_name: String,
    pub date: String,
    pub person_in_charge: String,
    pub revenue: MoneyCents,
    pub expense: MoneyCents,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub creator_id: Option<String>,
}

/// A mirrored record of either kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataItem {
    Travel(TravelGroup),
    Business(BusinessProject),
}

impl DataItem {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Travel(_) => EntityKind::Travel,
            Self::Business(_) => EntityKind::Business,
        }
    }

    pub fn id(&self) -> &DocumentId {
        match self {
            Self::Travel(group) => &group.id,
            Self::Business(project) => &project.id,
        }
    }

    pub fn date(&self) -> &str {
        match self {
            Self::Travel(group) => &group.date,
            Self::Business(project) => &project.date,
        }
    }

    pub fn person_in_charge(&self) -> &str {
        match self {
            Self::Travel(group) => &group.person_in_charge,
            Self::Business(project) => &project.person_in_charge,
        }
    }

    pub fn revenue(&self) -> MoneyCents {
        match self {
            Self::Travel(group) => group.revenue,
            Self::Business(project) => project.revenue,
        }
    }

    pub fn expense(&self) -> MoneyCents {
        match self {
            Self::Travel(group) => group.expense,
            Self::Business(project) => project.expense,
        }
    }

    pub fn profit(&self) -> MoneyCents {
        self.revenue() - self.expense()
    }

    pub fn created_at(&self) -> Option<&str> {
        match self {
            Self::Travel(group) => group.created_at.as_deref(),
            Self::Business(project) => project.created_at.as_deref(),
        }
    }

    /// Label used to group records in charts: destination or project name.
    pub fn display_name(&self) -> &str {
        match self {
            Self::Travel(group) => &group.destination,
            Self::Business(project) => &project.project_name,
        }
    }

    pub fn as_travel(&self) -> Option<&TravelGroup> {
        match self {
            Self::Travel(group) => Some(group),
            Self::Business(_) => None,
        }
    }

    pub fn as_business(&self) -> Option<&BusinessProject> {
        match self {
            Self::Business(project) => Some(project),
            Self::Travel(_) => None,
        }
    }
}

/// Converts a raw document into a typed record of `kind`.
///
/// Never fails: absent or malformed values fall back to their defaults
/// (empty text, zero amounts and counts, [`GroupStatus::Waiting`]).
pub fn normalize(document: &Document, kind: EntityKind) -> DataItem {
    let fields = &document.fields;
    let id = document.id.clone();
    match kind {
        EntityKind::Travel => DataItem::Travel(TravelGroup {
            id,
            group_no: text(fields, "groupNo"),
            date: text(fields, "date"),
            destination: text(fields, "destination"),
            person_in_charge: text(fields, "personInCharge"),
            status: status(fields, "status"),
            recruit_count: count(fields, "recruitCount"),
            revenue: money(fields, "revenue"),
            expense: money(fields, "expense"),
            created_at: optional_text(fields, "createdAt"),
            updated_at: optional_text(fields, "updatedAt"),
            creator_id: optional_text(fields, "creatorId"),
        }),
        EntityKind::Business => DataItem::Business(BusinessProject {
            id,
            project_name: text(fields, "projectName"),
            date: text(fields, "date"),
            person_in_charge: text(fields, "personInCharge"),
            revenue: money(fields, "revenue"),
            expense: money(fields, "expense"),
            created_at: optional_text(fields, "createdAt"),
            updated_at: optional_text(fields, "updatedAt"),
            creator_id: optional_text(fields, "creatorId"),
        }),
    }
}

fn text(fields: &Fields, key: &str) -> String {
    match fields.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn optional_text(fields: &Fields, key: &str) -> Option<String> {
    Some(text(fields, key)).filter(|s| !s.is_empty())
}

fn status(fields: &Fields, key: &str) -> GroupStatus {
    match fields.get(key) {
        None | Some(Value::Null) => GroupStatus::Waiting,
        Some(Value::String(s)) => GroupStatus::parse(s),
        Some(other) => GroupStatus::Unrecognized(other.to_string()),
    }
}

fn money(fields: &Fields, key: &str) -> MoneyCents {
    let parsed = match fields.get(key) {
        Some(Value::Number(n)) => {
            if let Some(units) = n.as_i64() {
                units.checked_mul(100).map(MoneyCents::new)
            } else {
                n.to_string()
                    .parse::<MoneyCents>()
                    .ok()
                    .or_else(|| n.as_f64().and_then(MoneyCents::from_f64_rounded))
            }
        }
        Some(Value::String(s)) => s.parse::<MoneyCents>().ok().or_else(|| {
            s.trim()
                .parse::<f64>()
                .ok()
                .and_then(MoneyCents::from_f64_rounded)
        }),
        _ => None,
    };
    parsed.unwrap_or(MoneyCents::ZERO)
}

fn count(fields: &Fields, key: &str) -> u32 {
    let value = match fields.get(key) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match value {
        Some(v) if v.is_finite() && v > 0.0 => v.trunc().min(f64::from(u32::MAX)) as u32,
        _ => 0,
    }
}

/// Parses a record date into a point in time.
///
/// Accepts plain calendar dates, RFC 3339 timestamps and naive date-times.
/// Returns `None` for anything else.
pub fn parse_date(date: &str) -> Option<NaiveDateTime> {
    let trimmed = date.trim();
    if let Ok(day) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return day.and_hms_opt(0, 0, 0);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(ts.naive_utc());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
}

/// Orders two dates newest first. Unparseable dates count as the oldest.
pub fn cmp_date_desc(a: &str, b: &str) -> Ordering {
    parse_date(b).cmp(&parse_date(a))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn doc(id: &str, value: serde_json::Value) -> Document {
        Document::new(id, value.as_object().cloned().unwrap_or_default())
    }

    #[test]
    fn travel_document_is_fully_typed() {
        let item = normalize(
            &doc(
                "g1",
                json!({
                    "groupNo": "TG-2024001",
                    "date": "2024-03-01",
                    "destination": "Kyoto",
                    "personInCharge": "Lin",
                    "status": "成团",
                    "recruitCount": 5,
                    "revenue": 1000,
                    "expense": 400.5,
                    "createdAt": "2024-02-01T08:00:00.000Z",
                    "creatorId": "anon-1"
                }),
            ),
            EntityKind::Travel,
        );

        let DataItem::Travel(group) = item else {
            panic!("expected a travel record");
        };
        assert_eq!(group.id.as_str(), "g1");
        assert_eq!(group.status, GroupStatus::Confirmed);
        assert_eq!(group.recruit_count, 5);
        assert_eq!(group.revenue, MoneyCents::new(100_000));
        assert_eq!(group.expense, MoneyCents::new(40_050));
        assert_eq!(group.created_at.as_deref(), Some("2024-02-01T08:00:00.000Z"));
        assert_eq!(group.updated_at, None);
        assert_eq!(group.creator_id.as_deref(), Some("anon-1"));
    }

    #[test]
    fn missing_and_malformed_fields_fall_back_to_defaults() {
        let item = normalize(
            &doc("g2", json!({"revenue": "abc", "expense": null, "recruitCount": -3})),
            EntityKind::Travel,
        );
        let group = item.as_travel().unwrap();
        assert_eq!(group.group_no, "");
        assert_eq!(group.person_in_charge, "");
        assert_eq!(group.status, GroupStatus::Waiting);
        assert_eq!(group.recruit_count, 0);
        assert_eq!(group.revenue, MoneyCents::ZERO);
        assert_eq!(group.expense, MoneyCents::ZERO);
    }

    #[test]
    fn numeric_strings_are_coerced() {
        let item = normalize(
            &doc(
                "p1",
                json!({"projectName": "Expo", "revenue": " 2000.5 ", "expense": "12.346"}),
            ),
            EntityKind::Business,
        );
        let project = item.as_business().unwrap();
        assert_eq!(project.revenue, MoneyCents::new(200_050));
        assert_eq!(project.expense, MoneyCents::new(1_235));
    }

    #[test]
    fn kind_decides_which_fields_are_read() {
        let raw = doc("x", json!({"groupNo": "TG-1", "projectName": "Expo"}));
        assert_eq!(normalize(&raw, EntityKind::Travel).display_name(), "");
        assert_eq!(normalize(&raw, EntityKind::Business).display_name(), "Expo");
        assert!(normalize(&raw, EntityKind::Business).as_travel().is_none());
    }

    #[test]
    fn unknown_status_is_kept_verbatim() {
        let item = normalize(&doc("g", json!({"status": "postponed"})), EntityKind::Travel);
        let status = &item.as_travel().unwrap().status;
        assert_eq!(status, &GroupStatus::Unrecognized("postponed".to_string()));
        assert!(!status.is_recognized());
    }

    #[test]
    fn stored_labels_read_back_as_the_same_status() {
        for status in [GroupStatus::Waiting, GroupStatus::Confirmed, GroupStatus::Cancelled] {
            assert_eq!(GroupStatus::parse(status.stored_label()), status);
        }
        let other = GroupStatus::Unrecognized("postponed".to_string());
        assert_eq!(other.stored_label(), "postponed");
    }

    #[test]
    fn unparseable_dates_sort_last() {
        let mut dates = vec!["garbage", "2024-03-01", "2024-03-15T10:00:00Z", ""];
        dates.sort_by(|a, b| cmp_date_desc(a, b));
        assert_eq!(dates[..2], ["2024-03-15T10:00:00Z", "2024-03-01"]);
        assert_eq!(parse_date("2024-13-01"), None);
    }
}
