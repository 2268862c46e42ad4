//! Entry draft shared by both record kinds.
//!
//! The form keeps the union of both kinds' editable fields. Only the fields of
//! the active [`EntityKind`] end up in a payload; the others are carried along
//! untouched until the kind is switched.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    DataItem, EntityKind, GroupStatus, MoneyCents,
    store::DocumentId,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormState {
    pub kind: EntityKind,
    /// Present only while editing an existing record.
    pub id: Option<DocumentId>,
    pub date: String,
    pub person_in_charge: String,
    pub revenue: MoneyCents,
    pub expense: MoneyCents,
    // travel
    pub group_no: String,
    pub destination: String,
    pub status: GroupStatus,
    pub recruit_count: u32,
    // business
    pub project_name: String,
}

impl FormState {
    /// Empty draft of `kind` dated `today`.
    pub fn new(kind: EntityKind, today: NaiveDate) -> Self {
        Self::with_date(kind, today.format("%Y-%m-%d").to_string())
    }

    /// Empty draft of `kind` dated today (UTC).
    pub fn today(kind: EntityKind) -> Self {
        Self::new(kind, Utc::now().date_naive())
    }

    fn with_date(kind: EntityKind, date: String) -> Self {
        Self {
            kind,
            id: None,
            date,
            person_in_charge: String::new(),
            revenue: MoneyCents::ZERO,
            expense: MoneyCents::ZERO,
            group_no: String::new(),
            destination: String::new(),
            status: GroupStatus::Waiting,
            recruit_count: 0,
            project_name: String::new(),
        }
    }

    /// Loads an existing record for editing.
    pub fn edit(item: &DataItem) -> Self {
        let mut form = Self::with_date(item.kind(), item.date().to_string());
        form.id = Some(item.id().clone());
        form.person_in_charge = item.person_in_charge().to_string();
        form.revenue = item.revenue();
        form.expense = item.expense();
        match item {
            DataItem::Travel(group) => {
                form.group_no = group.group_no.clone();
                form.destination = group.destination.clone();
                form.status = group.status.clone();
                form.recruit_count = group.recruit_count;
            }
            DataItem::Business(project) => {
                form.project_name = project.project_name.clone();
            }
        }
        form
    }

    /// Switches the active kind. The date survives, everything else (the id
    /// included) goes back to its default.
    pub fn switch_kind(&mut self, kind: EntityKind) {
        if self.kind == kind {
            return;
        }
        let date = std::mem::take(&mut self.date);
        *self = Self::with_date(kind, date);
    }

    /// Empty draft of the same kind, dated `today`.
    pub fn cleared(&self, today: NaiveDate) -> Self {
        Self::new(self.kind, today)
    }

    pub fn is_editing(&self) -> bool {
        self.id.is_some()
    }

    /// Live profit preview.
    pub fn profit(&self) -> MoneyCents {
        self.revenue - self.expense
    }

    /// Required name of the active kind.
    pub fn name(&self) -> &str {
        match self.kind {
            EntityKind::Travel => &self.group_no,
            EntityKind::Business => &self.project_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BusinessProject, TravelGroup};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[test]
    fn new_form_is_empty_and_dated() {
        let form = FormState::new(EntityKind::Travel, day());
        assert_eq!(form.date, "2024-03-01");
        assert_eq!(form.status, GroupStatus::Waiting);
        assert!(!form.is_editing());
        assert_eq!(form.name(), "");
    }

    #[test]
    fn switch_kind_keeps_only_the_date() {
        let mut form = FormState::new(EntityKind::Travel, day());
        form.id = Some(DocumentId::from("g1"));
        form.group_no = "TG-1".to_string();
        form.revenue = MoneyCents::new(500);
        form.date = "2024-05-05".to_string();

        form.switch_kind(EntityKind::Business);
        assert_eq!(form.kind, EntityKind::Business);
        assert_eq!(form.date, "2024-05-05");
        assert_eq!(form.group_no, "");
        assert_eq!(form.revenue, MoneyCents::ZERO);
        assert_eq!(form.id, None);
    }

    #[test]
    fn switching_to_the_same_kind_is_a_no_op() {
        let mut form = FormState::new(EntityKind::Travel, day());
        form.group_no = "TG-1".to_string();
        form.switch_kind(EntityKind::Travel);
        assert_eq!(form.group_no, "TG-1");
    }

    #[test]
    fn edit_loads_kind_specific_fields() {
        let travel = DataItem::Travel(TravelGroup {
            id: DocumentId::from("g1"),
            group_no: "TG-1".to_string(),
            date: "2024-03-01".to_string(),
            destination: "Kyoto".to_string(),
            person_in_charge: "Lin".to_string(),
            status: GroupStatus::Confirmed,
            recruit_count: 5,
            revenue: MoneyCents::new(100_000),
            expense: MoneyCents::new(40_000),
            created_at: None,
            updated_at: None,
            creator_id: None,
        });
        let form = FormState::edit(&travel);
        assert_eq!(form.id, Some(DocumentId::from("g1")));
        assert_eq!(form.destination, "Kyoto");
        assert_eq!(form.status, GroupStatus::Confirmed);
        assert_eq!(form.profit(), MoneyCents::new(60_000));

        let business = DataItem::Business(BusinessProject {
            id: DocumentId::from("p1"),
            project_name: "Expo".to_string(),
            date: "2024-03-15".to_string(),
            person_in_charge: String::new(),
            revenue: MoneyCents::new(200_000),
            expense: MoneyCents::new(50_000),
            created_at: None,
            updated_at: None,
            creator_id: None,
        });
        let form = FormState::edit(&business);
        assert_eq!(form.kind, EntityKind::Business);
        assert_eq!(form.name(), "Expo");
        assert_eq!(form.cleared(day()).kind, EntityKind::Business);
    }
}
