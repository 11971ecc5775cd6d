use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValidationStatus {
    Draft,
    PendingApproval,
    Approved,
    SelfApproved,
    Rejected,
}

impl ValidationStatus {
    pub const ALL: [ValidationStatus; 5] = [
        ValidationStatus::Draft,
        ValidationStatus::PendingApproval,
        ValidationStatus::Approved,
        ValidationStatus::SelfApproved,
        ValidationStatus::Rejected,
    ];

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "D" => Some(ValidationStatus::Draft),
            "PA" => Some(ValidationStatus::PendingApproval),
            "A" => Some(ValidationStatus::Approved),
            "SA" => Some(ValidationStatus::SelfApproved),
            "R" => Some(ValidationStatus::Rejected),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            ValidationStatus::Draft => "D",
            ValidationStatus::PendingApproval => "PA",
            ValidationStatus::Approved => "A",
            ValidationStatus::SelfApproved => "SA",
            ValidationStatus::Rejected => "R",
        }
    }

    pub fn text(self) -> &'static str {
        match self {
            ValidationStatus::Draft => "In Draft",
            ValidationStatus::PendingApproval => "Pending Approval",
            ValidationStatus::Approved => "Approved",
            ValidationStatus::SelfApproved => "Self Approved",
            ValidationStatus::Rejected => "Rejected",
        }
    }
}

/// Display text for a raw status code; empty for codes outside the enumeration.
pub fn status_text(code: &str) -> &'static str {
    ValidationStatus::from_code(code).map_or("", ValidationStatus::text)
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrganizationalUnit {
    pub code: String,
    pub text: String,
    pub population: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetailRecord {
    pub person_id: Option<String>,
    pub unit_text: Option<String>,
    pub status: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub submitted_by: Option<String>,
    pub approver: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub draft: i64,
    pub pending_approval: i64,
    pub approved: i64,
    pub self_approved: i64,
    pub rejected: i64,
}

impl StatusCounts {
    pub fn get(&self, status: ValidationStatus) -> i64 {
        match status {
            ValidationStatus::Draft => self.draft,
            ValidationStatus::PendingApproval => self.pending_approval,
            ValidationStatus::Approved => self.approved,
            ValidationStatus::SelfApproved => self.self_approved,
            ValidationStatus::Rejected => self.rejected,
        }
    }

    pub fn bump(&mut self, status: ValidationStatus) {
        let slot = match status {
            ValidationStatus::Draft => &mut self.draft,
            ValidationStatus::PendingApproval => &mut self.pending_approval,
            ValidationStatus::Approved => &mut self.approved,
            ValidationStatus::SelfApproved => &mut self.self_approved,
            ValidationStatus::Rejected => &mut self.rejected,
        };
        *slot += 1;
    }

    pub fn add(&mut self, other: &StatusCounts) {
        self.draft += other.draft;
        self.pending_approval += other.pending_approval;
        self.approved += other.approved;
        self.self_approved += other.self_approved;
        self.rejected += other.rejected;
    }

    pub fn sum(&self) -> i64 {
        ValidationStatus::ALL.iter().map(|status| self.get(*status)).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Unit,
    Total,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnitAggregate {
    pub kind: RowKind,
    pub code: String,
    pub text: String,
    pub counts: StatusCounts,
    /// Deduplicated records counted for this row, recognized status or not.
    pub total: i64,
    pub population: Option<i64>,
    pub no_action_yet: i64,
    pub records: Vec<DetailRecord>,
}

impl UnitAggregate {
    pub fn empty(unit: &OrganizationalUnit) -> Self {
        Self {
            kind: RowKind::Unit,
            code: unit.code.clone(),
            text: unit.text.clone(),
            counts: StatusCounts::default(),
            total: 0,
            population: unit.population,
            no_action_yet: 0,
            records: Vec::new(),
        }
    }

    pub fn is_total(&self) -> bool {
        self.kind == RowKind::Total
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub name: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionScope {
    Unrestricted,
    UnitScoped(String),
    NoAccess,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub person_id: String,
    pub scope: PermissionScope,
}

impl SessionContext {
    pub fn unit_restriction(&self) -> Option<&str> {
        match &self.scope {
            PermissionScope::UnitScoped(code) => Some(code.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_display_text() {
        assert_eq!(status_text("PA"), "Pending Approval");
        assert_eq!(status_text("D"), "In Draft");
        assert_eq!(status_text("SA"), "Self Approved");
        assert_eq!(status_text("X"), "");
        for status in ValidationStatus::ALL {
            assert_eq!(ValidationStatus::from_code(status.code()), Some(status));
        }
    }

    #[test]
    fn counts_bump_and_sum() {
        let mut counts = StatusCounts::default();
        counts.bump(ValidationStatus::Approved);
        counts.bump(ValidationStatus::Approved);
        counts.bump(ValidationStatus::Rejected);
        assert_eq!(counts.get(ValidationStatus::Approved), 2);
        assert_eq!(counts.sum(), 3);

        let mut totals = StatusCounts::default();
        totals.add(&counts);
        totals.add(&counts);
        assert_eq!(totals.rejected, 2);
        assert_eq!(totals.sum(), 6);
    }
}
