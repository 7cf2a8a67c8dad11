//! Class (cohort) share grant model.
//!
//! A teacher shares a node with every student of a batch and semester,
//! optionally narrowed to one section.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use canopy_core::types::{ClassGrantId, NodeId, UserId};

use crate::user::Cohort;

/// The cohort a class grant targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortTarget {
    /// Intake batch (e.g. `"2022"`).
    pub batch: String,
    /// Semester number.
    pub semester: i32,
    /// Section, or None for every section.
    pub section: Option<String>,
}

impl CohortTarget {
    /// Whether a student in `cohort` falls under this target.
    pub fn matches(&self, cohort: &Cohort) -> bool {
        self.batch == cohort.batch
            && self.semester == cohort.semester
            && self
                .section
                .as_deref()
                .is_none_or(|section| section.eq_ignore_ascii_case(&cohort.section))
    }
}

/// Read access to a node granted to a cohort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ClassShareGrant {
    /// Grant identifier.
    pub id: ClassGrantId,
    /// The shared node.
    pub node_id: NodeId,
    /// Intake batch.
    pub batch: String,
    /// Semester number.
    pub semester: i32,
    /// Section, or None for every section.
    pub section: Option<String>,
    /// Optional subject label.
    pub subject_id: Option<String>,
    /// The teacher who granted access.
    pub granted_by: UserId,
    /// When the grant lapses (None = never).
    pub expires_at: Option<DateTime<Utc>>,
    /// When the grant was created.
    pub created_at: DateTime<Utc>,
}

impl ClassShareGrant {
    /// The cohort this grant targets.
    pub fn target(&self) -> CohortTarget {
        CohortTarget {
            batch: self.batch.clone(),
            semester: self.semester,
            section: self.section.clone(),
        }
    }

    /// Whether the grant is in force at `now`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }

    /// Whether the grant is in force at `now` for a student in `cohort`.
    pub fn admits(&self, cohort: &Cohort, now: DateTime<Utc>) -> bool {
        self.is_active(now) && self.target().matches(cohort)
    }
}

/// Data required to create a class grant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewClassShareGrant {
    /// The shared node.
    pub node_id: NodeId,
    /// Target cohort.
    pub target: CohortTarget,
    /// Optional subject label.
    pub subject_id: Option<String>,
    /// The granting teacher.
    pub granted_by: UserId,
    /// Optional expiry.
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewClassShareGrant {
    /// Materialize the row with a fresh id stamped at `now`.
    pub fn into_grant(self, now: DateTime<Utc>) -> ClassShareGrant {
        ClassShareGrant {
            id: ClassGrantId::new(),
            node_id: self.node_id,
            batch: self.target.batch,
            semester: self.target.semester,
            section: self.target.section,
            subject_id: self.subject_id,
            granted_by: self.granted_by,
            expires_at: self.expires_at,
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn cohort(section: &str) -> Cohort {
        Cohort {
            batch: "2022".into(),
            semester: 5,
            section: section.into(),
        }
    }

    #[test]
    fn test_target_without_section_matches_every_section() {
        let target = CohortTarget {
            batch: "2022".into(),
            semester: 5,
            section: None,
        };
        assert!(target.matches(&cohort("A")));
        assert!(target.matches(&cohort("B")));
    }

    #[test]
    fn test_target_with_section_is_exact() {
        let target = CohortTarget {
            batch: "2022".into(),
            semester: 5,
            section: Some("A".into()),
        };
        assert!(target.matches(&cohort("a")));
        assert!(!target.matches(&cohort("B")));
        assert!(!target.matches(&Cohort {
            semester: 6,
            ..cohort("A")
        }));
    }

    #[test]
    fn test_expired_grant_admits_nobody() {
        let now = Utc::now();
        let grant = NewClassShareGrant {
            node_id: NodeId::new(),
            target: CohortTarget {
                batch: "2022".into(),
                semester: 5,
                section: None,
            },
            subject_id: None,
            granted_by: UserId::new(),
            expires_at: Some(now - Duration::minutes(1)),
        }
        .into_grant(now - Duration::hours(1));

        assert!(!grant.admits(&cohort("A"), now));
    }
}
