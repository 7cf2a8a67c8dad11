//! The authenticated caller of a service operation.

use serde::{Deserialize, Serialize};

use canopy_core::types::UserId;

/// A student's cohort.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cohort {
    /// Intake batch.
    pub batch: String,
    /// Current semester.
    pub semester: i32,
    /// Section within the batch.
    pub section: String,
}

/// Role of a non-student account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaffRole {
    /// May share with class cohorts.
    Teacher,
    /// Any other staff account.
    Member,
}

/// What kind of account the requester holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Capability {
    /// A student, matched against class grants by cohort.
    Student(Cohort),
    /// A staff member.
    Staff(StaffRole),
}

/// Identity supplied by the authentication collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    /// The authenticated user.
    pub user_id: UserId,
    /// The user's capability.
    pub capability: Capability,
}

impl Requester {
    /// A student requester.
    pub fn student(user_id: UserId, cohort: Cohort) -> Self {
        Self {
            user_id,
            capability: Capability::Student(cohort),
        }
    }

    /// A staff requester.
    pub fn staff(user_id: UserId, role: StaffRole) -> Self {
        Self {
            user_id,
            capability: Capability::Staff(role),
        }
    }

    /// The student's cohort, if the requester is a student.
    pub fn cohort(&self) -> Option<&Cohort> {
        match &self.capability {
            Capability::Student(cohort) => Some(cohort),
            Capability::Staff(_) => None,
        }
    }

    /// Whether the requester may create class grants.
    pub fn is_teacher(&self) -> bool {
        matches!(self.capability, Capability::Staff(StaffRole::Teacher))
    }
}
