//! Role and capability checks shared by every workflow.
//!
//! Handlers never compare role strings directly; they ask whether the acting
//! role grants a named capability.

use serde::{Deserialize, Serialize};

use crate::workflows::cases::domain::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Lawyer,
    Admin,
    BusinessSupport,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Lawyer => "lawyer",
            Role::Admin => "admin",
            Role::BusinessSupport => "business_support",
        }
    }

    pub fn allows(self, capability: Capability) -> bool {
        match capability {
            Capability::UpdateCaseStatus => matches!(self, Role::Lawyer | Role::Admin),
            Capability::ReassignCase
            | Capability::ApproveLawyer
            | Capability::ProcessRefund
            | Capability::ProcessPayout
            | Capability::ViewAllPayments => matches!(self, Role::Admin),
            Capability::IssueInvoices | Capability::ManageBusinessBilling => {
                matches!(self, Role::Admin | Role::BusinessSupport)
            }
        }
    }
}

/// Actions gated by role rather than by ownership of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    UpdateCaseStatus,
    ReassignCase,
    ApproveLawyer,
    ProcessRefund,
    ProcessPayout,
    IssueInvoices,
    ViewAllPayments,
    ManageBusinessBilling,
}

/// The authenticated caller, as resolved from a bearer token by the identity
/// provider. Token issuance and validation live outside this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.role.allows(capability)
    }
}
