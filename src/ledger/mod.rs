//! Donation ledger services: pledges, settlement, balances, withdrawals and
//! report review, written against the [`crate::store::LedgerStore`] port.

pub mod balance;
pub mod donations;
pub mod notify;
pub mod reconciler;
pub mod reports;
pub mod withdrawals;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

/// Authenticated caller of a ledger operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requester {
    pub user_id: Uuid,
    pub role: Role,
}

impl Requester {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> AppResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::forbidden("Administrator access required"))
        }
    }

    /// Admins may act on any campaign, users only on their own
    pub fn require_owner_or_admin(&self, creator_id: Uuid) -> AppResult<()> {
        if self.is_admin() || self.user_id == creator_id {
            Ok(())
        } else {
            Err(AppError::forbidden("Only the campaign creator or an administrator may do this"))
        }
    }
}
