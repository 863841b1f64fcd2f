use serde::Serialize;

/// A campaign's money position as reported to creators and admins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignBalance {
    pub collected_amount: i64,
    /// Sum of PROCESSING and COMPLETED withdrawals
    pub withdrawn_amount: i64,
    /// Never negative, even if a recalculation lowered `collected_amount`
    /// below what was already disbursed
    pub available_amount: i64,
}

impl CampaignBalance {
    pub fn from_totals(collected_amount: i64, withdrawn_amount: i64) -> Self {
        Self {
            collected_amount,
            withdrawn_amount,
            available_amount: collected_amount.saturating_sub(withdrawn_amount).max(0),
        }
    }

    /// Whether a new withdrawal of `amount` fits
    pub fn admits(&self, amount: i64) -> bool {
        amount > 0 && amount <= self.collected_amount && amount <= self.available_amount
    }
}
