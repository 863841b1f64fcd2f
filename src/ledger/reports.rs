use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::report_repository::{Report, ReviewAction, ReviewOutcome, ReviewResult};
use crate::error::{AppResult, DomainError};
use crate::ledger::notify::{CreatorNotice, Notifier};
use crate::ledger::Requester;
use crate::store::{LedgerStore, ReportStore};

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewReport {
    pub action: ReviewAction,
}

fn notice_for(outcome: &ReviewOutcome) -> Option<CreatorNotice> {
    let reason = outcome.report.reason.clone();
    let campaign_title = outcome.campaign_title.clone();
    match outcome.action {
        ReviewAction::Dismiss => None,
        ReviewAction::Warning => Some(CreatorNotice::Warning {
            campaign_title,
            reason,
            warning_count: outcome.warning_count.unwrap_or_default(),
        }),
        ReviewAction::Suspend => Some(CreatorNotice::Suspension {
            campaign_title,
            reason,
        }),
    }
}

pub struct ReportService {
    store: Arc<dyn LedgerStore>,
    notifier: Arc<dyn Notifier>,
}

impl ReportService {
    pub fn new(store: Arc<dyn LedgerStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Review a PENDING report. The status change, the creator warning and
    /// any suspension commit together; the creator is notified afterwards.
    pub async fn review_report(
        &self,
        requester: &Requester,
        report_id: Uuid,
        action: ReviewAction,
    ) -> AppResult<Report> {
        requester.require_admin()?;

        let outcome = match self
            .store
            .review_report(report_id, requester.user_id, action)
            .await?
        {
            ReviewResult::Reviewed(outcome) => outcome,
            ReviewResult::AlreadyReviewed(_) => {
                return Err(DomainError::ReportAlreadyReviewed { report_id }.into())
            }
            ReviewResult::NotFound => return Err(DomainError::ReportNotFound { report_id }.into()),
        };

        info!(
            %report_id,
            action = ?action,
            creator_id = %outcome.creator_id,
            "Report review committed"
        );

        if let Some(notice) = notice_for(&outcome) {
            if let Err(e) = self.notifier.notify_creator(outcome.creator_id, notice).await {
                warn!(
                    %report_id,
                    creator_id = %outcome.creator_id,
                    "Failed to notify campaign creator: {}", e
                );
            }
        }

        Ok(outcome.report)
    }
}
