use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppResult;

/// Message sent to a campaign creator after a moderation decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreatorNotice {
    Warning {
        campaign_title: String,
        reason: String,
        warning_count: i32,
    },
    Suspension {
        campaign_title: String,
        reason: String,
    },
}

/// Outbound notification port (email delivery lives outside this service)
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_creator(&self, creator_id: Uuid, notice: CreatorNotice) -> AppResult<()>;
}

/// Writes notices to the log
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify_creator(&self, creator_id: Uuid, notice: CreatorNotice) -> AppResult<()> {
        match notice {
            CreatorNotice::Warning {
                campaign_title,
                reason,
                warning_count,
            } => tracing::info!(
                %creator_id,
                campaign_title,
                reason,
                warning_count,
                "Creator warning issued"
            ),
            CreatorNotice::Suspension {
                campaign_title,
                reason,
            } => tracing::info!(%creator_id, campaign_title, reason, "Campaign suspension notice"),
        }
        Ok(())
    }
}
