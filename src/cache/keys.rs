//! Cache key layout. Every key is namespaced and versioned so a schema
//! change only needs a version bump.

const NAMESPACE: &str = "crowdfund:v1";

pub mod campaign {
    use super::NAMESPACE;
    use std::fmt;
    use uuid::Uuid;

    /// A page of SUCCESS donations (or prayers) for one campaign
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct DonationListKey {
        pub campaign_id: Uuid,
        pub prayers_only: bool,
        pub limit: i64,
    }

    impl DonationListKey {
        pub fn new(campaign_id: Uuid, prayers_only: bool, limit: i64) -> Self {
            Self {
                campaign_id,
                prayers_only,
                limit,
            }
        }

        /// Glob matching every listing cached for a campaign
        pub fn campaign_pattern(campaign_id: Uuid) -> String {
            format!("{NAMESPACE}:campaign:{campaign_id}:*")
        }

        /// Glob matching every listing of every campaign
        pub fn all_pattern() -> String {
            format!("{NAMESPACE}:campaign:*")
        }
    }

    impl fmt::Display for DonationListKey {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let kind = if self.prayers_only { "prayers" } else { "donations" };
            write!(
                f,
                "{NAMESPACE}:campaign:{}:{kind}:{}",
                self.campaign_id, self.limit
            )
        }
    }
}
