//! Role-keyed client fetch strategies.

use crate::aggregation::aggregator::{
    build_client_views, candidates_from_engagements, ClientCandidate,
};
use crate::api::ApiResult;
use crate::models::{AdvisorClientLink, Client, Engagement, Role, User};
use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

/// The upstream lists a strategy can draw from.
#[async_trait]
pub trait ClientSource: Send + Sync {
    /// Every client account (admin view).
    async fn admin_users(&self) -> ApiResult<Vec<User>>;

    /// Clients belonging to one firm.
    async fn firm_clients(&self, firm_id: &str) -> ApiResult<Vec<User>>;

    /// Advisor-client associations of one advisor.
    async fn advisor_clients(&self, advisor_id: &str) -> ApiResult<Vec<AdvisorClientLink>>;

    /// Engagements visible to the session user.
    async fn engagements(&self) -> ApiResult<Vec<Engagement>>;
}

/// How the client list is obtained for a given user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchStrategy {
    AdminUsers,
    FirmClients { firm_id: String },
    AdvisorAssociations { advisor_id: String },
    EngagementDerived,
}

impl FetchStrategy {
    /// Select exactly one strategy for the user. Pure and deterministic.
    pub fn for_user(user: &User) -> Self {
        match (user.role, user.firm_id.as_deref()) {
            (Role::SuperAdmin | Role::Admin, _) => FetchStrategy::AdminUsers,
            (Role::FirmAdmin | Role::FirmAdvisor, Some(firm_id)) if !firm_id.is_empty() => {
                FetchStrategy::FirmClients {
                    firm_id: firm_id.to_string(),
                }
            }
            (Role::FirmAdmin | Role::FirmAdvisor, _) => FetchStrategy::EngagementDerived,
            (Role::Advisor, _) => FetchStrategy::AdvisorAssociations {
                advisor_id: user.id.clone(),
            },
            (Role::Client, _) => FetchStrategy::EngagementDerived,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FetchStrategy::AdminUsers => "admin-users",
            FetchStrategy::FirmClients { .. } => "firm-clients",
            FetchStrategy::AdvisorAssociations { .. } => "advisor-associations",
            FetchStrategy::EngagementDerived => "engagement-derived",
        }
    }

    /// Fetch the upstream lists for this strategy and merge them.
    ///
    /// The client list and the engagement list are requested concurrently.
    pub async fn fetch(&self, source: &dyn ClientSource) -> ApiResult<Vec<Client>> {
        let (candidates, engagements): (Vec<ClientCandidate>, Vec<Engagement>) = match self {
            FetchStrategy::AdminUsers => {
                let (users, engagements) =
                    futures::try_join!(source.admin_users(), source.engagements())?;
                let candidates = users
                    .iter()
                    .filter(|u| u.role == Role::Client)
                    .map(ClientCandidate::from)
                    .collect();
                (candidates, engagements)
            }
            FetchStrategy::FirmClients { firm_id } => {
                let (users, engagements) =
                    futures::try_join!(source.firm_clients(firm_id), source.engagements())?;
                (users.iter().map(ClientCandidate::from).collect(), engagements)
            }
            FetchStrategy::AdvisorAssociations { advisor_id } => {
                let (links, engagements) =
                    futures::try_join!(source.advisor_clients(advisor_id), source.engagements())?;
                let candidates = links
                    .iter()
                    .filter(|link| link.is_current())
                    .map(|link| ClientCandidate::from(&link.client))
                    .collect();
                (candidates, engagements)
            }
            FetchStrategy::EngagementDerived => {
                let engagements = source.engagements().await?;
                (candidates_from_engagements(&engagements), engagements)
            }
        };

        debug!(
            "{} strategy: {} candidates, {} engagements",
            self.name(),
            candidates.len(),
            engagements.len()
        );

        Ok(build_client_views(&candidates, &engagements))
    }
}
