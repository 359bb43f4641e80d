//! Client aggregation and engagement statistics.
//!
//! Turns an upstream client list plus the engagement list into `Client`
//! view-models. The merge is pure; [`ClientAggregator`] wraps it with the
//! fetch and the last-fetch-wins bookkeeping.

use crate::aggregation::strategy::{ClientSource, FetchStrategy};
use crate::models::{Client, ClientStatus, Engagement, User};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// A client as delivered by one of the upstream lists, before derivation.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientCandidate {
    pub id: String,
    pub name: String,
    pub email: String,
    pub is_active: bool,
    pub is_verified: bool,
}

impl From<&User> for ClientCandidate {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            is_active: user.is_active,
            is_verified: user.is_verified,
        }
    }
}

/// Engagement statistics for one client.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientEngagements<'a> {
    pub count: usize,
    pub any_live: bool,
    pub industry: Option<&'a str>,
}

/// Group engagements by client id in one pass.
///
/// Engagements without a client reference are ignored. The industry is the
/// first non-empty one seen for the client.
pub fn group_by_client(engagements: &[Engagement]) -> HashMap<&str, ClientEngagements<'_>> {
    let mut grouped: HashMap<&str, ClientEngagements<'_>> = HashMap::new();

    for engagement in engagements {
        let Some(client_id) = engagement.client_id.as_deref() else {
            continue;
        };

        let entry = grouped.entry(client_id).or_default();
        entry.count += 1;
        entry.any_live |= engagement.status.is_live();

        if entry.industry.is_none() {
            entry.industry = engagement.industry.as_deref().filter(|s| !s.is_empty());
        }
    }

    grouped
}

/// Derive a client's status from its engagements and account state.
pub fn derive_status(is_active: bool, engagements: Option<&ClientEngagements<'_>>) -> ClientStatus {
    match engagements {
        Some(group) if group.count > 0 => {
            if group.any_live {
                ClientStatus::Active
            } else {
                ClientStatus::Pending
            }
        }
        _ if is_active => ClientStatus::Active,
        _ => ClientStatus::Pending,
    }
}

/// Build the client view-models.
///
/// Output follows the candidate order; repeated ids keep their first entry.
pub fn build_client_views(candidates: &[ClientCandidate], engagements: &[Engagement]) -> Vec<Client> {
    let grouped = group_by_client(engagements);
    let mut seen = HashSet::new();

    candidates
        .iter()
        .filter(|c| seen.insert(c.id.as_str()))
        .map(|candidate| {
            let group = grouped.get(candidate.id.as_str());
            Client {
                id: candidate.id.clone(),
                name: candidate.name.clone(),
                email: candidate.email.clone(),
                is_verified: candidate.is_verified,
                is_active: candidate.is_active,
                status: derive_status(candidate.is_active, group),
                industry: group
                    .and_then(|g| g.industry)
                    .unwrap_or_default()
                    .to_string(),
                engagements: group.map_or(0, |g| g.count),
            }
        })
        .collect()
}

/// Derive the candidate list from engagements alone, in first-seen order.
pub fn candidates_from_engagements(engagements: &[Engagement]) -> Vec<ClientCandidate> {
    engagements
        .iter()
        .filter_map(|engagement| {
            let id = engagement.client_id.clone()?;
            Some(ClientCandidate {
                name: engagement
                    .client_name
                    .clone()
                    .unwrap_or_else(|| format!("Client {}", id)),
                email: engagement.client_email.clone().unwrap_or_default(),
                id,
                is_active: true,
                is_verified: false,
            })
        })
        .collect()
}

/// Result of one aggregation: never an `Err`, failures land in `error`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientListing {
    pub strategy: FetchStrategy,
    pub clients: Vec<Client>,
    pub error: Option<String>,
}

impl ClientListing {
    fn empty(strategy: FetchStrategy) -> Self {
        Self {
            strategy,
            clients: Vec::new(),
            error: None,
        }
    }
}

/// Role-aware client aggregator for one session user.
pub struct ClientAggregator {
    source: Arc<dyn ClientSource>,
    strategy: FetchStrategy,
    next_ticket: AtomicU64,
    /// Ticket of the applied listing alongside the listing itself.
    current: RwLock<(u64, ClientListing)>,
}

impl ClientAggregator {
    pub fn new(source: Arc<dyn ClientSource>, user: &User) -> Self {
        let strategy = FetchStrategy::for_user(user);
        info!("Using {} client strategy for {}", strategy.name(), user.role);

        Self {
            source,
            current: RwLock::new((0, ClientListing::empty(strategy.clone()))),
            strategy,
            next_ticket: AtomicU64::new(0),
        }
    }

    /// Fetch and aggregate. The result is applied to the shared listing only
    /// if no later refresh has been applied already; it is returned either way.
    pub async fn refresh(&self) -> ClientListing {
        let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst) + 1;

        let listing = match self.strategy.fetch(self.source.as_ref()).await {
            Ok(clients) => {
                debug!("Aggregated {} clients (ticket {})", clients.len(), ticket);
                ClientListing {
                    strategy: self.strategy.clone(),
                    clients,
                    error: None,
                }
            }
            Err(e) => {
                warn!("Client fetch failed: {}", e);
                ClientListing {
                    strategy: self.strategy.clone(),
                    clients: Vec::new(),
                    error: Some(e.to_string()),
                }
            }
        };

        let mut current = self.current.write().await;
        if ticket > current.0 {
            *current = (ticket, listing.clone());
        } else {
            debug!(
                "Discarding stale listing (ticket {} < applied {})",
                ticket, current.0
            );
        }

        listing
    }

    /// The most recently applied listing.
    pub async fn listing(&self) -> ClientListing {
        self.current.read().await.1.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::fake::{engagement, user, FakeClientSource};
    use crate::models::{EngagementStatus, Role};
    use async_trait::async_trait;
    use crate::api::ApiResult;
    use crate::models::AdvisorClientLink;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    fn candidate(id: &str, is_active: bool) -> ClientCandidate {
        ClientCandidate {
            id: id.to_string(),
            name: format!("Client {}", id),
            email: format!("{}@example.test", id),
            is_active,
            is_verified: true,
        }
    }

    #[test]
    fn test_group_by_client_counts_and_industry() {
        let mut first = engagement("e1", "c1", EngagementStatus::Completed);
        first.industry = Some(String::new());
        let mut second = engagement("e2", "c1", EngagementStatus::Draft);
        second.industry = Some("Healthcare".to_string());
        let mut orphan = engagement("e3", "c2", EngagementStatus::Active);
        orphan.client_id = None;

        let engagements = vec![first, second, orphan];
        let grouped = group_by_client(&engagements);

        assert_eq!(grouped.len(), 1);
        let c1 = &grouped["c1"];
        assert_eq!(c1.count, 2);
        assert!(c1.any_live);
        assert_eq!(c1.industry, Some("Healthcare"));
    }

    #[test]
    fn test_status_active_when_any_engagement_live() {
        for live in [EngagementStatus::Active, EngagementStatus::Draft] {
            let engagements = vec![
                engagement("e1", "c1", EngagementStatus::Completed),
                engagement("e2", "c1", live),
            ];
            let clients = build_client_views(&[candidate("c1", false)], &engagements);
            assert_eq!(clients[0].status, ClientStatus::Active);
        }
    }

    #[test]
    fn test_status_pending_when_no_engagement_live() {
        let engagements = vec![
            engagement("e1", "c1", EngagementStatus::Completed),
            engagement("e2", "c1", EngagementStatus::OnHold),
            engagement("e3", "c1", EngagementStatus::Cancelled),
        ];
        // Account activity does not matter once engagements exist.
        let clients = build_client_views(&[candidate("c1", true)], &engagements);
        assert_eq!(clients[0].status, ClientStatus::Pending);
        assert_eq!(clients[0].engagements, 3);
    }

    #[test]
    fn test_no_engagements_mirrors_account_state() {
        let clients = build_client_views(&[candidate("c1", true), candidate("c2", false)], &[]);

        assert_eq!(clients[0].status, ClientStatus::Active);
        assert_eq!(clients[0].engagements, 0);
        assert_eq!(clients[0].industry, "");
        assert_eq!(clients[1].status, ClientStatus::Pending);
    }

    #[test]
    fn test_engagement_counts_match_client_ids() {
        let engagements = vec![
            engagement("e1", "c1", EngagementStatus::Active),
            engagement("e2", "c2", EngagementStatus::Active),
            engagement("e3", "c1", EngagementStatus::Completed),
            engagement("e4", "c3", EngagementStatus::Draft),
        ];
        let candidates = vec![candidate("c1", true), candidate("c2", true), candidate("c4", true)];

        let clients = build_client_views(&candidates, &engagements);

        let counts: Vec<usize> = clients.iter().map(|c| c.engagements).collect();
        assert_eq!(counts, vec![2, 1, 0]);
    }

    #[test]
    fn test_duplicate_candidates_keep_first() {
        let mut dup = candidate("c1", false);
        dup.name = "Duplicate".to_string();

        let clients = build_client_views(&[candidate("c1", true), dup, candidate("c2", true)], &[]);

        assert_eq!(clients.len(), 2);
        assert_eq!(clients[0].name, "Client c1");
        assert_eq!(clients[1].id, "c2");
    }

    #[test]
    fn test_candidates_from_engagements() {
        let mut named = engagement("e1", "c1", EngagementStatus::Active);
        named.client_name = Some("Oak & Co".to_string());
        let engagements = vec![named, engagement("e2", "c2", EngagementStatus::Active)];

        let candidates = candidates_from_engagements(&engagements);

        assert_eq!(candidates[0].name, "Oak & Co");
        assert_eq!(candidates[1].name, "Client c2");
    }

    #[tokio::test]
    async fn test_refresh_failure_yields_empty_listing_with_error() {
        let mut source = FakeClientSource::default();
        source.fail_status = Some(500);
        let admin = user("a1", Role::Admin, None);

        let aggregator = ClientAggregator::new(Arc::new(source), &admin);
        let listing = aggregator.refresh().await;

        assert!(listing.clients.is_empty());
        assert!(listing.error.as_deref().unwrap_or("").contains("500"));
        assert_eq!(aggregator.listing().await, listing);
    }

    #[tokio::test]
    async fn test_refresh_recomputes_counts() {
        let source = Arc::new(FakeClientSource {
            users: vec![user("c1", Role::Client, None)],
            engagements: vec![engagement("e1", "c1", EngagementStatus::Active)],
            ..FakeClientSource::default()
        });
        let admin = user("a1", Role::SuperAdmin, None);
        let aggregator = ClientAggregator::new(source.clone(), &admin);

        let first = aggregator.refresh().await;
        let second = aggregator.refresh().await;

        assert_eq!(first.clients[0].engagements, 1);
        assert_eq!(second.clients[0].engagements, 1);
    }

    /// First `admin_users` call blocks until released and returns "slow";
    /// later calls return "fast" immediately.
    #[derive(Default)]
    struct GatedSource {
        calls: AtomicUsize,
        release: Notify,
    }

    #[async_trait]
    impl ClientSource for GatedSource {
        async fn admin_users(&self) -> ApiResult<Vec<User>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == 0 {
                self.release.notified().await;
                Ok(vec![user("slow", Role::Client, None)])
            } else {
                Ok(vec![user("fast", Role::Client, None)])
            }
        }

        async fn firm_clients(&self, _firm_id: &str) -> ApiResult<Vec<User>> {
            Ok(Vec::new())
        }

        async fn advisor_clients(&self, _advisor_id: &str) -> ApiResult<Vec<AdvisorClientLink>> {
            Ok(Vec::new())
        }

        async fn engagements(&self) -> ApiResult<Vec<Engagement>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_stale_response_does_not_overwrite_newer() {
        let source = Arc::new(GatedSource::default());
        let admin = user("a1", Role::Admin, None);
        let aggregator = Arc::new(ClientAggregator::new(source.clone(), &admin));

        let slow = tokio::spawn({
            let aggregator = aggregator.clone();
            async move { aggregator.refresh().await }
        });
        while source.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        let fast = aggregator.refresh().await;
        assert_eq!(fast.clients[0].id, "fast");

        source.release.notify_one();
        let stale = slow.await.unwrap();
        assert_eq!(stale.clients[0].id, "slow");

        let applied = aggregator.listing().await;
        assert_eq!(applied.clients[0].id, "fast");
    }
}
