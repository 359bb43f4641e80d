//! In-memory [`ClientSource`] for tests.

use crate::aggregation::strategy::ClientSource;
use crate::api::{ApiError, ApiResult};
use crate::models::{AdvisorClientLink, Engagement, EngagementStatus, Role, User};
use async_trait::async_trait;
use std::sync::Mutex;

#[derive(Default)]
pub(crate) struct FakeClientSource {
    pub users: Vec<User>,
    pub firm: Vec<User>,
    pub links: Vec<AdvisorClientLink>,
    pub engagements: Vec<Engagement>,
    /// When set, every call fails with this HTTP status.
    pub fail_status: Option<u16>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeClientSource {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) -> ApiResult<()> {
        self.calls.lock().unwrap().push(call);
        match self.fail_status {
            Some(status) => Err(ApiError::from_status(status, "fake failure".to_string())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ClientSource for FakeClientSource {
    async fn admin_users(&self) -> ApiResult<Vec<User>> {
        self.record("admin_users".to_string())?;
        Ok(self.users.clone())
    }

    async fn firm_clients(&self, firm_id: &str) -> ApiResult<Vec<User>> {
        self.record(format!("firm_clients:{}", firm_id))?;
        Ok(self.firm.clone())
    }

    async fn advisor_clients(&self, advisor_id: &str) -> ApiResult<Vec<AdvisorClientLink>> {
        self.record(format!("advisor_clients:{}", advisor_id))?;
        Ok(self.links.clone())
    }

    async fn engagements(&self) -> ApiResult<Vec<Engagement>> {
        self.record("engagements".to_string())?;
        Ok(self.engagements.clone())
    }
}

pub(crate) fn user(id: &str, role: Role, firm_id: Option<&str>) -> User {
    User {
        id: id.to_string(),
        name: format!("User {}", id),
        email: format!("{}@example.test", id),
        role,
        firm_id: firm_id.map(str::to_string),
        is_active: true,
        is_verified: true,
    }
}

pub(crate) fn engagement(id: &str, client_id: &str, status: EngagementStatus) -> Engagement {
    Engagement {
        id: id.to_string(),
        client_id: Some(client_id.to_string()),
        client: None,
        client_name: None,
        client_email: None,
        industry: None,
        title: None,
        status,
        task_count: 0,
        document_count: 0,
        diagnostic_count: 0,
    }
}

pub(crate) fn link(advisor_id: &str, client: User, status: Option<&str>) -> AdvisorClientLink {
    AdvisorClientLink {
        advisor_id: Some(advisor_id.to_string()),
        client,
        status: status.map(str::to_string),
    }
}
