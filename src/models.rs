//! Data models for the advisory platform.
//!
//! Entity types mirror what the backend returns (with serde aliases to fold
//! snake_case/camelCase drift), and view-model types carry the values this
//! crate derives from them.

use crate::api::wire::{flexible_id, flexible_id_opt, flexible_u64};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Role of an authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[serde(alias = "super-admin", alias = "superadmin")]
    SuperAdmin,
    Admin,
    Advisor,
    #[serde(alias = "firm-admin")]
    FirmAdmin,
    #[serde(alias = "firm-advisor")]
    FirmAdvisor,
    Client,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::SuperAdmin => write!(f, "Super Admin"),
            Role::Admin => write!(f, "Admin"),
            Role::Advisor => write!(f, "Advisor"),
            Role::FirmAdmin => write!(f, "Firm Admin"),
            Role::FirmAdvisor => write!(f, "Firm Advisor"),
            Role::Client => write!(f, "Client"),
        }
    }
}

fn default_role() -> Role {
    Role::Client
}

fn default_true() -> bool {
    true
}

/// A platform account as returned by the users endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(alias = "_id", alias = "user_id", alias = "userId", deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(default, alias = "full_name", alias = "fullName")]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default = "default_role")]
    pub role: Role,
    #[serde(default, alias = "firmId", deserialize_with = "flexible_id_opt")]
    pub firm_id: Option<String>,
    #[serde(default = "default_true", alias = "isActive")]
    pub is_active: bool,
    #[serde(default, alias = "isVerified", alias = "email_verified")]
    pub is_verified: bool,
}

/// Lifecycle status of an engagement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngagementStatus {
    Draft,
    Active,
    #[serde(alias = "on_hold", alias = "onhold")]
    OnHold,
    Completed,
    #[serde(alias = "canceled")]
    Cancelled,
}

impl EngagementStatus {
    /// Whether an engagement in this state makes its client count as active.
    pub fn is_live(&self) -> bool {
        matches!(self, EngagementStatus::Active | EngagementStatus::Draft)
    }
}

impl fmt::Display for EngagementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngagementStatus::Draft => write!(f, "draft"),
            EngagementStatus::Active => write!(f, "active"),
            EngagementStatus::OnHold => write!(f, "on-hold"),
            EngagementStatus::Completed => write!(f, "completed"),
            EngagementStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Client record some endpoints embed inside an engagement.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClientRef {
    #[serde(default, alias = "_id", deserialize_with = "flexible_id_opt")]
    pub id: Option<String>,
    #[serde(default, alias = "full_name", alias = "fullName")]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub industry: Option<String>,
}

/// A client-advisor engagement. Owned by the backend; read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Engagement {
    #[serde(alias = "_id", deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(default, alias = "clientId", deserialize_with = "flexible_id_opt")]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client: Option<ClientRef>,
    #[serde(default, alias = "clientName")]
    pub client_name: Option<String>,
    #[serde(default, alias = "clientEmail")]
    pub client_email: Option<String>,
    #[serde(default, alias = "clientIndustry", alias = "client_industry")]
    pub industry: Option<String>,
    #[serde(default, alias = "name")]
    pub title: Option<String>,
    pub status: EngagementStatus,
    #[serde(
        default,
        alias = "taskCount",
        alias = "tasks_count",
        deserialize_with = "flexible_u64"
    )]
    pub task_count: u64,
    #[serde(
        default,
        alias = "documentCount",
        alias = "documents_count",
        deserialize_with = "flexible_u64"
    )]
    pub document_count: u64,
    #[serde(
        default,
        alias = "diagnosticCount",
        alias = "diagnostics_count",
        deserialize_with = "flexible_u64"
    )]
    pub diagnostic_count: u64,
}

impl Engagement {
    /// Fold the embedded client object into the flat fields, so callers can
    /// rely on `client_id`, `client_name`, `client_email` and `industry`.
    pub fn normalized(mut self) -> Self {
        if let Some(client) = self.client.take() {
            if self.client_id.is_none() {
                self.client_id = client.id;
            }
            if self.client_name.as_deref().map_or(true, str::is_empty) && !client.name.is_empty()
            {
                self.client_name = Some(client.name);
            }
            if self.client_email.as_deref().map_or(true, str::is_empty)
                && !client.email.is_empty()
            {
                self.client_email = Some(client.email);
            }
            if self.industry.as_deref().map_or(true, str::is_empty) {
                self.industry = client.industry;
            }
        }
        self
    }
}

/// A link between an advisor and one of their clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisorClientLink {
    #[serde(default, alias = "advisorId", deserialize_with = "flexible_id_opt")]
    pub advisor_id: Option<String>,
    #[serde(alias = "client_user", alias = "clientUser")]
    pub client: User,
    #[serde(default)]
    pub status: Option<String>,
}

impl AdvisorClientLink {
    /// Inactive or removed links do not grant visibility.
    pub fn is_current(&self) -> bool {
        !matches!(
            self.status.as_deref().map(str::to_lowercase).as_deref(),
            Some("inactive") | Some("removed") | Some("revoked")
        )
    }
}

/// Derived status of a client in the listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClientStatus {
    Active,
    Pending,
}

impl fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientStatus::Active => write!(f, "Active"),
            ClientStatus::Pending => write!(f, "Pending"),
        }
    }
}

/// Client view-model. Every derived field is recomputed per aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    pub name: String,
    pub email: String,
    pub is_verified: bool,
    pub is_active: bool,
    pub status: ClientStatus,
    pub industry: String,
    pub engagements: usize,
}

/// Status of an AI diagnostic job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticStatus {
    Draft,
    #[serde(alias = "generating", alias = "in_progress")]
    Processing,
    #[serde(alias = "complete", alias = "done")]
    Completed,
    #[serde(alias = "error")]
    Failed,
}

impl DiagnosticStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DiagnosticStatus::Completed | DiagnosticStatus::Failed)
    }
}

impl fmt::Display for DiagnosticStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticStatus::Draft => write!(f, "draft"),
            DiagnosticStatus::Processing => write!(f, "processing"),
            DiagnosticStatus::Completed => write!(f, "completed"),
            DiagnosticStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Metadata of an uploaded or generated file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMeta {
    #[serde(
        default,
        alias = "_id",
        alias = "file_id",
        alias = "fileId",
        deserialize_with = "flexible_id_opt"
    )]
    pub id: Option<String>,
    #[serde(
        alias = "file_name",
        alias = "fileName",
        alias = "filename",
        alias = "original_name",
        alias = "originalName"
    )]
    pub name: String,
    #[serde(
        default,
        alias = "file_size",
        alias = "fileSize",
        deserialize_with = "flexible_u64"
    )]
    pub size: u64,
    #[serde(default, alias = "uploadedBy", alias = "uploader")]
    pub uploaded_by: Option<String>,
    #[serde(default, alias = "file_tag", alias = "fileTag", alias = "category")]
    pub tag: Option<String>,
    #[serde(
        default,
        alias = "download_url",
        alias = "downloadUrl",
        alias = "file_url",
        alias = "fileUrl"
    )]
    pub url: Option<String>,
}

impl FileMeta {
    /// Identity used to keep each file in a list exactly once.
    pub fn key(&self) -> String {
        match &self.id {
            Some(id) => format!("id:{}", id),
            None => format!("name:{}", self.name.to_lowercase()),
        }
    }

    /// Human-readable size.
    pub fn size_label(&self) -> String {
        const KB: u64 = 1024;
        const MB: u64 = KB * 1024;
        match self.size {
            0 => "-".to_string(),
            s if s < KB => format!("{} B", s),
            s if s < MB => format!("{:.1} KB", s as f64 / KB as f64),
            s => format!("{:.1} MB", s as f64 / MB as f64),
        }
    }
}

/// An AI diagnostic attached to an engagement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    #[serde(alias = "_id", deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(default, alias = "engagementId", deserialize_with = "flexible_id_opt")]
    pub engagement_id: Option<String>,
    #[serde(default, alias = "name")]
    pub title: Option<String>,
    pub status: DiagnosticStatus,
    #[serde(default, alias = "generated_report", alias = "generatedReport")]
    pub report: Option<Value>,
    #[serde(default, alias = "uploaded_files", alias = "uploadedFiles")]
    pub files: Vec<FileMeta>,
    #[serde(default, alias = "updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Status-only response of the diagnostic status endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct DiagnosticStatusReply {
    pub status: DiagnosticStatus,
}

/// Headline numbers from the dashboard stats endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    #[serde(default, alias = "totalClients", deserialize_with = "flexible_u64")]
    pub total_clients: u64,
    #[serde(default, alias = "activeEngagements", deserialize_with = "flexible_u64")]
    pub active_engagements: u64,
    #[serde(default, alias = "pendingTasks", deserialize_with = "flexible_u64")]
    pub pending_tasks: u64,
    #[serde(default, alias = "totalDiagnostics", deserialize_with = "flexible_u64")]
    pub total_diagnostics: u64,
}

/// Summary of a client listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListingSummary {
    pub total: usize,
    pub active: usize,
    pub pending: usize,
    pub engagements: usize,
    pub by_industry: HashMap<String, usize>,
}

impl ListingSummary {
    /// Creates a summary from a list of client view-models.
    pub fn from_clients(clients: &[Client]) -> Self {
        let mut summary = Self {
            total: clients.len(),
            ..Self::default()
        };

        for client in clients {
            match client.status {
                ClientStatus::Active => summary.active += 1,
                ClientStatus::Pending => summary.pending += 1,
            }
            summary.engagements += client.engagements;

            if !client.industry.is_empty() {
                *summary
                    .by_industry
                    .entry(client.industry.clone())
                    .or_insert(0) += 1;
            }
        }

        summary
    }
}

/// Metadata about a generated clients report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub api_url: String,
    pub generated_at: DateTime<Utc>,
    pub user_name: String,
    pub role: Role,
    pub strategy: String,
    pub duration_seconds: f64,
}

/// The complete clients report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientsReport {
    pub metadata: ReportMetadata,
    pub clients: Vec<Client>,
    pub summary: ListingSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<DashboardStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
