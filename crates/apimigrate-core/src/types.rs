use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

pub type RecordId = String;

pub fn new_record_id() -> RecordId {
    Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Xml,
    Json,
    Zip,
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileType::Xml => write!(f, "xml"),
            FileType::Json => write!(f, "json"),
            FileType::Zip => write!(f, "zip"),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Complexity::Simple => "simple",
            Complexity::Moderate => "moderate",
            Complexity::Complex => "complex",
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Complexity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(Complexity::Simple),
            "moderate" => Ok(Complexity::Moderate),
            "complex" => Ok(Complexity::Complex),
            other => Err(format!("unknown complexity level: {}", other)),
        }
    }
}

/// An uploaded Edge proxy definition.
///
/// ZIP uploads keep the extracted bundle as a JSON document in `content`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProxyFile {
    pub id: RecordId,
    pub filename: String,
    pub content: String,
    pub file_type: FileType,
    pub uploaded_at: DateTime<Utc>,
}

impl ProxyFile {
    pub fn new(filename: impl Into<String>, content: String, file_type: FileType) -> Self {
        Self {
            id: new_record_id(),
            filename: filename.into(),
            content,
            file_type,
            uploaded_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PolicyMapping {
    pub edge_policy: String,
    pub apigee_x_equivalent: String,
    pub complexity: Complexity,
    pub migration_notes: String,
    #[serde(default)]
    pub custom_code_required: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProxyAnalysis {
    pub id: RecordId,
    pub proxy_id: RecordId,
    pub proxy_name: String,
    /// 0-100
    pub complexity_score: f64,
    pub complexity_level: Complexity,
    pub policy_count: usize,
    #[serde(default)]
    pub custom_policies: Vec<String>,
    #[serde(default)]
    pub policy_mappings: Vec<PolicyMapping>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub migration_effort: String,
    pub ai_recommendations: String,
    pub analyzed_at: DateTime<Utc>,
    #[serde(default)]
    pub status: AnalysisStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl From<Complexity> for Priority {
    fn from(level: Complexity) -> Self {
        match level {
            Complexity::Complex => Priority::High,
            Complexity::Moderate => Priority::Medium,
            Complexity::Simple => Priority::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    #[default]
    Draft,
    Approved,
    InProgress,
    Completed,
    Failed,
}

impl PlanStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlanStatus::Completed | PlanStatus::Failed)
    }

    pub fn can_transition_to(&self, next: PlanStatus) -> bool {
        use PlanStatus::*;
        match (self, next) {
            (Draft, Approved) | (Approved, InProgress) | (InProgress, Completed) => true,
            // Re-open an approved plan for edits
            (Approved, Draft) => true,
            (current, Failed) => !current.is_terminal(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PlanStep {
    pub order: usize,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_policy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<Complexity>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MigrationPlan {
    pub id: RecordId,
    pub proxy_analysis_id: RecordId,
    #[serde(default)]
    pub migration_steps: Vec<PlanStep>,
    pub estimated_time: String,
    pub priority: Priority,
    #[serde(default)]
    pub blockers: Vec<String>,
    #[serde(default)]
    pub status: PlanStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MigrationPlan {
    /// Draft plan derived from an analysis: one step per policy mapping
    /// between setup and deployment, custom policies as blockers.
    pub fn draft(analysis: &ProxyAnalysis) -> Self {
        let mut steps = vec![PlanStep {
            order: 1,
            title: "Prepare Apigee X environment".to_string(),
            description: format!(
                "Create the target environment and import proxy '{}'",
                analysis.proxy_name
            ),
            edge_policy: None,
            complexity: None,
        }];
        for mapping in &analysis.policy_mappings {
            steps.push(PlanStep {
                order: steps.len() + 1,
                title: format!(
                    "Migrate {} to {}",
                    mapping.edge_policy, mapping.apigee_x_equivalent
                ),
                description: mapping.migration_notes.clone(),
                edge_policy: Some(mapping.edge_policy.clone()),
                complexity: Some(mapping.complexity),
            });
        }
        steps.push(PlanStep {
            order: steps.len() + 1,
            title: "Deploy and verify".to_string(),
            description: "Deploy the bundle and run regression tests against the new gateway"
                .to_string(),
            edge_policy: None,
            complexity: None,
        });

        let now = Utc::now();
        Self {
            id: new_record_id(),
            proxy_analysis_id: analysis.id.clone(),
            migration_steps: steps,
            estimated_time: analysis.migration_effort.clone(),
            priority: analysis.complexity_level.into(),
            blockers: analysis
                .custom_policies
                .iter()
                .map(|p| format!("Custom policy '{}' requires manual migration", p))
                .collect(),
            status: PlanStatus::Draft,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Credential payload as submitted by a client. Secrets arrive in plain text
/// and are sealed before they reach the store.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ApigeeCredentials {
    pub name: String,
    pub edge_org: String,
    pub edge_env: String,
    pub edge_username: String,
    pub edge_password: String,
    pub apigee_x_project: String,
    pub apigee_x_env: String,
    /// Service account JSON key as a string
    pub apigee_x_service_account: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredentials {
    pub id: RecordId,
    pub name: String,
    pub edge_org: String,
    pub edge_env: String,
    pub edge_username: String,
    pub sealed_edge_password: String,
    pub apigee_x_project: String,
    pub apigee_x_env: String,
    pub sealed_service_account: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CredentialSummary {
    pub id: RecordId,
    pub name: String,
    pub edge_org: String,
    pub edge_env: String,
    pub apigee_x_project: String,
    pub apigee_x_env: String,
    pub created_at: DateTime<Utc>,
}

impl From<&StoredCredentials> for CredentialSummary {
    fn from(c: &StoredCredentials) -> Self {
        Self {
            id: c.id.clone(),
            name: c.name.clone(),
            edge_org: c.edge_org.clone(),
            edge_env: c.edge_env.clone(),
            apigee_x_project: c.apigee_x_project.clone(),
            apigee_x_env: c.apigee_x_env.clone(),
            created_at: c.created_at,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum MigrationStatus {
    #[default]
    Pending,
    Preparing,
    Converting,
    Validating,
    Deploying,
    Completed,
    Failed,
}

impl MigrationStatus {
    /// Position along the linear pipeline. `Failed` sits outside the order.
    pub fn rank(&self) -> Option<u8> {
        match self {
            MigrationStatus::Pending => Some(0),
            MigrationStatus::Preparing => Some(1),
            MigrationStatus::Converting => Some(2),
            MigrationStatus::Validating => Some(3),
            MigrationStatus::Deploying => Some(4),
            MigrationStatus::Completed => Some(5),
            MigrationStatus::Failed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MigrationStatus::Completed | MigrationStatus::Failed)
    }

    pub fn is_cancellable(&self) -> bool {
        matches!(
            self,
            MigrationStatus::Pending
                | MigrationStatus::Preparing
                | MigrationStatus::Converting
                | MigrationStatus::Validating
        )
    }

    /// Forward-only transitions; any live state may fail.
    pub fn can_advance_to(&self, next: MigrationStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self.rank(), next.rank()) {
            (_, None) => true,
            (Some(current), Some(target)) => target >= current,
            (None, Some(_)) => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationStatus::Pending => "pending",
            MigrationStatus::Preparing => "preparing",
            MigrationStatus::Converting => "converting",
            MigrationStatus::Validating => "validating",
            MigrationStatus::Deploying => "deploying",
            MigrationStatus::Completed => "completed",
            MigrationStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum TargetEnvironment {
    #[default]
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MigrationExecution {
    pub id: RecordId,
    pub proxy_analysis_id: RecordId,
    pub proxy_name: String,
    pub credentials_id: RecordId,
    #[serde(default)]
    pub target_environment: TargetEnvironment,
    #[serde(default)]
    pub auto_deploy: bool,
    #[serde(default)]
    pub status: MigrationStatus,
    /// 0-100, never decreases
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub current_step: String,
    #[serde(default)]
    pub steps_completed: Vec<String>,
    #[serde(default)]
    pub steps_failed: Vec<String>,
    #[serde(default)]
    pub migration_log: Vec<String>,
    pub apigee_x_bundle: Option<String>,
    pub deployment_url: Option<String>,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MigrationExecution {
    pub fn queued(
        proxy_analysis_id: impl Into<String>,
        proxy_name: impl Into<String>,
        request: &MigrationRequest,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: new_record_id(),
            proxy_analysis_id: proxy_analysis_id.into(),
            proxy_name: proxy_name.into(),
            credentials_id: request.credentials_id.clone(),
            target_environment: request.target_environment,
            auto_deploy: request.auto_deploy,
            status: MigrationStatus::Pending,
            progress: 0,
            current_step: "Queued for migration".to_string(),
            steps_completed: Vec::new(),
            steps_failed: Vec::new(),
            migration_log: Vec::new(),
            apigee_x_bundle: None,
            deployment_url: None,
            error_message: None,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Marks the execution failed unless it already reached a terminal state.
    pub fn fail(&mut self, message: impl Into<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        let now = Utc::now();
        self.status = MigrationStatus::Failed;
        self.error_message = Some(message.into());
        self.completed_at = Some(now);
        self.updated_at = now;
        true
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MigrationRequest {
    pub proxy_analysis_ids: Vec<RecordId>,
    pub credentials_id: RecordId,
    #[serde(default)]
    pub target_environment: TargetEnvironment,
    #[serde(default)]
    pub auto_deploy: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConversionStatus {
    #[default]
    Pending,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SwaggerDoc {
    pub id: RecordId,
    pub filename: String,
    #[schema(value_type = Object)]
    pub original_spec: serde_json::Value,
    pub spec_version: String,
    pub uploaded_at: DateTime<Utc>,
    #[schema(value_type = Option<Object>)]
    pub migrated_spec: Option<serde_json::Value>,
    #[serde(default)]
    pub conversion_status: ConversionStatus,
    #[serde(default)]
    pub converted_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migration_status_moves_forward_only() {
        use MigrationStatus::*;
        assert!(Pending.can_advance_to(Preparing));
        assert!(Converting.can_advance_to(Converting));
        assert!(Validating.can_advance_to(Deploying));
        assert!(!Validating.can_advance_to(Converting));
        assert!(Deploying.can_advance_to(Failed));
        assert!(!Completed.can_advance_to(Failed));
        assert!(!Failed.can_advance_to(Completed));
    }

    #[test]
    fn deploying_cannot_be_cancelled() {
        assert!(MigrationStatus::Validating.is_cancellable());
        assert!(!MigrationStatus::Deploying.is_cancellable());
        assert!(!MigrationStatus::Completed.is_cancellable());
    }

    #[test]
    fn fail_leaves_terminal_records_alone() {
        let request = MigrationRequest {
            proxy_analysis_ids: vec![],
            credentials_id: "c".into(),
            target_environment: TargetEnvironment::default(),
            auto_deploy: false,
        };
        let mut exec = MigrationExecution::queued("a", "proxy", &request);
        assert!(exec.fail("boom"));
        assert_eq!(exec.status, MigrationStatus::Failed);
        assert!(!exec.fail("again"));
        assert_eq!(exec.error_message.as_deref(), Some("boom"));
    }

    #[test]
    fn plan_status_transitions() {
        assert!(PlanStatus::Draft.can_transition_to(PlanStatus::Approved));
        assert!(!PlanStatus::Draft.can_transition_to(PlanStatus::Completed));
        assert!(PlanStatus::InProgress.can_transition_to(PlanStatus::Failed));
        assert!(!PlanStatus::Completed.can_transition_to(PlanStatus::Failed));
    }

    #[test]
    fn statuses_serialize_lowercase() {
        let json = serde_json::to_string(&MigrationStatus::Validating).unwrap();
        assert_eq!(json, "\"validating\"");
        let json = serde_json::to_string(&PlanStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }

    #[test]
    fn draft_plan_follows_the_analysis() {
        let analysis = ProxyAnalysis {
            id: "analysis-1".into(),
            proxy_id: "proxy-1".into(),
            proxy_name: "orders".into(),
            complexity_score: 75.0,
            complexity_level: Complexity::Complex,
            policy_count: 1,
            custom_policies: vec!["Legacy-Auth".into()],
            policy_mappings: vec![PolicyMapping {
                edge_policy: "Legacy-Auth".into(),
                apigee_x_equivalent: "Manual Migration Required".into(),
                complexity: Complexity::Complex,
                migration_notes: "Custom policy requires manual analysis and migration".into(),
                custom_code_required: true,
            }],
            dependencies: vec![],
            migration_effort: "1-3 days".into(),
            ai_recommendations: String::new(),
            analyzed_at: Utc::now(),
            status: AnalysisStatus::Completed,
        };

        let plan = MigrationPlan::draft(&analysis);
        assert_eq!(plan.status, PlanStatus::Draft);
        assert_eq!(plan.priority, Priority::High);
        assert_eq!(plan.estimated_time, "1-3 days");
        assert_eq!(plan.migration_steps.len(), 3);
        assert_eq!(plan.migration_steps[1].edge_policy.as_deref(), Some("Legacy-Auth"));
        assert_eq!(plan.migration_steps[2].order, 3);
        assert_eq!(plan.blockers.len(), 1);
    }
}
