//! The fixed migration template: named steps, the progress each one
//! reaches and the status it moves the execution into.

use apimigrate_core::{MigrationConfig, MigrationStatus};
use std::time::Duration;

pub const VALIDATE_SOURCE: &str = "Validating source proxy";
pub const CONVERT_POLICIES: &str = "Converting policies to Apigee X format";
pub const GENERATE_BUNDLE: &str = "Generating Apigee X bundle with AI";
pub const VALIDATE_BUNDLE: &str = "Validating Apigee X bundle";
pub const DEPLOY: &str = "Deploying to Apigee X (Demo Mode)";

pub const COMPLETED_STEP: &str = "Migration completed successfully";
pub const COMPLETED_LOG: &str = "Migration completed successfully!";
pub const CANCELLED_MESSAGE: &str = "Migration cancelled by user";
pub const INTERRUPTED_MESSAGE: &str = "Interrupted by server restart";
pub const ANALYSIS_MISSING: &str = "Analysis not found";
pub const PROXY_FILE_MISSING: &str = "Proxy file not found";

pub const STARTED_PROGRESS: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAction {
    /// Stand-in for remote work; waits for the configured delay.
    Simulated(Duration),
    GenerateBundle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedStep {
    pub name: &'static str,
    pub action: StepAction,
    /// Status entered before the step starts
    pub status_before: Option<MigrationStatus>,
    /// Progress and status recorded once the step completes
    pub progress_after: Option<u8>,
    pub status_after: Option<MigrationStatus>,
}

/// Steps in execution order for the given delays.
pub fn steps(config: &MigrationConfig) -> [PlannedStep; 5] {
    let ms = Duration::from_millis;
    [
        PlannedStep {
            name: VALIDATE_SOURCE,
            action: StepAction::Simulated(ms(config.validate_source_ms)),
            status_before: None,
            progress_after: Some(25),
            status_after: None,
        },
        PlannedStep {
            name: CONVERT_POLICIES,
            action: StepAction::Simulated(ms(config.convert_policies_ms)),
            status_before: None,
            progress_after: Some(50),
            status_after: Some(MigrationStatus::Converting),
        },
        PlannedStep {
            name: GENERATE_BUNDLE,
            action: StepAction::GenerateBundle,
            status_before: None,
            progress_after: Some(70),
            status_after: None,
        },
        PlannedStep {
            name: VALIDATE_BUNDLE,
            action: StepAction::Simulated(ms(config.validate_bundle_ms)),
            status_before: None,
            progress_after: Some(85),
            status_after: Some(MigrationStatus::Validating),
        },
        PlannedStep {
            name: DEPLOY,
            action: StepAction::Simulated(ms(config.deploy_ms)),
            status_before: Some(MigrationStatus::Deploying),
            progress_after: None,
            status_after: None,
        },
    ]
}

pub fn deployment_url(org: &str, env: &str, proxy_name: &str) -> String {
    format!(
        "https://apigee.google.com/organizations/{}/environments/{}/apis/{}",
        org, env, proxy_name
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_is_monotonic_across_the_plan() {
        let plan = steps(&MigrationConfig::default());
        let progress: Vec<u8> = plan.iter().filter_map(|s| s.progress_after).collect();
        assert_eq!(progress, vec![25, 50, 70, 85]);
        assert!(progress.windows(2).all(|w| w[0] < w[1]));
        assert!(STARTED_PROGRESS < progress[0]);
    }

    #[test]
    fn statuses_only_move_forward() {
        let plan = steps(&MigrationConfig::instant());
        let mut current = MigrationStatus::Preparing;
        for step in plan {
            for next in [step.status_before, step.status_after].into_iter().flatten() {
                assert!(current.can_advance_to(next), "{} -> {}", current, next);
                current = next;
            }
        }
        assert_eq!(current, MigrationStatus::Deploying);
        assert!(current.can_advance_to(MigrationStatus::Completed));
    }

    #[test]
    fn delays_come_from_config() {
        let plan = steps(&MigrationConfig::default());
        assert_eq!(plan[0].action, StepAction::Simulated(Duration::from_secs(2)));
        assert_eq!(plan[1].action, StepAction::Simulated(Duration::from_secs(3)));
        assert!(steps(&MigrationConfig::instant())
            .iter()
            .all(|s| matches!(s.action, StepAction::Simulated(d) if d.is_zero())
                || s.action == StepAction::GenerateBundle));
    }

    #[test]
    fn url_shape() {
        assert_eq!(
            deployment_url("demo-org", "dev", "orders"),
            "https://apigee.google.com/organizations/demo-org/environments/dev/apis/orders"
        );
    }
}
