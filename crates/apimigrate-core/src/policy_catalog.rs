//! Known Apigee Edge policies, their Apigee X counterparts and the
//! point-based complexity heuristic used when scoring a proxy.

use crate::types::{Complexity, PolicyMapping, ProxyAnalysis};
use serde::{Deserialize, Serialize};

/// Target name used for policies the catalog does not know.
pub const MANUAL_MIGRATION: &str = "Manual Migration Required";

const UNKNOWN_POLICY_POINTS: u32 = 75;

#[derive(Debug, Clone, Copy)]
pub struct CatalogEntry {
    pub edge_policy: &'static str,
    pub apigee_x: &'static str,
    pub complexity: Complexity,
    pub notes: &'static str,
}

static CATALOG: &[CatalogEntry] = &[
    // Authentication & Security
    CatalogEntry {
        edge_policy: "OAuth2",
        apigee_x: "OAuthV2",
        complexity: Complexity::Simple,
        notes: "Direct mapping with minimal changes",
    },
    CatalogEntry {
        edge_policy: "VerifyAPIKey",
        apigee_x: "VerifyAPIKey",
        complexity: Complexity::Simple,
        notes: "Same policy, no changes needed",
    },
    CatalogEntry {
        edge_policy: "BasicAuthentication",
        apigee_x: "BasicAuthentication",
        complexity: Complexity::Simple,
        notes: "Direct mapping",
    },
    CatalogEntry {
        edge_policy: "SAML",
        apigee_x: "SAMLAssertion",
        complexity: Complexity::Moderate,
        notes: "May require configuration adjustments",
    },
    // Rate Limiting & Quotas
    CatalogEntry {
        edge_policy: "Quota",
        apigee_x: "Quota",
        complexity: Complexity::Simple,
        notes: "Direct mapping",
    },
    CatalogEntry {
        edge_policy: "SpikeArrest",
        apigee_x: "SpikeArrest",
        complexity: Complexity::Simple,
        notes: "No changes needed",
    },
    CatalogEntry {
        edge_policy: "ConcurrentRateLimit",
        apigee_x: "ConcurrentRateLimit",
        complexity: Complexity::Simple,
        notes: "Direct mapping",
    },
    // Transformation
    CatalogEntry {
        edge_policy: "JSONtoXML",
        apigee_x: "JSONtoXML",
        complexity: Complexity::Simple,
        notes: "Direct mapping",
    },
    CatalogEntry {
        edge_policy: "XMLtoJSON",
        apigee_x: "XMLtoJSON",
        complexity: Complexity::Simple,
        notes: "Direct mapping",
    },
    CatalogEntry {
        edge_policy: "XSL",
        apigee_x: "XSL",
        complexity: Complexity::Moderate,
        notes: "May need XSLT validation",
    },
    // JavaScript & Custom
    CatalogEntry {
        edge_policy: "JavaScript",
        apigee_x: "JavaScript",
        complexity: Complexity::Complex,
        notes: "Requires code review and testing",
    },
    CatalogEntry {
        edge_policy: "Node.js",
        apigee_x: "NodeJS",
        complexity: Complexity::Complex,
        notes: "May require updates to Node.js runtime",
    },
    CatalogEntry {
        edge_policy: "Python",
        apigee_x: "Python",
        complexity: Complexity::Complex,
        notes: "Custom runtime policy, needs migration planning",
    },
    // Traffic Management
    CatalogEntry {
        edge_policy: "LoadBalancer",
        apigee_x: "LoadBalancing",
        complexity: Complexity::Moderate,
        notes: "Configuration may need updates",
    },
    CatalogEntry {
        edge_policy: "ServiceCallout",
        apigee_x: "ServiceCallout",
        complexity: Complexity::Simple,
        notes: "Direct mapping",
    },
    CatalogEntry {
        edge_policy: "RaiseFault",
        apigee_x: "RaiseFault",
        complexity: Complexity::Simple,
        notes: "Direct mapping",
    },
];

pub fn lookup(edge_policy: &str) -> Option<&'static CatalogEntry> {
    CATALOG.iter().find(|e| e.edge_policy == edge_policy)
}

pub fn complexity_points(complexity: Complexity) -> u32 {
    match complexity {
        Complexity::Simple => 10,
        Complexity::Moderate => 25,
        Complexity::Complex => 50,
    }
}

/// Maps a single Edge policy and returns its heuristic weight.
pub fn map_policy(edge_policy: &str) -> (PolicyMapping, u32) {
    match lookup(edge_policy) {
        Some(entry) => (
            PolicyMapping {
                edge_policy: edge_policy.to_string(),
                apigee_x_equivalent: entry.apigee_x.to_string(),
                complexity: entry.complexity,
                migration_notes: entry.notes.to_string(),
                custom_code_required: entry.complexity == Complexity::Complex,
            },
            complexity_points(entry.complexity),
        ),
        None => (manual_mapping(edge_policy), UNKNOWN_POLICY_POINTS),
    }
}

fn manual_mapping(edge_policy: &str) -> PolicyMapping {
    PolicyMapping {
        edge_policy: edge_policy.to_string(),
        apigee_x_equivalent: MANUAL_MIGRATION.to_string(),
        complexity: Complexity::Complex,
        migration_notes: "Custom policy requires manual analysis and migration".to_string(),
        custom_code_required: true,
    }
}

/// Weight of a mapping that may have been edited by a user.
pub fn mapping_points(mapping: &PolicyMapping) -> u32 {
    if mapping.apigee_x_equivalent == MANUAL_MIGRATION {
        UNKNOWN_POLICY_POINTS
    } else {
        complexity_points(mapping.complexity)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyBreakdown {
    pub mappings: Vec<PolicyMapping>,
    pub custom_policies: Vec<String>,
    pub total_points: u32,
}

pub fn map_policies<S: AsRef<str>>(policies: &[S]) -> PolicyBreakdown {
    let mut breakdown = PolicyBreakdown {
        mappings: Vec::with_capacity(policies.len()),
        custom_policies: Vec::new(),
        total_points: 0,
    };
    for policy in policies {
        let policy = policy.as_ref();
        let (mapping, points) = map_policy(policy);
        if mapping.apigee_x_equivalent == MANUAL_MIGRATION {
            breakdown.custom_policies.push(policy.to_string());
        }
        breakdown.total_points += points;
        breakdown.mappings.push(mapping);
    }
    breakdown
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub complexity_score: f64,
    pub complexity_level: Complexity,
    pub migration_effort: String,
}

pub fn heuristic_score(total_points: u32, policy_count: usize) -> f64 {
    if policy_count == 0 {
        return 0.0;
    }
    (total_points as f64 / policy_count as f64).min(100.0)
}

/// Blends the heuristic with an optional AI score and derives the level.
pub fn assess(
    total_points: u32,
    policy_count: usize,
    ai_score: Option<f64>,
    ai_effort: Option<&str>,
) -> Assessment {
    let mut score = heuristic_score(total_points, policy_count);
    if let Some(ai) = ai_score.filter(|s| *s != 0.0 && s.is_finite()) {
        score = (score + ai.clamp(0.0, 100.0)) / 2.0;
    }

    let (level, default_effort) = if score < 30.0 {
        (Complexity::Simple, "1-2 hours")
    } else if score < 70.0 {
        (Complexity::Moderate, "4-8 hours")
    } else {
        (Complexity::Complex, "1-3 days")
    };

    let migration_effort = ai_effort
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .unwrap_or(default_effort)
        .to_string();

    Assessment {
        complexity_score: score,
        complexity_level: level,
        migration_effort,
    }
}

/// Recomputes score, level, effort and custom policies after a user edited
/// the mappings. The heuristic alone decides; any earlier AI blend is dropped.
pub fn reassess(analysis: &mut ProxyAnalysis) {
    let total_points: u32 = analysis.policy_mappings.iter().map(mapping_points).sum();
    let assessment = assess(total_points, analysis.policy_mappings.len(), None, None);
    analysis.complexity_score = assessment.complexity_score;
    analysis.complexity_level = assessment.complexity_level;
    analysis.migration_effort = assessment.migration_effort;
    analysis.policy_count = analysis.policy_mappings.len();
    analysis.custom_policies = analysis
        .policy_mappings
        .iter()
        .filter(|m| m.apigee_x_equivalent == MANUAL_MIGRATION)
        .map(|m| m.edge_policy.clone())
        .collect();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_policy_maps_to_catalog_entry() {
        let (mapping, points) = map_policy("OAuth2");
        assert_eq!(mapping.apigee_x_equivalent, "OAuthV2");
        assert_eq!(mapping.complexity, Complexity::Simple);
        assert!(!mapping.custom_code_required);
        assert_eq!(points, 10);

        let (mapping, points) = map_policy("JavaScript");
        assert!(mapping.custom_code_required);
        assert_eq!(points, 50);
    }

    #[test]
    fn unknown_policy_requires_manual_migration() {
        let breakdown = map_policies(&["Quota", "Assign-Message-1"]);
        assert_eq!(breakdown.custom_policies, vec!["Assign-Message-1".to_string()]);
        assert_eq!(breakdown.total_points, 85);
        assert_eq!(breakdown.mappings[1].apigee_x_equivalent, MANUAL_MIGRATION);
        assert!(breakdown.mappings[1].custom_code_required);
    }

    #[test]
    fn empty_proxy_scores_zero() {
        let a = assess(0, 0, None, None);
        assert_eq!(a.complexity_score, 0.0);
        assert_eq!(a.complexity_level, Complexity::Simple);
        assert_eq!(a.migration_effort, "1-2 hours");
    }

    #[test]
    fn ai_score_is_averaged_in() {
        // heuristic 50 (single JavaScript policy), AI 90 -> 70 -> complex
        let a = assess(50, 1, Some(90.0), None);
        assert_eq!(a.complexity_score, 70.0);
        assert_eq!(a.complexity_level, Complexity::Complex);
        assert_eq!(a.migration_effort, "1-3 days");
    }

    #[test]
    fn zero_ai_score_is_ignored_and_effort_overrides() {
        let a = assess(25, 1, Some(0.0), Some("3 hours"));
        assert_eq!(a.complexity_score, 25.0);
        assert_eq!(a.complexity_level, Complexity::Simple);
        assert_eq!(a.migration_effort, "3 hours");
    }

    #[test]
    fn heuristic_is_capped_at_one_hundred() {
        assert_eq!(heuristic_score(500, 2), 100.0);
    }

    #[test]
    fn reassess_after_editing_a_manual_mapping() {
        let breakdown = map_policies(&["Quota", "CustomThing"]);
        let mut analysis = ProxyAnalysis {
            id: "a".into(),
            proxy_id: "p".into(),
            proxy_name: "orders".into(),
            complexity_score: 90.0,
            complexity_level: Complexity::Complex,
            policy_count: 2,
            custom_policies: breakdown.custom_policies,
            policy_mappings: breakdown.mappings,
            dependencies: vec![],
            migration_effort: "2 weeks".into(),
            ai_recommendations: String::new(),
            analyzed_at: chrono::Utc::now(),
            status: crate::AnalysisStatus::Completed,
        };

        analysis.policy_mappings[1].apigee_x_equivalent = "AssignMessage".into();
        analysis.policy_mappings[1].complexity = Complexity::Moderate;
        reassess(&mut analysis);

        // (10 + 25) / 2
        assert_eq!(analysis.complexity_score, 17.5);
        assert_eq!(analysis.complexity_level, Complexity::Simple);
        assert_eq!(analysis.migration_effort, "1-2 hours");
        assert!(analysis.custom_policies.is_empty());
    }
}
