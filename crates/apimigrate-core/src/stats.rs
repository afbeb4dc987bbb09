use crate::types::ProxyAnalysis;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use utoipa::ToSchema;

const RECENT_LIMIT: usize = 5;
const TOP_POLICY_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PolicyCount {
    pub policy: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DashboardStats {
    pub total_analyses: usize,
    pub avg_complexity: f64,
    pub complexity_distribution: BTreeMap<String, usize>,
    pub recent_analyses: Vec<ProxyAnalysis>,
    pub top_policies: Vec<PolicyCount>,
}

impl DashboardStats {
    pub fn from_analyses(analyses: &[ProxyAnalysis]) -> Self {
        let total = analyses.len();

        let avg = if total == 0 {
            0.0
        } else {
            analyses.iter().map(|a| a.complexity_score).sum::<f64>() / total as f64
        };

        let mut distribution = BTreeMap::new();
        for a in analyses {
            *distribution
                .entry(a.complexity_level.as_str().to_string())
                .or_insert(0) += 1;
        }

        let mut recent: Vec<ProxyAnalysis> = analyses.to_vec();
        recent.sort_by(|a, b| b.analyzed_at.cmp(&a.analyzed_at));
        recent.truncate(RECENT_LIMIT);

        let mut policy_counts: HashMap<&str, usize> = HashMap::new();
        for mapping in analyses.iter().flat_map(|a| a.policy_mappings.iter()) {
            *policy_counts.entry(mapping.edge_policy.as_str()).or_insert(0) += 1;
        }
        let mut top_policies: Vec<PolicyCount> = policy_counts
            .into_iter()
            .map(|(policy, count)| PolicyCount {
                policy: policy.to_string(),
                count,
            })
            .collect();
        top_policies.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.policy.cmp(&b.policy)));
        top_policies.truncate(TOP_POLICY_LIMIT);

        Self {
            total_analyses: total,
            avg_complexity: (avg * 10.0).round() / 10.0,
            complexity_distribution: distribution,
            recent_analyses: recent,
            top_policies,
        }
    }
}
