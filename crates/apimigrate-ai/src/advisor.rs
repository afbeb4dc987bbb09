//! Prompts and response handling for the three AI-assisted operations:
//! proxy complexity analysis, Edge→X bundle conversion and OpenAPI
//! conversion. Every operation degrades to a deterministic answer when no
//! provider is configured or the provider fails.

use crate::llm_provider::{GenerationConfig, LLMProvider, Message};
use apimigrate_bundle::fallback_conversion;
use apimigrate_core::PolicyMapping;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, warn};

pub const NO_PROVIDER_MESSAGE: &str = "AI analysis unavailable - API key not configured";
pub const NO_RECOMMENDATIONS: &str = "No AI recommendations available";

const ANALYSIS_PREVIEW_CHARS: usize = 2000;
const CONVERSION_PREVIEW_CHARS: usize = 3000;
const RAW_REPLY_CHARS: usize = 500;
/// Score reported when no model answer is available; blended like any other.
const NEUTRAL_SCORE: f64 = 50.0;
const ANALYSIS_MAX_TOKENS: usize = 2000;
const CONVERSION_MAX_TOKENS: usize = 4000;

const ANALYSIS_SYSTEM: &str = "You are an expert in Apigee Edge to Apigee X migrations. Analyze proxy configurations and provide migration complexity assessments.";
const BUNDLE_SYSTEM: &str = "You are an expert in converting Apigee Edge configurations to Apigee X format. Generate valid Apigee X proxy bundles.";
const SWAGGER_SYSTEM: &str = "You are an expert in API documentation and Apigee X. Convert Swagger/OpenAPI specifications to be optimized for Apigee X platform.";

// Greedy: first '{' to last '}'
static JSON_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"));

/// What the model had to say about a proxy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AiAssessment {
    pub complexity_score: Option<f64>,
    pub complexity_reasoning: Option<String>,
    pub migration_effort: Option<String>,
    pub key_challenges: Vec<String>,
    pub recommendations: String,
    pub custom_policies: Vec<String>,
}

impl AiAssessment {
    fn unavailable() -> Self {
        Self {
            complexity_score: Some(NEUTRAL_SCORE),
            recommendations: NO_PROVIDER_MESSAGE.to_string(),
            ..Self::default()
        }
    }

    fn failed(err: &anyhow::Error) -> Self {
        Self {
            complexity_score: Some(NEUTRAL_SCORE),
            migration_effort: Some("Unknown".to_string()),
            recommendations: format!("AI analysis failed: {}", err),
            key_challenges: vec!["Analysis unavailable".to_string()],
            ..Self::default()
        }
    }

    fn unstructured(reply: &str) -> Self {
        Self {
            complexity_score: Some(NEUTRAL_SCORE),
            complexity_reasoning: Some("AI analysis completed".to_string()),
            migration_effort: Some("2-4 hours".to_string()),
            key_challenges: vec!["Standard migration requirements".to_string()],
            recommendations: truncate_chars(reply, RAW_REPLY_CHARS),
            custom_policies: Vec::new(),
        }
    }

    /// Text stored on the analysis record.
    pub fn recommendations_text(&self) -> String {
        if self.recommendations.trim().is_empty() {
            NO_RECOMMENDATIONS.to_string()
        } else {
            self.recommendations.clone()
        }
    }
}

pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn extract_json_object(reply: &str) -> Option<Value> {
    let span = JSON_OBJECT.find(reply)?;
    serde_json::from_str::<Value>(span.as_str())
        .ok()
        .filter(Value::is_object)
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(text_of).collect::<Vec<_>>().join(" "),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn list_of(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(text_of)
            .filter(|s| !s.trim().is_empty())
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn score_of(value: Option<&Value>) -> Option<f64> {
    let score = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').parse().ok(),
        _ => None,
    }?;
    score.is_finite().then(|| score.clamp(0.0, 100.0))
}

pub fn parse_assessment(reply: &str) -> AiAssessment {
    let Some(doc) = extract_json_object(reply) else {
        debug!("AI reply had no JSON object, keeping raw text");
        return AiAssessment::unstructured(reply);
    };

    let optional_text = |key: &str| {
        doc.get(key)
            .map(text_of)
            .filter(|s| !s.trim().is_empty())
    };

    AiAssessment {
        complexity_score: score_of(doc.get("complexity_score")),
        complexity_reasoning: optional_text("complexity_reasoning"),
        migration_effort: optional_text("migration_effort"),
        key_challenges: list_of(doc.get("key_challenges")),
        recommendations: doc.get("recommendations").map(text_of).unwrap_or_default(),
        custom_policies: list_of(doc.get("custom_policies")),
    }
}

/// Returns the `<?xml ... </APIProxy>` span of a reply, or the whole reply.
pub fn extract_bundle_xml(reply: &str) -> String {
    const CLOSE: &str = "</APIProxy>";
    if let Some(start) = reply.find("<?xml") {
        if let Some(close) = reply.rfind(CLOSE) {
            let end = close + CLOSE.len();
            if end > start {
                return reply[start..end].to_string();
            }
        }
    }
    reply.to_string()
}

fn analysis_prompt(content: &str, policies: &[String]) -> String {
    format!(
        r#"
Analyze this Apigee Edge proxy configuration for migration to Apigee X:

Policies found: {policies}

Proxy content preview:
{preview}...

Provide a JSON response with:
1. complexity_score (0-100, where 0=simple, 100=very complex)
2. complexity_reasoning (why this score)
3. migration_effort (estimated hours/days)
4. key_challenges (list of main migration challenges)
5. recommendations (specific migration recommendations)
6. custom_policies (list of any custom/non-standard policies detected)

Focus on:
- Custom JavaScript/Node.js code
- Non-standard policy usage
- Complex integrations
- Deprecated features
- Security implications
"#,
        policies = policies.join(", "),
        preview = truncate_chars(content, ANALYSIS_PREVIEW_CHARS),
    )
}

fn bundle_prompt(content: &str, mappings: &[PolicyMapping]) -> String {
    let mappings_json = serde_json::to_string_pretty(mappings).unwrap_or_else(|_| "[]".to_string());
    format!(
        r#"
Convert this Apigee Edge proxy configuration to Apigee X format:

Original Edge Configuration:
{preview}...

Policy Mappings to Apply:
{mappings_json}

Requirements:
1. Convert all policies to Apigee X equivalents
2. Update policy configurations for Apigee X compatibility
3. Ensure proper flow structure
4. Handle custom policies appropriately
5. Return valid XML configuration

Generate the complete Apigee X proxy bundle XML.
"#,
        preview = truncate_chars(content, CONVERSION_PREVIEW_CHARS),
    )
}

fn swagger_prompt(spec: &Value) -> String {
    let pretty = serde_json::to_string_pretty(spec).unwrap_or_default();
    format!(
        r#"
Convert this Swagger/OpenAPI specification to be optimized for Apigee X:

Original Specification:
{preview}...

Requirements for Apigee X conversion:
1. Upgrade to OpenAPI 3.0+ if it's Swagger 2.0
2. Add Apigee X specific security policies (OAuth 2.0, API Key)
3. Add rate limiting and quota policies in x-google-* extensions
4. Update server URLs for Apigee X format
5. Add proper error response schemas
6. Include CORS configuration
7. Add health check endpoints
8. Optimize for Apigee X performance

Return a valid OpenAPI 3.0 specification optimized for Apigee X deployment.
"#,
        preview = truncate_chars(&pretty, CONVERSION_PREVIEW_CHARS),
    )
}

/// AI front door used by the analysis handler, the Swagger converter and
/// the migration runner.
#[derive(Clone)]
pub struct MigrationAdvisor {
    provider: Option<Arc<dyn LLMProvider>>,
    temperature: f32,
}

impl std::fmt::Debug for MigrationAdvisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationAdvisor")
            .field("provider", &self.provider_name())
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl MigrationAdvisor {
    pub fn new(provider: Option<Arc<dyn LLMProvider>>) -> Self {
        Self {
            provider,
            temperature: 0.1,
        }
    }

    /// Heuristics only.
    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    pub fn provider_name(&self) -> Option<&str> {
        self.provider.as_deref().map(|p| p.provider_name())
    }

    fn generation(&self, max_tokens: usize) -> GenerationConfig {
        GenerationConfig::default()
            .with_max_tokens(max_tokens)
            .with_temperature(self.temperature)
    }

    async fn ask(
        &self,
        provider: &dyn LLMProvider,
        system: &str,
        prompt: String,
        max_tokens: usize,
    ) -> anyhow::Result<String> {
        let messages = [Message::system(system), Message::user(prompt)];
        let response = provider
            .generate_chat(&messages, &self.generation(max_tokens))
            .await?;
        debug!(
            model = %response.model,
            tokens = ?response.total_tokens,
            "AI response received"
        );
        Ok(response.content)
    }

    pub async fn analyze_proxy(&self, content: &str, policies: &[String]) -> AiAssessment {
        let Some(provider) = self.provider.as_deref() else {
            return AiAssessment::unavailable();
        };

        match self
            .ask(
                provider,
                ANALYSIS_SYSTEM,
                analysis_prompt(content, policies),
                ANALYSIS_MAX_TOKENS,
            )
            .await
        {
            Ok(reply) => parse_assessment(&reply),
            Err(e) => {
                error!("AI analysis error: {:#}", e);
                AiAssessment::failed(&e)
            }
        }
    }

    /// Apigee X bundle XML for an Edge proxy; the input is returned
    /// unchanged when no model is available.
    pub async fn convert_bundle(&self, content: &str, mappings: &[PolicyMapping]) -> String {
        let Some(provider) = self.provider.as_deref() else {
            return content.to_string();
        };

        match self
            .ask(
                provider,
                BUNDLE_SYSTEM,
                bundle_prompt(content, mappings),
                CONVERSION_MAX_TOKENS,
            )
            .await
        {
            Ok(reply) => extract_bundle_xml(&reply),
            Err(e) => {
                error!("AI conversion error: {:#}", e);
                content.to_string()
            }
        }
    }

    pub async fn convert_swagger(&self, spec: &Value) -> Value {
        let Some(provider) = self.provider.as_deref() else {
            return fallback_conversion(spec);
        };

        match self
            .ask(
                provider,
                SWAGGER_SYSTEM,
                swagger_prompt(spec),
                CONVERSION_MAX_TOKENS,
            )
            .await
        {
            Ok(reply) => extract_json_object(&reply).unwrap_or_else(|| {
                warn!("AI Swagger conversion returned no JSON document, using fallback");
                fallback_conversion(spec)
            }),
            Err(e) => {
                error!("AI Swagger conversion error: {:#}", e);
                fallback_conversion(spec)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_provider::{LLMResponse, LLMResult};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use apimigrate_core::policy_catalog::{assess, map_policies};
    use apimigrate_core::Complexity;
    use serde_json::json;

    /// Replays a fixed reply and records prompts.
    struct ScriptedProvider {
        reply: Result<String, String>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(message.to_string()),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LLMProvider for ScriptedProvider {
        async fn generate_chat(
            &self,
            messages: &[Message],
            _config: &GenerationConfig,
        ) -> LLMResult<LLMResponse> {
            self.prompts
                .lock()
                .extend(messages.iter().map(|m| m.content.clone()));
            match &self.reply {
                Ok(content) => Ok(LLMResponse {
                    content: content.clone(),
                    total_tokens: None,
                    prompt_tokens: None,
                    completion_tokens: None,
                    finish_reason: Some("stop".into()),
                    model: "scripted".into(),
                }),
                Err(e) => Err(anyhow::anyhow!(e.clone())),
            }
        }

        async fn is_available(&self) -> bool {
            true
        }

        fn provider_name(&self) -> &str {
            "scripted"
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn advisor(provider: Arc<ScriptedProvider>) -> MigrationAdvisor {
        MigrationAdvisor::new(Some(provider as Arc<dyn LLMProvider>))
    }

    #[test]
    fn parses_fenced_json_reply() {
        let reply = r#"Here you go:
```json
{"complexity_score": 62, "migration_effort": "2 days",
 "recommendations": ["Rewrite JS", "Check quotas"],
 "key_challenges": "JavaScript callouts", "custom_policies": ["JS-1"]}
```"#;
        let a = parse_assessment(reply);
        assert_eq!(a.complexity_score, Some(62.0));
        assert_eq!(a.migration_effort.as_deref(), Some("2 days"));
        assert_eq!(a.recommendations, "Rewrite JS Check quotas");
        assert_eq!(a.key_challenges, vec!["JavaScript callouts"]);
        assert_eq!(a.custom_policies, vec!["JS-1"]);
    }

    #[test]
    fn unstructured_reply_keeps_prefix() {
        let reply = "x".repeat(800);
        let a = parse_assessment(&reply);
        assert_eq!(a.complexity_score, Some(50.0));
        assert_eq!(a.migration_effort.as_deref(), Some("2-4 hours"));
        assert_eq!(a.recommendations.len(), 500);
    }

    #[test]
    fn out_of_range_scores_are_clamped() {
        assert_eq!(
            parse_assessment(r#"{"complexity_score": 250}"#).complexity_score,
            Some(100.0)
        );
        assert_eq!(
            parse_assessment(r#"{"complexity_score": "35%"}"#).complexity_score,
            Some(35.0)
        );
        assert_eq!(parse_assessment(r#"{"complexity_score": null}"#).complexity_score, None);
    }

    #[test]
    fn bundle_xml_span() {
        let reply = "Sure!\n<?xml version=\"1.0\"?><APIProxy name=\"x\"></APIProxy>\nDone.";
        assert_eq!(
            extract_bundle_xml(reply),
            "<?xml version=\"1.0\"?><APIProxy name=\"x\"></APIProxy>"
        );
        assert_eq!(extract_bundle_xml("no xml here"), "no xml here");
        assert_eq!(extract_bundle_xml("</APIProxy> then <?xml"), "</APIProxy> then <?xml");
    }

    #[tokio::test]
    async fn disabled_advisor_degrades() {
        let advisor = MigrationAdvisor::disabled();
        let a = advisor.analyze_proxy("<APIProxy/>", &["Quota".into()]).await;
        assert_eq!(a.complexity_score, Some(50.0));
        assert_eq!(a.migration_effort, None);
        assert_eq!(a.recommendations, NO_PROVIDER_MESSAGE);

        assert_eq!(advisor.convert_bundle("<APIProxy/>", &[]).await, "<APIProxy/>");

        let converted = advisor.convert_swagger(&json!({"swagger": "2.0"})).await;
        assert_eq!(converted["openapi"], "3.0.0");
    }

    #[tokio::test]
    async fn analysis_prompt_carries_policies_and_preview() {
        let provider = ScriptedProvider::replying(r#"{"complexity_score": 40}"#);
        let content = "a".repeat(5000);
        let a = advisor(provider.clone())
            .analyze_proxy(&content, &["Quota".into(), "JavaScript".into()])
            .await;
        assert_eq!(a.complexity_score, Some(40.0));
        assert_eq!(a.recommendations_text(), NO_RECOMMENDATIONS);

        let prompts = provider.prompts.lock();
        assert_eq!(prompts[0], ANALYSIS_SYSTEM);
        assert!(prompts[1].contains("Policies found: Quota, JavaScript"));
        assert!(prompts[1].contains(&format!("{}...", "a".repeat(2000))));
        assert!(!prompts[1].contains(&"a".repeat(2001)));
    }

    #[tokio::test]
    async fn missing_model_blends_a_neutral_score() {
        let policies = vec!["Legacy-Auth".to_string()];
        let breakdown = map_policies(&policies);
        let a = MigrationAdvisor::disabled()
            .analyze_proxy("<APIProxy/>", &policies)
            .await;

        let assessment = assess(
            breakdown.total_points,
            policies.len(),
            a.complexity_score,
            a.migration_effort.as_deref(),
        );
        // (75 + 50) / 2
        assert_eq!(assessment.complexity_score, 62.5);
        assert_eq!(assessment.complexity_level, Complexity::Moderate);
        assert_eq!(assessment.migration_effort, "4-8 hours");
    }

    #[tokio::test]
    async fn provider_failure_is_reported() {
        let advisor = advisor(ScriptedProvider::failing("rate limited"));
        let a = advisor.analyze_proxy("<APIProxy/>", &[]).await;
        assert_eq!(a.complexity_score, Some(50.0));
        assert_eq!(a.migration_effort.as_deref(), Some("Unknown"));
        assert_eq!(a.recommendations, "AI analysis failed: rate limited");

        let blended = assess(75, 1, a.complexity_score, a.migration_effort.as_deref());
        assert_eq!(blended.complexity_score, 62.5);
        assert_eq!(blended.migration_effort, "Unknown");

        assert_eq!(advisor.convert_bundle("<Edge/>", &[]).await, "<Edge/>");
        let converted = advisor.convert_swagger(&json!({"openapi": "3.0.0"})).await;
        assert!(converted.get("x-google-management").is_some());
    }

    #[tokio::test]
    async fn swagger_conversion_uses_model_json() {
        let advisor = advisor(ScriptedProvider::replying(
            "```json\n{\"openapi\": \"3.1.0\", \"paths\": {}}\n```",
        ));
        let converted = advisor.convert_swagger(&json!({"swagger": "2.0"})).await;
        assert_eq!(converted, json!({"openapi": "3.1.0", "paths": {}}));
    }
}
