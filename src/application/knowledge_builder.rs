//! RuntimeKnowledgeBuilder - per-plan cue bundles, generated once and cached.
//!
//! One text-model call per distinct (language, goal, audience, plan
//! signature). The call runs under a hard deadline; a timeout, a provider
//! error or a document that fails shape validation yields the template
//! bundle instead. Both outcomes are cached, so a slow model costs at most
//! one deadline per bundle.
//!
//! The cache holds one bundle per (language, goal, audience) scope. A new
//! plan signature in a scope replaces the old bundle, and the oldest scope
//! is dropped once `MAX_CACHED_SCOPES` is reached.

use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::timeout;

use crate::config::{MAX_KNOWLEDGE_TIMEOUT_MS, MIN_KNOWLEDGE_TIMEOUT_MS};
use crate::domain::interview::{
    ordered_topics, FallbackReason, KnowledgeContext, RuntimeKnowledge, Topic, MAX_CUES_PER_LIST,
};
use crate::ports::{GenerationError, GenerationRequest, TextGenerator};

/// Upper bound on cached scopes.
pub const MAX_CACHED_SCOPES: usize = 256;

struct CachedBundle {
    inserted: u64,
    knowledge: Arc<RuntimeKnowledge>,
}

#[derive(Default)]
struct KnowledgeCache {
    entries: HashMap<String, CachedBundle>,
    next_seq: u64,
}

impl KnowledgeCache {
    fn get(&self, scope: &str, signature: &str) -> Option<Arc<RuntimeKnowledge>> {
        self.entries
            .get(scope)
            .filter(|entry| entry.knowledge.signature == signature)
            .map(|entry| Arc::clone(&entry.knowledge))
    }

    /// Stores `knowledge` for `scope`, replacing a superseded signature.
    /// Returns the bundle that ends up cached.
    fn insert(&mut self, scope: String, knowledge: Arc<RuntimeKnowledge>) -> Arc<RuntimeKnowledge> {
        if let Some(existing) = self.get(&scope, &knowledge.signature) {
            return existing;
        }
        if !self.entries.contains_key(&scope) && self.entries.len() >= MAX_CACHED_SCOPES {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.inserted)
                .map(|(key, _)| key.clone());
            if let Some(key) = oldest {
                self.entries.remove(&key);
            }
        }
        self.next_seq += 1;
        if let Some(previous) = self.entries.insert(
            scope,
            CachedBundle {
                inserted: self.next_seq,
                knowledge: Arc::clone(&knowledge),
            },
        ) {
            tracing::debug!(signature = %previous.knowledge.signature, "superseded knowledge bundle evicted");
        }
        knowledge
    }
}

/// Builds and caches runtime knowledge.
pub struct RuntimeKnowledgeBuilder {
    generator: Option<Arc<dyn TextGenerator>>,
    timeout: Duration,
    temperature: f32,
    cache: RwLock<KnowledgeCache>,
}

impl RuntimeKnowledgeBuilder {
    /// Builder backed by a text generator.
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator: Some(generator),
            timeout: Duration::from_millis(1800),
            temperature: 0.2,
            cache: RwLock::new(KnowledgeCache::default()),
        }
    }

    /// Builder that always serves template cues.
    pub fn disabled() -> Self {
        Self {
            generator: None,
            timeout: Duration::from_millis(MIN_KNOWLEDGE_TIMEOUT_MS),
            temperature: 0.2,
            cache: RwLock::new(KnowledgeCache::default()),
        }
    }

    /// Sets the generation deadline, clamped to 600..=2400 ms.
    pub fn with_timeout(mut self, deadline: Duration) -> Self {
        self.timeout = deadline.clamp(
            Duration::from_millis(MIN_KNOWLEDGE_TIMEOUT_MS),
            Duration::from_millis(MAX_KNOWLEDGE_TIMEOUT_MS),
        );
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Number of cached bundles.
    pub async fn cached_count(&self) -> usize {
        self.cache.read().await.entries.len()
    }

    /// Returns the bundle for `context`, generating it on first use.
    pub async fn build(&self, topics: &[Topic], context: &KnowledgeContext) -> Arc<RuntimeKnowledge> {
        let scope = scope_key(context);
        if let Some(hit) = self.cache.read().await.get(&scope, &context.signature) {
            return hit;
        }

        let knowledge = Arc::new(self.resolve(topics, context).await);
        self.cache.write().await.insert(scope, knowledge)
    }

    async fn resolve(&self, topics: &[Topic], context: &KnowledgeContext) -> RuntimeKnowledge {
        let Some(generator) = &self.generator else {
            return RuntimeKnowledge::fallback(topics, context, FallbackReason::Disabled);
        };

        let request = GenerationRequest::new(knowledge_prompt(topics, context))
            .with_output_shape(knowledge_shape())
            .with_temperature(self.temperature)
            .with_timeout(self.timeout);

        let outcome = timeout(self.timeout, generator.generate(request))
            .await
            .unwrap_or_else(|_| Err(GenerationError::timeout(self.timeout)));

        let response = match outcome {
            Ok(response) => response,
            Err(err) => {
                let reason = if err.is_timeout() {
                    FallbackReason::Timeout
                } else {
                    FallbackReason::GenerationFailed
                };
                tracing::warn!(
                    error = %err,
                    ?reason,
                    signature = %context.signature,
                    "knowledge generation failed, using template cues"
                );
                return RuntimeKnowledge::fallback(topics, context, reason);
            }
        };

        let parsed = response
            .json()
            .map_err(|e| e.to_string())
            .and_then(|doc| {
                RuntimeKnowledge::from_generated(&doc, topics, context, &response.model)
                    .map_err(|e| e.to_string())
            });

        match parsed {
            Ok(knowledge) => {
                tracing::info!(
                    model = %response.model,
                    topics = knowledge.topics.len(),
                    "runtime knowledge generated"
                );
                knowledge
            }
            Err(reason) => {
                tracing::warn!(%reason, model = %response.model, "knowledge document rejected, using template cues");
                RuntimeKnowledge::fallback(topics, context, FallbackReason::InvalidShape)
            }
        }
    }
}

/// Cache scope for a bundle; the plan signature is checked separately.
pub fn scope_key(context: &KnowledgeContext) -> String {
    let canonical = json!([
        context.language.code(),
        context.goal.trim(),
        context.audience.trim(),
    ])
    .to_string();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn knowledge_prompt(topics: &[Topic], context: &KnowledgeContext) -> String {
    let topic_lines: Vec<String> = ordered_topics(topics)
        .into_iter()
        .map(|t| {
            let goals = if t.sub_goals.is_empty() {
                String::new()
            } else {
                format!(" (sub-goals: {})", t.sub_goals.join("; "))
            };
            format!("- {}: {}{}", t.id, t.label, goals)
        })
        .collect();

    let goal = if context.goal.trim().is_empty() {
        "not specified"
    } else {
        context.goal.trim()
    };
    let audience = if context.audience.trim().is_empty() {
        "not specified"
    } else {
        context.audience.trim()
    };

    format!(
        "You prepare an interviewer for a qualitative interview.\n\
         Interview goal: {goal}\n\
         Participants: {audience}\n\
         Write every cue in language \"{language}\", at most {max} cues per list, each under 16 words.\n\
         For each topic give interpretation cues (how to read answers), significance signals \
         (what makes an answer important) and probe angles (follow-up directions).\n\
         Echo the signature \"{signature}\" unchanged.\n\
         Topics:\n{topics}",
        language = context.language.code(),
        max = MAX_CUES_PER_LIST,
        signature = context.signature,
        topics = topic_lines.join("\n"),
    )
}

fn knowledge_shape() -> Value {
    let cue_list = json!({ "type": "array", "items": { "type": "string" }, "maxItems": MAX_CUES_PER_LIST });
    json!({
        "type": "object",
        "properties": {
            "signature": { "type": "string" },
            "topics": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "topic_id": { "type": "string" },
                        "interpretation_cues": cue_list,
                        "significance_signals": cue_list,
                        "probe_angles": cue_list
                    },
                    "required": ["topic_id"]
                }
            }
        },
        "required": ["signature", "topics"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ai::MockTextGenerator;
    use crate::domain::foundation::{Language, TopicId};
    use crate::domain::interview::{topic_signature, KnowledgeSource};

    fn topics() -> Vec<Topic> {
        vec![
            Topic::new(TopicId::new("onboarding").unwrap(), "Onboarding", 0)
                .with_sub_goals(["first week", "documentation"]),
            Topic::new(TopicId::new("tooling").unwrap(), "Tooling", 1),
        ]
    }

    fn context(topics: &[Topic]) -> KnowledgeContext {
        KnowledgeContext {
            language: Language::En,
            goal: "Understand developer onboarding".to_string(),
            audience: "New hires".to_string(),
            signature: topic_signature(topics),
        }
    }

    fn generated_doc(signature: &str) -> Value {
        json!({
            "signature": signature,
            "topics": [{
                "topic_id": "onboarding",
                "interpretation_cues": ["Hesitation means unclear ownership"],
                "significance_signals": ["Days lost waiting for access"],
                "probe_angles": ["Who helped in the first week"]
            }]
        })
    }

    fn builder(generator: &MockTextGenerator) -> RuntimeKnowledgeBuilder {
        RuntimeKnowledgeBuilder::new(Arc::new(generator.clone()))
    }

    #[tokio::test]
    async fn generated_document_is_used_and_missing_topics_are_filled() {
        let topics = topics();
        let ctx = context(&topics);
        let generator = MockTextGenerator::new().with_json(generated_doc(&ctx.signature));

        let knowledge = builder(&generator).build(&topics, &ctx).await;

        assert!(knowledge.is_generated());
        assert_eq!(knowledge.topics.len(), 2);
        let onboarding = knowledge.cues_for(&TopicId::new("onboarding").unwrap()).unwrap();
        assert_eq!(onboarding.probe_angles, vec!["Who helped in the first week"]);
        assert!(knowledge.cues_for(&TopicId::new("tooling").unwrap()).is_some());
    }

    #[tokio::test]
    async fn request_carries_shape_and_deadline() {
        let topics = topics();
        let ctx = context(&topics);
        let generator = MockTextGenerator::new().with_json(generated_doc(&ctx.signature));

        builder(&generator)
            .with_timeout(Duration::from_millis(900))
            .build(&topics, &ctx)
            .await;

        let call = &generator.calls()[0];
        assert!(call.wants_json());
        assert_eq!(call.timeout, Some(Duration::from_millis(900)));
        assert!(call.prompt.contains(&ctx.signature));
        assert!(call.prompt.contains("first week"));
    }

    #[tokio::test]
    async fn second_build_hits_cache() {
        let topics = topics();
        let ctx = context(&topics);
        let generator = MockTextGenerator::new().with_json(generated_doc(&ctx.signature));
        let builder = builder(&generator);

        let first = builder.build(&topics, &ctx).await;
        let second = builder.build(&topics, &ctx).await;

        assert_eq!(generator.call_count(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(builder.cached_count().await, 1);
    }

    #[tokio::test]
    async fn different_language_is_a_different_bundle() {
        let topics = topics();
        let ctx = context(&topics);
        let italian = KnowledgeContext {
            language: Language::It,
            ..ctx.clone()
        };
        let generator = MockTextGenerator::new();
        let builder = builder(&generator);

        builder.build(&topics, &ctx).await;
        builder.build(&topics, &italian).await;

        assert_eq!(generator.call_count(), 2);
    }

    #[tokio::test]
    async fn timeout_falls_back_without_retry() {
        let topics = topics();
        let ctx = context(&topics);
        let generator = MockTextGenerator::new()
            .with_json(generated_doc(&ctx.signature))
            .with_delay(Duration::from_millis(3000));

        let knowledge = builder(&generator)
            .with_timeout(Duration::from_millis(600))
            .build(&topics, &ctx)
            .await;

        assert_eq!(
            knowledge.source,
            KnowledgeSource::Fallback {
                reason: FallbackReason::Timeout
            }
        );
        assert_eq!(generator.call_count(), 1);
    }

    #[tokio::test]
    async fn provider_error_falls_back() {
        let topics = topics();
        let ctx = context(&topics);
        let generator = MockTextGenerator::new().with_error(GenerationError::unavailable("down"));

        let knowledge = builder(&generator).build(&topics, &ctx).await;

        assert_eq!(
            knowledge.source,
            KnowledgeSource::Fallback {
                reason: FallbackReason::GenerationFailed
            }
        );
        assert_eq!(knowledge.topics.len(), 2);
    }

    #[tokio::test]
    async fn wrong_signature_is_rejected() {
        let topics = topics();
        let ctx = context(&topics);
        let generator = MockTextGenerator::new().with_json(generated_doc("stale-signature"));

        let knowledge = builder(&generator).build(&topics, &ctx).await;

        assert_eq!(
            knowledge.source,
            KnowledgeSource::Fallback {
                reason: FallbackReason::InvalidShape
            }
        );
    }

    #[tokio::test]
    async fn prose_answer_is_rejected() {
        let topics = topics();
        let ctx = context(&topics);
        let generator = MockTextGenerator::new().with_response("Here are some ideas...");

        let knowledge = builder(&generator).build(&topics, &ctx).await;

        assert!(!knowledge.is_generated());
    }

    #[tokio::test]
    async fn disabled_builder_never_calls_a_model() {
        let topics = topics();
        let ctx = context(&topics);

        let knowledge = RuntimeKnowledgeBuilder::disabled().build(&topics, &ctx).await;

        assert_eq!(
            knowledge.source,
            KnowledgeSource::Fallback {
                reason: FallbackReason::Disabled
            }
        );
    }

    #[test]
    fn timeout_is_clamped() {
        let generator = MockTextGenerator::new();
        assert_eq!(
            builder(&generator).with_timeout(Duration::from_millis(100)).timeout(),
            Duration::from_millis(600)
        );
        assert_eq!(
            builder(&generator).with_timeout(Duration::from_secs(10)).timeout(),
            Duration::from_millis(2400)
        );
    }

    #[test]
    fn scope_key_ignores_surrounding_whitespace() {
        let topics = topics();
        let ctx = context(&topics);
        let padded = KnowledgeContext {
            goal: format!("  {}  ", ctx.goal),
            ..ctx.clone()
        };
        assert_eq!(scope_key(&ctx), scope_key(&padded));
        assert_eq!(scope_key(&ctx).len(), 64);
    }

    #[tokio::test]
    async fn new_signature_replaces_the_superseded_bundle() {
        let mut topics = topics();
        let ctx = context(&topics);
        let generator = MockTextGenerator::new();
        let builder = builder(&generator);

        for round in 0..5 {
            topics[1].label = format!("Tooling, take {round}");
            let edited = KnowledgeContext {
                signature: topic_signature(&topics),
                ..ctx.clone()
            };
            let knowledge = builder.build(&topics, &edited).await;
            assert_eq!(knowledge.signature, edited.signature);
        }

        assert_eq!(generator.call_count(), 5);
        assert_eq!(builder.cached_count().await, 1);
    }

    #[test]
    fn cache_drops_oldest_scope_at_capacity() {
        let mut cache = KnowledgeCache::default();
        let topics = topics();
        let ctx = context(&topics);
        for n in 0..=MAX_CACHED_SCOPES {
            let scoped = KnowledgeContext {
                goal: format!("goal {n}"),
                ..ctx.clone()
            };
            let bundle = RuntimeKnowledge::fallback(&topics, &scoped, FallbackReason::Disabled);
            cache.insert(scope_key(&scoped), Arc::new(bundle));
        }

        assert_eq!(cache.entries.len(), MAX_CACHED_SCOPES);
        let first = KnowledgeContext {
            goal: "goal 0".to_string(),
            ..ctx.clone()
        };
        assert!(cache.get(&scope_key(&first), &first.signature).is_none());
    }
}
