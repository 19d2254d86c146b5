//! Console driver for the interview conductor.
//!
//! Usage: `interview-conductor <topics.json> [language] [bot-id]`
//!
//! Without an explicit bot id, one is derived from the topics file path so
//! repeated runs share the same stored plan and overrides.
//!
//! Reads stdin line by line. A line starting with `>` records the question
//! the interviewer just asked; any other line is the participant's reply and
//! produces one turn. Each turn prints its insight and question plan as a
//! JSON line on stdout.

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process;
use std::sync::Arc;

use serde_json::json;

use interview_conductor::adapters::ai::{MockTextGenerator, OpenAiConfig, OpenAiTextGenerator};
use interview_conductor::adapters::intent::{GenerativeIntentClassifier, KeywordIntentClassifier};
use interview_conductor::adapters::storage::{FilePlanRepository, InMemoryPlanRepository};
use interview_conductor::application::{
    PlanService, ProcessTurnCommand, ProcessTurnHandler, RuntimeKnowledgeBuilder, TurnPolicy,
    TurnResult,
};
use interview_conductor::config::{AiProvider, AppConfig, StorageBackend};
use interview_conductor::domain::foundation::{BotId, Language, Timestamp};
use interview_conductor::domain::interview::{KnowledgeGuide, PhaseEngine, Topic};
use interview_conductor::ports::{ExtensionIntentClassifier, PlanRepository, TextGenerator};
use interview_conductor::telemetry;

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();
    let Some(topics_path) = args.get(1) else {
        eprintln!("usage: interview-conductor <topics.json> [language] [bot-id]");
        process::exit(2);
    };
    let language = args
        .get(2)
        .map(|tag| Language::from_tag(tag))
        .unwrap_or_default();
    let bot_id = match resolve_bot_id(Path::new(topics_path), args.get(3).map(String::as_str)) {
        Ok(id) => id,
        Err(e) => {
            eprintln!("Invalid bot id: {e}");
            process::exit(2);
        }
    };

    let config = match AppConfig::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            process::exit(1);
        }
    };
    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {e}");
        process::exit(1);
    }
    telemetry::init_tracing(&config.features);

    let topics = match read_topics(Path::new(topics_path)) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Failed to read topics from {topics_path}: {e}");
            process::exit(1);
        }
    };

    let handler = match build_handler(&config) {
        Ok(h) => h,
        Err(e) => {
            eprintln!("Failed to start: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = run(&handler, bot_id, topics, language).await {
        eprintln!("Interview aborted: {e}");
        process::exit(1);
    }
}

fn resolve_bot_id(topics_path: &Path, explicit: Option<&str>) -> Result<BotId, String> {
    if let Some(raw) = explicit {
        return raw.parse().map_err(|e: uuid::Error| e.to_string());
    }
    let canonical = topics_path
        .canonicalize()
        .unwrap_or_else(|_| topics_path.to_path_buf());
    Ok(BotId::derived_from(&canonical.to_string_lossy()))
}

fn read_topics(path: &Path) -> Result<Vec<Topic>, String> {
    let raw = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    let topics: Vec<Topic> = serde_json::from_str(&raw).map_err(|e| e.to_string())?;
    if topics.is_empty() {
        return Err("no topics".to_string());
    }
    Ok(topics)
}

fn build_handler(config: &AppConfig) -> Result<ProcessTurnHandler, String> {
    let generator: Arc<dyn TextGenerator> = match config.ai.provider {
        AiProvider::Mock => Arc::new(MockTextGenerator::new()),
        AiProvider::OpenAI => {
            let key = config
                .ai
                .api_key
                .clone()
                .ok_or_else(|| "missing API key".to_string())?;
            let mut openai = OpenAiConfig::from_secret(key)
                .with_model(config.ai.model.clone())
                .with_timeout(config.ai.knowledge_timeout());
            if let Some(url) = &config.ai.base_url {
                openai = openai.with_base_url(url.clone());
            }
            Arc::new(OpenAiTextGenerator::new(openai).map_err(|e| e.to_string())?)
        }
    };

    let classifier: Arc<dyn ExtensionIntentClassifier> = if config.ai.classify_intent_with_model {
        Arc::new(
            GenerativeIntentClassifier::new(generator.clone())
                .with_timeout(config.ai.intent_timeout()),
        )
    } else {
        Arc::new(KeywordIntentClassifier::new())
    };

    let repository: Arc<dyn PlanRepository> = match config.storage.backend {
        StorageBackend::Memory => Arc::new(InMemoryPlanRepository::new()),
        StorageBackend::File => Arc::new(FilePlanRepository::new(&config.storage.plan_dir)),
    };
    let plans = PlanService::new(repository)
        .with_seconds_per_turn(config.interview.seconds_per_turn)
        .with_deepen_turns_per_topic(config.interview.deepen_turns_per_topic);

    // The mock generator has nothing useful to say about a domain.
    let knowledge = if config.features.enable_runtime_knowledge
        && config.ai.provider != AiProvider::Mock
    {
        RuntimeKnowledgeBuilder::new(generator)
            .with_timeout(config.ai.knowledge_timeout())
            .with_temperature(config.ai.temperature)
    } else {
        RuntimeKnowledgeBuilder::disabled()
    };

    let policy = TurnPolicy {
        collect_data: config.interview.collect_data,
        default_duration_minutes: config.interview.default_duration_minutes,
        goal: config.interview.goal.clone(),
        audience: config.interview.audience.clone(),
    };

    let mut handler = ProcessTurnHandler::new(
        PhaseEngine::new(config.interview.engine_config()),
        Arc::new(plans),
        Arc::new(knowledge),
        classifier,
        policy,
    );
    if let Some(path) = &config.interview.guide_path {
        let markdown = std::fs::read_to_string(path)
            .map_err(|e| format!("guide {}: {e}", path.display()))?;
        handler = handler.with_guide(KnowledgeGuide::parse(&markdown));
    }
    Ok(handler)
}

async fn run(
    handler: &ProcessTurnHandler,
    bot_id: BotId,
    topics: Vec<Topic>,
    language: Language,
) -> Result<(), String> {
    let started = Timestamp::now();
    let mut cmd = ProcessTurnCommand::opening(bot_id, topics);
    cmd.language = language;

    let result = handler.handle(cmd.clone()).await.map_err(|e| e.to_string())?;
    print_turn(&result)?;
    if result.is_finished() {
        return Ok(());
    }
    cmd.state = result.state;

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.map_err(|e| e.to_string())?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(question) = line.strip_prefix('>') {
            cmd.last_assistant_message = Some(question.trim().to_string());
            continue;
        }

        cmd.user_message = Some(line.to_string());
        cmd.elapsed_secs = started.elapsed_secs();
        let result = handler.handle(cmd.clone()).await.map_err(|e| e.to_string())?;
        print_turn(&result)?;
        if result.is_finished() {
            break;
        }
        cmd.state = result.state;
        cmd.last_assistant_message = None;
    }
    Ok(())
}

fn print_turn(result: &TurnResult) -> Result<(), String> {
    let line = json!({
        "insight": result.insight,
        "next_topic_id": result.next_topic_id,
        "micro_plan": result.micro_plan,
        "intent": result.intent,
        "plan_version": result.plan_version,
    });
    let mut out = io::stdout().lock();
    writeln!(out, "{line}").map_err(|e| e.to_string())?;
    out.flush().map_err(|e| e.to_string())
}
