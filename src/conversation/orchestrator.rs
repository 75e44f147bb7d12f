//! The per-turn plan, execute and compose loop.
//!
//! A turn streams the model's answer while it is produced. Whenever the model
//! asks for tools, every call of that round runs concurrently and the results
//! (or structured errors) are fed back before the model is asked again. The
//! conversation's context store is locked for the whole turn and written only
//! once the turn completes, so an abandoned or failed turn leaves no trace.

use super::context_store::{ContextStoreRegistry, ConversationTurn, DEFAULT_CONTEXT_WINDOW};
use super::events::TurnEvent;
use super::prompt::{initial_messages, system_prompt};
use crate::config::AppConfig;
use crate::error::Result;
use crate::llm::gateways::{OpenAIConfig, OpenAIGateway};
use crate::llm::tools::{
    PartnerLookupTool, ToolCall, ToolRegistry, ToolRequest, WeatherForecastTool,
};
use crate::llm::{LlmBroker, LlmMessage, LlmToolCall, StreamChunk};
use crate::partners::remote_directory::RemoteDirectoryConfig;
use crate::partners::{PartnerDirectory, PartnerRecord, RemotePartnerDirectory, StaticPartnerDirectory};
use crate::weather::{MockWeatherProvider, OpenWeatherMapClient, OpenWeatherMapConfig, WeatherProvider};
use chrono::Local;
use futures::future::join_all;
use futures::stream::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 4;
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(10);

const PROCESSING_STATUS: &str = "Processing your request...";
const EMPTY_ANSWER_MESSAGE: &str =
    "I processed your request but couldn't generate a response. Please try again.";
const TURN_EVENT_BUFFER: usize = 32;

pub type TurnStream<'a> = Pin<Box<dyn Stream<Item = TurnEvent> + Send + 'a>>;

/// Tool registry offering partner lookup and weather forecasts.
pub fn trip_planning_tools(
    directory: Arc<dyn PartnerDirectory>,
    weather: Arc<dyn WeatherProvider>,
) -> ToolRegistry {
    ToolRegistry::new()
        .with_tool(Arc::new(PartnerLookupTool::new(directory)))
        .with_tool(Arc::new(WeatherForecastTool::new(weather)))
}

/// Outcome of the partner lookups made during one turn.
#[derive(Debug)]
enum PartnerResolution {
    NotAttempted,
    Resolved(PartnerRecord),
    Failed,
}

impl PartnerResolution {
    fn record(&mut self, call: &LlmToolCall, outcome: &ToolCall) {
        if !ToolRequest::from_call(call).is_some_and(|r| r.is_partner_lookup()) {
            return;
        }

        let resolved = outcome
            .result
            .as_ref()
            .and_then(|value| serde_json::from_value::<PartnerRecord>(value["partner"].clone()).ok());

        match resolved {
            Some(partner) => *self = PartnerResolution::Resolved(partner),
            None if matches!(self, PartnerResolution::Resolved(_)) => {}
            None => *self = PartnerResolution::Failed,
        }
    }

    /// Partner the turn is about, given the one remembered from earlier turns.
    fn referenced(self, remembered: Option<PartnerRecord>) -> Option<PartnerRecord> {
        match self {
            PartnerResolution::NotAttempted => remembered,
            PartnerResolution::Resolved(partner) => Some(partner),
            PartnerResolution::Failed => None,
        }
    }
}

fn status_for(call: &LlmToolCall) -> String {
    match ToolRequest::from_call(call) {
        Some(ToolRequest::PartnerLookup(args)) => {
            format!("Looking up business partner '{}'...", args.partner_name)
        }
        Some(ToolRequest::WeatherForecast(args)) => {
            format!("Checking the weather forecast for {}...", args.location)
        }
        None => format!("Running {}...", call.name),
    }
}

pub struct ConversationOrchestrator {
    broker: Arc<LlmBroker>,
    tools: ToolRegistry,
    contexts: ContextStoreRegistry,
    max_tool_rounds: usize,
    tool_timeout: Duration,
}

impl ConversationOrchestrator {
    pub fn new(broker: LlmBroker, tools: ToolRegistry) -> Self {
        Self {
            broker: Arc::new(broker),
            tools,
            contexts: ContextStoreRegistry::new(DEFAULT_CONTEXT_WINDOW),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Number of turns each conversation remembers.
    pub fn with_context_window(mut self, turns: usize) -> Self {
        self.contexts = ContextStoreRegistry::new(turns);
        self
    }

    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    /// Wire the OpenAI gateway and the configured partner and weather sources.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        config.validate()?;

        let gateway = OpenAIGateway::with_config(OpenAIConfig {
            api_key: config.llm_api_key.clone(),
            base_url: config.llm_base_url.clone(),
            timeout: None,
        })?;
        let broker = LlmBroker::new(config.llm_model.clone(), Arc::new(gateway))
            .with_timeout(config.llm_timeout);

        let directory: Arc<dyn PartnerDirectory> = match &config.partner_tool_url {
            Some(url) => {
                info!(url = %url, "Using remote partner directory");
                Arc::new(RemotePartnerDirectory::new(RemoteDirectoryConfig {
                    url: url.clone(),
                    tool_name: config.partner_tool_name.clone(),
                    timeout: Some(config.tool_timeout),
                })?)
            }
            None => {
                info!("Using built-in partner directory");
                Arc::new(StaticPartnerDirectory::with_sample_partners())
            }
        };

        let weather: Arc<dyn WeatherProvider> = match &config.weather_api_key {
            Some(api_key) => Arc::new(OpenWeatherMapClient::new(OpenWeatherMapConfig {
                api_key: api_key.clone(),
                base_url: config.weather_base_url.clone(),
                timeout: Some(config.tool_timeout),
            })?),
            None => {
                warn!("OPENWEATHERMAP_API_KEY not set, serving mock forecasts");
                Arc::new(MockWeatherProvider::new())
            }
        };

        Ok(Self::new(broker, trip_planning_tools(directory, weather))
            .with_context_window(config.context_window)
            .with_max_tool_rounds(config.max_tool_rounds)
            .with_tool_timeout(config.tool_timeout))
    }

    pub fn contexts(&self) -> &ContextStoreRegistry {
        &self.contexts
    }

    /// Forget everything remembered for a conversation.
    pub fn end_conversation(&self, conversation_id: &str) -> bool {
        info!(conversation_id, "Ending conversation");
        self.contexts.end_conversation(conversation_id)
    }

    /// Run one turn, yielding its events in order.
    ///
    /// Turns of the same conversation are serialised. Dropping the stream
    /// before `Completed` abandons the turn without touching its memory, and a
    /// turn still running when its conversation is ended is not remembered.
    pub fn stream_turn<'a>(&'a self, conversation_id: &'a str, utterance: &'a str) -> TurnStream<'a> {
        Box::pin(async_stream::stream! {
            let turn_id = Uuid::new_v4();
            info!(%turn_id, conversation_id, model = self.broker.model(), "Turn started");
            yield TurnEvent::Working(PROCESSING_STATUS.to_string());

            let store = self.contexts.store(conversation_id);
            let mut context = store.lock().await;

            let today = Local::now().date_naive();
            let remembered = context.last_referenced_partner().cloned();
            let mut messages = initial_messages(
                system_prompt(today, remembered.as_ref()),
                context.window(),
                utterance,
            );
            let descriptors = self.tools.descriptors();

            let mut resolution = PartnerResolution::NotAttempted;
            let mut answer = String::new();
            let mut rounds = 0;

            loop {
                let offer_tools = rounds < self.max_tool_rounds && !descriptors.is_empty();
                let tools = offer_tools.then_some(descriptors.as_slice());

                let mut content = String::new();
                let mut calls: Vec<LlmToolCall> = Vec::new();
                let mut failure = None;
                {
                    let mut chunks = self.broker.generate_stream(&messages, tools);
                    while let Some(item) = chunks.next().await {
                        match item {
                            Ok(StreamChunk::Content(text)) => {
                                content.push_str(&text);
                                yield TurnEvent::Chunk(text);
                            }
                            Ok(StreamChunk::ToolCalls(requested)) => calls.extend(requested),
                            Err(e) => {
                                failure = Some(e);
                                break;
                            }
                        }
                    }
                }

                if let Some(e) = failure {
                    error!(%turn_id, error = %e, "Turn failed while waiting for the model");
                    yield TurnEvent::Failed(e.user_message());
                    return;
                }

                answer.push_str(&content);

                if !offer_tools && !calls.is_empty() {
                    warn!(%turn_id, count = calls.len(), "Ignoring tool calls after the round limit");
                    calls.clear();
                }
                if calls.is_empty() {
                    break;
                }

                rounds += 1;
                info!(%turn_id, round = rounds, count = calls.len(), "Executing tool round");

                for call in calls.iter_mut() {
                    if call.id.is_none() {
                        call.id = Some(format!("call_{}", Uuid::new_v4().simple()));
                    }
                }
                for call in &calls {
                    yield TurnEvent::Working(status_for(call));
                }

                let outcomes = join_all(calls.iter().map(|call| {
                    let call_id = call.id.clone().unwrap_or_default();
                    self.tools.execute(call, call_id, self.tool_timeout)
                }))
                .await;

                messages.push(LlmMessage::assistant_tool_calls(Some(content), calls.clone()));
                for (call, outcome) in calls.iter().zip(&outcomes) {
                    resolution.record(call, outcome);
                    messages.push(LlmMessage::tool_result(call, outcome.message_content()));
                }
                debug!(%turn_id, messages = messages.len(), "Tool results added");
            }

            if answer.trim().is_empty() {
                error!(%turn_id, "Model produced an empty answer");
                yield TurnEvent::Failed(EMPTY_ANSWER_MESSAGE.to_string());
                return;
            }

            if self.contexts.is_current(conversation_id, &store) {
                let partner = resolution.referenced(remembered);
                context.append(ConversationTurn::user(utterance, partner.clone()));
                context.append(ConversationTurn::assistant(answer, partner));
            } else {
                info!(%turn_id, conversation_id, "Conversation ended during the turn, not remembering it");
            }
            drop(context);

            info!(%turn_id, rounds, "Turn completed");
            yield TurnEvent::Completed;
        })
    }

    /// Run a turn on its own task, delivering events through a bounded
    /// channel. Dropping the receiver cancels the turn.
    pub fn spawn_turn(
        self: &Arc<Self>,
        conversation_id: impl Into<String>,
        utterance: impl Into<String>,
    ) -> mpsc::Receiver<TurnEvent> {
        let (tx, rx) = mpsc::channel(TURN_EVENT_BUFFER);
        let orchestrator = Arc::clone(self);
        let conversation_id = conversation_id.into();
        let utterance = utterance.into();

        tokio::spawn(async move {
            let mut events = orchestrator.stream_turn(&conversation_id, &utterance);
            while let Some(event) = events.next().await {
                if tx.send(event).await.is_err() {
                    debug!(conversation_id = %conversation_id, "Turn receiver dropped, abandoning turn");
                    break;
                }
            }
        });

        rx
    }

    /// Run a turn to the end and return all of its events.
    pub async fn collect_turn(&self, conversation_id: &str, utterance: &str) -> Vec<TurnEvent> {
        self.stream_turn(conversation_id, utterance).collect().await
    }
}

/// Concatenated answer text of a finished turn's events.
pub fn answer_text(events: &[TurnEvent]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            TurnEvent::Chunk(text) => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TripcastError;
    use crate::llm::gateway::{ChunkStream, CompletionConfig, LlmGateway};
    use crate::llm::tools::ToolDescriptor;
    use crate::llm::MessageRole;
    use crate::weather::WeatherSnapshot;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use serde_json::json;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::time::Instant;
    use tokio::sync::Notify;

    /// Plays back one scripted round per model call.
    struct ScriptedGateway {
        rounds: Mutex<VecDeque<Vec<Result<StreamChunk>>>>,
        offered_tools: Mutex<Vec<bool>>,
        requests: Mutex<Vec<Vec<LlmMessage>>>,
    }

    impl ScriptedGateway {
        fn new(rounds: Vec<Vec<Result<StreamChunk>>>) -> Self {
            Self {
                rounds: Mutex::new(rounds.into()),
                offered_tools: Mutex::new(vec![]),
                requests: Mutex::new(vec![]),
            }
        }
    }

    impl LlmGateway for ScriptedGateway {
        fn complete_stream<'a>(
            &'a self,
            _model: &'a str,
            messages: &'a [LlmMessage],
            tools: Option<&'a [ToolDescriptor]>,
            _config: &'a CompletionConfig,
        ) -> ChunkStream<'a> {
            self.offered_tools.lock().unwrap().push(tools.is_some());
            self.requests.lock().unwrap().push(messages.to_vec());
            let round = self.rounds.lock().unwrap().pop_front().unwrap_or_default();
            Box::pin(futures::stream::iter(round))
        }
    }

    fn lookup_call(name: &str) -> StreamChunk {
        let mut arguments = HashMap::new();
        arguments.insert("partner_name".to_string(), json!(name));
        StreamChunk::ToolCalls(vec![LlmToolCall {
            id: None,
            name: "business_partner_lookup".to_string(),
            arguments,
        }])
    }

    /// Holds its only answer back until released.
    #[derive(Default)]
    struct GatedGateway {
        started: Notify,
        release: Notify,
    }

    impl LlmGateway for GatedGateway {
        fn complete_stream<'a>(
            &'a self,
            _model: &'a str,
            _messages: &'a [LlmMessage],
            _tools: Option<&'a [ToolDescriptor]>,
            _config: &'a CompletionConfig,
        ) -> ChunkStream<'a> {
            Box::pin(async_stream::stream! {
                self.started.notify_one();
                self.release.notified().await;
                yield Ok(StreamChunk::Content("Late answer".to_string()));
            })
        }
    }

    const PROVIDER_DELAY: Duration = Duration::from_millis(200);

    struct SlowDirectory(StaticPartnerDirectory);

    #[async_trait]
    impl PartnerDirectory for SlowDirectory {
        async fn lookup(&self, query_name: &str) -> Result<PartnerRecord> {
            tokio::time::sleep(PROVIDER_DELAY).await;
            self.0.lookup(query_name).await
        }
    }

    struct SlowWeather(MockWeatherProvider);

    #[async_trait]
    impl WeatherProvider for SlowWeather {
        async fn forecast(&self, location: &str, date: Option<NaiveDate>) -> Result<WeatherSnapshot> {
            tokio::time::sleep(PROVIDER_DELAY).await;
            self.0.forecast(location, date).await
        }
    }

    fn call_with_id(id: &str, name: &str, arguments: serde_json::Value) -> LlmToolCall {
        LlmToolCall {
            id: Some(id.to_string()),
            name: name.to_string(),
            arguments: serde_json::from_value(arguments).unwrap(),
        }
    }

    fn orchestrator(gateway: ScriptedGateway) -> ConversationOrchestrator {
        let tools = trip_planning_tools(
            Arc::new(StaticPartnerDirectory::with_sample_partners()),
            Arc::new(MockWeatherProvider::new()),
        );
        ConversationOrchestrator::new(LlmBroker::new("test-model", Arc::new(gateway)), tools)
    }

    #[tokio::test]
    async fn test_plain_answer() {
        let orchestrator = orchestrator(ScriptedGateway::new(vec![vec![
            Ok(StreamChunk::Content("Hello".to_string())),
            Ok(StreamChunk::Content(" there".to_string())),
        ]]));

        let events = orchestrator.collect_turn("c1", "Hi").await;

        assert_eq!(
            events,
            vec![
                TurnEvent::Working(PROCESSING_STATUS.to_string()),
                TurnEvent::Chunk("Hello".to_string()),
                TurnEvent::Chunk(" there".to_string()),
                TurnEvent::Completed,
            ]
        );
        assert_eq!(orchestrator.contexts().store("c1").lock().await.len(), 2);
    }

    #[tokio::test]
    async fn test_lookup_references_partner() {
        let orchestrator = orchestrator(ScriptedGateway::new(vec![
            vec![Ok(lookup_call("acme"))],
            vec![Ok(StreamChunk::Content("Acme Corp is in New York.".to_string()))],
        ]));

        let events = orchestrator.collect_turn("c1", "Where is Acme?").await;

        assert!(events.contains(&TurnEvent::Working("Looking up business partner 'acme'...".to_string())));
        assert_eq!(events.last(), Some(&TurnEvent::Completed));

        let store = orchestrator.contexts().store("c1");
        let context = store.lock().await;
        assert_eq!(context.last_referenced_partner().map(|p| p.id.as_str()), Some("BP001"));
    }

    #[tokio::test]
    async fn test_gateway_failure_leaves_store_untouched() {
        let orchestrator = orchestrator(ScriptedGateway::new(vec![vec![
            Ok(StreamChunk::Content("Let me".to_string())),
            Err(TripcastError::GatewayError("connection reset".to_string())),
        ]]));

        let events = orchestrator.collect_turn("c1", "Hi").await;

        match events.last() {
            Some(TurnEvent::Failed(message)) => assert!(!message.contains("connection reset")),
            other => panic!("Expected Failed, got {:?}", other),
        }
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
        assert!(orchestrator.contexts().store("c1").lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_answer_fails() {
        let orchestrator = orchestrator(ScriptedGateway::new(vec![vec![]]));

        let events = orchestrator.collect_turn("c1", "Hi").await;

        assert_eq!(events.last(), Some(&TurnEvent::Failed(EMPTY_ANSWER_MESSAGE.to_string())));
        assert!(orchestrator.contexts().store("c1").lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_round_limit_forces_final_answer_without_tools() {
        let gateway = ScriptedGateway::new(vec![
            vec![Ok(lookup_call("acme"))],
            vec![Ok(lookup_call("acme"))],
            vec![Ok(StreamChunk::Content("Done.".to_string()))],
        ]);
        let orchestrator = orchestrator(gateway).with_max_tool_rounds(2);

        let events = orchestrator.collect_turn("c1", "Where is Acme?").await;

        assert_eq!(events.last(), Some(&TurnEvent::Completed));
        assert_eq!(answer_text(&events), "Done.");
    }

    #[tokio::test]
    async fn test_dropped_stream_commits_nothing() {
        let orchestrator = orchestrator(ScriptedGateway::new(vec![vec![
            Ok(StreamChunk::Content("Hello".to_string())),
        ]]));

        {
            let mut events = orchestrator.stream_turn("c1", "Hi");
            assert!(matches!(events.next().await, Some(TurnEvent::Working(_))));
            assert!(matches!(events.next().await, Some(TurnEvent::Chunk(_))));
        }

        assert!(orchestrator.contexts().store("c1").lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_spawn_turn_delivers_events() {
        let orchestrator = Arc::new(orchestrator(ScriptedGateway::new(vec![vec![Ok(
            StreamChunk::Content("Hi!".to_string()),
        )]])));

        let mut rx = orchestrator.spawn_turn("c1", "Hello");
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }

        assert_eq!(answer_text(&events), "Hi!");
        assert_eq!(events.last(), Some(&TurnEvent::Completed));
    }

    #[tokio::test]
    async fn test_tool_calls_of_a_round_run_concurrently() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            vec![Ok(StreamChunk::ToolCalls(vec![
                call_with_id("call_lookup", "business_partner_lookup", json!({"partner_name": "Acme Corp"})),
                call_with_id("call_weather", "weather_forecast", json!({"location": "New York, USA"})),
            ]))],
            vec![Ok(StreamChunk::Content("Acme is in New York.".to_string()))],
        ]));
        let tools = trip_planning_tools(
            Arc::new(SlowDirectory(StaticPartnerDirectory::with_sample_partners())),
            Arc::new(SlowWeather(MockWeatherProvider::new())),
        );
        let orchestrator =
            ConversationOrchestrator::new(LlmBroker::new("test-model", gateway.clone()), tools);

        let started = Instant::now();
        let events = orchestrator.collect_turn("c1", "Weather at Acme Corp?").await;
        let elapsed = started.elapsed();

        assert_eq!(events.last(), Some(&TurnEvent::Completed));
        assert!(elapsed >= PROVIDER_DELAY);
        assert!(elapsed < PROVIDER_DELAY * 2, "tool calls ran one after another: {:?}", elapsed);

        let requests = gateway.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        let results: Vec<&LlmMessage> = requests[1]
            .iter()
            .filter(|m| m.role == MessageRole::Tool)
            .collect();
        assert_eq!(results.len(), 2);

        let answered = |message: &LlmMessage| message.tool_calls.as_ref().unwrap()[0].id.clone();
        assert_eq!(answered(results[0]), Some("call_lookup".to_string()));
        assert!(results[0].content.as_deref().unwrap().contains("\"BP001\""));
        assert_eq!(answered(results[1]), Some("call_weather".to_string()));
        assert!(results[1].content.as_deref().unwrap().contains("\"forecast\""));
    }

    #[tokio::test]
    async fn test_turn_finishing_after_end_conversation_is_not_remembered() {
        let gateway = Arc::new(GatedGateway::default());
        let tools = trip_planning_tools(
            Arc::new(StaticPartnerDirectory::with_sample_partners()),
            Arc::new(MockWeatherProvider::new()),
        );
        let orchestrator = Arc::new(ConversationOrchestrator::new(
            LlmBroker::new("test-model", gateway.clone()),
            tools,
        ));

        let mut rx = orchestrator.spawn_turn("c1", "Hi");
        gateway.started.notified().await;
        assert!(orchestrator.end_conversation("c1"));
        gateway.release.notify_one();

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }

        assert_eq!(answer_text(&events), "Late answer");
        assert_eq!(events.last(), Some(&TurnEvent::Completed));
        assert_eq!(orchestrator.contexts().conversation_count(), 0);
        assert!(orchestrator.contexts().store("c1").lock().await.is_empty());
    }

    #[test]
    fn test_status_messages() {
        let mut arguments = HashMap::new();
        arguments.insert("location".to_string(), json!("Berlin, Germany"));
        let call = LlmToolCall {
            id: None,
            name: "weather_forecast".to_string(),
            arguments,
        };
        assert_eq!(status_for(&call), "Checking the weather forecast for Berlin, Germany...");
    }
}
