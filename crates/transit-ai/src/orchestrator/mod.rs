//! Layered resolution engine.
//!
//! Each request runs in its own task that owns the outbound event stream.
//! Tiers are tried in cost order (template, algorithmic, skill, retrieval,
//! LLM) and the first one that produces an answer ends the cascade. The
//! stream always opens with `Meta` and closes with `Done`.

mod emitter;
pub mod request;

pub use request::*;

use crate::agent::{CompletionAgent, Message, RequestContext, SkillContext, SkillRegistry, SkillRequest};
use crate::completion_guard::stream_with_completion_guard;
use crate::fact_checker::FactChecker;
use crate::prompt::{
    build_fast_prompt, build_system_prompt, detect_busy_message, jst_now, localized_concise_fallback,
    ultimate_fallback, PromptInputs,
};
use crate::rag::{
    expand_graph_node_ids, filter_by_nodes, filter_by_tags, normalize_node_ids, summarize_rag_results,
    truncate_chars,
};
use crate::routing::{PlaceCatalog, RoutePlanner, RouteRequest};
use crate::stream::{StreamEvent, StreamResponseMeta};
use chrono::{DateTime, FixedOffset};
use emitter::Emitter;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, instrument, warn, Instrument};
use transit_cache::{StatusCache, StatusContext, TemplateContext, TemplateEngine};
use transit_core::{
    render_prometheus, CurrentWeather, Embedder, FeedbackStore, MemoryStore, MetricsCollector, Result,
    SearchOptions, SearchResult, StatusFeed, Tier, TransitConfig, VectorStore, WeatherFeed,
};
use transit_graph::Pathfinder;
use transit_intent::{
    build_tool_plan, decide_intent_ladder, estimate_rule_confidence, is_faq_hit, is_status_query, FeedbackModel,
    IntentClassifier, IntentRoute, NodeResolver, ResolvedContext, ToolPlan,
};
use uuid::Uuid;

const STRUCTURED_SUMMARY_CHARS: usize = 180;
const LLM_SUMMARY_CHARS: usize = 220;
/// Above this resolver confidence a route query goes to the fast agent.
const FAST_PATH_ROUTE_CONFIDENCE: f64 = 0.8;
const NO_MESSAGE: &str = "No message provided";

/// Source of "now" in Japan time. Injected so tests can pin the clock.
pub type Clock = Arc<dyn Fn() -> DateTime<FixedOffset> + Send + Sync>;

/// How a request ended; reported in the final `Done` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Tier(Tier),
    TemplateFallback,
    UltimateFallback,
    EmptyRequest,
    Cancelled,
    DeadlineExceeded,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Tier(t) => t.as_str(),
            Resolution::TemplateFallback => "template_fallback",
            Resolution::UltimateFallback => "fallback",
            Resolution::EmptyRequest => "empty",
            Resolution::Cancelled => "cancelled",
            Resolution::DeadlineExceeded => "timeout",
        }
    }
}

fn infer_structured_type(plan: &ToolPlan, node_ctx: &ResolvedContext) -> &'static str {
    if node_ctx.is_route_query {
        "route"
    } else if plan.status_tool {
        "status"
    } else {
        "knowledge"
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Awaits `fut` within `limit`, logging and discarding failures.
async fn best_effort<T, F>(what: &'static str, limit: Duration, fut: F) -> Option<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(v)) => Some(v),
        Ok(Err(e)) if e.is_expected_miss() => {
            debug!(what, error = %e, "Expected miss");
            None
        }
        Ok(Err(e)) => {
            warn!(what, error = %e, "Call failed, continuing");
            None
        }
        Err(_) => {
            warn!(what, timeout_ms = limit.as_millis() as u64, "Call timed out, continuing");
            None
        }
    }
}

async fn search_knowledge(
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    query: &str,
    opts: &SearchOptions,
) -> Result<Vec<SearchResult>> {
    let embedding = embedder.embed_query(query).await?;
    store.search(&embedding, opts).await
}

struct EngineParts {
    config: TransitConfig,
    templates: TemplateEngine,
    resolver: NodeResolver,
    classifier: IntentClassifier,
    planner: RoutePlanner,
    status_cache: Option<StatusCache>,
    weather: Option<Arc<dyn WeatherFeed>>,
    skills: Option<Arc<dyn SkillRegistry>>,
    embedder: Option<Arc<dyn Embedder>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    fast_agent: Option<Arc<dyn CompletionAgent>>,
    general_agent: Option<Arc<dyn CompletionAgent>>,
    status_agent: Option<Arc<dyn CompletionAgent>>,
    fact_checker: Option<FactChecker>,
    memory_store: Option<Arc<dyn MemoryStore>>,
    feedback_store: Option<Arc<dyn FeedbackStore>>,
    metrics: Arc<MetricsCollector>,
    clock: Clock,
}

/// Collaborators for a [`LayeredEngine`]. Everything except the config is optional;
/// a missing collaborator simply disables the tier that needs it.
pub struct LayeredEngineBuilder {
    config: TransitConfig,
    pathfinder: Option<Arc<Pathfinder>>,
    places: Option<PlaceCatalog>,
    status_feed: Option<Arc<dyn StatusFeed>>,
    weather: Option<Arc<dyn WeatherFeed>>,
    skills: Option<Arc<dyn SkillRegistry>>,
    embedder: Option<Arc<dyn Embedder>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    fast_agent: Option<Arc<dyn CompletionAgent>>,
    general_agent: Option<Arc<dyn CompletionAgent>>,
    status_agent: Option<Arc<dyn CompletionAgent>>,
    fact_checker: Option<FactChecker>,
    memory_store: Option<Arc<dyn MemoryStore>>,
    feedback_store: Option<Arc<dyn FeedbackStore>>,
    feedback: Option<Arc<FeedbackModel>>,
    metrics: Option<Arc<MetricsCollector>>,
    clock: Option<Clock>,
}

impl LayeredEngineBuilder {
    pub fn new(config: TransitConfig) -> Self {
        Self {
            config,
            pathfinder: None,
            places: None,
            status_feed: None,
            weather: None,
            skills: None,
            embedder: None,
            vector_store: None,
            fast_agent: None,
            general_agent: None,
            status_agent: None,
            fact_checker: Some(FactChecker::default()),
            memory_store: None,
            feedback_store: None,
            feedback: None,
            metrics: None,
            clock: None,
        }
    }

    pub fn pathfinder(mut self, pathfinder: Arc<Pathfinder>) -> Self {
        self.pathfinder = Some(pathfinder);
        self
    }

    /// Overrides the place catalog otherwise loaded from `routing.place_specs_path`.
    pub fn places(mut self, places: PlaceCatalog) -> Self {
        self.places = Some(places);
        self
    }

    pub fn status_feed(mut self, feed: Arc<dyn StatusFeed>) -> Self {
        self.status_feed = Some(feed);
        self
    }

    pub fn weather(mut self, weather: Arc<dyn WeatherFeed>) -> Self {
        self.weather = Some(weather);
        self
    }

    pub fn skills(mut self, skills: Arc<dyn SkillRegistry>) -> Self {
        self.skills = Some(skills);
        self
    }

    pub fn retrieval(mut self, embedder: Arc<dyn Embedder>, vector_store: Arc<dyn VectorStore>) -> Self {
        self.embedder = Some(embedder);
        self.vector_store = Some(vector_store);
        self
    }

    pub fn fast_agent(mut self, agent: Arc<dyn CompletionAgent>) -> Self {
        self.fast_agent = Some(agent);
        self
    }

    pub fn general_agent(mut self, agent: Arc<dyn CompletionAgent>) -> Self {
        self.general_agent = Some(agent);
        self
    }

    pub fn status_agent(mut self, agent: Arc<dyn CompletionAgent>) -> Self {
        self.status_agent = Some(agent);
        self
    }

    /// `None` disables post-answer fact checking.
    pub fn fact_checker(mut self, checker: Option<FactChecker>) -> Self {
        self.fact_checker = checker;
        self
    }

    pub fn memory_store(mut self, store: Arc<dyn MemoryStore>) -> Self {
        self.memory_store = Some(store);
        self
    }

    pub fn feedback_store(mut self, store: Arc<dyn FeedbackStore>) -> Self {
        self.feedback_store = Some(store);
        self
    }

    pub fn feedback(mut self, feedback: Arc<FeedbackModel>) -> Self {
        self.feedback = Some(feedback);
        self
    }

    pub fn metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> LayeredEngine {
        let config = self.config;
        let places = self
            .places
            .unwrap_or_else(|| PlaceCatalog::load_or_builtin(config.routing.place_specs_path.as_deref()));
        let status_ttl = config.layer.status_cache_ttl();
        let parts = EngineParts {
            templates: TemplateEngine::new(config.layer.template_cache_ttl()),
            resolver: NodeResolver::new(),
            classifier: IntentClassifier::new(self.feedback.unwrap_or_default()),
            planner: RoutePlanner::new(self.pathfinder, places),
            status_cache: self.status_feed.map(|feed| StatusCache::with_ttl(feed, status_ttl)),
            weather: self.weather,
            skills: self.skills,
            embedder: self.embedder,
            vector_store: self.vector_store,
            fast_agent: self.fast_agent,
            general_agent: self.general_agent,
            status_agent: self.status_agent,
            fact_checker: self.fact_checker,
            memory_store: self.memory_store,
            feedback_store: self.feedback_store,
            metrics: self.metrics.unwrap_or_default(),
            clock: self.clock.unwrap_or_else(|| Arc::new(jst_now) as Clock),
            config,
        };
        LayeredEngine {
            parts: Arc::new(parts),
        }
    }
}

/// Per-request context gathered before any tier runs.
struct Prepared {
    query: String,
    locale: String,
    token_profile: String,
    response_mode: String,
    max_context_tokens: usize,
    faq_hit: bool,
    route: IntentRoute,
    node_ctx: ResolvedContext,
    plan: ToolPlan,
    complexity: transit_intent::IntentComplexity,
    status: Option<StatusContext>,
    weather: Option<CurrentWeather>,
    memory: Option<Message>,
    now: DateTime<FixedOffset>,
}

impl Prepared {
    fn has_disruption(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.has_disruption)
    }

    fn is_raining(&self) -> bool {
        self.weather.as_ref().is_some_and(|w| w.is_raining)
    }

    fn request_context(&self, req: &ProcessRequest) -> RequestContext {
        RequestContext {
            locale: self.locale.clone(),
            session_id: req.session_id.clone(),
            user_id: req.user_id.clone(),
            is_authenticated: req.is_authenticated,
            timezone: req.timezone_or_default().to_string(),
            route_explain_required: self.plan.require_route_explain,
            time_tool_required: self.plan.time_tool,
            prompt_profile: self.token_profile.clone(),
            response_mode: self.response_mode.clone(),
            max_context_tokens: self.max_context_tokens,
            history_budget_tokens: req.history_budget_tokens,
        }
    }

    /// Conversation for an agent: optional prompt, then memory, then the client's messages.
    fn agent_messages(&self, system_prompt: Option<String>, req: &ProcessRequest) -> Vec<Message> {
        system_prompt
            .map(Message::system)
            .into_iter()
            .chain(self.memory.clone())
            .chain(req.messages.iter().cloned())
            .collect()
    }
}

/// Cheap-to-clone handle over the shared engine state.
#[derive(Clone)]
pub struct LayeredEngine {
    parts: Arc<EngineParts>,
}

impl LayeredEngine {
    pub fn builder(config: TransitConfig) -> LayeredEngineBuilder {
        LayeredEngineBuilder::new(config)
    }

    pub fn config(&self) -> &TransitConfig {
        &self.parts.config
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.parts.metrics
    }

    pub fn templates(&self) -> &TemplateEngine {
        &self.parts.templates
    }

    pub fn feedback(&self) -> &Arc<FeedbackModel> {
        self.parts.classifier.feedback()
    }

    pub fn render_metrics(&self) -> Result<String> {
        render_prometheus(&self.parts.metrics.snapshot())
    }

    /// Loads persisted feedback weights, if a store is configured.
    pub async fn restore_feedback(&self) -> Result<usize> {
        match &self.parts.feedback_store {
            Some(store) => self.feedback().restore_from(store.as_ref()).await,
            None => Ok(0),
        }
    }

    /// Records a helpfulness signal for `tags` and persists the new weights.
    #[instrument(skip(self))]
    pub async fn apply_feedback(&self, tags: &[String], helpful: bool) -> Result<()> {
        self.feedback().update(tags, helpful);
        if let Some(store) = &self.parts.feedback_store {
            self.feedback().persist_to(store.as_ref()).await?;
        }
        Ok(())
    }

    /// Starts processing `req`; events arrive on the returned receiver until it closes.
    pub fn process(&self, req: ProcessRequest) -> (StreamResponseMeta, mpsc::Receiver<StreamEvent>) {
        self.process_with_cancel(req, CancellationToken::new())
    }

    /// Like [`process`](Self::process), stopping early once `cancel` fires.
    #[instrument(skip(self, req, cancel), fields(locale = %req.locale))]
    pub fn process_with_cancel(
        &self,
        req: ProcessRequest,
        cancel: CancellationToken,
    ) -> (StreamResponseMeta, mpsc::Receiver<StreamEvent>) {
        let query_id = Uuid::new_v4();
        let trace_id = non_blank(req.trace_id.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| query_id.to_string());
        let meta = StreamResponseMeta {
            query_id,
            trace_id: trace_id.clone(),
        };

        let (tx, rx) = mpsc::channel(self.parts.config.stream.channel_capacity.max(1));
        let this = self.clone();
        let deadline = self.parts.config.timeouts.request_deadline();
        let span = info_span!("process", trace_id = %trace_id, query_id = %query_id);

        tokio::spawn(
            async move {
                let started = Instant::now();
                let mut out = Emitter::new(tx);
                out.send(StreamEvent::Meta { query_id, trace_id }).await;

                let resolution = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Resolution::Cancelled,
                    res = tokio::time::timeout(deadline, this.run(&req, &mut out, &cancel)) => {
                        res.unwrap_or(Resolution::DeadlineExceeded)
                    }
                };
                if matches!(resolution, Resolution::DeadlineExceeded) {
                    cancel.cancel();
                    warn!(deadline_ms = deadline.as_millis() as u64, "Request deadline exceeded");
                }

                let latency_ms = started.elapsed().as_millis() as u64;
                info!(tier = resolution.as_str(), latency_ms, "Request finished");
                out.send(StreamEvent::Done {
                    tier: resolution.as_str().to_string(),
                    latency_ms,
                })
                .await;
            }
            .instrument(span),
        );

        (meta, rx)
    }

    async fn run(&self, req: &ProcessRequest, out: &mut Emitter, cancel: &CancellationToken) -> Resolution {
        let Some(prepared) = self.prepare(req, out).await else {
            out.text(NO_MESSAGE).await;
            return Resolution::EmptyRequest;
        };
        let p = &prepared;
        if out.is_closed() {
            debug!("Client went away before any tier ran");
            return Resolution::Cancelled;
        }

        if let Some(res) = self.try_template(p, out).await {
            return res;
        }
        if let Some(res) = self.try_algorithmic(p, req, out, cancel).await {
            return res;
        }
        if let Some(res) = self.try_skill(p, out).await {
            return res;
        }
        let rag_context = self.retrieve(p).await;

        if p.route == IntentRoute::TemplateOnly && rag_context.is_empty() {
            let fallback = localized_concise_fallback(&p.locale);
            out.structured(json!({
                "type": "knowledge",
                "data": {"query": p.query, "summary": fallback, "source": "template_fallback"},
            }))
            .await;
            out.text(fallback).await;
            self.parts.metrics.inc_counter("tool_only_resolution_rate", 1);
            info!("Responded with template-only fallback");
            return Resolution::TemplateFallback;
        }

        if let Some(res) = self.try_llm(p, req, &rag_context, out, cancel).await {
            return res;
        }

        let apology = ultimate_fallback(&p.locale);
        out.structured(json!({
            "type": "knowledge",
            "data": {"query": p.query, "summary": apology, "source": "ultimate_fallback"},
        }))
        .await;
        out.text(apology).await;
        warn!("All tiers failed");
        Resolution::UltimateFallback
    }

    /// Classification, resolution and context snapshots. `None` when there is no user message.
    async fn prepare(&self, req: &ProcessRequest, out: &mut Emitter) -> Option<Prepared> {
        let parts = &self.parts;
        let mut query = req.last_user_message()?.to_string();
        let locale = req.locale_or_default().to_string();
        let token_profile = non_blank(req.token_profile.as_deref())
            .unwrap_or(parts.config.token.default_profile.as_str())
            .to_string();
        let response_mode = non_blank(req.response_mode.as_deref())
            .unwrap_or(parts.config.token.default_response_mode.as_str())
            .to_string();
        let max_context_tokens = req
            .max_context_tokens
            .filter(|t| *t > 0)
            .unwrap_or(parts.config.token.default_context_tokens);

        let faq_hit = is_faq_hit(&query);
        let analysis = parts.classifier.analyze(&query);
        out.decision_trace(json!({
            "type": "intent_router",
            "route": analysis.route.as_str(),
            "tags": analysis.tag_names(),
            "token_profile": token_profile,
            "response_mode": response_mode,
            "context_tokens": max_context_tokens,
        }))
        .await;
        parts.metrics.inc_counter("request_count", 1);
        if analysis.route == IntentRoute::LlmRequired {
            parts.metrics.inc_counter("llm_required_count", 1);
        }

        let mut node_ctx = parts.resolver.resolve(&query);
        if let Some(coerced) = parts.planner.coerce_route_query(&query, &node_ctx) {
            out.decision_trace(json!({
                "type": "query_rewrite",
                "rewritten": coerced.query,
                "origin": coerced.node_ctx.origin,
                "destination": coerced.node_ctx.destination,
            }))
            .await;
            query = coerced.query;
            node_ctx = coerced.node_ctx;
        }

        let plan = build_tool_plan(node_ctx.is_route_query, &analysis);
        if node_ctx.is_route_query {
            out.decision_trace(json!({
                "type": "route_query_detected",
                "origin": node_ctx.origin,
                "destination": node_ctx.destination,
                "confidence": node_ctx.confidence,
            }))
            .await;
        }
        out.decision_trace(json!({
            "type": "tool_plan",
            "route_tool": plan.route_tool,
            "status_tool": plan.status_tool,
            "time_tool": plan.time_tool,
            "require_route_explain": plan.require_route_explain,
            "intent_tags": plan.intent_tags,
        }))
        .await;

        let rule_confidence = estimate_rule_confidence(&query, &analysis);
        let has_context = req.has_journey_context() || node_ctx.origin.is_some() || node_ctx.destination.is_some();
        let ladder = decide_intent_ladder(&query, rule_confidence, has_context);
        let mut route = analysis.route;
        if ladder.require_deep_intent {
            route = IntentRoute::LlmRequired;
        }
        parts.metrics.record_intent_ladder(faq_hit, ladder.require_deep_intent);
        out.decision_trace(json!({
            "type": "intent_ladder",
            "complexity": ladder.complexity.as_str(),
            "require_deep": ladder.require_deep_intent,
            "rule_confidence": ladder.rule_confidence,
            "reason": ladder.reason,
            "context_detected": has_context,
        }))
        .await;

        let now = (parts.clock)();
        if plan.route_tool {
            out.tool_trace(json!({
                "tool": "plan_route",
                "required": true,
                "triggered": node_ctx.is_route_query,
            }))
            .await;
        }
        if plan.time_tool {
            out.tool_trace(json!({
                "tool": "get_current_time",
                "required": true,
                "triggered": true,
                "now": now.to_rfc3339(),
            }))
            .await;
        }

        let fetch_limit = parts.config.timeouts.context_fetch();
        let status = match &parts.status_cache {
            Some(cache) => best_effort("status", fetch_limit, cache.fetch()).await,
            None => None,
        };
        let weather = match &parts.weather {
            Some(feed) => best_effort("weather", fetch_limit, feed.get_current_weather()).await,
            None => None,
        };
        let memory = self.load_memory(req).await;

        debug!(
            route = route.as_str(),
            route_query = node_ctx.is_route_query,
            faq_hit,
            complexity = ladder.complexity.as_str(),
            "Prepared request context"
        );
        Some(Prepared {
            query,
            locale,
            token_profile,
            response_mode,
            max_context_tokens,
            faq_hit,
            route,
            node_ctx,
            plan,
            complexity: ladder.complexity,
            status,
            weather,
            memory,
            now,
        })
    }

    async fn load_memory(&self, req: &ProcessRequest) -> Option<Message> {
        let store = self.parts.memory_store.as_ref()?;
        if !req.has_identity() {
            return None;
        }
        let limit = self.parts.config.timeouts.context_fetch();
        let profile = best_effort("memory", limit, store.load_profile(&req.user_id, &req.session_id)).await??;
        profile.context_block().map(Message::system)
    }

    async fn try_template(&self, p: &Prepared, out: &mut Emitter) -> Option<Resolution> {
        let parts = &self.parts;
        parts.metrics.record_layer_attempt(Tier::L1);
        if !(p.faq_hit || !p.node_ctx.is_route_query) {
            return None;
        }
        let started = Instant::now();
        let mut ctx = TemplateContext::new(&p.query, &p.locale)
            .with_node_ctx(&p.node_ctx)
            .with_disruption(p.has_disruption());
        if let Some(w) = &p.weather {
            ctx = ctx.with_weather(w);
        }
        let matched = parts.templates.match_gated(&ctx, p.complexity);
        if !matched.matched {
            debug!("Template miss");
            return None;
        }

        parts.metrics.record_layer_success(Tier::L1, started.elapsed());
        out.structured(json!({
            "type": infer_structured_type(&p.plan, &p.node_ctx),
            "data": {
                "query": p.query,
                "summary": truncate_chars(&matched.content, STRUCTURED_SUMMARY_CHARS),
                "category": matched.category,
                "source": "template",
                "node_id": p.node_ctx.primary_node_id,
            },
        }))
        .await;
        out.text(matched.content).await;
        parts.metrics.inc_counter("tool_only_resolution_rate", 1);
        info!(category = %matched.category, "Responded from template tier");
        Some(Resolution::Tier(Tier::L1))
    }

    async fn try_algorithmic(
        &self,
        p: &Prepared,
        req: &ProcessRequest,
        out: &mut Emitter,
        cancel: &CancellationToken,
    ) -> Option<Resolution> {
        let parts = &self.parts;
        parts.metrics.record_layer_attempt(Tier::L2);
        let started = Instant::now();

        if p.node_ctx.is_route_query {
            let disabled_lines = p.status.as_ref().map(StatusContext::disrupted_railway_ids).unwrap_or_default();
            let route_req = RouteRequest {
                query: &p.query,
                locale: &p.locale,
                node_ctx: &p.node_ctx,
                is_raining: p.is_raining(),
                disabled_lines: &disabled_lines,
                now: p.now,
            };
            match parts.planner.plan(&route_req) {
                Ok(answer) => {
                    parts.metrics.record_layer_success(Tier::L2, started.elapsed());
                    out.tool_trace(json!({
                        "tool": "plan_route",
                        "required": true,
                        "triggered": true,
                        "success": true,
                    }))
                    .await;
                    out.structured(answer.structured).await;
                    out.text(answer.text).await;
                    parts.metrics.inc_counter("tool_only_resolution_rate", 1);
                    info!("Responded from route tool");
                    return Some(Resolution::Tier(Tier::L2));
                }
                Err(reason) => {
                    out.tool_trace(json!({
                        "tool": "plan_route",
                        "required": true,
                        "triggered": true,
                        "success": false,
                        "reason": reason.as_str(),
                    }))
                    .await;
                    debug!(reason = reason.as_str(), "Route tool fell through");
                }
            }
        }

        let agent = parts.status_agent.as_ref().filter(|_| p.plan.status_tool)?;
        let disrupted: Vec<&str> = p
            .status
            .as_ref()
            .map(|s| s.disrupted_lines.iter().map(|l| l.railway.as_str()).filter(|r| !r.is_empty()).collect())
            .unwrap_or_default();
        out.structured(json!({
            "type": "status",
            "data": {
                "query": p.query,
                "node_id": p.node_ctx.primary_node_id,
                "has_disruption": p.has_disruption(),
                "disrupted_lines": disrupted,
                "status_confidence": p.node_ctx.confidence,
                "source": "status_agent",
            },
        }))
        .await;

        let limit = parts.config.timeouts.agent_connect();
        let rx = best_effort(
            "status_agent",
            limit,
            agent.process(p.agent_messages(None, req), p.request_context(req)),
        )
        .await?;
        parts.metrics.record_layer_success(Tier::L2, started.elapsed());
        let outcome = stream_with_completion_guard(rx, out.sender(), &p.locale, false, cancel).await;
        if outcome.cancelled {
            return Some(Resolution::Cancelled);
        }
        parts.metrics.inc_counter("tool_only_resolution_rate", 1);
        info!("Responded from status agent");
        Some(Resolution::Tier(Tier::L2))
    }

    async fn try_skill(&self, p: &Prepared, out: &mut Emitter) -> Option<Resolution> {
        let parts = &self.parts;
        parts.metrics.record_layer_attempt(Tier::L3);
        let skills = parts.skills.as_ref()?;
        let started = Instant::now();
        let request = SkillRequest {
            query: p.query.clone(),
            context: SkillContext {
                node_id: p.node_ctx.primary_node_id.clone(),
                node_name: p.node_ctx.primary_node_name.clone(),
                locale: p.locale.clone(),
                tags: p.plan.intent_tags.clone(),
                disrupted: p.has_disruption(),
            },
        };
        let layer = &parts.config.layer;
        let response = best_effort(
            "skill",
            parts.config.timeouts.skill(),
            skills.execute(&request, layer.skill_min_confidence, layer.skill_max_candidates),
        )
        .await??;

        parts.metrics.record_layer_success(Tier::L3, started.elapsed());
        out.text(response.content.clone()).await;
        if response.needs_llm {
            debug!(category = %response.category, "Skill asked for LLM refinement");
            return None;
        }
        out.structured(json!({
            "type": "knowledge",
            "data": {
                "query": p.query,
                "summary": truncate_chars(&response.content, STRUCTURED_SUMMARY_CHARS),
                "category": response.category,
                "confidence": response.confidence,
                "source": "skill",
            },
        }))
        .await;
        parts.metrics.inc_counter("tool_only_resolution_rate", 1);
        info!(category = %response.category, "Responded from skill tier");
        Some(Resolution::Tier(Tier::L3))
    }

    /// Retrieval context for the LLM prompt; empty when nothing relevant was found.
    async fn retrieve(&self, p: &Prepared) -> String {
        let parts = &self.parts;
        parts.metrics.record_layer_attempt(Tier::L4);
        let (Some(embedder), Some(store)) = (&parts.embedder, &parts.vector_store) else {
            return String::new();
        };
        let started = Instant::now();
        let layer = &parts.config.layer;
        let expanded = expand_graph_node_ids(
            &p.node_ctx,
            parts.planner.graph(),
            layer.graph_rag_hops,
            layer.graph_rag_max_nodes,
        );
        let node_ids = normalize_node_ids(p.node_ctx.primary_node_id.as_deref(), &expanded);
        let opts = SearchOptions {
            limit: layer.rag_top_k,
            threshold: layer.rag_threshold,
            node_ids: node_ids.clone(),
            tags: p.plan.intent_tags.clone(),
        };

        let search = search_knowledge(embedder.as_ref(), store.as_ref(), &p.query, &opts);
        let Some(results) = best_effort("retrieval", parts.config.timeouts.retrieval(), search).await else {
            return String::new();
        };
        let results = filter_by_tags(filter_by_nodes(results, &node_ids), &p.plan.intent_tags);
        if results.is_empty() {
            return String::new();
        }
        parts.metrics.record_layer_success(Tier::L4, started.elapsed());
        debug!(documents = results.len(), "Retrieved knowledge");
        summarize_rag_results(&results, parts.config.token.rag_summary_max_chars)
    }

    async fn try_llm(
        &self,
        p: &Prepared,
        req: &ProcessRequest,
        rag_context: &str,
        out: &mut Emitter,
        cancel: &CancellationToken,
    ) -> Option<Resolution> {
        let parts = &self.parts;
        parts.metrics.record_layer_attempt(Tier::L5);
        let started = Instant::now();

        let wants_fast = matches!(p.route, IntentRoute::SlmOnly | IntentRoute::AlgoTool)
            || (p.node_ctx.is_route_query && p.node_ctx.confidence > FAST_PATH_ROUTE_CONFIDENCE)
            || is_status_query(&p.query);
        let (agent, fast_path, model) = match (&parts.fast_agent, &parts.general_agent) {
            (Some(fast), _) if wants_fast => (fast, true, &parts.config.models.fast_agent),
            (_, Some(general)) => (general, false, &parts.config.models.general_agent),
            _ => {
                debug!("No completion agent available");
                return None;
            }
        };
        let provider = agent.provider().to_string();

        let inputs = PromptInputs {
            locale: &p.locale,
            now: p.now,
            client_now_iso: req.client_now_iso.as_deref(),
            token_profile: &p.token_profile,
            response_mode: &p.response_mode,
            time_tool_required: p.plan.time_tool,
            route_explain_required: p.plan.require_route_explain,
            weather: p.weather.as_ref(),
            status: p.status.as_ref(),
            node_ctx: Some(&p.node_ctx),
            rag_context,
        };
        let system_prompt = if fast_path {
            build_fast_prompt(&inputs)
        } else {
            build_system_prompt(&inputs)
        };

        out.decision_trace(json!({
            "type": "llm_selection",
            "selected_agent": agent.name(),
            "selected_model": model,
            "selected_provider": provider,
            "fast_path": fast_path,
        }))
        .await;

        let messages = p.agent_messages(Some(system_prompt), req);
        let prompt_chars: usize = messages.iter().map(|m| m.content.chars().count()).sum();
        parts.metrics.inc_counter("prompt_chars_total", prompt_chars as i64);

        let rx = best_effort(
            "completion_agent",
            parts.config.timeouts.agent_connect(),
            agent.process(messages, p.request_context(req)),
        )
        .await?;
        parts.metrics.record_layer_success(Tier::L5, started.elapsed());
        parts.metrics.inc_counter("llm_invocation_count", 1);

        let outcome =
            stream_with_completion_guard(rx, out.sender(), &p.locale, p.node_ctx.is_route_query, cancel).await;
        if outcome.cancelled {
            return Some(Resolution::Cancelled);
        }

        out.structured(json!({
            "type": infer_structured_type(&p.plan, &p.node_ctx),
            "data": {
                "query": p.query,
                "summary": truncate_chars(&outcome.text, LLM_SUMMARY_CHARS),
                "provider": provider,
                "model": model,
                "fast_path": fast_path,
                "token_mode": p.token_profile,
                "source": "llm",
            },
        }))
        .await;
        parts
            .metrics
            .inc_counter("completion_chars_total", outcome.text.chars().count() as i64);

        if let Some(reason) = detect_busy_message(&outcome.text) {
            out.decision_trace(json!({
                "type": "upstream_busy_detected",
                "reason": reason,
                "provider": provider,
                "model": model,
                "fast_path": fast_path,
            }))
            .await;
        }

        if let Some(checker) = &parts.fact_checker {
            let check = checker.check(&p.query, &outcome.text, &p.locale);
            if check.has_hallucination() && !check.correction.is_empty() {
                warn!(issues = check.issues.len(), "Fact check appended a correction");
                out.text(check.correction).await;
            }
        }

        info!(fast_path, agent = agent.name(), "Responded from LLM tier");
        Some(Resolution::Tier(Tier::L5))
    }
}
