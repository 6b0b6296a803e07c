//! Layered answering for the Tokyo transit concierge.
//!
//! [`LayeredEngine`] walks a query through template, route tool, skill,
//! retrieval and LLM tiers and streams [`StreamEvent`]s back to the caller.

pub mod agent;
pub mod completion_guard;
pub mod fact_checker;
pub mod orchestrator;
pub mod prompt;
pub mod rag;
pub mod routing;
pub mod stream;

pub use agent::{
    CompletionAgent, Message, MessageRole, RequestContext, SkillContext, SkillRegistry, SkillRequest,
    SkillResponse,
};
pub use completion_guard::{stream_with_completion_guard, GuardOutcome};
pub use fact_checker::{FactCheckResult, FactChecker};
pub use orchestrator::{Clock, LayeredEngine, LayeredEngineBuilder, ProcessRequest, Resolution};
pub use routing::{PlaceCatalog, RouteAnswer, RouteFallthrough, RoutePlanner};
pub use stream::{collect_text, into_stream, StreamEvent, StreamResponseMeta};
