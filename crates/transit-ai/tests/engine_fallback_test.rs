mod common;

use approx::assert_relative_eq;
use common::*;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use transit_ai::{collect_text, LayeredEngine, Message, ProcessRequest, StreamEvent};
use transit_core::{MemoryProfile, Tier, TransitConfig};

#[tokio::test]
async fn test_faq_answered_from_template() {
    let engine = LayeredEngine::builder(TransitConfig::default()).build();

    let (_, rx) = engine.process(ProcessRequest::new("zh-TW", "哪裡有廁所"));
    let events = collect(rx).await;

    assert_eq!(done_tier(&events), "L1");
    assert!(collect_text(&events).starts_with("🚻"));
    let payload = structured(&events)[0];
    assert_eq!(payload["type"], "knowledge");
    assert_eq!(payload["data"]["source"], "template");
    assert_eq!(engine.metrics().snapshot().counter("request_count"), 1);
}

#[tokio::test]
async fn test_compound_query_skips_template() {
    let general = ScriptedAgent::new("general", &["建議搭乘銀座線，", "淺草站出口旁有置物櫃。"]);
    let engine = LayeredEngine::builder(TransitConfig::default())
        .general_agent(general.clone())
        .build();

    let (_, rx) = engine.process(ProcessRequest::new("zh-TW", "從上野去淺草，有大行李，哪裡有置物櫃"));
    let events = collect(rx).await;

    assert_eq!(done_tier(&events), "L5");
    let ladder = decision_traces(&events, "intent_ladder");
    assert_eq!(ladder[0]["complexity"], "compound");
    assert_eq!(ladder[0]["require_deep"], true);
    assert!(structured(&events).iter().all(|p| p["data"]["source"] != "template"));
    assert_eq!(general.call_count(), 1);

    let snapshot = engine.metrics().snapshot();
    assert_eq!(snapshot.tier(Tier::L1).successes, 0);
    assert_eq!(snapshot.counter("intent_ladder_deep"), 1);
    assert_eq!(snapshot.counter("llm_invocation_count"), 1);
}

#[tokio::test]
async fn test_dangling_answer_gets_conclusion() {
    let general = ScriptedAgent::new("general", &["Let me check the timetable"]);
    let engine = LayeredEngine::builder(TransitConfig::default())
        .general_agent(general)
        .build();

    let (_, rx) = engine.process(ProcessRequest::new("en", "Tell me about the history of the Yamanote line"));
    let events = collect(rx).await;

    assert_eq!(done_tier(&events), "L5");
    assert_eq!(
        collect_text(&events),
        "Let me check the timetable\n\nFinal conclusion: This is the best recommendation under current conditions."
    );
    let llm = structured(&events).into_iter().find(|p| p["data"]["source"] == "llm").unwrap();
    assert_eq!(llm["data"]["fast_path"], false);
}

#[tokio::test]
async fn test_status_query_serves_stale_snapshot() {
    let mut config = TransitConfig::default();
    config.layer.status_cache_ttl_secs = 0;
    let feed = FlakyStatusFeed::ginza_suspended(1);
    let status_agent = ScriptedAgent::new("status", &["銀座線目前暫停運行。"]);
    let engine = LayeredEngine::builder(config)
        .status_feed(feed.clone())
        .status_agent(status_agent.clone())
        .build();

    for _ in 0..2 {
        let (_, rx) = engine.process(ProcessRequest::new("zh-TW", "銀座線有延誤嗎"));
        let events = collect(rx).await;

        assert_eq!(done_tier(&events), "L2");
        let status = structured(&events).into_iter().find(|p| p["type"] == "status").unwrap();
        assert_eq!(status["data"]["has_disruption"], true);
        assert_eq!(status["data"]["disrupted_lines"][0], "Ginza");
        assert_eq!(collect_text(&events), "銀座線目前暫停運行。");
    }
    assert_eq!(feed.calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    assert_eq!(status_agent.call_count(), 2);
}

#[tokio::test]
async fn test_no_agents_gives_localized_apology() {
    let engine = LayeredEngine::builder(TransitConfig::default()).build();

    let (_, rx) = engine.process(ProcessRequest::new("en", "Tell me about the history of the Yamanote line"));
    let events = collect(rx).await;

    assert_eq!(done_tier(&events), "fallback");
    assert_eq!(
        collect_text(&events),
        "Sorry, I can't handle your request right now. Please try again later."
    );
    assert!(structured(&events).iter().any(|p| p["data"]["source"] == "ultimate_fallback"));
}

#[tokio::test]
async fn test_short_unmatched_query_gets_concise_fallback() {
    let general = ScriptedAgent::new("general", &["unused"]);
    let engine = LayeredEngine::builder(TransitConfig::default())
        .general_agent(general.clone())
        .build();

    let (_, rx) = engine.process(ProcessRequest::new("zh-TW", "嗯嗯好"));
    let events = collect(rx).await;

    assert_eq!(done_tier(&events), "template_fallback");
    assert_eq!(
        collect_text(&events),
        "重點：請再提供更明確的目的地或限制條件，我會給您最短可行方案。"
    );
    assert_eq!(general.call_count(), 0);
}

#[tokio::test]
async fn test_empty_request() {
    let engine = LayeredEngine::builder(TransitConfig::default()).build();

    let (_, rx) = engine.process(ProcessRequest::default());
    let events = collect(rx).await;

    assert_eq!(events.len(), 3);
    assert_eq!(collect_text(&events), "No message provided");
    assert_eq!(done_tier(&events), "empty");
}

#[tokio::test]
async fn test_cancellation_stops_content() {
    let engine = LayeredEngine::builder(TransitConfig::default())
        .general_agent(Arc::new(StallingAgent))
        .build();
    let cancel = CancellationToken::new();

    let (_, mut rx) = engine.process_with_cancel(
        ProcessRequest::new("en", "Tell me about the history of the Yamanote line"),
        cancel.clone(),
    );
    loop {
        match rx.recv().await {
            Some(StreamEvent::Content { .. }) => break,
            Some(_) => continue,
            None => panic!("stream closed before any content"),
        }
    }
    cancel.cancel();

    let rest = collect(rx).await;
    assert_eq!(done_tier(&rest), "cancelled");
    assert!(rest.iter().all(|e| e.text().is_none()));
}

#[tokio::test]
async fn test_request_deadline_closes_stream() {
    let mut config = TransitConfig::default();
    config.timeouts.request_deadline_secs = 1;
    let engine = LayeredEngine::builder(config)
        .general_agent(Arc::new(StallingAgent))
        .build();

    let (_, rx) = engine.process(ProcessRequest::new("en", "Tell me about the history of the Yamanote line"));
    let events = tokio::time::timeout(Duration::from_secs(5), collect(rx))
        .await
        .expect("deadline should close the stream");

    assert_eq!(done_tier(&events), "timeout");
    assert_eq!(collect_text(&events), "Thinking about your trip");
}

#[tokio::test]
async fn test_memory_profile_reaches_agent() {
    let general = ScriptedAgent::new("general", &["Here is a quiet route."]);
    let engine = LayeredEngine::builder(TransitConfig::default())
        .general_agent(general.clone())
        .memory_store(Arc::new(SingleProfileMemory(MemoryProfile {
            user_id: "u1".to_string(),
            summary: "Prefers fewer transfers".to_string(),
            ..Default::default()
        })))
        .build();

    let req = ProcessRequest::new("en", "Tell me about the history of the Yamanote line").with_session("u1", "s1");
    let (_, rx) = engine.process(req);
    collect(rx).await;

    let sent: Vec<Message> = general.last_messages.lock().clone();
    assert_eq!(sent.len(), 3);
    assert!(sent[1].content.starts_with("[Memory Context]"));
    assert!(sent[1].content.contains("Prefers fewer transfers"));
    assert_eq!(sent[2].content, "Tell me about the history of the Yamanote line");
}

#[tokio::test]
async fn test_feedback_is_persisted_and_restored() {
    let store = Arc::new(InMemoryFeedbackStore::default());
    let engine = LayeredEngine::builder(TransitConfig::default())
        .feedback_store(store.clone())
        .build();

    engine.apply_feedback(&["route".to_string()], true).await.unwrap();
    assert_relative_eq!(store.weights.lock()["route"], 0.12);

    let restarted = LayeredEngine::builder(TransitConfig::default())
        .feedback_store(store)
        .build();
    assert_eq!(restarted.restore_feedback().await.unwrap(), 1);
    assert_relative_eq!(restarted.feedback().score("route"), 0.12);
}

#[tokio::test]
async fn test_trace_id_is_echoed_and_metrics_render() {
    let engine = LayeredEngine::builder(TransitConfig::default()).build();

    let (meta, rx) = engine.process(ProcessRequest::new("en", "hello").with_trace_id("trace-42"));
    let events = collect(rx).await;

    assert_eq!(meta.trace_id, "trace-42");
    assert!(matches!(&events[0], StreamEvent::Meta { trace_id, .. } if trace_id == "trace-42"));
    assert_eq!(done_tier(&events), "L1");

    let text = engine.render_metrics().unwrap();
    assert!(text.contains("transit_counter{name=\"request_count\"} 1"));
}
