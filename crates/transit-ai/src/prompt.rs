//! System prompts for the LLM tier plus the fixed localized fallback texts.

use chrono::{DateTime, Datelike, FixedOffset, Offset, Utc};
use transit_cache::StatusContext;
use transit_core::CurrentWeather;
use transit_intent::ResolvedContext;

pub const DEFAULT_TIMEZONE: &str = "Asia/Tokyo";

const JST_OFFSET_SECS: i32 = 9 * 3600;
const HEAT_ADVICE_CELSIUS: f64 = 30.0;

/// Japan has no daylight saving, so a fixed +09:00 offset is exact.
pub fn jst() -> FixedOffset {
    FixedOffset::east_opt(JST_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

pub fn jst_now() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&jst())
}

/// National holidays on fixed month-day dates.
const HOLIDAYS: &[((u32, u32), &str)] = &[
    ((1, 1), "New Year's Day"),
    ((1, 12), "Coming of Age Day"),
    ((2, 11), "National Foundation Day"),
    ((2, 23), "Emperor's Birthday"),
    ((3, 20), "Vernal Equinox Day"),
    ((4, 29), "Showa Day"),
    ((5, 3), "Constitution Memorial Day"),
    ((5, 4), "Greenery Day"),
    ((5, 5), "Children's Day"),
    ((7, 20), "Marine Day"),
    ((8, 11), "Mountain Day"),
    ((9, 21), "Respect for the Aged Day"),
    ((9, 23), "Autumnal Equinox Day"),
    ((10, 12), "Sports Day"),
    ((11, 3), "Culture Day"),
    ((11, 23), "Labor Thanksgiving Day"),
];

pub fn japan_holiday<Tz: chrono::TimeZone>(at: &DateTime<Tz>) -> Option<&'static str> {
    let key = (at.month(), at.day());
    HOLIDAYS.iter().find(|(d, _)| *d == key).map(|(_, name)| *name)
}

pub fn prompt_directives(profile: &str) -> &'static str {
    match profile.trim().to_lowercase().as_str() {
        "aggressive" => "Ultra-lean mode: final answer in <= 4 bullets, no narrative, no long comparisons unless explicitly requested.",
        "quality" => "Quality mode: include route rationale, risk note, and one alternative with reason; if timetable-related include explicit time feasibility check and confidence caveat.",
        _ => "Balanced mode: concise first answer, expand only on user follow-up.",
    }
}

fn weather_line(weather: Option<&CurrentWeather>) -> String {
    match weather {
        Some(w) => {
            let cond = if w.condition.trim().is_empty() {
                if w.is_raining {
                    "Rain"
                } else {
                    "Clear"
                }
            } else {
                w.condition.as_str()
            };
            format!("{}, {:.1}°C", cond, w.temperature)
        }
        None => "Unknown".to_string(),
    }
}

fn weather_advice(weather: Option<&CurrentWeather>) -> Option<&'static str> {
    let w = weather?;
    if w.is_raining {
        Some("Rain: prioritize covered/indoor transfers.")
    } else if w.temperature > HEAT_ADVICE_CELSIUS {
        Some("Heat: reduce outdoor walking.")
    } else {
        None
    }
}

/// Everything the prompt builders read for one request.
#[derive(Debug, Clone)]
pub struct PromptInputs<'a> {
    pub locale: &'a str,
    pub now: DateTime<FixedOffset>,
    pub client_now_iso: Option<&'a str>,
    pub token_profile: &'a str,
    pub response_mode: &'a str,
    pub time_tool_required: bool,
    pub route_explain_required: bool,
    pub weather: Option<&'a CurrentWeather>,
    pub status: Option<&'a StatusContext>,
    pub node_ctx: Option<&'a ResolvedContext>,
    pub rag_context: &'a str,
}

pub fn build_system_prompt(inputs: &PromptInputs<'_>) -> String {
    let time_str = inputs.now.format("%Y-%m-%d %H:%M (%a)");
    let client_hint = inputs
        .client_now_iso
        .filter(|s| !s.trim().is_empty())
        .map(|s| format!("\nClient Reported Time: {}", s))
        .unwrap_or_default();
    let holiday = if japan_holiday(&inputs.now).is_some() { "Yes" } else { "No" };

    let mut prompt = format!(
        "You are a Tokyo transit concierge.\n\
         Time({tz}): {time}{client}\n\
         Weather: {weather}\n\
         Locale: {locale}\n\
         Profile: {profile}\n\
         Holiday: {holiday}\n\
         \n\
         Rules:\n\
         1) Tool-first. If route/status/time is needed, call tools before final answer.\n\
         2) Time policy: get_current_time required={time_tool}.\n\
         3) Route policy: include recommended and one rejected option required={explain}.\n\
         4) Mode: {mode}. Behavior: {directives}.\n\
         5) Keep final answer concise.",
        tz = DEFAULT_TIMEZONE,
        time = time_str,
        client = client_hint,
        weather = weather_line(inputs.weather),
        locale = inputs.locale,
        profile = inputs.token_profile,
        holiday = holiday,
        time_tool = inputs.time_tool_required,
        explain = inputs.route_explain_required,
        mode = inputs.response_mode,
        directives = prompt_directives(inputs.token_profile),
    );
    if let Some(advice) = weather_advice(inputs.weather) {
        prompt.push_str("\n6) ");
        prompt.push_str(advice);
    }
    if let Some(status) = inputs.status {
        prompt.push_str(&status.for_system_prompt());
    }
    if let Some(name) = inputs.node_ctx.and_then(|n| n.primary_node_name.as_deref()) {
        prompt.push_str(&format!("\n## USER CONTEXT\nDetected Location/Station: {}\n", name));
    }
    if !inputs.rag_context.is_empty() {
        prompt.push_str(&format!("\n## EXPERT KNOWLEDGE BASE (RAG)\n{}\n", inputs.rag_context));
    }
    prompt.push_str(&format!(
        "\nResponse guidelines:\n\
         - Lead with direct answer first.\n\
         - Keep reasoning brief unless user explicitly asks \"why\" or requests details.\n\
         - Answer primarily in the user's language ({}).",
        inputs.locale
    ));
    prompt
}

/// Compact prompt for the fast tier.
pub fn build_fast_prompt(inputs: &PromptInputs<'_>) -> String {
    let mut prompt = format!(
        "You are a Tokyo transit concierge (Fast Task Tier).\n[Context] Time: {} ({}), Weather: {}.",
        inputs.now.format("%H:%M (%a)"),
        DEFAULT_TIMEZONE,
        weather_line(inputs.weather)
    );
    if let Some(node) = inputs.node_ctx {
        match (node.is_route_query, node.origin.as_deref(), node.destination.as_deref()) {
            (true, Some(o), Some(d)) if !o.is_empty() && !d.is_empty() => {
                prompt.push_str(&format!("\n[Intent] Route: {} -> {}", o, d));
            }
            _ => {
                if let Some(name) = node.primary_node_name.as_deref() {
                    prompt.push_str(&format!("\n[Focus] Node: {}", name));
                }
            }
        }
    }
    prompt.push_str(&format!(
        "\n[Instructions]\n\
         - Provide a concise, expert answer for the user's transit/status question.\n\
         - Prioritize SPEED: If it's a route, give the fastest 1-2 options immediately.\n\
         - If status data is present, mention it briefly.\n\
         - Response mode: {}.\n\
         - Answer in {}.",
        inputs.response_mode, inputs.locale
    ));
    if let Some(status) = inputs.status.filter(|s| s.has_disruption) {
        prompt.push_str("\n[Status] ");
        prompt.push_str(&status.for_system_prompt());
    }
    prompt
}

/// Reply for template-only queries that retrieval could not enrich.
pub fn localized_concise_fallback(locale: &str) -> &'static str {
    if locale.starts_with("ja") {
        "要点: もう少し具体的な目的地や条件を教えてください。最短で提案します。"
    } else if locale.starts_with("zh") {
        "重點：請再提供更明確的目的地或限制條件，我會給您最短可行方案。"
    } else {
        "Summary: Please share the destination or constraints, and I will provide the fastest actionable option."
    }
}

/// Emitted when every tier failed.
pub fn ultimate_fallback(locale: &str) -> &'static str {
    if locale.starts_with("ja") {
        "申し訳ありません。現在リクエストを処理できません。しばらくしてから再度お試しください。"
    } else if locale.starts_with("en") {
        "Sorry, I can't handle your request right now. Please try again later."
    } else {
        "抱歉，我目前無法處理您的請求。請稍後再試。"
    }
}

const BUSY_PATTERNS: &[(&str, &str)] = &[
    ("busy", "busy_message"),
    ("混み合", "busy_message"),
    ("稍後再", "busy_message"),
    ("請稍後", "busy_message"),
    ("timeout", "timeout_message"),
    ("timed out", "timeout_message"),
    ("model unavailable", "model_unavailable"),
    ("tool error", "tool_failure_message"),
];

/// Reason code when a streamed answer reads like an upstream busy or error notice.
pub fn detect_busy_message(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    BUSY_PATTERNS
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map(|(_, reason)| *reason)
}
