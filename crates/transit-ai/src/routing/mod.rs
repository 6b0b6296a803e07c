//! Deterministic route answers computed before any model is involved.
//!
//! Airports get a fixed ranked table; everything else goes through the
//! station graph with landmark and fuzzy endpoint expansion.

pub mod airport;
pub mod places;

pub use airport::*;
pub use places::*;

use chrono::{DateTime, FixedOffset};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;
use transit_graph::{count_transfers, line_display_name, DeepContext, Pathfinder, TransitGraph};
use transit_intent::text::contains_any_term;
use transit_intent::{ResolvedContext, CONFIDENCE_ROUTE};

const ENDPOINT_CUTOFFS: &[&str] = &[
    "怎麼走", "怎麼去", "怎么去", "如何去", "路線", "路线", "請規劃", "請规划", "出發", "出发",
    "how to get", "how to go", "route", "please plan",
];
const ENDPOINT_TRIM: &[char] = &[' ', '，', '。', ',', '.', '!', '?', '！', '？', '：', ':', ';', '；'];

const CJK_ROUTE_CUES: &[&str] = &["怎麼", "怎么", "路線", "路线", "去", "到", "從", "从"];
const LATIN_ROUTE_CUES: &[&str] = &["from", "to", "route", "transfer", "how to get"];

/// Urgency used for tool-first planning; mildly prefers fewer transfers.
const TOOL_URGENCY: u8 = 6;
const FUZZY_MAX_CANDIDATES: usize = 3;
const MAX_ALTERNATIVES: usize = 2;

static ENDPOINT_CUTOFF_RE: Lazy<Regex> = Lazy::new(|| {
    let alternation = ENDPOINT_CUTOFFS
        .iter()
        .map(|t| regex::escape(t))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!("(?i){}", alternation)).expect("valid endpoint cutoff regex")
});

struct EndpointPattern {
    regex: Regex,
    destination_first: bool,
}

static ENDPOINT_PATTERNS: Lazy<Vec<EndpointPattern>> = Lazy::new(|| {
    let p = |re: &str, destination_first| EndpointPattern {
        regex: Regex::new(re).expect("endpoint pattern"),
        destination_first,
    };
    vec![
        p(r"(?i)(?:我在|\bi am at\b)\s*(.+?)\s*(?:要去|想去|去|\bto\b)\s*(.+)", false),
        p(r"(?i)(?:從|从|\bfrom\b)\s*(.+?)\s*(?:出發|出发|\bdepart\b|\bdeparture\b)?\s*(?:到|去|\bto\b)\s*(.+)", false),
        p(r"(?i)(?:去|\bto\b)\s*(.+?)\s*[，,、 ]*(?:從|从|\bfrom\b)\s*(.+?)\s*(?:出發|出发|\bdepart\b|\bdeparture\b)?$", true),
    ]
});

const STATION_ALIASES: &[(&str, &str)] = &[
    ("tokyo", "tokyo"),
    ("東京", "tokyo"),
    ("東京駅", "tokyo"),
    ("shinjuku", "shinjuku"),
    ("新宿", "shinjuku"),
    ("shibuya", "shibuya"),
    ("渋谷", "shibuya"),
    ("ueno", "ueno"),
    ("上野", "ueno"),
    ("asakusa", "asakusa"),
    ("浅草", "asakusa"),
    ("ginza", "ginza"),
    ("銀座", "ginza"),
    ("ikebukuro", "ikebukuro"),
    ("池袋", "ikebukuro"),
    ("narita", "narita"),
    ("成田空港", "narita"),
    ("nrt", "narita"),
    ("成田機場", "narita"),
    ("haneda", "haneda"),
    ("羽田空港", "haneda"),
    ("hnd", "haneda"),
    ("羽田機場", "haneda"),
    ("tocho", "shinjuku"),
    ("都庁前", "shinjuku"),
    ("東京都廳", "shinjuku"),
];

/// Strips trailing "how do I get there" phrasing and punctuation from an endpoint.
pub fn normalize_endpoint_query(input: &str) -> String {
    let s = input.trim();
    let head = match ENDPOINT_CUTOFF_RE.find(s) {
        Some(m) => &s[..m.start()],
        None => s,
    };
    head.trim().trim_matches(ENDPOINT_TRIM).to_string()
}

pub fn contains_route_cue(query: &str) -> bool {
    let q = query.trim().to_lowercase();
    CJK_ROUTE_CUES.iter().any(|c| q.contains(c)) || contains_any_term(&q, LATIN_ROUTE_CUES)
}

/// Origin and destination from free text, normalized. Both must be non-empty.
pub fn parse_route_endpoints(query: &str) -> Option<(String, String)> {
    let q = query.trim();
    ENDPOINT_PATTERNS.iter().find_map(|p| {
        let caps = p.regex.captures(q)?;
        let first = normalize_endpoint_query(caps.get(1)?.as_str());
        let second = normalize_endpoint_query(caps.get(2)?.as_str());
        let (origin, destination) = if p.destination_first { (second, first) } else { (first, second) };
        (!origin.is_empty() && !destination.is_empty()).then_some((origin, destination))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointKind {
    Station,
    Poi,
    Airport,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointCandidate {
    pub station_id: String,
    pub station_name: String,
    pub walk_minutes: u32,
    pub complexity_hint: u32,
}

/// Why the tool-first tier handed the query on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteFallthrough {
    MissingOriginOrDestination,
    PathfinderUnavailable,
    EndpointResolutionFailed,
    NoRouteFound,
}

impl RouteFallthrough {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteFallthrough::MissingOriginOrDestination => "missing_origin_or_destination",
            RouteFallthrough::PathfinderUnavailable => "pathfinder_unavailable",
            RouteFallthrough::EndpointResolutionFailed => "endpoint_resolution_failed",
            RouteFallthrough::NoRouteFound => "no_route_found",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteAnswer {
    pub text: String,
    pub structured: Value,
}

/// A query rewritten into explicit route form.
#[derive(Debug, Clone, PartialEq)]
pub struct CoercedRoute {
    pub query: String,
    pub node_ctx: ResolvedContext,
}

/// Inputs for one tool-first planning attempt.
#[derive(Debug, Clone)]
pub struct RouteRequest<'a> {
    pub query: &'a str,
    pub locale: &'a str,
    pub node_ctx: &'a ResolvedContext,
    pub is_raining: bool,
    /// Railway IDs currently suspended
    pub disabled_lines: &'a [String],
    pub now: DateTime<FixedOffset>,
}

#[derive(Debug, Clone)]
struct ScoredRoute {
    origin: EndpointCandidate,
    destination: EndpointCandidate,
    steps: Vec<Value>,
    duration_minutes: u32,
    transfers: usize,
    score: f64,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn station_score(id: &str, name_ja: &str, name_en: &str, term: &str) -> u32 {
    let mut score = 100;
    if id.to_lowercase().contains(term) {
        score -= 40;
    }
    if name_ja.to_lowercase().contains(term) {
        score -= 30;
    }
    if name_en.to_lowercase().contains(term) {
        score -= 30;
    }
    score
}

fn scored_stations<'g>(graph: &'g TransitGraph, term: &str) -> Vec<(u32, &'g str)> {
    let mut scored: Vec<(u32, &str)> = graph
        .nodes()
        .map(|n| (station_score(&n.id, &n.name_ja, &n.name_en, term), n.id.as_str()))
        .collect();
    scored.sort();
    scored
}

/// Best-matching station ID for free text, after alias mapping.
pub fn resolve_station_id(graph: &TransitGraph, input: &str) -> Option<String> {
    let mut term = input.trim().to_lowercase();
    if term.is_empty() {
        return None;
    }
    if let Some((_, mapped)) = STATION_ALIASES.iter().find(|(alias, _)| *alias == term) {
        term = mapped.to_string();
    }
    scored_stations(graph, &term)
        .into_iter()
        .next()
        .filter(|(score, _)| *score <= 90)
        .map(|(_, id)| id.to_string())
}

/// Up to `max` loose matches, each with a growing walk and complexity penalty.
pub fn resolve_fuzzy_stations(graph: &TransitGraph, input: &str, max: usize) -> Vec<EndpointCandidate> {
    let term = input.trim().to_lowercase();
    if term.is_empty() {
        return Vec::new();
    }
    scored_stations(graph, &term)
        .into_iter()
        .filter(|(score, _)| *score < 95)
        .take(max)
        .enumerate()
        .filter_map(|(i, (_, id))| {
            let node = graph.node(id)?;
            Some(EndpointCandidate {
                station_id: id.to_string(),
                station_name: node.display_name().to_string(),
                walk_minutes: 4 + 2 * i as u32,
                complexity_hint: 2 + i as u32,
            })
        })
        .collect()
}

pub fn build_route_summary(
    locale: &str,
    origin: &str,
    destination: &str,
    duration_minutes: u32,
    transfers: usize,
    kind: EndpointKind,
) -> String {
    let poi = kind == EndpointKind::Poi;
    if locale.starts_with("ja") {
        if poi {
            return format!(
                "おすすめ経路: {o} 付近は {o} 駅を起点、{d} 付近は {d} 駅を終点にすると、約{m}分（乗換{t}回）です。",
                o = origin, d = destination, m = duration_minutes, t = transfers
            );
        }
        return format!("おすすめ経路: {} から {} まで約{}分（乗換{}回）です。", origin, destination, duration_minutes, transfers);
    }
    if locale.starts_with("zh") {
        if poi {
            return format!(
                "推薦路線：起點建議從 {o} 附近的 {o} 站進站，終點建議走到 {d} 附近的 {d} 站，約 {m} 分鐘、轉乘 {t} 次。",
                o = origin, d = destination, m = duration_minutes, t = transfers
            );
        }
        return format!("推薦路線：{} 到 {} 約 {} 分鐘，轉乘 {} 次。", origin, destination, duration_minutes, transfers);
    }
    format!(
        "Recommended route: {} to {} in about {} minutes with {} transfer(s).",
        origin, destination, duration_minutes, transfers
    )
}

/// Tool-first route planner over the optional station graph.
#[derive(Debug, Clone)]
pub struct RoutePlanner {
    pathfinder: Option<Arc<Pathfinder>>,
    places: PlaceCatalog,
}

impl Default for RoutePlanner {
    fn default() -> Self {
        Self::new(None, PlaceCatalog::builtin())
    }
}

impl RoutePlanner {
    pub fn new(pathfinder: Option<Arc<Pathfinder>>, places: PlaceCatalog) -> Self {
        Self { pathfinder, places }
    }

    pub fn pathfinder(&self) -> Option<&Arc<Pathfinder>> {
        self.pathfinder.as_ref()
    }

    pub fn graph(&self) -> Option<&TransitGraph> {
        self.pathfinder.as_deref().map(Pathfinder::graph)
    }

    pub fn places(&self) -> &PlaceCatalog {
        &self.places
    }

    /// Rewrites a route-like query the resolver left without endpoints.
    ///
    /// Tries the explicit phrasings first, then a landmark as destination with
    /// the resolved station as origin.
    pub fn coerce_route_query(&self, query: &str, node_ctx: &ResolvedContext) -> Option<CoercedRoute> {
        if !contains_route_cue(query) {
            return None;
        }
        if node_ctx.is_route_query && node_ctx.has_endpoints() {
            return None;
        }

        let (origin, destination) = parse_route_endpoints(query).or_else(|| {
            let spec = self.places.match_spec(query)?;
            let origin = normalize_endpoint_query(node_ctx.primary_node_name.as_deref()?);
            let destination = normalize_endpoint_query(&spec.name);
            (!origin.is_empty() && !destination.is_empty()).then_some((origin, destination))
        })?;
        if origin.to_lowercase() == destination.to_lowercase() {
            return None;
        }

        let mut ctx = node_ctx.clone();
        ctx.is_route_query = true;
        ctx.confidence = ctx.confidence.max(CONFIDENCE_ROUTE);
        let query = format!("從{}到{}怎麼去", origin, destination);
        ctx.origin = Some(origin);
        ctx.destination = Some(destination);
        debug!(rewritten = %query, "Coerced route query");
        Some(CoercedRoute { query, node_ctx: ctx })
    }

    pub fn expand_endpoint_candidates(&self, graph: &TransitGraph, raw: &str) -> (Vec<EndpointCandidate>, EndpointKind) {
        let direct = |id: String| {
            let name = graph.node(&id).map(|n| n.display_name().to_string()).unwrap_or_else(|| id.clone());
            vec![EndpointCandidate {
                station_id: id,
                station_name: name,
                walk_minutes: 0,
                complexity_hint: 1,
            }]
        };

        if is_airport_keyword(raw) {
            let candidates = resolve_station_id(graph, raw).map(direct).unwrap_or_default();
            return (candidates, EndpointKind::Airport);
        }
        if let Some(id) = resolve_station_id(graph, raw) {
            return (direct(id), EndpointKind::Station);
        }
        if let Some(spec) = self.places.match_spec(raw) {
            let candidates = spec
                .candidates
                .iter()
                .filter_map(|c| {
                    let id = resolve_station_id(graph, &c.station_name)?;
                    let node = graph.node(&id)?;
                    Some(EndpointCandidate {
                        station_name: node.display_name().to_string(),
                        station_id: id,
                        walk_minutes: c.walk_minutes,
                        complexity_hint: c.complexity_hint,
                    })
                })
                .collect();
            return (candidates, EndpointKind::Poi);
        }
        (resolve_fuzzy_stations(graph, raw, FUZZY_MAX_CANDIDATES), EndpointKind::Station)
    }

    /// Answers a resolved route query without a model, or says why it cannot.
    pub fn plan(&self, req: &RouteRequest<'_>) -> Result<RouteAnswer, RouteFallthrough> {
        let origin_text = normalize_endpoint_query(req.node_ctx.origin.as_deref().unwrap_or_default());
        let dest_text = normalize_endpoint_query(req.node_ctx.destination.as_deref().unwrap_or_default());
        if origin_text.is_empty() || dest_text.is_empty() {
            return Err(RouteFallthrough::MissingOriginOrDestination);
        }

        if is_airport_keyword(&origin_text) || is_airport_keyword(&dest_text) {
            if let Some(access) = AirportAccess::build(&origin_text, &dest_text, req.locale, req.is_raining, req.now) {
                return Ok(RouteAnswer {
                    text: access.summary.clone(),
                    structured: access.to_structured(),
                });
            }
        }

        let pathfinder = self.pathfinder.as_deref().ok_or(RouteFallthrough::PathfinderUnavailable)?;
        let graph = pathfinder.graph();
        let (origins, origin_kind) = self.expand_endpoint_candidates(graph, &origin_text);
        let (destinations, dest_kind) = self.expand_endpoint_candidates(graph, &dest_text);
        if origins.is_empty() || destinations.is_empty() {
            return Err(RouteFallthrough::EndpointResolutionFailed);
        }

        let deep_ctx = DeepContext::default()
            .with_rain(req.is_raining)
            .with_urgency(TOOL_URGENCY)
            .with_disabled_lines(req.disabled_lines.iter().cloned());

        let mut scored: Vec<ScoredRoute> = Vec::new();
        for o in &origins {
            for d in &destinations {
                let result = match pathfinder.find_path(&o.station_id, &d.station_id, &deep_ctx) {
                    Ok(r) if !r.path.is_empty() => r,
                    Ok(_) => continue,
                    Err(e) => {
                        debug!(from = %o.station_id, to = %d.station_id, error = %e, "Candidate pair skipped");
                        continue;
                    }
                };
                let duration_minutes = result.duration_minutes();
                let transfers = count_transfers(&result.path);
                let walk = o.walk_minutes + d.walk_minutes;
                let complexity = o.complexity_hint + d.complexity_hint;
                let score = duration_minutes as f64 + walk as f64 * 1.2 + transfers as f64 * 6.0 + complexity as f64 * 0.3;
                let steps = result
                    .path
                    .iter()
                    .map(|n| json!({"station": n.name_ja, "line": line_display_name(&n.railway_id)}))
                    .collect();
                scored.push(ScoredRoute {
                    origin: o.clone(),
                    destination: d.clone(),
                    steps,
                    duration_minutes,
                    transfers,
                    score,
                });
            }
        }
        if scored.is_empty() {
            return Err(RouteFallthrough::NoRouteFound);
        }
        scored.sort_by(|a, b| a.score.total_cmp(&b.score));

        let kind = if origin_kind == EndpointKind::Poi || dest_kind == EndpointKind::Poi {
            EndpointKind::Poi
        } else {
            EndpointKind::Station
        };
        let best = &scored[0];
        let alternatives: Vec<Value> = scored[1..]
            .iter()
            .take(MAX_ALTERNATIVES)
            .map(|s| {
                json!({
                    "origin_station": s.origin.station_name,
                    "destination_station": s.destination.station_name,
                    "duration_minutes": s.duration_minutes,
                    "transfers": s.transfers,
                    "score": round2(s.score),
                })
            })
            .collect();

        let route_type = if kind == EndpointKind::Poi { "poi" } else { "route" };
        let structured = json!({
            "type": route_type,
            "data": {
                "query": req.query,
                "recommendation": {
                    "origin_station": best.origin.station_name,
                    "destination_station": best.destination.station_name,
                    "duration_minutes": best.duration_minutes,
                    "transfers": best.transfers,
                    "walk_minutes": best.origin.walk_minutes + best.destination.walk_minutes,
                    "score": round2(best.score),
                    "steps": best.steps,
                },
                "alternatives": alternatives,
                "context": {"weather_rain": req.is_raining},
            }
        });
        let text = build_route_summary(
            req.locale,
            &best.origin.station_name,
            &best.destination.station_name,
            best.duration_minutes,
            best.transfers,
            kind,
        );
        Ok(RouteAnswer { text, structured })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use transit_graph::{Edge, Node};

    fn now() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(9 * 3600)
            .unwrap()
            .with_ymd_and_hms(2026, 3, 2, 12, 0, 0)
            .unwrap()
    }

    fn station(id: &str, ja: &str, en: &str, line: &str) -> Node {
        Node::new(id).with_names(ja, en).with_railway(line)
    }

    fn planner() -> RoutePlanner {
        let mut g = TransitGraph::new();
        g.add_node(station("odpt.Station:TokyoMetro.Ginza.Ueno", "上野", "Ueno", "odpt.Railway:TokyoMetro.Ginza"));
        g.add_node(station("odpt.Station:TokyoMetro.Ginza.Inaricho", "稲荷町", "Inaricho", "odpt.Railway:TokyoMetro.Ginza"));
        g.add_node(station("odpt.Station:TokyoMetro.Ginza.Tawaramachi", "田原町", "Tawaramachi", "odpt.Railway:TokyoMetro.Ginza"));
        g.add_node(station("odpt.Station:TokyoMetro.Ginza.Asakusa", "浅草", "Asakusa", "odpt.Railway:TokyoMetro.Ginza"));
        let line = "odpt.Railway:TokyoMetro.Ginza";
        let ids = ["Ueno", "Inaricho", "Tawaramachi", "Asakusa"];
        for pair in ids.windows(2) {
            let a = format!("odpt.Station:TokyoMetro.Ginza.{}", pair[0]);
            let b = format!("odpt.Station:TokyoMetro.Ginza.{}", pair[1]);
            g.add_edge(Edge::train(a.clone(), b.clone(), line, 120.0));
            g.add_edge(Edge::train(b, a, line, 120.0));
        }
        RoutePlanner::new(Some(Arc::new(Pathfinder::new(Arc::new(g)))), PlaceCatalog::builtin())
    }

    fn ctx(origin: &str, destination: &str) -> ResolvedContext {
        ResolvedContext {
            is_route_query: true,
            origin: Some(origin.to_string()),
            destination: Some(destination.to_string()),
            confidence: 0.95,
            ..Default::default()
        }
    }

    fn request<'a>(node_ctx: &'a ResolvedContext, locale: &'a str) -> RouteRequest<'a> {
        RouteRequest {
            query: "q",
            locale,
            node_ctx,
            is_raining: false,
            disabled_lines: &[],
            now: now(),
        }
    }

    #[test]
    fn test_normalize_endpoint_query() {
        assert_eq!(normalize_endpoint_query("新宿怎麼去？"), "新宿");
        assert_eq!(normalize_endpoint_query("  Ueno, how to get there "), "Ueno");
        assert_eq!(normalize_endpoint_query("上野出發"), "上野");
        assert_eq!(normalize_endpoint_query(""), "");
        assert_eq!(normalize_endpoint_query("Shibuya ROUTE please"), "Shibuya");
    }

    #[test]
    fn test_normalize_endpoint_with_non_ascii_case_folding() {
        assert_eq!(normalize_endpoint_query("İstanbul怎麼去"), "İstanbul");
        assert_eq!(normalize_endpoint_query("İstanbul How To Get there"), "İstanbul");
    }

    #[test]
    fn test_route_cue_uses_word_boundaries() {
        assert!(contains_route_cue("我要去淺草寺"));
        assert!(contains_route_cue("from Ueno please"));
        assert!(!contains_route_cue("Tokyo weather"));
    }

    #[test]
    fn test_parse_route_endpoints() {
        assert_eq!(parse_route_endpoints("我在上野要去淺草寺"), Some(("上野".into(), "淺草寺".into())));
        assert_eq!(parse_route_endpoints("from Ueno to Asakusa"), Some(("Ueno".into(), "Asakusa".into())));
        assert_eq!(parse_route_endpoints("去東京鐵塔，從新宿出發"), Some(("新宿".into(), "東京鐵塔".into())));
        assert_eq!(parse_route_endpoints("天氣如何"), None);
    }

    #[test]
    fn test_coerce_with_landmark_and_primary_station() {
        let planner = planner();
        let node_ctx = ResolvedContext {
            primary_node_id: Some("ueno".into()),
            primary_node_name: Some("上野".into()),
            confidence: 0.8,
            ..Default::default()
        };
        let coerced = planner.coerce_route_query("上野附近，淺草寺怎麼去", &node_ctx).unwrap();
        assert_eq!(coerced.query, "從上野到Senso-ji怎麼去");
        assert!(coerced.node_ctx.is_route_query);
        assert_eq!(coerced.node_ctx.confidence, 0.9);

        assert!(planner.coerce_route_query("from Ueno to ueno", &ResolvedContext::default()).is_none());
        assert!(planner.coerce_route_query("淺草寺", &node_ctx).is_none());
    }

    #[test]
    fn test_station_resolution() {
        let planner = planner();
        let graph = planner.graph().unwrap();
        assert_eq!(
            resolve_station_id(graph, "浅草").as_deref(),
            Some("odpt.Station:TokyoMetro.Ginza.Asakusa")
        );
        assert!(resolve_station_id(graph, "Kyoto").is_none());
        assert!(resolve_station_id(graph, "").is_none());
        let fuzzy = resolve_fuzzy_stations(graph, "ginza", 3);
        assert_eq!(fuzzy.len(), 3);
        assert_eq!(fuzzy[1].walk_minutes, 6);
        assert_eq!(fuzzy[2].complexity_hint, 4);
    }

    #[test]
    fn test_plan_station_route() {
        let planner = planner();
        let node_ctx = ctx("上野", "浅草");
        let answer = planner.plan(&request(&node_ctx, "zh-TW")).unwrap();
        assert_eq!(answer.text, "推薦路線：上野 到 浅草 約 6 分鐘，轉乘 0 次。");
        assert_eq!(answer.structured["type"], "route");
        let rec = &answer.structured["data"]["recommendation"];
        assert_eq!(rec["steps"].as_array().unwrap().len(), 4);
        assert_eq!(rec["steps"][0]["line"], "銀座線");
    }

    #[test]
    fn test_plan_landmark_route_is_poi() {
        let planner = planner();
        let node_ctx = ctx("上野", "淺草寺");
        let answer = planner.plan(&request(&node_ctx, "en")).unwrap();
        assert_eq!(answer.structured["type"], "poi");
        let rec = &answer.structured["data"]["recommendation"];
        assert_eq!(rec["destination_station"], "浅草");
        assert_eq!(answer.structured["data"]["alternatives"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_plan_airport_skips_graph() {
        let planner = RoutePlanner::default();
        let node_ctx = ctx("成田空港", "新宿");
        let answer = planner.plan(&request(&node_ctx, "zh-TW")).unwrap();
        assert_eq!(answer.structured["type"], "airport_access");
        assert!(answer.text.starts_with("機場建議：Narita Airport"));
    }

    #[test]
    fn test_plan_fallthrough_reasons() {
        let planner = RoutePlanner::default();
        assert_eq!(
            planner.plan(&request(&ctx("上野", ""), "en")),
            Err(RouteFallthrough::MissingOriginOrDestination)
        );
        assert_eq!(
            planner.plan(&request(&ctx("上野", "浅草"), "en")),
            Err(RouteFallthrough::PathfinderUnavailable)
        );
        let planner = self::planner();
        assert_eq!(
            planner.plan(&request(&ctx("Kyoto", "浅草"), "en")),
            Err(RouteFallthrough::EndpointResolutionFailed)
        );
        let disabled = vec!["odpt.Railway:TokyoMetro.Ginza".to_string()];
        let node_ctx = ctx("上野", "浅草");
        let mut req = request(&node_ctx, "en");
        req.disabled_lines = &disabled;
        assert_eq!(planner.plan(&req), Err(RouteFallthrough::NoRouteFound));
    }
}
