use crate::feedback::FeedbackModel;
use crate::text::rune_len;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub const MAX_INTENT_TAGS: usize = 4;
pub const SHORT_QUERY_RUNES: usize = 12;

/// Cheapest tier allowed to answer a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentRoute {
    TemplateOnly,
    AlgoTool,
    SlmOnly,
    LlmRequired,
}

impl IntentRoute {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentRoute::TemplateOnly => "TEMPLATE_ONLY",
            IntentRoute::AlgoTool => "ALGO_TOOL",
            IntentRoute::SlmOnly => "SLM_ONLY",
            IntentRoute::LlmRequired => "LLM_REQUIRED",
        }
    }
}

impl fmt::Display for IntentRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentTag {
    Route,
    Status,
    TimeSensitive,
    RouteExplain,
    Fare,
    Accessibility,
    LocalGuide,
}

impl IntentTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentTag::Route => "route",
            IntentTag::Status => "status",
            IntentTag::TimeSensitive => "time_sensitive",
            IntentTag::RouteExplain => "route_explain",
            IntentTag::Fare => "fare",
            IntentTag::Accessibility => "accessibility",
            IntentTag::LocalGuide => "local_guide",
        }
    }
}

impl fmt::Display for IntentTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keyword rules, checked in this order against the lowercased query.
const TAG_KEYWORDS: &[(IntentTag, &[&str])] = &[
    (
        IntentTag::Route,
        &[
            "route", "路線", "路线", "轉乘", "換乘", "直達", "直达", "行き方", "how to get",
            "怎麼去", "怎么去", "怎麼走",
        ],
    ),
    (
        IntentTag::Status,
        &[
            "運行", "遅延", "遅れ", "運休", "見合わせ", "delay", "status", "suspended", "誤點",
            "延誤", "延遲", "停駛", "運行狀況",
        ],
    ),
    (
        IntentTag::TimeSensitive,
        &[
            "現在", "幾點", "today", "deadline", "來得及", "来得及", "起飛", "flight", "班次",
            "時刻", "timetable", "趕", "赶",
        ],
    ),
    (
        IntentTag::RouteExplain,
        &["為何", "为什么", "why", "不推薦", "不推荐", "compare", "比較", "比较"],
    ),
    (
        IntentTag::Fare,
        &[
            "fare", "票價", "票价", "費用", "多少钱", "how much", "ic card", "suica", "pasmo",
        ],
    ),
    (
        IntentTag::Accessibility,
        &[
            "電梯", "电梯", "elevator", "wheelchair", "無障礙", "无障碍", "accessible",
        ],
    ),
    (
        IntentTag::LocalGuide,
        &["推薦", "推荐", "nearby", "附近", "景點", "景点", "吃", "餐廳", "restaurant"],
    ),
];

static ROUTE_PHRASES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)(從|から|from)\s*.+\s*(到|へ|まで|to)\s*.+",
        r"(?i)\bfrom\b.+\bto\b",
        r"(?i)\bto\b.+\bfrom\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("route phrase pattern"))
    .collect()
});

/// Keywords that make a query an FAQ candidate for the template tier.
const FAQ_KEYWORDS: &[&str] = &[
    "廁所", "洗手間", "厕所", "トイレ", "toilet", "restroom", "置物櫃", "寄物櫃", "コインロッカー",
    "locker", "wifi", "wi-fi", "末班車", "末班车", "終電", "last train", "首班車", "首班车",
    "始発", "first train", "車票", "售票", "切符", "ticket", "ic card", "suica", "pasmo",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentAnalysis {
    pub route: IntentRoute,
    pub tags: Vec<IntentTag>,
}

impl IntentAnalysis {
    pub fn has_tag(&self, tag: IntentTag) -> bool {
        self.tags.contains(&tag)
    }

    pub fn tag_names(&self) -> Vec<String> {
        self.tags.iter().map(|t| t.as_str().to_string()).collect()
    }
}

/// Which tools the algorithmic and LLM tiers should reach for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolPlan {
    pub route_tool: bool,
    pub status_tool: bool,
    pub time_tool: bool,
    pub require_route_explain: bool,
    pub intent_tags: Vec<String>,
}

pub fn has_route_phrase(query: &str) -> bool {
    !query.is_empty() && ROUTE_PHRASES.iter().any(|p| p.is_match(query))
}

pub fn is_faq_hit(query: &str) -> bool {
    let q = query.trim().to_lowercase();
    !q.is_empty() && FAQ_KEYWORDS.iter().any(|kw| q.contains(kw))
}

/// Status keywords alone, regardless of the other tags present.
pub fn is_status_query(query: &str) -> bool {
    let q = query.trim().to_lowercase();
    TAG_KEYWORDS
        .iter()
        .filter(|(tag, _)| *tag == IntentTag::Status)
        .any(|(_, keywords)| keywords.iter().any(|kw| q.contains(kw)))
}

/// Discrete confidence of the keyword rules for this query.
pub fn estimate_rule_confidence(query: &str, analysis: &IntentAnalysis) -> f64 {
    match analysis.tags.len() {
        0 if rune_len(query.trim()) <= SHORT_QUERY_RUNES => 0.8,
        0 => 0.55,
        1 => 0.9,
        2 => 0.8,
        _ => 0.7,
    }
}

pub fn build_tool_plan(resolver_route: bool, analysis: &IntentAnalysis) -> ToolPlan {
    let mut intent_tags = analysis.tag_names();
    if resolver_route && !analysis.has_tag(IntentTag::Route) {
        intent_tags.push(IntentTag::Route.as_str().to_string());
    }
    ToolPlan {
        route_tool: resolver_route || analysis.has_tag(IntentTag::Route),
        status_tool: analysis.has_tag(IntentTag::Status),
        time_tool: analysis.has_tag(IntentTag::TimeSensitive),
        require_route_explain: analysis.has_tag(IntentTag::RouteExplain) || resolver_route,
        intent_tags,
    }
}

/// Keyword tagger whose tag order is re-ranked by a shared [`FeedbackModel`].
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    feedback: Arc<FeedbackModel>,
}

impl IntentClassifier {
    pub fn new(feedback: Arc<FeedbackModel>) -> Self {
        Self { feedback }
    }

    pub fn feedback(&self) -> &Arc<FeedbackModel> {
        &self.feedback
    }

    pub fn analyze(&self, query: &str) -> IntentAnalysis {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return IntentAnalysis {
                route: IntentRoute::TemplateOnly,
                tags: Vec::new(),
            };
        }

        let tags = self.classify_tags(&q);
        let has = |tag: IntentTag| tags.contains(&tag);

        let route = if has(IntentTag::Status) || has(IntentTag::TimeSensitive) {
            IntentRoute::AlgoTool
        } else if (has(IntentTag::LocalGuide) || has(IntentTag::Fare)) && !has(IntentTag::Route) {
            IntentRoute::LlmRequired
        } else if has(IntentTag::Route) {
            IntentRoute::SlmOnly
        } else if tags.is_empty() && rune_len(&q) <= SHORT_QUERY_RUNES {
            IntentRoute::TemplateOnly
        } else {
            IntentRoute::LlmRequired
        };

        IntentAnalysis { route, tags }
    }

    fn classify_tags(&self, q: &str) -> Vec<IntentTag> {
        let mut tags: Vec<IntentTag> = TAG_KEYWORDS
            .iter()
            .filter(|(_, keywords)| keywords.iter().any(|kw| q.contains(kw)))
            .map(|(tag, _)| *tag)
            .collect();

        if has_route_phrase(q) && !tags.contains(&IntentTag::Route) {
            tags.insert(0, IntentTag::Route);
        }

        if tags.len() > 1 {
            let scores: Vec<(IntentTag, f64)> = tags
                .iter()
                .map(|t| (*t, self.feedback.score(t.as_str())))
                .collect();
            let mut ranked = scores;
            // stable: equal weights keep rule order
            ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
            tags = ranked.into_iter().map(|(t, _)| t).collect();
        }
        tags.truncate(MAX_INTENT_TAGS);
        tags
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new(Arc::new(FeedbackModel::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_selection_table() {
        let classifier = IntentClassifier::default();
        let cases = [
            ("", IntentRoute::TemplateOnly),
            ("你好", IntentRoute::TemplateOnly),
            ("銀座線 delay?", IntentRoute::AlgoTool),
            ("末班車幾點", IntentRoute::AlgoTool),
            ("新宿附近推薦餐廳", IntentRoute::LlmRequired),
            ("how much is the fare to Ueno", IntentRoute::LlmRequired),
            ("from Ueno to Ginza", IntentRoute::SlmOnly),
            ("成田機場到新宿怎麼去", IntentRoute::SlmOnly),
            ("route and fare to Odaiba", IntentRoute::SlmOnly),
            ("tell me something interesting about this city", IntentRoute::LlmRequired),
        ];
        for (q, expected) in cases {
            assert_eq!(classifier.analyze(q).route, expected, "Failed for query: {}", q);
        }
    }

    #[test]
    fn test_route_phrase_prepends_route_tag() {
        let analysis = IntentClassifier::default().analyze("from Ueno to Ginza, is there an elevator");
        assert_eq!(analysis.tags[0], IntentTag::Route);
        assert!(analysis.has_tag(IntentTag::Accessibility));
    }

    #[test]
    fn test_feedback_reranks_tags() {
        let classifier = IntentClassifier::default();
        let query = "附近 delay";
        let before = classifier.analyze(query).tags;
        assert_eq!(before, vec![IntentTag::Status, IntentTag::LocalGuide]);

        classifier.feedback().update(&["local_guide"], true);
        classifier.feedback().update(&["local_guide"], true);
        classifier.feedback().update(&["status"], false);

        let after = classifier.analyze(query).tags;
        assert_eq!(after, vec![IntentTag::LocalGuide, IntentTag::Status]);
    }

    #[test]
    fn test_tags_capped_at_four() {
        let analysis = IntentClassifier::default()
            .analyze("route delay today why fare elevator restaurant");
        assert_eq!(analysis.tags.len(), MAX_INTENT_TAGS);
        let mut unique = analysis.tags.clone();
        unique.dedup();
        assert_eq!(unique.len(), MAX_INTENT_TAGS);
    }

    #[test]
    fn test_tool_plan_adds_route_from_resolver() {
        let classifier = IntentClassifier::default();
        let analysis = classifier.analyze("what time is the first train today");
        let plan = build_tool_plan(true, &analysis);
        assert!(plan.route_tool);
        assert!(plan.time_tool);
        assert!(plan.require_route_explain);
        assert_eq!(plan.intent_tags.last().map(String::as_str), Some("route"));

        let plan = build_tool_plan(false, &classifier.analyze("why not the Ginza line"));
        assert!(!plan.route_tool);
        assert!(plan.require_route_explain);
    }

    #[test]
    fn test_rule_confidence() {
        let classifier = IntentClassifier::default();
        let cases = [
            ("hi", 0.8),
            ("tell me something interesting about this city", 0.55),
            ("銀座線 delay", 0.9),
            ("附近 delay", 0.8),
            ("route delay today", 0.7),
        ];
        for (q, expected) in cases {
            let analysis = classifier.analyze(q);
            assert_eq!(estimate_rule_confidence(q, &analysis), expected, "Failed for query: {}", q);
        }
    }

    #[test]
    fn test_faq_hit() {
        assert!(is_faq_hit("上野駅のトイレはどこ"));
        assert!(is_faq_hit("Where is the Locker?"));
        assert!(is_faq_hit("末班車是幾點"));
        assert!(!is_faq_hit("from Ueno to Ginza"));
        assert!(!is_faq_hit("   "));
    }
}
