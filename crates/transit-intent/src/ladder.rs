use crate::text::{contains_any_term, contains_term};
use serde::{Deserialize, Serialize};

/// Below this rule confidence the cheap tiers are not trusted.
pub const DEEP_INTENT_CONFIDENCE: f64 = 0.75;

const ROUTE_TOKENS: &[&str] = &[
    "去", "到", "怎麼去", "怎么去", "how to get", "from", "to", "前往", "移動", "搭車", "route",
];

const CONSTRAINT_TOKENS: &[&str] = &[
    "行李", "大行李", "電梯", "无障碍", "無障礙", "wheelchair", "elevator", "趕時間", "赶时间",
    "luggage", "stroller", "ベビーカー", "エレベーター", "車椅子",
];

/// Referential words that only make sense with prior turns.
const FOLLOW_UP_TOKENS: &[&str] = &["那裡", "那边", "那裏", "它", "這個", "这个", "そこ", "それ", "there", "it", "that"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentComplexity {
    Simple,
    /// Route request combined with an accessibility or time constraint
    Compound,
    /// Follow-up that refers back to earlier context
    Ambiguous,
}

impl IntentComplexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentComplexity::Simple => "simple",
            IntentComplexity::Compound => "compound",
            IntentComplexity::Ambiguous => "ambiguous",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentLadderDecision {
    pub complexity: IntentComplexity,
    pub rule_confidence: f64,
    /// Forces the LLM tier regardless of the classified route
    pub require_deep_intent: bool,
    pub reason: &'static str,
}

pub fn classify_complexity(query: &str, has_context: bool) -> IntentComplexity {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return IntentComplexity::Simple;
    }
    if contains_any_term(&q, ROUTE_TOKENS) && contains_any_term(&q, CONSTRAINT_TOKENS) {
        return IntentComplexity::Compound;
    }
    if has_context && FOLLOW_UP_TOKENS.iter().any(|t| contains_term(&q, t)) {
        return IntentComplexity::Ambiguous;
    }
    IntentComplexity::Simple
}

pub fn decide_intent_ladder(query: &str, rule_confidence: f64, has_context: bool) -> IntentLadderDecision {
    let complexity = classify_complexity(query, has_context);
    let (require_deep_intent, reason) = match complexity {
        IntentComplexity::Compound => (true, "compound_intent"),
        IntentComplexity::Ambiguous => (true, "ambiguous_follow_up"),
        IntentComplexity::Simple if rule_confidence < DEEP_INTENT_CONFIDENCE => {
            (true, "low_rule_confidence")
        }
        IntentComplexity::Simple => (false, "rule_confident"),
    };
    IntentLadderDecision {
        complexity,
        rule_confidence,
        require_deep_intent,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compound_route_with_constraint() {
        let cases = [
            "go to Shinjuku with a wheelchair",
            "從上野去淺草，有大行李",
            "到羽田要搭電梯嗎",
        ];
        for q in cases {
            assert_eq!(classify_complexity(q, false), IntentComplexity::Compound, "Failed for query: {}", q);
        }
    }

    #[test]
    fn test_constraint_without_route_is_simple() {
        assert_eq!(classify_complexity("Is there an elevator at Ueno?", false), IntentComplexity::Simple);
        assert_eq!(classify_complexity("Tokyo tower elevator", false), IntentComplexity::Simple);
    }

    #[test]
    fn test_ambiguous_needs_context() {
        assert_eq!(classify_complexity("how long does it take", true), IntentComplexity::Ambiguous);
        assert_eq!(classify_complexity("how long does it take", false), IntentComplexity::Simple);
        assert_eq!(classify_complexity("そこは混んでる？", true), IntentComplexity::Ambiguous);
    }

    #[test]
    fn test_ladder_decisions() {
        let d = decide_intent_ladder("銀座線 delay", 0.9, false);
        assert!(!d.require_deep_intent);
        assert_eq!(d.reason, "rule_confident");

        let d = decide_intent_ladder("tell me something interesting about this city", 0.55, false);
        assert!(d.require_deep_intent);
        assert_eq!(d.reason, "low_rule_confidence");

        let d = decide_intent_ladder("go to Ueno with a stroller", 0.9, false);
        assert!(d.require_deep_intent);
        assert_eq!(d.complexity, IntentComplexity::Compound);

        let d = decide_intent_ladder("0.75 exactly", DEEP_INTENT_CONFIDENCE, false);
        assert!(!d.require_deep_intent);
    }
}
