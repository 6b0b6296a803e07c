use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Confidence when only gazetteer hits are found.
pub const CONFIDENCE_STATION: f64 = 0.8;
/// Confidence when a route phrase matched.
pub const CONFIDENCE_ROUTE: f64 = 0.9;
/// Confidence when a route phrase matched and two or more stations were named.
pub const CONFIDENCE_ROUTE_WITH_STATIONS: f64 = 0.95;

/// Known station with its display name and spelling variants.
struct GazetteerEntry {
    id: &'static str,
    name: &'static str,
    pattern: Regex,
}

const STATIONS: &[(&str, &str, &[&str])] = &[
    ("tokyo", "東京", &["tokyo", "東京駅", "tokyo station"]),
    ("shinjuku", "新宿", &["shinjuku", "新宿駅", "shinjuku station"]),
    ("shibuya", "渋谷", &["shibuya", "渋谷駅", "shibuya station"]),
    ("ikebukuro", "池袋", &["ikebukuro", "池袋駅", "ikebukuro station"]),
    ("ueno", "上野", &["ueno", "上野駅", "ueno station"]),
    ("akihabara", "秋葉原", &["akihabara", "秋葉原駅", "akiba"]),
    ("shinagawa", "品川", &["shinagawa", "品川駅", "shinagawa station"]),
    ("yokohama", "横浜", &["yokohama", "横浜駅", "yokohama station"]),
    ("roppongi", "六本木", &["roppongi", "六本木駅", "roppongi station"]),
    ("ginza", "銀座", &["ginza", "銀座駅", "ginza station"]),
    ("asakusa", "浅草", &["asakusa", "浅草駅", "asakusa station"]),
    ("odaiba", "お台場", &["odaiba", "台場", "daiba"]),
    ("narita", "成田空港", &["narita", "成田", "nrt", "成田機場"]),
    ("haneda", "羽田空港", &["haneda", "羽田", "hnd", "羽田機場"]),
];

static GAZETTEER: Lazy<Vec<GazetteerEntry>> = Lazy::new(|| {
    STATIONS
        .iter()
        .map(|&(id, name, aliases)| {
            let alternatives: Vec<String> = std::iter::once(name)
                .chain(aliases.iter().copied())
                .map(regex::escape)
                .collect();
            let pattern = Regex::new(&format!("(?i)({})", alternatives.join("|")))
                .expect("gazetteer pattern");
            GazetteerEntry { id, name, pattern }
        })
        .collect()
});

/// Route phrase with the capture groups holding origin and destination.
struct RoutePattern {
    regex: Regex,
    origin_group: Option<usize>,
    destination_group: usize,
}

static ROUTE_PATTERNS: Lazy<Vec<RoutePattern>> = Lazy::new(|| {
    vec![
        RoutePattern {
            regex: Regex::new(r"(?i)(從|から|from)\s*(.+?)\s*(到|へ|まで|to)\s*(.+)")
                .expect("route pattern"),
            origin_group: Some(2),
            destination_group: 4,
        },
        RoutePattern {
            regex: Regex::new(r"(?i)(.+?)\s*(到|へ|to)\s*(.+?)\s*(怎麼去|行き方|how to get)")
                .expect("route pattern"),
            origin_group: Some(1),
            destination_group: 3,
        },
        RoutePattern {
            regex: Regex::new(r"(?i)(怎麼|どうやって|how)\s*(去|行く|get to)\s*(.+)")
                .expect("route pattern"),
            origin_group: None,
            destination_group: 3,
        },
    ]
});

/// Station slots and route endpoints pulled out of a single query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedContext {
    pub primary_node_id: Option<String>,
    pub primary_node_name: Option<String>,
    pub secondary_nodes: Vec<String>,
    pub is_route_query: bool,
    pub origin: Option<String>,
    pub destination: Option<String>,
    /// One of 0, 0.8, 0.9 or 0.95
    pub confidence: f64,
}

impl ResolvedContext {
    pub fn has_endpoints(&self) -> bool {
        let filled = |v: &Option<String>| v.as_deref().map_or(false, |s| !s.trim().is_empty());
        filled(&self.origin) && filled(&self.destination)
    }

    /// Primary node followed by secondary nodes.
    pub fn node_ids(&self) -> Vec<String> {
        self.primary_node_id
            .iter()
            .chain(self.secondary_nodes.iter())
            .cloned()
            .collect()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NodeResolver;

impl NodeResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(&self, query: &str) -> ResolvedContext {
        let query = query.trim();
        let mut result = ResolvedContext::default();
        if query.is_empty() {
            return result;
        }

        for pattern in ROUTE_PATTERNS.iter() {
            if let Some(caps) = pattern.regex.captures(query) {
                result.is_route_query = true;
                result.origin = pattern
                    .origin_group
                    .and_then(|g| caps.get(g))
                    .map(|m| m.as_str().trim().to_string());
                result.destination = caps
                    .get(pattern.destination_group)
                    .map(|m| m.as_str().trim().to_string());
                result.confidence = CONFIDENCE_ROUTE;
                break;
            }
        }

        let mut hits: Vec<(usize, &GazetteerEntry)> = GAZETTEER
            .iter()
            .filter_map(|entry| entry.pattern.find(query).map(|m| (m.start(), entry)))
            .collect();
        hits.sort_by_key(|(pos, _)| *pos);

        if let Some((_, first)) = hits.first() {
            result.primary_node_id = Some(first.id.to_string());
            result.primary_node_name = Some(first.name.to_string());
            result.secondary_nodes = hits[1..].iter().map(|(_, e)| e.id.to_string()).collect();
            result.confidence = CONFIDENCE_STATION;

            if result.is_route_query && hits.len() >= 2 {
                if let Some((_, last)) = hits.last() {
                    result.origin = Some(first.name.to_string());
                    result.destination = Some(last.name.to_string());
                }
                result.confidence = CONFIDENCE_ROUTE_WITH_STATIONS;
            }
        }

        debug!(
            route = result.is_route_query,
            primary = ?result.primary_node_id,
            confidence = result.confidence,
            "Resolved node context"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LADDER: [f64; 4] = [0.0, 0.8, 0.9, 0.95];

    #[test]
    fn test_airport_route_query() {
        let ctx = NodeResolver::new().resolve("成田機場到新宿怎麼去");
        assert!(ctx.is_route_query);
        assert_eq!(ctx.primary_node_id.as_deref(), Some("narita"));
        assert_eq!(ctx.secondary_nodes, vec!["shinjuku".to_string()]);
        assert_eq!(ctx.origin.as_deref(), Some("成田空港"));
        assert_eq!(ctx.destination.as_deref(), Some("新宿"));
        assert_eq!(ctx.confidence, 0.95);
    }

    #[test]
    fn test_route_phrase_without_known_stations() {
        let ctx = NodeResolver::new().resolve("from Kichijoji to Mitaka");
        assert!(ctx.is_route_query);
        assert_eq!(ctx.origin.as_deref(), Some("Kichijoji"));
        assert_eq!(ctx.destination.as_deref(), Some("Mitaka"));
        assert_eq!(ctx.confidence, 0.9);
        assert!(ctx.primary_node_id.is_none());
    }

    #[test]
    fn test_x_to_y_how_uses_place_groups() {
        let ctx = NodeResolver::new().resolve("吉祥寺到三鷹怎麼去");
        assert_eq!(ctx.origin.as_deref(), Some("吉祥寺"));
        assert_eq!(ctx.destination.as_deref(), Some("三鷹"));
    }

    #[test]
    fn test_how_to_get_destination_only() {
        let ctx = NodeResolver::new().resolve("how get to Mitaka");
        assert!(ctx.is_route_query);
        assert!(ctx.origin.is_none());
        assert_eq!(ctx.destination.as_deref(), Some("Mitaka"));
        assert!(!ctx.has_endpoints());
    }

    #[test]
    fn test_station_mention_without_route() {
        let ctx = NodeResolver::new().resolve("Is there a locker at Ueno?");
        assert!(!ctx.is_route_query);
        assert_eq!(ctx.primary_node_id.as_deref(), Some("ueno"));
        assert_eq!(ctx.confidence, 0.8);
    }

    #[test]
    fn test_hits_sorted_by_position() {
        let ctx = NodeResolver::new().resolve("from Shibuya to Asakusa via Ginza");
        assert_eq!(ctx.primary_node_id.as_deref(), Some("shibuya"));
        assert_eq!(ctx.secondary_nodes, vec!["asakusa".to_string(), "ginza".to_string()]);
        assert_eq!(ctx.origin.as_deref(), Some("渋谷"));
        assert_eq!(ctx.destination.as_deref(), Some("銀座"));
    }

    #[test]
    fn test_confidence_is_discrete() {
        let resolver = NodeResolver::new();
        let queries = [
            "",
            "   ",
            "hello",
            "新宿",
            "from a to b",
            "從上野到秋葉原",
            "羽田 to 横浜 how to get",
            "どうやって行く お台場",
        ];
        for q in queries {
            let c = resolver.resolve(q).confidence;
            assert!(LADDER.contains(&c), "Failed for query: {} (confidence {})", q, c);
        }
    }

    #[test]
    fn test_empty_query() {
        let ctx = NodeResolver::new().resolve("  ");
        assert_eq!(ctx, ResolvedContext::default());
    }
}
