use serde_json::Value;
use std::collections::HashSet;
use transit_core::SearchResult;
use transit_graph::{expand_k_hops, TransitGraph};
use transit_intent::ResolvedContext;

pub const DEFAULT_SUMMARY_MAX_CHARS: usize = 1400;
const SNIPPET_MAX_CHARS: usize = 180;
/// Room kept for the similarity suffix and newline.
const LINE_OVERHEAD_CHARS: usize = 16;

/// Cuts `s` to `max` characters, adding `...` when something was dropped.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max).collect();
    out.push_str("...");
    out
}

/// Primary node first, then the expanded IDs, without blanks or repeats.
pub fn normalize_node_ids(primary: Option<&str>, expanded: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    primary
        .into_iter()
        .chain(expanded.iter().map(String::as_str))
        .filter(|id| !id.is_empty() && seen.insert(id.to_string()))
        .map(str::to_string)
        .collect()
}

/// Seeds retrieval with the resolved nodes plus their k-hop neighbourhood.
pub fn expand_graph_node_ids(
    node_ctx: &ResolvedContext,
    graph: Option<&TransitGraph>,
    hops: usize,
    max_nodes: usize,
) -> Vec<String> {
    let seeds = node_ctx.node_ids();
    if seeds.is_empty() {
        return Vec::new();
    }
    match graph {
        Some(g) if hops > 0 => expand_k_hops(g, &seeds, hops, max_nodes),
        _ => seeds.into_iter().take(max_nodes).collect(),
    }
}

fn metadata_str<'a>(r: &'a SearchResult, key: &str) -> Option<&'a str> {
    r.metadata.get(key).and_then(Value::as_str)
}

fn metadata_tags(r: &SearchResult) -> Vec<&str> {
    match r.metadata.get("tags") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// Keeps results tied to one of `node_ids`; results without a node are global knowledge and kept.
pub fn filter_by_nodes(results: Vec<SearchResult>, node_ids: &[String]) -> Vec<SearchResult> {
    if node_ids.is_empty() {
        return results;
    }
    let allowed: HashSet<&str> = node_ids.iter().map(String::as_str).collect();
    results
        .into_iter()
        .filter(|r| match metadata_str(r, "node_id") {
            Some(id) if !id.is_empty() => allowed.contains(id),
            _ => true,
        })
        .collect()
}

/// Keeps results sharing a tag with `tags`; untagged results are kept.
pub fn filter_by_tags(results: Vec<SearchResult>, tags: &[String]) -> Vec<SearchResult> {
    let allowed: HashSet<&str> = tags.iter().map(String::as_str).filter(|t| !t.is_empty()).collect();
    if allowed.is_empty() {
        return results;
    }
    results
        .into_iter()
        .filter(|r| {
            let doc_tags = metadata_tags(r);
            doc_tags.is_empty() || doc_tags.iter().any(|t| allowed.contains(t))
        })
        .collect()
}

/// `[i] title: snippet (similarity)` lines within `max_chars` characters in total.
pub fn summarize_rag_results(results: &[SearchResult], max_chars: usize) -> String {
    let max_chars = if max_chars == 0 { DEFAULT_SUMMARY_MAX_CHARS } else { max_chars };
    let mut out = String::new();
    let mut used = 0usize;

    for (i, r) in results.iter().enumerate() {
        if used >= max_chars {
            break;
        }
        let mut prefix = format!("[{}] ", i + 1);
        if let Some(title) = metadata_str(r, "title").filter(|t| !t.is_empty()) {
            prefix.push_str(title);
            prefix.push_str(": ");
        }
        let prefix_len = prefix.chars().count();
        let Some(remain) = max_chars.checked_sub(used + prefix_len + LINE_OVERHEAD_CHARS) else {
            break;
        };
        if remain == 0 {
            break;
        }
        let snippet = truncate_chars(r.content.trim(), SNIPPET_MAX_CHARS.min(remain));
        let line = format!("{}{} ({:.2})\n", prefix, snippet, r.similarity);
        let line_len = line.chars().count();
        if used + line_len > max_chars {
            break;
        }
        out.push_str(&line);
        used += line_len;
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use transit_graph::{Edge, Node};

    fn doc(content: &str, similarity: f64, meta: Value) -> SearchResult {
        let metadata: HashMap<String, Value> = match meta {
            Value::Object(map) => map.into_iter().collect(),
            _ => HashMap::new(),
        };
        SearchResult {
            id: String::new(),
            content: content.to_string(),
            similarity,
            metadata,
        }
    }

    #[test]
    fn test_summary_format_and_budget() {
        let results = vec![
            doc("Ueno has a large park.", 0.91, json!({"title": "Ueno"})),
            doc(&"x".repeat(400), 0.8, json!({})),
        ];
        let summary = summarize_rag_results(&results, 0);
        let lines: Vec<&str> = summary.lines().collect();
        assert_eq!(lines[0], "[1] Ueno: Ueno has a large park. (0.91)");
        assert!(lines[1].starts_with("[2] xxx"));
        assert!(lines[1].ends_with("... (0.80)"));

        let tight = summarize_rag_results(&results, 60);
        assert!(tight.chars().count() <= 60);
        assert_eq!(tight.lines().count(), 1);
    }

    #[test]
    fn test_node_and_tag_filters_keep_global_docs() {
        let results = vec![
            doc("ueno", 0.9, json!({"node_id": "ueno", "tags": ["route"]})),
            doc("ginza", 0.9, json!({"node_id": "ginza"})),
            doc("global", 0.9, json!({})),
            doc("fare doc", 0.9, json!({"tags": ["fare"]})),
        ];
        let by_node = filter_by_nodes(results, &["ueno".to_string()]);
        let contents: Vec<&str> = by_node.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, vec!["ueno", "global", "fare doc"]);

        let by_tag = filter_by_tags(by_node, &["route".to_string()]);
        let contents: Vec<&str> = by_tag.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, vec!["ueno", "global"]);
    }

    #[test]
    fn test_normalize_node_ids() {
        let ids = normalize_node_ids(
            Some("ueno"),
            &["ueno".to_string(), "".to_string(), "okachimachi".to_string()],
        );
        assert_eq!(ids, vec!["ueno", "okachimachi"]);
        assert!(normalize_node_ids(None, &[]).is_empty());
    }

    #[test]
    fn test_expand_graph_node_ids() {
        let mut g = TransitGraph::new();
        for id in ["ueno", "okachimachi", "akihabara"] {
            g.add_node(Node::new(id));
        }
        g.add_edge(Edge::train("ueno", "okachimachi", "yamanote", 120.0));
        g.add_edge(Edge::train("okachimachi", "akihabara", "yamanote", 120.0));
        let ctx = ResolvedContext {
            primary_node_id: Some("ueno".to_string()),
            ..Default::default()
        };
        assert_eq!(expand_graph_node_ids(&ctx, Some(&g), 1, 12), vec!["ueno", "okachimachi"]);
        assert_eq!(expand_graph_node_ids(&ctx, None, 1, 12), vec!["ueno"]);
        assert!(expand_graph_node_ids(&ResolvedContext::default(), Some(&g), 1, 12).is_empty());
    }
}
