use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::{info, warn};
use transit_core::{Result, TransitError};

const DEFAULT_COMPLEXITY_HINT: u32 = 2;

/// A station near a point of interest, with the walk from its exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceCandidate {
    pub station_name: String,
    pub walk_minutes: u32,
    pub complexity_hint: u32,
}

/// A landmark users name instead of a station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceSpec {
    pub id: String,
    pub name: String,
    pub aliases: Vec<String>,
    pub candidates: Vec<PlaceCandidate>,
}

impl PlaceSpec {
    fn matches(&self, term_lower: &str) -> bool {
        self.aliases
            .iter()
            .any(|a| !a.is_empty() && term_lower.contains(&a.to_lowercase()))
    }
}

#[derive(Debug, Deserialize)]
struct RawComplexity {
    #[serde(default, rename = "turnCount")]
    turn_count: u32,
    #[serde(default, rename = "exitCount")]
    exit_count: u32,
}

#[derive(Debug, Deserialize)]
struct RawCandidate {
    #[serde(rename = "stationName")]
    station_name: String,
    #[serde(default, rename = "walkMinutes")]
    walk_minutes: u32,
    #[serde(default)]
    complexity: Option<RawComplexity>,
}

#[derive(Debug, Deserialize)]
struct RawPlace {
    id: String,
    #[serde(default)]
    name: BTreeMap<String, String>,
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default, rename = "candidateStations")]
    candidates: Vec<RawCandidate>,
}

fn dedupe_aliases(aliases: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    aliases
        .into_iter()
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty() && seen.insert(a.to_lowercase()))
        .collect()
}

impl From<RawPlace> for PlaceSpec {
    fn from(raw: RawPlace) -> Self {
        let non_blank = |k: &str| raw.name.get(k).filter(|v| !v.trim().is_empty()).cloned();
        let name = non_blank("en")
            .or_else(|| non_blank("zh-TW"))
            .or_else(|| non_blank("ja"))
            .unwrap_or_else(|| raw.id.clone());
        let aliases = dedupe_aliases(raw.aliases.iter().cloned().chain(raw.name.values().cloned()));
        let candidates = raw
            .candidates
            .into_iter()
            .map(|c| {
                let hint = c
                    .complexity
                    .map(|x| x.turn_count + x.exit_count / 4)
                    .filter(|h| *h > 0)
                    .unwrap_or(DEFAULT_COMPLEXITY_HINT);
                PlaceCandidate {
                    station_name: c.station_name,
                    walk_minutes: c.walk_minutes.max(1),
                    complexity_hint: hint,
                }
            })
            .collect();
        PlaceSpec {
            id: raw.id,
            name,
            aliases,
            candidates,
        }
    }
}

fn builtin(id: &str, name: &str, aliases: &[&str], candidates: &[(&str, u32, u32)]) -> PlaceSpec {
    PlaceSpec {
        id: id.to_string(),
        name: name.to_string(),
        aliases: aliases.iter().map(|a| a.to_string()).collect(),
        candidates: candidates
            .iter()
            .map(|&(station, walk, hint)| PlaceCandidate {
                station_name: station.to_string(),
                walk_minutes: walk,
                complexity_hint: hint,
            })
            .collect(),
    }
}

/// Known points of interest, matched by alias containment.
#[derive(Debug, Clone, Default)]
pub struct PlaceCatalog {
    specs: Vec<PlaceSpec>,
}

impl PlaceCatalog {
    pub fn builtin() -> Self {
        Self {
            specs: vec![
                builtin(
                    "tokyo_metropolitan_gov",
                    "Tokyo Metropolitan Government Building",
                    &["東京都廳", "東京都庁", "都庁", "tocho", "tokyo metropolitan government building"],
                    &[("Shinjuku", 10, 4), ("Nishi-Shinjuku", 6, 2), ("Tochomae", 4, 2)],
                ),
                builtin(
                    "sensoji",
                    "Senso-ji",
                    &["淺草寺", "浅草寺", "sensoji", "senso-ji"],
                    &[("Asakusa", 6, 2), ("Tawaramachi", 8, 3), ("Kuramae", 12, 3)],
                ),
                builtin(
                    "tokyo_tower",
                    "Tokyo Tower",
                    &["東京鐵塔", "東京タワー", "tokyo tower"],
                    &[("Akabanebashi", 6, 2), ("Kamiyacho", 10, 3), ("Onarimon", 10, 3)],
                ),
            ],
        }
    }

    /// Parses the place JSON format. Places without candidate stations are skipped.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: Vec<RawPlace> = serde_json::from_str(json)?;
        let specs: Vec<PlaceSpec> = raw
            .into_iter()
            .map(PlaceSpec::from)
            .filter(|s| !s.candidates.is_empty())
            .collect();
        if specs.is_empty() {
            return Err(TransitError::Config("place file has no usable entries".to_string()));
        }
        Ok(Self { specs })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Catalog from `path` when it loads, else the built-in places.
    pub fn load_or_builtin(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::builtin();
        };
        match Self::from_file(path) {
            Ok(catalog) => {
                info!(path = %path.display(), places = catalog.len(), "Loaded place specs");
                catalog
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Falling back to built-in place specs");
                Self::builtin()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn specs(&self) -> &[PlaceSpec] {
        &self.specs
    }

    pub fn match_spec(&self, input: &str) -> Option<&PlaceSpec> {
        let term = input.trim().to_lowercase();
        if term.is_empty() {
            return None;
        }
        self.specs.iter().find(|s| s.matches(&term))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builtin_matching() {
        let catalog = PlaceCatalog::builtin();
        assert_eq!(catalog.match_spec("我想去淺草寺").map(|s| s.id.as_str()), Some("sensoji"));
        assert_eq!(catalog.match_spec("Tokyo Tower please").map(|s| s.id.as_str()), Some("tokyo_tower"));
        assert!(catalog.match_spec("Ueno").is_none());
        assert!(catalog.match_spec("  ").is_none());
    }

    #[test]
    fn test_json_loading_rules() {
        let json = r#"[
            {
                "id": "skytree",
                "name": {"ja": "東京スカイツリー", "en": "Tokyo Skytree"},
                "aliases": ["skytree", "Skytree"],
                "candidateStations": [
                    {"stationName": "Oshiage", "walkMinutes": 0, "complexity": {"turnCount": 1, "exitCount": 8}},
                    {"stationName": "Tokyo Skytree", "walkMinutes": 3}
                ]
            },
            {"id": "empty", "name": {}, "candidateStations": []}
        ]"#;
        let catalog = PlaceCatalog::from_json_str(json).unwrap();
        assert_eq!(catalog.len(), 1);
        let spec = &catalog.specs()[0];
        assert_eq!(spec.name, "Tokyo Skytree");
        assert_eq!(spec.aliases, vec!["skytree", "Tokyo Skytree", "東京スカイツリー"]);
        assert_eq!(spec.candidates[0].walk_minutes, 1);
        assert_eq!(spec.candidates[0].complexity_hint, 3);
        assert_eq!(spec.candidates[1].complexity_hint, 2);
    }

    #[test]
    fn test_load_or_builtin_falls_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not json").unwrap();
        let catalog = PlaceCatalog::load_or_builtin(Some(file.path()));
        assert_eq!(catalog.len(), 3);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"[{"id":"x","name":{"en":"X Hall"},"candidateStations":[{"stationName":"Ueno","walkMinutes":5}]}]"#)
            .unwrap();
        let catalog = PlaceCatalog::load_or_builtin(Some(file.path()));
        assert_eq!(catalog.len(), 1);
        assert!(catalog.match_spec("x hall").is_some());
    }
}
