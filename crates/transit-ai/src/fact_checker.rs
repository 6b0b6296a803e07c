use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    DirectClaim,
    NoTransfer,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactCheckIssue {
    pub kind: IssueKind,
    pub claim: &'static str,
    pub correction: &'static str,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FactCheckResult {
    pub issues: Vec<FactCheckIssue>,
    /// Text to append after the streamed answer; empty when nothing was wrong.
    pub correction: String,
}

impl FactCheckResult {
    pub fn has_hallucination(&self) -> bool {
        !self.issues.is_empty()
    }
}

/// Verified route used in corrections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundTruthRoute {
    pub name: String,
    pub transfer_station: String,
    pub total_time_minutes: u32,
    pub total_fare_yen: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lang {
    ZhTw,
    Ja,
    En,
}

impl Lang {
    fn from_locale(locale: &str) -> Self {
        let l = locale.to_lowercase();
        if l.starts_with("en") {
            Lang::En
        } else if l.starts_with("ja") {
            Lang::Ja
        } else {
            Lang::ZhTw
        }
    }
}

struct Phrases {
    claim_direct: &'static str,
    corr_direct: &'static str,
    claim_no_transfer: &'static str,
    corr_no_transfer: &'static str,
    header: &'static str,
}

fn phrases(lang: Lang) -> Phrases {
    match lang {
        Lang::ZhTw => Phrases {
            claim_direct: "京急線直達東京車站",
            corr_direct: "京急線只直達品川站，需要在品川轉乘 JR 才能到東京車站",
            claim_no_transfer: "羽田機場到東京車站不需轉乘",
            corr_no_transfer: "從羽田機場到東京車站必須轉乘（在品川或濱松町）",
            header: "⚠️ **重要更正**",
        },
        Lang::Ja => Phrases {
            claim_direct: "京急線で東京駅まで直通",
            corr_direct: "京急線は品川駅までの直通です。東京駅へは品川でJRへの乗り換えが必要です",
            claim_no_transfer: "羽田から東京駅まで乗り換えなし",
            corr_no_transfer: "羽田から東京駅へは乗り換え（品川または浜松町）が必要です",
            header: "⚠️ **重要なお知らせ**",
        },
        Lang::En => Phrases {
            claim_direct: "Keikyu line direct to Tokyo Station",
            corr_direct: "Keikyu line only goes direct to Shinagawa; you must transfer to JR at Shinagawa to reach Tokyo Station.",
            claim_no_transfer: "No transfer from Haneda to Tokyo Station",
            corr_no_transfer: "Transfer is required from Haneda to Tokyo Station (at Shinagawa or Hamamatsucho).",
            header: "⚠️ **Important Correction**",
        },
    }
}

/// Catches known false claims in LLM answers about Haneda to Tokyo Station.
#[derive(Debug, Clone)]
pub struct FactChecker {
    haneda_to_tokyo: GroundTruthRoute,
}

impl Default for FactChecker {
    fn default() -> Self {
        Self::new(GroundTruthRoute {
            name: "Keikyu Airport Line + JR Yamanote/Keihin-Tohoku Line".to_string(),
            transfer_station: "Shinagawa".to_string(),
            total_time_minutes: 35,
            total_fare_yen: 500,
        })
    }
}

impl FactChecker {
    pub fn new(haneda_to_tokyo: GroundTruthRoute) -> Self {
        Self { haneda_to_tokyo }
    }

    pub fn check(&self, query: &str, response: &str, locale: &str) -> FactCheckResult {
        let mut result = FactCheckResult::default();
        let q = query.to_lowercase();
        let haneda_to_tokyo = (q.contains("haneda") && q.contains("tokyo"))
            || (query.contains("羽田") && query.contains("東京"));
        if !haneda_to_tokyo {
            return result;
        }

        let lang = Lang::from_locale(locale);
        let p = phrases(lang);
        let r = response.to_lowercase();
        let has_keikyu = response.contains("京急") || r.contains("keikyu");
        let has_tokyo = response.contains("東京站")
            || response.contains("東京車站")
            || response.contains("東京駅")
            || r.contains("tokyo station");
        let has_direct = response.contains("直達")
            || response.contains("直通")
            || r.contains("direct");
        let has_no_transfer = ["不需轉乘", "不需要轉乘", "不用轉乘", "乗り換えなし"]
            .iter()
            .any(|m| response.contains(m))
            || r.contains("no transfer");

        if has_keikyu && has_tokyo && has_direct {
            result.issues.push(FactCheckIssue {
                kind: IssueKind::DirectClaim,
                claim: p.claim_direct,
                correction: p.corr_direct,
            });
        } else if has_tokyo && has_no_transfer {
            result.issues.push(FactCheckIssue {
                kind: IssueKind::NoTransfer,
                claim: p.claim_no_transfer,
                correction: p.corr_no_transfer,
            });
        }

        if let Some(issue) = result.issues.first() {
            if !response.contains(p.header) {
                result.correction = format!("\n\n{}", self.render_correction(lang, p.header, issue.correction));
            }
        }
        result
    }

    fn render_correction(&self, lang: Lang, header: &str, correction: &str) -> String {
        let best = &self.haneda_to_tokyo;
        match lang {
            Lang::ZhTw => format!(
                "{}：{}。建議路線：{}，在{}轉車，總時間約{}分鐘，票價約¥{}。",
                header, correction, best.name, best.transfer_station, best.total_time_minutes, best.total_fare_yen
            ),
            Lang::Ja => format!(
                "{}：{}。推奨ルート：{}、{}で乗り換え、所要時間約{}分、運賃約¥{}。",
                header, correction, best.name, best.transfer_station, best.total_time_minutes, best.total_fare_yen
            ),
            Lang::En => format!(
                "{}: {} Recommended route: {}, transfer at {}, travel time ~{} min, fare ~¥{}.",
                header, correction, best.name, best.transfer_station, best.total_time_minutes, best.total_fare_yen
            ),
        }
    }
}
