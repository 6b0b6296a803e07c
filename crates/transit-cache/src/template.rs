//! L1 fast-path answers for high-frequency questions.
//!
//! Two dispatch paths: a node table for a handful of high-value stations
//! (airports) and an ordered regex table. Patterns are plain data paired with
//! a [`TemplateCategory`]; rendering is a single `match` so every handler can be
//! tested on its own.

use crate::cache::{CacheEntry, CacheStats, StatsCounters};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use transit_core::CurrentWeather;
use transit_intent::{IntentComplexity, ResolvedContext};

pub const DEFAULT_TEMPLATE_TTL: Duration = Duration::from_secs(300);

pub const SCORE_NODE_MATCH: f64 = 0.98;
pub const SCORE_PATTERN_MATCH: f64 = 0.95;
pub const SCORE_CACHE_HIT: f64 = 1.0;

const DEFAULT_DESTINATION: [(&str, &str); 3] = [("zh-TW", "東京市區"), ("ja", "東京都心"), ("en", "central Tokyo")];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateCategory {
    AirportTransferNarita,
    AirportTransferHaneda,
    FacilityToilet,
    FacilityLocker,
    FacilityWifi,
    Fare,
    LastTrain,
    FirstTrain,
    Greeting,
}

impl TemplateCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateCategory::AirportTransferNarita => "airport_transfer_narita",
            TemplateCategory::AirportTransferHaneda => "airport_transfer_haneda",
            TemplateCategory::FacilityToilet => "facility_toilet",
            TemplateCategory::FacilityLocker => "facility_locker",
            TemplateCategory::FacilityWifi => "facility_wifi",
            TemplateCategory::Fare => "fare",
            TemplateCategory::LastTrain => "last_train",
            TemplateCategory::FirstTrain => "first_train",
            TemplateCategory::Greeting => "greeting",
        }
    }

    /// Airport answers depend on weather, disruption and destination, so they
    /// are never stored in the per-query cache.
    pub fn is_cacheable(&self) -> bool {
        !self.is_airport()
    }

    pub fn is_airport(&self) -> bool {
        matches!(
            self,
            TemplateCategory::AirportTransferNarita | TemplateCategory::AirportTransferHaneda
        )
    }

    /// Category reported to callers; both airports collapse into one.
    pub fn result_category(&self) -> &'static str {
        if self.is_airport() {
            "airport_transfer"
        } else {
            self.as_str()
        }
    }
}

struct TemplatePattern {
    regex: Regex,
    category: TemplateCategory,
}

fn pattern(re: &str, category: TemplateCategory) -> TemplatePattern {
    TemplatePattern {
        regex: Regex::new(re).expect("template pattern"),
        category,
    }
}

/// First match wins, so order matters.
static PATTERNS: Lazy<Vec<TemplatePattern>> = Lazy::new(|| {
    vec![
        pattern(
            r"(?i)(成田|NRT|Narita).*(東京|新宿|澀谷|池袋|上野|Tokyo|Shinjuku|Shibuya|Ikebukuro|Ueno)",
            TemplateCategory::AirportTransferNarita,
        ),
        pattern(
            r"(?i)(羽田|HND|Haneda).*(東京|新宿|澀谷|池袋|品川|Tokyo|Shinjuku|Shibuya|Ikebukuro|Shinagawa)",
            TemplateCategory::AirportTransferHaneda,
        ),
        pattern(
            r"(?i)(廁所|トイレ|toilet|お手洗い|洗手間|restroom)",
            TemplateCategory::FacilityToilet,
        ),
        pattern(
            r"(?i)(置物櫃|ロッカー|locker|コインロッカー|寄物|行李)",
            TemplateCategory::FacilityLocker,
        ),
        pattern(r"(?i)(wifi|ワイファイ|無線|網路|internet)", TemplateCategory::FacilityWifi),
        pattern(r"(?i)(多少錢|いくら|how much|fare|票價|運賃|料金)", TemplateCategory::Fare),
        pattern(r"(?i)(末班|終電|last train|最終|終車)", TemplateCategory::LastTrain),
        pattern(r"(?i)(首班|始發|first train|最早|初電)", TemplateCategory::FirstTrain),
        pattern(
            r"(?i)^(你好|こんにちは|hello|hi|hey|哈囉|您好)\s*$",
            TemplateCategory::Greeting,
        ),
    ]
});

fn node_category(node_id: &str) -> Option<TemplateCategory> {
    match node_id {
        "narita" => Some(TemplateCategory::AirportTransferNarita),
        "haneda" => Some(TemplateCategory::AirportTransferHaneda),
        _ => None,
    }
}

/// Picks the requested locale, else zh-TW, then ja, then en.
pub fn localize<S: AsRef<str>>(content: &[(&str, S)], locale: &str) -> String {
    let find = |wanted: &str| {
        content
            .iter()
            .find(|(l, _)| *l == wanted)
            .map(|(_, text)| text.as_ref().to_string())
    };
    find(locale)
        .or_else(|| find("zh-TW"))
        .or_else(|| find("ja"))
        .or_else(|| find("en"))
        .unwrap_or_default()
}

/// Inputs for a single template lookup.
#[derive(Debug, Clone, Copy)]
pub struct TemplateContext<'a> {
    pub query: &'a str,
    pub locale: &'a str,
    pub node_ctx: Option<&'a ResolvedContext>,
    pub weather: Option<&'a CurrentWeather>,
    pub has_disruption: bool,
}

impl<'a> TemplateContext<'a> {
    pub fn new(query: &'a str, locale: &'a str) -> Self {
        Self {
            query,
            locale,
            node_ctx: None,
            weather: None,
            has_disruption: false,
        }
    }

    pub fn with_node_ctx(mut self, node_ctx: &'a ResolvedContext) -> Self {
        self.node_ctx = Some(node_ctx);
        self
    }

    pub fn with_weather(mut self, weather: &'a CurrentWeather) -> Self {
        self.weather = Some(weather);
        self
    }

    pub fn with_disruption(mut self, has_disruption: bool) -> Self {
        self.has_disruption = has_disruption;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub matched: bool,
    pub content: String,
    pub category: String,
    pub score: f64,
}

impl MatchResult {
    pub fn miss() -> Self {
        Self::default()
    }

    fn hit(content: String, category: &str, score: f64) -> Self {
        Self {
            matched: true,
            content,
            category: category.to_string(),
            score,
        }
    }
}

#[derive(Debug, Clone)]
struct CachedTemplate {
    content: String,
    category: &'static str,
}

/// Template answers must not short-circuit multi-constraint questions.
pub fn allow_template(complexity: IntentComplexity) -> bool {
    complexity != IntentComplexity::Compound
}

pub struct TemplateEngine {
    cache: DashMap<String, CacheEntry<CachedTemplate>>,
    ttl: Duration,
    stats: StatsCounters,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE_TTL)
    }
}

impl TemplateEngine {
    pub fn new(ttl: Duration) -> Self {
        let ttl = if ttl.is_zero() { DEFAULT_TEMPLATE_TTL } else { ttl };
        Self {
            cache: DashMap::new(),
            ttl,
            stats: StatsCounters::default(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.cache.len())
    }

    /// Like [`TemplateEngine::match_query`] but returns a miss for compound intents.
    pub fn match_gated(&self, ctx: &TemplateContext<'_>, complexity: IntentComplexity) -> MatchResult {
        if !allow_template(complexity) {
            debug!(complexity = complexity.as_str(), "Template tier gated");
            return MatchResult::miss();
        }
        self.match_query(ctx)
    }

    pub fn match_query(&self, ctx: &TemplateContext<'_>) -> MatchResult {
        let query = ctx.query.trim();
        if query.is_empty() {
            return MatchResult::miss();
        }

        if let Some(category) = ctx
            .node_ctx
            .and_then(|n| n.primary_node_id.as_deref())
            .and_then(node_category)
        {
            let content = render(category, ctx);
            return MatchResult::hit(content, category.result_category(), SCORE_NODE_MATCH);
        }

        let key = cache_key(query, ctx.locale);
        if let Some(hit) = self.cached(&key) {
            return hit;
        }

        for p in PATTERNS.iter() {
            if !p.regex.is_match(query) {
                continue;
            }
            let content = render(p.category, ctx);
            let category = p.category.result_category();
            if p.category.is_cacheable() {
                self.cache.insert(
                    key,
                    CacheEntry::new(
                        CachedTemplate {
                            content: content.clone(),
                            category,
                        },
                        Some(self.ttl),
                    ),
                );
            }
            debug!(category, "Template pattern matched");
            return MatchResult::hit(content, category, SCORE_PATTERN_MATCH);
        }

        MatchResult::miss()
    }

    /// Expired entries are removed on lookup; there is no background sweep.
    fn cached(&self, key: &str) -> Option<MatchResult> {
        let mut expired = false;
        if let Some(mut entry) = self.cache.get_mut(key) {
            if entry.is_expired() {
                expired = true;
            } else {
                entry.touch();
                self.stats.hit();
                return Some(MatchResult::hit(
                    entry.value.content.clone(),
                    entry.value.category,
                    SCORE_CACHE_HIT,
                ));
            }
        }
        if expired && self.cache.remove(key).is_some() {
            self.stats.evict();
        }
        self.stats.miss();
        None
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}

/// Case and spacing variants of the same question share one entry.
fn cache_key(query: &str, locale: &str) -> String {
    let normalized = query.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ");
    format!("{}:{}", normalized, locale)
}

fn render(category: TemplateCategory, ctx: &TemplateContext<'_>) -> String {
    let locale = ctx.locale;
    match category {
        TemplateCategory::AirportTransferNarita | TemplateCategory::AirportTransferHaneda => {
            render_airport(category, ctx)
        }
        TemplateCategory::FacilityToilet => localize(
            &[
                ("zh-TW", "🚻 廁所通常位於各車站的付費區內外都有，大型轉運站通常在月台、閘門外及地下通道都設有。建議使用 Google Maps 搜尋「トイレ」(toilet) 確認最近位置。"),
                ("ja", "🚻 トイレは各駅の改札内外にあります。大きな駅ではホーム、改札外、地下通路にも設置されています。"),
                ("en", "🚻 Toilets are available both inside and outside the fare gates at most stations. Large transfer stations have toilets on platforms, outside gates, and in underground passages."),
            ],
            locale,
        ),
        TemplateCategory::FacilityLocker => localize(
            &[
                ("zh-TW", "🎒 置物櫃 (コインロッカー) 在大多數車站都有，通常位於閘門外。大型置物櫃 (大) 一天約 700-800 日圓，中型 (中) 約 500-600 日圓，小型 (小) 約 300-400 日圓。也可使用 Suica/PASMO 付款。"),
                ("ja", "🎒 コインロッカーは主要駅の改札外にあります。大サイズは700-800円/日、中サイズは500-600円/日、小サイズは300-400円/日です。Suica/PASMOでも支払えます。"),
                ("en", "🎒 Coin lockers are available outside the fare gates at most stations. Large lockers cost ¥700-800/day, medium ¥500-600/day, small ¥300-400/day. Suica/PASMO payment is accepted."),
            ],
            locale,
        ),
        TemplateCategory::FacilityWifi => localize(
            &[
                ("zh-TW", "📶 東京 Metro 和都營地下鐵在主要車站提供免費 WiFi「Metro_Free_Wi-Fi」。每次連線 180 分鐘，可重複登入。JR 東日本提供「JR-EAST_FREE_Wi-Fi」。"),
                ("ja", "📶 東京メトロ・都営地下鉄は主要駅で「Metro_Free_Wi-Fi」を提供しています（180分/回、再ログイン可）。JR東日本は「JR-EAST_FREE_Wi-Fi」を提供しています。"),
                ("en", "📶 Tokyo Metro and Toei Subway offer free WiFi 'Metro_Free_Wi-Fi' at major stations (180 min/session, re-login allowed). JR East provides 'JR-EAST_FREE_Wi-Fi'."),
            ],
            locale,
        ),
        TemplateCategory::Fare => localize(
            &[
                ("zh-TW", "💴 票價計算需要知道出發站和目的站。請告訴我您想從哪裡到哪裡，我可以幫您查詢票價。使用 IC 卡 (Suica/PASMO) 通常比購買單程票便宜。"),
                ("ja", "💴 運賃は出発駅と目的駅によります。どこからどこへ行きたいか教えてください。IC カード (Suica/PASMO) は切符より安いことが多いです。"),
                ("en", "💴 Fare depends on origin and destination. Please tell me where you want to go. Using an IC card (Suica/PASMO) is usually cheaper than buying a single ticket."),
            ],
            locale,
        ),
        TemplateCategory::LastTrain => localize(
            &[
                ("zh-TW", "🌙 東京的末班車大多在深夜 0:00-0:30 之間發車，但具體時間因路線和車站而異。請告訴我您的出發站和目的站，我可以查詢確切時間。週末和假日時刻可能不同。"),
                ("ja", "🌙 終電は深夜0:00-0:30頃ですが、路線・駅により異なります。出発駅と目的駅を教えてください。週末・祝日はダイヤが異なる場合があります。"),
                ("en", "🌙 Last trains in Tokyo typically depart between midnight and 0:30 AM, but times vary by line and station. Tell me your origin and destination for exact times. Weekend/holiday schedules may differ."),
            ],
            locale,
        ),
        TemplateCategory::FirstTrain => localize(
            &[
                ("zh-TW", "🌅 東京的首班車大多在清晨 5:00-5:30 之間發車。請告訴我您的出發站，我可以查詢確切時間。"),
                ("ja", "🌅 始発は朝5:00-5:30頃です。出発駅を教えてください。"),
                ("en", "🌅 First trains in Tokyo typically depart between 5:00-5:30 AM. Tell me your origin station for exact times."),
            ],
            locale,
        ),
        TemplateCategory::Greeting => localize(
            &[
                ("zh-TW", "👋 你好！我是東京交通助手。我可以幫您查詢路線、票價、末班車時間，以及車站設施資訊。請問有什麼可以幫您的嗎？"),
                ("ja", "👋 こんにちは！東京交通アシスタントです。路線・運賃・終電・駅設備をお調べします。何かお探しですか？"),
                ("en", "👋 Hello! I'm the Tokyo Transit Assistant. I can help with routes, fares, last trains, and station facilities. How can I help you?"),
            ],
            locale,
        ),
    }
}

fn airport_advice(ctx: &TemplateContext<'_>) -> String {
    let mut advice = String::from("🗼 **東京交通專家建議**\n");
    if let Some(weather) = ctx.weather {
        if weather.is_raining {
            advice.push_str("☔ **目前正下雨**：優先推薦直達的新幹線或特急電車，避免在戶外轉乘計程車。\n");
        } else {
            advice.push_str(&format!(
                "☀️ **今日天氣良好 ({:.1}°C)**：所有交通工具運行正常。\n",
                weather.temperature
            ));
        }
    }
    if ctx.has_disruption {
        advice.push_str("⚠️ **即時警告**：部分線路目前有延誤，請依下方即時建議規劃。\n");
    }
    advice
}

fn render_airport(category: TemplateCategory, ctx: &TemplateContext<'_>) -> String {
    let advice = airport_advice(ctx);
    let dest = ctx
        .node_ctx
        .and_then(|n| n.destination.as_deref())
        .filter(|d| !d.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| localize(&DEFAULT_DESTINATION, ctx.locale));

    let content: [(&str, String); 3] = if category == TemplateCategory::AirportTransferNarita {
        [
            ("zh-TW", format!("{advice}從 **成田機場** 前往 **{dest}** 的最佳方式：\n1. **Skyliner**: 最快(41分)，到日暮里/上野轉乘。\n2. **成田特急 N'EX**: 舒適直達東京/新宿/澀谷。\n3. **利木津巴士**: 適合攜帶大件行李直達飯店。")),
            ("ja", format!("{advice}**成田空港**から**{dest}**へのおすすめ：\n1. **スカイライナー**: 最速(41分)、日暮里/上野で乗り換え。\n2. **成田エクスプレス N'EX**: 東京・新宿・渋谷へ直通。\n3. **リムジンバス**: 大きな荷物がある場合はホテルへ直行。")),
            ("en", format!("{advice}Best ways from **Narita (NRT)** to **{dest}**:\n1. **Skyliner**: Fastest (41min) to Nippori/Ueno.\n2. **Narita Express (N'EX)**: Direct to Tokyo/Shinjuku.\n3. **Limousine Bus**: Best for heavy luggage direct to hotels.")),
        ]
    } else {
        [
            ("zh-TW", format!("{advice}從 **羽田機場** 前往 **{dest}** 的最佳方式：\n1. **京急線**: 最快直達品川/銀座線方向。\n2. **東京單軌電車**: 到濱松町轉乘山手線，風景優美。\n3. **利木津巴士**: 直達各大車站與飯店。")),
            ("ja", format!("{advice}**羽田空港**から**{dest}**へのおすすめ：\n1. **京急線**: 品川へ最速、浅草線・銀座方面へ直通。\n2. **東京モノレール**: 浜松町でJR山手線に乗り換え。\n3. **リムジンバス**: 主要駅・ホテルへ直行。")),
            ("en", format!("{advice}Best ways from **Haneda (HND)** to **{dest}**:\n1. **Keikyu Line**: Direct to Shinagawa/Ginza line.\n2. **Tokyo Monorail**: To Hamamatsucho for Yamanote line.\n3. **Limousine Bus**: Direct to major hubs.")),
        ]
    };
    localize(&content, ctx.locale)
}
