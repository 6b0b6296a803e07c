use chrono::{DateTime, FixedOffset, SecondsFormat, Timelike};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const AIRPORT_KEYWORDS: &[&str] = &["narita", "nrt", "成田", "haneda", "hnd", "羽田", "airport", "機場", "空港"];

const RAIN_RAIL_PENALTY: f64 = 4.0;
const LATE_NIGHT_TAXI_BONUS: f64 = 8.0;
const LATE_NIGHT_RAIL_PENALTY: f64 = 10.0;

pub fn is_airport_keyword(input: &str) -> bool {
    let lower = input.to_lowercase();
    AIRPORT_KEYWORDS.iter().any(|k| lower.contains(k))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Airport {
    Narita,
    Haneda,
}

impl Airport {
    /// Haneda when either endpoint names it, Narita otherwise.
    pub fn detect(origin: &str, destination: &str) -> Self {
        let joined = format!("{} {}", origin, destination).to_lowercase();
        if ["haneda", "hnd", "羽田"].iter().any(|k| joined.contains(k)) {
            Airport::Haneda
        } else {
            Airport::Narita
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Airport::Narita => "Narita Airport",
            Airport::Haneda => "Haneda Airport",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    Rail,
    Bus,
    Taxi,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirportOption {
    pub mode: AccessMode,
    pub label: String,
    pub duration_minutes: u32,
    pub headway_minutes: u32,
    pub transfers: u32,
    pub time_window: String,
    pub score: f64,
}

fn option(mode: AccessMode, label: &str, duration: u32, headway: u32, transfers: u32, window: &str) -> AirportOption {
    AirportOption {
        mode,
        label: label.to_string(),
        duration_minutes: duration,
        headway_minutes: headway,
        transfers,
        time_window: window.to_string(),
        score: 0.0,
    }
}

fn fixed_options(airport: Airport) -> Vec<AirportOption> {
    match airport {
        Airport::Narita => vec![
            option(AccessMode::Rail, "Skyliner / N'EX", 55, 20, 1, "05:30-23:00"),
            option(AccessMode::Bus, "Airport Limousine Bus", 90, 25, 0, "06:00-23:30"),
            option(AccessMode::Taxi, "Taxi", 80, 0, 0, "24h"),
        ],
        Airport::Haneda => vec![
            option(AccessMode::Rail, "Keikyu / Tokyo Monorail", 40, 8, 1, "05:00-24:00"),
            option(AccessMode::Bus, "Airport Limousine Bus", 55, 20, 0, "05:30-23:30"),
            option(AccessMode::Taxi, "Taxi", 45, 0, 0, "24h"),
        ],
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Scores the fixed access options for `airport`, best first.
///
/// Rain penalizes rail; late night (23:00 to 05:59) favours taxis over rail.
pub fn rank_airport_options(airport: Airport, is_raining: bool, hour: u32) -> Vec<AirportOption> {
    let late_night = hour >= 23 || hour <= 5;
    let mut options = fixed_options(airport);
    for opt in &mut options {
        let mut score = opt.duration_minutes as f64 + opt.headway_minutes as f64 * 0.5 + opt.transfers as f64 * 8.0;
        if is_raining && opt.mode == AccessMode::Rail {
            score += RAIN_RAIL_PENALTY;
        }
        if late_night {
            match opt.mode {
                AccessMode::Taxi => score -= LATE_NIGHT_TAXI_BONUS,
                AccessMode::Rail => score += LATE_NIGHT_RAIL_PENALTY,
                AccessMode::Bus => {}
            }
        }
        opt.score = round2(score);
    }
    options.sort_by(|a, b| a.score.total_cmp(&b.score));
    options
}

/// A ranked airport recommendation ready to stream.
#[derive(Debug, Clone, PartialEq)]
pub struct AirportAccess {
    pub airport: Airport,
    pub origin: String,
    pub destination: String,
    pub summary: String,
    pub date_time_jst: String,
    pub weather_rain: bool,
    pub recommendation: AirportOption,
    pub alternatives: Vec<AirportOption>,
}

impl AirportAccess {
    /// `None` only if the option table is empty.
    pub fn build(
        origin: &str,
        destination: &str,
        locale: &str,
        is_raining: bool,
        now: DateTime<FixedOffset>,
    ) -> Option<Self> {
        let airport = Airport::detect(origin, destination);
        let mut ranked = rank_airport_options(airport, is_raining, now.hour()).into_iter();
        let recommendation = ranked.next()?;
        let alternatives: Vec<AirportOption> = ranked.take(2).collect();
        let summary = airport_summary(locale, airport, &recommendation);
        Some(Self {
            airport,
            origin: origin.to_string(),
            destination: destination.to_string(),
            summary,
            date_time_jst: now.to_rfc3339_opts(SecondsFormat::Secs, false),
            weather_rain: is_raining,
            recommendation,
            alternatives,
        })
    }

    pub fn to_structured(&self) -> Value {
        json!({
            "type": "airport_access",
            "data": {
                "airport": self.airport,
                "origin": self.origin,
                "destination": self.destination,
                "summary": self.summary,
                "context": {
                    "date_time_jst": self.date_time_jst,
                    "weather_rain": self.weather_rain,
                },
                "recommendation": self.recommendation,
                "alternatives": self.alternatives,
            }
        })
    }
}

fn airport_summary(locale: &str, airport: Airport, best: &AirportOption) -> String {
    let name = airport.display_name();
    if locale.starts_with("ja") {
        format!("空港アクセス提案: {} -> 推奨は `{}`（約{}分）。", name, best.label, best.duration_minutes)
    } else if locale.starts_with("zh") {
        format!("機場建議：{} -> 主要建議 `{}`（約 {} 分鐘）。", name, best.label, best.duration_minutes)
    } else {
        format!("Airport access recommendation: {} -> `{}` (~{} min).", name, best.label, best.duration_minutes)
    }
}
