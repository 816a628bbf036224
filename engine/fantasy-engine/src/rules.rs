//! Contest rules parsed from the loosely-typed rules blob

use chrono::{NaiveTime, Timelike};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// How often a roster may change while the tournament is in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeFrequency {
    /// No in-progress edits
    None,
    /// Unlimited, or capped per local day by `max_changes_per_day`
    Daily,
    /// A single edit across the whole in-progress phase
    Once,
    /// Round-aware limits; permitted until rounds are modelled
    Rounds,
}

impl ChangeFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeFrequency::None => "NONE",
            ChangeFrequency::Daily => "DAILY",
            ChangeFrequency::Once => "ONCE",
            ChangeFrequency::Rounds => "ROUNDS",
        }
    }
}

impl fmt::Display for ChangeFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeFrequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NONE" => Ok(ChangeFrequency::None),
            "DAILY" => Ok(ChangeFrequency::Daily),
            "ONCE" => Ok(ChangeFrequency::Once),
            "ROUNDS" => Ok(ChangeFrequency::Rounds),
            other => Err(format!("unknown change frequency: {}", other)),
        }
    }
}

/// Effective roster and edit rules for one contest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContestRules {
    // lowercase aliases accept keys that passed through case-folding config sources
    #[serde(alias = "teamsize")]
    pub team_size: u32,
    #[serde(alias = "walletsize")]
    pub wallet_size: Decimal,
    #[serde(alias = "allowteamchanges")]
    pub allow_team_changes: bool,
    #[serde(alias = "changefrequency")]
    pub change_frequency: ChangeFrequency,
    /// Local time of day, "HH:MM"
    #[serde(alias = "changewindowstart")]
    pub change_window_start: String,
    /// Local time of day, "HH:MM"; earlier than the start means the window wraps midnight
    #[serde(alias = "changewindowend")]
    pub change_window_end: String,
    #[serde(alias = "maxplayerstochange")]
    pub max_players_to_change: u32,
    /// Per-day cap under `DAILY`; `None` leaves daily edits unlimited
    #[serde(alias = "maxchangesperday")]
    pub max_changes_per_day: Option<u32>,
}

impl Default for ContestRules {
    fn default() -> Self {
        Self {
            team_size: 7,
            wallet_size: dec!(100000),
            allow_team_changes: false,
            change_frequency: ChangeFrequency::None,
            change_window_start: "00:00".to_string(),
            change_window_end: "23:59".to_string(),
            max_players_to_change: 2,
            max_changes_per_day: None,
        }
    }
}

impl ContestRules {
    /// Parse a rules blob, falling back to `defaults` for every missing or ill-typed field
    pub fn from_blob(blob: &Value, defaults: &ContestRules) -> Self {
        let obj = match blob {
            Value::Object(map) => map,
            Value::Null => return defaults.clone(),
            other => {
                warn!("Contest rules blob is not an object ({}), using defaults", other);
                return defaults.clone();
            }
        };

        let window_start = obj
            .get("changeWindowStart")
            .and_then(read_time_of_day)
            .unwrap_or_else(|| defaults.change_window_start.clone());
        let window_end = obj
            .get("changeWindowEnd")
            .and_then(read_time_of_day)
            .unwrap_or_else(|| defaults.change_window_end.clone());

        Self {
            team_size: obj
                .get("teamSize")
                .and_then(read_u32)
                .filter(|size| *size > 0)
                .unwrap_or(defaults.team_size),
            wallet_size: obj
                .get("walletSize")
                .and_then(read_decimal)
                .unwrap_or(defaults.wallet_size),
            allow_team_changes: obj
                .get("allowTeamChanges")
                .and_then(read_bool)
                .unwrap_or(defaults.allow_team_changes),
            change_frequency: obj
                .get("changeFrequency")
                .and_then(Value::as_str)
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.change_frequency),
            change_window_start: window_start,
            change_window_end: window_end,
            max_players_to_change: obj
                .get("maxPlayersToChange")
                .and_then(read_u32)
                .unwrap_or(defaults.max_players_to_change),
            max_changes_per_day: obj
                .get("maxChangesPerDay")
                .and_then(read_u32)
                .or(defaults.max_changes_per_day),
        }
    }

    /// Serialize back into the blob shape stored alongside the contest
    pub fn to_blob(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Parsed change window bounds
    pub fn change_window(&self) -> (NaiveTime, NaiveTime) {
        let start = parse_time_of_day(&self.change_window_start)
            .unwrap_or_else(|| NaiveTime::from_hms_opt(0, 0, 0).unwrap_or_default());
        let end = parse_time_of_day(&self.change_window_end)
            .unwrap_or_else(|| NaiveTime::from_hms_opt(23, 59, 0).unwrap_or_default());
        (start, end)
    }

    /// Whether a local time of day falls inside the change window (minute resolution, inclusive)
    pub fn window_contains(&self, time: NaiveTime) -> bool {
        let (start, end) = self.change_window();
        let time = NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time);
        if start <= end {
            time >= start && time <= end
        } else {
            time >= start || time <= end
        }
    }
}

/// Parse an "HH:MM" string
pub fn parse_time_of_day(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").ok()
}

fn read_time_of_day(value: &Value) -> Option<String> {
    let s = value.as_str()?;
    parse_time_of_day(s).map(|t| t.format("%H:%M").to_string())
}

fn read_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn read_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn read_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
    .filter(|d| !d.is_sign_negative())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_blob_uses_defaults() {
        let rules = ContestRules::from_blob(&json!({}), &ContestRules::default());
        assert_eq!(rules, ContestRules::default());
        assert_eq!(rules.team_size, 7);
        assert_eq!(rules.wallet_size, dec!(100000));

        let rules = ContestRules::from_blob(&Value::Null, &ContestRules::default());
        assert_eq!(rules, ContestRules::default());
    }

    #[test]
    fn test_blob_fields_override_defaults() {
        let blob = json!({
            "teamSize": 5,
            "walletSize": "2500.50",
            "allowTeamChanges": true,
            "changeFrequency": "once",
            "changeWindowStart": "09:30",
            "changeWindowEnd": "18:00",
            "maxPlayersToChange": "3",
            "maxChangesPerDay": 2
        });
        let rules = ContestRules::from_blob(&blob, &ContestRules::default());

        assert_eq!(rules.team_size, 5);
        assert_eq!(rules.wallet_size, dec!(2500.50));
        assert!(rules.allow_team_changes);
        assert_eq!(rules.change_frequency, ChangeFrequency::Once);
        assert_eq!(rules.change_window_start, "09:30");
        assert_eq!(rules.change_window_end, "18:00");
        assert_eq!(rules.max_players_to_change, 3);
        assert_eq!(rules.max_changes_per_day, Some(2));
    }

    #[test]
    fn test_ill_typed_fields_fall_back() {
        let blob = json!({
            "teamSize": -4,
            "walletSize": "lots",
            "allowTeamChanges": 1,
            "changeFrequency": "WEEKLY",
            "changeWindowStart": "9am",
        });
        let rules = ContestRules::from_blob(&blob, &ContestRules::default());
        assert_eq!(rules, ContestRules::default());
    }

    #[test]
    fn test_blob_round_trip() {
        let rules = ContestRules {
            allow_team_changes: true,
            change_frequency: ChangeFrequency::Daily,
            max_changes_per_day: Some(1),
            ..Default::default()
        };
        let parsed = ContestRules::from_blob(&rules.to_blob(), &ContestRules::default());
        assert_eq!(parsed, rules);
    }

    #[test]
    fn test_window_contains() {
        let rules = ContestRules {
            change_window_start: "09:00".into(),
            change_window_end: "17:00".into(),
            ..Default::default()
        };
        let t = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
        assert!(rules.window_contains(t(9, 0)));
        assert!(rules.window_contains(t(17, 0)));
        assert!(rules.window_contains(NaiveTime::from_hms_opt(17, 0, 45).unwrap()));
        assert!(!rules.window_contains(t(17, 1)));
        assert!(!rules.window_contains(t(8, 59)));
    }

    #[test]
    fn test_window_wraps_midnight() {
        let rules = ContestRules {
            change_window_start: "22:00".into(),
            change_window_end: "02:00".into(),
            ..Default::default()
        };
        let t = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
        assert!(rules.window_contains(t(23, 30)));
        assert!(rules.window_contains(t(1, 15)));
        assert!(!rules.window_contains(t(12, 0)));
    }
}
