use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Match {
    #[serde(with = "crate::models::uuid_string")]
    pub id: Uuid,
    pub date: NaiveDate,
    pub winning_team: String,
    pub stake_amount: Decimal,
    #[serde(with = "crate::models::uuid_string")]
    pub created_by: Uuid,
    pub created_at: String,
}

/// One player's recorded presence in a match, with raw performance counters.
/// `team` is the player's team at the moment the match was recorded; earnings
/// and win counts are derived from it, so a later team change never rewrites
/// history.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Participation {
    #[serde(with = "crate::models::uuid_string")]
    pub match_id: Uuid,
    #[serde(with = "crate::models::uuid_string")]
    pub player_id: Uuid,
    pub role: String,
    pub smashes: i32,
    pub spikes: i32,
    pub saves: i32,
    pub team: String,
}

/// Per-player entry of a match creation request.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct MatchPlayerInput {
    pub player_id: Uuid,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default)]
    pub smashes: i32,
    #[serde(default)]
    pub spikes: i32,
    #[serde(default)]
    pub saves: i32,
}

fn default_role() -> String {
    "Player".to_string()
}

#[derive(Deserialize, Serialize, Debug)]
pub struct CreateMatchRequest {
    pub date: NaiveDate,
    pub winning_team: String,
    pub stake_amount: Decimal,
    pub players: Vec<MatchPlayerInput>,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct UpdateMatchRequest {
    pub winning_team: Option<String>,
    pub stake_amount: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_input_defaults() {
        let input: MatchPlayerInput = serde_json::from_str(
            r#"{"player_id":"8f8bdd1c-0b37-4f07-9931-9cf2c07b8963"}"#,
        )
        .unwrap();
        assert_eq!(input.role, "Player");
        assert_eq!(input.smashes, 0);
        assert_eq!(input.spikes, 0);
        assert_eq!(input.saves, 0);
    }

    #[test]
    fn create_request_accepts_numeric_and_string_stakes() {
        let req: CreateMatchRequest = serde_json::from_str(
            r#"{"date":"2025-03-14","winning_team":"Team A","stake_amount":300,"players":[]}"#,
        )
        .unwrap();
        assert_eq!(req.stake_amount, Decimal::from(300));

        let req: CreateMatchRequest = serde_json::from_str(
            r#"{"date":"2025-03-14","winning_team":"Team A","stake_amount":"99.50","players":[]}"#,
        )
        .unwrap();
        assert_eq!(req.stake_amount, "99.50".parse::<Decimal>().unwrap());
    }
}
