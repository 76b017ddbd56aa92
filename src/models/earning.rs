use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A monetary credit to one player for one match. Rows are written only by
/// the payout planner inside the match transaction, at most one per
/// (match, player).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Earning {
    #[serde(with = "crate::models::uuid_string")]
    pub match_id: Uuid,
    #[serde(with = "crate::models::uuid_string")]
    pub player_id: Uuid,
    pub amount: Decimal,
}
