use std::collections::HashSet;

use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

use crate::error::RecordMatchError;
use crate::models::earning::Earning;
use crate::models::match_record::{CreateMatchRequest, Participation};
use crate::models::user::is_known_team;

/// Input checks that run before any player lookup or write. Order matters:
/// a malformed request must never reach the database.
pub fn validate_create_match(req: &CreateMatchRequest) -> Result<(), RecordMatchError> {
    if req.stake_amount <= Decimal::ZERO {
        return Err(RecordMatchError::validation("Stake amount must be positive"));
    }
    if req.stake_amount.normalize().scale() > 2 {
        return Err(RecordMatchError::validation(
            "Stake amount cannot have more than 2 decimal places",
        ));
    }
    if !is_known_team(&req.winning_team) {
        return Err(RecordMatchError::Validation(format!(
            "Unknown team \"{}\"",
            req.winning_team
        )));
    }
    if req.players.is_empty() {
        return Err(RecordMatchError::validation("At least one player is required"));
    }
    let mut seen = HashSet::new();
    for player in &req.players {
        if !seen.insert(player.player_id) {
            return Err(RecordMatchError::Validation(format!(
                "Player {} is listed more than once",
                player.player_id
            )));
        }
        if player.smashes < 0 || player.spikes < 0 || player.saves < 0 {
            return Err(RecordMatchError::validation("Stat counters cannot be negative"));
        }
    }
    Ok(())
}

/// Splits `stake` across the winning participants and returns one earning
/// per winner.
///
/// Winners are the participations whose captured team equals `winning_team`,
/// ordered by player id so the result is stable. Each share is the stake
/// divided by the winner count, rounded down to whole cents; the leftover
/// cents go to the first winner in that order. The amounts therefore always
/// sum to the stake exactly.
pub fn plan_distribution(
    winning_team: &str,
    stake_amount: Decimal,
    participations: &[Participation],
) -> Result<Vec<Earning>, RecordMatchError> {
    let mut winners: Vec<&Participation> = participations
        .iter()
        .filter(|p| p.team == winning_team)
        .collect();
    if winners.is_empty() {
        return Err(RecordMatchError::NoWinningParticipants(
            winning_team.to_string(),
        ));
    }
    winners.sort_by_key(|p| p.player_id);

    let shares = split_stake(stake_amount, winners.len());

    Ok(winners
        .iter()
        .zip(shares)
        .map(|(winner, amount)| Earning {
            match_id: winner.match_id,
            player_id: winner.player_id,
            amount,
        })
        .collect())
}

/// Divides `stake` into `count` cent-exact shares summing to `stake`.
/// `count` must be at least 1.
fn split_stake(stake: Decimal, count: usize) -> Vec<Decimal> {
    let divisor = Decimal::from(count as u64);
    let base = (stake / divisor).round_dp_with_strategy(2, RoundingStrategy::ToZero);
    let residual = stake - base * divisor;

    let mut shares = vec![base; count];
    shares[0] += residual;
    shares
}

/// Count of winning-team participants a correction or creation would credit.
pub fn winner_count(winning_team: &str, participations: &[Participation]) -> usize {
    participations
        .iter()
        .filter(|p| p.team == winning_team)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::match_record::MatchPlayerInput;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn participation(match_id: Uuid, player_id: Uuid, team: &str) -> Participation {
        Participation {
            match_id,
            player_id,
            role: "Player".to_string(),
            smashes: 0,
            spikes: 0,
            saves: 0,
            team: team.to_string(),
        }
    }

    fn request(stake: &str, players: Vec<MatchPlayerInput>) -> CreateMatchRequest {
        CreateMatchRequest {
            date: "2025-03-14".parse().unwrap(),
            winning_team: "Team A".to_string(),
            stake_amount: dec(stake),
            players,
        }
    }

    fn player_input(id: Uuid) -> MatchPlayerInput {
        MatchPlayerInput {
            player_id: id,
            role: "Player".to_string(),
            smashes: 0,
            spikes: 0,
            saves: 0,
        }
    }

    #[test]
    fn even_split_has_no_residual() {
        let match_id = Uuid::new_v4();
        let participations: Vec<Participation> = (0..3)
            .map(|_| participation(match_id, Uuid::new_v4(), "Team A"))
            .collect();

        let earnings = plan_distribution("Team A", dec("300"), &participations).unwrap();
        assert_eq!(earnings.len(), 3);
        for earning in &earnings {
            assert_eq!(earning.amount, dec("100"));
        }
    }

    #[test]
    fn uneven_split_assigns_residual_to_first_winner() {
        let match_id = Uuid::new_v4();
        let participations: Vec<Participation> = (0..3)
            .map(|_| participation(match_id, Uuid::new_v4(), "Team A"))
            .collect();

        let earnings = plan_distribution("Team A", dec("100"), &participations).unwrap();
        let mut amounts: Vec<Decimal> = earnings.iter().map(|e| e.amount).collect();
        assert_eq!(amounts.iter().copied().sum::<Decimal>(), dec("100"));
        amounts.sort();
        assert_eq!(amounts, vec![dec("33.33"), dec("33.33"), dec("33.34")]);

        // The extra cent lands on the lowest player id.
        let first = earnings
            .iter()
            .min_by_key(|e| e.player_id)
            .unwrap();
        assert_eq!(first.amount, dec("33.34"));
    }

    #[test]
    fn conservation_holds_for_all_winner_counts() {
        let match_id = Uuid::new_v4();
        for count in 1..=13 {
            let participations: Vec<Participation> = (0..count)
                .map(|_| participation(match_id, Uuid::new_v4(), "Team B"))
                .collect();
            for stake in ["100", "99.99", "0.01", "250.50", "7"] {
                let earnings =
                    plan_distribution("Team B", dec(stake), &participations).unwrap();
                assert_eq!(earnings.len(), count);
                let total: Decimal = earnings.iter().map(|e| e.amount).sum();
                assert_eq!(total, dec(stake), "stake {stake} over {count} winners");
            }
        }
    }

    #[test]
    fn only_winning_team_is_credited() {
        let match_id = Uuid::new_v4();
        let winner = Uuid::new_v4();
        let participations = vec![
            participation(match_id, winner, "Team A"),
            participation(match_id, Uuid::new_v4(), "Team B"),
            participation(match_id, Uuid::new_v4(), "Team B"),
        ];

        let earnings = plan_distribution("Team A", dec("120"), &participations).unwrap();
        assert_eq!(earnings.len(), 1);
        assert_eq!(earnings[0].player_id, winner);
        assert_eq!(earnings[0].amount, dec("120"));
    }

    #[test]
    fn no_winning_participants_is_an_error() {
        let match_id = Uuid::new_v4();
        let participations = vec![
            participation(match_id, Uuid::new_v4(), "Team B"),
            participation(match_id, Uuid::new_v4(), "Team C"),
        ];

        let err = plan_distribution("Team A", dec("300"), &participations).unwrap_err();
        assert!(matches!(err, RecordMatchError::NoWinningParticipants(team) if team == "Team A"));
    }

    #[test]
    fn single_winner_takes_the_whole_stake() {
        let match_id = Uuid::new_v4();
        let participations = vec![participation(match_id, Uuid::new_v4(), "Team C")];
        let earnings = plan_distribution("Team C", dec("45.67"), &participations).unwrap();
        assert_eq!(earnings[0].amount, dec("45.67"));
    }

    #[test]
    fn validation_rejects_non_positive_stake() {
        let err = validate_create_match(&request("0", vec![player_input(Uuid::new_v4())]))
            .unwrap_err();
        assert!(matches!(err, RecordMatchError::Validation(_)));

        let err = validate_create_match(&request("-5", vec![player_input(Uuid::new_v4())]))
            .unwrap_err();
        assert!(matches!(err, RecordMatchError::Validation(_)));
    }

    #[test]
    fn validation_rejects_sub_cent_stake() {
        let err = validate_create_match(&request("10.005", vec![player_input(Uuid::new_v4())]))
            .unwrap_err();
        assert!(matches!(err, RecordMatchError::Validation(_)));

        // Trailing zeros beyond two places are fine once normalized.
        validate_create_match(&request("10.500", vec![player_input(Uuid::new_v4())])).unwrap();
    }

    #[test]
    fn validation_rejects_empty_player_list() {
        let err = validate_create_match(&request("100", vec![])).unwrap_err();
        assert!(matches!(err, RecordMatchError::Validation(_)));
    }

    #[test]
    fn validation_rejects_duplicate_players() {
        let id = Uuid::new_v4();
        let err = validate_create_match(&request("100", vec![player_input(id), player_input(id)]))
            .unwrap_err();
        assert!(matches!(err, RecordMatchError::Validation(_)));
    }

    #[test]
    fn validation_rejects_unknown_team() {
        let mut req = request("100", vec![player_input(Uuid::new_v4())]);
        req.winning_team = "Team Z".to_string();
        let err = validate_create_match(&req).unwrap_err();
        assert!(matches!(err, RecordMatchError::Validation(_)));
    }

    #[test]
    fn validation_rejects_negative_counters() {
        let mut input = player_input(Uuid::new_v4());
        input.saves = -1;
        let err = validate_create_match(&request("100", vec![input])).unwrap_err();
        assert!(matches!(err, RecordMatchError::Validation(_)));
    }

    #[test]
    fn winner_count_matches_filter() {
        let match_id = Uuid::new_v4();
        let participations = vec![
            participation(match_id, Uuid::new_v4(), "Team A"),
            participation(match_id, Uuid::new_v4(), "Team A"),
            participation(match_id, Uuid::new_v4(), "Team B"),
        ];
        assert_eq!(winner_count("Team A", &participations), 2);
        assert_eq!(winner_count("Team C", &participations), 0);
    }
}
