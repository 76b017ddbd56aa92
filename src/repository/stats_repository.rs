use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use futures::stream::TryStreamExt;
use mongodb::bson::doc;
use mongodb::error::Result;
use mongodb::{Client, Collection};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::models::earning::Earning;
use crate::models::match_record::{Match, Participation};
use crate::models::user::{Role, User, TEAMS};

/// Read-only aggregation over the match ledger: per-player dashboards,
/// leaderboards and club-wide match summaries. Never writes.
pub struct StatsRepository {
    users: Collection<User>,
    matches: Collection<Match>,
    participations: Collection<Participation>,
    earnings: Collection<Earning>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PlayerStats {
    pub total_matches: i64,
    pub wins: i64,
    pub win_rate: f64, // percent, 0 when no matches
    pub total_smashes: i64,
    pub total_spikes: i64,
    pub total_saves: i64,
    pub total_points: i64,
    pub total_earnings: Decimal,
}

#[derive(Serialize, Debug)]
pub struct LeaderboardEntry {
    pub id: Uuid,
    pub name: String,
    pub team: Option<String>,
    #[serde(flatten)]
    pub stats: PlayerStats,
}

#[derive(Serialize, Debug)]
pub struct TeamStanding {
    pub team: String,
    pub total_matches: i64,
    pub wins: i64,
    pub losses: i64,
    pub win_rate: f64,
    pub total_earnings: Decimal,
    pub player_count: i64,
}

#[derive(Serialize, Debug)]
pub struct MatchSummary {
    pub total_matches: i64,
    pub total_stakes: Decimal,
    pub average_stake: Decimal,
    pub unique_winning_teams: i64,
    pub first_match_date: Option<NaiveDate>,
    pub latest_match_date: Option<NaiveDate>,
}

impl StatsRepository {
    pub fn new(client: &Client) -> Self {
        let db = client.database("volleybank");
        StatsRepository {
            users: db.collection::<User>("users"),
            matches: db.collection::<Match>("matches"),
            participations: db.collection::<Participation>("match_players"),
            earnings: db.collection::<Earning>("earnings"),
        }
    }

    pub async fn player_stats(&self, player_id: Uuid) -> Result<PlayerStats> {
        let filter = doc! { "player_id": player_id.to_string() };

        let mut participations = Vec::new();
        let mut cursor = self.participations.find(filter.clone(), None).await?;
        while let Some(row) = cursor.try_next().await? {
            participations.push(row);
        }

        let mut earned = Decimal::ZERO;
        let mut cursor = self.earnings.find(filter, None).await?;
        while let Some(earning) = cursor.try_next().await? {
            earned += earning.amount;
        }

        let match_ids: Vec<String> = participations
            .iter()
            .map(|p| p.match_id.to_string())
            .collect();
        let mut matches = HashMap::new();
        if !match_ids.is_empty() {
            let mut cursor = self
                .matches
                .find(doc! { "id": { "$in": match_ids } }, None)
                .await?;
            while let Some(m) = cursor.try_next().await? {
                matches.insert(m.id, m);
            }
        }

        Ok(aggregate_player(&participations, &matches, earned))
    }

    /// Player leaderboard, only players with at least one recorded match.
    /// `order_by` is one of `total_earnings` (default), `total_points`,
    /// `win_rate`.
    pub async fn leaderboard(&self, limit: i64, order_by: &str) -> Result<Vec<LeaderboardEntry>> {
        let players = self.all_players().await?;
        let matches = self.all_matches().await?;
        let participations = self.all_participations().await?;
        let earnings = self.all_earnings().await?;

        let mut entries = build_leaderboard(&players, &matches, &participations, &earnings);
        sort_leaderboard(&mut entries, order_by);
        entries.truncate(limit.max(0) as usize);
        Ok(entries)
    }

    pub async fn team_leaderboard(&self) -> Result<Vec<TeamStanding>> {
        let players = self.all_players().await?;
        let matches = self.all_matches().await?;
        let participations = self.all_participations().await?;

        Ok(build_team_standings(&players, &matches, &participations))
    }

    pub async fn match_summary(&self) -> Result<MatchSummary> {
        let matches = self.all_matches().await?;
        Ok(summarize_matches(&matches))
    }

    async fn all_players(&self) -> Result<Vec<User>> {
        let mut cursor = self.users.find(doc! { "role": "player" }, None).await?;
        let mut players = Vec::new();
        while let Some(player) = cursor.try_next().await? {
            players.push(player);
        }
        Ok(players)
    }

    async fn all_matches(&self) -> Result<HashMap<Uuid, Match>> {
        let mut cursor = self.matches.find(None, None).await?;
        let mut matches = HashMap::new();
        while let Some(m) = cursor.try_next().await? {
            matches.insert(m.id, m);
        }
        Ok(matches)
    }

    async fn all_participations(&self) -> Result<Vec<Participation>> {
        let mut cursor = self.participations.find(None, None).await?;
        let mut rows = Vec::new();
        while let Some(row) = cursor.try_next().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    async fn all_earnings(&self) -> Result<Vec<Earning>> {
        let mut cursor = self.earnings.find(None, None).await?;
        let mut rows = Vec::new();
        while let Some(row) = cursor.try_next().await? {
            rows.push(row);
        }
        Ok(rows)
    }
}

fn win_rate_percent(wins: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (wins as f64 * 100.0 / total as f64 * 100.0).round() / 100.0
}

/// A participation counts as a win when its captured team matches the
/// match's winning team, which keeps win counts consistent with earnings.
fn aggregate_player(
    participations: &[Participation],
    matches: &HashMap<Uuid, Match>,
    total_earnings: Decimal,
) -> PlayerStats {
    let total_matches = participations.len() as i64;
    let wins = participations
        .iter()
        .filter(|p| {
            matches
                .get(&p.match_id)
                .is_some_and(|m| m.winning_team == p.team)
        })
        .count() as i64;
    let total_smashes = participations.iter().map(|p| p.smashes as i64).sum();
    let total_spikes = participations.iter().map(|p| p.spikes as i64).sum();
    let total_saves = participations.iter().map(|p| p.saves as i64).sum();

    PlayerStats {
        total_matches,
        wins,
        win_rate: win_rate_percent(wins, total_matches),
        total_smashes,
        total_spikes,
        total_saves,
        total_points: total_smashes + total_spikes + total_saves,
        total_earnings,
    }
}

fn build_leaderboard(
    players: &[User],
    matches: &HashMap<Uuid, Match>,
    participations: &[Participation],
    earnings: &[Earning],
) -> Vec<LeaderboardEntry> {
    let mut by_player: HashMap<Uuid, Vec<Participation>> = HashMap::new();
    for participation in participations {
        by_player
            .entry(participation.player_id)
            .or_default()
            .push(participation.clone());
    }
    let mut earned_by_player: HashMap<Uuid, Decimal> = HashMap::new();
    for earning in earnings {
        *earned_by_player.entry(earning.player_id).or_default() += earning.amount;
    }

    players
        .iter()
        .filter_map(|player| {
            let player_participations = by_player.get(&player.id)?;
            let earned = earned_by_player
                .get(&player.id)
                .copied()
                .unwrap_or(Decimal::ZERO);
            Some(LeaderboardEntry {
                id: player.id,
                name: player.name.clone(),
                team: player.team.clone(),
                stats: aggregate_player(player_participations, matches, earned),
            })
        })
        .collect()
}

fn sort_leaderboard(entries: &mut [LeaderboardEntry], order_by: &str) {
    match order_by {
        "total_points" => {
            entries.sort_by(|a, b| b.stats.total_points.cmp(&a.stats.total_points));
        }
        "win_rate" => {
            entries.sort_by(|a, b| {
                b.stats
                    .win_rate
                    .total_cmp(&a.stats.win_rate)
                    .then(b.stats.total_matches.cmp(&a.stats.total_matches))
            });
        }
        _ => {
            entries.sort_by(|a, b| b.stats.total_earnings.cmp(&a.stats.total_earnings));
        }
    }
}

fn build_team_standings(
    players: &[User],
    matches: &HashMap<Uuid, Match>,
    participations: &[Participation],
) -> Vec<TeamStanding> {
    let mut standings: Vec<TeamStanding> = TEAMS
        .iter()
        .filter_map(|team| {
            let match_ids: HashSet<Uuid> = participations
                .iter()
                .filter(|p| p.team == *team)
                .map(|p| p.match_id)
                .collect();
            if match_ids.is_empty() {
                return None;
            }

            let total_matches = match_ids.len() as i64;
            let won: Vec<&Match> = match_ids
                .iter()
                .filter_map(|id| matches.get(id))
                .filter(|m| m.winning_team == *team)
                .collect();
            let wins = won.len() as i64;
            let total_earnings: Decimal = won.iter().map(|m| m.stake_amount).sum();
            let player_count = players
                .iter()
                .filter(|p| p.role == Role::Player && p.team.as_deref() == Some(*team))
                .count() as i64;

            Some(TeamStanding {
                team: team.to_string(),
                total_matches,
                wins,
                losses: total_matches - wins,
                win_rate: win_rate_percent(wins, total_matches),
                total_earnings,
                player_count,
            })
        })
        .collect();

    standings.sort_by(|a, b| {
        b.win_rate
            .total_cmp(&a.win_rate)
            .then(b.total_earnings.cmp(&a.total_earnings))
    });
    standings
}

fn summarize_matches(matches: &HashMap<Uuid, Match>) -> MatchSummary {
    let total_matches = matches.len() as i64;
    let total_stakes: Decimal = matches.values().map(|m| m.stake_amount).sum();
    let average_stake = if total_matches > 0 {
        (total_stakes / Decimal::from(total_matches)).round_dp(2)
    } else {
        Decimal::ZERO
    };
    let unique_winning_teams = matches
        .values()
        .map(|m| m.winning_team.as_str())
        .collect::<HashSet<_>>()
        .len() as i64;

    MatchSummary {
        total_matches,
        total_stakes,
        average_stake,
        unique_winning_teams,
        first_match_date: matches.values().map(|m| m.date).min(),
        latest_match_date: matches.values().map(|m| m.date).max(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn make_match(winning_team: &str, stake: &str, date: &str) -> Match {
        Match {
            id: Uuid::new_v4(),
            date: date.parse().unwrap(),
            winning_team: winning_team.to_string(),
            stake_amount: dec(stake),
            created_by: Uuid::new_v4(),
            created_at: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    fn make_participation(match_id: Uuid, player_id: Uuid, team: &str) -> Participation {
        Participation {
            match_id,
            player_id,
            role: "Player".to_string(),
            smashes: 2,
            spikes: 3,
            saves: 1,
            team: team.to_string(),
        }
    }

    fn make_player(name: &str, team: &str) -> User {
        User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
            password_hash: "hash".to_string(),
            role: Role::Player,
            team: Some(team.to_string()),
            created_at: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn win_rate_is_zero_without_matches() {
        assert_eq!(win_rate_percent(0, 0), 0.0);
    }

    #[test]
    fn win_rate_rounds_to_two_places() {
        assert_eq!(win_rate_percent(1, 3), 33.33);
        assert_eq!(win_rate_percent(2, 3), 66.67);
        assert_eq!(win_rate_percent(3, 3), 100.0);
    }

    #[test]
    fn aggregate_player_counts_wins_by_captured_team() {
        let won = make_match("Team A", "300", "2025-03-01");
        let lost = make_match("Team B", "100", "2025-03-08");
        let player_id = Uuid::new_v4();
        let participations = vec![
            make_participation(won.id, player_id, "Team A"),
            make_participation(lost.id, player_id, "Team A"),
        ];
        let matches: HashMap<Uuid, Match> =
            [won, lost].into_iter().map(|m| (m.id, m)).collect();

        let stats = aggregate_player(&participations, &matches, dec("100"));
        assert_eq!(stats.total_matches, 2);
        assert_eq!(stats.wins, 1);
        assert_eq!(stats.win_rate, 50.0);
        assert_eq!(stats.total_smashes, 4);
        assert_eq!(stats.total_points, 12);
        assert_eq!(stats.total_earnings, dec("100"));
    }

    #[test]
    fn leaderboard_skips_players_without_matches() {
        let m = make_match("Team A", "300", "2025-03-01");
        let active = make_player("Arjun Sharma", "Team A");
        let idle = make_player("Priya Patel", "Team A");
        let participations = vec![make_participation(m.id, active.id, "Team A")];
        let earnings = vec![Earning {
            match_id: m.id,
            player_id: active.id,
            amount: dec("300"),
        }];
        let matches: HashMap<Uuid, Match> = [(m.id, m)].into_iter().collect();

        let entries = build_leaderboard(
            &[active.clone(), idle],
            &matches,
            &participations,
            &earnings,
        );
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, active.id);
        assert_eq!(entries[0].stats.total_earnings, dec("300"));
    }

    #[test]
    fn leaderboard_orders_by_earnings_by_default() {
        let m1 = make_match("Team A", "300", "2025-03-01");
        let m2 = make_match("Team B", "500", "2025-03-08");
        let a = make_player("Arjun Sharma", "Team A");
        let b = make_player("Rohan Kapoor", "Team B");
        let participations = vec![
            make_participation(m1.id, a.id, "Team A"),
            make_participation(m2.id, b.id, "Team B"),
        ];
        let earnings = vec![
            Earning { match_id: m1.id, player_id: a.id, amount: dec("300") },
            Earning { match_id: m2.id, player_id: b.id, amount: dec("500") },
        ];
        let matches: HashMap<Uuid, Match> =
            [m1, m2].into_iter().map(|m| (m.id, m)).collect();

        let mut entries =
            build_leaderboard(&[a, b.clone()], &matches, &participations, &earnings);
        sort_leaderboard(&mut entries, "total_earnings");
        assert_eq!(entries[0].id, b.id);
    }

    #[test]
    fn team_standings_track_wins_losses_and_stakes() {
        let won = make_match("Team A", "300", "2025-03-01");
        let lost = make_match("Team B", "200", "2025-03-08");
        let a = make_player("Arjun Sharma", "Team A");
        let participations = vec![
            make_participation(won.id, a.id, "Team A"),
            make_participation(lost.id, a.id, "Team A"),
            make_participation(lost.id, Uuid::new_v4(), "Team B"),
        ];
        let matches: HashMap<Uuid, Match> =
            [won, lost].into_iter().map(|m| (m.id, m)).collect();

        let standings = build_team_standings(&[a], &matches, &participations);
        let team_a = standings.iter().find(|s| s.team == "Team A").unwrap();
        assert_eq!(team_a.total_matches, 2);
        assert_eq!(team_a.wins, 1);
        assert_eq!(team_a.losses, 1);
        assert_eq!(team_a.total_earnings, dec("300"));
        assert_eq!(team_a.player_count, 1);

        let team_b = standings.iter().find(|s| s.team == "Team B").unwrap();
        assert_eq!(team_b.wins, 1);
        assert_eq!(team_b.total_matches, 1);
    }

    #[test]
    fn summary_of_empty_ledger() {
        let summary = summarize_matches(&HashMap::new());
        assert_eq!(summary.total_matches, 0);
        assert_eq!(summary.total_stakes, Decimal::ZERO);
        assert_eq!(summary.average_stake, Decimal::ZERO);
        assert!(summary.first_match_date.is_none());
    }

    #[test]
    fn summary_totals_and_average() {
        let matches: HashMap<Uuid, Match> = [
            make_match("Team A", "100", "2025-03-01"),
            make_match("Team B", "200", "2025-03-08"),
            make_match("Team A", "50.50", "2025-03-15"),
        ]
        .into_iter()
        .map(|m| (m.id, m))
        .collect();

        let summary = summarize_matches(&matches);
        assert_eq!(summary.total_matches, 3);
        assert_eq!(summary.total_stakes, dec("350.50"));
        assert_eq!(summary.average_stake, dec("116.83"));
        assert_eq!(summary.unique_winning_teams, 2);
        assert_eq!(summary.first_match_date, Some("2025-03-01".parse().unwrap()));
        assert_eq!(summary.latest_match_date, Some("2025-03-15".parse().unwrap()));
    }
}
