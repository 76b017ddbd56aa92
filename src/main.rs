#[macro_use]
extern crate rocket;

mod config;
mod error;
mod jwt;
mod models;
mod repository;
mod services;

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::{Header, Status};
use rocket::serde::json::Json;
use rocket::{Request, Response, State};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use config::mongo_config::setup_mongo;
use error::RecordMatchError;
use jwt::guards::{AdminUser, AuthenticatedUser};
use models::earning::Earning;
use models::match_record::{CreateMatchRequest, Match, Participation, UpdateMatchRequest};
use models::user::{is_known_team, PublicUser, Role, User};
use repository::match_repository::MatchRepository;
use repository::stats_repository::{LeaderboardEntry, MatchSummary, PlayerStats, StatsRepository, TeamStanding};
use repository::user_repository::UserRepository;
use services::payout;

// CORS fairing so the browser client can talk to the API directly.
pub struct CORS;

#[rocket::async_trait]
impl Fairing for CORS {
    fn info(&self) -> Info {
        Info {
            name: "Add CORS headers to responses",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, _request: &'r Request<'_>, response: &mut Response<'r>) {
        response.set_header(Header::new("Access-Control-Allow-Origin", "*"));
        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "POST, GET, PUT, DELETE, OPTIONS",
        ));
        response.set_header(Header::new(
            "Access-Control-Allow-Headers",
            "Content-Type, Authorization",
        ));
    }
}

#[options("/<path..>")]
fn all_options(path: std::path::PathBuf) -> Status {
    let _ = path;
    Status::Ok
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ApiResponse<T> {
    pub message: String,
    pub result: Option<T>,
}

fn record_error_response<T>(err: &RecordMatchError) -> (Status, Json<ApiResponse<T>>) {
    let status = match err {
        RecordMatchError::PlayerNotFound(_) => Status::NotFound,
        RecordMatchError::Storage(e) => {
            eprintln!("Storage error while recording match: {:?}", e);
            Status::InternalServerError
        }
        _ => Status::BadRequest,
    };
    let detail = match err {
        RecordMatchError::Storage(_) => "transaction failed, nothing was recorded".to_string(),
        other => other.to_string(),
    };
    (
        status,
        Json(ApiResponse {
            message: format!("{}: {}", status.code, detail),
            result: None,
        }),
    )
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Deserialize, Serialize, Debug)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
    pub team: Option<String>,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Debug)]
pub struct AuthResponse {
    pub user: PublicUser,
    pub token: String,
}

fn validate_registration(req: &RegisterRequest) -> Result<(), String> {
    if req.name.trim().len() < 2 || req.name.len() > 50 {
        return Err("Name must be between 2 and 50 characters".to_string());
    }
    if !req.email.contains('@') {
        return Err("Please provide a valid email address".to_string());
    }
    if req.password.len() < 6 {
        return Err("Password must be at least 6 characters long".to_string());
    }
    let role = req.role.unwrap_or(Role::Player);
    match &req.team {
        Some(team) if !is_known_team(team) => {
            return Err(format!("Unknown team \"{}\"", team));
        }
        None if role == Role::Player => {
            return Err("Team is required for players".to_string());
        }
        _ => {}
    }
    Ok(())
}

#[post("/api/auth/register", format = "json", data = "<new_user>")]
async fn register(
    user_repo: &State<UserRepository>,
    new_user: Json<RegisterRequest>,
) -> (Status, Json<ApiResponse<AuthResponse>>) {
    let req = new_user.into_inner();
    if let Err(message) = validate_registration(&req) {
        return (
            Status::BadRequest,
            Json(ApiResponse {
                message: format!("400: {}", message),
                result: None,
            }),
        );
    }

    match user_repo.find_user_by_email(&req.email).await {
        Ok(Some(_)) => {
            return (
                Status::Conflict,
                Json(ApiResponse {
                    message: "409: Conflict - Email address already registered".to_string(),
                    result: None,
                }),
            )
        }
        Ok(None) => {}
        Err(e) => {
            eprintln!("Error checking email: {:?}", e);
            return (
                Status::InternalServerError,
                Json(ApiResponse {
                    message: "500: Internal Server Error".to_string(),
                    result: None,
                }),
            );
        }
    }

    let password_hash = match bcrypt::hash(&req.password, bcrypt::DEFAULT_COST) {
        Ok(hash) => hash,
        Err(e) => {
            eprintln!("Error hashing password: {:?}", e);
            return (
                Status::InternalServerError,
                Json(ApiResponse {
                    message: "500: Internal Server Error".to_string(),
                    result: None,
                }),
            );
        }
    };

    let user = User {
        id: Uuid::new_v4(),
        name: req.name.trim().to_string(),
        email: req.email,
        password_hash,
        role: req.role.unwrap_or(Role::Player),
        team: req.team,
        created_at: Utc::now().to_rfc3339(),
    };

    match user_repo.create_user(&user).await {
        Ok(()) => {
            let token = jwt::jwt_helper::create_token(user.id)
                .unwrap_or_else(|_| "Error creating token".to_string());
            (
                Status::Created,
                Json(ApiResponse {
                    message: "201: Created - User registered successfully".to_string(),
                    result: Some(AuthResponse {
                        user: PublicUser::from(&user),
                        token,
                    }),
                }),
            )
        }
        Err(e) => {
            eprintln!("Error creating user: {:?}", e);
            (
                Status::InternalServerError,
                Json(ApiResponse {
                    message: "500: Internal Server Error - User was not created".to_string(),
                    result: None,
                }),
            )
        }
    }
}

#[post("/api/auth/login", format = "json", data = "<credentials>")]
async fn login(
    user_repo: &State<UserRepository>,
    credentials: Json<LoginRequest>,
) -> (Status, Json<ApiResponse<AuthResponse>>) {
    let req = credentials.into_inner();

    let user = match user_repo.find_user_by_email(&req.email).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return (
                Status::Unauthorized,
                Json(ApiResponse {
                    message: "401: Unauthorized - Invalid email or password".to_string(),
                    result: None,
                }),
            )
        }
        Err(e) => {
            eprintln!("Error finding user: {:?}", e);
            return (
                Status::InternalServerError,
                Json(ApiResponse {
                    message: "500: Internal Server Error".to_string(),
                    result: None,
                }),
            );
        }
    };

    if !bcrypt::verify(&req.password, &user.password_hash).unwrap_or(false) {
        return (
            Status::Unauthorized,
            Json(ApiResponse {
                message: "401: Unauthorized - Invalid email or password".to_string(),
                result: None,
            }),
        );
    }

    let token = jwt::jwt_helper::create_token(user.id)
        .unwrap_or_else(|_| "Error creating token".to_string());
    (
        Status::Ok,
        Json(ApiResponse {
            message: "200: Login successful".to_string(),
            result: Some(AuthResponse {
                user: PublicUser::from(&user),
                token,
            }),
        }),
    )
}

#[get("/api/auth/profile")]
async fn get_profile(auth: AuthenticatedUser) -> Json<ApiResponse<PublicUser>> {
    Json(ApiResponse {
        message: "200: Success".to_string(),
        result: Some(PublicUser::from(&auth.user)),
    })
}

#[derive(Deserialize, Serialize, Debug)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub team: Option<String>,
}

#[put("/api/auth/profile", format = "json", data = "<profile>")]
async fn update_profile(
    auth: AuthenticatedUser,
    user_repo: &State<UserRepository>,
    profile: Json<UpdateProfileRequest>,
) -> (Status, Json<ApiResponse<PublicUser>>) {
    let req = profile.into_inner();
    if let Some(team) = &req.team {
        if !is_known_team(team) {
            return (
                Status::BadRequest,
                Json(ApiResponse {
                    message: format!("400: Unknown team \"{}\"", team),
                    result: None,
                }),
            );
        }
    }
    if let Some(name) = &req.name {
        if name.trim().len() < 2 || name.len() > 50 {
            return (
                Status::BadRequest,
                Json(ApiResponse {
                    message: "400: Name must be between 2 and 50 characters".to_string(),
                    result: None,
                }),
            );
        }
    }

    match user_repo
        .update_profile(auth.user.id, req.name.map(|n| n.trim().to_string()), req.team)
        .await
    {
        Ok(()) => match user_repo.find_user_by_id(auth.user.id).await {
            Ok(Some(updated)) => (
                Status::Ok,
                Json(ApiResponse {
                    message: "200: Profile updated successfully".to_string(),
                    result: Some(PublicUser::from(&updated)),
                }),
            ),
            _ => (
                Status::InternalServerError,
                Json(ApiResponse {
                    message: "500: Internal Server Error - Failed to fetch updated user".to_string(),
                    result: None,
                }),
            ),
        },
        Err(e) => {
            eprintln!("Error updating profile: {:?}", e);
            (
                Status::InternalServerError,
                Json(ApiResponse {
                    message: "500: Internal Server Error - Unable to update profile".to_string(),
                    result: None,
                }),
            )
        }
    }
}

// ---------------------------------------------------------------------------
// Players
// ---------------------------------------------------------------------------

#[get("/api/players")]
async fn get_all_players(
    _auth: AuthenticatedUser,
    user_repo: &State<UserRepository>,
) -> (Status, Json<ApiResponse<Vec<PublicUser>>>) {
    match user_repo.get_all_players().await {
        Ok(players) if !players.is_empty() => (
            Status::Ok,
            Json(ApiResponse {
                message: "200: Success".to_string(),
                result: Some(players.iter().map(PublicUser::from).collect()),
            }),
        ),
        Ok(_) => (
            Status::NoContent,
            Json(ApiResponse {
                message: "204: No Content".to_string(),
                result: None,
            }),
        ),
        Err(e) => {
            eprintln!("Error listing players: {:?}", e);
            (
                Status::InternalServerError,
                Json(ApiResponse {
                    message: "500: Internal Server Error".to_string(),
                    result: None,
                }),
            )
        }
    }
}

#[derive(Serialize, Debug)]
pub struct PlayerDetails {
    pub player: PublicUser,
    pub stats: PlayerStats,
}

#[get("/api/players/<id>")]
async fn get_player(
    auth: AuthenticatedUser,
    user_repo: &State<UserRepository>,
    stats_repo: &State<StatsRepository>,
    id: &str,
) -> (Status, Json<ApiResponse<PlayerDetails>>) {
    let Ok(player_id) = Uuid::parse_str(id) else {
        return (
            Status::BadRequest,
            Json(ApiResponse {
                message: "400: Bad Request - Invalid ID format".to_string(),
                result: None,
            }),
        );
    };
    if !auth.can_access_player(player_id) {
        return (
            Status::Forbidden,
            Json(ApiResponse {
                message: "403: Forbidden - You can only view your own data".to_string(),
                result: None,
            }),
        );
    }

    let player = match user_repo.find_user_by_id(player_id).await {
        Ok(Some(player)) => player,
        Ok(None) => {
            return (
                Status::NotFound,
                Json(ApiResponse {
                    message: "404: Not Found - Player not found".to_string(),
                    result: None,
                }),
            )
        }
        Err(e) => {
            eprintln!("Error finding player: {:?}", e);
            return (
                Status::InternalServerError,
                Json(ApiResponse {
                    message: "500: Internal Server Error".to_string(),
                    result: None,
                }),
            );
        }
    };

    match stats_repo.player_stats(player_id).await {
        Ok(stats) => (
            Status::Ok,
            Json(ApiResponse {
                message: "200: Success".to_string(),
                result: Some(PlayerDetails {
                    player: PublicUser::from(&player),
                    stats,
                }),
            }),
        ),
        Err(e) => {
            eprintln!("Error aggregating player stats: {:?}", e);
            (
                Status::InternalServerError,
                Json(ApiResponse {
                    message: "500: Internal Server Error".to_string(),
                    result: None,
                }),
            )
        }
    }
}

#[get("/api/players/<id>/stats")]
async fn get_player_stats(
    auth: AuthenticatedUser,
    user_repo: &State<UserRepository>,
    stats_repo: &State<StatsRepository>,
    id: &str,
) -> (Status, Json<ApiResponse<PlayerDetails>>) {
    get_player(auth, user_repo, stats_repo, id).await
}

#[derive(Serialize, Debug)]
pub struct MatchHistoryEntry {
    #[serde(flatten)]
    pub info: Match,
    pub role: String,
    pub smashes: i32,
    pub spikes: i32,
    pub saves: i32,
    pub amount_earned: Option<Decimal>,
    pub is_winner: bool,
}

#[derive(Serialize, Debug)]
pub struct Pagination {
    pub current_page: i64,
    pub total_pages: i64,
    pub total_matches: i64,
    pub limit: i64,
}

impl Pagination {
    fn new(page: i64, limit: i64, total: i64) -> Self {
        Pagination {
            current_page: page,
            total_pages: (total + limit - 1) / limit,
            total_matches: total,
            limit,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct EarningsSummary {
    pub total_earnings: Decimal,
    pub winning_matches: i64,
    pub total_matches: i64,
    pub win_rate: f64,
}

#[derive(Serialize, Debug)]
pub struct PlayerEarningsResponse {
    pub player: PublicUser,
    pub earnings: EarningsSummary,
    pub match_history: Vec<MatchHistoryEntry>,
    pub pagination: Pagination,
}

#[get("/api/players/<id>/earnings?<page>&<limit>")]
async fn get_player_earnings(
    auth: AuthenticatedUser,
    user_repo: &State<UserRepository>,
    match_repo: &State<MatchRepository>,
    id: &str,
    page: Option<i64>,
    limit: Option<i64>,
) -> (Status, Json<ApiResponse<PlayerEarningsResponse>>) {
    let Ok(player_id) = Uuid::parse_str(id) else {
        return (
            Status::BadRequest,
            Json(ApiResponse {
                message: "400: Bad Request - Invalid ID format".to_string(),
                result: None,
            }),
        );
    };
    if !auth.can_access_player(player_id) {
        return (
            Status::Forbidden,
            Json(ApiResponse {
                message: "403: Forbidden - You can only view your own data".to_string(),
                result: None,
            }),
        );
    }
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(10).clamp(1, 100);

    let player = match user_repo.find_user_by_id(player_id).await {
        Ok(Some(player)) => player,
        Ok(None) => {
            return (
                Status::NotFound,
                Json(ApiResponse {
                    message: "404: Not Found - Player not found".to_string(),
                    result: None,
                }),
            )
        }
        Err(e) => {
            eprintln!("Error finding player: {:?}", e);
            return (
                Status::InternalServerError,
                Json(ApiResponse {
                    message: "500: Internal Server Error".to_string(),
                    result: None,
                }),
            );
        }
    };

    let history = async {
        let participations = match_repo.participations_for_player(player_id).await?;
        let earnings = match_repo.earnings_for_player(player_id).await?;
        let match_ids: Vec<Uuid> = participations.iter().map(|p| p.match_id).collect();
        let matches = match_repo.matches_by_ids(&match_ids).await?;
        Ok::<_, mongodb::error::Error>((participations, earnings, matches))
    }
    .await;

    let (participations, earnings, matches) = match history {
        Ok(data) => data,
        Err(e) => {
            eprintln!("Error loading earnings history: {:?}", e);
            return (
                Status::InternalServerError,
                Json(ApiResponse {
                    message: "500: Internal Server Error".to_string(),
                    result: None,
                }),
            );
        }
    };

    let matches_by_id: HashMap<Uuid, Match> =
        matches.into_iter().map(|m| (m.id, m)).collect();
    let earned_by_match: HashMap<Uuid, Decimal> = earnings
        .iter()
        .map(|e| (e.match_id, e.amount))
        .collect();

    let mut entries: Vec<MatchHistoryEntry> = participations
        .iter()
        .filter_map(|p| {
            let info = matches_by_id.get(&p.match_id)?.clone();
            let is_winner = info.winning_team == p.team;
            Some(MatchHistoryEntry {
                amount_earned: earned_by_match.get(&p.match_id).copied(),
                is_winner,
                role: p.role.clone(),
                smashes: p.smashes,
                spikes: p.spikes,
                saves: p.saves,
                info,
            })
        })
        .collect();
    entries.sort_by(|a, b| {
        b.info
            .date
            .cmp(&a.info.date)
            .then(b.info.created_at.cmp(&a.info.created_at))
    });

    let total = entries.len() as i64;
    let total_earnings: Decimal = earnings.iter().map(|e| e.amount).sum();
    let winning_matches = entries.iter().filter(|e| e.is_winner).count() as i64;
    let win_rate = if total > 0 {
        (winning_matches as f64 * 100.0 / total as f64 * 100.0).round() / 100.0
    } else {
        0.0
    };

    let start = ((page - 1) * limit) as usize;
    let page_entries: Vec<MatchHistoryEntry> = entries
        .into_iter()
        .skip(start)
        .take(limit as usize)
        .collect();

    (
        Status::Ok,
        Json(ApiResponse {
            message: "200: Success".to_string(),
            result: Some(PlayerEarningsResponse {
                player: PublicUser::from(&player),
                earnings: EarningsSummary {
                    total_earnings,
                    winning_matches,
                    total_matches: total,
                    win_rate,
                },
                match_history: page_entries,
                pagination: Pagination::new(page, limit, total),
            }),
        }),
    )
}

#[delete("/api/players/<id>")]
async fn delete_player(
    _admin: AdminUser,
    user_repo: &State<UserRepository>,
    id: &str,
) -> (Status, Json<ApiResponse<String>>) {
    let Ok(player_id) = Uuid::parse_str(id) else {
        return (
            Status::BadRequest,
            Json(ApiResponse {
                message: "400: Bad Request - Invalid ID format".to_string(),
                result: None,
            }),
        );
    };
    match user_repo.delete_user(player_id).await {
        Ok(true) => (
            Status::Ok,
            Json(ApiResponse {
                message: "200: Player deleted successfully".to_string(),
                result: None,
            }),
        ),
        Ok(false) => (
            Status::NotFound,
            Json(ApiResponse {
                message: "404: Not Found - Player not found".to_string(),
                result: None,
            }),
        ),
        Err(e) => {
            eprintln!("Error deleting player: {:?}", e);
            (
                Status::InternalServerError,
                Json(ApiResponse {
                    message: "500: Internal Server Error".to_string(),
                    result: None,
                }),
            )
        }
    }
}

// ---------------------------------------------------------------------------
// Matches
// ---------------------------------------------------------------------------

#[derive(Serialize, Debug)]
pub struct MatchPlayerDetails {
    pub player_id: Uuid,
    pub name: String,
    pub team: String,
    pub role: String,
    pub smashes: i32,
    pub spikes: i32,
    pub saves: i32,
    pub amount_earned: Option<Decimal>,
}

#[derive(Serialize, Debug)]
pub struct MatchDetails {
    #[serde(flatten)]
    pub info: Match,
    pub players: Vec<MatchPlayerDetails>,
}

#[derive(Serialize, Debug)]
pub struct EarningsBreakdown {
    pub total_amount: Decimal,
    pub winning_players_count: usize,
    pub earnings: Vec<Earning>,
}

#[derive(Serialize, Debug)]
pub struct CreateMatchResponse {
    #[serde(rename = "match")]
    pub match_details: MatchDetails,
    pub earnings: EarningsBreakdown,
}

/// Records a match: validates the request, resolves every participant
/// against the player directory, plans the stake distribution and persists
/// the whole write set in one transaction. Either the full match (with its
/// participations and earnings) becomes visible, or nothing does.
#[post("/api/matches", format = "json", data = "<new_match>")]
async fn create_match(
    admin: AdminUser,
    user_repo: &State<UserRepository>,
    match_repo: &State<MatchRepository>,
    new_match: Json<CreateMatchRequest>,
) -> (Status, Json<ApiResponse<CreateMatchResponse>>) {
    let req = new_match.into_inner();
    if let Err(e) = payout::validate_create_match(&req) {
        return record_error_response(&e);
    }

    let match_id = Uuid::new_v4();
    let mut participations = Vec::with_capacity(req.players.len());
    let mut roster: HashMap<Uuid, User> = HashMap::new();
    for input in &req.players {
        match user_repo.find_user_by_id(input.player_id).await {
            Ok(Some(user)) => {
                if user.role != Role::Player {
                    return record_error_response(&RecordMatchError::PlayerNotEligible(user.name));
                }
                let Some(team) = user.team.clone() else {
                    return record_error_response(&RecordMatchError::PlayerNotEligible(user.name));
                };
                participations.push(Participation {
                    match_id,
                    player_id: input.player_id,
                    role: input.role.clone(),
                    smashes: input.smashes,
                    spikes: input.spikes,
                    saves: input.saves,
                    team,
                });
                roster.insert(user.id, user);
            }
            Ok(None) => {
                return record_error_response(&RecordMatchError::PlayerNotFound(input.player_id))
            }
            Err(e) => return record_error_response(&RecordMatchError::Storage(e)),
        }
    }

    let earnings =
        match payout::plan_distribution(&req.winning_team, req.stake_amount, &participations) {
            Ok(earnings) => earnings,
            Err(e) => return record_error_response(&e),
        };

    let record = Match {
        id: match_id,
        date: req.date,
        winning_team: req.winning_team,
        stake_amount: req.stake_amount,
        created_by: admin.user.id,
        created_at: Utc::now().to_rfc3339(),
    };

    if let Err(e) = match_repo
        .create_match(&record, &participations, &earnings)
        .await
    {
        return record_error_response(&RecordMatchError::Storage(e));
    }

    let players = match_player_details(&participations, &earnings, |id| {
        roster.get(&id).map(|u| u.name.clone())
    });

    (
        Status::Created,
        Json(ApiResponse {
            message: "201: Created - Match recorded successfully".to_string(),
            result: Some(CreateMatchResponse {
                earnings: EarningsBreakdown {
                    total_amount: record.stake_amount,
                    winning_players_count: earnings.len(),
                    earnings,
                },
                match_details: MatchDetails {
                    info: record,
                    players,
                },
            }),
        }),
    )
}

fn match_player_details(
    participations: &[Participation],
    earnings: &[Earning],
    name_of: impl Fn(Uuid) -> Option<String>,
) -> Vec<MatchPlayerDetails> {
    let mut players: Vec<MatchPlayerDetails> = participations
        .iter()
        .map(|p| MatchPlayerDetails {
            player_id: p.player_id,
            name: name_of(p.player_id).unwrap_or_else(|| "Unknown".to_string()),
            team: p.team.clone(),
            role: p.role.clone(),
            smashes: p.smashes,
            spikes: p.spikes,
            saves: p.saves,
            amount_earned: earnings
                .iter()
                .find(|e| e.player_id == p.player_id)
                .map(|e| e.amount),
        })
        .collect();
    players.sort_by(|a, b| a.name.cmp(&b.name));
    players
}

#[get("/api/matches/<id>")]
async fn get_match(
    _auth: AuthenticatedUser,
    user_repo: &State<UserRepository>,
    match_repo: &State<MatchRepository>,
    id: &str,
) -> (Status, Json<ApiResponse<MatchDetails>>) {
    let Ok(match_id) = Uuid::parse_str(id) else {
        return (
            Status::BadRequest,
            Json(ApiResponse {
                message: "400: Bad Request - Invalid ID format".to_string(),
                result: None,
            }),
        );
    };

    let details = async {
        let Some(info) = match_repo.find_match_by_id(match_id).await? else {
            return Ok(None);
        };
        let participations = match_repo.participations_for_match(match_id).await?;
        let earnings = match_repo.earnings_for_match(match_id).await?;
        let mut names = HashMap::new();
        for participation in &participations {
            if let Some(user) = user_repo.find_user_by_id(participation.player_id).await? {
                names.insert(user.id, user.name);
            }
        }
        let players =
            match_player_details(&participations, &earnings, |id| names.get(&id).cloned());
        Ok::<_, mongodb::error::Error>(Some(MatchDetails { info, players }))
    }
    .await;

    match details {
        Ok(Some(details)) => (
            Status::Ok,
            Json(ApiResponse {
                message: "200: Success".to_string(),
                result: Some(details),
            }),
        ),
        Ok(None) => (
            Status::NotFound,
            Json(ApiResponse {
                message: "404: Not Found - Match not found".to_string(),
                result: None,
            }),
        ),
        Err(e) => {
            eprintln!("Error loading match: {:?}", e);
            (
                Status::InternalServerError,
                Json(ApiResponse {
                    message: "500: Internal Server Error".to_string(),
                    result: None,
                }),
            )
        }
    }
}

#[derive(Serialize, Debug)]
pub struct MatchListResponse {
    pub matches: Vec<Match>,
    pub pagination: Pagination,
}

#[get("/api/matches?<page>&<limit>&<team>&<date_from>&<date_to>")]
async fn list_matches(
    _auth: AuthenticatedUser,
    match_repo: &State<MatchRepository>,
    page: Option<i64>,
    limit: Option<i64>,
    team: Option<String>,
    date_from: Option<String>,
    date_to: Option<String>,
) -> (Status, Json<ApiResponse<MatchListResponse>>) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(10).clamp(1, 100);

    for date in [&date_from, &date_to].into_iter().flatten() {
        if date.parse::<NaiveDate>().is_err() {
            return (
                Status::BadRequest,
                Json(ApiResponse {
                    message: format!("400: Bad Request - Invalid date \"{}\"", date),
                    result: None,
                }),
            );
        }
    }

    match match_repo
        .find_matches(
            team.as_deref(),
            date_from.as_deref(),
            date_to.as_deref(),
            page,
            limit,
        )
        .await
    {
        Ok((matches, total)) => (
            Status::Ok,
            Json(ApiResponse {
                message: "200: Success".to_string(),
                result: Some(MatchListResponse {
                    matches,
                    pagination: Pagination::new(page, limit, total as i64),
                }),
            }),
        ),
        Err(e) => {
            eprintln!("Error listing matches: {:?}", e);
            (
                Status::InternalServerError,
                Json(ApiResponse {
                    message: "500: Internal Server Error".to_string(),
                    result: None,
                }),
            )
        }
    }
}

#[get("/api/matches/recent?<limit>")]
async fn recent_matches(
    _auth: AuthenticatedUser,
    match_repo: &State<MatchRepository>,
    limit: Option<i64>,
) -> (Status, Json<ApiResponse<Vec<Match>>>) {
    let limit = limit.unwrap_or(5).clamp(1, 50);
    match match_repo.recent_matches(limit).await {
        Ok(matches) => (
            Status::Ok,
            Json(ApiResponse {
                message: "200: Success".to_string(),
                result: Some(matches),
            }),
        ),
        Err(e) => {
            eprintln!("Error loading recent matches: {:?}", e);
            (
                Status::InternalServerError,
                Json(ApiResponse {
                    message: "500: Internal Server Error".to_string(),
                    result: None,
                }),
            )
        }
    }
}

#[get("/api/matches/stats")]
async fn match_stats(
    _auth: AuthenticatedUser,
    stats_repo: &State<StatsRepository>,
) -> (Status, Json<ApiResponse<MatchSummary>>) {
    match stats_repo.match_summary().await {
        Ok(summary) => (
            Status::Ok,
            Json(ApiResponse {
                message: "200: Success".to_string(),
                result: Some(summary),
            }),
        ),
        Err(e) => {
            eprintln!("Error summarizing matches: {:?}", e);
            (
                Status::InternalServerError,
                Json(ApiResponse {
                    message: "500: Internal Server Error".to_string(),
                    result: None,
                }),
            )
        }
    }
}

/// Administrative correction of a recorded match. The stake split is
/// re-planned from the participations' captured teams and replaces the old
/// earnings in the same transaction, so the credited total always equals the
/// corrected stake.
#[put("/api/matches/<id>", format = "json", data = "<update>")]
async fn update_match(
    _admin: AdminUser,
    user_repo: &State<UserRepository>,
    match_repo: &State<MatchRepository>,
    id: &str,
    update: Json<UpdateMatchRequest>,
) -> (Status, Json<ApiResponse<MatchDetails>>) {
    let Ok(match_id) = Uuid::parse_str(id) else {
        return (
            Status::BadRequest,
            Json(ApiResponse {
                message: "400: Bad Request - Invalid ID format".to_string(),
                result: None,
            }),
        );
    };
    let req = update.into_inner();

    let existing = match match_repo.find_match_by_id(match_id).await {
        Ok(Some(existing)) => existing,
        Ok(None) => {
            return (
                Status::NotFound,
                Json(ApiResponse {
                    message: "404: Not Found - Match not found".to_string(),
                    result: None,
                }),
            )
        }
        Err(e) => return record_error_response(&RecordMatchError::Storage(e)),
    };

    let winning_team = req
        .winning_team
        .unwrap_or_else(|| existing.winning_team.clone());
    let stake_amount = req.stake_amount.unwrap_or(existing.stake_amount);
    if stake_amount <= Decimal::ZERO {
        return record_error_response(&RecordMatchError::validation(
            "Stake amount must be positive",
        ));
    }
    if stake_amount.normalize().scale() > 2 {
        return record_error_response(&RecordMatchError::validation(
            "Stake amount cannot have more than 2 decimal places",
        ));
    }
    if !is_known_team(&winning_team) {
        return record_error_response(&RecordMatchError::Validation(format!(
            "Unknown team \"{}\"",
            winning_team
        )));
    }

    let participations = match match_repo.participations_for_match(match_id).await {
        Ok(participations) => participations,
        Err(e) => return record_error_response(&RecordMatchError::Storage(e)),
    };
    let earnings = match payout::plan_distribution(&winning_team, stake_amount, &participations) {
        Ok(earnings) => earnings,
        Err(e) => return record_error_response(&e),
    };

    if let Err(e) = match_repo
        .apply_correction(match_id, &winning_team, stake_amount, &earnings)
        .await
    {
        return record_error_response(&RecordMatchError::Storage(e));
    }

    let mut names = HashMap::new();
    for participation in &participations {
        if let Ok(Some(user)) = user_repo.find_user_by_id(participation.player_id).await {
            names.insert(user.id, user.name);
        }
    }
    let players = match_player_details(&participations, &earnings, |id| names.get(&id).cloned());
    (
        Status::Ok,
        Json(ApiResponse {
            message: "200: Match updated successfully".to_string(),
            result: Some(MatchDetails {
                info: Match {
                    winning_team,
                    stake_amount,
                    ..existing
                },
                players,
            }),
        }),
    )
}

#[delete("/api/matches/<id>")]
async fn delete_match(
    _admin: AdminUser,
    match_repo: &State<MatchRepository>,
    id: &str,
) -> (Status, Json<ApiResponse<String>>) {
    let Ok(match_id) = Uuid::parse_str(id) else {
        return (
            Status::BadRequest,
            Json(ApiResponse {
                message: "400: Bad Request - Invalid ID format".to_string(),
                result: None,
            }),
        );
    };
    match match_repo.delete_match(match_id).await {
        Ok(true) => (
            Status::Ok,
            Json(ApiResponse {
                message: "200: Match deleted successfully".to_string(),
                result: None,
            }),
        ),
        Ok(false) => (
            Status::NotFound,
            Json(ApiResponse {
                message: "404: Not Found - Match not found".to_string(),
                result: None,
            }),
        ),
        Err(e) => {
            eprintln!("Error deleting match: {:?}", e);
            (
                Status::InternalServerError,
                Json(ApiResponse {
                    message: "500: Internal Server Error - Match was not deleted".to_string(),
                    result: None,
                }),
            )
        }
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

#[derive(Deserialize, Serialize, Debug)]
pub struct UpdateStatsRequest {
    pub match_id: Uuid,
    pub smashes: Option<i32>,
    pub spikes: Option<i32>,
    pub saves: Option<i32>,
}

#[post("/api/stats/<player_id>", format = "json", data = "<stats>")]
async fn update_player_match_stats(
    _admin: AdminUser,
    match_repo: &State<MatchRepository>,
    player_id: &str,
    stats: Json<UpdateStatsRequest>,
) -> (Status, Json<ApiResponse<Participation>>) {
    let Ok(player_id) = Uuid::parse_str(player_id) else {
        return (
            Status::BadRequest,
            Json(ApiResponse {
                message: "400: Bad Request - Invalid ID format".to_string(),
                result: None,
            }),
        );
    };
    let req = stats.into_inner();
    for counter in [req.smashes, req.spikes, req.saves].into_iter().flatten() {
        if counter < 0 {
            return (
                Status::BadRequest,
                Json(ApiResponse {
                    message: "400: Bad Request - Stat counters cannot be negative".to_string(),
                    result: None,
                }),
            );
        }
    }

    match match_repo
        .update_participation_stats(req.match_id, player_id, req.smashes, req.spikes, req.saves)
        .await
    {
        Ok(Some(updated)) => (
            Status::Ok,
            Json(ApiResponse {
                message: "200: Player stats updated successfully".to_string(),
                result: Some(updated),
            }),
        ),
        Ok(None) => (
            Status::NotFound,
            Json(ApiResponse {
                message: "404: Not Found - Player not found in this match".to_string(),
                result: None,
            }),
        ),
        Err(e) => {
            eprintln!("Error updating stats: {:?}", e);
            (
                Status::InternalServerError,
                Json(ApiResponse {
                    message: "500: Internal Server Error".to_string(),
                    result: None,
                }),
            )
        }
    }
}

#[get("/api/stats/leaderboard?<limit>&<order_by>")]
async fn leaderboard(
    _auth: AuthenticatedUser,
    stats_repo: &State<StatsRepository>,
    limit: Option<i64>,
    order_by: Option<String>,
) -> (Status, Json<ApiResponse<Vec<LeaderboardEntry>>>) {
    let limit = limit.unwrap_or(10).clamp(1, 100);
    let order_by = order_by.unwrap_or_else(|| "total_earnings".to_string());
    match stats_repo.leaderboard(limit, &order_by).await {
        Ok(entries) => (
            Status::Ok,
            Json(ApiResponse {
                message: "200: Success".to_string(),
                result: Some(entries),
            }),
        ),
        Err(e) => {
            eprintln!("Error building leaderboard: {:?}", e);
            (
                Status::InternalServerError,
                Json(ApiResponse {
                    message: "500: Internal Server Error".to_string(),
                    result: None,
                }),
            )
        }
    }
}

#[get("/api/stats/leaderboard/teams")]
async fn team_leaderboard(
    _auth: AuthenticatedUser,
    stats_repo: &State<StatsRepository>,
) -> (Status, Json<ApiResponse<Vec<TeamStanding>>>) {
    match stats_repo.team_leaderboard().await {
        Ok(standings) => (
            Status::Ok,
            Json(ApiResponse {
                message: "200: Success".to_string(),
                result: Some(standings),
            }),
        ),
        Err(e) => {
            eprintln!("Error building team leaderboard: {:?}", e);
            (
                Status::InternalServerError,
                Json(ApiResponse {
                    message: "500: Internal Server Error".to_string(),
                    result: None,
                }),
            )
        }
    }
}

// ---------------------------------------------------------------------------
// Health and catchers
// ---------------------------------------------------------------------------

#[get("/health")]
fn health() -> Json<ApiResponse<String>> {
    Json(ApiResponse {
        message: "VolleyBank API is running".to_string(),
        result: Some(Utc::now().to_rfc3339()),
    })
}

#[catch(404)]
fn not_found(req: &Request) -> Json<ApiResponse<String>> {
    Json(ApiResponse {
        message: format!("404: '{}' route not found", req.uri()),
        result: None,
    })
}

#[catch(401)]
fn unauthorized(_req: &Request) -> Json<ApiResponse<String>> {
    Json(ApiResponse {
        message: "401: Unauthorized - Valid token required".to_string(),
        result: None,
    })
}

#[catch(403)]
fn forbidden(_req: &Request) -> Json<ApiResponse<String>> {
    Json(ApiResponse {
        message: "403: Forbidden - Admin access required".to_string(),
        result: None,
    })
}

#[launch]
async fn rocket() -> _ {
    let client = setup_mongo().await;
    let user_repo = UserRepository::new(&client);
    let match_repo = MatchRepository::new(&client);
    let stats_repo = StatsRepository::new(&client);

    if let Err(e) = user_repo.ensure_indexes().await {
        eprintln!("Warning: could not create user indexes: {:?}", e);
    }
    if let Err(e) = match_repo.ensure_indexes().await {
        eprintln!("Warning: could not create match indexes: {:?}", e);
    }
    println!("Connected to MongoDB, VolleyBank API starting");

    rocket::build()
        .manage(user_repo)
        .manage(match_repo)
        .manage(stats_repo)
        .attach(CORS)
        .mount(
            "/",
            routes![
                all_options,
                health,
                register,
                login,
                get_profile,
                update_profile,
                get_all_players,
                get_player,
                get_player_stats,
                get_player_earnings,
                delete_player,
                create_match,
                get_match,
                list_matches,
                recent_matches,
                match_stats,
                update_match,
                delete_match,
                update_player_match_stats,
                leaderboard,
                team_leaderboard
            ],
        )
        .register("/", catchers![not_found, unauthorized, forbidden])
}
