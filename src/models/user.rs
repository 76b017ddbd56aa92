use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Team labels the club actually fields. Registration and match recording
/// only accept these.
pub const TEAMS: [&str; 3] = ["Team A", "Team B", "Team C"];

pub fn is_known_team(team: &str) -> bool {
    TEAMS.contains(&team)
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Player,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct User {
    #[serde(with = "crate::models::uuid_string")]
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub team: Option<String>, // required for players, optional for admins
    pub created_at: String,
}

/// What the API returns for a user. The stored document keeps the password
/// hash; responses never do.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub team: Option<String>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        PublicUser {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            team: user.team.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        assert_eq!(serde_json::to_string(&Role::Player).unwrap(), "\"player\"");
    }

    #[test]
    fn known_teams() {
        assert!(is_known_team("Team A"));
        assert!(is_known_team("Team C"));
        assert!(!is_known_team("Team D"));
        assert!(!is_known_team("team a"));
    }

    #[test]
    fn public_user_drops_password_hash() {
        let user = User {
            id: Uuid::new_v4(),
            name: "Arjun Sharma".to_string(),
            email: "arjun.sharma@gmail.com".to_string(),
            password_hash: "$2b$12$secret".to_string(),
            role: Role::Player,
            team: Some("Team A".to_string()),
            created_at: "2025-01-01T00:00:00Z".to_string(),
        };
        let json = serde_json::to_string(&PublicUser::from(&user)).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(json.contains("arjun.sharma@gmail.com"));
    }
}
