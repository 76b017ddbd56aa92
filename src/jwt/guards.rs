use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use rocket::State;
use uuid::Uuid;

use crate::jwt::jwt_helper;
use crate::models::user::{Role, User};
use crate::repository::user_repository::UserRepository;

/// Request guard: a valid `Authorization: Bearer <token>` header whose
/// subject still exists in the user directory.
pub struct AuthenticatedUser {
    pub user: User,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.user.role == Role::Admin
    }

    /// Admins may read any player's data; players only their own.
    pub fn can_access_player(&self, player_id: Uuid) -> bool {
        self.is_admin() || self.user.id == player_id
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthenticatedUser {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let header = match request.headers().get_one("Authorization") {
            Some(header) => header,
            None => return Outcome::Error((Status::Unauthorized, ())),
        };
        let token = match header.strip_prefix("Bearer ") {
            Some(token) => token,
            None => return Outcome::Error((Status::Unauthorized, ())),
        };

        let claims = match jwt_helper::verify_token(token) {
            Ok(claims) => claims,
            Err(_) => return Outcome::Error((Status::Unauthorized, ())),
        };
        let user_id = match Uuid::parse_str(&claims.sub) {
            Ok(id) => id,
            Err(_) => return Outcome::Error((Status::Unauthorized, ())),
        };

        let user_repo = match request.guard::<&State<UserRepository>>().await {
            Outcome::Success(repo) => repo,
            _ => return Outcome::Error((Status::InternalServerError, ())),
        };

        match user_repo.find_user_by_id(user_id).await {
            Ok(Some(user)) => Outcome::Success(AuthenticatedUser { user }),
            Ok(None) => Outcome::Error((Status::Unauthorized, ())),
            Err(e) => {
                eprintln!("Error loading user for token: {:?}", e);
                Outcome::Error((Status::InternalServerError, ()))
            }
        }
    }
}

/// Request guard for admin-only routes.
pub struct AdminUser {
    pub user: User,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminUser {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match AuthenticatedUser::from_request(request).await {
            Outcome::Success(auth) if auth.is_admin() => {
                Outcome::Success(AdminUser { user: auth.user })
            }
            Outcome::Success(_) => Outcome::Error((Status::Forbidden, ())),
            Outcome::Error(e) => Outcome::Error(e),
            Outcome::Forward(f) => Outcome::Forward(f),
        }
    }
}
