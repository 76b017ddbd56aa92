pub mod mongo_config;

const DEFAULT_JWT_SECRET: &str = "volleybank_dev_secret";

/// Signing secret for tokens. Always set `JWT_SECRET` outside development.
pub fn jwt_secret() -> String {
    std::env::var("JWT_SECRET").unwrap_or_else(|_| DEFAULT_JWT_SECRET.to_string())
}
