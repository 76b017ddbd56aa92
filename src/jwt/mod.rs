pub mod claims;
pub mod guards;
pub mod jwt_helper;
