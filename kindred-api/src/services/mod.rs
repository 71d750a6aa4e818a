pub mod auth_service;
pub mod match_service;
pub mod messaging_service;
pub mod profile_service;
pub mod swipe_service;
pub mod user_service;
pub mod verification_service;
