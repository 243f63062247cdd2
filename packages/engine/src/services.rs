pub mod accusation_service;
pub mod game_service;
pub mod headline_service;
pub mod reputation_service;
pub mod roster_service;
pub mod scheduler;
pub mod session_service;
pub mod voting_service;
