pub mod doctor;
pub mod export;
pub mod maintenance;
pub mod search;
pub mod stats;
