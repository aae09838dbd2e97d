pub mod offense_level;
pub mod rulebook;
