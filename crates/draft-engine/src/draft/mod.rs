// Draft domain: entities, picks, rosters, league settings and state.

pub mod entity;
pub mod league;
pub mod pick;
pub mod roster;
pub mod state;
