pub mod delivery;
pub mod event;
