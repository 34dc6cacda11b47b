pub mod locks;
pub mod simulation;
pub mod transitions;
