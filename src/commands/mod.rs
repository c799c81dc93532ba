pub mod graph;
pub mod verify;
