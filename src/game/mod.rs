pub mod constants;
pub mod entity;
pub mod events;
pub mod input_buffer;
pub mod simulation;
pub mod spatial;
pub mod state;
pub mod systems;
