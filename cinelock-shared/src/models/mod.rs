pub mod events;
pub mod wire;
