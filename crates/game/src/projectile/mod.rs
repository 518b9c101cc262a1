mod controller;
mod state;

pub use state::{Impact, Projectile};
