pub mod access;
mod gate;

pub use gate::BearerAuthGate;
