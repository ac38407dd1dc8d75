pub mod session;
pub mod skill;
