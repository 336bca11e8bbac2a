pub mod artifacts;
pub mod completion;
pub mod sandbox;
pub mod session;
