pub mod engine;
pub mod gateway;
pub mod model;
pub mod persistence;
pub mod scoreboard;
pub mod session;
pub mod timeout;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;
