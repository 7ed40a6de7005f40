// Composition root.
//
// Responsibilities
// - Read config from the environment.
// - Instantiate concrete infrastructure implementations and wire them into use case handlers.
// - Start and stop the outbox background workers.

pub mod config;
pub mod workers;
