//! Onboarding wizard — account step, patient step, then home.
//!
//! The [`Orchestrator`] knows which step an account is on, seeds each step's
//! form from what earlier steps collected, and turns a successful submit
//! into the address of the next step. `routes` exposes the wizard over HTTP.

pub mod orchestrator;
pub mod routes;
pub mod state;

pub use orchestrator::{Orchestrator, Transition};
pub use routes::{AppState, onboarding_routes};
pub use state::OnboardingStep;
