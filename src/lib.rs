//! Drive a browser toward a natural-language goal with a computer-use model.
//!
//! The [`agent::Agent`] sends the goal to a [`brain::DecisionService`], executes each
//! suggested action through a [`hands::BrowserCapability`] and feeds the resulting
//! screenshot back, until the service answers or the turn budget or deadline runs out.

pub mod agent;
pub mod brain;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod hands;
pub mod snapshots;
pub mod types;

pub use agent::{Agent, Outcome};
pub use error::{AgentError, Result};
