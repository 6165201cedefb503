//! # Boardroom Core
//!
//! The "Brain" of the Boardroom system - decomposes a business problem,
//! dispatches it to a panel of analyst workers and synthesizes their
//! opinions into one ranked recommendation.
//!
//! ## Architecture
//!
//! - `backend/` - Generation backends (scripted responder, live Gemini)
//! - `models` - Backend provider selection and configuration
//! - `workers/` - Coordinator and Specialist workers with typed contracts
//! - `memory/` - Shared context store (trace + published facts)
//! - `state/` - Persistence of weights and run history
//! - `swarm/` - Pipeline controller, stages and lifecycle events
//! - `report` - Synthesized report and its plain-text rendering
//!
//! ## Usage
//!
//! ```rust,ignore
//! use boardroom_core::swarm::{Controller, ControllerConfig};
//!
//! let mut controller = Controller::new(ControllerConfig::default());
//! let outcome = controller.run("Our margins dropped 8% this quarter").await?;
//! println!("{}", boardroom_core::report::render_text(&outcome.report));
//! ```

pub mod backend;
pub mod error;
pub mod memory;
pub mod models;
pub mod report;
pub mod state;
pub mod swarm;
pub mod workers;

pub use error::{MalformedResponse, PipelineError};
