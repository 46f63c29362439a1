//! REST API surface for funnel and goal analytics.

pub mod funnel_rest;
pub mod goal_rest;
pub mod rest;
pub mod server;

pub use rest::AppState;
pub use server::ApiServer;
