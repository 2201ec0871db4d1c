//! The Nippo report pipeline.
//!
//! A request flows through three stages:
//! - [`plan`] derives the query strategy from the draft
//! - [`collect`] runs the tool-calling collector agent and [`normalize`]s
//!   whatever it returned into typed signals, which [`summarize`] bounds
//! - [`format`] renders the report from the template, then [`sanitize`]s it
//!
//! [`workflow::ReportWorkflow`] sequences the stages.

pub mod collect;
pub mod format;
pub mod normalize;
pub mod plan;
pub mod sanitize;
pub mod summarize;
pub mod workflow;

pub use collect::{Collector, RetryPolicy};
pub use format::Formatter;
pub use plan::build_plan;
pub use summarize::{SummaryLimits, summarize};
pub use workflow::{ReportOutcome, ReportWorkflow, Stage};
