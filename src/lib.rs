//! Stochastic graph coloring engine: random-trial searches, a greedy local
//! search, recoloring impact analysis and a force-directed layout, driven
//! incrementally by execution sessions.

// #![warn(clippy::all, clippy::pedantic)]
// useful additional warnings if crates imported but unused, etc.
#![warn(missing_debug_implementations)]
#![warn(trivial_casts, trivial_numeric_casts)]
#![warn(unsafe_code)]
#![warn(unused_extern_crates)]

// not sure if already by default in clippy
#![warn(clippy::similar_names)]
#![warn(clippy::shadow_unrelated)]


/// graph, colors and assignments
pub mod color;

/// error type of the engine
pub mod error;

/// conflict evaluation
pub mod conflict;

/// coloring strategies (Las Vegas, Monte Carlo, local search)
pub mod search;

/// impact of a manual recoloring
pub mod impact;

/// force-directed layout
pub mod layout;

/// engine configuration
pub mod config;

/// execution sessions (background and paced runs)
pub mod session;

/// read DIMACS instances
pub mod dimacs;

/// helper and utility methods for executables
pub mod util;
