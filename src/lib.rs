//! Phylogenetic likelihood compute engine.
//!
//! Given an evolutionary tree (as a client-supplied operation schedule), an
//! alignment of tip states, and a continuous-time Markov substitution model
//! (as a cached eigendecomposition), this crate evaluates the per-pattern
//! log-likelihood of the data: eigendecomposition -> transition matrices ->
//! Felsenstein pruning -> rate/frequency integration, with numerical
//! rescaling along the way to keep the recursion in range on deep trees.
//!
//! No tree topology is stored here. Callers drive the engine with explicit
//! buffer handles and operation schedules (see [`engine`]); topology
//! management, alignment parsing, and MCMC proposal mechanics live upstream.

mod arena;
mod backend;
mod dims;
mod engine;
mod error;
mod instance;
mod integrate;
mod pruning;
mod registry;
mod resource;
mod transition;

pub use engine::Engine;
pub use engine::{
    calculate_edge_log_likelihoods, calculate_root_log_likelihoods, create_instance, finalize,
    get_partials, get_resource_list, initialize_instance, set_category_rates,
    set_eigen_decomposition, set_partials, set_tip_ambiguity_table, set_tip_states,
    set_transition_matrix, update_partials, update_transition_matrices, wait_for_partials,
};
pub use error::ErrorCode;
pub use instance::InstanceDetails;
pub use pruning::Operation;
pub use resource::{Capabilities, Resource};

/// Process-wide instance handle. Opaque; never interpret as a pointer.
pub type Handle = i64;

/// Host-side floating point representation. All public API arrays are
/// double precision row-major as specified; backends may carry a narrower
/// internal representation and convert on `set_partials`/`get_partials`.
pub type Real = f64;
