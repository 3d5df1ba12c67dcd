use crate::arena::Arena;
use crate::backend::Backend;
use crate::dims::Dimensions;
use crate::error::{EngineError, EngineResult};
use crate::integrate;
use crate::pruning::{self, Operation};
use crate::resource::Capabilities;
use crate::transition;
use crate::Real;

/// Backend details returned by `initialize_instance`.
#[derive(Debug, Clone)]
pub struct InstanceDetails {
    pub resource_name: String,
    pub implementation_name: &'static str,
    pub flags: Capabilities,
}

/// Owns all buffers and backend state for one handle. Immutable dimensions
/// after creation; everything else is mutated in place.
pub(crate) struct Instance {
    dims: Dimensions,
    arena: Arena,
    backend: Box<dyn Backend>,
    category_rates: Vec<Real>,
}

impl Instance {
    pub fn new(dims: Dimensions, backend: Box<dyn Backend>) -> Self {
        let arena = Arena::new(&dims);
        let category_rates = vec![1.0; dims.rate_count];
        Self {
            dims,
            arena,
            backend,
            category_rates,
        }
    }

    pub fn details(&self) -> InstanceDetails {
        InstanceDetails {
            resource_name: self.backend.name().to_string(),
            implementation_name: "phylo-likelihood-cpu",
            flags: self.backend.capabilities(),
        }
    }

    pub fn set_partials(&mut self, index: usize, values: &[Real]) -> EngineResult<()> {
        self.arena.partials.set(index, values, true)
    }

    pub fn get_partials(&self, index: usize, out: &mut [Real]) -> EngineResult<()> {
        self.arena.partials.get_into(index, out)
    }

    pub fn set_tip_states(&mut self, tip_index: usize, states: &[i32]) -> EngineResult<()> {
        self.arena.compact.set(tip_index, states)
    }

    pub fn set_tip_ambiguity_table(&mut self, table: &[Real]) -> EngineResult<()> {
        self.arena.compact.set_ambiguity_table(table)
    }

    pub fn set_eigen_decomposition(
        &mut self,
        index: usize,
        e: &[Real],
        e_inv: &[Real],
        lambda: &[Real],
    ) -> EngineResult<()> {
        self.arena.eigen.set(index, e, e_inv, lambda)
    }

    pub fn set_transition_matrix(&mut self, index: usize, values: &[Real]) -> EngineResult<()> {
        self.arena.matrices.set(index, values)
    }

    pub fn set_category_rates(&mut self, rates: &[Real]) -> EngineResult<()> {
        if rates.len() != self.dims.rate_count {
            return Err(EngineError::OutOfRange {
                what: "category rates length",
                index: rates.len() as i64,
                bound: self.dims.rate_count,
            });
        }
        self.category_rates = rates.to_vec();
        Ok(())
    }

    pub fn update_transition_matrices(
        &mut self,
        eigen_index: usize,
        probability_indices: &[usize],
        first_derivative_indices: Option<&[usize]>,
        second_derivative_indices: Option<&[usize]>,
        edge_lengths: &[Real],
    ) -> EngineResult<()> {
        transition::update_transition_matrices(
            &self.arena.eigen,
            &mut self.arena.matrices,
            &self.category_rates,
            eigen_index,
            probability_indices,
            first_derivative_indices,
            second_derivative_indices,
            edge_lengths,
        )
    }

    pub fn update_partials(&mut self, operations: &[Operation], rescale: bool) -> EngineResult<()> {
        pruning::update_partials(&self.dims, self.backend.as_ref(), &mut self.arena, operations, rescale)
    }

    /// Scalar/vectorized CPU backends complete synchronously inside
    /// `update_partials`; `wait_for_partials` only validates the indices.
    pub fn wait_for_partials(&self, indices: &[usize]) -> EngineResult<()> {
        for &index in indices {
            if index >= self.dims.partials_count {
                return Err(EngineError::OutOfRange {
                    what: "wait_for_partials index",
                    index: index as i64,
                    bound: self.dims.partials_count,
                });
            }
        }
        Ok(())
    }

    pub fn calculate_root_log_likelihoods(
        &self,
        buffer_indices: &[usize],
        weights: &[Real],
        state_frequencies: &[Real],
        out: &mut [Real],
    ) -> EngineResult<()> {
        integrate::calculate_root_log_likelihoods(
            &self.dims,
            &self.arena,
            buffer_indices,
            weights,
            state_frequencies,
            out,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn calculate_edge_log_likelihoods(
        &self,
        parent: &[usize],
        child: &[usize],
        prob_idx: &[usize],
        first_deriv_idx: Option<&[usize]>,
        second_deriv_idx: Option<&[usize]>,
        weights: &[Real],
        frequencies: &[Real],
        out: &mut [Real],
        out_d1: Option<&mut [Real]>,
        out_d2: Option<&mut [Real]>,
    ) -> EngineResult<()> {
        integrate::calculate_edge_log_likelihoods(
            &self.dims, &self.arena, parent, child, prob_idx, first_deriv_idx,
            second_deriv_idx, weights, frequencies, out, out_d1, out_d2,
        )
    }
}
