use crate::error::Result;
use crate::float::Float;
use crate::opcode::{self, OpCode};

impl<F: Float> super::ActiveFunction<F> {
    /// Core adjoint loop over pre-seeded `adjoints`, reading primal values
    /// from `values` (the graph's own or an external buffer).
    ///
    /// Each node's adjoint is propagated to its operands and then cleared.
    pub(super) fn reverse_sweep_core(&self, adjoints: &mut [F], values: &[F]) {
        for i in (0..self.opcodes.len()).rev() {
            let adj = adjoints[i];
            if adj == F::zero() {
                continue;
            }
            match self.opcodes[i] {
                OpCode::Input | OpCode::Const => continue,
                op => {
                    adjoints[i] = F::zero();
                    let [a_idx, b_idx] = self.arg_indices[i];
                    let (a, b) = self.operands(i, values);
                    let (da, db) = opcode::reverse_partials(op, a, b, values[i]);

                    adjoints[a_idx as usize] = adjoints[a_idx as usize] + da * adj;
                    if op.is_binary() {
                        adjoints[b_idx as usize] = adjoints[b_idx as usize] + db * adj;
                    }
                }
            }
        }
    }

    /// Adjoint sweep seeded with weight `seeds[k]` on output `k`, over the
    /// values of the most recent evaluation. Returns input adjoints.
    pub(super) fn reverse_seeded_from(&self, values: &[F], seeds: &[F]) -> Vec<F> {
        let mut adjoints = vec![F::zero(); self.num_variables as usize];
        for (&out, &w) in self.output_indices.iter().zip(seeds) {
            adjoints[out as usize] = adjoints[out as usize] + w;
        }
        self.reverse_sweep_core(&mut adjoints, values);
        adjoints.truncate(self.num_inputs());
        adjoints
    }

    /// Input adjoints for a unit seed on output `k`, reading `values`.
    pub(super) fn reverse_output_from(&self, values: &[F], k: usize) -> Vec<F> {
        let mut adjoints = vec![F::zero(); self.num_variables as usize];
        adjoints[self.output_indices[k] as usize] = F::one();
        self.reverse_sweep_core(&mut adjoints, values);
        adjoints.truncate(self.num_inputs());
        adjoints
    }

    /// Gradient of the first output at `x`.
    pub fn gradient(&mut self, x: &[F]) -> Result<Vec<F>> {
        self.require_outputs()?;
        self.forward(x)?;
        Ok(self.reverse_output_from(&self.values, 0))
    }

    /// Vector-Jacobian product `wᵀ·J` at `x`.
    pub fn vjp(&mut self, x: &[F], w: &[F]) -> Result<Vec<F>> {
        self.check_len("vjp weights", self.num_outputs(), w.len())?;
        self.forward(x)?;
        Ok(self.reverse_seeded_from(&self.values, w))
    }
}
