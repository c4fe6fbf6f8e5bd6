use num_traits::Float as NumFloat;

use crate::dual::Dual;
use crate::error::Result;
use crate::float::{Float, IsAllZero};
use crate::opcode::{self, OpCode};

impl<F: Float> super::ActiveFunction<F> {
    // ── Forward-over-reverse ──

    /// Forward sweep over tangent-carrying numbers, written into `buf`.
    ///
    /// Generic over `T` so the same sweep runs on [`Dual`] numbers for
    /// directional derivatives. Does not touch the stored values.
    pub(crate) fn forward_tangent<T: NumFloat>(&self, inputs: &[T], buf: &mut Vec<T>) {
        debug_assert_eq!(inputs.len(), self.num_inputs());
        buf.clear();
        buf.resize(self.num_variables as usize, T::zero());

        for i in 0..self.opcodes.len() {
            match self.opcodes[i] {
                OpCode::Input => buf[i] = inputs[i],
                OpCode::Const => {
                    buf[i] = T::from(self.values[i]).unwrap_or_else(T::nan);
                }
                op => {
                    let (a, b) = self.operands(i, &buf[..]);
                    buf[i] = opcode::eval_forward(op, a, b);
                }
            }
        }
    }

    /// Adjoint sweep over tangent-carrying numbers, seeded with `seeds[k]`
    /// on output `k`. Reads values from
    /// [`forward_tangent`](Self::forward_tangent); adjoints land in `buf`.
    ///
    /// A node is skipped only when both parts of its adjoint are zero, so no
    /// tangent contribution is dropped.
    pub(crate) fn reverse_tangent<T: NumFloat + IsAllZero>(
        &self,
        tangent_vals: &[T],
        seeds: &[T],
        buf: &mut Vec<T>,
    ) {
        buf.clear();
        buf.resize(self.num_variables as usize, T::zero());
        for (&out, &w) in self.output_indices.iter().zip(seeds) {
            buf[out as usize] = buf[out as usize] + w;
        }

        for i in (0..self.opcodes.len()).rev() {
            let op = self.opcodes[i];
            if matches!(op, OpCode::Input | OpCode::Const) {
                continue;
            }
            let adj = buf[i];
            if adj.is_all_zero() {
                continue;
            }
            buf[i] = T::zero();

            let [a_idx, b_idx] = self.arg_indices[i];
            let (a, b) = self.operands(i, tangent_vals);
            let (da, db) = opcode::reverse_partials(op, a, b, tangent_vals[i]);

            buf[a_idx as usize] = buf[a_idx as usize] + da * adj;
            if op.is_binary() {
                buf[b_idx as usize] = buf[b_idx as usize] + db * adj;
            }
        }
    }

    fn hvp_weighted_with_bufs(
        &self,
        x: &[F],
        v: &[F],
        seeds: &[Dual<F>],
        dual_vals: &mut Vec<Dual<F>>,
        adjoints: &mut Vec<Dual<F>>,
    ) {
        let inputs: Vec<Dual<F>> = x.iter().zip(v).map(|(&xi, &vi)| Dual::new(xi, vi)).collect();
        self.forward_tangent(&inputs, dual_vals);
        self.reverse_tangent(dual_vals, seeds, adjoints);
    }

    fn output_seeds(&self, weights: &[F]) -> Vec<Dual<F>> {
        weights.iter().map(|&w| Dual::constant(w)).collect()
    }

    fn first_output_seed(&self) -> Vec<Dual<F>> {
        let mut seeds = vec![Dual::constant(F::zero()); self.num_outputs()];
        seeds[0] = Dual::constant(F::one());
        seeds
    }

    /// Hessian-vector product of the first output.
    ///
    /// Returns `(gradient, H·v)`, both of length
    /// [`num_inputs`](Self::num_inputs). Does not touch the stored values.
    pub fn hvp(&self, x: &[F], v: &[F]) -> Result<(Vec<F>, Vec<F>)> {
        self.check_inputs(x)?;
        self.check_len("hvp direction", self.num_inputs(), v.len())?;
        self.require_outputs()?;

        let seeds = self.first_output_seed();
        let mut dual_vals = Vec::new();
        let mut adjoints = Vec::new();
        self.hvp_weighted_with_bufs(x, v, &seeds, &mut dual_vals, &mut adjoints);

        let n = self.num_inputs();
        let gradient = adjoints[..n].iter().map(|d| d.re).collect();
        let hv = adjoints[..n].iter().map(|d| d.eps).collect();
        Ok((gradient, hv))
    }

    /// Dense Hessian of the first output at `x`, via one Hessian-vector
    /// product per input.
    ///
    /// Row-major `n × n`: entry `i * n + j` is `∂²y_0/∂x_i∂x_j`.
    pub fn hessian(&self, x: &[F]) -> Result<Vec<F>> {
        self.require_outputs()?;
        let seeds = self.first_output_seed();
        self.hessian_seeded(x, &seeds)
    }

    /// Hessian of `Σ_k w[k]·y_k` at `x`, row-major `n × n`.
    pub fn hessian_weighted(&self, x: &[F], w: &[F]) -> Result<Vec<F>> {
        self.check_len("hessian weights", self.num_outputs(), w.len())?;
        let seeds = self.output_seeds(w);
        self.hessian_seeded(x, &seeds)
    }

    fn hessian_seeded(&self, x: &[F], seeds: &[Dual<F>]) -> Result<Vec<F>> {
        self.check_inputs(x)?;
        let n = self.num_inputs();
        let mut hess = vec![F::zero(); n * n];
        let mut dir = vec![F::zero(); n];
        let mut dual_vals = Vec::new();
        let mut adjoints = Vec::new();

        for j in 0..n {
            dir[j] = F::one();
            self.hvp_weighted_with_bufs(x, &dir, seeds, &mut dual_vals, &mut adjoints);
            dir[j] = F::zero();
            for i in 0..n {
                hess[i * n + j] = adjoints[i].eps;
            }
        }
        Ok(hess)
    }
}
