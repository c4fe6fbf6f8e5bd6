use rayon::prelude::*;

use crate::dual::Dual;
use crate::error::Result;
use crate::float::Float;

impl<F: Float> super::ActiveFunction<F> {
    /// [`gradient`](Self::gradient) through a shared reference, evaluating
    /// into a private buffer.
    pub fn gradient_par(&self, x: &[F]) -> Result<Vec<F>> {
        self.check_inputs(x)?;
        self.require_outputs()?;
        let mut values = Vec::new();
        self.forward_into(x, &mut values);
        Ok(self.reverse_output_from(&values, 0))
    }

    /// [`jacobian`](Self::jacobian) with the per-output sweeps spread over
    /// the rayon pool. Row-major `m × n`.
    pub fn jacobian_par(&self, x: &[F]) -> Result<Vec<F>> {
        self.check_inputs(x)?;
        let mut values = Vec::new();
        self.forward_into(x, &mut values);

        let rows: Vec<Vec<F>> = (0..self.num_outputs())
            .into_par_iter()
            .map(|k| self.reverse_output_from(&values, k))
            .collect();
        Ok(rows.concat())
    }

    /// [`hessian`](Self::hessian) with one Hessian-vector product per rayon
    /// task. Row-major `n × n`.
    pub fn hessian_par(&self, x: &[F]) -> Result<Vec<F>> {
        self.check_inputs(x)?;
        self.require_outputs()?;
        let n = self.num_inputs();
        let mut seeds = vec![Dual::constant(F::zero()); self.num_outputs()];
        seeds[0] = Dual::constant(F::one());

        let cols: Vec<Vec<F>> = (0..n)
            .into_par_iter()
            .map(|j| {
                let inputs: Vec<Dual<F>> = x
                    .iter()
                    .enumerate()
                    .map(|(i, &xi)| if i == j { Dual::variable(xi) } else { Dual::constant(xi) })
                    .collect();
                let mut vals = Vec::new();
                let mut adjoints = Vec::new();
                self.forward_tangent(&inputs, &mut vals);
                self.reverse_tangent(&vals, &seeds, &mut adjoints);
                adjoints[..n].iter().map(|d| d.eps).collect()
            })
            .collect();

        let mut hess = vec![F::zero(); n * n];
        for (j, col) in cols.iter().enumerate() {
            for (i, &h) in col.iter().enumerate() {
                hess[i * n + j] = h;
            }
        }
        Ok(hess)
    }
}
