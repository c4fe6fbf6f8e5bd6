use crate::dual::Dual;
use crate::error::Result;
use crate::float::Float;

impl<F: Float> super::ActiveFunction<F> {
    /// Dense Jacobian at `x` via reverse mode, one adjoint sweep per output.
    ///
    /// Row-major `m × n`: entry `i * n + j` is `∂y_i/∂x_j`.
    pub fn jacobian(&mut self, x: &[F]) -> Result<Vec<F>> {
        self.forward(x)?;
        let n = self.num_inputs();
        let m = self.num_outputs();
        let mut jac = Vec::with_capacity(m * n);
        for k in 0..m {
            jac.extend(self.reverse_output_from(&self.values, k));
        }
        Ok(jac)
    }

    /// Dense Jacobian at `x` via forward mode, one tangent sweep per input.
    ///
    /// Cheaper than [`jacobian`](Self::jacobian) when there are fewer inputs
    /// than outputs. Does not touch the stored values.
    pub fn jacobian_forward(&self, x: &[F]) -> Result<Vec<F>> {
        self.check_inputs(x)?;
        let n = self.num_inputs();
        let m = self.num_outputs();

        let mut jac = vec![F::zero(); m * n];
        let mut dual_inputs: Vec<Dual<F>> = Vec::with_capacity(n);
        let mut dual_vals: Vec<Dual<F>> = Vec::new();

        for col in 0..n {
            dual_inputs.clear();
            dual_inputs.extend(x.iter().enumerate().map(|(i, &xi)| {
                if i == col {
                    Dual::variable(xi)
                } else {
                    Dual::constant(xi)
                }
            }));
            self.forward_tangent(&dual_inputs, &mut dual_vals);

            for (row, &out) in self.output_indices.iter().enumerate() {
                jac[row * n + col] = dual_vals[out as usize].eps;
            }
        }
        Ok(jac)
    }

    /// Jacobian-vector product `J·v` at `x` in a single tangent sweep.
    pub fn jvp(&self, x: &[F], v: &[F]) -> Result<Vec<F>> {
        self.check_inputs(x)?;
        self.check_len("jvp direction", self.num_inputs(), v.len())?;
        let inputs: Vec<Dual<F>> = x.iter().zip(v).map(|(&xi, &vi)| Dual::new(xi, vi)).collect();
        let mut vals = Vec::new();
        self.forward_tangent(&inputs, &mut vals);
        Ok(self
            .output_indices
            .iter()
            .map(|&out| vals[out as usize].eps)
            .collect())
    }
}
