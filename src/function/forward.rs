use crate::error::Result;
use crate::float::Float;
use crate::opcode::{self, OpCode};

impl<F: Float> super::ActiveFunction<F> {
    /// Re-evaluate every node at new inputs.
    ///
    /// Overwrites the stored values in place; read the results with
    /// [`output_values`](Self::output_values).
    pub fn forward(&mut self, x: &[F]) -> Result<()> {
        self.check_inputs(x)?;
        self.values[..x.len()].copy_from_slice(x);

        for i in 0..self.opcodes.len() {
            match self.opcodes[i] {
                OpCode::Input | OpCode::Const => continue,
                op => {
                    let (a, b) = self.operands(i, &self.values);
                    self.values[i] = opcode::eval_forward(op, a, b);
                }
            }
        }
        Ok(())
    }

    /// Evaluate at `x` into an external buffer, leaving the graph untouched.
    ///
    /// `x` must already have the right length.
    #[cfg(feature = "parallel")]
    pub(crate) fn forward_into(&self, x: &[F], buf: &mut Vec<F>) {
        debug_assert_eq!(x.len(), self.num_inputs());
        buf.clear();
        buf.extend_from_slice(&self.values);
        buf[..x.len()].copy_from_slice(x);

        for i in 0..self.opcodes.len() {
            match self.opcodes[i] {
                OpCode::Input | OpCode::Const => continue,
                op => {
                    let (a, b) = self.operands(i, &buf[..]);
                    buf[i] = opcode::eval_forward(op, a, b);
                }
            }
        }
    }

    /// Evaluate at `x` and return the outputs.
    pub fn eval(&mut self, x: &[F]) -> Result<Vec<F>> {
        self.forward(x)?;
        Ok(self.output_values())
    }
}
