use std::collections::HashMap;

use crate::float::Float;
use crate::opcode::{OpCode, UNUSED};

impl<F: Float> super::ActiveFunction<F> {
    /// Operand node indices of node `i` (the `Powi` exponent is not a node).
    #[inline]
    fn node_operands(&self, i: usize) -> impl Iterator<Item = u32> {
        let op = self.opcodes[i];
        let [a, b] = self.arg_indices[i];
        let a = (a != UNUSED).then_some(a);
        let b = op.is_binary().then_some(b);
        a.into_iter().chain(b)
    }

    /// Keep only nodes reachable from the outputs, compacting in place.
    /// Inputs always survive. Returns the old-to-new index remap.
    fn dce_compact(&mut self) -> Vec<u32> {
        let n = self.opcodes.len();
        let mut live = vec![false; n];
        live[..self.num_inputs()].fill(true);

        let mut pending = self.output_indices.clone();
        while let Some(idx) = pending.pop() {
            let i = idx as usize;
            if live[i] {
                continue;
            }
            live[i] = true;
            pending.extend(self.node_operands(i));
        }

        let mut remap = vec![UNUSED; n];
        let mut write = 0usize;
        for read in 0..n {
            if !live[read] {
                continue;
            }
            remap[read] = write as u32;
            let op = self.opcodes[read];
            let [a, b] = self.arg_indices[read];
            let a = if a == UNUSED { a } else { remap[a as usize] };
            let b = if op.is_binary() { remap[b as usize] } else { b };
            self.opcodes[write] = op;
            self.values[write] = self.values[read];
            self.arg_indices[write] = [a, b];
            write += 1;
        }

        self.opcodes.truncate(write);
        self.arg_indices.truncate(write);
        self.values.truncate(write);
        self.num_variables = write as u32;
        for out in &mut self.output_indices {
            *out = remap[*out as usize];
        }
        remap
    }

    /// Remove nodes that no output depends on.
    pub fn dead_code_elimination(&mut self) {
        self.dce_compact();
    }

    /// Common subexpression elimination.
    ///
    /// Nodes with the same opcode and operands (in either order for
    /// commutative ops) collapse onto the first occurrence; the duplicates
    /// are then removed by dead code elimination.
    pub fn cse(&mut self) {
        let n = self.opcodes.len();
        let mut seen: HashMap<(OpCode, u32, u32), u32> = HashMap::new();
        let mut canonical: Vec<u32> = (0..n as u32).collect();

        for i in 0..n {
            let op = self.opcodes[i];
            if matches!(op, OpCode::Input | OpCode::Const) {
                continue;
            }
            let [a, b] = self.arg_indices[i];
            let a = canonical[a as usize];
            let b = if op.is_binary() { canonical[b as usize] } else { b };
            self.arg_indices[i] = [a, b];

            let key = if op.is_commutative() && b < a {
                (op, b, a)
            } else {
                (op, a, b)
            };
            match seen.get(&key) {
                Some(&first) => canonical[i] = first,
                None => {
                    seen.insert(key, i as u32);
                }
            }
        }

        for out in &mut self.output_indices {
            *out = canonical[*out as usize];
        }
        self.dce_compact();
    }

    /// CSE followed by dead code elimination.
    pub fn optimize(&mut self) {
        let before = self.num_ops();
        self.cse();
        self.dead_code_elimination();
        log::debug!("optimized function graph: {before} -> {} nodes", self.num_ops());

        #[cfg(debug_assertions)]
        self.validate();
    }

    #[cfg(debug_assertions)]
    fn validate(&self) {
        let n = self.opcodes.len();
        for i in 0..n {
            match self.opcodes[i] {
                OpCode::Input | OpCode::Const => {
                    assert_eq!(self.arg_indices[i], [UNUSED, UNUSED], "leaf node {i} has operands");
                }
                _ => {
                    for arg in self.node_operands(i) {
                        assert!((arg as usize) < i, "operand {arg} not before node {i}");
                    }
                }
            }
        }
        for &out in &self.output_indices {
            assert!((out as usize) < n, "output {out} out of bounds ({n} nodes)");
        }
        let inputs = self.opcodes.iter().filter(|&&op| op == OpCode::Input).count();
        assert_eq!(inputs, self.num_inputs(), "input count changed");
    }
}
