use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::float::Float;
use crate::opcode::{OpCode, UNUSED};

use super::ActiveFunction;

impl<F: Float + Serialize> Serialize for ActiveFunction<F> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ActiveFunction", 6)?;
        s.serialize_field("opcodes", &self.opcodes)?;
        s.serialize_field("arg_indices", &self.arg_indices)?;
        s.serialize_field("values", &self.values)?;
        s.serialize_field("num_inputs", &self.num_inputs)?;
        s.serialize_field("num_variables", &self.num_variables)?;
        s.serialize_field("output_indices", &self.output_indices)?;
        s.end()
    }
}

impl<'de, F: Float + Deserialize<'de>> Deserialize<'de> for ActiveFunction<F> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct FunctionData<F> {
            opcodes: Vec<OpCode>,
            arg_indices: Vec<[u32; 2]>,
            values: Vec<F>,
            num_inputs: u32,
            num_variables: u32,
            #[serde(default)]
            output_indices: Vec<u32>,
        }

        let data = FunctionData::<F>::deserialize(deserializer)?;
        let n = data.opcodes.len();
        if data.arg_indices.len() != n || data.values.len() != n || data.num_variables as usize != n {
            return Err(serde::de::Error::custom("inconsistent node counts"));
        }
        if data.num_inputs as usize > n || data.output_indices.iter().any(|&o| o as usize >= n) {
            return Err(serde::de::Error::custom("node index out of range"));
        }
        for (i, (&op, &[a, b])) in data.opcodes.iter().zip(&data.arg_indices).enumerate() {
            let is_input_slot = i < data.num_inputs as usize;
            if (op == OpCode::Input) != is_input_slot {
                return Err(serde::de::Error::custom("inputs must lead the node list"));
            }
            let leaf = matches!(op, OpCode::Input | OpCode::Const);
            if leaf && (a != UNUSED || b != UNUSED) {
                return Err(serde::de::Error::custom("leaf node has operands"));
            }
            if !leaf && (a as usize >= i || (op.is_binary() && b as usize >= i)) {
                return Err(serde::de::Error::custom("operand does not precede its node"));
            }
        }
        Ok(ActiveFunction {
            opcodes: data.opcodes,
            arg_indices: data.arg_indices,
            values: data.values,
            num_inputs: data.num_inputs,
            num_variables: data.num_variables,
            output_indices: data.output_indices,
        })
    }
}
