//! Build functions programmatically.
//!
//! `FunctionBuilder` keeps an insertion point (a stack of blocks) and appends
//! operations to the innermost open block. Loop and conditional constructs
//! are opened and closed with `begin_*`/`end_*` pairs.

use crate::ir::{ConstValue, Function, OpKind, ValueId};
use crate::types::{BufferType, DataType, Type};
use crate::{Error, Result};

/// Builder for a single function.
pub struct FunctionBuilder {
    func: Function,

    /// Insertion stack; the last entry is the current block.
    stack: Vec<crate::ir::BlockId>,
}

impl FunctionBuilder {
    /// Create a builder for a new function.
    pub fn new(name: impl Into<String>) -> Self {
        let func = Function::new(name);
        let entry = func.entry_block();
        Self {
            func,
            stack: vec![entry],
        }
    }

    fn current_block(&self) -> crate::ir::BlockId {
        // The entry block is never popped, so the stack is never empty.
        self.stack[self.stack.len() - 1]
    }

    /// Look up the type of a value.
    fn value_type(&self, value: ValueId) -> Result<Type> {
        match value {
            ValueId::Result(op) => self
                .func
                .op(op)?
                .result_type
                .clone()
                .ok_or_else(|| Error::InvalidType(format!("Op {:?} has no result", op))),
            ValueId::Arg(block, index) => self
                .func
                .block(block)
                .args
                .get(index as usize)
                .cloned()
                .ok_or_else(|| {
                    Error::InvalidType(format!("Block {:?} has no argument {}", block, index))
                }),
        }
    }

    /// Allocate a byte pool of the given size in the current block.
    pub fn alloc_pool(&mut self, size: i64) -> ValueId {
        let block = self.current_block();
        let id = self.func.append_op(
            block,
            OpKind::AllocPool,
            vec![],
            Some(Type::Buffer(BufferType::bytes(size))),
        );
        ValueId::Result(id)
    }

    /// Create a typed view into a pool at a constant byte offset.
    pub fn make_view(&mut self, pool: ValueId, offset: i64, ty: BufferType) -> Result<ValueId> {
        match self.value_type(pool)? {
            Type::Buffer(pool_type) if pool_type.is_byte_pool() => {}
            other => {
                return Err(Error::InvalidType(format!(
                    "View must reference a byte pool, got {:?}",
                    other
                )));
            }
        }
        let block = self.current_block();
        let id = self.func.append_op(
            block,
            OpKind::MakeView { offset },
            vec![pool],
            Some(Type::Buffer(ty)),
        );
        Ok(ValueId::Result(id))
    }

    /// Emit an integer constant.
    pub fn constant_i64(&mut self, value: i64) -> ValueId {
        let block = self.current_block();
        let id = self.func.append_op(
            block,
            OpKind::Constant(ConstValue::I64(value)),
            vec![],
            Some(Type::Scalar(DataType::I64)),
        );
        ValueId::Result(id)
    }

    /// Emit a float constant.
    pub fn constant_f32(&mut self, value: f32) -> ValueId {
        let block = self.current_block();
        let id = self.func.append_op(
            block,
            OpKind::Constant(ConstValue::F32(value)),
            vec![],
            Some(Type::Scalar(DataType::F32)),
        );
        ValueId::Result(id)
    }

    /// Emit an opaque compute operation.
    pub fn compute(&mut self, name: &str, operands: Vec<ValueId>, ty: Type) -> ValueId {
        let block = self.current_block();
        let id = self
            .func
            .append_op(block, OpKind::Compute(name.to_string()), operands, Some(ty));
        ValueId::Result(id)
    }

    /// Load a scalar from a view.
    pub fn load(&mut self, view: ValueId, indices: &[ValueId]) -> Result<ValueId> {
        let elem = match self.value_type(view)? {
            Type::Buffer(buffer) => buffer.elem,
            other => {
                return Err(Error::InvalidType(format!(
                    "Load source must be a buffer, got {:?}",
                    other
                )));
            }
        };
        let mut operands = vec![view];
        operands.extend_from_slice(indices);
        let block = self.current_block();
        let id = self
            .func
            .append_op(block, OpKind::Load, operands, Some(Type::Scalar(elem)));
        Ok(ValueId::Result(id))
    }

    /// Store a scalar into a view.
    pub fn store(&mut self, value: ValueId, view: ValueId, indices: &[ValueId]) -> Result<()> {
        if self.value_type(view)?.as_buffer().is_none() {
            return Err(Error::InvalidType(
                "Store target must be a buffer".to_string(),
            ));
        }
        let mut operands = vec![value, view];
        operands.extend_from_slice(indices);
        let block = self.current_block();
        self.func.append_op(block, OpKind::Store, operands, None);
        Ok(())
    }

    /// Open an iteration construct; returns the induction variable.
    ///
    /// Operations emitted until the matching `end_loop()` land in the body.
    pub fn begin_loop(&mut self, trip_count: i64) -> Result<ValueId> {
        let block = self.current_block();
        let loop_op = self
            .func
            .append_op(block, OpKind::Loop { trip_count }, vec![], None);
        let region = self.func.add_region(Some(loop_op))?;
        let body = self
            .func
            .add_block(region, vec![Type::Scalar(DataType::I64)]);
        self.stack.push(body);
        Ok(ValueId::Arg(body, 0))
    }

    /// Close the innermost open loop.
    pub fn end_loop(&mut self) -> Result<()> {
        if self.stack.len() < 2 {
            return Err(Error::InvalidGraph("No open loop to end".to_string()));
        }
        self.stack.pop();
        Ok(())
    }

    /// Open a conditional construct.
    pub fn begin_cond(&mut self, condition: ValueId) -> Result<()> {
        let block = self.current_block();
        let cond_op = self
            .func
            .append_op(block, OpKind::Cond, vec![condition], None);
        let region = self.func.add_region(Some(cond_op))?;
        let body = self.func.add_block(region, vec![]);
        self.stack.push(body);
        Ok(())
    }

    /// Close the innermost open conditional.
    pub fn end_cond(&mut self) -> Result<()> {
        if self.stack.len() < 2 {
            return Err(Error::InvalidGraph("No open conditional to end".to_string()));
        }
        self.stack.pop();
        Ok(())
    }

    /// Emit the function terminator.
    pub fn ret(&mut self, operands: Vec<ValueId>) {
        let block = self.current_block();
        self.func.append_op(block, OpKind::Return, operands, None);
    }

    /// Finish building and take the function.
    pub fn finish(self) -> Function {
        self.func
    }
}
