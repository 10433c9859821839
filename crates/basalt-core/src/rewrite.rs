//! Greedy pattern rewriting to a fixed point.
//!
//! A `RewritePattern` is tried on every live operation of a function. After
//! any successful rewrite the sweep restarts, until a full sweep applies
//! nothing. The ordering of matches within one sweep is unspecified; each
//! match must be individually sound so the result cannot depend on it.

use crate::ir::{Function, OpId};

/// A rewrite rule rooted at a single operation.
///
/// `match_and_rewrite` returns `Ok(true)` if the function was rewritten,
/// `Ok(false)` if the root did not match (the driver simply moves on), and
/// `Err(_)` only for internal-consistency failures that must abort the pass.
pub trait RewritePattern {
    /// Error type produced by this pattern.
    type Error: From<crate::Error>;

    /// Pattern name (used for logging).
    fn name(&self) -> &str;

    /// Try to match the pattern at `root` and rewrite the function in place.
    fn match_and_rewrite(
        &self,
        func: &mut Function,
        root: OpId,
    ) -> std::result::Result<bool, Self::Error>;
}

/// Apply a set of patterns until none of them matches anywhere.
///
/// Roots are drawn from a structural walk of the function body; operations
/// erased by an earlier rewrite in the same sweep are skipped. Returns
/// `Ok(true)` if any rewrite was applied.
pub fn apply_patterns_greedily<E: From<crate::Error>>(
    func: &mut Function,
    patterns: &[&dyn RewritePattern<Error = E>],
) -> std::result::Result<bool, E> {
    let mut changed_any = false;
    loop {
        let mut changed = false;
        let roots = func.walk(func.entry_block());
        for root in roots {
            for pattern in patterns {
                if !func.is_live(root) {
                    break;
                }
                if pattern.match_and_rewrite(func, root)? {
                    tracing::debug!(pattern = pattern.name(), ?root, "rewrite applied");
                    changed = true;
                    changed_any = true;
                }
            }
        }
        if !changed {
            break;
        }
    }
    Ok(changed_any)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{ConstValue, OpKind, ValueId};
    use crate::types::{DataType, Type};
    use crate::{Error, Result};

    /// Folds `neg(constant)` into a constant; applies at most once per root.
    struct FoldNeg;

    impl RewritePattern for FoldNeg {
        type Error = Error;

        fn name(&self) -> &str {
            "fold-neg"
        }

        fn match_and_rewrite(&self, func: &mut Function, root: OpId) -> Result<bool> {
            let op = func.op(root)?;
            if op.kind != OpKind::Compute("neg".to_string()) {
                return Ok(false);
            }
            let Some(ValueId::Result(operand)) = op.operands.first().copied() else {
                return Ok(false);
            };
            let OpKind::Constant(ConstValue::I64(value)) = &func.op(operand)?.kind else {
                return Ok(false);
            };
            let negated = -*value;
            let folded = func.insert_op_before(
                root,
                OpKind::Constant(ConstValue::I64(negated)),
                vec![],
                Some(Type::Scalar(DataType::I64)),
            )?;
            func.replace_all_uses(ValueId::Result(root), ValueId::Result(folded))?;
            func.erase_op(root)?;
            Ok(true)
        }
    }

    #[test]
    fn test_applies_to_fixed_point() {
        let mut func = Function::new("f");
        let entry = func.entry_block();
        let c = func.append_op(
            entry,
            OpKind::Constant(ConstValue::I64(5)),
            vec![],
            Some(Type::Scalar(DataType::I64)),
        );
        // neg(neg(5)) folds in two rounds.
        let n1 = func.append_op(
            entry,
            OpKind::Compute("neg".to_string()),
            vec![ValueId::Result(c)],
            Some(Type::Scalar(DataType::I64)),
        );
        func.append_op(
            entry,
            OpKind::Compute("neg".to_string()),
            vec![ValueId::Result(n1)],
            Some(Type::Scalar(DataType::I64)),
        );

        let pattern = FoldNeg;
        let patterns: [&dyn RewritePattern<Error = Error>; 1] = [&pattern];
        let changed = apply_patterns_greedily(&mut func, &patterns).unwrap();
        assert!(changed);

        // Everything folded to constants.
        for id in func.walk(entry) {
            assert!(matches!(func.op(id).unwrap().kind, OpKind::Constant(_)));
        }

        // Second run is a no-op.
        let changed = apply_patterns_greedily(&mut func, &patterns).unwrap();
        assert!(!changed);
    }

    #[test]
    fn test_no_match_reports_unchanged() {
        let mut func = Function::new("f");
        let entry = func.entry_block();
        func.append_op(
            entry,
            OpKind::Constant(ConstValue::I64(1)),
            vec![],
            Some(Type::Scalar(DataType::I64)),
        );
        let pattern = FoldNeg;
        let patterns: [&dyn RewritePattern<Error = Error>; 1] = [&pattern];
        assert!(!apply_patterns_greedily(&mut func, &patterns).unwrap());
    }
}
