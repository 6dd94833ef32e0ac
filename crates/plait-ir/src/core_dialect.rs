//! Core op kinds every registry carries.
//!
//! - `placeholder`: an external graph input; its type is the `type` attribute.
//! - `output`: the graph's output sentinel; one operand gives that operand's
//!   type, any other count gives a tuple over them.
//! - `get_element`: projects element `index` out of a tuple-typed operand.

use crate::error::TypeError;
use crate::infer::InferCx;
use crate::registry::{Arity, OpKind};
use crate::types::TypeNotation;

pub struct Placeholder;

impl OpKind for Placeholder {
    const NAMESPACE: &'static str = "";
    const NAME: &'static str = "placeholder";
    const ARITY: Arity = Arity::Fixed(0);

    fn infer_type(cx: &InferCx<'_>) -> Result<TypeNotation, TypeError> {
        Ok(cx.type_attr("type")?.clone())
    }
}

pub struct Output;

impl OpKind for Output {
    const NAMESPACE: &'static str = "";
    const NAME: &'static str = "output";
    const ARITY: Arity = Arity::Variadic;

    fn infer_type(cx: &InferCx<'_>) -> Result<TypeNotation, TypeError> {
        match cx.operands() {
            [single] => Ok(single.clone()),
            many => Ok(TypeNotation::tuple(many.iter().cloned())),
        }
    }
}

pub struct GetElement;

impl OpKind for GetElement {
    const NAMESPACE: &'static str = "";
    const NAME: &'static str = "get_element";
    const ARITY: Arity = Arity::Fixed(1);

    fn infer_type(cx: &InferCx<'_>) -> Result<TypeNotation, TypeError> {
        let TypeNotation::Tuple { types } = cx.operand(0)? else {
            return Err(cx.kind_error(0, "a tuple"));
        };
        let index = cx.int_attr("index")?;
        usize::try_from(index)
            .ok()
            .and_then(|i| types.get(i))
            .cloned()
            .ok_or_else(|| {
                cx.invalid(format!(
                    "index {index} is out of range for a tuple of {} elements",
                    types.len()
                ))
            })
    }
}
