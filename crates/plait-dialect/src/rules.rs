//! Shape rules shared by the tensor dialects.
//!
//! Scalars take part in numeric ops as rank-0 values whose element type
//! adapts to the other operand, so `mul(float_scalar, tensor)` is well typed
//! whatever the tensor's element type is. Two tensors must agree on their
//! element type.

use plait_ir::{InferCx, TypeError, TypeNotation};

/// A numeric operand seen as a shape plus an element type.
pub(crate) struct Numeric<'a> {
    pub shape: &'a [u64],
    pub element: &'a TypeNotation,
    pub is_scalar: bool,
}

pub(crate) fn numeric<'a>(cx: &InferCx<'a>, index: usize) -> Result<Numeric<'a>, TypeError> {
    match cx.operand(index)? {
        ty @ TypeNotation::Scalar { .. } => Ok(Numeric {
            shape: &[],
            element: ty,
            is_scalar: true,
        }),
        TypeNotation::Tensor { shape, element } => Ok(Numeric {
            shape,
            element,
            is_scalar: false,
        }),
        _ => Err(cx.kind_error(index, "a scalar or tensor")),
    }
}

/// Result type of an elementwise binary op over two numeric values.
pub(crate) fn combine(
    cx: &InferCx<'_>,
    lhs: &Numeric<'_>,
    rhs: &Numeric<'_>,
) -> Result<TypeNotation, TypeError> {
    let element = match (lhs.is_scalar, rhs.is_scalar) {
        (true, false) => rhs.element.clone(),
        (false, true) => lhs.element.clone(),
        _ => cx.same_element(lhs.element, rhs.element)?,
    };
    if lhs.is_scalar && rhs.is_scalar {
        return Ok(element);
    }
    let shape = cx.broadcast(lhs.shape, rhs.shape)?;
    Ok(TypeNotation::tensor(shape, element))
}

/// Elementwise binary op on operands 0 and 1.
pub(crate) fn binary(cx: &InferCx<'_>) -> Result<TypeNotation, TypeError> {
    cx.expect_operands(2)?;
    combine(cx, &numeric(cx, 0)?, &numeric(cx, 1)?)
}

/// The operand's own type, which must be numeric.
pub(crate) fn unary(cx: &InferCx<'_>) -> Result<TypeNotation, TypeError> {
    cx.expect_operands(1)?;
    numeric(cx, 0)?;
    Ok(cx.operands()[0].clone())
}

/// Matrix product of operands `lhs` and `rhs`, broadcasting batch dims.
pub(crate) fn mat_mul(
    cx: &InferCx<'_>,
    lhs: usize,
    rhs: usize,
) -> Result<TypeNotation, TypeError> {
    let (a, a_element) = cx.tensor(lhs)?;
    let (b, b_element) = cx.tensor(rhs)?;
    let element = cx.same_element(a_element, b_element)?;
    let (Some((a_batch, &[m, k])), Some((b_batch, &[k2, n]))) =
        (a.split_last_chunk::<2>(), b.split_last_chunk::<2>())
    else {
        return Err(cx.invalid(format!(
            "matrix operands need at least 2 dimensions, got rank {} and {}",
            a.len(),
            b.len()
        )));
    };
    if k != k2 {
        return Err(cx.invalid(format!("contracted dimensions differ: {k} vs {k2}")));
    }
    let mut shape = cx.broadcast(a_batch, b_batch)?;
    shape.extend([m, n]);
    Ok(TypeNotation::tensor(shape, element))
}

/// `beta * bias + alpha * (mat1 @ mat2)` with the bias in slot 0, which may
/// be absent.
pub(crate) fn add_mm(cx: &InferCx<'_>) -> Result<TypeNotation, TypeError> {
    cx.expect_operands(3)?;
    for key in ["beta", "alpha"] {
        if cx.attr(key).and_then(|attr| attr.as_f64()).is_none() {
            return Err(TypeError::MissingAttribute {
                op: cx.op(),
                key: key.to_owned(),
            });
        }
    }
    let product = mat_mul(cx, 1, 2)?;
    if cx.operands()[0].is_none() {
        return Ok(product);
    }
    let bias = numeric(cx, 0)?;
    let Some((shape, element)) = product.as_tensor() else {
        return Err(cx.invalid("matrix product is not a tensor"));
    };
    let product = Numeric {
        shape,
        element,
        is_scalar: false,
    };
    combine(cx, &bias, &product)
}

/// Permute the dims of a tensor by the `permutation` attribute.
pub(crate) fn transpose(cx: &InferCx<'_>) -> Result<TypeNotation, TypeError> {
    cx.expect_operands(1)?;
    let (shape, element) = cx.tensor(0)?;
    let permutation = cx.ints_attr("permutation")?;
    if permutation.len() != shape.len() {
        return Err(cx.invalid(format!(
            "permutation of length {} applied to rank {}",
            permutation.len(),
            shape.len()
        )));
    }
    let mut seen = vec![false; shape.len()];
    let mut out = Vec::with_capacity(shape.len());
    for &axis in &permutation {
        let Some(idx) = usize::try_from(axis).ok().filter(|&i| i < shape.len() && !seen[i])
        else {
            return Err(cx.invalid(format!("{permutation:?} is not a permutation")));
        };
        seen[idx] = true;
        out.push(shape[idx]);
    }
    Ok(TypeNotation::tensor(out, element.clone()))
}

/// Reduce a tensor over the `dims` attribute, keeping unit dims when
/// `keepdim` is set.
pub(crate) fn sum(cx: &InferCx<'_>) -> Result<TypeNotation, TypeError> {
    cx.expect_operands(1)?;
    let (shape, element) = cx.tensor(0)?;
    let keepdim = cx.bool_attr_or("keepdim", false)?;
    let mut reduced = vec![false; shape.len()];
    for dim in cx.ints_attr("dims")? {
        reduced[normalize_dim(cx, dim, shape.len())?] = true;
    }
    let out = shape
        .iter()
        .zip(&reduced)
        .filter_map(|(&size, &reduce)| match (reduce, keepdim) {
            (false, _) => Some(size),
            (true, true) => Some(1),
            (true, false) => None,
        })
        .collect::<Vec<_>>();
    Ok(TypeNotation::tensor(out, element.clone()))
}

/// Map a possibly negative dim index into `0..rank`.
pub(crate) fn normalize_dim(cx: &InferCx<'_>, dim: i64, rank: usize) -> Result<usize, TypeError> {
    let rank_i = i64::try_from(rank).unwrap_or(i64::MAX);
    let idx = if dim < 0 { dim + rank_i } else { dim };
    usize::try_from(idx)
        .ok()
        .filter(|&i| i < rank)
        .ok_or_else(|| cx.invalid(format!("dim {dim} is out of range for rank {rank}")))
}
