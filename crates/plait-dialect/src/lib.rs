//! Reference tensor dialects for plait.
//!
//! Two op catalogs plug into the core through its registration API:
//!
//! - [`aten`]: framework-level ops, each importable from a foreign record.
//! - [`canon`]: the canonical op set passes lower into.
//!
//! [`passes`] lowers the former into the latter and decomposes fused ops.

/// Declare op kinds of one dialect.
///
/// ```ignore
/// ops! {
///     "canon";
///     /// Docs.
///     Add = "add", Arity::Fixed(2), rules::binary;
/// }
/// ```
macro_rules! ops {
    (
        $namespace:literal;
        $(
            $(#[$meta:meta])*
            $kind:ident = $name:literal, $arity:expr, $rule:expr;
        )*
    ) => {
        $(
            $(#[$meta])*
            pub struct $kind;

            impl ::plait_ir::OpKind for $kind {
                const NAMESPACE: &'static str = $namespace;
                const NAME: &'static str = $name;
                const ARITY: ::plait_ir::Arity = $arity;

                fn infer_type(
                    cx: &::plait_ir::InferCx<'_>,
                ) -> Result<::plait_ir::TypeNotation, ::plait_ir::TypeError> {
                    let rule: ::plait_ir::InferFn = $rule;
                    rule(cx)
                }
            }
        )*
    };
}
pub(crate) use ops;

// === Dialects ===
pub mod aten;
pub mod canon;

// === Passes ===
pub mod passes;

mod rules;

use std::sync::Arc;

use plait_ir::{Attribute, ConfigError, DialectRegistry};

pub use passes::{aten_to_canon, canonicalize, decompose_addmm};

/// An integer list attribute (dims, permutations).
pub fn int_list(values: &[i64]) -> Attribute {
    Attribute::List(values.iter().copied().map(Attribute::Int).collect())
}

/// A registry holding the core, `canon` and `aten` dialects.
pub fn standard_registry() -> Result<Arc<DialectRegistry>, ConfigError> {
    let mut builder = DialectRegistry::builder();
    builder
        .register_dialect::<canon::Canon>()?
        .register_dialect::<aten::Aten>()?;
    Ok(builder.build())
}
