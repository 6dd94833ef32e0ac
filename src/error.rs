//! Errors raised while importing graph records or driving pipelines.

use derive_more::{Display, From};
use plait_ir::IrError;

pub type PlaitResult<T> = Result<T, PlaitError>;

#[derive(Debug, Display)]
#[display("{kind}")]
pub struct PlaitError {
    kind: Box<PlaitErrorKind>,
}

impl<E> From<E> for PlaitError
where
    PlaitErrorKind: From<E>,
{
    fn from(error: E) -> Self {
        PlaitError {
            kind: Box::new(PlaitErrorKind::from(error)),
        }
    }
}

impl PlaitError {
    pub fn kind(&self) -> &PlaitErrorKind {
        &self.kind
    }

    pub fn unknown_value(node: &str, name: &str) -> Self {
        PlaitErrorKind::UnknownValue {
            node: node.to_owned(),
            name: name.to_owned(),
        }
        .into()
    }

    pub fn duplicate_value(name: &str) -> Self {
        PlaitErrorKind::DuplicateValue(name.to_owned()).into()
    }

    pub fn unsupported_literal(node: &str, literal: impl std::fmt::Display) -> Self {
        PlaitErrorKind::UnsupportedLiteral {
            node: node.to_owned(),
            literal: literal.to_string(),
        }
        .into()
    }
}

#[derive(Debug, Display, From)]
pub enum PlaitErrorKind {
    #[display("i/o error: {_0}")]
    #[from]
    Io(std::io::Error),

    #[display("malformed JSON: {_0}")]
    #[from]
    Json(serde_json::Error),

    #[display("{_0}")]
    #[from]
    Ir(IrError),

    #[display("node `{node}` refers to undefined value `{name}`")]
    UnknownValue { node: String, name: String },

    #[display("value `{_0}` is defined twice")]
    DuplicateValue(String),

    #[display("node `{node}` has an unsupported literal {literal}")]
    UnsupportedLiteral { node: String, literal: String },
}

impl std::error::Error for PlaitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &*self.kind {
            PlaitErrorKind::Io(e) => Some(e),
            PlaitErrorKind::Json(e) => Some(e),
            PlaitErrorKind::Ir(e) => Some(e),
            _ => None,
        }
    }
}
