//! Overload signature keys.
//!
//! Overloadable declarations are stored in the symbol table under rendered
//! signature names: `Name(FQN,FQN)` for functions and constructors,
//! `c(FQN,FQN)` for operators (`c` is the operator's lookup char), and
//! `#Ret(Arg)` for casts. Before parameter types are known, a placeholder
//! key rendered from node ids keeps the entry unique; the collector renames
//! the table node once the real signature is available.

use crate::arena::NodeId;
use crate::operators::Operator;

/// Who owns the overload set a key selects in.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SigOwner {
    Function(String),
    Operator(Operator),
    Cast { target_fqn: String },
}

/// Structured overload key; rendered to a string only at the symbol-table
/// boundary.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OverloadKey {
    pub owner: SigOwner,
    pub arg_fqns: Vec<String>,
    pub placeholder: bool,
}

impl OverloadKey {
    pub fn function(name: impl Into<String>, arg_fqns: Vec<String>) -> Self {
        OverloadKey {
            owner: SigOwner::Function(name.into()),
            arg_fqns,
            placeholder: false,
        }
    }

    pub fn operator(op: Operator, arg_fqns: Vec<String>) -> Self {
        OverloadKey {
            owner: SigOwner::Operator(op),
            arg_fqns,
            placeholder: false,
        }
    }

    pub fn cast(target_fqn: impl Into<String>, source_fqn: impl Into<String>) -> Self {
        OverloadKey {
            owner: SigOwner::Cast {
                target_fqn: target_fqn.into(),
            },
            arg_fqns: vec![source_fqn.into()],
            placeholder: false,
        }
    }

    /// Placeholder key for a declaration whose parameter types are not yet
    /// resolved. Node ids keep the key unique within one arena.
    pub fn placeholder(owner: SigOwner, params: &[NodeId]) -> Self {
        OverloadKey {
            owner,
            arg_fqns: params.iter().map(|p| p.0.to_string()).collect(),
            placeholder: true,
        }
    }

    /// The symbol-table name for this key.
    pub fn render(&self) -> String {
        let mut out = String::new();
        match &self.owner {
            SigOwner::Function(name) => out.push_str(name),
            SigOwner::Operator(op) => out.push(op.lookup_char()),
            SigOwner::Cast { target_fqn } => {
                out.push(Operator::Cast.lookup_char());
                out.push_str(target_fqn);
            }
        }
        out.push('(');
        for (i, arg) in self.arg_fqns.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(arg);
        }
        out.push(')');
        out
    }
}

/// Render an operator signature directly from FQNs.
pub fn render_operator_signature(op: Operator, arg_fqns: &[&str]) -> String {
    let mut out = String::new();
    out.push(op.lookup_char());
    out.push('(');
    for (i, arg) in arg_fqns.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(arg);
    }
    out.push(')');
    out
}

/// Render a cast signature `#Target(Source)`.
pub fn render_cast_signature(target_fqn: &str, source_fqn: &str) -> String {
    format!(
        "{}{target_fqn}({source_fqn})",
        Operator::Cast.lookup_char()
    )
}
