//! Program builder.
//!
//! The functions in this module build a typed tree of [`FuncNode`]s,
//! checking at each step that the main types of the pieces line up. The
//! tree is exported to the wire format with [`export_ast_node`] and turned
//! into an executable operation by [`crate::compiler::Compiler`].
//!
//! ```
//! use microprobe::dsl;
//! use microprobe::types;
//!
//! let program = dsl::compose(vec![
//!     dsl::domain_name("www.example.com")?,
//!     dsl::dns_lookup_getaddrinfo(),
//!     dsl::make_endpoints_for_port(443),
//!     dsl::new_endpoint_pipeline(vec![
//!         dsl::tcp_connect(),
//!         dsl::discard(types::TCP_CONNECTION.into()),
//!     ])?,
//! ])?;
//! let ast = dsl::export_ast_node(&program);
//! assert_eq!(ast.func, "compose");
//! # Ok::<(), microprobe::error::BuildError>(())
//! ```

mod nodes;

use serde::Serialize;

use crate::ast::AstNode;
use crate::error::BuildError;
use crate::types::Type;

pub use nodes::*;

/// A node of a program under construction.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncNode {
    /// Operation name, resolved by the compiler.
    pub name: String,

    /// Main input type.
    pub input_type: Type,

    /// Main output type.
    pub output_type: Type,

    /// Operation-specific arguments, already encoded.
    pub arguments: serde_json::Value,

    pub children: Vec<FuncNode>,
}

impl FuncNode {
    /// Creates a node with no arguments and no children.
    pub fn new(name: impl Into<String>, input_type: Type, output_type: Type) -> Self {
        Self {
            name: name.into(),
            input_type,
            output_type,
            arguments: serde_json::Value::Null,
            children: Vec::new(),
        }
    }

    /// Encodes `arguments` into the node.
    pub fn with_arguments<T: Serialize>(mut self, arguments: &T) -> Result<Self, BuildError> {
        self.arguments = serde_json::to_value(arguments)
            .map_err(|e| BuildError::InvalidArgument(format!("{}: {e}", self.name)))?;
        Ok(self)
    }

    pub fn with_children(mut self, children: Vec<FuncNode>) -> Self {
        self.children = children;
        self
    }
}

/// Exports a node and its children to the wire format. Nodes without
/// arguments get an empty object.
pub fn export_ast_node(node: &FuncNode) -> AstNode {
    let arguments = if node.arguments.is_null() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        node.arguments.clone()
    };
    AstNode {
        func: node.name.clone(),
        arguments,
        children: node.children.iter().map(export_ast_node).collect(),
    }
}

/// Fails unless every node in `funcs` has exactly the given main types.
pub(crate) fn type_check_funcs(
    context: &str,
    input_type: &Type,
    output_type: &Type,
    funcs: &[FuncNode],
) -> Result<(), BuildError> {
    for f in funcs {
        if f.input_type.main() != input_type.main() {
            return Err(BuildError::TypeMismatch {
                context: format!("{context}: {} input", f.name),
                expected: input_type.main().to_string(),
                found: f.input_type.main().to_string(),
            });
        }
        if f.output_type.main() != output_type.main() {
            return Err(BuildError::TypeMismatch {
                context: format!("{context}: {} output", f.name),
                expected: output_type.main().to_string(),
                found: f.output_type.main().to_string(),
            });
        }
    }
    Ok(())
}
