//! Turns wire programs into executable operations.
//!
//! A [`Compiler`] maps operation names to [`FuncTemplate`]s. Built-in
//! templates are registered by [`Compiler::new`]; experiments add their own
//! with [`Compiler::register`] or [`Compiler::register_fn`] before compiling.

pub mod arguments;
mod templates;

use std::collections::HashMap;
use std::sync::Arc;

use crate::ast::AstNode;
use crate::engine::FuncRef;
use crate::error::CompileError;

pub use templates::builtin_templates;

/// Compiles one AST node into an operation.
pub trait FuncTemplate: Send + Sync {
    /// Operation name this template handles.
    fn name(&self) -> &str;

    /// Compiles `node`, using `compiler` for its children.
    fn compile(&self, compiler: &Compiler, node: &AstNode) -> Result<FuncRef, CompileError>;
}

type CompileFn = dyn Fn(&Compiler, &AstNode) -> Result<FuncRef, CompileError> + Send + Sync;

/// A template backed by a closure, see [`Compiler::register_fn`].
struct FnTemplate {
    name: String,
    compile: Box<CompileFn>,
}

impl FuncTemplate for FnTemplate {
    fn name(&self) -> &str {
        &self.name
    }

    fn compile(&self, compiler: &Compiler, node: &AstNode) -> Result<FuncRef, CompileError> {
        (self.compile)(compiler, node)
    }
}

/// Registry of operation templates.
#[derive(Clone)]
pub struct Compiler {
    templates: HashMap<String, Arc<dyn FuncTemplate>>,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    /// Creates a compiler with every built-in template registered.
    pub fn new() -> Self {
        let mut compiler = Self::empty();
        for template in builtin_templates() {
            compiler.register(template);
        }
        compiler
    }

    /// Creates a compiler that knows no operation.
    pub fn empty() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    /// Registers a template. Replaces any template with the same name.
    pub fn register(&mut self, template: Box<dyn FuncTemplate>) {
        let template: Arc<dyn FuncTemplate> = Arc::from(template);
        self.templates.insert(template.name().to_string(), template);
    }

    /// Registers a compile function under `name`.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, compile: F)
    where
        F: Fn(&Compiler, &AstNode) -> Result<FuncRef, CompileError> + Send + Sync + 'static,
    {
        self.register(Box::new(FnTemplate {
            name: name.into(),
            compile: Box::new(compile),
        }));
    }

    pub fn template_exists(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// Sorted list of registered operation names.
    pub fn template_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.templates.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Compiles `node` and, recursively, its children.
    pub fn compile(&self, node: &AstNode) -> Result<FuncRef, CompileError> {
        let template = self
            .templates
            .get(&node.func)
            .ok_or_else(|| CompileError::NoSuchTemplate(node.func.clone()))?;
        template.compile(self, node)
    }

    /// Parses a JSON program and compiles it.
    pub fn compile_json(&self, data: &str) -> Result<FuncRef, CompileError> {
        self.compile(&AstNode::from_json(data)?)
    }

    /// Compiles every child of `node`, in order.
    pub fn compile_children(&self, node: &AstNode) -> Result<Vec<FuncRef>, CompileError> {
        node.children.iter().map(|child| self.compile(child)).collect()
    }
}
