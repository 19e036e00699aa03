use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::context::Context;
use super::runtime::Runtime;
use super::value::{Exception, Failure, FromValue, Value};

/// An executable operation.
///
/// Every implementation must return `Error`, `Exception` and `Skip` inputs
/// unchanged. Operations that only handle one category should implement
/// [`TypedFunc`] and go through [`adapt`] instead.
#[async_trait]
pub trait Func: Send + Sync {
    async fn apply(&self, ctx: &Context, rtx: &Runtime, input: Value) -> Value;
}

/// Shared handle to a compiled operation.
pub type FuncRef = Arc<dyn Func>;

/// Failure of a [`TypedFunc`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FuncError {
    /// Becomes a `Value::Error`.
    Failure(Failure),
    /// Becomes a `Value::Exception`.
    Exception(Exception),
}

impl From<Failure> for FuncError {
    fn from(value: Failure) -> Self {
        FuncError::Failure(value)
    }
}

impl From<Exception> for FuncError {
    fn from(value: Exception) -> Self {
        FuncError::Exception(value)
    }
}

impl fmt::Display for FuncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FuncError::Failure(failure) => failure.fmt(f),
            FuncError::Exception(exc) => exc.fmt(f),
        }
    }
}

/// An operation accepting exactly one main category.
#[async_trait]
pub trait TypedFunc: Send + Sync {
    type Input: FromValue + Send + 'static;
    type Output: Into<Value> + Send + 'static;

    /// Operation name used in unexpected-input exceptions.
    fn name(&self) -> &'static str;

    async fn call(
        &self,
        ctx: &Context,
        rtx: &Runtime,
        input: Self::Input,
    ) -> Result<Self::Output, FuncError>;
}

/// Wraps a [`TypedFunc`] into a [`Func`] handling the sentinel categories.
pub struct Adapter<F>(F);

/// Adapts a typed function into a shared [`FuncRef`].
pub fn adapt<F>(func: F) -> FuncRef
where
    F: TypedFunc + 'static,
{
    Arc::new(Adapter(func))
}

#[async_trait]
impl<F> Func for Adapter<F>
where
    F: TypedFunc,
{
    async fn apply(&self, ctx: &Context, rtx: &Runtime, input: Value) -> Value {
        if input.is_sentinel() {
            return input;
        }
        match F::Input::from_value(input) {
            Ok(input) => match self.0.call(ctx, rtx, input).await {
                Ok(output) => output.into(),
                Err(FuncError::Failure(failure)) => Value::Error(failure),
                Err(FuncError::Exception(exc)) => Value::Exception(exc),
            },
            Err(other) => Value::unexpected(self.0.name(), &other),
        }
    }
}

/// Returns its input unchanged, whatever the category.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

#[async_trait]
impl Func for Identity {
    async fn apply(&self, _ctx: &Context, _rtx: &Runtime, input: Value) -> Value {
        input
    }
}

/// Turns any non-sentinel value into `Void`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Discard;

#[async_trait]
impl Func for Discard {
    async fn apply(&self, _ctx: &Context, _rtx: &Runtime, input: Value) -> Value {
        if input.is_sentinel() {
            return input;
        }
        Value::Void
    }
}

/// Applies operations in sequence, feeding each output into the next
/// operation. An empty composition behaves like [`Identity`].
#[derive(Clone, Default)]
pub struct Compose {
    funcs: Vec<FuncRef>,
}

impl Compose {
    pub fn new(funcs: Vec<FuncRef>) -> Self {
        Self { funcs }
    }

    pub fn len(&self) -> usize {
        self.funcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.funcs.is_empty()
    }
}

#[async_trait]
impl Func for Compose {
    async fn apply(&self, ctx: &Context, rtx: &Runtime, input: Value) -> Value {
        let mut value = input;
        for func in &self.funcs {
            value = func.apply(ctx, rtx, value).await;
        }
        value
    }
}

/// Evaluates `func` with a `Void` input. An `Exception` result means the
/// whole program failed; any other value (including a trailing `Error`) is a
/// completed evaluation.
pub async fn run_void(func: &dyn Func, ctx: &Context, rtx: &Runtime) -> Result<Value, Exception> {
    match func.apply(ctx, rtx, Value::Void).await {
        Value::Exception(exc) => Err(exc),
        other => Ok(other),
    }
}

/// Returns the exception carried by `value`, if any.
pub fn try_exception(value: &Value) -> Result<(), Exception> {
    match value {
        Value::Exception(exc) => Err(exc.clone()),
        _ => Ok(()),
    }
}
