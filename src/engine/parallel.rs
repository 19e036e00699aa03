//! Bounded fan-out.
//!
//! Both helpers run at most `workers` operations at a time (at least one),
//! wait for all of them, and return the outputs in completion order.
//! The futures are built up front and stay idle until the buffer polls them.

use futures_util::stream::{self, StreamExt};

use super::context::Context;
use super::func::{Func, FuncRef};
use super::runtime::Runtime;
use super::value::Value;

/// Applies every function in `funcs` to a copy of `input`.
pub async fn apply_input_to_func_list(
    ctx: &Context,
    rtx: &Runtime,
    workers: usize,
    funcs: &[FuncRef],
    input: &Value,
) -> Vec<Value> {
    let futures: Vec<_> = funcs
        .iter()
        .map(|func| func.apply(ctx, rtx, input.clone()))
        .collect();
    stream::iter(futures)
        .buffer_unordered(workers.max(1))
        .collect()
        .await
}

/// Applies `func` to every element of `inputs`.
pub async fn apply_func_to_input_list(
    ctx: &Context,
    rtx: &Runtime,
    workers: usize,
    func: &dyn Func,
    inputs: Vec<Value>,
) -> Vec<Value> {
    let futures: Vec<_> = inputs
        .into_iter()
        .map(|input| func.apply(ctx, rtx, input))
        .collect();
    stream::iter(futures)
        .buffer_unordered(workers.max(1))
        .collect()
        .await
}
