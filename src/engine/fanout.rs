//! Operations that fan out over several branches and reduce the results.

use std::collections::BTreeSet;
use std::net::IpAddr;

use async_trait::async_trait;

use super::context::Context;
use super::func::{Compose, FuncError, FuncRef, TypedFunc};
use super::parallel::{apply_func_to_input_list, apply_input_to_func_list};
use super::runtime::Runtime;
use super::value::{DnsLookupInput, DnsLookupOutput, Endpoint, Exception, Value, Void};

/// Concurrent resolvers of [`DnsLookupParallel`].
pub const DNS_LOOKUP_PARALLELISM: usize = 5;

/// Concurrent branches of the measure-multiple operations and of
/// [`EndpointPipeline`].
pub const MEASURE_PARALLELISM: usize = 2;

/// Reduces branch results to `Void` unless one of them is an `Exception`.
///
/// Branch errors are dropped: each branch records its own observations.
pub fn reduce_exception_or_void(results: Vec<Value>) -> Result<Void, Exception> {
    for result in results {
        if let Value::Exception(exc) = result {
            return Err(exc);
        }
    }
    Ok(Void)
}

/// Resolves a domain with several lookup operations at once and merges the
/// resolved addresses.
///
/// An `Exception` from any resolver aborts the merge. Errors are ignored, so
/// when every resolver fails the result is a success with no addresses.
pub struct DnsLookupParallel {
    funcs: Vec<FuncRef>,
}

impl DnsLookupParallel {
    pub fn new(funcs: Vec<FuncRef>) -> Self {
        Self { funcs }
    }
}

#[async_trait]
impl TypedFunc for DnsLookupParallel {
    type Input = DnsLookupInput;
    type Output = DnsLookupOutput;

    fn name(&self) -> &'static str {
        "dns_lookup_parallel"
    }

    async fn call(
        &self,
        ctx: &Context,
        rtx: &Runtime,
        input: DnsLookupInput,
    ) -> Result<DnsLookupOutput, FuncError> {
        let value = Value::DnsLookupInput(input.clone());
        let results =
            apply_input_to_func_list(ctx, rtx, DNS_LOOKUP_PARALLELISM, &self.funcs, &value).await;

        let mut addresses = BTreeSet::<IpAddr>::new();
        for result in results {
            match result {
                Value::Exception(exc) => return Err(exc.into()),
                Value::DnsLookupOutput(output) => addresses.extend(output.addresses),
                _ => {}
            }
        }
        Ok(DnsLookupOutput {
            domain: input.domain,
            addresses: addresses.into_iter().collect(),
        })
    }
}

/// Runs several `Void → Void` measurements concurrently.
pub struct MeasureMultipleDomains {
    funcs: Vec<FuncRef>,
}

impl MeasureMultipleDomains {
    pub fn new(funcs: Vec<FuncRef>) -> Self {
        Self { funcs }
    }
}

#[async_trait]
impl TypedFunc for MeasureMultipleDomains {
    type Input = Void;
    type Output = Void;

    fn name(&self) -> &'static str {
        "measure_multiple_domains"
    }

    async fn call(&self, ctx: &Context, rtx: &Runtime, _input: Void) -> Result<Void, FuncError> {
        let results =
            apply_input_to_func_list(ctx, rtx, MEASURE_PARALLELISM, &self.funcs, &Value::Void)
                .await;
        Ok(reduce_exception_or_void(results)?)
    }
}

/// Runs several measurements of the same resolved domain concurrently.
pub struct MeasureMultipleEndpoints {
    funcs: Vec<FuncRef>,
}

impl MeasureMultipleEndpoints {
    pub fn new(funcs: Vec<FuncRef>) -> Self {
        Self { funcs }
    }
}

#[async_trait]
impl TypedFunc for MeasureMultipleEndpoints {
    type Input = DnsLookupOutput;
    type Output = Void;

    fn name(&self) -> &'static str {
        "measure_multiple_endpoints"
    }

    async fn call(
        &self,
        ctx: &Context,
        rtx: &Runtime,
        input: DnsLookupOutput,
    ) -> Result<Void, FuncError> {
        let value = Value::DnsLookupOutput(input);
        let results =
            apply_input_to_func_list(ctx, rtx, MEASURE_PARALLELISM, &self.funcs, &value).await;
        Ok(reduce_exception_or_void(results)?)
    }
}

/// Runs the same `Endpoint → Void` pipeline over every endpoint.
pub struct EndpointPipeline {
    pipeline: Compose,
}

impl EndpointPipeline {
    pub fn new(funcs: Vec<FuncRef>) -> Self {
        Self {
            pipeline: Compose::new(funcs),
        }
    }
}

#[async_trait]
impl TypedFunc for EndpointPipeline {
    type Input = Vec<Endpoint>;
    type Output = Void;

    fn name(&self) -> &'static str {
        "new_endpoint_pipeline"
    }

    async fn call(
        &self,
        ctx: &Context,
        rtx: &Runtime,
        input: Vec<Endpoint>,
    ) -> Result<Void, FuncError> {
        let inputs = input.into_iter().map(Value::Endpoint).collect();
        let results =
            apply_func_to_input_list(ctx, rtx, MEASURE_PARALLELISM, &self.pipeline, inputs).await;
        Ok(reduce_exception_or_void(results)?)
    }
}
