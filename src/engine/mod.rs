//! Execution engine: values, operations, composition, fan-out and the
//! shared per-evaluation runtime.

pub mod context;
pub mod endpoints;
pub mod fanout;
pub mod func;
pub mod observations;
pub mod parallel;
pub mod runtime;
pub mod trace;
pub mod validate;
pub mod value;

pub use context::{Context, ContextError};
pub use endpoints::{DomainName, MakeEndpointsForPort};
pub use fanout::{
    DnsLookupParallel, EndpointPipeline, MeasureMultipleDomains, MeasureMultipleEndpoints,
};
pub use func::{
    Adapter, Compose, Discard, Func, FuncError, FuncRef, Identity, TypedFunc, adapt, run_void,
    try_exception,
};
pub use observations::Observations;
pub use runtime::{Closer, ConnSlot, Runtime, RuntimeOptions};
pub use trace::{OperationLogger, Trace};
pub use value::{
    DnsLookupInput, DnsLookupOutput, Endpoint, Exception, Failure, FromValue, Value, Void,
};
