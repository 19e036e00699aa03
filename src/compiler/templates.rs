//! Built-in operation templates.

use std::sync::Arc;

use super::arguments::{
    DnsLookupStaticArguments, DnsLookupUdpArguments, DomainNameArguments, HandshakeArguments,
    HttpTransactionArguments, MakeEndpointsForPortArguments,
};
use super::{Compiler, FuncTemplate};
use crate::ast::{AstNode, Empty};
use crate::engine::{
    Compose, Discard, DnsLookupParallel, DomainName, EndpointPipeline, FuncRef, Identity,
    MakeEndpointsForPort, MeasureMultipleDomains, MeasureMultipleEndpoints, adapt,
};
use crate::error::CompileError;
use crate::probes::{
    DnsLookupGetaddrinfo, DnsLookupStatic, HttpTransaction, QuicHandshake, TcpConnect,
    TlsHandshake,
};

/// Every template registered by [`Compiler::new`].
pub fn builtin_templates() -> Vec<Box<dyn FuncTemplate>> {
    vec![
        Box::new(ComposeTemplate),
        Box::new(DiscardTemplate),
        Box::new(DomainNameTemplate),
        Box::new(DnsLookupGetaddrinfoTemplate),
        Box::new(DnsLookupParallelTemplate),
        Box::new(DnsLookupStaticTemplate),
        Box::new(DnsLookupUdpTemplate),
        Box::new(HttpTransactionTemplate),
        Box::new(IfFuncExistsTemplate),
        Box::new(MakeEndpointsForPortTemplate),
        Box::new(MeasureMultipleDomainsTemplate),
        Box::new(MeasureMultipleEndpointsTemplate),
        Box::new(NewEndpointPipelineTemplate),
        Box::new(QuicHandshakeTemplate),
        Box::new(TcpConnectTemplate),
        Box::new(TlsHandshakeTemplate),
    ]
}

/// Decodes the arguments of a leaf node, which takes no children.
fn leaf_arguments<T>(node: &AstNode) -> Result<T, CompileError>
where
    T: serde::de::DeserializeOwned + Default,
{
    let arguments = node.decode_arguments()?;
    node.require_children(0)?;
    Ok(arguments)
}

// ── composition ──────────────────────────────────────────────────

struct ComposeTemplate;

impl FuncTemplate for ComposeTemplate {
    fn name(&self) -> &str {
        "compose"
    }

    fn compile(&self, compiler: &Compiler, node: &AstNode) -> Result<FuncRef, CompileError> {
        node.decode_arguments::<Empty>()?;
        Ok(Arc::new(Compose::new(compiler.compile_children(node)?)))
    }
}

struct DiscardTemplate;

impl FuncTemplate for DiscardTemplate {
    fn name(&self) -> &str {
        "discard"
    }

    fn compile(&self, _compiler: &Compiler, node: &AstNode) -> Result<FuncRef, CompileError> {
        leaf_arguments::<Empty>(node)?;
        Ok(Arc::new(Discard))
    }
}

/// Compiles the child when its operation is known, otherwise passes the
/// input through.
struct IfFuncExistsTemplate;

impl FuncTemplate for IfFuncExistsTemplate {
    fn name(&self) -> &str {
        "if_func_exists"
    }

    fn compile(&self, compiler: &Compiler, node: &AstNode) -> Result<FuncRef, CompileError> {
        node.require_children(1)?;
        let child = &node.children[0];
        if !compiler.template_exists(&child.func) {
            tracing::debug!(
                func = %child.func,
                "if_func_exists: unknown operation, using identity"
            );
            return Ok(Arc::new(Identity));
        }
        compiler.compile(child)
    }
}

// ── DNS ──────────────────────────────────────────────────────────

struct DomainNameTemplate;

impl FuncTemplate for DomainNameTemplate {
    fn name(&self) -> &str {
        "domain_name"
    }

    fn compile(&self, _compiler: &Compiler, node: &AstNode) -> Result<FuncRef, CompileError> {
        let arguments: DomainNameArguments = leaf_arguments(node)?;
        Ok(adapt(DomainName::new(arguments.validate(self.name())?)))
    }
}

struct DnsLookupGetaddrinfoTemplate;

impl FuncTemplate for DnsLookupGetaddrinfoTemplate {
    fn name(&self) -> &str {
        "dns_lookup_getaddrinfo"
    }

    fn compile(&self, _compiler: &Compiler, node: &AstNode) -> Result<FuncRef, CompileError> {
        leaf_arguments::<Empty>(node)?;
        Ok(adapt(DnsLookupGetaddrinfo))
    }
}

struct DnsLookupParallelTemplate;

impl FuncTemplate for DnsLookupParallelTemplate {
    fn name(&self) -> &str {
        "dns_lookup_parallel"
    }

    fn compile(&self, compiler: &Compiler, node: &AstNode) -> Result<FuncRef, CompileError> {
        node.decode_arguments::<Empty>()?;
        Ok(adapt(DnsLookupParallel::new(compiler.compile_children(node)?)))
    }
}

struct DnsLookupStaticTemplate;

impl FuncTemplate for DnsLookupStaticTemplate {
    fn name(&self) -> &str {
        "dns_lookup_static"
    }

    fn compile(&self, _compiler: &Compiler, node: &AstNode) -> Result<FuncRef, CompileError> {
        let arguments: DnsLookupStaticArguments = leaf_arguments(node)?;
        Ok(adapt(DnsLookupStatic::new(arguments.validate(self.name())?)))
    }
}

struct DnsLookupUdpTemplate;

impl FuncTemplate for DnsLookupUdpTemplate {
    fn name(&self) -> &str {
        "dns_lookup_udp"
    }

    fn compile(&self, _compiler: &Compiler, node: &AstNode) -> Result<FuncRef, CompileError> {
        let arguments: DnsLookupUdpArguments = leaf_arguments(node)?;
        Ok(adapt(arguments.validate(self.name())?))
    }
}

// ── endpoints ────────────────────────────────────────────────────

struct MakeEndpointsForPortTemplate;

impl FuncTemplate for MakeEndpointsForPortTemplate {
    fn name(&self) -> &str {
        "make_endpoints_for_port"
    }

    fn compile(&self, _compiler: &Compiler, node: &AstNode) -> Result<FuncRef, CompileError> {
        let arguments: MakeEndpointsForPortArguments = leaf_arguments(node)?;
        Ok(adapt(MakeEndpointsForPort::new(arguments.port)))
    }
}

struct NewEndpointPipelineTemplate;

impl FuncTemplate for NewEndpointPipelineTemplate {
    fn name(&self) -> &str {
        "new_endpoint_pipeline"
    }

    fn compile(&self, compiler: &Compiler, node: &AstNode) -> Result<FuncRef, CompileError> {
        node.decode_arguments::<Empty>()?;
        node.require_at_least_children(1)?;
        Ok(adapt(EndpointPipeline::new(compiler.compile_children(node)?)))
    }
}

// ── fan-out ──────────────────────────────────────────────────────

struct MeasureMultipleDomainsTemplate;

impl FuncTemplate for MeasureMultipleDomainsTemplate {
    fn name(&self) -> &str {
        "measure_multiple_domains"
    }

    fn compile(&self, compiler: &Compiler, node: &AstNode) -> Result<FuncRef, CompileError> {
        node.decode_arguments::<Empty>()?;
        Ok(adapt(MeasureMultipleDomains::new(
            compiler.compile_children(node)?,
        )))
    }
}

struct MeasureMultipleEndpointsTemplate;

impl FuncTemplate for MeasureMultipleEndpointsTemplate {
    fn name(&self) -> &str {
        "measure_multiple_endpoints"
    }

    fn compile(&self, compiler: &Compiler, node: &AstNode) -> Result<FuncRef, CompileError> {
        node.decode_arguments::<Empty>()?;
        Ok(adapt(MeasureMultipleEndpoints::new(
            compiler.compile_children(node)?,
        )))
    }
}

// ── transports ───────────────────────────────────────────────────

struct TcpConnectTemplate;

impl FuncTemplate for TcpConnectTemplate {
    fn name(&self) -> &str {
        "tcp_connect"
    }

    fn compile(&self, _compiler: &Compiler, node: &AstNode) -> Result<FuncRef, CompileError> {
        leaf_arguments::<Empty>(node)?;
        Ok(adapt(TcpConnect))
    }
}

struct TlsHandshakeTemplate;

impl FuncTemplate for TlsHandshakeTemplate {
    fn name(&self) -> &str {
        "tls_handshake"
    }

    fn compile(&self, _compiler: &Compiler, node: &AstNode) -> Result<FuncRef, CompileError> {
        let arguments: HandshakeArguments = leaf_arguments(node)?;
        Ok(adapt(TlsHandshake::new(arguments.into_options())))
    }
}

struct QuicHandshakeTemplate;

impl FuncTemplate for QuicHandshakeTemplate {
    fn name(&self) -> &str {
        "quic_handshake"
    }

    fn compile(&self, _compiler: &Compiler, node: &AstNode) -> Result<FuncRef, CompileError> {
        let arguments: HandshakeArguments = leaf_arguments(node)?;
        Ok(adapt(QuicHandshake::new(arguments.into_options())))
    }
}

struct HttpTransactionTemplate;

impl FuncTemplate for HttpTransactionTemplate {
    fn name(&self) -> &str {
        "http_transaction"
    }

    fn compile(&self, _compiler: &Compiler, node: &AstNode) -> Result<FuncRef, CompileError> {
        let arguments: HttpTransactionArguments = leaf_arguments(node)?;
        Ok(adapt(HttpTransaction::new(arguments.validate(self.name())?)))
    }
}
