//! Types exchanged between operations.
//!
//! A [`SimpleType`] names one value category. A [`Type`] is the sum of one or
//! more simple types: a deduplicated, order-independent set. Every operation
//! implicitly accepts and returns [`ERROR`], [`EXCEPTION`] and [`SKIP`] on top
//! of its declared ("main") type; [`Type::complete`] and [`Type::main`] add
//! and remove those three members.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;

/// A single value category, compared by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SimpleType(Cow<'static, str>);

impl SimpleType {
    /// Creates a type from a static name.
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// Creates a type with a runtime-provided name (e.g. for operations
    /// registered by an experiment).
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// Whether this is one of the three control-flow members.
    pub fn is_control(&self) -> bool {
        *self == ERROR || *self == EXCEPTION || *self == SKIP
    }
}

impl fmt::Display for SimpleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Output of `dns_lookup_*` operations.
pub const DNS_LOOKUP_OUTPUT: SimpleType = SimpleType::from_static("*DNSLookupOutput");

/// Input of `dns_lookup_*` operations.
pub const DNS_LOOKUP_INPUT: SimpleType = SimpleType::from_static("*DNSLookupInput");

/// A single transport endpoint.
pub const ENDPOINT: SimpleType = SimpleType::from_static("*Endpoint");

/// A recoverable measurement failure.
pub const ERROR: SimpleType = SimpleType::from_static("error");

/// A fatal, structural failure.
pub const EXCEPTION: SimpleType = SimpleType::from_static("*Exception");

/// The response of an HTTP transaction.
pub const HTTP_RESPONSE: SimpleType = SimpleType::from_static("*HTTPResponse");

/// A list of endpoints.
pub const LIST_OF_ENDPOINT: SimpleType = SimpleType::from_static("[]*Endpoint");

/// An established QUIC connection.
pub const QUIC_CONNECTION: SimpleType = SimpleType::from_static("*QUICConnection");

/// The "already handled, stop here" marker.
pub const SKIP: SimpleType = SimpleType::from_static("*Skip");

/// An established TCP connection.
pub const TCP_CONNECTION: SimpleType = SimpleType::from_static("*TCPConnection");

/// An established TLS connection.
pub const TLS_CONNECTION: SimpleType = SimpleType::from_static("*TLSConnection");

/// No value.
pub const VOID: SimpleType = SimpleType::from_static("*Void");

/// A sum of simple types. A sum with one member is the same thing as that
/// member; equality is set equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Type {
    members: BTreeSet<SimpleType>,
}

impl Type {
    /// Builds the sum of the given types. Duplicates collapse and order does
    /// not matter. The result may be empty only if `types` is.
    pub fn sum<I>(types: I) -> Self
    where
        I: IntoIterator<Item = SimpleType>,
    {
        Self {
            members: types.into_iter().collect(),
        }
    }

    /// Returns a new type that also contains `types`.
    pub fn append<I>(&self, types: I) -> Self
    where
        I: IntoIterator<Item = SimpleType>,
    {
        let mut members = self.members.clone();
        members.extend(types);
        Self { members }
    }

    /// The type plus [`ERROR`], [`EXCEPTION`] and [`SKIP`].
    pub fn complete(&self) -> Self {
        self.append([ERROR, EXCEPTION, SKIP])
    }

    /// The type without [`ERROR`], [`EXCEPTION`] and [`SKIP`].
    pub fn main(&self) -> Self {
        Self {
            members: self
                .members
                .iter()
                .filter(|t| !t.is_control())
                .cloned()
                .collect(),
        }
    }

    pub fn contains(&self, t: &SimpleType) -> bool {
        self.members.contains(t)
    }

    pub fn members(&self) -> impl Iterator<Item = &SimpleType> {
        self.members.iter()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether a value of this type can be converted to `target`, i.e.
    /// `target` is a superset of `self`.
    ///
    /// Composition uses exact equality; this check is kept for tooling.
    pub fn can_convert_to(&self, target: &Type) -> bool {
        self.members.is_subset(&target.members)
    }
}

impl From<SimpleType> for Type {
    fn from(value: SimpleType) -> Self {
        Self::sum([value])
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.members.iter().map(SimpleType::name).collect();
        f.write_str(&names.join(" | "))
    }
}
