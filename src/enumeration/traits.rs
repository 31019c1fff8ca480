//! Seams between the enumeration engine and a resource domain

use crate::error::Result;

/// One-shot discovery of the current OS resources of a single kind.
///
/// Implementations must only observe; the engine calls `probe` once per
/// update cycle.
pub trait ResourceProbe {
    /// Raw record describing one discovered resource
    type Record;

    /// Produce an ordered snapshot of every resource currently present
    fn probe(&self) -> Result<Vec<Self::Record>>;
}

impl<P: ResourceProbe + ?Sized> ResourceProbe for Box<P> {
    type Record = P::Record;

    fn probe(&self) -> Result<Vec<Self::Record>> {
        (**self).probe()
    }
}

/// Domain adapter plugged into [`EntityEnumeration`](super::EntityEnumeration).
pub trait EnumerationAdapter {
    /// Raw record type, as produced by the domain's probe
    type Record;
    /// Long-lived instance type kept in the enumeration
    type Instance;

    /// Stable identity of the resource a record describes
    fn identity(&self, record: &Self::Record) -> String;

    /// Whether a newly observed record becomes an instance.
    ///
    /// Only consulted for identities not already in the set; instances that
    /// are already tracked are refreshed regardless.
    fn accept(&self, _record: &Self::Record) -> bool {
        true
    }

    /// Build a fresh instance the first cycle an identity is admitted
    fn create(&self, record: &Self::Record) -> Self::Instance;

    /// Refresh an existing instance in place from its latest record
    fn refresh(&self, instance: &mut Self::Instance, record: &Self::Record) -> Result<()>;
}
