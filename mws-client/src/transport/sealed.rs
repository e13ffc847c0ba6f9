//! Sealed trait marker for Transport implementations.

pub(crate) mod private {
    /// Sealed trait marker.
    ///
    /// Cannot be implemented outside this crate, so every transport honours
    /// the no-retry, status-verbatim contract of `Transport::send`.
    pub trait Sealed {}
}
