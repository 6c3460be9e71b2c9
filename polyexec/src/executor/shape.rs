use std::fmt;

mod sealed {
    pub trait Sealed {}
}

/// Runtime tag of a call shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    OneWay,
    BulkOneWay,
    TwoWay,
    BulkTwoWay,
    Lazy,
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShapeKind::OneWay => "oneway",
            ShapeKind::BulkOneWay => "bulk-oneway",
            ShapeKind::TwoWay => "twoway",
            ShapeKind::BulkTwoWay => "bulk-twoway",
            ShapeKind::Lazy => "lazy",
        };
        f.write_str(name)
    }
}

/// Marker selecting which submission operations an executor exposes.
///
/// Sealed: the set of call shapes is closed.
pub trait CallShape: sealed::Sealed + Copy + Default + Send + Sync + 'static {
    const KIND: ShapeKind;
}

macro_rules! call_shapes {
    ($($(#[$meta:meta])* $name:ident,)*) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
            pub struct $name;

            impl sealed::Sealed for $name {}

            impl CallShape for $name {
                const KIND: ShapeKind = ShapeKind::$name;
            }
        )*
    };
}

call_shapes! {
    /// Fire-and-forget submission of a single function.
    OneWay,
    /// Fire-and-forget submission over a 3-D index space.
    BulkOneWay,
    /// Single submission returning a future.
    TwoWay,
    /// Submission over a 3-D index space returning a future of all results.
    BulkTwoWay,
    /// Lazy submission through the task graph.
    Lazy,
}
