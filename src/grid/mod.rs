//! Regular grids and aggregation of flashes onto them.

mod aggregate;
mod spec;

pub use aggregate::{
    AggregateOutput, AggregateRequest, Aggregation, BinEdges, Operation, SnappedFlashes,
};
pub use spec::{ensure_same_axis, GridSpec};
