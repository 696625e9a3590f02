// Stat pool loading and value-based drafting.

pub mod projections;
pub mod vbd;
