pub mod bitset;
pub mod graph;
