/// Tree placement.
pub mod place_in_tree;

/// Commission distribution.
pub mod distribute;
