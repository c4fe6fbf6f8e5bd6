pub mod num_traits_impls;
pub mod std_ops;

#[cfg(feature = "graph")]
pub mod trace_num_traits;
#[cfg(feature = "graph")]
pub mod trace_ops;
