pub mod regularized_ldlt;
pub mod sparse;

pub use regularized_ldlt::{ldlt, Inertia, LdltFactor, RegularizedLdlt};
