pub mod resolver;
pub mod role;

pub use resolver::{ancestor_chain, effective_role, resolve};
pub use role::Role;
