mod node;

pub use node::{SclBuilder, SclNode};
