//! Sparse linear-algebra substrate.
//!
//! Dense, sparse, and semi-sparse vectors with nonzero-index tracking,
//! the update-vector abstraction used by pivot steps, and the
//! arena-backed set of sparse columns that stores the constraint matrix.

pub mod dense;
pub mod idxset;
pub mod sparse;
pub mod ssvec;
pub mod svset;
pub mod update;

pub use dense::DVector;
pub use idxset::IdxSet;
pub use sparse::{Nonzero, SVector, SvView};
pub use ssvec::SsVector;
pub use svset::{Key, SvSet};
pub use update::UpdateVector;
