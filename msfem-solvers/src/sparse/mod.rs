//! Sparse matrix structures (CSR format)
//!
//! Compressed Sparse Row storage plus a row-by-row builder used to splice
//! dense local blocks into a global sparse operator.

mod csr;

pub use csr::{CsrBuilder, CsrMatrix};
