//! File I/O: ASCII, whitespace-separated input/output formats.

pub mod pts;
pub mod tri;

pub use pts::{read_pts, read_seg};
pub use tri::{read_cdt, read_tri, write_cdt, write_tri};
