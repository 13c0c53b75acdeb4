//! `.pts` / `.seg` readers: point sets and, optionally, the
//! constraint segments referencing them.

use std::fs;
use std::path::Path;

use crate::driver::{InputPoint, InputSegment};
use crate::errors::{TerraError, TerraResult};
use crate::mesh::ids::PointId;

/// Tokenizes the whole file into whitespace-separated fields up front;
/// every file format here is just a sequence of counts followed by that
/// many fixed-width records, so one cursor over this works for all of
/// them.
pub(crate) struct Tokens<'a> {
    fields: std::str::SplitWhitespace<'a>,
}

impl<'a> Tokens<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        Self { fields: text.split_whitespace() }
    }

    fn next_str(&mut self) -> TerraResult<&'a str> {
        self.fields
            .next()
            .ok_or_else(|| TerraError::Io("truncated file: expected another field".into()))
    }

    pub(crate) fn next_f64(&mut self) -> TerraResult<f64> {
        self.next_str()?
            .parse()
            .map_err(|_| TerraError::Io("malformed numeric field".into()))
    }

    pub(crate) fn next_usize(&mut self) -> TerraResult<usize> {
        self.next_str()?
            .parse()
            .map_err(|_| TerraError::Io("malformed integer field".into()))
    }
}

pub(crate) fn read_points(tokens: &mut Tokens) -> TerraResult<Vec<InputPoint>> {
    let n = tokens.next_usize()?;
    (0..n)
        .map(|i| {
            let x = tokens.next_f64()?;
            let y = tokens.next_f64()?;
            let z = tokens.next_f64()?;
            Ok(InputPoint { pid: PointId(u32::try_from(i).unwrap_or(u32::MAX)), x, y, z })
        })
        .collect()
}

pub(crate) fn read_segments(tokens: &mut Tokens, points: &[InputPoint]) -> TerraResult<Vec<InputSegment>> {
    let m = tokens.next_usize()?;
    (0..m)
        .map(|_| {
            let i = tokens.next_usize()?;
            let j = tokens.next_usize()?;
            let a = points
                .get(i)
                .ok_or_else(|| TerraError::Io(format!("segment references out-of-range point index {i}")))?
                .pid;
            let b = points
                .get(j)
                .ok_or_else(|| TerraError::Io(format!("segment references out-of-range point index {j}")))?
                .pid;
            Ok(InputSegment { a, b })
        })
        .collect()
}

/// Reads a `.pts` file: unconstrained point set for Delaunay refinement.
///
/// # Errors
///
/// Returns [`TerraError::Io`] if the file cannot be read or is malformed.
pub fn read_pts(path: impl AsRef<Path>) -> TerraResult<Vec<InputPoint>> {
    let text = fs::read_to_string(path)?;
    let mut tokens = Tokens::new(&text);
    read_points(&mut tokens)
}

/// Reads a `.seg` file: a `.pts` body plus constraint segments, for CDT
/// refinement.
///
/// # Errors
///
/// Returns [`TerraError::Io`] if the file cannot be read, is malformed, or
/// a segment references an out-of-range point index.
pub fn read_seg(path: impl AsRef<Path>) -> TerraResult<(Vec<InputPoint>, Vec<InputSegment>)> {
    let text = fs::read_to_string(path)?;
    let mut tokens = Tokens::new(&text);
    let points = read_points(&mut tokens)?;
    let segments = read_segments(&mut tokens, &points)?;
    Ok((points, segments))
}
