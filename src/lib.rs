#![allow(clippy::multiple_crate_versions)]
#![warn(missing_docs)]

//! A 2.5-D terrain triangulation engine: Delaunay refinement from a point
//! set up to a target fidelity, and decimation of an existing mesh down to
//! one, recording every step as a multi-resolution (MT) history.
//!
//! # Key Features
//!
//! - Robust orientation/in-circle predicates and a walking point locator
//! - Constrained Delaunay (CDT) support: segments that must survive as
//!   mesh edges through both refinement and decimation
//! - Error-driven or random candidate selection, under a max/mean/RMS norm
//! - `.pts`/`.seg`/`.tri`/`.cdt` file formats for interoperating with the
//!   rest of a terrain pipeline
//!
//! # Example
//!
//! ```rust,no_run
//! use terra_mt::{TerraConfig, run};
//! // TerraConfig requires command-line arguments, so this is marked no_run.
//! ```

/// Configuration management for triangulator runs.
pub mod config;

/// Error types for the triangulator.
pub mod errors;

/// Random point-set generation for demos and tests.
pub mod util;

/// Geometric primitives: orientation, in-circle, and interpolation
/// predicates shared by every other module.
pub mod geometry;

/// Arena-based mesh storage: vertices, edges, triangles, and the
/// cross-reference bookkeeping between them.
pub mod mesh;

/// The walking point locator.
pub mod locate;

/// Balanced index structures used by the driver and influence-region
/// engine: an ordered multimap and an arena-indexed doubly-linked list.
pub mod index;

/// The influence-region engine: point insertion, vertex removal, and the
/// edge-swap optimization shared by both.
pub mod influence;

/// Constrained Delaunay edges: inserting a segment as mesh edges, and
/// gating vertex removal on how many constraints a vertex carries.
pub mod constraint;

/// The multi-resolution (MT) history tracer.
pub mod history;

/// The refinement and decimation drivers built on top of the
/// influence-region engine.
pub mod driver;

/// `.pts`/`.seg`/`.tri`/`.cdt` file I/O.
pub mod io;

pub use config::{Mode, NormKind, TerminationKind, TerraConfig};
pub use driver::decimate::{DecimateConfig, DecimateDriver};
pub use driver::refine::{RefineConfig, RefineDriver};
pub use errors::{TerraError, TerraResult};
pub use history::{HistorySummary, HistoryTracer};
pub use mesh::MeshStore;

/// Runs one triangulator pass end to end: reads the configured input file,
/// refines or decimates it according to `config`, and writes the result if
/// an output path was given.
///
/// # Errors
///
/// Propagates any I/O, parse, or mesh-construction failure.
pub fn run(config: &TerraConfig) -> TerraResult<HistoryTracer> {
    match config.mode {
        Mode::Refine => run_refine(config),
        Mode::Decimate => run_decimate(config),
    }
}

fn run_refine(config: &TerraConfig) -> TerraResult<HistoryTracer> {
    let (points, segments) = if config.constrained {
        io::read_seg(&config.input)?
    } else {
        (io::read_pts(&config.input)?, Vec::new())
    };
    log::info!("read {} points, {} constraint segments", points.len(), segments.len());

    let refine_config = config.to_refine_config();
    let mut driver = RefineDriver::build(&points, &segments, &refine_config)?;
    driver.run_to_completion()?;
    log::info!(
        "refinement finished after {} updates, total error {:.6}",
        driver.history().update_count(),
        driver.history().total_error()
    );

    let (store, history) = driver.into_parts();
    if let Some(output) = &config.output {
        if config.constrained {
            io::write_cdt(output, &store)?;
        } else {
            io::write_tri(output, &store)?;
        }
    }
    Ok(history)
}

fn run_decimate(config: &TerraConfig) -> TerraResult<HistoryTracer> {
    let store = if config.constrained {
        io::read_cdt(&config.input)?
    } else {
        io::read_tri(&config.input)?
    };
    log::info!("read {} vertices, {} triangles", store.vertex_count(), store.triangle_count());

    let decimate_config = config.to_decimate_config();
    let mut driver = DecimateDriver::build(store, decimate_config, config.to_norm(), config.to_termination())?;
    driver.run_to_completion()?;
    log::info!(
        "decimation finished after {} updates, total error {:.6}",
        driver.history().update_count(),
        driver.history().total_error()
    );

    let (store, history) = driver.into_parts();
    if let Some(output) = &config.output {
        if config.constrained {
            io::write_cdt(output, &store)?;
        } else {
            io::write_tri(output, &store)?;
        }
    }
    Ok(history)
}
