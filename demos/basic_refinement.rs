//! Basic example of using the terrain triangulation library.
//!
//! This example shows how to:
//! - Generate a random point set
//! - Refine it into a Delaunay triangulation under an error-driven policy
//! - Inspect the resulting mesh and update history

use log::{info, LevelFilter};
use terra_mt::driver::refine::{RefineConfig, RefineDriver};
use terra_mt::history::{Norm, Termination};
use terra_mt::util::generate_seeded_points;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::new().filter_level(LevelFilter::Info).init();

    info!("Starting basic refinement example");

    let points = generate_seeded_points(200, (0.0, 50.0), (0.0, 50.0), 7)?;
    info!("Generated {} points", points.len());

    let config = RefineConfig {
        constrained: false,
        random: false,
        norm: Norm::Max,
        termination: Termination::ErrorLevel(0.05),
        seed: 7,
    };

    let mut driver = RefineDriver::build(&points, &[], &config)?;
    driver.run_to_completion()?;

    info!(
        "Refinement finished: {} vertices, {} triangles, {} updates, total error {:.4}",
        driver.store().vertex_count(),
        driver.store().triangle_count(),
        driver.history().update_count(),
        driver.history().total_error()
    );

    Ok(())
}
