//! Terrain triangulator binary executable.
//!
//! Refines a point set into a Delaunay (or constrained Delaunay)
//! triangulation, or decimates an existing one, per the chosen mode.

use terra_mt::{run, TerraConfig};

fn main() {
    env_logger::init();

    let config = TerraConfig::from_args();
    if let Err(msg) = config.validate() {
        log::error!("invalid configuration: {msg}");
        std::process::exit(1);
    }

    match run(&config) {
        Ok(history) => {
            log::info!("completed {} updates", history.update_count());
        }
        Err(e) => {
            log::error!("triangulator run failed: {e}");
            std::process::exit(1);
        }
    }
}
