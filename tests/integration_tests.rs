//! Integration tests exercising full refinement and decimation workflows
//! through the public library API.

use terra_mt::driver::decimate::{DecimateConfig, DecimateDriver};
use terra_mt::driver::refine::{RefineConfig, RefineDriver};
use terra_mt::history::{Norm, Termination};
use terra_mt::util::generate_seeded_points;

fn refine_config(termination: Termination) -> RefineConfig {
    RefineConfig { constrained: false, random: false, norm: Norm::Max, termination, seed: 11 }
}

#[test]
fn full_refinement_workflow_converges_and_preserves_invariants() {
    let points = generate_seeded_points(120, (0.0, 30.0), (0.0, 30.0), 3).unwrap();
    let mut driver = RefineDriver::build(&points, &[], &refine_config(Termination::UpdateCount(None))).unwrap();
    driver.run_to_completion().unwrap();

    driver.store().debug_check_invariants().unwrap();
    assert_eq!(driver.store().vertex_count(), points.len());
    assert!(driver.history().total_error() < 1e-6);
}

#[test]
fn refinement_then_decimation_round_trips_vertex_count() {
    let points = generate_seeded_points(150, (0.0, 30.0), (0.0, 30.0), 5).unwrap();
    let mut refine = RefineDriver::build(&points, &[], &refine_config(Termination::UpdateCount(None))).unwrap();
    refine.run_to_completion().unwrap();
    let (store, _history) = refine.into_parts();
    let before = store.vertex_count();

    let decimate_config = DecimateConfig {
        max_degree: 64,
        allow_features_del: true,
        allow_chain_brk: true,
        simultaneous: false,
    };
    let mut decimate = DecimateDriver::build(store, decimate_config, Norm::Max, Termination::UpdateCount(Some(20)))
        .unwrap();
    decimate.run_to_completion().unwrap();

    decimate.store().debug_check_invariants().unwrap();
    assert_eq!(decimate.history().update_count(), 20);
    assert_eq!(decimate.store().vertex_count(), before - 20);
}

#[test]
fn error_level_termination_stops_refinement_above_zero_error() {
    let points = generate_seeded_points(200, (0.0, 40.0), (0.0, 40.0), 9).unwrap();
    let mut driver = RefineDriver::build(&points, &[], &refine_config(Termination::ErrorLevel(0.1))).unwrap();
    driver.run_to_completion().unwrap();

    assert!(driver.history().total_error() <= 0.1 || driver.store().vertex_count() == points.len());
    driver.store().debug_check_invariants().unwrap();
}

#[test]
fn simultaneous_decimation_preserves_mesh_invariants() {
    let points = generate_seeded_points(180, (0.0, 20.0), (0.0, 20.0), 13).unwrap();
    let mut refine = RefineDriver::build(&points, &[], &refine_config(Termination::UpdateCount(None))).unwrap();
    refine.run_to_completion().unwrap();
    let (store, _history) = refine.into_parts();

    let decimate_config = DecimateConfig {
        max_degree: 64,
        allow_features_del: true,
        allow_chain_brk: true,
        simultaneous: true,
    };
    let mut decimate = DecimateDriver::build(store, decimate_config, Norm::Max, Termination::UpdateCount(Some(10)))
        .unwrap();
    decimate.run_to_completion().unwrap();
    decimate.store().debug_check_invariants().unwrap();
}
