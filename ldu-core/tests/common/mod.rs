#![allow(dead_code)]

use ldu_core::{DeviceConfig, GpuDevice, Label, LduAddressing};
use std::sync::Arc;

pub fn init_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .filter_module("wgpu_core", log::LevelFilter::Warn)
        .filter_module("wgpu_hal", log::LevelFilter::Warn)
        .filter_module("naga", log::LevelFilter::Warn)
        .is_test(true)
        .try_init();
}

// Helper for float comparison in tests
pub fn assert_approx_eq_vec(a: &[f64], b: &[f64], tolerance: f64) {
    assert_eq!(a.len(), b.len(), "Vector lengths differ");
    for i in 0..a.len() {
        let diff = (a[i] - b[i]).abs();
        assert!(
            diff <= tolerance * (1.0 + b[i].abs()),
            "Verification failed at index {}: expected {}, got {}, diff {}",
            i,
            b[i],
            a[i],
            diff
        );
    }
}

/// The 4-cell chain (0,1), (1,2), (2,3).
pub fn chain4() -> Arc<LduAddressing> {
    Arc::new(LduAddressing::new(4, vec![0, 1, 2], vec![1, 2, 3]).unwrap())
}

/// Random upper-triangular face list over `n_cells`, ordered by owner.
pub fn random_faces(rng: &mut fastrand::Rng, n_cells: usize, max_faces: usize) -> (Vec<Label>, Vec<Label>) {
    let mut pairs = Vec::with_capacity(max_faces);
    for _ in 0..max_faces {
        let a = rng.usize(0..n_cells);
        let b = rng.usize(0..n_cells);
        if a != b {
            pairs.push((a.min(b), a.max(b)));
        }
    }
    pairs.sort_unstable();
    pairs.dedup();
    pairs.into_iter().unzip()
}

pub fn random_addressing(seed: u64, n_cells: usize, max_faces: usize) -> Arc<LduAddressing> {
    let mut rng = fastrand::Rng::with_seed(seed);
    let (owner, neighbour) = random_faces(&mut rng, n_cells, max_faces);
    Arc::new(LduAddressing::new(n_cells, owner, neighbour).unwrap())
}

pub fn random_values(rng: &mut fastrand::Rng, n: usize) -> Vec<f64> {
    (0..n).map(|_| rng.f64() * 2.0 - 1.0).collect()
}

/// A device for the agreement tests, or `None` (with a log line) when the
/// machine has no usable adapter.
pub fn gpu_device() -> Option<GpuDevice> {
    init_logger();
    match pollster::block_on(GpuDevice::with_config(DeviceConfig::permissive())) {
        Ok(device) => Some(device),
        Err(e) => {
            log::warn!("Skipping GPU test, no device available: {}", e);
            None
        }
    }
}
