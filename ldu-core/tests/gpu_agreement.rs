//! Host and device kernels must agree to single precision.

mod common;

use common::{assert_approx_eq_vec, chain4, gpu_device, random_addressing, random_values};
use ldu_core::field::operators::*;
use ldu_core::field;
use ldu_core::ldu::subtract_patch_coefficients;
use ldu_core::{AtomicAdd, GpuDevice, LduError, LduMatrix, PatchAddressing, Scalar};
use pollster::block_on;
use std::sync::Arc;

const TOL: f64 = 1e-4;

fn random_matrix(seed: u64, n_cells: usize, max_faces: usize) -> LduMatrix {
    let addressing = random_addressing(seed, n_cells, max_faces);
    let mut rng = fastrand::Rng::with_seed(seed);
    LduMatrix::from_asymmetric(
        Arc::clone(&addressing),
        random_values(&mut rng, addressing.n_cells()),
        random_values(&mut rng, addressing.n_faces()),
        random_values(&mut rng, addressing.n_faces()),
    )
    .unwrap()
}

#[test]
fn chain_golden_values_on_device() -> Result<(), LduError> {
    let Some(device) = gpu_device() else { return Ok(()) };
    block_on(async {
        let matrix = LduMatrix::from_symmetric(chain4(), vec![2.0; 4], vec![1.0; 3])?;
        let addressing = device.upload_addressing(matrix.addressing())?;
        let gpu_matrix = device.upload_matrix(&matrix, addressing)?;

        let psi = device.create_field("psi", &[1.0, 2.0, 3.0, 4.0]);
        let mut out = device.create_empty_field("out", 4);
        device.amul(&gpu_matrix, &psi, &mut out).await?;
        assert_approx_eq_vec(&out.read_scalars().await?, &[4.0, 8.0, 12.0, 11.0], TOL);

        device.row_sum(&gpu_matrix, true, &mut out).await?;
        assert_approx_eq_vec(&out.read_scalars().await?, &[3.0, 4.0, 4.0, 3.0], TOL);
        Ok(())
    })
}

#[test]
fn multiply_kernels_agree_with_host() -> Result<(), LduError> {
    let Some(device) = gpu_device() else { return Ok(()) };
    block_on(async {
        let matrix = random_matrix(101, 500, 1500);
        let n = matrix.addressing().n_cells();
        let mut rng = fastrand::Rng::with_seed(5);
        let psi = random_values(&mut rng, n);
        let source = random_values(&mut rng, n);

        let addressing = device.upload_addressing(matrix.addressing())?;
        let gpu_matrix = device.upload_matrix(&matrix, addressing)?;
        let gpu_psi = device.create_field_from_scalars("psi", &psi);
        let gpu_source = device.create_field_from_scalars("source", &source);
        let mut out = device.create_empty_field("out", n);

        device.amul(&gpu_matrix, &gpu_psi, &mut out).await?;
        assert_approx_eq_vec(&out.read_scalars().await?, &matrix.amul(&psi)?, TOL);

        device.tmul(&gpu_matrix, &gpu_psi, &mut out).await?;
        assert_approx_eq_vec(&out.read_scalars().await?, &matrix.tmul(&psi)?, TOL);

        device.residual(&gpu_matrix, &gpu_psi, &gpu_source, &mut out).await?;
        assert_approx_eq_vec(&out.read_scalars().await?, &matrix.residual(&psi, &source)?, TOL);

        device.h_operator(&gpu_matrix, &gpu_psi, &mut out).await?;
        assert_approx_eq_vec(&out.read_scalars().await?, &matrix.h_operator(&psi)?, TOL);

        device.row_sum(&gpu_matrix, false, &mut out).await?;
        assert_approx_eq_vec(&out.read_scalars().await?, &matrix.row_sum(false), TOL);
        Ok(())
    })
}

#[test]
fn stale_device_addressing_is_rejected() -> Result<(), LduError> {
    let Some(device) = gpu_device() else { return Ok(()) };
    let old = random_matrix(3, 10, 20);
    let new = random_matrix(4, 10, 20);
    let addressing = device.upload_addressing(old.addressing())?;
    assert!(matches!(
        device.upload_matrix(&new, addressing),
        Err(LduError::TopologyInvalid(_))
    ));
    Ok(())
}

#[test]
fn patch_correction_agrees_with_host() -> Result<(), LduError> {
    let Some(device) = gpu_device() else { return Ok(()) };
    block_on(async {
        let mut rng = fastrand::Rng::with_seed(17);
        let n_cells = 200;
        let face_cells: Vec<usize> = (0..350).map(|_| rng.usize(0..n_cells)).collect();
        let patch = PatchAddressing::new(n_cells, face_cells)?;
        let coeffs = random_values(&mut rng, patch.n_faces());
        let mut sum = random_values(&mut rng, n_cells);

        let gpu_patch = device.upload_patch(&patch)?;
        let gpu_coeffs = device.create_field_from_scalars("coeffs", &coeffs);
        let mut gpu_sum = device.create_field_from_scalars("sum", &sum);

        // Applied twice: the correction accumulates.
        for _ in 0..2 {
            subtract_patch_coefficients(&mut sum, &patch, &coeffs)?;
            device
                .subtract_patch_coefficients(&mut gpu_sum, &gpu_patch, &gpu_coeffs)
                .await?;
        }
        assert_approx_eq_vec(&gpu_sum.read_scalars().await?, &sum, TOL);
        Ok(())
    })
}

async fn check_binary<Op: WgslBinary>(device: &GpuDevice, a: &[Scalar], b: &[Scalar], s: Scalar) -> Result<(), LduError> {
    let gpu_a = device.create_field_from_scalars("a", a);
    let gpu_b = device.create_field_from_scalars("b", b);
    let mut out = device.create_empty_field("out", a.len());

    device.field_field::<Op>(&gpu_a, &gpu_b, &mut out).await?;
    assert_approx_eq_vec(&out.read_scalars().await?, &field::field_field::<Op, _, _>(a, b)?, TOL);

    device.field_scalar::<Op>(&gpu_a, s as f32, &mut out).await?;
    assert_approx_eq_vec(&out.read_scalars().await?, &field::field_scalar::<Op, _, _>(a, s), TOL);

    device.scalar_field::<Op>(s as f32, &gpu_b, &mut out).await?;
    assert_approx_eq_vec(&out.read_scalars().await?, &field::scalar_field::<Op, _, _>(s, b), TOL);
    Ok(())
}

async fn check_unary<F: WgslUnary>(device: &GpuDevice, a: &[Scalar]) -> Result<(), LduError> {
    let gpu_a = device.create_field_from_scalars("a", a);
    let mut out = device.create_empty_field("out", a.len());
    device.unary::<F>(&gpu_a, &mut out).await?;
    assert_approx_eq_vec(&out.read_scalars().await?, &field::unary::<F, _>(a), TOL);
    Ok(())
}

#[test]
fn elementwise_kernels_agree_with_host() -> Result<(), LduError> {
    let Some(device) = gpu_device() else { return Ok(()) };
    block_on(async {
        // Values exactly representable in f32 so host and device see the same operands.
        let mixed = [-2.5, -0.75, 0.5, 1.25, 3.0, -4.0];
        let other = [1.5, -2.0, 0.25, -0.5, 2.0, 4.0];
        let positive = [0.5, 1.25, 2.0, 3.5, 4.0, 0.75];

        check_binary::<Add>(&device, &mixed, &other, -1.5).await?;
        check_binary::<Subtract>(&device, &mixed, &other, 0.5).await?;
        check_binary::<Multiply>(&device, &mixed, &other, 2.0).await?;
        check_binary::<Divide>(&device, &mixed, &other, -0.25).await?;
        check_binary::<Min>(&device, &mixed, &other, 0.0).await?;
        check_binary::<Max>(&device, &mixed, &other, 0.0).await?;
        check_binary::<MinMod>(&device, &mixed, &other, -1.0).await?;
        check_binary::<Atan2>(&device, &mixed, &other, 1.0).await?;
        check_binary::<Pow>(&device, &positive, &other, 1.5).await?;

        check_unary::<Sqrt>(&device, &positive).await?;
        check_unary::<Exp>(&device, &mixed).await?;
        check_unary::<Log>(&device, &positive).await?;
        check_unary::<Sin>(&device, &mixed).await?;
        check_unary::<Tanh>(&device, &mixed).await?;
        check_unary::<Sign>(&device, &mixed).await?;
        check_unary::<Round>(&device, &mixed).await?;
        check_unary::<Cbrt>(&device, &mixed).await?;
        check_unary::<Mag>(&device, &mixed).await?;
        check_unary::<Negate>(&device, &mixed).await?;
        check_unary::<Erf>(&device, &mixed).await?;
        check_unary::<Erfc>(&device, &mixed).await?;
        check_unary::<Lgamma>(&device, &positive).await?;
        check_unary::<Lgamma>(&device, &[-2.5, -0.75, -1.5]).await?;
        Ok(())
    })
}

#[test]
fn indirect_access_agrees_with_host() -> Result<(), LduError> {
    let Some(device) = gpu_device() else { return Ok(()) };
    block_on(async {
        let mut rng = fastrand::Rng::with_seed(23);
        let mut addr: Vec<usize> = (0..100).collect();
        rng.shuffle(&mut addr);
        addr.truncate(60);
        let written: Vec<f32> = (0..60).map(|i| i as f32 * 0.5).collect();

        let labels = device.create_labels("addr", &addr)?;
        assert!(labels.is_unique());
        let source = device.create_field("source", &written);
        let mut target = device.create_field("target", &vec![-1.0; 100]);
        device.indirect_assign(&mut target, &labels, &source).await?;

        let contents = target.read_contents().await?;
        let read: Vec<f32> = addr.iter().map(|&i| contents[i]).collect();
        assert_eq!(read, written);

        device.indirect_fill(&mut target, &labels, 9.0).await?;
        let contents = target.read_contents().await?;
        assert!(addr.iter().all(|&i| contents[i] == 9.0));
        assert_eq!(contents.iter().filter(|&&v| v == -1.0).count(), 40);

        let short = device.create_field("short", &[0.0; 10]);
        let mut short_target = device.create_field("short target", &[0.0; 10]);
        assert!(matches!(
            device.indirect_assign(&mut short_target, &labels, &short).await,
            Err(LduError::SizeMismatch { .. })
        ));
        Ok(())
    })
}

#[test]
fn atomic_capabilities_and_transfer_stats() -> Result<(), LduError> {
    let Some(device) = gpu_device() else { return Ok(()) };
    assert!(device.has_atomic_add::<u32>());
    assert!(!device.has_atomic_add::<f64>());
    assert_eq!(
        device.has_atomic_add::<f32>(),
        <f32 as AtomicAdd>::supported(device.capabilities())
    );

    device.reset_transfer_stats();
    let field = device.create_field("stats", &[1.0, 2.0, 3.0]);
    let back = block_on(field.read_contents())?;
    assert_eq!(back, vec![1.0, 2.0, 3.0]);
    let stats = device.get_transfer_stats();
    assert_eq!(stats.bytes_to_gpu, 12);
    assert_eq!(stats.bytes_from_gpu, 12);
    Ok(())
}
