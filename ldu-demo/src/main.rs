use std::error::Error;
use std::sync::Arc;
use std::time::Instant;

use ldu_core::field::operators::{Multiply, Sqrt};
use ldu_core::ldu::subtract_patch_coefficients;
use ldu_core::{AddressingCache, GpuDevice, Label, LduAddressing, LduMatrix, PatchAddressing};

const NX: usize = 256;
const NY: usize = 256;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .filter_module("wgpu", log::LevelFilter::Off)
        .filter_module("naga", log::LevelFilter::Off)
        .init();

    let (owner, neighbour) = structured_faces(NX, NY);
    let mut topology = AddressingCache::new();
    let addressing = topology.get_or_build(NX * NY, &owner, &neighbour)?;
    println!(
        "Grid {}x{}: {} cells, {} internal faces (epoch {})",
        NX,
        NY,
        addressing.n_cells(),
        addressing.n_faces(),
        addressing.epoch()
    );

    let matrix = laplacian(&addressing)?;
    let west = west_boundary(NX, NY)?;
    let west_coeffs = vec![1.0; west.n_faces()];

    let n = addressing.n_cells();
    let psi: Vec<f64> = (0..n).map(|c| ((c % NX) as f64 * 0.1).sin()).collect();
    let source = vec![1.0; n];

    // --- Host ---
    let start_time = Instant::now();
    let cpu_amul = matrix.amul(&psi)?;
    let cpu_residual = matrix.residual(&psi, &source)?;
    let mut cpu_sum = matrix.row_sum(true);
    subtract_patch_coefficients(&mut cpu_sum, &west, &west_coeffs)?;
    println!("CPU kernels: {:?}", start_time.elapsed());

    // --- Device ---
    let gpu = GpuDevice::new().await?;
    println!("Adapter: {}", gpu.adapter_info().name);

    let start_time = Instant::now();
    let gpu_addressing = gpu.upload_addressing(&addressing)?;
    let gpu_matrix = gpu.upload_matrix(&matrix, gpu_addressing)?;
    let gpu_west = gpu.upload_patch(&west)?;
    let gpu_west_coeffs = gpu.create_field_from_scalars("west coeffs", &west_coeffs);
    let gpu_psi = gpu.create_field_from_scalars("psi", &psi);
    let gpu_source = gpu.create_field_from_scalars("source", &source);
    println!("Upload: {:?}", start_time.elapsed());

    let start_time = Instant::now();
    let mut gpu_amul = gpu.create_empty_field("amul", n);
    gpu.amul(&gpu_matrix, &gpu_psi, &mut gpu_amul).await?;
    let mut gpu_residual = gpu.create_empty_field("residual", n);
    gpu.residual(&gpu_matrix, &gpu_psi, &gpu_source, &mut gpu_residual)
        .await?;
    let mut gpu_sum = gpu.create_empty_field("row sum", n);
    gpu.row_sum(&gpu_matrix, true, &mut gpu_sum).await?;
    gpu.subtract_patch_coefficients(&mut gpu_sum, &gpu_west, &gpu_west_coeffs)
        .await?;
    gpu.wait();
    println!("GPU kernels: {:?}", start_time.elapsed());

    report("amul", &cpu_amul, &gpu_amul.read_scalars().await?);
    report("residual", &cpu_residual, &gpu_residual.read_scalars().await?);
    report("row sum", &cpu_sum, &gpu_sum.read_scalars().await?);

    // Elementwise: A psi scaled by half the diagonal.
    let mut scratch = gpu.create_empty_field("scratch", n);
    gpu.field_field::<Multiply>(&gpu_amul, gpu_matrix.diag(), &mut scratch)
        .await?;
    gpu.field_scalar::<Multiply>(&scratch, 0.5, &mut gpu_amul).await?;
    let diag = matrix.diag().unwrap_or_default();
    let cpu_weighted: Vec<f64> = cpu_amul.iter().zip(diag).map(|(a, d)| 0.5 * a * d).collect();
    report("weighted amul", &cpu_weighted, &gpu_amul.read_scalars().await?);

    gpu.unary::<Sqrt>(&gpu_sum, &mut scratch).await?;
    let cpu_sqrt: Vec<f64> = cpu_sum.iter().map(|s| s.sqrt()).collect();
    report("sqrt(row sum)", &cpu_sqrt, &scratch.read_scalars().await?);

    let ts = gpu.get_transfer_stats();
    log::info!("Bytes transferred To GPU: {}", human_size(ts.bytes_to_gpu));
    log::info!(
        "Bytes transferred From GPU: {}",
        human_size(ts.bytes_from_gpu)
    );

    Ok(())
}

/// Faces of an `nx` x `ny` grid, east then north for each cell, ordered by owner.
fn structured_faces(nx: usize, ny: usize) -> (Vec<Label>, Vec<Label>) {
    let mut owner = Vec::with_capacity(2 * nx * ny);
    let mut neighbour = Vec::with_capacity(2 * nx * ny);
    for j in 0..ny {
        for i in 0..nx {
            let c = j * nx + i;
            if i + 1 < nx {
                owner.push(c);
                neighbour.push(c + 1);
            }
            if j + 1 < ny {
                owner.push(c);
                neighbour.push(c + nx);
            }
        }
    }
    (owner, neighbour)
}

/// Five-point Laplacian: -1 on every face, diagonal equal to the face count plus one.
fn laplacian(addressing: &Arc<LduAddressing>) -> Result<LduMatrix, Box<dyn Error>> {
    let mut diag = vec![1.0; addressing.n_cells()];
    for (&o, &n) in addressing.owner().iter().zip(addressing.neighbour()) {
        diag[o] += 1.0;
        diag[n] += 1.0;
    }
    let upper = vec![-1.0; addressing.n_faces()];
    Ok(LduMatrix::from_symmetric(Arc::clone(addressing), diag, upper)?)
}

fn west_boundary(nx: usize, ny: usize) -> Result<PatchAddressing, Box<dyn Error>> {
    let cells = (0..ny).map(|j| j * nx).collect();
    Ok(PatchAddressing::new(nx * ny, cells)?)
}

fn report(name: &str, cpu: &[f64], gpu: &[f64]) {
    let max_diff = cpu
        .iter()
        .zip(gpu)
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f64::max);
    println!("{:<14} max |cpu - gpu| = {:.3e}", name, max_diff);
}

fn human_size(size: u64) -> String {
    let mut size = size as f64;
    let mut unit = "B";
    let units = ["B", "KB", "MB", "GB", "TB"];
    for &u in &units[1..] {
        if size < 1024.0 {
            break;
        }
        size /= 1024.0;
        unit = u;
    }
    format!("{:.2} {}", size, unit)
}
