//! Face-based addressing of an LDU matrix.
//!
//! Faces are numbered in owner order, so the faces owned by a cell form a
//! contiguous range. Faces are not grouped by neighbour; `losort` is the stable
//! permutation that groups them, and `losort_start` delimits each cell's slice
//! of it. Together the two tables let every per-cell kernel gather from both
//! sides of a face without two cells ever writing the same output slot.

use crate::error::{check_sizes, LduError, Result};
use crate::field::Label;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_EPOCH: AtomicU64 = AtomicU64::new(1);

fn next_epoch() -> u64 {
    NEXT_EPOCH.fetch_add(1, Ordering::Relaxed)
}

/// Stable counting sort of `keys` into `n_bins` bins.
///
/// Returns `(start, order)` where `order[start[b]..start[b + 1]]` are the
/// positions of the keys equal to `b`, in ascending position order.
pub(crate) fn counting_sort(n_bins: usize, keys: &[Label]) -> (Vec<Label>, Vec<Label>) {
    let mut start = vec![0; n_bins + 1];
    for &k in keys {
        start[k + 1] += 1;
    }
    for b in 0..n_bins {
        start[b + 1] += start[b];
    }

    let mut cursor = start.clone();
    let mut order = vec![0; keys.len()];
    for (position, &k) in keys.iter().enumerate() {
        order[cursor[k]] = position;
        cursor[k] += 1;
    }
    (start, order)
}

/// Owner/neighbour addressing plus the derived range tables.
#[derive(Debug, Clone)]
pub struct LduAddressing {
    n_cells: usize,
    owner: Vec<Label>,
    neighbour: Vec<Label>,
    owner_start: Vec<Label>,
    losort: Vec<Label>,
    losort_start: Vec<Label>,
    epoch: u64,
}

impl LduAddressing {
    /// Builds the range tables for an owner-ordered face list.
    pub fn new(n_cells: usize, owner: Vec<Label>, neighbour: Vec<Label>) -> Result<Self> {
        check_sizes("ldu addressing", owner.len(), neighbour.len())?;
        check_faces(n_cells, &owner, &neighbour)?;

        let (owner_start, _) = counting_sort(n_cells, &owner);
        let (losort_start, losort) = counting_sort(n_cells, &neighbour);
        let epoch = next_epoch();

        log::debug!(
            "built ldu addressing: {} cells, {} faces, epoch {}",
            n_cells,
            owner.len(),
            epoch
        );

        Ok(Self {
            n_cells,
            owner,
            neighbour,
            owner_start,
            losort,
            losort_start,
            epoch,
        })
    }

    /// Adopts previously derived tables after checking every invariant.
    pub fn from_parts(
        n_cells: usize,
        owner: Vec<Label>,
        neighbour: Vec<Label>,
        owner_start: Vec<Label>,
        losort: Vec<Label>,
        losort_start: Vec<Label>,
    ) -> Result<Self> {
        let addressing = Self {
            n_cells,
            owner,
            neighbour,
            owner_start,
            losort,
            losort_start,
            epoch: next_epoch(),
        };
        addressing.validate()?;
        Ok(addressing)
    }

    /// Checks that the range tables and losort agree with owner/neighbour.
    pub fn validate(&self) -> Result<()> {
        let n = self.n_cells;
        let m = self.owner.len();
        if self.neighbour.len() != m {
            return Err(LduError::topology(format!(
                "owner has {} faces, neighbour has {}",
                m,
                self.neighbour.len()
            )));
        }
        check_faces(n, &self.owner, &self.neighbour)?;
        check_range_table("owner_start", &self.owner_start, n, m)?;
        check_range_table("losort_start", &self.losort_start, n, m)?;

        for c in 0..n {
            if let Some(f) = self.owner_faces(c).find(|&f| self.owner[f] != c) {
                return Err(LduError::topology(format!(
                    "face {} in the owner range of cell {} is owned by cell {}",
                    f, c, self.owner[f]
                )));
            }
        }

        if self.losort.len() != m {
            return Err(LduError::topology(format!(
                "losort has {} entries for {} faces",
                self.losort.len(),
                m
            )));
        }
        let mut seen = vec![false; m];
        for &f in &self.losort {
            if f >= m || std::mem::replace(&mut seen[f], true) {
                return Err(LduError::topology(format!(
                    "losort is not a permutation of the faces (entry {})",
                    f
                )));
            }
        }
        for c in 0..n {
            if let Some(&f) = self.neighbour_faces(c).iter().find(|&&f| self.neighbour[f] != c) {
                return Err(LduError::topology(format!(
                    "face {} in the neighbour range of cell {} has neighbour {}",
                    f, c, self.neighbour[f]
                )));
            }
        }
        Ok(())
    }

    pub fn n_cells(&self) -> usize {
        self.n_cells
    }

    pub fn n_faces(&self) -> usize {
        self.owner.len()
    }

    pub fn owner(&self) -> &[Label] {
        &self.owner
    }

    pub fn neighbour(&self) -> &[Label] {
        &self.neighbour
    }

    pub fn owner_start(&self) -> &[Label] {
        &self.owner_start
    }

    pub fn losort(&self) -> &[Label] {
        &self.losort
    }

    pub fn losort_start(&self) -> &[Label] {
        &self.losort_start
    }

    /// Topology epoch; distinct for every addressing built in this process.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Faces owned by cell `c`.
    pub fn owner_faces(&self, c: Label) -> Range<usize> {
        self.owner_start[c]..self.owner_start[c + 1]
    }

    /// Faces whose neighbour is cell `c`, in ascending face order.
    pub fn neighbour_faces(&self, c: Label) -> &[Label] {
        &self.losort[self.losort_start[c]..self.losort_start[c + 1]]
    }

    /// Internal face shared by cells `a` and `b`, if any.
    pub fn face_between(&self, a: Label, b: Label) -> Option<Label> {
        if a == b || a.max(b) >= self.n_cells {
            return None;
        }
        let (own, nei) = (a.min(b), a.max(b));
        self.owner_faces(own).find(|&f| self.neighbour[f] == nei)
    }
}

fn check_faces(n_cells: usize, owner: &[Label], neighbour: &[Label]) -> Result<()> {
    for (f, (&own, &nei)) in owner.iter().zip(neighbour).enumerate() {
        if nei >= n_cells {
            return Err(LduError::topology(format!(
                "face {} references cell {} in a mesh of {} cells",
                f, nei, n_cells
            )));
        }
        if own >= nei {
            return Err(LduError::topology(format!(
                "face {} has owner {} not below neighbour {}",
                f, own, nei
            )));
        }
        if f > 0 && own < owner[f - 1] {
            return Err(LduError::topology(format!(
                "faces are not in owner order at face {}",
                f
            )));
        }
    }
    Ok(())
}

fn check_range_table(name: &str, start: &[Label], n_cells: usize, n_faces: usize) -> Result<()> {
    if start.len() != n_cells + 1 {
        return Err(LduError::topology(format!(
            "{} has {} entries for {} cells",
            name,
            start.len(),
            n_cells
        )));
    }
    if start[0] != 0 || start[n_cells] != n_faces {
        return Err(LduError::topology(format!(
            "{} must run from 0 to {}",
            name, n_faces
        )));
    }
    if start.windows(2).any(|w| w[0] > w[1]) {
        return Err(LduError::topology(format!("{} is not monotonic", name)));
    }
    Ok(())
}

/// Keeps the addressing of the current topology and rebuilds it only when the
/// face connectivity changes.
///
/// Rebuilding is not synchronised with kernels already holding the previous
/// `Arc`; callers serialise topology changes against kernel use.
#[derive(Debug, Default)]
pub struct AddressingCache {
    current: Option<Arc<LduAddressing>>,
}

impl AddressingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_build(
        &mut self,
        n_cells: usize,
        owner: &[Label],
        neighbour: &[Label],
    ) -> Result<Arc<LduAddressing>> {
        if let Some(current) = &self.current {
            if current.n_cells == n_cells
                && current.owner == owner
                && current.neighbour == neighbour
            {
                return Ok(Arc::clone(current));
            }
            log::debug!("topology changed, rebuilding addressing (was epoch {})", current.epoch);
        }
        // A failed rebuild must not leave the previous topology current.
        self.invalidate();
        let built = Arc::new(LduAddressing::new(n_cells, owner.to_vec(), neighbour.to_vec())?);
        self.current = Some(Arc::clone(&built));
        Ok(built)
    }

    /// Drops the cached addressing; the next `get_or_build` starts a new epoch.
    pub fn invalidate(&mut self) {
        if let Some(old) = self.current.take() {
            log::debug!("invalidated addressing epoch {}", old.epoch);
        }
    }

    pub fn current(&self) -> Option<&Arc<LduAddressing>> {
        self.current.as_ref()
    }

    pub fn current_epoch(&self) -> Option<u64> {
        self.current.as_ref().map(|a| a.epoch)
    }

    /// Fails with `TopologyInvalid` unless `addressing` is the cached one.
    pub fn check_current(&self, addressing: &LduAddressing) -> Result<()> {
        match self.current_epoch() {
            Some(epoch) if epoch == addressing.epoch => Ok(()),
            Some(epoch) => Err(LduError::topology(format!(
                "addressing epoch {} is stale, current topology is epoch {}",
                addressing.epoch, epoch
            ))),
            None => Err(LduError::topology(format!(
                "addressing epoch {} used after the topology was invalidated",
                addressing.epoch
            ))),
        }
    }
}
