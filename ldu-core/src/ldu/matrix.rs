use super::addressing::LduAddressing;
use crate::error::{check_sizes, LduError, Result};
use crate::field::Scalar;
use crate::traits::LduShape;
use std::borrow::Cow;
use std::sync::Arc;

/// Face-addressed sparse matrix: one diagonal coefficient per cell and one
/// upper/lower pair per internal face.
///
/// `upper[f]` is the coefficient in the owner's row, `lower[f]` the one in the
/// neighbour's row. A matrix that only carries `upper` is symmetric and reads it
/// for both triangles. Coefficient arrays are allocated on first mutable access.
#[derive(Debug, Clone)]
pub struct LduMatrix {
    addressing: Arc<LduAddressing>,
    diag: Option<Vec<Scalar>>,
    upper: Option<Vec<Scalar>>,
    lower: Option<Vec<Scalar>>,
}

impl LduMatrix {
    /// A matrix with no coefficients allocated.
    pub fn new(addressing: Arc<LduAddressing>) -> Self {
        Self {
            addressing,
            diag: None,
            upper: None,
            lower: None,
        }
    }

    pub fn from_symmetric(
        addressing: Arc<LduAddressing>,
        diag: Vec<Scalar>,
        upper: Vec<Scalar>,
    ) -> Result<Self> {
        check_sizes("ldu diagonal", addressing.n_cells(), diag.len())?;
        check_sizes("ldu upper", addressing.n_faces(), upper.len())?;
        Ok(Self {
            addressing,
            diag: Some(diag),
            upper: Some(upper),
            lower: None,
        })
    }

    pub fn from_asymmetric(
        addressing: Arc<LduAddressing>,
        diag: Vec<Scalar>,
        lower: Vec<Scalar>,
        upper: Vec<Scalar>,
    ) -> Result<Self> {
        check_sizes("ldu diagonal", addressing.n_cells(), diag.len())?;
        check_sizes("ldu lower", addressing.n_faces(), lower.len())?;
        check_sizes("ldu upper", addressing.n_faces(), upper.len())?;
        Ok(Self {
            addressing,
            diag: Some(diag),
            upper: Some(upper),
            lower: Some(lower),
        })
    }

    pub fn addressing(&self) -> &Arc<LduAddressing> {
        &self.addressing
    }

    pub fn has_diag(&self) -> bool {
        self.diag.is_some()
    }

    pub fn has_upper(&self) -> bool {
        self.upper.is_some()
    }

    pub fn has_lower(&self) -> bool {
        self.lower.is_some()
    }

    /// Only the diagonal is allocated.
    pub fn diagonal(&self) -> bool {
        self.diag.is_some() && self.upper.is_none() && self.lower.is_none()
    }

    pub fn symmetric(&self) -> bool {
        self.upper.is_some() && self.lower.is_none()
    }

    pub fn asymmetric(&self) -> bool {
        self.upper.is_some() && self.lower.is_some()
    }

    pub fn diag(&self) -> Option<&[Scalar]> {
        self.diag.as_deref()
    }

    /// Upper coefficients, falling back to `lower` when only that is allocated.
    pub fn upper(&self) -> Option<&[Scalar]> {
        self.upper.as_deref().or(self.lower.as_deref())
    }

    /// Lower coefficients, falling back to `upper` for a symmetric matrix.
    pub fn lower(&self) -> Option<&[Scalar]> {
        self.lower.as_deref().or(self.upper.as_deref())
    }

    pub fn diag_mut(&mut self) -> &mut [Scalar] {
        let n = self.addressing.n_cells();
        self.diag.get_or_insert_with(|| vec![0.0; n])
    }

    pub fn upper_mut(&mut self) -> &mut [Scalar] {
        if self.upper.is_none() {
            let m = self.addressing.n_faces();
            self.upper = Some(self.lower.clone().unwrap_or_else(|| vec![0.0; m]));
        }
        self.upper.get_or_insert_with(Vec::new)
    }

    /// Mutable lower coefficients. On a symmetric matrix this copies `upper`,
    /// after which the matrix is asymmetric.
    pub fn lower_mut(&mut self) -> &mut [Scalar] {
        if self.lower.is_none() {
            let m = self.addressing.n_faces();
            self.lower = Some(self.upper.clone().unwrap_or_else(|| vec![0.0; m]));
        }
        self.lower.get_or_insert_with(Vec::new)
    }

    pub(crate) fn diag_or_zero(&self) -> Cow<'_, [Scalar]> {
        match &self.diag {
            Some(d) => Cow::Borrowed(d),
            None => Cow::Owned(vec![0.0; self.addressing.n_cells()]),
        }
    }

    pub(crate) fn upper_or_zero(&self) -> Cow<'_, [Scalar]> {
        match self.upper() {
            Some(u) => Cow::Borrowed(u),
            None => Cow::Owned(vec![0.0; self.addressing.n_faces()]),
        }
    }

    pub(crate) fn lower_or_zero(&self) -> Cow<'_, [Scalar]> {
        match self.lower() {
            Some(l) => Cow::Borrowed(l),
            None => Cow::Owned(vec![0.0; self.addressing.n_faces()]),
        }
    }

    pub fn negate(&mut self) {
        for coeffs in [&mut self.diag, &mut self.upper, &mut self.lower]
            .into_iter()
            .flatten()
        {
            coeffs.iter_mut().for_each(|c| *c = -*c);
        }
    }

    pub fn scale(&mut self, s: Scalar) {
        for coeffs in [&mut self.diag, &mut self.upper, &mut self.lower]
            .into_iter()
            .flatten()
        {
            coeffs.iter_mut().for_each(|c| *c *= s);
        }
    }

    pub fn add_assign(&mut self, other: &LduMatrix) -> Result<()> {
        self.combine(other, 1.0)
    }

    pub fn sub_assign(&mut self, other: &LduMatrix) -> Result<()> {
        self.combine(other, -1.0)
    }

    fn combine(&mut self, other: &LduMatrix, sign: Scalar) -> Result<()> {
        if self.addressing.epoch() != other.addressing.epoch() {
            return Err(LduError::topology(format!(
                "cannot combine matrices of topology epochs {} and {}",
                self.addressing.epoch(),
                other.addressing.epoch()
            )));
        }

        if let Some(d) = &other.diag {
            accumulate(self.diag_mut(), d, sign);
        }
        if other.upper.is_none() && other.lower.is_none() {
            return Ok(());
        }

        let asymmetric = other.asymmetric() || self.lower.is_some();
        let m = self.addressing.n_faces();
        match (self.upper.is_some(), self.lower.is_some()) {
            (false, false) => {
                self.upper = Some(vec![0.0; m]);
                if asymmetric {
                    self.lower = Some(vec![0.0; m]);
                }
            }
            (true, false) if asymmetric => self.lower = self.upper.clone(),
            (false, true) => self.upper = self.lower.clone(),
            _ => {}
        }

        if let (Some(upper), Some(ou)) = (self.upper.as_mut(), other.upper()) {
            accumulate(upper, ou, sign);
        }
        if let (Some(lower), Some(ol)) = (self.lower.as_mut(), other.lower()) {
            accumulate(lower, ol, sign);
        }
        Ok(())
    }
}

fn accumulate(target: &mut [Scalar], source: &[Scalar], sign: Scalar) {
    target
        .iter_mut()
        .zip(source)
        .for_each(|(t, &s)| *t += sign * s);
}

impl LduShape for LduMatrix {
    type Value = Scalar;

    fn n_cells(&self) -> usize {
        self.addressing.n_cells()
    }

    fn n_faces(&self) -> usize {
        self.addressing.n_faces()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addressing() -> Arc<LduAddressing> {
        Arc::new(LduAddressing::new(3, vec![0, 1], vec![1, 2]).unwrap())
    }

    #[test]
    fn predicates_follow_allocation() {
        let mut m = LduMatrix::new(addressing());
        assert!(!m.diagonal() && !m.symmetric() && !m.asymmetric());
        m.diag_mut()[0] = 1.0;
        assert!(m.diagonal());
        m.upper_mut()[1] = 2.0;
        assert!(m.symmetric());
        assert_eq!(m.lower(), Some(&[0.0, 2.0][..]));
        m.lower_mut()[0] = 3.0;
        assert!(m.asymmetric());
        assert_eq!(m.upper(), Some(&[0.0, 2.0][..]));
        assert_eq!(m.lower(), Some(&[3.0, 2.0][..]));
    }

    #[test]
    fn constructors_check_lengths() {
        assert!(LduMatrix::from_symmetric(addressing(), vec![1.0; 2], vec![0.0; 2]).is_err());
        assert!(
            LduMatrix::from_asymmetric(addressing(), vec![1.0; 3], vec![0.0; 1], vec![0.0; 2])
                .is_err()
        );
    }

    #[test]
    fn adding_asymmetric_to_symmetric_keeps_both_triangles() {
        let a = addressing();
        let mut sym = LduMatrix::from_symmetric(a.clone(), vec![1.0; 3], vec![1.0, 2.0]).unwrap();
        let asym =
            LduMatrix::from_asymmetric(a, vec![1.0; 3], vec![10.0, 20.0], vec![-1.0, -2.0]).unwrap();
        sym.add_assign(&asym).unwrap();
        assert!(sym.asymmetric());
        assert_eq!(sym.diag(), Some(&[2.0, 2.0, 2.0][..]));
        assert_eq!(sym.upper(), Some(&[0.0, 0.0][..]));
        assert_eq!(sym.lower(), Some(&[11.0, 22.0][..]));

        sym.sub_assign(&asym).unwrap();
        assert_eq!(sym.upper(), Some(&[1.0, 2.0][..]));
        assert_eq!(sym.lower(), Some(&[1.0, 2.0][..]));
    }

    #[test]
    fn adding_into_an_empty_matrix_copies_the_other() {
        let a = addressing();
        let mut empty = LduMatrix::new(a.clone());
        let asym =
            LduMatrix::from_asymmetric(a, vec![1.0; 3], vec![10.0, 20.0], vec![-1.0, -2.0]).unwrap();
        empty.add_assign(&asym).unwrap();
        assert_eq!(empty.upper(), Some(&[-1.0, -2.0][..]));
        assert_eq!(empty.lower(), Some(&[10.0, 20.0][..]));
    }

    #[test]
    fn combining_across_topologies_fails() {
        let mut a = LduMatrix::from_symmetric(addressing(), vec![1.0; 3], vec![1.0; 2]).unwrap();
        let b = LduMatrix::from_symmetric(addressing(), vec![1.0; 3], vec![1.0; 2]).unwrap();
        assert!(matches!(a.add_assign(&b), Err(LduError::TopologyInvalid(_))));
    }

    #[test]
    fn negate_and_scale() {
        let mut m = LduMatrix::from_symmetric(addressing(), vec![1.0, 2.0, 3.0], vec![4.0, 5.0]).unwrap();
        m.negate();
        m.scale(2.0);
        assert_eq!(m.diag(), Some(&[-2.0, -4.0, -6.0][..]));
        assert_eq!(m.upper(), Some(&[-8.0, -10.0][..]));
    }
}
