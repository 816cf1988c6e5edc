//! Non-owning views that address a backing array through an index list.
//!
//! Element `i` of a view is `values[addr[i]]`. Index lists are bounds-checked
//! once on construction; after that every access is in range by construction.

use crate::error::{check_sizes, LduError, Result};
use crate::field::Label;
use rayon::prelude::*;

fn check_addressing(addr: &[Label], len: usize) -> Result<()> {
    if let Some(&bad) = addr.iter().find(|&&i| i >= len) {
        log::error!("indirect addressing index {} outside list of length {}", bad, len);
        return Err(LduError::IndexOutOfRange { index: bad, len });
    }
    Ok(())
}

/// Whether no index appears twice. Costs a sorted copy of the list, independent
/// of the size of the array it addresses.
pub(crate) fn is_duplicate_free(addr: &[Label]) -> bool {
    let mut sorted = addr.to_vec();
    sorted.par_sort_unstable();
    sorted.windows(2).all(|w| w[0] != w[1])
}

/// Read-only gather view.
#[derive(Debug, Clone, Copy)]
pub struct IndirectView<'a, T> {
    values: &'a [T],
    addr: &'a [Label],
}

impl<'a, T: Copy + Sync> IndirectView<'a, T> {
    pub fn new(values: &'a [T], addr: &'a [Label]) -> Result<Self> {
        check_addressing(addr, values.len())?;
        Ok(Self { values, addr })
    }

    pub fn len(&self) -> usize {
        self.addr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addr.is_empty()
    }

    pub fn addressing(&self) -> &'a [Label] {
        self.addr
    }

    pub fn get(&self, i: usize) -> T {
        self.values[self.addr[i]]
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + 'a {
        let values = self.values;
        self.addr.iter().map(move |&i| values[i])
    }

    /// Parallel iteration in index-list order; usable with the paired kernels.
    pub fn par_iter(&self) -> impl IndexedParallelIterator<Item = T> + 'a
    where
        T: Send,
    {
        let values = self.values;
        self.addr.par_iter().map(move |&i| values[i])
    }

    pub fn to_vec(&self) -> Vec<T>
    where
        T: Send,
    {
        self.par_iter().collect()
    }
}

struct SendPtr<T>(*mut T);
unsafe impl<T: Send> Send for SendPtr<T> {}
unsafe impl<T: Send> Sync for SendPtr<T> {}

impl<T> SendPtr<T> {
    fn get(&self) -> *mut T {
        self.0
    }
}

/// Writable scatter view.
///
/// With a duplicate-free index list the writes touch disjoint slots and run in
/// parallel. With duplicates the writes run in list order, so the last one wins.
#[derive(Debug)]
pub struct IndirectViewMut<'a, T> {
    values: &'a mut [T],
    addr: &'a [Label],
    unique: bool,
}

impl<'a, T: Copy + Send + Sync> IndirectViewMut<'a, T> {
    pub fn new(values: &'a mut [T], addr: &'a [Label]) -> Result<Self> {
        check_addressing(addr, values.len())?;
        let unique = is_duplicate_free(addr);
        if !unique {
            log::debug!("indirect list of length {} has duplicates, scattering serially", addr.len());
        }
        Ok(Self {
            values,
            addr,
            unique,
        })
    }

    pub fn len(&self) -> usize {
        self.addr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addr.is_empty()
    }

    /// Whether no backing slot is addressed twice.
    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn get(&self, i: usize) -> T {
        self.values[self.addr[i]]
    }

    pub fn view(&self) -> IndirectView<'_, T> {
        IndirectView {
            values: &*self.values,
            addr: self.addr,
        }
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.view().to_vec()
    }

    /// `values[addr[i]] = source[i]`.
    pub fn assign(&mut self, source: &[T]) -> Result<()> {
        check_sizes("indirect assign", self.len(), source.len())?;
        self.scatter(|i| source[i]);
        Ok(())
    }

    /// `values[addr[i]] = source.get(i)`.
    pub fn assign_from(&mut self, source: &IndirectView<'_, T>) -> Result<()> {
        check_sizes("indirect assign", self.len(), source.len())?;
        self.scatter(|i| source.get(i));
        Ok(())
    }

    /// Writes `value` into every addressed slot.
    pub fn fill(&mut self, value: T) {
        self.scatter(|_| value);
    }

    fn scatter<F>(&mut self, f: F)
    where
        F: Fn(usize) -> T + Sync,
    {
        if self.unique {
            let out = SendPtr(self.values.as_mut_ptr());
            self.addr.par_iter().enumerate().for_each(|(i, &slot)| {
                // SAFETY: `slot` is in bounds (checked in `new`) and no two items share it.
                unsafe { *out.get().add(slot) = f(i) };
            });
        } else {
            for (i, &slot) in self.addr.iter().enumerate() {
                self.values[slot] = f(i);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_index_is_rejected() {
        let values = [1.0, 2.0];
        let addr = [0, 2];
        assert!(matches!(
            IndirectView::new(&values, &addr),
            Err(LduError::IndexOutOfRange { index: 2, len: 2 })
        ));
    }

    #[test]
    fn duplicates_are_found_anywhere_in_the_list() {
        assert!(is_duplicate_free(&[]));
        assert!(is_duplicate_free(&[1_000_000, 3, 7]));
        assert!(!is_duplicate_free(&[5, 1, 9, 5]));
        assert!(!is_duplicate_free(&[usize::MAX - 1, 0, usize::MAX - 1]));
    }

    #[test]
    fn short_view_into_long_array_checks_only_its_indices() {
        let mut values = vec![0.0; 100_000];
        let addr = [99_999, 0, 50_000];
        let view = IndirectViewMut::new(&mut values, &addr).unwrap();
        assert!(view.is_unique());
    }

    #[test]
    fn gather_follows_the_index_list() {
        let values = [10, 20, 30, 40];
        let addr = [3, 0, 2];
        let view = IndirectView::new(&values, &addr).unwrap();
        assert_eq!(view.len(), 3);
        assert_eq!(view.to_vec(), vec![40, 10, 30]);
        assert_eq!(view.iter().collect::<Vec<_>>(), vec![40, 10, 30]);
    }

    #[test]
    fn assign_scatters_and_fill_broadcasts() {
        let mut values = vec![0.0; 5];
        let addr = [4, 1, 2];
        {
            let mut view = IndirectViewMut::new(&mut values, &addr).unwrap();
            assert!(view.is_unique());
            view.assign(&[1.0, 2.0, 3.0]).unwrap();
            assert!(view.assign(&[1.0]).is_err());
        }
        assert_eq!(values, vec![0.0, 2.0, 3.0, 0.0, 1.0]);

        let mut view = IndirectViewMut::new(&mut values, &addr).unwrap();
        view.fill(-1.0);
        assert_eq!(values, vec![0.0, -1.0, -1.0, 0.0, -1.0]);
    }

    #[test]
    fn assign_from_another_view() {
        let source = [5, 6, 7];
        let source_addr = [2, 1];
        let src = IndirectView::new(&source, &source_addr).unwrap();

        let mut target = vec![0; 4];
        let target_addr = [0, 3];
        IndirectViewMut::new(&mut target, &target_addr)
            .unwrap()
            .assign_from(&src)
            .unwrap();
        assert_eq!(target, vec![7, 0, 0, 6]);
    }

    #[test]
    fn duplicates_scatter_in_list_order() {
        let mut values = vec![0; 3];
        let addr = [1, 1, 0];
        let mut view = IndirectViewMut::new(&mut values, &addr).unwrap();
        assert!(!view.is_unique());
        view.assign(&[1, 2, 3]).unwrap();
        assert_eq!(values, vec![3, 2, 0]);
    }
}
