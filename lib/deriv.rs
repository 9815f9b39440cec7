//! Derivative basis sets with respect to orbital exponents, and the mapping
//! between optimized slots and raw basis indices.
//!
//! For a normalized primitive `u = c rⁿ e^{-z r^m}` the normalization constant
//! itself depends on `z`; the combinations generated here are the exact first
//! and second derivatives `∂u/∂z`, `∂²u/∂z²` of the *normalized* function.

use ndarray as nd;
use num_complex::Complex64 as C64;
use crate::{
    Arr1,
    basis::{ BResult, BasisSet, ExpPower, LinComb },
    error::{ BasisError, LengthError },
};

/// Bijection between optimized slots `i_d ∈ 0..num_d` and raw basis indices,
/// increasing in raw index order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OptIndex {
    num: usize,
    index: Vec<usize>,
}

impl OptIndex {
    /// Build the mapping from an optimize mask.
    ///
    /// ```
    /// use greenopt::deriv::OptIndex;
    ///
    /// let idx = OptIndex::from_mask(&[true, false, true]);
    /// assert_eq!(idx.num_d(), 2);
    /// assert_eq!(idx.raw(1), 2);
    /// ```
    pub fn from_mask(mask: &[bool]) -> Self {
        let index: Vec<usize>
            = mask.iter().enumerate()
            .filter_map(|(i, opt)| opt.then_some(i))
            .collect();
        Self { num: mask.len(), index }
    }

    /// Number of raw basis functions.
    pub fn num(&self) -> usize { self.num }

    /// Number of optimized slots.
    pub fn num_d(&self) -> usize { self.index.len() }

    /// Raw index of optimized slot `i_d`.
    ///
    /// *Panics if `i_d` is out of range*.
    pub fn raw(&self, i_d: usize) -> usize { self.index[i_d] }

    /// Iterate over `(i_d, i)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.index.iter().copied().enumerate()
    }

    /// Reconstruct the optimize mask.
    pub fn mask(&self) -> Vec<bool> {
        let mut mask = vec![false; self.num];
        self.index.iter().for_each(|&i| { mask[i] = true; });
        mask
    }
}

fn check_inputs(us: &BasisSet, opt_list: &[bool]) -> BResult<()> {
    if !us.has_all_coefficients() { return Err(BasisError::NotSetup); }
    LengthError::check_len(us.size(), opt_list.len())?;
    Ok(())
}

// build a derivative set by applying `f` to every optimized, normalized
// primitive
fn deriv_set<F>(us: &BasisSet, opt_list: &[bool], f: F) -> BResult<BasisSet>
where F: Fn(ExpPower, C64, i32, C64) -> LinComb
{
    check_inputs(us, opt_list)?;
    let power = us.exp_power();
    let mut dus = BasisSet::new(power);
    for (i, _) in opt_list.iter().enumerate().filter(|(_, opt)| **opt) {
        if !(us.is_prim(i) && us.is_normalized(i)) {
            return Err(BasisError::NotPrimitive(i));
        }
        let ui = us.basis(i);
        dus.add_unnormalized(f(power, ui.c(0), ui.n(0), ui.z(0)))?;
    }
    dus.setup()?;
    Ok(dus)
}

/// Compute the first-derivative basis set `∂uᵢ/∂zᵢ` for every optimized
/// function.
pub fn one_deriv(us: &BasisSet, opt_list: &[bool]) -> BResult<BasisSet> {
    deriv_set(us, opt_list, |power, c, n, z| {
        let nf = f64::from(n);
        match power {
            ExpPower::Slater => {
                LinComb::new(power)
                    .add(-c, n + 1, z)
                    .add(c * (nf + 0.5) / z, n, z)
            },
            ExpPower::Gauss => {
                LinComb::new(power)
                    .add(-c, n + 2, z)
                    .add(c * (2.0 * nf + 1.0) / (4.0 * z), n, z)
            },
        }
    })
}

/// Compute the second-derivative basis set `∂²uᵢ/∂zᵢ²` for every optimized
/// function.
pub fn two_deriv(us: &BasisSet, opt_list: &[bool]) -> BResult<BasisSet> {
    deriv_set(us, opt_list, |power, c, n, z| {
        let nf = f64::from(n);
        match power {
            ExpPower::Slater => {
                LinComb::new(power)
                    .add(c, n + 2, z)
                    .add(-2.0 * c * (nf + 0.5) / z, n + 1, z)
                    .add(c * (nf * nf - 0.25) / (z * z), n, z)
            },
            ExpPower::Gauss => {
                LinComb::new(power)
                    .add(c, n + 4, z)
                    .add(-c * (2.0 * nf + 1.0) / (2.0 * z), n + 2, z)
                    .add(
                        c * (4.0 * nf * nf - 4.0 * nf - 3.0) / (16.0 * z * z),
                        n,
                        z,
                    )
            },
        }
    })
}

/// Return a copy of `base` whose optimized primitives carry the exponents
/// `zs`, renormalized.
pub fn update_basis<S>(base: &BasisSet, opt_index: &OptIndex, zs: &Arr1<S>)
    -> BResult<BasisSet>
where S: nd::Data<Elem = C64>
{
    LengthError::check_len(zs.len(), opt_index.num_d())?;
    LengthError::check_len(base.size(), opt_index.num())?;
    let mut us = base.clone();
    for ((_, i), &z) in opt_index.iter().zip(zs) {
        let mut bi = base.basis(i).clone();
        bi.set_z(0, z);
        us.replace(i, bi)?;
    }
    us.setup()?;
    Ok(us)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use crate::basis::overlap_mat;

    fn c(re: f64, im: f64) -> C64 { C64::new(re, im) }

    #[test]
    fn opt_index_is_increasing() {
        assert_eq!(OptIndex::from_mask(&[false, false]).num_d(), 0);
        let idx = OptIndex::from_mask(&[false, true, false, true, true]);
        assert_eq!(idx.num(), 5);
        assert_eq!(idx.iter().collect::<Vec<_>>(), vec![(0, 1), (1, 3), (2, 4)]);
        assert_eq!(idx.mask(), vec![false, true, false, true, true]);
    }

    // value of the normalized primitive at r as a function of its exponent
    fn prim_at(power: ExpPower, n: i32, z: C64, r: f64) -> C64 {
        let mut us = BasisSet::new(power);
        us.add(n, z);
        us.setup().unwrap();
        us.basis(0).at(C64::from(r))
    }

    #[test]
    fn derivatives_match_finite_differences() {
        let h = 1e-4;
        for power in [ExpPower::Slater, ExpPower::Gauss] {
            let (n, z) = (2, c(0.7, -0.3));
            let mut us = BasisSet::new(power);
            us.add(1, c(1.0, 0.0)).add(n, z);
            us.setup().unwrap();
            let mask = [false, true];
            let dus = one_deriv(&us, &mask).unwrap();
            let ddus = two_deriv(&us, &mask).unwrap();
            assert_eq!(dus.size(), 1);
            assert_eq!(ddus.size(), 1);
            for r in [0.3, 1.0, 2.5] {
                let fp = prim_at(power, n, z + h, r);
                let fm = prim_at(power, n, z - h, r);
                let f0 = prim_at(power, n, z, r);
                let d1 = (fp - fm) / (2.0 * h);
                let d2 = (fp + fm - 2.0 * f0) / (h * h);
                let a1 = dus.basis(0).at(C64::from(r));
                let a2 = ddus.basis(0).at(C64::from(r));
                assert_abs_diff_eq!((d1 - a1).norm(), 0.0, epsilon = 1e-6);
                assert_abs_diff_eq!((d2 - a2).norm(), 0.0, epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn rejects_bad_inputs() {
        let mut us = BasisSet::new(ExpPower::Gauss);
        us.add(2, c(1.0, 0.0));
        assert!(matches!(one_deriv(&us, &[true]), Err(BasisError::NotSetup)));
        us.setup().unwrap();
        assert!(matches!(one_deriv(&us, &[true, false]), Err(BasisError::Length(_))));
        let lc = LinComb::new(ExpPower::Gauss)
            .add(c(1.0, 0.0), 2, c(1.0, 0.0))
            .add(c(1.0, 0.0), 4, c(1.0, 0.0));
        us.add_unnormalized(lc).unwrap();
        us.setup().unwrap();
        assert!(matches!(two_deriv(&us, &[false, true]), Err(BasisError::NotPrimitive(1))));
    }

    #[test]
    fn update_replaces_only_optimized_exponents() {
        let mut base = BasisSet::new(ExpPower::Slater);
        base.add(2, c(1.0, 0.0)).add(2, c(2.0, 0.0)).add(3, c(3.0, 0.0));
        base.setup().unwrap();
        let idx = OptIndex::from_mask(&[true, false, true]);
        let us = update_basis(&base, &idx, &nd::array![c(0.5, -0.5), c(1.5, -0.1)]).unwrap();
        assert_eq!(us.basis(0).z(0), c(0.5, -0.5));
        assert_eq!(us.basis(1).z(0), c(2.0, 0.0));
        assert_eq!(us.basis(2).z(0), c(1.5, -0.1));
        let s = overlap_mat(&us, &us).unwrap();
        assert_abs_diff_eq!((s[[0, 0]] - 1.0).norm(), 0.0, epsilon = 1e-12);
        assert!(update_basis(&base, &idx, &nd::array![c(1.0, 0.0)]).is_err());
    }
}
