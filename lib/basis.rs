//! Radial basis functions of Slater (`r^n e^{-z r}`) and Gaussian
//! (`r^n e^{-z r²}`) type with complex orbital exponents, and the one-electron
//! radial integrals between them.
//!
//! Integrals use the complex-symmetric convention: no complex conjugation is
//! applied to the bra, so a function with complex exponent is "normalized" when
//! `∫ u(r)² dr = 1`.

use std::f64::consts::PI;
use ndarray as nd;
use num_complex::Complex64 as C64;
use num_traits::{ One, Zero };
use crate::{
    Arr1,
    error::{ BasisError, ConfigError, LengthError },
};

pub type BResult<T> = Result<T, BasisError>;

/// Radial decay class of a basis function.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExpPower {
    /// Slater type, `e^{-z r}`.
    Slater,
    /// Gaussian type, `e^{-z r²}`.
    Gauss,
}

impl ExpPower {
    /// The power of `r` in the exponent (1 or 2).
    pub fn power(self) -> u8 {
        match self {
            Self::Slater => 1,
            Self::Gauss => 2,
        }
    }

    /// Parse the conventional names `STO` and `GTO`.
    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        match name {
            "STO" => Ok(Self::Slater),
            "GTO" => Ok(Self::Gauss),
            _ => Err(ConfigError::UnknownBasisType(name.to_string())),
        }
    }
}

impl TryFrom<u8> for ExpPower {
    type Error = BasisError;

    fn try_from(m: u8) -> BResult<Self> {
        match m {
            1 => Ok(Self::Slater),
            2 => Ok(Self::Gauss),
            _ => Err(BasisError::BadPower(m)),
        }
    }
}

/// Compute `∫₀^∞ rⁿ e^{-a r^m} dr` for the power class `m` of `power`.
///
/// Requires `Re(a) > 0` for convergence; this is not checked.
pub fn exp_int(power: ExpPower, n: i32, a: C64) -> BResult<C64> {
    if n < 0 { return Err(BasisError::NegativePower(n)); }
    match power {
        ExpPower::Slater => {
            let fact: f64 = (1..=n).map(f64::from).product();
            Ok(fact / a.powi(n + 1))
        },
        ExpPower::Gauss => Ok(gto_int(n, a)),
    }
}

// Γ((n+1)/2) / (2 a^{(n+1)/2}) by downward recursion onto n = 0, 1
fn gto_int(n: i32, a: C64) -> C64 {
    match n {
        0 => PI.sqrt() / (2.0 * a.sqrt()),
        1 => 0.5 / a,
        _ => f64::from(n - 1) / (2.0 * a) * gto_int(n - 2, a),
    }
}

/// A single term `c rⁿ e^{-z r^m}`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Term {
    pub c: C64,
    pub n: i32,
    pub z: C64,
}

/// Linear combination of terms sharing one power class.
#[derive(Clone, Debug, PartialEq)]
pub struct LinComb {
    power: ExpPower,
    terms: Vec<Term>,
}

impl LinComb {
    /// Create an empty combination.
    pub fn new(power: ExpPower) -> Self { Self { power, terms: Vec::new() } }

    /// Create a single-term combination.
    pub fn prim(power: ExpPower, c: C64, n: i32, z: C64) -> Self {
        Self::new(power).add(c, n, z)
    }

    /// Append a term, builder-style.
    pub fn add(mut self, c: C64, n: i32, z: C64) -> Self {
        self.terms.push(Term { c, n, z });
        self
    }

    pub fn push(&mut self, c: C64, n: i32, z: C64) {
        self.terms.push(Term { c, n, z });
    }

    pub fn exp_power(&self) -> ExpPower { self.power }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize { self.terms.len() }

    /// `true` if this combination consists of exactly one term.
    pub fn is_prim(&self) -> bool { self.terms.len() == 1 }

    pub fn terms(&self) -> &[Term] { &self.terms }

    pub fn c(&self, k: usize) -> C64 { self.terms[k].c }

    pub fn n(&self, k: usize) -> i32 { self.terms[k].n }

    pub fn z(&self, k: usize) -> C64 { self.terms[k].z }

    pub fn set_c(&mut self, k: usize, c: C64) { self.terms[k].c = c; }

    pub fn set_z(&mut self, k: usize, z: C64) { self.terms[k].z = z; }

    /// Evaluate at a single radius.
    pub fn at(&self, r: C64) -> C64 {
        let m = i32::from(self.power.power());
        self.terms.iter()
            .map(|t| t.c * r.powi(t.n) * (-t.z * r.powi(m)).exp())
            .fold(C64::zero(), |acc, x| acc + x)
    }

    /// Radial derivative `d/dr`, as a new combination.
    pub fn d_dr(&self) -> Self {
        let mut out = Self::new(self.power);
        for t in self.terms.iter() {
            if t.n != 0 { out.push(t.c * f64::from(t.n), t.n - 1, t.z); }
            match self.power {
                ExpPower::Slater => out.push(-t.c * t.z, t.n, t.z),
                ExpPower::Gauss => out.push(-2.0 * t.c * t.z, t.n + 1, t.z),
            }
        }
        out.simplified()
    }

    /// Multiply every term by `r^m`.
    pub fn mul_rm(&self, m: i32) -> Self {
        let terms = self.terms.iter()
            .map(|t| Term { c: t.c, n: t.n + m, z: t.z })
            .collect();
        Self { power: self.power, terms }
    }

    /// Multiply every coefficient by `a`.
    pub fn scaled(&self, a: C64) -> Self {
        let terms = self.terms.iter()
            .map(|t| Term { c: a * t.c, n: t.n, z: t.z })
            .collect();
        Self { power: self.power, terms }
    }

    /// Concatenate the terms of two combinations of the same power class.
    pub fn sum(&self, other: &Self) -> BResult<Self> {
        if self.power != other.power { return Err(BasisError::MixedPower); }
        let mut out = self.clone();
        out.terms.extend(other.terms.iter().copied());
        Ok(out.simplified())
    }

    /// Merge terms with equal `(n, z)` and drop vanishing ones.
    pub fn simplified(&self) -> Self {
        let mut terms: Vec<Term> = Vec::with_capacity(self.terms.len());
        for t in self.terms.iter() {
            match terms.iter_mut().find(|u| u.n == t.n && u.z == t.z) {
                Some(u) => { u.c += t.c; },
                None => { terms.push(*t); },
            }
        }
        terms.retain(|t| t.c != C64::zero());
        Self { power: self.power, terms }
    }
}

#[derive(Clone, Debug, PartialEq)]
struct Func {
    lc: LinComb,
    normalize: bool,
}

/// Ordered set of radial basis functions of one power class.
///
/// Functions added through [`Self::add`] are normalized primitives; functions
/// added through [`Self::add_unnormalized`] keep their coefficients. Any
/// mutation invalidates the coefficients until [`Self::setup`] is called
/// again.
#[derive(Clone, Debug, PartialEq)]
pub struct BasisSet {
    power: ExpPower,
    funcs: Vec<Func>,
    setupq: bool,
}

impl BasisSet {
    pub fn new(power: ExpPower) -> Self {
        Self { power, funcs: Vec::new(), setupq: false }
    }

    pub fn exp_power(&self) -> ExpPower { self.power }

    pub fn size(&self) -> usize { self.funcs.len() }

    /// Get the `i`-th function.
    ///
    /// *Panics if `i` is out of range*.
    pub fn basis(&self, i: usize) -> &LinComb { &self.funcs[i].lc }

    pub fn is_prim(&self, i: usize) -> bool { self.funcs[i].lc.is_prim() }

    pub fn is_normalized(&self, i: usize) -> bool { self.funcs[i].normalize }

    /// `true` if coefficients are current, i.e. `setup` ran after the last
    /// mutation.
    pub fn has_all_coefficients(&self) -> bool { self.setupq }

    /// Add a normalized primitive `rⁿ e^{-z r^m}`.
    pub fn add(&mut self, n: i32, z: C64) -> &mut Self {
        self.setupq = false;
        self.funcs.push(Func {
            lc: LinComb::prim(self.power, C64::one(), n, z),
            normalize: true,
        });
        self
    }

    /// Add a combination whose coefficients are used as given.
    pub fn add_unnormalized(&mut self, lc: LinComb) -> BResult<&mut Self> {
        if lc.exp_power() != self.power { return Err(BasisError::MixedPower); }
        self.setupq = false;
        self.funcs.push(Func { lc, normalize: false });
        Ok(self)
    }

    /// Replace the `i`-th function, keeping its normalization flag.
    pub fn replace(&mut self, i: usize, lc: LinComb) -> BResult<&mut Self> {
        let size = self.size();
        if lc.exp_power() != self.power { return Err(BasisError::MixedPower); }
        let func = self.funcs.get_mut(i)
            .ok_or(BasisError::Index { index: i, size })?;
        func.lc = lc;
        self.setupq = false;
        Ok(self)
    }

    /// Compute coefficients of all normalized functions.
    ///
    /// Primitives are normalized from a unit coefficient, so repeated setup
    /// after an exponent change never accumulates a sign ambiguity from the
    /// complex square root.
    pub fn setup(&mut self) -> BResult<&mut Self> {
        if self.setupq { return Ok(self); }
        for func in self.funcs.iter_mut().filter(|f| f.normalize) {
            if func.lc.is_prim() {
                func.lc.set_c(0, C64::one());
            }
            let norm2 = lc_int(&func.lc, 0, &func.lc)?;
            let nterm = norm2.sqrt().inv();
            func.lc = func.lc.scaled(nterm);
        }
        self.setupq = true;
        Ok(self)
    }

    fn check_setup(&self) -> BResult<()> {
        self.setupq.then_some(()).ok_or(BasisError::NotSetup)
    }

    /// Evaluate `Σᵢ csᵢ uᵢ(r)` on each radius in `rs`.
    pub fn evaluate_at<S, T>(&self, rs: &Arr1<S>, cs: &Arr1<T>)
        -> BResult<nd::Array1<C64>>
    where
        S: nd::Data<Elem = f64>,
        T: nd::Data<Elem = C64>,
    {
        self.check_setup()?;
        LengthError::check_len(cs.len(), self.size())?;
        let ys: nd::Array1<C64>
            = rs.iter()
            .map(|&r| {
                self.funcs.iter().zip(cs)
                    .map(|(f, ck)| ck * f.lc.at(C64::from(r)))
                    .fold(C64::zero(), |acc, x| acc + x)
            })
            .collect();
        Ok(ys)
    }
}

// ∫ a(r) r^m b(r) dr
fn lc_int(a: &LinComb, m: i32, b: &LinComb) -> BResult<C64> {
    if a.power != b.power { return Err(BasisError::MixedPower); }
    let mut acc = C64::zero();
    for ta in a.terms.iter() {
        for tb in b.terms.iter() {
            acc += ta.c * tb.c * exp_int(a.power, ta.n + tb.n + m, ta.z + tb.z)?;
        }
    }
    Ok(acc)
}

// ∫ a(r) d²/dr² b(r) dr
fn lc_d2(a: &LinComb, b: &LinComb) -> BResult<C64> {
    lc_int(a, 0, &b.d_dr().d_dr())
}

fn check_pair(a: &BasisSet, b: &BasisSet) -> BResult<()> {
    a.check_setup()?;
    b.check_setup()?;
    (a.power == b.power).then_some(()).ok_or(BasisError::MixedPower)
}

fn build_mat<F>(a: &BasisSet, b: &BasisSet, mut f: F) -> BResult<nd::Array2<C64>>
where F: FnMut(&LinComb, &LinComb) -> BResult<C64>
{
    check_pair(a, b)?;
    let mut mat: nd::Array2<C64> = nd::Array2::zeros((a.size(), b.size()));
    for (i, fa) in a.funcs.iter().enumerate() {
        for (j, fb) in b.funcs.iter().enumerate() {
            mat[[i, j]] = f(&fa.lc, &fb.lc)?;
        }
    }
    Ok(mat)
}

/// Matrix `⟨aᵢ| r^m |bⱼ⟩`.
pub fn rm_mat(a: &BasisSet, m: i32, b: &BasisSet) -> BResult<nd::Array2<C64>> {
    build_mat(a, b, |fa, fb| lc_int(fa, m, fb))
}

/// Overlap matrix `⟨aᵢ|bⱼ⟩`.
pub fn overlap_mat(a: &BasisSet, b: &BasisSet) -> BResult<nd::Array2<C64>> {
    rm_mat(a, 0, b)
}

/// Matrix `⟨aᵢ| d²/dr² |bⱼ⟩`.
pub fn d2_mat(a: &BasisSet, b: &BasisSet) -> BResult<nd::Array2<C64>> {
    build_mat(a, b, lc_d2)
}

/// Vector `⟨aᵢ|lc⟩`.
pub fn vector(a: &BasisSet, lc: &LinComb) -> BResult<nd::Array1<C64>> {
    a.check_setup()?;
    a.funcs.iter()
        .map(|f| lc_int(&f.lc, 0, lc))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn c(re: f64, im: f64) -> C64 { C64::new(re, im) }

    fn assert_close(a: C64, b: C64, eps: f64) {
        assert_abs_diff_eq!(a.re, b.re, epsilon = eps);
        assert_abs_diff_eq!(a.im, b.im, epsilon = eps);
    }

    #[test]
    fn slater_integrals() {
        let a = c(1.5, -0.5);
        assert_close(exp_int(ExpPower::Slater, 0, a).unwrap(), a.inv(), 1e-14);
        assert_close(exp_int(ExpPower::Slater, 3, a).unwrap(), 6.0 / a.powi(4), 1e-14);
        assert!(exp_int(ExpPower::Slater, -1, a).is_err());
    }

    #[test]
    fn gauss_integrals() {
        let a = c(2.0, 0.0);
        // ∫ r² e^{-2r²} dr = √π / (4 · 2^{3/2})
        let expected = PI.sqrt() / (4.0 * 2.0_f64.powf(1.5));
        assert_close(exp_int(ExpPower::Gauss, 2, a).unwrap(), c(expected, 0.0), 1e-14);
        assert_close(exp_int(ExpPower::Gauss, 3, a).unwrap(), c(1.0 / 8.0, 0.0), 1e-14);
    }

    #[test]
    fn power_class_conversion() {
        assert_eq!(ExpPower::try_from(1).unwrap(), ExpPower::Slater);
        assert_eq!(ExpPower::try_from(2).unwrap(), ExpPower::Gauss);
        assert!(matches!(ExpPower::try_from(3), Err(BasisError::BadPower(3))));
        assert!(ExpPower::from_name("PW").is_err());
    }

    #[test]
    fn setup_normalizes_primitives() {
        for power in [ExpPower::Slater, ExpPower::Gauss] {
            let mut us = BasisSet::new(power);
            us.add(2, c(0.6, -0.6)).add(3, c(1.1, -0.2));
            assert!(!us.has_all_coefficients());
            assert!(overlap_mat(&us, &us).is_err());
            us.setup().unwrap();
            let s = overlap_mat(&us, &us).unwrap();
            assert_close(s[[0, 0]], C64::one(), 1e-12);
            assert_close(s[[1, 1]], C64::one(), 1e-12);
            assert_close(s[[0, 1]], s[[1, 0]], 1e-12);
        }
    }

    #[test]
    fn replace_then_setup_renormalizes() {
        let mut us = BasisSet::new(ExpPower::Slater);
        us.add(2, c(1.0, 0.0));
        us.setup().unwrap();
        let mut b0 = us.basis(0).clone();
        b0.set_z(0, c(0.5, -0.3));
        us.replace(0, b0).unwrap();
        assert!(!us.has_all_coefficients());
        us.setup().unwrap();
        assert_close(us.basis(0).z(0), c(0.5, -0.3), 0.0);
        assert_close(overlap_mat(&us, &us).unwrap()[[0, 0]], C64::one(), 1e-12);
        assert!(us.replace(3, LinComb::new(ExpPower::Slater)).is_err());
    }

    #[test]
    fn unnormalized_functions_keep_coefficients() {
        let mut us = BasisSet::new(ExpPower::Gauss);
        let lc = LinComb::new(ExpPower::Gauss)
            .add(c(2.0, 0.0), 2, c(1.0, 0.0))
            .add(c(-1.0, 0.0), 4, c(1.0, 0.0));
        us.add_unnormalized(lc.clone()).unwrap();
        us.setup().unwrap();
        assert_eq!(us.basis(0), &lc);
        assert!(!us.is_normalized(0));
        assert!(!us.is_prim(0));
        assert!(us.add_unnormalized(LinComb::new(ExpPower::Slater)).is_err());
    }

    #[test]
    fn d2_matches_closed_form_for_slater() {
        // u = N r² e^{-zr}: ⟨u|d²|u⟩ = -z²/3, ⟨u|r⁻¹|u⟩ = z/2, ⟨u|r⁻²|u⟩ = z²/3
        let z = c(0.8, -0.4);
        let mut us = BasisSet::new(ExpPower::Slater);
        us.add(2, z);
        us.setup().unwrap();
        assert_close(d2_mat(&us, &us).unwrap()[[0, 0]], -z * z / 3.0, 1e-12);
        assert_close(rm_mat(&us, -1, &us).unwrap()[[0, 0]], z / 2.0, 1e-12);
        assert_close(rm_mat(&us, -2, &us).unwrap()[[0, 0]], z * z / 3.0, 1e-12);
    }

    #[test]
    fn d2_is_symmetric_for_gauss() {
        let mut us = BasisSet::new(ExpPower::Gauss);
        us.add(1, c(0.3, -0.1)).add(2, c(1.2, -0.5)).add(3, c(0.7, 0.0));
        us.setup().unwrap();
        let d2 = d2_mat(&us, &us).unwrap();
        for i in 0..3 {
            for j in 0..3 {
                assert_close(d2[[i, j]], d2[[j, i]], 1e-10);
            }
        }
    }

    #[test]
    fn derivative_and_simplification() {
        // d/dr (2 r e^{-r}) - (1/r)(2 r e^{-r}) = -2 r e^{-r}
        let p = LinComb::prim(ExpPower::Slater, c(2.0, 0.0), 1, C64::one());
        let lc = p.d_dr().sum(&p.mul_rm(-1).scaled(c(-1.0, 0.0))).unwrap();
        assert_eq!(lc.len(), 1);
        assert_eq!(lc.n(0), 1);
        assert_close(lc.c(0), c(-2.0, 0.0), 1e-15);
    }

    #[test]
    fn evaluation_sums_weighted_functions() {
        let mut us = BasisSet::new(ExpPower::Slater);
        us.add(1, c(1.0, 0.0)).add(2, c(2.0, 0.0));
        us.setup().unwrap();
        let rs = nd::array![0.5, 1.5];
        let cs = nd::array![c(1.0, 0.0), c(0.0, 1.0)];
        let ys = us.evaluate_at(&rs, &cs).unwrap();
        for (k, &r) in rs.iter().enumerate() {
            let expected = us.basis(0).at(C64::from(r))
                + C64::i() * us.basis(1).at(C64::from(r));
            assert_close(ys[k], expected, 1e-14);
        }
        assert!(us.evaluate_at(&rs, &nd::array![C64::one()]).is_err());
    }
}
