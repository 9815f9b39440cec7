//! Value, gradient, and Hessian of the resolvent functional
//! ```text
//! α(x) = Sᵀ L(x)⁻¹ R
//! ```
//! with respect to the orbital exponents `x` of the optimized basis functions.
//!
//! Perturbing exponent `xᵢ` changes only function `i`, so `∂L/∂xᵢ` is nonzero
//! only on row and column `i` (`Lᵢ = eᵢ lᵢᵀ + lᵢ eᵢᵀ` with `lᵢ = ⟨∂uᵢ|L|u⟩`),
//! and `∂S/∂xᵢ`, `∂R/∂xᵢ` only at entry `i`. With `G = L⁻¹`, `u = Gᵀ S` and
//! `v = G R`, the implicit-differentiation rule `dG = −G dL G` gives
//! ```text
//! ∂α/∂xᵢ = S'ᵢ vᵢ + R'ᵢ uᵢ − uᵀ Lᵢ v
//! ```
//! and the Hessian follows from a second application. All rank-one and
//! rank-two perturbations are applied in structured form, so each evaluation
//! costs one inversion plus `O(num_d · num²)` work.

use ndarray as nd;
use num_complex::Complex64 as C64;
use crate::{
    Arr1,
    basis::{ BResult, BasisSet },
    deriv::{ self, OptIndex },
    error::{ GreenError, LengthError, NewtonError },
    linalg::{ inverse, tdot },
    newton::{ NResult, Objective, Vgh },
    operator::Operator,
};

pub type GResult<T> = Result<T, GreenError>;

/// Matrices and vectors of the basis and its exponent derivatives, for one
/// frequency and exponent point.
///
/// Index `d` refers to a derivative set (`num_d` functions), `0` to the basis
/// itself (`num` functions).
#[derive(Clone, Debug, PartialEq)]
pub struct Tensors {
    pub l00: nd::Array2<C64>,
    pub l10: nd::Array2<C64>,
    pub l11: nd::Array2<C64>,
    pub l20: nd::Array2<C64>,
    pub s0: nd::Array1<C64>,
    pub s1: nd::Array1<C64>,
    pub s2: nd::Array1<C64>,
    pub r0: nd::Array1<C64>,
    pub r1: nd::Array1<C64>,
    pub r2: nd::Array1<C64>,
}

impl Tensors {
    /// Evaluate all providers on the basis `us` and its first and second
    /// derivative sets.
    pub fn compute<L, S, R>(
        us: &BasisSet,
        dus: &BasisSet,
        ddus: &BasisSet,
        lmat: L,
        svec: S,
        rvec: R,
    ) -> GResult<Self>
    where
        L: Fn(&BasisSet, &BasisSet) -> BResult<nd::Array2<C64>>,
        S: Fn(&BasisSet) -> BResult<nd::Array1<C64>>,
        R: Fn(&BasisSet) -> BResult<nd::Array1<C64>>,
    {
        LengthError::check_len(dus.size(), ddus.size())?;
        Ok(Self {
            l00: lmat(us, us)?,
            l10: lmat(dus, us)?,
            l11: lmat(dus, dus)?,
            l20: lmat(ddus, us)?,
            s0: svec(us)?,
            s1: svec(dus)?,
            s2: svec(ddus)?,
            r0: rvec(us)?,
            r1: rvec(dus)?,
            r2: rvec(ddus)?,
        })
    }

    fn check(&self, opt_index: &OptIndex) -> GResult<()> {
        let (num, num_d) = (opt_index.num(), opt_index.num_d());
        LengthError::check_len(self.l00.nrows(), num)?;
        LengthError::check_len(self.l00.ncols(), num)?;
        LengthError::check_len(self.l10.nrows(), num_d)?;
        LengthError::check_len(self.l10.ncols(), num)?;
        LengthError::check_len(self.l11.nrows(), num_d)?;
        LengthError::check_len(self.l11.ncols(), num_d)?;
        LengthError::check_len(self.l20.nrows(), num_d)?;
        LengthError::check_len(self.l20.ncols(), num)?;
        LengthError::check_len(self.s0.len(), num)?;
        LengthError::check_len(self.r0.len(), num)?;
        for d in [&self.s1, &self.s2, &self.r1, &self.r2] {
            LengthError::check_len(d.len(), num_d)?;
        }
        Ok(())
    }

    /// Value `S0ᵀ L00⁻¹ R0`.
    pub fn value(&self) -> GResult<C64> {
        let g = inverse(&self.l00)?;
        Ok(tdot(&self.s0, &g.dot(&self.r0))?)
    }

    /// Value, gradient, and Hessian with respect to the optimized exponents.
    pub fn vgh(&self, opt_index: &OptIndex) -> GResult<Vgh> {
        self.check(opt_index)?;
        let num_d = opt_index.num_d();
        let g = inverse(&self.l00)?;
        let gt = g.t();
        let u = gt.dot(&self.s0);
        let v = g.dot(&self.r0);
        let val = tdot(&self.s0, &v)?;

        // per slot: Lᵢu, Lᵢv, wᵢ = G Lᵢ v, zᵢ = Gᵀ Lᵢ u
        let mut lu: Vec<nd::Array1<C64>> = Vec::with_capacity(num_d);
        let mut w: Vec<nd::Array1<C64>> = Vec::with_capacity(num_d);
        let mut z: Vec<nd::Array1<C64>> = Vec::with_capacity(num_d);
        let mut grad: nd::Array1<C64> = nd::Array1::zeros(num_d);
        for (i_d, i) in opt_index.iter() {
            let li = self.l10.row(i_d);
            let liu = apply_rank2(i, &li, &u)?;
            let liv = apply_rank2(i, &li, &v)?;
            grad[i_d] = self.s1[i_d] * v[i] + self.r1[i_d] * u[i] - tdot(&u, &liv)?;
            w.push(g.dot(&liv));
            z.push(gt.dot(&liu));
            lu.push(liu);
        }

        let mut hess: nd::Array2<C64> = nd::Array2::zeros((num_d, num_d));
        for (i_d, i) in opt_index.iter() {
            let (s1i, r1i) = (self.s1[i_d], self.r1[i_d]);
            for (j_d, j) in opt_index.iter() {
                let (s1j, r1j) = (self.s1[j_d], self.r1[j_d]);
                let mut h
                    = s1j * g[[j, i]] * r1i
                    - s1j * w[i_d][j]
                    + s1i * g[[i, j]] * r1j
                    - r1i * z[j_d][i]
                    + tdot(&lu[j_d], &w[i_d])?
                    - s1i * w[j_d][i]
                    + tdot(&lu[i_d], &w[j_d])?
                    - r1j * z[i_d][j];
                // −uᵀ Lᵢⱼ v
                h -= u[i] * v[j] * self.l11[[i_d, j_d]]
                    + u[j] * v[i] * self.l11[[j_d, i_d]];
                if i == j {
                    let mi = self.l20.row(i_d);
                    h -= u[i] * tdot(&mi, &v)? + tdot(&mi, &u)? * v[i];
                    h += self.s2[i_d] * v[i] + self.r2[i_d] * u[i];
                }
                hess[[i_d, j_d]] = h;
            }
        }
        Ok(Vgh { val, grad, hess })
    }
}

// (eᵢ lᵀ + l eᵢᵀ) x
fn apply_rank2<S, T>(i: usize, l: &Arr1<S>, x: &Arr1<T>)
    -> Result<nd::Array1<C64>, LengthError>
where
    S: nd::Data<Elem = C64>,
    T: nd::Data<Elem = C64>,
{
    let mut out = l.mapv(|lk| lk * x[i]);
    out[i] += tdot(l, x)?;
    Ok(out)
}

/// Value and gradient of `Sᵀ L⁻¹ R` with respect to the exponents of the
/// optimized functions of `us`, without the second-derivative quantities.
///
/// `dus` is the first derivative set of the optimized functions, in slot
/// order.
pub fn value_grad_green<L, S, R>(
    us: &BasisSet,
    dus: &BasisSet,
    opt_index: &OptIndex,
    lmat: L,
    svec: S,
    rvec: R,
) -> GResult<(C64, nd::Array1<C64>)>
where
    L: Fn(&BasisSet, &BasisSet) -> BResult<nd::Array2<C64>>,
    S: Fn(&BasisSet) -> BResult<nd::Array1<C64>>,
    R: Fn(&BasisSet) -> BResult<nd::Array1<C64>>,
{
    LengthError::check_len(us.size(), opt_index.num())?;
    LengthError::check_len(dus.size(), opt_index.num_d())?;
    let l00 = lmat(us, us)?;
    let l10 = lmat(dus, us)?;
    let (s0, s1) = (svec(us)?, svec(dus)?);
    let (r0, r1) = (rvec(us)?, rvec(dus)?);
    LengthError::check_len(l10.nrows(), opt_index.num_d())?;
    LengthError::check(&s1, &r1)?;
    LengthError::check_len(s1.len(), opt_index.num_d())?;

    let g = inverse(&l00)?;
    let u = g.t().dot(&s0);
    let v = g.dot(&r0);
    let val = tdot(&s0, &v)?;
    let mut grad: nd::Array1<C64> = nd::Array1::zeros(opt_index.num_d());
    for (i_d, i) in opt_index.iter() {
        let liv = apply_rank2(i, &l10.row(i_d), &v)?;
        grad[i_d] = s1[i_d] * v[i] + r1[i_d] * u[i] - tdot(&u, &liv)?;
    }
    Ok((val, grad))
}

/// Value, gradient, and Hessian of `Sᵀ L⁻¹ R` with respect to the exponents of
/// the optimized functions of `us`.
///
/// `dus` and `ddus` are the first and second derivative sets of the optimized
/// functions, in slot order.
///
/// # Errors
///
/// Fails if any provider fails, the sets disagree in size with `opt_index`, or
/// `lmat(us, us)` is singular.
pub fn vgh_green<L, S, R>(
    us: &BasisSet,
    dus: &BasisSet,
    ddus: &BasisSet,
    opt_index: &OptIndex,
    lmat: L,
    svec: S,
    rvec: R,
) -> GResult<Vgh>
where
    L: Fn(&BasisSet, &BasisSet) -> BResult<nd::Array2<C64>>,
    S: Fn(&BasisSet) -> BResult<nd::Array1<C64>>,
    R: Fn(&BasisSet) -> BResult<nd::Array1<C64>>,
{
    LengthError::check_len(us.size(), opt_index.num())?;
    LengthError::check_len(dus.size(), opt_index.num_d())?;
    Tensors::compute(us, dus, ddus, lmat, svec, rvec)?.vgh(opt_index)
}

/// The resolvent functional of an [`Operator`] over a base basis set, as a
/// function of frequency and optimized exponents.
#[derive(Debug)]
pub struct GreenFunctional<'a, O> {
    op: &'a O,
    base: BasisSet,
    opt_index: OptIndex,
}

impl<'a, O> GreenFunctional<'a, O>
where O: Operator
{
    /// `mask` selects which functions of `base` are optimized; each of them
    /// must be a normalized primitive.
    pub fn new(op: &'a O, base: BasisSet, mask: &[bool]) -> GResult<Self> {
        LengthError::check_len(base.size(), mask.len())?;
        Ok(Self { op, base, opt_index: OptIndex::from_mask(mask) })
    }

    pub fn operator(&self) -> &O { self.op }

    pub fn base(&self) -> &BasisSet { &self.base }

    pub fn opt_index(&self) -> &OptIndex { &self.opt_index }

    /// Basis set with optimized exponents `zs`.
    pub fn basis_at<S>(&self, zs: &Arr1<S>) -> GResult<BasisSet>
    where S: nd::Data<Elem = C64>
    {
        Ok(deriv::update_basis(&self.base, &self.opt_index, zs)?)
    }

    /// Value at frequency `w` and exponents `zs`.
    pub fn value<S>(&self, w: f64, zs: &Arr1<S>) -> GResult<C64>
    where S: nd::Data<Elem = C64>
    {
        let us = self.basis_at(zs)?;
        let l00 = self.op.operator_matrix(w, &us, &us)?;
        let s0 = self.op.bra_vector(&us)?;
        let r0 = self.op.ket_vector(&us)?;
        Ok(tdot(&s0, &inverse(&l00)?.dot(&r0))?)
    }

    /// Value and gradient at frequency `w` and exponents `zs`.
    pub fn value_grad<S>(&self, w: f64, zs: &Arr1<S>) -> GResult<(C64, nd::Array1<C64>)>
    where S: nd::Data<Elem = C64>
    {
        let us = self.basis_at(zs)?;
        let dus = deriv::one_deriv(&us, &self.opt_index.mask())?;
        value_grad_green(
            &us, &dus, &self.opt_index,
            |a, b| self.op.operator_matrix(w, a, b),
            |a| self.op.bra_vector(a),
            |a| self.op.ket_vector(a),
        )
    }

    /// Value, gradient, and Hessian at frequency `w` and exponents `zs`.
    pub fn vgh<S>(&self, w: f64, zs: &Arr1<S>) -> GResult<Vgh>
    where S: nd::Data<Elem = C64>
    {
        let us = self.basis_at(zs)?;
        let mask = self.opt_index.mask();
        let dus = deriv::one_deriv(&us, &mask)?;
        let ddus = deriv::two_deriv(&us, &mask)?;
        vgh_green(
            &us, &dus, &ddus, &self.opt_index,
            |a, b| self.op.operator_matrix(w, a, b),
            |a| self.op.bra_vector(a),
            |a| self.op.ket_vector(a),
        )
    }

    /// Solution `c = L⁻¹ R` of the driven equation at frequency `w` and
    /// exponents `zs`, evaluated on the radii `rs`.
    pub fn wavefunction<S, T>(&self, w: f64, zs: &Arr1<S>, rs: &Arr1<T>)
        -> GResult<nd::Array1<C64>>
    where
        S: nd::Data<Elem = C64>,
        T: nd::Data<Elem = f64>,
    {
        let us = self.basis_at(zs)?;
        let l00 = self.op.operator_matrix(w, &us, &us)?;
        let r0 = self.op.ket_vector(&us)?;
        let cs = inverse(&l00)?.dot(&r0);
        Ok(us.evaluate_at(rs, &cs)?)
    }

    /// Fix the frequency, giving an [`Objective`] over the optimized
    /// exponents.
    pub fn at(&self, w: f64) -> GreenPoint<'_, 'a, O> {
        GreenPoint { func: self, w }
    }
}

/// A [`GreenFunctional`] at fixed frequency.
#[derive(Debug)]
pub struct GreenPoint<'f, 'a, O> {
    func: &'f GreenFunctional<'a, O>,
    w: f64,
}

impl<'f, 'a, O> GreenPoint<'f, 'a, O> {
    pub fn w(&self) -> f64 { self.w }
}

impl<'f, 'a, O> Objective for GreenPoint<'f, 'a, O>
where O: Operator
{
    fn vgh(&mut self, x: &nd::Array1<C64>) -> NResult<Vgh> {
        self.func.vgh(self.w, x).map_err(NewtonError::from)
    }

    fn value(&mut self, x: &nd::Array1<C64>) -> NResult<C64> {
        self.func.value(self.w, x).map_err(NewtonError::from)
    }

    fn value_grad(&mut self, x: &nd::Array1<C64>)
        -> NResult<(C64, nd::Array1<C64>)>
    {
        self.func.value_grad(self.w, x).map_err(NewtonError::from)
    }
}
