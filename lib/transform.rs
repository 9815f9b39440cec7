//! Maps between raw orbital exponents `x` and reduced optimization variables
//! `y`, with chain-rule propagation of first and second derivatives of a
//! scalar functional `F(x(y))`:
//! ```text
//! dF/dyₖ      = Σᵢ (dxᵢ/dyₖ) dF/dxᵢ
//! d²F/dyₖdyₗ  = Σᵢ (d²xᵢ/dyₖdyₗ) dF/dxᵢ + Σᵢⱼ (dxᵢ/dyₖ)(dxⱼ/dyₗ) d²F/dxᵢdxⱼ
//! ```
//!
//! | variant     | xᵢ(y)          | Nx | Ny |
//! |-------------|----------------|----|----|
//! | `Identity`  | y              | 1  | 1  |
//! | `Log`       | exp(y)         | 1  | 1  |
//! | `Shift`     | a0ᵢ + y        | n  | 1  |
//! | `Scale`     | a0ᵢ y          | n  | 1  |
//! | `Geometric` | a rⁱ           | n  | 2  |
//! | `Composite` | block-wise     | Σ  | Σ  |

use ndarray as nd;
use num_complex::Complex64 as C64;
use num_traits::Zero;
use crate::{
    Arr1,
    Arr2,
    error::{ ConfigError, LengthError, TransformError },
    newton::{ NResult, Objective, Vgh },
};

pub type TResult<T> = Result<T, TransformError>;

/// A variable transform.
#[derive(Clone, Debug, PartialEq)]
pub enum VarTransform {
    /// `x = y`.
    Identity,
    /// `x = exp(y)`.
    Log,
    /// `xᵢ = a0ᵢ + y` with a single shared offset variable.
    Shift(nd::Array1<C64>),
    /// `xᵢ = a0ᵢ y` with a single shared scale variable.
    Scale(nd::Array1<C64>),
    /// `xᵢ = a rⁱ` for `i ∈ 0..n`, `y = (a, r)`.
    Geometric(usize),
    /// Independent sub-transforms over disjoint index blocks.
    Composite(Composite),
}

impl VarTransform {
    /// Construct a `Shift` transform; `a0` must be non-empty.
    pub fn shift(a0: nd::Array1<C64>) -> TResult<Self> {
        if a0.is_empty() {
            return Err(ConfigError::BadParams {
                cmd: "shift".into(),
                reason: "offset list must not be empty",
            }.into());
        }
        Ok(Self::Shift(a0))
    }

    /// Construct a `Scale` transform; `a0` must be non-empty.
    pub fn scale(a0: nd::Array1<C64>) -> TResult<Self> {
        if a0.is_empty() {
            return Err(ConfigError::BadParams {
                cmd: "scale".into(),
                reason: "scale list must not be empty",
            }.into());
        }
        Ok(Self::Scale(a0))
    }

    /// Construct a `Geometric` transform over `n ≥ 3` raw variables.
    pub fn geometric(n: usize) -> TResult<Self> {
        if n < 3 { return Err(ConfigError::GeoTooShort(n).into()); }
        Ok(Self::Geometric(n))
    }

    /// Raw dimension.
    pub fn nx(&self) -> usize {
        match self {
            Self::Identity | Self::Log => 1,
            Self::Shift(a0) | Self::Scale(a0) => a0.len(),
            Self::Geometric(n) => *n,
            Self::Composite(comp) => comp.nx,
        }
    }

    /// Reduced dimension.
    pub fn ny(&self) -> usize {
        match self {
            Self::Identity | Self::Log | Self::Shift(_) | Self::Scale(_) => 1,
            Self::Geometric(_) => 2,
            Self::Composite(comp) => comp.ny,
        }
    }

    /// Forward map `y → x`.
    pub fn xis<S>(&self, y: &Arr1<S>) -> TResult<nd::Array1<C64>>
    where S: nd::Data<Elem = C64>
    {
        LengthError::check_len(y.len(), self.ny())?;
        match self {
            Self::Identity => Ok(y.to_owned()),
            Self::Log => Ok(y.mapv(|yk| yk.exp())),
            Self::Shift(a0) => Ok(a0.mapv(|a| a + y[0])),
            Self::Scale(a0) => Ok(a0.mapv(|a| a * y[0])),
            Self::Geometric(n) => {
                let (a, r) = (y[0], y[1]);
                if r == C64::zero() { return Err(TransformError::ZeroRatio); }
                Ok((0..*n).map(|i| a * r.powi(i as i32)).collect())
            },
            Self::Composite(comp) => comp.xis(y),
        }
    }

    /// Pseudo-inverse map `x → y`.
    ///
    /// `Shift` and `Scale` recover `y` from the first raw coordinate only; the
    /// remaining coordinates are assumed to be consistent with it.
    pub fn yks<S>(&self, x: &Arr1<S>) -> TResult<nd::Array1<C64>>
    where S: nd::Data<Elem = C64>
    {
        LengthError::check_len(x.len(), self.nx())?;
        match self {
            Self::Identity => Ok(x.to_owned()),
            Self::Log => Ok(x.mapv(|xk| xk.ln())),
            Self::Shift(a0) => Ok(nd::array![x[0] - a0[0]]),
            Self::Scale(a0) => Ok(nd::array![x[0] / a0[0]]),
            Self::Geometric(_) => {
                let (a, r) = geo_params(x)?;
                Ok(nd::array![a, r])
            },
            Self::Composite(comp) => comp.yks(x),
        }
    }

    /// Jacobian `dxᵢ/dyₖ` (`Nx × Ny`).
    pub fn dxi_dyk<S>(&self, x: &Arr1<S>) -> TResult<nd::Array2<C64>>
    where S: nd::Data<Elem = C64>
    {
        LengthError::check_len(x.len(), self.nx())?;
        match self {
            Self::Identity => Ok(nd::Array2::ones((1, 1))),
            Self::Log => Ok(nd::array![[x[0]]]),
            Self::Shift(a0) => Ok(nd::Array2::ones((a0.len(), 1))),
            Self::Scale(a0) => Ok(a0.clone().insert_axis(nd::Axis(1))),
            Self::Geometric(n) => {
                let (a, r) = geo_params(x)?;
                let mut jac: nd::Array2<C64> = nd::Array2::zeros((*n, 2));
                for (i, mut row) in jac.outer_iter_mut().enumerate() {
                    let i = i as i32;
                    row[0] = r.powi(i);
                    if i > 0 { row[1] = a * f64::from(i) * r.powi(i - 1); }
                }
                Ok(jac)
            },
            Self::Composite(comp) => comp.dxi_dyk(x),
        }
    }

    // second derivatives d²xᵢ/dyₖdyₗ of a leaf variant, shape (Nx, Ny, Ny)
    fn d2xi_dykdyl<S>(&self, x: &Arr1<S>) -> TResult<nd::Array3<C64>>
    where S: nd::Data<Elem = C64>
    {
        if let Self::Composite(comp) = self { return comp.d2xi_dykdyl(x); }
        let (nx, ny) = (self.nx(), self.ny());
        let mut d2: nd::Array3<C64> = nd::Array3::zeros((nx, ny, ny));
        match self {
            Self::Log => { d2[[0, 0, 0]] = x[0]; },
            Self::Geometric(_) => {
                let (a, r) = geo_params(x)?;
                for i in 1..nx {
                    let fi = i as f64;
                    let ii = i as i32;
                    d2[[i, 0, 1]] = fi * r.powi(ii - 1);
                    d2[[i, 1, 0]] = d2[[i, 0, 1]];
                    if i > 1 {
                        d2[[i, 1, 1]] = a * fi * (fi - 1.0) * r.powi(ii - 2);
                    }
                }
            },
            Self::Identity | Self::Shift(_) | Self::Scale(_) | Self::Composite(_) => { },
        }
        Ok(d2)
    }

    /// Gradient in reduced coordinates, `dF/dyₖ = Σᵢ (dxᵢ/dyₖ) dF/dxᵢ`.
    pub fn dF_dyk<S, T>(&self, dF_dx: &Arr1<S>, x: &Arr1<T>)
        -> TResult<nd::Array1<C64>>
    where
        S: nd::Data<Elem = C64>,
        T: nd::Data<Elem = C64>,
    {
        LengthError::check(dF_dx, x)?;
        match self {
            Self::Composite(comp) => comp.dF_dyk(dF_dx, x),
            _ => Ok(self.dxi_dyk(x)?.t().dot(dF_dx)),
        }
    }

    /// Hessian in reduced coordinates.
    pub fn d2F_dykdyl<S, T, U>(
        &self,
        dF_dx: &Arr1<S>,
        d2F_dxdx: &Arr2<T>,
        x: &Arr1<U>,
    ) -> TResult<nd::Array2<C64>>
    where
        S: nd::Data<Elem = C64>,
        T: nd::Data<Elem = C64>,
        U: nd::Data<Elem = C64>,
    {
        LengthError::check(dF_dx, x)?;
        LengthError::check_len(d2F_dxdx.nrows(), x.len())?;
        LengthError::check_len(d2F_dxdx.ncols(), x.len())?;
        if let Self::Composite(comp) = self {
            return comp.d2F_dykdyl(dF_dx, d2F_dxdx, x);
        }
        let jac = self.dxi_dyk(x)?;
        let mut hess = jac.t().dot(d2F_dxdx).dot(&jac);
        let d2 = self.d2xi_dykdyl(x)?;
        for (d2i, gi) in d2.outer_iter().zip(dF_dx) {
            hess.scaled_add(*gi, &d2i);
        }
        Ok(hess)
    }

    /// Wrap a raw-coordinate objective into one over reduced variables.
    pub fn pullback<O>(&self, raw: O) -> Pullback<'_, O>
    where O: Objective
    {
        Pullback { transform: self, raw }
    }
}

// (a, r) = (x₀, x₁/x₀) for a geometric sequence
fn geo_params<S>(x: &Arr1<S>) -> TResult<(C64, C64)>
where S: nd::Data<Elem = C64>
{
    let a = x[0];
    if a == C64::zero() { return Err(TransformError::ZeroScale); }
    let r = x[1] / a;
    if r == C64::zero() { return Err(TransformError::ZeroRatio); }
    Ok((a, r))
}

/// One block of a [`Composite`] transform.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    /// Raw indices governed by this block, in the child's raw order.
    pub xs: Vec<usize>,
    /// Reduced indices owned by this block (assigned consecutively).
    pub ys: Vec<usize>,
    /// Child transform.
    pub transform: VarTransform,
}

/// Independent transforms over a partition of the raw index range.
#[derive(Clone, Debug, PartialEq)]
pub struct Composite {
    blocks: Vec<Block>,
    nx: usize,
    ny: usize,
}

impl Composite {
    /// Build from `(raw indices, child)` pairs.
    ///
    /// The raw index sets must exactly partition `0..Nx`, where `Nx` is the sum
    /// of the children's raw dimensions; reduced indices are assigned to the
    /// blocks consecutively in the given order.
    pub fn new(parts: Vec<(Vec<usize>, VarTransform)>) -> TResult<Self> {
        let nx: usize = parts.iter().map(|(xs, _)| xs.len()).sum();
        let mut seen = vec![false; nx];
        let mut blocks: Vec<Block> = Vec::with_capacity(parts.len());
        let mut ny: usize = 0;
        for (b, (xs, transform)) in parts.into_iter().enumerate() {
            if xs.len() != transform.nx() {
                return Err(ConfigError::ChildSize {
                    block: b,
                    expected: transform.nx(),
                    got: xs.len(),
                }.into());
            }
            for &i in xs.iter() {
                match seen.get_mut(i) {
                    None => { return Err(ConfigError::Gap { nx, index: i }.into()); },
                    Some(true) => { return Err(ConfigError::Overlap(i).into()); },
                    Some(s) => { *s = true; },
                }
            }
            let ys: Vec<usize> = (ny..ny + transform.ny()).collect();
            ny += transform.ny();
            blocks.push(Block { xs, ys, transform });
        }
        // every index in 0..nx was hit once, since lengths sum to nx and
        // duplicates are rejected
        Ok(Self { blocks, nx, ny })
    }

    pub fn blocks(&self) -> &[Block] { &self.blocks }

    fn xis<S>(&self, y: &Arr1<S>) -> TResult<nd::Array1<C64>>
    where S: nd::Data<Elem = C64>
    {
        let mut x: nd::Array1<C64> = nd::Array1::zeros(self.nx);
        for block in self.blocks.iter() {
            let xb = block.transform.xis(&y.select(nd::Axis(0), &block.ys))?;
            block.xs.iter().zip(xb.iter()).for_each(|(&i, &xi)| { x[i] = xi; });
        }
        Ok(x)
    }

    fn yks<S>(&self, x: &Arr1<S>) -> TResult<nd::Array1<C64>>
    where S: nd::Data<Elem = C64>
    {
        let mut y: nd::Array1<C64> = nd::Array1::zeros(self.ny);
        for block in self.blocks.iter() {
            let yb = block.transform.yks(&x.select(nd::Axis(0), &block.xs))?;
            block.ys.iter().zip(yb.iter()).for_each(|(&k, &yk)| { y[k] = yk; });
        }
        Ok(y)
    }

    fn dxi_dyk<S>(&self, x: &Arr1<S>) -> TResult<nd::Array2<C64>>
    where S: nd::Data<Elem = C64>
    {
        let mut jac: nd::Array2<C64> = nd::Array2::zeros((self.nx, self.ny));
        for block in self.blocks.iter() {
            let jb = block.transform.dxi_dyk(&x.select(nd::Axis(0), &block.xs))?;
            for (bi, &i) in block.xs.iter().enumerate() {
                for (bk, &k) in block.ys.iter().enumerate() {
                    jac[[i, k]] = jb[[bi, bk]];
                }
            }
        }
        Ok(jac)
    }

    // zero between blocks
    fn d2xi_dykdyl<S>(&self, x: &Arr1<S>) -> TResult<nd::Array3<C64>>
    where S: nd::Data<Elem = C64>
    {
        LengthError::check_len(x.len(), self.nx)?;
        let mut d2: nd::Array3<C64> = nd::Array3::zeros((self.nx, self.ny, self.ny));
        for block in self.blocks.iter() {
            let d2b = block.transform.d2xi_dykdyl(&x.select(nd::Axis(0), &block.xs))?;
            for (bi, &i) in block.xs.iter().enumerate() {
                for (bk, &k) in block.ys.iter().enumerate() {
                    for (bl, &l) in block.ys.iter().enumerate() {
                        d2[[i, k, l]] = d2b[[bi, bk, bl]];
                    }
                }
            }
        }
        Ok(d2)
    }

    fn dF_dyk<S, T>(&self, dF_dx: &Arr1<S>, x: &Arr1<T>)
        -> TResult<nd::Array1<C64>>
    where
        S: nd::Data<Elem = C64>,
        T: nd::Data<Elem = C64>,
    {
        let mut g: nd::Array1<C64> = nd::Array1::zeros(self.ny);
        for block in self.blocks.iter() {
            let gb = block.transform.dF_dyk(
                &dF_dx.select(nd::Axis(0), &block.xs),
                &x.select(nd::Axis(0), &block.xs),
            )?;
            block.ys.iter().zip(gb.iter()).for_each(|(&k, &gk)| { g[k] = gk; });
        }
        Ok(g)
    }

    // same-block entries come from the child's own rule; cross-block entries
    // are Jₐᵀ H_ab J_b since raw variables of different blocks are independent
    fn d2F_dykdyl<S, T, U>(
        &self,
        dF_dx: &Arr1<S>,
        d2F_dxdx: &Arr2<T>,
        x: &Arr1<U>,
    ) -> TResult<nd::Array2<C64>>
    where
        S: nd::Data<Elem = C64>,
        T: nd::Data<Elem = C64>,
        U: nd::Data<Elem = C64>,
    {
        let jacs: Vec<nd::Array2<C64>>
            = self.blocks.iter()
            .map(|b| b.transform.dxi_dyk(&x.select(nd::Axis(0), &b.xs)))
            .collect::<TResult<_>>()?;
        let mut hess: nd::Array2<C64> = nd::Array2::zeros((self.ny, self.ny));
        for (a, block_a) in self.blocks.iter().enumerate() {
            for (b, block_b) in self.blocks.iter().enumerate() {
                let h_ab = d2F_dxdx
                    .select(nd::Axis(0), &block_a.xs)
                    .select(nd::Axis(1), &block_b.xs);
                let sub = if a == b {
                    block_a.transform.d2F_dykdyl(
                        &dF_dx.select(nd::Axis(0), &block_a.xs),
                        &h_ab,
                        &x.select(nd::Axis(0), &block_a.xs),
                    )?
                } else {
                    jacs[a].t().dot(&h_ab).dot(&jacs[b])
                };
                for (bk, &k) in block_a.ys.iter().enumerate() {
                    for (bl, &l) in block_b.ys.iter().enumerate() {
                        hess[[k, l]] = sub[[bk, bl]];
                    }
                }
            }
        }
        Ok(hess)
    }
}

/// Objective over reduced variables `y`, evaluating a raw-coordinate
/// objective at `x = xis(y)` and chain-ruling its derivatives.
pub struct Pullback<'a, O> {
    transform: &'a VarTransform,
    raw: O,
}

impl<'a, O> Pullback<'a, O> {
    pub fn transform(&self) -> &VarTransform { self.transform }

    pub fn into_raw(self) -> O { self.raw }
}

impl<'a, O> Objective for Pullback<'a, O>
where O: Objective
{
    fn value(&mut self, y: &nd::Array1<C64>) -> NResult<C64> {
        let x = self.transform.xis(y)?;
        self.raw.value(&x)
    }

    fn value_grad(&mut self, y: &nd::Array1<C64>)
        -> NResult<(C64, nd::Array1<C64>)>
    {
        let x = self.transform.xis(y)?;
        let (val, grad) = self.raw.value_grad(&x)?;
        let grad_y = self.transform.dF_dyk(&grad, &x)?;
        Ok((val, grad_y))
    }

    fn vgh(&mut self, y: &nd::Array1<C64>) -> NResult<Vgh> {
        let x = self.transform.xis(y)?;
        let Vgh { val, grad, hess } = self.raw.vgh(&x)?;
        let grad_y = self.transform.dF_dyk(&grad, &x)?;
        let hess_y = self.transform.d2F_dykdyl(&grad, &hess, &x)?;
        Ok(Vgh { val, grad: grad_y, hess: hess_y })
    }
}

impl Default for VarTransform {
    fn default() -> Self { Self::Identity }
}
