//! Dense complex linear algebra on `ndarray` containers.
//!
//! Inversion and linear solves go through an LU decomposition with partial
//! pivoting; all products here are *unconjugated* (complex-symmetric), which is
//! the inner product used throughout for complex-scaled basis functions.

use nalgebra as na;
use ndarray as nd;
use num_complex::Complex64 as C64;
use num_traits::Zero;
use crate::{
    Arr1,
    Arr2,
    error::{ LengthError, SingularError },
};

pub type LResult<T> = Result<T, SingularError>;

fn to_na<S>(a: &Arr2<S>) -> na::DMatrix<C64>
where S: nd::Data<Elem = C64>
{
    let (n, m) = a.dim();
    na::DMatrix::from_fn(n, m, |i, j| a[[i, j]])
}

fn from_na(a: &na::DMatrix<C64>) -> nd::Array2<C64> {
    nd::Array2::from_shape_fn(a.shape(), |(i, j)| a[(i, j)])
}

// reject non-square input and results carrying NaN/inf (LU on a numerically
// singular pivot can succeed with garbage)
fn check_finite(a: &nd::Array2<C64>, n: usize) -> LResult<()> {
    a.iter().all(|ak| ak.re.is_finite() && ak.im.is_finite())
        .then_some(())
        .ok_or(SingularError(n))
}

/// Compute the inverse of a square matrix.
pub fn inverse<S>(a: &Arr2<S>) -> LResult<nd::Array2<C64>>
where S: nd::Data<Elem = C64>
{
    let n = a.nrows();
    if n != a.ncols() { return Err(SingularError(n.max(a.ncols()))); }
    if n == 0 { return Ok(nd::Array2::zeros((0, 0))); }
    let inv = to_na(a).lu().try_inverse().ok_or(SingularError(n))?;
    let inv = from_na(&inv);
    check_finite(&inv, n)?;
    Ok(inv)
}

/// Solve `a x = b` for `x`.
pub fn solve<S, T>(a: &Arr2<S>, b: &Arr1<T>)
    -> Result<nd::Array1<C64>, crate::error::NewtonError>
where
    S: nd::Data<Elem = C64>,
    T: nd::Data<Elem = C64>,
{
    let n = a.nrows();
    LengthError::check_len(a.ncols(), b.len())?;
    if n != a.ncols() { return Err(SingularError(n.max(a.ncols())).into()); }
    if n == 0 { return Ok(nd::Array1::zeros(0)); }
    let rhs = na::DVector::from_iterator(n, b.iter().copied());
    let x = to_na(a).lu().solve(&rhs).ok_or(SingularError(n))?;
    let x: nd::Array1<C64> = x.iter().copied().collect();
    x.iter().all(|xk| xk.re.is_finite() && xk.im.is_finite())
        .then_some(x)
        .ok_or_else(|| SingularError(n).into())
}

/// Unconjugated dot product `Σ aₖ bₖ`.
pub fn tdot<S, T>(a: &Arr1<S>, b: &Arr1<T>) -> Result<C64, LengthError>
where
    S: nd::Data<Elem = C64>,
    T: nd::Data<Elem = C64>,
{
    LengthError::check(a, b)?;
    Ok(a.iter().zip(b).fold(C64::zero(), |acc, (ak, bk)| acc + ak * bk))
}

/// Largest modulus over all elements, or 0 for an empty array. NaN if any
/// element is NaN.
pub fn max_norm<S>(a: &Arr1<S>) -> f64
where S: nd::Data<Elem = C64>
{
    a.iter().map(|ak| ak.norm())
        .fold(0.0, |acc, x| if acc.is_nan() || x.is_nan() { f64::NAN } else { acc.max(x) })
}
