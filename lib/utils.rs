//! Finite-difference derivatives of complex functions of complex variables.
//!
//! Steps are taken along the real axis of each variable (and, for
//! [`Stencil::ComplexStep`], along the imaginary axis as well), which gives the
//! complex derivative for the holomorphic functionals treated here.

use std::ops::{ Add, Mul, Sub };
use ndarray as nd;
use num_complex::Complex64 as C64;
use serde::Deserialize;

/// Finite-difference rule for a single partial derivative.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stencil {
    /// `(f(x + h) − f(x − h)) / 2h`.
    #[default]
    Central,
    /// Average of the central differences along the real and imaginary axes,
    /// `(f(x + h) − f(x − h) − i f(x + ih) + i f(x − ih)) / 4h`. The `h²` error
    /// terms cancel for holomorphic `f`.
    ComplexStep,
    /// `(3/2) m₁ − (3/5) m₂ + (1/10) m₃` with
    /// `mⱼ = (f(x + jh) − f(x − jh)) / 2jh`.
    ThreePair,
}

impl Stencil {
    /// Return `true` if `self` is `Central`.
    pub fn is_central(&self) -> bool { matches!(self, Self::Central) }
}

fn shifted(x: &nd::Array1<C64>, k: usize, d: C64) -> nd::Array1<C64> {
    let mut xs = x.clone();
    xs[k] += d;
    xs
}

fn shifted2(x: &nd::Array1<C64>, k: usize, hk: f64, l: usize, hl: f64)
    -> nd::Array1<C64>
{
    let mut xs = x.clone();
    xs[k] += hk;
    xs[l] += hl;
    xs
}

/// Partial derivative `∂f/∂xₖ` with step `h`.
///
/// `f` may return a scalar or an array; anything closed under addition,
/// subtraction, and scaling by a complex number works.
pub fn partial<F, T, E>(mut f: F, x: &nd::Array1<C64>, k: usize, h: f64, stencil: Stencil)
    -> Result<T, E>
where
    F: FnMut(&nd::Array1<C64>) -> Result<T, E>,
    T: Add<Output = T> + Sub<Output = T> + Mul<C64, Output = T>,
{
    let mut diff = |d: C64| -> Result<T, E> {
        Ok(f(&shifted(x, k, d))? - f(&shifted(x, k, -d))?)
    };
    match stencil {
        Stencil::Central => Ok(diff(h.into())? * C64::from(0.5 / h)),
        Stencil::ComplexStep => {
            let re = diff(h.into())?;
            let im = diff(C64::new(0.0, h))?;
            Ok((re - im * C64::i()) * C64::from(0.25 / h))
        },
        Stencil::ThreePair => {
            let m1 = diff(h.into())? * C64::from(0.5 / h);
            let m2 = diff((2.0 * h).into())? * C64::from(0.25 / h);
            let m3 = diff((3.0 * h).into())? * C64::from(1.0 / (6.0 * h));
            Ok(m1 * C64::from(1.5) - m2 * C64::from(0.6) + m3 * C64::from(0.1))
        },
    }
}

/// Gradient of a scalar function, one [`partial`] per variable.
pub fn num_grad<F, E>(mut f: F, x: &nd::Array1<C64>, h: f64, stencil: Stencil)
    -> Result<nd::Array1<C64>, E>
where F: FnMut(&nd::Array1<C64>) -> Result<C64, E>
{
    (0..x.len())
        .map(|k| partial(&mut f, x, k, h, stencil))
        .collect()
}

/// Hessian of a scalar function from finite differences of its gradient.
///
/// Column `k` is the partial derivative of `g` along `xₖ`; the result is
/// symmetrized.
pub fn num_hess_from_grad<F, E>(mut g: F, x: &nd::Array1<C64>, h: f64, stencil: Stencil)
    -> Result<nd::Array2<C64>, E>
where F: FnMut(&nd::Array1<C64>) -> Result<nd::Array1<C64>, E>
{
    let n = x.len();
    let mut hess: nd::Array2<C64> = nd::Array2::zeros((n, n));
    for k in 0..n {
        let col = partial(&mut g, x, k, h, stencil)?;
        hess.column_mut(k).assign(&col);
    }
    let hess_t = hess.t().to_owned();
    Ok((hess + hess_t) / C64::from(2.0))
}

/// Hessian of a scalar function from its values alone.
///
/// With [`Stencil::Central`], diagonal entries use the three-point stencil and
/// off-diagonal entries the four-point stencil `(f₊₊ − f₊₋ − f₋₊ + f₋₋) / 4h²`.
/// Other stencils are applied twice in succession.
pub fn num_hess_from_value<F, E>(mut f: F, x: &nd::Array1<C64>, h: f64, stencil: Stencil)
    -> Result<nd::Array2<C64>, E>
where F: FnMut(&nd::Array1<C64>) -> Result<C64, E>
{
    let n = x.len();
    let mut hess: nd::Array2<C64> = nd::Array2::zeros((n, n));
    if n == 0 { return Ok(hess); }
    if !stencil.is_central() {
        for k in 0..n {
            for l in k..n {
                hess[[k, l]] = partial(
                    |y: &nd::Array1<C64>| partial(&mut f, y, l, h, stencil),
                    x, k, h, stencil,
                )?;
                hess[[l, k]] = hess[[k, l]];
            }
        }
        return Ok(hess);
    }
    let f0 = f(x)?;
    let h2 = h * h;
    for k in 0..n {
        hess[[k, k]]
            = (f(&shifted(x, k, h.into()))? + f(&shifted(x, k, (-h).into()))? - 2.0 * f0)
            / h2;
        for l in k + 1..n {
            let fpp = f(&shifted2(x, k, h, l, h))?;
            let fpm = f(&shifted2(x, k, h, l, -h))?;
            let fmp = f(&shifted2(x, k, -h, l, h))?;
            let fmm = f(&shifted2(x, k, -h, l, -h))?;
            hess[[k, l]] = (fpp - fpm - fmp + fmm) / (4.0 * h2);
            hess[[l, k]] = hess[[k, l]];
        }
    }
    Ok(hess)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use approx::assert_abs_diff_eq;

    const ALL: [Stencil; 3] = [Stencil::Central, Stencil::ComplexStep, Stencil::ThreePair];

    fn c(re: f64, im: f64) -> C64 { C64::new(re, im) }

    // f(x) = x₀² x₁ + exp(x₁)
    fn f(x: &nd::Array1<C64>) -> Result<C64, Infallible> {
        Ok(x[0] * x[0] * x[1] + x[1].exp())
    }

    fn g(x: &nd::Array1<C64>) -> Result<nd::Array1<C64>, Infallible> {
        Ok(nd::array![2.0 * x[0] * x[1], x[0] * x[0] + x[1].exp()])
    }

    fn exact_hess(x: &nd::Array1<C64>) -> nd::Array2<C64> {
        nd::array![
            [2.0 * x[1], 2.0 * x[0]],
            [2.0 * x[0], x[1].exp()],
        ]
    }

    fn max_diff(a: &nd::Array2<C64>, b: &nd::Array2<C64>) -> f64 {
        (a - b).iter().map(|d| d.norm()).fold(0.0, f64::max)
    }

    #[test]
    fn gradient() {
        let x = nd::array![c(0.7, -0.2), c(0.3, 0.4)];
        let ga = g(&x).unwrap();
        for stencil in ALL {
            let gn = num_grad(f, &x, 1e-4, stencil).unwrap();
            for (a, b) in gn.iter().zip(ga.iter()) {
                assert_abs_diff_eq!((a - b).norm(), 0.0, epsilon = 1e-8);
            }
        }
    }

    #[test]
    fn hessians() {
        let x = nd::array![c(0.7, -0.2), c(0.3, 0.4)];
        let exact = exact_hess(&x);
        for stencil in ALL {
            assert!(max_diff(&num_hess_from_grad(g, &x, 1e-4, stencil).unwrap(), &exact) < 1e-8);
            assert!(max_diff(&num_hess_from_value(f, &x, 1e-3, stencil).unwrap(), &exact) < 1e-5);
        }
    }

    // exp(x) at a large step: the wider and complex stencils cancel the h²
    // error that the plain central difference keeps
    #[test]
    fn higher_order_stencils_are_more_accurate() {
        let x = nd::array![c(0.2, 0.1)];
        let exact = x[0].exp();
        let exp = |y: &nd::Array1<C64>| Ok::<_, Infallible>(y[0].exp());
        let err = |stencil| (partial(exp, &x, 0, 0.1, stencil).unwrap() - exact).norm();
        let central = err(Stencil::Central);
        assert!(central > 1e-3);
        assert!(err(Stencil::ComplexStep) < 1e-2 * central);
        assert!(err(Stencil::ThreePair) < 1e-2 * central);
    }

    #[test]
    fn stencil_from_toml() {
        #[derive(Deserialize)]
        struct T { s: Stencil }
        let t: T = toml::from_str("s = \"complex_step\"").unwrap();
        assert_eq!(t.s, Stencil::ComplexStep);
        let t: T = toml::from_str("s = \"three_pair\"").unwrap();
        assert_eq!(t.s, Stencil::ThreePair);
    }

    #[test]
    fn errors_propagate() {
        let x = nd::array![c(1.0, 0.0)];
        let res = num_grad(|_: &nd::Array1<C64>| Err::<C64, _>("bad"), &x, 1e-4, Stencil::Central);
        assert_eq!(res, Err("bad"));
    }
}
