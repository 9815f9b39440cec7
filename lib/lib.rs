#![allow(non_snake_case)]

//! Provides functions and higher-level constructs for the optimization of
//! complex basis-function exponents against resolvent matrix elements of the
//! form `Sᵀ L(w)⁻¹ R`, as encountered in the complex-basis-function treatment
//! of photoionization.
//!
//! Provides implementations for the following:
//! - Slater- and Gaussian-type radial basis sets with closed-form integrals
//! - Analytic first and second derivatives of the resolvent matrix element with
//!   respect to basis exponents
//! - Reparameterizations of the exponents (logarithmic, geometric, shifted,
//!   scaled, and block-wise compositions thereof) with chain-rule pullbacks
//! - A complex Newton solver with analytic or finite-difference derivatives
//! - Warm-started continuation of the optimum over a frequency schedule
//!
//! See [`docs`] for theoretical background.

pub mod error;
pub mod linalg;
pub mod utils;
pub mod observe;
pub mod basis;
pub mod deriv;
pub mod operator;
pub mod sensitivity;
pub mod transform;
pub mod newton;
pub mod continuation;
pub mod config;
pub mod driver;

pub mod docs;

pub(crate) const DEF_TOL: f64 = 1e-5;
pub(crate) const DEF_MAXITERS: usize = 10;

pub type Arr1<S> = ndarray::ArrayBase<S, ndarray::Ix1>;
pub type Arr2<S> = ndarray::ArrayBase<S, ndarray::Ix2>;
