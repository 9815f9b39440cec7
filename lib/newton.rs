//! Undamped Newton iteration toward a stationary point of a complex scalar
//! functional.
//!
//! Each iteration evaluates the value, gradient, and Hessian at the current
//! point (analytically or by finite differences, see [`Config`]), computes the
//! step `dx = −H⁻¹ g`, and either declares convergence or applies the step.
//! Running out of iterations is reported through [`Solution::success`] and
//! [`Status::MaxIters`], not as an error.

use ndarray as nd;
use num_complex::Complex64 as C64;
use serde::Deserialize;
use tracing::{ debug, warn };
use crate::{
    DEF_MAXITERS,
    DEF_TOL,
    error::NewtonError,
    linalg::{ max_norm, solve },
    observe::Observer,
    utils::{ self, Stencil },
};

pub type NResult<T> = Result<T, NewtonError>;

/// Value, gradient, and Hessian at one point.
#[derive(Clone, Debug, PartialEq)]
pub struct Vgh {
    pub val: C64,
    pub grad: nd::Array1<C64>,
    pub hess: nd::Array2<C64>,
}

/// A scalar functional with (possibly) analytic derivatives.
///
/// Only [`vgh`][Self::vgh] is required; implementors that can compute the
/// value or gradient more cheaply should override the other two methods, which
/// are what the numeric modes call.
pub trait Objective {
    /// Value, gradient, and Hessian at `x`.
    fn vgh(&mut self, x: &nd::Array1<C64>) -> NResult<Vgh>;

    /// Value at `x`.
    fn value(&mut self, x: &nd::Array1<C64>) -> NResult<C64> {
        Ok(self.vgh(x)?.val)
    }

    /// Value and gradient at `x`.
    fn value_grad(&mut self, x: &nd::Array1<C64>)
        -> NResult<(C64, nd::Array1<C64>)>
    {
        let Vgh { val, grad, .. } = self.vgh(x)?;
        Ok((val, grad))
    }
}

impl<F> Objective for F
where F: FnMut(&nd::Array1<C64>) -> NResult<Vgh>
{
    fn vgh(&mut self, x: &nd::Array1<C64>) -> NResult<Vgh> { self(x) }
}

/// Adapts a value-only function into an [`Objective`] whose derivatives are
/// finite differences with step `h` (central by default).
pub struct ScalarFn<F> {
    pub f: F,
    pub h: f64,
    pub stencil: Stencil,
}

impl<F> ScalarFn<F>
where F: FnMut(&nd::Array1<C64>) -> NResult<C64>
{
    pub fn new(f: F, h: f64) -> Self { Self { f, h, stencil: Stencil::Central } }

    pub fn with_stencil(self, stencil: Stencil) -> Self { Self { stencil, ..self } }
}

impl<F> Objective for ScalarFn<F>
where F: FnMut(&nd::Array1<C64>) -> NResult<C64>
{
    fn vgh(&mut self, x: &nd::Array1<C64>) -> NResult<Vgh> {
        let (h, stencil) = (self.h, self.stencil);
        let val = (self.f)(x)?;
        let grad = utils::num_grad(&mut self.f, x, h, stencil)?;
        let hess = utils::num_hess_from_value(&mut self.f, x, h, stencil)?;
        Ok(Vgh { val, grad, hess })
    }

    fn value(&mut self, x: &nd::Array1<C64>) -> NResult<C64> { (self.f)(x) }

    fn value_grad(&mut self, x: &nd::Array1<C64>)
        -> NResult<(C64, nd::Array1<C64>)>
    {
        let val = (self.f)(x)?;
        let grad = utils::num_grad(&mut self.f, x, self.h, self.stencil)?;
        Ok((val, grad))
    }
}

/// Source of a derivative.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Deriv {
    #[default]
    Analytic,
    Numeric,
}

/// Convergence test applied at each iteration.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criterion {
    /// `max |gₖ| < tol`.
    #[default]
    Grad,
    /// `max |dxₖ| < tol`.
    Step,
}

/// Finite-difference step and stencil.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FiniteDiff {
    pub h: f64,
    pub stencil: Stencil,
}

/// Evaluation mode resolved from a [`Config`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Mode {
    /// Value, gradient, and Hessian from the objective.
    Analytic,
    /// Analytic gradient; Hessian by finite differences of the gradient.
    NumericHess(FiniteDiff),
    /// Gradient and Hessian by finite differences of the value.
    Numeric(FiniteDiff),
}

impl Mode {
    /// Return `true` if `self` is `Analytic`.
    pub fn is_analytic(&self) -> bool { matches!(self, Self::Analytic) }

    /// Return `true` if `self` is `NumericHess`.
    pub fn is_numeric_hess(&self) -> bool { matches!(self, Self::NumericHess(_)) }

    /// Return `true` if `self` is `Numeric`.
    pub fn is_numeric(&self) -> bool { matches!(self, Self::Numeric(_)) }
}

/// Newton solver configuration.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub tol: f64,
    pub maxit: usize,
    pub grad: Deriv,
    pub hess: Deriv,
    /// Finite-difference step, required by the numeric modes.
    pub step: Option<f64>,
    /// Finite-difference rule used by the numeric modes.
    pub stencil: Stencil,
    pub criterion: Criterion,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tol: DEF_TOL,
            maxit: DEF_MAXITERS,
            grad: Deriv::Analytic,
            hess: Deriv::Analytic,
            step: None,
            stencil: Stencil::Central,
            criterion: Criterion::Grad,
        }
    }
}

impl Config {
    /// Check parameters and resolve the evaluation mode.
    pub fn validate(&self) -> NResult<Mode> {
        NewtonError::check_epsilon(self.tol)?;
        NewtonError::check_maxiters(self.maxit)?;
        if let Some(h) = self.step { NewtonError::check_step(h)?; }
        let fd = self.step
            .map(|h| FiniteDiff { h, stencil: self.stencil })
            .ok_or(NewtonError::MissingStep);
        match (self.grad, self.hess) {
            (Deriv::Analytic, Deriv::Analytic) => Ok(Mode::Analytic),
            (Deriv::Analytic, Deriv::Numeric) => fd.map(Mode::NumericHess),
            (Deriv::Numeric, Deriv::Numeric) => fd.map(Mode::Numeric),
            (Deriv::Numeric, Deriv::Analytic) => Err(NewtonError::UnsupportedMode),
        }
    }
}

/// Control actions an observer may request.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Action {
    /// End the iteration at the current point.
    Stop,
}

/// Event emitted once per Newton iteration, after evaluation and before the
/// step is applied.
#[derive(Clone, Debug)]
pub struct Iteration<'a> {
    /// Number of steps applied so far.
    pub nit: usize,
    /// Current point.
    pub x: &'a nd::Array1<C64>,
    pub val: C64,
    /// `max |gₖ|`.
    pub grad_norm: f64,
    /// `max |dxₖ|`, if the step was computed.
    pub step_norm: Option<f64>,
}

/// Terminal state of a Newton run.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Status {
    Converged,
    MaxIters,
    StoppedByObserver,
}

/// Result of a Newton run.
///
/// On `MaxIters`, `x` is the last iterate (with the final step applied) while
/// `val`, `grad`, and `hess` are from the last evaluation.
#[derive(Clone, Debug, PartialEq)]
pub struct Solution {
    pub x: nd::Array1<C64>,
    pub val: C64,
    pub grad: nd::Array1<C64>,
    pub hess: nd::Array2<C64>,
    /// Number of Newton steps applied.
    pub nit: usize,
    pub success: bool,
    pub status: Status,
    pub message: String,
}

impl Solution {
    fn new(x: nd::Array1<C64>, vgh: Vgh, nit: usize, status: Status) -> Self {
        let Vgh { val, grad, hess } = vgh;
        let message = match status {
            Status::Converged => format!("converged after {} steps", nit),
            Status::MaxIters => format!("maximum number of iterations ({}) reached", nit),
            Status::StoppedByObserver => format!("stopped by observer after {} steps", nit),
        };
        Self {
            x,
            val,
            grad,
            hess,
            nit,
            success: status == Status::Converged,
            status,
            message,
        }
    }
}

/// Evaluate an objective at `x` according to `mode`.
pub fn evaluate<O>(obj: &mut O, x: &nd::Array1<C64>, mode: Mode) -> NResult<Vgh>
where O: Objective
{
    match mode {
        Mode::Analytic => obj.vgh(x),
        Mode::NumericHess(FiniteDiff { h, stencil }) => {
            let (val, grad) = obj.value_grad(x)?;
            let hess = utils::num_hess_from_grad(
                |xk: &nd::Array1<C64>| obj.value_grad(xk).map(|(_, g)| g),
                x, h, stencil,
            )?;
            Ok(Vgh { val, grad, hess })
        },
        Mode::Numeric(FiniteDiff { h, stencil }) => {
            let val = obj.value(x)?;
            let grad = utils::num_grad(
                |xk: &nd::Array1<C64>| obj.value(xk), x, h, stencil)?;
            let hess = utils::num_hess_from_value(
                |xk: &nd::Array1<C64>| obj.value(xk), x, h, stencil)?;
            Ok(Vgh { val, grad, hess })
        },
    }
}

/// Run Newton's method from `x0`.
///
/// The observer sees every iteration and may stop the run early, in which case
/// the current point is returned with [`Status::StoppedByObserver`].
///
/// # Errors
///
/// Returns an error if `config` is invalid, the objective fails to evaluate or
/// returns a non-finite value or gradient, or the Hessian is singular.
pub fn newton<O, Obs>(
    mut obj: O,
    x0: &nd::Array1<C64>,
    config: &Config,
    mut observer: Obs,
) -> NResult<Solution>
where
    O: Objective,
    Obs: for<'a> Observer<Iteration<'a>, Action>,
{
    let mode = config.validate()?;
    let mut x = x0.clone();
    let mut last: Option<Vgh> = None;
    for nit in 0..config.maxit {
        let vgh = evaluate(&mut obj, &x, mode)?;
        NewtonError::check_finite(nit, std::iter::once(&vgh.val).chain(vgh.grad.iter()))?;
        let grad_norm = max_norm(&vgh.grad);
        let dx: Option<nd::Array1<C64>>
            = if config.criterion == Criterion::Grad && grad_norm < config.tol {
                None
            } else {
                Some(solve(&vgh.hess, &vgh.grad)?.mapv(|g| -g))
            };
        let step_norm = dx.as_ref().map(max_norm);
        debug!(nit, val = %vgh.val, grad_norm, ?step_norm, "newton iteration");

        let event = Iteration { nit, x: &x, val: vgh.val, grad_norm, step_norm };
        if let Some(Action::Stop) = observer.observe(&event) {
            return Ok(Solution::new(x, vgh, nit, Status::StoppedByObserver));
        }

        let converged = match config.criterion {
            Criterion::Grad => dx.is_none(),
            Criterion::Step => step_norm.is_some_and(|s| s < config.tol),
        };
        match dx {
            Some(dx) if !converged => { x += &dx; },
            _ => { return Ok(Solution::new(x, vgh, nit, Status::Converged)); },
        }
        last = Some(vgh);
    }
    warn!(maxit = config.maxit, "newton iteration did not converge");
    // maxit > 0 was checked, so the loop ran at least once
    let vgh = last.ok_or(NewtonError::BadMaxiters(config.maxit))?;
    Ok(Solution::new(x, vgh, config.maxit, Status::MaxIters))
}

/// Run Newton's method without observation.
pub fn newton_unobserved<O>(obj: O, x0: &nd::Array1<C64>, config: &Config)
    -> NResult<Solution>
where O: Objective
{
    newton(obj, x0, config, ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn c(re: f64, im: f64) -> C64 { C64::new(re, im) }

    // F(x) = ½ (x − m)ᵀ A (x − m) + F0
    fn quadratic(x: &nd::Array1<C64>) -> NResult<Vgh> {
        let a = nd::array![[c(2.0, 0.5), c(0.3, 0.0)], [c(0.3, 0.0), c(1.0, -0.2)]];
        let m = nd::array![c(0.4, -0.3), c(-1.0, 0.2)];
        let d = x - &m;
        let ad = a.dot(&d);
        let val = 0.5 * d.dot(&ad) + c(1.0, 1.0);
        Ok(Vgh { val, grad: ad, hess: a })
    }

    fn quartic(x: &nd::Array1<C64>) -> NResult<C64> {
        Ok(x.iter().map(|xk| (xk - 1.0).powi(4) + xk * xk).sum())
    }

    #[test]
    fn quadratic_converges_in_one_step() {
        for x0 in [nd::array![c(0.0, 0.0), c(0.0, 0.0)], nd::array![c(5.0, -3.0), c(-2.0, 7.0)]] {
            let sol = newton_unobserved(quadratic, &x0, &Config::default()).unwrap();
            assert!(sol.success);
            assert_eq!(sol.status, Status::Converged);
            assert_eq!(sol.nit, 1);
            assert!(max_norm(&sol.grad) < 1e-5);
            assert_abs_diff_eq!((sol.x[0] - c(0.4, -0.3)).norm(), 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!((sol.val - c(1.0, 1.0)).norm(), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn step_criterion() {
        let config = Config { criterion: Criterion::Step, ..Config::default() };
        let sol = newton_unobserved(quadratic, &nd::array![c(1.0, 0.0), c(1.0, 0.0)], &config)
            .unwrap();
        assert!(sol.success);
        assert_eq!(sol.nit, 1);
    }

    #[test]
    fn numeric_modes_agree() {
        let x0 = nd::array![c(0.3, -0.4)];
        let analytic_hess = Config { hess: Deriv::Numeric, step: Some(1e-4), ..Config::default() };
        let sol_a = newton_unobserved(quadratic_1d, &x0, &analytic_hess).unwrap();
        let numeric = Config {
            grad: Deriv::Numeric,
            hess: Deriv::Numeric,
            step: Some(1e-4),
            maxit: 30,
            ..Config::default()
        };
        let sol_n = newton_unobserved(ScalarFn::new(quartic, 1e-4), &x0, &numeric).unwrap();
        assert!(sol_a.success);
        assert!(sol_n.success);
        // stationary point of (x − 1)⁴ + x²: 2(x − 1)³ + x = 0
        let x = sol_n.x[0];
        assert_abs_diff_eq!((2.0 * (x - 1.0).powi(3) + x).norm(), 0.0, epsilon = 1e-4);
    }

    fn quadratic_1d(x: &nd::Array1<C64>) -> NResult<Vgh> {
        let d = x[0] - c(0.5, 0.5);
        Ok(Vgh {
            val: d * d,
            grad: nd::array![2.0 * d],
            hess: nd::array![[c(2.0, 0.0)]],
        })
    }

    #[test]
    fn config_validation() {
        let bad_mode = Config { grad: Deriv::Numeric, ..Config::default() };
        assert!(matches!(bad_mode.validate(), Err(NewtonError::UnsupportedMode)));
        let no_step = Config { hess: Deriv::Numeric, ..Config::default() };
        assert!(matches!(no_step.validate(), Err(NewtonError::MissingStep)));
        let bad_tol = Config { tol: 0.0, ..Config::default() };
        assert!(matches!(bad_tol.validate(), Err(NewtonError::BadEpsilon(_))));
        let bad_maxit = Config { maxit: 0, ..Config::default() };
        assert!(matches!(bad_maxit.validate(), Err(NewtonError::BadMaxiters(0))));
        let bad_step = Config { hess: Deriv::Numeric, step: Some(-1.0), ..Config::default() };
        assert!(matches!(bad_step.validate(), Err(NewtonError::BadStep(_))));
        assert!(Config::default().validate().unwrap().is_analytic());
    }

    #[test]
    fn max_iters_keeps_last_iterate() {
        let config = Config { maxit: 2, ..Config::default() };
        let x0 = nd::array![c(3.0, -1.0)];
        let sol = newton_unobserved(ScalarFn::new(quartic, 1e-4), &x0,
            &Config { grad: Deriv::Numeric, hess: Deriv::Numeric, step: Some(1e-4), ..config })
            .unwrap();
        assert!(!sol.success);
        assert_eq!(sol.status, Status::MaxIters);
        assert_eq!(sol.nit, 2);
        assert_ne!(sol.x, x0);
    }

    #[test]
    fn observer_can_stop() {
        let mut seen: Vec<usize> = Vec::new();
        let observer = |it: &Iteration<'_>| {
            seen.push(it.nit);
            (it.nit == 1).then_some(Action::Stop)
        };
        let config = Config {
            grad: Deriv::Numeric,
            hess: Deriv::Numeric,
            step: Some(1e-4),
            maxit: 50,
            ..Config::default()
        };
        let sol = newton(ScalarFn::new(quartic, 1e-4), &nd::array![c(3.0, -1.0)], &config, observer)
            .unwrap();
        assert_eq!(sol.status, Status::StoppedByObserver);
        assert!(!sol.success);
        assert_eq!(sol.nit, 1);
        assert_eq!(seen, vec![0, 1]);
    }

    #[test]
    fn empty_problem_converges_immediately() {
        let sol = newton_unobserved(
            |_: &nd::Array1<C64>| Ok::<_, NewtonError>(Vgh {
                val: c(2.0, 0.0),
                grad: nd::Array1::zeros(0),
                hess: nd::Array2::zeros((0, 0)),
            }),
            &nd::Array1::zeros(0),
            &Config::default(),
        ).unwrap();
        assert!(sol.success);
        assert_eq!(sol.nit, 0);
        assert_eq!(sol.val, c(2.0, 0.0));
    }

    #[test]
    fn singular_hessian_is_an_error() {
        let flat = |_: &nd::Array1<C64>| Ok::<_, NewtonError>(Vgh {
            val: c(0.0, 0.0),
            grad: nd::array![c(1.0, 0.0)],
            hess: nd::array![[c(0.0, 0.0)]],
        });
        let res = newton_unobserved(flat, &nd::array![c(0.0, 0.0)], &Config::default());
        assert!(matches!(res, Err(NewtonError::Singular(_))));
    }

    #[test]
    fn config_from_toml() {
        let config: Config = toml::from_str("tol = 1e-8\nhess = \"numeric\"\nstep = 1e-3\n").unwrap();
        assert_eq!(config.maxit, DEF_MAXITERS);
        assert_eq!(
            config.validate().unwrap(),
            Mode::NumericHess(FiniteDiff { h: 1e-3, stencil: Stencil::Central }),
        );
        let config: Config = toml::from_str(
            "grad = \"numeric\"\nhess = \"numeric\"\nstep = 1e-3\nstencil = \"three_pair\"\n"
        ).unwrap();
        assert_eq!(
            config.validate().unwrap(),
            Mode::Numeric(FiniteDiff { h: 1e-3, stencil: Stencil::ThreePair }),
        );
    }

    #[test]
    fn non_finite_gradient_is_an_error() {
        for bad in [c(f64::NAN, f64::NAN), c(f64::INFINITY, 0.0)] {
            let broken = move |_: &nd::Array1<C64>| Ok::<_, NewtonError>(Vgh {
                val: c(1.0, 0.0),
                grad: nd::array![bad],
                hess: nd::array![[c(1.0, 0.0)]],
            });
            let res = newton_unobserved(broken, &nd::array![c(0.0, 0.0)], &Config::default());
            assert!(matches!(res, Err(NewtonError::NonFinite(0))));
        }
        let nan_value = |_: &nd::Array1<C64>| Ok::<_, NewtonError>(Vgh {
            val: c(f64::NAN, 0.0),
            grad: nd::array![c(0.0, 0.0)],
            hess: nd::array![[c(1.0, 0.0)]],
        });
        let res = newton_unobserved(nan_value, &nd::array![c(0.0, 0.0)], &Config::default());
        assert!(matches!(res, Err(NewtonError::NonFinite(0))));
    }

    #[test]
    fn wider_stencils_solve_the_quartic() {
        let x0 = nd::array![c(0.3, -0.4)];
        for stencil in [Stencil::ComplexStep, Stencil::ThreePair] {
            let config = Config {
                grad: Deriv::Numeric,
                hess: Deriv::Numeric,
                step: Some(1e-3),
                stencil,
                maxit: 30,
                ..Config::default()
            };
            let obj = ScalarFn::new(quartic, 1e-3).with_stencil(stencil);
            let sol = newton_unobserved(obj, &x0, &config).unwrap();
            assert!(sol.success);
            let x = sol.x[0];
            assert_abs_diff_eq!((2.0 * (x - 1.0).powi(3) + x).norm(), 0.0, epsilon = 1e-4);
        }
    }
}
