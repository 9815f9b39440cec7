//! Frequency continuation: solve for the stationary point at each frequency of
//! a schedule, warm-starting every solve from the result at the neighboring,
//! already-solved frequency.
//!
//! The schedule is run as two sweeps outward from the start frequency `w0`:
//! first downward through `w0` and every lower frequency, then upward through
//! every higher frequency starting again from the result at `w0`.

use ndarray as nd;
use num_complex::Complex64 as C64;
use tracing::{ info, warn };
use crate::{
    error::NewtonError,
    newton::{ self, Action, Config, Iteration, NResult, Objective, Solution },
    observe::Observer,
};

/// Frequencies closer than this to `w0` are treated as `w0` itself.
pub const W_TOL: f64 = 1e-5;

/// Start frequency and target frequencies.
#[derive(Clone, Debug, PartialEq)]
pub struct Schedule {
    pub w0: f64,
    pub ws: Vec<f64>,
}

impl Schedule {
    pub fn new(w0: f64, ws: Vec<f64>) -> Self { Self { w0, ws } }

    /// Split into the descending sweep (`w0`, then lower frequencies in
    /// decreasing order) and the ascending sweep (higher frequencies in
    /// increasing order).
    pub fn split(&self) -> (Vec<f64>, Vec<f64>) {
        let mut lower: Vec<f64> = Vec::new();
        let mut upper: Vec<f64> = Vec::new();
        for &w in self.ws.iter() {
            if (w - self.w0).abs() < W_TOL { continue; }
            if w < self.w0 { lower.push(w); } else { upper.push(w); }
        }
        lower.sort_by(|a, b| b.total_cmp(a));
        lower.dedup_by(|a, b| (*a - *b).abs() < W_TOL);
        upper.sort_by(f64::total_cmp);
        upper.dedup_by(|a, b| (*a - *b).abs() < W_TOL);
        let mut desc = vec![self.w0];
        desc.append(&mut lower);
        (desc, upper)
    }
}

/// Event emitted by the continuation runner.
#[derive(Clone, Debug)]
pub enum Event<'a> {
    /// One Newton iteration at frequency `w`.
    Iteration { w: f64, iteration: &'a Iteration<'a> },
    /// A completed Newton solve at frequency `w`.
    Frequency { w: f64, solution: &'a Solution },
}

/// Results of a continuation run.
#[derive(Debug, Default)]
pub struct Sweep {
    /// Solutions, sorted by increasing frequency.
    pub points: Vec<(f64, Solution)>,
    /// Frequencies at which evaluation failed outright.
    pub failures: Vec<(f64, NewtonError)>,
    /// `true` if an observer ended the run early.
    pub stopped: bool,
}

impl Sweep {
    /// Look up the solution at a frequency.
    pub fn get(&self, w: f64) -> Option<&Solution> {
        self.points.iter()
            .find(|(wk, _)| (wk - w).abs() < W_TOL)
            .map(|(_, sol)| sol)
    }

    /// `true` if every frequency was solved and converged.
    pub fn all_converged(&self) -> bool {
        self.failures.is_empty() && self.points.iter().all(|(_, sol)| sol.success)
    }
}

struct Runner<'c, F, Obs> {
    config: &'c Config,
    oracle_at: F,
    observer: Obs,
    sweep: Sweep,
}

impl<'c, F, O, Obs> Runner<'c, F, Obs>
where
    F: FnMut(f64) -> O,
    O: Objective,
    Obs: for<'a> Observer<Event<'a>, Action>,
{
    // run one sweep; returns the result at its first frequency
    fn run_sweep(&mut self, ws: &[f64], y0: &nd::Array1<C64>)
        -> Option<nd::Array1<C64>>
    {
        let mut guess = y0.clone();
        let mut first: Option<nd::Array1<C64>> = None;
        for (k, &w) in ws.iter().enumerate() {
            if self.sweep.stopped { break; }
            let obj = (self.oracle_at)(w);
            let observer = &mut self.observer;
            let res = newton::newton(
                obj,
                &guess,
                self.config,
                |iteration: &Iteration<'_>| {
                    observer.observe(&Event::Iteration { w, iteration })
                },
            );
            match res {
                Ok(sol) => {
                    if sol.success {
                        info!(w, val = %sol.val, nit = sol.nit, "converged");
                    } else {
                        warn!(w, val = %sol.val, status = ?sol.status, "not converged");
                    }
                    let requested = self.observer
                        .observe(&Event::Frequency { w, solution: &sol })
                        .is_some();
                    let stop = requested
                        || sol.status == newton::Status::StoppedByObserver;
                    guess = sol.x.clone();
                    if k == 0 { first = Some(sol.x.clone()); }
                    self.sweep.points.push((w, sol));
                    self.sweep.stopped = stop;
                },
                Err(err) => {
                    warn!(w, %err, "evaluation failed");
                    self.sweep.failures.push((w, err));
                },
            }
        }
        first
    }
}

/// Run Newton's method over a frequency schedule.
///
/// `oracle_at(w)` supplies the objective at frequency `w`, and `y0` the initial
/// guess at `w0`. After a failed frequency the sweep continues from the last
/// successful iterate; the ascending sweep starts from the result at `w0`, or
/// from `y0` if that solve failed.
///
/// # Errors
///
/// Fails only if `config` is invalid. Evaluation errors at individual
/// frequencies are collected in [`Sweep::failures`].
pub fn run<F, O, Obs>(
    schedule: &Schedule,
    y0: &nd::Array1<C64>,
    config: &Config,
    oracle_at: F,
    observer: Obs,
) -> NResult<Sweep>
where
    F: FnMut(f64) -> O,
    O: Objective,
    Obs: for<'a> Observer<Event<'a>, Action>,
{
    config.validate()?;
    let (desc, asc) = schedule.split();
    let mut runner = Runner { config, oracle_at, observer, sweep: Sweep::default() };
    let at_w0 = runner.run_sweep(&desc, y0);
    runner.run_sweep(&asc, at_w0.as_ref().unwrap_or(y0));
    let mut sweep = runner.sweep;
    sweep.points.sort_by(|(wa, _), (wb, _)| wa.total_cmp(wb));
    Ok(sweep)
}
