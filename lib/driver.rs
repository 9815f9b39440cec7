//! High-level driver: optimize the exponents of a configured basis for the
//! hydrogen photoionization resolvent over a frequency schedule.

use ndarray as nd;
use num_complex::Complex64 as C64;
use tracing::info;
use crate::{
    Arr1,
    basis::BasisSet,
    config::{ self, BasisSetup, RunConfig },
    continuation::{ self, Event, Schedule, Sweep },
    error::OptError,
    newton::{ self, Action },
    observe::Observer,
    operator::{ HPhotoionization, Operator },
    sensitivity::GreenFunctional,
    transform::VarTransform,
};

pub type OptResult<T> = Result<T, OptError>;

/// A complete exponent optimization problem.
#[derive(Clone, Debug)]
pub struct OptGreen<O = HPhotoionization> {
    op: O,
    setup: BasisSetup,
    schedule: Schedule,
    newton: newton::Config,
}

impl OptGreen<HPhotoionization> {
    /// Build from a run configuration.
    pub fn from_config(config: &RunConfig) -> OptResult<Self> {
        config.check_target()?;
        let op = HPhotoionization::new(config.channel()?, config.dipole()?)?;
        let setup = config.basis_setup()?;
        info!(
            channel = %op.channel(),
            basis = %config.basis_type,
            size = setup.base.size(),
            nopt = setup.num_opt(),
            "initialized"
        );
        Self::new(op, setup, config.schedule(), config.newton.clone())
    }
}

impl<O> OptGreen<O>
where O: Operator
{
    /// Assemble from parts.
    pub fn new(
        op: O,
        setup: BasisSetup,
        schedule: Schedule,
        newton: newton::Config,
    ) -> OptResult<Self> {
        config::check_setup(&setup)?;
        newton.validate()?;
        Ok(Self { op, setup, schedule, newton })
    }

    pub fn operator(&self) -> &O { &self.op }

    pub fn setup(&self) -> &BasisSetup { &self.setup }

    pub fn transform(&self) -> &VarTransform { &self.setup.transform }

    pub fn schedule(&self) -> &Schedule { &self.schedule }

    /// Initial reduced variables.
    pub fn y0(&self) -> &nd::Array1<C64> { &self.setup.y0 }

    fn functional(&self) -> OptResult<GreenFunctional<'_, O>> {
        Ok(GreenFunctional::new(&self.op, self.setup.base.clone(), &self.setup.mask)?)
    }

    /// Run the continuation over the configured schedule.
    pub fn run<Obs>(&self, observer: Obs) -> OptResult<Sweep>
    where Obs: for<'a> Observer<Event<'a>, Action>
    {
        let func = self.functional()?;
        let transform = &self.setup.transform;
        let sweep = continuation::run(
            &self.schedule,
            &self.setup.y0,
            &self.newton,
            |w| transform.pullback(func.at(w)),
            observer,
        )?;
        Ok(sweep)
    }

    /// Optimized raw exponents for reduced variables `ys`.
    pub fn raw_exponents<S>(&self, ys: &Arr1<S>) -> OptResult<nd::Array1<C64>>
    where S: nd::Data<Elem = C64>
    {
        Ok(self.setup.transform.xis(ys)?)
    }

    /// Basis set for reduced variables `ys`.
    pub fn basis_at<S>(&self, ys: &Arr1<S>) -> OptResult<BasisSet>
    where S: nd::Data<Elem = C64>
    {
        let zs = self.raw_exponents(ys)?;
        Ok(self.functional()?.basis_at(&zs)?)
    }

    /// Driven wavefunction at frequency `w` for reduced variables `ys`,
    /// evaluated on the radii `rs`.
    pub fn wavefunction<S, T>(&self, w: f64, ys: &Arr1<S>, rs: &Arr1<T>)
        -> OptResult<nd::Array1<C64>>
    where
        S: nd::Data<Elem = C64>,
        T: nd::Data<Elem = f64>,
    {
        let zs = self.raw_exponents(ys)?;
        Ok(self.functional()?.wavefunction(w, &zs, rs)?)
    }
}
