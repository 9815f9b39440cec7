//! Run configuration and construction of the optimized basis from an ordered
//! list of basis entries.
//!
//! Each entry contributes one or more raw exponents with a common power index
//! `n`. Entries marked `opt` also contribute reduced optimization variables
//! through the transform named by their command:
//!
//! | `cmd`   | parameters          | raw exponents       | variables     |
//! |---------|---------------------|---------------------|---------------|
//! | `id`    | `z`                 | `z`                 | `z`           |
//! | `log`   | `z`                 | `z`                 | `ln z`        |
//! | `geo`   | `num`, `z`, `ratio` | `z ratioᵏ`, k < num | `(z, ratio)`  |
//! | `shift` | `a0`, `y0`          | `a0ᵢ + y0`          | `y0`          |
//! | `scale` | `a0`, `y0`          | `a0ᵢ y0`            | `y0`          |
//!
//! Complex values are written either as a number or as a `[re, im]` pair.
//!
//! ```toml
//! basis_type = "STO"
//! w0 = 1.0
//! ws = [0.8, 0.9, 1.0, 1.5]
//! channel = "1s->kp"
//! dipole = "length"
//!
//! [[basis]]
//! cmd = "id"
//! opt = true
//! n = 2
//! z = [0.6, -0.6]
//!
//! [newton]
//! tol = 1e-5
//! maxit = 10
//! ```

use std::{ fs, path::Path };
use ndarray as nd;
use num_complex::Complex64 as C64;
use num_traits::Zero;
use serde::Deserialize;
use tracing::debug;
use crate::{
    basis::{ BasisSet, ExpPower },
    continuation::Schedule,
    driver::OptResult,
    error::{ ConfigError, LengthError, OptError },
    newton,
    operator::{ Channel, Dipole },
    transform::{ Composite, TResult, VarTransform },
};

/// A complex number given either as a real number or as `[re, im]`.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CValue {
    Real(f64),
    Pair(f64, f64),
}

impl From<CValue> for C64 {
    fn from(val: CValue) -> Self {
        match val {
            CValue::Real(re) => C64::new(re, 0.0),
            CValue::Pair(re, im) => C64::new(re, im),
        }
    }
}

/// A basis entry as written in a configuration file.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntrySpec {
    pub cmd: String,
    pub opt: bool,
    pub n: i32,
    #[serde(default)]
    pub z: Option<CValue>,
    #[serde(default)]
    pub num: Option<usize>,
    #[serde(default)]
    pub ratio: Option<CValue>,
    #[serde(default)]
    pub a0: Option<Vec<CValue>>,
    #[serde(default)]
    pub y0: Option<CValue>,
}

/// A validated basis entry.
#[derive(Clone, Debug, PartialEq)]
pub enum BasisEntry {
    Id { opt: bool, n: i32, z: C64 },
    Log { opt: bool, n: i32, z: C64 },
    Geo { opt: bool, n: i32, num: usize, z: C64, ratio: C64 },
    Shift { opt: bool, n: i32, a0: Vec<C64>, y0: C64 },
    Scale { opt: bool, n: i32, a0: Vec<C64>, y0: C64 },
}

fn require<T>(cmd: &str, param: &'static str, val: Option<T>)
    -> Result<T, ConfigError>
{
    val.ok_or_else(|| ConfigError::MissingParam { cmd: cmd.to_string(), param })
}

fn forbid<T>(cmd: &str, reason: &'static str, val: &Option<T>)
    -> Result<(), ConfigError>
{
    val.is_none().then_some(())
        .ok_or_else(|| ConfigError::BadParams { cmd: cmd.to_string(), reason })
}

impl TryFrom<EntrySpec> for BasisEntry {
    type Error = ConfigError;

    fn try_from(spec: EntrySpec) -> Result<Self, Self::Error> {
        let EntrySpec { cmd, opt, n, z, num, ratio, a0, y0 } = spec;
        let c = cmd.as_str();
        let entry = match c {
            "id" | "log" => {
                forbid(c, "unexpected parameter 'num'", &num)?;
                forbid(c, "unexpected parameter 'ratio'", &ratio)?;
                forbid(c, "unexpected parameter 'a0'", &a0)?;
                forbid(c, "unexpected parameter 'y0'", &y0)?;
                let z = require(c, "z", z)?.into();
                if c == "id" {
                    Self::Id { opt, n, z }
                } else {
                    Self::Log { opt, n, z }
                }
            },
            "geo" => {
                forbid(c, "unexpected parameter 'a0'", &a0)?;
                forbid(c, "unexpected parameter 'y0'", &y0)?;
                let num = require(c, "num", num)?;
                let z = require(c, "z", z)?.into();
                let ratio = require(c, "ratio", ratio)?.into();
                Self::Geo { opt, n, num, z, ratio }
            },
            "shift" | "scale" => {
                forbid(c, "unexpected parameter 'z'", &z)?;
                forbid(c, "unexpected parameter 'num'", &num)?;
                forbid(c, "unexpected parameter 'ratio'", &ratio)?;
                let a0: Vec<C64>
                    = require(c, "a0", a0)?.into_iter().map(C64::from).collect();
                let y0 = require(c, "y0", y0)?.into();
                if c == "shift" {
                    Self::Shift { opt, n, a0, y0 }
                } else {
                    Self::Scale { opt, n, a0, y0 }
                }
            },
            _ => { return Err(ConfigError::UnknownCommand(c.to_string())); },
        };
        entry.validate()?;
        Ok(entry)
    }
}

impl BasisEntry {
    /// Name of the entry's command.
    pub fn cmd(&self) -> &'static str {
        match self {
            Self::Id { .. } => "id",
            Self::Log { .. } => "log",
            Self::Geo { .. } => "geo",
            Self::Shift { .. } => "shift",
            Self::Scale { .. } => "scale",
        }
    }

    /// Return `true` if the entry's exponents are optimized.
    pub fn is_opt(&self) -> bool {
        match self {
            Self::Id { opt, .. }
            | Self::Log { opt, .. }
            | Self::Geo { opt, .. }
            | Self::Shift { opt, .. }
            | Self::Scale { opt, .. }
            => *opt,
        }
    }

    /// Power index shared by all of the entry's functions.
    pub fn n(&self) -> i32 {
        match self {
            Self::Id { n, .. }
            | Self::Log { n, .. }
            | Self::Geo { n, .. }
            | Self::Shift { n, .. }
            | Self::Scale { n, .. }
            => *n,
        }
    }

    /// Check parameter values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let bad = |reason: &'static str| {
            Err(ConfigError::BadParams { cmd: self.cmd().to_string(), reason })
        };
        match self {
            Self::Log { z, .. } if z.is_zero() => bad("exponent must be non-zero"),
            Self::Geo { num, .. } if *num < 3 => Err(ConfigError::GeoTooShort(*num)),
            Self::Geo { z, ratio, .. } if z.is_zero() || ratio.is_zero()
                => bad("leading exponent and ratio must be non-zero"),
            Self::Shift { a0, .. } | Self::Scale { a0, .. } if a0.is_empty()
                => bad("'a0' must not be empty"),
            _ => Ok(()),
        }
    }

    /// Transform from the entry's variables to its raw exponents.
    pub fn transform(&self) -> TResult<VarTransform> {
        match self {
            Self::Id { .. } => Ok(VarTransform::Identity),
            Self::Log { .. } => Ok(VarTransform::Log),
            Self::Geo { num, .. } => VarTransform::geometric(*num),
            Self::Shift { a0, .. } => VarTransform::shift(a0.iter().copied().collect()),
            Self::Scale { a0, .. } => VarTransform::scale(a0.iter().copied().collect()),
        }
    }

    /// Initial values of the entry's variables.
    pub fn y0(&self) -> nd::Array1<C64> {
        match self {
            Self::Id { z, .. } => nd::array![*z],
            Self::Log { z, .. } => nd::array![z.ln()],
            Self::Geo { z, ratio, .. } => nd::array![*z, *ratio],
            Self::Shift { y0, .. } | Self::Scale { y0, .. } => nd::array![*y0],
        }
    }

    /// Initial raw exponents.
    pub fn exponents(&self) -> TResult<nd::Array1<C64>> {
        self.transform()?.xis(&self.y0())
    }
}

/// Everything needed to optimize a basis built from a list of entries.
#[derive(Clone, Debug, PartialEq)]
pub struct BasisSetup {
    /// Initial basis set, normalized.
    pub base: BasisSet,
    /// Which functions of `base` are optimized.
    pub mask: Vec<bool>,
    /// Map from reduced variables to the optimized exponents, in basis order.
    pub transform: VarTransform,
    /// Initial reduced variables.
    pub y0: nd::Array1<C64>,
}

impl BasisSetup {
    /// Build the basis, mask, and transform for a list of entries.
    pub fn build(power: ExpPower, entries: &[BasisEntry]) -> OptResult<Self> {
        let mut base = BasisSet::new(power);
        let mut mask: Vec<bool> = Vec::new();
        let mut blocks: Vec<(Vec<usize>, VarTransform)> = Vec::new();
        let mut y0: Vec<C64> = Vec::new();
        let mut nx: usize = 0;
        for entry in entries.iter() {
            entry.validate()?;
            let zs = entry.exponents()?;
            for &z in zs.iter() {
                base.add(entry.n(), z);
                mask.push(entry.is_opt());
            }
            if entry.is_opt() {
                blocks.push(((nx..nx + zs.len()).collect(), entry.transform()?));
                y0.extend(entry.y0().iter().copied());
                nx += zs.len();
            }
        }
        base.setup()?;
        let transform = VarTransform::Composite(Composite::new(blocks)?);
        debug!(size = base.size(), nx = transform.nx(), ny = transform.ny(), "built basis");
        Ok(Self { base, mask, transform, y0: y0.into() })
    }

    /// Number of optimized functions.
    pub fn num_opt(&self) -> usize { self.mask.iter().filter(|opt| **opt).count() }
}

fn default_target() -> String { "h_pi".to_string() }

/// Configuration of a complete optimization run.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// `STO` or `GTO`.
    pub basis_type: String,
    pub basis: Vec<EntrySpec>,
    /// Start frequency.
    pub w0: f64,
    /// Target frequencies; `[w0]` if absent.
    #[serde(default)]
    pub ws: Option<Vec<f64>>,
    #[serde(default = "default_target")]
    pub target: String,
    pub channel: String,
    pub dipole: String,
    #[serde(default)]
    pub newton: newton::Config,
}

impl RunConfig {
    /// Parse from a TOML string.
    pub fn from_toml_str(s: &str) -> OptResult<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Read and parse a TOML file.
    pub fn from_file<P>(path: P) -> OptResult<Self>
    where P: AsRef<Path>
    {
        let path = path.as_ref();
        let s = fs::read_to_string(path)
            .map_err(|source| OptError::Io { path: path.display().to_string(), source })?;
        Self::from_toml_str(&s)
    }

    pub fn exp_power(&self) -> Result<ExpPower, ConfigError> {
        ExpPower::from_name(&self.basis_type)
    }

    pub fn entries(&self) -> Result<Vec<BasisEntry>, ConfigError> {
        self.basis.iter().cloned().map(BasisEntry::try_from).collect()
    }

    pub fn channel(&self) -> Result<Channel, ConfigError> { self.channel.parse() }

    pub fn dipole(&self) -> Result<Dipole, ConfigError> { self.dipole.parse() }

    /// Fail unless the target is hydrogen photoionization.
    pub fn check_target(&self) -> Result<(), ConfigError> {
        (self.target == "h_pi").then_some(())
            .ok_or_else(|| ConfigError::UnknownTarget(self.target.clone()))
    }

    pub fn schedule(&self) -> Schedule {
        Schedule::new(self.w0, self.ws.clone().unwrap_or_else(|| vec![self.w0]))
    }

    /// Build the basis setup described by the entry list.
    pub fn basis_setup(&self) -> OptResult<BasisSetup> {
        BasisSetup::build(self.exp_power()?, &self.entries()?)
    }
}

// checks that the transform's raw dimension matches the optimized functions
pub(crate) fn check_setup(setup: &BasisSetup) -> Result<(), LengthError> {
    LengthError::check_len(setup.transform.nx(), setup.num_opt())?;
    LengthError::check_len(setup.transform.ny(), setup.y0.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use crate::error::TransformError;

    fn c(re: f64, im: f64) -> C64 { C64::new(re, im) }

    const EXAMPLE: &str = r#"
        basis_type = "GTO"
        w0 = 1.0
        ws = [0.5, 1.0, 1.5]
        channel = "1s->kp"
        dipole = "length"

        [[basis]]
        cmd = "id"
        opt = true
        n = 2
        z = [0.004, -0.02]

        [[basis]]
        cmd = "geo"
        opt = false
        n = 2
        num = 15
        z = 0.01
        ratio = 1.771600539669121

        [newton]
        tol = 1e-6
    "#;

    #[test]
    fn parse_example() {
        let config = RunConfig::from_toml_str(EXAMPLE).unwrap();
        assert_eq!(config.exp_power().unwrap(), ExpPower::Gauss);
        assert_eq!(config.target, "h_pi");
        assert_eq!(config.newton.tol, 1e-6);
        assert_eq!(config.newton.maxit, crate::DEF_MAXITERS);
        assert_eq!(config.schedule().ws, vec![0.5, 1.0, 1.5]);
        let entries = config.entries().unwrap();
        assert_eq!(
            entries[0],
            BasisEntry::Id { opt: true, n: 2, z: c(0.004, -0.02) },
        );
        let setup = config.basis_setup().unwrap();
        assert_eq!(setup.base.size(), 16);
        assert_eq!(setup.num_opt(), 1);
        assert_eq!(setup.transform.nx(), 1);
        assert_eq!(setup.y0, nd::array![c(0.004, -0.02)]);
        assert_abs_diff_eq!(
            (setup.base.basis(15).z(0) - 0.01 * 1.771600539669121_f64.powi(14)).norm(),
            0.0,
            epsilon = 1e-10,
        );
        check_setup(&setup).unwrap();
    }

    #[test]
    fn default_schedule_is_w0() {
        let config = RunConfig::from_toml_str(r#"
            basis_type = "STO"
            w0 = 0.7
            channel = "2p->kd"
            dipole = "velocity"
            basis = []
        "#).unwrap();
        assert_eq!(config.schedule(), Schedule::new(0.7, vec![0.7]));
        assert_eq!(config.channel().unwrap(), Channel::P2KD);
        assert_eq!(config.dipole().unwrap(), Dipole::Velocity);
        assert_eq!(config.newton, newton::Config::default());
    }

    fn spec(cmd: &str) -> EntrySpec {
        EntrySpec {
            cmd: cmd.to_string(),
            opt: true,
            n: 2,
            z: None,
            num: None,
            ratio: None,
            a0: None,
            y0: None,
        }
    }

    #[test]
    fn entry_errors() {
        assert!(matches!(
            BasisEntry::try_from(spec("lin")),
            Err(ConfigError::UnknownCommand(cmd)) if cmd == "lin"
        ));
        assert!(matches!(
            BasisEntry::try_from(spec("id")),
            Err(ConfigError::MissingParam { param: "z", .. })
        ));
        let shift = EntrySpec { a0: Some(vec![CValue::Real(1.0)]), ..spec("shift") };
        assert!(matches!(
            BasisEntry::try_from(shift),
            Err(ConfigError::MissingParam { param: "y0", .. })
        ));
        let scale = EntrySpec { a0: Some(vec![]), y0: Some(CValue::Real(1.0)), ..spec("scale") };
        assert!(matches!(BasisEntry::try_from(scale), Err(ConfigError::BadParams { .. })));
        let geo = EntrySpec {
            num: Some(2),
            z: Some(CValue::Real(0.1)),
            ratio: Some(CValue::Real(2.0)),
            ..spec("geo")
        };
        assert!(matches!(BasisEntry::try_from(geo), Err(ConfigError::GeoTooShort(2))));
        let extra = EntrySpec { z: Some(CValue::Real(1.0)), num: Some(4), ..spec("log") };
        assert!(matches!(BasisEntry::try_from(extra), Err(ConfigError::BadParams { .. })));
    }

    #[test]
    fn unknown_command_in_toml() {
        let config = RunConfig::from_toml_str(r#"
            basis_type = "STO"
            w0 = 1.0
            channel = "1s->kp"
            dipole = "length"
            [[basis]]
            cmd = "linear"
            opt = true
            n = 2
            z = 1.0
        "#).unwrap();
        assert!(matches!(config.entries(), Err(ConfigError::UnknownCommand(_))));
        assert!(matches!(config.basis_setup(), Err(OptError::Config(ConfigError::UnknownCommand(_)))));
    }

    #[test]
    fn mixed_entries_build_a_composite() {
        let entries = vec![
            BasisEntry::Shift { opt: true, n: 2, a0: vec![c(0.0, 0.0), c(0.5, 0.0)], y0: c(0.3, -0.2) },
            BasisEntry::Id { opt: false, n: 3, z: c(1.0, -0.1) },
            BasisEntry::Log { opt: true, n: 2, z: c(0.8, -0.4) },
            BasisEntry::Geo { opt: true, n: 2, num: 3, z: c(0.1, 0.0), ratio: c(2.0, 0.0) },
            BasisEntry::Scale { opt: false, n: 1, a0: vec![c(1.0, 0.0), c(3.0, 0.0)], y0: c(0.4, 0.0) },
        ];
        let setup = BasisSetup::build(ExpPower::Slater, &entries).unwrap();
        assert_eq!(setup.base.size(), 2 + 1 + 1 + 3 + 2);
        assert_eq!(
            setup.mask,
            vec![true, true, false, true, true, true, true, false, false],
        );
        assert_eq!(setup.transform.nx(), 6);
        assert_eq!(setup.transform.ny(), 4);
        check_setup(&setup).unwrap();
        let xs = setup.transform.xis(&setup.y0).unwrap();
        assert_abs_diff_eq!((xs[1] - c(0.8, -0.2)).norm(), 0.0, epsilon = 1e-14);
        assert_abs_diff_eq!((xs[2] - c(0.8, -0.4)).norm(), 0.0, epsilon = 1e-14);
        assert_abs_diff_eq!((xs[5] - c(0.4, 0.0)).norm(), 0.0, epsilon = 1e-14);
        assert_abs_diff_eq!((setup.base.basis(8).z(0) - c(1.2, 0.0)).norm(), 0.0, epsilon = 1e-14);
    }

    #[test]
    fn degenerate_geometric_entry() {
        let entry = BasisEntry::Geo { opt: true, n: 2, num: 4, z: c(0.1, 0.0), ratio: c(0.0, 0.0) };
        assert!(matches!(entry.validate(), Err(ConfigError::BadParams { .. })));
        assert!(matches!(
            VarTransform::geometric(4).unwrap().xis(&nd::array![c(0.1, 0.0), c(0.0, 0.0)]),
            Err(TransformError::ZeroRatio)
        ));
    }

    #[test]
    fn missing_file() {
        let res = RunConfig::from_file("/nonexistent/greenopt.toml");
        assert!(matches!(res, Err(OptError::Io { .. })));
    }
}
