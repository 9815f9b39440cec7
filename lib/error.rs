//! Collection of all error types.
//!
//! All errors derive [`thiserror::Error`], making them composable when allowed
//! and compatible with application code using [`anyhow`][anyhow].
//!
//! Non-convergence of the Newton solver is *not* an error; it is reported
//! through [`Solution::success`][crate::newton::Solution::success].
//!
//! [anyhow]: https://crates.io/crates/anyhow

use ndarray as nd;
use num_complex::Complex64 as C64;
use thiserror::Error;

/// Returned when an operation requiring equal-length arrays encounters arrays
/// with unequal length.
#[derive(Debug, Error)]
#[error("encountered arrays with incompatible lengths; got {0} and {1}")]
pub struct LengthError(pub usize, pub usize);

impl LengthError {
    pub(crate) fn check<S, A, T, B>(
        a: &nd::ArrayBase<S, nd::Ix1>,
        b: &nd::ArrayBase<T, nd::Ix1>,
    ) -> Result<(), Self>
    where
        S: nd::Data<Elem = A>,
        T: nd::Data<Elem = B>,
    {
        Self::check_len(a.len(), b.len())
    }

    pub(crate) fn check_len(na: usize, nb: usize) -> Result<(), Self> {
        (na == nb).then_some(()).ok_or(Self(na, nb))
    }
}

/// Returned when a dense matrix cannot be inverted (or a linear system with it
/// cannot be solved).
#[derive(Debug, Error)]
#[error("encountered a singular {0}x{0} matrix")]
pub struct SingularError(pub usize);

/// Returned when a basis specification, transform layout, or run configuration
/// is malformed.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Unrecognized basis entry command tag.
    #[error("unknown basis command '{0}'; expected one of id, log, geo, shift, scale")]
    UnknownCommand(String),

    /// A basis entry is missing a parameter required by its command.
    #[error("basis command '{cmd}' requires parameter '{param}'")]
    MissingParam { cmd: String, param: &'static str },

    /// A basis entry carries parameters its command cannot use.
    #[error("basis command '{cmd}': {reason}")]
    BadParams { cmd: String, reason: &'static str },

    /// A geometric sequence must contain at least three exponents.
    #[error("geometric sequences require at least 3 exponents; got {0}")]
    GeoTooShort(usize),

    /// A composite transform uses some raw index more than once.
    #[error("composite transform: raw index {0} is claimed by more than one block")]
    Overlap(usize),

    /// A composite transform leaves a raw index uncovered (or refers to an
    /// index past the end of the raw vector).
    #[error("composite transform: raw indices do not partition 0..{nx}; bad index {index}")]
    Gap { nx: usize, index: usize },

    /// The index set of a composite block does not match its transform.
    #[error("composite block {block}: transform expects {expected} raw variables; got {got} indices")]
    ChildSize { block: usize, expected: usize, got: usize },

    /// Unrecognized basis type string.
    #[error("unknown basis type '{0}'; expected STO or GTO")]
    UnknownBasisType(String),

    /// Unrecognized photoionization channel.
    #[error("unknown channel '{0}'")]
    UnknownChannel(String),

    /// Unrecognized dipole gauge.
    #[error("unknown dipole gauge '{0}'; expected length or velocity")]
    UnknownDipole(String),

    /// Only hydrogen photoionization is available as a calculation target.
    #[error("unsupported target '{0}'; only 'h_pi' is available")]
    UnknownTarget(String),
}

/// Returned from basis-set construction and radial integral evaluation.
#[derive(Debug, Error)]
pub enum BasisError {
    /// Exponent power class must be 1 (Slater) or 2 (Gauss).
    #[error("exponent power class must be 1 or 2; got {0}")]
    BadPower(u8),

    /// Integrals between functions of different power classes are not
    /// available.
    #[error("cannot mix Slater- and Gaussian-type functions in one integral")]
    MixedPower,

    /// Radial integrals diverge for negative total powers of r.
    #[error("radial integral with negative power r^{0} diverges")]
    NegativePower(i32),

    /// A basis set was used before `setup` computed its coefficients.
    #[error("basis set coefficients are not set up")]
    NotSetup,

    /// An optimized function is not a normalized primitive.
    #[error("basis function {0} is not a normalized primitive and cannot be differentiated")]
    NotPrimitive(usize),

    /// Basis index out of range.
    #[error("basis index {index} out of range for basis of size {size}")]
    Index { index: usize, size: usize },

    /// [`LengthError`]
    #[error("array length error: {0}")]
    Length(#[from] LengthError),
}

/// Returned from variable transforms.
#[derive(Debug, Error)]
pub enum TransformError {
    /// A geometric sequence with ratio r = 0 has no inverse and singular
    /// derivatives.
    #[error("geometric transform: ratio must be non-zero")]
    ZeroRatio,

    /// A geometric sequence with leading exponent a = 0 carries no ratio.
    #[error("geometric transform: leading exponent must be non-zero")]
    ZeroScale,

    /// [`ConfigError`]
    #[error("transform configuration error: {0}")]
    Config(#[from] ConfigError),

    /// [`LengthError`]
    #[error("array length error: {0}")]
    Length(#[from] LengthError),
}

/// Returned from the sensitivity engine.
#[derive(Debug, Error)]
pub enum GreenError {
    /// [`BasisError`]
    #[error("basis error: {0}")]
    Basis(#[from] BasisError),

    /// [`SingularError`]
    #[error("operator matrix: {0}")]
    Singular(#[from] SingularError),

    /// [`LengthError`]
    #[error("array length error: {0}")]
    Length(#[from] LengthError),
}

/// Returned from the Newton solver and the continuation runner.
#[derive(Debug, Error)]
pub enum NewtonError {
    /// Returned when a non-positive tolerance is encountered.
    #[error("tolerance must be greater than 0; got {0}")]
    BadEpsilon(f64),

    /// Returned when a zero iteration limit is encountered.
    #[error("maxit must be greater than 0; got {0}")]
    BadMaxiters(usize),

    /// Returned when a non-positive finite-difference step is encountered.
    #[error("finite-difference step must be greater than 0; got {0}")]
    BadStep(f64),

    /// Numerical derivatives were requested without a step size.
    #[error("numerical derivatives require a finite-difference step")]
    MissingStep,

    /// Numerical gradient with analytic Hessian is not a supported mode.
    #[error("numeric gradient with analytic Hessian is not supported")]
    UnsupportedMode,

    /// The objective returned a value or gradient that is NaN or infinite.
    #[error("non-finite value or gradient at iteration {0}")]
    NonFinite(usize),

    /// [`SingularError`] (the Hessian could not be inverted).
    #[error("hessian: {0}")]
    Singular(#[from] SingularError),

    /// [`LengthError`]
    #[error("array length error: {0}")]
    Length(#[from] LengthError),

    /// [`GreenError`]
    #[error("evaluation error: {0}")]
    Green(#[from] GreenError),

    /// [`TransformError`]
    #[error("transform error: {0}")]
    Transform(#[from] TransformError),
}

impl NewtonError {
    pub(crate) fn check_epsilon(epsilon: f64) -> Result<(), Self> {
        (epsilon > 0.0).then_some(()).ok_or(Self::BadEpsilon(epsilon))
    }

    pub(crate) fn check_maxiters(maxiters: usize) -> Result<(), Self> {
        (maxiters != 0).then_some(()).ok_or(Self::BadMaxiters(maxiters))
    }

    pub(crate) fn check_step(step: f64) -> Result<(), Self> {
        (step > 0.0).then_some(()).ok_or(Self::BadStep(step))
    }

    pub(crate) fn check_finite<'a, I>(nit: usize, vals: I) -> Result<(), Self>
    where I: IntoIterator<Item = &'a C64>
    {
        vals.into_iter()
            .all(|v| v.re.is_finite() && v.im.is_finite())
            .then_some(())
            .ok_or(Self::NonFinite(nit))
    }
}

impl From<BasisError> for NewtonError {
    fn from(err: BasisError) -> Self { Self::Green(err.into()) }
}

/// Top-level error for building and running a complete calculation.
#[derive(Debug, Error)]
pub enum OptError {
    /// [`ConfigError`]
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// [`BasisError`]
    #[error("basis error: {0}")]
    Basis(#[from] BasisError),

    /// [`TransformError`]
    #[error("transform error: {0}")]
    Transform(#[from] TransformError),

    /// [`GreenError`]
    #[error("sensitivity error: {0}")]
    Green(#[from] GreenError),

    /// [`NewtonError`]
    #[error("solver error: {0}")]
    Newton(#[from] NewtonError),

    /// [`LengthError`]
    #[error("array length error: {0}")]
    Length(#[from] LengthError),

    /// Failed to read a configuration file.
    #[error("I/O error on '{path}': {source}")]
    Io { path: String, source: std::io::Error },

    /// Failed to parse a configuration file.
    #[error("could not parse configuration: {0}")]
    Toml(#[from] toml::de::Error),
}
