//! Operator providers: the matrix `L(w)` whose resolvent is taken, and the
//! driving vector it acts on.
//!
//! The bundled provider is hydrogen-atom photoionization from a bound state
//! `n0 l0` into the continuum `k l1`,
//! ```text
//! H    = −½ d²/dr² + l1(l1 + 1) / 2r² − 1/r
//! L(w) = (w + E0) S − H,    E0 = −1 / 2n0²
//! ```
//! with the dipole-driving term `r · P(r)` (length gauge) or the radial part of
//! `d/dr` acting on `P` (velocity gauge).

use std::{ fmt, str::FromStr };
use ndarray as nd;
use num_complex::Complex64 as C64;
use crate::{
    basis::{ self, BResult, BasisSet, ExpPower, LinComb },
    error::ConfigError,
};

/// Provider of the bilinear-form ingredients for one physical problem.
pub trait Operator {
    /// Matrix `⟨aᵢ| L(w) |bⱼ⟩`.
    fn operator_matrix(&self, w: f64, a: &BasisSet, b: &BasisSet)
        -> BResult<nd::Array2<C64>>;

    /// Driving vector `⟨aᵢ|R⟩`.
    fn ket_vector(&self, a: &BasisSet) -> BResult<nd::Array1<C64>>;

    /// Bra vector `⟨aᵢ|S⟩`; the same as the ket for symmetric problems.
    fn bra_vector(&self, a: &BasisSet) -> BResult<nd::Array1<C64>> {
        self.ket_vector(a)
    }

    /// Overlap matrix `⟨aᵢ|bⱼ⟩`.
    fn overlap_matrix(&self, a: &BasisSet, b: &BasisSet)
        -> BResult<nd::Array2<C64>>
    {
        basis::overlap_mat(a, b)
    }
}

/// Photoionization channel `n0 l0 → k l1`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Channel {
    S1KP,
    P2KS,
    P2KD,
    D3KP,
    D3KF,
}

impl Channel {
    /// Principal quantum number of the initial state.
    pub fn n0(self) -> i32 {
        match self {
            Self::S1KP => 1,
            Self::P2KS | Self::P2KD => 2,
            Self::D3KP | Self::D3KF => 3,
        }
    }

    /// Angular momentum of the initial state.
    pub fn l0(self) -> i32 { self.n0() - 1 }

    /// Angular momentum of the final state.
    pub fn l1(self) -> i32 {
        match self {
            Self::P2KS => 0,
            Self::S1KP | Self::D3KP => 1,
            Self::P2KD => 2,
            Self::D3KF => 3,
        }
    }

    /// Energy of the initial state.
    pub fn energy0(self) -> f64 {
        let n0 = f64::from(self.n0());
        -0.5 / (n0 * n0)
    }

    /// Radial function `P(r)` of the (nodeless) initial state.
    pub fn bound_state(self) -> LinComb {
        let c = |x: f64| C64::from(x);
        match self.n0() {
            1 => LinComb::prim(ExpPower::Slater, c(2.0), 1, c(1.0)),
            2 => LinComb::prim(
                ExpPower::Slater, c(1.0 / (2.0 * 6.0_f64.sqrt())), 2, c(0.5)),
            _ => LinComb::prim(
                ExpPower::Slater, c(4.0 / (81.0 * 30.0_f64.sqrt())), 3, c(1.0 / 3.0)),
        }
    }
}

impl FromStr for Channel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1s->kp" => Ok(Self::S1KP),
            "2p->ks" => Ok(Self::P2KS),
            "2p->kd" => Ok(Self::P2KD),
            "3d->kp" => Ok(Self::D3KP),
            "3d->kf" => Ok(Self::D3KF),
            _ => Err(ConfigError::UnknownChannel(s.to_string())),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::S1KP => "1s->kp",
            Self::P2KS => "2p->ks",
            Self::P2KD => "2p->kd",
            Self::D3KP => "3d->kp",
            Self::D3KF => "3d->kf",
        };
        write!(f, "{}", s)
    }
}

/// Gauge of the dipole operator.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Dipole {
    Length,
    Velocity,
}

impl FromStr for Dipole {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "length" => Ok(Self::Length),
            "velocity" => Ok(Self::Velocity),
            _ => Err(ConfigError::UnknownDipole(s.to_string())),
        }
    }
}

/// Hydrogen-atom photoionization.
#[derive(Clone, Debug, PartialEq)]
pub struct HPhotoionization {
    channel: Channel,
    driving: LinComb,
}

impl HPhotoionization {
    /// Use the dipole-driving term of the channel's bound state in the given
    /// gauge.
    pub fn new(channel: Channel, dipole: Dipole) -> BResult<Self> {
        let p = channel.bound_state();
        let driving = match dipole {
            Dipole::Length => p.mul_rm(1),
            Dipole::Velocity => {
                let l0 = f64::from(channel.l0());
                let dp = p.d_dr();
                let p_r = p.mul_rm(-1);
                if channel.l1() > channel.l0() {
                    // −(d/dr − (l0 + 1)/r) P
                    dp.scaled(C64::from(-1.0)).sum(&p_r.scaled(C64::from(l0 + 1.0)))?
                } else {
                    // (d/dr + l0/r) P
                    dp.sum(&p_r.scaled(C64::from(l0)))?
                }
            },
        };
        Ok(Self { channel, driving })
    }

    /// Use a caller-supplied driving term, of either power class.
    pub fn with_driving(channel: Channel, driving: LinComb) -> Self {
        Self { channel, driving }
    }

    pub fn channel(&self) -> Channel { self.channel }

    pub fn driving(&self) -> &LinComb { &self.driving }

    /// Matrix of the radial Hamiltonian.
    pub fn hamiltonian(&self, a: &BasisSet, b: &BasisSet)
        -> BResult<nd::Array2<C64>>
    {
        let l1 = f64::from(self.channel.l1());
        let d2 = basis::d2_mat(a, b)?;
        let coulomb = basis::rm_mat(a, -1, b)?;
        let mut h = d2 * C64::from(-0.5) - coulomb;
        if l1 > 0.0 {
            let centrifugal = basis::rm_mat(a, -2, b)?;
            h.scaled_add(C64::from(l1 * (l1 + 1.0) / 2.0), &centrifugal);
        }
        Ok(h)
    }
}

impl Operator for HPhotoionization {
    fn operator_matrix(&self, w: f64, a: &BasisSet, b: &BasisSet)
        -> BResult<nd::Array2<C64>>
    {
        let s = basis::overlap_mat(a, b)?;
        let h = self.hamiltonian(a, b)?;
        Ok(s * C64::from(w + self.channel.energy0()) - h)
    }

    fn ket_vector(&self, a: &BasisSet) -> BResult<nd::Array1<C64>> {
        basis::vector(a, &self.driving)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn c(re: f64, im: f64) -> C64 { C64::new(re, im) }

    fn sto(zs: &[C64]) -> BasisSet {
        let mut us = BasisSet::new(ExpPower::Slater);
        zs.iter().for_each(|&z| { us.add(2, z); });
        us.setup().unwrap();
        us
    }

    #[test]
    fn channel_names() {
        for name in ["1s->kp", "2p->ks", "2p->kd", "3d->kp", "3d->kf"] {
            let ch: Channel = name.parse().unwrap();
            assert_eq!(ch.to_string(), name);
            assert_eq!((ch.l1() - ch.l0()).abs(), 1);
        }
        assert!(matches!("1s->ks".parse::<Channel>(), Err(ConfigError::UnknownChannel(_))));
        assert!(matches!("mixed".parse::<Dipole>(), Err(ConfigError::UnknownDipole(_))));
        assert_eq!(Channel::P2KS.energy0(), -0.125);
    }

    #[test]
    fn bound_states_are_normalized() {
        for ch in [Channel::S1KP, Channel::P2KD, Channel::D3KF] {
            let mut us = BasisSet::new(ExpPower::Slater);
            us.add_unnormalized(ch.bound_state()).unwrap();
            us.setup().unwrap();
            let s = basis::overlap_mat(&us, &us).unwrap();
            // the conventional hydrogen radial functions carry a real, positive
            // normalization
            assert_abs_diff_eq!(s[[0, 0]].re, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn single_slater_closed_form() {
        // for u ∝ r² e^{-zr}: ⟨u|u''⟩ = −z²/3, ⟨u|1/r|u⟩ = z/2, ⟨u|1/r²|u⟩ = z²/3
        let z = c(0.9, -0.4);
        let us = sto(&[z]);
        let op = HPhotoionization::new(Channel::S1KP, Dipole::Length).unwrap();
        let w = 1.2;
        let l = op.operator_matrix(w, &us, &us).unwrap();
        let expected = w - 0.5 - (z * z / 6.0 + z * z / 3.0 - z / 2.0);
        assert_abs_diff_eq!((l[[0, 0]] - expected).norm(), 0.0, epsilon = 1e-12);

        // ⟨u| r · 2r e^{-r}⟩ with c² · 24/(2z)⁵ = 1
        let norm = (c(24.0, 0.0) / (2.0 * z).powi(5)).sqrt().inv();
        let expected = norm * 2.0 * 24.0 / (z + 1.0).powi(5);
        let s = op.ket_vector(&us).unwrap();
        assert_abs_diff_eq!((s[0] - expected).norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn operator_matrix_is_complex_symmetric() {
        let us = sto(&[c(0.5, -0.2), c(1.3, -0.4), c(2.1, 0.1)]);
        let op = HPhotoionization::new(Channel::P2KD, Dipole::Velocity).unwrap();
        let l = op.operator_matrix(0.7, &us, &us).unwrap();
        for ((i, j), lij) in l.indexed_iter() {
            assert_abs_diff_eq!((lij - l[[j, i]]).norm(), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn velocity_driving_term() {
        // −(d/dr − 1/r) 2r e^{-r} = 2r e^{-r}
        let op = HPhotoionization::new(Channel::S1KP, Dipole::Velocity).unwrap();
        assert_eq!(op.driving(), &LinComb::prim(ExpPower::Slater, c(2.0, 0.0), 1, c(1.0, 0.0)));
        // (d/dr + 1/r) r² e^{-r/2} ∝ (3r − r²/2) e^{-r/2}
        let op = HPhotoionization::new(Channel::P2KS, Dipole::Velocity).unwrap();
        let d = op.driving();
        assert_eq!(d.len(), 2);
        let r = c(1.7, 0.0);
        let norm = 1.0 / (2.0 * 6.0_f64.sqrt());
        let expected = norm * (3.0 * r - r * r / 2.0) * (-r / 2.0).exp();
        assert_abs_diff_eq!((d.at(r) - expected).norm(), 0.0, epsilon = 1e-12);
    }
}
