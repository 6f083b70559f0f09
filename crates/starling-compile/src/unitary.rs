//! Single-qubit unitaries, for checking PRX decompositions.
//!
//! Native translation rewrites every single-qubit gate as a short PRX
//! sequence. [`Unitary2x2::of`] gives the matrix of the gate being replaced
//! and [`Unitary2x2::product`] the matrix of the sequence; the two must agree
//! up to a global phase. Single-qubit optimization uses the same algebra to
//! merge runs of gates.

use std::ops::Mul;

use num_complex::Complex64;
use starling_ir::{Gate, Instruction, StandardGate};

const EPSILON: f64 = 1e-10;

/// A 2x2 matrix in row-major order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Unitary2x2(pub [Complex64; 4]);

fn re(x: f64) -> Complex64 {
    Complex64::new(x, 0.0)
}

fn im(x: f64) -> Complex64 {
    Complex64::new(0.0, x)
}

impl Unitary2x2 {
    /// The identity.
    pub fn identity() -> Self {
        Self([re(1.0), re(0.0), re(0.0), re(1.0)])
    }

    /// RZ(θ).
    pub fn rz(theta: f64) -> Self {
        Self([
            Complex64::from_polar(1.0, -theta / 2.0),
            re(0.0),
            re(0.0),
            Complex64::from_polar(1.0, theta / 2.0),
        ])
    }

    /// PRX(θ, φ) = RZ(φ) · RX(θ) · RZ(-φ), the native rotation.
    pub fn prx(theta: f64, phi: f64) -> Self {
        let (s, c) = (theta / 2.0).sin_cos();
        let rx = Self([re(c), im(-s), im(-s), re(c)]);
        Self::rz(phi) * rx * Self::rz(-phi)
    }

    /// Matrix of a single-qubit standard gate with bound parameters.
    ///
    /// Returns `None` for multi-qubit gates and unbound parameters.
    pub fn of(gate: &StandardGate) -> Option<Self> {
        use std::f64::consts::{FRAC_1_SQRT_2, FRAC_PI_2, PI};
        Some(match gate {
            StandardGate::I => Self::identity(),
            StandardGate::X => Self::prx(PI, 0.0) * Self::global(FRAC_PI_2),
            StandardGate::Y => Self::prx(PI, FRAC_PI_2) * Self::global(FRAC_PI_2),
            StandardGate::Z => Self([re(1.0), re(0.0), re(0.0), re(-1.0)]),
            StandardGate::H => {
                let s = FRAC_1_SQRT_2;
                Self([re(s), re(s), re(s), re(-s)])
            }
            StandardGate::SX => Self([
                Complex64::new(0.5, 0.5),
                Complex64::new(0.5, -0.5),
                Complex64::new(0.5, -0.5),
                Complex64::new(0.5, 0.5),
            ]),
            StandardGate::Rx(theta) => Self::prx(theta.as_f64()?, 0.0),
            StandardGate::Ry(theta) => Self::prx(theta.as_f64()?, FRAC_PI_2),
            StandardGate::Rz(theta) => Self::rz(theta.as_f64()?),
            StandardGate::R(theta, phi) => Self::prx(theta.as_f64()?, phi.as_f64()?),
            _ => return None,
        })
    }

    /// Product of a single-qubit instruction sequence, applied in order.
    ///
    /// Returns `None` if any instruction is not a bound single-qubit gate.
    pub fn product<'a>(instructions: impl IntoIterator<Item = &'a Instruction>) -> Option<Self> {
        instructions.into_iter().try_fold(Self::identity(), |acc, inst| {
            let gate = inst.as_gate().and_then(Gate::as_standard)?;
            Some(Self::of(gate)? * acc)
        })
    }

    /// Euler angles `(α, β, γ)` with `self = RZ(α) · RY(β) · RZ(γ)` up to a
    /// global phase, `β` in `[0, π]`.
    pub fn zyz_angles(&self) -> (f64, f64, f64) {
        let [a, b, c, d] = self.0;
        let unphase = Complex64::from_polar(1.0, -(a * d - b * c).arg() / 2.0);
        let (a, c, d) = (a * unphase, c * unphase, d * unphase);
        let beta = 2.0 * c.norm().atan2(a.norm());
        let sum = if a.norm() < EPSILON { 0.0 } else { 2.0 * d.arg() };
        let diff = if c.norm() < EPSILON { 0.0 } else { 2.0 * c.arg() };
        ((sum + diff) / 2.0, beta, (sum - diff) / 2.0)
    }

    fn global(phase: f64) -> Self {
        let p = Complex64::from_polar(1.0, phase);
        Self([p, re(0.0), re(0.0), p])
    }

    fn dagger(&self) -> Self {
        let [a, b, c, d] = self.0;
        Self([a.conj(), c.conj(), b.conj(), d.conj()])
    }

    /// True if `self` and `other` differ only by a global phase.
    pub fn equals_up_to_phase(&self, other: &Self) -> bool {
        let [a, b, c, d] = (self.dagger() * *other).0;
        b.norm() < EPSILON
            && c.norm() < EPSILON
            && (a - d).norm() < EPSILON
            && (a.norm() - 1.0).abs() < EPSILON
    }
}

impl Mul for Unitary2x2 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        let [a, b, c, d] = self.0;
        let [e, f, g, h] = rhs.0;
        Self([a * e + b * g, a * f + b * h, c * e + d * g, c * f + d * h])
    }
}
