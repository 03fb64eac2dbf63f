use crate::error::{MeshError, PotentialError, Result};
use crate::math::{Point3, UnitVector3, Vector3};
use crate::potential::{
    critical_potentials, rotating_critical_potential, Misalignment, RocheParams, RochePotential,
};

const BUDGET_HINT: &str = "retry with a larger delta or a larger max_triangles";

const MISALIGNED_HINT: &str = "the range of a misaligned binary is bounded by critical points \
     on the line of centres only; move the potential away from the bounds, or retry with a \
     larger delta or a larger max_triangles";

/// Component of a detached binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Component {
    /// The star at the origin.
    Primary,
    /// The star at `(d, 0, 0)`.
    Secondary,
}

/// Which part of a contact envelope to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EnvelopePart {
    /// The full closed envelope.
    Whole,
    /// Triangles on the primary's side of the neck plane.
    PrimaryHalf,
    /// Triangles on the secondary's side of the neck plane.
    SecondaryHalf,
}

/// A meshable body, carrying only the parameters its surface depends on.
///
/// Detached lobes, contact envelopes and isolated rotating stars are the
/// kinds of body whose surfaces can be meshed.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Body {
    /// One closed lobe of a detached binary.
    DetachedStar {
        roche: RocheParams,
        component: Component,
    },
    /// A common envelope surrounding both stars of a contact binary.
    ContactEnvelopeHalf {
        roche: RocheParams,
        part: EnvelopePart,
    },
    /// An isolated star rotating rigidly with angular velocity `omega`.
    RotatingStar { omega: f64, spin: UnitVector3 },
}

/// Flat selector used by [`crate::generate_mesh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Choice {
    /// Lobe around the primary.
    PrimaryLobe,
    /// Lobe around the secondary.
    SecondaryLobe,
    /// Full contact envelope.
    Envelope,
    /// Primary half of the contact envelope.
    PrimaryHalf,
    /// Secondary half of the contact envelope.
    SecondaryHalf,
}

/// Range of potentials for which a body's level set is a closed surface.
///
/// The surface exists for `min < Ω₀ < max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PotentialRange {
    /// Exclusive lower bound.
    pub min: f64,
    /// Exclusive upper bound.
    pub max: f64,
}

impl PotentialRange {
    /// Returns `true` if `potential` lies strictly inside the range.
    #[must_use]
    pub fn contains(&self, potential: f64) -> bool {
        potential > self.min && potential < self.max
    }
}

/// Where marching starts: a centre inside the surface and a ray direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeedRay {
    /// A point strictly inside the surface.
    pub center: Point3,
    /// Direction of the ray cast from `center` to the surface.
    pub direction: Vector3,
    /// Upper bound on the distance to the surface.
    pub max_radius: f64,
}

impl Body {
    /// Builds a body from a flat selector.
    ///
    /// # Errors
    ///
    /// Returns an error if the binary parameters are invalid.
    pub fn from_choice(roche: RocheParams, choice: Choice) -> Result<Self> {
        roche.validate()?;
        Ok(match choice {
            Choice::PrimaryLobe => Self::DetachedStar {
                roche,
                component: Component::Primary,
            },
            Choice::SecondaryLobe => Self::DetachedStar {
                roche,
                component: Component::Secondary,
            },
            Choice::Envelope => Self::ContactEnvelopeHalf {
                roche,
                part: EnvelopePart::Whole,
            },
            Choice::PrimaryHalf => Self::ContactEnvelopeHalf {
                roche,
                part: EnvelopePart::PrimaryHalf,
            },
            Choice::SecondaryHalf => Self::ContactEnvelopeHalf {
                roche,
                part: EnvelopePart::SecondaryHalf,
            },
        })
    }

    /// A non-rotating or rotating single star spinning about `+z`.
    #[must_use]
    pub fn rotating(omega: f64) -> Self {
        Self::RotatingStar {
            omega,
            spin: Vector3::z_axis(),
        }
    }

    /// The potential whose level set bounds this body.
    #[must_use]
    pub fn potential(&self) -> RochePotential {
        match self {
            Self::DetachedStar { roche, .. } | Self::ContactEnvelopeHalf { roche, .. } => {
                RochePotential::binary(roche)
            }
            Self::RotatingStar { omega, spin } => RochePotential::rotating(*omega, *spin),
        }
    }

    /// Short name of the surface topology, used in error messages.
    #[must_use]
    pub fn topology(&self) -> &'static str {
        match self {
            Self::DetachedStar {
                component: Component::Primary,
                ..
            } => "a detached primary lobe",
            Self::DetachedStar {
                component: Component::Secondary,
                ..
            } => "a detached secondary lobe",
            Self::ContactEnvelopeHalf { .. } => "a contact envelope",
            Self::RotatingStar { .. } => "a rotating star",
        }
    }

    /// The open interval of potentials for which this body's surface is closed.
    ///
    /// A detached lobe must lie above both L1 and the outer point behind its
    /// own star (L3 for the primary, L2 for the secondary). For `F ≠ 1` the
    /// outer point can lie above L1, and for large `F` the secondary's lobe
    /// only closes far above it.
    ///
    /// With a misaligned spin the bounds are the extrema of the potential
    /// along the line of centres. The true saddles then sit off that line,
    /// so potentials close to a bound may still fail to close; marching
    /// reports such runs with [`Self::budget_hint`].
    ///
    /// # Errors
    ///
    /// Returns an error if the parameters are invalid or the critical
    /// potentials cannot be located.
    pub fn valid_range(&self) -> Result<PotentialRange> {
        match self {
            Self::DetachedStar { roche, component } => {
                let crit = critical_potentials(roche)?;
                let behind = match component {
                    Component::Primary => crit.l3,
                    Component::Secondary => crit.l2,
                };
                Ok(PotentialRange {
                    min: crit.l1.max(behind),
                    max: f64::INFINITY,
                })
            }
            Self::ContactEnvelopeHalf { roche, .. } => {
                let crit = critical_potentials(roche)?;
                Ok(PotentialRange {
                    min: crit.outer(),
                    max: crit.l1,
                })
            }
            Self::RotatingStar { omega, .. } => {
                if !omega.is_finite() {
                    return Err(PotentialError::InvalidParameter {
                        parameter: "omega",
                        value: *omega,
                    }
                    .into());
                }
                Ok(PotentialRange {
                    min: rotating_critical_potential(*omega),
                    max: f64::INFINITY,
                })
            }
        }
    }

    /// Advice attached to a marching run that exhausted its budget.
    #[must_use]
    pub fn budget_hint(&self) -> &'static str {
        match self {
            Self::DetachedStar { roche, .. } | Self::ContactEnvelopeHalf { roche, .. }
                if !roche.misalignment.is_aligned() =>
            {
                MISALIGNED_HINT
            }
            Self::DetachedStar { .. }
            | Self::ContactEnvelopeHalf { .. }
            | Self::RotatingStar { .. } => BUDGET_HINT,
        }
    }

    /// Rejects potentials outside [`Self::valid_range`].
    ///
    /// # Errors
    ///
    /// Returns `MeshError::InvalidPotential`; the value is never clamped.
    pub fn check_potential(&self, potential: f64) -> Result<PotentialRange> {
        let range = self.valid_range()?;
        if !potential.is_finite() || !range.contains(potential) {
            return Err(MeshError::InvalidPotential {
                potential,
                min: range.min,
                max: range.max,
                topology: self.topology(),
            }
            .into());
        }
        Ok(range)
    }

    /// Ray used to find the first surface point.
    ///
    /// Detached lobes and rotating stars are seeded at the pole above their
    /// centre. Envelopes are seeded on the far side of the primary, where the
    /// surface is smooth regardless of how thin the neck is.
    #[must_use]
    pub fn seed_ray(&self, potential: f64) -> SeedRay {
        match self {
            Self::DetachedStar { roche, component } => {
                let center = match component {
                    Component::Primary => Point3::origin(),
                    Component::Secondary => roche.secondary_center(),
                };
                SeedRay {
                    center,
                    direction: polar_direction(roche.misalignment, *component),
                    max_radius: roche.d,
                }
            }
            Self::ContactEnvelopeHalf { roche, .. } => SeedRay {
                center: Point3::origin(),
                direction: -Vector3::x(),
                max_radius: 2.0 * roche.d,
            },
            Self::RotatingStar { spin, .. } => SeedRay {
                center: Point3::origin(),
                direction: spin.into_inner(),
                // Along the spin axis the surface sits exactly at r = 1/Ω₀.
                max_radius: 2.0 / potential,
            },
        }
    }
}

/// The primary's pole follows its spin axis; the secondary is always aligned.
fn polar_direction(misalignment: Misalignment, component: Component) -> Vector3 {
    match component {
        Component::Primary => misalignment.spin_axis().into_inner(),
        Component::Secondary => Vector3::z(),
    }
}
