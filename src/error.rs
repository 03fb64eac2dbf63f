use thiserror::Error;

/// Top-level error type for the Roche meshing core.
#[derive(Debug, Error)]
pub enum RocheError {
    #[error(transparent)]
    Potential(#[from] PotentialError),

    #[error(transparent)]
    Mesh(#[from] MeshError),

    #[error(transparent)]
    Visibility(#[from] VisibilityError),

    #[error(transparent)]
    Irradiation(#[from] IrradiationError),
}

/// Errors raised while evaluating the potential or locating its critical points.
#[derive(Debug, Error)]
pub enum PotentialError {
    #[error("parameter {parameter} = {value} is invalid")]
    InvalidParameter { parameter: &'static str, value: f64 },

    #[error("critical point {point} not found: {reason}")]
    CriticalPointNotFound {
        point: &'static str,
        reason: String,
    },

    #[error("potential is singular at a point mass")]
    Singular,
}

/// Errors raised by the marching mesh generator and its post-processing.
#[derive(Debug, Error)]
pub enum MeshError {
    #[error(
        "potential {potential} is invalid for {topology}; valid range is ({min}, {max})"
    )]
    InvalidPotential {
        potential: f64,
        min: f64,
        max: f64,
        topology: &'static str,
    },

    #[error("marching exceeded {limit} triangles; {hint}")]
    MaxTrianglesExceeded { limit: usize, hint: &'static str },

    #[error("degenerate topology: {0}")]
    DegenerateTopology(String),

    #[error("could not project point onto the level set")]
    ProjectionFailed,

    #[error("invalid mesh parameters: {0}")]
    InvalidParameters(String),
}

/// Errors raised by the eclipse and visibility engine.
#[derive(Debug, Error)]
pub enum VisibilityError {
    #[error("observer direction must be a finite non-zero vector")]
    InvalidDirection,

    #[error("body {0} has no triangles")]
    EmptyBody(usize),
}

/// Errors raised by the irradiation solver.
#[derive(Debug, Error)]
pub enum IrradiationError {
    #[error("body {body}: expected {expected} values for {field}, got {actual}")]
    ShapeMismatch {
        body: usize,
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("invalid irradiation parameters: {0}")]
    InvalidParameters(String),
}

/// The irradiation solver stopped at its iteration cap.
///
/// Returned beside the best-effort solution, never as an `Err`.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("irradiation did not converge after {iterations} iterations (change {change:e})")]
pub struct NonConvergence {
    /// Iterations performed.
    pub iterations: usize,
    /// Largest change of the reflected flux in the last iteration.
    pub change: f64,
}

/// Convenience type alias for results using [`RocheError`].
pub type Result<T> = std::result::Result<T, RocheError>;
