use rayon::prelude::*;
use tracing::{debug, debug_span, warn};

use crate::error::{IrradiationError, NonConvergence, Result};
use crate::mesh::Mesh;
use crate::visibility::ExchangeGraph;

/// Stefan-Boltzmann constant in W m⁻² K⁻⁴.
pub const STEFAN_BOLTZMANN: f64 = 5.670_374_419e-8;

/// Bolometric blackbody flux `σ T⁴`.
#[must_use]
pub fn blackbody_flux(teff: f64) -> f64 {
    STEFAN_BOLTZMANN * teff.powi(4)
}

/// Iteration controls for [`solve_irradiation`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IrradiationParams {
    /// Converged when no reprocessed flux changes by more than this
    /// fraction of the largest intrinsic flux.
    pub tolerance: f64,
    /// Iteration cap.
    pub max_iterations: usize,
}

impl Default for IrradiationParams {
    fn default() -> Self {
        Self {
            tolerance: 1e-8,
            max_iterations: 100,
        }
    }
}

impl IrradiationParams {
    /// Sets the relative convergence tolerance.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Sets the iteration cap.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

/// Radiative inputs of one body.
#[derive(Debug, Clone, PartialEq)]
pub struct IrradiatedBody {
    /// Intrinsic emergent flux of each triangle.
    pub emitted: Vec<f64>,
    /// Fraction of incident flux each triangle reprocesses, in `[0, 1]`.
    pub reflection: Vec<f64>,
}

impl IrradiatedBody {
    /// A body with the same flux and reflection coefficient everywhere.
    #[must_use]
    pub fn uniform(mesh: &Mesh, emitted: f64, reflection: f64) -> Self {
        let n = mesh.triangle_count();
        Self {
            emitted: vec![emitted; n],
            reflection: vec![reflection; n],
        }
    }

    /// A blackbody at a uniform effective temperature.
    #[must_use]
    pub fn blackbody(mesh: &Mesh, teff: f64, reflection: f64) -> Self {
        Self::uniform(mesh, blackbody_flux(teff), reflection)
    }
}

/// Converged irradiation of one body.
#[derive(Debug, Clone, PartialEq)]
pub struct IrradiationState {
    /// Flux received by each triangle from the other bodies.
    pub incident: Vec<f64>,
    /// Reprocessed flux added to each triangle's emergent flux.
    pub additional_flux: Vec<f64>,
}

impl IrradiationState {
    /// Effective temperature of each triangle after heating, from its
    /// unheated temperature.
    #[must_use]
    pub fn heated_teff(&self, teff: &[f64]) -> Vec<f64> {
        teff.iter()
            .zip(&self.additional_flux)
            .map(|(t, extra)| (t.powi(4) + extra / STEFAN_BOLTZMANN).powf(0.25))
            .collect()
    }

    /// Sum of the additional flux weighted by triangle area.
    #[must_use]
    pub fn reprocessed_luminosity(&self, areas: &[f64]) -> f64 {
        self.additional_flux
            .iter()
            .zip(areas)
            .map(|(f, a)| f * a)
            .sum()
    }
}

/// Result of [`solve_irradiation`].
#[derive(Debug, Clone, PartialEq)]
pub struct IrradiationSolution {
    /// One state per body.
    pub states: Vec<IrradiationState>,
    /// Iterations performed.
    pub iterations: usize,
    /// Set when the cap was reached before convergence.
    pub warning: Option<NonConvergence>,
}

impl IrradiationSolution {
    /// Returns `true` if the tolerance was met.
    #[must_use]
    pub fn converged(&self) -> bool {
        self.warning.is_none()
    }
}

fn check_inputs(
    bodies: &[IrradiatedBody],
    graph: &ExchangeGraph,
    params: &IrradiationParams,
) -> Result<()> {
    if bodies.len() != graph.body_count() {
        return Err(IrradiationError::InvalidParameters(format!(
            "{} bodies given for an exchange graph of {}",
            bodies.len(),
            graph.body_count()
        ))
        .into());
    }
    if params.tolerance.is_nan() || params.tolerance < 0.0 || params.max_iterations == 0 {
        return Err(IrradiationError::InvalidParameters(format!(
            "tolerance {} and max_iterations {} must be non-negative and positive",
            params.tolerance, params.max_iterations
        ))
        .into());
    }
    for (b, body) in bodies.iter().enumerate() {
        let expected = graph.triangle_count(b);
        let lengths = [
            ("emitted", body.emitted.len()),
            ("reflection", body.reflection.len()),
        ];
        for (field, len) in lengths {
            if len != expected {
                return Err(IrradiationError::ShapeMismatch {
                    body: b,
                    field,
                    expected,
                    actual: len,
                }
                .into());
            }
        }
        if let Some(rho) = body.reflection.iter().find(|r| !(0.0..=1.0).contains(*r)) {
            return Err(IrradiationError::InvalidParameters(format!(
                "reflection coefficient {rho} of body {b} is outside [0, 1]"
            ))
            .into());
        }
    }
    Ok(())
}

/// Iterates the reflected flux between bodies to a fixed point.
///
/// Each triangle emits its intrinsic flux `M` plus a reprocessed part
/// `R = ρ I` of the flux `I` it receives from triangles of other bodies.
/// With form factors `F` from an [`ExchangeGraph`], the fixed point
/// `R = ρ ∘ F (M + R)` is found by Jacobi iteration starting from `R = 0`.
/// Each sweep evaluates the form factors afresh, in parallel over receivers.
///
/// Stops once no reprocessed flux changes by more than
/// `params.tolerance` times the largest intrinsic flux, or after
/// `params.max_iterations`; the latter is reported in
/// [`IrradiationSolution::warning`] alongside the last iterate. With all
/// reflection coefficients zero the solution is zero after one iteration.
///
/// # Errors
///
/// Returns `IrradiationError::ShapeMismatch` when per-triangle inputs do not
/// match the graph, or `IrradiationError::InvalidParameters` for invalid
/// coefficients or controls.
pub fn solve_irradiation(
    bodies: &[IrradiatedBody],
    graph: &ExchangeGraph,
    params: &IrradiationParams,
) -> Result<IrradiationSolution> {
    check_inputs(bodies, graph, params)?;
    let _span = debug_span!("solve_irradiation", bodies = bodies.len()).entered();

    let scale = bodies
        .iter()
        .flat_map(|b| b.emitted.iter())
        .fold(0.0_f64, |acc, m| acc.max(m.abs()));
    let threshold = params.tolerance * scale;

    let mut reflected: Vec<Vec<f64>> =
        bodies.iter().map(|b| vec![0.0; b.emitted.len()]).collect();
    let mut incident: Vec<Vec<f64>> = reflected.clone();
    let mut iterations = 0;
    let mut change = f64::INFINITY;

    while iterations < params.max_iterations {
        iterations += 1;
        let radiosity: Vec<Vec<f64>> = bodies
            .iter()
            .zip(&reflected)
            .map(|(body, r)| body.emitted.iter().zip(r).map(|(m, r)| m + r).collect())
            .collect();
        incident = (0..bodies.len())
            .map(|b| {
                (0..bodies[b].emitted.len())
                    .into_par_iter()
                    .map(|i| graph.incident(b, i, &radiosity))
                    .collect()
            })
            .collect();
        change = 0.0;
        for ((body, received), previous) in bodies.iter().zip(&incident).zip(&mut reflected) {
            let updates = body.reflection.iter().zip(received).zip(previous.iter_mut());
            for ((rho, flux), old) in updates {
                let value = rho * flux;
                change = change.max((value - *old).abs());
                *old = value;
            }
        }
        if change <= threshold {
            break;
        }
    }

    let warning = (change > threshold).then_some(NonConvergence { iterations, change });
    match &warning {
        Some(w) => warn!(iterations, change, "{w}"),
        None => debug!(iterations, change, "irradiation converged"),
    }

    let states = incident
        .into_iter()
        .zip(reflected)
        .map(|(incident, additional_flux)| IrradiationState {
            incident,
            additional_flux,
        })
        .collect();
    Ok(IrradiationSolution {
        states,
        iterations,
        warning,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::{Isometry3, Point3};
    use crate::mesh::fixtures::octahedron;
    use approx::assert_relative_eq;

    fn system() -> (Vec<Mesh>, ExchangeGraph) {
        let a = octahedron(Point3::origin(), 1.0);
        let b = octahedron(Point3::origin(), 0.8)
            .transformed(&Isometry3::translation(2.5, 0.0, 0.0));
        let bodies = vec![a, b];
        let graph = ExchangeGraph::build(&bodies);
        (bodies, graph)
    }

    #[test]
    fn no_reflection_means_no_heating() {
        let (meshes, graph) = system();
        let bodies: Vec<_> = meshes
            .iter()
            .map(|m| IrradiatedBody::blackbody(m, 6000.0, 0.0))
            .collect();
        let solution = solve_irradiation(&bodies, &graph, &IrradiationParams::default()).unwrap();
        assert_eq!(solution.iterations, 1);
        assert!(solution.converged());
        for state in &solution.states {
            assert!(state.additional_flux.iter().all(|f| *f == 0.0));
        }
        assert!(solution.states[0].incident.iter().any(|f| *f > 0.0));
    }

    #[test]
    fn shielded_body_adds_no_flux() {
        let line = |n: usize| -> Vec<Mesh> {
            (0..n)
                .map(|k| {
                    #[allow(clippy::cast_precision_loss)]
                    let x = 3.0 * k as f64;
                    octahedron(Point3::new(x, 0.0, 0.0), 1.0)
                })
                .collect()
        };
        let incident_on_first = |meshes: &[Mesh]| {
            let graph = ExchangeGraph::build(meshes);
            let bodies: Vec<_> = meshes
                .iter()
                .map(|m| IrradiatedBody::blackbody(m, 6000.0, 0.0))
                .collect();
            let solution =
                solve_irradiation(&bodies, &graph, &IrradiationParams::default()).unwrap();
            solution.states[0].incident.clone()
        };
        // The middle body hides the far one completely from the first.
        let pair = incident_on_first(&line(2));
        let triple = incident_on_first(&line(3));
        assert!(pair.iter().any(|f| *f > 0.0));
        for (a, b) in pair.iter().zip(&triple) {
            assert_relative_eq!(*a, *b, max_relative = 1e-12);
        }
    }

    #[test]
    fn reflection_converges_and_heats_facing_side() {
        let (meshes, graph) = system();
        let bodies: Vec<_> = meshes
            .iter()
            .map(|m| IrradiatedBody::blackbody(m, 5000.0, 0.6))
            .collect();
        let solution = solve_irradiation(&bodies, &graph, &IrradiationParams::default()).unwrap();
        assert!(solution.converged());
        assert!(solution.iterations > 1);
        let state = &solution.states[0];
        let teff = vec![5000.0; meshes[0].triangle_count()];
        let heated = state.heated_teff(&teff);
        for (i, t) in heated.iter().enumerate() {
            if meshes[0].triangle_normal(i).x > 0.0 {
                assert!(*t > 5000.0);
            } else {
                assert_relative_eq!(*t, 5000.0, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn mirrored_pair_reprocesses_equally() {
        let a = octahedron(Point3::origin(), 1.0);
        let b = a.transformed(&Isometry3::translation(3.0, 0.0, 0.0));
        let meshes = vec![a, b];
        let graph = ExchangeGraph::build(&meshes);
        let bodies: Vec<_> = meshes
            .iter()
            .map(|m| IrradiatedBody::uniform(m, 1.0, 0.5))
            .collect();
        let solution = solve_irradiation(&bodies, &graph, &IrradiationParams::default()).unwrap();
        let areas: Vec<f64> = (0..meshes[0].triangle_count())
            .map(|i| meshes[0].triangle_area(i))
            .collect();
        assert_relative_eq!(
            solution.states[0].reprocessed_luminosity(&areas),
            solution.states[1].reprocessed_luminosity(&areas),
            max_relative = 1e-9
        );
    }

    #[test]
    fn cap_reports_non_convergence() {
        let (meshes, graph) = system();
        let bodies: Vec<_> = meshes
            .iter()
            .map(|m| IrradiatedBody::uniform(m, 1.0, 1.0))
            .collect();
        let params = IrradiationParams::default()
            .with_tolerance(0.0)
            .with_max_iterations(2);
        let solution = solve_irradiation(&bodies, &graph, &params).unwrap();
        let warning = solution.warning.unwrap();
        assert_eq!(warning.iterations, 2);
        assert!(warning.to_string().contains("did not converge"));
        assert_eq!(solution.states.len(), 2);
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let (meshes, graph) = system();
        let mut bodies: Vec<_> = meshes
            .iter()
            .map(|m| IrradiatedBody::uniform(m, 1.0, 0.0))
            .collect();
        bodies[1].emitted.pop();
        let err = solve_irradiation(&bodies, &graph, &IrradiationParams::default()).unwrap_err();
        assert!(err.to_string().contains("emitted"), "{err}");
    }

    #[test]
    fn blackbody_flux_of_sun() {
        assert_relative_eq!(blackbody_flux(5772.0), 6.2938e7, max_relative = 1e-4);
    }
}
