/// Numerical tolerances shared by the meshing and visibility stages,
/// passed by value into each call.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tolerances {
    /// Maximum `|Ω(vertex) − Ω₀|` for a vertex to count as on the surface.
    pub potential: f64,
    /// Occulted fractions within this band of 0 or 1 snap to the endpoint.
    pub visibility: f64,
    /// A triangle with `n̂·v̂ <= horizon` faces away from the observer.
    pub horizon: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            potential: 1e-10,
            visibility: 1e-9,
            horizon: 1e-12,
        }
    }
}

impl Tolerances {
    /// Sets the on-surface tolerance.
    #[must_use]
    pub fn with_potential(mut self, potential: f64) -> Self {
        self.potential = potential;
        self
    }

    /// Sets the visibility fraction band.
    #[must_use]
    pub fn with_visibility(mut self, visibility: f64) -> Self {
        self.visibility = visibility;
        self
    }

    /// Sets the horizon threshold.
    #[must_use]
    pub fn with_horizon(mut self, horizon: f64) -> Self {
        self.horizon = horizon;
        self
    }
}
