mod exchange;
mod grid;

pub use exchange::{ExchangeGraph, ExchangeLink};
pub use grid::{Bounds2, ProjectedGrid};

use rayon::prelude::*;
use tracing::{debug, debug_span};

use crate::config::Tolerances;
use crate::error::{Result, VisibilityError};
use crate::math::polygon_2d::{bounds, bounds_overlap, convex_difference, signed_area};
use crate::math::{tangent_basis, Point2, Point3, UnitVector3, Vector3};
use crate::mesh::Mesh;

/// How much of one triangle the observer sees.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TriangleVisibility {
    /// Facing the observer and unobstructed.
    Visible,
    /// Facing the observer with the given fraction of its area occulted.
    Partial(f64),
    /// Facing the observer but completely hidden by another body.
    Occulted,
    /// Facing away from the observer.
    BackFacing,
}

impl TriangleVisibility {
    /// Fraction of the triangle's area the observer sees.
    #[must_use]
    pub fn visible_fraction(&self) -> f64 {
        match self {
            Self::Visible => 1.0,
            Self::Partial(occulted) => 1.0 - occulted,
            Self::Occulted | Self::BackFacing => 0.0,
        }
    }

    /// Fraction of the triangle's area hidden by other bodies.
    #[must_use]
    pub fn occulted_fraction(&self) -> f64 {
        match self {
            Self::Visible | Self::BackFacing => 0.0,
            Self::Partial(occulted) => *occulted,
            Self::Occulted => 1.0,
        }
    }
}

/// Visibility of every triangle of one body.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibilityState {
    triangles: Vec<TriangleVisibility>,
    areas: Vec<f64>,
}

impl VisibilityState {
    /// Per-triangle classification, in mesh order.
    #[must_use]
    pub fn triangles(&self) -> &[TriangleVisibility] {
        &self.triangles
    }

    /// Area of each triangle.
    #[must_use]
    pub fn areas(&self) -> &[f64] {
        &self.areas
    }

    /// Total surface area of the body.
    #[must_use]
    pub fn total_area(&self) -> f64 {
        self.areas.iter().sum()
    }

    /// Area seen by the observer.
    #[must_use]
    pub fn visible_area(&self) -> f64 {
        self.weighted(TriangleVisibility::visible_fraction)
    }

    /// Front-facing area hidden by other bodies.
    #[must_use]
    pub fn occulted_area(&self) -> f64 {
        self.weighted(TriangleVisibility::occulted_fraction)
    }

    /// Area facing away from the observer.
    #[must_use]
    pub fn back_facing_area(&self) -> f64 {
        self.weighted(|v| match v {
            TriangleVisibility::BackFacing => 1.0,
            _ => 0.0,
        })
    }

    fn weighted(&self, f: impl Fn(&TriangleVisibility) -> f64) -> f64 {
        self.triangles
            .iter()
            .zip(&self.areas)
            .map(|(v, a)| f(v) * a)
            .sum()
    }
}

/// Orthonormal frame of the image plane.
#[derive(Debug, Clone, Copy)]
struct View {
    u: Vector3,
    w: Vector3,
    toward: Vector3,
}

impl View {
    fn new(observer: &Vector3) -> Result<Self> {
        let toward = UnitVector3::try_new(*observer, f64::MIN_POSITIVE)
            .filter(|v| v.iter().all(|c| c.is_finite()))
            .ok_or(VisibilityError::InvalidDirection)?;
        let (u, w) = tangent_basis(&toward);
        Ok(Self {
            u,
            w,
            toward: toward.into_inner(),
        })
    }

    fn project(&self, p: &Point3) -> Point2 {
        Point2::new(p.coords.dot(&self.u), p.coords.dot(&self.w))
    }

    /// Larger is nearer the observer.
    fn depth(&self, p: &Point3) -> f64 {
        p.coords.dot(&self.toward)
    }
}

/// A front-facing triangle in the image plane.
struct Facing {
    body: usize,
    polygon: [Point2; 3],
    bounds: Bounds2,
    depth: f64,
    projected_area: f64,
}

/// Classifies every triangle of every body as seen from direction `observer`.
///
/// `bodies` must already be placed in a common frame; `observer` points from
/// the system towards the observer. A triangle with `n̂·v̂ <= tolerances.horizon`
/// faces away. Each front-facing triangle is projected onto the image plane
/// and the projections of nearer front-facing triangles of the other bodies
/// are subtracted from it exactly, giving its occulted fraction.
/// Occulted fractions within `tolerances.visibility` of 0 or 1 snap to
/// [`TriangleVisibility::Visible`] or [`TriangleVisibility::Occulted`].
///
/// # Errors
///
/// - `VisibilityError::InvalidDirection` for a zero or non-finite direction.
/// - `VisibilityError::EmptyBody` for a body without triangles.
pub fn classify_visibility(
    bodies: &[Mesh],
    observer: &Vector3,
    tolerances: &Tolerances,
) -> Result<Vec<VisibilityState>> {
    let view = View::new(observer)?;
    if let Some(empty) = bodies.iter().position(|m| m.triangle_count() == 0) {
        return Err(VisibilityError::EmptyBody(empty).into());
    }
    let _span = debug_span!("classify_visibility", bodies = bodies.len()).entered();

    // Front-facing triangles of all bodies, and their index per body triangle.
    let mut facing = Vec::new();
    let mut slots: Vec<Vec<Option<usize>>> = Vec::with_capacity(bodies.len());
    for (b, mesh) in bodies.iter().enumerate() {
        let mut body_slots = Vec::with_capacity(mesh.triangle_count());
        for i in 0..mesh.triangle_count() {
            if mesh.triangle_normal(i).dot(&view.toward) <= tolerances.horizon {
                body_slots.push(None);
                continue;
            }
            let corners = mesh.corners(i);
            let polygon = corners.map(|c| view.project(&c));
            body_slots.push(Some(facing.len()));
            facing.push(Facing {
                body: b,
                polygon,
                bounds: bounds(&polygon),
                depth: view.depth(&mesh.flat_centroid(i)),
                projected_area: signed_area(&polygon),
            });
        }
        slots.push(body_slots);
    }

    // Coarse rejection of body pairs whose projections cannot overlap.
    let body_bounds: Vec<Option<Bounds2>> = (0..bodies.len())
        .map(|b| {
            facing
                .iter()
                .filter(|f| f.body == b)
                .map(|f| f.bounds)
                .reduce(|acc, bb| {
                    (
                        Point2::new(acc.0.x.min(bb.0.x), acc.0.y.min(bb.0.y)),
                        Point2::new(acc.1.x.max(bb.1.x), acc.1.y.max(bb.1.y)),
                    )
                })
        })
        .collect();
    let pair_overlaps = |a: usize, b: usize| match (&body_bounds[a], &body_bounds[b]) {
        (Some(x), Some(y)) => bounds_overlap(x, y),
        _ => false,
    };

    let all_bounds: Vec<Bounds2> = facing.iter().map(|f| f.bounds).collect();
    let mut grid = ProjectedGrid::for_bounds(&all_bounds);
    for (k, f) in facing.iter().enumerate() {
        let Ok(entry) = u32::try_from(k) else { break };
        grid.insert(entry, &f.bounds);
    }

    let band = tolerances.visibility;
    let states: Vec<VisibilityState> = bodies
        .iter()
        .enumerate()
        .map(|(b, mesh)| {
            let triangles = slots[b]
                .par_iter()
                .map(|slot| match slot {
                    None => TriangleVisibility::BackFacing,
                    Some(k) => {
                        let receiver = &facing[*k];
                        let occluders: Vec<&Facing> = grid
                            .query(&receiver.bounds)
                            .into_iter()
                            .map(|j| &facing[j as usize])
                            .filter(|o| {
                                o.body != b
                                    && o.depth > receiver.depth
                                    && pair_overlaps(b, o.body)
                                    && bounds_overlap(&o.bounds, &receiver.bounds)
                            })
                            .collect();
                        classify_facing(receiver, &occluders, band)
                    }
                })
                .collect();
            let areas = (0..mesh.triangle_count())
                .map(|i| mesh.triangle_area(i))
                .collect();
            VisibilityState { triangles, areas }
        })
        .collect();

    for (b, state) in states.iter().enumerate() {
        debug!(
            body = b,
            visible = state.visible_area(),
            occulted = state.occulted_area(),
            back_facing = state.back_facing_area(),
            "visibility classified"
        );
    }
    Ok(states)
}

fn classify_facing(receiver: &Facing, occluders: &[&Facing], band: f64) -> TriangleVisibility {
    if occluders.is_empty() || receiver.projected_area <= f64::MIN_POSITIVE {
        return TriangleVisibility::Visible;
    }
    let mut pieces = vec![receiver.polygon.to_vec()];
    for occluder in occluders {
        pieces = pieces
            .iter()
            .flat_map(|piece| convex_difference(piece, &occluder.polygon))
            .collect();
        if pieces.is_empty() {
            break;
        }
    }
    let visible: f64 = pieces.iter().map(|p| signed_area(p)).sum();
    let occulted = (1.0 - visible / receiver.projected_area).clamp(0.0, 1.0);
    if !occulted.is_finite() || occulted <= band {
        TriangleVisibility::Visible
    } else if occulted >= 1.0 - band {
        TriangleVisibility::Occulted
    } else {
        TriangleVisibility::Partial(occulted)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::Isometry3;
    use crate::mesh::fixtures::octahedron;
    use approx::assert_relative_eq;

    fn assert_conserved(state: &VisibilityState) {
        assert_relative_eq!(
            state.visible_area() + state.occulted_area() + state.back_facing_area(),
            state.total_area(),
            max_relative = 1e-12
        );
    }

    #[test]
    fn lone_body_is_half_visible() {
        let body = octahedron(Point3::origin(), 1.0);
        let states =
            classify_visibility(&[body], &Vector3::new(0.0, 0.0, 2.0), &Tolerances::default())
                .unwrap();
        let state = &states[0];
        let back = state
            .triangles()
            .iter()
            .filter(|v| **v == TriangleVisibility::BackFacing)
            .count();
        assert_eq!(back, 4);
        assert_relative_eq!(state.visible_area(), state.total_area() / 2.0, epsilon = 1e-12);
        assert_conserved(state);
    }

    #[test]
    fn aligned_bodies_eclipse_completely() {
        let far = octahedron(Point3::origin(), 1.0);
        let near = octahedron(Point3::new(0.0, 0.0, 5.0), 1.0);
        let states =
            classify_visibility(&[far, near], &Vector3::z(), &Tolerances::default()).unwrap();
        assert_relative_eq!(states[0].visible_area(), 0.0, epsilon = 1e-9);
        assert!(states[0]
            .triangles()
            .iter()
            .all(|v| matches!(v, TriangleVisibility::Occulted | TriangleVisibility::BackFacing)));
        assert_relative_eq!(
            states[1].visible_area(),
            states[1].total_area() / 2.0,
            epsilon = 1e-12
        );
        for state in &states {
            assert_conserved(state);
        }
    }

    #[test]
    fn offset_bodies_eclipse_partially() {
        let far = octahedron(Point3::origin(), 1.0);
        let near = octahedron(Point3::new(0.7, 0.3, 4.0), 0.8);
        let states =
            classify_visibility(&[far, near], &Vector3::z(), &Tolerances::default()).unwrap();
        let far_state = &states[0];
        assert!(far_state
            .triangles()
            .iter()
            .any(|v| matches!(v, TriangleVisibility::Partial(_))));
        assert!(far_state.visible_area() < far_state.total_area() / 2.0);
        assert!(far_state.occulted_area() > 0.0);
        for state in &states {
            assert_conserved(state);
        }
    }

    #[test]
    fn separated_bodies_do_not_interact() {
        let a = octahedron(Point3::origin(), 1.0);
        let b = a.transformed(&Isometry3::translation(10.0, 0.0, 3.0));
        let states = classify_visibility(&[a, b], &Vector3::z(), &Tolerances::default()).unwrap();
        for state in &states {
            assert_relative_eq!(state.visible_area(), state.total_area() / 2.0, epsilon = 1e-12);
        }
    }

    fn facet(corners: [[f64; 3]; 3]) -> Mesh {
        let vertices = corners.iter().map(|c| Point3::new(c[0], c[1], c[2])).collect();
        Mesh::new(vertices, vec![[0, 1, 2]])
    }

    /// Unit right triangle in `z = 0` facing `+z`.
    fn receiver() -> Mesh {
        facet([[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]])
    }

    fn seen_through(occluder: [[f64; 3]; 3], tolerances: &Tolerances) -> VisibilityState {
        let states =
            classify_visibility(&[receiver(), facet(occluder)], &Vector3::z(), tolerances)
                .unwrap();
        for state in &states {
            assert!(state.visible_area().is_finite());
            assert_conserved(state);
        }
        states.into_iter().next().unwrap()
    }

    #[test]
    fn fractions_snap_within_visibility_band() {
        // Covers the corner x > 0.99 of the receiver: 1e-4 of its area.
        let corner = [[0.99, 0.0, 1.0], [1.5, 0.0, 1.0], [0.99, 0.5, 1.0]];
        // Covers everything except that corner.
        let all_but_corner = [[-2.0, -1.0, 1.0], [0.99, -1.0, 1.0], [0.99, 4.0, 1.0]];

        let strict = Tolerances::default();
        let TriangleVisibility::Partial(small) = seen_through(corner, &strict).triangles()[0]
        else {
            panic!("expected a partial eclipse");
        };
        assert_relative_eq!(small, 1e-4, max_relative = 1e-6);
        let TriangleVisibility::Partial(large) =
            seen_through(all_but_corner, &strict).triangles()[0]
        else {
            panic!("expected a partial eclipse");
        };
        assert_relative_eq!(large, 1.0 - 1e-4, max_relative = 1e-9);

        let loose = Tolerances::default().with_visibility(1e-3);
        assert_eq!(seen_through(corner, &loose).triangles()[0], TriangleVisibility::Visible);
        let hidden = seen_through(all_but_corner, &loose);
        assert_eq!(hidden.triangles()[0], TriangleVisibility::Occulted);
        assert_relative_eq!(hidden.occulted_area(), hidden.total_area());
    }

    #[test]
    fn shared_projected_edge_does_not_occult() {
        let tolerances = Tolerances::default();
        // Shares the hypotenuse from outside.
        let beside = seen_through([[1.0, 0.0, 1.0], [1.0, 1.0, 1.0], [0.0, 1.0, 1.0]], &tolerances);
        assert_eq!(beside.triangles()[0], TriangleVisibility::Visible);
        assert_relative_eq!(beside.occulted_area(), 0.0);

        // Shares the bottom edge and covers half the receiver.
        let half = seen_through([[0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [0.5, 0.5, 1.0]], &tolerances);
        let TriangleVisibility::Partial(fraction) = half.triangles()[0] else {
            panic!("expected a partial eclipse");
        };
        assert_relative_eq!(fraction, 0.5, epsilon = 1e-9);

        // Coincident projection hides it completely.
        let same = seen_through([[0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [0.0, 1.0, 1.0]], &tolerances);
        assert_eq!(same.triangles()[0], TriangleVisibility::Occulted);
    }

    #[test]
    fn grazing_receiver_follows_horizon() {
        // Normal along -y, edge-on to an observer on the z axis.
        let grazing = facet([[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]]);
        let cover = facet([[-5.0, -5.0, 2.0], [5.0, -5.0, 2.0], [0.0, 5.0, 2.0]]);
        let bodies = [grazing, cover];
        let check = |observer: Vector3, tolerances: Tolerances| {
            let states = classify_visibility(&bodies, &observer, &tolerances).unwrap();
            for state in &states {
                assert!(state.visible_area().is_finite());
                assert!(state.occulted_area().is_finite());
                assert_conserved(state);
            }
            states[0].triangles()[0]
        };

        let edge_on = check(Vector3::z(), Tolerances::default());
        assert_eq!(edge_on, TriangleVisibility::BackFacing);

        // Tilted just enough to face the observer: a sliver behind the cover.
        let tilted = Vector3::new(0.0, -1e-6, 1.0);
        let sliver = check(tilted, Tolerances::default());
        assert_ne!(sliver, TriangleVisibility::BackFacing);
        assert!(sliver.occulted_fraction() > 0.99, "{sliver:?}");

        let raised = check(tilted, Tolerances::default().with_horizon(1e-3));
        assert_eq!(raised, TriangleVisibility::BackFacing);
    }

    #[test]
    fn rejects_bad_inputs() {
        let body = octahedron(Point3::origin(), 1.0);
        assert!(classify_visibility(
            std::slice::from_ref(&body),
            &Vector3::zeros(),
            &Tolerances::default()
        )
        .is_err());
        let err = classify_visibility(
            &[body, Mesh::default()],
            &Vector3::z(),
            &Tolerances::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("body 1"), "{err}");
    }
}
