mod front;
mod project;

pub use project::{outward_normal, project_onto_level_set};

use std::f64::consts::{FRAC_PI_3, PI};

use tracing::{debug, debug_span, trace, warn};

use crate::body::{Body, EnvelopePart};
use crate::config::Tolerances;
use crate::error::{MeshError, Result, RocheError};
use crate::math::{ccw_angle, project_on_plane, tangent_basis, Point3, UnitVector3};
use crate::mesh::{
    check_closed_manifold, check_on_surface, split_at_plane, Mesh, MeshAttributes, MeshFields,
    MeshResult,
};
use crate::potential::{contact_neck, radial_crossing, Equipotential};

use front::{FrontId, FrontStore, NodeId};

/// Default cap on emitted triangles.
pub const DEFAULT_MAX_TRIANGLES: usize = 2_000_000;

/// Subdivided sectors narrower than this are merged into fewer triangles.
const MIN_SUBDIVISION: f64 = 0.8;

/// Everything needed to mesh one body at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MeshParams {
    /// The surface to mesh.
    pub body: Body,
    /// Target potential `Ω₀`.
    pub potential: f64,
    /// Target edge length `δ`.
    pub delta: f64,
    /// Generation fails once this many triangles have been emitted.
    pub max_triangles: usize,
    /// Select the next node over all fronts rather than only the current one.
    pub full: bool,
    /// Optional fields to compute.
    pub fields: MeshFields,
    /// Numerical tolerances.
    pub tolerances: Tolerances,
}

impl MeshParams {
    /// Parameters with the default budget, the full algorithm and every field.
    #[must_use]
    pub fn new(body: Body, potential: f64, delta: f64) -> Self {
        Self {
            body,
            potential,
            delta,
            max_triangles: DEFAULT_MAX_TRIANGLES,
            full: true,
            fields: MeshFields::all(),
            tolerances: Tolerances::default(),
        }
    }

    /// Sets the triangle budget.
    #[must_use]
    pub fn with_max_triangles(mut self, max_triangles: usize) -> Self {
        self.max_triangles = max_triangles;
        self
    }

    /// Chooses between the full and the fast front bookkeeping.
    #[must_use]
    pub fn with_full(mut self, full: bool) -> Self {
        self.full = full;
        self
    }

    /// Sets the fields to compute.
    #[must_use]
    pub fn with_fields(mut self, fields: MeshFields) -> Self {
        self.fields = fields;
        self
    }

    /// Sets the numerical tolerances.
    #[must_use]
    pub fn with_tolerances(mut self, tolerances: Tolerances) -> Self {
        self.tolerances = tolerances;
        self
    }

    /// Checks the marching parameters (not the potential range).
    ///
    /// # Errors
    ///
    /// Returns `MeshError::InvalidParameters` for a non-positive `δ`, a zero
    /// budget or non-positive tolerances.
    pub fn validate(&self) -> Result<()> {
        if !self.delta.is_finite() || self.delta <= 0.0 {
            return Err(MeshError::InvalidParameters(format!(
                "delta must be finite and positive, got {}",
                self.delta
            ))
            .into());
        }
        if self.max_triangles == 0 {
            return Err(
                MeshError::InvalidParameters("max_triangles must be positive".into()).into(),
            );
        }
        if self.tolerances.potential.is_nan() || self.tolerances.potential <= 0.0 {
            return Err(MeshError::InvalidParameters(format!(
                "potential tolerance must be positive, got {}",
                self.tolerances.potential
            ))
            .into());
        }
        Ok(())
    }
}

/// Generates the mesh of one body.
///
/// Marching starts from a hexagonal patch around a seed point and grows it
/// by repeatedly taking the front node with the smallest opening angle and
/// filling its unmeshed sector with triangles of edge length close to `δ`.
/// Every new vertex is projected onto the exact level set. Front nodes that
/// approach each other split the front in two, or merge two fronts, until
/// the patch closes into a watertight surface.
pub struct MarchingMesh {
    params: MeshParams,
}

impl MarchingMesh {
    /// Creates a new `MarchingMesh` operation.
    #[must_use]
    pub fn new(params: MeshParams) -> Self {
        Self { params }
    }

    /// Marches the surface, validates it and computes the requested fields.
    ///
    /// # Errors
    ///
    /// - `MeshError::InvalidPotential` if `Ω₀` is outside the body's range.
    /// - `MeshError::MaxTrianglesExceeded` if the budget runs out.
    /// - `MeshError::DegenerateTopology` if the result is not a closed
    ///   genus-0 surface on the level set.
    pub fn execute(&self) -> Result<MeshResult> {
        let params = &self.params;
        let _span = debug_span!(
            "marching_mesh",
            topology = params.body.topology(),
            potential = params.potential,
            delta = params.delta
        )
        .entered();
        let result = self.generate();
        if let Err(err) = &result {
            warn!(error = %err, "mesh generation failed");
        }
        result
    }

    fn generate(&self) -> Result<MeshResult> {
        let params = &self.params;
        params.validate()?;
        let body = params.body;
        let range = body.check_potential(params.potential)?;

        let potential = body.potential();
        let ray = body.seed_ray(params.potential);
        let direction = ray.direction.normalize();
        let radius = radial_crossing(
            &potential,
            &ray.center,
            &direction,
            params.potential,
            ray.max_radius,
        )
        .map_err(|_| MeshError::InvalidPotential {
            potential: params.potential,
            min: range.min,
            max: range.max,
            topology: body.topology(),
        })?;
        let seed = ray.center + direction * radius;
        debug!(x = seed.x, y = seed.y, z = seed.z, "seed point");

        let mut marcher = Marcher::new(&potential, params);
        marcher.seed_hexagon(&seed)?;
        marcher.run()?;
        debug!(
            splits = marcher.splits,
            merges = marcher.merges,
            "fronts closed"
        );
        let mesh = marcher.into_mesh();

        let report = check_closed_manifold(&mesh)?;
        let residual =
            check_on_surface(&mesh, &potential, params.potential, params.tolerances.potential)?;
        debug!(
            vertices = report.vertices,
            triangles = report.triangles,
            volume = report.volume,
            residual,
            "closed mesh validated"
        );

        let (mesh, apex) = match body {
            Body::ContactEnvelopeHalf { part, .. } if part != EnvelopePart::Whole => {
                let neck = contact_neck(&potential, params.potential)?;
                let halves = split_at_plane(&mesh, neck.x);
                debug!(
                    neck = neck.x,
                    primary = halves.primary.triangle_count(),
                    secondary = halves.secondary.triangle_count(),
                    "envelope split at neck"
                );
                let half = if part == EnvelopePart::PrimaryHalf {
                    halves.primary
                } else {
                    halves.secondary
                };
                (half, Point3::new(neck.x, 0.0, 0.0))
            }
            Body::DetachedStar { .. }
            | Body::ContactEnvelopeHalf { .. }
            | Body::RotatingStar { .. } => (mesh, Point3::origin()),
        };

        MeshAttributes::new(&potential, params.potential)
            .with_fields(params.fields)
            .with_tolerance(params.tolerances.potential)
            .with_volume_apex(apex)
            .execute(mesh)
    }
}

/// Mutable state of one marching run.
struct Marcher<'a, P> {
    potential: &'a P,
    target: f64,
    delta: f64,
    tolerance: f64,
    max_triangles: usize,
    hint: &'static str,
    full: bool,
    vertices: Vec<Point3>,
    normals: Vec<UnitVector3>,
    triangles: Vec<[u32; 3]>,
    store: FrontStore,
    /// Fronts awaiting work in fast mode, most recent last.
    stack: Vec<FrontId>,
    splits: usize,
    merges: usize,
}

impl<'a, P: Equipotential> Marcher<'a, P> {
    fn new(potential: &'a P, params: &MeshParams) -> Self {
        Self {
            potential,
            target: params.potential,
            delta: params.delta,
            tolerance: params.tolerances.potential,
            max_triangles: params.max_triangles,
            hint: params.body.budget_hint(),
            full: params.full,
            vertices: Vec::new(),
            normals: Vec::new(),
            triangles: Vec::new(),
            store: FrontStore::new(),
            stack: Vec::new(),
            splits: 0,
            merges: 0,
        }
    }

    fn into_mesh(self) -> Mesh {
        Mesh::new(self.vertices, self.triangles)
    }

    fn budget_exceeded(&self) -> RocheError {
        MeshError::MaxTrianglesExceeded {
            limit: self.max_triangles,
            hint: self.hint,
        }
        .into()
    }

    /// Projects `p` onto the level set and appends it as a vertex.
    fn add_vertex(&mut self, p: &Point3) -> Result<u32> {
        let index = u32::try_from(self.vertices.len()).map_err(|_| self.budget_exceeded())?;
        let on_surface = project_onto_level_set(self.potential, p, self.target, self.tolerance)?;
        let (normal, _) = outward_normal(self.potential, &on_surface)?;
        self.vertices.push(on_surface);
        self.normals.push(normal);
        Ok(index)
    }

    fn reserve(&self, count: usize) -> Result<()> {
        if self.triangles.len() + count > self.max_triangles {
            return Err(self.budget_exceeded());
        }
        Ok(())
    }

    fn position(&self, id: NodeId) -> Point3 {
        self.vertices[self.store.node(id).vertex as usize]
    }

    fn normal(&self, id: NodeId) -> UnitVector3 {
        self.normals[self.store.node(id).vertex as usize]
    }

    fn vertex(&self, id: NodeId) -> u32 {
        self.store.node(id).vertex
    }

    /// Six triangles around the seed, wound counter-clockwise about its normal.
    #[allow(clippy::cast_precision_loss)]
    fn seed_hexagon(&mut self, seed: &Point3) -> Result<()> {
        let center = self.add_vertex(seed)?;
        let p = self.vertices[center as usize];
        let (u, v) = tangent_basis(&self.normals[center as usize]);
        let mut ring = [0u32; 6];
        for (k, slot) in ring.iter_mut().enumerate() {
            let angle = FRAC_PI_3 * k as f64;
            *slot = self.add_vertex(&(p + (u * angle.cos() + v * angle.sin()) * self.delta))?;
        }
        self.reserve(6)?;
        for k in 0..6 {
            self.triangles.push([center, ring[k], ring[(k + 1) % 6]]);
        }
        let front = self.store.add_front(&ring);
        self.stack.push(front);
        Ok(())
    }

    fn run(&mut self) -> Result<()> {
        let step_limit = self.max_triangles.saturating_mul(4).saturating_add(64);
        let mut steps = 0usize;
        while let Some(front) = self.next_front() {
            steps += 1;
            if steps > step_limit {
                return Err(self.budget_exceeded());
            }
            if self.store.front(front).len <= 3 {
                self.close(front)?;
                continue;
            }
            let node = self.select(front);
            if !self.resolve_collision(node) {
                self.grow(node)?;
            }
        }
        Ok(())
    }

    /// The front to work on next.
    ///
    /// Full mode finishes triangular fronts first and otherwise picks
    /// globally in [`Self::select`]. Fast mode works depth-first.
    fn next_front(&mut self) -> Option<FrontId> {
        if self.full {
            let store = &self.store;
            return store
                .front_ids()
                .find(|&f| store.front(f).len <= 3)
                .or_else(|| store.front_ids().next());
        }
        while let Some(&top) = self.stack.last() {
            if self.store.has_front(top) {
                return Some(top);
            }
            self.stack.pop();
        }
        None
    }

    /// The node with the smallest opening angle.
    fn select(&mut self, front: FrontId) -> NodeId {
        let candidates: Vec<NodeId> = if self.full {
            self.store.node_ids().collect()
        } else {
            self.store.walk(front)
        };
        let mut best = (self.store.front(front).head, f64::INFINITY);
        for id in candidates {
            let angle = self.opening_angle(id);
            if angle < best.1 {
                best = (id, angle);
            }
        }
        best.0
    }

    /// Angle of the unmeshed sector at a node, measured counter-clockwise
    /// from the previous node to the next about the vertex normal.
    fn opening_angle(&mut self, id: NodeId) -> f64 {
        let node = *self.store.node(id);
        if !node.angle.is_nan() {
            return node.angle;
        }
        let p = self.position(id);
        let n = self.normal(id);
        let a = project_on_plane(&(self.position(node.prev) - p), &n);
        let b = project_on_plane(&(self.position(node.next) - p), &n);
        let angle = ccw_angle(&a, &b, &n);
        self.store.set_angle(id, angle);
        angle
    }

    /// Returns `true` if `point` lies strictly inside the unmeshed sector of `id`.
    fn in_sector(&mut self, id: NodeId, point: &Point3) -> bool {
        let opening = self.opening_angle(id);
        let node = *self.store.node(id);
        let p = self.position(id);
        let n = self.normal(id);
        let a = project_on_plane(&(self.position(node.prev) - p), &n);
        let c = project_on_plane(&(point - p), &n);
        let angle = ccw_angle(&a, &c, &n);
        angle > 0.0 && angle < opening
    }

    /// Splits or merges fronts if another front node is closer than `δ`
    /// and the two nodes face each other across unmeshed surface.
    fn resolve_collision(&mut self, id: NodeId) -> bool {
        let node = *self.store.node(id);
        let p = self.position(id);
        let excluded = [node.vertex, self.vertex(node.prev), self.vertex(node.next)];
        let candidates: Vec<NodeId> = if self.full {
            self.store.node_ids().collect()
        } else {
            self.store.walk(node.front)
        };

        let mut best: Option<(NodeId, f64)> = None;
        for c in candidates {
            let other = *self.store.node(c);
            if excluded.contains(&other.vertex)
                || self.vertex(other.prev) == node.vertex
                || self.vertex(other.next) == node.vertex
            {
                continue;
            }
            let q = self.position(c);
            let dist = (q - p).norm();
            if dist >= self.delta || best.is_some_and(|(_, d)| d <= dist) {
                continue;
            }
            if self.in_sector(id, &q) && self.in_sector(c, &p) {
                best = Some((c, dist));
            }
        }

        let Some((c, dist)) = best else {
            return false;
        };
        if self.store.node(c).front == node.front {
            let created = self.store.split(id, c);
            if !self.full {
                self.stack.push(created);
            }
            self.splits += 1;
            trace!(distance = dist, fronts = self.store.front_count(), "front split");
        } else {
            self.store.merge(id, c);
            self.merges += 1;
            trace!(distance = dist, fronts = self.store.front_count(), "fronts merged");
        }
        true
    }

    /// Fills the unmeshed sector at `id` and advances the front past it.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn grow(&mut self, id: NodeId) -> Result<()> {
        let omega = self.opening_angle(id);
        let node = *self.store.node(id);
        let p = self.position(id);
        let a = self.position(node.prev);
        let b = self.position(node.next);
        let (pv, av, bv) = (node.vertex, self.vertex(node.prev), self.vertex(node.next));

        let count = sector_triangles(omega, self.delta, &p, &a, &b);
        if count == 1 {
            self.reserve(1)?;
            self.triangles.push([pv, av, bv]);
            self.store.remove_node(id);
            return Ok(());
        }

        let n = self.normal(id);
        let start = project_on_plane(&(b - p), &n)
            .try_normalize(f64::MIN_POSITIVE)
            .ok_or_else(|| {
                MeshError::DegenerateTopology(format!("front edge collapsed at vertex {pv}"))
            })?;
        let binormal = n.into_inner().cross(&start);
        let step = omega / count as f64;

        self.reserve(count)?;
        let mut fresh = Vec::with_capacity(count - 1);
        for k in 1..count {
            // Clockwise from the next node towards the previous one.
            let alpha = step * k as f64;
            let dir = start * alpha.cos() - binormal * alpha.sin();
            fresh.push(self.add_vertex(&(p + dir * self.delta))?);
        }

        let mut last = bv;
        for &q in &fresh {
            self.triangles.push([pv, q, last]);
            last = q;
        }
        self.triangles.push([pv, av, last]);

        let mut after = node.prev;
        for &q in fresh.iter().rev() {
            after = self.store.insert_after(after, q);
        }
        self.store.remove_node(id);
        Ok(())
    }

    /// Closes a front of three nodes `x -> y -> z` with `(x, z, y)`.
    fn close(&mut self, front: FrontId) -> Result<()> {
        let ids = self.store.walk(front);
        let &[x, y, z] = ids.as_slice() else {
            return Err(MeshError::DegenerateTopology(format!(
                "front collapsed to {} nodes",
                ids.len()
            ))
            .into());
        };
        self.reserve(1)?;
        self.triangles
            .push([self.vertex(x), self.vertex(z), self.vertex(y)]);
        self.store.remove_front(front);
        Ok(())
    }
}

/// Number of triangles used to fill an opening angle `omega` at `p`
/// between neighbours `a` and `b`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn sector_triangles(omega: f64, delta: f64, p: &Point3, a: &Point3, b: &Point3) -> usize {
    let mut count = (3.0 * omega / PI).floor() as usize + 1;
    if count > 1 && omega / (count as f64) < MIN_SUBDIVISION {
        count -= 1;
    }
    if count == 1 && omega > MIN_SUBDIVISION && (b - a).norm() > 1.2 * delta {
        count = 2;
    }
    if omega < 3.0 && ((a - p).norm() < 0.5 * delta || (b - p).norm() < 0.5 * delta) {
        count = 1;
    }
    count
}
