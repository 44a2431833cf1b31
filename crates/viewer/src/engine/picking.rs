use glam::DVec3;

/// A ray in world space. `direction` need not be normalized; hit distances
/// are expressed in multiples of its length.
#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub origin: DVec3,
    pub direction: DVec3,
}

impl Ray {
    pub fn new(origin: DVec3, direction: DVec3) -> Self {
        Self { origin, direction }
    }

    /// Point at parameter `t` along the ray
    pub fn at(&self, t: f64) -> DVec3 {
        self.origin + self.direction * t
    }
}

/// Axis-aligned bounding box
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    pub fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    /// From the `[xmin, ymin, zmin, xmax, ymax, zmax]` layout used by model geometry
    pub fn from_array(v: [f64; 6]) -> Self {
        Self {
            min: DVec3::new(v[0], v[1], v[2]),
            max: DVec3::new(v[3], v[4], v[5]),
        }
    }

    /// Collapsed box that any `expand` call will replace
    pub fn empty() -> Self {
        Self {
            min: DVec3::splat(f64::MAX),
            max: DVec3::splat(f64::MIN),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn expand(&mut self, other: &Aabb) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Center of the bounding box
    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    /// Length of the box diagonal
    pub fn diagonal(&self) -> f64 {
        (self.max - self.min).length()
    }

    pub fn size(&self) -> DVec3 {
        self.max - self.min
    }

    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Union of a sequence of boxes, `None` when the sequence is empty
    pub fn union<'a>(boxes: impl IntoIterator<Item = &'a Aabb>) -> Option<Aabb> {
        let mut acc = Aabb::empty();
        for b in boxes {
            acc.expand(b);
        }
        if acc.is_empty() {
            None
        } else {
            Some(acc)
        }
    }
}

/// Ray-AABB intersection using the slab method.
/// Returns the ray parameter of the nearest hit, or None.
pub fn ray_aabb(ray: &Ray, aabb: &Aabb) -> Option<f64> {
    let inv_dir = DVec3::new(
        1.0 / ray.direction.x,
        1.0 / ray.direction.y,
        1.0 / ray.direction.z,
    );

    let t1 = (aabb.min.x - ray.origin.x) * inv_dir.x;
    let t2 = (aabb.max.x - ray.origin.x) * inv_dir.x;
    let t3 = (aabb.min.y - ray.origin.y) * inv_dir.y;
    let t4 = (aabb.max.y - ray.origin.y) * inv_dir.y;
    let t5 = (aabb.min.z - ray.origin.z) * inv_dir.z;
    let t6 = (aabb.max.z - ray.origin.z) * inv_dir.z;

    // NaN appears when the origin sits on a slab plane of a parallel axis;
    // f64::min/max ignore NaN operands, which keeps that axis unconstrained.
    let tmin = t1.min(t2).max(t3.min(t4)).max(t5.min(t6));
    let tmax = t1.max(t2).min(t3.max(t4)).min(t5.max(t6));

    if tmax < 0.0 || tmin > tmax {
        return None;
    }

    Some(if tmin < 0.0 { tmax } else { tmin })
}

/// Pick the nearest box intersected by the ray.
/// Returns the id and the ray parameter of the hit.
pub fn pick_nearest<'a, I>(ray: &Ray, boxes: I) -> Option<(&'a str, f64)>
where
    I: IntoIterator<Item = (&'a str, &'a Aabb)>,
{
    let mut best: Option<(&'a str, f64)> = None;

    for (id, aabb) in boxes {
        if let Some(t) = ray_aabb(ray, aabb) {
            if best.map_or(true, |(_, d)| t < d) {
                best = Some((id, t));
            }
        }
    }

    best
}
