//! Region geometry on the kitchen floor plane.
//!
//! Fixtures and placed entities are oriented boxes that only rotate
//! about the vertical axis. Overlap between footprints uses the
//! Separating Axis Theorem on the rotated rectangles; vertical
//! separation is checked on the z intervals.

pub type Vec3 = [f64; 3];
pub type Corners = [(f64, f64); 4];

/// A position plus a yaw about +z.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Frame {
    pub pos: Vec3,
    pub yaw: f64,
}

/// A box with full extents `size`, centred at `center`, rotated by `yaw`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientedBox {
    pub center: Vec3,
    pub yaw: f64,
    pub size: Vec3,
}

pub fn rotate_2d(x: f64, y: f64, theta: f64) -> (f64, f64) {
    let (s, c) = theta.sin_cos();
    (x * c - y * s, x * s + y * c)
}

pub fn obb_corners(
    cx: f64,
    cy: f64,
    half_w: f64,
    half_d: f64,
    rot_rad: f64,
) -> Corners {
    const SIGNS: [(f64, f64); 4] =
        [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];
    let mut corners = [(0.0, 0.0); 4];
    for (i, &(sx, sy)) in SIGNS.iter().enumerate() {
        let (dx, dy) = rotate_2d(sx * half_w, sy * half_d, rot_rad);
        corners[i] = (cx + dx, cy + dy);
    }
    corners
}

fn project(corners: &Corners, ax: f64, ay: f64) -> (f64, f64) {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for &(cx, cy) in corners {
        let dot = cx * ax + cy * ay;
        lo = lo.min(dot);
        hi = hi.max(dot);
    }
    (lo, hi)
}

/// True if the interiors of two footprints overlap.
/// Touching (shared edge or corner) is NOT counted as overlap.
pub fn obbs_overlap(a: &Corners, b: &Corners) -> bool {
    for corners in [a, b] {
        // Opposite edges are parallel, two normals per rectangle suffice.
        for i in 0..2 {
            let j = (i + 1) % 4;
            let ex = corners[j].0 - corners[i].0;
            let ey = corners[j].1 - corners[i].1;
            let (ax, ay) = (-ey, ex);
            let (min_a, max_a) = project(a, ax, ay);
            let (min_b, max_b) = project(b, ax, ay);
            if max_a <= min_b || max_b <= min_a {
                return false;
            }
        }
    }
    true
}

/// Half extents of the axis-aligned rectangle enclosing a footprint
/// of full size `size` rotated by `yaw`.
pub fn rotated_half_extents(size: [f64; 2], yaw: f64) -> (f64, f64) {
    let (s, c) = yaw.sin_cos();
    let (hx, hy) = (size[0] / 2.0, size[1] / 2.0);
    (
        c.abs() * hx + s.abs() * hy,
        s.abs() * hx + c.abs() * hy,
    )
}

impl Frame {
    pub fn new(pos: Vec3, yaw: f64) -> Self {
        Frame { pos, yaw }
    }

    /// Express a world point in this frame.
    pub fn to_local(&self, point: Vec3) -> Vec3 {
        let (lx, ly) = rotate_2d(
            point[0] - self.pos[0],
            point[1] - self.pos[1],
            -self.yaw,
        );
        [lx, ly, point[2] - self.pos[2]]
    }

    /// World position of an offset given in this frame.
    pub fn to_world(&self, offset: Vec3) -> Vec3 {
        let (wx, wy) = rotate_2d(offset[0], offset[1], self.yaw);
        [
            self.pos[0] + wx,
            self.pos[1] + wy,
            self.pos[2] + offset[2],
        ]
    }
}

impl OrientedBox {
    pub fn frame(&self) -> Frame {
        Frame::new(self.center, self.yaw)
    }

    pub fn footprint(&self) -> Corners {
        obb_corners(
            self.center[0],
            self.center[1],
            self.size[0] / 2.0,
            self.size[1] / 2.0,
            self.yaw,
        )
    }

    pub fn bottom(&self) -> f64 {
        self.center[2] - self.size[2] / 2.0
    }

    pub fn top(&self) -> f64 {
        self.center[2] + self.size[2] / 2.0
    }
}

/// Subtract `margin` once from each side length. A side shorter than
/// `margin` clamps to zero.
pub fn intersect_margin(size: [f64; 2], margin: f64) -> [f64; 2] {
    [(size[0] - margin).max(0.0), (size[1] - margin).max(0.0)]
}

/// Translation and yaw of frame `b` expressed in frame `a`.
pub fn relative_transform(a: &Frame, b: &Frame) -> (Vec3, f64) {
    (a.to_local(b.pos), b.yaw - a.yaw)
}

/// True if `point` lies inside (or on) `region`. With `only_2d` the
/// vertical axis is ignored.
pub fn point_in_region(point: Vec3, region: &OrientedBox, only_2d: bool) -> bool {
    let local = region.frame().to_local(point);
    let within = |v: f64, extent: f64| v.abs() <= extent / 2.0;
    within(local[0], region.size[0])
        && within(local[1], region.size[1])
        && (only_2d || within(local[2], region.size[2]))
}

/// Euclidean distance between two frame origins.
pub fn pairwise_distance(a: &Frame, b: &Frame) -> f64 {
    a.pos
        .iter()
        .zip(b.pos.iter())
        .map(|(p, q)| (p - q) * (p - q))
        .sum::<f64>()
        .sqrt()
}

/// True if two boxes overlap both in footprint and in height.
pub fn boxes_collide(a: &OrientedBox, b: &OrientedBox) -> bool {
    let vertical = a.bottom() < b.top() && b.bottom() < a.top();
    vertical && obbs_overlap(&a.footprint(), &b.footprint())
}
