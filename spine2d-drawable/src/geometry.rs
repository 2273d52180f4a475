//! Polygon helpers for clip regions: ear-clipping triangulation, convex decomposition and
//! winding normalization.

/// Ear-clipping triangulator. Keeps its index and concavity buffers between calls.
#[derive(Debug, Default)]
pub struct Triangulator {
    indices: Vec<usize>,
    concave: Vec<bool>,
}

impl Triangulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Triangulates a simple polygon given as flat `x, y` pairs. Returns indices into the
    /// polygon's vertices; fewer than 3 vertices yields no triangles.
    pub fn triangulate(&mut self, vertices: &[f32]) -> Vec<u16> {
        let mut remaining = vertices.len() / 2;
        if remaining < 3 {
            return Vec::new();
        }

        self.indices.clear();
        self.indices.extend(0..remaining);
        self.concave.clear();
        for i in 0..remaining {
            let concave = is_concave(i, remaining, vertices, &self.indices);
            self.concave.push(concave);
        }

        let mut triangles = Vec::with_capacity((remaining - 2) * 3);
        while remaining > 3 {
            let ear = self.find_ear(vertices, remaining);

            triangles.push(self.indices[(remaining + ear - 1) % remaining] as u16);
            triangles.push(self.indices[ear] as u16);
            triangles.push(self.indices[(ear + 1) % remaining] as u16);

            self.indices.remove(ear);
            self.concave.remove(ear);
            remaining -= 1;

            let before = (remaining + ear - 1) % remaining;
            let after = if ear == remaining { 0 } else { ear };
            self.concave[before] = is_concave(before, remaining, vertices, &self.indices);
            self.concave[after] = is_concave(after, remaining, vertices, &self.indices);
        }

        if remaining == 3 {
            triangles.extend_from_slice(&[
                self.indices[2] as u16,
                self.indices[0] as u16,
                self.indices[1] as u16,
            ]);
        }
        triangles
    }

    /// Position (in the remaining-vertex ring) of the next ear to cut. Falls back to the last
    /// convex vertex when no proper ear exists, so degenerate input still terminates.
    fn find_ear(&self, vertices: &[f32], remaining: usize) -> usize {
        let point = |ring: usize| {
            let v = self.indices[ring] * 2;
            (vertices[v], vertices[v + 1])
        };

        let mut previous = remaining - 1;
        let mut current = 0usize;
        let mut next = 1usize;
        loop {
            if !self.concave[current] {
                let (p1x, p1y) = point(previous);
                let (p2x, p2y) = point(current);
                let (p3x, p3y) = point(next);

                let mut contains_concave = false;
                let mut other = (next + 1) % remaining;
                while other != previous {
                    if self.concave[other] {
                        let (vx, vy) = point(other);
                        if positive_area(p3x, p3y, p1x, p1y, vx, vy)
                            && positive_area(p1x, p1y, p2x, p2y, vx, vy)
                            && positive_area(p2x, p2y, p3x, p3y, vx, vy)
                        {
                            contains_concave = true;
                            break;
                        }
                    }
                    other = (other + 1) % remaining;
                }
                if !contains_concave {
                    return current;
                }
            }

            if next == 0 {
                while current > 0 && self.concave[current] {
                    current -= 1;
                }
                return current;
            }

            previous = current;
            current = next;
            next = (next + 1) % remaining;
        }
    }

    /// Merges a triangulation back into convex polygons (flat `x, y`, not closed).
    pub fn decompose(&self, vertices: &[f32], triangles: &[u16]) -> Vec<Vec<f32>> {
        let mut polygons: Vec<Vec<f32>> = Vec::new();
        let mut polygon_indices: Vec<Vec<usize>> = Vec::new();

        let mut polygon: Vec<f32> = Vec::new();
        let mut indices: Vec<usize> = Vec::new();
        let mut fan_base: Option<usize> = None;
        let mut last_winding = 0;

        for tri in triangles.chunks_exact(3) {
            let t1 = tri[0] as usize * 2;
            let t2 = tri[1] as usize * 2;
            let t3 = tri[2] as usize * 2;
            let (x1, y1) = (vertices[t1], vertices[t1 + 1]);
            let (x2, y2) = (vertices[t2], vertices[t2 + 1]);
            let (x3, y3) = (vertices[t3], vertices[t3 + 1]);

            // Extend the current fan while it stays convex.
            if fan_base == Some(t1) && polygon.len() >= 4 {
                let o = polygon.len() - 4;
                let w1 = winding(polygon[o], polygon[o + 1], polygon[o + 2], polygon[o + 3], x3, y3);
                let w2 = winding(x3, y3, polygon[0], polygon[1], polygon[2], polygon[3]);
                if w1 == last_winding && w2 == last_winding {
                    polygon.extend_from_slice(&[x3, y3]);
                    indices.push(t3);
                    continue;
                }
            }

            if !polygon.is_empty() {
                polygons.push(std::mem::take(&mut polygon));
                polygon_indices.push(std::mem::take(&mut indices));
            }
            polygon.extend_from_slice(&[x1, y1, x2, y2, x3, y3]);
            indices.extend_from_slice(&[t1, t2, t3]);
            last_winding = winding(x1, y1, x2, y2, x3, y3);
            fan_base = Some(t1);
        }
        if !polygon.is_empty() {
            polygons.push(polygon);
            polygon_indices.push(indices);
        }

        // Absorb leftover triangles that share an edge with a polygon and keep it convex.
        for i in 0..polygons.len() {
            let (Some(&first_index), Some(&last_index)) =
                (polygon_indices[i].first(), polygon_indices[i].last())
            else {
                continue;
            };

            let poly = &polygons[i];
            let o = poly.len() - 4;
            let (mut prev_prev_x, mut prev_prev_y) = (poly[o], poly[o + 1]);
            let (mut prev_x, mut prev_y) = (poly[o + 2], poly[o + 3]);
            let (first_x, first_y) = (poly[0], poly[1]);
            let (second_x, second_y) = (poly[2], poly[3]);
            let base_winding = winding(prev_prev_x, prev_prev_y, prev_x, prev_y, first_x, first_y);

            let mut other = 0usize;
            while other < polygons.len() {
                let candidate = &polygon_indices[other];
                if other == i
                    || candidate.len() != 3
                    || candidate[0] != first_index
                    || candidate[1] != last_index
                {
                    other += 1;
                    continue;
                }

                let third_index = candidate[2];
                let len = polygons[other].len();
                let (x3, y3) = (polygons[other][len - 2], polygons[other][len - 1]);
                let w1 = winding(prev_prev_x, prev_prev_y, prev_x, prev_y, x3, y3);
                let w2 = winding(x3, y3, first_x, first_y, second_x, second_y);
                if w1 == base_winding && w2 == base_winding {
                    polygons[other].clear();
                    polygon_indices[other].clear();
                    polygons[i].extend_from_slice(&[x3, y3]);
                    polygon_indices[i].push(third_index);

                    (prev_prev_x, prev_prev_y) = (prev_x, prev_y);
                    (prev_x, prev_y) = (x3, y3);
                    other = 0;
                } else {
                    other += 1;
                }
            }
        }

        polygons.retain(|p| !p.is_empty());
        polygons
    }
}

fn positive_area(p1x: f32, p1y: f32, p2x: f32, p2y: f32, p3x: f32, p3y: f32) -> bool {
    p1x * (p3y - p2y) + p2x * (p1y - p3y) + p3x * (p2y - p1y) >= 0.0
}

fn is_concave(ring: usize, remaining: usize, vertices: &[f32], indices: &[usize]) -> bool {
    let previous = indices[(remaining + ring - 1) % remaining] * 2;
    let current = indices[ring] * 2;
    let next = indices[(ring + 1) % remaining] * 2;
    !positive_area(
        vertices[previous],
        vertices[previous + 1],
        vertices[current],
        vertices[current + 1],
        vertices[next],
        vertices[next + 1],
    )
}

fn winding(p1x: f32, p1y: f32, p2x: f32, p2y: f32, p3x: f32, p3y: f32) -> i32 {
    let px = p2x - p1x;
    let py = p2y - p1y;
    if p3x * py - p3y * px + px * p1y - p1x * py >= 0.0 {
        1
    } else {
        -1
    }
}

/// Signed area (shoelace, doubled) of a flat `x, y` polygon. Negative means clockwise in a y-up
/// frame.
pub fn signed_area(polygon: &[f32]) -> f32 {
    let n = polygon.len();
    if n < 6 {
        return 0.0;
    }
    let mut area = polygon[n - 2] * polygon[1] - polygon[0] * polygon[n - 1];
    for pair in polygon.windows(4).step_by(2) {
        area += pair[0] * pair[3] - pair[2] * pair[1];
    }
    area
}

/// Reverses the vertex order of `polygon` unless it is already clockwise.
pub fn make_clockwise(polygon: &mut [f32]) {
    if polygon.len() < 6 || signed_area(polygon) < 0.0 {
        return;
    }
    let last = polygon.len() - 2;
    let half = polygon.len() / 2;
    for i in (0..half).step_by(2) {
        let other = last - i;
        polygon.swap(i, other);
        polygon.swap(i + 1, other + 1);
    }
}
