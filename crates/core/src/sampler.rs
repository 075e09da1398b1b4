//! Packs curves and gradients into fixed-resolution lookup tables.
//!
//! A table is `width` samples wide (evenly spaced over normalized lifetime
//! `[0, 1]`) and one row per branch of the packed range. Ranges that blend two
//! branches by a random ratio produce two rows: row 0 is the `rnd = 0` branch
//! and row 1 the `rnd = 1` branch, so the shader can blend them itself. The
//! height is exposed to shaders as the module's "mode" uniform.

use serde::Serialize;

use crate::curve::CurveRange;
use crate::gradient::GradientRange;

/// RGBA32F texel table consumed by the particle shader.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleTable {
    width: u32,
    height: u32,
    texels: Vec<[f32; 4]>,
}

impl SampleTable {
    fn zeroed(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            texels: vec![[0.0; 4]; (width * height) as usize],
        }
    }

    /// Samples per row.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Number of rows (branches).
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Texels in row-major order.
    pub fn texels(&self) -> &[[f32; 4]] {
        &self.texels
    }

    /// Texel at column `x`, row `y`.
    pub fn get(&self, x: u32, y: u32) -> Option<[f32; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.texels.get((y * self.width + x) as usize).copied()
    }

    fn fill(&mut self, mut sample: impl FnMut(f32, f32, &mut [f32; 4])) {
        let width = self.width;
        let interval = if width > 1 {
            1.0 / (width - 1) as f32
        } else {
            0.0
        };
        for (index, texel) in self.texels.iter_mut().enumerate() {
            let row = index as u32 / width;
            let column = index as u32 % width;
            sample(column as f32 * interval, row as f32, texel);
        }
    }
}

fn table_for(sample_count: u32, height: u32) -> SampleTable {
    SampleTable::zeroed(sample_count.max(1), height.max(1))
}

/// Pack a single range into the Z channel (rotation around the view axis).
pub fn pack_curve_range_z(sample_count: u32, z: &CurveRange) -> SampleTable {
    let mut table = table_for(sample_count, z.branch_count());
    table.fill(|t, rnd, texel| texel[2] = z.evaluate(t, rnd));
    table
}

/// Pack a single range replicated into X, Y and Z (uniform size).
pub fn pack_curve_range_n(sample_count: u32, n: &CurveRange) -> SampleTable {
    let mut table = table_for(sample_count, n.branch_count());
    table.fill(|t, rnd, texel| {
        let value = n.evaluate(t, rnd);
        texel[0] = value;
        texel[1] = value;
        texel[2] = value;
    });
    table
}

/// Pack three per-axis ranges into X, Y and Z.
pub fn pack_curve_range_xyz(
    sample_count: u32,
    x: &CurveRange,
    y: &CurveRange,
    z: &CurveRange,
) -> SampleTable {
    let height = x.branch_count().max(y.branch_count()).max(z.branch_count());
    let mut table = table_for(sample_count, height);
    table.fill(|t, rnd, texel| {
        texel[0] = x.evaluate(t, rnd);
        texel[1] = y.evaluate(t, rnd);
        texel[2] = z.evaluate(t, rnd);
    });
    table
}

/// Pack three per-axis ranges plus a fourth (speed modifier) into XYZW.
pub fn pack_curve_range_xyzw(
    sample_count: u32,
    x: &CurveRange,
    y: &CurveRange,
    z: &CurveRange,
    w: &CurveRange,
) -> SampleTable {
    let height = x
        .branch_count()
        .max(y.branch_count())
        .max(z.branch_count())
        .max(w.branch_count());
    let mut table = table_for(sample_count, height);
    table.fill(|t, rnd, texel| {
        texel[0] = x.evaluate(t, rnd);
        texel[1] = y.evaluate(t, rnd);
        texel[2] = z.evaluate(t, rnd);
        texel[3] = w.evaluate(t, rnd);
    });
    table
}

/// Pack a color range into RGBA.
pub fn pack_gradient_range(sample_count: u32, color: &GradientRange) -> SampleTable {
    let mut table = table_for(sample_count, color.branch_count());
    table.fill(|t, rnd, texel| *texel = color.evaluate(t, rnd).to_array());
    table
}
