use egui::Color32;

const MAGMA: [(u8, u8, u8); 9] = [
    (0, 0, 4),
    (28, 16, 68),
    (79, 18, 123),
    (129, 37, 129),
    (181, 54, 122),
    (229, 80, 100),
    (251, 135, 97),
    (254, 194, 135),
    (252, 253, 191),
];

/// Maps `t` in `[0, 1]` onto a magma-like ramp. Out of range values clamp.
pub fn magma(t: f32) -> Color32 {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let scaled = t * (MAGMA.len() - 1) as f32;
    let lower = (scaled.floor() as usize).min(MAGMA.len() - 2);
    let frac = scaled - lower as f32;
    let (r0, g0, b0) = MAGMA[lower];
    let (r1, g1, b1) = MAGMA[lower + 1];
    let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * frac).round() as u8;
    Color32::from_rgb(mix(r0, r1), mix(g0, g1), mix(b0, b1))
}
