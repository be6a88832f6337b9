use ndarray::Array2;
use palette::white_point::D65;
use palette::{FromColor, Lab, LinSrgb, Srgb};

/// Convert 8-bit sRGB triples to an N×3 array of CIELAB (D65) coordinates.
pub fn rgb_to_lab(pixels: &[[u8; 3]]) -> Array2<f64> {
    let mut out = Array2::zeros((pixels.len(), 3));
    for (mut row, &[r, g, b]) in out.rows_mut().into_iter().zip(pixels) {
        let lin: LinSrgb<f64> = Srgb::new(r, g, b).into_format::<f64>().into_linear();
        let lab: Lab<D65, f64> = Lab::from_color(lin);
        row[0] = lab.l;
        row[1] = lab.a;
        row[2] = lab.b;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 0.05
    }

    #[test]
    fn black_and_white_hit_the_lightness_extremes() {
        let lab = rgb_to_lab(&[[0, 0, 0], [255, 255, 255]]);
        assert!(close(lab[[0, 0]], 0.0));
        assert!(close(lab[[1, 0]], 100.0));
        assert!(close(lab[[1, 1]], 0.0));
        assert!(close(lab[[1, 2]], 0.0));
    }

    #[test]
    fn pure_red_matches_reference_values() {
        let lab = rgb_to_lab(&[[255, 0, 0]]);
        assert!((lab[[0, 0]] - 53.24).abs() < 0.1);
        assert!((lab[[0, 1]] - 80.09).abs() < 0.2);
        assert!((lab[[0, 2]] - 67.20).abs() < 0.2);
    }

    #[test]
    fn empty_input_gives_empty_array() {
        assert_eq!(rgb_to_lab(&[]).shape(), &[0, 3]);
    }
}
