use image::{DynamicImage, GrayImage, Rgb};
use imageproc::edges::canny;
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use imageproc::hough::{detect_lines, LineDetectionOptions, PolarLine};

// Tuned for the 300 DPI scans of the recognized document layouts.
const CANNY_LOW: f32 = 50.0;
const CANNY_HIGH: f32 = 150.0;
const HOUGH_VOTE_THRESHOLD: u32 = 100;
const HOUGH_SUPPRESSION_RADIUS: u32 = 8;
/// Rotations below this are noise, not skew.
const SKEW_EPSILON_DEG: f64 = 0.1;

/// Straighten a scanned page using the vertical table rules as a reference.
///
/// Detects lines, keeps the ones steeper than 45° from horizontal, and
/// rotates by the median deviation from vertical (median is robust to the
/// odd diagonal stroke). An image with no detected lines is returned
/// unmodified, pixel for pixel.
pub fn deskew(img: &DynamicImage) -> DynamicImage {
    let gray = img.to_luma8();
    let edges = canny(&gray, CANNY_LOW, CANNY_HIGH);
    let lines = detect_lines(
        &edges,
        LineDetectionOptions {
            vote_threshold: HOUGH_VOTE_THRESHOLD,
            suppression_radius: HOUGH_SUPPRESSION_RADIUS,
        },
    );

    let deviations = vertical_deviations(&lines);
    if deviations.is_empty() {
        return img.clone();
    }

    let skew = median(&deviations);
    if skew.abs() < SKEW_EPSILON_DEG {
        return img.clone();
    }

    tracing::debug!("deskew: correcting {skew:.2}° skew");
    let rgb = img.to_rgb8();
    // Rotate against the measured deviation; new borders fill white.
    let rotated = rotate_about_center(
        &rgb,
        (-skew).to_radians() as f32,
        Interpolation::Bicubic,
        Rgb([255u8, 255, 255]),
    );
    DynamicImage::ImageRgb8(rotated)
}

/// Deviation from vertical for each near-vertical Hough line.
///
/// `angle_in_degrees` is the angle of the line's normal (0..180); the line
/// itself runs at normal + 90°. A normal within 45° of horizontal means a
/// near-vertical line.
fn vertical_deviations(lines: &[PolarLine]) -> Vec<f64> {
    lines
        .iter()
        .filter_map(|line| {
            let normal = line.angle_in_degrees as f64;
            if normal <= 45.0 {
                Some(normal)
            } else if normal >= 135.0 {
                Some(normal - 180.0)
            } else {
                None
            }
        })
        .collect()
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Reduce a crop to its blue channel, optionally binarizing at a fixed
/// threshold. The stamped/printed fields on the delivery documents are much
/// darker in blue than their backgrounds, so this suppresses the form
/// pattern before OCR.
pub fn blue_channel(img: &DynamicImage, threshold: Option<u8>) -> GrayImage {
    let rgb = img.to_rgb8();
    let mut out = GrayImage::new(rgb.width(), rgb.height());
    for (x, y, pixel) in rgb.enumerate_pixels() {
        let b = pixel[2];
        let v = match threshold {
            Some(t) => {
                if b > t {
                    255
                } else {
                    0
                }
            }
            None => b,
        };
        out.put_pixel(x, y, image::Luma([v]));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma, Rgb, RgbImage};

    fn solid_white(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_pixel(w, h, Rgb([255u8, 255, 255])))
    }

    #[test]
    fn deskew_is_noop_without_lines() {
        // A featureless page yields no edges and therefore no Hough lines.
        let img = solid_white(200, 200);
        let out = deskew(&img);
        assert_eq!(img.as_bytes(), out.as_bytes());
    }

    #[test]
    fn deskew_preserves_dimensions() {
        let mut img = RgbImage::from_pixel(300, 300, Rgb([255u8, 255, 255]));
        // A slightly tilted dark vertical bar.
        for y in 20..280u32 {
            let x = 150 + y / 60;
            for dx in 0..3 {
                img.put_pixel(x + dx, y, Rgb([0, 0, 0]));
            }
        }
        let out = deskew(&DynamicImage::ImageRgb8(img));
        assert_eq!(out.width(), 300);
        assert_eq!(out.height(), 300);
    }

    #[test]
    fn vertical_deviation_sides() {
        let near_vertical_left = PolarLine { r: 10.0, angle_in_degrees: 2 };
        let near_vertical_right = PolarLine { r: 10.0, angle_in_degrees: 177 };
        let horizontal = PolarLine { r: 10.0, angle_in_degrees: 90 };
        let devs = vertical_deviations(&[near_vertical_left, near_vertical_right, horizontal]);
        assert_eq!(devs, vec![2.0, -3.0]);
    }

    #[test]
    fn median_of_even_and_odd_counts() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[1.0, 2.0, 3.0, 4.0]), 2.5);
    }

    #[test]
    fn blue_channel_binarizes_at_threshold() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([10, 10, 200]));
        img.put_pixel(1, 0, Rgb([10, 10, 100]));
        let out = blue_channel(&DynamicImage::ImageRgb8(img), Some(165));
        assert_eq!(out.get_pixel(0, 0), &Luma([255u8]));
        assert_eq!(out.get_pixel(1, 0), &Luma([0u8]));
    }

    #[test]
    fn blue_channel_without_threshold_keeps_values() {
        let mut img = RgbImage::new(1, 1);
        img.put_pixel(0, 0, Rgb([10, 20, 137]));
        let out = blue_channel(&DynamicImage::ImageRgb8(img), None);
        assert_eq!(out.get_pixel(0, 0), &Luma([137u8]));
    }
}
