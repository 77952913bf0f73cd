//! Heuristic marker presence detection.
//!
//! Three independent counters run over a sparse grid of anchors in the frame
//! and are combined by a conjunctive gate. Nothing here decodes a marker; a
//! positive result only means something marker-like is probably in view.

use tracing::trace;

use crate::models::frame::{FrameAnalysis, FrameSample};

/// Pixels darker than this count as "dark".
const DARK_THRESHOLD: u8 = 128;

/// Finder-pattern window (samples per side) and accepted dark-pixel band.
const FINDER_WINDOW: u32 = 7;
const FINDER_DARK_RATIO_MIN: f64 = 0.3;
const FINDER_DARK_RATIO_MAX: f64 = 0.7;
const FINDER_GRID_DIVISOR: u32 = 50;

/// High-contrast window and minimum max-min luminance spread.
const CONTRAST_WINDOW: u32 = 10;
const CONTRAST_MIN_SPREAD: u8 = 100;
const CONTRAST_GRID_DIVISOR: u32 = 40;

/// Square-edge window, border delta, and fraction of `2 * window` crossings.
const SQUARE_WINDOW: u32 = 15;
const SQUARE_EDGE_DELTA: u8 = 50;
const SQUARE_EDGE_FRACTION: f64 = 0.6;
const SQUARE_GRID_DIVISOR: u32 = 40;

/// Gate thresholds: counts must be strictly greater than these.
const MIN_FINDER_PATTERNS: usize = 0;
const MIN_CONTRAST_AREAS: usize = 5;
const MIN_SQUARE_EDGES: usize = 2;

/// Run all three detectors and apply the gate.
pub fn analyze(frame: &FrameSample) -> FrameAnalysis {
    let start = std::time::Instant::now();

    let finder_patterns = count_finder_patterns(frame);
    let contrast_areas = count_contrast_areas(frame);
    let square_edges = count_square_edges(frame);
    let present = marker_gate(finder_patterns, contrast_areas, square_edges);

    trace!(
        width = frame.width(),
        height = frame.height(),
        finder_patterns,
        contrast_areas,
        square_edges,
        present,
        elapsed_us = start.elapsed().as_micros() as u64,
        "Frame analyzed"
    );

    FrameAnalysis {
        finder_patterns,
        contrast_areas,
        square_edges,
        present,
    }
}

/// `true` when a marker is probably in frame.
pub fn marker_present(frame: &FrameSample) -> bool {
    analyze(frame).present
}

/// The conjunctive presence rule.
pub fn marker_gate(finder_patterns: usize, contrast_areas: usize, square_edges: usize) -> bool {
    finder_patterns > MIN_FINDER_PATTERNS
        && contrast_areas > MIN_CONTRAST_AREAS
        && square_edges > MIN_SQUARE_EDGES
}

/// Windows whose dark-pixel ratio sits in the nested-square finder band.
pub fn count_finder_patterns(frame: &FrameSample) -> usize {
    let total = (FINDER_WINDOW * FINDER_WINDOW) as f64;
    anchors(frame, FINDER_WINDOW, FINDER_GRID_DIVISOR)
        .filter(|&(x, y)| {
            let dark = window(x, y, FINDER_WINDOW)
                .filter(|&(px, py)| frame.luminance(px, py) < DARK_THRESHOLD)
                .count();
            let ratio = dark as f64 / total;
            (FINDER_DARK_RATIO_MIN..=FINDER_DARK_RATIO_MAX).contains(&ratio)
        })
        .count()
}

/// Windows whose luminance spread exceeds the contrast threshold.
pub fn count_contrast_areas(frame: &FrameSample) -> usize {
    anchors(frame, CONTRAST_WINDOW, CONTRAST_GRID_DIVISOR)
        .filter(|&(x, y)| {
            let (min, max) = window(x, y, CONTRAST_WINDOW)
                .map(|(px, py)| frame.luminance(px, py))
                .fold((u8::MAX, u8::MIN), |(lo, hi), l| (lo.min(l), hi.max(l)));
            max.saturating_sub(min) > CONTRAST_MIN_SPREAD
        })
        .count()
}

/// Windows where opposite borders differ along most rows and columns.
///
/// Each row compares its left and right border pixels, each column its top
/// and bottom pixels, giving at most `2 * SQUARE_WINDOW` crossings.
pub fn count_square_edges(frame: &FrameSample) -> usize {
    let last = SQUARE_WINDOW - 1;
    let max_crossings = (2 * SQUARE_WINDOW) as f64;
    anchors(frame, SQUARE_WINDOW, SQUARE_GRID_DIVISOR)
        .filter(|&(x, y)| {
            let crossings = (0..SQUARE_WINDOW)
                .map(|i| {
                    let horizontal = frame
                        .luminance(x, y + i)
                        .abs_diff(frame.luminance(x + last, y + i))
                        > SQUARE_EDGE_DELTA;
                    let vertical = frame
                        .luminance(x + i, y)
                        .abs_diff(frame.luminance(x + i, y + last))
                        > SQUARE_EDGE_DELTA;
                    horizontal as usize + vertical as usize
                })
                .sum::<usize>();
            crossings as f64 > max_crossings * SQUARE_EDGE_FRACTION
        })
        .count()
}

/// Top-left corners of every full `size`×`size` window on a grid whose stride
/// is `width / divisor` (at least 1).
fn anchors(frame: &FrameSample, size: u32, divisor: u32) -> impl Iterator<Item = (u32, u32)> {
    let stride = (frame.width() / divisor).max(1) as usize;
    let xs = frame.width().checked_sub(size).map_or(0, |m| m + 1);
    let ys = frame.height().checked_sub(size).map_or(0, |m| m + 1);
    (0..ys)
        .step_by(stride)
        .flat_map(move |y| (0..xs).step_by(stride).map(move |x| (x, y)))
}

fn window(x: u32, y: u32, size: u32) -> impl Iterator<Item = (u32, u32)> {
    (y..y + size).flat_map(move |py| (x..x + size).map(move |px| (px, py)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, value: u8) -> FrameSample {
        let data = (0..width * height)
            .flat_map(|_| [value, value, value, 255])
            .collect();
        FrameSample::from_rgba(width, height, data).unwrap()
    }

    fn painted(width: u32, height: u32, dark: impl Fn(u32, u32) -> bool) -> FrameSample {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                let v = if dark(x, y) { 0 } else { 255 };
                data.extend_from_slice(&[v, v, v, 255]);
            }
        }
        FrameSample::from_rgba(width, height, data).unwrap()
    }

    fn checkerboard(size: u32, block: u32) -> FrameSample {
        painted(size, size, |x, y| (x / block + y / block) % 2 == 0)
    }

    #[test]
    fn test_blank_frames_have_no_marker() {
        for value in [0, 127, 255] {
            let analysis = analyze(&solid(400, 300, value));
            assert_eq!(analysis.contrast_areas, 0);
            assert_eq!(analysis.square_edges, 0);
            assert!(!analysis.present);
        }
    }

    #[test]
    fn test_checkerboard_reads_as_marker() {
        let analysis = analyze(&checkerboard(400, 25));
        assert!(analysis.finder_patterns > 0, "{analysis:?}");
        assert!(analysis.contrast_areas > 5, "{analysis:?}");
        assert!(analysis.square_edges > 2, "{analysis:?}");
        assert!(analysis.present);
    }

    #[test]
    fn test_stripes_are_not_square_like() {
        let stripes = painted(400, 400, |x, _| (x / 25) % 2 == 0);
        let analysis = analyze(&stripes);
        assert!(analysis.contrast_areas > 5);
        assert_eq!(analysis.square_edges, 0);
        assert!(!analysis.present);
    }

    #[test]
    fn test_analysis_is_deterministic() {
        let frame = checkerboard(320, 20);
        let first = analyze(&frame);
        for _ in 0..5 {
            assert_eq!(analyze(&frame), first);
        }
    }

    #[test]
    fn test_gate_is_strict_on_every_count() {
        assert!(marker_gate(1, 6, 3));
        assert!(!marker_gate(0, 6, 3));
        assert!(!marker_gate(1, 5, 3));
        assert!(!marker_gate(1, 6, 2));
    }

    #[test]
    fn test_frame_smaller_than_windows() {
        let tiny = solid(5, 5, 0);
        assert_eq!(count_finder_patterns(&tiny), 0);
        assert_eq!(count_contrast_areas(&tiny), 0);
        assert_eq!(count_square_edges(&tiny), 0);
        assert!(!marker_present(&tiny));
    }

    #[test]
    fn test_finder_band_edges() {
        // 7x7 window, left 3 columns dark: 21/49 ≈ 0.43, inside the band.
        let balanced = painted(7, 7, |x, _| x < 3);
        assert_eq!(count_finder_patterns(&balanced), 1);

        // One dark column: 7/49 ≈ 0.14, outside the band.
        let sparse = painted(7, 7, |x, _| x < 1);
        assert_eq!(count_finder_patterns(&sparse), 0);
    }
}
