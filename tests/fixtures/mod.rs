//! Fixtures: seed orders and synthetic camera frames

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use courier_verify::models::job::{JobStatus, Order, Priority};

pub fn order(id: &str) -> Order {
    Order {
        id: id.to_string(),
        receiver_name: "Riverside Food Pantry".to_string(),
        pickup_address: "Green Grocer, 88 Market St".to_string(),
        delivery_address: "Riverside Food Pantry, 5 Quay Ln".to_string(),
        status: JobStatus::Pending,
        priority: Some(Priority::Normal),
    }
}

pub fn seed_orders() -> Vec<Order> {
    vec![order("JOB-001"), order("JOB-002")]
}

/// Fresh scratch directory under the system temp dir.
pub fn scratch_dir(label: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("courier-{label}-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("Failed to create scratch dir");
    dir
}

/// A black/white checkerboard that the marker detector reads as a marker.
pub fn marker_image(size: u32, block: u32) -> image::RgbaImage {
    image::RgbaImage::from_fn(size, size, |x, y| {
        if (x / block + y / block) % 2 == 0 {
            image::Rgba([0, 0, 0, 255])
        } else {
            image::Rgba([255, 255, 255, 255])
        }
    })
}

pub fn blank_image(size: u32) -> image::RgbaImage {
    image::RgbaImage::from_pixel(size, size, image::Rgba([255, 255, 255, 255]))
}

/// Write a frame sequence: `blank` empty frames followed by a marker frame.
pub fn write_frames(dir: &Path, blank: usize) {
    for i in 0..blank {
        blank_image(400)
            .save(dir.join(format!("frame-{i:03}.png")))
            .expect("Failed to write blank frame");
    }
    marker_image(400, 25)
        .save(dir.join(format!("frame-{blank:03}.png")))
        .expect("Failed to write marker frame");
}
