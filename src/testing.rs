//! Fixtures shared by unit tests across modules.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, RgbImage};

use crate::models::FaceBox;
use crate::perception::FrameScript;
use crate::signals::geometry::{LOWER_INNER_LIP, UPPER_INNER_LIP};

/// 60-point synthetic face mesh. `identity` shears the geometry: meshes whose
/// identities differ by 3 or more embed further apart than 0.15, while the
/// lip gap alone moves the embedding by about 0.013.
pub fn face_mesh(identity: f64, lip_gap: f64) -> Vec<[f64; 3]> {
    let mut points: Vec<[f64; 3]> = (0..60)
        .map(|i| {
            let i = i as f64;
            [0.3 + 0.004 * i, 0.3 + identity * 0.002 * i, 0.001 * i]
        })
        .collect();
    points[UPPER_INNER_LIP][1] = 0.60;
    points[LOWER_INNER_LIP][1] = 0.60 + lip_gap;
    points
}

pub fn face_box(x: f64) -> FaceBox {
    FaceBox {
        x,
        y: 40.0,
        w: 120.0,
        h: 140.0,
        score: 0.97,
    }
}

pub const SPEAKING: f64 = 0.05;
pub const SILENT: f64 = 0.0;

pub fn one_face(identity: f64, lip_gap: f64, emotion: &str) -> FrameScript {
    FrameScript {
        faces: vec![face_box(10.0)],
        landmarks: Some(face_mesh(identity, lip_gap)),
        emotion: Some(emotion.to_string()),
    }
}

pub fn two_faces() -> FrameScript {
    FrameScript {
        faces: vec![face_box(10.0), face_box(300.0)],
        landmarks: Some(face_mesh(1.0, SPEAKING)),
        emotion: Some("neutral".to_string()),
    }
}

pub fn no_face() -> FrameScript {
    FrameScript {
        faces: Vec::new(),
        landmarks: None,
        emotion: Some("neutral".to_string()),
    }
}

pub fn png_frame() -> Vec<u8> {
    let mut bytes = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(RgbImage::new(16, 12))
        .write_to(&mut bytes, ImageFormat::Png)
        .expect("encode test frame");
    bytes.into_inner()
}
