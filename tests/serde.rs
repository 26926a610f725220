#![cfg(feature = "serde")]

use panogeo::{
    camera::{LeverArm, Setup},
    frame::GeodeticPoint,
    grid::{AngularGrid, GridSpec, Scale},
};
use uom::si::{f64::Length, length::meter};

#[test]
fn grid_spec_roundtrip() {
    let spec = GridSpec {
        rows: 2,
        cols: 16,
        ..GridSpec::default()
    };

    let json = serde_json::to_string(&spec).expect("spec serializes");
    let back: GridSpec = serde_json::from_str(&json).expect("spec deserializes");
    assert_eq!(back, spec);

    let grid = AngularGrid::try_from(back).expect("valid spec");
    assert_eq!(grid.len(), 32);
}

#[test]
fn setup_roundtrip() {
    let setup = Setup::new(
        Length::new::<meter>(2.1),
        Some(LeverArm::new(
            Length::new::<meter>(0.5),
            Length::new::<meter>(0.0),
            Length::new::<meter>(0.3),
        )),
    );

    let json = serde_json::to_string(&setup).expect("setup serializes");
    let back: Setup = serde_json::from_str(&json).expect("setup deserializes");
    assert_eq!(back, setup);
}

#[test]
fn scale_and_point() {
    let json = serde_json::to_string(&Scale::Px1024).expect("scale serializes");
    assert_eq!(json, "\"Px1024\"");

    let point = GeodeticPoint::from_degrees(4.4866, 51.8958, 45.0).expect("valid point");
    let json = serde_json::to_string(&point).expect("point serializes");
    let back: GeodeticPoint = serde_json::from_str(&json).expect("point deserializes");
    assert_eq!(back, point);
}

#[test]
fn point_latitude_is_checked() {
    // Angles are stored in radians, 2 rad is past the pole.
    let json = r#"{"longitude":0.0,"latitude":2.0,"altitude":0.0}"#;
    assert!(serde_json::from_str::<GeodeticPoint>(json).is_err());
}
