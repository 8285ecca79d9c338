//! Sampler behaviour through the public API: named scenarios plus
//! property tests over arbitrary edge contents.

use ambi_yeelight::{sample, AmbilightLayers, PixelLayer, Position, Rgb};
use proptest::prelude::*;

fn all_positions() -> Vec<Position> {
    Position::names().filter_map(|n| n.parse().ok()).collect()
}

fn full_layer(top: Vec<Rgb>, bottom: Vec<Rgb>, left: Vec<Rgb>, right: Vec<Rgb>) -> PixelLayer {
    PixelLayer::from_edges(Some(top), Some(bottom), Some(left), Some(right))
}

#[test]
fn two_pixel_top_scenarios() {
    let layer = PixelLayer::from_edges(
        Some(vec![Rgb::new(10, 20, 30), Rgb::new(40, 50, 60)]),
        None,
        None,
        None,
    );
    let pos: Position = "top".parse().unwrap();
    assert_eq!(sample(Some(&layer), pos), Some(Rgb::new(40, 50, 60)));

    let avg = sample(Some(&layer), "top-average".parse().unwrap()).unwrap();
    assert_eq!(avg.r, 29);
    // sqrt((400 + 2500) / 2) = 38.07, sqrt((900 + 3600) / 2) = 47.43
    assert_eq!(avg, Rgb::new(29, 38, 47));
}

#[test]
fn no_layer_means_no_sample() {
    for pos in all_positions() {
        assert_eq!(sample(None, pos), None, "{pos}");
    }
}

#[test]
fn empty_layer_means_no_sample() {
    let layer = PixelLayer::default();
    for pos in all_positions() {
        assert_eq!(sample(Some(&layer), pos), None, "{pos}");
    }
}

#[test]
fn empty_edges_mean_no_sample() {
    let layer = full_layer(vec![], vec![], vec![], vec![]);
    for pos in all_positions() {
        assert_eq!(sample(Some(&layer), pos), None, "{pos}");
    }
}

#[test]
fn corner_average_needs_both_edges() {
    let layer = PixelLayer::from_edges(Some(vec![Rgb::new(90, 90, 90)]), None, None, None);
    assert_eq!(sample(Some(&layer), Position::TopLeftAverage), None);
    assert_eq!(sample(Some(&layer), Position::TopLeft), Some(Rgb::new(90, 90, 90)));
}

#[test]
fn samples_layer_as_sent_by_the_tv() {
    let json = r#"{
        "layer1": {
            "left":  {"0": {"r": 1, "g": 2, "b": 3}, "1": {"r": 4, "g": 5, "b": 6}},
            "top":   {"0": {"r": 10, "g": 11, "b": 12},
                      "1": {"r": 20, "g": 21, "b": 22},
                      "2": {"r": 30, "g": 31, "b": 32}},
            "right": {"0": {"r": 7, "g": 8, "b": 9}, "1": {"r": 70, "g": 80, "b": 90}}
        }
    }"#;
    let layers: AmbilightLayers = serde_json::from_str(json).unwrap();
    let layer = layers.layer1.as_ref();

    assert_eq!(sample(layer, Position::Top), Some(Rgb::new(20, 21, 22)));
    assert_eq!(sample(layer, Position::LeftTop), Some(Rgb::new(4, 5, 6)));
    assert_eq!(sample(layer, Position::RightTop), Some(Rgb::new(7, 8, 9)));
    assert_eq!(sample(layer, Position::Bottom), None);
    // Pixels 0 and 1 straddle the middle of three: sqrt((100 + 400) / 2) = 15.8
    assert_eq!(
        sample(layer, Position::TopMiddleAverage),
        Some(Rgb::new(15, 16, 17))
    );
}

fn rgb() -> impl Strategy<Value = Rgb> {
    (any::<u8>(), any::<u8>(), any::<u8>()).prop_map(|(r, g, b)| Rgb::new(r, g, b))
}

fn edge() -> impl Strategy<Value = Vec<Rgb>> {
    prop::collection::vec(rgb(), 1..40)
}

proptest! {
    #[test]
    fn every_position_samples_non_empty_edges(
        top in edge(), bottom in edge(), left in edge(), right in edge(),
    ) {
        let layer = full_layer(top, bottom, left, right);
        for pos in all_positions() {
            prop_assert!(sample(Some(&layer), pos).is_some(), "{}", pos);
        }
    }

    #[test]
    fn single_pixel_edges_sample_that_pixel(px in rgb()) {
        let layer = full_layer(vec![px], vec![px], vec![px], vec![px]);
        for pos in all_positions() {
            prop_assert_eq!(sample(Some(&layer), pos), Some(px));
        }
    }

    #[test]
    fn edge_average_stays_within_channel_range(top in edge()) {
        let min = top.iter().map(|p| p.r).min().unwrap();
        let max = top.iter().map(|p| p.r).max().unwrap();
        let layer = PixelLayer::from_edges(Some(top), None, None, None);
        let avg = sample(Some(&layer), Position::TopAverage).unwrap();
        prop_assert!(avg.r >= min && avg.r <= max, "{} not in {}..={}", avg.r, min, max);
    }

    #[test]
    fn raw_positions_return_a_pixel_of_the_edge(top in edge()) {
        let layer = PixelLayer::from_edges(Some(top.clone()), None, None, None);
        for pos in [Position::Top, Position::TopLeft, Position::TopRight] {
            let picked = sample(Some(&layer), pos).unwrap();
            prop_assert!(top.contains(&picked));
        }
    }
}
