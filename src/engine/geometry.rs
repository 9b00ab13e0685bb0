use geojson::{Feature, FeatureCollection, Geometry, Position, Value as GeoValue};
use crate::engine::transforms::calculate_bounds_from_coordinates;
use crate::model::GeoBounds;

// Pure geometry functions over lon/lat coordinates

pub type Ring = Vec<(f64, f64)>;
/// Exterior ring followed by holes.
pub type PolygonRings = Vec<Ring>;

pub const position_to_pair: fn(&Position) -> (f64, f64) = |position| (position[0], position[1]);

pub const ring_from_positions: fn(&[Position]) -> Ring =
    |positions| positions.iter().map(position_to_pair).collect();

pub const polygon_from_rings: fn(&[Vec<Position>]) -> PolygonRings =
    |rings| rings.iter().map(|ring| ring_from_positions(ring)).collect();

/// Every polygon in a geometry, descending into multi-polygons and collections.
/// Points and lines carry no area and are skipped.
pub fn extract_polygons(geometry: &Geometry) -> Vec<PolygonRings> {
    match &geometry.value {
        GeoValue::Polygon(rings) => vec![polygon_from_rings(rings)],
        GeoValue::MultiPolygon(polygons) => polygons
            .iter()
            .map(|rings| polygon_from_rings(rings))
            .collect(),
        GeoValue::GeometryCollection(geometries) => {
            geometries.iter().flat_map(extract_polygons).collect()
        }
        _ => Vec::new(),
    }
}

// All positions of a geometry, flattened
pub fn collect_positions(geometry: &Geometry) -> Vec<(f64, f64)> {
    match &geometry.value {
        GeoValue::Point(position) => vec![position_to_pair(position)],
        GeoValue::MultiPoint(positions) | GeoValue::LineString(positions) => {
            ring_from_positions(positions)
        }
        GeoValue::MultiLineString(lines) | GeoValue::Polygon(lines) => {
            lines.iter().flat_map(|line| ring_from_positions(line)).collect()
        }
        GeoValue::MultiPolygon(polygons) => polygons
            .iter()
            .flat_map(|rings| rings.iter().flat_map(|ring| ring_from_positions(ring)))
            .collect(),
        GeoValue::GeometryCollection(geometries) => {
            geometries.iter().flat_map(collect_positions).collect()
        }
    }
}

pub const geometry_bounds: fn(&Geometry) -> Option<GeoBounds> =
    |geometry| calculate_bounds_from_coordinates(&collect_positions(geometry));

pub const feature_bounds: fn(&Feature) -> Option<GeoBounds> =
    |feature| feature.geometry.as_ref().and_then(geometry_bounds);

pub const collection_bounds: fn(&FeatureCollection) -> Option<GeoBounds> = |collection| {
    collection
        .features
        .iter()
        .filter_map(feature_bounds)
        .reduce(|acc, bounds| acc.union(&bounds))
};

// Ray casting against a single ring
pub const point_in_ring: fn(f64, f64, &[(f64, f64)]) -> bool = |x, y, ring| {
    let mut inside = false;
    let mut j = ring.len().wrapping_sub(1);
    for i in 0..ring.len() {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
};

/// Even-odd containment across the exterior ring and its holes.
pub const point_in_polygon: fn(f64, f64, &[Ring]) -> bool = |x, y, rings| {
    rings
        .iter()
        .filter(|ring| point_in_ring(x, y, ring))
        .count()
        % 2
        == 1
};

/// The feature's properties rendered as `key: value` lines, strings unquoted.
pub fn property_lines(feature: &Feature) -> Vec<String> {
    feature
        .properties
        .as_ref()
        .map(|properties| {
            properties
                .iter()
                .map(|(key, value)| match value {
                    serde_json::Value::String(s) => format!("{}: {}", key, s),
                    other => format!("{}: {}", key, other),
                })
                .collect()
        })
        .unwrap_or_default()
}

pub fn feature_name(feature: &Feature) -> Option<String> {
    match feature.property("name")? {
        serde_json::Value::String(name) => Some(name.clone()),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geojson::GeoJson;

    fn square(min: f64, max: f64) -> Vec<Position> {
        vec![
            vec![min, min],
            vec![max, min],
            vec![max, max],
            vec![min, max],
            vec![min, min],
        ]
    }

    #[test]
    fn polygon_with_hole_excludes_hole() {
        let geometry = Geometry::new(GeoValue::Polygon(vec![square(0.0, 10.0), square(4.0, 6.0)]));
        let polygons = extract_polygons(&geometry);
        assert_eq!(polygons.len(), 1);
        assert!(point_in_polygon(2.0, 2.0, &polygons[0]));
        assert!(!point_in_polygon(5.0, 5.0, &polygons[0]));
        assert!(!point_in_polygon(12.0, 5.0, &polygons[0]));
    }

    #[test]
    fn multipolygon_and_collection_are_flattened() {
        let multi = Geometry::new(GeoValue::MultiPolygon(vec![
            vec![square(0.0, 1.0)],
            vec![square(5.0, 6.0)],
        ]));
        let collection = Geometry::new(GeoValue::GeometryCollection(vec![
            multi.clone(),
            Geometry::new(GeoValue::Point(vec![20.0, 20.0])),
        ]));
        assert_eq!(extract_polygons(&multi).len(), 2);
        assert_eq!(extract_polygons(&collection).len(), 2);
        assert_eq!(
            geometry_bounds(&collection),
            Some(GeoBounds::new(0.0, 0.0, 20.0, 20.0))
        );
    }

    #[test]
    fn collection_bounds_skip_features_without_geometry() {
        let json = r#"{
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "properties": {}, "geometry": { "type": "Polygon", "coordinates": [[[74.0, 21.0], [82.8, 21.0], [82.8, 26.9], [74.0, 21.0]]] } },
                { "type": "Feature", "properties": {}, "geometry": null }
            ]
        }"#;
        let collection = match json.parse::<GeoJson>().expect("valid geojson") {
            GeoJson::FeatureCollection(fc) => fc,
            _ => panic!("expected a feature collection"),
        };
        assert_eq!(
            collection_bounds(&collection),
            Some(GeoBounds::new(74.0, 21.0, 82.8, 26.9))
        );

        let empty = FeatureCollection {
            bbox: None,
            features: vec![],
            foreign_members: None,
        };
        assert_eq!(collection_bounds(&empty), None);
    }

    #[test]
    fn property_lines_render_strings_unquoted() {
        let mut feature = Feature::from(Geometry::new(GeoValue::Point(vec![80.0, 22.0])));
        feature.set_property("name", "Odisha");
        feature.set_property("districts", 30);
        let mut lines = property_lines(&feature);
        lines.sort();
        assert_eq!(lines, vec!["districts: 30", "name: Odisha"]);
        assert_eq!(feature_name(&feature), Some("Odisha".to_string()));
    }
}
