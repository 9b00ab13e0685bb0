use std::collections::HashMap;
use std::rc::Rc;

use geojson::FeatureCollection;

use crate::engine::geometry::{
    collection_bounds, extract_polygons, feature_bounds, feature_name, point_in_polygon,
    property_lines, PolygonRings,
};
use crate::error::ViewerError;
use crate::model::{GeoBounds, PolygonStyle, RegionKey, StyleOverride, ViewerResult};

/// Pre-digested geometry of one feature.
#[derive(Clone, Debug)]
pub struct FeatureShape {
    pub polygons: Vec<PolygonRings>,
    pub bounds: Option<GeoBounds>,
    pub name: Option<String>,
    pub properties: Vec<String>,
}

impl FeatureShape {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.bounds.as_ref().is_some_and(|b| b.contains(x, y))
            && self.polygons.iter().any(|rings| point_in_polygon(x, y, rings))
    }
}

/// Immutable geometry of an overlay, shared with rendering surfaces.
#[derive(Debug)]
pub struct OverlayGeometry {
    pub collection: FeatureCollection,
    pub features: Vec<FeatureShape>,
    pub bounds: Option<GeoBounds>,
}

impl OverlayGeometry {
    pub fn new(collection: FeatureCollection) -> Self {
        let features = collection
            .features
            .iter()
            .map(|feature| FeatureShape {
                polygons: feature
                    .geometry
                    .as_ref()
                    .map(extract_polygons)
                    .unwrap_or_default(),
                bounds: feature_bounds(feature),
                name: feature_name(feature),
                properties: property_lines(feature),
            })
            .collect();
        let bounds = collection_bounds(&collection);
        OverlayGeometry {
            collection,
            features,
            bounds,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HighlightTicket {
    pub key: RegionKey,
    pub feature: usize,
    generation: u64,
}

#[derive(Clone, Debug)]
struct ActiveHighlight {
    original: PolygonStyle,
    generation: u64,
}

/// One region's rendered overlay: shared geometry plus the current style of each feature.
#[derive(Clone, Debug)]
pub struct Overlay {
    pub key: RegionKey,
    pub geometry: Rc<OverlayGeometry>,
    pub base_style: PolygonStyle,
    styles: Vec<PolygonStyle>,
    highlights: HashMap<usize, ActiveHighlight>,
}

impl Overlay {
    pub fn new(key: RegionKey, collection: FeatureCollection, style: PolygonStyle) -> Self {
        let geometry = Rc::new(OverlayGeometry::new(collection));
        let styles = vec![style.clone(); geometry.features.len()];
        Overlay {
            key,
            geometry,
            base_style: style,
            styles,
            highlights: HashMap::new(),
        }
    }

    pub fn bounds(&self) -> Option<&GeoBounds> {
        self.geometry.bounds.as_ref().filter(|b| b.is_valid())
    }

    pub fn style(&self, feature: usize) -> Option<&PolygonStyle> {
        self.styles.get(feature)
    }

    pub fn styles(&self) -> &[PolygonStyle] {
        &self.styles
    }

    pub fn is_highlighted(&self, feature: usize) -> bool {
        self.highlights.contains_key(&feature)
    }

    /// Topmost feature containing the point; later features draw over earlier ones.
    pub fn feature_at(&self, x: f64, y: f64) -> Option<usize> {
        if !self.bounds().is_some_and(|b| b.contains(x, y)) {
            return None;
        }
        self.geometry
            .features
            .iter()
            .rposition(|shape| shape.contains(x, y))
    }
}

/// Owned mapping from region key to its overlay.
#[derive(Debug, Default)]
pub struct LayerRegistry {
    overlays: HashMap<RegionKey, Overlay>,
    highlight: StyleOverride,
    next_generation: u64,
}

impl LayerRegistry {
    pub fn new(highlight: StyleOverride) -> Self {
        LayerRegistry {
            overlays: HashMap::new(),
            highlight,
            next_generation: 0,
        }
    }

    /// Builds and stores the overlay for `key`, replacing any previous one.
    pub fn register(
        &mut self,
        key: RegionKey,
        collection: FeatureCollection,
        style: PolygonStyle,
    ) -> &Overlay {
        let overlay = Overlay::new(key.clone(), collection, style);
        if self.overlays.contains_key(&key) {
            tracing::debug!("Replacing overlay for {}", key);
        }
        self.overlays.insert(key.clone(), overlay);
        &self.overlays[&key]
    }

    pub fn remove(&mut self, key: &RegionKey) -> Option<Overlay> {
        self.overlays.remove(key)
    }

    pub fn get(&self, key: &RegionKey) -> Option<&Overlay> {
        self.overlays.get(key)
    }

    pub fn contains(&self, key: &RegionKey) -> bool {
        self.overlays.contains_key(key)
    }

    /// Registered keys, sorted so the result does not depend on hash order.
    pub fn keys(&self) -> Vec<&RegionKey> {
        let mut keys: Vec<&RegionKey> = self.overlays.keys().collect();
        keys.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        keys
    }

    pub fn len(&self) -> usize {
        self.overlays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty()
    }

    /// Applies the highlight style to one feature and remembers the style it had before.
    /// Clicking an already highlighted feature keeps the first remembered style.
    pub fn highlight(
        &mut self,
        key: &RegionKey,
        feature: usize,
    ) -> ViewerResult<(HighlightTicket, PolygonStyle)> {
        let overlay = self
            .overlays
            .get_mut(key)
            .ok_or_else(|| ViewerError::UnknownRegion(key.to_string()))?;
        let current = overlay.styles.get(feature).cloned().ok_or_else(|| {
            ViewerError::UnknownRegion(format!("{} has no feature #{}", key, feature))
        })?;

        self.next_generation += 1;
        let generation = self.next_generation;
        let original = match overlay.highlights.get(&feature) {
            Some(active) => active.original.clone(),
            None => current,
        };
        let highlighted = self.highlight.apply(&original);
        overlay.styles[feature] = highlighted.clone();
        overlay.highlights.insert(
            feature,
            ActiveHighlight {
                original,
                generation,
            },
        );

        Ok((
            HighlightTicket {
                key: key.clone(),
                feature,
                generation,
            },
            highlighted,
        ))
    }

    /// Restores the pre-highlight style. Tickets superseded by a later click are ignored.
    pub fn revert(&mut self, ticket: &HighlightTicket) -> Option<PolygonStyle> {
        let overlay = self.overlays.get_mut(&ticket.key)?;
        let active = overlay.highlights.get(&ticket.feature)?;
        if active.generation != ticket.generation {
            return None;
        }
        let original = active.original.clone();
        overlay.highlights.remove(&ticket.feature);
        overlay.styles[ticket.feature] = original.clone();
        Some(original)
    }

    /// Topmost `(region, feature)` under a lon/lat point, searching `order` from last to first.
    pub fn hit_test(&self, lng: f64, lat: f64, order: &[RegionKey]) -> Option<(RegionKey, usize)> {
        order.iter().rev().find_map(|key| {
            self.overlays
                .get(key)
                .and_then(|overlay| overlay.feature_at(lng, lat))
                .map(|feature| (key.clone(), feature))
        })
    }

    pub fn tooltip(&self, key: &RegionKey, feature: usize) -> Option<&str> {
        self.overlays
            .get(key)?
            .geometry
            .features
            .get(feature)?
            .name
            .as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::loader::parse_feature_collection;
    use crate::engine::loader::tests::square_collection;

    fn registry_with(keys: &[(&str, (f64, f64, f64, f64))]) -> LayerRegistry {
        let mut registry = LayerRegistry::new(StyleOverride::default());
        for (key, (a, b, c, d)) in keys {
            let fc = parse_feature_collection(&square_collection(*a, *b, *c, *d)).expect("valid");
            registry.register(RegionKey::new(*key), fc, PolygonStyle::default());
        }
        registry
    }

    #[test]
    fn re_registration_replaces_overlay() {
        let mut registry = registry_with(&[("odisha", (81.0, 17.0, 87.0, 22.0))]);
        let fc = parse_feature_collection(&square_collection(0.0, 0.0, 1.0, 1.0)).expect("valid");
        registry.register(
            RegionKey::new("odisha"),
            fc,
            PolygonStyle::default().with_color("#6a3d9a"),
        );

        assert_eq!(registry.len(), 1);
        let overlay = registry.get(&RegionKey::new("odisha")).expect("registered");
        assert_eq!(overlay.base_style.color, "#6a3d9a");
        assert_eq!(overlay.bounds(), Some(&GeoBounds::new(0.0, 0.0, 1.0, 1.0)));
    }

    #[test]
    fn highlight_then_revert_restores_exact_style() {
        let mut registry = registry_with(&[("tripura", (91.0, 22.9, 92.3, 24.5))]);
        let key = RegionKey::new("tripura");
        let before = registry.get(&key).and_then(|o| o.style(0)).cloned().expect("style");

        let (ticket, highlighted) = registry.highlight(&key, 0).expect("highlight");
        assert_eq!(highlighted.weight, 3.0);
        assert_eq!(registry.get(&key).and_then(|o| o.style(0)), Some(&highlighted));

        let restored = registry.revert(&ticket).expect("reverted");
        assert_eq!(restored, before);
        assert_eq!(registry.get(&key).and_then(|o| o.style(0)), Some(&before));
        assert!(!registry.get(&key).expect("overlay").is_highlighted(0));
    }

    #[test]
    fn stale_ticket_does_not_cut_a_newer_highlight_short() {
        let mut registry = registry_with(&[("tripura", (91.0, 22.9, 92.3, 24.5))]);
        let key = RegionKey::new("tripura");
        let before = registry.get(&key).and_then(|o| o.style(0)).cloned().expect("style");

        let (first, _) = registry.highlight(&key, 0).expect("first click");
        let (second, _) = registry.highlight(&key, 0).expect("second click");

        assert_eq!(registry.revert(&first), None);
        assert!(registry.get(&key).expect("overlay").is_highlighted(0));
        assert_eq!(registry.revert(&second), Some(before));
    }

    #[test]
    fn highlight_of_missing_feature_fails() {
        let mut registry = registry_with(&[("odisha", (81.0, 17.0, 87.0, 22.0))]);
        assert!(registry.highlight(&RegionKey::new("odisha"), 3).is_err());
        assert!(registry.highlight(&RegionKey::new("goa"), 0).is_err());
    }

    #[test]
    fn hit_test_prefers_topmost_overlay() {
        let registry = registry_with(&[
            ("india", (68.0, 6.0, 97.5, 37.0)),
            ("odisha", (81.0, 17.0, 87.0, 22.0)),
        ]);
        let order = [RegionKey::new("india"), RegionKey::new("odisha")];

        assert_eq!(
            registry.hit_test(84.0, 20.0, &order),
            Some((RegionKey::new("odisha"), 0))
        );
        assert_eq!(
            registry.hit_test(75.0, 30.0, &order),
            Some((RegionKey::new("india"), 0))
        );
        assert_eq!(registry.hit_test(0.0, 0.0, &order), None);
        assert_eq!(registry.tooltip(&RegionKey::new("odisha"), 0), Some("shape"));
        assert_eq!(
            registry.keys(),
            vec![&RegionKey::new("india"), &RegionKey::new("odisha")]
        );
    }
}
