use crate::model::{GeoBounds, GeoPoint, PixelSize, Viewport};

// Pure transformation functions for spherical Web Mercator

pub const TILE_SIZE: f64 = 256.0;
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

// World size in pixels at a (possibly fractional) zoom level
pub const tile_size: fn(f64) -> f64 = |zoom| TILE_SIZE * 2.0_f64.powf(zoom);

// Geographic point to world pixel coordinates
pub const project: fn(&GeoPoint, f64) -> (f64, f64) = |point, zoom| {
    let world = tile_size(zoom);
    let lat = point.lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let x = (point.lng + 180.0) / 360.0 * world;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / std::f64::consts::PI) / 2.0 * world;
    (x, y)
};

// World pixel coordinates back to a geographic point
pub const unproject: fn(f64, f64, f64) -> GeoPoint = |x, y, zoom| {
    let world = tile_size(zoom);
    let lng = x / world * 360.0 - 180.0;
    let n = std::f64::consts::PI * (1.0 - 2.0 * y / world);
    let lat = n.sinh().atan().to_degrees();
    GeoPoint::new(lat, lng)
};

pub const bounds_size_at_zoom: fn(&GeoBounds, f64) -> (f64, f64) = |bounds, zoom| {
    let (min_x, max_y) = project(&GeoPoint::new(bounds.min_y, bounds.min_x), zoom);
    let (max_x, min_y) = project(&GeoPoint::new(bounds.max_y, bounds.max_x), zoom);
    (max_x - min_x, max_y - min_y)
};

/// Center and zoom at which `bounds` fills the viewport minus `padding` pixels on each side.
/// Zoom is snapped down to a whole level and clamped into `[min_zoom, max_zoom]`.
pub const fit_bounds: fn(&GeoBounds, &PixelSize, f64, f64, f64) -> (GeoPoint, f64) =
    |bounds, size, padding, min_zoom, max_zoom| {
        let (width, height) = bounds_size_at_zoom(bounds, 0.0);
        let available_w = (size.width as f64 - 2.0 * padding).max(1.0);
        let available_h = (size.height as f64 - 2.0 * padding).max(1.0);

        let zoom = if width <= f64::EPSILON && height <= f64::EPSILON {
            max_zoom
        } else {
            let scale_x = if width > 0.0 { available_w / width } else { f64::INFINITY };
            let scale_y = if height > 0.0 { available_h / height } else { f64::INFINITY };
            scale_x.min(scale_y).log2().floor()
        };
        let zoom = zoom.clamp(min_zoom, max_zoom);

        let (min_x, max_y) = project(&GeoPoint::new(bounds.min_y, bounds.min_x), 0.0);
        let (max_x, min_y) = project(&GeoPoint::new(bounds.max_y, bounds.max_x), 0.0);
        let center = unproject((min_x + max_x) / 2.0, (min_y + max_y) / 2.0, 0.0);

        (center, zoom)
    };

// Bounding box calculations from lon/lat coordinates
pub const calculate_bounds_from_coordinates: fn(&[(f64, f64)]) -> Option<GeoBounds> =
    |coordinates| {
        let (&(x, y), rest) = coordinates.split_first()?;
        let mut bounds = GeoBounds::from_point(x, y);
        for &(x, y) in rest {
            bounds.extend(x, y);
        }
        Some(bounds)
    };

/// One raster tile placed on screen.
#[derive(Clone, Debug, PartialEq)]
pub struct TilePlacement {
    pub z: u8,
    pub x: u32,
    pub y: u32,
    pub screen_x: f64,
    pub screen_y: f64,
    pub span: f64,
}

/// Raster tiles covering the viewport, sampled at the nearest whole zoom.
pub fn visible_tiles(viewport: &Viewport) -> Vec<TilePlacement> {
    let z = viewport.zoom.round().clamp(0.0, 22.0);
    let span = TILE_SIZE * 2.0_f64.powf(viewport.zoom - z);
    let tile_count = 1_i64 << (z as u32);

    let (ox, oy) = viewport.origin();
    let min_tx = (ox / span).floor() as i64;
    let max_tx = ((ox + viewport.size.width as f64) / span).ceil() as i64 - 1;
    let min_ty = ((oy / span).floor() as i64).max(0);
    let max_ty = (((oy + viewport.size.height as f64) / span).ceil() as i64 - 1).min(tile_count - 1);

    let mut tiles = Vec::new();
    for ty in min_ty..=max_ty {
        for tx in min_tx..=max_tx {
            // x wraps around the antimeridian, y does not
            tiles.push(TilePlacement {
                z: z as u8,
                x: tx.rem_euclid(tile_count) as u32,
                y: ty as u32,
                screen_x: tx as f64 * span - ox,
                screen_y: ty as f64 * span - oy,
                span,
            });
        }
    }
    tiles
}

/// Expands a `{s}`/`{z}`/`{x}`/`{y}` tile URL template.
pub fn tile_url(template: &str, subdomains: &[String], z: u8, x: u32, y: u32) -> String {
    let subdomain = if subdomains.is_empty() {
        ""
    } else {
        subdomains[(x as usize + y as usize) % subdomains.len()].as_str()
    };
    template
        .replace("{s}", subdomain)
        .replace("{z}", &z.to_string())
        .replace("{x}", &x.to_string())
        .replace("{y}", &y.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn madhya_pradesh() -> GeoBounds {
        GeoBounds::new(74.0, 21.07, 82.82, 26.87)
    }

    #[test]
    fn fit_centers_on_bounds_and_keeps_them_visible() {
        let size = PixelSize::new(800, 600);
        let (center, zoom) = fit_bounds(&madhya_pradesh(), &size, 20.0, 0.0, 19.0);
        assert_eq!(zoom, 6.0);
        assert!((center.lng - 78.41).abs() < 1e-9);
        assert!(center.lat > 21.07 && center.lat < 26.87);

        let (w, h) = bounds_size_at_zoom(&madhya_pradesh(), zoom);
        assert!(w <= 760.0 && h <= 560.0);
        let (w, h) = bounds_size_at_zoom(&madhya_pradesh(), zoom + 1.0);
        assert!(w > 760.0 || h > 560.0);
    }

    #[test]
    fn single_point_fits_at_max_zoom() {
        let size = PixelSize::new(400, 400);
        let (center, zoom) = fit_bounds(&GeoBounds::from_point(80.0, 22.0), &size, 20.0, 0.0, 19.0);
        assert_eq!(zoom, 19.0);
        assert!((center.lat - 22.0).abs() < 1e-9);
    }

    #[test]
    fn projection_of_origin_is_world_center() {
        let (x, y) = project(&GeoPoint::new(0.0, 0.0), 1.0);
        assert!((x - 256.0).abs() < 1e-9);
        assert!((y - 256.0).abs() < 1e-9);
    }

    #[test]
    fn tile_url_expands_template() {
        let subdomains = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let url = tile_url(
            "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png",
            &subdomains,
            5,
            22,
            14,
        );
        assert_eq!(url, "https://a.tile.openstreetmap.org/5/22/14.png");
    }

    #[test]
    fn tiles_cover_the_viewport() {
        let viewport = Viewport::new(GeoPoint::new(0.0, 0.0), 1.0, PixelSize::new(512, 512))
            .expect("valid viewport");
        let tiles = visible_tiles(&viewport);
        assert_eq!(tiles.len(), 4);
        assert!(tiles.iter().all(|t| t.z == 1 && t.span == 256.0));
        assert_eq!(tiles[0].screen_x, 0.0);
        assert_eq!(tiles[3].screen_y, 256.0);
    }

    #[test]
    fn bounds_from_coordinates() {
        assert_eq!(calculate_bounds_from_coordinates(&[]), None);
        let bounds = calculate_bounds_from_coordinates(&[(80.0, 22.0), (75.0, 25.0), (82.0, 21.0)]);
        assert_eq!(bounds, Some(GeoBounds::new(75.0, 21.0, 82.0, 25.0)));
    }
}
