use web_sys::{CanvasRenderingContext2d, CanvasWindingRule, HtmlImageElement};
use crate::engine::geometry::Ring;
use crate::engine::registry::OverlayGeometry;
use crate::engine::transforms::TilePlacement;
use crate::engine::RenderContext;
use crate::error::ViewerError;
use crate::model::{PolygonStyle, ViewerResult};

// Canvas 2D drawing functions

// Clear canvas function
pub const clear_canvas: fn(&CanvasRenderingContext2d, (f64, f64)) -> ViewerResult<()> =
    |context, (width, height)| {
        context.clear_rect(0.0, 0.0, width, height);
        Ok(())
    };

// Background drawing function
pub const draw_background: fn(&CanvasRenderingContext2d, (f64, f64), &str) -> ViewerResult<()> =
    |context, (width, height), color| {
        context.set_global_alpha(1.0);
        context.set_fill_style_str(color);
        context.fill_rect(0.0, 0.0, width, height);
        Ok(())
    };

pub const draw_tile: fn(&CanvasRenderingContext2d, &HtmlImageElement, &TilePlacement) -> ViewerResult<()> =
    |context, image, tile| {
        context.set_global_alpha(1.0);
        context
            .draw_image_with_html_image_element_and_dw_and_dh(
                image,
                tile.screen_x,
                tile.screen_y,
                tile.span,
                tile.span,
            )
            .map_err(|_| ViewerError::Wasm("Failed to draw tile".to_string()))
    };

// Utility path drawing function, one closed subpath per ring
pub const trace_rings: fn(&[Ring], &RenderContext, &CanvasRenderingContext2d) =
    |rings, render_context, context| {
        for ring in rings {
            let mut points = ring
                .iter()
                .map(|&(lng, lat)| render_context.world_to_screen(lng, lat));
            if let Some((x, y)) = points.next() {
                context.move_to(x, y);
                points.for_each(|(x, y)| context.line_to(x, y));
                context.close_path();
            }
        }
    };

/// Fills then strokes a polygon; holes are cut out with the even-odd rule.
pub const render_polygon: fn(&[Ring], &PolygonStyle, &RenderContext, &CanvasRenderingContext2d) -> ViewerResult<()> =
    |rings, style, render_context, context| {
        if rings.is_empty() {
            return Ok(());
        }
        context.begin_path();
        trace_rings(rings, render_context, context);

        context.set_fill_style_str(&style.color);
        context.set_global_alpha(style.fill_opacity);
        context.fill_with_canvas_winding_rule(CanvasWindingRule::Evenodd);

        context.set_stroke_style_str(&style.color);
        context.set_global_alpha(style.opacity);
        context.set_line_width(style.weight);
        context.stroke();

        context.set_global_alpha(1.0);
        Ok(())
    };

/// Draws every on-screen feature of an overlay with its current style.
pub fn render_overlay(
    geometry: &OverlayGeometry,
    styles: &[PolygonStyle],
    render_context: &RenderContext,
    context: &CanvasRenderingContext2d,
) -> ViewerResult<()> {
    geometry
        .features
        .iter()
        .zip(styles)
        .filter(|(shape, _)| {
            shape
                .bounds
                .as_ref()
                .is_some_and(|b| render_context.is_on_screen(b))
        })
        .try_for_each(|(shape, style)| {
            shape
                .polygons
                .iter()
                .try_for_each(|rings| render_polygon(rings, style, render_context, context))
        })
}

pub fn draw_attribution(
    context: &CanvasRenderingContext2d,
    (width, height): (f64, f64),
    text: &str,
) {
    if text.is_empty() {
        return;
    }
    context.set_global_alpha(0.8);
    context.set_fill_style_str("#ffffff");
    let box_width = 8.0 + 6.0 * text.chars().count() as f64;
    context.fill_rect(width - box_width, height - 18.0, box_width, 18.0);
    context.set_global_alpha(1.0);
    context.set_fill_style_str("#333333");
    context.set_font("11px sans-serif");
    let _ = context.fill_text(text, width - box_width + 4.0, height - 5.0);
}
