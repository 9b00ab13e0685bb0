//! Selection state machine.
//!
//! The controller owns the layer registry and the dialog state and decides which overlays are
//! visible. It never touches the DOM: rendering goes through [`MapSurface`] and the dialog is
//! handed to a [`DialogSurface`] after every change.

use crate::engine::dialog::{DialogContent, DialogSurface, DismissTrigger, InfoDialog};
use crate::engine::loader::LoadOutcome;
use crate::engine::registry::{HighlightTicket, LayerRegistry};
use crate::engine::MapSurface;
use crate::error::ViewerError;
use crate::model::{
    PolygonStyle, RegionCatalog, RegionKey, Selection, SourcePolicy, ViewerConfig, ViewerResult,
    ViewerVariant,
};

pub const LOAD_ERROR_TITLE: &str = "Load error";
pub const LOAD_ERROR_BODY: &str = "Could not load geojson files. Check that the files exist and are served from the same directory as the site.";

/// How one region's radio control should be rendered.
#[derive(Clone, Debug, PartialEq)]
pub struct ControlState {
    pub key: RegionKey,
    pub label: String,
    pub enabled: bool,
    pub checked: bool,
    /// Failure reason shown on a disabled control.
    pub note: Option<String>,
}

pub struct SelectionController<M: MapSurface, D: DialogSurface> {
    variant: ViewerVariant,
    policy: SourcePolicy,
    base_style: PolygonStyle,
    fit_padding: f64,
    catalog: RegionCatalog,
    registry: LayerRegistry,
    selection: Selection,
    /// Keys currently shown on the surface, bottom to top.
    visible: Vec<RegionKey>,
    dialog: InfoDialog,
    surface: M,
    dialog_surface: D,
}

impl<M: MapSurface, D: DialogSurface> SelectionController<M, D> {
    pub fn new(config: &ViewerConfig, catalog: RegionCatalog, surface: M, dialog_surface: D) -> Self {
        SelectionController {
            variant: config.variant,
            policy: config.source_policy,
            base_style: config.style.clone(),
            fit_padding: config.fit_padding,
            catalog,
            registry: LayerRegistry::new(config.highlight.clone()),
            selection: Selection::None,
            visible: Vec::new(),
            dialog: InfoDialog::default(),
            surface,
            dialog_surface,
        }
    }

    /// Registers every loaded region, applies the initial selection and describes the controls.
    pub fn install(&mut self, outcomes: Vec<LoadOutcome>) -> Vec<ControlState> {
        let mut controls = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            let descriptor = outcome.descriptor;
            match outcome.result {
                Ok(collection) => {
                    let style = self.base_style.clone().with_color(descriptor.color.clone());
                    self.registry
                        .register(descriptor.key.clone(), collection, style);
                    controls.push(ControlState {
                        key: descriptor.key,
                        label: descriptor.label,
                        enabled: true,
                        checked: false,
                        note: None,
                    });
                }
                Err(e) => {
                    controls.push(ControlState {
                        note: Some(format!("Could not load {}: {}", descriptor.file_name, e)),
                        key: descriptor.key,
                        label: descriptor.label,
                        enabled: false,
                        checked: false,
                    });
                }
            }
        }
        if self.registry.is_empty() && !controls.is_empty() {
            self.report_fatal(&ViewerError::Io("no region could be loaded".to_string()));
        }

        self.apply_initial_selection();
        for control in controls.iter_mut() {
            control.checked = self.is_selected(&control.key);
        }
        controls
    }

    fn apply_initial_selection(&mut self) {
        let national = self
            .catalog
            .national_key()
            .filter(|key| self.registry.contains(key))
            .cloned();
        let selection = match (self.variant, national.clone()) {
            (ViewerVariant::NationalOverlay, _) => Selection::All,
            (ViewerVariant::Isolate, Some(key)) => Selection::Region(key),
            (ViewerVariant::Isolate, None) => Selection::None,
        };
        let visible = self.visible_for(&selection);
        self.apply_visibility(visible);
        self.selection = selection;
        if let Some(key) = national {
            self.fit_to(&key);
        }
    }

    fn is_selected(&self, key: &RegionKey) -> bool {
        match &self.selection {
            Selection::Region(selected) => selected == key,
            Selection::All => self.catalog.is_national(key),
            Selection::None => false,
        }
    }

    fn selection_for(&self, key: &RegionKey) -> Selection {
        match self.variant {
            ViewerVariant::NationalOverlay if self.catalog.is_national(key) => Selection::All,
            _ => Selection::Region(key.clone()),
        }
    }

    /// Keys that must be visible for a selection, bottom to top.
    fn visible_for(&self, selection: &Selection) -> Vec<RegionKey> {
        let loaded = |key: &RegionKey| self.registry.contains(key);
        match self.variant {
            ViewerVariant::Isolate => match selection {
                Selection::Region(key) if loaded(key) => vec![key.clone()],
                _ => Vec::new(),
            },
            ViewerVariant::NationalOverlay => {
                let mut keys: Vec<RegionKey> = self
                    .catalog
                    .national_key()
                    .filter(|key| loaded(*key))
                    .cloned()
                    .into_iter()
                    .collect();
                match selection {
                    Selection::All => keys.extend(
                        self.catalog
                            .descriptors()
                            .iter()
                            .map(|d| &d.key)
                            .filter(|key| !self.catalog.is_national(key) && loaded(*key))
                            .cloned(),
                    ),
                    Selection::Region(key) if loaded(key) && !self.catalog.is_national(key) => {
                        keys.push(key.clone())
                    }
                    _ => {}
                }
                keys
            }
        }
    }

    fn apply_visibility(&mut self, next: Vec<RegionKey>) {
        for key in self.visible.iter().filter(|key| !next.contains(key)) {
            self.surface.hide_overlay(key);
        }
        for key in &next {
            let already = self.visible.contains(key);
            if already && self.policy == SourcePolicy::AddOnce {
                continue;
            }
            if already {
                self.surface.hide_overlay(key);
            }
            if let Some(overlay) = self.registry.get(key) {
                self.surface.show_overlay(overlay);
            }
        }
        self.visible = next;
    }

    fn fit_to(&mut self, key: &RegionKey) {
        let wants_fit = self
            .catalog
            .descriptor(key)
            .is_some_and(|d| d.fit_bounds);
        if !wants_fit {
            return;
        }
        if let Some(bounds) = self.registry.get(key).and_then(|o| o.bounds()) {
            self.surface.fit_bounds(bounds, self.fit_padding);
        }
    }

    fn present_dialog(&mut self) {
        self.dialog_surface.present(&self.dialog);
    }

    /// A radio control changed to `key`.
    pub fn on_select(&mut self, key: &RegionKey) -> ViewerResult<()> {
        if self.catalog.descriptor(key).is_none() || !self.registry.contains(key) {
            return Err(ViewerError::UnknownRegion(key.to_string()));
        }
        let selection = self.selection_for(key);
        tracing::info!("Selected {} ({:?})", key, selection);

        let visible = self.visible_for(&selection);
        self.apply_visibility(visible);
        self.selection = selection;
        self.fit_to(key);

        let info = self.catalog.info(key);
        self.dialog.show_info(&info);
        self.present_dialog();
        Ok(())
    }

    /// A rendered polygon was clicked. The selection is left alone; the returned ticket must be
    /// passed to [`Self::on_highlight_elapsed`] once the highlight duration has passed.
    pub fn on_feature_click(
        &mut self,
        key: &RegionKey,
        feature: usize,
    ) -> ViewerResult<HighlightTicket> {
        let (ticket, style) = self.registry.highlight(key, feature)?;
        self.surface.restyle_feature(key, feature, &style);

        let info = self.catalog.info(key);
        let mut content = DialogContent::text(info.body);
        if self.variant.shows_feature_properties() {
            let properties = self
                .registry
                .get(key)
                .and_then(|o| o.geometry.features.get(feature))
                .map(|shape| shape.properties.clone())
                .unwrap_or_default();
            content = content.with_properties(properties);
        }
        tracing::debug!("Clicked feature #{} of {}", feature, key);
        self.dialog.show(info.title, content);
        self.present_dialog();
        Ok(ticket)
    }

    pub fn on_highlight_elapsed(&mut self, ticket: &HighlightTicket) {
        if let Some(style) = self.registry.revert(ticket) {
            self.surface
                .restyle_feature(&ticket.key, ticket.feature, &style);
        }
    }

    /// Returns whether the dialog was closed. Escape is honored only by the isolate variant.
    pub fn on_dialog_dismiss(&mut self, trigger: DismissTrigger) -> bool {
        if trigger == DismissTrigger::Escape && !self.variant.allows_escape_dismiss() {
            return false;
        }
        if !self.dialog.is_visible() {
            return false;
        }
        self.dialog.hide();
        self.present_dialog();
        true
    }

    /// Initialization failed before any region could be handled.
    pub fn report_fatal(&mut self, error: &ViewerError) {
        tracing::error!("Fatal load error: {}", error);
        self.dialog
            .show(LOAD_ERROR_TITLE, DialogContent::text(LOAD_ERROR_BODY));
        self.present_dialog();
    }

    /// Topmost visible `(region, feature)` under a lon/lat point.
    pub fn hit_test(&self, lng: f64, lat: f64) -> Option<(RegionKey, usize)> {
        self.registry.hit_test(lng, lat, &self.visible)
    }

    pub fn tooltip(&self, key: &RegionKey, feature: usize) -> Option<&str> {
        self.registry.tooltip(key, feature)
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn visible(&self) -> &[RegionKey] {
        &self.visible
    }

    pub fn dialog(&self) -> &InfoDialog {
        &self.dialog
    }

    pub fn registry(&self) -> &LayerRegistry {
        &self.registry
    }

    pub fn catalog(&self) -> &RegionCatalog {
        &self.catalog
    }

    pub fn variant(&self) -> ViewerVariant {
        self.variant
    }

    pub fn surface(&self) -> &M {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut M {
        &mut self.surface
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::loader::load_regions;
    use crate::engine::loader::tests::FakeFetcher;
    use crate::engine::registry::Overlay;
    use crate::model::GeoBounds;
    use futures::executor::block_on;
    use std::collections::HashMap;

    #[derive(Clone, Debug, PartialEq)]
    enum Call {
        Show(String),
        Hide(String),
        Restyle(String, usize, PolygonStyle),
        Fit(GeoBounds),
    }

    /// Records every call. `painted` mirrors what a map with persistent sources would draw:
    /// restyles of hidden overlays are dropped, showing an overlay repaints all of its features.
    #[derive(Default)]
    struct RecordingSurface {
        calls: Vec<Call>,
        shown: Vec<RegionKey>,
        painted: HashMap<RegionKey, Vec<PolygonStyle>>,
    }

    impl RecordingSurface {
        fn fits(&self) -> Vec<&GeoBounds> {
            self.calls
                .iter()
                .filter_map(|c| match c {
                    Call::Fit(b) => Some(b),
                    _ => None,
                })
                .collect()
        }
    }

    impl MapSurface for RecordingSurface {
        fn show_overlay(&mut self, overlay: &Overlay) {
            self.calls.push(Call::Show(overlay.key.to_string()));
            self.shown.push(overlay.key.clone());
            self.painted
                .insert(overlay.key.clone(), overlay.styles().to_vec());
        }

        fn hide_overlay(&mut self, key: &RegionKey) {
            self.calls.push(Call::Hide(key.to_string()));
            self.shown.retain(|k| k != key);
        }

        fn restyle_feature(&mut self, key: &RegionKey, feature: usize, style: &PolygonStyle) {
            self.calls
                .push(Call::Restyle(key.to_string(), feature, style.clone()));
            if !self.shown.contains(key) {
                return;
            }
            if let Some(slot) = self
                .painted
                .get_mut(key)
                .and_then(|styles| styles.get_mut(feature))
            {
                *slot = style.clone();
            }
        }

        fn fit_bounds(&mut self, bounds: &GeoBounds, _padding: f64) {
            self.calls.push(Call::Fit(bounds.clone()));
        }
    }

    #[derive(Default)]
    struct RecordingDialog {
        presented: Vec<(String, bool)>,
    }

    impl DialogSurface for RecordingDialog {
        fn present(&mut self, dialog: &InfoDialog) {
            self.presented
                .push((dialog.title().to_string(), dialog.is_visible()));
        }
    }

    type TestController = SelectionController<RecordingSurface, RecordingDialog>;

    fn controller(config: ViewerConfig, missing: &[&str]) -> (TestController, Vec<ControlState>) {
        let catalog = config.validate().expect("valid config");
        let fetcher = FakeFetcher::india_without(missing);
        let outcomes = block_on(load_regions(&fetcher, &catalog));
        let mut controller = SelectionController::new(
            &config,
            catalog,
            RecordingSurface::default(),
            RecordingDialog::default(),
        );
        let controls = controller.install(outcomes);
        controller.surface.calls.clear();
        (controller, controls)
    }

    fn keys(names: &[&str]) -> Vec<RegionKey> {
        names.iter().map(|n| RegionKey::new(*n)).collect()
    }

    #[test]
    fn isolate_starts_on_the_national_outline_without_a_dialog() {
        let (controller, controls) = controller(ViewerConfig::india_raster(), &[]);
        assert_eq!(
            controller.selection(),
            &Selection::Region(RegionKey::new("india"))
        );
        assert_eq!(controller.visible(), keys(&["india"]).as_slice());
        assert!(!controller.dialog().is_visible());
        assert!(controls.iter().all(|c| c.enabled));
        assert_eq!(controls.iter().filter(|c| c.checked).count(), 1);
        assert!(controls[0].checked);
    }

    #[test]
    fn selecting_madhya_pradesh_isolates_it() {
        let (mut controller, _) = controller(ViewerConfig::india_raster(), &[]);
        let mp = RegionKey::new("madhya-pradesh");
        controller.on_select(&mp).expect("loaded region");

        assert_eq!(controller.visible(), keys(&["madhya-pradesh"]).as_slice());
        assert_eq!(controller.surface().shown, keys(&["madhya-pradesh"]));
        assert_eq!(
            controller.surface().fits(),
            vec![&GeoBounds::new(74.0, 21.07, 82.82, 26.87)]
        );
        assert!(controller.dialog().is_visible());
        assert_eq!(controller.dialog().title(), "Madhya Pradesh");
        assert!(controller
            .dialog()
            .content()
            .text
            .starts_with("Madhya Pradesh \u{2014} central Indian state."));
        assert_eq!(controller.dialog_surface.presented.len(), 1);
    }

    #[test]
    fn selecting_twice_shows_the_same_content() {
        let (mut controller, _) = controller(ViewerConfig::india_raster(), &[]);
        let odisha = RegionKey::new("odisha");
        controller.on_select(&odisha).expect("first");
        let first = controller.dialog().clone();
        controller.on_select(&odisha).expect("second");

        assert_eq!(controller.dialog().title(), first.title());
        assert_eq!(controller.dialog().content(), first.content());
        assert_eq!(controller.visible(), keys(&["odisha"]).as_slice());
        assert_eq!(controller.surface().shown, keys(&["odisha"]));
    }

    #[test]
    fn unreachable_region_is_disabled_and_unregistered() {
        let (mut controller, controls) =
            controller(ViewerConfig::india_raster(), &["tripura.geojson"]);
        let tripura = controls
            .iter()
            .find(|c| c.key.as_str() == "tripura")
            .expect("control present");
        assert!(!tripura.enabled);
        assert_eq!(
            tripura.note.as_deref(),
            Some("Could not load tripura.geojson: Failed to load tripura.geojson (404)")
        );
        assert_eq!(controls.iter().filter(|c| c.enabled).count(), 4);
        assert!(!controller.registry().contains(&RegionKey::new("tripura")));

        let before = controller.visible().to_vec();
        assert!(controller.on_select(&RegionKey::new("tripura")).is_err());
        assert_eq!(controller.visible(), before.as_slice());
        assert!(!controller.dialog().is_visible());
    }

    #[test]
    fn national_overlay_keeps_the_outline_under_the_isolated_state() {
        let (mut controller, controls) = controller(ViewerConfig::india_vector(), &[]);
        assert_eq!(controller.selection(), &Selection::All);
        assert_eq!(
            controller.visible(),
            keys(&["india", "madhya-pradesh", "odisha", "tripura", "telangana"]).as_slice()
        );
        assert!(controls[0].checked);

        controller
            .on_select(&RegionKey::new("madhya-pradesh"))
            .expect("loaded region");
        assert_eq!(
            controller.visible(),
            keys(&["india", "madhya-pradesh"]).as_slice()
        );
        assert_eq!(
            controller.surface().shown,
            keys(&["india", "madhya-pradesh"])
        );
        assert_eq!(controller.dialog().title(), "Madhya Pradesh");

        controller.on_select(&RegionKey::new("india")).expect("all");
        assert_eq!(controller.selection(), &Selection::All);
        assert_eq!(controller.visible().len(), 5);
        assert_eq!(controller.dialog().title(), "India (All States)");
    }

    #[test]
    fn add_once_leaves_persistent_layers_alone() {
        let (mut controller, _) = controller(ViewerConfig::india_vector(), &[]);
        controller.on_select(&RegionKey::new("odisha")).expect("odisha");
        assert!(!controller
            .surface()
            .calls
            .iter()
            .any(|c| matches!(c, Call::Show(k) | Call::Hide(k) if k == "india")));
    }

    #[test]
    fn always_refresh_re_adds_persistent_layers() {
        let mut config = ViewerConfig::india_vector();
        config.source_policy = SourcePolicy::AlwaysRefresh;
        let (mut controller, _) = controller(config, &[]);
        controller.on_select(&RegionKey::new("odisha")).expect("odisha");

        let calls = &controller.surface().calls;
        let hide = calls.iter().position(|c| c == &Call::Hide("india".into()));
        let show = calls.iter().position(|c| c == &Call::Show("india".into()));
        assert!(matches!((hide, show), (Some(h), Some(s)) if h < s));
        assert_eq!(controller.surface().shown, keys(&["india", "odisha"]));
    }

    #[test]
    fn click_opens_dialog_and_reverts_style_after_highlight() {
        let (mut controller, _) = controller(ViewerConfig::india_raster(), &[]);
        let india = RegionKey::new("india");
        let before = controller
            .registry()
            .get(&india)
            .and_then(|o| o.style(0))
            .cloned()
            .expect("style");

        let (key, feature) = controller.hit_test(80.0, 22.0).expect("inside india");
        let ticket = controller.on_feature_click(&key, feature).expect("click");
        assert_eq!(controller.selection(), &Selection::Region(india.clone()));
        assert_eq!(controller.dialog().title(), "India (All States)");
        assert!(controller.dialog().content().properties.is_empty());
        assert!(matches!(
            controller.surface().calls.last(),
            Some(Call::Restyle(k, 0, style)) if k == "india" && style.weight == 3.0
        ));

        controller.on_highlight_elapsed(&ticket);
        assert_eq!(
            controller.surface().calls.last(),
            Some(&Call::Restyle("india".into(), 0, before.clone()))
        );
        assert_eq!(
            controller.registry().get(&india).and_then(|o| o.style(0)),
            Some(&before)
        );
    }

    #[test]
    fn highlight_elapsing_while_hidden_is_undone_when_shown_again() {
        let (mut controller, _) = controller(ViewerConfig::india_vector(), &[]);
        let odisha = RegionKey::new("odisha");
        let before = controller
            .registry()
            .get(&odisha)
            .and_then(|o| o.style(0))
            .cloned()
            .expect("style");

        let ticket = controller.on_feature_click(&odisha, 0).expect("click");
        assert_eq!(controller.surface().painted[&odisha][0].weight, 3.0);

        controller
            .on_select(&RegionKey::new("telangana"))
            .expect("telangana");
        assert!(!controller.visible().contains(&odisha));
        controller.on_highlight_elapsed(&ticket);
        assert_eq!(controller.surface().painted[&odisha][0].weight, 3.0);

        controller.on_select(&RegionKey::new("india")).expect("all");
        assert_eq!(controller.selection(), &Selection::All);
        assert_eq!(controller.surface().painted[&odisha][0], before);
    }

    #[test]
    fn overlay_variant_click_lists_feature_properties() {
        let (mut controller, _) = controller(ViewerConfig::india_vector(), &[]);
        let (key, feature) = controller.hit_test(91.5, 23.5).expect("inside tripura");
        assert_eq!(key.as_str(), "tripura");
        controller.on_feature_click(&key, feature).expect("click");

        let mut lines = controller.dialog().content().properties.clone();
        lines.sort();
        assert_eq!(lines, vec!["code: 7", "name: shape"]);
        assert_eq!(controller.dialog().title(), "Tripura");
    }

    #[test]
    fn escape_only_dismisses_in_isolate_variant() {
        let (mut raster, _) = controller(ViewerConfig::india_raster(), &[]);
        raster.on_select(&RegionKey::new("odisha")).expect("odisha");
        assert!(raster.on_dialog_dismiss(DismissTrigger::Escape));
        assert!(!raster.dialog().is_visible());
        assert!(!raster.on_dialog_dismiss(DismissTrigger::CloseControl));

        let (mut vector, _) = controller(ViewerConfig::india_vector(), &[]);
        vector.on_select(&RegionKey::new("odisha")).expect("odisha");
        assert!(!vector.on_dialog_dismiss(DismissTrigger::Escape));
        assert!(vector.dialog().is_visible());
        assert!(vector.on_dialog_dismiss(DismissTrigger::Backdrop));
        assert_eq!(
            vector.dialog_surface.presented.last(),
            Some(&("Odisha".to_string(), false))
        );
    }

    #[test]
    fn fit_flag_off_skips_viewport_change() {
        let mut config = ViewerConfig::india_raster();
        config.regions[4].fit_bounds = false;
        let (mut controller, _) = controller(config, &[]);
        controller
            .on_select(&RegionKey::new("telangana"))
            .expect("telangana");
        assert!(controller.surface().fits().is_empty());
        assert_eq!(controller.visible(), keys(&["telangana"]).as_slice());
    }

    #[test]
    fn fatal_error_opens_load_error_dialog() {
        let (mut controller, _) = controller(ViewerConfig::india_raster(), &[]);
        controller.report_fatal(&ViewerError::Wasm("No window".to_string()));
        assert_eq!(controller.dialog().title(), LOAD_ERROR_TITLE);
        assert_eq!(controller.dialog().content().text, LOAD_ERROR_BODY);
    }

    #[test]
    fn isolate_without_national_outline_starts_empty() {
        let (controller, controls) =
            controller(ViewerConfig::india_raster(), &["india.geojson"]);
        assert_eq!(controller.selection(), &Selection::None);
        assert!(controller.visible().is_empty());
        assert!(controls.iter().all(|c| !c.checked));
    }

    #[test]
    fn nothing_loaded_reports_a_single_load_error() {
        let all = [
            "india.geojson",
            "madhya-pradesh.geojson",
            "odisha.geojson",
            "tripura.geojson",
            "telangana.geojson",
        ];
        let (controller, controls) = controller(ViewerConfig::india_raster(), &all);
        assert!(controls.iter().all(|c| !c.enabled));
        assert_eq!(controller.dialog().title(), LOAD_ERROR_TITLE);
        assert_eq!(controller.dialog_surface.presented.len(), 1);
    }
}
