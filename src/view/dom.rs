use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlElement, HtmlInputElement, HtmlLabelElement};

use crate::engine::{ControlState, DialogSurface, InfoDialog};
use crate::error::ViewerError;
use crate::model::{DomIds, ViewerResult};

pub fn document() -> ViewerResult<Document> {
    web_sys::window()
        .ok_or_else(|| ViewerError::Wasm("No window".to_string()))?
        .document()
        .ok_or_else(|| ViewerError::Wasm("No document".to_string()))
}

pub fn element_by_id<T: JsCast>(document: &Document, id: &str) -> ViewerResult<T> {
    document
        .get_element_by_id(id)
        .ok_or_else(|| ViewerError::Wasm(format!("Element #{} not found", id)))?
        .dyn_into::<T>()
        .map_err(|_| ViewerError::Wasm(format!("Element #{} has an unexpected type", id)))
}

fn create<T: JsCast>(document: &Document, tag: &str) -> ViewerResult<T> {
    document
        .create_element(tag)
        .map_err(|_| ViewerError::Wasm(format!("Could not create <{}>", tag)))?
        .dyn_into::<T>()
        .map_err(|_| ViewerError::Wasm(format!("<{}> has an unexpected type", tag)))
}

fn append(parent: &Element, child: &Element) -> ViewerResult<()> {
    parent
        .append_child(child)
        .map(|_| ())
        .map_err(|_| ViewerError::Wasm("Could not append element".to_string()))
}

/// The page's modal dialog: a backdrop element containing a title and a body.
pub struct DomDialog {
    document: Document,
    modal: HtmlElement,
    title: Element,
    body: Element,
}

impl DomDialog {
    pub fn from_document(document: &Document, ids: &DomIds) -> ViewerResult<Self> {
        Ok(DomDialog {
            document: document.clone(),
            modal: element_by_id(document, &ids.modal)?,
            title: element_by_id(document, &ids.modal_title)?,
            body: element_by_id(document, &ids.modal_body)?,
        })
    }

    pub fn modal(&self) -> &HtmlElement {
        &self.modal
    }

    fn render_body(&self, dialog: &InfoDialog) -> ViewerResult<()> {
        let content = dialog.content();
        if content.properties.is_empty() {
            self.body.set_text_content(Some(&content.text));
            return Ok(());
        }
        self.body.set_inner_html("");
        if !content.text.is_empty() {
            let text: Element = create(&self.document, "p")?;
            text.set_text_content(Some(&content.text));
            append(&self.body, &text)?;
        }
        let list: Element = create(&self.document, "div")?;
        list.set_class_name("feature-properties");
        for line in &content.properties {
            let row: Element = create(&self.document, "div")?;
            row.set_text_content(Some(line));
            append(&list, &row)?;
        }
        append(&self.body, &list)
    }
}

impl DialogSurface for DomDialog {
    fn present(&mut self, dialog: &InfoDialog) {
        if dialog.is_visible() {
            self.title.set_text_content(Some(dialog.title()));
            if let Err(e) = self.render_body(dialog) {
                tracing::warn!("Could not render dialog body: {}", e);
            }
        }
        let hidden = if dialog.is_visible() { "false" } else { "true" };
        if self.modal.set_attribute("aria-hidden", hidden).is_err() {
            tracing::warn!("Could not toggle dialog visibility");
        }
        if dialog.is_visible() {
            let _ = self.modal.focus();
        }
    }
}

/// Radio input and label built for one region.
pub struct RadioControl {
    pub state: ControlState,
    pub input: HtmlInputElement,
}

/// Appends one radio per region to the controls container. Disabled regions get a dimmed label
/// whose tooltip explains the failure.
pub fn build_controls(
    document: &Document,
    ids: &DomIds,
    controls: &[ControlState],
) -> ViewerResult<Vec<RadioControl>> {
    let container: Element = element_by_id(document, &ids.controls)?;
    let group: Element = create(document, "div")?;
    group.set_class_name("state-group");
    append(&container, &group)?;

    let mut radios = Vec::with_capacity(controls.len());
    for control in controls {
        let radio_id = format!("radio-{}", control.key);
        let input: HtmlInputElement = create(document, "input")?;
        input.set_type("radio");
        input.set_name(&ids.radio_group);
        input.set_id(&radio_id);
        input.set_value(control.key.as_str());
        input.set_class_name("state-radio");
        input.set_disabled(!control.enabled);
        input.set_checked(control.checked);

        let label: HtmlLabelElement = create(document, "label")?;
        label.set_html_for(&radio_id);
        label.set_text_content(Some(&control.label));
        if let Some(note) = &control.note {
            label.set_title(note);
            if let Err(e) = label.style().set_property("opacity", "0.6") {
                tracing::debug!("Could not dim label for {}: {:?}", control.key, e);
            }
        }

        append(&group, &input)?;
        append(&group, &label)?;
        radios.push(RadioControl {
            state: control.clone(),
            input,
        });
    }
    Ok(radios)
}

pub fn add_instructions(document: &Document, ids: &DomIds, text: &str) -> ViewerResult<()> {
    if text.is_empty() {
        return Ok(());
    }
    let container: Element = element_by_id(document, &ids.controls)?;
    let info: HtmlElement = create(document, "div")?;
    let style = info.style();
    for (property, value) in [("font-size", "0.9rem"), ("margin-left", "8px"), ("color", "#444")] {
        if let Err(e) = style.set_property(property, value) {
            tracing::debug!("Could not set instruction {}: {:?}", property, e);
        }
    }
    info.set_text_content(Some(text));
    append(&container, &info)
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use crate::engine::DialogContent;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    fn mount_modal(document: &Document) {
        let body = document.body().expect("body");
        body.set_inner_html(
            r#"<div id="modal" aria-hidden="true"><h2 id="modal-title"></h2><div id="modal-body"></div><button id="modal-close">x</button></div><div id="controls"></div>"#,
        );
    }

    #[wasm_bindgen_test]
    fn dialog_renders_title_body_and_properties() {
        let document = document().expect("document");
        mount_modal(&document);
        let mut dom = DomDialog::from_document(&document, &DomIds::default()).expect("dialog");

        let mut dialog = InfoDialog::default();
        dialog.show(
            "Tripura",
            DialogContent::text("north-east").with_properties(vec!["name: Tripura".to_string()]),
        );
        dom.present(&dialog);

        assert_eq!(dom.modal().get_attribute("aria-hidden").as_deref(), Some("false"));
        assert_eq!(dom.title.text_content().as_deref(), Some("Tripura"));
        assert_eq!(
            dom.body.text_content().as_deref(),
            Some("north-eastname: Tripura")
        );

        dialog.hide();
        dom.present(&dialog);
        assert_eq!(dom.modal().get_attribute("aria-hidden").as_deref(), Some("true"));
    }

    #[wasm_bindgen_test]
    fn failed_region_radio_is_disabled() {
        let document = document().expect("document");
        mount_modal(&document);
        let controls = vec![
            ControlState {
                key: "india".into(),
                label: "All India".to_string(),
                enabled: true,
                checked: true,
                note: None,
            },
            ControlState {
                key: "tripura".into(),
                label: "Tripura".to_string(),
                enabled: false,
                checked: false,
                note: Some("Could not load tripura.geojson: Failed to load tripura.geojson (404)".to_string()),
            },
        ];
        let radios = build_controls(&document, &DomIds::default(), &controls).expect("controls");
        assert_eq!(radios.len(), 2);
        assert!(radios[0].input.checked());
        assert!(radios[1].input.disabled());
        assert_eq!(radios[1].input.name(), "state");
        assert!(document.get_element_by_id("radio-tripura").is_some());
    }
}
