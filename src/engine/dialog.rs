use crate::model::RegionInfo;

/// What closed (or tried to close) the dialog.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DismissTrigger {
    CloseControl,
    Backdrop,
    Escape,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DialogContent {
    pub text: String,
    /// `key: value` lines appended below the text.
    pub properties: Vec<String>,
}

impl DialogContent {
    pub fn text(text: impl Into<String>) -> Self {
        DialogContent {
            text: text.into(),
            properties: Vec::new(),
        }
    }

    pub fn with_properties(mut self, properties: Vec<String>) -> Self {
        self.properties = properties;
        self
    }
}

/// State of the single shared modal.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InfoDialog {
    title: String,
    content: DialogContent,
    visible: bool,
    shown: u64,
}

impl InfoDialog {
    /// Replaces title and content in place; there is never more than one dialog.
    pub fn show(&mut self, title: impl Into<String>, content: DialogContent) {
        self.title = title.into();
        self.content = content;
        self.visible = true;
        self.shown += 1;
    }

    pub fn show_info(&mut self, info: &RegionInfo) {
        self.show(info.title.clone(), DialogContent::text(info.body.clone()));
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn content(&self) -> &DialogContent {
        &self.content
    }

    /// Number of `show` calls so far.
    pub fn times_shown(&self) -> u64 {
        self.shown
    }
}

/// Renders dialog state somewhere a user can see it.
pub trait DialogSurface {
    fn present(&mut self, dialog: &InfoDialog);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_show_replaces_content() {
        let mut dialog = InfoDialog::default();
        assert!(!dialog.is_visible());

        dialog.show("Odisha", DialogContent::text("east"));
        dialog.show(
            "Tripura",
            DialogContent::text("north-east").with_properties(vec!["name: Tripura".into()]),
        );

        assert!(dialog.is_visible());
        assert_eq!(dialog.title(), "Tripura");
        assert_eq!(dialog.content().properties, vec!["name: Tripura"]);
        assert_eq!(dialog.times_shown(), 2);

        dialog.hide();
        assert!(!dialog.is_visible());
        assert_eq!(dialog.title(), "Tripura");
    }
}
