/// Attribute naming used by a view model. The defaults match the markup
/// conventions `ft-view-model`, `ft-foreach-*` and `hidden`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingOptions {
    pub(crate) root_marker: String,
    pub(crate) foreach_class_prefix: String,
    pub(crate) hidden_attr: String,
}

impl Default for BindingOptions {
    fn default() -> Self {
        Self {
            root_marker: "ft-view-model".to_string(),
            foreach_class_prefix: "ft-foreach".to_string(),
            hidden_attr: "hidden".to_string(),
        }
    }
}

impl BindingOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attribute whose value names the view model owning an element.
    pub fn root_marker(mut self, marker: impl Into<String>) -> Self {
        self.root_marker = marker.into();
        self
    }

    pub fn foreach_class_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.foreach_class_prefix = prefix.into();
        self
    }

    /// Attribute set on foreach templates and stripped from their clones.
    pub fn hidden_attr(mut self, attr: impl Into<String>) -> Self {
        self.hidden_attr = attr.into();
        self
    }

    pub fn root_marker_name(&self) -> &str {
        &self.root_marker
    }

    pub fn foreach_class_prefix_name(&self) -> &str {
        &self.foreach_class_prefix
    }

    pub fn hidden_attr_name(&self) -> &str {
        &self.hidden_attr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setters_chain_over_defaults() {
        let options = BindingOptions::new()
            .root_marker("data-vm")
            .hidden_attr("aria-hidden");
        assert_eq!(options.root_marker_name(), "data-vm");
        assert_eq!(options.foreach_class_prefix_name(), "ft-foreach");
        assert_eq!(options.hidden_attr_name(), "aria-hidden");
    }
}
