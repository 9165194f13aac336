use super::*;
use super::content::set_inner_markup;
use crate::binding::Binding;
use crate::dom::Flag;

/// Element properties reachable from `<name>-js-bind`. Names are matched
/// exactly as they appear in bindings (`readOnly`, `innerHTML`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementProperty {
    Value,
    Checked,
    Disabled,
    ReadOnly,
    Required,
    Hidden,
    TextContent,
    InnerHtml,
    ClassName,
    Id,
}

impl ElementProperty {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "value" => Self::Value,
            "checked" => Self::Checked,
            "disabled" => Self::Disabled,
            "readOnly" => Self::ReadOnly,
            "required" => Self::Required,
            "hidden" => Self::Hidden,
            "textContent" => Self::TextContent,
            "innerHTML" => Self::InnerHtml,
            "className" => Self::ClassName,
            "id" => Self::Id,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Value => "value",
            Self::Checked => "checked",
            Self::Disabled => "disabled",
            Self::ReadOnly => "readOnly",
            Self::Required => "required",
            Self::Hidden => "hidden",
            Self::TextContent => "textContent",
            Self::InnerHtml => "innerHTML",
            Self::ClassName => "className",
            Self::Id => "id",
        }
    }

    pub fn is_boolean(self) -> bool {
        matches!(
            self,
            Self::Checked | Self::Disabled | Self::ReadOnly | Self::Required | Self::Hidden
        )
    }

    fn flag(self) -> Option<Flag> {
        match self {
            Self::Checked => Some(Flag::Checked),
            Self::Disabled => Some(Flag::Disabled),
            Self::ReadOnly => Some(Flag::ReadOnly),
            Self::Required => Some(Flag::Required),
            _ => None,
        }
    }

    /// Current live value, as written back into the model.
    pub(crate) fn read(self, dom: &Dom, node: NodeId) -> Result<Value> {
        if let Some(flag) = self.flag() {
            return Ok(Value::Bool(dom.flag(node, flag)?));
        }
        Ok(match self {
            Self::Value => Value::String(dom.value(node)?),
            Self::Hidden => Value::Bool(dom.has_attr(node, "hidden")),
            Self::TextContent => Value::String(dom.text_content(node)),
            Self::InnerHtml => Value::String(dom.inner_html(node)?),
            Self::ClassName => Value::String(dom.attr(node, "class").unwrap_or_default()),
            Self::Id => Value::String(dom.attr(node, "id").unwrap_or_default()),
            _ => Value::Undefined,
        })
    }

    /// Writes `value`. Boolean properties take its truthiness, the others
    /// its display string. Writing the current value changes nothing.
    pub(crate) fn write(self, dom: &mut Dom, node: NodeId, value: &Value) -> Result<()> {
        if let Some(flag) = self.flag() {
            return dom.set_flag(node, flag, value.truthy());
        }
        let text = value.display_string();
        match self {
            Self::Value => dom.set_value(node, &text),
            Self::Hidden if value.truthy() => dom.set_attr(node, "hidden", ""),
            Self::Hidden => dom.remove_attr(node, "hidden"),
            Self::TextContent => {
                if dom.text_content(node) != text {
                    dom.set_text_content(node, &text)?;
                }
                Ok(())
            }
            Self::InnerHtml => set_inner_markup(dom, node, &text),
            Self::ClassName => dom.set_attr(node, "class", &text),
            Self::Id => dom.set_attr(node, "id", &text),
            _ => Ok(()),
        }
    }
}

impl ViewModel {
    /// `<name>-js-bind="property::expr, ..."` assigns live element state.
    pub(super) fn bind_values(&mut self, dom: &mut Dom, node: NodeId, scope: &Scope) -> Result<()> {
        let Some(raw) = dom.attr(node, &self.attr_name(BindingKind::Value)) else {
            return Ok(());
        };
        for parsed in Binding::parse_all(BindingKind::Value, &raw) {
            let Some((property, binding)) = self.property_binding(node, parsed) else {
                continue;
            };
            let value = self.evaluate_binding(&binding.expression, scope, node);
            property.write(dom, node, &value)?;
        }
        Ok(())
    }

    /// Resolves the target of a parsed value binding against the property
    /// table. Malformed entries and unknown properties are logged and
    /// skipped.
    pub(super) fn property_binding(
        &self,
        node: NodeId,
        parsed: Result<Binding>,
    ) -> Option<(ElementProperty, Binding)> {
        let binding = match parsed {
            Ok(binding) => binding,
            Err(err) => {
                self.skip_malformed(node, BindingKind::Value, &err);
                return None;
            }
        };
        let name = binding.target.as_deref().unwrap_or_default();
        match ElementProperty::from_name(name) {
            Some(property) => Some((property, binding)),
            None => {
                let err = Error::BindingSyntax(format!("unknown element property `{name}`"));
                self.skip_malformed(node, BindingKind::Value, &err);
                None
            }
        }
    }
}
