use super::*;
use crate::binding::Binding;
use crate::listeners::{Listener, ListenerAction, ListenerSlot};

/// A fired event as seen by a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub event_type: String,
    /// Element the event was fired on.
    pub target: NodeId,
    /// Element whose binding is being handled; an ancestor of `target` when
    /// the event bubbled.
    pub current_target: NodeId,
}

/// What a handler may touch while it runs: the `$vm` object, the document
/// (read only) and a flag asking for a render once the handler returns.
pub struct HandlerContext<'a> {
    name: &'a str,
    vm: &'a Value,
    document: &'a Document,
    render_requested: bool,
}

impl<'a> HandlerContext<'a> {
    pub(crate) fn new(name: &'a str, vm: &'a Value, document: &'a Document) -> Self {
        Self {
            name,
            vm,
            document,
            render_requested: false,
        }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    /// The model. Arrays and objects are shared, so mutating them through
    /// the returned value mutates the model.
    pub fn model(&self) -> Value {
        self.vm.get("model")
    }

    /// Replaces the model and requests a render.
    pub fn set_model(&mut self, model: Value) -> Result<()> {
        self.vm.set("model", model)?;
        self.render_requested = true;
        Ok(())
    }

    /// The object expressions see as `$vm`.
    pub fn vm(&self) -> &Value {
        self.vm
    }

    pub fn document(&self) -> &Document {
        self.document
    }

    /// Asks the view model to render after the handler returns.
    pub fn request_render(&mut self) {
        self.render_requested = true;
    }

    pub fn render_requested(&self) -> bool {
        self.render_requested
    }
}

/// Application behavior behind `<name>-event-bind` handlers.
pub trait EventHandler {
    /// Called once by [`ViewModel::initialize`] before the first render.
    fn on_init(&mut self, ctx: &mut HandlerContext<'_>) -> Result<()> {
        let _ = ctx;
        Ok(())
    }

    /// Called for every bound event. `arg` is the evaluated argument of
    /// `handler(arg)`, or `undefined` when the binding has none.
    fn on_event(
        &mut self,
        ctx: &mut HandlerContext<'_>,
        event: &Event,
        handler: &str,
        arg: Value,
    ) -> Result<()> {
        let _ = (ctx, event, arg);
        Err(Error::HandlerNotImplemented(handler.to_string()))
    }
}

/// Handler used until one is supplied; every event fails with
/// [`Error::HandlerNotImplemented`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHandler;

impl EventHandler for NoHandler {}

/// Adapts a closure into an [`EventHandler`].
pub struct FnHandler<F> {
    on_event: F,
}

impl<F> EventHandler for FnHandler<F>
where
    F: FnMut(&mut HandlerContext<'_>, &Event, &str, Value) -> Result<()>,
{
    fn on_event(
        &mut self,
        ctx: &mut HandlerContext<'_>,
        event: &Event,
        handler: &str,
        arg: Value,
    ) -> Result<()> {
        (self.on_event)(ctx, event, handler, arg)
    }
}

pub fn handler_fn<F>(on_event: F) -> FnHandler<F>
where
    F: FnMut(&mut HandlerContext<'_>, &Event, &str, Value) -> Result<()>,
{
    FnHandler { on_event }
}

impl ViewModel {
    /// `<name>-event-bind="event::handler[(arg)], ..."`. Each entry installs
    /// one listener, replacing the previous one for the same event.
    pub(super) fn bind_events(
        &mut self,
        doc: &mut Document,
        node: NodeId,
        scope: Option<&ItemScope>,
    ) -> Result<()> {
        let Some(raw) = doc.dom.attr(node, &self.attr_name(BindingKind::Event)) else {
            return Ok(());
        };
        for parsed in Binding::parse_all(BindingKind::Event, &raw) {
            let call = parsed.and_then(|binding| {
                let (handler, arg) = self.patterns.handler_call(&binding.expression)?;
                Ok((binding.target.unwrap_or_default(), handler, arg))
            });
            let (event, handler, arg) = match call {
                Ok(call) => call,
                Err(err) => {
                    self.skip_malformed(node, BindingKind::Event, &err);
                    continue;
                }
            };
            let listener = Listener {
                owner: self.name.clone(),
                slot: ListenerSlot::Event(event.clone()),
                action: ListenerAction::Dispatch { handler, arg },
                scope: scope.cloned(),
            };
            let replaced = doc.listeners.install(node, &event, listener);
            trace!(target: "bindery::events", node = %node, event = %event, replaced, "event listener installed");
        }
        Ok(())
    }

    /// Fires `event_type` on `target`. The event bubbles through the
    /// target's ancestors, running this view model's listeners on each; a
    /// render follows when a write-back ran or a handler asked for one.
    ///
    /// A failing listener does not stop the others or the render. The first
    /// error is returned once the render is done.
    pub fn dispatch(&mut self, doc: &mut Document, target: NodeId, event_type: &str) -> Result<()> {
        if !doc.dom.is_valid_node(target) {
            return Err(Error::InvalidTree(format!("unknown node: {target}")));
        }
        let mut path = vec![target];
        let mut cursor = doc.dom.parent(target);
        while let Some(node) = cursor {
            path.push(node);
            cursor = doc.dom.parent(node);
        }

        let mut render = false;
        let mut first_err = None;
        for current_target in path {
            for listener in doc.listeners.matching(current_target, &self.name, event_type) {
                let event = Event {
                    event_type: event_type.to_string(),
                    target,
                    current_target,
                };
                let outcome = match &listener.action {
                    ListenerAction::Dispatch { handler, arg } => self.run_handler(
                        doc,
                        &event,
                        handler,
                        arg.as_deref(),
                        listener.scope.as_ref(),
                    ),
                    // Written back from the element the event started on.
                    ListenerAction::WriteBack { property, path } => self.write_back(
                        doc,
                        target,
                        *property,
                        path,
                        listener.scope.as_ref(),
                    ),
                };
                match outcome {
                    Ok(requested) => render |= requested,
                    Err(err) => {
                        warn!(
                            target: "bindery::events",
                            vm = %self.name,
                            event = event_type,
                            node = %current_target,
                            error = %err,
                            "listener failed"
                        );
                        first_err.get_or_insert(err);
                    }
                }
            }
        }
        if render {
            self.render(doc)?;
        }
        first_err.map_or(Ok(()), Err)
    }

    fn run_handler(
        &mut self,
        doc: &Document,
        event: &Event,
        handler: &str,
        arg: Option<&str>,
        scope: Option<&ItemScope>,
    ) -> Result<bool> {
        let arg = match arg {
            Some(src) => {
                let scope = match scope {
                    Some(item) => item.scope.clone(),
                    None => self.root_scope(),
                };
                self.evaluate_binding(src, &scope, event.current_target)
            }
            None => Value::Undefined,
        };
        debug!(
            target: "bindery::events",
            vm = %self.name,
            event = %event.event_type,
            handler,
            node = %event.current_target,
            "dispatching event"
        );
        let mut ctx = HandlerContext::new(&self.name, &self.vm, doc);
        self.handler.on_event(&mut ctx, event, handler, arg)?;
        Ok(ctx.render_requested())
    }

    /// Clicks the first element matching `selector`.
    pub fn click(&mut self, doc: &mut Document, selector: &str) -> Result<()> {
        let target = doc.select_one(selector)?;
        self.dispatch(doc, target, "click")
    }

    /// Sets the value of a text control and fires `input`, as typing does.
    pub fn type_text(&mut self, doc: &mut Document, selector: &str, text: &str) -> Result<()> {
        let target = doc.select_one(selector)?;
        doc.dom.set_value(target, text)?;
        self.dispatch(doc, target, "input")
    }

    /// Sets the value of a control and fires `input` then `change`.
    pub fn change_value(&mut self, doc: &mut Document, selector: &str, value: &str) -> Result<()> {
        let target = doc.select_one(selector)?;
        doc.dom.set_value(target, value)?;
        self.dispatch(doc, target, "input")?;
        self.dispatch(doc, target, "change")
    }

    /// Sets a checkbox state and fires `input` then `change`.
    pub fn set_checked(&mut self, doc: &mut Document, selector: &str, checked: bool) -> Result<()> {
        let target = doc.select_one(selector)?;
        doc.dom.set_checked(target, checked)?;
        self.dispatch(doc, target, "input")?;
        self.dispatch(doc, target, "change")
    }
}
