use std::rc::Rc;

use bindery::{
    Document, Error, Event, EventHandler, HandlerContext, PipeRegistry, Result, Value, ViewModel,
};

const TODO_HTML: &str = r#"
    <main ft-view-model='todo'>
      <h1 todo-content-bind='$vm.model.title::upper'></h1>
      <input id='draft' todo-js-bind='value::$vm.model.draft' todo-real-time-bind>
      <button id='add' todo-event-bind='click::add' todo-attr-bind='disabled::!$vm.model.draft'>Add</button>
      <ul id='items'>
        <li class='item' todo-foreach='$vm.model.items' todo-attr-bind='data-done::$item.done'>
          <input class='toggle' type='checkbox' todo-js-bind='checked::$item.done'>
          <span class='label' todo-content-bind='$item.text'></span>
          <button class='remove' todo-event-bind='click::remove($i)'>x</button>
        </li>
      </ul>
      <p id='summary' todo-content-bind='$vm.model.items.length + " left"'></p>
    </main>
    "#;

struct TodoHandler;

impl EventHandler for TodoHandler {
    fn on_event(
        &mut self,
        ctx: &mut HandlerContext<'_>,
        _event: &Event,
        handler: &str,
        arg: Value,
    ) -> Result<()> {
        let model = ctx.model();
        let items = model.get("items");
        match handler {
            "add" => {
                let text = model.get("draft");
                items.push(Value::object([("text", text), ("done", Value::Bool(false))]))?;
                model.set("draft", Value::from(""))?;
            }
            "remove" => {
                let mut remaining = items.items().unwrap_or_default();
                let index = arg.as_number() as usize;
                if index < remaining.len() {
                    remaining.remove(index);
                }
                model.set("items", Value::array(remaining))?;
            }
            other => return Err(Error::HandlerNotImplemented(other.to_string())),
        }
        ctx.request_render();
        Ok(())
    }
}

fn todo_app() -> Result<(Document, ViewModel)> {
    let mut pipes = PipeRegistry::new();
    pipes.register("upper", |s| s.to_uppercase());
    let mut doc = Document::from_html(TODO_HTML)?;
    let model = Value::from_literal(r#"{ title: "todo", draft: "", items: [] }"#)?;
    let mut vm = ViewModel::new(&mut doc, "todo", model)?
        .with_pipes(Rc::new(pipes))
        .with_handler(TodoHandler);
    vm.initialize(&mut doc)?;
    Ok((doc, vm))
}

fn labels(doc: &Document) -> Result<Vec<String>> {
    Ok(doc
        .query_selector_all("li.item span.label")?
        .into_iter()
        .skip(1)
        .map(|node| doc.node_text(node))
        .collect())
}

#[test]
fn adding_items_through_the_form_renders_rows() -> Result<()> {
    let (mut doc, mut vm) = todo_app()?;
    doc.assert_text("h1", "TODO")?;
    doc.assert_attr("#add", "disabled", Some("true"))?;
    doc.assert_text("#summary", "0 left")?;

    vm.type_text(&mut doc, "#draft", "milk")?;
    doc.assert_attr("#add", "disabled", None)?;
    vm.click(&mut doc, "#add")?;
    vm.type_text(&mut doc, "#draft", "eggs")?;
    vm.click(&mut doc, "#add")?;

    assert_eq!(labels(&doc)?, vec!["milk", "eggs"]);
    doc.assert_value("#draft", "")?;
    doc.assert_text("#summary", "2 left")?;
    Ok(())
}

#[test]
fn toggling_and_removing_rows_updates_the_model() -> Result<()> {
    let (mut doc, mut vm) = todo_app()?;
    for text in ["a", "b", "c"] {
        vm.type_text(&mut doc, "#draft", text)?;
        vm.click(&mut doc, "#add")?;
    }

    let toggles = doc.query_selector_all("input.toggle")?;
    doc.set_checked_node(toggles[2], true)?;
    vm.dispatch(&mut doc, toggles[2], "change")?;
    assert_eq!(vm.model().path("items.1.done"), Value::Bool(true));
    let rows = vm.clone_group(&doc, "$vm.model.items")?;
    assert_eq!(doc.node_attr(rows[1], "data-done").as_deref(), Some("true"));
    assert_eq!(doc.node_attr(rows[0], "data-done"), None);

    let removes = doc.query_selector_all("button.remove")?;
    vm.dispatch(&mut doc, removes[1], "click")?;
    assert_eq!(labels(&doc)?, vec!["b", "c"]);
    doc.assert_text("#summary", "2 left")?;
    assert_eq!(doc.total_listener_count(), 2 + 2 * 2);
    Ok(())
}

#[test]
fn unknown_handler_surfaces_from_dispatch() -> Result<()> {
    let html = "<div ft-view-model='todo'><button id='x' todo-event-bind='click::archive'></button></div>";
    let mut doc = Document::from_html(html)?;
    let mut vm = ViewModel::new(&mut doc, "todo", Value::empty_object())?.with_handler(TodoHandler);
    match vm.click(&mut doc, "#x") {
        Err(Error::HandlerNotImplemented(name)) => assert_eq!(name, "archive"),
        other => panic!("expected unimplemented handler, got: {other:?}"),
    }
    Ok(())
}
