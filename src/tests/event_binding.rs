use super::*;

#[test]
fn click_dispatches_handler_with_argument_evaluated_at_fire_time() -> Result<()> {
    let html = r#"
        <div ft-view-model='vm'>
          <button id='save' vm-event-bind='click::save($vm.model.id), dblclick::reset'>Save</button>
        </div>
        "#;

    let calls = Calls::default();
    let mut doc = Document::from_html(html)?;
    let mut vm = ViewModel::new(&mut doc, "vm", literal("{ id: 1 }"))?
        .with_handler(recording_handler(&calls));
    vm.model().set("id", Value::from(7))?;

    vm.click(&mut doc, "#save")?;
    let save = doc.select_one("#save")?;
    vm.dispatch(&mut doc, save, "dblclick")?;

    assert_eq!(
        *calls.borrow(),
        vec![
            ("save".to_string(), Value::from(7)),
            ("reset".to_string(), Value::Undefined),
        ]
    );
    Ok(())
}

#[test]
fn default_handler_reports_unimplemented_handlers() -> Result<()> {
    let html = "<div ft-view-model='vm'><button id='b' vm-event-bind='click::archive'></button></div>";
    let mut doc = Document::from_html(html)?;
    let mut vm = ViewModel::new(&mut doc, "vm", Value::empty_object())?;
    assert_eq!(
        vm.click(&mut doc, "#b"),
        Err(Error::HandlerNotImplemented("archive".into()))
    );
    Ok(())
}

#[test]
fn rebinding_the_same_element_keeps_a_single_listener() -> Result<()> {
    let html = "<div ft-view-model='vm'><button id='b' vm-event-bind='click::hit'></button></div>";
    let calls = Calls::default();
    let mut doc = Document::from_html(html)?;
    let _first = ViewModel::new(&mut doc, "vm", Value::empty_object())?;
    let mut vm = ViewModel::new(&mut doc, "vm", Value::empty_object())?
        .with_handler(recording_handler(&calls));
    vm.render(&mut doc)?;
    vm.render(&mut doc)?;

    let button = doc.select_one("#b")?;
    assert_eq!(doc.listener_count(button), 1);
    vm.click(&mut doc, "#b")?;
    assert_eq!(calls.borrow().len(), 1);
    Ok(())
}

#[test]
fn events_bubble_through_bound_ancestors() -> Result<()> {
    let html = r#"
        <div ft-view-model='vm'>
          <section id='outer' vm-event-bind='click::outer'>
            <button id='inner' vm-event-bind='click::inner'></button>
          </section>
        </div>
        "#;

    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&seen);
    let mut doc = Document::from_html(html)?;
    let mut vm = ViewModel::new(&mut doc, "vm", Value::empty_object())?.with_handler(handler_fn(
        move |_ctx, event: &Event, handler, _arg| {
            log.borrow_mut()
                .push((handler.to_string(), event.target, event.current_target));
            Ok(())
        },
    ));

    vm.click(&mut doc, "#inner")?;
    let inner = doc.select_one("#inner")?;
    let outer = doc.select_one("#outer")?;
    assert_eq!(
        *seen.borrow(),
        vec![
            ("inner".to_string(), inner, inner),
            ("outer".to_string(), inner, outer),
        ]
    );
    Ok(())
}

#[test]
fn handler_requested_render_refreshes_the_view() -> Result<()> {
    let html = r#"
        <div ft-view-model='counter'>
          <p id='count' counter-content-bind='$vm.model.count'></p>
          <button id='inc' counter-event-bind='click::increment(2)'></button>
        </div>
        "#;

    let mut doc = Document::from_html(html)?;
    let mut vm = ViewModel::new(&mut doc, "counter", literal("{ count: 0 }"))?.with_handler(
        handler_fn(|ctx, _event, handler, arg| {
            assert_eq!(handler, "increment");
            let model = ctx.model();
            let next = model.get("count").as_number() + arg.as_number();
            model.set("count", Value::from(next))?;
            ctx.request_render();
            Ok(())
        }),
    );
    vm.initialize(&mut doc)?;
    doc.assert_text("#count", "0")?;
    vm.click(&mut doc, "#inc")?;
    vm.click(&mut doc, "#inc")?;
    doc.assert_text("#count", "4")?;
    Ok(())
}

#[test]
fn handler_can_read_the_document() -> Result<()> {
    let html = r#"
        <div ft-view-model='vm'>
          <input id='query' value='rust'>
          <button id='go' vm-event-bind='click::search'></button>
          <p id='out' vm-content-bind='$vm.model.last'></p>
        </div>
        "#;

    let mut doc = Document::from_html(html)?;
    let mut vm = ViewModel::new(&mut doc, "vm", Value::empty_object())?.with_handler(handler_fn(
        |ctx, _event, _handler, _arg| {
            let query = ctx.document().value("#query")?;
            ctx.set_model(Value::object([("last", Value::from(query))]))
        },
    ));
    vm.click(&mut doc, "#go")?;
    doc.assert_text("#out", "rust")?;
    Ok(())
}

#[test]
fn malformed_event_bindings_are_skipped() -> Result<()> {
    let html = "<div ft-view-model='vm'><button id='b' vm-event-bind='click::bad handler(, focus::ok'></button></div>";
    let calls = Calls::default();
    let mut doc = Document::from_html(html)?;
    let mut vm = ViewModel::new(&mut doc, "vm", Value::empty_object())?
        .with_handler(recording_handler(&calls));
    let button = doc.select_one("#b")?;
    assert_eq!(doc.listener_count(button), 0);
    vm.click(&mut doc, "#b")?;
    assert!(calls.borrow().is_empty());
    Ok(())
}

#[test]
fn comma_separated_call_argument_passes_its_last_value() -> Result<()> {
    let html = r#"
        <ul ft-view-model='vm'>
          <li vm-foreach='$vm.model.items'><button vm-event-bind='click::remove($item.id, $i)'></button></li>
        </ul>
        "#;

    let calls = Calls::default();
    let mut doc = Document::from_html(html)?;
    let mut vm = ViewModel::new(&mut doc, "vm", literal("{ items: [{ id: 10 }, { id: 20 }] }"))?
        .with_handler(recording_handler(&calls));
    vm.render(&mut doc)?;

    let buttons = doc.query_selector_all("li button")?;
    assert_eq!(buttons.len(), 3);
    vm.dispatch(&mut doc, buttons[2], "click")?;
    assert_eq!(*calls.borrow(), vec![("remove".to_string(), Value::from(1))]);
    Ok(())
}
