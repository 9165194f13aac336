use super::*;

const LIST_HTML: &str = r#"
    <ul id='list' ft-view-model='vm'>
      <li class='row' vm-foreach='$vm.model.items'
          vm-attr-bind='data-index::$i'
          vm-content-bind='$item.name'
          vm-event-bind='click::pick($item.name)'></li>
      <li id='footer'>end</li>
    </ul>
    "#;

fn list_vm(doc: &mut Document, items: &str, calls: &Calls) -> Result<ViewModel> {
    let model = Value::object([("items", literal(items))]);
    let mut vm = ViewModel::new(doc, "vm", model)?.with_handler(recording_handler(calls));
    vm.initialize(doc)?;
    Ok(vm)
}

#[test]
fn clones_follow_the_template_in_iteration_order() -> Result<()> {
    let calls = Calls::default();
    let mut doc = Document::from_html(LIST_HTML)?;
    let vm = list_vm(&mut doc, r#"[{ name: "x" }, { name: "y" }, { name: "z" }]"#, &calls)?;

    let rows = doc.query_selector_all("#list > li")?;
    let clones = vm.clone_group(&doc, "$vm.model.items")?;
    assert_eq!(rows.len(), 5);
    assert_eq!(&rows[1..4], clones.as_slice());
    assert_eq!(texts(&doc, &clones), vec!["x", "y", "z"]);
    let indexes: Vec<Option<String>> = clones
        .iter()
        .map(|clone| doc.node_attr(*clone, "data-index"))
        .collect();
    assert_eq!(
        indexes,
        vec![Some("0".into()), Some("1".into()), Some("2".into())]
    );
    doc.assert_text("#footer", "end")?;
    Ok(())
}

#[test]
fn replacing_the_iterable_replaces_the_whole_group() -> Result<()> {
    let calls = Calls::default();
    let mut doc = Document::from_html(LIST_HTML)?;
    let mut vm = list_vm(&mut doc, r#"[{ name: "x" }, { name: "y" }, { name: "z" }]"#, &calls)?;
    let old = vm.clone_group(&doc, "$vm.model.items")?;

    vm.model().set("items", literal(r#"[{ name: "q" }]"#))?;
    vm.render(&mut doc)?;

    let new = vm.clone_group(&doc, "$vm.model.items")?;
    assert_eq!(texts(&doc, &new), vec!["q"]);
    assert!(old.iter().all(|node| !doc.is_connected(*node)));
    assert!(new.iter().all(|node| !old.contains(node)));
    Ok(())
}

#[test]
fn falsy_or_non_array_iterables_keep_the_previous_group() -> Result<()> {
    let calls = Calls::default();
    let mut doc = Document::from_html(LIST_HTML)?;
    let mut vm = list_vm(&mut doc, r#"[{ name: "x" }, { name: "y" }]"#, &calls)?;
    let before = vm.clone_group(&doc, "$vm.model.items")?;

    for replacement in ["null", "0", r#""text""#, "{ length: 1 }"] {
        vm.model().set("items", literal(replacement))?;
        vm.render(&mut doc)?;
        assert_eq!(vm.clone_group(&doc, "$vm.model.items")?, before, "{replacement}");
    }

    vm.model().set("items", literal("[]"))?;
    vm.render(&mut doc)?;
    assert!(vm.clone_group(&doc, "$vm.model.items")?.is_empty());
    Ok(())
}

#[test]
fn clone_listeners_capture_their_item_and_are_purged_on_rebuild() -> Result<()> {
    let calls = Calls::default();
    let mut doc = Document::from_html(LIST_HTML)?;
    let mut vm = list_vm(&mut doc, r#"[{ name: "x" }, { name: "y" }, { name: "z" }]"#, &calls)?;
    assert_eq!(doc.total_listener_count(), 3);

    let clones = vm.clone_group(&doc, "$vm.model.items")?;
    vm.dispatch(&mut doc, clones[1], "click")?;
    assert_eq!(*calls.borrow(), vec![("pick".to_string(), Value::from("y"))]);

    vm.model().set("items", literal(r#"[{ name: "only" }]"#))?;
    vm.render(&mut doc)?;
    assert_eq!(doc.total_listener_count(), 1);
    for stale in clones {
        assert_eq!(doc.listener_count(stale), 0);
    }
    Ok(())
}

#[test]
fn template_listeners_are_not_installed() -> Result<()> {
    let calls = Calls::default();
    let mut doc = Document::from_html(LIST_HTML)?;
    let mut vm = list_vm(&mut doc, "[]", &calls)?;
    let template = doc.select_one("li[vm-foreach]")?;
    assert_eq!(doc.listener_count(template), 0);
    vm.dispatch(&mut doc, template, "click")?;
    assert!(calls.borrow().is_empty());
    Ok(())
}

#[test]
fn nested_templates_render_inside_each_clone() -> Result<()> {
    let html = r#"
        <div ft-view-model='vm'>
          <section vm-foreach='$vm.model.groups'>
            <h2 vm-content-bind='$item.name'></h2>
            <span class='tag' vm-foreach='$item.tags' vm-content-bind='$item'></span>
          </section>
        </div>
        "#;

    let model = literal(r#"{ groups: [{ name: "a", tags: ["a1", "a2"] }, { name: "b", tags: ["b1"] }] }"#);
    let mut doc = Document::from_html(html)?;
    let mut vm = ViewModel::new(&mut doc, "vm", model)?;
    vm.render(&mut doc)?;

    let sections = vm.clone_group(&doc, "$vm.model.groups")?;
    assert_eq!(sections.len(), 2);
    let tags = vm.clone_group(&doc, "$item.tags")?;
    assert_eq!(texts(&doc, &tags), vec!["a1", "a2", "b1"]);

    let dump = doc.dump();
    vm.render(&mut doc)?;
    assert_eq!(doc.dump(), dump);
    Ok(())
}

#[test]
fn detached_templates_are_skipped() -> Result<()> {
    let mut doc = Document::from_html(LIST_HTML)?;
    let template = doc.select_one("li[vm-foreach]")?;
    let calls = Calls::default();
    let mut vm = list_vm(&mut doc, r#"[{ name: "x" }]"#, &calls)?;
    doc.dom.remove_node(template)?;
    vm.model().set("items", literal(r#"[{ name: "x" }, { name: "y" }]"#))?;
    vm.render(&mut doc)?;
    assert_eq!(vm.clone_group(&doc, "$vm.model.items")?.len(), 1);
    Ok(())
}

#[test]
fn user_classes_sharing_the_group_prefix_stay_bound() -> Result<()> {
    let html = r#"
        <div ft-view-model='app'>
          <h1 id='title' class='ft-foreach-title' app-content-bind='$vm.model.title'></h1>
          <ul>
            <li class='ft-foreach-row' app-foreach='$vm.model.items' app-content-bind='$item'></li>
            <li id='static' class='ft-foreach-row'>kept</li>
          </ul>
        </div>
        "#;

    let mut doc = Document::from_html(html)?;
    let mut vm = ViewModel::new(&mut doc, "app", literal(r#"{ title: "Hello", items: ["a", "b"] }"#))?;
    vm.render(&mut doc)?;
    doc.assert_text("#title", "Hello")?;

    vm.model().set("items", literal(r#"["c"]"#))?;
    vm.render(&mut doc)?;
    let clones = vm.clone_group(&doc, "$vm.model.items")?;
    assert_eq!(texts(&doc, &clones), vec!["c"]);
    doc.assert_text("#static", "kept")?;
    assert_eq!(doc.query_selector_all("ul > li")?.len(), 3);
    Ok(())
}
