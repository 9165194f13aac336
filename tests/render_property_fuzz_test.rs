use bindery::{Document, Value, ViewModel};
use proptest::collection::vec;
use proptest::prelude::*;
use proptest::test_runner::{FileFailurePersistence, TestCaseError, TestCaseResult};

const RENDER_PROPTEST_REGRESSION_FILE: &str =
    "tests/proptest-regressions/render_property_fuzz_test.txt";
const DEFAULT_RENDER_PROPTEST_CASES: u32 = 96;

const LIST_HTML: &str = r#"
<div ft-view-model='vm'>
  <h2 id='title' vm-attr-bind='title::$vm.model.title, data-flag::$vm.model.flag'
      vm-content-bind='$vm.model.title'></h2>
  <input id='name' vm-js-bind='value::$vm.model.title, disabled::$vm.model.flag'>
  <ul id='list'>
    <li vm-foreach='$vm.model.items'
        vm-attr-bind='data-i::$i'
        vm-content-bind='$item.label + ":" + $item.count'></li>
  </ul>
</div>
"#;

#[derive(Clone, Debug)]
struct Row {
    label: String,
    count: i32,
}

#[derive(Clone, Debug)]
enum ModelEdit {
    SetTitle(String),
    SetFlag(bool),
    ReplaceItems(Vec<Row>),
    PushItem(Row),
    Render,
}

fn env_proptest_cases(var_name: &str, default_cases: u32) -> u32 {
    std::env::var(var_name)
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default_cases)
}

fn render_proptest_cases() -> u32 {
    std::env::var("BINDERY_RENDER_PROPTEST_CASES")
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .filter(|value| *value > 0)
        .unwrap_or_else(|| {
            env_proptest_cases("BINDERY_PROPTEST_CASES", DEFAULT_RENDER_PROPTEST_CASES)
        })
}

fn text_strategy() -> BoxedStrategy<String> {
    vec(
        prop_oneof![
            Just('a'),
            Just('b'),
            Just('z'),
            Just('0'),
            Just('7'),
            Just(' '),
            Just('-'),
            Just('&'),
            Just('<'),
            Just('"'),
        ],
        0..=8,
    )
    .prop_map(|chars| chars.into_iter().collect())
    .boxed()
}

fn row_strategy() -> BoxedStrategy<Row> {
    (text_strategy(), -50..50i32)
        .prop_map(|(label, count)| Row { label, count })
        .boxed()
}

fn edit_strategy() -> BoxedStrategy<ModelEdit> {
    prop_oneof![
        3 => text_strategy().prop_map(ModelEdit::SetTitle),
        2 => any::<bool>().prop_map(ModelEdit::SetFlag),
        3 => vec(row_strategy(), 0..=6).prop_map(ModelEdit::ReplaceItems),
        2 => row_strategy().prop_map(ModelEdit::PushItem),
        1 => Just(ModelEdit::Render),
    ]
    .boxed()
}

fn row_value(row: &Row) -> Value {
    Value::object([
        ("label", Value::from(row.label.as_str())),
        ("count", Value::from(row.count)),
    ])
}

fn fail(err: bindery::Error) -> TestCaseError {
    TestCaseError::fail(format!("{err:?}"))
}

fn apply_edit(vm: &ViewModel, edit: &ModelEdit) -> bindery::Result<()> {
    let model = vm.model();
    match edit {
        ModelEdit::SetTitle(title) => model.set("title", Value::from(title.as_str())),
        ModelEdit::SetFlag(flag) => model.set("flag", Value::Bool(*flag)),
        ModelEdit::ReplaceItems(rows) => {
            model.set("items", Value::array(rows.iter().map(row_value).collect()))
        }
        ModelEdit::PushItem(row) => model.get("items").push(row_value(row)),
        ModelEdit::Render => Ok(()),
    }
}

fn assert_render_invariants(edits: &[ModelEdit]) -> TestCaseResult {
    let mut doc = Document::from_html(LIST_HTML).map_err(fail)?;
    let model = Value::from_literal(r#"{ title: "", flag: false, items: [] }"#).map_err(fail)?;
    let mut vm = ViewModel::new(&mut doc, "vm", model).map_err(fail)?;
    vm.initialize(&mut doc).map_err(fail)?;

    for (step, edit) in edits.iter().enumerate() {
        apply_edit(&vm, edit).map_err(fail)?;
        vm.render(&mut doc).map_err(fail)?;

        let items = vm.model().get("items").items().unwrap_or_default();
        let clones = vm.clone_group(&doc, "$vm.model.items").map_err(fail)?;
        prop_assert_eq!(
            clones.len(),
            items.len(),
            "clone count diverged at step {}: {:?}",
            step,
            edit
        );
        for (index, (clone, item)) in clones.iter().zip(&items).enumerate() {
            let expected = format!(
                "{}:{}",
                item.get("label").display_string(),
                item.get("count").display_string()
            );
            prop_assert_eq!(doc.node_text(*clone), expected);
            prop_assert_eq!(doc.node_attr(*clone, "data-i"), Some(index.to_string()));
        }
        prop_assert!(
            doc.assert_attr("li[vm-foreach]", "hidden", Some("")).is_ok(),
            "template visible after step {step}"
        );

        let dump = doc.dump();
        vm.render(&mut doc).map_err(fail)?;
        prop_assert_eq!(doc.dump(), dump, "second render changed the tree at step {}", step);
    }
    Ok(())
}

fn assert_static_render_is_idempotent(title: &str, flag: bool) -> TestCaseResult {
    let html = r#"
        <div ft-view-model='vm'>
          <p id='p' vm-attr-bind='title::$vm.model.title, hidden::$vm.model.flag'
             vm-content-bind='$vm.model.title'></p>
          <input id='i' type='checkbox' vm-js-bind='checked::$vm.model.flag, value::$vm.model.title'>
        </div>
        "#;
    let mut doc = Document::from_html(html).map_err(fail)?;
    let model = Value::object([
        ("title", Value::from(title)),
        ("flag", Value::Bool(flag)),
    ]);
    let mut vm = ViewModel::new(&mut doc, "vm", model).map_err(fail)?;
    vm.render(&mut doc).map_err(fail)?;
    let mutations = doc.mutation_count();
    vm.render(&mut doc).map_err(fail)?;
    prop_assert_eq!(doc.mutation_count(), mutations);
    prop_assert_eq!(doc.text("#p").map_err(fail)?, title.to_string());
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: render_proptest_cases(),
        failure_persistence: Some(Box::new(
            FileFailurePersistence::Direct(RENDER_PROPTEST_REGRESSION_FILE),
        )),
        .. ProptestConfig::default()
    })]

    #[test]
    fn foreach_group_tracks_the_iterable_across_edits(edits in vec(edit_strategy(), 1..=16)) {
        assert_render_invariants(&edits)?;
    }

    #[test]
    fn static_bindings_render_idempotently(title in text_strategy(), flag in any::<bool>()) {
        assert_static_render_is_idempotent(&title, flag)?;
    }
}
