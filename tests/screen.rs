use cgmath::{Point2, Vector2};
use perch::events::ScreenEvent;
use perch::{
    Action, ActionHandler, Component, Config, ContextData, GlobalContext, ListChange, NodeId, Rect,
    Renderer, RootContext, Screen, SetContext,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

#[derive(Debug, Default)]
struct Recorder {
    values: Vec<(NodeId, String, Option<Value>)>,
    changes: Vec<(NodeId, ListChange)>,
}

impl Recorder {
    fn last(&self, node: NodeId, property: &str) -> Option<Value> {
        self.values
            .iter()
            .rev()
            .find(|(n, p, _)| *n == node && p == property)
            .and_then(|(_, _, value)| value.clone())
    }
}

impl Renderer for Recorder {
    fn apply(&mut self, node: NodeId, property: &str, value: Option<&Value>) {
        self.values.push((node, property.to_owned(), value.cloned()));
    }

    fn list_changed(&mut self, list: NodeId, change: ListChange) {
        self.changes.push((list, change));
    }
}

/// Records every run and performs `{"setContext": ...}` actions.
#[derive(Debug, Default)]
struct Actions {
    runs: Vec<(NodeId, Vec<Action>)>,
}

impl ActionHandler for Actions {
    fn execute(&mut self, root: &RootContext, origin: NodeId, actions: &[Action]) {
        self.runs.push((origin, actions.to_vec()));
        for action in actions {
            if let Some(update) = action.get("setContext") {
                if let Ok(update) = serde_json::from_value::<SetContext>(update.clone()) {
                    root.set_context(origin, update);
                }
            }
        }
    }
}

type TestScreen = Screen<Recorder, Actions>;

fn mount(json: &str, global: GlobalContext, window: usize) -> TestScreen {
    let root = Component::from_json(json).unwrap();
    let config = Config {
        initial_window: window,
        ..Config::default()
    };
    Screen::new(&root, Recorder::default(), Actions::default(), global, config)
}

fn page_list(items: Value, list: Value) -> String {
    json!({
        "context": {"id": "page", "value": {"items": items}},
        "children": [{"list": list}]
    })
    .to_string()
}

fn vertical_scroll(list: NodeId, offset: f64) -> ScreenEvent {
    ScreenEvent::Scroll {
        list,
        viewport: Rect::new(Point2::new(0., offset), Vector2::new(320., 50.)),
        content: Vector2::new(320., 200.),
    }
}

#[test]
fn data_source_follows_a_root_replacement() {
    let json = r#"{
        "context": {"id": "initialContext", "value": ""},
        "children": [{
            "list": {
                "dataSource": "@{initialContext}",
                "template": {"properties": {"text": "@{item}"}}
            }
        }]
    }"#;
    let mut screen = mount(json, GlobalContext::new(), 10);
    let list = screen.list_nodes()[0];
    assert!(screen.list(list).unwrap().is_empty(), "a string is not a list");

    screen
        .update_context(list, SetContext::new("initialContext", json!(["a", "b"])).at("."))
        .unwrap();

    let view = screen.list(list).unwrap();
    assert_eq!(view.items(), &[json!("a"), json!("b")]);
    let contexts: Vec<ContextData> = view
        .cells()
        .filter_map(|(_, cell)| screen.context(cell))
        .collect();
    assert_eq!(
        contexts,
        vec![
            ContextData::new("item", json!("a")),
            ContextData::new("item", json!("b")),
        ]
    );
    let second = view.cell_at(1).unwrap();
    assert_eq!(screen.renderer().last(second, "text"), Some(json!("b")));
    assert_eq!(screen.renderer().changes, vec![(list, ListChange::Reloaded(2))]);
}

#[test]
fn clearing_forgets_item_contexts() {
    let json = page_list(
        json!(["a", "b", "c"]),
        json!({"dataSource": "@{page.items}", "template": {"properties": {"text": "@{item}"}}}),
    );
    let mut screen = mount(&json, GlobalContext::new(), 10);
    let list = screen.list_nodes()[0];
    let root = screen.root().unwrap();

    let first = screen.list(list).unwrap().cell_at(0).unwrap();
    screen
        .update_context(first, SetContext::new("item", json!("edited")))
        .unwrap();
    assert_eq!(screen.renderer().last(first, "text"), Some(json!("edited")));

    screen
        .update_context(root, SetContext::new("page", json!([])).at("items"))
        .unwrap();
    let view = screen.list(list).unwrap();
    assert_eq!(view.len(), 0);
    assert_eq!(view.cells().count(), 0);
    assert_eq!(
        screen.renderer().changes.last(),
        Some(&(list, ListChange::Removed(3)))
    );

    screen
        .update_context(root, SetContext::new("page", json!(["a", "b", "c"])).at("items"))
        .unwrap();
    let first = screen.list(list).unwrap().cell_at(0).unwrap();
    assert_eq!(screen.context(first), Some(ContextData::new("item", json!("a"))));
}

#[test]
fn revisited_items_get_their_context_back() {
    let json = page_list(
        json!(["a", "b", "c", "d", "e", "f"]),
        json!({"dataSource": "@{page.items}", "template": {"properties": {"text": "@{item}"}}}),
    );
    let mut screen = mount(&json, GlobalContext::new(), 1);
    let list = screen.list_nodes()[0];
    let events = screen.event_sender();

    let cell = screen.list(list).unwrap().cell_at(0).unwrap();
    screen
        .update_context(cell, SetContext::new("item", json!("edited")))
        .unwrap();

    events
        .send(ScreenEvent::VisibleRange { list, range: 5..6 })
        .unwrap();
    screen.poll();
    assert_eq!(screen.list(list).unwrap().cell_at(5), Some(cell), "the cell is recycled");
    assert_eq!(screen.context(cell), Some(ContextData::new("item", json!("f"))));

    events
        .send(ScreenEvent::VisibleRange { list, range: 0..1 })
        .unwrap();
    screen.poll();
    assert_eq!(screen.list(list).unwrap().cell_at(0), Some(cell));
    assert_eq!(screen.context(cell), Some(ContextData::new("item", json!("edited"))));
    assert_eq!(screen.renderer().last(cell, "text"), Some(json!("edited")));
    assert_eq!(screen.tree().len(), 3, "root, list and a single cell");
}

#[test]
fn scroll_end_fires_once_per_data_source() {
    let json = page_list(
        json!([1, 2, 3]),
        json!({
            "dataSource": "@{page.items}",
            "scrollThreshold": 80,
            "onScrollEnd": [{"_type": "loadMore"}],
            "template": {}
        }),
    );
    let mut screen = mount(&json, GlobalContext::new(), 10);
    let list = screen.list_nodes()[0];
    let root = screen.root().unwrap();

    screen.handle_event(vertical_scroll(list, 100.));
    assert!(screen.actions().runs.is_empty(), "75% is below the threshold");

    screen.handle_event(vertical_scroll(list, 110.));
    assert_eq!(screen.actions().runs, vec![(list, vec![json!({"_type": "loadMore"})])]);

    screen.handle_event(ScreenEvent::Frame);
    screen.handle_event(vertical_scroll(list, 150.));
    assert_eq!(screen.actions().runs.len(), 1);

    screen
        .update_context(root, SetContext::new("page", json!([1, 2, 3, 4, 5, 6])).at("items"))
        .unwrap();
    screen.handle_event(ScreenEvent::Frame);
    assert_eq!(
        screen.actions().runs.len(),
        1,
        "geometry measured against the old items does not count"
    );

    screen.handle_event(vertical_scroll(list, 150.));
    assert_eq!(screen.actions().runs.len(), 2);
}

#[test]
fn cells_leaving_the_window_stop_rendering() {
    let json = json!({
        "context": {"id": "page", "value": {"items": ["a", "b"], "title": "t0"}},
        "children": [{
            "list": {
                "dataSource": "@{page.items}",
                "useParentScroll": true,
                "template": {"properties": {"title": "@{page.title}", "user": "@{global.user}"}}
            }
        }]
    })
    .to_string();
    let mut screen = mount(&json, GlobalContext::new(), 2);
    let list = screen.list_nodes()[0];
    let root = screen.root().unwrap();
    assert!(screen.list(list).unwrap().uses_parent_scroll());
    let idle = screen.list(list).unwrap().cell_at(1).unwrap();
    assert_eq!(screen.manager().dependents(root), 3, "the data source and both cells");

    screen.handle_event(ScreenEvent::VisibleRange { list, range: 0..1 });
    assert_eq!(screen.list(list).unwrap().cell_at(1), None);
    assert_eq!(screen.manager().dependents(root), 2);
    assert_eq!(screen.manager().global_dependents(), 1);

    let applies = |screen: &TestScreen| {
        screen
            .renderer()
            .values
            .iter()
            .filter(|(node, _, _)| *node == idle)
            .count()
    };
    let before = applies(&screen);
    screen
        .update_context(root, SetContext::new("page", json!("t1")).at("title"))
        .unwrap();
    screen
        .update_context(root, SetContext::new("global", json!("Ana")).at("user"))
        .unwrap();
    assert_eq!(applies(&screen), before, "a pooled cell is not rendered");

    let shown = screen.list(list).unwrap().cell_at(0).unwrap();
    assert_eq!(screen.renderer().last(shown, "title"), Some(json!("t1")));
    assert_eq!(screen.renderer().last(shown, "user"), Some(json!("Ana")));

    screen.handle_event(ScreenEvent::VisibleRange { list, range: 0..2 });
    assert_eq!(screen.list(list).unwrap().cell_at(1), Some(idle));
    assert_eq!(screen.renderer().last(idle, "title"), Some(json!("t1")));
}

#[test]
fn empty_content_never_fires_scroll_end() {
    let json = page_list(
        json!([1]),
        json!({"dataSource": "@{page.items}", "onScrollEnd": ["load"], "template": {}}),
    );
    let mut screen = mount(&json, GlobalContext::new(), 10);
    let list = screen.list_nodes()[0];

    screen.handle_event(ScreenEvent::Scroll {
        list,
        viewport: Rect::zero(),
        content: Vector2::new(0., 0.),
    });
    assert!(screen.actions().runs.is_empty());
    assert!(!screen.list(list).unwrap().scroll_end_fired());
}

#[test]
fn on_init_waits_for_attachment_and_runs_once() {
    let json = page_list(
        json!([]),
        json!({
            "dataSource": "@{page.items}",
            "onInit": [{"setContext": {"contextId": "page", "path": "items", "value": ["x", "y"]}}],
            "template": {"properties": {"text": "@{item}"}}
        }),
    );
    let mut screen = mount(&json, GlobalContext::new(), 10);
    let list = screen.list_nodes()[0];
    assert!(screen.actions().runs.is_empty());

    let events = screen.event_sender();
    events.send(ScreenEvent::Attached(list)).unwrap();
    screen.poll();
    assert_eq!(screen.actions().runs.len(), 1);
    assert_eq!(screen.list(list).unwrap().items(), &[json!("x"), json!("y")]);

    for event in vec![
        ScreenEvent::Detached(list),
        ScreenEvent::Attached(list),
        ScreenEvent::Attached(list),
    ] {
        events.send(event).unwrap();
    }
    screen.poll();
    assert_eq!(screen.actions().runs.len(), 1);
    assert!(screen.list(list).unwrap().is_attached());
}

#[test]
fn unchanged_or_invalid_data_sources_are_ignored() {
    let json = page_list(
        json!(["a"]),
        json!({"dataSource": "@{page.items}", "template": {}}),
    );
    let mut screen = mount(&json, GlobalContext::new(), 10);
    let list = screen.list_nodes()[0];
    let root = screen.root().unwrap();

    screen
        .update_context(root, SetContext::new("page", json!(["a"])).at("items"))
        .unwrap();
    screen
        .update_context(root, SetContext::new("page", json!("oops")).at("items"))
        .unwrap();

    assert_eq!(screen.renderer().changes, vec![(list, ListChange::Reloaded(1))]);
    assert_eq!(screen.list(list).unwrap().items(), &[json!("a")]);
}

#[test]
fn screens_share_the_global_context() {
    let global = GlobalContext::new();
    let json = r#"{"properties": {"user": "@{global.user.name}"}}"#;
    let mut a = mount(json, global.clone(), 10);
    let mut b = mount(json, global.clone(), 10);
    let (root_a, root_b) = (a.root().unwrap(), b.root().unwrap());

    a.update_context(root_a, SetContext::new("global", json!("Ana")).at("user.name"))
        .unwrap();
    assert_eq!(a.renderer().last(root_a, "user"), Some(json!("Ana")));
    b.poll();
    assert_eq!(b.renderer().last(root_b, "user"), Some(json!("Ana")));

    b.update_context(root_b, SetContext::new("global", json!("Bo")).at("user.name"))
        .unwrap();
    a.poll();
    assert_eq!(a.renderer().last(root_a, "user"), Some(json!("Bo")));
    assert_eq!(global.get().value, json!({"user": {"name": "Bo"}}));
}

#[test]
fn nested_lists_keep_their_state_per_outer_item() {
    let rows: Vec<Value> = (0..10)
        .map(|i| json!({"id": i, "tags": [format!("t{}a", i), format!("t{}b", i)]}))
        .collect();
    let json = json!({
        "context": {"id": "page", "value": {"rows": rows}},
        "children": [{
            "list": {
                "dataSource": "@{page.rows}",
                "iteratorName": "row",
                "template": {
                    "properties": {"title": "@{row.id}"},
                    "children": [{
                        "list": {
                            "dataSource": "@{row.tags}",
                            "iteratorName": "tag",
                            "onInit": [{"_type": "nestedInit"}],
                            "template": {"properties": {"text": "@{tag}"}}
                        }
                    }]
                }
            }
        }]
    })
    .to_string();
    let mut screen = mount(&json, GlobalContext::new(), 1);
    let outer = screen.list_nodes()[0];
    let events = screen.event_sender();
    let show = |screen: &mut TestScreen, index: usize| {
        events
            .send(ScreenEvent::VisibleRange {
                list: outer,
                range: index..index + 1,
            })
            .unwrap();
        screen.poll();
    };

    let cell = screen.list(outer).unwrap().cell_at(0).unwrap();
    let nested = screen.nested_lists(cell)[0];
    assert!(screen
        .list(nested)
        .unwrap()
        .pool()
        .same_as(screen.list(outer).unwrap().pool()));
    assert_eq!(screen.actions().runs.len(), 1);

    show(&mut screen, 3);
    assert_eq!(screen.list(outer).unwrap().cell_at(3), Some(cell));
    assert_eq!(screen.renderer().last(cell, "title"), Some(json!(3)));
    let tag_cell = screen.list(nested).unwrap().cell_at(0).unwrap();
    assert_eq!(screen.context(tag_cell), Some(ContextData::new("tag", json!("t3a"))));
    screen
        .update_context(tag_cell, SetContext::new("tag", json!("picked")))
        .unwrap();

    show(&mut screen, 7);
    let tag_cell = screen.list(nested).unwrap().cell_at(0).unwrap();
    assert_eq!(screen.context(tag_cell), Some(ContextData::new("tag", json!("t7a"))));
    assert_eq!(screen.actions().runs.len(), 3, "new outer items initialize the nested list");

    show(&mut screen, 3);
    let view = screen.list(nested).unwrap();
    assert_eq!(view.items(), &[json!("t3a"), json!("t3b")]);
    let tag_cell = view.cell_at(0).unwrap();
    assert_eq!(screen.context(tag_cell), Some(ContextData::new("tag", json!("picked"))));
    assert_eq!(screen.renderer().last(tag_cell, "text"), Some(json!("picked")));
    assert_eq!(screen.actions().runs.len(), 3, "restored lists are not initialized again");
}

#[test]
fn unmounting_clears_everything() {
    let json = page_list(
        json!(["a"]),
        json!({"dataSource": "@{page.items}", "template": {}}),
    );
    let mut screen = mount(&json, GlobalContext::new(), 10);
    screen.unmount();
    assert!(screen.root().is_none());
    assert!(screen.list_nodes().is_empty());
    assert!(screen.tree().is_empty());
}
