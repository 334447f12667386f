use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::json;

use reflexive_ui::dispatch::{MAIN_CONTAINER_ID, THEME_STYLE_ID};
use reflexive_ui::{
    DispatchOutcome, Dispatcher, DomPort, ElementSpec, EventTarget, MemoryDom, NodeId,
};

fn html(payload: serde_json::Value) -> String {
    payload.to_string()
}

fn theme_text(dispatcher: &Dispatcher<MemoryDom>) -> String {
    let dom = dispatcher.dom();
    dom.element_by_id(THEME_STYLE_ID)
        .map(|node| dom.text_content(node))
        .unwrap_or_default()
}

fn page() -> (MemoryDom, NodeId) {
    let mut dom = MemoryDom::new();
    let body = dom.body();
    let card = dom.append_element(body, &ElementSpec::new("div").attr("id", "card"));
    (dom, card)
}

// --- Unknown discriminants ---

#[test]
fn unknown_render_is_ignored_on_every_channel() {
    let (dom, _) = page();
    let mut dispatcher = Dispatcher::new(dom);
    let before = dispatcher.dom().to_html();

    for event in ["HTML", "CSS", "JS"] {
        let outcome = dispatcher.handle_event(event, r##"{"render":"Explode","target":"#card"}"##);
        assert_eq!(outcome, DispatchOutcome::Ignored, "channel {event}");
    }
    assert_eq!(
        dispatcher.handle_event("html", r#"{"render":"Partial"}"#),
        DispatchOutcome::Ignored
    );
    assert_eq!(dispatcher.dom().to_html(), before);
}

#[test]
fn unknown_render_with_mistyped_fields_is_ignored() {
    let (dom, _) = page();
    let mut dispatcher = Dispatcher::new(dom);
    let before = dispatcher.dom().to_html();

    assert_eq!(
        dispatcher.handle_event("CSS", r#"{"render":"Explode","classes":"x"}"#),
        DispatchOutcome::Ignored
    );
    assert_eq!(
        dispatcher.handle_event("HTML", r#"{"render":"Explode","html":{"nested":true}}"#),
        DispatchOutcome::Ignored
    );
    assert_eq!(
        dispatcher.handle_event("CSS", r##"{"render":"AddClasses","target":"#card","classes":"x"}"##),
        DispatchOutcome::Failed
    );
    assert_eq!(dispatcher.dom().to_html(), before);
}

// --- Partial ---

#[test]
fn partial_on_missing_target_changes_nothing() {
    let (dom, _) = page();
    let mut dispatcher = Dispatcher::new(dom);
    let before = dispatcher.dom().to_html();

    let outcome = dispatcher.handle_event(
        "HTML",
        &html(json!({"render": "Partial", "target": "#missing", "html": "<b>x</b>"})),
    );
    assert_eq!(outcome, DispatchOutcome::Applied);
    assert_eq!(dispatcher.dom().to_html(), before);
}

#[test]
fn markup_inserted_by_navigation_can_be_targeted() {
    let mut dom = MemoryDom::new();
    let body = dom.body();
    dom.append_element(body, &ElementSpec::new("main").attr("id", MAIN_CONTAINER_ID));
    let mut dispatcher = Dispatcher::new(dom);

    dispatcher.handle_event(
        "navigation",
        r#"{"url":"/cards","html":"<div id=\"card\">old</div>"}"#,
    );
    assert_eq!(
        dispatcher.handle_event(
            "HTML",
            r##"{"render":"Partial","target":"#card","html":"new"}"##
        ),
        DispatchOutcome::Applied
    );
    assert_eq!(
        dispatcher.handle_event(
            "CSS",
            r##"{"render":"AddClasses","target":"#card","classes":["on"]}"##
        ),
        DispatchOutcome::Applied
    );

    let dom = dispatcher.dom();
    let card = dom.element_by_id("card").unwrap();
    assert_eq!(dom.text_content(card), "new");
    assert!(dom.has_class(card, "on"));
    assert_eq!(dom.outer_html(card), r#"<div id="card" class="on">new</div>"#);
}

#[test]
fn listeners_on_replaced_markup_are_released() {
    let (dom, card) = page();
    let mut dispatcher = Dispatcher::new(dom);
    dispatcher.actions_mut().register("noop", |_ctx| {});
    let baseline = dispatcher.dom().allocated_nodes();

    for _ in 0..20 {
        dispatcher.handle_event(
            "HTML",
            r##"{"render":"Partial","target":"#card","html":"<button id=\"b\">go</button>"}"##,
        );
        dispatcher.handle_event(
            "JS",
            &html(json!({
                "render": "AddListenerToComponent",
                "html": r##"{"target":"#b","event":"click","handler":"noop"}"##,
            })),
        );
        dispatcher.handle_event(
            "JS",
            &html(json!({"render": "AttachToComponent", "target": "#card", "html": "x()"})),
        );
        dispatcher.handle_event(
            "JS",
            &html(json!({"render": "RemoveJsFromComponent", "html": r##"{"target":"#card"}"##})),
        );
    }
    assert_eq!(dispatcher.dom().bound_listeners(), 1);
    assert_eq!(dispatcher.listeners().len(), 1);

    dispatcher.handle_event("HTML", r##"{"render":"Partial","target":"#card","html":""}"##);
    assert_eq!(dispatcher.dom().bound_listeners(), 0);
    assert!(dispatcher.listeners().is_empty());
    assert_eq!(dispatcher.dom().allocated_nodes(), baseline);
    assert!(dispatcher.dom().children(card).is_empty());
}

// --- Themes ---

#[test]
fn add_then_delete_restores_existing_theme_text() {
    let mut dom = MemoryDom::new();
    let head = dom.head();
    dom.append_element(
        head,
        &ElementSpec::new("style")
            .attr("id", THEME_STYLE_ID)
            .text(":root { --base: 1; }\n"),
    );
    let mut dispatcher = Dispatcher::new(dom);
    let before = theme_text(&dispatcher);

    let themes = json!({"ocean": {"--bg": "#024"}, "forest": {"--bg": "#030"}}).to_string();
    dispatcher.handle_event("HTML", &html(json!({"render": "AddThemes", "html": themes})));
    assert!(theme_text(&dispatcher).contains(r#"[data-theme="ocean"]"#));

    for name in ["ocean", "forest"] {
        let payload = json!({"theme": name}).to_string();
        dispatcher.handle_event("HTML", &html(json!({"render": "DeleteTheme", "html": payload})));
    }
    assert_eq!(theme_text(&dispatcher), before);
}

#[test]
fn add_themes_keeps_payload_order() {
    let mut dispatcher = Dispatcher::new(MemoryDom::new());
    let themes = r##"{"root":{"--c":"red"},"dark":{"--c":"black","--bg":"#000"}}"##;
    dispatcher.handle_event("HTML", &html(json!({"render": "AddThemes", "html": themes})));
    assert_eq!(
        theme_text(&dispatcher),
        ":root { --c: red; }\n[data-theme=\"dark\"] { --c: black; --bg: #000; }\n"
    );
}

fn seeded_theme_dispatcher() -> Dispatcher<MemoryDom> {
    let mut dispatcher = Dispatcher::new(MemoryDom::new());
    let themes = r#"{"root":{"--c":"red"},"dark":{"--c":"black","--d":"x"},"light":{"--c":"white"}}"#;
    dispatcher.handle_event("HTML", &html(json!({"render": "AddThemes", "html": themes})));
    dispatcher
}

#[test]
fn update_theme_is_idempotent() {
    let mut dispatcher = seeded_theme_dispatcher();
    let update = html(json!({
        "render": "UpdateTheme",
        "html": r#"{"theme":"dark","updates":{"--c":"blue"}}"#,
    }));
    dispatcher.handle_event("HTML", &update);
    let once = theme_text(&dispatcher);
    dispatcher.handle_event("HTML", &update);
    assert_eq!(theme_text(&dispatcher), once);
}

#[test]
fn update_theme_matches_delete_then_add() {
    let mut updated = seeded_theme_dispatcher();
    updated.handle_event(
        "HTML",
        &html(json!({
            "render": "UpdateTheme",
            "html": r#"{"theme":"dark","updates":{"--c":"blue"}}"#,
        })),
    );

    let mut rebuilt = seeded_theme_dispatcher();
    rebuilt.handle_event(
        "HTML",
        &html(json!({"render": "DeleteTheme", "html": r#"{"theme":"dark"}"#})),
    );
    rebuilt.handle_event(
        "HTML",
        &html(json!({"render": "AddThemes", "html": r#"{"dark":{"--c":"blue"}}"#})),
    );

    assert_eq!(theme_text(&updated), theme_text(&rebuilt));
    assert!(!theme_text(&updated).contains("--d"));
}

#[test]
fn pre_existing_theme_block_can_be_updated_and_deleted() {
    let mut dom = MemoryDom::new();
    let head = dom.head();
    dom.append_element(
        head,
        &ElementSpec::new("style")
            .attr("id", THEME_STYLE_ID)
            .text("[data-theme=\"dark\"] { --c: black; }"),
    );
    let mut dispatcher = Dispatcher::new(dom);

    dispatcher.handle_event(
        "HTML",
        &html(json!({
            "render": "UpdateTheme",
            "html": r#"{"theme":"dark","updates":{"--c":"blue"}}"#,
        })),
    );
    let text = theme_text(&dispatcher);
    assert_eq!(text.matches(r#"[data-theme="dark"]"#).count(), 1);
    assert_eq!(text, "[data-theme=\"dark\"] { --c: blue; }\n");

    let outcome = dispatcher.handle_event(
        "HTML",
        &html(json!({"render": "DeleteTheme", "html": r#"{"theme":"dark"}"#})),
    );
    assert_eq!(outcome, DispatchOutcome::Applied);
    assert!(!theme_text(&dispatcher).contains("dark"));
}

#[test]
fn switch_theme_sets_document_attribute() {
    let mut dispatcher = Dispatcher::new(MemoryDom::new());
    dispatcher.handle_event(
        "HTML",
        &html(json!({"render": "SwitchTheme", "html": r#"{"theme":"dark"}"#})),
    );
    let dom = dispatcher.dom();
    assert_eq!(
        dom.attribute(dom.document_element(), "data-theme").as_deref(),
        Some("dark")
    );
}

// --- CSS ---

#[test]
fn dynamic_css_is_an_upsert() {
    let mut dispatcher = Dispatcher::new(MemoryDom::new());
    dispatcher.handle_event("CSS", r#"{"render":"AddDynamicCss","key":"hero","css":"a{}"}"#);
    dispatcher.handle_event("CSS", r#"{"render":"AddDynamicCss","key":"hero","css":"b{}"}"#);

    let blocks = dispatcher.dom().query_all("style.dynamic-css-block");
    assert_eq!(blocks.len(), 1);
    assert_eq!(dispatcher.dom().text_content(blocks[0]), "b{}");

    dispatcher.handle_event("CSS", r#"{"render":"RemoveDynamicCss","key":"hero"}"#);
    assert!(dispatcher.dom().query_all("style.dynamic-css-block").is_empty());
}

#[test]
fn malformed_event_does_not_block_the_next_one() {
    let (dom, card) = page();
    let mut dispatcher = Dispatcher::new(dom);

    assert_eq!(
        dispatcher.handle_event("CSS", r##"{"render":"AddClasses","target":"#card""##),
        DispatchOutcome::Failed
    );
    assert_eq!(
        dispatcher.handle_event(
            "CSS",
            r##"{"render":"AddClasses","target":"#card","classes":["active"]}"##
        ),
        DispatchOutcome::Applied
    );
    assert!(dispatcher.dom().has_class(card, "active"));
}

#[test]
fn toggle_twice_restores_classes() {
    let (dom, card) = page();
    let mut dispatcher = Dispatcher::new(dom);
    let toggle = r##"{"render":"ToggleClasses","target":"#card","classes":["open"]}"##;
    dispatcher.handle_event("CSS", toggle);
    assert!(dispatcher.dom().has_class(card, "open"));
    dispatcher.handle_event("CSS", toggle);
    assert!(!dispatcher.dom().has_class(card, "open"));
}

// --- Navigation ---

#[test]
fn navigation_appends_to_root_path() {
    let mut dom = MemoryDom::new().with_location("/app/");
    let body = dom.body();
    let main = dom.append_element(body, &ElementSpec::new("main").attr("id", MAIN_CONTAINER_ID));
    let mut dispatcher = Dispatcher::new(dom);
    assert_eq!(dispatcher.root_path(), "/app");

    let outcome = dispatcher.handle_event(
        "navigation",
        r#"{"url":"/settings","html":"<h1>Settings</h1>"}"#,
    );
    assert_eq!(outcome, DispatchOutcome::Applied);

    let dom = dispatcher.dom();
    assert_eq!(dom.location_path(), "/app/settings");
    let last = dom.history().last().unwrap();
    assert_eq!(last.path, "/app/settings");
    assert_eq!(last.state, json!({"path": "/app/settings"}));
    assert_eq!(dom.inner_html(main), "<h1>Settings</h1>");
}

#[test]
fn navigation_from_app_to_settings() {
    let mut dom = MemoryDom::new().with_location("/app");
    let body = dom.body();
    let main = dom.append_element(body, &ElementSpec::new("main").attr("id", MAIN_CONTAINER_ID));
    let mut dispatcher = Dispatcher::new(dom);

    dispatcher.handle_event("navigation", r#"{"url":"settings","html":"<p>S</p>"}"#);
    assert_eq!(dispatcher.dom().location_path(), "/app/settings");
    assert_eq!(dispatcher.dom().inner_html(main), "<p>S</p>");
}

#[test]
fn navigation_without_url_or_html_is_ignored() {
    let mut dom = MemoryDom::new().with_location("/app");
    let body = dom.body();
    let main = dom.append_element(body, &ElementSpec::new("main").attr("id", MAIN_CONTAINER_ID));
    dom.set_inner_html(main, "<p>keep</p>");
    let mut dispatcher = Dispatcher::new(dom);

    for payload in [r#"{"render":"Explode"}"#, "{}"] {
        assert_eq!(
            dispatcher.handle_event("navigation", payload),
            DispatchOutcome::Ignored
        );
    }
    let dom = dispatcher.dom();
    assert!(dom.history().is_empty());
    assert_eq!(dom.location_path(), "/app");
    assert_eq!(dom.inner_html(main), "<p>keep</p>");
}

// --- Listeners ---

#[test]
fn listener_attach_fire_remove() {
    let (mut dom, _) = page();
    let body = dom.body();
    let button = dom.append_element(body, &ElementSpec::new("button").attr("id", "save"));

    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let mut dispatcher = Dispatcher::new(dom);
    dispatcher.actions_mut().register("count", move |ctx| {
        assert_eq!(ctx.target, Some("#save"));
        assert_eq!(ctx.args["step"], 2);
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let spec = r##"{"target":"#save","event":"click","handler":"count","args":{"step":2}}"##;
    let outcome = dispatcher.handle_event(
        "JS",
        &html(json!({"render": "AddListenerToComponent", "html": spec})),
    );
    assert_eq!(outcome, DispatchOutcome::Applied);
    assert_eq!(dispatcher.dom().fire(EventTarget::Element(button), "click"), 1);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    dispatcher.handle_event(
        "JS",
        &html(json!({
            "render": "RemoveListenerFromComponent",
            "html": r##"{"target":"#save","event":"click"}"##,
        })),
    );
    assert_eq!(dispatcher.dom().fire(EventTarget::Element(button), "click"), 0);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert!(dispatcher.listeners().is_empty());
}

#[test]
fn document_listener_accepts_code_alias() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let mut dispatcher = Dispatcher::new(MemoryDom::new());
    dispatcher.actions_mut().register("count", move |ctx| {
        assert!(ctx.target.is_none());
        counter.fetch_add(1, Ordering::SeqCst);
    });

    dispatcher.handle_event(
        "JS",
        &html(json!({
            "render": "AddListenerToDocument",
            "html": r#"{"event":"keydown","code":"count"}"#,
        })),
    );
    dispatcher.dom().fire(EventTarget::Document, "keydown");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}
