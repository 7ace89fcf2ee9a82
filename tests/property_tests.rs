//! Property tests for extraction and composition.

use std::collections::HashMap;

use authflow_extract::{HttpResponse, JsonPath, Part, Plugin, PluginSet, Step};
use base64::Engine;
use proptest::prelude::*;
use serde_json::{json, Map, Value};

fn arb_key() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z_][a-z0-9_]{0,8}").unwrap()
}

// Strategy: a path of keys and indices
fn arb_steps() -> impl Strategy<Value = Vec<Step>> {
    prop::collection::vec(
        prop_oneof![
            arb_key().prop_map(Step::Key),
            (0usize..5).prop_map(Step::Index),
        ],
        1..6,
    )
}

fn render(steps: &[Step]) -> String {
    let mut path = String::new();
    for step in steps {
        match step {
            Step::Key(key) => {
                if !path.is_empty() {
                    path.push('.');
                }
                path.push_str(key);
            }
            Step::Index(index) => path.push_str(&format!("[{}]", index)),
        }
    }
    path
}

/// Document in which `steps` leads to `leaf`
fn build_document(steps: &[Step], leaf: Value) -> Value {
    steps.iter().rev().fold(leaf, |inner, step| match step {
        Step::Key(key) => {
            let mut map = Map::new();
            map.insert("other".to_string(), json!(1));
            map.insert(key.clone(), inner);
            Value::Object(map)
        }
        Step::Index(index) => {
            let mut items = vec![Value::Null; *index];
            items.push(inner);
            Value::Array(items)
        }
    })
}

fn no_user_data() -> HashMap<String, String> {
    HashMap::new()
}

proptest! {
    #[test]
    fn proptest_path_parse_recovers_steps(steps in arb_steps()) {
        let path = JsonPath::parse(&render(&steps)).unwrap();
        prop_assert_eq!(path.steps(), steps.as_slice());
    }

    /// Direct extraction and extraction through another plugin's value agree
    #[test]
    fn proptest_json_same_via_response_and_plugin(
        steps in arb_steps(),
        leaf in prop_oneof![
            "[a-zA-Z0-9 ]{0,12}".prop_map(Value::from),
            any::<i32>().prop_map(Value::from),
            Just(json!({"nested": [1, 2, {"deep": true}]})),
        ],
    ) {
        let path = render(&steps);
        let document = build_document(&steps, leaf.clone()).to_string();
        let expected = match &leaf {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };

        let mut set = PluginSet::new();
        let body = set.insert(Plugin::regex("body", r"(?s)(.*)", 0).unwrap()).unwrap();
        let direct = set.insert(Plugin::json("direct", &path).unwrap()).unwrap();
        let chained = set.insert(Plugin::json_from(body, "chained", &path).unwrap()).unwrap();

        set.resolve_outputs(&[direct, chained], &HttpResponse::new(document)).unwrap();

        prop_assert_eq!(set.value(direct), Some(expected.as_str()));
        prop_assert_eq!(set.value(chained), Some(expected.as_str()));
    }

    #[test]
    fn proptest_json_missing_key_is_absent(steps in arb_steps()) {
        let path = format!("{}.missing_key", render(&steps));
        let document = build_document(&steps, json!({"present": 1})).to_string();

        let mut set = PluginSet::new();
        let id = set.insert(Plugin::json("field", &path).unwrap()).unwrap();
        let result = set.resolve_post_response(id, &HttpResponse::new(document));

        prop_assert!(matches!(result, Ok(None)));
    }

    #[test]
    fn proptest_regex_returns_capture_group(
        token in "[A-Za-z0-9]{1,32}",
        noise in "[ .,;]{0,20}",
    ) {
        let mut set = PluginSet::new();
        let id = set.insert(Plugin::regex("token", r"token=([A-Za-z0-9]+)", 0).unwrap()).unwrap();

        let body = format!("{}token={}{}", noise, token, noise);
        let found = set.resolve_post_response(id, &HttpResponse::new(body)).unwrap();
        prop_assert_eq!(found, Some(token));

        let mut set = PluginSet::new();
        let id = set.insert(Plugin::regex("token", r"token=([A-Za-z0-9]+)", 0).unwrap()).unwrap();
        let missing = set.resolve_post_response(id, &HttpResponse::new(noise)).unwrap();
        prop_assert_eq!(missing, None);
    }

    #[test]
    fn proptest_combine_concatenates(
        literal in ".{0,16}",
        value in prop::option::of("[a-z0-9]{1,16}"),
    ) {
        let mut set = PluginSet::new();
        let token = set.insert(Plugin::empty("token")).unwrap();
        let combined = set
            .insert(Plugin::combine([Part::from(literal.as_str()), Part::from(token)]))
            .unwrap();

        set.set_value(token, value.clone()).unwrap();
        let result = set.resolve_pre_request(combined, &no_user_data()).unwrap();

        prop_assert_eq!(result, Some(format!("{}{}", literal, value.unwrap_or_default())));
    }

    #[test]
    fn proptest_prepend(value in prop::option::of("[a-z0-9]{1,16}")) {
        let mut set = PluginSet::new();
        let source = set.insert(Plugin::empty("source")).unwrap();
        let altered = set.insert(Plugin::prepend("altered", source, "X-")).unwrap();

        set.set_value(source, value.clone()).unwrap();
        let result = set.resolve_pre_request(altered, &no_user_data()).unwrap();

        prop_assert_eq!(result, value.map(|v| format!("X-{}", v)));
    }

    #[test]
    fn proptest_basic_auth(
        username in "[a-zA-Z0-9]{1,16}",
        password in "[ -~]{0,24}",
    ) {
        let header = Plugin::basic_auth(&username, &password);
        let expected = format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", username, password))
        );
        prop_assert_eq!(header.value(), Some(expected.as_str()));
    }

    #[test]
    fn proptest_html_last_match_wins(values in prop::collection::vec("[a-z0-9]{1,10}", 1..6)) {
        let inputs: String = values
            .iter()
            .map(|v| format!(r#"<input name="csrf_token" value="{}"><input name="other" value="x">"#, v))
            .collect();
        let html = format!("<html><body><form>{}</form></body></html>", inputs);

        let mut set = PluginSet::new();
        let id = set
            .insert(Plugin::html("csrf", "input", [("name", "csrf_token")], "value").unwrap())
            .unwrap();
        let found = set.resolve_post_response(id, &HttpResponse::new(html)).unwrap();

        prop_assert_eq!(found.as_deref(), values.last().map(String::as_str));
    }
}
