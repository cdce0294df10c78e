//! Property-based tests for output escaping
//!
//! Escaped output never contains a raw markup character, raw output is the
//! input unchanged, and missing values always render empty.

use cbt_engine::{helpers, Engine};
use proptest::prelude::*;
use serde_json::json;

/// Strings biased towards characters that need escaping
fn markup_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            Just("<".to_string()),
            Just(">".to_string()),
            Just("&".to_string()),
            Just("\"".to_string()),
            Just("'".to_string()),
            Just("\\".to_string()),
            "[a-zA-Z0-9 ]{1,4}",
        ],
        0..12,
    )
    .prop_map(|parts| parts.concat())
}

fn decode_html(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#92;", "\\")
        .replace("&amp;", "&")
}

proptest! {
    #[test]
    fn prop_escaped_output_has_no_raw_markup(input in markup_strategy()) {
        let engine = Engine::default();
        let out = engine.render("<%=html%>", &json!({"html": input})).unwrap();

        prop_assert!(!out.contains(['<', '>', '"', '\'', '\\']));
        prop_assert_eq!(out, helpers::encode_html(&input));
    }

    #[test]
    fn prop_escaping_is_reversible(input in markup_strategy()) {
        prop_assert_eq!(decode_html(&helpers::encode_html(&input)), input);
    }

    #[test]
    fn prop_raw_output_is_unchanged(input in markup_strategy()) {
        let engine = Engine::default();
        let data = json!({"html": input});

        prop_assert_eq!(engine.render("<%-html%>", &data).unwrap(), input.clone());
        prop_assert_eq!(engine.render("<%:=html%>", &data).unwrap(), input);
    }

    #[test]
    fn prop_missing_values_render_empty(
        prefix in prop_oneof![
            Just("="), Just(":h="), Just(":="), Just("-"), Just(":u="),
            Just(":v="), Just(":a="), Just(":m="), Just(":p="), Just(":s="),
        ],
        null in any::<bool>(),
    ) {
        let engine = Engine::default();
        let suffix = if prefix == ":s=" { "|3" } else { "" };
        let data = if null { json!({"x": null}) } else { json!({}) };

        let out = engine
            .render(&format!("a<%{}x{}%>b", prefix, suffix), &data)
            .unwrap();
        prop_assert_eq!(out, "ab");
    }

    #[test]
    fn prop_truncation_bounds_length(input in "[a-z ]{0,40}", length in 0usize..30) {
        let out = helpers::truncate(&input, length);
        if input.chars().count() > length {
            prop_assert_eq!(out.chars().count(), length + 3);
            prop_assert!(out.ends_with("..."));
        } else {
            prop_assert_eq!(out, input);
        }
    }
}

#[test]
fn test_script_payload_is_fully_escaped() {
    let out = Engine::default()
        .render(
            "<%=html%>",
            &json!({"html": "<script>alert(\"x\")</script>"}),
        )
        .unwrap();
    assert_eq!(
        out,
        "&lt;script&gt;alert(&quot;x&quot;)&lt;/script&gt;"
    );
}
