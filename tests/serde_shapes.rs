//! JSON shapes of the serializable types.
//!
//! Run with:
//!   cargo test --features serde --test `serde_shapes`

#![cfg(feature = "serde")]

use serde_json::json;
use textcore::{Delta, LineState, Position, Range, Token};

#[test]
fn delta_is_tagged_by_action() {
    let delta = Delta::InsertText {
        range: Range::new(2, 5, 2, 7),
        text: "xy".to_string(),
    };
    let value = serde_json::to_value(&delta).expect("serialize delta");
    assert_eq!(
        value,
        json!({
            "action": "insertText",
            "range": {
                "start": { "row": 2, "column": 5 },
                "end": { "row": 2, "column": 7 }
            },
            "text": "xy"
        })
    );
}

#[test]
fn remove_lines_reads_back() {
    let value = json!({
        "action": "removeLines",
        "range": {
            "start": { "row": 1, "column": 0 },
            "end": { "row": 3, "column": 0 }
        },
        "lines": ["a", "b"]
    });
    let delta: Delta = serde_json::from_value(value).expect("deserialize delta");
    assert_eq!(
        delta,
        Delta::RemoveLines {
            range: Range::from_points(Position::new(1, 0), Position::new(3, 0)),
            lines: vec!["a".to_string(), "b".to_string()],
        }
    );
}

#[test]
fn token_uses_type_key() {
    let token = Token::new(4, "keyword", "fn");
    let value = serde_json::to_value(&token).expect("serialize token");
    assert_eq!(value, json!({ "start": 4, "type": "keyword", "value": "fn" }));
}

#[test]
fn line_state_is_a_plain_string() {
    let state = LineState::from_stack(&["qqstring", "start"][..]);
    let value = serde_json::to_value(&state).expect("serialize state");
    assert_eq!(value, json!("qqstring,start"));
    let back: LineState = serde_json::from_value(value).expect("deserialize state");
    assert_eq!(back, state);
}

#[test]
fn delta_snapshot() {
    let delta = Delta::InsertLines {
        range: Range::new(4, 0, 5, 0),
        lines: vec!["fn main() {}".to_string()],
    };
    insta::assert_json_snapshot!(delta, @r###"
    {
      "action": "insertLines",
      "range": {
        "start": {
          "row": 4,
          "column": 0
        },
        "end": {
          "row": 5,
          "column": 0
        }
      },
      "lines": [
        "fn main() {}"
      ]
    }
    "###);
}
