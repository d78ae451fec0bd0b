//! Integration tests for sessions and handles against a real interpreter
//!
//! Run with: cargo test -p hopi --test integration_session

mod support;

use futures::future::join_all;
use hopi::{Arg, DecodeError, DecoderEntry, HandleState, HopiError, Opaque, Value, args, expr};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use support::{session_or_skip, session_with_or_skip};

#[tokio::test]
async fn test_literals_survive_the_round_trip() {
    let Some(session) = session_or_skip().await else { return };

    let mut map = BTreeMap::new();
    map.insert("text".to_string(), Arg::from("two\nlines \"quoted\""));
    map.insert("items".to_string(), Arg::from(vec![Arg::Null, Arg::from(true), Arg::from(-7)]));
    map.insert("ratio".to_string(), Arg::from(0.25));

    let handle = session.format("{}", vec![Arg::from(map)]).unwrap();
    let value = handle.force().await.unwrap();

    assert_eq!(value.get("text").and_then(Value::as_str), Some("two\nlines \"quoted\""));
    assert_eq!(value.get("ratio").and_then(Value::as_f64), Some(0.25));
    let items = value.get("items").and_then(Value::as_list).unwrap();
    assert!(items[0].is_null());
    assert_eq!(items[1].as_bool(), Some(true));
    assert_eq!(items[2].as_i64(), Some(-7));

    session.kill().await;
}

#[tokio::test]
async fn test_combined_handles_force_to_their_sum() {
    let Some(session) = session_or_skip().await else { return };

    let one = session.format("1", vec![]).unwrap();
    let two = session.format("2", vec![]).unwrap();
    let sum = expr!(session, "{a}+{b}", a = &one, b = &two).unwrap();

    assert_eq!(sum.force().await.unwrap().as_i64(), Some(3));
    assert_eq!(sum.state(), HandleState::Evaluated);
    assert_eq!(one.state(), HandleState::Bound);

    let doubled = (&sum * 2).unwrap();
    let negated = (-&doubled).unwrap();
    assert_eq!(negated.force().await.unwrap().as_i64(), Some(-6));

    session.kill().await;
}

#[tokio::test]
async fn test_unencodable_value_fails_to_decode() {
    let Some(session) = session_or_skip().await else { return };

    let handle = session.format("object()", vec![]).unwrap();
    let err = handle.force().await.unwrap_err();
    assert_eq!(
        err,
        HopiError::Decode(DecodeError::UnregisteredType("builtins.object".to_string()))
    );

    // the variable itself is still bound and usable
    let name = handle.attr("__class__").unwrap().attr("__name__").unwrap();
    assert_eq!(name.force().await.unwrap().as_str(), Some("object"));

    session.kill().await;
}

#[tokio::test]
async fn test_attribute_index_and_raw_builders() {
    let Some(session) = session_or_skip().await else { return };

    let xs = session.format("{}", vec![Arg::from(vec![10, 20, 30, 40])]).unwrap();
    assert_eq!(xs.index(-1).unwrap().force().await.unwrap().as_i64(), Some(40));
    assert_eq!(
        xs.raw("[{}:]", vec![2.into()]).unwrap().force_as::<Vec<i64>>().await.unwrap(),
        vec![30, 40]
    );

    let table = session.format("{{'not an identifier': 1, 'plain': 2}}", vec![]).unwrap();
    assert_eq!(table.item("not an identifier").unwrap().force().await.unwrap().as_i64(), Some(1));
    assert_eq!(table.index("plain").unwrap().force().await.unwrap().as_i64(), Some(2));

    let shout = session
        .format("{}", vec!["abc".into()])
        .unwrap()
        .attr("upper")
        .unwrap()
        .call(args![])
        .unwrap();
    assert_eq!(shout.force().await.unwrap().as_str(), Some("ABC"));

    session.kill().await;
}

#[tokio::test]
async fn test_calls_with_keyword_arguments() {
    let Some(session) = session_or_skip().await else { return };

    let json = session.import("json").await.unwrap();
    let dumped = json
        .attr("dumps")
        .unwrap()
        .call(args![vec![1, 2]; separators = Arg::tuple([",", ":"])])
        .unwrap();
    assert_eq!(dumped.force().await.unwrap().as_str(), Some("[1,2]"));

    let sorted = session
        .format("sorted", vec![])
        .unwrap()
        .call(args![vec![3, 1, 2]; reverse = true])
        .unwrap();
    assert_eq!(sorted.force_as::<Vec<i64>>().await.unwrap(), vec![3, 2, 1]);

    session.kill().await;
}

#[tokio::test]
async fn test_import_rejects_non_module_names() {
    let Some(session) = session_or_skip().await else { return };

    let err = session.import("os; import sys").await.unwrap_err();
    assert!(matches!(err, HopiError::Usage(_)));
    assert_eq!(session.channel().commands_sent(), builtin_registrations());

    let err = session.import("no_such_module_hopi").await.unwrap_err();
    match err {
        HopiError::RemoteExecution(text) => assert!(text.starts_with("ModuleNotFoundError(")),
        other => panic!("unexpected error {other:?}"),
    }

    session.kill().await;
}

#[tokio::test]
async fn test_builtin_decoders() {
    let Some(session) = session_or_skip().await else { return };

    let mut set = session
        .eval("{3, 1, 2}")
        .await
        .unwrap()
        .deserialize::<Vec<i64>>()
        .unwrap();
    set.sort_unstable();
    assert_eq!(set, vec![1, 2, 3]);

    let bytes = session.eval("b'hi'").await.unwrap();
    assert_eq!(bytes.deserialize::<Vec<u8>>().unwrap(), b"hi".to_vec());

    let complex = session.eval("complex(1, 2)").await.unwrap();
    assert_eq!(complex, Value::List(vec![Value::Float(1.0), Value::Float(2.0)]));

    let nan = session.eval("float('nan')").await.unwrap();
    assert!(nan.as_f64().is_some_and(f64::is_nan));
    let inf = session.eval("[float('inf'), -float('inf')]").await.unwrap();
    assert_eq!(
        inf,
        Value::List(vec![Value::Float(f64::INFINITY), Value::Float(f64::NEG_INFINITY)])
    );

    session.kill().await;
}

#[tokio::test]
async fn test_registered_decoder_builds_opaque_values() {
    let Some(session) = session_or_skip().await else { return };

    session
        .register(DecoderEntry::new(
            "fractions.Fraction",
            "lambda v: [v.numerator, v.denominator]",
            |raw, decoder| {
                let parts: (i64, i64) = decoder.decode(raw)?.deserialize()?;
                Ok(Value::Opaque(Opaque::new("fractions.Fraction", parts)))
            },
        ))
        .await
        .unwrap();
    assert!(session.codec().is_registered("fractions.Fraction"));

    let fractions = session.import("fractions").await.unwrap();
    let half = fractions.attr("Fraction").unwrap().call(args![3, 4]).unwrap();
    let value = half.force().await.unwrap();

    let opaque = value.as_opaque().unwrap();
    assert_eq!(opaque.type_tag(), "fractions.Fraction");
    assert_eq!(opaque.downcast_ref::<(i64, i64)>(), Some(&(3, 4)));

    session.kill().await;
}

#[tokio::test]
async fn test_remote_errors_keep_earlier_effects() {
    let Some(session) = session_or_skip().await else { return };

    let err = session.eval("1 + 'a'").await.unwrap_err();
    assert!(err.is_remote());
    assert_eq!(
        err.to_string(),
        "TypeError(\"unsupported operand type(s) for +: 'int' and 'str'\")"
    );

    let err = session.exec("partial = 1; 1/0").await.unwrap_err();
    assert_eq!(err, HopiError::RemoteExecution("ZeroDivisionError('division by zero')".to_string()));
    assert_eq!(session.eval("partial").await.unwrap().as_i64(), Some(1));

    session.kill().await;
}

/// Ten thousand handles built back to back must bind in creation order
#[tokio::test]
async fn test_burst_of_handles_binds_in_order() {
    let Some(session) = session_or_skip().await else { return };

    session.exec("counter = []").await.unwrap();
    let appends: Vec<_> = (0..10_000)
        .map(|i| expr!(session, "counter.append({})", i).unwrap())
        .collect();
    let results = join_all(appends.iter().map(|handle| handle.resolved())).await;
    assert!(results.iter().all(Result::is_ok));

    let in_order = session.eval("counter == list(range(10000))").await.unwrap();
    assert_eq!(in_order.as_bool(), Some(true));

    session.kill().await;
}

#[tokio::test]
async fn test_exec_with_waits_for_handles() {
    let Some(session) = session_or_skip().await else { return };

    let xs = session.format("[]", vec![]).unwrap();
    session
        .exec_with("{}.extend({})", vec![Arg::from(&xs), Arg::from(vec!["a", "b"])])
        .await
        .unwrap();
    let joined = session
        .eval_with("'-'.join({})", vec![Arg::from(&xs)])
        .await
        .unwrap();
    assert_eq!(joined.as_str(), Some("a-b"));

    session.kill().await;
}

#[tokio::test]
async fn test_kill_fails_outstanding_work() {
    let Some(session) = session_or_skip().await else { return };

    let handle = session.format("1", vec![]).unwrap();
    handle.resolved().await.unwrap();

    let sleeper = {
        let session = session.clone();
        tokio::spawn(async move { session.exec("import time; time.sleep(30)").await })
    };
    tokio::time::sleep(Duration::from_millis(200)).await;
    session.kill().await;

    let err = tokio::time::timeout(Duration::from_secs(5), sleeper)
        .await
        .expect("kill should fail the request promptly")
        .unwrap()
        .unwrap_err();
    assert!(err.is_transport());
    assert_eq!(handle.state(), HandleState::Closed);
    assert!(handle.force().await.unwrap_err().is_transport());

    // killing twice is harmless
    session.kill().await;
}

#[tokio::test]
async fn test_printing_reaches_the_stderr_callback() {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&lines);
    let Some(session) = session_with_or_skip(move |config| {
        config.with_stderr(move |line| sink.lock().unwrap().push(line.to_string()))
    })
    .await
    else {
        return;
    };

    session.exec("print('from python')").await.unwrap();
    assert_eq!(session.eval("21 * 2").await.unwrap().as_i64(), Some(42));
    session.kill().await;

    // stderr is read on its own task
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(lines.lock().unwrap().iter().any(|line| line == "from python"));
}

/// Commands the builtin decoder pack sends while the session starts
fn builtin_registrations() -> u64 {
    use hopi::DecoderPack;
    hopi::BuiltinDecoders
        .entries()
        .iter()
        .filter(|entry| entry.remote_encode_source.is_some())
        .count() as u64
}
