//! T82: batches commit all or nothing and report every failure

mod common;

use common::ScriptedDriver;
use futures::executor::block_on;
use nervusdb_ogm::{CompiledQuery, DriverError, Error, PropertyMap, Row, Value};

fn driver() -> ScriptedDriver {
    ScriptedDriver::new(|query, _| {
        if query.contains("INVALID") {
            Err(DriverError::with_code(
                "Neo.ClientError.Statement.SyntaxError",
                "Invalid input 'INVALID'",
            ))
        } else {
            Ok(vec![Row::default().with("n", 1i64)])
        }
    })
}

fn query(text: &str) -> CompiledQuery {
    CompiledQuery::new(text, PropertyMap::new())
}

#[test]
fn one_failure_rolls_back_the_whole_batch() {
    let driver = driver();
    let ogm = common::ogm(driver.clone());

    let err = block_on(ogm.batch(vec![
        query("CREATE (a:Company { name: 'A' })"),
        query("INVALID QUERY"),
        query("CREATE (b:Company { name: 'B' })"),
    ]))
    .unwrap_err();

    let Error::Batch(failures) = err else {
        panic!("expected a batch error");
    };
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].index, 1);
    assert_eq!(failures[0].query, "INVALID QUERY");
    assert_eq!(
        failures[0].error.code.as_deref(),
        Some("Neo.ClientError.Statement.SyntaxError")
    );

    // Every query was attempted, none was committed.
    assert_eq!(driver.executed().len(), 3);
    assert!(driver.committed().is_empty());
    assert_eq!(driver.rollbacks(), 1);
}

#[test]
fn every_failure_is_reported() {
    let driver = driver();
    let ogm = common::ogm(driver.clone());

    let err = block_on(ogm.batch(vec![
        query("INVALID ONE"),
        query("RETURN 1 AS n"),
        query("INVALID TWO"),
    ]))
    .unwrap_err();

    let message = err.to_string();
    assert!(message.starts_with("2 of the batch failed"));
    assert!(message.contains("#0:"));
    assert!(message.contains("#2:"));
    match err {
        Error::Batch(failures) => {
            let indexes: Vec<_> = failures.iter().map(|f| f.index).collect();
            assert_eq!(indexes, vec![0, 2]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn successful_batch_commits_in_order() {
    let driver = driver();
    let ogm = common::ogm(driver.clone());

    let rows = block_on(ogm.batch(vec![
        query("CREATE (a:Company { name: 'A' })"),
        query("CREATE (b:Company { name: 'B' })"),
    ]))
    .unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1][0].get("n"), Some(&Value::Int(1)));
    assert_eq!(
        driver.committed(),
        vec![
            "CREATE (a:Company { name: 'A' })".to_string(),
            "CREATE (b:Company { name: 'B' })".to_string(),
        ]
    );
    assert_eq!(driver.rollbacks(), 0);
}
