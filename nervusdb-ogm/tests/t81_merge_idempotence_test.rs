//! T81: merging a unique-keyed type twice resolves to one node

mod common;

use common::{ScriptedDriver, ogm, params_with_prefix, projected, props};
use futures::executor::block_on;
use nervusdb_ogm::{Row, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

type Store = Arc<Mutex<BTreeMap<String, (i64, Value)>>>;

/// Keeps one account per merged email, like a unique constraint would, and
/// applies `ON CREATE SET` only when the merge creates the account.
fn keyed_driver() -> (ScriptedDriver, Store) {
    let store: Store = Arc::new(Mutex::new(BTreeMap::new()));
    let accounts = Arc::clone(&store);
    let driver = ScriptedDriver::new(move |query, params| {
        assert!(query.starts_with("MERGE (this:Account { email: $this_email })"));
        let email = params
            .get("this_email")
            .and_then(Value::as_str)
            .unwrap()
            .to_string();
        let plan = params.get("set_this_plan").cloned().unwrap_or(Value::Null);
        let on_create = query.contains("ON CREATE SET this.plan = $set_this_plan");
        let on_every_merge = query.contains("\nSET this.plan = $set_this_plan");

        let mut accounts = accounts.lock().unwrap();
        let next = accounts.len() as i64 + 1;
        let created = !accounts.contains_key(&email);
        let account = accounts
            .entry(email.clone())
            .or_insert((next, Value::Null));
        if on_every_merge || (on_create && created) {
            account.1 = plan;
        }
        Ok(vec![Row::default().with(
            "this",
            projected(
                account.0,
                "Account",
                &[("email", Value::from(email)), ("plan", account.1.clone())],
            ),
        )])
    });
    (driver, store)
}

#[test]
fn merge_twice_yields_the_same_node() {
    let (driver, store) = keyed_driver();
    let ogm = ogm(driver.clone());
    let payload = props(&[("email", Value::from("a@example.com"))]);

    let first = block_on(ogm.merge("Account", payload.clone())).unwrap();
    let second = block_on(ogm.merge("Account", payload)).unwrap();

    assert_eq!(first.identity(), second.identity());
    assert_eq!(store.lock().unwrap().len(), 1);
    assert_eq!(second.get("plan"), Some(&Value::from("free")));

    let executed = driver.executed();
    assert_eq!(executed.len(), 2);
    assert_eq!(executed[0].query, executed[1].query);
    assert_eq!(executed[0].params, executed[1].params);
}

#[test]
fn defaults_never_overwrite_a_matched_node() {
    let (driver, store) = keyed_driver();
    store
        .lock()
        .unwrap()
        .insert("a@example.com".into(), (1, Value::from("pro")));
    let ogm = ogm(driver.clone());

    let account =
        block_on(ogm.merge("Account", props(&[("email", Value::from("a@example.com"))]))).unwrap();

    assert_eq!(account.get("plan"), Some(&Value::from("pro")));
    let query = &driver.executed()[0].query;
    assert!(query.contains("\nON CREATE SET this.plan = $set_this_plan\n"));
    assert!(!query.contains("\nSET this.plan"));
}

#[test]
fn supplied_values_are_still_set_on_match() {
    let (driver, store) = keyed_driver();
    store
        .lock()
        .unwrap()
        .insert("a@example.com".into(), (1, Value::from("free")));
    let ogm = ogm(driver);

    let account = block_on(ogm.merge(
        "Account",
        props(&[
            ("email", Value::from("a@example.com")),
            ("plan", Value::from("pro")),
        ]),
    ))
    .unwrap();

    assert_eq!(account.get("plan"), Some(&Value::from("pro")));
}

#[test]
fn different_keys_yield_different_nodes() {
    let (driver, store) = keyed_driver();
    let ogm = ogm(driver);

    let a = block_on(ogm.merge("Account", props(&[("email", Value::from("a@example.com"))])))
        .unwrap();
    let b = block_on(ogm.merge("Account", props(&[("email", Value::from("b@example.com"))])))
        .unwrap();

    assert_ne!(a.identity(), b.identity());
    assert_eq!(store.lock().unwrap().len(), 2);
}

#[test]
fn generated_primary_key_stays_out_of_the_merge_pattern() {
    let driver = ScriptedDriver::new(|_, params| {
        let email = params.get("this_email").cloned().unwrap_or(Value::Null);
        Ok(vec![Row::default().with(
            "this",
            projected(
                1,
                "Person",
                &[
                    ("email", email),
                    ("name", Value::from("Ann")),
                    ("employer", Value::Null),
                ],
            ),
        )])
    });
    let ogm = ogm(driver.clone());
    let payload = props(&[
        ("email", Value::from("a@example.com")),
        ("name", Value::from("Ann")),
    ]);

    block_on(ogm.merge("Person", payload.clone())).unwrap();
    block_on(ogm.merge("Person", payload)).unwrap();

    let executed = driver.executed();
    assert_eq!(executed[0].query, executed[1].query);
    assert!(
        executed[0]
            .query
            .starts_with("MERGE (this:Person { email: $this_email })\nON CREATE SET this.person_id = $set_this_person_id\nSET this.name = $set_this_name\n")
    );
    assert_eq!(
        params_with_prefix(&executed[0].params, "this_"),
        params_with_prefix(&executed[1].params, "this_")
    );
    assert!(!executed[0].params.contains_key("this_person_id"));
}
