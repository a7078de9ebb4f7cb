/// SaveChanges tests
///
/// End-to-end writes through DocumentDatabase against the in-memory engine.
/// Run with: cargo test --test save_changes_tests
mod common;

use common::{RecordingClient, add_customer, add_order, entity_type, load_all, model, value};
use docsave::{
    ChangeTracker, Document, DocumentDatabase, EntityState, EntityType, InMemoryEngine, Model,
    OperationKind, PropertyDescriptor, SaveChangesConfig, SaveError, Value, ValueKind, doc,
};
use serde_json::json;

fn database() -> (DocumentDatabase<InMemoryEngine>, InMemoryEngine) {
    let engine = InMemoryEngine::new();
    (DocumentDatabase::new(engine.clone(), model()), engine)
}

#[test]
fn test_insert_update_delete_counts() {
    let (db, engine) = database();
    let mut tracker = ChangeTracker::new();
    let ada = add_customer(&db, &mut tracker, 1, "Ada");
    let bob = add_customer(&db, &mut tracker, 2, "Bob");
    assert_eq!(db.save_changes(&mut tracker).unwrap(), 2);
    assert_eq!(engine.count("customers").unwrap(), 2);

    tracker.set_value(ada, "Name", json!("Ada Lovelace")).unwrap();
    tracker.delete(bob).unwrap();
    assert_eq!(db.save_changes(&mut tracker).unwrap(), 2);

    let stored = engine.documents("customers").unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].get("Name"), Some(&Value::Text("Ada Lovelace".into())));
    assert_eq!(tracker.entry(bob).unwrap().state(), EntityState::Detached);
    assert_eq!(tracker.entry(ada).unwrap().state(), EntityState::Unchanged);
}

#[test]
fn test_no_changes_opens_no_session() {
    let (db, engine) = database();
    let mut tracker = ChangeTracker::new();
    tracker
        .attach(&entity_type(&db, "Customer"), [("Id", json!(1)), ("Name", json!("Ada"))])
        .unwrap();

    assert_eq!(db.save_changes(&mut tracker).unwrap(), 0);
    assert_eq!(engine.sessions_started().unwrap(), 0);
}

#[test]
fn test_accept_disabled_keeps_pending_state() {
    let engine = InMemoryEngine::new();
    let db = DocumentDatabase::new(engine.clone(), model())
        .with_config(SaveChangesConfig::new().accept_all_changes_on_success(false))
        .unwrap();
    let mut tracker = ChangeTracker::new();
    let ada = add_customer(&db, &mut tracker, 1, "Ada");

    assert_eq!(db.save_changes(&mut tracker).unwrap(), 1);
    assert_eq!(tracker.entry(ada).unwrap().state(), EntityState::Added);
    tracker.accept_all_changes();
    assert_eq!(tracker.entry(ada).unwrap().state(), EntityState::Unchanged);
}

#[test]
fn test_round_trip_of_owned_graph() {
    let (db, engine) = database();
    let mut tracker = ChangeTracker::new();
    let order = add_order(&db, &mut tracker, "ada");
    db.save_changes(&mut tracker).unwrap();

    let stored = engine.documents("orders").unwrap();
    assert_eq!(stored.len(), 1);
    let entity = db.reader().read("Order", &stored[0]).unwrap();

    // Generated values
    assert_eq!(entity.value("Id"), Some(&value(&tracker, order, "Id")));
    assert_eq!(entity.value("Version"), Some(&json!(1)));

    assert_eq!(entity.value("Customer"), Some(&json!("ada")));
    assert_eq!(entity.value("Total"), Some(&json!(42.5)));
    assert_eq!(entity.value("PlacedAt"), Some(&json!("2024-05-01T10:00:00Z")));

    let shipping = entity.one("Shipping").unwrap();
    assert_eq!(shipping.value("Street"), Some(&json!("1 Main St")));
    assert_eq!(shipping.value("City"), Some(&json!("Oslo")));

    let lines: Vec<_> = entity
        .many("Lines")
        .iter()
        .map(|line| (line.value("Sku").cloned(), line.value("Quantity").cloned()))
        .collect();
    assert_eq!(
        lines,
        vec![
            (Some(json!("apple")), Some(json!(3))),
            (Some(json!("pear")), Some(json!(1))),
        ]
    );
}

#[test]
fn test_owned_documents_omit_shadow_properties() {
    let (db, engine) = database();
    let mut tracker = ChangeTracker::new();
    add_order(&db, &mut tracker, "ada");
    db.save_changes(&mut tracker).unwrap();

    let stored = engine.documents("orders").unwrap();
    let first_line = stored[0]
        .get("Lines")
        .and_then(Value::as_array)
        .and_then(|lines| lines.first())
        .and_then(Value::as_document)
        .cloned()
        .unwrap();
    assert_eq!(first_line, doc! { "Sku" => "apple", "Quantity" => 3i64 });
    assert!(matches!(stored[0].get("_id"), Some(Value::Uuid(_))));
}

#[test]
fn test_owned_change_rewrites_root_without_scalars() {
    let engine = InMemoryEngine::new();
    let client = RecordingClient::new(engine.clone());
    let db = DocumentDatabase::new(client.clone(), model());

    let mut tracker = ChangeTracker::new();
    let customer = add_customer(&db, &mut tracker, 7, "Ada");
    let contact = tracker
        .add_owned(customer, "Contact", &entity_type(&db, "ContactInfo"), [
            ("Email", json!("ada@example.com")),
            ("Phone", json!("555-0100")),
        ])
        .unwrap();
    db.save_changes(&mut tracker).unwrap();

    tracker.set_value(contact, "Email", json!("ada@lovelace.dev")).unwrap();
    assert_eq!(tracker.entry(customer).unwrap().state(), EntityState::Unchanged);
    assert_eq!(db.save_changes(&mut tracker).unwrap(), 1);

    let writes = client.recorded();
    let update = &writes[1].operations[0];
    assert_eq!(update.kind(), OperationKind::Update);
    let expected: Document = doc! {
        "Contact" => doc! { "Email" => "ada@lovelace.dev", "Phone" => "555-0100" },
    };
    assert_eq!(update.document(), Some(&expected));

    let stored = engine.find_one("customers", &doc! { "_id" => 7i64 }).unwrap().unwrap();
    assert_eq!(stored.get_path("Contact.Email"), Some(&Value::Text("ada@lovelace.dev".into())));
    assert_eq!(stored.get("Name"), Some(&Value::Text("Ada".into())));
}

#[test]
fn test_ordinals_continue_after_reorder() {
    let (db, engine) = database();
    let mut tracker = ChangeTracker::new();
    add_order(&db, &mut tracker, "ada");
    db.save_changes(&mut tracker).unwrap();

    let (mut tracker, ids) = load_all(&db, &engine, "Order");
    let order = ids[0];
    let lines = tracker.entry(order).unwrap().children("Lines").to_vec();
    assert_eq!(value(&tracker, lines[0], "Ordinal"), json!(0));
    assert_eq!(value(&tracker, lines[1], "Ordinal"), json!(1));

    tracker.remove_owned(order, "Lines", lines[0]).unwrap();
    let z = tracker
        .add_owned(order, "Lines", &entity_type(&db, "Line"), [("Sku", json!("plum")), ("Quantity", json!(5))])
        .unwrap();
    assert_eq!(db.save_changes(&mut tracker).unwrap(), 1);

    assert_eq!(value(&tracker, z, "Ordinal"), json!(2));
    let stored = engine.documents("orders").unwrap();
    let skus: Vec<_> = stored[0]
        .get("Lines")
        .and_then(Value::as_array)
        .unwrap()
        .iter()
        .map(|line| line.as_document().and_then(|d| d.get("Sku")).cloned())
        .collect();
    assert_eq!(
        skus,
        vec![Some(Value::Text("pear".into())), Some(Value::Text("plum".into()))]
    );
    assert_eq!(stored[0].get("Version"), Some(&Value::Integer(2)));
}

#[test]
fn test_adjacent_roots_batch_per_collection_run() {
    let engine = InMemoryEngine::new();
    let client = RecordingClient::new(engine.clone());
    let db = DocumentDatabase::new(client.clone(), model());

    let mut tracker = ChangeTracker::new();
    add_customer(&db, &mut tracker, 1, "Ada");
    add_customer(&db, &mut tracker, 2, "Bob");
    add_order(&db, &mut tracker, "ada");
    add_customer(&db, &mut tracker, 3, "Cy");

    assert_eq!(db.save_changes(&mut tracker).unwrap(), 4);
    assert_eq!(
        client.shape(),
        vec![
            ("customers".to_string(), 2),
            ("orders".to_string(), 1),
            ("customers".to_string(), 1),
        ]
    );
}

#[test]
fn test_composite_key_update() {
    let (db, engine) = database();
    let mut tracker = ChangeTracker::new();
    let shipment = tracker
        .add(&entity_type(&db, "Shipment"), [
            ("Carrier", json!("ups")),
            ("TrackingNo", json!("1Z999")),
            ("Status", json!("label created")),
        ])
        .unwrap();
    db.save_changes(&mut tracker).unwrap();

    tracker.set_value(shipment, "Status", json!("delivered")).unwrap();
    assert_eq!(db.save_changes(&mut tracker).unwrap(), 1);

    let stored = engine
        .find_one("shipments", &doc! { "_id" => doc! { "Carrier" => "ups", "TrackingNo" => "1Z999" } })
        .unwrap()
        .unwrap();
    assert_eq!(stored.get("Status"), Some(&Value::Text("delivered".into())));
}

#[test]
fn test_missing_primary_key_writes_nothing() {
    let (db, engine) = database();
    let mut tracker = ChangeTracker::new();
    let order = add_order(&db, &mut tracker, "ada");
    tracker
        .add(&entity_type(&db, "Note"), [("Text", json!("call back"))])
        .unwrap();

    let err = db.save_changes(&mut tracker).unwrap_err();
    assert!(matches!(err, SaveError::MissingPrimaryKey(ref name) if name == "Note"));
    assert_eq!(engine.sessions_started().unwrap(), 0);
    assert!(tracker.entry(order).unwrap().has_temporary_value("Id"));
}

#[test]
fn test_missing_root_entry_names_owned_type() {
    let (db, engine) = database();
    let mut tracker = ChangeTracker::new();
    let customer = tracker
        .attach(&entity_type(&db, "Customer"), [("Id", json!(1)), ("Name", json!("Ada"))])
        .unwrap();
    tracker
        .add_owned(customer, "Contact", &entity_type(&db, "ContactInfo"), [("Email", json!("a@b.c"))])
        .unwrap();
    tracker.detach(customer).unwrap();

    let err = db.save_changes(&mut tracker).unwrap_err();
    assert!(matches!(err, SaveError::MissingRootEntry { ref entity_type } if entity_type == "ContactInfo"));
    assert_eq!(engine.sessions_started().unwrap(), 0);
}

#[test]
fn test_duplicate_key_surfaces_storage_error() {
    let (db, _engine) = database();
    let mut first = ChangeTracker::new();
    add_customer(&db, &mut first, 1, "Ada");
    db.save_changes(&mut first).unwrap();

    let mut second = ChangeTracker::new();
    let again = add_customer(&db, &mut second, 1, "Ada again");
    let err = db.save_changes(&mut second).unwrap_err();

    assert!(matches!(err, SaveError::Storage(docsave::StorageError::DuplicateKey { .. })));
    assert!(!err.is_concurrency_conflict());
    assert_eq!(second.entry(again).unwrap().state(), EntityState::Added);
}

fn nested_model() -> Model {
    Model::builder()
        .entity(
            EntityType::root("Order", "orders")
                .property(PropertyDescriptor::key("Id", ValueKind::Integer))
                .property(PropertyDescriptor::row_version("Version"))
                .owns_many("Lines", "Line"),
        )
        .entity(
            EntityType::owned("Line", "Order")
                .property(PropertyDescriptor::ordinal("Ordinal"))
                .property(PropertyDescriptor::scalar("Sku", ValueKind::String))
                .owns_many("Notes", "LineNote"),
        )
        .entity(
            EntityType::owned("LineNote", "Line")
                .property(PropertyDescriptor::ordinal("Ordinal"))
                .property(PropertyDescriptor::scalar("Text", ValueKind::String)),
        )
        .build()
        .unwrap()
}

#[test]
fn test_note_added_to_persisted_line_rewrites_nested_array() {
    let engine = InMemoryEngine::new();
    let client = RecordingClient::new(engine.clone());
    let db = DocumentDatabase::new(client.clone(), nested_model());

    let mut tracker = ChangeTracker::new();
    let order = tracker.add(&entity_type(&db, "Order"), [("Id", json!(1))]).unwrap();
    let line = tracker
        .add_owned(order, "Lines", &entity_type(&db, "Line"), [("Sku", json!("a"))])
        .unwrap();
    let first = tracker
        .add_owned(line, "Notes", &entity_type(&db, "LineNote"), [("Text", json!("n1"))])
        .unwrap();
    assert_eq!(db.save_changes(&mut tracker).unwrap(), 1);
    assert_eq!(value(&tracker, first, "Ordinal"), json!(0));

    let (mut tracker, ids) = load_all(&db, &engine, "Order");
    let line = tracker.entry(ids[0]).unwrap().children("Lines")[0];
    let second = tracker
        .add_owned(line, "Notes", &entity_type(&db, "LineNote"), [("Text", json!("n2"))])
        .unwrap();
    assert_eq!(tracker.entry(ids[0]).unwrap().state(), EntityState::Unchanged);
    assert_eq!(db.save_changes(&mut tracker).unwrap(), 1);
    assert_eq!(value(&tracker, second, "Ordinal"), json!(1));

    let writes = client.recorded();
    let update = &writes[1].operations[0];
    assert_eq!(update.kind(), OperationKind::Update);
    let notes = vec![
        Value::Document(doc! { "Text" => "n1" }),
        Value::Document(doc! { "Text" => "n2" }),
    ];
    let lines = Value::Array(vec![Value::Document(doc! { "Sku" => "a", "Notes" => Value::Array(notes.clone()) })]);
    assert_eq!(update.document(), Some(&doc! { "Version" => 2i64, "Lines" => lines.clone() }));

    let stored = engine.find_one("orders", &doc! { "_id" => 1i64 }).unwrap().unwrap();
    assert_eq!(stored.get("Lines"), Some(&lines));
    assert_eq!(stored.get("Version"), Some(&Value::Integer(2)));
}
